//! DCPU-16 register file.
//!
//! The DCPU-16 has:
//! - 8 general purpose registers: A, B, C, X, Y, Z, I, J
//! - PC: program counter
//! - SP: stack pointer
//! - O: overflow flag, addressable as 0 or 1
//!
//! Every value is an unsigned 16-bit word and wraps silently.

use serde::{Serialize, Deserialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// The number of general purpose registers.
pub const NUM_REGISTERS: usize = 8;

/// A general purpose register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Register {
    A,
    B,
    C,
    X,
    Y,
    Z,
    I,
    J,
}

impl Register {
    /// All registers in encoding order.
    pub const ALL: [Register; NUM_REGISTERS] = [
        Register::A,
        Register::B,
        Register::C,
        Register::X,
        Register::Y,
        Register::Z,
        Register::I,
        Register::J,
    ];

    /// Register from its 3-bit index. Only the low 3 bits are used.
    pub fn from_index(index: u8) -> Self {
        Self::ALL[(index & 0x7) as usize]
    }

    /// Index of the register in the register file (0-7).
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            Register::A => "A",
            Register::B => "B",
            Register::C => "C",
            Register::X => "X",
            Register::Y => "Y",
            Register::Z => "Z",
            Register::I => "I",
            Register::J => "J",
        }
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Register {
    type Err = RegisterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_ascii_uppercase();
        Register::ALL
            .into_iter()
            .find(|r| r.name() == upper)
            .ok_or_else(|| RegisterError::UnknownRegister(s.to_string()))
    }
}

/// Any register addressable by name, special registers included.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NamedRegister {
    General(Register),
    Pc,
    Sp,
    O,
}

impl FromStr for NamedRegister {
    type Err = RegisterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PC" => Ok(NamedRegister::Pc),
            "SP" => Ok(NamedRegister::Sp),
            "O" => Ok(NamedRegister::O),
            _ => s.parse().map(NamedRegister::General),
        }
    }
}

impl fmt::Display for NamedRegister {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NamedRegister::General(r) => write!(f, "{}", r),
            NamedRegister::Pc => f.write_str("PC"),
            NamedRegister::Sp => f.write_str("SP"),
            NamedRegister::O => f.write_str("O"),
        }
    }
}

/// Errors that can occur when naming a register.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegisterError {
    #[error("unknown register: {0}")]
    UnknownRegister(String),
}

/// The DCPU-16 register file.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registers {
    /// A, B, C, X, Y, Z, I, J
    pub general: [u16; NUM_REGISTERS],

    /// Program counter
    pub pc: u16,

    /// Stack pointer. The stack grows downward from 0, so the first
    /// push lands at 0xFFFF.
    pub sp: u16,

    /// Overflow flag
    pub o: bool,
}

impl Registers {
    /// Create a new register file with all values zeroed.
    pub fn new() -> Self {
        Self {
            general: [0; NUM_REGISTERS],
            pc: 0,
            sp: 0,
            o: false,
        }
    }

    #[inline]
    pub fn get(&self, reg: Register) -> u16 {
        self.general[reg.index()]
    }

    #[inline]
    pub fn set(&mut self, reg: Register, value: u16) {
        self.general[reg.index()] = value;
    }

    /// Read any register by name. O reads as 0 or 1.
    pub fn get_named(&self, reg: NamedRegister) -> u16 {
        match reg {
            NamedRegister::General(r) => self.get(r),
            NamedRegister::Pc => self.pc,
            NamedRegister::Sp => self.sp,
            NamedRegister::O => self.o as u16,
        }
    }

    /// Write any register by name. Any non-zero value sets O.
    pub fn set_named(&mut self, reg: NamedRegister, value: u16) {
        match reg {
            NamedRegister::General(r) => self.set(r, value),
            NamedRegister::Pc => self.pc = value,
            NamedRegister::Sp => self.sp = value,
            NamedRegister::O => self.o = value != 0,
        }
    }

    /// Increment the program counter by 1.
    /// Returns the new value.
    #[inline]
    pub fn advance_pc(&mut self) -> u16 {
        self.pc = self.pc.wrapping_add(1);
        self.pc
    }

    /// Decrement SP and return the new stack top.
    #[inline]
    pub fn push_sp(&mut self) -> u16 {
        self.sp = self.sp.wrapping_sub(1);
        self.sp
    }

    /// Return the current stack top and increment SP.
    #[inline]
    pub fn pop_sp(&mut self) -> u16 {
        let top = self.sp;
        self.sp = self.sp.wrapping_add(1);
        top
    }
}

impl Default for Registers {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for Registers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for reg in Register::ALL {
            write!(f, "{}={:04x} ", reg, self.get(reg))?;
        }
        write!(f, "PC={:04x} SP={:04x} O={}", self.pc, self.sp, self.o as u8)
    }
}
