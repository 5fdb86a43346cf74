//! CPU execution engine for the DCPU-16.
//!
//! Implements the fetch-decode-execute cycle and all opcode behaviors.

use crate::cpu::{Memory, Registers};
use crate::cpu::decode::{self, DecodeError, Instruction, Opcode};
use crate::cpu::memory::MemoryError;
use crate::cpu::operand;
use crate::cpu::registers::{NamedRegister, Register};
use log::trace;
use serde::{Serialize, Deserialize};
use thiserror::Error;

/// What an executed opcode asks the tick driver to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Store `value` in operand A's location. `overflow` is the new O
    /// flag, or `None` to leave it unchanged.
    Write { value: u16, overflow: Option<bool> },
    /// Skip the next instruction word.
    Skip,
    /// No write and no skip.
    Nothing,
}

fn arithmetic(raw: u32) -> Outcome {
    Outcome::Write {
        value: raw as u16,
        overflow: Some(raw > u16::MAX as u32),
    }
}

fn bitwise(value: u16) -> Outcome {
    Outcome::Write { value, overflow: None }
}

fn skip_unless(condition: bool) -> Outcome {
    if condition {
        Outcome::Nothing
    } else {
        Outcome::Skip
    }
}

/// Execute an opcode on two resolved operand values.
///
/// Overflow is computed from the unmasked result of the arithmetic and
/// shift opcodes. Bitwise, SET and conditional opcodes never touch it.
pub fn execute(opcode: Opcode, a: u16, b: u16) -> Outcome {
    let (wa, wb) = (a as u32, b as u32);
    match opcode {
        Opcode::Nop => Outcome::Nothing,
        Opcode::Set => bitwise(b),
        Opcode::Add => arithmetic(wa + wb),
        Opcode::Sub => Outcome::Write {
            value: a.wrapping_sub(b),
            overflow: Some(b > a),
        },
        Opcode::Mul => arithmetic(wa * wb),
        Opcode::Div => match a.checked_div(b) {
            Some(q) => Outcome::Write { value: q, overflow: Some(false) },
            None => Outcome::Write { value: 0, overflow: Some(true) },
        },
        Opcode::Mod => Outcome::Write {
            value: a.checked_rem(b).unwrap_or(0),
            overflow: Some(false),
        },
        Opcode::Shl => {
            let value = if b >= 16 { 0 } else { ((wa << b) & 0xFFFF) as u16 };
            let overflow = a != 0 && (b >= 16 || (wa << b) > u16::MAX as u32);
            Outcome::Write { value, overflow: Some(overflow) }
        }
        Opcode::Shr => Outcome::Write {
            value: a.checked_shr(b as u32).unwrap_or(0),
            overflow: Some(false),
        },
        Opcode::And => bitwise(a & b),
        Opcode::Bor => bitwise(a | b),
        Opcode::Xor => bitwise(a ^ b),
        Opcode::Ife => skip_unless(a == b),
        Opcode::Ifn => skip_unless(a != b),
        Opcode::Ifg => skip_unless(a > b),
        Opcode::Ifb => skip_unless(a & b != 0),
    }
}

/// The DCPU-16 CPU.
#[derive(Clone, Serialize, Deserialize)]
pub struct Cpu {
    /// CPU registers.
    pub regs: Registers,
    /// Main memory.
    pub mem: Memory,
    /// Instruction count.
    pub cycles: u64,
    /// Last executed instruction (for debugging).
    #[serde(skip)]
    last_instr: Option<Instruction>,
}

impl Cpu {
    /// Create a new CPU with full-size memory and zeroed state.
    pub fn new() -> Self {
        Self::with_memory(Memory::new())
    }

    /// Create a new CPU with `size` words of memory.
    pub fn with_memory_size(size: usize) -> Result<Self, CpuError> {
        Ok(Self::with_memory(Memory::with_size(size)?))
    }

    fn with_memory(mem: Memory) -> Self {
        Self {
            regs: Registers::new(),
            mem,
            cycles: 0,
            last_instr: None,
        }
    }

    /// Write a program into memory starting at `base_address`.
    pub fn load(&mut self, words: &[u16], base_address: u16) -> Result<(), CpuError> {
        self.mem.load_program(base_address, words)?;
        Ok(())
    }

    /// Execute a single instruction.
    ///
    /// Returns the instruction that was executed. The only error is a
    /// decode inconsistency, after which the state must be discarded.
    pub fn tick(&mut self) -> Result<Instruction, CpuError> {
        // Fetch
        let pc = self.regs.pc;
        let word = self.mem.read(pc);

        // Decode
        let instr = decode::decode(word)?;

        // Resolve A before B; each may consume a word after PC
        let a_loc = operand::resolve(&mut self.regs, &self.mem, instr.a);
        let a = a_loc.read(&self.regs, &self.mem);
        let b_loc = operand::resolve(&mut self.regs, &self.mem, instr.b);
        let b = b_loc.read(&self.regs, &self.mem);

        // Execute and write back to A
        match execute(instr.opcode, a, b) {
            Outcome::Write { value, overflow } => {
                if let Some(o) = overflow {
                    self.regs.o = o;
                }
                a_loc.write(&mut self.regs, &mut self.mem, value);
            }
            Outcome::Skip => {
                self.regs.advance_pc();
            }
            Outcome::Nothing => {}
        }

        self.regs.advance_pc();

        trace!("{:04x}: {:04x} {:?} a={:04x} b={:04x}", pc, word, instr.opcode, a, b);

        self.cycles += 1;
        self.last_instr = Some(instr);

        Ok(instr)
    }

    /// Run `max_cycles` instructions back to back, without pacing.
    pub fn run_limited(&mut self, max_cycles: u64) -> Result<u64, CpuError> {
        for _ in 0..max_cycles {
            self.tick()?;
        }
        Ok(max_cycles)
    }

    pub fn register(&self, reg: Register) -> u16 {
        self.regs.get(reg)
    }

    pub fn set_register(&mut self, reg: Register, value: u16) {
        self.regs.set(reg, value);
    }

    /// Read a register by name, e.g. `"A"`, `"PC"` or `"O"`.
    pub fn get_named(&self, name: &str) -> Result<u16, CpuError> {
        let reg: NamedRegister = name
            .parse()
            .map_err(|_| CpuError::UnknownRegister(name.to_string()))?;
        Ok(self.regs.get_named(reg))
    }

    /// Write a register by name.
    pub fn set_named(&mut self, name: &str, value: u16) -> Result<(), CpuError> {
        let reg: NamedRegister = name
            .parse()
            .map_err(|_| CpuError::UnknownRegister(name.to_string()))?;
        self.regs.set_named(reg, value);
        Ok(())
    }

    pub fn memory(&self, addr: u16) -> u16 {
        self.mem.read(addr)
    }

    pub fn set_memory(&mut self, addr: u16, value: u16) {
        self.mem.write(addr, value);
    }

    pub fn pc(&self) -> u16 {
        self.regs.pc
    }

    pub fn set_pc(&mut self, value: u16) {
        self.regs.pc = value;
    }

    pub fn sp(&self) -> u16 {
        self.regs.sp
    }

    pub fn set_sp(&mut self, value: u16) {
        self.regs.sp = value;
    }

    pub fn overflow(&self) -> bool {
        self.regs.o
    }

    pub fn set_overflow(&mut self, o: bool) {
        self.regs.o = o;
    }

    /// Get the last executed instruction.
    pub fn last_instruction(&self) -> Option<Instruction> {
        self.last_instr
    }
}

impl Default for Cpu {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Cpu {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cpu")
            .field("cycles", &self.cycles)
            .field("regs", &self.regs)
            .field("mem", &self.mem)
            .finish()
    }
}

/// Errors that can occur during CPU operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CpuError {
    #[error("decode inconsistency: {0}")]
    Decode(#[from] DecodeError),

    #[error("memory error: {0}")]
    Memory(#[from] MemoryError),

    #[error("unknown register: {0}")]
    UnknownRegister(String),
}
