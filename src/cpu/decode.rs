//! Instruction decoder for the DCPU-16.
//!
//! Every instruction is one 16-bit word, bit-partitioned as `bbbbbbaaaaaaoooo`:
//! - bits 0-3: opcode
//! - bits 4-9: value code of operand A
//! - bits 10-15: value code of operand B
//!
//! Operands using "next word" value codes are followed by one extra word
//! each, A's before B's.

use crate::cpu::registers::Register;
use serde::{Serialize, Deserialize};
use std::fmt;
use thiserror::Error;

const OP_MASK: u16 = 0x000F;
const A_SHIFT: u16 = 4;
const B_SHIFT: u16 = 10;
const VALUE_MASK: u16 = 0x3F;

/// A basic opcode. All 16 values are assigned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Opcode {
    /// Reserved; executes as a no-op
    Nop = 0x0,
    /// a = b
    Set = 0x1,
    /// a = a + b, sets O
    Add = 0x2,
    /// a = a - b, sets O
    Sub = 0x3,
    /// a = a * b, sets O
    Mul = 0x4,
    /// a = a / b, sets O
    Div = 0x5,
    /// a = a % b
    Mod = 0x6,
    /// a = a << b, sets O
    Shl = 0x7,
    /// a = a >> b, sets O
    Shr = 0x8,
    /// a = a & b
    And = 0x9,
    /// a = a | b
    Bor = 0xA,
    /// a = a ^ b
    Xor = 0xB,
    /// Skip the next word unless a == b
    Ife = 0xC,
    /// Skip the next word unless a != b
    Ifn = 0xD,
    /// Skip the next word unless a > b
    Ifg = 0xE,
    /// Skip the next word unless (a & b) != 0
    Ifb = 0xF,
}

impl Opcode {
    pub const ALL: [Opcode; 16] = [
        Opcode::Nop,
        Opcode::Set,
        Opcode::Add,
        Opcode::Sub,
        Opcode::Mul,
        Opcode::Div,
        Opcode::Mod,
        Opcode::Shl,
        Opcode::Shr,
        Opcode::And,
        Opcode::Bor,
        Opcode::Xor,
        Opcode::Ife,
        Opcode::Ifn,
        Opcode::Ifg,
        Opcode::Ifb,
    ];

    /// Create from the 4-bit opcode field.
    pub fn from_bits(bits: u16) -> Result<Self, DecodeError> {
        Self::ALL
            .get(bits as usize)
            .copied()
            .ok_or(DecodeError::InvalidOpcode(bits))
    }

    pub fn bits(self) -> u16 {
        self as u16
    }

    pub fn mnemonic(self) -> &'static str {
        match self {
            Opcode::Nop => "NOP",
            Opcode::Set => "SET",
            Opcode::Add => "ADD",
            Opcode::Sub => "SUB",
            Opcode::Mul => "MUL",
            Opcode::Div => "DIV",
            Opcode::Mod => "MOD",
            Opcode::Shl => "SHL",
            Opcode::Shr => "SHR",
            Opcode::And => "AND",
            Opcode::Bor => "BOR",
            Opcode::Xor => "XOR",
            Opcode::Ife => "IFE",
            Opcode::Ifn => "IFN",
            Opcode::Ifg => "IFG",
            Opcode::Ifb => "IFB",
        }
    }

    /// Look up an opcode by mnemonic (case-insensitive). `RES` is an
    /// alias for `NOP`.
    pub fn from_mnemonic(s: &str) -> Option<Self> {
        let upper = s.to_ascii_uppercase();
        if upper == "RES" {
            return Some(Opcode::Nop);
        }
        Self::ALL.into_iter().find(|op| op.mnemonic() == upper)
    }

    /// Whether the opcode updates the overflow flag.
    pub fn affects_overflow(self) -> bool {
        matches!(
            self,
            Opcode::Add
                | Opcode::Sub
                | Opcode::Mul
                | Opcode::Div
                | Opcode::Mod
                | Opcode::Shl
                | Opcode::Shr
        )
    }

    /// Whether the opcode is one of the IFx conditionals.
    pub fn is_conditional(self) -> bool {
        matches!(self, Opcode::Ife | Opcode::Ifn | Opcode::Ifg | Opcode::Ifb)
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}

/// A decoded 6-bit value code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operand {
    /// 0x00-0x07: register
    Register(Register),
    /// 0x08-0x0f: [register]
    Indirect(Register),
    /// 0x10-0x17: [next word + register]
    IndirectOffset(Register),
    /// 0x18: [SP++]
    Pop,
    /// 0x19: [SP]
    Peek,
    /// 0x1a: [--SP]
    Push,
    /// 0x1b: SP
    Sp,
    /// 0x1c: PC
    Pc,
    /// 0x1d: O
    Overflow,
    /// 0x1e: [next word]
    IndirectNextWord,
    /// 0x1f: next word (literal)
    NextWord,
    /// 0x20-0x3f: literal 0x00-0x1f
    Literal(u16),
}

impl Operand {
    /// Create from a 6-bit value code.
    pub fn from_code(code: u16) -> Result<Self, DecodeError> {
        let operand = match code {
            0x00..=0x07 => Operand::Register(Register::from_index(code as u8)),
            0x08..=0x0f => Operand::Indirect(Register::from_index((code - 0x08) as u8)),
            0x10..=0x17 => Operand::IndirectOffset(Register::from_index((code - 0x10) as u8)),
            0x18 => Operand::Pop,
            0x19 => Operand::Peek,
            0x1a => Operand::Push,
            0x1b => Operand::Sp,
            0x1c => Operand::Pc,
            0x1d => Operand::Overflow,
            0x1e => Operand::IndirectNextWord,
            0x1f => Operand::NextWord,
            0x20..=0x3f => Operand::Literal(code - 0x20),
            _ => return Err(DecodeError::InvalidValueCode(code)),
        };
        Ok(operand)
    }

    /// The 6-bit value code. Literals above 0x1f are truncated.
    pub fn code(self) -> u16 {
        match self {
            Operand::Register(r) => r.index() as u16,
            Operand::Indirect(r) => 0x08 + r.index() as u16,
            Operand::IndirectOffset(r) => 0x10 + r.index() as u16,
            Operand::Pop => 0x18,
            Operand::Peek => 0x19,
            Operand::Push => 0x1a,
            Operand::Sp => 0x1b,
            Operand::Pc => 0x1c,
            Operand::Overflow => 0x1d,
            Operand::IndirectNextWord => 0x1e,
            Operand::NextWord => 0x1f,
            Operand::Literal(v) => 0x20 + (v & 0x1f),
        }
    }

    /// Number of extra instruction words consumed when resolving.
    pub fn extra_words(self) -> u16 {
        match self {
            Operand::IndirectOffset(_) | Operand::IndirectNextWord | Operand::NextWord => 1,
            _ => 0,
        }
    }
}

/// A decoded DCPU-16 instruction word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instruction {
    pub opcode: Opcode,
    pub a: Operand,
    pub b: Operand,
}

impl Instruction {
    pub fn new(opcode: Opcode, a: Operand, b: Operand) -> Self {
        Self { opcode, a, b }
    }

    /// Total length in words, extension words included.
    pub fn word_count(&self) -> u16 {
        1 + self.a.extra_words() + self.b.extra_words()
    }
}

/// Decode a 16-bit instruction word.
///
/// Field widths make every word decodable; an error here means the
/// decoder itself is broken.
pub fn decode(word: u16) -> Result<Instruction, DecodeError> {
    let opcode = Opcode::from_bits(word & OP_MASK)?;
    let a = Operand::from_code((word >> A_SHIFT) & VALUE_MASK)?;
    let b = Operand::from_code((word >> B_SHIFT) & VALUE_MASK)?;
    Ok(Instruction { opcode, a, b })
}

/// Encode an instruction back to its 16-bit word.
pub fn encode(instr: &Instruction) -> u16 {
    instr.opcode.bits() | (instr.a.code() << A_SHIFT) | (instr.b.code() << B_SHIFT)
}

/// Decode inconsistency: a field outside its defined range.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("invalid opcode: {0:#x}")]
    InvalidOpcode(u16),

    #[error("invalid value code: {0:#x}")]
    InvalidValueCode(u16),
}
