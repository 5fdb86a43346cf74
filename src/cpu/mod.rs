//! CPU emulation for the DCPU-16.
//!
//! This module implements the complete DCPU-16 architecture:
//! - 65536 sixteen-bit memory words
//! - 8 general registers (A, B, C, X, Y, Z, I, J) plus PC, SP and O
//! - 16 basic opcodes over two operands with 64 value codes

pub mod memory;
pub mod registers;
pub mod decode;
pub mod operand;
pub mod execute;

pub use memory::{Memory, MemoryError};
pub use registers::{NamedRegister, Register, Registers};
pub use decode::{Instruction, Opcode, Operand, DecodeError};
pub use operand::Location;
pub use execute::{Cpu, CpuError, Outcome};
