//! # DCPU-16 Emulator
//!
//! An emulator of the DCPU-16, a 16-bit virtual processor with eight
//! general registers, a stack pointer, an overflow flag and 64K words of
//! word-addressed memory.
//!
//! The CPU core is single-threaded and deterministic. The [`host`] module
//! runs it in real time and lets observer threads inspect or modify the
//! machine between ticks.

pub mod asm;
pub mod config;
pub mod cpu;
pub mod host;

// Re-export commonly used types
pub use asm::{assemble, disassemble, load_image, save_image, AssemblerError, ImageError};
pub use config::{ConfigError, EmuConfig};
pub use cpu::{Cpu, CpuError, Instruction, Memory, Register, Registers};
pub use host::{Host, HostError, Observer, ObserverRegistry, ShutdownSignal, TickControl};
