//! Assembler, disassembler and program images for DCPU-16 programs.
//!
//! This module provides:
//! - A two-pass assembler (text → words)
//! - A disassembler (words → readable text)
//! - Hex text and big-endian binary program images

pub mod assembler;
pub mod disasm;
pub mod image;

pub use assembler::{assemble, AssemblerError};
pub use disasm::{disassemble, disassemble_at};
pub use image::{load_image, save_image, ImageError, ImageFormat};
