//! DCPU-16 memory subsystem.
//!
//! A flat array of 0x10000 sixteen-bit words. Address arithmetic is done
//! on `u16`, so every address wraps; a smaller memory wraps modulo its
//! own size.

use serde::{Serialize, Deserialize};
use thiserror::Error;

/// The number of words in a full DCPU-16 memory.
pub const MEMORY_SIZE: usize = 0x10000;

/// DCPU-16 memory: up to 65536 sixteen-bit cells.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<u16>", into = "Vec<u16>")]
pub struct Memory {
    cells: Vec<u16>,
}

impl Memory {
    /// Create a full-size memory with all cells zeroed.
    pub fn new() -> Self {
        Self {
            cells: vec![0; MEMORY_SIZE],
        }
    }

    /// Create a memory with `size` cells.
    pub fn with_size(size: usize) -> Result<Self, MemoryError> {
        if size == 0 || size > MEMORY_SIZE {
            return Err(MemoryError::InvalidSize(size));
        }
        Ok(Self {
            cells: vec![0; size],
        })
    }

    /// Number of cells.
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    #[inline]
    fn index(&self, addr: u16) -> usize {
        addr as usize % self.cells.len()
    }

    /// Read a cell.
    #[inline]
    pub fn read(&self, addr: u16) -> u16 {
        self.cells[self.index(addr)]
    }

    /// Write a cell.
    #[inline]
    pub fn write(&mut self, addr: u16, value: u16) {
        let index = self.index(addr);
        self.cells[index] = value;
    }

    /// Load a program into memory starting at the given address.
    ///
    /// Programs never wrap around the end of memory.
    pub fn load_program(&mut self, start_addr: u16, program: &[u16]) -> Result<(), MemoryError> {
        let start = start_addr as usize;
        if start >= self.cells.len() || program.len() > self.cells.len() - start {
            return Err(MemoryError::ProgramTooLarge {
                size: program.len(),
                available: self.cells.len().saturating_sub(start),
            });
        }

        self.cells[start..start + program.len()].copy_from_slice(program);
        Ok(())
    }
}

impl Default for Memory {
    fn default() -> Self {
        Self::new()
    }
}

impl TryFrom<Vec<u16>> for Memory {
    type Error = MemoryError;

    fn try_from(cells: Vec<u16>) -> Result<Self, Self::Error> {
        if cells.is_empty() || cells.len() > MEMORY_SIZE {
            return Err(MemoryError::InvalidSize(cells.len()));
        }
        Ok(Self { cells })
    }
}

impl From<Memory> for Vec<u16> {
    fn from(mem: Memory) -> Self {
        mem.cells
    }
}

impl std::fmt::Debug for Memory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let non_zero = self.cells.iter().filter(|&&c| c != 0).count();

        f.debug_struct("Memory")
            .field("non_zero_cells", &non_zero)
            .field("total_cells", &self.cells.len())
            .finish()
    }
}

/// Errors that can occur during memory operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MemoryError {
    #[error("memory size {0} must be between 1 and 65536")]
    InvalidSize(usize),

    #[error("program size {size} exceeds available space {available}")]
    ProgramTooLarge { size: usize, available: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_read_write() {
        let mut mem = Memory::new();

        mem.write(0x8000, 0xBEEF);
        assert_eq!(mem.read(0x8000), 0xBEEF);
        assert_eq!(mem.read(0x8001), 0);
    }

    #[test]
    fn test_small_memory_wraps() {
        let mut mem = Memory::with_size(0x100).unwrap();

        mem.write(0x0105, 7);
        assert_eq!(mem.read(0x0005), 7);
        assert_eq!(mem.len(), 0x100);
    }

    #[test]
    fn test_invalid_size() {
        assert_eq!(Memory::with_size(0), Err(MemoryError::InvalidSize(0)));
        assert!(Memory::with_size(MEMORY_SIZE + 1).is_err());
        assert!(Memory::with_size(MEMORY_SIZE).is_ok());
    }

    #[test]
    fn test_load_program() {
        let mut mem = Memory::new();

        mem.load_program(0x10, &[1, 2, 3]).unwrap();

        assert_eq!(mem.read(0x10), 1);
        assert_eq!(mem.read(0x11), 2);
        assert_eq!(mem.read(0x12), 3);
    }

    #[test]
    fn test_load_program_at_end() {
        let mut mem = Memory::new();

        assert!(mem.load_program(0xFFFE, &[1, 2]).is_ok());
        assert_eq!(
            mem.load_program(0xFFFE, &[1, 2, 3]),
            Err(MemoryError::ProgramTooLarge { size: 3, available: 2 })
        );
    }

    #[test]
    fn test_deserialize_checks_size() {
        let mem: Memory = serde_json::from_str("[1, 2, 3]").unwrap();
        assert_eq!(mem.len(), 3);
        assert_eq!(mem.read(4), 2);

        assert!(serde_json::from_str::<Memory>("[]").is_err());
        let oversized = serde_json::to_string(&vec![0u16; MEMORY_SIZE + 1]).unwrap();
        assert!(serde_json::from_str::<Memory>(&oversized).is_err());
    }
}
