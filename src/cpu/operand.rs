//! Operand resolution.
//!
//! A value code is resolved to a [`Location`] exactly once per instruction.
//! Resolution carries all of the side effects of the addressing mode:
//! consuming the word after PC for extended codes and moving SP for
//! PUSH/POP. The location is then read and, for instructions that produce a
//! result, written back without resolving the code a second time.

use crate::cpu::decode::Operand;
use crate::cpu::memory::Memory;
use crate::cpu::registers::{Register, Registers};
use serde::{Serialize, Deserialize};

/// A readable/writable place an operand refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Location {
    Register(Register),
    Memory(u16),
    Sp,
    Pc,
    Overflow,
    /// Writes are accepted and discarded.
    Literal(u16),
}

/// Advance PC and read the word it now points at.
fn next_word(regs: &mut Registers, mem: &Memory) -> u16 {
    let pc = regs.advance_pc();
    mem.read(pc)
}

/// Resolve an operand against the current state.
pub fn resolve(regs: &mut Registers, mem: &Memory, operand: Operand) -> Location {
    match operand {
        Operand::Register(r) => Location::Register(r),
        Operand::Indirect(r) => Location::Memory(regs.get(r)),
        Operand::IndirectOffset(r) => {
            let offset = next_word(regs, mem);
            Location::Memory(regs.get(r).wrapping_add(offset))
        }
        Operand::Pop => Location::Memory(regs.pop_sp()),
        Operand::Peek => Location::Memory(regs.sp),
        Operand::Push => Location::Memory(regs.push_sp()),
        Operand::Sp => Location::Sp,
        Operand::Pc => Location::Pc,
        Operand::Overflow => Location::Overflow,
        Operand::IndirectNextWord => Location::Memory(next_word(regs, mem)),
        Operand::NextWord => Location::Literal(next_word(regs, mem)),
        Operand::Literal(v) => Location::Literal(v),
    }
}

impl Location {
    pub fn read(self, regs: &Registers, mem: &Memory) -> u16 {
        match self {
            Location::Register(r) => regs.get(r),
            Location::Memory(addr) => mem.read(addr),
            Location::Sp => regs.sp,
            Location::Pc => regs.pc,
            Location::Overflow => regs.o as u16,
            Location::Literal(v) => v,
        }
    }

    pub fn write(self, regs: &mut Registers, mem: &mut Memory, value: u16) {
        match self {
            Location::Register(r) => regs.set(r, value),
            Location::Memory(addr) => mem.write(addr, value),
            Location::Sp => regs.sp = value,
            Location::Pc => regs.pc = value,
            Location::Overflow => regs.o = value != 0,
            Location::Literal(_) => {}
        }
    }

    /// Whether a write to this location is observable.
    pub fn is_writable(self) -> bool {
        !matches!(self, Location::Literal(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> (Registers, Memory) {
        (Registers::new(), Memory::new())
    }

    #[test]
    fn test_register_direct_has_no_side_effect() {
        let (mut regs, mem) = state();
        regs.set(Register::C, 42);

        let loc = resolve(&mut regs, &mem, Operand::Register(Register::C));
        assert_eq!(loc.read(&regs, &mem), 42);
        assert_eq!(regs.pc, 0);
    }

    #[test]
    fn test_register_indirect() {
        let (mut regs, mut mem) = state();
        regs.set(Register::B, 0x1000);
        mem.write(0x1000, 0xCAFE);

        let loc = resolve(&mut regs, &mem, Operand::Indirect(Register::B));
        assert_eq!(loc, Location::Memory(0x1000));
        assert_eq!(loc.read(&regs, &mem), 0xCAFE);
    }

    #[test]
    fn test_indirect_offset_consumes_next_word() {
        let (mut regs, mut mem) = state();
        regs.set(Register::I, 0xFFFF);
        mem.write(1, 0x0002);

        let loc = resolve(&mut regs, &mem, Operand::IndirectOffset(Register::I));
        // 0xFFFF + 2 wraps to 1
        assert_eq!(loc, Location::Memory(0x0001));
        assert_eq!(regs.pc, 1);
    }

    #[test]
    fn test_next_word_forms() {
        let (mut regs, mut mem) = state();
        mem.write(1, 0x2000);
        mem.write(2, 0x0030);
        mem.write(0x2000, 7);

        let ind = resolve(&mut regs, &mem, Operand::IndirectNextWord);
        let lit = resolve(&mut regs, &mem, Operand::NextWord);

        assert_eq!(ind.read(&regs, &mem), 7);
        assert_eq!(lit.read(&regs, &mem), 0x30);
        assert_eq!(regs.pc, 2);
    }

    #[test]
    fn test_stack_codes() {
        let (mut regs, mut mem) = state();

        let push = resolve(&mut regs, &mem, Operand::Push);
        assert_eq!(push, Location::Memory(0xFFFF));
        push.write(&mut regs, &mut mem, 5);

        let peek = resolve(&mut regs, &mem, Operand::Peek);
        assert_eq!(peek.read(&regs, &mem), 5);
        assert_eq!(regs.sp, 0xFFFF);

        let pop = resolve(&mut regs, &mem, Operand::Pop);
        assert_eq!(pop.read(&regs, &mem), 5);
        assert_eq!(regs.sp, 0);
    }

    #[test]
    fn test_literal_write_is_discarded() {
        let (mut regs, mut mem) = state();
        let before = (regs.clone(), mem.clone());

        let loc = resolve(&mut regs, &mem, Operand::Literal(17));
        loc.write(&mut regs, &mut mem, 99);

        assert!(!loc.is_writable());
        assert_eq!(loc.read(&regs, &mem), 17);
        assert_eq!((regs, mem), before);
    }

    #[test]
    fn test_special_registers() {
        let (mut regs, mut mem) = state();

        Location::Sp.write(&mut regs, &mut mem, 0x8000);
        Location::Pc.write(&mut regs, &mut mem, 0x0010);
        Location::Overflow.write(&mut regs, &mut mem, 2);

        assert_eq!(regs.sp, 0x8000);
        assert_eq!(regs.pc, 0x0010);
        assert_eq!(Location::Overflow.read(&regs, &mem), 1);
    }
}
