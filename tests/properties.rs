//! Property tests for arithmetic, addressing and the stack.

use dcpu::cpu::decode::{decode, encode, Instruction, Opcode, Operand};
use dcpu::{Cpu, Register};
use proptest::prelude::*;

/// Run one `op A, B` with the given register values.
fn binary_op(opcode: Opcode, a: u16, b: u16) -> Cpu {
    let mut cpu = Cpu::new();
    cpu.set_register(Register::A, a);
    cpu.set_register(Register::B, b);
    cpu.set_memory(
        0,
        encode(&Instruction::new(
            opcode,
            Operand::Register(Register::A),
            Operand::Register(Register::B),
        )),
    );
    cpu.tick().unwrap();
    cpu
}

proptest! {
    #[test]
    fn add_wraps_and_flags_carry(a: u16, b: u16) {
        let cpu = binary_op(Opcode::Add, a, b);
        let full = a as u32 + b as u32;
        prop_assert_eq!(cpu.register(Register::A), full as u16);
        prop_assert_eq!(cpu.overflow(), full > 0xFFFF);
    }

    #[test]
    fn sub_wraps_and_flags_borrow(a: u16, b: u16) {
        let cpu = binary_op(Opcode::Sub, a, b);
        prop_assert_eq!(cpu.register(Register::A), a.wrapping_sub(b));
        prop_assert_eq!(cpu.overflow(), b > a);
    }

    #[test]
    fn mul_keeps_low_word(a: u16, b: u16) {
        let cpu = binary_op(Opcode::Mul, a, b);
        let full = a as u32 * b as u32;
        prop_assert_eq!(cpu.register(Register::A), full as u16);
        prop_assert_eq!(cpu.overflow(), full > 0xFFFF);
    }

    #[test]
    fn div_and_mod_are_unsigned(a: u16, b in 1u16..) {
        let div = binary_op(Opcode::Div, a, b);
        prop_assert_eq!(div.register(Register::A), a / b);
        prop_assert!(!div.overflow());

        let rem = binary_op(Opcode::Mod, a, b);
        prop_assert_eq!(rem.register(Register::A), a % b);
        prop_assert!(!rem.overflow());
    }

    #[test]
    fn division_by_zero_yields_zero(a: u16) {
        let div = binary_op(Opcode::Div, a, 0);
        prop_assert_eq!(div.register(Register::A), 0);
        prop_assert!(div.overflow());

        let rem = binary_op(Opcode::Mod, a, 0);
        prop_assert_eq!(rem.register(Register::A), 0);
        prop_assert!(!rem.overflow());
    }

    #[test]
    fn shl_flags_bits_shifted_out(a: u16, b: u16) {
        let cpu = binary_op(Opcode::Shl, a, b);
        let (value, out_of_range) = if b < 32 {
            let full = (a as u64) << b;
            (full as u16, full > 0xFFFF)
        } else {
            (0, a != 0)
        };
        prop_assert_eq!(cpu.register(Register::A), value);
        prop_assert_eq!(cpu.overflow(), out_of_range);
    }

    #[test]
    fn shr_never_overflows(a: u16, b: u16) {
        let cpu = binary_op(Opcode::Shr, a, b);
        let expected = if b < 16 { a >> b } else { 0 };
        prop_assert_eq!(cpu.register(Register::A), expected);
        prop_assert!(!cpu.overflow());
    }

    #[test]
    fn conditionals_leave_overflow_alone(a: u16, b: u16, o: bool) {
        for (opcode, taken) in [
            (Opcode::Ife, a == b),
            (Opcode::Ifn, a != b),
            (Opcode::Ifg, a > b),
            (Opcode::Ifb, a & b != 0),
        ] {
            let mut cpu = Cpu::new();
            cpu.set_register(Register::A, a);
            cpu.set_register(Register::B, b);
            cpu.set_overflow(o);
            cpu.set_memory(0, encode(&Instruction::new(
                opcode,
                Operand::Register(Register::A),
                Operand::Register(Register::B),
            )));
            cpu.tick().unwrap();
            prop_assert_eq!(cpu.pc(), if taken { 1 } else { 2 });
            prop_assert_eq!(cpu.register(Register::A), a);
            prop_assert_eq!(cpu.overflow(), o);
        }
    }

    #[test]
    fn bitwise_leaves_overflow_alone(a: u16, b: u16, o: bool) {
        for (opcode, expected) in [
            (Opcode::And, a & b),
            (Opcode::Bor, a | b),
            (Opcode::Xor, a ^ b),
            (Opcode::Set, b),
        ] {
            let mut cpu = Cpu::new();
            cpu.set_register(Register::A, a);
            cpu.set_register(Register::B, b);
            cpu.set_overflow(o);
            cpu.set_memory(0, encode(&Instruction::new(
                opcode,
                Operand::Register(Register::A),
                Operand::Register(Register::B),
            )));
            cpu.tick().unwrap();
            prop_assert_eq!(cpu.register(Register::A), expected);
            prop_assert_eq!(cpu.overflow(), o);
        }
    }

    #[test]
    fn pc_wraps_at_end_of_memory(pc: u16) {
        let mut cpu = Cpu::new();
        cpu.set_pc(pc);
        cpu.tick().unwrap();
        prop_assert_eq!(cpu.pc(), pc.wrapping_add(1));
    }

    #[test]
    fn indexed_address_wraps(base: u16, offset: u16, value: u16) {
        let mut cpu = Cpu::new();
        cpu.set_register(Register::I, offset);
        cpu.set_register(Register::A, value);
        cpu.set_memory(0, encode(&Instruction::new(
            Opcode::Set,
            Operand::IndirectOffset(Register::I),
            Operand::Register(Register::A),
        )));
        cpu.set_memory(1, base);
        cpu.tick().unwrap();

        prop_assert_eq!(cpu.memory(base.wrapping_add(offset)), value);
        prop_assert_eq!(cpu.pc(), 2);
    }

    #[test]
    fn stack_is_lifo(values in proptest::collection::vec(any::<u16>(), 1..32)) {
        let mut cpu = Cpu::new();
        let push = encode(&Instruction::new(Opcode::Set, Operand::Push, Operand::Register(Register::A)));
        let pop = encode(&Instruction::new(Opcode::Set, Operand::Register(Register::B), Operand::Pop));
        cpu.set_memory(0, push);
        cpu.set_memory(1, pop);

        for &v in &values {
            cpu.set_pc(0);
            cpu.set_register(Register::A, v);
            cpu.tick().unwrap();
        }
        prop_assert_eq!(cpu.sp(), 0u16.wrapping_sub(values.len() as u16));

        for &v in values.iter().rev() {
            cpu.set_pc(1);
            cpu.tick().unwrap();
            prop_assert_eq!(cpu.register(Register::B), v);
        }
        prop_assert_eq!(cpu.sp(), 0);
    }

    #[test]
    fn decode_is_total_and_reversible(word: u16) {
        let instr = decode(word).unwrap();
        prop_assert_eq!(encode(&instr), word);
    }
}
