//! End-to-end programs run through the public API.

use dcpu::cpu::decode::{encode, Instruction, Opcode, Operand};
use dcpu::{assemble, Cpu, Register};

fn word(opcode: Opcode, a: Operand, b: Operand) -> u16 {
    encode(&Instruction::new(opcode, a, b))
}

#[test]
fn test_add_literal_to_register() {
    let mut cpu = Cpu::new();
    cpu.set_register(Register::A, 5);
    cpu.set_memory(0, word(Opcode::Add, Operand::Register(Register::A), Operand::Literal(3)));
    assert_eq!(cpu.memory(0), (35 << 10) | 0x2);

    cpu.tick().unwrap();

    assert_eq!(cpu.register(Register::A), 8);
    assert!(!cpu.overflow());
    assert_eq!(cpu.pc(), 1);
}

#[test]
fn test_failed_ifg_skips_one_word() {
    let mut cpu = Cpu::new();
    cpu.set_register(Register::A, 5);
    cpu.set_memory(0, word(Opcode::Ifg, Operand::Register(Register::A), Operand::Literal(10)));
    assert_eq!(cpu.memory(0), (42 << 10) | 0xE);

    cpu.tick().unwrap();

    assert_eq!(cpu.pc(), 2);
}

#[test]
fn test_push_push_pop_pop() {
    let program = assemble(
        "SET PUSH, 7
         SET PUSH, 9
         SET A, POP
         SET B, POP",
    )
    .unwrap();
    let mut cpu = Cpu::new();
    cpu.load(&program, 0).unwrap();

    cpu.run_limited(2).unwrap();
    assert_eq!(cpu.sp(), 0xFFFE);
    assert_eq!(cpu.memory(0xFFFF), 7);
    assert_eq!(cpu.memory(0xFFFE), 9);

    cpu.run_limited(2).unwrap();
    assert_eq!(cpu.register(Register::A), 9);
    assert_eq!(cpu.register(Register::B), 7);
    assert_eq!(cpu.sp(), 0);
}

#[test]
fn test_loop_counts_down() {
    // SET PC, x lands on x + 1, so jumping to 0 resumes at the ADD
    let program = assemble(
        "SET I, 5
         ADD A, 2
         SUB I, 1
         IFN I, 0
         SET PC, 0
         SUB PC, 1",
    )
    .unwrap();
    let mut cpu = Cpu::new();
    cpu.load(&program, 0).unwrap();

    // 1 setup + 4 passes of 4 + a final pass of 3
    cpu.run_limited(20).unwrap();
    assert_eq!(cpu.pc(), 5);
    assert_eq!(cpu.register(Register::A), 10);
    assert_eq!(cpu.register(Register::I), 0);

    cpu.run_limited(5).unwrap();
    assert_eq!(cpu.pc(), 5);
    assert_eq!(cpu.register(Register::A), 10);
}

#[test]
fn test_overflow_chain() {
    let program = assemble(
        "SET A, 0xffff
         ADD A, 1
         SET B, O
         ADD B, 1
         SET C, O",
    )
    .unwrap();
    let mut cpu = Cpu::new();
    cpu.load(&program, 0).unwrap();
    cpu.run_limited(5).unwrap();

    assert_eq!(cpu.register(Register::A), 0);
    assert_eq!(cpu.register(Register::B), 2);
    assert_eq!(cpu.register(Register::C), 0);
}

#[test]
fn test_sub_pc_halts_in_place() {
    let program = assemble("SET A, 1\nSUB PC, 1").unwrap();
    let mut cpu = Cpu::new();
    cpu.load(&program, 0).unwrap();

    cpu.run_limited(10).unwrap();

    assert_eq!(cpu.pc(), 1);
    assert_eq!(cpu.cycles, 10);
}

#[test]
fn test_load_at_base_address() {
    let program = assemble("SET A, 0x1234").unwrap();
    let mut cpu = Cpu::new();
    cpu.load(&program, 0x100).unwrap();
    cpu.set_pc(0x100);

    cpu.tick().unwrap();

    assert_eq!(cpu.register(Register::A), 0x1234);
    assert_eq!(cpu.pc(), 0x102);
}
