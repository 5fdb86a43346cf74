//! Disassembler for DCPU-16 programs.
//!
//! Converts instruction words back to readable assembly.

use crate::cpu::decode::{decode, Instruction, Operand};
use crate::cpu::Memory;

/// Disassemble the instruction at `addr`.
///
/// Returns the text and the instruction length in words.
pub fn disassemble_at(mem: &Memory, addr: u16) -> (String, u16) {
    disassemble_with(addr, |a| mem.read(a))
}

/// Disassemble a slice of words, one instruction per line.
///
/// The instruction after an IFx is indented.
pub fn disassemble(words: &[u16]) -> String {
    let fetch = |a: u16| words.get(a as usize).copied().unwrap_or(0);

    let mut output = String::new();
    output.push_str("; DCPU-16 Disassembly\n");
    output.push_str("; -------------------\n\n");

    let mut addr = 0usize;
    let mut indent = false;
    while addr < words.len() {
        let (text, len) = disassemble_with(addr as u16, fetch);
        let text = if indent { format!("    {}", text) } else { text };
        let raw: Vec<String> = (0..len)
            .map(|i| format!("{:04x}", fetch((addr as u16).wrapping_add(i))))
            .collect();
        output.push_str(&format!("{:04x}: {:<30} ; {}\n", addr, text, raw.join(" ")));

        indent = decode(fetch(addr as u16)).map_or(false, |i| i.opcode.is_conditional());
        addr += len as usize;
    }

    output
}

fn disassemble_with<F: Fn(u16) -> u16>(addr: u16, fetch: F) -> (String, u16) {
    let word = fetch(addr);
    let instr = match decode(word) {
        Ok(instr) => instr,
        Err(_) => return (format!("DAT {:#06x}", word), 1),
    };

    let mut next = addr;
    let mut take = || {
        next = next.wrapping_add(1);
        fetch(next)
    };
    let a = format_operand(instr.a, &mut take);
    let b = format_operand(instr.b, &mut take);

    (format!("{} {}, {}", instr.opcode, a, b), instr.word_count())
}

/// Format one instruction whose extension words are already known.
pub fn format_instruction(instr: &Instruction, extension: &[u16]) -> String {
    let mut words = extension.iter().copied();
    let mut take = || words.next().unwrap_or(0);
    let a = format_operand(instr.a, &mut take);
    let b = format_operand(instr.b, &mut take);
    format!("{} {}, {}", instr.opcode, a, b)
}

fn format_operand<F: FnMut() -> u16>(operand: Operand, take: &mut F) -> String {
    match operand {
        Operand::Register(r) => r.to_string(),
        Operand::Indirect(r) => format!("[{}]", r),
        Operand::IndirectOffset(r) => format!("[{:#06x}+{}]", take(), r),
        Operand::Pop => "POP".to_string(),
        Operand::Peek => "PEEK".to_string(),
        Operand::Push => "PUSH".to_string(),
        Operand::Sp => "SP".to_string(),
        Operand::Pc => "PC".to_string(),
        Operand::Overflow => "O".to_string(),
        Operand::IndirectNextWord => format!("[{:#06x}]", take()),
        Operand::NextWord => format!("{:#06x}", take()),
        Operand::Literal(v) => format!("{:#x}", v),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disassemble_set_next_word() {
        let mut mem = Memory::new();
        mem.load_program(0, &[0x7c01, 0x0030]).unwrap();

        let (text, len) = disassemble_at(&mem, 0);
        assert_eq!(text, "SET A, 0x0030");
        assert_eq!(len, 2);
    }

    #[test]
    fn test_disassemble_indirect_forms() {
        // SET [0x1000+I], [A]
        let mut mem = Memory::new();
        mem.load_program(0, &[0x2161, 0x1000]).unwrap();

        let (text, len) = disassemble_at(&mem, 0);
        assert_eq!(text, "SET [0x1000+I], [A]");
        assert_eq!(len, 2);
    }

    #[test]
    fn test_disassemble_listing() {
        // SET PUSH, 7 ; SUB PC, 1
        let listing = disassemble(&[0x9da1, 0x85c3]);
        assert!(listing.contains("0000: SET PUSH, 0x7"));
        assert!(listing.contains("0001: SUB PC, 0x1"));
    }

    #[test]
    fn test_listing_indents_after_conditional() {
        // IFN A, 0x10 ; SET PC, 0 ; SET A, 1
        let listing = disassemble(&[0xc00d, 0x81c1, 0x8401]);
        assert!(listing.contains("0000: IFN A, 0x10 "));
        assert!(listing.contains("0001:     SET PC, 0x0"));
        assert!(listing.contains("0002: SET A, 0x1"));
    }

    #[test]
    fn test_format_instruction() {
        let instr = decode(0x7803).unwrap();
        assert_eq!(format_instruction(&instr, &[0x1000]), "SUB A, [0x1000]");
    }
}
