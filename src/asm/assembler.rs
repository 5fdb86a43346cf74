//! Simple assembler for DCPU-16 programs.
//!
//! Syntax:
//! ```text
//! ; Comment
//! :loop               ; Define a label (`loop:` works too)
//!     SET A, 0x30     ; Small values become embedded literals
//!     SET [0x1000], 0x20
//!     SET [0x2000+I], [A]
//!     SET PUSH, A
//!     IFN A, 0x10
//!         SET PC, loop
//!     DAT 0x170, "hi"  ; Raw data words
//! ```
//!
//! Label references always assemble to a full extension word so that
//! instruction sizes are known in the first pass.

use crate::cpu::decode::{encode, Instruction, Opcode, Operand};
use crate::cpu::registers::Register;
use std::collections::HashMap;
use thiserror::Error;

/// Assemble source code to a list of words.
pub fn assemble(source: &str) -> Result<Vec<u16>, AssemblerError> {
    let mut asm = Assembler::new();
    asm.assemble(source)
}

/// A value that may not be known until every label has been seen.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Value {
    Number(u16),
    Label(String),
}

/// The assembler state.
struct Assembler {
    /// Symbol table (label -> address).
    symbols: HashMap<String, u16>,
    /// Pending references (output index, label, source line).
    pending: Vec<(usize, String, usize)>,
    /// Output words.
    output: Vec<u16>,
}

impl Assembler {
    fn new() -> Self {
        Self {
            symbols: HashMap::new(),
            pending: Vec::new(),
            output: Vec::new(),
        }
    }

    fn assemble(&mut self, source: &str) -> Result<Vec<u16>, AssemblerError> {
        // Pass 1: Collect labels and generate code
        for (line_num, line) in source.lines().enumerate() {
            self.process_line(line, line_num + 1)?;
        }

        // Pass 2: Resolve forward references
        self.resolve_references()?;

        Ok(std::mem::take(&mut self.output))
    }

    fn process_line(&mut self, line: &str, line_num: usize) -> Result<(), AssemblerError> {
        let mut line = strip_comment(line).trim();

        // `:label` prefix
        if let Some(rest) = line.strip_prefix(':') {
            let end = rest.find(char::is_whitespace).unwrap_or(rest.len());
            self.define_label(&rest[..end], line_num)?;
            line = rest[end..].trim();
        } else if let Some(colon) = line.find(':') {
            // `label:` prefix, but not inside a string
            let head = &line[..colon];
            if !head.contains('"') && !head.contains(char::is_whitespace) {
                self.define_label(head, line_num)?;
                line = line[colon + 1..].trim();
            }
        }

        if line.is_empty() {
            return Ok(());
        }

        self.process_instruction(line, line_num)
    }

    fn define_label(&mut self, label: &str, line_num: usize) -> Result<(), AssemblerError> {
        if !is_identifier(label) {
            return Err(AssemblerError::SyntaxError {
                line: line_num,
                message: format!("invalid label name: {}", label),
            });
        }
        let key = label.to_uppercase();
        if self.symbols.contains_key(&key) {
            return Err(AssemblerError::DuplicateLabel { line: line_num, label: key });
        }
        let addr = self.current_addr(line_num)?;
        self.symbols.insert(key, addr);
        Ok(())
    }

    fn process_instruction(&mut self, line: &str, line_num: usize) -> Result<(), AssemblerError> {
        let (mnemonic, rest) = match line.find(char::is_whitespace) {
            Some(idx) => (&line[..idx], line[idx..].trim()),
            None => (line, ""),
        };
        let mnemonic = mnemonic.to_uppercase();

        if mnemonic == "DAT" || mnemonic == "DATA" {
            return self.process_data(rest, line_num);
        }

        let opcode = Opcode::from_mnemonic(&mnemonic).ok_or_else(|| {
            AssemblerError::UnknownMnemonic { line: line_num, mnemonic: mnemonic.clone() }
        })?;

        let operands: Vec<&str> = rest.split(',').map(str::trim).collect();
        let (a_src, b_src) = match operands.as_slice() {
            [a, b] if !a.is_empty() && !b.is_empty() => (*a, *b),
            _ => {
                return Err(AssemblerError::SyntaxError {
                    line: line_num,
                    message: format!("{} takes two operands", mnemonic),
                })
            }
        };

        let (a, a_extra) = self.parse_operand(a_src, line_num)?;
        let (b, b_extra) = self.parse_operand(b_src, line_num)?;

        self.emit(encode(&Instruction::new(opcode, a, b)));
        for extra in [a_extra, b_extra].into_iter().flatten() {
            self.emit_value(extra, line_num);
        }

        Ok(())
    }

    fn process_data(&mut self, rest: &str, line_num: usize) -> Result<(), AssemblerError> {
        if rest.is_empty() {
            return Err(AssemblerError::SyntaxError {
                line: line_num,
                message: "DAT requires a value".into(),
            });
        }

        for item in split_data(rest) {
            if let Some(text) = item.strip_prefix('"').and_then(|s| s.strip_suffix('"')) {
                for c in text.chars() {
                    self.emit(c as u32 as u16);
                }
            } else {
                let value = self.parse_value(item, line_num)?;
                self.emit_value(value, line_num);
            }
        }

        Ok(())
    }

    /// Parse an operand into its value code and optional extension word.
    fn parse_operand(&self, src: &str, line_num: usize) -> Result<(Operand, Option<Value>), AssemblerError> {
        let upper = src.to_uppercase();

        if let Some(inner) = upper.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
            let inner = inner.trim();

            if let Some((left, right)) = inner.split_once('+') {
                let (left, right) = (left.trim(), right.trim());
                let (reg, offset) = match (left.parse::<Register>(), right.parse::<Register>()) {
                    (Ok(reg), Err(_)) => (reg, right),
                    (Err(_), Ok(reg)) => (reg, left),
                    _ => {
                        return Err(AssemblerError::InvalidOperand {
                            line: line_num,
                            operand: src.to_string(),
                        })
                    }
                };
                let offset = self.parse_value(offset, line_num)?;
                return Ok((Operand::IndirectOffset(reg), Some(offset)));
            }

            if let Ok(reg) = inner.parse::<Register>() {
                return Ok((Operand::Indirect(reg), None));
            }

            let addr = self.parse_value(inner, line_num)?;
            return Ok((Operand::IndirectNextWord, Some(addr)));
        }

        let operand = match upper.as_str() {
            "POP" => Operand::Pop,
            "PEEK" => Operand::Peek,
            "PUSH" => Operand::Push,
            "SP" => Operand::Sp,
            "PC" => Operand::Pc,
            "O" => Operand::Overflow,
            _ => {
                if let Ok(reg) = upper.parse::<Register>() {
                    return Ok((Operand::Register(reg), None));
                }
                return match self.parse_value(&upper, line_num)? {
                    Value::Number(n) if n <= 0x1f => Ok((Operand::Literal(n), None)),
                    value => Ok((Operand::NextWord, Some(value))),
                };
            }
        };
        Ok((operand, None))
    }

    fn parse_value(&self, src: &str, line_num: usize) -> Result<Value, AssemblerError> {
        let src = src.trim();
        let lower = src.to_lowercase();

        let parsed = if let Some(hex) = lower.strip_prefix("0x") {
            Some(i64::from_str_radix(hex, 16))
        } else if let Some(bin) = lower.strip_prefix("0b") {
            Some(i64::from_str_radix(bin, 2))
        } else if src.starts_with(|c: char| c.is_ascii_digit() || c == '-') {
            Some(src.parse::<i64>())
        } else {
            None
        };

        match parsed {
            Some(Ok(n)) if (-0x8000..=0xFFFF).contains(&n) => Ok(Value::Number(n as u16)),
            Some(Ok(n)) => Err(AssemblerError::ValueOutOfRange { line: line_num, value: n }),
            Some(Err(_)) => Err(AssemblerError::SyntaxError {
                line: line_num,
                message: format!("invalid number: {}", src),
            }),
            None if is_identifier(src) => Ok(Value::Label(src.to_uppercase())),
            None => Err(AssemblerError::InvalidOperand {
                line: line_num,
                operand: src.to_string(),
            }),
        }
    }

    fn current_addr(&self, line_num: usize) -> Result<u16, AssemblerError> {
        u16::try_from(self.output.len()).map_err(|_| AssemblerError::ProgramTooLarge { line: line_num })
    }

    fn emit(&mut self, word: u16) {
        self.output.push(word);
    }

    fn emit_value(&mut self, value: Value, line_num: usize) {
        match value {
            Value::Number(n) => self.emit(n),
            Value::Label(label) => {
                self.pending.push((self.output.len(), label, line_num));
                // Placeholder, resolved in pass 2
                self.emit(0);
            }
        }
    }

    fn resolve_references(&mut self) -> Result<(), AssemblerError> {
        for (out_idx, label, line_num) in &self.pending {
            let addr = self.symbols.get(label).ok_or_else(|| AssemblerError::UndefinedLabel {
                line: *line_num,
                label: label.clone(),
            })?;
            self.output[*out_idx] = *addr;
        }
        if self.output.len() > crate::cpu::memory::MEMORY_SIZE {
            return Err(AssemblerError::ProgramTooLarge { line: 0 });
        }
        Ok(())
    }
}

fn strip_comment(line: &str) -> &str {
    let mut in_string = false;
    for (i, c) in line.char_indices() {
        match c {
            '"' => in_string = !in_string,
            ';' if !in_string => return &line[..i],
            _ => {}
        }
    }
    line
}

/// Split DAT arguments on commas outside string literals.
fn split_data(rest: &str) -> Vec<&str> {
    let mut items = Vec::new();
    let mut in_string = false;
    let mut start = 0;
    for (i, c) in rest.char_indices() {
        match c {
            '"' => in_string = !in_string,
            ',' if !in_string => {
                items.push(rest[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    items.push(rest[start..].trim());
    items
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
}

/// Errors that can occur during assembly.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AssemblerError {
    #[error("syntax error on line {line}: {message}")]
    SyntaxError { line: usize, message: String },

    #[error("unknown mnemonic on line {line}: {mnemonic}")]
    UnknownMnemonic { line: usize, mnemonic: String },

    #[error("invalid operand on line {line}: {operand}")]
    InvalidOperand { line: usize, operand: String },

    #[error("undefined label on line {line}: {label}")]
    UndefinedLabel { line: usize, label: String },

    #[error("duplicate label on line {line}: {label}")]
    DuplicateLabel { line: usize, label: String },

    #[error("value out of range on line {line}: {value}")]
    ValueOutOfRange { line: usize, value: i64 },

    #[error("program does not fit in memory (line {line})")]
    ProgramTooLarge { line: usize },
}
