//! Program image formats.
//!
//! Two formats are understood:
//! - **Hex text** (`.hex`, `.txt`): whitespace separated 16-bit hex words,
//!   `;` starts a comment, blank lines are ignored.
//! - **Binary** (anything else): raw big-endian 16-bit words.

use crate::asm::disasm::format_instruction;
use crate::cpu::decode::decode;
use std::io::Write;
use std::path::Path;
use thiserror::Error;

/// On-disk layout of a program image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Hex,
    Binary,
}

impl ImageFormat {
    /// Pick a format from a file extension.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Self {
        match path.as_ref().extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("hex") || ext.eq_ignore_ascii_case("txt") => {
                ImageFormat::Hex
            }
            _ => ImageFormat::Binary,
        }
    }
}

/// Parse a hex text image.
pub fn parse_hex(text: &str) -> Result<Vec<u16>, ImageError> {
    let mut words = Vec::new();

    for (line_num, line) in text.lines().enumerate() {
        let line = match line.find(';') {
            Some(idx) => &line[..idx],
            None => line,
        };

        for token in line.split_whitespace() {
            let digits = token
                .strip_prefix("0x")
                .or_else(|| token.strip_prefix("0X"))
                .unwrap_or(token);
            let word = u16::from_str_radix(digits, 16).map_err(|_| ImageError::ParseError {
                line: line_num + 1,
                message: format!("invalid hex word: {}", token),
            })?;
            words.push(word);
        }
    }

    Ok(words)
}

/// Parse a big-endian binary image.
pub fn parse_binary(bytes: &[u8]) -> Result<Vec<u16>, ImageError> {
    if bytes.len() % 2 != 0 {
        return Err(ImageError::OddLength(bytes.len()));
    }
    Ok(bytes
        .chunks_exact(2)
        .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
        .collect())
}

/// Render words as a hex text image, one instruction per line with its
/// disassembly as a comment.
pub fn format_hex(words: &[u16]) -> String {
    let mut output = String::new();
    output.push_str("; DCPU-16 program image\n");
    output.push_str(&format!("; {} words\n\n", words.len()));

    let mut i = 0;
    while i < words.len() {
        let len = decode(words[i])
            .map(|instr| instr.word_count() as usize)
            .unwrap_or(1)
            .min(words.len() - i);
        let chunk = &words[i..i + len];
        let hex: Vec<String> = chunk.iter().map(|w| format!("{:04x}", w)).collect();
        let comment = decode(chunk[0])
            .map(|instr| format_instruction(&instr, &chunk[1..]))
            .unwrap_or_default();
        output.push_str(&format!("{:<15} ; {:04x}: {}\n", hex.join(" "), i, comment));
        i += len;
    }

    output
}

/// Load an image from disk, picking the format from the extension.
pub fn load_image<P: AsRef<Path>>(path: P) -> Result<Vec<u16>, ImageError> {
    let path = path.as_ref();
    match ImageFormat::from_path(path) {
        ImageFormat::Hex => {
            let text = std::fs::read_to_string(path).map_err(|e| ImageError::IoError(e.to_string()))?;
            parse_hex(&text)
        }
        ImageFormat::Binary => {
            let bytes = std::fs::read(path).map_err(|e| ImageError::IoError(e.to_string()))?;
            parse_binary(&bytes)
        }
    }
}

/// Save an image to disk, picking the format from the extension.
pub fn save_image<P: AsRef<Path>>(path: P, words: &[u16]) -> Result<(), ImageError> {
    let path = path.as_ref();
    let mut file = std::fs::File::create(path).map_err(|e| ImageError::IoError(e.to_string()))?;

    let result = match ImageFormat::from_path(path) {
        ImageFormat::Hex => file.write_all(format_hex(words).as_bytes()),
        ImageFormat::Binary => {
            let bytes: Vec<u8> = words.iter().flat_map(|w| w.to_be_bytes()).collect();
            file.write_all(&bytes)
        }
    };
    result.map_err(|e| ImageError::IoError(e.to_string()))
}

/// Errors that can occur while reading or writing images.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ImageError {
    #[error("I/O error: {0}")]
    IoError(String),

    #[error("parse error on line {line}: {message}")]
    ParseError { line: usize, message: String },

    #[error("binary image has odd length {0}")]
    OddLength(usize),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hex() {
        let text = "; header\n7c01 0030 ; SET A, 0x30\n\n0x7de1 1000 0020\n";
        assert_eq!(parse_hex(text).unwrap(), vec![0x7c01, 0x0030, 0x7de1, 0x1000, 0x0020]);
    }

    #[test]
    fn test_parse_hex_error_line() {
        let err = parse_hex("7c01\nzzzz").unwrap_err();
        assert!(matches!(err, ImageError::ParseError { line: 2, .. }));
    }

    #[test]
    fn test_parse_binary() {
        assert_eq!(parse_binary(&[0x7c, 0x01, 0x00, 0x30]).unwrap(), vec![0x7c01, 0x0030]);
        assert_eq!(parse_binary(&[0x7c]), Err(ImageError::OddLength(1)));
    }

    #[test]
    fn test_format_hex_reparses() {
        let words = [0x7c01, 0x0030, 0x85c3];
        let text = format_hex(&words);
        assert!(text.contains("SET A, 0x0030"));
        assert_eq!(parse_hex(&text).unwrap(), words);
    }

    #[test]
    fn test_format_from_path() {
        assert_eq!(ImageFormat::from_path("prog.HEX"), ImageFormat::Hex);
        assert_eq!(ImageFormat::from_path("prog.bin"), ImageFormat::Binary);
        assert_eq!(ImageFormat::from_path("prog"), ImageFormat::Binary);
    }

    #[test]
    fn test_save_and_load() {
        let dir = std::env::temp_dir();
        let words = [0x9da1, 0x85c3, 0xFFFF];

        for name in ["dcpu-image-test.hex", "dcpu-image-test.bin"] {
            let path = dir.join(format!("{}-{}", std::process::id(), name));
            save_image(&path, &words).unwrap();
            assert_eq!(load_image(&path).unwrap(), words);
            let _ = std::fs::remove_file(&path);
        }
    }
}
