//! Top-level orchestration: source text in, binary + symbols out
//!
//! Wires the scanner, parser, two-pass interpreter, and writers together
//! the way `original_source/frontend/main.cc` drives the reference
//! implementation (scan -> parse -> interpret(2 passes) -> write), but
//! through one `assemble` entry point a CLI, a test, or another crate can
//! call directly without touching the pipeline's internals.

use std::rc::Rc;

use crate::error::{ErrorSink, LasmError};
use crate::instruction_set::InstructionSet;
use crate::instruction_set::{mos6502::Mos6502, w65c816::W65C816};
use crate::interpreter::Interpreter;
use crate::parser::Parser;
use crate::reader::{FsSourceReader, SourceReader};
use crate::scanner::Scanner;
use crate::token::SourceText;
use crate::writer::{write_binary, write_symbols, SymbolsSettings};

pub struct Settings {
    pub cpu: CpuTarget,
    pub hex_prefix: String,
    pub bin_prefix: String,
    pub delimiter: String,
    pub abort_on_error: bool,
    pub passes: u8,
}

impl Default for Settings {
    fn default() -> Settings {
        Settings {
            cpu: CpuTarget::Mos6502,
            hex_prefix: "0x".to_string(),
            bin_prefix: "0b".to_string(),
            delimiter: ".".to_string(),
            abort_on_error: false,
            passes: 2,
        }
    }
}

/// The CPU family targeted by `-c`. `Brainfuck` is a recognized name with
/// no backing plug-in (spec.md open question): it parses but `build()`
/// refuses to hand back an `InstructionSet`, so `assemble` raises
/// `BAD_CPU_TARGET` rather than pretending to assemble for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CpuTarget {
    Mos6502,
    W65C816,
    Brainfuck,
}

impl CpuTarget {
    pub fn parse(name: &str) -> Option<CpuTarget> {
        match name {
            "6502" => Some(CpuTarget::Mos6502),
            "65816" => Some(CpuTarget::W65C816),
            "bf" => Some(CpuTarget::Brainfuck),
            _ => None,
        }
    }

    fn build(self) -> Option<Rc<dyn InstructionSet>> {
        match self {
            CpuTarget::Mos6502 => Some(Mos6502::new()),
            CpuTarget::W65C816 => Some(W65C816::new()),
            CpuTarget::Brainfuck => None,
        }
    }
}

pub struct AssembledOutput {
    pub binary: Vec<u8>,
    pub symbols: String,
}

/// Runs the whole pipeline over in-memory source text. `reader` supplies
/// `include`/`incbin` with a filesystem (or, in tests, an in-memory stand-in).
pub fn assemble(source: &str, path: &str, reader: Rc<dyn SourceReader>, settings: &Settings) -> Result<AssembledOutput, LasmError> {
    let instructions = settings.cpu.build().ok_or_else(bad_cpu_target)?;

    let mut sink = ErrorSink::new(settings.abort_on_error);
    let source_text = SourceText::new(path, source);
    let tokens = Scanner::new(source_text, instructions.as_ref()).scan_tokens(&mut sink)?;
    let stmts = Parser::new(tokens, Rc::clone(&instructions)).parse(&mut sink)?;

    if sink.has_errors() {
        return Err(sink.errors.into_iter().next().expect("has_errors implies non-empty"));
    }

    let mut interpreter = Interpreter::new(Rc::clone(&instructions), reader);
    let code = interpreter.interpret(&stmts, settings.passes, &mut sink)?;

    if sink.has_errors() {
        return Err(sink.errors.into_iter().next().expect("has_errors implies non-empty"));
    }

    let binary = write_binary(&code);
    let symbols_settings = SymbolsSettings { hex_prefix: settings.hex_prefix.clone(), delimiter: settings.delimiter.clone() };
    let symbols = write_symbols(&interpreter.label_table, &interpreter.globals, &symbols_settings);

    Ok(AssembledOutput { binary, symbols })
}

/// Reads `path` off disk through a real [FsSourceReader] and assembles it.
pub fn assemble_from_file(path: &str, settings: &Settings) -> Result<AssembledOutput, LasmError> {
    let reader: Rc<dyn SourceReader> = Rc::new(FsSourceReader::new());
    let at = crate::token::Token::new(crate::token::TokenKind::Eof, "", crate::value::Value::Nil, 0, 0, crate::token::SourceText::new(path, ""));
    let text = reader.read_to_string(path, &at)?;
    assemble(&text, path, reader, settings)
}

fn bad_cpu_target() -> LasmError {
    let at = crate::token::Token::new(crate::token::TokenKind::Eof, "", crate::value::Value::Nil, 0, 0, crate::token::SourceText::new("", ""));
    LasmError::new(crate::error::ErrorKind::BadCpuTarget, at)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::MemorySourceReader;

    fn settings() -> Settings {
        Settings::default()
    }

    #[test]
    fn immediate_and_zeropage_and_labels() {
        let src = "adc #0xFF; test: let j = 20; let i = 100; cmp i;";
        let out = assemble(src, "t.asm", Rc::new(MemorySourceReader::new()), &settings()).unwrap();
        assert_eq!(out.binary, vec![0x69, 0xFF, 0xC5, 0x64]);
        assert!(out.symbols.contains("test = 0x2\n"));
        assert!(out.symbols.contains("i = 0x64\n"));
        assert!(out.symbols.contains("j = 0x14\n"));
    }

    #[test]
    fn org_include_incbin_and_builtins() {
        let reader = MemorySourceReader::new().with_file("inc.asm", "lda #0xFF; included_label: nop;").with_file("inc.bin", "Hello");
        let src = r#"org 0x8000; nop; include "inc.asm"; nop; incbin "inc.bin"; nop; db ord('a'), len("Hello"), len([1,2,3]);"#;
        let out = assemble(src, "t.asm", Rc::new(reader), &settings()).unwrap();
        let mut expected = vec![0xEA, 0xA9, 0xFF, 0xEA, 0xEA];
        expected.extend_from_slice(b"Hello");
        expected.extend_from_slice(&[0xEA, 0x61, 0x05, 0x03]);
        assert_eq!(out.binary, expected);
        assert!(out.symbols.contains("included_label = 0x8003\n"));
    }

    #[test]
    fn scope_naming_qualifies_nested_labels() {
        let src = r#"org 0x8000; scope1: { setScopeName("scopeName"); sublabel: { nop; } }"#;
        let out = assemble(src, "t.asm", Rc::new(MemorySourceReader::new()), &settings()).unwrap();
        assert_eq!(out.binary, vec![0xEA]);
        assert!(out.symbols.contains("scope1 = 0x8000\n"));
        assert!(out.symbols.contains("scopeName.sublabel = 0x8000\n"));
    }

    #[test]
    fn missing_comma_in_block_move() {
        let mut s = settings();
        s.cpu = CpuTarget::W65C816;
        let err = assemble("mvp 0x01;", "t.asm", Rc::new(MemorySourceReader::new()), &s).unwrap_err();
        assert_eq!(err.kind, crate::error::ErrorKind::MissingComma);
    }

    #[test]
    fn block_move_operand_type_error() {
        let mut s = settings();
        s.cpu = CpuTarget::W65C816;
        let err = assemble("mvp 'hi', 0x01;", "t.asm", Rc::new(MemorySourceReader::new()), &s).unwrap_err();
        assert_eq!(err.kind, crate::error::ErrorKind::TypeError);
    }

    #[test]
    fn relative_long_out_of_range() {
        let mut s = settings();
        s.cpu = CpuTarget::W65C816;
        let err = assemble("brl 32772;", "t.asm", Rc::new(MemorySourceReader::new()), &s).unwrap_err();
        assert_eq!(err.kind, crate::error::ErrorKind::ValueOutOfRange);
    }

    #[test]
    fn wide_immediate_tracks_accumulator_width() {
        let mut s = settings();
        s.cpu = CpuTarget::W65C816;
        let out = assemble("m16; adc #0xFFFF;", "t.asm", Rc::new(MemorySourceReader::new()), &s).unwrap();
        assert_eq!(out.binary, vec![0x69, 0xFF, 0xFF]);
        let out = assemble("m8; adc #0xFFFF;", "t.asm", Rc::new(MemorySourceReader::new()), &s).unwrap();
        assert_eq!(out.binary, vec![0x69, 0xFF]);
    }

    #[test]
    fn bad_cpu_target_is_rejected() {
        let mut s = settings();
        s.cpu = CpuTarget::Brainfuck;
        let err = assemble("nop;", "t.asm", Rc::new(MemorySourceReader::new()), &s).unwrap_err();
        assert_eq!(err.kind, crate::error::ErrorKind::BadCpuTarget);
    }
}
