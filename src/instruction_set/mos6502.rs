//! The 6502 reference CPU plug-in
//!
//! One shared [InstructionInfo] per mnemonic, populated at construction
//! time with every addressing mode the mnemonic legally supports (spec.md
//! §3: "multiple addressing-mode parsers may vote into the same info").
//! A single [Mos6502OperandParser] per mnemonic sniffs the operand syntax
//! actually present (`#`, `[ ]`, a bare expression, or nothing) and decides
//! the one addressing mode that syntax can mean. Zeropage vs. absolute for
//! a bare expression is the one genuine ambiguity: a literal settles it at
//! parse time (its value is already known), but a variable or label can't
//! be sized until it resolves, so the parser leaves it tagged `auto` and
//! [Mos6502Generator] settles it the first time it runs, from the
//! evaluated operand, then freezes the decision into the statement so a
//! later pass can't pick a different size (spec.md §4.3, "size
//! discipline").
//!
//! Grounded on `original_source/src/instruction6502.h`/`.cc`'s per-mnemonic
//! `InstructionParser6502*` fluent builders, collapsed into one data-driven
//! parser plus opcode tables instead of one class per mnemonic.

use std::cell::Cell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::error::{ErrorKind, LasmError};
use crate::expr::Expr;
use crate::instruction_set::{
    resolve_operand_int, AddressingModeParser, InstructionCall, InstructionGenerator, InstructionInfo, InstructionRegistry, InstructionResult, InstructionSet,
};
use crate::interpreter::Interpreter;
use crate::parser::Parser;
use crate::stmt::Stmt;
use crate::token::{Token, TokenKind};
use crate::value::{Unwind, Value};

pub struct Mos6502 {
    registry: InstructionRegistry,
}

impl Mos6502 {
    pub fn new() -> Rc<Mos6502> {
        let mut registry = InstructionRegistry::new(8);
        let mut infos: HashMap<String, Rc<InstructionInfo>> = HashMap::new();
        let generator: Rc<dyn InstructionGenerator> = Rc::new(Mos6502Generator);

        let info_for = |infos: &mut HashMap<String, Rc<InstructionInfo>>, mnemonic: &str| -> Rc<InstructionInfo> {
            infos.entry(mnemonic.to_string()).or_insert_with(|| Rc::new(InstructionInfo::new(Rc::clone(&generator)))).clone()
        };

        for &(mnemonic, opcode) in IMPLIED {
            let info = info_for(&mut infos, mnemonic);
            info.add_opcode("impl", opcode);
            register(&mut registry, mnemonic, &info, OperandShape::Implied);
        }
        for &(mnemonic, opcode) in RELATIVE {
            let info = info_for(&mut infos, mnemonic);
            info.add_opcode("rel", opcode);
            register(&mut registry, mnemonic, &info, OperandShape::Relative);
        }
        for &(mnemonic, opcode) in IMMEDIATE {
            let info = info_for(&mut infos, mnemonic);
            info.add_opcode("imm", opcode);
        }
        for &(mnemonic, opcode) in ZP {
            let info = info_for(&mut infos, mnemonic);
            info.add_opcode("zp", opcode);
        }
        for &(mnemonic, opcode) in ZPX {
            let info = info_for(&mut infos, mnemonic);
            info.add_opcode("zpx", opcode);
        }
        for &(mnemonic, opcode) in ZPY {
            let info = info_for(&mut infos, mnemonic);
            info.add_opcode("zpy", opcode);
        }
        for &(mnemonic, opcode) in ABS {
            let info = info_for(&mut infos, mnemonic);
            info.add_opcode("abs", opcode);
        }
        for &(mnemonic, opcode) in ABSX {
            let info = info_for(&mut infos, mnemonic);
            info.add_opcode("absx", opcode);
        }
        for &(mnemonic, opcode) in ABSY {
            let info = info_for(&mut infos, mnemonic);
            info.add_opcode("absy", opcode);
        }
        for &(mnemonic, opcode) in INDX {
            let info = info_for(&mut infos, mnemonic);
            info.add_opcode("indx", opcode);
        }
        for &(mnemonic, opcode) in INDY {
            let info = info_for(&mut infos, mnemonic);
            info.add_opcode("indy", opcode);
        }
        for &(mnemonic, opcode) in IND {
            let info = info_for(&mut infos, mnemonic);
            info.add_opcode("ind", opcode);
        }

        // Every mnemonic touched by imm/zp/abs/ind families (everything
        // except implied and relative, already registered above) shares one
        // operand-sniffing parser.
        let mut seen: std::collections::HashSet<&str> = std::collections::HashSet::new();
        for table in [IMMEDIATE, ZP, ZPX, ZPY, ABS, ABSX, ABSY, INDX, INDY, IND] {
            for &(mnemonic, _) in table {
                if seen.insert(mnemonic) {
                    let info = info_for(&mut infos, mnemonic);
                    register(&mut registry, mnemonic, &info, OperandShape::Operand);
                }
            }
        }

        Rc::new(Mos6502 { registry })
    }
}

enum OperandShape {
    Implied,
    Relative,
    Operand,
}

fn register(registry: &mut InstructionRegistry, mnemonic: &str, info: &Rc<InstructionInfo>, shape: OperandShape) {
    let parser: Rc<dyn AddressingModeParser> = Rc::new(Mos6502OperandParser { info: Rc::clone(info), shape });
    registry.register(mnemonic, parser);
}

impl InstructionSet for Mos6502 {
    fn is_instruction(&self, name: &str) -> bool {
        self.registry.mnemonics.contains_key(&name.to_lowercase())
    }

    fn is_directive(&self, name: &str) -> bool {
        self.registry.directives.contains_key(&name.to_lowercase())
    }

    fn parse_instruction(&self, parser: &mut Parser, name: Token, width: Option<&str>) -> Result<Stmt, LasmError> {
        let key = name.lexeme.to_lowercase();
        let candidates = self.registry.mnemonics.get(&key).ok_or_else(|| LasmError::new(ErrorKind::InvalidInstruction, name.clone()))?;
        for candidate in candidates {
            if let Some(stmt) = candidate.try_parse(parser, name.clone(), width)? {
                return Ok(stmt);
            }
        }
        Err(LasmError::new(ErrorKind::InvalidInstruction, name))
    }

    fn parse_directive(&self, parser: &mut Parser, name: Token) -> Result<Stmt, LasmError> {
        let key = name.lexeme.to_lowercase();
        let handler = self.registry.directives.get(&key).ok_or_else(|| LasmError::new(ErrorKind::InvalidInstruction, name.clone()))?.clone();
        let args = handler.parse_args(parser, &name)?;
        Ok(Stmt::Directive { name, args, handler })
    }

    fn set_bits(&self, n: u8) {
        self.registry.bits.set(n);
    }

    fn bits(&self) -> u8 {
        self.registry.bits.get()
    }
}

/// Sniffs `#expr` / `[expr(, x)?]` / `expr(, x|y)?` / nothing and settles on
/// one addressing mode, falling back between zeropage and absolute when the
/// mnemonic's opcode table doesn't have the syntax-implied width but does
/// have the other one (e.g. a label reference defaults to absolute but the
/// mnemonic only has a zeropage form).
struct Mos6502OperandParser {
    info: Rc<InstructionInfo>,
    shape: OperandShape,
}

impl AddressingModeParser for Mos6502OperandParser {
    fn try_parse(&self, parser: &mut Parser, name: Token, width: Option<&str>) -> Result<Option<Stmt>, LasmError> {
        match self.shape {
            OperandShape::Implied => {
                parser.consume(TokenKind::Semicolon, ErrorKind::MissingSemicolon)?;
                Ok(Some(build(name, Rc::clone(&self.info), vec![], "impl")))
            }
            OperandShape::Relative => {
                let target = parser.expression()?;
                parser.consume(TokenKind::Semicolon, ErrorKind::MissingSemicolon)?;
                Ok(Some(build(name, Rc::clone(&self.info), vec![target], "rel")))
            }
            OperandShape::Operand => self.parse_operand(parser, name, width),
        }
    }
}

impl Mos6502OperandParser {
    fn parse_operand(&self, parser: &mut Parser, name: Token, width: Option<&str>) -> Result<Option<Stmt>, LasmError> {
        if parser.check(TokenKind::Hash) {
            parser.advance();
            let operand = parser.expression()?;
            parser.consume(TokenKind::Semicolon, ErrorKind::MissingSemicolon)?;
            return Ok(Some(build(name, Rc::clone(&self.info), vec![operand], "imm")));
        }

        if parser.check(TokenKind::LeftBracket) {
            parser.advance();
            let operand = parser.expression()?;
            if parser.match_any(&[TokenKind::Comma]) {
                consume_register(parser, "x")?;
                parser.consume(TokenKind::RightBracket, ErrorKind::MissingBracket)?;
                parser.consume(TokenKind::Semicolon, ErrorKind::MissingSemicolon)?;
                return Ok(Some(build(name, Rc::clone(&self.info), vec![operand], "indx")));
            }
            parser.consume(TokenKind::RightBracket, ErrorKind::MissingBracket)?;
            if parser.match_any(&[TokenKind::Comma]) {
                consume_register(parser, "y")?;
                parser.consume(TokenKind::Semicolon, ErrorKind::MissingSemicolon)?;
                return Ok(Some(build(name, Rc::clone(&self.info), vec![operand], "indy")));
            }
            parser.consume(TokenKind::Semicolon, ErrorKind::MissingSemicolon)?;
            return Ok(Some(build(name, Rc::clone(&self.info), vec![operand], "ind")));
        }

        if matches!(width, Some("l") | Some("i")) {
            return Err(LasmError::new(ErrorKind::InvalidInstruction, name));
        }

        let operand = parser.expression()?;
        let mut mode = match width {
            Some("z") => "zp",
            Some("w") => "abs",
            Some(_) => return Err(LasmError::new(ErrorKind::InvalidInstruction, name)),
            None => initial_category(&operand),
        };

        if parser.match_any(&[TokenKind::Comma]) {
            let reg = parser.consume(TokenKind::Identifier, ErrorKind::UnexpectedToken)?;
            mode = match (mode, reg.lexeme.as_str()) {
                ("zp", "x") => "zpx",
                ("zp", "y") => "zpy",
                ("abs", "x") => "absx",
                ("abs", "y") => "absy",
                ("auto", "x") => "autox",
                ("auto", "y") => "autoy",
                _ => return Err(LasmError::new(ErrorKind::UnexpectedToken, reg)),
            };
        }
        parser.consume(TokenKind::Semicolon, ErrorKind::MissingSemicolon)?;

        if matches!(mode, "auto" | "autox" | "autoy") {
            // Deferred to generate time (see `Mos6502Generator::generate_auto`);
            // just make sure the mnemonic supports at least one of the two
            // widths this register combination could resolve to.
            let (zp_mode, abs_mode) = auto_family(mode);
            if self.info.opcode(zp_mode).is_none() && self.info.opcode(abs_mode).is_none() {
                return Err(LasmError::new(ErrorKind::InvalidInstruction, name));
            }
            return Ok(Some(build(name, Rc::clone(&self.info), vec![operand], mode)));
        }

        if self.info.opcode(mode).is_none() {
            if let Some(fallback) = fallback_mode(mode) {
                if self.info.opcode(fallback).is_some() {
                    mode = fallback;
                }
            }
        }
        if self.info.opcode(mode).is_none() {
            return Err(LasmError::new(ErrorKind::InvalidInstruction, name));
        }
        Ok(Some(build(name, Rc::clone(&self.info), vec![operand], mode)))
    }
}

fn consume_register(parser: &mut Parser, expected: &str) -> Result<(), LasmError> {
    let reg = parser.consume(TokenKind::Identifier, ErrorKind::UnexpectedToken)?;
    if reg.lexeme != expected {
        return Err(LasmError::new(ErrorKind::UnexpectedToken, reg));
    }
    Ok(())
}

/// A bare integer literal settles zeropage vs. absolute immediately, since
/// its value never changes between passes. Anything else (a variable or a
/// label) is left as `auto`/`autox`/`autoy`, a provisional tag the
/// generator resolves from the evaluated operand the first time it runs
/// (spec.md §4.3).
fn initial_category(expr: &Expr) -> &'static str {
    match expr {
        Expr::Literal(Value::Integer(n)) if *n >= 0 && *n <= 0xFF => "zp",
        Expr::Literal(Value::Integer(_)) | Expr::Literal(Value::Real(_)) => "abs",
        _ => "auto",
    }
}

/// The (zeropage, absolute) mode-tag pair an `auto` family resolves between.
fn auto_family(mode: &str) -> (&'static str, &'static str) {
    match mode {
        "auto" => ("zp", "abs"),
        "autox" => ("zpx", "absx"),
        "autoy" => ("zpy", "absy"),
        _ => unreachable!("auto_family called with a non-auto mode: {mode}"),
    }
}

fn fallback_mode(mode: &str) -> Option<&'static str> {
    Some(match mode {
        "zp" => "abs",
        "abs" => "zp",
        "zpx" => "absx",
        "absx" => "zpx",
        "zpy" => "absy",
        "absy" => "zpy",
        _ => return None,
    })
}

fn build(name: Token, info: Rc<InstructionInfo>, args: Vec<Expr>, mode: &'static str) -> Stmt {
    Stmt::Instruction { name, info, args, mode: Cell::new(mode), fully_resolved: Cell::new(true) }
}

fn evaluate_operand(interp: &mut Interpreter, expr: &Expr, token: &Token) -> Result<Value, LasmError> {
    match interp.evaluate(expr) {
        Ok(v) => Ok(v),
        Err(Unwind::Error(e)) => Err(e),
        Err(Unwind::Return(_)) => Err(LasmError::new(ErrorKind::ReturnOutsideFunction, token.clone())),
    }
}

struct Mos6502Generator;

impl InstructionGenerator for Mos6502Generator {
    fn generate(&self, interp: &mut Interpreter, info: &InstructionInfo, call: &InstructionCall) -> Result<InstructionResult, LasmError> {
        let mode = call.mode.get();
        if matches!(mode, "auto" | "autox" | "autoy") {
            return self.generate_auto(interp, info, call, mode);
        }

        let opcode = info.opcode(mode).ok_or_else(|| LasmError::new(ErrorKind::InvalidInstruction, call.name.clone()))?;
        let address = interp.address;
        let mut bytes = vec![opcode];

        match mode {
            "impl" => {}
            "rel" => {
                let target = resolve_operand_int(interp, &call.args[0], call.name)?;
                let next = address as i64 + 2;
                let disp = target - next;
                if !(-128..=127).contains(&disp) {
                    return Err(LasmError::new(ErrorKind::ValueOutOfRange, call.name.clone()));
                }
                bytes.push(disp as i8 as u8);
            }
            "imm" | "zp" | "zpx" | "zpy" | "indx" | "indy" => {
                let v = resolve_operand_int(interp, &call.args[0], call.name)?;
                bytes.push((v & 0xFF) as u8);
            }
            "abs" | "absx" | "absy" | "ind" => {
                let v = resolve_operand_int(interp, &call.args[0], call.name)?;
                bytes.push((v & 0xFF) as u8);
                bytes.push(((v >> 8) & 0xFF) as u8);
            }
            _ => return Err(LasmError::new(ErrorKind::InvalidInstruction, call.name.clone())),
        }

        interp.address += bytes.len() as u64;
        Ok(InstructionResult { bytes, address, token: call.name.clone() })
    }
}

impl Mos6502Generator {
    /// Resolves a provisional `auto`/`autox`/`autoy` mode into a concrete
    /// zeropage or absolute one, from the operand's evaluated value, and
    /// writes the decision back into `call.mode` so every subsequent pass
    /// re-generates the identical byte count (spec.md §4.3). An operand
    /// still unresolved this pass (`Value::Nil`, a forward label not yet
    /// defined) conservatively picks absolute, the same placeholder size
    /// every other generator substitutes for an unresolved argument.
    fn generate_auto(&self, interp: &mut Interpreter, info: &InstructionInfo, call: &InstructionCall, mode: &'static str) -> Result<InstructionResult, LasmError> {
        let (zp_mode, abs_mode) = auto_family(mode);
        let value = evaluate_operand(interp, &call.args[0], call.name)?;
        let (fits_zeropage, v) = match value {
            Value::Nil => (false, 0i64),
            other => {
                let n = other.as_integer(call.name)?;
                (n >= 0 && n <= 0xFF, n)
            }
        };

        let chosen = if fits_zeropage && info.opcode(zp_mode).is_some() {
            zp_mode
        } else if info.opcode(abs_mode).is_some() {
            abs_mode
        } else {
            zp_mode
        };
        call.mode.set(chosen);

        let opcode = info.opcode(chosen).ok_or_else(|| LasmError::new(ErrorKind::InvalidInstruction, call.name.clone()))?;
        let address = interp.address;
        let mut bytes = vec![opcode, (v & 0xFF) as u8];
        if chosen == abs_mode {
            bytes.push(((v >> 8) & 0xFF) as u8);
        }

        interp.address += bytes.len() as u64;
        Ok(InstructionResult { bytes, address, token: call.name.clone() })
    }
}

type OpcodeTable = &'static [(&'static str, u8)];

const IMPLIED: OpcodeTable = &[
    ("brk", 0x00), ("clc", 0x18), ("cld", 0xD8), ("cli", 0x58), ("clv", 0xB8),
    ("dex", 0xCA), ("dey", 0x88), ("inx", 0xE8), ("iny", 0xC8), ("nop", 0xEA),
    ("pha", 0x48), ("php", 0x08), ("pla", 0x68), ("plp", 0x28), ("rti", 0x40),
    ("rts", 0x60), ("sec", 0x38), ("sed", 0xF8), ("sei", 0x78), ("tax", 0xAA),
    ("tay", 0xA8), ("tsx", 0xBA), ("txa", 0x8A), ("txs", 0x9A), ("tya", 0x98),
];

const RELATIVE: OpcodeTable = &[
    ("bcc", 0x90), ("bcs", 0xB0), ("beq", 0xF0), ("bmi", 0x30),
    ("bne", 0xD0), ("bpl", 0x10), ("bvc", 0x50), ("bvs", 0x70),
];

const IMMEDIATE: OpcodeTable = &[
    ("adc", 0x69), ("and", 0x29), ("cmp", 0xC9), ("cpx", 0xE0), ("cpy", 0xC0),
    ("lda", 0xA9), ("ldx", 0xA2), ("ldy", 0xA0), ("ora", 0x09), ("sbc", 0xE9), ("eor", 0x49),
];

const ZP: OpcodeTable = &[
    ("adc", 0x65), ("and", 0x25), ("asl", 0x06), ("bit", 0x24), ("cmp", 0xC5),
    ("cpx", 0xE4), ("cpy", 0xC4), ("dec", 0xC6), ("eor", 0x45), ("inc", 0xE6),
    ("lda", 0xA5), ("ldx", 0xA6), ("ldy", 0xA4), ("lsr", 0x46), ("ora", 0x05),
    ("rol", 0x26), ("ror", 0x66), ("sbc", 0xE5), ("sta", 0x85), ("stx", 0x86), ("sty", 0x84),
];

const ZPX: OpcodeTable = &[
    ("adc", 0x75), ("and", 0x35), ("asl", 0x16), ("cmp", 0xD5), ("dec", 0xD6),
    ("eor", 0x55), ("inc", 0xF6), ("lda", 0xB5), ("ldy", 0xB4), ("lsr", 0x56),
    ("ora", 0x15), ("rol", 0x36), ("ror", 0x76), ("sbc", 0xF5), ("sta", 0x95), ("sty", 0x94),
];

const ZPY: OpcodeTable = &[("ldx", 0xB6), ("stx", 0x96)];

const ABS: OpcodeTable = &[
    ("adc", 0x6D), ("and", 0x2D), ("asl", 0x0E), ("bit", 0x2C), ("cmp", 0xCD),
    ("cpx", 0xEC), ("cpy", 0xCC), ("dec", 0xCE), ("eor", 0x4D), ("inc", 0xEE),
    ("jmp", 0x4C), ("jsr", 0x20), ("lda", 0xAD), ("ldx", 0xAE), ("ldy", 0xAC),
    ("lsr", 0x4E), ("ora", 0x0D), ("rol", 0x2E), ("ror", 0x6E), ("sbc", 0xED),
    ("sta", 0x8D), ("stx", 0x8E), ("sty", 0x8C),
];

const ABSX: OpcodeTable = &[
    ("adc", 0x7D), ("and", 0x3D), ("asl", 0x1E), ("cmp", 0xDD), ("dec", 0xDE),
    ("eor", 0x5D), ("inc", 0xFE), ("lda", 0xBD), ("ldy", 0xBC), ("lsr", 0x5E),
    ("ora", 0x1D), ("rol", 0x3E), ("ror", 0x7E), ("sbc", 0xFD), ("sta", 0x9D),
];

const ABSY: OpcodeTable = &[
    ("adc", 0x79), ("and", 0x39), ("cmp", 0xD9), ("eor", 0x59), ("lda", 0xB9),
    ("ldx", 0xBE), ("ora", 0x19), ("sbc", 0xF9), ("sta", 0x99),
];

const INDX: OpcodeTable = &[
    ("adc", 0x61), ("and", 0x21), ("cmp", 0xC1), ("eor", 0x41),
    ("lda", 0xA1), ("ora", 0x01), ("sbc", 0xE1), ("sta", 0x81),
];

const INDY: OpcodeTable = &[
    ("adc", 0x71), ("and", 0x31), ("cmp", 0xD1), ("eor", 0x51),
    ("lda", 0xB1), ("ora", 0x11), ("sbc", 0xF1), ("sta", 0x91),
];

const IND: OpcodeTable = &[("jmp", 0x6C)];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn immediate_operand_chooses_imm_mode() {
        let cpu = Mos6502::new();
        assert!(cpu.is_instruction("adc"));
        assert!(cpu.is_instruction("ADC"));
        assert!(!cpu.is_instruction("brl"));
    }

    #[test]
    fn initial_category_picks_zeropage_for_small_literal_and_auto_for_variables() {
        let small = Expr::Literal(Value::Integer(0x20));
        let big = Expr::Literal(Value::Integer(0x2000));
        let variable = Expr::Variable(Token::new(TokenKind::Identifier, "i", Value::Nil, 1, 0, crate::token::SourceText::new("t", "")));
        assert_eq!(initial_category(&small), "zp");
        assert_eq!(initial_category(&big), "abs");
        assert_eq!(initial_category(&variable), "auto");
    }

    #[test]
    fn fallback_swaps_zeropage_and_absolute() {
        assert_eq!(fallback_mode("zp"), Some("abs"));
        assert_eq!(fallback_mode("absy"), Some("zpy"));
        assert_eq!(fallback_mode("rel"), None);
    }

    #[test]
    fn auto_family_maps_register_suffix_to_mode_pair() {
        assert_eq!(auto_family("auto"), ("zp", "abs"));
        assert_eq!(auto_family("autox"), ("zpx", "absx"));
        assert_eq!(auto_family("autoy"), ("zpy", "absy"));
    }
}
