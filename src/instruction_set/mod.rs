//! The instruction-set plug-in framework
//!
//! A CPU plug-in (spec.md §4.3) registers mnemonics to addressing-mode
//! parsers and directive names to directive handlers, carries per-family
//! mutable flags (e.g. 65816 accumulator width), and supplies a generator
//! for every [InstructionInfo] it builds during parsing.
//!
//! Addressing-mode ambiguity (e.g. zeropage vs. absolute for the same
//! 6502 mnemonic) is settled at parse time when the operand is a literal.
//! A non-literal operand (a variable or a label) can't be sized until it
//! resolves, so its mode parser leaves a provisional tag and the generator
//! decides zeropage vs. absolute itself, the first time it runs, from the
//! evaluated value; it writes that decision back into the statement's
//! `Cell` so every later pass reuses it verbatim. Either way the mode is
//! settled before a second pass ever reads it, so a generator's byte count
//! can never differ between pass 0 and pass 1 (spec.md §4.3, "size
//! discipline").

pub mod mos6502;
pub mod w65c816;

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use crate::error::{ErrorKind, LasmError};
use crate::expr::Expr;
use crate::interpreter::Interpreter;
use crate::parser::Parser;
use crate::stmt::Stmt;
use crate::token::Token;
use crate::value::{Unwind, Value};

/// Byte order used when a CPU plug-in or `define-byte` statement emits a
/// multi-byte field. 6502-family CPUs are little-endian throughout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endianness {
    Little,
    Big,
}

/// One emitted instruction (or `db`/`incbin` chunk), produced once per
/// statement in pass 1. Pass 0 accounts for the size but discards the
/// bytes (spec.md §3, "InstructionResult").
#[derive(Debug, Clone)]
pub struct InstructionResult {
    pub bytes: Vec<u8>,
    pub address: u64,
    pub token: Token,
}

impl InstructionResult {
    pub fn size(&self) -> usize {
        self.bytes.len()
    }
}

/// The record attached to an `instruction` AST node: a generator plus a
/// small mode-tag to opcode map, populated by every addressing-mode parser
/// that voted into it (spec.md §3, "InstructionInfo").
pub struct InstructionInfo {
    pub generator: Rc<dyn InstructionGenerator>,
    opcodes: RefCell<HashMap<&'static str, u8>>,
}

impl InstructionInfo {
    pub fn new(generator: Rc<dyn InstructionGenerator>) -> InstructionInfo {
        InstructionInfo { generator, opcodes: RefCell::new(HashMap::new()) }
    }

    pub fn add_opcode(&self, mode: &'static str, opcode: u8) {
        self.opcodes.borrow_mut().insert(mode, opcode);
    }

    pub fn opcode(&self, mode: &str) -> Option<u8> {
        self.opcodes.borrow().get(mode).copied()
    }
}

/// A view of an `instruction` statement's fields, borrowed out of the
/// `Stmt::Instruction` variant so generators don't need to match on `Stmt`.
pub struct InstructionCall<'a> {
    pub name: &'a Token,
    pub args: &'a [Expr],
    pub mode: &'a Cell<&'static str>,
    pub fully_resolved: &'a Cell<bool>,
}

/// Turns an AST node plus evaluated arguments into emitted bytes.
/// One generator per addressing-mode family (immediate, absolute/zeropage,
/// relative, implicit, indirect, ...).
pub trait InstructionGenerator {
    fn generate(
        &self,
        interp: &mut Interpreter,
        info: &InstructionInfo,
        call: &InstructionCall,
    ) -> Result<InstructionResult, LasmError>;
}

/// An addressing-mode parser competing for a mnemonic: inspects lookahead
/// and either consumes the statement and returns it, or declines (`Ok(None)`)
/// so the next registered parser can try (spec.md §4.2).
pub trait AddressingModeParser {
    fn try_parse(
        &self,
        parser: &mut Parser,
        name: Token,
        width: Option<&str>,
    ) -> Result<Option<Stmt>, LasmError>;
}

/// A CPU-specific pragma (e.g. 65816's `m8`/`m16`), registered by name and
/// dispatched with its own argument parser, separately from ordinary
/// mnemonics (spec.md §4.2, "directive token dispatched to its own parser").
pub trait DirectiveHandler {
    /// Parse this directive's own argument list (may be empty).
    fn parse_args(&self, parser: &mut Parser, name: &Token) -> Result<Vec<Expr>, LasmError>;

    /// Execute the directive against the live interpreter state. Directives
    /// that affect generator behaviour (like 65816's accumulator width)
    /// must take effect immediately so later instructions in the same pass
    /// observe it (spec.md §9, "CPU flag word width... at generator time").
    fn execute(&self, interp: &mut Interpreter, args: &[Value], token: &Token) -> Result<(), LasmError>;
}

/// A CPU plug-in: mnemonics -> addressing-mode parsers, directive names ->
/// handlers, and the mutable per-family flags mode parsers/generators
/// consult (spec.md §4.3).
pub trait InstructionSet {
    fn is_instruction(&self, name: &str) -> bool;
    fn is_directive(&self, name: &str) -> bool;

    /// Run every registered parser for `name` in declaration order; the
    /// first to accept wins. `INVALID_INSTRUCTION` if none do.
    fn parse_instruction(
        &self,
        parser: &mut Parser,
        name: Token,
        width: Option<&str>,
    ) -> Result<Stmt, LasmError>;

    fn parse_directive(&self, parser: &mut Parser, name: Token) -> Result<Stmt, LasmError>;

    /// Mutable CPU flag consulted by mode parsers, e.g. immediate width.
    /// 6502 never changes it (always 8); 65816 toggles it via `m8`/`m16`.
    fn set_bits(&self, n: u8);
    fn bits(&self) -> u8;

    fn endianness(&self) -> Endianness {
        Endianness::Little
    }
}

/// Shared bookkeeping every CPU plug-in wants: a registry of mnemonic ->
/// mode parsers (tried in registration order) and directive name ->
/// handler, plus the mutable accumulator-width flag.
#[derive(Default)]
pub struct InstructionRegistry {
    pub mnemonics: HashMap<String, Vec<Rc<dyn AddressingModeParser>>>,
    pub directives: HashMap<String, Rc<dyn DirectiveHandler>>,
    pub bits: Cell<u8>,
}

/// Evaluate an operand expression to an integer, treating the pass-0
/// unresolved-reference placeholder (`Value::Nil`) as zero rather than a
/// type error (spec.md §7: "pass-0 UNDEFINED_REF is silently downgraded to
/// a nil placeholder"). `Stmt::Instruction::fully_resolved` is what records
/// that the placeholder stood in for something real.
pub fn resolve_operand_int(interp: &mut Interpreter, expr: &Expr, token: &Token) -> Result<i64, LasmError> {
    let value = match interp.evaluate(expr) {
        Ok(v) => v,
        Err(Unwind::Error(e)) => return Err(e),
        Err(Unwind::Return(_)) => return Err(LasmError::new(ErrorKind::ReturnOutsideFunction, token.clone())),
    };
    match value {
        Value::Nil => Ok(0),
        other => other.as_integer(token),
    }
}

impl InstructionRegistry {
    pub fn new(default_bits: u8) -> InstructionRegistry {
        InstructionRegistry { mnemonics: HashMap::new(), directives: HashMap::new(), bits: Cell::new(default_bits) }
    }

    pub fn register(&mut self, mnemonic: &str, parser: Rc<dyn AddressingModeParser>) {
        self.mnemonics.entry(mnemonic.to_lowercase()).or_default().push(parser);
    }

    pub fn register_directive(&mut self, name: &str, handler: Rc<dyn DirectiveHandler>) {
        self.directives.insert(name.to_lowercase(), handler);
    }
}
