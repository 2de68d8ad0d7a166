//! Tokens and the source text they slice
//!
//! Every token carries a shared handle to the full text of the file it was
//! scanned from, rather than an owned copy of its lexeme, so diagnostics can
//! recover the offending source line even after the scanner and parser have
//! moved on. Each `include`d file gets its own handle, so a token's location
//! is always self-describing.

use std::fmt;
use std::rc::Rc;

use crate::value::Value;

/// The full text of one source file, named so diagnostics can report a path.
#[derive(Debug)]
pub struct SourceText {
    pub path: String,
    pub text: String,
}

impl SourceText {
    pub fn new(path: impl Into<String>, text: impl Into<String>) -> Rc<SourceText> {
        Rc::new(SourceText { path: path.into(), text: text.into() })
    }

    /// Return the full line of text containing the given byte offset, for
    /// error underlining.
    pub fn line_text(&self, line: usize) -> &str {
        self.text.lines().nth(line.saturating_sub(1)).unwrap_or("")
    }
}

/// The kind of a scanned token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    // single-character
    LeftParen, RightParen, LeftBrace, RightBrace, LeftBracket, RightBracket,
    Comma, Dot, Minus, Plus, Semicolon, Slash, Star, Percent, Hash,

    // one or two character
    Bang, BangEqual,
    Equal, EqualEqual,
    Greater, GreaterEqual,
    Less, LessEqual,
    BinAnd, And,
    BinOr, Or,
    BinXor, BinNot,
    ShiftLeft, ShiftRight,

    // literals
    Identifier, String, Number, Real, Label, Instruction, Directive,

    // keywords
    Let, If, Else, While, For, Fn, Return,
    True, False, Nil,
    Org, Fill, Align, DefineByte, DefineHalf, DefineWord, DefineDouble,
    Bss, Include, Incbin,

    Eof,
}

/// One lexical token, with the literal value the scanner already computed
/// for number/string tokens so the parser never has to re-parse a lexeme.
#[derive(Debug, Clone)]
pub struct Token {
    pub kind: TokenKind,
    pub lexeme: String,
    pub literal: Value,
    pub line: usize,
    /// byte offset of the token's first character, within `source.text`
    pub offset: usize,
    pub source: Rc<SourceText>,
}

impl Token {
    pub fn new(
        kind: TokenKind,
        lexeme: impl Into<String>,
        literal: Value,
        line: usize,
        offset: usize,
        source: Rc<SourceText>,
    ) -> Token {
        Token { kind, lexeme: lexeme.into(), literal, line, offset, source }
    }

    pub fn path(&self) -> &str {
        &self.source.path
    }

    pub fn line_text(&self) -> &str {
        self.source.line_text(self.line)
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.lexeme)
    }
}
