//! The error taxonomy and the shared error sink
//!
//! Every error carries the originating [Token] (for location and source-line
//! underlining) and a stable [ErrorKind], matching spec.md §7. `Display` is
//! hand-written in the teacher's style (`src/assembler.rs`'s
//! `impl fmt::Display for Error`, with `underline_spans`) rather than
//! derived with `thiserror`.

use std::fmt;

use colored::Colorize;

use crate::token::Token;

/// The stable error kinds from spec.md §7. Each implementation target
/// (other assemblers, test harnesses) can rely on these names not changing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    UnexpectedChar,
    UnterminatedString,
    NumberParseError,
    UnexpectedToken,
    MissingSemicolon,
    MissingComma,
    MissingParen,
    MissingBrace,
    MissingBracket,
    InvalidInstruction,
    TypeError,
    ValueOutOfRange,
    DivisionByZero,
    UndefinedRef,
    DuplicateLabel,
    ArityError,
    FileNotFound,
    BadCpuTarget,
    ReturnOutsideFunction,
}

impl ErrorKind {
    /// A small numeric code, used as the CLI's exit status for the first
    /// unrecovered error (spec.md §6).
    pub fn exit_code(&self) -> i32 {
        *self as i32 + 1
    }

    fn message(&self) -> &'static str {
        match self {
            ErrorKind::UnexpectedChar => "unexpected character",
            ErrorKind::UnterminatedString => "unterminated string",
            ErrorKind::NumberParseError => "could not parse number",
            ErrorKind::UnexpectedToken => "unexpected token",
            ErrorKind::MissingSemicolon => "expected ';' after statement",
            ErrorKind::MissingComma => "expected ',' between arguments",
            ErrorKind::MissingParen => "expected ')'",
            ErrorKind::MissingBrace => "expected '}'",
            ErrorKind::MissingBracket => "expected ']'",
            ErrorKind::InvalidInstruction => "invalid instruction for this addressing mode",
            ErrorKind::TypeError => "type error",
            ErrorKind::ValueOutOfRange => "value out of range",
            ErrorKind::DivisionByZero => "division by zero",
            ErrorKind::UndefinedRef => "undefined reference",
            ErrorKind::DuplicateLabel => "duplicate label",
            ErrorKind::ArityError => "wrong number of arguments",
            ErrorKind::FileNotFound => "file not found",
            ErrorKind::BadCpuTarget => "unknown CPU target",
            ErrorKind::ReturnOutsideFunction => "return outside of a function",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message())
    }
}

/// A diagnostic located at a single token.
#[derive(Debug, Clone)]
pub struct LasmError {
    pub kind: ErrorKind,
    pub token: Token,
    pub detail: Option<String>,
}

impl LasmError {
    pub fn new(kind: ErrorKind, token: Token) -> LasmError {
        LasmError { kind, token, detail: None }
    }

    pub fn with_detail(kind: ErrorKind, token: Token, detail: impl Into<String>) -> LasmError {
        LasmError { kind, token, detail: Some(detail.into()) }
    }
}

impl std::error::Error for LasmError {}

impl fmt::Display for LasmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} {} at {}:{}",
            "error:".red().bold(),
            self.kind,
            self.token.path(),
            self.token.line
        )?;
        if let Some(detail) = &self.detail {
            writeln!(f, "  {detail}")?;
        }
        let line = self.token.line_text();
        if !line.is_empty() {
            let offset_in_line = line
                .as_bytes()
                .windows(self.token.lexeme.len().max(1))
                .position(|w| w == self.token.lexeme.as_bytes())
                .unwrap_or(0);
            write!(f, "  {line}\n  {}{}", " ".repeat(offset_in_line), "^".repeat(self.token.lexeme.len().max(1)).green())?;
        }
        Ok(())
    }
}

/// Collects diagnostics across a scan/parse/interpret pass.
///
/// Default policy is collect-and-continue: every error raised in a given
/// pass is recorded and scanning/parsing keeps going so a single mistake
/// does not hide the rest of the file's errors. `abort_on_error` promotes
/// the first error to an immediate hard stop.
#[derive(Default)]
pub struct ErrorSink {
    pub errors: Vec<LasmError>,
    pub abort_on_error: bool,
}

impl ErrorSink {
    pub fn new(abort_on_error: bool) -> ErrorSink {
        ErrorSink { errors: Vec::new(), abort_on_error }
    }

    /// Record an error. Returns `Err` when `abort_on_error` is set, so
    /// callers can propagate immediately with `?`.
    pub fn report(&mut self, error: LasmError) -> Result<(), LasmError> {
        if self.abort_on_error {
            return Err(error);
        }
        self.errors.push(error);
        Ok(())
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn first_kind(&self) -> Option<ErrorKind> {
        self.errors.first().map(|e| e.kind)
    }
}
