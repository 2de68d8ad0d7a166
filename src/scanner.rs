//! The lexer
//!
//! Turns a source buffer into a token stream, consulting the active
//! instruction set to classify identifiers as mnemonics, directives,
//! keywords, or plain identifiers (spec.md §4.1).

use std::rc::Rc;

use crate::error::{ErrorKind, ErrorSink, LasmError};
use crate::instruction_set::InstructionSet;
use crate::token::{SourceText, Token, TokenKind};
use crate::value::Value;

pub struct Scanner<'a> {
    source: Rc<SourceText>,
    chars: Vec<char>,
    start: usize,
    current: usize,
    line: usize,
    instructions: &'a dyn InstructionSet,
    tokens: Vec<Token>,
}

impl<'a> Scanner<'a> {
    pub fn new(source: Rc<SourceText>, instructions: &'a dyn InstructionSet) -> Scanner<'a> {
        let chars = source.text.chars().collect();
        Scanner { source, chars, start: 0, current: 0, line: 1, instructions, tokens: Vec::new() }
    }

    /// Scan the whole buffer, reporting lexical errors through `sink` and
    /// continuing past them (spec.md §4.1: the scanner does not abort the
    /// token stream unless `abort_on_error` is set on the sink).
    pub fn scan_tokens(mut self, sink: &mut ErrorSink) -> Result<Vec<Token>, LasmError> {
        while !self.is_at_end() {
            self.start = self.current;
            self.scan_token(sink)?;
        }
        self.tokens.push(Token::new(TokenKind::Eof, "", Value::Nil, self.line, self.current, Rc::clone(&self.source)));
        Ok(self.tokens)
    }

    fn is_at_end(&self) -> bool {
        self.current >= self.chars.len()
    }

    fn advance(&mut self) -> char {
        let c = self.chars[self.current];
        self.current += 1;
        c
    }

    fn peek(&self) -> char {
        *self.chars.get(self.current).unwrap_or(&'\0')
    }

    fn peek_next(&self) -> char {
        *self.chars.get(self.current + 1).unwrap_or(&'\0')
    }

    fn matches(&mut self, expected: char) -> bool {
        if self.is_at_end() || self.chars[self.current] != expected {
            return false;
        }
        self.current += 1;
        true
    }

    fn lexeme(&self) -> String {
        self.chars[self.start..self.current].iter().collect()
    }

    fn add_token(&mut self, kind: TokenKind) {
        self.add_token_literal(kind, Value::Nil);
    }

    fn add_token_literal(&mut self, kind: TokenKind, literal: Value) {
        let text = self.lexeme();
        self.tokens.push(Token::new(kind, text, literal, self.line, self.start, Rc::clone(&self.source)));
    }

    fn error_token(&self) -> Token {
        Token::new(TokenKind::Eof, self.lexeme(), Value::Nil, self.line, self.start, Rc::clone(&self.source))
    }

    fn scan_token(&mut self, sink: &mut ErrorSink) -> Result<(), LasmError> {
        let c = self.advance();
        match c {
            '(' => self.add_token(TokenKind::LeftParen),
            ')' => self.add_token(TokenKind::RightParen),
            '{' => self.add_token(TokenKind::LeftBrace),
            '}' => self.add_token(TokenKind::RightBrace),
            '[' => self.add_token(TokenKind::LeftBracket),
            ']' => self.add_token(TokenKind::RightBracket),
            ',' => self.add_token(TokenKind::Comma),
            '.' => self.add_token(TokenKind::Dot),
            '-' => self.add_token(TokenKind::Minus),
            '+' => self.add_token(TokenKind::Plus),
            ';' => self.add_token(TokenKind::Semicolon),
            '*' => self.add_token(TokenKind::Star),
            '%' => self.add_token(TokenKind::Percent),
            '^' => self.add_token(TokenKind::BinXor),
            '~' => self.add_token(TokenKind::BinNot),
            '#' => self.add_token(TokenKind::Hash),
            '!' => {
                let kind = if self.matches('=') { TokenKind::BangEqual } else { TokenKind::Bang };
                self.add_token(kind);
            }
            '=' => {
                let kind = if self.matches('=') { TokenKind::EqualEqual } else { TokenKind::Equal };
                self.add_token(kind);
            }
            '<' => {
                if self.matches('<') {
                    self.add_token(TokenKind::ShiftLeft);
                } else {
                    let kind = if self.matches('=') { TokenKind::LessEqual } else { TokenKind::Less };
                    self.add_token(kind);
                }
            }
            '>' => {
                if self.matches('>') {
                    self.add_token(TokenKind::ShiftRight);
                } else {
                    let kind = if self.matches('=') { TokenKind::GreaterEqual } else { TokenKind::Greater };
                    self.add_token(kind);
                }
            }
            '/' => {
                if self.matches('/') {
                    while self.peek() != '\n' && !self.is_at_end() {
                        self.advance();
                    }
                } else {
                    self.add_token(TokenKind::Slash);
                }
            }
            '&' => {
                let kind = if self.matches('&') { TokenKind::And } else { TokenKind::BinAnd };
                self.add_token(kind);
            }
            '|' => {
                let kind = if self.matches('|') { TokenKind::Or } else { TokenKind::BinOr };
                self.add_token(kind);
            }
            ' ' | '\t' | '\r' => {}
            '\n' => self.line += 1,
            '"' | '\'' => self.scan_string(c, sink)?,
            c if c.is_ascii_digit() => self.scan_number(c, sink)?,
            c if is_identifier_start(c) => self.scan_identifier(),
            _ => sink.report(LasmError::new(ErrorKind::UnexpectedChar, self.error_token()))?,
        }
        Ok(())
    }

    fn scan_string(&mut self, quote: char, sink: &mut ErrorSink) -> Result<(), LasmError> {
        while self.peek() != quote && !self.is_at_end() {
            if self.peek() == '\n' {
                self.line += 1;
            }
            if self.peek() == '\\' {
                self.advance();
            }
            self.advance();
        }

        if self.is_at_end() {
            return sink.report(LasmError::new(ErrorKind::UnterminatedString, self.error_token()));
        }
        self.advance(); // closing quote

        let raw: String = self.chars[self.start + 1..self.current - 1].iter().collect();
        self.add_token_literal(TokenKind::String, Value::String(unescape(&raw)));
        Ok(())
    }

    fn scan_number(&mut self, first: char, sink: &mut ErrorSink) -> Result<(), LasmError> {
        let is_hex = first == '0' && self.peek() == 'x';
        let is_bin = first == '0' && self.peek() == 'b';
        let mut is_real = false;

        if is_hex || is_bin {
            self.advance();
            let pred: fn(char) -> bool = if is_hex { |c: char| c.is_ascii_hexdigit() } else { |c: char| c == '0' || c == '1' };
            while pred(self.peek()) {
                self.advance();
            }
        } else {
            while self.peek().is_ascii_digit() {
                self.advance();
            }
            if self.peek() == '.' && self.peek_next().is_ascii_digit() {
                is_real = true;
                self.advance();
                while self.peek().is_ascii_digit() {
                    self.advance();
                }
            }
        }

        let text = self.lexeme();
        if is_real {
            match text.parse::<f64>() {
                Ok(v) => self.add_token_literal(TokenKind::Real, Value::Real(v)),
                Err(_) => sink.report(LasmError::new(ErrorKind::NumberParseError, self.error_token()))?,
            }
        } else if is_bin {
            match i64::from_str_radix(&text[2..], 2) {
                Ok(v) => self.add_token_literal(TokenKind::Number, Value::Integer(v)),
                Err(_) => sink.report(LasmError::new(ErrorKind::NumberParseError, self.error_token()))?,
            }
        } else if is_hex {
            match i64::from_str_radix(&text[2..], 16) {
                Ok(v) => self.add_token_literal(TokenKind::Number, Value::Integer(v)),
                Err(_) => sink.report(LasmError::new(ErrorKind::NumberParseError, self.error_token()))?,
            }
        } else {
            match text.parse::<i64>() {
                Ok(v) => self.add_token_literal(TokenKind::Number, Value::Integer(v)),
                Err(_) => sink.report(LasmError::new(ErrorKind::NumberParseError, self.error_token()))?,
            }
        }
        Ok(())
    }

    fn scan_identifier(&mut self) {
        while is_identifier_part(self.peek()) {
            self.advance();
        }

        let mut text = self.lexeme();
        let kind = if self.instructions.is_instruction(&text) {
            TokenKind::Instruction
        } else if self.instructions.is_directive(&text) {
            TokenKind::Directive
        } else if let Some(kw) = keyword(&text) {
            kw
        } else if text.ends_with(':') {
            text.pop();
            TokenKind::Label
        } else {
            TokenKind::Identifier
        };

        if kind == TokenKind::Label {
            let literal = Value::Nil;
            self.tokens.push(Token::new(TokenKind::Label, text, literal, self.line, self.start, Rc::clone(&self.source)));
        } else {
            self.add_token(kind);
        }
    }
}

/// identifier start = letter / underscore / `:` (a trailing `:` is how a
/// `label:` token is recognized, spec.md §4.1).
fn is_identifier_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_' || c == ':'
}

fn is_identifier_part(c: char) -> bool {
    is_identifier_start(c) || c.is_ascii_digit()
}

fn keyword(text: &str) -> Option<TokenKind> {
    Some(match text {
        "let" => TokenKind::Let,
        "if" => TokenKind::If,
        "else" => TokenKind::Else,
        "while" => TokenKind::While,
        "for" => TokenKind::For,
        "fn" => TokenKind::Fn,
        "return" => TokenKind::Return,
        "true" => TokenKind::True,
        "false" => TokenKind::False,
        "nil" => TokenKind::Nil,
        "org" => TokenKind::Org,
        "fill" => TokenKind::Fill,
        "align" => TokenKind::Align,
        "db" => TokenKind::DefineByte,
        "dh" => TokenKind::DefineHalf,
        "dw" => TokenKind::DefineWord,
        "dd" => TokenKind::DefineDouble,
        "bss" => TokenKind::Bss,
        "include" => TokenKind::Include,
        "incbin" => TokenKind::Incbin,
        _ => return None,
    })
}

/// Unescape `\x` sequences in a string literal at token time (spec.md §4.1).
fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some('r') => out.push('\r'),
                Some('0') => out.push('\0'),
                Some(other) => out.push(other),
                None => {}
            }
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instruction_set::mos6502::Mos6502;

    fn scan(src: &str) -> Vec<Token> {
        let is = Mos6502::new();
        let source = SourceText::new("test.asm", src);
        let mut sink = ErrorSink::new(false);
        Scanner::new(source, &is).scan_tokens(&mut sink).unwrap()
    }

    #[test]
    fn classifies_mnemonic_and_label() {
        let tokens = scan("loop: lda #0x10;");
        assert_eq!(tokens[0].kind, TokenKind::Label);
        assert_eq!(tokens[0].lexeme, "loop");
        assert_eq!(tokens[1].kind, TokenKind::Instruction);
    }

    #[test]
    fn hex_and_binary_numbers() {
        let tokens = scan("0xFF 0b101 1.5");
        assert_eq!(tokens[0].literal, Value::Integer(0xFF));
        assert_eq!(tokens[1].literal, Value::Integer(0b101));
        assert_eq!(tokens[2].kind, TokenKind::Real);
    }

    #[test]
    fn line_comment_is_skipped() {
        let tokens = scan("1 // comment\n2");
        assert_eq!(tokens[0].literal, Value::Integer(1));
        assert_eq!(tokens[1].literal, Value::Integer(2));
    }
}
