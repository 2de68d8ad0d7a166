//! The recursive-descent parser
//!
//! One token of lookahead. Generic statements and the full expression
//! grammar live here; mnemonic and CPU-directive statements are delegated
//! to the active [InstructionSet] (spec.md §4.2).

use std::rc::Rc;

use crate::error::{ErrorKind, ErrorSink, LasmError};
use crate::expr::Expr;
use crate::instruction_set::InstructionSet;
use crate::stmt::Stmt;
use crate::token::{Token, TokenKind};
use crate::value::Value;

pub struct Parser {
    tokens: Vec<Token>,
    current: usize,
    pub instructions: Rc<dyn InstructionSet>,
}

impl Parser {
    pub fn new(tokens: Vec<Token>, instructions: Rc<dyn InstructionSet>) -> Parser {
        Parser { tokens, current: 0, instructions }
    }

    /// Parse every statement in the token stream, reporting errors through
    /// `sink` and resynchronising after each one (collect-and-continue),
    /// unless `sink.abort_on_error` promotes the first error to a hard stop.
    pub fn parse(mut self, sink: &mut ErrorSink) -> Result<Vec<Stmt>, LasmError> {
        let mut stmts = Vec::new();
        while !self.is_at_end() {
            match self.statement() {
                Ok(s) => stmts.push(s),
                Err(e) => {
                    sink.report(e)?;
                    self.synchronize();
                }
            }
        }
        Ok(stmts)
    }

    // ---- token stream primitives ----

    fn is_at_end(&self) -> bool {
        self.peek().kind == TokenKind::Eof
    }

    pub fn peek(&self) -> &Token {
        &self.tokens[self.current]
    }

    pub fn previous(&self) -> Token {
        self.tokens[self.current - 1].clone()
    }

    pub fn check(&self, kind: TokenKind) -> bool {
        !self.is_at_end() && self.peek().kind == kind
    }

    pub fn advance(&mut self) -> Token {
        if !self.is_at_end() {
            self.current += 1;
        }
        self.previous()
    }

    pub fn match_any(&mut self, kinds: &[TokenKind]) -> bool {
        for kind in kinds {
            if self.check(*kind) {
                self.advance();
                return true;
            }
        }
        false
    }

    pub fn consume(&mut self, kind: TokenKind, on_missing: ErrorKind) -> Result<Token, LasmError> {
        if self.check(kind) {
            Ok(self.advance())
        } else {
            Err(LasmError::new(on_missing, self.peek().clone()))
        }
    }

    fn synchronize(&mut self) {
        self.advance();
        while !self.is_at_end() {
            if self.tokens[self.current - 1].kind == TokenKind::Semicolon {
                return;
            }
            if matches!(
                self.peek().kind,
                TokenKind::Let
                    | TokenKind::If
                    | TokenKind::While
                    | TokenKind::Fn
                    | TokenKind::Return
                    | TokenKind::Org
                    | TokenKind::Fill
                    | TokenKind::Align
                    | TokenKind::Bss
                    | TokenKind::Include
                    | TokenKind::Incbin
                    | TokenKind::Instruction
                    | TokenKind::Directive
                    | TokenKind::Label
            ) {
                return;
            }
            self.advance();
        }
    }

    // ---- statements ----

    fn statement(&mut self) -> Result<Stmt, LasmError> {
        if self.match_any(&[TokenKind::Let]) {
            return self.let_statement();
        }
        if self.match_any(&[TokenKind::LeftBrace]) {
            return Ok(Stmt::Block(self.block()?));
        }
        if self.match_any(&[TokenKind::If]) {
            return self.if_statement();
        }
        if self.match_any(&[TokenKind::While]) {
            return self.while_statement();
        }
        if self.match_any(&[TokenKind::Fn]) {
            return self.function_statement();
        }
        if self.match_any(&[TokenKind::Return]) {
            return self.return_statement();
        }
        if self.check(TokenKind::Label) {
            let name = self.advance();
            return Ok(Stmt::Label(name));
        }
        if self.check(TokenKind::Directive) {
            let name = self.advance();
            let set = Rc::clone(&self.instructions);
            return set.parse_directive(self, name);
        }
        if self.check(TokenKind::Instruction) {
            let name = self.advance();
            let width = self.width_suffix()?;
            let set = Rc::clone(&self.instructions);
            return set.parse_instruction(self, name, width.as_deref());
        }
        if self.match_any(&[TokenKind::Org]) {
            return self.org_statement();
        }
        if self.match_any(&[TokenKind::Fill]) {
            return self.fill_statement();
        }
        if self.match_any(&[TokenKind::Align]) {
            return self.align_statement();
        }
        if self.check(TokenKind::DefineByte) {
            self.advance();
            return self.define_byte_statement(1);
        }
        if self.check(TokenKind::DefineHalf) {
            self.advance();
            return self.define_byte_statement(2);
        }
        if self.check(TokenKind::DefineWord) {
            self.advance();
            return self.define_byte_statement(4);
        }
        if self.check(TokenKind::DefineDouble) {
            self.advance();
            return self.define_byte_statement(8);
        }
        if self.match_any(&[TokenKind::Bss]) {
            return self.bss_statement();
        }
        if self.match_any(&[TokenKind::Include]) {
            return self.include_statement();
        }
        if self.match_any(&[TokenKind::Incbin]) {
            return self.incbin_statement();
        }
        self.expression_statement()
    }

    /// A mnemonic may be followed by `.z`/`.w`/`.l`/`.i`, restricting the
    /// set of addressing-mode parsers that are allowed to accept it.
    fn width_suffix(&mut self) -> Result<Option<String>, LasmError> {
        if self.check(TokenKind::Dot) {
            self.advance();
            let ident = self.consume(TokenKind::Identifier, ErrorKind::UnexpectedToken)?;
            Ok(Some(ident.lexeme))
        } else {
            Ok(None)
        }
    }

    fn let_statement(&mut self) -> Result<Stmt, LasmError> {
        let name = self.consume(TokenKind::Identifier, ErrorKind::UnexpectedToken)?;
        let init = if self.match_any(&[TokenKind::Equal]) { Some(self.expression()?) } else { None };
        self.consume(TokenKind::Semicolon, ErrorKind::MissingSemicolon)?;
        Ok(Stmt::Let { name, init })
    }

    fn block(&mut self) -> Result<Vec<Stmt>, LasmError> {
        let mut stmts = Vec::new();
        while !self.check(TokenKind::RightBrace) && !self.is_at_end() {
            stmts.push(self.statement()?);
        }
        self.consume(TokenKind::RightBrace, ErrorKind::MissingBrace)?;
        Ok(stmts)
    }

    fn if_statement(&mut self) -> Result<Stmt, LasmError> {
        self.consume(TokenKind::LeftParen, ErrorKind::MissingParen)?;
        let cond = self.expression()?;
        self.consume(TokenKind::RightParen, ErrorKind::MissingParen)?;
        let then_branch = Box::new(self.statement()?);
        let else_branch = if self.match_any(&[TokenKind::Else]) { Some(Box::new(self.statement()?)) } else { None };
        Ok(Stmt::If { cond, then_branch, else_branch })
    }

    fn while_statement(&mut self) -> Result<Stmt, LasmError> {
        self.consume(TokenKind::LeftParen, ErrorKind::MissingParen)?;
        let cond = self.expression()?;
        self.consume(TokenKind::RightParen, ErrorKind::MissingParen)?;
        let body = Box::new(self.statement()?);
        Ok(Stmt::While { cond, body })
    }

    fn function_statement(&mut self) -> Result<Stmt, LasmError> {
        let name = self.consume(TokenKind::Identifier, ErrorKind::UnexpectedToken)?;
        self.consume(TokenKind::LeftParen, ErrorKind::MissingParen)?;
        let mut params = Vec::new();
        if !self.check(TokenKind::RightParen) {
            loop {
                params.push(self.consume(TokenKind::Identifier, ErrorKind::UnexpectedToken)?);
                if !self.match_any(&[TokenKind::Comma]) {
                    break;
                }
            }
        }
        self.consume(TokenKind::RightParen, ErrorKind::MissingParen)?;
        self.consume(TokenKind::LeftBrace, ErrorKind::MissingBrace)?;
        let body = Rc::new(self.block()?);
        Ok(Stmt::Function { name, params, body })
    }

    fn return_statement(&mut self) -> Result<Stmt, LasmError> {
        let keyword = self.previous();
        let value = if !self.check(TokenKind::Semicolon) { Some(self.expression()?) } else { None };
        self.consume(TokenKind::Semicolon, ErrorKind::MissingSemicolon)?;
        Ok(Stmt::Return { keyword, value })
    }

    fn org_statement(&mut self) -> Result<Stmt, LasmError> {
        let token = self.previous();
        let addr = self.expression()?;
        self.consume(TokenKind::Semicolon, ErrorKind::MissingSemicolon)?;
        Ok(Stmt::Org { token, addr })
    }

    fn fill_statement(&mut self) -> Result<Stmt, LasmError> {
        let token = self.previous();
        let to_addr = self.expression()?;
        self.consume(TokenKind::Comma, ErrorKind::MissingComma)?;
        let value = self.expression()?;
        self.consume(TokenKind::Semicolon, ErrorKind::MissingSemicolon)?;
        Ok(Stmt::Fill { token, to_addr, value })
    }

    fn align_statement(&mut self) -> Result<Stmt, LasmError> {
        let token = self.previous();
        let to = self.expression()?;
        self.consume(TokenKind::Comma, ErrorKind::MissingComma)?;
        let fill = self.expression()?;
        self.consume(TokenKind::Semicolon, ErrorKind::MissingSemicolon)?;
        Ok(Stmt::Align { token, to, fill })
    }

    fn define_byte_statement(&mut self, unit_size: usize) -> Result<Stmt, LasmError> {
        let token = self.previous();
        let mut values = vec![self.expression()?];
        while self.match_any(&[TokenKind::Comma]) {
            values.push(self.expression()?);
        }
        self.consume(TokenKind::Semicolon, ErrorKind::MissingSemicolon)?;
        Ok(Stmt::DefineByte { token, values, unit_size, endianness: self.instructions.endianness() })
    }

    fn bss_statement(&mut self) -> Result<Stmt, LasmError> {
        let token = self.previous();
        let start = self.expression()?;
        self.consume(TokenKind::LeftBrace, ErrorKind::MissingBrace)?;
        let mut declarations = Vec::new();
        while !self.check(TokenKind::RightBrace) && !self.is_at_end() {
            self.consume(TokenKind::Let, ErrorKind::UnexpectedToken)?;
            let name = self.consume(TokenKind::Identifier, ErrorKind::UnexpectedToken)?;
            self.consume(TokenKind::Equal, ErrorKind::UnexpectedToken)?;
            let size = self.expression()?;
            self.consume(TokenKind::Semicolon, ErrorKind::MissingSemicolon)?;
            declarations.push((name, size));
        }
        self.consume(TokenKind::RightBrace, ErrorKind::MissingBrace)?;
        Ok(Stmt::Bss { token, start, declarations })
    }

    fn include_statement(&mut self) -> Result<Stmt, LasmError> {
        let token = self.previous();
        let path = self.expression()?;
        self.consume(TokenKind::Semicolon, ErrorKind::MissingSemicolon)?;
        Ok(Stmt::Include { token, path })
    }

    fn incbin_statement(&mut self) -> Result<Stmt, LasmError> {
        let token = self.previous();
        let path = self.expression()?;
        self.consume(TokenKind::Semicolon, ErrorKind::MissingSemicolon)?;
        Ok(Stmt::Incbin { token, path })
    }

    fn expression_statement(&mut self) -> Result<Stmt, LasmError> {
        let expr = self.expression()?;
        self.consume(TokenKind::Semicolon, ErrorKind::MissingSemicolon)?;
        Ok(Stmt::Expression(expr))
    }

    // ---- expressions ----

    pub fn expression(&mut self) -> Result<Expr, LasmError> {
        self.assignment()
    }

    fn assignment(&mut self) -> Result<Expr, LasmError> {
        let expr = self.logic_or()?;

        if self.match_any(&[TokenKind::Equal]) {
            let equals = self.previous();
            let value = Box::new(self.assignment()?);
            return match expr {
                Expr::Variable(name) => Ok(Expr::Assign { name, value }),
                Expr::Index { object, bracket, index } => Ok(Expr::IndexAssign { object, bracket, index, value }),
                _ => Err(LasmError::new(ErrorKind::UnexpectedToken, equals)),
            };
        }

        Ok(expr)
    }

    fn logic_or(&mut self) -> Result<Expr, LasmError> {
        let mut expr = self.logic_and()?;
        while self.match_any(&[TokenKind::Or]) {
            let op = self.previous();
            let right = Box::new(self.logic_and()?);
            expr = Expr::Logical { left: Box::new(expr), op, right };
        }
        Ok(expr)
    }

    fn logic_and(&mut self) -> Result<Expr, LasmError> {
        let mut expr = self.equality()?;
        while self.match_any(&[TokenKind::And]) {
            let op = self.previous();
            let right = Box::new(self.equality()?);
            expr = Expr::Logical { left: Box::new(expr), op, right };
        }
        Ok(expr)
    }

    fn equality(&mut self) -> Result<Expr, LasmError> {
        self.binary_level(&[TokenKind::EqualEqual, TokenKind::BangEqual], Self::compare)
    }

    fn compare(&mut self) -> Result<Expr, LasmError> {
        self.binary_level(
            &[TokenKind::Less, TokenKind::LessEqual, TokenKind::Greater, TokenKind::GreaterEqual],
            Self::bitor,
        )
    }

    fn bitor(&mut self) -> Result<Expr, LasmError> {
        self.binary_level(&[TokenKind::BinOr], Self::bitxor)
    }

    fn bitxor(&mut self) -> Result<Expr, LasmError> {
        self.binary_level(&[TokenKind::BinXor], Self::bitand)
    }

    fn bitand(&mut self) -> Result<Expr, LasmError> {
        self.binary_level(&[TokenKind::BinAnd], Self::shift)
    }

    fn shift(&mut self) -> Result<Expr, LasmError> {
        self.binary_level(&[TokenKind::ShiftLeft, TokenKind::ShiftRight], Self::term)
    }

    fn term(&mut self) -> Result<Expr, LasmError> {
        self.binary_level(&[TokenKind::Plus, TokenKind::Minus], Self::factor)
    }

    fn factor(&mut self) -> Result<Expr, LasmError> {
        self.binary_level(&[TokenKind::Star, TokenKind::Slash, TokenKind::Percent], Self::unary)
    }

    fn binary_level(
        &mut self,
        ops: &[TokenKind],
        mut next: impl FnMut(&mut Self) -> Result<Expr, LasmError>,
    ) -> Result<Expr, LasmError> {
        let mut expr = next(self)?;
        while self.match_any(ops) {
            let op = self.previous();
            let right = Box::new(next(self)?);
            expr = Expr::Binary { left: Box::new(expr), op, right };
        }
        Ok(expr)
    }

    fn unary(&mut self) -> Result<Expr, LasmError> {
        if self.match_any(&[TokenKind::Bang, TokenKind::Minus, TokenKind::BinNot]) {
            let op = self.previous();
            let right = Box::new(self.unary()?);
            return Ok(Expr::Unary { op, right });
        }
        self.call()
    }

    fn call(&mut self) -> Result<Expr, LasmError> {
        let mut expr = self.primary()?;
        loop {
            if self.match_any(&[TokenKind::LeftParen]) {
                let mut args = Vec::new();
                if !self.check(TokenKind::RightParen) {
                    loop {
                        args.push(self.expression()?);
                        if !self.match_any(&[TokenKind::Comma]) {
                            break;
                        }
                    }
                }
                let paren = self.consume(TokenKind::RightParen, ErrorKind::MissingParen)?;
                expr = Expr::Call { callee: Box::new(expr), paren, args };
            } else if self.match_any(&[TokenKind::LeftBracket]) {
                let bracket = self.previous();
                let index = Box::new(self.expression()?);
                self.consume(TokenKind::RightBracket, ErrorKind::MissingBracket)?;
                expr = Expr::Index { object: Box::new(expr), bracket, index };
            } else {
                break;
            }
        }
        Ok(expr)
    }

    fn primary(&mut self) -> Result<Expr, LasmError> {
        if self.match_any(&[TokenKind::False]) {
            return Ok(Expr::Literal(Value::Bool(false)));
        }
        if self.match_any(&[TokenKind::True]) {
            return Ok(Expr::Literal(Value::Bool(true)));
        }
        if self.match_any(&[TokenKind::Nil]) {
            return Ok(Expr::Literal(Value::Nil));
        }
        if self.match_any(&[TokenKind::Number, TokenKind::Real, TokenKind::String]) {
            return Ok(Expr::Literal(self.previous().literal));
        }
        if self.match_any(&[TokenKind::LeftParen]) {
            let expr = self.expression()?;
            self.consume(TokenKind::RightParen, ErrorKind::MissingParen)?;
            return Ok(Expr::Grouping(Box::new(expr)));
        }
        if self.match_any(&[TokenKind::LeftBracket]) {
            let mut elements = Vec::new();
            if !self.check(TokenKind::RightBracket) {
                loop {
                    elements.push(self.expression()?);
                    if !self.match_any(&[TokenKind::Comma]) {
                        break;
                    }
                }
            }
            self.consume(TokenKind::RightBracket, ErrorKind::MissingBracket)?;
            return Ok(Expr::List(elements));
        }
        if self.match_any(&[TokenKind::Identifier]) {
            return Ok(Expr::Variable(self.previous()));
        }
        Err(LasmError::new(ErrorKind::UnexpectedToken, self.peek().clone()))
    }
}
