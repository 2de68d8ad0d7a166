//! The two-pass tree-walking interpreter
//!
//! Mirrors `original_source/src/interpreter.cc`'s statement/expression
//! visitors, but as a single `match` per node kind instead of a double
//! dispatch through `StmtVisitor`/`ExprVisitor` (spec.md §9).
//!
//! Assembly runs in two passes (spec.md §4.4): pass 0 walks the whole
//! program once to discover label addresses and instruction sizes
//! optimistically; pass 1 re-walks it with every label now resolvable and
//! keeps the emitted bytes. Addressing-mode ambiguity is settled at most
//! once per statement — at parse time for a literal operand, or by the
//! generator the first time it runs for a variable/label operand — and
//! written back into `Stmt::Instruction::mode`, so a generator's byte count
//! cannot drift between the two passes.

use std::cell::Cell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::environment::Environment;
use crate::error::{ErrorKind, ErrorSink, LasmError};
use crate::expr::Expr;
use crate::instruction_set::{InstructionCall, InstructionResult, InstructionSet};
use crate::parser::Parser;
use crate::reader::{canonical_key, SourceReader};
use crate::scanner::Scanner;
use crate::stmt::Stmt;
use crate::token::{SourceText, Token, TokenKind};
use crate::value::{Callable, Unwind, Value};

pub struct Interpreter {
    pub globals: Rc<Environment>,
    environment: Rc<Environment>,
    global_labels: Rc<Environment>,
    labels: Rc<Environment>,
    /// every label scope created this pass, kept alive for the symbols
    /// writer once the final pass completes (spec.md §4.5).
    pub label_table: Vec<Rc<Environment>>,
    pub address: u64,
    pass: u8,
    passes: u8,
    pub code: Vec<InstructionResult>,
    pub instructions: Rc<dyn InstructionSet>,
    reader: Rc<dyn SourceReader>,
    import_cache: HashMap<String, Rc<Vec<Stmt>>>,
    incbin_cache: HashMap<String, Rc<Vec<u8>>>,
    /// set by a variable/label lookup that fell through to a nil
    /// placeholder during pass 0; the enclosing instruction statement
    /// checks and clears it to decide whether it is still unresolved.
    unresolved_this_pass: Cell<bool>,
}

impl Interpreter {
    pub fn new(instructions: Rc<dyn InstructionSet>, reader: Rc<dyn SourceReader>) -> Interpreter {
        let globals = Environment::root();
        let global_labels = Environment::root();
        crate::builtins::install(&globals);
        Interpreter {
            globals: Rc::clone(&globals),
            environment: globals,
            global_labels: Rc::clone(&global_labels),
            labels: global_labels,
            label_table: Vec::new(),
            address: 0,
            pass: 0,
            passes: 2,
            code: Vec::new(),
            instructions,
            reader,
            import_cache: HashMap::new(),
            incbin_cache: HashMap::new(),
            unresolved_this_pass: Cell::new(false),
        }
    }

    pub fn pass(&self) -> u8 {
        self.pass
    }

    /// The label environment currently in scope, named by `setScopeName`
    /// for the symbols writer's dotted qualification (spec.md §4.5).
    pub fn current_label_scope(&self) -> &Rc<Environment> {
        &self.labels
    }

    pub fn is_final_pass(&self) -> bool {
        self.pass + 1 == self.passes
    }

    /// Run `passes` full passes over `stmts`, resetting the address and the
    /// label chain before each one (spec.md §4.4). The variable environment
    /// is intentionally NOT reset: `let` bindings are redefinitions, so
    /// re-executing the same statements in a later pass just overwrites them
    /// with values computed now that more labels are resolvable.
    pub fn interpret(&mut self, stmts: &[Stmt], passes: u8, sink: &mut ErrorSink) -> Result<Vec<InstructionResult>, LasmError> {
        self.passes = passes;
        for p in 0..passes {
            self.pass = p;
            self.address = 0;
            self.global_labels = Environment::root();
            self.labels = Rc::clone(&self.global_labels);
            self.label_table.clear();
            self.label_table.push(Rc::clone(&self.global_labels));
            self.code.clear();

            for stmt in stmts {
                if let Err(unwind) = self.execute(stmt) {
                    match unwind {
                        Unwind::Error(e) => {
                            sink.report(e)?;
                        }
                        Unwind::Return(_) => {
                            return Err(LasmError::new(ErrorKind::ReturnOutsideFunction, top_level_token(stmts)));
                        }
                    }
                }
            }
        }
        Ok(std::mem::take(&mut self.code))
    }

    // ---- statement execution ----

    pub fn execute(&mut self, stmt: &Stmt) -> Result<(), Unwind> {
        match stmt {
            Stmt::Expression(expr) => {
                self.evaluate(expr)?;
                Ok(())
            }
            Stmt::Let { name, init } => self.exec_let(name, init.as_ref()),
            Stmt::Block(stmts) => {
                let env = Environment::child(&self.environment);
                let labels = Environment::child(&self.labels);
                self.execute_block(stmts, env, Some(labels))
            }
            Stmt::If { cond, then_branch, else_branch } => {
                if self.evaluate(cond)?.is_truthy() {
                    self.execute(then_branch)
                } else if let Some(else_branch) = else_branch {
                    self.execute(else_branch)
                } else {
                    Ok(())
                }
            }
            Stmt::While { cond, body } => {
                while self.evaluate(cond)?.is_truthy() {
                    self.execute(body)?;
                }
                Ok(())
            }
            Stmt::Function { name, params, body } => {
                let func = crate::value::LasmFunction {
                    name: name.lexeme.clone(),
                    params: params.clone(),
                    body: Rc::clone(body),
                    closure: Rc::clone(&self.environment),
                };
                self.environment.define(&name.lexeme, Value::Callable(Rc::new(func)));
                Ok(())
            }
            Stmt::Return { value, .. } => {
                let v = match value {
                    Some(e) => self.evaluate(e)?,
                    None => Value::Nil,
                };
                Err(Unwind::Return(v))
            }
            Stmt::Label(name) => self.exec_label(name),
            Stmt::Instruction { name, info, args, mode, fully_resolved } => {
                self.unresolved_this_pass.set(false);
                let call = InstructionCall { name, args, mode, fully_resolved };
                let result = info.generator.generate(self, info, &call).map_err(Unwind::from)?;
                if self.unresolved_this_pass.get() {
                    fully_resolved.set(false);
                }
                if self.is_final_pass() {
                    self.code.push(result);
                }
                Ok(())
            }
            Stmt::Directive { name, args, handler } => {
                let mut values = Vec::with_capacity(args.len());
                for a in args {
                    values.push(self.evaluate(a)?);
                }
                handler.execute(self, &values, name).map_err(Unwind::from)
            }
            Stmt::Org { token, addr } => {
                let v = self.evaluate(addr)?;
                self.address = v.as_integer(token).map_err(Unwind::from)? as u64;
                Ok(())
            }
            Stmt::Align { token, to, fill } => self.exec_align(token, to, fill),
            Stmt::Fill { token, to_addr, value } => self.exec_fill(token, to_addr, value),
            Stmt::DefineByte { token, values, unit_size, endianness } => self.exec_define_byte(token, values, *unit_size, *endianness),
            Stmt::Bss { token, start, declarations } => self.exec_bss(token, start, declarations),
            Stmt::Include { token, path } => self.exec_include(token, path),
            Stmt::Incbin { token, path } => self.exec_incbin(token, path),
        }
    }

    /// Execute a block of statements in a freshly-entered variable scope
    /// (and, if given, label scope), restoring the previous scopes on the
    /// way out whether the block finished normally or unwound.
    pub fn execute_block(&mut self, stmts: &[Stmt], env: Rc<Environment>, labels: Option<Rc<Environment>>) -> Result<(), Unwind> {
        let prev_env = std::mem::replace(&mut self.environment, env);
        let prev_labels = labels.map(|l| {
            self.label_table.push(Rc::clone(&l));
            std::mem::replace(&mut self.labels, l)
        });

        let result = (|| {
            for s in stmts {
                self.execute(s)?;
            }
            Ok(())
        })();

        self.environment = prev_env;
        if let Some(prev_labels) = prev_labels {
            self.labels = prev_labels;
        }
        result
    }

    fn exec_let(&mut self, name: &Token, init: Option<&Expr>) -> Result<(), Unwind> {
        if self.labels.has_own(&name.lexeme) {
            return Err(Unwind::Error(LasmError::new(ErrorKind::DuplicateLabel, name.clone())));
        }
        let value = match init {
            Some(e) => self.evaluate(e)?,
            None => Value::Nil,
        };
        self.environment.define(&name.lexeme, value);
        Ok(())
    }

    fn exec_label(&mut self, name: &Token) -> Result<(), Unwind> {
        self.labels.define(&name.lexeme, Value::Integer(self.address as i64));
        Ok(())
    }

    fn exec_align(&mut self, token: &Token, to: &Expr, fill: &Expr) -> Result<(), Unwind> {
        let to = self.evaluate(to)?.as_integer(token).map_err(Unwind::from)?;
        let fill = self.evaluate(fill)?.as_integer(token).map_err(Unwind::from)? as u8;
        if to <= 0 {
            return Err(Unwind::Error(LasmError::new(ErrorKind::ValueOutOfRange, token.clone())));
        }
        let to = to as u64;
        let padding = (to - (self.address % to)) % to;
        self.emit_fill_bytes(token, fill, padding as usize);
        Ok(())
    }

    fn exec_fill(&mut self, token: &Token, to_addr: &Expr, value: &Expr) -> Result<(), Unwind> {
        let target = self.evaluate(to_addr)?.as_integer(token).map_err(Unwind::from)? as u64;
        let value = self.evaluate(value)?.as_integer(token).map_err(Unwind::from)? as u8;
        if target < self.address {
            return Err(Unwind::Error(LasmError::new(ErrorKind::ValueOutOfRange, token.clone())));
        }
        let n = (target - self.address) as usize;
        self.emit_fill_bytes(token, value, n);
        Ok(())
    }

    fn emit_fill_bytes(&mut self, token: &Token, byte: u8, n: usize) {
        let result = InstructionResult { bytes: vec![byte; n], address: self.address, token: token.clone() };
        self.address += n as u64;
        if self.is_final_pass() {
            self.code.push(result);
        }
    }

    fn exec_define_byte(&mut self, token: &Token, values: &[Expr], unit_size: usize, endianness: crate::instruction_set::Endianness) -> Result<(), Unwind> {
        let mut bytes = Vec::with_capacity(values.len() * unit_size);
        for expr in values {
            let v = self.evaluate(expr)?;
            match v {
                Value::String(s) => bytes.extend(s.bytes()),
                other => {
                    let n = other.as_integer(token).map_err(Unwind::from)?;
                    push_int(&mut bytes, n, unit_size, endianness);
                }
            }
        }
        let result = InstructionResult { bytes, address: self.address, token: token.clone() };
        self.address += result.size() as u64;
        if self.is_final_pass() {
            self.code.push(result);
        }
        Ok(())
    }

    fn exec_bss(&mut self, token: &Token, start: &Expr, declarations: &[(Token, Expr)]) -> Result<(), Unwind> {
        self.address = self.evaluate(start)?.as_integer(token).map_err(Unwind::from)? as u64;
        for (name, size_expr) in declarations {
            if self.labels.has_own(&name.lexeme) {
                return Err(Unwind::Error(LasmError::new(ErrorKind::DuplicateLabel, name.clone())));
            }
            self.labels.define(&name.lexeme, Value::Integer(self.address as i64));
            let size = self.evaluate(size_expr)?.as_integer(name).map_err(Unwind::from)?;
            if size < 0 {
                return Err(Unwind::Error(LasmError::new(ErrorKind::ValueOutOfRange, name.clone())));
            }
            self.address += size as u64;
        }
        Ok(())
    }

    fn exec_include(&mut self, token: &Token, path: &Expr) -> Result<(), Unwind> {
        let path_val = self.evaluate(path)?;
        let path_str = match path_val {
            Value::String(s) => s,
            _ => return Err(Unwind::Error(LasmError::new(ErrorKind::TypeError, token.clone()))),
        };

        let key = canonical_key(&self.reader.current_dir(), &path_str);
        let cached = self.import_cache.get(&key).cloned();
        let stmts = match cached {
            Some(s) => s,
            None => {
                // Resolve and read relative to the *including* file's directory,
                // before `change_dir` below moves into the included file's own
                // directory for its nested includes.
                let text = self.reader.read_to_string(&path_str, token).map_err(Unwind::from)?;
                let source = SourceText::new(path_str.clone(), text);
                let mut sink = ErrorSink::new(true);
                let tokens = Scanner::new(source, self.instructions.as_ref())
                    .scan_tokens(&mut sink)
                    .map_err(Unwind::from)?;
                let parsed = Parser::new(tokens, Rc::clone(&self.instructions))
                    .parse(&mut sink)
                    .map_err(Unwind::from)?;
                let parsed = Rc::new(parsed);
                self.import_cache.insert(key, Rc::clone(&parsed));
                parsed
            }
        };

        // cd into the included file's directory for the duration of executing
        // its statements, so any `include`/`incbin` nested inside it resolve
        // relative to where it lives rather than the caller's directory
        // (spec.md §5: scoped acquire/release composes across nested includes).
        let reader = Rc::clone(&self.reader);
        let _guard = reader.change_dir(&path_str, true);
        for s in stmts.iter() {
            self.execute(s)?;
        }
        Ok(())
    }

    fn exec_incbin(&mut self, token: &Token, path: &Expr) -> Result<(), Unwind> {
        let path_val = self.evaluate(path)?;
        let path_str = match path_val {
            Value::String(s) => s,
            _ => return Err(Unwind::Error(LasmError::new(ErrorKind::TypeError, token.clone()))),
        };

        let key = canonical_key(&self.reader.current_dir(), &path_str);
        let bytes = match self.incbin_cache.get(&key).cloned() {
            Some(b) => b,
            None => {
                let b = Rc::new(self.reader.read_bytes(&path_str, token).map_err(Unwind::from)?);
                self.incbin_cache.insert(key, Rc::clone(&b));
                b
            }
        };

        let result = InstructionResult { bytes: (*bytes).clone(), address: self.address, token: token.clone() };
        self.address += result.size() as u64;
        if self.is_final_pass() {
            self.code.push(result);
        }
        Ok(())
    }

    // ---- expression evaluation ----

    pub fn evaluate(&mut self, expr: &Expr) -> Result<Value, Unwind> {
        match expr {
            Expr::Literal(v) => Ok(v.clone()),
            Expr::Grouping(inner) => self.evaluate(inner),
            Expr::Unary { op, right } => self.eval_unary(op, right),
            Expr::Binary { left, op, right } => self.eval_binary(left, op, right),
            Expr::Logical { left, op, right } => self.eval_logical(left, op, right),
            Expr::Variable(name) => self.eval_variable(name),
            Expr::Assign { name, value } => self.eval_assign(name, value),
            Expr::Call { callee, paren, args } => self.eval_call(callee, paren, args),
            Expr::List(elements) => {
                let mut values = Vec::with_capacity(elements.len());
                for e in elements {
                    values.push(self.evaluate(e)?);
                }
                Ok(Value::List(values))
            }
            Expr::Index { object, bracket, index } => self.eval_index(object, bracket, index),
            Expr::IndexAssign { object, bracket, index, value } => self.eval_index_assign(object, bracket, index, value),
        }
    }

    fn eval_variable(&mut self, name: &Token) -> Result<Value, Unwind> {
        if let Some(v) = self.environment.get(&name.lexeme) {
            return Ok(v);
        }
        if let Some(v) = self.labels.get(&name.lexeme) {
            return Ok(v);
        }
        if self.pass == 0 {
            self.unresolved_this_pass.set(true);
            Ok(Value::Nil)
        } else {
            Err(Unwind::Error(LasmError::new(ErrorKind::UndefinedRef, name.clone())))
        }
    }

    fn eval_assign(&mut self, name: &Token, value: &Expr) -> Result<Value, Unwind> {
        let v = self.evaluate(value)?;
        if self.environment.assign(&name.lexeme, v.clone()) {
            return Ok(v);
        }
        Err(Unwind::Error(LasmError::new(ErrorKind::UndefinedRef, name.clone())))
    }

    fn eval_logical(&mut self, left: &Expr, op: &Token, right: &Expr) -> Result<Value, Unwind> {
        let left = self.evaluate(left)?;
        if op.kind == TokenKind::Or {
            if left.is_truthy() {
                return Ok(left);
            }
        } else if !left.is_truthy() {
            return Ok(left);
        }
        self.evaluate(right)
    }

    fn eval_unary(&mut self, op: &Token, right: &Expr) -> Result<Value, Unwind> {
        let v = self.evaluate(right)?;
        match op.kind {
            TokenKind::Minus => match v {
                Value::Integer(n) => Ok(Value::Integer(-n)),
                Value::Real(r) => Ok(Value::Real(-r)),
                _ => Err(Unwind::Error(LasmError::new(ErrorKind::TypeError, op.clone()))),
            },
            TokenKind::Bang => Ok(Value::Bool(!v.is_truthy())),
            TokenKind::BinNot => match v {
                Value::Integer(n) => Ok(Value::Integer(!n)),
                _ => Err(Unwind::Error(LasmError::new(ErrorKind::TypeError, op.clone()))),
            },
            _ => unreachable!("unary operator token kind not in {{-, !, ~}}"),
        }
    }

    fn eval_call(&mut self, callee: &Expr, paren: &Token, args: &[Expr]) -> Result<Value, Unwind> {
        let callee = self.evaluate(callee)?;
        let mut values = Vec::with_capacity(args.len());
        for a in args {
            values.push(self.evaluate(a)?);
        }
        match callee {
            Value::Callable(f) => {
                if f.arity() != values.len() {
                    return Err(Unwind::Error(LasmError::new(ErrorKind::ArityError, paren.clone())));
                }
                f.call(self, values, paren).map_err(Unwind::from)
            }
            _ => Err(Unwind::Error(LasmError::new(ErrorKind::TypeError, paren.clone()))),
        }
    }

    fn eval_index(&mut self, object: &Expr, bracket: &Token, index: &Expr) -> Result<Value, Unwind> {
        let list = self.evaluate(object)?;
        let idx = self.evaluate(index)?.as_integer(bracket).map_err(Unwind::from)?;
        match list {
            Value::List(items) => get_index(&items, idx, bracket),
            _ => Err(Unwind::Error(LasmError::new(ErrorKind::TypeError, bracket.clone()))),
        }
    }

    /// Index-assignment only supports a bare variable as the list lvalue
    /// (`name[i] = expr`); lists are plain values in the environment, so
    /// mutating through an arbitrary expression would need a general
    /// lvalue reference the grammar does not otherwise provide.
    fn eval_index_assign(&mut self, object: &Expr, bracket: &Token, index: &Expr, value: &Expr) -> Result<Value, Unwind> {
        let name = match object {
            Expr::Variable(name) => name,
            _ => return Err(Unwind::Error(LasmError::new(ErrorKind::TypeError, bracket.clone()))),
        };
        let idx = self.evaluate(index)?.as_integer(bracket).map_err(Unwind::from)?;
        let new_value = self.evaluate(value)?;

        let mut list = match self.environment.get(&name.lexeme) {
            Some(Value::List(items)) => items,
            Some(_) => return Err(Unwind::Error(LasmError::new(ErrorKind::TypeError, bracket.clone()))),
            None => return Err(Unwind::Error(LasmError::new(ErrorKind::UndefinedRef, name.clone()))),
        };
        if idx < 0 || idx as usize >= list.len() {
            return Err(Unwind::Error(LasmError::new(ErrorKind::ValueOutOfRange, bracket.clone())));
        }
        list[idx as usize] = new_value.clone();
        self.environment.assign(&name.lexeme, Value::List(list));
        Ok(new_value)
    }

    fn eval_binary(&mut self, left: &Expr, op: &Token, right: &Expr) -> Result<Value, Unwind> {
        let l = self.evaluate(left)?;
        let r = self.evaluate(right)?;
        match op.kind {
            TokenKind::Plus => add(l, r, op),
            TokenKind::Minus => numeric(l, r, op, |a, b| a - b, |a, b| a - b),
            TokenKind::Star => numeric(l, r, op, |a, b| a * b, |a, b| a * b),
            TokenKind::Slash => divide(l, r, op),
            TokenKind::Percent => modulo(l, r, op),
            TokenKind::EqualEqual => Ok(Value::Bool(l == r)),
            TokenKind::BangEqual => Ok(Value::Bool(l != r)),
            TokenKind::Less => compare(l, r, op, |o| o == std::cmp::Ordering::Less),
            TokenKind::LessEqual => compare(l, r, op, |o| o != std::cmp::Ordering::Greater),
            TokenKind::Greater => compare(l, r, op, |o| o == std::cmp::Ordering::Greater),
            TokenKind::GreaterEqual => compare(l, r, op, |o| o != std::cmp::Ordering::Less),
            TokenKind::BinAnd => bitwise(l, r, op, |a, b| a & b),
            TokenKind::BinOr => bitwise(l, r, op, |a, b| a | b),
            TokenKind::BinXor => bitwise(l, r, op, |a, b| a ^ b),
            TokenKind::ShiftLeft => bitwise(l, r, op, |a, b| a << b),
            TokenKind::ShiftRight => bitwise(l, r, op, |a, b| a >> b),
            _ => unreachable!("binary operator token kind not a recognised operator"),
        }
        .map_err(Unwind::from)
    }
}

fn top_level_token(stmts: &[Stmt]) -> Token {
    // used only to build a location for a malformed top-level `return`;
    // any token from the program will do since this path never actually
    // triggers for well-formed input (the parser never emits `return`
    // outside of a `fn` body).
    fn first_token(stmt: &Stmt) -> Option<Token> {
        match stmt {
            Stmt::Label(t) => Some(t.clone()),
            Stmt::Org { token, .. }
            | Stmt::Fill { token, .. }
            | Stmt::Align { token, .. }
            | Stmt::DefineByte { token, .. }
            | Stmt::Bss { token, .. }
            | Stmt::Include { token, .. }
            | Stmt::Incbin { token, .. } => Some(token.clone()),
            Stmt::Instruction { name, .. } | Stmt::Directive { name, .. } | Stmt::Let { name, .. } | Stmt::Function { name, .. } => Some(name.clone()),
            Stmt::Return { keyword, .. } => Some(keyword.clone()),
            _ => None,
        }
    }
    stmts.iter().find_map(first_token).unwrap_or_else(|| Token::new(TokenKind::Eof, "", Value::Nil, 0, 0, SourceText::new("", "")))
}

fn push_int(bytes: &mut Vec<u8>, n: i64, unit_size: usize, endianness: crate::instruction_set::Endianness) {
    let mut digits: Vec<u8> = (0..unit_size).map(|i| ((n >> (8 * i)) & 0xFF) as u8).collect();
    if endianness == crate::instruction_set::Endianness::Big {
        digits.reverse();
    }
    bytes.extend(digits);
}

fn get_index(items: &[Value], idx: i64, at: &Token) -> Result<Value, Unwind> {
    if idx < 0 || idx as usize >= items.len() {
        return Err(Unwind::Error(LasmError::new(ErrorKind::ValueOutOfRange, at.clone())));
    }
    Ok(items[idx as usize].clone())
}

/// `+`: integer+integer -> integer, real+real -> real, string+string ->
/// concatenation, integer+real promotes to real; anything else is a type
/// error (spec.md §4.4).
fn add(l: Value, r: Value, op: &Token) -> Result<Value, LasmError> {
    match (l, r) {
        (Value::Integer(a), Value::Integer(b)) => Ok(Value::Integer(a + b)),
        (Value::String(a), Value::String(b)) => Ok(Value::String(a + &b)),
        (a, b) if a.is_scalar() && b.is_scalar() => numeric(a, b, op, |x, y| x + y, |x, y| x + y),
        _ => Err(LasmError::new(ErrorKind::TypeError, op.clone())),
    }
}

/// Shared integer/real promotion for `-`, `*`, and (via [add]) `+`.
fn numeric(l: Value, r: Value, op: &Token, int_op: fn(i64, i64) -> i64, real_op: fn(f64, f64) -> f64) -> Result<Value, LasmError> {
    match (l, r) {
        (Value::Integer(a), Value::Integer(b)) => Ok(Value::Integer(int_op(a, b))),
        (Value::Real(a), Value::Real(b)) => Ok(Value::Real(real_op(a, b))),
        (Value::Integer(a), Value::Real(b)) => Ok(Value::Real(real_op(a as f64, b))),
        (Value::Real(a), Value::Integer(b)) => Ok(Value::Real(real_op(a, b as f64))),
        _ => Err(LasmError::new(ErrorKind::TypeError, op.clone())),
    }
}

fn divide(l: Value, r: Value, op: &Token) -> Result<Value, LasmError> {
    match (&l, &r) {
        (Value::Integer(_), Value::Integer(b)) if *b == 0 => Err(LasmError::new(ErrorKind::DivisionByZero, op.clone())),
        (Value::Real(_), Value::Real(b)) if *b == 0.0 => Err(LasmError::new(ErrorKind::DivisionByZero, op.clone())),
        _ => numeric(l, r, op, |a, b| a / b, |a, b| a / b),
    }
}

fn modulo(l: Value, r: Value, op: &Token) -> Result<Value, LasmError> {
    match (l, r) {
        (Value::Integer(a), Value::Integer(b)) => {
            if b == 0 {
                Err(LasmError::new(ErrorKind::DivisionByZero, op.clone()))
            } else {
                Ok(Value::Integer(a % b))
            }
        }
        _ => Err(LasmError::new(ErrorKind::TypeError, op.clone())),
    }
}

fn compare(l: Value, r: Value, op: &Token, accept: fn(std::cmp::Ordering) -> bool) -> Result<Value, LasmError> {
    let (a, b) = match (&l, &r) {
        (Value::Integer(a), Value::Integer(b)) => (*a as f64, *b as f64),
        (Value::Real(a), Value::Real(b)) => (*a, *b),
        (Value::Integer(a), Value::Real(b)) => (*a as f64, *b),
        (Value::Real(a), Value::Integer(b)) => (*a, *b as f64),
        _ => return Err(LasmError::new(ErrorKind::TypeError, op.clone())),
    };
    let ordering = a.partial_cmp(&b).ok_or_else(|| LasmError::new(ErrorKind::TypeError, op.clone()))?;
    Ok(Value::Bool(accept(ordering)))
}

fn bitwise(l: Value, r: Value, op: &Token, f: fn(i64, i64) -> i64) -> Result<Value, LasmError> {
    match (l, r) {
        (Value::Integer(a), Value::Integer(b)) => Ok(Value::Integer(f(a, b))),
        _ => Err(LasmError::new(ErrorKind::TypeError, op.clone())),
    }
}
