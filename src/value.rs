//! The runtime [Value] type shared by every expression and statement
//!
//! Mirrors `LasmObject` from `original_source/src/object.h`: a small tagged
//! union rather than a class hierarchy, matched instead of visited.

use std::fmt;
use std::rc::Rc;

use crate::environment::Environment;
use crate::error::{ErrorKind, LasmError};
use crate::interpreter::Interpreter;
use crate::stmt::Stmt;
use crate::token::Token;

/// A value produced by evaluating an expression.
///
/// Integers are `lasmNumber` (at least 64-bit signed); reals are IEEE-754
/// binary64. Equality (`PartialEq`) is only meaningful within the same
/// variant, matching `LasmObject::isEqual`.
#[derive(Clone)]
pub enum Value {
    Nil,
    Integer(i64),
    Real(f64),
    String(String),
    Bool(bool),
    List(Vec<Value>),
    Callable(Rc<dyn Callable>),
}

impl Value {
    /// True for integer/real, matching `LasmObject::isScalar`.
    pub fn is_scalar(&self) -> bool {
        matches!(self, Value::Integer(_) | Value::Real(_))
    }

    /// Nil and `false` are falsy; every other value (including `0`) is truthy.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Nil => false,
            Value::Bool(b) => *b,
            _ => true,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Nil => "nil",
            Value::Integer(_) => "integer",
            Value::Real(_) => "real",
            Value::String(_) => "string",
            Value::Bool(_) => "bool",
            Value::List(_) => "list",
            Value::Callable(_) => "callable",
        }
    }

    pub fn as_integer(&self, token: &Token) -> Result<i64, LasmError> {
        match self {
            Value::Integer(n) => Ok(*n),
            Value::Real(r) => Ok(*r as i64),
            _ => Err(LasmError::new(ErrorKind::TypeError, token.clone())),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) => true,
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Real(a), Value::Real(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => write!(f, "nil"),
            Value::Integer(n) => write!(f, "{n}"),
            Value::Real(r) => write!(f, "{r}"),
            Value::String(s) => write!(f, "{s:?}"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::List(l) => write!(f, "{l:?}"),
            Value::Callable(_) => write!(f, "<callable>"),
        }
    }
}

/// A callable value: either a native builtin or a user-defined function.
///
/// Mirrors `Callable` in `original_source/src/callable.h`.
pub trait Callable {
    fn arity(&self) -> usize;
    fn call(&self, interpreter: &mut Interpreter, args: Vec<Value>, at: &Token) -> Result<Value, LasmError>;
    fn name(&self) -> &str;
}

/// A user-defined `fn`, closing over the environment active at definition.
pub struct LasmFunction {
    pub name: String,
    pub params: Vec<Token>,
    pub body: Rc<Vec<Stmt>>,
    pub closure: Rc<Environment>,
}

impl Callable for LasmFunction {
    fn arity(&self) -> usize {
        self.params.len()
    }

    fn call(&self, interpreter: &mut Interpreter, args: Vec<Value>, _at: &Token) -> Result<Value, LasmError> {
        let call_env = Environment::child(&self.closure);
        for (param, arg) in self.params.iter().zip(args.into_iter()) {
            call_env.define(&param.lexeme, arg);
        }
        match interpreter.execute_block(&self.body, call_env, None) {
            Ok(()) => Ok(Value::Nil),
            Err(Unwind::Return(value)) => Ok(value),
            Err(Unwind::Error(e)) => Err(e),
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Non-local control transfer used by statement execution: a `return`
/// unwinds to the call site without walking back out through every pass as
/// a hard error, per spec.md's design note on modelling `return` as a
/// sentinel rather than a language-level exception.
pub enum Unwind {
    Return(Value),
    Error(LasmError),
}

impl From<LasmError> for Unwind {
    fn from(e: LasmError) -> Unwind {
        Unwind::Error(e)
    }
}
