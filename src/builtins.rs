//! Native callables
//!
//! Installed into the interpreter's global variable environment before the
//! first pass runs. Mirrors the small set of helper functions
//! `original_source/src/interpreter.cc` wires up ahead of time (`hi`, `lo`,
//! `len`, `ord`) plus `setScopeName`, used to name the enclosing label
//! scope for the symbols writer (spec.md §4.5).

use std::rc::Rc;

use crate::environment::Environment;
use crate::error::{ErrorKind, LasmError};
use crate::interpreter::Interpreter;
use crate::token::Token;
use crate::value::{Callable, Value};

pub fn install(globals: &Rc<Environment>) {
    define(globals, Hi);
    define(globals, Lo);
    define(globals, Len);
    define(globals, Ord);
    define(globals, SetScopeName);
}

fn define(globals: &Rc<Environment>, f: impl Callable + 'static) {
    let name = f.name().to_string();
    globals.define(&name, Value::Callable(Rc::new(f)));
}

/// `hi(n)`: the high byte of a 16-bit value.
struct Hi;
impl Callable for Hi {
    fn arity(&self) -> usize {
        1
    }
    fn call(&self, _interp: &mut Interpreter, args: Vec<Value>, at: &Token) -> Result<Value, LasmError> {
        let n = args[0].as_integer(at)?;
        Ok(Value::Integer((n >> 8) & 0xFF))
    }
    fn name(&self) -> &str {
        "hi"
    }
}

/// `lo(n)`: the low byte of a 16-bit value.
struct Lo;
impl Callable for Lo {
    fn arity(&self) -> usize {
        1
    }
    fn call(&self, _interp: &mut Interpreter, args: Vec<Value>, at: &Token) -> Result<Value, LasmError> {
        let n = args[0].as_integer(at)?;
        Ok(Value::Integer(n & 0xFF))
    }
    fn name(&self) -> &str {
        "lo"
    }
}

/// `len(x)`: length of a string or a list.
struct Len;
impl Callable for Len {
    fn arity(&self) -> usize {
        1
    }
    fn call(&self, _interp: &mut Interpreter, args: Vec<Value>, at: &Token) -> Result<Value, LasmError> {
        match &args[0] {
            Value::String(s) => Ok(Value::Integer(s.len() as i64)),
            Value::List(l) => Ok(Value::Integer(l.len() as i64)),
            _ => Err(LasmError::new(ErrorKind::TypeError, at.clone())),
        }
    }
    fn name(&self) -> &str {
        "len"
    }
}

/// `ord(s)`: the code point of a single-character string.
struct Ord;
impl Callable for Ord {
    fn arity(&self) -> usize {
        1
    }
    fn call(&self, _interp: &mut Interpreter, args: Vec<Value>, at: &Token) -> Result<Value, LasmError> {
        match &args[0] {
            Value::String(s) => {
                let mut chars = s.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => Ok(Value::Integer(c as i64)),
                    _ => Err(LasmError::new(ErrorKind::ValueOutOfRange, at.clone())),
                }
            }
            _ => Err(LasmError::new(ErrorKind::TypeError, at.clone())),
        }
    }
    fn name(&self) -> &str {
        "ord"
    }
}

/// `setScopeName(s)`: names the label environment active in the current
/// block, used by the symbols writer to build dotted qualified names
/// (spec.md §4.5, `Environment::qualify`).
struct SetScopeName;
impl Callable for SetScopeName {
    fn arity(&self) -> usize {
        1
    }
    fn call(&self, interp: &mut Interpreter, args: Vec<Value>, at: &Token) -> Result<Value, LasmError> {
        match &args[0] {
            Value::String(s) => {
                interp.current_label_scope().set_name(s.clone());
                Ok(Value::Nil)
            }
            _ => Err(LasmError::new(ErrorKind::TypeError, at.clone())),
        }
    }
    fn name(&self) -> &str {
        "setScopeName"
    }
}
