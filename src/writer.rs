//! Binary and symbols writers
//!
//! Consume the interpreter's final-pass outputs (spec.md §4.5): the binary
//! writer concatenates every [InstructionResult]'s bytes in address order;
//! the symbols writer walks the label table plus the global variable
//! environment and emits one `qualified.name = value` line per scalar
//! binding.

use std::rc::Rc;

use crate::environment::Environment;
use crate::instruction_set::InstructionResult;
use crate::value::Value;

pub fn write_binary(code: &[InstructionResult]) -> Vec<u8> {
    let mut out = Vec::new();
    for result in code {
        out.extend_from_slice(&result.bytes);
    }
    out
}

pub struct SymbolsSettings {
    pub hex_prefix: String,
    pub delimiter: String,
}

impl Default for SymbolsSettings {
    fn default() -> SymbolsSettings {
        SymbolsSettings { hex_prefix: "0x".to_string(), delimiter: ".".to_string() }
    }
}

/// Traverses `label_table` (every label environment created during the
/// final pass, in creation order) and then `globals` (the top-level
/// variable environment), formatting one line per `integer`/`real`/`string`
/// binding. Bindings within a single environment are ordered alphabetically
/// for a stable listing, since `Environment` is hash-map backed.
pub fn write_symbols(label_table: &[Rc<Environment>], globals: &Rc<Environment>, settings: &SymbolsSettings) -> String {
    let mut out = String::new();
    for env in label_table {
        emit_scope(env, settings, &mut out);
    }
    emit_scope(globals, settings, &mut out);
    out
}

fn emit_scope(env: &Rc<Environment>, settings: &SymbolsSettings, out: &mut String) {
    let mut bindings = env.own_bindings();
    bindings.sort_by(|a, b| a.0.cmp(&b.0));
    for (name, value) in bindings {
        if let Some(formatted) = format_value(&value, &settings.hex_prefix) {
            let qualified = env.qualify(&name, &settings.delimiter);
            out.push_str(&qualified);
            out.push_str(" = ");
            out.push_str(&formatted);
            out.push('\n');
        }
    }
}

fn format_value(value: &Value, hex_prefix: &str) -> Option<String> {
    match value {
        Value::Integer(n) => Some(format!("{hex_prefix}{n:x}")),
        Value::Real(r) => Some(r.to_string()),
        Value::String(s) => Some(s.clone()),
        _ => None,
    }
}
