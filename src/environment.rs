//! Scope chains
//!
//! Two parallel chains exist during evaluation: the *variable* environment
//! (lexical scope for `let`/function parameters) and the *label*
//! environment (addresses bound by `label:` statements). Both use the same
//! [Environment] type; the interpreter just keeps two separate pointers
//! into two separate trees (spec.md §3, "Environment").
//!
//! Parent links are reference-counted rather than arena-indexed (spec.md §9
//! suggests either); closures created by `fn` capture an `Rc<Environment>`
//! directly, which keeps the borrow-free call-by-sharing the C++
//! `shared_ptr<Environment>` chain relied on.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::value::Value;

/// A named scope holding `name -> value` plus a link to its parent.
///
/// Label environments are additionally optionally named (via
/// `setScopeName`), used as a dotted prefix when the symbols writer
/// qualifies a binding (spec.md §4.5).
pub struct Environment {
    values: RefCell<HashMap<String, Value>>,
    pub parent: Option<Rc<Environment>>,
    name: RefCell<Option<String>>,
}

impl Environment {
    pub fn root() -> Rc<Environment> {
        Rc::new(Environment { values: RefCell::new(HashMap::new()), parent: None, name: RefCell::new(None) })
    }

    pub fn child(parent: &Rc<Environment>) -> Rc<Environment> {
        Rc::new(Environment {
            values: RefCell::new(HashMap::new()),
            parent: Some(Rc::clone(parent)),
            name: RefCell::new(None),
        })
    }

    pub fn define(&self, name: &str, value: Value) {
        self.values.borrow_mut().insert(name.to_string(), value);
    }

    /// `let`/assignment redefinition: always overwrites in the innermost
    /// scope, matching spec.md's "redefinition is allowed (assignment
    /// semantics)".
    pub fn get(&self, name: &str) -> Option<Value> {
        if let Some(v) = self.values.borrow().get(name) {
            return Some(v.clone());
        }
        self.parent.as_ref().and_then(|p| p.get(name))
    }

    /// True if `name` is bound in this exact scope (not an ancestor) —
    /// used by `let` to detect a same-scope label collision.
    pub fn has_own(&self, name: &str) -> bool {
        self.values.borrow().contains_key(name)
    }

    /// Walk up the chain until an existing binding is found and overwrite
    /// it there; used by `assign` (`x = expr`) which must not shadow.
    pub fn assign(&self, name: &str, value: Value) -> bool {
        if self.values.borrow().contains_key(name) {
            self.values.borrow_mut().insert(name.to_string(), value);
            return true;
        }
        match &self.parent {
            Some(p) => p.assign(name, value),
            None => false,
        }
    }

    pub fn set_name(&self, name: impl Into<String>) {
        *self.name.borrow_mut() = Some(name.into());
    }

    pub fn own_name(&self) -> Option<String> {
        self.name.borrow().clone()
    }

    /// Join every ancestor's non-empty scope name with `delim`, ending in
    /// `leaf`, producing the fully qualified symbol name for the writer.
    pub fn qualify(self: &Rc<Self>, leaf: &str, delim: &str) -> String {
        let mut parts = Vec::new();
        let mut cur = Some(Rc::clone(self));
        while let Some(env) = cur {
            if let Some(name) = env.own_name() {
                if !name.is_empty() {
                    parts.push(name);
                }
            }
            cur = env.parent.clone();
        }
        parts.reverse();
        parts.push(leaf.to_string());
        parts.join(delim)
    }

    /// Snapshot of this scope's own bindings, for the symbols writer.
    pub fn own_bindings(&self) -> Vec<(String, Value)> {
        self.values
            .borrow()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn variables_shadow_across_scopes() {
        let root = Environment::root();
        root.define("x", Value::Integer(1));
        let child = Environment::child(&root);
        child.define("x", Value::Integer(2));
        assert_eq!(child.get("x"), Some(Value::Integer(2)));
        assert_eq!(root.get("x"), Some(Value::Integer(1)));
    }

    #[test]
    fn assign_walks_up_to_existing_binding() {
        let root = Environment::root();
        root.define("x", Value::Integer(1));
        let child = Environment::child(&root);
        assert!(child.assign("x", Value::Integer(9)));
        assert_eq!(root.get("x"), Some(Value::Integer(9)));
        assert!(!child.assign("missing", Value::Nil));
    }

    #[test]
    fn qualify_joins_named_ancestors_only() {
        let root = Environment::root();
        let scope1 = Environment::child(&root);
        scope1.set_name("scope1");
        let scope2 = Environment::child(&scope1);
        assert_eq!(scope2.qualify("sublabel", "."), "scope1.sublabel");
    }
}
