//! Statement AST nodes
//!
//! As with [crate::expr::Expr], a tagged enum replaces the C++ `Stmt`
//! hierarchy and `StmtVisitor` (spec.md §9).

use std::cell::Cell;
use std::rc::Rc;

use crate::expr::Expr;
use crate::instruction_set::{Endianness, InstructionInfo};
use crate::token::Token;
use crate::value::Value;

pub enum Stmt {
    Expression(Expr),
    Let { name: Token, init: Option<Expr> },
    Block(Vec<Stmt>),
    If { cond: Expr, then_branch: Box<Stmt>, else_branch: Option<Box<Stmt>> },
    While { cond: Expr, body: Box<Stmt> },
    Function { name: Token, params: Vec<Token>, body: Rc<Vec<Stmt>> },
    Return { keyword: Token, value: Option<Expr> },
    Label(Token),
    Instruction {
        name: Token,
        info: Rc<InstructionInfo>,
        args: Vec<Expr>,
        /// the addressing-mode tag. Literal operands settle this at parse
        /// time; a non-literal operand (variable, label) is parsed with a
        /// provisional tag and the generator resolves it from the evaluated
        /// value the first time it runs, then writes the decision back here
        /// so every later pass reuses the same mode and the same size.
        mode: Cell<&'static str>,
        /// cleared during pass 0 whenever an operand could not be resolved;
        /// pass 1 raises `UNDEFINED_REF` if it is still unresolved then.
        fully_resolved: Cell<bool>,
    },
    Directive { name: Token, args: Vec<Expr>, handler: Rc<dyn crate::instruction_set::DirectiveHandler> },
    Org { token: Token, addr: Expr },
    Align { token: Token, to: Expr, fill: Expr },
    Fill { token: Token, to_addr: Expr, value: Expr },
    DefineByte { token: Token, values: Vec<Expr>, unit_size: usize, endianness: Endianness },
    Bss { token: Token, start: Expr, declarations: Vec<(Token, Expr)> },
    Include { token: Token, path: Expr },
    Incbin { token: Token, path: Expr },
}

/// A constant literal value baked directly into an `Expr::Literal`, used
/// when the scanner hands the parser an already-computed number/string.
pub fn literal(value: Value) -> Expr {
    Expr::Literal(value)
}
