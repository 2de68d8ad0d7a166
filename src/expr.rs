//! Expression AST nodes
//!
//! A tagged enum replaces the C++ `Expr` class hierarchy and
//! `ExprVisitor` (spec.md §9: "prefer a tagged union of node kinds plus
//! match-dispatched evaluation"). `Box` breaks the otherwise-infinite size
//! of the recursive variants.

use crate::token::Token;
use crate::value::Value;

#[derive(Debug, Clone)]
pub enum Expr {
    Literal(Value),
    Grouping(Box<Expr>),
    Unary { op: Token, right: Box<Expr> },
    Binary { left: Box<Expr>, op: Token, right: Box<Expr> },
    Logical { left: Box<Expr>, op: Token, right: Box<Expr> },
    Variable(Token),
    Assign { name: Token, value: Box<Expr> },
    Call { callee: Box<Expr>, paren: Token, args: Vec<Expr> },
    List(Vec<Expr>),
    Index { object: Box<Expr>, bracket: Token, index: Box<Expr> },
    IndexAssign { object: Box<Expr>, bracket: Token, index: Box<Expr>, value: Box<Expr> },
}
