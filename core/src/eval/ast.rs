//! Expression tree produced from `expr.pest`

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOp {
    Neg,
    Pos,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    FloorDiv,
    Mod,
    Pow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BoolOp {
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    In,
    NotIn,
    Is,
    IsNot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ComprehensionKind {
    List,
    Set,
    Dict,
    Generator,
}

/// Expression AST node
///
/// `Attribute`, `Lambda`, `Comprehension` and `Import` are parsed only so the
/// validator can name them when rejecting the expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "t")]
pub enum Expr {
    None,
    Bool { v: bool },
    Int { v: i64 },
    Float { v: f64 },
    Str { v: String },
    Name { name: String },
    List { items: Vec<Expr> },
    Dict { entries: Vec<(Expr, Expr)> },
    Unary { op: UnaryOp, operand: Box<Expr> },
    Binary { op: BinaryOp, left: Box<Expr>, right: Box<Expr> },
    Logical { op: BoolOp, values: Vec<Expr> },
    Compare { left: Box<Expr>, rest: Vec<(CmpOp, Expr)> },
    IfElse { test: Box<Expr>, body: Box<Expr>, orelse: Box<Expr> },
    Subscript { value: Box<Expr>, index: Box<Expr> },
    Call { func: Box<Expr>, args: Vec<Expr>, kwargs: Vec<(String, Expr)> },
    Attribute { value: Box<Expr>, attr: String },
    Lambda { params: Vec<String>, body: Box<Expr> },
    Comprehension { kind: ComprehensionKind },
    Import { statement: String },
}

/// Positional and keyword arguments of an argument list, still unevaluated
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ArgList {
    pub positional: Vec<Expr>,
    pub keyword: Vec<(String, Expr)>,
}
