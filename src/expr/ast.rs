//! Expression AST produced by [`super::parser`].
//!
//! The grammar is a deliberately small subset of Python expressions: arithmetic, comparisons, boolean connectives, calls into
//! a whitelisted function/namespace registry, indexing/slicing, list/tuple literals, and a
//! fixed set of numeric-array attribute/methods. There are no comprehensions, no lambdas, no
//! attribute access beyond the whitelist, and no imports.

#[derive(Debug, Clone, PartialEq)]
pub enum UnOp {
    Neg,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    FloorDiv,
    Mod,
    Pow,
    MatMul,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoolOp {
    And,
    Or,
}

/// An expression node.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(String),
    /// Bare identifier — resolved against the evaluator's namespace.
    Ident(String),
    List(Vec<Expr>),
    Tuple(Vec<Expr>),
    Unary(UnOp, Box<Expr>),
    Binary(BinOp, Box<Expr>, Box<Expr>),
    BoolOp(BoolOp, Box<Expr>, Box<Expr>),
    Not(Box<Expr>),
    Compare(Box<Expr>, CmpOp, Box<Expr>),
    /// `callee(args...)`. `callee` is restricted by the evaluator to names resolvable in the
    /// registry (plain names or `np.name`) — arbitrary callables are not supported.
    Call(Box<Expr>, Vec<Expr>),
    /// `base.attr`, e.g. `x.T`, `x.shape` — whitelisted attribute names only.
    Attr(Box<Expr>, String),
    /// `base.method(args...)`, e.g. `x.flatten()`, `x.reshape(2, 3)`.
    MethodCall(Box<Expr>, String, Vec<Expr>),
    /// `base[index]`.
    Index(Box<Expr>, Box<Expr>),
    /// `base[start:stop:step]` — any component may be absent.
    Slice(Box<Expr>, Option<Box<Expr>>, Option<Box<Expr>>, Option<Box<Expr>>),
    /// A dotted path, e.g. `np.array` — kept distinct from `Attr` because it names a
    /// registry function rather than a whitelisted value attribute.
    Dotted(String, String),
}
