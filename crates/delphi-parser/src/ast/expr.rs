//! Expression AST nodes.
//!
//! Every expression carries a [`NodeId`]. An identifier expression reuses the
//! id of its [`Ident`]. An index expression is anchored at its opening bracket
//! so that positional queries (such as the compiler switches active at the
//! node) see the state at `[`.
//!
//! Typecasts such as `Single(1.0)` or `string(P)` are parsed as calls; the
//! resolver distinguishes them by what the callee names.

use crate::ast::node::Ident;
use crate::ast::ops::{BinaryOp, UnaryOp};
use delphi_core::{NodeId, Span};

/// An expression.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Expr<'ast> {
    pub id: NodeId,
    pub kind: ExprKind<'ast>,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ExprKind<'ast> {
    /// Literal value
    Literal(Literal<'ast>),
    /// Identifier reference
    Ident(Ident<'ast>),
    /// `inherited` or `inherited Name`; arguments come from an enclosing call.
    Inherited(Option<Ident<'ast>>),
    /// `base.name`
    Member {
        base: &'ast Expr<'ast>,
        name: Ident<'ast>,
    },
    /// `callee(args)`
    Call {
        callee: &'ast Expr<'ast>,
        args: &'ast [Expr<'ast>],
    },
    /// `base[i, j]`
    Index {
        base: &'ast Expr<'ast>,
        indices: &'ast [Expr<'ast>],
    },
    /// `p^`
    Deref(&'ast Expr<'ast>),
    Unary {
        op: UnaryOp,
        operand: &'ast Expr<'ast>,
    },
    Binary {
        op: BinaryOp,
        left: &'ast Expr<'ast>,
        right: &'ast Expr<'ast>,
    },
    /// `[1, 3..5, X]`; also open array arguments such as `Format(S, [A, B])`.
    SetCtor(&'ast [SetElement<'ast>]),
    /// `(expr)`
    Paren(&'ast Expr<'ast>),
    /// `(1, 2, 3)` in a typed constant.
    Aggregate(&'ast [Expr<'ast>]),
    /// `(X: 1; Y: 2)` in a typed constant.
    RecordConst(&'ast [FieldInit<'ast>]),
}

impl<'ast> Expr<'ast> {
    /// Strip any number of enclosing parentheses.
    pub fn unparen(&self) -> &Expr<'ast> {
        let mut expr = self;
        while let ExprKind::Paren(inner) = expr.kind {
            expr = inner;
        }
        expr
    }

    /// The identifier, if this is a bare name.
    pub fn as_ident(&self) -> Option<&Ident<'ast>> {
        match &self.kind {
            ExprKind::Ident(ident) => Some(ident),
            _ => None,
        }
    }

    /// The dotted text if this expression is a chain of names (`A.B.C`).
    pub fn dotted_path(&self) -> Option<Vec<Ident<'ast>>> {
        match self.kind {
            ExprKind::Ident(ident) => Some(vec![ident]),
            ExprKind::Member { base, name } => {
                let mut path = base.dotted_path()?;
                path.push(name);
                Some(path)
            }
            _ => None,
        }
    }
}

/// A literal value. String literals are stored decoded.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Literal<'ast> {
    Integer(i64),
    Real(f64),
    /// Decoded text; `'a'` and `#65` are one-character strings.
    String(&'ast str),
    Nil,
}

impl Literal<'_> {
    /// Whether this is a one-character string, which types as `Char`.
    pub fn is_char(&self) -> bool {
        matches!(self, Literal::String(s) if s.chars().count() == 1)
    }
}

/// A set constructor element: a single value or a range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SetElement<'ast> {
    pub low: &'ast Expr<'ast>,
    pub high: Option<&'ast Expr<'ast>>,
}

/// `Name: value` inside a record constant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldInit<'ast> {
    pub name: Ident<'ast>,
    pub value: &'ast Expr<'ast>,
}
