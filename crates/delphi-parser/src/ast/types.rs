//! Type expression AST nodes.
//!
//! Type expressions appear in declarations (`X: TFoo`), type definitions
//! (`TArr = array of Integer`), parameters and casts. Classes, interfaces and
//! records are only valid as the right-hand side of a type declaration and are
//! represented by [`TypeDef`](crate::ast::decl::TypeDef) instead.

use crate::ast::decl::ParamGroup;
use crate::ast::expr::Expr;
use crate::ast::node::{DottedName, Ident};
use delphi_core::{NodeId, ProceduralKind, Span};

/// A type expression.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TypeExpr<'ast> {
    pub id: NodeId,
    pub kind: TypeExprKind<'ast>,
    pub span: Span,
}

impl<'ast> TypeExpr<'ast> {
    /// The referenced name, if this is a plain named type.
    pub fn as_named(&self) -> Option<&DottedName<'ast>> {
        match &self.kind {
            TypeExprKind::Named(name) => Some(name),
            _ => None,
        }
    }

    /// Whether `X = <this>` declares a weak alias rather than a new type.
    pub fn is_alias_target(&self) -> bool {
        matches!(
            self.kind,
            TypeExprKind::Named(_) | TypeExprKind::String { max_len: None }
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TypeExprKind<'ast> {
    /// `TFoo`, `System.SysUtils.TBytes`
    Named(DottedName<'ast>),
    /// `string` or `string[N]`
    String { max_len: Option<&'ast Expr<'ast>> },
    /// `array[0..9] of T`, `array of T`. No dimensions means dynamic, or open
    /// when used as a parameter type.
    Array {
        dims: &'ast [TypeExpr<'ast>],
        element: &'ast TypeExpr<'ast>,
        is_packed: bool,
    },
    /// `array of const`
    ArrayOfConst,
    /// `set of T`
    Set(&'ast TypeExpr<'ast>),
    /// `^T`
    Pointer(&'ast TypeExpr<'ast>),
    /// `class of T`
    ClassOf(DottedName<'ast>),
    /// `Low..High`
    Subrange {
        low: &'ast Expr<'ast>,
        high: &'ast Expr<'ast>,
    },
    /// `(A, B = 5, C)`
    Enum(&'ast [EnumMember<'ast>]),
    /// `procedure(...)`, `function(...): T of object`, `reference to ...`
    Procedural(&'ast ProceduralTypeExpr<'ast>),
}

/// An enumerated value, optionally with an explicit ordinal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnumMember<'ast> {
    pub name: Ident<'ast>,
    pub value: Option<&'ast Expr<'ast>>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProceduralTypeExpr<'ast> {
    pub params: &'ast [ParamGroup<'ast>],
    /// Present for `function` types.
    pub result: Option<&'ast TypeExpr<'ast>>,
    pub kind: ProceduralKind,
}
