//! Statement AST nodes.

use crate::ast::expr::Expr;
use crate::ast::node::Ident;
use crate::ast::types::TypeExpr;
use delphi_core::Span;

/// A statement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Stmt<'ast> {
    pub kind: StmtKind<'ast>,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StmtKind<'ast> {
    /// `begin ... end`
    Compound(Block<'ast>),
    /// `target := value`
    Assign {
        target: &'ast Expr<'ast>,
        value: &'ast Expr<'ast>,
    },
    /// A call or other expression used as a statement.
    Expr(&'ast Expr<'ast>),
    If {
        condition: &'ast Expr<'ast>,
        then_branch: &'ast Stmt<'ast>,
        else_branch: Option<&'ast Stmt<'ast>>,
    },
    Case(&'ast CaseStmt<'ast>),
    While {
        condition: &'ast Expr<'ast>,
        body: &'ast Stmt<'ast>,
    },
    Repeat {
        body: &'ast [Stmt<'ast>],
        condition: &'ast Expr<'ast>,
    },
    For(&'ast ForStmt<'ast>),
    ForIn(&'ast ForInStmt<'ast>),
    With {
        subjects: &'ast [Expr<'ast>],
        body: &'ast Stmt<'ast>,
    },
    Try(&'ast TryStmt<'ast>),
    /// `raise`, `raise E`, `raise E at Addr`
    Raise {
        exception: Option<&'ast Expr<'ast>>,
        at: Option<&'ast Expr<'ast>>,
    },
    Empty,
}

/// A `begin ... end` block.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Block<'ast> {
    pub stmts: &'ast [Stmt<'ast>],
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CaseStmt<'ast> {
    pub selector: &'ast Expr<'ast>,
    pub arms: &'ast [CaseArm<'ast>],
    pub else_branch: Option<&'ast [Stmt<'ast>]>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CaseArm<'ast> {
    pub labels: &'ast [CaseLabel<'ast>],
    pub body: &'ast Stmt<'ast>,
}

/// `1`, `'a'..'z'`, `Red`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CaseLabel<'ast> {
    pub low: &'ast Expr<'ast>,
    pub high: Option<&'ast Expr<'ast>>,
}

/// The loop variable of a `for` statement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoopVar<'ast> {
    pub name: Ident<'ast>,
    /// `for var I := ...` declares the variable inline.
    pub is_inline: bool,
    /// `for var I: Integer := ...`
    pub ty: Option<&'ast TypeExpr<'ast>>,
}

/// `for I := A to B do ...`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ForStmt<'ast> {
    pub var: LoopVar<'ast>,
    pub from: &'ast Expr<'ast>,
    pub to: &'ast Expr<'ast>,
    pub is_downto: bool,
    pub body: &'ast Stmt<'ast>,
}

/// `for X in Items do ...`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ForInStmt<'ast> {
    pub var: LoopVar<'ast>,
    pub collection: &'ast Expr<'ast>,
    pub body: &'ast Stmt<'ast>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TryStmt<'ast> {
    pub body: &'ast [Stmt<'ast>],
    pub handler: TryHandler<'ast>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TryHandler<'ast> {
    /// `except` with `on` handlers, or a plain statement list.
    Except {
        handlers: &'ast [ExceptHandler<'ast>],
        /// Statements of an `except` block without `on` clauses.
        stmts: &'ast [Stmt<'ast>],
        else_branch: Option<&'ast [Stmt<'ast>]>,
    },
    Finally(&'ast [Stmt<'ast>]),
}

/// `on E: EFoo do ...`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExceptHandler<'ast> {
    pub var: Option<Ident<'ast>>,
    pub ty: &'ast TypeExpr<'ast>,
    pub body: &'ast Stmt<'ast>,
    pub span: Span,
}
