//! Declaration AST nodes.
//!
//! Provides nodes for units, `uses` clauses, declaration sections and the
//! member lists of classes, records and interfaces. A declaration's
//! [`NodeId`](delphi_core::NodeId) is the id of its name identifier.

use crate::ast::expr::Expr;
use crate::ast::node::{Attribute, DottedName, Ident};
use crate::ast::stmt::Block;
use crate::ast::types::TypeExpr;
use delphi_core::{NodeId, ParamFlags, RoutineFlags, RoutineKind, Span, Visibility};

/// A parsed `unit`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UnitAst<'ast> {
    pub name: DottedName<'ast>,
    pub interface: UnitSection<'ast>,
    pub implementation: UnitSection<'ast>,
    pub initialization: Option<Block<'ast>>,
    pub finalization: Option<Block<'ast>>,
    pub span: Span,
}

/// The `interface` or `implementation` part of a unit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UnitSection<'ast> {
    pub uses: &'ast [UsesItem<'ast>],
    pub decls: &'ast [Decl<'ast>],
    pub span: Span,
}

/// One entry of a `uses` clause: `System.SysUtils`, `Foo in 'Foo.pas'`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UsesItem<'ast> {
    pub id: NodeId,
    pub name: DottedName<'ast>,
    pub path: Option<&'ast str>,
    pub span: Span,
}

/// A declaration in a declaration section.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Decl<'ast> {
    Type(&'ast TypeDecl<'ast>),
    Const(&'ast ConstDecl<'ast>),
    Var(&'ast VarDecl<'ast>),
    Routine(&'ast RoutineDecl<'ast>),
}

impl Decl<'_> {
    pub fn span(&self) -> Span {
        match self {
            Decl::Type(d) => d.span,
            Decl::Const(d) => d.span,
            Decl::Var(d) => d.span,
            Decl::Routine(d) => d.header.span,
        }
    }
}

// ==========================================================================
// Types
// ==========================================================================

/// `TFoo = ...;`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TypeDecl<'ast> {
    pub name: Ident<'ast>,
    pub attributes: &'ast [Attribute<'ast>],
    pub def: TypeDef<'ast>,
    pub span: Span,
}

/// The right-hand side of a type declaration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TypeDef<'ast> {
    /// `X = Y` (weak alias) or `X = array of Y` and other anonymous constructors.
    Type(&'ast TypeExpr<'ast>),
    /// `X = type Y`
    Strong(&'ast TypeExpr<'ast>),
    Class(&'ast ClassDef<'ast>),
    /// `TFoo = class;`
    ClassForward,
    Interface(&'ast InterfaceDef<'ast>),
    /// `IFoo = interface;`
    InterfaceForward,
    Record(&'ast RecordDef<'ast>),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClassDef<'ast> {
    /// Ancestor class first (if any), then implemented interfaces.
    pub ancestors: &'ast [DottedName<'ast>],
    pub members: &'ast [Member<'ast>],
    pub is_abstract: bool,
    pub is_sealed: bool,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InterfaceDef<'ast> {
    pub ancestors: &'ast [DottedName<'ast>],
    pub guid: Option<&'ast str>,
    pub members: &'ast [Member<'ast>],
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RecordDef<'ast> {
    pub members: &'ast [Member<'ast>],
    pub is_packed: bool,
    pub span: Span,
}

/// A member of a class, record or interface body.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Member<'ast> {
    pub visibility: Visibility,
    pub kind: MemberKind<'ast>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MemberKind<'ast> {
    Field(&'ast FieldDecl<'ast>),
    Method(&'ast RoutineHeader<'ast>),
    Property(&'ast PropertyDecl<'ast>),
    Const(&'ast ConstDecl<'ast>),
    Type(&'ast TypeDecl<'ast>),
}

/// `A, B: Integer;` inside a type body.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldDecl<'ast> {
    pub names: &'ast [Ident<'ast>],
    pub ty: &'ast TypeExpr<'ast>,
    pub attributes: &'ast [Attribute<'ast>],
    pub is_class_var: bool,
    pub span: Span,
}

/// `property Items[I: Integer]: T read GetItem write SetItem; default;`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PropertyDecl<'ast> {
    pub name: Ident<'ast>,
    pub params: &'ast [ParamGroup<'ast>],
    /// Absent when an inherited property is redeclared to change visibility.
    pub ty: Option<&'ast TypeExpr<'ast>>,
    pub read: Option<Ident<'ast>>,
    pub write: Option<Ident<'ast>>,
    pub index: Option<&'ast Expr<'ast>>,
    pub is_default: bool,
    pub is_class: bool,
    pub attributes: &'ast [Attribute<'ast>],
    pub span: Span,
}

// ==========================================================================
// Constants and variables
// ==========================================================================

/// `X = 5;`, `X: Integer = 5;`, or a `resourcestring` entry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConstDecl<'ast> {
    pub name: Ident<'ast>,
    pub ty: Option<&'ast TypeExpr<'ast>>,
    pub value: &'ast Expr<'ast>,
    pub attributes: &'ast [Attribute<'ast>],
    pub is_resource_string: bool,
    pub span: Span,
}

/// `A, B: Integer;` or `X: Integer = 5;` in a `var` section.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VarDecl<'ast> {
    pub names: &'ast [Ident<'ast>],
    pub ty: &'ast TypeExpr<'ast>,
    pub init: Option<&'ast Expr<'ast>>,
    pub attributes: &'ast [Attribute<'ast>],
    pub is_thread_var: bool,
    pub span: Span,
}

// ==========================================================================
// Routines
// ==========================================================================

/// A routine heading, shared by interface declarations, class members and
/// implementations.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RoutineHeader<'ast> {
    pub kind: RoutineKind,
    /// `TFoo.Bar` for a method implementation, `Bar` otherwise.
    pub name: DottedName<'ast>,
    pub params: &'ast [ParamGroup<'ast>],
    pub result: Option<&'ast TypeExpr<'ast>>,
    pub flags: RoutineFlags,
    pub attributes: &'ast [Attribute<'ast>],
    pub span: Span,
}

impl<'ast> RoutineHeader<'ast> {
    /// The routine's own name (last segment).
    pub fn simple_name(&self) -> Option<&Ident<'ast>> {
        self.name.last()
    }

    /// Number of declared parameters, counting every name of each group.
    pub fn param_count(&self) -> usize {
        self.params.iter().map(|g| g.names.len()).sum()
    }
}

/// `const A, B: Integer = 0`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamGroup<'ast> {
    pub names: &'ast [Ident<'ast>],
    /// Untyped `var`/`const` parameters have no type.
    pub ty: Option<&'ast TypeExpr<'ast>>,
    pub flags: ParamFlags,
    pub default: Option<&'ast Expr<'ast>>,
    pub attributes: &'ast [Attribute<'ast>],
}

/// A routine declaration, with a body when it is an implementation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RoutineDecl<'ast> {
    pub header: &'ast RoutineHeader<'ast>,
    pub body: Option<&'ast RoutineBody<'ast>>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RoutineBody<'ast> {
    /// Local `var`, `const`, `type` sections and nested routines.
    pub decls: &'ast [Decl<'ast>],
    pub block: Block<'ast>,
}
