//! Declarations.
//!
//! A [`Declaration`] is created during the declaring unit's resolution and is
//! frozen once that unit is published. References from other nodes and units
//! go through [`DeclRef`] handles.

use ordered_float::OrderedFloat;

use crate::{DeclRef, Name, NodeId, QualifiedName, ScopeId, Span, TypeRef, UnitId, Visibility};

use super::routine::{Param, ParamFlags, Routine};

/// Source section a declaration or reference lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum Section {
    #[default]
    Interface,
    Implementation,
    Initialization,
    Finalization,
}

impl Section {
    pub fn as_str(self) -> &'static str {
        match self {
            Section::Interface => "interface",
            Section::Implementation => "implementation",
            Section::Initialization => "initialization",
            Section::Finalization => "finalization",
        }
    }
}

/// A compile-time constant value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ConstValue {
    Integer(i64),
    Real(OrderedFloat<f64>),
    Boolean(bool),
    Char(char),
    String(String),
    Nil,
}

impl ConstValue {
    /// Try to convert this value to an i64.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            ConstValue::Integer(v) => Some(*v),
            ConstValue::Boolean(v) => Some(*v as i64),
            ConstValue::Char(c) => Some(*c as i64),
            _ => None,
        }
    }

    /// Try to convert this value to an f64.
    pub fn as_real(&self) -> Option<f64> {
        match self {
            ConstValue::Integer(v) => Some(*v as f64),
            ConstValue::Real(v) => Some(v.into_inner()),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ConstValue::Boolean(v) => Some(*v),
            _ => None,
        }
    }
}

/// What a variable declaration stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VariableKind {
    /// Unit-level `var` or `threadvar`.
    Global,
    /// Routine-local `var`.
    Local,
    /// Formal parameter inside the routine body.
    Param(ParamFlags),
    /// Implicit `Self` of a method.
    SelfRef,
    /// Implicit `Result` of a function.
    Result,
    /// Loop variable introduced by an inline `for var`.
    Loop,
    /// Exception variable of an `on E: T do` handler.
    Handler,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    pub ty: TypeRef,
    pub kind: VariableKind,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub ty: TypeRef,
    /// `class var`.
    pub is_class_var: bool,
}

/// A property accessor: the name written after `read`/`write` and what it resolved to.
#[derive(Debug, Clone, PartialEq)]
pub struct Accessor {
    pub name: Name,
    pub target: Option<DeclRef>,
}

impl Accessor {
    pub fn named(name: impl Into<Name>) -> Self {
        Self {
            name: name.into(),
            target: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Property {
    pub ty: TypeRef,
    /// Index parameters of an array property.
    pub params: Vec<Param>,
    pub read: Option<Accessor>,
    pub write: Option<Accessor>,
    /// `default` array property of the class.
    pub is_default: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Constant {
    pub ty: TypeRef,
    /// Folded value when the initializer is a constant expression.
    pub value: Option<ConstValue>,
    /// `const X: T = ...`.
    pub is_typed: bool,
}

/// Tagged declaration variant.
#[derive(Debug, Clone, PartialEq)]
pub enum DeclKind {
    Routine(Routine),
    Variable(Variable),
    Field(Field),
    Property(Property),
    Constant(Constant),
    /// Any named type that is not a class, record, interface or enum:
    /// aliases, sets, arrays, pointers, procedural types, subranges.
    TypeAlias(TypeRef),
    ClassType(TypeRef),
    RecordType(TypeRef),
    InterfaceType(TypeRef),
    EnumType(TypeRef),
    EnumValue { ty: TypeRef, ordinal: i64 },
}

impl DeclKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeclKind::Routine(_) => "routine",
            DeclKind::Variable(_) => "variable",
            DeclKind::Field(_) => "field",
            DeclKind::Property(_) => "property",
            DeclKind::Constant(_) => "constant",
            DeclKind::TypeAlias(_) => "type",
            DeclKind::ClassType(_) => "class",
            DeclKind::RecordType(_) => "record",
            DeclKind::InterfaceType(_) => "interface",
            DeclKind::EnumType(_) => "enum",
            DeclKind::EnumValue { .. } => "enum value",
        }
    }

    /// The type named by a type declaration.
    pub fn declared_type(&self) -> Option<TypeRef> {
        match self {
            DeclKind::TypeAlias(ty)
            | DeclKind::ClassType(ty)
            | DeclKind::RecordType(ty)
            | DeclKind::InterfaceType(ty)
            | DeclKind::EnumType(ty) => Some(*ty),
            _ => None,
        }
    }

    /// The type of the value denoted by a value declaration.
    pub fn value_type(&self) -> Option<TypeRef> {
        match self {
            DeclKind::Variable(v) => Some(v.ty),
            DeclKind::Field(f) => Some(f.ty),
            DeclKind::Property(p) => Some(p.ty),
            DeclKind::Constant(c) => Some(c.ty),
            DeclKind::EnumValue { ty, .. } => Some(*ty),
            _ => None,
        }
    }

    pub fn is_type(&self) -> bool {
        self.declared_type().is_some()
    }
}

/// A declaration in a unit's declaration arena.
#[derive(Debug, Clone, PartialEq)]
pub struct Declaration {
    pub name: Name,
    pub qualified_name: QualifiedName,
    pub kind: DeclKind,
    pub unit: UnitId,
    /// Scope the declaration was declared in.
    pub scope: ScopeId,
    /// Owning class/record/interface for members.
    pub owner: Option<TypeRef>,
    pub visibility: Visibility,
    pub section: Section,
    pub span: Span,
    /// Declaring syntax node, absent for built-ins and implicit declarations.
    pub node: Option<NodeId>,
    /// Custom attribute names written before the declaration.
    pub attributes: Vec<Name>,
    /// Synthesized by the resolver (`Self`, `Result`).
    pub is_implicit: bool,
}

impl Declaration {
    /// Create a declaration with public visibility and no owner.
    pub fn new(
        name: impl Into<Name>,
        qualified_name: QualifiedName,
        kind: DeclKind,
        unit: UnitId,
        scope: ScopeId,
    ) -> Self {
        Self {
            name: name.into(),
            qualified_name,
            kind,
            unit,
            scope,
            owner: None,
            visibility: Visibility::Public,
            section: Section::Interface,
            span: Span::default(),
            node: None,
            attributes: Vec::new(),
            is_implicit: false,
        }
    }

    // === Builder Methods ===

    pub fn with_owner(mut self, owner: TypeRef) -> Self {
        self.owner = Some(owner);
        self
    }

    pub fn with_visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = visibility;
        self
    }

    pub fn with_section(mut self, section: Section) -> Self {
        self.section = section;
        self
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn with_node(mut self, node: NodeId) -> Self {
        self.node = Some(node);
        self
    }

    pub fn with_attributes(mut self, attributes: Vec<Name>) -> Self {
        self.attributes = attributes;
        self
    }

    pub fn implicit(mut self) -> Self {
        self.is_implicit = true;
        self
    }

    // === Queries ===

    /// Whether any custom attribute annotates this declaration.
    pub fn has_attributes(&self) -> bool {
        !self.attributes.is_empty()
    }

    pub fn is_routine(&self) -> bool {
        matches!(self.kind, DeclKind::Routine(_))
    }

    pub fn as_routine(&self) -> Option<&Routine> {
        match &self.kind {
            DeclKind::Routine(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_routine_mut(&mut self) -> Option<&mut Routine> {
        match &mut self.kind {
            DeclKind::Routine(r) => Some(r),
            _ => None,
        }
    }

    pub fn is_member(&self) -> bool {
        self.owner.is_some()
    }
}
