//! Type entries.
//!
//! Every type of the program, named or anonymous, is a [`TypeEntry`] in the
//! type arena of the unit that declared it. Types refer to each other through
//! [`TypeRef`] handles, which is what lets `TNode = class Next: TNode; end`
//! exist without an ownership cycle.

use crate::{DeclRef, Name, ScopeId, TypeRef};

use super::routine::Signature;
use super::symbols::SymbolTable;

/// A type in a unit's type arena.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeEntry {
    /// Declared name, `None` for anonymous types (`array of Integer` inline).
    pub name: Option<Name>,
    /// The structure of the type.
    pub kind: TypeKind,
    /// The declaration introducing the name, if any.
    pub decl: Option<DeclRef>,
}

impl TypeEntry {
    /// Create an anonymous type.
    pub fn anonymous(kind: TypeKind) -> Self {
        Self {
            name: None,
            kind,
            decl: None,
        }
    }

    /// Create a named type.
    pub fn named(name: impl Into<Name>, kind: TypeKind) -> Self {
        Self {
            name: Some(name.into()),
            kind,
            decl: None,
        }
    }

    /// Set the declaring declaration.
    pub fn with_decl(mut self, decl: DeclRef) -> Self {
        self.decl = Some(decl);
        self
    }

    /// Whether this is an unfilled forward placeholder.
    pub fn is_placeholder(&self) -> bool {
        matches!(self.kind, TypeKind::Placeholder)
    }
}

/// Integer family members.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum IntegerKind {
    ShortInt,
    SmallInt,
    Integer,
    Int64,
    Byte,
    Word,
    Cardinal,
    UInt64,
    NativeInt,
    NativeUInt,
}

impl IntegerKind {
    /// Storage size in bytes.
    pub fn size(self) -> u8 {
        match self {
            IntegerKind::ShortInt | IntegerKind::Byte => 1,
            IntegerKind::SmallInt | IntegerKind::Word => 2,
            IntegerKind::Integer | IntegerKind::Cardinal => 4,
            IntegerKind::Int64
            | IntegerKind::UInt64
            | IntegerKind::NativeInt
            | IntegerKind::NativeUInt => 8,
        }
    }

    pub fn is_signed(self) -> bool {
        matches!(
            self,
            IntegerKind::ShortInt
                | IntegerKind::SmallInt
                | IntegerKind::Integer
                | IntegerKind::Int64
                | IntegerKind::NativeInt
        )
    }

    /// Whether this kind needs 64-bit arithmetic.
    pub fn is_64_bit(self) -> bool {
        self.size() == 8
    }

    pub fn name(self) -> &'static str {
        match self {
            IntegerKind::ShortInt => "ShortInt",
            IntegerKind::SmallInt => "SmallInt",
            IntegerKind::Integer => "Integer",
            IntegerKind::Int64 => "Int64",
            IntegerKind::Byte => "Byte",
            IntegerKind::Word => "Word",
            IntegerKind::Cardinal => "Cardinal",
            IntegerKind::UInt64 => "UInt64",
            IntegerKind::NativeInt => "NativeInt",
            IntegerKind::NativeUInt => "NativeUInt",
        }
    }
}

/// Real family members.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RealKind {
    Single,
    Double,
    Extended,
    Currency,
    Comp,
}

impl RealKind {
    pub fn name(self) -> &'static str {
        match self {
            RealKind::Single => "Single",
            RealKind::Double => "Double",
            RealKind::Extended => "Extended",
            RealKind::Currency => "Currency",
            RealKind::Comp => "Comp",
        }
    }
}

/// Character width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CharKind {
    /// `AnsiChar`, one byte.
    Ansi,
    /// `Char` / `WideChar`, UTF-16 code unit.
    Wide,
}

/// String family members.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StringKind {
    /// `ShortString` and `string[N]`.
    Short,
    /// `AnsiString`.
    Ansi,
    /// `WideString` (COM BSTR).
    Wide,
    /// `UnicodeString`, the default `string`.
    Unicode,
}

impl StringKind {
    /// Whether this string holds wide (UTF-16) characters.
    pub fn is_wide(self) -> bool {
        matches!(self, StringKind::Wide | StringKind::Unicode)
    }

    pub fn name(self) -> &'static str {
        match self {
            StringKind::Short => "ShortString",
            StringKind::Ansi => "AnsiString",
            StringKind::Wide => "WideString",
            StringKind::Unicode => "UnicodeString",
        }
    }
}

/// Enumerated type: its values in ordinal order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EnumType {
    pub values: Vec<DeclRef>,
}

/// `Low..High` over an ordinal base type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubrangeType {
    pub base: TypeRef,
    pub low: i64,
    pub high: i64,
}

/// Shape of an array type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArrayShape {
    /// `array[Index1, Index2] of T`; one ordinal index type per dimension.
    Static(Vec<TypeRef>),
    /// `array of T` as a declared type.
    Dynamic,
    /// `array of T` as a parameter type.
    Open,
    /// `array of const` as a parameter type; accepts any argument list.
    OfConst,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArrayType {
    pub element: TypeRef,
    pub shape: ArrayShape,
}

/// A record: members live in a scope of the declaring unit.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordType {
    pub members: ScopeId,
    pub is_packed: bool,
}

/// A class type.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassType {
    /// Single class ancestor. `None` only for `TObject` itself.
    pub ancestor: Option<TypeRef>,
    /// Implemented interfaces in declaration order.
    pub interfaces: Vec<TypeRef>,
    /// Own member scope.
    pub members: ScopeId,
    /// Own members overlaid on the ancestor's effective table.
    pub effective: SymbolTable,
    /// Still a `class;` forward declaration.
    pub is_forward: bool,
    pub is_abstract: bool,
    pub is_sealed: bool,
}

impl ClassType {
    /// Create an empty class body.
    pub fn new(members: ScopeId) -> Self {
        Self {
            ancestor: None,
            interfaces: Vec::new(),
            members,
            effective: SymbolTable::new(),
            is_forward: false,
            is_abstract: false,
            is_sealed: false,
        }
    }

    /// Create a forward placeholder for `TFoo = class;`.
    pub fn forward(members: ScopeId) -> Self {
        Self {
            is_forward: true,
            ..Self::new(members)
        }
    }

    /// Set the ancestor class.
    pub fn with_ancestor(mut self, ancestor: TypeRef) -> Self {
        self.ancestor = Some(ancestor);
        self
    }

    /// Add an implemented interface.
    pub fn with_interface(mut self, interface: TypeRef) -> Self {
        self.interfaces.push(interface);
        self
    }
}

/// An interface type.
#[derive(Debug, Clone, PartialEq)]
pub struct InterfaceType {
    /// Ancestor interfaces.
    pub ancestors: Vec<TypeRef>,
    /// `['{...}']` GUID, when given.
    pub guid: Option<String>,
    pub members: ScopeId,
    pub effective: SymbolTable,
    pub is_forward: bool,
}

impl InterfaceType {
    pub fn new(members: ScopeId) -> Self {
        Self {
            ancestors: Vec::new(),
            guid: None,
            members,
            effective: SymbolTable::new(),
            is_forward: false,
        }
    }

    /// Set the GUID.
    pub fn with_guid(mut self, guid: impl Into<String>) -> Self {
        self.guid = Some(guid.into());
        self
    }

    /// Add an ancestor interface.
    pub fn with_ancestor(mut self, ancestor: TypeRef) -> Self {
        self.ancestors.push(ancestor);
        self
    }
}

/// How a procedural type binds its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProceduralKind {
    /// `procedure(...)`: a plain routine pointer.
    Plain,
    /// `procedure(...) of object`: a method pointer.
    OfObject,
    /// `reference to procedure(...)`: an anonymous-method reference.
    Reference,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProceduralType {
    pub signature: Signature,
    pub kind: ProceduralKind,
}

/// `X = Y` (weak) or `X = type Y` (strong).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AliasType {
    pub target: TypeRef,
    pub strong: bool,
}

/// The structure of a type.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeKind {
    Integer(IntegerKind),
    Real(RealKind),
    Boolean,
    Char(CharKind),
    /// A string; `max_len` is set for `string[N]`.
    String {
        kind: StringKind,
        max_len: Option<u16>,
    },
    Enum(EnumType),
    Subrange(SubrangeType),
    /// `set of T`.
    Set(TypeRef),
    Array(ArrayType),
    Record(RecordType),
    Class(ClassType),
    Interface(InterfaceType),
    /// `^T`, or the untyped `Pointer` when `None`.
    Pointer(Option<TypeRef>),
    Procedural(ProceduralType),
    /// `class of T`.
    MetaClass(TypeRef),
    Alias(AliasType),
    /// Type of the `nil` literal.
    Nil,
    /// Untyped `var`/`const` parameter.
    Untyped,
    /// Forward placeholder; backfilled during the declaring unit's resolution.
    Placeholder,
    /// Resolution failed. Every query on it yields `Unresolved` again.
    Unresolved,
}

impl TypeKind {
    /// Short lowercase description of the variant.
    pub fn describe(&self) -> &'static str {
        match self {
            TypeKind::Integer(_) => "integer",
            TypeKind::Real(_) => "real",
            TypeKind::Boolean => "boolean",
            TypeKind::Char(_) => "char",
            TypeKind::String { .. } => "string",
            TypeKind::Enum(_) => "enum",
            TypeKind::Subrange(_) => "subrange",
            TypeKind::Set(_) => "set",
            TypeKind::Array(_) => "array",
            TypeKind::Record(_) => "record",
            TypeKind::Class(_) => "class",
            TypeKind::Interface(_) => "interface",
            TypeKind::Pointer(_) => "pointer",
            TypeKind::Procedural(_) => "procedural",
            TypeKind::MetaClass(_) => "metaclass",
            TypeKind::Alias(_) => "alias",
            TypeKind::Nil => "nil",
            TypeKind::Untyped => "untyped",
            TypeKind::Placeholder => "placeholder",
            TypeKind::Unresolved => "unresolved",
        }
    }

    /// Whether this is an ordinal type (usable as a set element, array index, `case` selector).
    pub fn is_ordinal(&self) -> bool {
        matches!(
            self,
            TypeKind::Integer(_)
                | TypeKind::Boolean
                | TypeKind::Char(_)
                | TypeKind::Enum(_)
                | TypeKind::Subrange(_)
        )
    }

    /// Member scope for types that carry one.
    pub fn member_scope(&self) -> Option<ScopeId> {
        match self {
            TypeKind::Record(r) => Some(r.members),
            TypeKind::Class(c) => Some(c.members),
            TypeKind::Interface(i) => Some(i.members),
            _ => None,
        }
    }

    /// Effective member table for class and interface types.
    pub fn effective_members(&self) -> Option<&SymbolTable> {
        match self {
            TypeKind::Class(c) => Some(&c.effective),
            TypeKind::Interface(i) => Some(&i.effective),
            _ => None,
        }
    }

    pub fn as_class(&self) -> Option<&ClassType> {
        match self {
            TypeKind::Class(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_interface(&self) -> Option<&InterfaceType> {
        match self {
            TypeKind::Interface(i) => Some(i),
            _ => None,
        }
    }

    pub fn as_alias(&self) -> Option<AliasType> {
        match self {
            TypeKind::Alias(a) => Some(*a),
            _ => None,
        }
    }
}
