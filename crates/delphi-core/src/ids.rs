//! Identifier types for units, declarations, types, scopes and syntax nodes.
//!
//! Declarations and types live in per-unit arenas and are referenced by stable
//! index handles rather than by direct structural embedding, so recursive types
//! and mutually recursive routines never create ownership cycles. A reference
//! that may cross a unit boundary pairs the unit with the local index
//! ([`DeclRef`], [`TypeRef`]).

use std::fmt;

macro_rules! index_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
        pub struct $name(u32);

        impl $name {
            /// Create an id with the given index.
            #[inline]
            pub const fn new(index: u32) -> Self {
                Self(index)
            }

            /// Get the underlying index.
            #[inline]
            pub const fn index(self) -> u32 {
                self.0
            }

            /// The index as a `usize` for slice access.
            #[inline]
            pub const fn as_usize(self) -> usize {
                self.0 as usize
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "_{}"), self.0)
            }
        }

        impl From<u32> for $name {
            fn from(index: u32) -> Self {
                Self::new(index)
            }
        }

        impl From<usize> for $name {
            fn from(index: usize) -> Self {
                Self::new(index as u32)
            }
        }
    };
}

index_id!(
    /// Identifies a compilation unit in the registry.
    ///
    /// Unit 0 is always the built-in `System` unit.
    UnitId,
    "unit"
);

index_id!(
    /// Index of a declaration inside its unit's declaration arena.
    DeclId,
    "decl"
);

index_id!(
    /// Index of a type inside its unit's type arena.
    TypeId,
    "type"
);

index_id!(
    /// Index of a scope inside its unit's scope arena.
    ScopeId,
    "scope"
);

index_id!(
    /// Identity of a syntax node, unique within one parsed unit.
    ///
    /// Assigned by the parser; facts produced by resolution are keyed by it.
    NodeId,
    "node"
);

impl UnitId {
    /// The built-in `System` unit.
    pub const SYSTEM: UnitId = UnitId(0);
}

/// A declaration anywhere in the program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeclRef {
    /// Owning unit.
    pub unit: UnitId,
    /// Index in the owning unit's declaration arena.
    pub decl: DeclId,
}

impl DeclRef {
    /// Create a declaration reference.
    #[inline]
    pub const fn new(unit: UnitId, decl: DeclId) -> Self {
        Self { unit, decl }
    }
}

impl fmt::Display for DeclRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.unit, self.decl)
    }
}

/// A type anywhere in the program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeRef {
    /// Owning unit.
    pub unit: UnitId,
    /// Index in the owning unit's type arena.
    pub ty: TypeId,
}

impl TypeRef {
    /// Create a type reference.
    #[inline]
    pub const fn new(unit: UnitId, ty: TypeId) -> Self {
        Self { unit, ty }
    }

    /// Reference to a type of the built-in `System` unit.
    #[inline]
    pub const fn system(index: u32) -> Self {
        Self {
            unit: UnitId::SYSTEM,
            ty: TypeId::new(index),
        }
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.unit, self.ty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_id_creation() {
        let unit = UnitId::new(42);
        assert_eq!(unit.index(), 42);
        assert_eq!(unit.as_usize(), 42);
        assert_eq!(format!("{}", unit), "unit_42");
    }

    #[test]
    fn refs_compare_by_unit_then_index() {
        let a = DeclRef::new(UnitId::new(1), DeclId::new(9));
        let b = DeclRef::new(UnitId::new(2), DeclId::new(0));
        assert!(a < b);
        assert_eq!(format!("{}", a), "unit_1:decl_9");
    }

    #[test]
    fn system_type_ref() {
        let r = TypeRef::system(3);
        assert_eq!(r.unit, UnitId::SYSTEM);
        assert_eq!(r.ty.index(), 3);
    }
}
