//! Expression type information for the resolver.
//!
//! `ExprInfo` captures the result of checking an expression: its static
//! type, the declaration it names, and what kind of thing it denotes.

use delphi_core::{DeclRef, TypeRef, UnitId};
use delphi_registry::known;

/// What an expression denotes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Denotes {
    /// A value.
    #[default]
    Value,
    /// A type name; `ty` is the named type.
    Type,
    /// A unit name, the prefix of a qualified reference.
    Unit(UnitId),
    /// A procedure call, which has no value.
    Nothing,
}

/// Result of checking an expression.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExprInfo {
    /// Static type; for [`Denotes::Type`] the type named.
    pub ty: TypeRef,
    /// Declaration the expression resolved to.
    pub decl: Option<DeclRef>,
    /// Typed as a constant literal (affects narrowing of integer constants).
    pub is_literal: bool,
    pub denotes: Denotes,
    /// Receiver type when the expression selected a method through a value or type.
    pub receiver: Option<TypeRef>,
}

impl ExprInfo {
    pub fn value(ty: TypeRef) -> Self {
        Self {
            ty,
            decl: None,
            is_literal: false,
            denotes: Denotes::Value,
            receiver: None,
        }
    }

    pub fn literal(ty: TypeRef) -> Self {
        Self {
            is_literal: true,
            ..Self::value(ty)
        }
    }

    pub fn type_name(ty: TypeRef, decl: Option<DeclRef>) -> Self {
        Self {
            decl,
            denotes: Denotes::Type,
            ..Self::value(ty)
        }
    }

    pub fn unit(unit: UnitId) -> Self {
        Self {
            denotes: Denotes::Unit(unit),
            ..Self::value(known::UNTYPED)
        }
    }

    pub fn nothing(decl: Option<DeclRef>) -> Self {
        Self {
            decl,
            denotes: Denotes::Nothing,
            ..Self::value(known::UNTYPED)
        }
    }

    /// Failed resolution; every query on it degrades to `Unresolved`.
    pub fn unresolved() -> Self {
        Self::value(known::UNRESOLVED)
    }

    pub fn with_decl(mut self, decl: DeclRef) -> Self {
        self.decl = Some(decl);
        self
    }

    pub fn with_receiver(mut self, receiver: Option<TypeRef>) -> Self {
        self.receiver = receiver;
        self
    }

    pub fn is_value(&self) -> bool {
        self.denotes == Denotes::Value
    }

    pub fn is_type(&self) -> bool {
        self.denotes == Denotes::Type
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use delphi_core::DeclId;

    #[test]
    fn constructors() {
        let lit = ExprInfo::literal(known::INTEGER);
        assert!(lit.is_literal && lit.is_value());

        let decl = DeclRef::new(UnitId::SYSTEM, DeclId::new(0));
        let ty = ExprInfo::type_name(known::TOBJECT, Some(decl));
        assert!(ty.is_type());
        assert_eq!(ty.decl, Some(decl));

        assert_eq!(ExprInfo::unit(UnitId::new(3)).denotes, Denotes::Unit(UnitId::new(3)));
        assert_eq!(ExprInfo::unresolved().ty, known::UNRESOLVED);
        assert_eq!(ExprInfo::nothing(None).denotes, Denotes::Nothing);
    }
}
