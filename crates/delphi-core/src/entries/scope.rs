//! Stored lexical scopes.

use crate::{DeclId, ScopeId, TypeRef};

use super::symbols::SymbolTable;

/// What introduced a scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    /// The unit's interface section.
    UnitInterface,
    /// The unit's implementation section; parent is the interface scope.
    UnitImplementation,
    /// A routine body. `self_type` is the class or record of a method.
    Routine {
        decl: DeclId,
        self_type: Option<TypeRef>,
    },
    /// A class, record or interface body; parent is the type's declaring scope.
    TypeBody(TypeRef),
    /// An `on E: T do` handler or an inline loop variable.
    Block,
}

/// A scope in a unit's scope arena.
#[derive(Debug, Clone, PartialEq)]
pub struct ScopeData {
    pub kind: ScopeKind,
    pub parent: Option<ScopeId>,
    pub symbols: SymbolTable,
}

impl ScopeData {
    pub fn new(kind: ScopeKind, parent: Option<ScopeId>) -> Self {
        Self {
            kind,
            parent,
            symbols: SymbolTable::new(),
        }
    }

    /// The method's own type when this is a method body.
    pub fn self_type(&self) -> Option<TypeRef> {
        match self.kind {
            ScopeKind::Routine { self_type, .. } => self_type,
            _ => None,
        }
    }

    /// The routine owning this scope.
    pub fn routine(&self) -> Option<DeclId> {
        match self.kind {
            ScopeKind::Routine { decl, .. } => Some(decl),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn routine_scope_accessors() {
        let ty = TypeRef::system(30);
        let scope = ScopeData::new(
            ScopeKind::Routine {
                decl: DeclId::new(7),
                self_type: Some(ty),
            },
            Some(ScopeId::new(1)),
        );
        assert_eq!(scope.self_type(), Some(ty));
        assert_eq!(scope.routine(), Some(DeclId::new(7)));
        assert!(scope.symbols.is_empty());

        let unit = ScopeData::new(ScopeKind::UnitInterface, None);
        assert_eq!(unit.self_type(), None);
        assert_eq!(unit.routine(), None);
    }
}
