//! Read access to resolved units.
//!
//! Everything in the type system, the overload resolver and the inheritance
//! resolver works against a [`ProgramView`]: a frozen [`Program`] snapshot
//! for queries, or the unit under resolution layered over the snapshot while
//! its passes run.

use std::sync::Arc;

use delphi_core::{DeclRef, Declaration, Name, ScopeData, ScopeId, TypeEntry, TypeRef, UnitId};
use delphi_registry::{Unit, UnitRegistry};

/// Lookup of units, declarations, types and scopes by handle.
pub trait ProgramView {
    /// A unit by id, if published (or under resolution).
    fn unit(&self, id: UnitId) -> Option<&Unit>;

    /// Every unit visible through this view, in id order.
    fn unit_ids(&self) -> Vec<UnitId>;

    fn decl(&self, decl: DeclRef) -> Option<&Declaration> {
        self.unit(decl.unit)?.decl(decl.decl)
    }

    fn type_entry(&self, ty: TypeRef) -> Option<&TypeEntry> {
        self.unit(ty.unit)?.ty(ty.ty)
    }

    fn scope(&self, unit: UnitId, scope: ScopeId) -> Option<&ScopeData> {
        self.unit(unit)?.scope(scope)
    }

    /// A unit by (case-insensitive) name.
    fn unit_named(&self, name: &str) -> Option<&Unit> {
        let name = Name::new(name);
        self.unit_ids()
            .into_iter()
            .filter_map(|id| self.unit(id))
            .find(|unit| unit.name == name)
    }
}

/// An immutable snapshot of every published unit.
#[derive(Debug, Clone, Default)]
pub struct Program {
    units: Vec<Option<Arc<Unit>>>,
}

impl Program {
    /// Snapshot the registry as it is now.
    pub fn snapshot(registry: &UnitRegistry) -> Self {
        Self {
            units: registry.snapshot(),
        }
    }

    /// Build a program from units indexed by id.
    pub fn from_units(units: Vec<Option<Arc<Unit>>>) -> Self {
        Self { units }
    }

    /// Published units in id order.
    pub fn units(&self) -> impl Iterator<Item = &Arc<Unit>> {
        self.units.iter().flatten()
    }

    pub fn get(&self, id: UnitId) -> Option<&Arc<Unit>> {
        self.units.get(id.as_usize()).and_then(Option::as_ref)
    }

    pub fn len(&self) -> usize {
        self.units.iter().flatten().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ProgramView for Program {
    fn unit(&self, id: UnitId) -> Option<&Unit> {
        self.get(id).map(Arc::as_ref)
    }

    fn unit_ids(&self) -> Vec<UnitId> {
        self.units().map(|unit| unit.id).collect()
    }
}
