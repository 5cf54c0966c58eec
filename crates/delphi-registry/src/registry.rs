//! UnitRegistry - the single shared, append-only store of units.
//!
//! # Storage Model
//!
//! - **Slots**: every unit is reserved first (name, origin, id) and published
//!   later. Reservation fixes the [`UnitId`] so a unit under resolution can
//!   hand out [`DeclRef`](delphi_core::DeclRef)s before it is visible.
//! - **Snapshots**: publication stores an `Arc<Unit>`. A slot may be published
//!   twice (interface stage, then complete); readers holding the earlier
//!   `Arc` keep an immutable view.
//!
//! # Thread Safety
//!
//! Registration and publication are serialized through a `RwLock`. Readers
//! only clone `Arc`s under a read lock and never wait on resolution work.

use std::sync::{Arc, PoisonError, RwLock};

use rustc_hash::FxHashMap;
use tracing::debug;

use delphi_core::{AnalysisError, Name, UnitId};

use crate::system;
use crate::unit::{Unit, UnitOrigin, UnitStage};

#[derive(Debug)]
struct UnitSlot {
    name: Name,
    origin: UnitOrigin,
    published: Option<Arc<Unit>>,
}

#[derive(Debug, Default)]
struct RegistryInner {
    slots: Vec<UnitSlot>,
    by_name: FxHashMap<Name, UnitId>,
}

/// Maps unit names to their resolved snapshots.
#[derive(Debug)]
pub struct UnitRegistry {
    inner: RwLock<RegistryInner>,
}

impl Default for UnitRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl UnitRegistry {
    /// Create a registry holding only the built-in `System` unit.
    pub fn new() -> Self {
        let system = system::build_system_unit();
        let mut inner = RegistryInner::default();
        inner.by_name.insert(system.name.clone(), UnitId::SYSTEM);
        inner.slots.push(UnitSlot {
            name: system.name.clone(),
            origin: system.origin,
            published: Some(Arc::new(system)),
        });
        Self {
            inner: RwLock::new(inner),
        }
    }

    // ==========================================================================
    // Registration
    // ==========================================================================

    /// Reserve an id for a unit that will be published later.
    pub fn reserve(&self, name: impl Into<Name>, origin: UnitOrigin) -> Result<UnitId, AnalysisError> {
        let name = name.into();
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        if inner.by_name.contains_key(&name) {
            return Err(AnalysisError::DuplicateUnit(name.to_string()));
        }
        let id = UnitId::from(inner.slots.len());
        inner.by_name.insert(name.clone(), id);
        inner.slots.push(UnitSlot {
            name,
            origin,
            published: None,
        });
        debug!(unit = %id, "reserved unit slot");
        Ok(id)
    }

    /// Publish a snapshot into its reserved slot.
    ///
    /// Replaces an earlier snapshot of the same unit; a unit is never
    /// downgraded from [`UnitStage::Complete`] to [`UnitStage::Interface`].
    pub fn publish(&self, unit: Unit) -> Result<Arc<Unit>, AnalysisError> {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let Some(slot) = inner.slots.get_mut(unit.id.as_usize()) else {
            return Err(AnalysisError::UnreservedUnit(unit.name.to_string()));
        };
        if slot.name != unit.name {
            return Err(AnalysisError::UnreservedUnit(unit.name.to_string()));
        }
        if let Some(existing) = &slot.published {
            if existing.stage > unit.stage {
                return Ok(Arc::clone(existing));
            }
        }
        debug!(unit = %unit.name, stage = ?unit.stage, failed = unit.failed, "publishing unit");
        let unit = Arc::new(unit);
        slot.published = Some(Arc::clone(&unit));
        Ok(unit)
    }

    // ==========================================================================
    // Lookup
    // ==========================================================================

    /// The id reserved for a unit name.
    pub fn lookup(&self, name: &str) -> Option<UnitId> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        inner.by_name.get(&Name::new(name)).copied()
    }

    /// The latest published snapshot of a unit.
    pub fn get(&self, id: UnitId) -> Option<Arc<Unit>> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        inner
            .slots
            .get(id.as_usize())
            .and_then(|slot| slot.published.clone())
    }

    /// The latest published snapshot of a unit, by name.
    pub fn find(&self, name: &str) -> Option<Arc<Unit>> {
        self.lookup(name).and_then(|id| self.get(id))
    }

    /// Resolve a `uses` entry.
    ///
    /// Unknown or not-yet-published units resolve to the `Unresolved`
    /// sentinel, whose every lookup fails; the caller never aborts on it.
    pub fn resolve_import(&self, name: &str) -> Arc<Unit> {
        self.find(name)
            .unwrap_or_else(|| Arc::new(Unit::unresolved(name)))
    }

    /// Declared origin of a reserved unit.
    pub fn origin(&self, id: UnitId) -> Option<UnitOrigin> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        inner.slots.get(id.as_usize()).map(|slot| slot.origin)
    }

    /// Name of a reserved unit.
    pub fn name(&self, id: UnitId) -> Option<Name> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        inner.slots.get(id.as_usize()).map(|slot| slot.name.clone())
    }

    /// Every published snapshot indexed by unit id; unpublished slots are `None`.
    pub fn snapshot(&self) -> Vec<Option<Arc<Unit>>> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        inner
            .slots
            .iter()
            .map(|slot| slot.published.clone())
            .collect()
    }

    /// Number of reserved slots, including `System`.
    pub fn len(&self) -> usize {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        inner.slots.len()
    }

    /// Always false: `System` is registered on construction.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::unit::UnitBuilder;
    use std::thread;

    #[test]
    fn system_is_unit_zero() {
        let registry = UnitRegistry::new();
        assert_eq!(registry.lookup("system"), Some(UnitId::SYSTEM));
        let system = registry.get(UnitId::SYSTEM).unwrap();
        assert_eq!(system.stage, UnitStage::Complete);
        assert!(system.lookup_interface("TObject").is_some());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn reserve_then_publish() {
        let registry = UnitRegistry::new();
        let id = registry.reserve("Shapes", UnitOrigin::Source).unwrap();
        assert_eq!(id, UnitId::new(1));
        assert!(registry.get(id).is_none());
        assert!(registry.resolve_import("Shapes").is_unresolved());

        let unit = UnitBuilder::new(id, "Shapes", UnitOrigin::Source).finish(UnitStage::Interface);
        registry.publish(unit).unwrap();
        assert!(!registry.resolve_import("SHAPES").is_unresolved());
        assert_eq!(registry.origin(id), Some(UnitOrigin::Source));
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let registry = UnitRegistry::new();
        registry.reserve("A.B", UnitOrigin::Source).unwrap();
        let err = registry.reserve("a.b", UnitOrigin::SearchPath).unwrap_err();
        assert!(matches!(err, AnalysisError::DuplicateUnit(_)));
        assert!(registry.reserve("System", UnitOrigin::Source).is_err());
    }

    #[test]
    fn unreserved_publication_fails() {
        let registry = UnitRegistry::new();
        let unit = UnitBuilder::new(UnitId::new(7), "Ghost", UnitOrigin::Source).finish(UnitStage::Complete);
        assert!(matches!(
            registry.publish(unit),
            Err(AnalysisError::UnreservedUnit(_))
        ));
    }

    #[test]
    fn complete_snapshot_is_never_downgraded() {
        let registry = UnitRegistry::new();
        let id = registry.reserve("U", UnitOrigin::Source).unwrap();
        let builder = UnitBuilder::new(id, "U", UnitOrigin::Source);
        registry.publish(builder.clone().finish(UnitStage::Complete)).unwrap();
        let kept = registry.publish(builder.finish(UnitStage::Interface)).unwrap();
        assert_eq!(kept.stage, UnitStage::Complete);
    }

    #[test]
    fn readers_see_published_snapshots_across_threads() {
        let registry = UnitRegistry::new();
        let ids: Vec<_> = (0..4)
            .map(|i| registry.reserve(format!("U{i}"), UnitOrigin::Source).unwrap())
            .collect();

        thread::scope(|scope| {
            for &id in &ids {
                let registry = &registry;
                scope.spawn(move || {
                    let name = registry.name(id).unwrap();
                    let unit = UnitBuilder::new(id, name, UnitOrigin::Source).finish(UnitStage::Complete);
                    registry.publish(unit).unwrap();
                });
            }
        });

        let snapshot = registry.snapshot();
        assert_eq!(snapshot.len(), 5);
        assert!(snapshot.iter().all(Option::is_some));
    }
}
