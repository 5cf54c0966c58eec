//! Usage analysis over the whole resolved program.
//!
//! A [`UsageIndex`] is built once from the references every unit recorded.
//! It counts references per declaration, leaving out self-references, and
//! accumulates the sections in which each unit references each unit it imports.

use rustc_hash::FxHashMap;
use tracing::debug;

use delphi_core::{DeclRef, RoutineFlags, SectionSet, UnitId, Visibility};
use delphi_registry::{Import, Unit, UnitOrigin};

use crate::inheritance::implements_interface_method;
use crate::types::{implemented_interfaces, member_table};
use crate::view::{Program, ProgramView};

/// Reference counts and per-import usage of a resolved program.
#[derive(Debug, Default, Clone)]
pub struct UsageIndex {
    counts: FxHashMap<DeclRef, usize>,
    imports: FxHashMap<(UnitId, UnitId), SectionSet>,
}

impl UsageIndex {
    /// Index every reference of every unit in `program`.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn build(program: &Program) -> Self {
        let mut index = Self::default();
        let mut total = 0usize;
        for unit in program.units() {
            for reference in &unit.facts.references {
                if reference.is_self_reference() {
                    continue;
                }
                total += 1;
                *index.counts.entry(reference.target).or_default() += 1;
                if reference.target.unit != unit.id {
                    *index
                        .imports
                        .entry((unit.id, reference.target.unit))
                        .or_default() |= reference.section.into();
                }
            }
        }
        debug!(references = total, targets = index.counts.len(), "usage index built");
        index
    }

    /// Non-self references to `decl` anywhere in the program.
    pub fn reference_count(&self, decl: DeclRef) -> usize {
        self.counts.get(&decl).copied().unwrap_or(0)
    }

    /// Whether `decl` is used.
    ///
    /// Published members, `override` methods, methods implementing an
    /// interface method and attribute-annotated declarations always are.
    /// Anything else needs at least one reference that is not part of its
    /// own definition.
    pub fn is_used(&self, view: &dyn ProgramView, decl: DeclRef) -> bool {
        let Some(declaration) = view.decl(decl) else {
            return false;
        };
        if declaration.visibility == Visibility::Published || declaration.has_attributes() {
            return true;
        }
        if let Some(routine) = declaration.as_routine() {
            if routine.flags.contains(RoutineFlags::OVERRIDE) {
                return true;
            }
            if is_interface_implementation(view, decl) {
                return true;
            }
        }
        self.reference_count(decl) > 0
    }

    /// Sections of `unit` that reference something of `imported`.
    pub fn import_usage(&self, unit: UnitId, imported: UnitId) -> SectionSet {
        self.imports
            .get(&(unit, imported))
            .copied()
            .unwrap_or_default()
    }

    /// `uses` entries of `unit` whose unit is never referenced.
    ///
    /// Only project and search-path units are reported on. Unresolved
    /// imports and imports of standard-library units are never listed.
    pub fn unused_imports<'u>(&self, view: &dyn ProgramView, unit: &'u Unit) -> Vec<&'u Import> {
        if !unit.is_reportable() {
            return Vec::new();
        }
        unit.imports
            .iter()
            .filter(|import| {
                let Some(imported) = import.unit else {
                    return false;
                };
                let library = view
                    .unit(imported)
                    .is_none_or(|u| u.origin == UnitOrigin::StandardLibrary);
                !library && self.import_usage(unit.id, imported).is_empty()
            })
            .collect()
    }
}

/// Whether `method` implements a method of an interface its class implements.
pub fn is_interface_implementation(view: &dyn ProgramView, method: DeclRef) -> bool {
    let Some(class) = view.decl(method).and_then(|d| d.owner) else {
        return false;
    };
    let Some(name) = view.decl(method).map(|d| d.name.clone()) else {
        return false;
    };
    implemented_interfaces(view, class).into_iter().any(|intf| {
        member_table(view, intf)
            .and_then(|table| table.get(&name))
            .is_some_and(|group| {
                group
                    .decls
                    .iter()
                    .any(|&wanted| implements_interface_method(view, class, wanted) == Some(method))
            })
    })
}
