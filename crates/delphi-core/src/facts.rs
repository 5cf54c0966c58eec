//! Resolution facts recorded per syntax node.
//!
//! Facts are produced by a unit's resolution passes and frozen with the unit.
//! Checks read them through the query surface; nothing mutates them afterwards.

use bitflags::bitflags;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::entries::Section;
use crate::{DeclRef, NodeId, Span, TypeRef, UnitId};

/// Outcome of overload selection at a call site.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum OverloadOutcome {
    /// Exactly one candidate has the minimal conversion cost.
    Resolved(DeclRef),
    /// Two or more candidates tie at the minimal cost.
    Ambiguous(Vec<DeclRef>),
    /// No candidate accepts the arguments.
    NoMatch,
}

impl OverloadOutcome {
    /// The selected routine, if selection succeeded.
    pub fn resolved(&self) -> Option<DeclRef> {
        match self {
            OverloadOutcome::Resolved(d) => Some(*d),
            _ => None,
        }
    }

    pub fn is_ambiguous(&self) -> bool {
        matches!(self, OverloadOutcome::Ambiguous(_))
    }
}

bitflags! {
    /// Set of sections a unit references something from.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct SectionSet: u8 {
        const INTERFACE      = 1 << 0;
        const IMPLEMENTATION = 1 << 1;
        const INITIALIZATION = 1 << 2;
        const FINALIZATION   = 1 << 3;
    }
}

impl From<Section> for SectionSet {
    fn from(section: Section) -> Self {
        match section {
            Section::Interface => SectionSet::INTERFACE,
            Section::Implementation => SectionSet::IMPLEMENTATION,
            Section::Initialization => SectionSet::INITIALIZATION,
            Section::Finalization => SectionSet::FINALIZATION,
        }
    }
}

/// A resolved reference to a declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Reference {
    pub target: DeclRef,
    /// Unit containing the reference.
    pub unit: UnitId,
    pub node: NodeId,
    pub span: Span,
    pub section: Section,
    /// Declaration being defined where the reference occurs. A reference
    /// whose context is its own target is a self-reference.
    pub context: Option<DeclRef>,
}

impl Reference {
    /// Whether this reference sits inside the definition of its own target.
    pub fn is_self_reference(&self) -> bool {
        self.context == Some(self.target)
    }
}

/// Per-unit node facts.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UnitFacts {
    /// Static type of every typed expression node.
    pub types: FxHashMap<NodeId, TypeRef>,
    /// Declaration an identifier, member access or call resolved to.
    pub declarations: FxHashMap<NodeId, DeclRef>,
    /// Overload outcome per call node.
    pub overloads: FxHashMap<NodeId, OverloadOutcome>,
    /// Dispatch target per method call node.
    pub dispatch: FxHashMap<NodeId, DeclRef>,
    /// `inherited` target per inherited node; `None` when no ancestor declares it.
    pub inherited: FxHashMap<NodeId, Option<DeclRef>>,
    /// Nodes whose resolution crossed a visibility boundary.
    pub inaccessible: FxHashSet<NodeId>,
    /// Nodes typed as constant literals.
    pub literals: FxHashSet<NodeId>,
    /// Every reference made by this unit in source order.
    pub references: Vec<Reference>,
}

impl UnitFacts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn type_of(&self, node: NodeId) -> Option<TypeRef> {
        self.types.get(&node).copied()
    }

    pub fn declaration_of(&self, node: NodeId) -> Option<DeclRef> {
        self.declarations.get(&node).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DeclId;

    #[test]
    fn outcome_accessors() {
        let d = DeclRef::new(UnitId::new(1), DeclId::new(3));
        assert_eq!(OverloadOutcome::Resolved(d).resolved(), Some(d));
        assert!(OverloadOutcome::Ambiguous(vec![d, d]).is_ambiguous());
        assert_eq!(OverloadOutcome::NoMatch.resolved(), None);
    }

    #[test]
    fn sections_accumulate() {
        let mut set = SectionSet::empty();
        set |= Section::Interface.into();
        set |= Section::Implementation.into();
        assert!(set.contains(SectionSet::INTERFACE | SectionSet::IMPLEMENTATION));
        assert!(!set.contains(SectionSet::INITIALIZATION));
    }

    #[test]
    fn self_reference() {
        let ty = DeclRef::new(UnitId::new(1), DeclId::new(0));
        let reference = Reference {
            target: ty,
            unit: UnitId::new(1),
            node: NodeId::new(4),
            span: Span::new(3, 10, 4),
            section: Section::Interface,
            context: Some(ty),
        };
        assert!(reference.is_self_reference());
    }
}
