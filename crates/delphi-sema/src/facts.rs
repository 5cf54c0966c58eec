//! ProgramFacts - the read-only query surface over a resolved program.
//!
//! Checks ask every question through this type: node facts recorded by the
//! passes (`type_of`, `declaration_of`, `overload_resolved_to`, ...), the
//! type-system and inheritance predicates, usage, imports and directives.
//! Nothing here mutates a unit.

use std::sync::Arc;

use delphi_core::{
    DeclRef, Declaration, DirectiveValue, Fingerprint, NodeId, OverloadOutcome, SectionSet,
    SemanticError, TypeEntry, TypeRef, UnitId, Visibility,
};
use delphi_registry::{Import, ImportGraph, Unit};

use crate::conversion;
use crate::directives::canonical_name;
use crate::inheritance;
use crate::operators;
use crate::overload::{self, Argument};
use crate::pattern::DeclarationPattern;
use crate::types;
use crate::usage::UsageIndex;
use crate::view::{Program, ProgramView};

/// Everything resolution learned about a program.
#[derive(Debug, Clone)]
pub struct ProgramFacts {
    program: Program,
    graph: ImportGraph,
    usage: UsageIndex,
}

impl ProgramFacts {
    /// Freeze a fully published program.
    pub fn new(program: Program, graph: ImportGraph) -> Self {
        let usage = UsageIndex::build(&program);
        Self { program, graph, usage }
    }

    pub fn program(&self) -> &Program {
        &self.program
    }

    pub fn import_graph(&self) -> &ImportGraph {
        &self.graph
    }

    // =========================================================================
    // Units
    // =========================================================================

    /// A unit by (case-insensitive) name.
    pub fn unit(&self, name: &str) -> Option<&Unit> {
        self.unit_named(name)
    }

    pub fn unit_by_id(&self, id: UnitId) -> Option<&Unit> {
        self.program.get(id).map(Arc::as_ref)
    }

    /// Every unit, `System` first, in id order.
    pub fn units(&self) -> impl Iterator<Item = &Unit> {
        self.program.units().map(Arc::as_ref)
    }

    /// Diagnostics of one unit.
    pub fn errors(&self, unit: UnitId) -> &[SemanticError] {
        self.unit_by_id(unit).map(|u| u.errors.as_slice()).unwrap_or_default()
    }

    /// Whether a structural error failed the unit.
    pub fn is_failed(&self, unit: UnitId) -> bool {
        self.unit_by_id(unit).is_some_and(|u| u.failed)
    }

    /// Structural hash of a unit.
    pub fn fingerprint(&self, unit: UnitId) -> Option<Fingerprint> {
        self.unit_by_id(unit).map(Unit::fingerprint)
    }

    // =========================================================================
    // Node facts
    // =========================================================================

    /// Static type of an expression, type expression or declared name.
    pub fn type_of(&self, unit: UnitId, node: NodeId) -> Option<TypeRef> {
        self.unit_by_id(unit)?.facts.type_of(node)
    }

    /// Declaration an identifier, member access or call resolved to.
    pub fn declaration_of(&self, unit: UnitId, node: NodeId) -> Option<DeclRef> {
        self.unit_by_id(unit)?.facts.declaration_of(node)
    }

    pub fn overload_resolved_to(&self, unit: UnitId, call: NodeId) -> Option<&OverloadOutcome> {
        self.unit_by_id(unit)?.facts.overloads.get(&call)
    }

    pub fn dispatch_target_of(&self, unit: UnitId, call: NodeId) -> Option<DeclRef> {
        self.unit_by_id(unit)?.facts.dispatch.get(&call).copied()
    }

    /// Target of an `inherited` node.
    ///
    /// `Some(None)` means the node was resolved but no ancestor declares
    /// the method.
    pub fn inherited_target_of(&self, unit: UnitId, node: NodeId) -> Option<Option<DeclRef>> {
        self.unit_by_id(unit)?.facts.inherited.get(&node).copied()
    }

    /// Whether resolving `node` crossed a visibility boundary.
    pub fn is_inaccessible(&self, unit: UnitId, node: NodeId) -> bool {
        self.unit_by_id(unit)
            .is_some_and(|u| u.facts.inaccessible.contains(&node))
    }

    /// Value of a directive switch at a node, `None` when never set.
    ///
    /// One-letter switches are accepted under either name (`R` or
    /// `RANGECHECKS`). The state is the one in effect at the node's anchor.
    pub fn effective_directive_state(&self, unit: UnitId, node: NodeId, name: &str) -> Option<&DirectiveValue> {
        let unit = self.unit_by_id(unit)?;
        let anchor = unit.anchor(node)?;
        unit.directives.value_at(anchor, &canonical_name(name))
    }

    // =========================================================================
    // Declarations and types
    // =========================================================================

    pub fn declaration(&self, decl: DeclRef) -> Option<&Declaration> {
        self.decl(decl)
    }

    pub fn visibility_of(&self, decl: DeclRef) -> Option<Visibility> {
        self.decl(decl).map(|d| d.visibility)
    }

    pub fn display_type(&self, ty: TypeRef) -> String {
        types::display_type(self, ty)
    }

    /// Declarations whose qualified name matches `pattern`, in unit and arena order.
    pub fn find_declarations(&self, pattern: &DeclarationPattern) -> Vec<DeclRef> {
        self.units()
            .flat_map(|unit| unit.declarations())
            .filter(|(_, d)| !d.is_implicit && pattern.matches(&d.qualified_name))
            .map(|(decl, _)| decl)
            .collect()
    }

    // =========================================================================
    // Type system
    // =========================================================================

    pub fn is_assignable(&self, from: TypeRef, to: TypeRef) -> bool {
        conversion::is_assignable(self, from, to)
    }

    pub fn is_implicitly_convertible(&self, from: TypeRef, to: TypeRef) -> bool {
        conversion::can_implicitly_convert(self, from, to, false)
    }

    pub fn is_explicit_cast_allowed(&self, from: TypeRef, to: TypeRef) -> bool {
        conversion::is_explicit_cast_allowed(self, from, to)
    }

    pub fn common_type(&self, a: TypeRef, b: TypeRef) -> Option<TypeRef> {
        operators::common_type(self, a, b)
    }

    pub fn select_overload(&self, candidates: &[DeclRef], args: &[Argument]) -> OverloadOutcome {
        overload::select_overload(self, candidates, args)
    }

    // =========================================================================
    // Inheritance
    // =========================================================================

    pub fn dispatch_target(&self, receiver: TypeRef, method: DeclRef) -> Option<DeclRef> {
        inheritance::dispatch_target(self, receiver, method)
    }

    pub fn inherited_target(&self, method: DeclRef) -> Option<DeclRef> {
        inheritance::inherited_target(self, method)
    }

    pub fn implements_interface_method(&self, class: TypeRef, method: DeclRef) -> Option<DeclRef> {
        inheritance::implements_interface_method(self, class, method)
    }

    // =========================================================================
    // Usage and imports
    // =========================================================================

    pub fn is_used(&self, decl: DeclRef) -> bool {
        self.usage.is_used(self, decl)
    }

    /// Sections of `unit` that reference anything from `imported`.
    pub fn import_usage(&self, unit: UnitId, imported: UnitId) -> SectionSet {
        self.usage.import_usage(unit, imported)
    }

    pub fn unused_imports(&self, unit: UnitId) -> Vec<&Import> {
        match self.unit_by_id(unit) {
            Some(unit) => self.usage.unused_imports(self, unit),
            None => Vec::new(),
        }
    }

    /// Import cycles over interface and implementation `uses` clauses.
    pub fn import_cycles(&self) -> Vec<Vec<UnitId>> {
        self.graph.cycles()
    }
}

impl ProgramView for ProgramFacts {
    fn unit(&self, id: UnitId) -> Option<&Unit> {
        self.unit_by_id(id)
    }

    fn unit_ids(&self) -> Vec<UnitId> {
        self.program.unit_ids()
    }

    fn type_entry(&self, ty: TypeRef) -> Option<&TypeEntry> {
        self.unit_by_id(ty.unit)?.ty(ty.ty)
    }
}
