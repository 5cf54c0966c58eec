//! Unit snapshots and the mutable working set that produces them.
//!
//! A [`Unit`] is immutable once published: the registry hands it out behind
//! an `Arc` and every reader sees the same frozen arenas. Resolution happens
//! on a [`UnitBuilder`], which owns the arenas while the unit's passes run and
//! backfills forward placeholders in place.

use delphi_core::fingerprint::domain;
use delphi_core::{
    DeclId, DeclKind, DeclRef, Declaration, DirectiveTable, Fingerprint, FingerprintBuilder, Name,
    NameTaken, NodeId, OverloadOutcome, ScopeData, ScopeId, ScopeKind, Section, SemanticError,
    Span, SymbolGroup, SymbolTable, TypeEntry, TypeId, TypeKind, TypeRef, UnitFacts, UnitId,
};

/// Where a unit came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnitOrigin {
    /// Project source: fully resolved and reportable.
    Source,
    /// Found on the search path: resolved best-effort.
    SearchPath,
    /// Standard-library interface: resolved, exempt from unused-import reports.
    StandardLibrary,
    /// Sentinel for an import that names no registered unit.
    Unresolved,
}

impl UnitOrigin {
    pub fn as_str(self) -> &'static str {
        match self {
            UnitOrigin::Source => "source",
            UnitOrigin::SearchPath => "search path",
            UnitOrigin::StandardLibrary => "standard library",
            UnitOrigin::Unresolved => "unresolved",
        }
    }
}

/// How far a unit has been resolved when it was published.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum UnitStage {
    /// Interface declarations are complete; importers may use them.
    Interface,
    /// Implementation, bodies and facts are complete.
    Complete,
}

/// One `uses` entry.
#[derive(Debug, Clone, PartialEq)]
pub struct Import {
    /// Unit name as written.
    pub name: Name,
    /// Resolved unit, `None` when the import is unresolved.
    pub unit: Option<UnitId>,
    /// Section whose `uses` clause lists it.
    pub section: Section,
    pub node: NodeId,
    pub span: Span,
    /// `in 'path'` clause.
    pub path: Option<String>,
}

/// A resolved compilation unit.
#[derive(Debug, Clone, PartialEq)]
pub struct Unit {
    pub id: UnitId,
    /// Full dotted name, e.g. `System.SysUtils`.
    pub name: Name,
    pub origin: UnitOrigin,
    pub stage: UnitStage,
    pub decls: Vec<Declaration>,
    pub types: Vec<TypeEntry>,
    pub scopes: Vec<ScopeData>,
    pub interface_scope: ScopeId,
    pub implementation_scope: ScopeId,
    /// `uses` entries, interface section first, each in source order.
    pub imports: Vec<Import>,
    pub facts: UnitFacts,
    pub directives: DirectiveTable,
    /// Anchor span per parser node id.
    pub anchors: Vec<Span>,
    pub errors: Vec<SemanticError>,
    /// A structural error made this unit's resolution fail.
    pub failed: bool,
}

impl Unit {
    /// Interface scope id of every unit.
    pub const INTERFACE_SCOPE: ScopeId = ScopeId::new(0);
    /// Implementation scope id of every unit.
    pub const IMPLEMENTATION_SCOPE: ScopeId = ScopeId::new(1);

    /// The sentinel standing in for an import that resolved to nothing.
    ///
    /// It declares nothing, so every member lookup through it fails and the
    /// resolver degrades to `Unresolved` without reporting.
    pub fn unresolved(name: impl Into<Name>) -> Self {
        let mut builder = UnitBuilder::new(UnitId::new(u32::MAX), name, UnitOrigin::Unresolved);
        builder.unit.stage = UnitStage::Complete;
        builder.unit
    }

    pub fn decl(&self, id: DeclId) -> Option<&Declaration> {
        self.decls.get(id.as_usize())
    }

    pub fn ty(&self, id: TypeId) -> Option<&TypeEntry> {
        self.types.get(id.as_usize())
    }

    pub fn scope(&self, id: ScopeId) -> Option<&ScopeData> {
        self.scopes.get(id.as_usize())
    }

    /// Global handle of a local declaration.
    pub fn decl_ref(&self, id: DeclId) -> DeclRef {
        DeclRef::new(self.id, id)
    }

    /// Names visible to importers.
    pub fn interface_symbols(&self) -> &SymbolTable {
        &self.scopes[self.interface_scope.as_usize()].symbols
    }

    /// Look up a name in the interface section.
    pub fn lookup_interface(&self, name: &str) -> Option<&SymbolGroup> {
        self.scope(self.interface_scope)
            .and_then(|s| s.symbols.get(&Name::new(name)))
    }

    /// Every declaration with its global handle, in arena order.
    pub fn declarations(&self) -> impl Iterator<Item = (DeclRef, &Declaration)> {
        self.decls
            .iter()
            .enumerate()
            .map(|(i, d)| (DeclRef::new(self.id, DeclId::from(i)), d))
    }

    pub fn is_unresolved(&self) -> bool {
        self.origin == UnitOrigin::Unresolved
    }

    /// Whether diagnostics about this unit's own imports are reported.
    pub fn is_reportable(&self) -> bool {
        matches!(self.origin, UnitOrigin::Source | UnitOrigin::SearchPath)
    }

    /// Anchor span of a parser node.
    pub fn anchor(&self, node: NodeId) -> Option<Span> {
        self.anchors.get(node.as_usize()).copied()
    }

    /// Structural hash of the declaration, type and scope graphs plus node facts.
    ///
    /// Only order-stable data is hashed, so resolving identical input twice
    /// yields the same fingerprint.
    pub fn fingerprint(&self) -> Fingerprint {
        let mut b = FingerprintBuilder::new(domain::UNIT);
        b.write_str(self.name.key())
            .write_str(self.origin.as_str())
            .write_bool(self.failed);

        for decl in &self.decls {
            hash_decl(&mut b, decl);
        }
        for ty in &self.types {
            hash_type(&mut b, ty);
        }
        for scope in &self.scopes {
            b.write_tag(domain::SCOPE)
                .write_opt(scope.parent.map(|p| p.index() as u64));
            for group in scope.symbols.iter() {
                b.write_str(group.name.key());
                for d in &group.decls {
                    write_decl_ref(&mut b, *d);
                }
            }
        }
        hash_facts(&mut b, &self.facts);
        b.finish()
    }
}

fn write_type_ref(b: &mut FingerprintBuilder, ty: TypeRef) {
    b.write_u64(((ty.unit.index() as u64) << 32) | ty.ty.index() as u64);
}

fn write_decl_ref(b: &mut FingerprintBuilder, decl: DeclRef) {
    b.write_u64(((decl.unit.index() as u64) << 32) | decl.decl.index() as u64);
}

fn hash_decl(b: &mut FingerprintBuilder, decl: &Declaration) {
    b.write_tag(domain::DECL)
        .write_str(&decl.qualified_name.to_string())
        .write_str(decl.kind.as_str())
        .write_str(decl.visibility.as_str())
        .write_str(decl.section.as_str())
        .write_u64(decl.scope.index() as u64)
        .write_bool(decl.is_implicit)
        .write_u64(decl.attributes.len() as u64);
    if let Some(owner) = decl.owner {
        write_type_ref(b, owner);
    }
    if let Some(ty) = decl.kind.value_type().or(decl.kind.declared_type()) {
        write_type_ref(b, ty);
    }
    if let DeclKind::Routine(routine) = &decl.kind {
        b.write_str(routine.kind.as_str())
            .write_u64(routine.flags.bits() as u64);
        for param in &routine.signature.params {
            b.write_str(param.name.key())
                .write_u64(param.flags.bits() as u64);
            write_type_ref(b, param.ty);
        }
        if let Some(result) = routine.signature.result {
            write_type_ref(b, result);
        }
        if let Some(overrides) = routine.overrides {
            write_decl_ref(b, overrides);
        }
    }
}

fn hash_type(b: &mut FingerprintBuilder, ty: &TypeEntry) {
    b.write_tag(domain::TYPE)
        .write_str(ty.name.as_ref().map(Name::key).unwrap_or(""))
        .write_str(ty.kind.describe());
    match &ty.kind {
        TypeKind::Alias(alias) => {
            write_type_ref(b, alias.target);
            b.write_bool(alias.strong);
        }
        TypeKind::Set(t) | TypeKind::MetaClass(t) | TypeKind::Pointer(Some(t)) => {
            write_type_ref(b, *t)
        }
        TypeKind::Array(array) => write_type_ref(b, array.element),
        TypeKind::Subrange(sub) => {
            write_type_ref(b, sub.base);
            b.write_u64(sub.low as u64).write_u64(sub.high as u64);
        }
        TypeKind::Class(class) => {
            b.write_opt(class.ancestor.map(|a| ((a.unit.index() as u64) << 32) | a.ty.index() as u64));
            for intf in &class.interfaces {
                write_type_ref(b, *intf);
            }
            b.write_u64(class.effective.len() as u64);
        }
        TypeKind::Interface(intf) => {
            for ancestor in &intf.ancestors {
                write_type_ref(b, *ancestor);
            }
            b.write_u64(intf.effective.len() as u64);
        }
        TypeKind::Enum(e) => {
            b.write_u64(e.values.len() as u64);
        }
        _ => {}
    }
}

fn hash_facts(b: &mut FingerprintBuilder, facts: &UnitFacts) {
    b.write_tag(domain::FACT);

    let mut types: Vec<_> = facts.types.iter().collect();
    types.sort_by_key(|(node, _)| **node);
    for (node, ty) in types {
        b.write_u64(node.index() as u64);
        write_type_ref(b, *ty);
    }

    let mut decls: Vec<_> = facts.declarations.iter().collect();
    decls.sort_by_key(|(node, _)| **node);
    for (node, decl) in decls {
        b.write_u64(node.index() as u64);
        write_decl_ref(b, *decl);
    }

    let mut overloads: Vec<_> = facts.overloads.iter().collect();
    overloads.sort_by_key(|(node, _)| **node);
    for (node, outcome) in overloads {
        b.write_u64(node.index() as u64);
        match outcome {
            OverloadOutcome::Resolved(d) => write_decl_ref(b, *d),
            OverloadOutcome::Ambiguous(ds) => {
                b.write_u64(ds.len() as u64);
            }
            OverloadOutcome::NoMatch => {
                b.write_u64(u64::MAX);
            }
        }
    }
    b.write_u64(facts.references.len() as u64);
}

/// Mutable working set of a unit under resolution.
///
/// Arenas are append-only; ids handed out stay valid for the lifetime of the
/// unit, including across [`UnitBuilder::finish`] and [`UnitBuilder::resume`].
#[derive(Debug, Clone)]
pub struct UnitBuilder {
    unit: Unit,
}

impl UnitBuilder {
    /// Start an empty unit with its interface and implementation scopes.
    pub fn new(id: UnitId, name: impl Into<Name>, origin: UnitOrigin) -> Self {
        let scopes = vec![
            ScopeData::new(ScopeKind::UnitInterface, None),
            ScopeData::new(ScopeKind::UnitImplementation, Some(Unit::INTERFACE_SCOPE)),
        ];
        Self {
            unit: Unit {
                id,
                name: name.into(),
                origin,
                stage: UnitStage::Interface,
                decls: Vec::new(),
                types: Vec::new(),
                scopes,
                interface_scope: Unit::INTERFACE_SCOPE,
                implementation_scope: Unit::IMPLEMENTATION_SCOPE,
                imports: Vec::new(),
                facts: UnitFacts::new(),
                directives: DirectiveTable::default(),
                anchors: Vec::new(),
                errors: Vec::new(),
                failed: false,
            },
        }
    }

    /// Continue resolving a published interface snapshot.
    pub fn resume(unit: &Unit) -> Self {
        Self { unit: unit.clone() }
    }

    /// The unit as built so far.
    pub fn unit(&self) -> &Unit {
        &self.unit
    }

    pub fn id(&self) -> UnitId {
        self.unit.id
    }

    pub fn name(&self) -> &Name {
        &self.unit.name
    }

    // === Arenas ===

    /// Append a type and return its handle.
    pub fn add_type(&mut self, entry: TypeEntry) -> TypeRef {
        let id = TypeId::from(self.unit.types.len());
        self.unit.types.push(entry);
        TypeRef::new(self.unit.id, id)
    }

    pub fn type_mut(&mut self, id: TypeId) -> Option<&mut TypeEntry> {
        self.unit.types.get_mut(id.as_usize())
    }

    /// Append a declaration and return its handle.
    pub fn add_decl(&mut self, decl: Declaration) -> DeclRef {
        let id = DeclId::from(self.unit.decls.len());
        self.unit.decls.push(decl);
        DeclRef::new(self.unit.id, id)
    }

    pub fn decl_mut(&mut self, id: DeclId) -> Option<&mut Declaration> {
        self.unit.decls.get_mut(id.as_usize())
    }

    /// Append a scope.
    pub fn add_scope(&mut self, kind: ScopeKind, parent: Option<ScopeId>) -> ScopeId {
        let id = ScopeId::from(self.unit.scopes.len());
        self.unit.scopes.push(ScopeData::new(kind, parent));
        id
    }

    pub fn scope_mut(&mut self, id: ScopeId) -> Option<&mut ScopeData> {
        self.unit.scopes.get_mut(id.as_usize())
    }

    /// Enter a declaration of this unit into a scope's symbol table.
    ///
    /// Routines join an existing routine group; any other collision is
    /// returned so the caller can report a duplicate declaration.
    pub fn declare(&mut self, scope: ScopeId, decl: DeclId) -> Result<(), NameTaken> {
        let Some(declaration) = self.unit.decls.get(decl.as_usize()) else {
            return Ok(());
        };
        let name = declaration.name.clone();
        let is_routine = declaration.is_routine();
        let decl_ref = DeclRef::new(self.unit.id, decl);
        match self.unit.scopes.get_mut(scope.as_usize()) {
            Some(scope) => scope.symbols.declare(&name, decl_ref, is_routine),
            None => Ok(()),
        }
    }

    /// Add a declaration and enter it into `scope`.
    pub fn add_and_declare(
        &mut self,
        scope: ScopeId,
        decl: Declaration,
    ) -> Result<DeclRef, (DeclRef, NameTaken)> {
        let decl_ref = self.add_decl(decl);
        match self.declare(scope, decl_ref.decl) {
            Ok(()) => Ok(decl_ref),
            Err(taken) => Err((decl_ref, taken)),
        }
    }

    // === Unit-level state ===

    pub fn add_import(&mut self, import: Import) {
        self.unit.imports.push(import);
    }

    pub fn imports(&self) -> &[Import] {
        &self.unit.imports
    }

    pub fn facts_mut(&mut self) -> &mut UnitFacts {
        &mut self.unit.facts
    }

    pub fn set_directives(&mut self, directives: DirectiveTable) {
        self.unit.directives = directives;
    }

    pub fn set_anchors(&mut self, anchors: Vec<Span>) {
        self.unit.anchors = anchors;
    }

    /// Record a diagnostic; structural errors mark the unit failed.
    pub fn report(&mut self, error: SemanticError) {
        if error.is_structural() {
            self.unit.failed = true;
        }
        self.unit.errors.push(error);
    }

    pub fn errors(&self) -> &[SemanticError] {
        &self.unit.errors
    }

    /// Freeze the working set at `stage`.
    pub fn finish(mut self, stage: UnitStage) -> Unit {
        self.unit.stage = stage;
        self.unit
    }
}
