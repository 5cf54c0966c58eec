//! ResolveContext - the working state of one unit under resolution.
//!
//! The context layers the unit being built over a snapshot of the units
//! published so far. Lookups for the unit's own id see the builder; every
//! other id goes to the snapshot. Facts and diagnostics produced while
//! resolving are written straight into the builder.

use rustc_hash::FxHashMap;

use delphi_core::{
    DeclKind, DeclRef, NodeId, OverloadOutcome, ProceduralKind, ProceduralType, QualifiedName,
    Reference, ScopeId, ScopeKind, Section, SemanticError, Span, TypeEntry, TypeKind, TypeRef,
    UnitId,
};
use delphi_registry::{Import, Unit, UnitBuilder, known};

use crate::view::{Program, ProgramView};

/// Anonymous types derived from another type or declaration.
///
/// Each is created once per unit and then reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DerivedType {
    Set(TypeRef),
    MetaClass(TypeRef),
    Pointer(TypeRef),
    DynamicArray(TypeRef),
    /// The procedural type of a routine, used for `@Routine` and bare routine values.
    Routine(DeclRef),
}

/// Where a declaration or expression is being resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Site {
    pub scope: ScopeId,
    /// Declaration being defined; references to it from here are self-references.
    pub context: Option<DeclRef>,
}

impl Site {
    pub fn new(scope: ScopeId) -> Self {
        Self {
            scope,
            context: None,
        }
    }

    pub fn with_context(mut self, context: DeclRef) -> Self {
        self.context = Some(context);
        self
    }
}

/// Unified resolution context for one unit.
pub struct ResolveContext<'p> {
    program: &'p Program,
    builder: UnitBuilder,
    section: Section,
    derived: FxHashMap<DerivedType, TypeRef>,
}

impl<'p> ResolveContext<'p> {
    pub fn new(program: &'p Program, builder: UnitBuilder) -> Self {
        Self {
            program,
            builder,
            section: Section::Interface,
            derived: FxHashMap::default(),
        }
    }

    /// Continue a unit published at the interface stage.
    ///
    /// The anonymous types the interface already derived are shared with
    /// the implementation rather than created again.
    pub fn resume(program: &'p Program, builder: UnitBuilder) -> Self {
        let mut ctx = Self::new(program, builder);
        let unit = ctx.builder.unit();
        let seeded: Vec<(DerivedType, TypeRef)> = unit
            .types
            .iter()
            .enumerate()
            .filter(|(_, entry)| entry.name.is_none())
            .filter_map(|(index, entry)| {
                let derived = match &entry.kind {
                    TypeKind::Set(element) => DerivedType::Set(*element),
                    TypeKind::MetaClass(class) => DerivedType::MetaClass(*class),
                    TypeKind::Pointer(Some(target)) => DerivedType::Pointer(*target),
                    TypeKind::Array(delphi_core::ArrayType {
                        element,
                        shape: delphi_core::ArrayShape::Dynamic,
                    }) => DerivedType::DynamicArray(*element),
                    _ => return None,
                };
                Some((derived, TypeRef::new(unit.id, delphi_core::TypeId::from(index))))
            })
            .collect();
        for (derived, ty) in seeded {
            ctx.derived.entry(derived).or_insert(ty);
        }
        ctx
    }

    pub fn program(&self) -> &'p Program {
        self.program
    }

    pub fn builder(&self) -> &UnitBuilder {
        &self.builder
    }

    pub fn builder_mut(&mut self) -> &mut UnitBuilder {
        &mut self.builder
    }

    pub fn into_builder(self) -> UnitBuilder {
        self.builder
    }

    pub fn unit_id(&self) -> UnitId {
        self.builder.id()
    }

    pub fn current(&self) -> &Unit {
        self.builder.unit()
    }

    pub fn section(&self) -> Section {
        self.section
    }

    pub fn set_section(&mut self, section: Section) {
        self.section = section;
    }

    // =========================================================================
    // Imports
    // =========================================================================

    /// Units searched after the local scope chain, in search order.
    ///
    /// Interface code sees the interface `uses` list. Implementation code
    /// sees the implementation list first, then the interface list.
    pub fn import_search_order(&self) -> Vec<UnitId> {
        let imports = self.builder.imports();
        let interface = imports.iter().filter(|i| i.section == Section::Interface);
        let implementation = imports.iter().filter(|i| i.section == Section::Implementation);

        let ordered: Vec<&Import> = if self.section == Section::Interface {
            interface.collect()
        } else {
            implementation.chain(interface).collect()
        };
        ordered.into_iter().filter_map(|i| i.unit).collect()
    }

    /// Whether some `uses` entry names no registered unit.
    ///
    /// Unknown identifiers are not reported then: they may well live in the
    /// missing unit.
    pub fn has_unresolved_imports(&self) -> bool {
        self.builder.imports().iter().any(|i| i.unit.is_none())
    }

    // =========================================================================
    // Facts
    // =========================================================================

    pub fn report(&mut self, error: SemanticError) {
        self.builder.report(error);
    }

    pub fn record_type(&mut self, node: NodeId, ty: TypeRef) {
        self.builder.facts_mut().types.insert(node, ty);
    }

    pub fn record_literal(&mut self, node: NodeId) {
        self.builder.facts_mut().literals.insert(node);
    }

    pub fn record_overload(&mut self, node: NodeId, outcome: OverloadOutcome) {
        self.builder.facts_mut().overloads.insert(node, outcome);
    }

    pub fn record_dispatch(&mut self, node: NodeId, target: DeclRef) {
        self.builder.facts_mut().dispatch.insert(node, target);
    }

    pub fn record_inherited(&mut self, node: NodeId, target: Option<DeclRef>) {
        self.builder.facts_mut().inherited.insert(node, target);
    }

    pub fn mark_inaccessible(&mut self, node: NodeId) {
        self.builder.facts_mut().inaccessible.insert(node);
    }

    /// Bind `node` to `target` and record the reference.
    pub fn record_declaration(&mut self, node: NodeId, span: Span, target: DeclRef, site: Site) {
        self.builder.facts_mut().declarations.insert(node, target);
        self.record_reference(node, span, target, site);
    }

    /// Bind `node` to `target` without recording another reference.
    pub fn bind_node(&mut self, node: NodeId, target: DeclRef) {
        self.builder.facts_mut().declarations.insert(node, target);
    }

    /// Record a reference without binding a node, e.g. a property accessor.
    pub fn record_reference(&mut self, node: NodeId, span: Span, target: DeclRef, site: Site) {
        let reference = Reference {
            target,
            unit: self.builder.id(),
            node,
            span,
            section: self.section,
            context: site.context,
        };
        self.builder.facts_mut().references.push(reference);
    }

    // =========================================================================
    // Types
    // =========================================================================

    /// The shared anonymous type for `derived`, created on first use.
    pub fn derived_type(&mut self, derived: DerivedType) -> TypeRef {
        if let Some(&ty) = self.derived.get(&derived) {
            return ty;
        }
        let kind = match derived {
            DerivedType::Set(element) => TypeKind::Set(element),
            DerivedType::MetaClass(class) => TypeKind::MetaClass(class),
            DerivedType::Pointer(target) => TypeKind::Pointer(Some(target)),
            DerivedType::DynamicArray(element) => TypeKind::Array(delphi_core::ArrayType {
                element,
                shape: delphi_core::ArrayShape::Dynamic,
            }),
            DerivedType::Routine(decl) => match self.decl(decl) {
                Some(d) => match &d.kind {
                    DeclKind::Routine(routine) => TypeKind::Procedural(ProceduralType {
                        signature: routine.signature.clone(),
                        kind: if d.owner.is_some() {
                            ProceduralKind::OfObject
                        } else {
                            ProceduralKind::Plain
                        },
                    }),
                    _ => return known::UNRESOLVED,
                },
                None => return known::UNRESOLVED,
            },
        };
        let ty = self.builder.add_type(TypeEntry::anonymous(kind));
        self.derived.insert(derived, ty);
        ty
    }

    /// Metaclass for class types, the type itself otherwise.
    ///
    /// This is the static type of a type name used as a value.
    pub fn type_value(&mut self, ty: TypeRef) -> TypeRef {
        if crate::types::kind_of(&*self, ty).as_class().is_some() {
            self.derived_type(DerivedType::MetaClass(ty))
        } else {
            ty
        }
    }

    // =========================================================================
    // Names
    // =========================================================================

    /// Qualified name of `name` declared in `scope`.
    pub fn qualify(&self, scope: ScopeId, name: &str) -> QualifiedName {
        self.namespace_of(scope).child(name)
    }

    fn namespace_of(&self, scope: ScopeId) -> QualifiedName {
        let unit = QualifiedName::from_dotted(self.builder.name().as_str());
        let mut current = Some(scope);
        // Block scopes contribute nothing; walk to the nearest naming scope.
        while let Some(id) = current {
            let Some(data) = self.builder.unit().scope(id) else {
                break;
            };
            match data.kind {
                ScopeKind::UnitInterface | ScopeKind::UnitImplementation => return unit,
                ScopeKind::TypeBody(ty) => {
                    let owner = self.type_entry(ty).and_then(|t| t.decl);
                    return match owner.and_then(|d| self.decl(d)) {
                        Some(decl) => decl.qualified_name.clone(),
                        None => unit,
                    };
                }
                ScopeKind::Routine { decl, .. } => {
                    return match self.builder.unit().decl(decl) {
                        Some(decl) => decl.qualified_name.clone(),
                        None => unit,
                    };
                }
                ScopeKind::Block => current = data.parent,
            }
        }
        unit
    }

    /// Nearest class, record or interface enclosing `scope`.
    ///
    /// This is the type whose private and protected members code at `scope`
    /// may reach.
    pub fn enclosing_type(&self, scope: ScopeId) -> Option<TypeRef> {
        let unit = self.builder.unit();
        let mut current = Some(scope);
        while let Some(id) = current {
            let data = unit.scope(id)?;
            match data.kind {
                ScopeKind::TypeBody(ty) => return Some(ty),
                ScopeKind::Routine {
                    self_type: Some(ty),
                    ..
                } => return Some(ty),
                _ => current = data.parent,
            }
        }
        None
    }

    /// Nearest enclosing method: its declaration and `Self` type.
    pub fn enclosing_method(&self, scope: ScopeId) -> Option<(DeclRef, TypeRef)> {
        let unit = self.builder.unit();
        let mut current = Some(scope);
        while let Some(id) = current {
            let data = unit.scope(id)?;
            if let ScopeKind::Routine {
                decl,
                self_type: Some(ty),
            } = data.kind
            {
                return Some((unit.decl_ref(decl), ty));
            }
            current = data.parent;
        }
        None
    }

    /// Nearest enclosing routine of any kind.
    pub fn enclosing_routine(&self, scope: ScopeId) -> Option<DeclRef> {
        let unit = self.builder.unit();
        let mut current = Some(scope);
        while let Some(id) = current {
            let data = unit.scope(id)?;
            if let Some(decl) = data.routine() {
                return Some(unit.decl_ref(decl));
            }
            current = data.parent;
        }
        None
    }
}

impl ProgramView for ResolveContext<'_> {
    fn unit(&self, id: UnitId) -> Option<&Unit> {
        if id == self.builder.id() {
            Some(self.builder.unit())
        } else {
            self.program.unit(id)
        }
    }

    fn unit_ids(&self) -> Vec<UnitId> {
        let mut ids = self.program.unit_ids();
        if !ids.contains(&self.builder.id()) {
            ids.push(self.builder.id());
            ids.sort();
        }
        ids
    }
}
