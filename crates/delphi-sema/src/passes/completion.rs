//! Type Completion Pass - build effective member tables.
//!
//! This pass runs after registration of a declaration list. Classes and
//! interfaces get their effective member tables, `override` methods are tied
//! to the ancestor method they override, and property accessors are
//! resolved against the completed tables.
//!
//! ## Algorithm
//!
//! 1. Topologically sort the pending types by inheritance (base before derived)
//! 2. For each type in order, start from the ancestor's effective table and
//!    overlay the own members by name. Routines overlay only the ancestor
//!    routines whose signature they repeat; `reintroduce` hides them all
//! 3. Match `override` methods and check that classes implement every
//!    method of their interfaces
//! 4. Resolve property accessors
//!
//! ## Example
//!
//! ```text
//! TBase = class
//!   procedure Run; virtual;
//!   procedure Run(Count: Integer); virtual;
//! end;
//! TDerived = class(TBase)
//!   procedure Run; override;
//! end;
//!
//! After completion:
//! - TDerived.Run: [TDerived.Run, TBase.Run(Count)]
//!   TDerived.Run.overrides = TBase.Run
//! ```

use rustc_hash::{FxHashMap, FxHashSet};
use tracing::debug;

use delphi_core::{
    DeclKind, DeclRef, Property, RoutineFlags, ScopeId, SemanticError, SymbolGroup, SymbolTable,
    TypeKind, TypeRef,
};
use delphi_parser::ast::Ident as AstIdent;
use delphi_registry::known;

use crate::context::ResolveContext;
use crate::conversion::signatures_match;
use crate::inheritance::implements_interface_method;
use crate::passes::{PendingProperty, PendingType};
use crate::types::{display_type, interface_ancestors, kind_of, lookup_member, member_table, representation};
use crate::view::ProgramView;

/// Output of the type completion pass.
#[derive(Debug, Default)]
pub struct CompletionOutput {
    pub classes_completed: usize,
    pub interfaces_completed: usize,
    /// `override` methods tied to their ancestor method.
    pub overrides_matched: usize,
    pub accessors_resolved: usize,
}

/// Type Completion Pass - finalizes class and interface structures.
pub struct TypeCompletionPass<'a, 'p> {
    ctx: &'a mut ResolveContext<'p>,
    output: CompletionOutput,
}

impl<'a, 'p> TypeCompletionPass<'a, 'p> {
    pub fn new(ctx: &'a mut ResolveContext<'p>) -> Self {
        Self {
            ctx,
            output: CompletionOutput::default(),
        }
    }

    /// Complete `types`, then resolve the accessors of `properties`.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn run(mut self, types: &[PendingType], properties: &[PendingProperty<'_>]) -> CompletionOutput {
        for pending in self.topological_sort(types) {
            match kind_of(&*self.ctx, pending.ty) {
                TypeKind::Class(_) => self.complete_class(&pending),
                TypeKind::Interface(_) => self.complete_interface(&pending),
                _ => {}
            }
        }
        for pending in properties {
            self.complete_property(pending);
        }
        debug!(
            unit = %self.ctx.builder().name(),
            classes = self.output.classes_completed,
            interfaces = self.output.interfaces_completed,
            overrides = self.output.overrides_matched,
            accessors = self.output.accessors_resolved,
            "type completion complete"
        );
        self.output
    }

    // =========================================================================
    // Ordering
    // =========================================================================

    /// Order pending types base before derived, cutting inheritance cycles.
    fn topological_sort(&mut self, types: &[PendingType]) -> Vec<PendingType> {
        let pending: FxHashMap<TypeRef, PendingType> = types.iter().map(|p| (p.ty, *p)).collect();
        let mut visited = FxHashSet::default();
        let mut in_progress = FxHashSet::default();
        let mut ordered = Vec::with_capacity(types.len());
        for pending_type in types {
            self.visit(pending_type.ty, &pending, &mut visited, &mut in_progress, &mut ordered);
        }
        ordered
    }

    fn visit(
        &mut self,
        ty: TypeRef,
        pending: &FxHashMap<TypeRef, PendingType>,
        visited: &mut FxHashSet<TypeRef>,
        in_progress: &mut FxHashSet<TypeRef>,
        ordered: &mut Vec<PendingType>,
    ) {
        if visited.contains(&ty) {
            return;
        }
        let Some(&this) = pending.get(&ty) else {
            return;
        };
        in_progress.insert(ty);
        for dep in self.dependencies(ty) {
            if !pending.contains_key(&dep) {
                continue;
            }
            if in_progress.contains(&dep) {
                self.break_cycle(&this, dep);
                continue;
            }
            self.visit(dep, pending, visited, in_progress, ordered);
        }
        in_progress.remove(&ty);
        visited.insert(ty);
        ordered.push(this);
    }

    /// Types that must be complete before `ty`: its ancestor and interfaces.
    fn dependencies(&self, ty: TypeRef) -> Vec<TypeRef> {
        let view: &dyn ProgramView = &*self.ctx;
        let direct: Vec<TypeRef> = match view.type_entry(ty).map(|t| &t.kind) {
            Some(TypeKind::Class(class)) => class.ancestor.iter().chain(&class.interfaces).copied().collect(),
            Some(TypeKind::Interface(intf)) => intf.ancestors.clone(),
            _ => Vec::new(),
        };
        direct.into_iter().map(|d| representation(view, d)).collect()
    }

    /// `ty` reaches itself through `dep`; report it and drop that edge.
    fn break_cycle(&mut self, pending: &PendingType, dep: TypeRef) {
        let name = display_type(&*self.ctx, pending.ty);
        self.ctx.report(SemanticError::CircularInheritance {
            name,
            span: pending.span,
        });

        let view: &dyn ProgramView = &*self.ctx;
        let reaches = |t: &TypeRef| representation(view, *t) == dep;
        let kind = match view.type_entry(pending.ty).map(|t| t.kind.clone()) {
            Some(TypeKind::Class(mut class)) => {
                if class.ancestor.as_ref().is_some_and(reaches) {
                    class.ancestor = Some(known::TOBJECT);
                }
                class.interfaces.retain(|t| !reaches(t));
                TypeKind::Class(class)
            }
            Some(TypeKind::Interface(mut intf)) => {
                intf.ancestors.retain(|t| !reaches(t));
                if intf.ancestors.is_empty() && pending.ty != known::IINTERFACE {
                    intf.ancestors.push(known::IINTERFACE);
                }
                TypeKind::Interface(intf)
            }
            _ => return,
        };
        self.set_kind(pending.ty, kind);
    }

    // =========================================================================
    // Effective tables
    // =========================================================================

    fn complete_class(&mut self, pending: &PendingType) {
        let Some(class) = self.ctx.type_entry(pending.ty).and_then(|t| t.kind.as_class()).cloned() else {
            return;
        };
        let inherited = class
            .ancestor
            .and_then(|a| member_table(&*self.ctx, a).cloned())
            .unwrap_or_default();
        let own = self.own_groups(pending.ty, class.members);

        let mut effective = inherited.clone();
        for group in &own {
            self.overlay(&mut effective, group, Some(&inherited));
        }
        for group in own.iter().filter(|g| g.routines) {
            for &decl in &group.decls {
                self.match_override(decl, group, &inherited);
            }
        }

        let mut completed = class;
        completed.effective = effective;
        let interfaces = completed.interfaces.clone();
        self.set_kind(pending.ty, TypeKind::Class(completed));
        self.check_interfaces(pending, &interfaces);
        self.output.classes_completed += 1;
    }

    fn complete_interface(&mut self, pending: &PendingType) {
        let Some(intf) = self.ctx.type_entry(pending.ty).and_then(|t| t.kind.as_interface()).cloned() else {
            return;
        };

        let mut inherited = SymbolTable::new();
        for &ancestor in &intf.ancestors {
            let Some(table) = member_table(&*self.ctx, ancestor) else {
                continue;
            };
            for group in table.iter() {
                let mut decls = inherited.get(&group.name).map(|g| g.decls.clone()).unwrap_or_default();
                for &decl in &group.decls {
                    if !decls.contains(&decl) {
                        decls.push(decl);
                    }
                }
                inherited.overlay(&group.name, decls, group.routines);
            }
        }

        let mut effective = inherited.clone();
        for group in &self.own_groups(pending.ty, intf.members) {
            self.overlay(&mut effective, group, Some(&inherited));
        }

        let mut completed = intf;
        completed.effective = effective;
        self.set_kind(pending.ty, TypeKind::Interface(completed));
        self.output.interfaces_completed += 1;
    }

    fn own_groups(&self, ty: TypeRef, members: ScopeId) -> Vec<SymbolGroup> {
        self.ctx
            .scope(ty.unit, members)
            .map(|s| s.symbols.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Overlay one own group on `effective`.
    fn overlay(&self, effective: &mut SymbolTable, own: &SymbolGroup, inherited: Option<&SymbolTable>) {
        if !own.routines {
            effective.overlay(&own.name, own.decls.clone(), false);
            return;
        }

        let reintroduced = own.decls.iter().any(|&d| self.has_flag(d, RoutineFlags::REINTRODUCE));
        let mut decls = own.decls.clone();
        if !reintroduced
            && let Some(ancestor) = inherited.and_then(|t| t.get(&own.name)).filter(|g| g.routines)
        {
            decls.extend(
                ancestor
                    .decls
                    .iter()
                    .copied()
                    .filter(|&a| !own.decls.iter().any(|&o| self.same_signature(o, a))),
            );
        }
        effective.overlay(&own.name, decls, true);
    }

    /// Tie an `override` method to the ancestor method it overrides.
    fn match_override(&mut self, decl: DeclRef, group: &SymbolGroup, inherited: &SymbolTable) {
        if !self.has_flag(decl, RoutineFlags::OVERRIDE) {
            return;
        }
        let target = inherited
            .get(&group.name)
            .filter(|g| g.routines)
            .and_then(|g| {
                g.decls.iter().copied().find(|&a| {
                    self.ctx
                        .decl(a)
                        .and_then(|d| d.as_routine())
                        .is_some_and(|r| r.flags.is_dispatched())
                        && self.same_signature(decl, a)
                })
            });

        match target {
            Some(target) => {
                if let Some(routine) = self
                    .ctx
                    .builder_mut()
                    .decl_mut(decl.decl)
                    .and_then(|d| d.as_routine_mut())
                {
                    routine.overrides = Some(target);
                }
                self.output.overrides_matched += 1;
            }
            None => {
                let span = self.ctx.decl(decl).map(|d| d.span).unwrap_or_default();
                self.ctx.report(SemanticError::NoOverrideTarget {
                    name: group.name.to_string(),
                    span,
                });
            }
        }
    }

    /// Every method of the class's interfaces needs an implementation with
    /// the same name and signature, declared by the class or an ancestor.
    fn check_interfaces(&mut self, pending: &PendingType, interfaces: &[TypeRef]) {
        let mut all: Vec<TypeRef> = Vec::new();
        for &intf in interfaces {
            let intf = representation(&*self.ctx, intf);
            for candidate in std::iter::once(intf).chain(interface_ancestors(&*self.ctx, intf)) {
                if !all.contains(&candidate) {
                    all.push(candidate);
                }
            }
        }

        let mut missing = Vec::new();
        for intf in all {
            let Some(table) = member_table(&*self.ctx, intf) else {
                continue;
            };
            for group in table.iter().filter(|g| g.routines) {
                for &method in &group.decls {
                    if implements_interface_method(&*self.ctx, pending.ty, method).is_none() {
                        missing.push((intf, group.name.clone()));
                    }
                }
            }
        }

        let class_name = display_type(&*self.ctx, pending.ty);
        for (intf, method) in missing {
            let interface_name = display_type(&*self.ctx, intf);
            self.ctx.report(SemanticError::MissingInterfaceMethod {
                class_name: class_name.clone(),
                interface_name,
                method: method.to_string(),
                span: pending.span,
            });
        }
    }

    // =========================================================================
    // Properties
    // =========================================================================

    fn complete_property(&mut self, pending: &PendingProperty<'_>) {
        let Some(DeclKind::Property(mut property)) = self.ctx.decl(pending.decl).map(|d| d.kind.clone()) else {
            return;
        };
        let syntax = pending.property;

        if syntax.ty.is_none() {
            match self.inherited_property(pending) {
                Some(ancestor) => {
                    property.ty = ancestor.ty;
                    property.params = ancestor.params;
                    if syntax.read.is_none() {
                        property.read = ancestor.read;
                    }
                    if syntax.write.is_none() {
                        property.write = ancestor.write;
                    }
                    self.ctx.record_type(syntax.name.id, property.ty);
                }
                None => {
                    let type_name = display_type(&*self.ctx, pending.host);
                    self.ctx.report(SemanticError::UnknownMember {
                        type_name,
                        member: syntax.name.name.to_string(),
                        span: syntax.name.span,
                    });
                }
            }
        }

        let arity = property.params.len() + usize::from(syntax.index.is_some());
        if let (Some(ident), Some(accessor)) = (syntax.read, property.read.as_mut()) {
            accessor.target = self.resolve_accessor(pending.host, &ident, arity, false);
        }
        if let (Some(ident), Some(accessor)) = (syntax.write, property.write.as_mut()) {
            accessor.target = self.resolve_accessor(pending.host, &ident, arity, true);
        }

        if let Some(decl) = self.ctx.builder_mut().decl_mut(pending.decl.decl) {
            decl.kind = DeclKind::Property(property);
        }
    }

    /// The property a typeless `property Name;` republishes.
    fn inherited_property(&self, pending: &PendingProperty<'_>) -> Option<Property> {
        let ancestor = kind_of(&*self.ctx, pending.host).as_class()?.ancestor?;
        let group = lookup_member(&*self.ctx, ancestor, pending.property.name.name)?;
        group.decls.iter().find_map(|&d| match &self.ctx.decl(d)?.kind {
            DeclKind::Property(p) => Some(p.clone()),
            _ => None,
        })
    }

    /// Bind an accessor name to the field or method it denotes.
    ///
    /// A reader is a field or a function taking the property's parameters;
    /// a writer is a field or a procedure taking one more, the value.
    fn resolve_accessor(&mut self, host: TypeRef, ident: &AstIdent<'_>, arity: usize, write: bool) -> Option<DeclRef> {
        let found = lookup_member(&*self.ctx, host, ident.name).and_then(|group| {
            group.decls.iter().copied().find(|&d| {
                self.ctx.decl(d).is_some_and(|decl| match &decl.kind {
                    DeclKind::Field(_) | DeclKind::Variable(_) => arity == 0,
                    DeclKind::Routine(r) if write => {
                        r.signature.params.len() == arity + 1 && r.signature.result.is_none()
                    }
                    DeclKind::Routine(r) => r.signature.params.len() == arity && r.signature.result.is_some(),
                    _ => false,
                })
            })
        });

        match found {
            Some(decl) => {
                // Declaring an accessor is not a use of it; reads and writes are.
                self.ctx.bind_node(ident.id, decl);
                self.output.accessors_resolved += 1;
                Some(decl)
            }
            None => {
                let type_name = display_type(&*self.ctx, host);
                self.ctx.report(SemanticError::UnknownMember {
                    type_name,
                    member: ident.name.to_string(),
                    span: ident.span,
                });
                None
            }
        }
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    fn has_flag(&self, decl: DeclRef, flag: RoutineFlags) -> bool {
        self.ctx
            .decl(decl)
            .and_then(|d| d.as_routine())
            .is_some_and(|r| r.flags.contains(flag))
    }

    fn same_signature(&self, a: DeclRef, b: DeclRef) -> bool {
        let view: &dyn ProgramView = &*self.ctx;
        match (
            view.decl(a).and_then(|d| d.as_routine()),
            view.decl(b).and_then(|d| d.as_routine()),
        ) {
            (Some(a), Some(b)) => signatures_match(view, &a.signature, &b.signature),
            _ => false,
        }
    }

    fn set_kind(&mut self, ty: TypeRef, kind: TypeKind) {
        if let Some(entry) = self.ctx.builder_mut().type_mut(ty.ty) {
            entry.kind = kind;
        }
    }
}

#[cfg(test)]
mod tests {
    use delphi_core::{DeclKind, SemanticError};
    use delphi_registry::known;

    use crate::test_support::{decl_named, errors_of, resolve_one, type_named};
    use crate::types::{kind_of, lookup_member};
    use crate::view::ProgramView;

    #[test]
    fn overrides_and_overloads_overlay_by_signature() {
        let facts = resolve_one(
            "unit Shapes; interface
             type
               TBase = class
                 procedure Draw; virtual;
                 procedure Draw(Scale: Integer); overload; virtual;
               end;
               TDerived = class(TBase)
                 procedure Draw; override;
               end;
             implementation
             procedure TBase.Draw; begin end;
             procedure TBase.Draw(Scale: Integer); begin end;
             procedure TDerived.Draw; begin end;
             end.",
        );
        assert!(errors_of(&facts, "Shapes").is_empty(), "{:?}", errors_of(&facts, "Shapes"));
        let derived = type_named(&facts, "Shapes.TDerived");
        let group = lookup_member(&facts, derived, "Draw").unwrap();
        assert_eq!(group.decls.len(), 2);

        let own = group.decls[0];
        let routine = facts.decl(own).and_then(|d| d.as_routine()).unwrap();
        let base = facts.decl(routine.overrides.unwrap()).unwrap();
        assert_eq!(base.qualified_name.to_string(), "Shapes.TBase.Draw");
        assert_eq!(base.as_routine().unwrap().signature.params.len(), 0);
    }

    #[test]
    fn override_without_virtual_ancestor() {
        let facts = resolve_one(
            "unit Stray; interface
             type
               TBase = class procedure Run; end;
               TDerived = class(TBase) procedure Run; override; end;
             implementation
             procedure TBase.Run; begin end;
             procedure TDerived.Run; begin end;
             end.",
        );
        let errors = errors_of(&facts, "Stray");
        assert!(matches!(errors.as_slice(), [SemanticError::NoOverrideTarget { name, .. }] if name == "Run"));
        assert!(!facts.unit("Stray").unwrap().failed);
    }

    #[test]
    fn reintroduce_hides_ancestor_routines() {
        let facts = resolve_one(
            "unit Hide; interface
             type
               TBase = class procedure Run(Count: Integer); virtual; end;
               TDerived = class(TBase) procedure Run; reintroduce; end;
             implementation
             procedure TBase.Run(Count: Integer); begin end;
             procedure TDerived.Run; begin end;
             end.",
        );
        assert!(errors_of(&facts, "Hide").is_empty(), "{:?}", errors_of(&facts, "Hide"));
        let derived = type_named(&facts, "Hide.TDerived");
        let group = lookup_member(&facts, derived, "Run").unwrap();
        assert_eq!(group.decls, vec![decl_named(&facts, "Hide.TDerived.Run")]);
    }

    #[test]
    fn circular_inheritance_fails_the_unit() {
        let facts = resolve_one(
            "unit Cycle; interface
             type
               TA = class;
               TB = class(TA) end;
               TA = class(TB) end;
             implementation end.",
        );
        let errors = errors_of(&facts, "Cycle");
        assert!(errors.iter().any(|e| matches!(e, SemanticError::CircularInheritance { .. })), "{errors:?}");
        assert!(facts.unit("Cycle").unwrap().failed);
    }

    #[test]
    fn interface_methods_must_be_implemented() {
        let facts = resolve_one(
            "unit Shapes; interface
             type
               IShape = interface
                 function Area: Double;
                 function Name: string;
               end;
               TBase = class(TInterfacedObject)
                 function Name: string;
               end;
               TSquare = class(TBase, IShape)
                 function Area: Integer;
               end;
             implementation
             function TBase.Name: string; begin Result := ''; end;
             function TSquare.Area: Integer; begin Result := 0; end;
             end.",
        );
        let errors = errors_of(&facts, "Shapes");
        assert!(
            matches!(errors.as_slice(), [SemanticError::MissingInterfaceMethod { method, .. }] if method == "Area"),
            "{errors:?}"
        );
    }

    #[test]
    fn property_accessors_and_redeclaration() {
        let facts = resolve_one(
            "unit Props; interface
             type
               TBase = class
               private
                 FCount: Integer;
                 function GetItem(Index: Integer): string;
               protected
                 property Count: Integer read FCount write FCount;
               public
                 property Items[Index: Integer]: string read GetItem; default;
               end;
               TDerived = class(TBase)
               public
                 property Count;
               end;
             implementation
             function TBase.GetItem(Index: Integer): string; begin Result := ''; end;
             end.",
        );
        assert!(errors_of(&facts, "Props").is_empty(), "{:?}", errors_of(&facts, "Props"));
        let count = decl_named(&facts, "Props.TDerived.Count");
        let Some(DeclKind::Property(property)) = facts.decl(count).map(|d| &d.kind) else {
            panic!("not a property");
        };
        assert_eq!(property.ty, known::INTEGER);
        assert_eq!(property.read.as_ref().and_then(|a| a.target), Some(decl_named(&facts, "Props.TBase.FCount")));

        let items = decl_named(&facts, "Props.TBase.Items");
        let Some(DeclKind::Property(property)) = facts.decl(items).map(|d| &d.kind) else {
            panic!("not a property");
        };
        assert_eq!(property.read.as_ref().and_then(|a| a.target), Some(decl_named(&facts, "Props.TBase.GetItem")));
        assert!(kind_of(&facts, type_named(&facts, "Props.TDerived")).as_class().is_some());
    }

    #[test]
    fn unknown_accessor_is_reported() {
        let facts = resolve_one(
            "unit Bad; interface
             type TBox = class
               property Size: Integer read FSize;
             end;
             implementation end.",
        );
        let errors = errors_of(&facts, "Bad");
        assert!(matches!(errors.as_slice(), [SemanticError::UnknownMember { member, .. }] if member == "FSize"));
    }
}
