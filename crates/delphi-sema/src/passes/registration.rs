//! Registration Pass - declare everything a section or routine body declares.
//!
//! This pass walks one declaration list and enters its types, constants,
//! variables and routine headings into a scope of the unit under
//! resolution. Routine bodies are collected, not checked.
//!
//! ## Responsibilities
//!
//! - Announce every type name of the list before any definition, so types
//!   may refer to each other in any order
//! - Complete `class;` and `interface;` forwards in place
//! - Register class, interface and record members with their visibility
//! - Resolve ancestors, defaulting to `TObject` and `IInterface`
//! - Bind implementation headings to the interface heading or method they
//!   implement
//!
//! ## Forward references
//!
//! ```text
//! TNode = class;              ← announced: Class { is_forward: true }
//! TList = class
//!   Head: TNode;              ← resolves to the announced TypeRef
//! end;
//! TNode = class               ← same TypeRef, backfilled in place
//!   Next: TNode;
//! end;
//! ```

use rustc_hash::FxHashMap;
use tracing::{debug, trace};

use delphi_core::{
    Accessor, AliasType, ClassType, Constant, DeclKind, DeclRef, Declaration, Field, InterfaceType,
    Name, NodeId, Property, RecordType, Routine, ScopeId, ScopeKind, SemanticError, Signature, Span,
    TypeEntry, TypeKind, TypeRef, Variable, VariableKind, Visibility,
};
use delphi_parser::ast::{
    Attribute, ClassDef, ConstDecl, Decl, FieldDecl, Ident, InterfaceDef, Member, MemberKind,
    PropertyDecl, RecordDef, RoutineDecl, RoutineHeader, TypeDecl, TypeDef, TypeExprKind, VarDecl,
};
use delphi_registry::{Unit, known};

use crate::const_eval::ConstEvaluator;
use crate::context::{ResolveContext, Site};
use crate::conversion::signatures_match;
use crate::expr::ExprChecker;
use crate::passes::{PendingBody, PendingProperty, PendingType};
use crate::scope::lookup;
use crate::type_resolver::{TypeResolver, member_decl};
use crate::types::{display_type, kind_of};
use crate::view::ProgramView;

/// Output of the registration pass.
#[derive(Debug, Default)]
pub struct RegistrationOutput<'ast> {
    pub types_registered: usize,
    pub routines_registered: usize,
    pub variables_registered: usize,
    /// Classes and interfaces awaiting completion, in declaration order.
    pub types: Vec<PendingType>,
    pub properties: Vec<PendingProperty<'ast>>,
    pub bodies: Vec<PendingBody<'ast>>,
}

impl<'ast> RegistrationOutput<'ast> {
    /// Append the output of a nested registration.
    pub fn merge(&mut self, other: RegistrationOutput<'ast>) {
        self.types_registered += other.types_registered;
        self.routines_registered += other.routines_registered;
        self.variables_registered += other.variables_registered;
        self.types.extend(other.types);
        self.properties.extend(other.properties);
        self.bodies.extend(other.bodies);
    }
}

/// Declares the contents of one declaration list.
pub struct RegistrationPass<'a, 'p, 'ast> {
    ctx: &'a mut ResolveContext<'p>,
    output: RegistrationOutput<'ast>,
    /// Announced type declarations by the node of their name.
    announced: FxHashMap<NodeId, (DeclRef, TypeRef)>,
}

impl<'a, 'p, 'ast> RegistrationPass<'a, 'p, 'ast> {
    pub fn new(ctx: &'a mut ResolveContext<'p>) -> Self {
        Self {
            ctx,
            output: RegistrationOutput::default(),
            announced: FxHashMap::default(),
        }
    }

    /// Register `decls` into `scope`.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn run(mut self, decls: &'ast [Decl<'ast>], scope: ScopeId) -> RegistrationOutput<'ast> {
        for decl in decls {
            if let Decl::Type(type_decl) = *decl {
                self.announce_type(type_decl, scope, None);
            }
        }
        for decl in decls {
            match *decl {
                Decl::Type(type_decl) => self.define_type(type_decl, scope),
                Decl::Const(const_decl) => {
                    self.register_const(const_decl, scope, None);
                }
                Decl::Var(var) => self.register_var(var, scope),
                Decl::Routine(routine) => self.register_routine(routine, scope),
            }
        }
        debug!(
            unit = %self.ctx.builder().name(),
            section = self.ctx.section().as_str(),
            types = self.output.types_registered,
            routines = self.output.routines_registered,
            variables = self.output.variables_registered,
            "registration complete"
        );
        self.output
    }

    // =========================================================================
    // Types
    // =========================================================================

    /// Declare a type name with a placeholder structure.
    fn announce_type(&mut self, type_decl: &TypeDecl<'_>, scope: ScopeId, owner: Option<(TypeRef, Visibility)>) {
        let name = &type_decl.name;
        if let Some(forward) = self.forward_of(type_decl, scope) {
            self.ctx.bind_node(name.id, forward.0);
            self.announced.insert(name.id, forward);
            return;
        }

        let ty = self
            .ctx
            .builder_mut()
            .add_type(TypeEntry::named(name.name, TypeKind::Placeholder));
        let kind = match type_decl.def {
            TypeDef::Class(_) | TypeDef::ClassForward => {
                let members = self.ctx.builder_mut().add_scope(ScopeKind::TypeBody(ty), Some(scope));
                self.set_kind(ty, TypeKind::Class(ClassType::forward(members)));
                DeclKind::ClassType(ty)
            }
            TypeDef::Interface(_) | TypeDef::InterfaceForward => {
                let members = self.ctx.builder_mut().add_scope(ScopeKind::TypeBody(ty), Some(scope));
                let mut intf = InterfaceType::new(members);
                intf.is_forward = true;
                self.set_kind(ty, TypeKind::Interface(intf));
                DeclKind::InterfaceType(ty)
            }
            TypeDef::Record(record) => {
                let members = self.ctx.builder_mut().add_scope(ScopeKind::TypeBody(ty), Some(scope));
                self.set_kind(
                    ty,
                    TypeKind::Record(RecordType {
                        members,
                        is_packed: record.is_packed,
                    }),
                );
                DeclKind::RecordType(ty)
            }
            TypeDef::Type(texpr) if matches!(texpr.kind, TypeExprKind::Enum(_)) => DeclKind::EnumType(ty),
            TypeDef::Type(_) | TypeDef::Strong(_) => DeclKind::TypeAlias(ty),
        };

        let declaration = self
            .declaration(name, scope, kind, owner)
            .with_attributes(attribute_names(type_decl.attributes));
        let decl = self.declare(scope, declaration, name.span);
        if let Some(entry) = self.ctx.builder_mut().type_mut(ty.ty) {
            entry.decl = Some(decl);
        }
        self.ctx.bind_node(name.id, decl);
        self.announced.insert(name.id, (decl, ty));
    }

    /// The announced forward that a full class or interface definition completes.
    fn forward_of(&self, type_decl: &TypeDecl<'_>, scope: ScopeId) -> Option<(DeclRef, TypeRef)> {
        let symbols = &self.ctx.scope(self.ctx.unit_id(), scope)?.symbols;
        let &[existing] = symbols.get(&Name::new(type_decl.name.name))?.decls.as_slice() else {
            return None;
        };
        let ty = self.ctx.decl(existing)?.kind.declared_type()?;
        let is_forward = match (&self.ctx.type_entry(ty)?.kind, type_decl.def) {
            (TypeKind::Class(class), TypeDef::Class(_)) => class.is_forward,
            (TypeKind::Interface(intf), TypeDef::Interface(_)) => intf.is_forward,
            _ => false,
        };
        is_forward.then_some((existing, ty))
    }

    fn define_type(&mut self, type_decl: &'ast TypeDecl<'ast>, scope: ScopeId) {
        let Some(&(decl, ty)) = self.announced.get(&type_decl.name.id) else {
            return;
        };
        let site = Site::new(scope).with_context(decl);
        match type_decl.def {
            TypeDef::Type(texpr) => {
                TypeResolver::new(self.ctx, site).define(texpr, ty);
                self.check_alias_cycle(type_decl, ty);
            }
            TypeDef::Strong(texpr) => {
                let target = TypeResolver::new(self.ctx, site).resolve(texpr);
                self.set_kind(ty, TypeKind::Alias(AliasType { target, strong: true }));
                self.check_alias_cycle(type_decl, ty);
            }
            TypeDef::Class(class) => self.define_class(class, type_decl, decl, ty, scope),
            TypeDef::Interface(intf) => self.define_interface(intf, type_decl, decl, ty, scope),
            TypeDef::Record(record) => self.define_record(record, decl, ty),
            TypeDef::ClassForward | TypeDef::InterfaceForward => return,
        }
        self.output.types_registered += 1;
        trace!(name = type_decl.name.name, "type defined");
    }

    /// Report an alias chain that leads back to `ty` and cut it.
    fn check_alias_cycle(&mut self, type_decl: &TypeDecl<'_>, ty: TypeRef) {
        let mut current = ty;
        let mut steps = 0;
        while let Some(TypeKind::Alias(alias)) = self.ctx.type_entry(current).map(|t| &t.kind) {
            current = alias.target;
            steps += 1;
            if current == ty || steps > 64 {
                self.ctx.report(SemanticError::CyclicAlias {
                    name: type_decl.name.name.to_string(),
                    span: type_decl.name.span,
                });
                self.set_kind(ty, TypeKind::Unresolved);
                return;
            }
        }
    }

    fn define_class(
        &mut self,
        class: &'ast ClassDef<'ast>,
        type_decl: &TypeDecl<'_>,
        decl: DeclRef,
        ty: TypeRef,
        scope: ScopeId,
    ) {
        let Some(members) = self.ctx.type_entry(ty).and_then(|t| t.kind.as_class()).map(|c| c.members) else {
            return;
        };
        let site = Site::new(scope).with_context(decl);

        let mut ancestor = None;
        let mut interfaces = Vec::new();
        for (index, name) in class.ancestors.iter().enumerate() {
            let resolved = TypeResolver::new(self.ctx, site).resolve_name(name);
            match kind_of(&*self.ctx, resolved) {
                TypeKind::Class(_) if index == 0 => ancestor = Some(resolved),
                TypeKind::Interface(_) => interfaces.push(resolved),
                TypeKind::Unresolved => {}
                _ => {
                    let from = display_type(&*self.ctx, resolved);
                    let to = if index == 0 { "class or interface" } else { "interface" };
                    self.ctx.report(SemanticError::TypeMismatch {
                        from,
                        to: to.to_string(),
                        span: name.span,
                    });
                }
            }
        }

        let mut entry = ClassType::new(members);
        entry.ancestor = Some(ancestor.unwrap_or(known::TOBJECT));
        entry.interfaces = interfaces;
        entry.is_abstract = class.is_abstract;
        entry.is_sealed = class.is_sealed;
        self.set_kind(ty, TypeKind::Class(entry));

        self.register_members(class.members, members, ty, decl);
        self.output.types.push(PendingType {
            ty,
            decl,
            span: type_decl.name.span,
        });
    }

    fn define_interface(
        &mut self,
        intf: &'ast InterfaceDef<'ast>,
        type_decl: &TypeDecl<'_>,
        decl: DeclRef,
        ty: TypeRef,
        scope: ScopeId,
    ) {
        let Some(members) = self.ctx.type_entry(ty).and_then(|t| t.kind.as_interface()).map(|i| i.members) else {
            return;
        };
        let site = Site::new(scope).with_context(decl);

        let mut entry = InterfaceType::new(members);
        for name in intf.ancestors {
            let resolved = TypeResolver::new(self.ctx, site).resolve_name(name);
            match kind_of(&*self.ctx, resolved) {
                TypeKind::Interface(_) => entry.ancestors.push(resolved),
                TypeKind::Unresolved => {}
                _ => {
                    let from = display_type(&*self.ctx, resolved);
                    self.ctx.report(SemanticError::TypeMismatch {
                        from,
                        to: "interface".to_string(),
                        span: name.span,
                    });
                }
            }
        }
        if intf.ancestors.is_empty() {
            entry.ancestors.push(known::IINTERFACE);
        }
        entry.guid = intf.guid.map(str::to_string);
        self.set_kind(ty, TypeKind::Interface(entry));

        self.register_members(intf.members, members, ty, decl);
        self.output.types.push(PendingType {
            ty,
            decl,
            span: type_decl.name.span,
        });
    }

    fn define_record(&mut self, record: &'ast RecordDef<'ast>, decl: DeclRef, ty: TypeRef) {
        let Some(TypeKind::Record(entry)) = self.ctx.type_entry(ty).map(|t| &t.kind) else {
            return;
        };
        let members = entry.members;
        self.register_members(record.members, members, ty, decl);
    }

    fn set_kind(&mut self, ty: TypeRef, kind: TypeKind) {
        if let Some(entry) = self.ctx.builder_mut().type_mut(ty.ty) {
            entry.kind = kind;
        }
    }

    // =========================================================================
    // Members
    // =========================================================================

    fn register_members(&mut self, members: &'ast [Member<'ast>], scope: ScopeId, host: TypeRef, host_decl: DeclRef) {
        for member in members {
            if let MemberKind::Type(type_decl) = member.kind {
                self.announce_type(type_decl, scope, Some((host, member.visibility)));
            }
        }

        let site = Site::new(scope).with_context(host_decl);
        for member in members {
            let owner = Some((host, member.visibility));
            match member.kind {
                MemberKind::Field(field) => self.register_field(field, site, host, member.visibility),
                MemberKind::Method(header) => {
                    self.register_method(header, site, host, member.visibility);
                }
                MemberKind::Property(property) => {
                    self.register_property(property, site, host, member.visibility);
                }
                MemberKind::Const(const_decl) => {
                    self.register_const(const_decl, scope, owner);
                }
                MemberKind::Type(type_decl) => self.define_type(type_decl, scope),
            }
        }
    }

    fn register_field(&mut self, field: &FieldDecl<'_>, site: Site, host: TypeRef, visibility: Visibility) {
        let ty = TypeResolver::new(self.ctx, site).resolve(field.ty);
        for name in field.names {
            let kind = DeclKind::Field(Field {
                ty,
                is_class_var: field.is_class_var,
            });
            let declaration = self
                .declaration(name, site.scope, kind, Some((host, visibility)))
                .with_attributes(attribute_names(field.attributes));
            let decl = self.declare(site.scope, declaration, name.span);
            self.ctx.bind_node(name.id, decl);
            self.ctx.record_type(name.id, ty);
        }
    }

    fn register_method(
        &mut self,
        header: &RoutineHeader<'_>,
        site: Site,
        host: TypeRef,
        visibility: Visibility,
    ) -> Option<DeclRef> {
        let name = header.simple_name()?;
        let signature = TypeResolver::new(self.ctx, site).resolve_signature(header.params, header.result);
        let kind = DeclKind::Routine(Routine::new(header.kind, signature).with_flags(header.flags));
        let declaration = self
            .declaration(name, site.scope, kind, Some((host, visibility)))
            .with_attributes(attribute_names(header.attributes));
        let decl = self.declare(site.scope, declaration, name.span);
        self.ctx.bind_node(name.id, decl);
        self.output.routines_registered += 1;
        Some(decl)
    }

    fn register_property(
        &mut self,
        property: &'ast PropertyDecl<'ast>,
        site: Site,
        host: TypeRef,
        visibility: Visibility,
    ) {
        let params = if property.params.is_empty() {
            Vec::new()
        } else {
            TypeResolver::new(self.ctx, site)
                .resolve_signature(property.params, None)
                .params
        };
        let ty = match property.ty {
            Some(texpr) => TypeResolver::new(self.ctx, site).resolve(texpr),
            // `property Name;` republishes an inherited property; completion copies it.
            None => known::UNRESOLVED,
        };
        if let Some(index) = property.index {
            ExprChecker::new(self.ctx, site).check(index, known::INTEGER);
        }

        let kind = DeclKind::Property(Property {
            ty,
            params,
            read: property.read.map(|i| Accessor::named(i.name)),
            write: property.write.map(|i| Accessor::named(i.name)),
            is_default: property.is_default,
        });
        let declaration = self
            .declaration(&property.name, site.scope, kind, Some((host, visibility)))
            .with_attributes(attribute_names(property.attributes));
        let decl = self.declare(site.scope, declaration, property.name.span);
        self.ctx.bind_node(property.name.id, decl);
        self.ctx.record_type(property.name.id, ty);
        self.output.properties.push(PendingProperty { decl, host, property });
    }

    // =========================================================================
    // Constants and variables
    // =========================================================================

    fn register_const(
        &mut self,
        const_decl: &ConstDecl<'_>,
        scope: ScopeId,
        owner: Option<(TypeRef, Visibility)>,
    ) -> DeclRef {
        let site = Site::new(scope);
        let (ty, is_typed) = match const_decl.ty {
            Some(texpr) => {
                let ty = TypeResolver::new(self.ctx, site).resolve(texpr);
                ExprChecker::new(self.ctx, site).check(const_decl.value, ty);
                (ty, true)
            }
            None => {
                let mut checker = ExprChecker::new(self.ctx, site);
                let info = checker.infer(const_decl.value);
                let ty = checker.value_type(&info);
                let ty = if const_decl.is_resource_string {
                    known::UNICODESTRING
                } else {
                    ty
                };
                (ty, false)
            }
        };
        let value = ConstEvaluator::new(&*self.ctx, &self.ctx.current().facts).eval(const_decl.value);

        let kind = DeclKind::Constant(Constant { ty, value, is_typed });
        let declaration = self
            .declaration(&const_decl.name, scope, kind, owner)
            .with_attributes(attribute_names(const_decl.attributes));
        let decl = self.declare(scope, declaration, const_decl.name.span);
        self.ctx.bind_node(const_decl.name.id, decl);
        self.ctx.record_type(const_decl.name.id, ty);
        decl
    }

    fn register_var(&mut self, var: &VarDecl<'_>, scope: ScopeId) {
        let site = Site::new(scope);
        let ty = TypeResolver::new(self.ctx, site).resolve(var.ty);
        let kind = if scope == Unit::INTERFACE_SCOPE || scope == Unit::IMPLEMENTATION_SCOPE {
            VariableKind::Global
        } else {
            VariableKind::Local
        };

        let mut first = None;
        for name in var.names {
            let declaration = self
                .declaration(name, scope, DeclKind::Variable(Variable { ty, kind }), None)
                .with_attributes(attribute_names(var.attributes));
            let decl = self.declare(scope, declaration, name.span);
            self.ctx.bind_node(name.id, decl);
            self.ctx.record_type(name.id, ty);
            first.get_or_insert(decl);
            self.output.variables_registered += 1;
        }

        if let Some(init) = var.init {
            // An initializer mentioning its own variable does not use it.
            let site = match first {
                Some(decl) => site.with_context(decl),
                None => site,
            };
            ExprChecker::new(self.ctx, site).check(init, ty);
        }
    }

    // =========================================================================
    // Routines
    // =========================================================================

    fn register_routine(&mut self, routine: &'ast RoutineDecl<'ast>, scope: ScopeId) {
        let header = routine.header;
        if header.name.parts.len() > 1 {
            self.register_method_body(routine, scope);
            return;
        }
        let Some(name) = header.simple_name() else {
            return;
        };

        let signature = TypeResolver::new(self.ctx, Site::new(scope)).resolve_signature(header.params, header.result);
        let existing = routine
            .body
            .and_then(|_| self.declared_heading(scope, name.name, &signature, header));
        let decl = match existing {
            Some(decl) => decl,
            None => {
                let kind = DeclKind::Routine(Routine::new(header.kind, signature).with_flags(header.flags));
                let declaration = self
                    .declaration(name, scope, kind, None)
                    .with_attributes(attribute_names(header.attributes));
                self.output.routines_registered += 1;
                self.declare(scope, declaration, name.span)
            }
        };
        self.ctx.bind_node(name.id, decl);

        if let Some(body) = routine.body {
            self.bind_body(decl, body.block.span);
            self.output.bodies.push(PendingBody {
                decl,
                routine,
                parent: scope,
                self_type: None,
            });
        }
    }

    /// An unimplemented heading this implementation completes: an interface
    /// declaration or a `forward` in the same scope.
    fn declared_heading(
        &self,
        scope: ScopeId,
        name: &str,
        signature: &Signature,
        header: &RoutineHeader<'_>,
    ) -> Option<DeclRef> {
        let key = Name::new(name);
        let unit = self.ctx.unit_id();
        let mut scopes = vec![scope];
        if scope == Unit::IMPLEMENTATION_SCOPE {
            scopes.push(Unit::INTERFACE_SCOPE);
        }
        let candidates: Vec<DeclRef> = scopes
            .into_iter()
            .filter_map(|s| self.ctx.scope(unit, s))
            .filter_map(|s| s.symbols.get(&key))
            .flat_map(|group| group.decls.iter().copied())
            .filter(|&d| {
                self.ctx
                    .decl(d)
                    .and_then(|d| d.as_routine())
                    .is_some_and(|r| r.body.is_none() && r.intrinsic.is_none())
            })
            .collect();
        self.matching_heading(&candidates, signature, header)
    }

    /// The candidate whose signature the implementation repeats. An
    /// implementation that omits its parameter list matches a lone candidate.
    fn matching_heading(
        &self,
        candidates: &[DeclRef],
        signature: &Signature,
        header: &RoutineHeader<'_>,
    ) -> Option<DeclRef> {
        let exact = candidates.iter().copied().find(|&d| {
            self.ctx
                .decl(d)
                .and_then(|d| d.as_routine())
                .is_some_and(|r| signatures_match(&*self.ctx, &r.signature, signature))
        });
        let abbreviated = header.params.is_empty() && header.result.is_none();
        match (exact, candidates) {
            (Some(decl), _) => Some(decl),
            (None, [only]) if abbreviated => Some(*only),
            _ => None,
        }
    }

    /// `procedure TFoo.Bar; begin ... end;`
    fn register_method_body(&mut self, routine: &'ast RoutineDecl<'ast>, scope: ScopeId) {
        let header = routine.header;
        let Some((method_name, type_path)) = header.name.parts.split_last() else {
            return;
        };
        let Some(host) = self.find_type_path(type_path, scope) else {
            return;
        };
        let members = match kind_of(&*self.ctx, host) {
            TypeKind::Class(class) => class.members,
            TypeKind::Record(record) => record.members,
            _ => {
                let from = display_type(&*self.ctx, host);
                self.ctx.report(SemanticError::TypeMismatch {
                    from,
                    to: "class or record".to_string(),
                    span: header.name.span,
                });
                return;
            }
        };

        // The heading sees the type's members, like the method body does.
        let heading_scope = self.ctx.builder_mut().add_scope(ScopeKind::TypeBody(host), Some(scope));
        let signature =
            TypeResolver::new(self.ctx, Site::new(heading_scope)).resolve_signature(header.params, header.result);

        let candidates: Vec<DeclRef> = self
            .ctx
            .scope(host.unit, members)
            .and_then(|s| s.symbols.get(&Name::new(method_name.name)))
            .map(|group| group.decls.clone())
            .unwrap_or_default()
            .into_iter()
            .filter(|&d| self.ctx.decl(d).is_some_and(Declaration::is_routine))
            .collect();

        let Some(decl) = self.matching_heading(&candidates, &signature, header) else {
            let type_name = display_type(&*self.ctx, host);
            self.ctx.report(SemanticError::UnknownMember {
                type_name,
                member: method_name.name.to_string(),
                span: method_name.span,
            });
            return;
        };
        self.ctx.bind_node(method_name.id, decl);
        if let Some(body) = routine.body {
            self.bind_body(decl, body.block.span);
            self.output.bodies.push(PendingBody {
                decl,
                routine,
                parent: scope,
                self_type: Some(host),
            });
        }
    }

    /// Resolve the type qualifying a method implementation.
    ///
    /// Segments are bound without recording references: implementing a
    /// method does not use its type.
    fn find_type_path(&mut self, path: &[Ident<'_>], scope: ScopeId) -> Option<TypeRef> {
        let first = path.first()?;
        let imports = self.ctx.import_search_order();
        let found = lookup(&*self.ctx, self.ctx.unit_id(), scope, first.name, &imports);
        let Some(mut decl) = found.and_then(|f| f.group.decls.first().copied()) else {
            self.ctx.report(SemanticError::UnknownIdentifier {
                name: first.name.to_string(),
                span: first.span,
            });
            return None;
        };
        self.ctx.bind_node(first.id, decl);

        for part in &path[1..] {
            let host = self.ctx.decl(decl)?.kind.declared_type()?;
            let Some(member) = member_decl(&*self.ctx, host, part.name) else {
                let type_name = display_type(&*self.ctx, host);
                self.ctx.report(SemanticError::UnknownMember {
                    type_name,
                    member: part.name.to_string(),
                    span: part.span,
                });
                return None;
            };
            self.ctx.bind_node(part.id, member);
            decl = member;
        }

        let ty = self.ctx.decl(decl)?.kind.declared_type();
        if ty.is_none() {
            self.ctx.report(SemanticError::TypeMismatch {
                from: self.ctx.decl(decl).map_or("?", |d| d.kind.as_str()).to_string(),
                to: "type".to_string(),
                span: first.span,
            });
        }
        ty
    }

    fn bind_body(&mut self, decl: DeclRef, span: Span) {
        if decl.unit != self.ctx.unit_id() {
            return;
        }
        if let Some(routine) = self
            .ctx
            .builder_mut()
            .decl_mut(decl.decl)
            .and_then(Declaration::as_routine_mut)
        {
            routine.body = Some(span);
        }
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    fn declaration(
        &self,
        name: &Ident<'_>,
        scope: ScopeId,
        kind: DeclKind,
        owner: Option<(TypeRef, Visibility)>,
    ) -> Declaration {
        let declaration = Declaration::new(
            name.name,
            self.ctx.qualify(scope, name.name),
            kind,
            self.ctx.unit_id(),
            scope,
        )
        .with_section(self.ctx.section())
        .with_span(name.span)
        .with_node(name.id);
        match owner {
            Some((host, visibility)) => declaration.with_owner(host).with_visibility(visibility),
            None => declaration,
        }
    }

    /// Enter a declaration, reporting a clash with a non-overloadable name.
    fn declare(&mut self, scope: ScopeId, declaration: Declaration, span: Span) -> DeclRef {
        match self.ctx.builder_mut().add_and_declare(scope, declaration) {
            Ok(decl) => decl,
            Err((decl, taken)) => {
                let original = self.ctx.decl(taken.existing).map(|d| d.span).unwrap_or_default();
                let name = self.ctx.decl(decl).map(|d| d.name.to_string()).unwrap_or_default();
                self.ctx
                    .report(SemanticError::DuplicateDeclaration { name, original, span });
                decl
            }
        }
    }
}

fn attribute_names(attributes: &[Attribute<'_>]) -> Vec<Name> {
    attributes.iter().map(|a| Name::new(a.name.to_dotted())).collect()
}

#[cfg(test)]
mod tests {
    use delphi_core::{DeclKind, SemanticError, TypeKind};
    use delphi_registry::known;

    use crate::test_support::{decl_named, errors_of, resolve_one, type_named};
    use crate::types::kind_of;
    use crate::view::ProgramView;

    #[test]
    fn forward_classes_are_completed_in_place() {
        let facts = resolve_one(
            "unit Lists; interface
             type
               TNode = class;
               TList = class
                 Head: TNode;
               end;
               TNode = class
                 Next: TNode;
                 Owner: TList;
               end;
             implementation end.",
        );
        assert!(errors_of(&facts, "Lists").is_empty(), "{:?}", errors_of(&facts, "Lists"));
        let node = type_named(&facts, "Lists.TNode");
        let class = kind_of(&facts, node).as_class().unwrap();
        assert!(!class.is_forward);
        assert_eq!(class.ancestor, Some(known::TOBJECT));
        let head = decl_named(&facts, "Lists.TList.Head");
        assert!(matches!(facts.decl(head).map(|d| &d.kind), Some(DeclKind::Field(f)) if f.ty == node));
    }

    #[test]
    fn duplicate_names_fail_the_unit() {
        let facts = resolve_one(
            "unit Twice; interface
             var Count: Integer;
             const Count = 2;
             implementation end.",
        );
        let errors = errors_of(&facts, "Twice");
        assert!(matches!(errors.as_slice(), [SemanticError::DuplicateDeclaration { name, .. }] if name == "Count"));
        assert!(facts.unit("Twice").unwrap().failed);
    }

    #[test]
    fn cyclic_strong_alias_is_structural() {
        let facts = resolve_one(
            "unit Loop; interface
             type
               TA = type TB;
               TB = TA;
             implementation end.",
        );
        let errors = errors_of(&facts, "Loop");
        assert!(errors.iter().any(|e| matches!(e, SemanticError::CyclicAlias { .. })), "{errors:?}");
        assert!(facts.unit("Loop").unwrap().failed);
    }

    #[test]
    fn implementations_bind_to_their_headings() {
        let facts = resolve_one(
            "unit Impl; interface
             type TBox = class
               procedure Put(Value: Integer);
               function Get: Integer;
             end;
             procedure Reset;
             implementation
             procedure Reset; begin end;
             procedure TBox.Put(Value: Integer); begin end;
             function TBox.Get; begin Result := 0; end;
             procedure Helper; forward;
             procedure Helper; begin Reset; end;
             end.",
        );
        assert!(errors_of(&facts, "Impl").is_empty(), "{:?}", errors_of(&facts, "Impl"));
        for name in ["Impl.Reset", "Impl.TBox.Put", "Impl.TBox.Get", "Impl.Helper"] {
            let decl = decl_named(&facts, name);
            let routine = facts.decl(decl).and_then(|d| d.as_routine()).unwrap();
            assert!(routine.body.is_some(), "{name} has no body");
        }
    }

    #[test]
    fn unknown_method_implementation() {
        let facts = resolve_one(
            "unit Stray; interface
             type TBox = class end;
             implementation
             procedure TBox.Missing; begin end;
             end.",
        );
        let errors = errors_of(&facts, "Stray");
        assert!(matches!(errors.as_slice(), [SemanticError::UnknownMember { member, .. }] if member == "Missing"));
    }

    #[test]
    fn records_and_interfaces() {
        let facts = resolve_one(
            "unit Shapes; interface
             type
               TPoint = record
                 X, Y: Integer;
                 function Length: Double;
               end;
               IShape = interface
                 ['{8F2A4B1C-0000-0000-0000-000000000001}']
                 function Area: Double;
               end;
             implementation
             function TPoint.Length: Double; begin Result := X * X + Y * Y; end;
             end.",
        );
        assert!(errors_of(&facts, "Shapes").is_empty(), "{:?}", errors_of(&facts, "Shapes"));
        let point = type_named(&facts, "Shapes.TPoint");
        assert!(matches!(kind_of(&facts, point), TypeKind::Record(_)));
        let shape = type_named(&facts, "Shapes.IShape");
        let intf = kind_of(&facts, shape).as_interface().unwrap();
        assert_eq!(intf.ancestors, vec![known::IINTERFACE]);
        assert!(intf.guid.is_some());
    }
}
