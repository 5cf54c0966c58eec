//! Type resolution for converting AST type expressions to type handles.
//!
//! [`TypeResolver`] turns a [`TypeExpr`] into a [`TypeRef`] of the unit
//! under resolution, creating anonymous types as needed and binding every
//! name segment it passes through.
//!
//! ## Features
//!
//! - Named and qualified names (`TFoo`, `Outer.TInner`, `System.SysUtils.TBytes`)
//! - `string` and `string[N]`
//! - Sets, pointers, metaclasses and dynamic arrays, shared per element type
//! - Static arrays, subranges and enums with folded bounds and ordinals
//! - Open arrays and `array of const` in parameter position
//! - Procedural types and routine signatures

use delphi_core::{
    AliasType, ArrayShape, ArrayType, DeclKind, DeclRef, Declaration, EnumType, Param, ParamFlags,
    ProceduralType, SemanticError, Signature, Span, StringKind, SubrangeType, TypeEntry, TypeKind,
    TypeRef,
};
use delphi_parser::ast::{DottedName, EnumMember, Expr, Ident, ParamGroup, TypeExpr, TypeExprKind};
use delphi_registry::known;
use tracing::trace;

use crate::const_eval::ConstEvaluator;
use crate::context::{DerivedType, ResolveContext, Site};
use crate::expr::ExprChecker;
use crate::scope::{lookup, lookup_in_unit, match_unit_prefix};
use crate::types::{display_type, is_unresolved, kind_of, lookup_member, ordinal_base};
use crate::view::ProgramView;

/// Resolves AST type expressions at one site.
pub struct TypeResolver<'a, 'p> {
    ctx: &'a mut ResolveContext<'p>,
    site: Site,
}

/// Why a dotted path stopped resolving.
#[derive(Debug, Clone, Copy, PartialEq)]
enum PathError {
    /// Segment `index` names nothing in scope.
    Unknown(usize),
    /// Segment `index` is not a member of `host`.
    NoMember { index: usize, host: TypeRef },
}

/// Declarations bound to the leading segments of a dotted path.
#[derive(Debug, Default)]
struct PathWalk {
    bindings: Vec<(usize, DeclRef)>,
    error: Option<PathError>,
}

impl PathWalk {
    fn failed(error: PathError) -> Self {
        Self {
            bindings: Vec::new(),
            error: Some(error),
        }
    }
}

impl<'a, 'p> TypeResolver<'a, 'p> {
    pub fn new(ctx: &'a mut ResolveContext<'p>, site: Site) -> Self {
        Self { ctx, site }
    }

    /// Resolve a type expression and record its type on the node.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn resolve(&mut self, texpr: &TypeExpr<'_>) -> TypeRef {
        let ty = match texpr.kind {
            TypeExprKind::Named(name) => self.resolve_name(&name),
            TypeExprKind::String { max_len: None } => known::UNICODESTRING,
            TypeExprKind::Set(element) => {
                let element = self.resolve(element);
                self.ctx.derived_type(DerivedType::Set(element))
            }
            TypeExprKind::Pointer(target) => {
                let target = self.resolve(target);
                self.ctx.derived_type(DerivedType::Pointer(target))
            }
            TypeExprKind::ClassOf(name) => {
                let instance = self.resolve_name(&name);
                self.ctx.derived_type(DerivedType::MetaClass(instance))
            }
            TypeExprKind::Array { dims: [], element, .. } => {
                let element = self.resolve(element);
                self.ctx.derived_type(DerivedType::DynamicArray(element))
            }
            TypeExprKind::Enum(_) => {
                let ty = self.ctx.builder_mut().add_type(TypeEntry::anonymous(TypeKind::Placeholder));
                self.define(texpr, ty);
                ty
            }
            _ => {
                let kind = self.structure(texpr, None);
                self.ctx.builder_mut().add_type(TypeEntry::anonymous(kind))
            }
        };
        self.ctx.record_type(texpr.id, ty);
        ty
    }

    /// Resolve a parameter type, where `array of T` is an open array.
    pub fn resolve_param(&mut self, texpr: &TypeExpr<'_>) -> TypeRef {
        let shape = match texpr.kind {
            TypeExprKind::Array { dims: [], element, .. } => Some((self.resolve(element), ArrayShape::Open)),
            TypeExprKind::ArrayOfConst => Some((known::UNTYPED, ArrayShape::OfConst)),
            _ => None,
        };
        let Some((element, shape)) = shape else {
            return self.resolve(texpr);
        };
        let ty = self
            .ctx
            .builder_mut()
            .add_type(TypeEntry::anonymous(TypeKind::Array(ArrayType { element, shape })));
        self.ctx.record_type(texpr.id, ty);
        ty
    }

    /// Fill the named placeholder `target` with the structure of `texpr`.
    pub fn define(&mut self, texpr: &TypeExpr<'_>, target: TypeRef) {
        let kind = self.structure(texpr, Some(target));
        if let Some(entry) = self.ctx.builder_mut().type_mut(target.ty) {
            entry.kind = kind;
        }
        self.ctx.record_type(texpr.id, target);
    }

    /// Parameter list and result type of a routine or procedural type.
    pub fn resolve_signature(&mut self, params: &[ParamGroup<'_>], result: Option<&TypeExpr<'_>>) -> Signature {
        let mut resolved = Vec::with_capacity(params.len());
        for group in params {
            let ty = match group.ty {
                Some(texpr) => self.resolve_param(texpr),
                None => known::UNTYPED,
            };
            let mut flags = group.flags;
            if let Some(default) = group.default {
                flags |= ParamFlags::HAS_DEFAULT;
                ExprChecker::new(self.ctx, self.site).check(default, ty);
            }
            for name in group.names {
                resolved.push(Param::new(name.name, ty).with_flags(flags));
            }
        }
        let result = result.map(|r| self.resolve(r));
        Signature::new(resolved, result)
    }

    // =========================================================================
    // Names
    // =========================================================================

    /// Resolve a dotted type name; every segment is bound to its declaration.
    pub fn resolve_name(&mut self, name: &DottedName<'_>) -> TypeRef {
        let Some(decl) = self.resolve_path(name.parts) else {
            return known::UNRESOLVED;
        };
        let Some(declaration) = self.ctx.decl(decl) else {
            return known::UNRESOLVED;
        };
        match declaration.kind.declared_type() {
            Some(ty) => ty,
            None => {
                let from = declaration.kind.as_str().to_string();
                self.ctx.report(SemanticError::TypeMismatch {
                    from,
                    to: "type".to_string(),
                    span: name.span,
                });
                known::UNRESOLVED
            }
        }
    }

    /// Resolve a dotted path to the declaration of its last segment.
    ///
    /// The leftmost segment is looked up in scope first. When that fails, or
    /// when only the unit reading of the path resolves every segment, the
    /// longest unit-name prefix is used instead.
    pub fn resolve_path(&mut self, parts: &[Ident<'_>]) -> Option<DeclRef> {
        let first = parts.first()?;
        let imports = self.ctx.import_search_order();
        let unit = self.ctx.unit_id();

        let local = lookup(&*self.ctx, unit, self.site.scope, first.name, &imports)
            .map(|found| walk_members(&*self.ctx, found.group.decls[0], 0, parts));

        let names: Vec<&str> = parts.iter().map(|p| p.name).collect();
        let qualified = match_unit_prefix(&*self.ctx, &names, unit, &imports).map(|(target, len)| {
            match lookup_in_unit(&*self.ctx, target, parts[len].name) {
                Some(group) => walk_members(&*self.ctx, group.decls[0], len, parts),
                None => PathWalk::failed(PathError::Unknown(len)),
            }
        });

        let walk = match (local, qualified) {
            (Some(local), Some(qualified)) if local.error.is_some() && qualified.error.is_none() => qualified,
            (Some(local), _) => local,
            (None, Some(qualified)) => qualified,
            (None, None) => PathWalk::failed(PathError::Unknown(0)),
        };

        for &(index, decl) in &walk.bindings {
            let part = &parts[index];
            self.ctx.record_declaration(part.id, part.span, decl, self.site);
        }

        match walk.error {
            None => walk.bindings.last().map(|&(_, decl)| decl),
            Some(PathError::Unknown(index)) => {
                if !self.ctx.has_unresolved_imports() {
                    let name = names[..=index].join(".");
                    self.ctx.report(SemanticError::UnknownIdentifier {
                        name,
                        span: parts[index].span,
                    });
                }
                None
            }
            Some(PathError::NoMember { index, host }) => {
                if !is_unresolved(&*self.ctx, host) {
                    let type_name = display_type(&*self.ctx, host);
                    self.ctx.report(SemanticError::UnknownMember {
                        type_name,
                        member: parts[index].name.to_string(),
                        span: parts[index].span,
                    });
                }
                None
            }
        }
    }

    // =========================================================================
    // Structure
    // =========================================================================

    /// Structure of a type constructor. `named` is the type being defined, if any.
    fn structure(&mut self, texpr: &TypeExpr<'_>, named: Option<TypeRef>) -> TypeKind {
        match texpr.kind {
            TypeExprKind::Named(name) => TypeKind::Alias(AliasType {
                target: self.resolve_name(&name),
                strong: false,
            }),
            TypeExprKind::String { max_len: None } => TypeKind::Alias(AliasType {
                target: known::UNICODESTRING,
                strong: false,
            }),
            TypeExprKind::String { max_len: Some(len) } => {
                let max_len = self
                    .fold_ordinal(len)
                    .and_then(|n| u16::try_from(n).ok())
                    .unwrap_or(255);
                TypeKind::String {
                    kind: StringKind::Short,
                    max_len: Some(max_len),
                }
            }
            TypeExprKind::Array { dims, element, .. } => {
                let shape = if dims.is_empty() {
                    ArrayShape::Dynamic
                } else {
                    ArrayShape::Static(dims.iter().map(|d| self.resolve(d)).collect())
                };
                let element = self.resolve(element);
                TypeKind::Array(ArrayType { element, shape })
            }
            TypeExprKind::ArrayOfConst => TypeKind::Array(ArrayType {
                element: known::UNTYPED,
                shape: ArrayShape::OfConst,
            }),
            TypeExprKind::Set(element) => TypeKind::Set(self.resolve(element)),
            TypeExprKind::Pointer(target) => TypeKind::Pointer(Some(self.resolve(target))),
            TypeExprKind::ClassOf(name) => TypeKind::MetaClass(self.resolve_name(&name)),
            TypeExprKind::Subrange { low, high } => self.subrange(low, high),
            TypeExprKind::Enum(members) => {
                let ty = named.unwrap_or(known::UNRESOLVED);
                TypeKind::Enum(self.enumeration(members, ty))
            }
            TypeExprKind::Procedural(proc) => TypeKind::Procedural(ProceduralType {
                signature: self.resolve_signature(proc.params, proc.result),
                kind: proc.kind,
            }),
        }
    }

    fn subrange(&mut self, low: &Expr<'_>, high: &Expr<'_>) -> TypeKind {
        let low_info = ExprChecker::new(self.ctx, self.site).infer(low);
        ExprChecker::new(self.ctx, self.site).infer(high);

        let evaluator = ConstEvaluator::new(&*self.ctx, &self.ctx.current().facts);
        let low_value = evaluator.eval_ordinal(low).unwrap_or(0);
        let high_value = evaluator.eval_ordinal(high).unwrap_or(0);

        let base = match kind_of(&*self.ctx, low_info.ty) {
            TypeKind::Integer(_) => known::INTEGER,
            _ => ordinal_base(&*self.ctx, low_info.ty),
        };
        TypeKind::Subrange(SubrangeType {
            base,
            low: low_value,
            high: high_value,
        })
    }

    /// Declare the values of an enumeration in the current scope.
    fn enumeration(&mut self, members: &[EnumMember<'_>], ty: TypeRef) -> EnumType {
        let mut values = Vec::with_capacity(members.len());
        let mut next = 0i64;
        for member in members {
            let ordinal = match member.value {
                Some(value) => self.fold_ordinal(value).unwrap_or(next),
                None => next,
            };
            next = ordinal.saturating_add(1);

            let decl = Declaration::new(
                member.name.name,
                self.ctx.qualify(self.site.scope, member.name.name),
                DeclKind::EnumValue { ty, ordinal },
                self.ctx.unit_id(),
                self.site.scope,
            )
            .with_section(self.ctx.section())
            .with_span(member.name.span)
            .with_node(member.name.id);
            values.push(self.declare(decl, member.name.span));
        }
        trace!(values = values.len(), "enumeration");
        EnumType { values }
    }

    fn declare(&mut self, decl: Declaration, span: Span) -> DeclRef {
        match self.ctx.builder_mut().add_and_declare(self.site.scope, decl) {
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

    /// Check `expr` and fold it to an ordinal.
    fn fold_ordinal(&mut self, expr: &Expr<'_>) -> Option<i64> {
        ExprChecker::new(self.ctx, self.site).infer(expr);
        ConstEvaluator::new(&*self.ctx, &self.ctx.current().facts).eval_ordinal(expr)
    }
}

/// Bind `head` to `parts[start]`, then every later segment as a member of the previous one.
fn walk_members(view: &dyn ProgramView, head: DeclRef, start: usize, parts: &[Ident<'_>]) -> PathWalk {
    let mut walk = PathWalk {
        bindings: vec![(start, head)],
        error: None,
    };
    let mut current = head;
    for (index, part) in parts.iter().enumerate().skip(start + 1) {
        let Some(declaration) = view.decl(current) else {
            walk.error = Some(PathError::Unknown(index - 1));
            return walk;
        };
        let host = declaration
            .kind
            .declared_type()
            .or_else(|| declaration.kind.value_type())
            .unwrap_or(known::UNRESOLVED);
        match member_decl(view, host, part.name) {
            Some(decl) => {
                walk.bindings.push((index, decl));
                current = decl;
            }
            None => {
                walk.error = Some(PathError::NoMember { index, host });
                return walk;
            }
        }
    }
    walk
}

/// A member of a type by name: class/record/interface members or enum values.
pub(crate) fn member_decl(view: &dyn ProgramView, host: TypeRef, name: &str) -> Option<DeclRef> {
    if let TypeKind::Enum(enumeration) = kind_of(view, host) {
        return enumeration
            .values
            .iter()
            .copied()
            .find(|&v| view.decl(v).is_some_and(|d| d.name.matches(name)));
    }
    lookup_member(view, host, name).map(|group| group.decls[0])
}
