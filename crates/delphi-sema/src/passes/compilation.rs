//! Compilation Pass - check routine bodies and unit initialization.
//!
//! This pass runs after registration and type completion of the
//! implementation section. It handles:
//!
//! - Routine and method bodies, with their parameters, implicit `Self` and
//!   `Result`, local declarations and nested routines
//! - The `initialization` and `finalization` blocks
//!
//! # Architecture
//!
//! ```text
//! CompilationPass
//!   for each pending body:
//!     Routine scope  ← params, Self, Result
//!       RegistrationPass + TypeCompletionPass over the local declarations
//!       StmtChecker over the block
//!       nested bodies, recursively
//! ```

use tracing::{debug, trace};

use delphi_core::{
    DeclKind, DeclRef, Declaration, ScopeId, ScopeKind, Section, SemanticError, Span,
    TypeKind, TypeRef, Variable, VariableKind,
};
use delphi_parser::ast::Block;
use delphi_registry::Unit;

use crate::context::{DerivedType, ResolveContext, Site};
use crate::passes::{PendingBody, RegistrationPass, TypeCompletionPass};
use crate::stmt::StmtChecker;
use crate::types::kind_of;
use crate::view::ProgramView;

/// Output of the compilation pass.
#[derive(Debug, Default)]
pub struct CompilationOutput {
    /// Routine bodies checked, nested ones included.
    pub bodies_checked: usize,
    pub locals_registered: usize,
    /// Whether the unit has an `initialization` or `finalization` block.
    pub has_initialization: bool,
}

/// Checks every body of the implementation section.
pub struct CompilationPass<'a, 'p> {
    ctx: &'a mut ResolveContext<'p>,
    output: CompilationOutput,
}

impl<'a, 'p> CompilationPass<'a, 'p> {
    pub fn new(ctx: &'a mut ResolveContext<'p>) -> Self {
        Self {
            ctx,
            output: CompilationOutput::default(),
        }
    }

    /// Check `bodies`, then the unit's `initialization` and `finalization`.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn run(
        mut self,
        bodies: Vec<PendingBody<'_>>,
        initialization: Option<&Block<'_>>,
        finalization: Option<&Block<'_>>,
    ) -> CompilationOutput {
        self.ctx.set_section(Section::Implementation);
        for body in bodies {
            self.check_body(body);
        }

        for (section, block) in [
            (Section::Initialization, initialization),
            (Section::Finalization, finalization),
        ] {
            if let Some(block) = block {
                self.ctx.set_section(section);
                StmtChecker::new(self.ctx, Site::new(Unit::IMPLEMENTATION_SCOPE)).check_block(block);
                self.output.has_initialization = true;
            }
        }
        self.ctx.set_section(Section::Implementation);

        debug!(
            unit = %self.ctx.builder().name(),
            bodies = self.output.bodies_checked,
            locals = self.output.locals_registered,
            "compilation complete"
        );
        self.output
    }

    fn check_body(&mut self, pending: PendingBody<'_>) {
        let Some(body) = pending.routine.body else {
            return;
        };
        let scope = self.ctx.builder_mut().add_scope(
            ScopeKind::Routine {
                decl: pending.decl.decl,
                self_type: pending.self_type,
            },
            Some(pending.parent),
        );

        self.declare_params(&pending, scope);
        self.declare_implicits(&pending, scope);

        let locals = RegistrationPass::new(self.ctx).run(body.decls, scope);
        self.output.locals_registered += locals.variables_registered;
        if !locals.types.is_empty() || !locals.properties.is_empty() {
            TypeCompletionPass::new(self.ctx).run(&locals.types, &locals.properties);
        }

        let site = Site::new(scope).with_context(pending.decl);
        StmtChecker::new(self.ctx, site).check_block(&body.block);
        self.output.bodies_checked += 1;
        trace!(routine = %pending.routine.header.name.to_dotted(), "body checked");

        for nested in locals.bodies {
            self.check_body(nested);
        }
    }

    /// Declare the formal parameters in the routine scope.
    ///
    /// An implementation that omits its parameter list still sees the
    /// parameters of the heading it implements.
    fn declare_params(&mut self, pending: &PendingBody<'_>, scope: ScopeId) {
        let Some(signature) = self
            .ctx
            .decl(pending.decl)
            .and_then(|d| d.as_routine())
            .map(|r| r.signature.clone())
        else {
            return;
        };
        let header = pending.routine.header;

        if header.params.is_empty() {
            for param in &signature.params {
                let declaration = self
                    .local(param.name.as_str(), scope, param.ty, VariableKind::Param(param.flags), header.name.span)
                    .implicit();
                self.declare(scope, declaration, header.name.span);
            }
            return;
        }

        let names = header.params.iter().flat_map(|group| group.names.iter());
        for (name, param) in names.zip(&signature.params) {
            let declaration = self
                .local(name.name, scope, param.ty, VariableKind::Param(param.flags), name.span)
                .with_node(name.id);
            let decl = self.declare(scope, declaration, name.span);
            self.ctx.bind_node(name.id, decl);
            self.ctx.record_type(name.id, param.ty);
        }
    }

    /// `Self` in methods, `Result` in functions.
    fn declare_implicits(&mut self, pending: &PendingBody<'_>, scope: ScopeId) {
        let span = pending.routine.header.name.span;
        let Some(routine) = self.ctx.decl(pending.decl).and_then(|d| d.as_routine()).cloned() else {
            return;
        };

        if let Some(host) = pending.self_type {
            let is_class = matches!(kind_of(&*self.ctx, host), TypeKind::Class(_));
            let ty = if routine.is_class_method() && is_class {
                self.ctx.derived_type(DerivedType::MetaClass(host))
            } else {
                host
            };
            let declaration = self.local("Self", scope, ty, VariableKind::SelfRef, span).implicit();
            self.declare(scope, declaration, span);
        }

        if let Some(result) = routine.signature.result {
            let declaration = self.local("Result", scope, result, VariableKind::Result, span).implicit();
            self.declare(scope, declaration, span);
        }
    }

    fn local(&self, name: &str, scope: ScopeId, ty: TypeRef, kind: VariableKind, span: Span) -> Declaration {
        Declaration::new(
            name,
            self.ctx.qualify(scope, name),
            DeclKind::Variable(Variable { ty, kind }),
            self.ctx.unit_id(),
            scope,
        )
        .with_section(Section::Implementation)
        .with_span(span)
    }

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

#[cfg(test)]
mod tests {
    use delphi_core::{DeclKind, SemanticError, TypeKind, VariableKind};
    use delphi_registry::known;

    use crate::test_support::{decl_named, declarations_on_line, errors_of, resolve_one, types_on_line};
    use crate::view::ProgramView;

    #[test]
    fn params_self_and_result() {
        let facts = resolve_one(
            "unit Calc; interface
             type TCalc = class
               FBase: Integer;
               function Add(A, B: Integer): Integer;
               class function Make: TCalc;
             end;
             implementation
             function TCalc.Add(A, B: Integer): Integer;
             begin
               Result := A + B + FBase + Self.FBase;
             end;
             class function TCalc.Make: TCalc;
             begin
               Result := Self.Create;
             end;
             end.",
        );
        assert!(errors_of(&facts, "Calc").is_empty(), "{:?}", errors_of(&facts, "Calc"));
        let result = decl_named(&facts, "Calc.TCalc.Add.Result");
        assert!(matches!(
            facts.decl(result).map(|d| &d.kind),
            Some(DeclKind::Variable(v)) if v.kind == VariableKind::Result && v.ty == known::INTEGER
        ));
        assert!(declarations_on_line(&facts, "Calc", 10).contains(&decl_named(&facts, "Calc.TCalc.FBase")));

        let make_self = decl_named(&facts, "Calc.TCalc.Make.Self");
        let ty = facts.decl(make_self).and_then(|d| d.kind.value_type()).unwrap();
        assert!(matches!(facts.type_entry(ty).map(|t| &t.kind), Some(TypeKind::MetaClass(_))));
    }

    #[test]
    fn abbreviated_implementation_sees_heading_params() {
        let facts = resolve_one(
            "unit Short; interface
             function Twice(Value: Integer): Integer;
             implementation
             function Twice;
             begin
               Result := Value * 2;
             end;
             end.",
        );
        assert!(errors_of(&facts, "Short").is_empty(), "{:?}", errors_of(&facts, "Short"));
        assert!(types_on_line(&facts, "Short", 6).contains(&known::INTEGER));
    }

    #[test]
    fn locals_and_nested_routines() {
        let facts = resolve_one(
            "unit Nest; interface implementation
             procedure Outer;
             type TPair = record A, B: Integer; end;
             var P: TPair;
               function Sum: Integer;
               begin
                 Result := P.A + P.B;
               end;
             begin
               P.A := Sum;
             end;
             end.",
        );
        assert!(errors_of(&facts, "Nest").is_empty(), "{:?}", errors_of(&facts, "Nest"));
        let sum = decl_named(&facts, "Nest.Outer.Sum");
        assert!(declarations_on_line(&facts, "Nest", 10).contains(&sum));
    }

    #[test]
    fn undeclared_local_is_reported() {
        let facts = resolve_one(
            "unit Typo; interface implementation
             procedure Run;
             begin
               Totl := 1;
             end;
             end.",
        );
        let errors = errors_of(&facts, "Typo");
        assert!(matches!(errors.as_slice(), [SemanticError::UnknownIdentifier { name, .. }] if name == "Totl"));
    }
}
