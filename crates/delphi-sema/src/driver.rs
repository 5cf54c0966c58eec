//! Multi-unit driver.
//!
//! Resolves a batch of parsed units against a [`UnitRegistry`] in two stages:
//!
//! ```text
//! reserve every unit, build the import graph
//!   for each interface wave (parallel inside a wave):
//!     imports, directive sweep
//!     RegistrationPass + TypeCompletionPass over the interface section
//!     publish at UnitStage::Interface
//!   for every unit (parallel):
//!     resume from the published interface
//!     RegistrationPass + TypeCompletionPass over the implementation section
//!     CompilationPass over bodies, initialization and finalization
//!     publish at UnitStage::Complete
//! ```
//!
//! A unit only reads the published interfaces of the units it imports, so
//! implementation-section cycles need no special treatment. Interface cycles
//! are structural errors for every unit of the cycle.

use std::thread;

use rustc_hash::{FxHashMap, FxHashSet};
use tracing::{debug, trace, warn};

use delphi_core::{AnalysisError, Section, SemanticError, UnitId};
use delphi_parser::ParsedUnit;
use delphi_parser::ast::UnitSection;
use delphi_registry::{Import, ImportGraph, Unit, UnitBuilder, UnitOrigin, UnitRegistry, UnitStage};

use crate::context::ResolveContext;
use crate::directives;
use crate::facts::ProgramFacts;
use crate::options::ResolveOptions;
use crate::passes::{CompilationPass, RegistrationPass, TypeCompletionPass};
use crate::view::Program;

/// A parsed unit and where it came from.
#[derive(Debug, Clone, Copy)]
pub struct SourceUnit<'a, 'ast> {
    pub parsed: &'a ParsedUnit<'ast>,
    pub origin: UnitOrigin,
}

impl<'a, 'ast> SourceUnit<'a, 'ast> {
    pub fn new(parsed: &'a ParsedUnit<'ast>, origin: UnitOrigin) -> Self {
        Self { parsed, origin }
    }

    /// Full dotted unit name.
    pub fn name(&self) -> String {
        self.parsed.ast.name.to_dotted()
    }
}

/// Resolve `units` and freeze the result.
///
/// Semantic problems are reported per unit and never abort the batch. The
/// only errors returned are registry errors, such as two units sharing a
/// name.
#[cfg_attr(feature = "profiling", profiling::function)]
pub fn resolve_program(
    registry: &UnitRegistry,
    units: &[SourceUnit<'_, '_>],
    options: &ResolveOptions,
) -> Result<ProgramFacts, AnalysisError> {
    let mut ids = Vec::with_capacity(units.len());
    for unit in units {
        ids.push(registry.reserve(unit.name(), unit.origin)?);
    }
    let sources: FxHashMap<UnitId, SourceUnit<'_, '_>> = ids.iter().copied().zip(units.iter().copied()).collect();

    let graph = build_import_graph(registry, &ids, units);
    let cyclic: FxHashSet<UnitId> = graph.interface_cycles().into_iter().flatten().collect();
    let workers = options.workers();

    for (index, wave) in graph.interface_waves().into_iter().enumerate() {
        let work: Vec<(UnitId, SourceUnit<'_, '_>)> = wave
            .into_iter()
            .filter_map(|id| sources.get(&id).map(|source| (id, *source)))
            .collect();
        if work.is_empty() {
            continue;
        }
        debug!(wave = index, units = work.len(), workers, "resolving interface wave");
        let program = Program::snapshot(registry);
        let resolved = run_parallel(&work, workers, |&(id, source)| {
            resolve_interface(&program, registry, id, source, &cyclic, options)
        });
        for unit in resolved {
            registry.publish(unit)?;
        }
    }

    let program = Program::snapshot(registry);
    let work: Vec<(UnitId, SourceUnit<'_, '_>)> = ids.iter().map(|&id| (id, sources[&id])).collect();
    debug!(units = work.len(), workers, "resolving implementations");
    let resolved = run_parallel(&work, workers, |&(id, source)| {
        program
            .get(id)
            .map(|interface| resolve_implementation(&program, interface, source))
    });
    for unit in resolved.into_iter().flatten() {
        if unit.failed {
            warn!(unit = %unit.name, errors = unit.errors.len(), "unit resolution failed");
        }
        registry.publish(unit)?;
    }

    Ok(ProgramFacts::new(Program::snapshot(registry), graph))
}

fn build_import_graph(registry: &UnitRegistry, ids: &[UnitId], units: &[SourceUnit<'_, '_>]) -> ImportGraph {
    let mut graph = ImportGraph::new();
    for (&id, unit) in ids.iter().zip(units) {
        graph.add_unit(id);
        for (section, items) in sections(unit) {
            for item in items.uses {
                if let Some(target) = registry.lookup(&item.name.to_dotted()) {
                    graph.add_import(id, target, section);
                }
            }
        }
    }
    debug!(units = graph.unit_count(), imports = graph.import_count(), "import graph built");
    graph
}

fn sections<'ast>(unit: &SourceUnit<'_, 'ast>) -> [(Section, UnitSection<'ast>); 2] {
    [
        (Section::Interface, unit.parsed.ast.interface),
        (Section::Implementation, unit.parsed.ast.implementation),
    ]
}

/// First stage: the interface section of one unit.
#[cfg_attr(feature = "profiling", profiling::function)]
fn resolve_interface(
    program: &Program,
    registry: &UnitRegistry,
    id: UnitId,
    source: SourceUnit<'_, '_>,
    cyclic: &FxHashSet<UnitId>,
    options: &ResolveOptions,
) -> Unit {
    let parsed = source.parsed;
    let mut builder = UnitBuilder::new(id, source.name(), source.origin);
    builder.set_anchors(parsed.anchors.clone());
    builder.set_directives(directives::sweep(&parsed.directives, options.directives()));

    for (section, items) in sections(&source) {
        for item in items.uses {
            let name = item.name.to_dotted();
            let unit = registry.lookup(&name);
            match unit {
                None => builder.report(SemanticError::UnknownUnit {
                    name: name.clone(),
                    span: item.span,
                }),
                Some(target) if section == Section::Interface && cyclic.contains(&id) && cyclic.contains(&target) => {
                    builder.report(SemanticError::CircularUnitReference {
                        name: name.clone(),
                        span: item.span,
                    });
                }
                Some(_) => {}
            }
            builder.add_import(Import {
                name: name.into(),
                unit,
                section,
                node: item.id,
                span: item.span,
                path: item.path.map(str::to_string),
            });
        }
    }

    let mut ctx = ResolveContext::new(program, builder);
    ctx.set_section(Section::Interface);
    let registered = RegistrationPass::new(&mut ctx).run(parsed.ast.interface.decls, Unit::INTERFACE_SCOPE);
    let completed = TypeCompletionPass::new(&mut ctx).run(&registered.types, &registered.properties);
    trace!(
        unit = %ctx.builder().name(),
        types = registered.types_registered,
        routines = registered.routines_registered,
        classes = completed.classes_completed,
        "interface resolved"
    );
    ctx.into_builder().finish(UnitStage::Interface)
}

/// Second stage: the implementation section and every body of one unit.
#[cfg_attr(feature = "profiling", profiling::function)]
fn resolve_implementation(program: &Program, interface: &Unit, source: SourceUnit<'_, '_>) -> Unit {
    let ast = source.parsed.ast;
    let mut ctx = ResolveContext::resume(program, UnitBuilder::resume(interface));
    ctx.set_section(Section::Implementation);

    let registered = RegistrationPass::new(&mut ctx).run(ast.implementation.decls, Unit::IMPLEMENTATION_SCOPE);
    if !registered.types.is_empty() || !registered.properties.is_empty() {
        TypeCompletionPass::new(&mut ctx).run(&registered.types, &registered.properties);
    }
    let compiled = CompilationPass::new(&mut ctx).run(
        registered.bodies,
        ast.initialization.as_ref(),
        ast.finalization.as_ref(),
    );
    trace!(
        unit = %ctx.builder().name(),
        bodies = compiled.bodies_checked,
        "implementation resolved"
    );
    ctx.into_builder().finish(UnitStage::Complete)
}

/// Map `f` over `items` on up to `workers` scoped threads, keeping order.
fn run_parallel<T, R, F>(items: &[T], workers: usize, f: F) -> Vec<R>
where
    T: Sync,
    R: Send,
    F: Fn(&T) -> R + Sync,
{
    if workers <= 1 || items.len() <= 1 {
        return items.iter().map(&f).collect();
    }
    let chunk = items.len().div_ceil(workers);
    thread::scope(|scope| {
        let handles: Vec<_> = items
            .chunks(chunk)
            .map(|part| {
                let f = &f;
                scope.spawn(move || part.iter().map(f).collect::<Vec<R>>())
            })
            .collect();
        handles
            .into_iter()
            .flat_map(|handle| handle.join().unwrap_or_else(|panic| std::panic::resume_unwind(panic)))
            .collect()
    })
}

#[cfg(test)]
mod tests {
    use bumpalo::Bump;
    use delphi_core::{AnalysisError, SemanticError};
    use delphi_parser::Parser;
    use delphi_registry::{UnitOrigin, UnitRegistry};

    use super::*;
    use crate::test_support::{decl_named, errors_of, resolve};

    #[test]
    fn importers_see_published_interfaces() {
        let facts = resolve(&[
            "unit App; interface uses Shapes;
             var Current: TShape;
             implementation
             end.",
            "unit Shapes; interface type TShape = class end; implementation end.",
        ]);
        assert!(errors_of(&facts, "App").is_empty(), "{:?}", errors_of(&facts, "App"));
        assert!(facts.is_used(decl_named(&facts, "Shapes.TShape")));
    }

    #[test]
    fn unknown_units_are_reported_and_tolerated() {
        let facts = resolve(&[
            "unit Lonely; interface uses Missing.Stuff;
             var X: TFromMissing;
             implementation
             end.",
        ]);
        let errors = errors_of(&facts, "Lonely");
        assert!(matches!(errors.as_slice(), [SemanticError::UnknownUnit { name, .. }] if name == "Missing.Stuff"));
        assert!(!facts.unit("Lonely").unwrap().failed);
    }

    #[test]
    fn interface_cycles_fail_their_units() {
        let facts = resolve(&[
            "unit Left; interface uses Right; implementation end.",
            "unit Right; interface uses Left; implementation end.",
            "unit Bystander; interface implementation end.",
        ]);
        assert!(facts.unit("Left").unwrap().failed);
        assert!(facts.unit("Right").unwrap().failed);
        assert!(!facts.unit("Bystander").unwrap().failed);
        assert!(
            errors_of(&facts, "Left")
                .iter()
                .any(|e| matches!(e, SemanticError::CircularUnitReference { name, .. } if name == "Right"))
        );
    }

    #[test]
    fn duplicate_unit_names_are_rejected() {
        let arena = Bump::new();
        let first = Parser::parse("unit Twin; interface implementation end.", &arena).unwrap();
        let second = Parser::parse("unit TWIN; interface implementation end.", &arena).unwrap();
        let units = [
            SourceUnit::new(&first, UnitOrigin::Source),
            SourceUnit::new(&second, UnitOrigin::Source),
        ];
        let result = resolve_program(&UnitRegistry::new(), &units, &ResolveOptions::new());
        assert!(matches!(result, Err(AnalysisError::DuplicateUnit(_))));
    }

    #[test]
    fn sequential_and_parallel_agree() {
        let sources = [
            "unit Base; interface type TBase = class procedure Run; virtual; end;
             implementation procedure TBase.Run; begin end; end.",
            "unit Left; interface uses Base; type TLeft = class(TBase) procedure Run; override; end;
             implementation procedure TLeft.Run; begin inherited; end; end.",
            "unit Right; interface uses Base; type TRight = class(TBase) end;
             implementation end.",
        ];
        let arena = Bump::new();
        let parsed: Vec<_> = sources.iter().map(|s| Parser::parse(s, &arena).unwrap()).collect();
        let units: Vec<_> = parsed.iter().map(|p| SourceUnit::new(p, UnitOrigin::Source)).collect();

        let sequential = resolve_program(
            &UnitRegistry::new(),
            &units,
            &ResolveOptions::new().with_parallel(false),
        )
        .unwrap();
        let parallel = resolve_program(
            &UnitRegistry::new(),
            &units,
            &ResolveOptions::new().with_max_workers(4).unwrap(),
        )
        .unwrap();
        for unit in sequential.units() {
            assert_eq!(sequential.fingerprint(unit.id), parallel.fingerprint(unit.id), "{}", unit.name);
        }
    }
}
