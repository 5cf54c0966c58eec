//! Performance benchmarks for the resolution pipeline.
//!
//! - Fixtures: the units under `test_units/`, resolved as one project
//! - Generated: chains and fans of units, sequential against parallel
//!
//! ## Profiling with Puffin
//!
//! Run with the `profile-with-puffin` feature to collect phase timings:
//!
//! ```bash
//! cargo bench --features profile-with-puffin -- --profile-time 5
//! ```

#![allow(clippy::collapsible_if)]

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use delphi_analysis::{Project, ResolveOptions};
use std::fmt::Write;
use std::hint::black_box;

#[cfg(feature = "profile-with-puffin")]
use std::collections::HashMap;

#[cfg(feature = "profile-with-puffin")]
static FRAME_VIEW: std::sync::OnceLock<puffin::GlobalFrameView> = std::sync::OnceLock::new();

#[cfg(feature = "profile-with-puffin")]
fn setup_profiler() {
    puffin::set_scopes_on(true);
    FRAME_VIEW.get_or_init(puffin::GlobalFrameView::default);
}

#[cfg(not(feature = "profile-with-puffin"))]
fn setup_profiler() {}

#[cfg(feature = "profile-with-puffin")]
fn end_profiling_frame() {
    puffin::GlobalProfiler::lock().new_frame();
}

#[cfg(not(feature = "profile-with-puffin"))]
fn end_profiling_frame() {}

#[cfg(feature = "profile-with-puffin")]
fn collect_scopes_recursive(
    stream: &puffin::Stream,
    scope: &puffin::Scope,
    scope_collection: &puffin::ScopeCollection,
    scope_timings: &mut HashMap<String, i64>,
) {
    use puffin::Reader;

    if let Some(details) = scope_collection.fetch_by_id(&scope.id) {
        let name = details.name().to_string();
        *scope_timings.entry(name).or_insert(0) += scope.record.duration_ns;
    }

    if scope.child_begin_position < scope.child_end_position {
        if let Ok(reader) = Reader::with_offset(stream, scope.child_begin_position) {
            if let Ok(children) = reader.read_top_scopes() {
                for child in children {
                    collect_scopes_recursive(stream, &child, scope_collection, scope_timings);
                }
            }
        }
    }
}

/// Print average time per scope across the recorded frames.
#[cfg(feature = "profile-with-puffin")]
fn print_profiling_stats() {
    use puffin::Reader;

    let Some(frame_view) = FRAME_VIEW.get() else {
        println!("Profiler not initialized");
        return;
    };

    let view = frame_view.lock();
    let scope_collection = view.scope_collection();

    let mut scope_timings: HashMap<String, i64> = HashMap::new();
    let mut frame_count = 0i64;

    for frame in view.recent_frames() {
        frame_count += 1;
        let Ok(unpacked) = frame.unpacked() else {
            continue;
        };
        for (_thread_info, stream_info) in unpacked.thread_streams.iter() {
            let reader = Reader::from_start(&stream_info.stream);
            if let Ok(scopes) = reader.read_top_scopes() {
                for scope in scopes {
                    collect_scopes_recursive(&stream_info.stream, &scope, scope_collection, &mut scope_timings);
                }
            }
        }
    }

    println!("\n=== Profiling Summary ({} frames) ===", frame_count);
    if scope_timings.is_empty() {
        println!("  No scopes recorded.");
    } else {
        let mut entries: Vec<_> = scope_timings.iter().collect();
        entries.sort_by(|a, b| b.1.cmp(a.1));
        let total_ns: i64 = entries.iter().map(|(_, ns)| **ns).sum();

        for (name, ns) in &entries {
            let avg_ns = **ns / frame_count.max(1);
            let pct = if total_ns > 0 { **ns as f64 / total_ns as f64 * 100.0 } else { 0.0 };
            println!(
                "  {:30} {:>10.2?} avg ({:>5.1}%)",
                name,
                std::time::Duration::from_nanos(avg_ns as u64),
                pct
            );
        }
    }
    println!("=====================================\n");
}

#[cfg(not(feature = "profile-with-puffin"))]
fn print_profiling_stats() {}

const FIXTURES: &[(&str, &str)] = &[
    ("Shapes.pas", include_str!("../test_units/Shapes.pas")),
    ("Canvas.pas", include_str!("../test_units/Canvas.pas")),
    ("Inventory.pas", include_str!("../test_units/Inventory.pas")),
    ("Store.pas", include_str!("../test_units/Store.pas")),
    ("Greetings.pas", include_str!("../test_units/Greetings.pas")),
    ("Calculator.pas", include_str!("../test_units/Calculator.pas")),
];

const MATH: &str = include_str!("../test_units/System.Math.pas");

/// A unit with `classes` classes, each overriding a method of the previous
/// one, and a routine calling through the whole hierarchy.
fn generated_unit(name: &str, uses: &[String], classes: usize) -> String {
    let mut src = String::new();
    let _ = writeln!(src, "unit {name};\n\ninterface\n");
    if !uses.is_empty() {
        let _ = writeln!(src, "uses\n  {};\n", uses.join(", "));
    }
    let _ = writeln!(src, "type");
    for i in 0..classes {
        let ancestor = if i == 0 { "TObject".to_string() } else { format!("T{name}{}", i - 1) };
        let directive = if i == 0 { "virtual" } else { "override" };
        let _ = writeln!(
            src,
            "  T{name}{i} = class({ancestor})\n  private\n    FValue: Integer;\n  public\n    function Value: Integer; {directive};\n  end;\n"
        );
    }
    let _ = writeln!(src, "function Total{name}: Integer;\n\nimplementation\n");
    for i in 0..classes {
        let _ = writeln!(
            src,
            "function T{name}{i}.Value: Integer;\nbegin\n  Result := FValue + {i};\nend;\n"
        );
    }
    let _ = writeln!(src, "function Total{name}: Integer;\nvar\n  Item: T{name}0;\nbegin\n  Result := 0;");
    for i in 0..classes {
        let _ = writeln!(src, "  Item := T{name}{i}.Create;\n  Result := Result + Item.Value;");
    }
    let _ = writeln!(src, "end;\n\nend.");
    src
}

/// `units` units, each using the one before it.
fn chain(units: usize, classes: usize) -> Vec<(String, String)> {
    (0..units)
        .map(|i| {
            let name = format!("Chain{i}");
            let uses = if i == 0 { Vec::new() } else { vec![format!("Chain{}", i - 1)] };
            (format!("{name}.pas"), generated_unit(&name, &uses, classes))
        })
        .collect()
}

/// One base unit and `units` independent units that all use it.
fn fan(units: usize, classes: usize) -> Vec<(String, String)> {
    let mut sources = vec![("Base.pas".to_string(), generated_unit("Base", &[], classes))];
    sources.extend((0..units).map(|i| {
        let name = format!("Leaf{i}");
        (format!("{name}.pas"), generated_unit(&name, &["Base".to_string()], classes))
    }));
    sources
}

fn project(sources: &[(String, String)], options: ResolveOptions) -> Project {
    let mut project = Project::new().with_options(options);
    for (file, text) in sources {
        project.add_source(file.as_str(), text.as_str()).unwrap();
    }
    project
}

fn fixture_benchmarks(c: &mut Criterion) {
    setup_profiler();

    let mut project = Project::new();
    project.add_standard_library_unit("System.Math.pas", MATH).unwrap();
    let mut bytes = MATH.len();
    for (file, text) in FIXTURES {
        project.add_source(*file, *text).unwrap();
        bytes += text.len();
    }

    let mut group = c.benchmark_group("resolution/fixtures");
    group.throughput(Throughput::Bytes(bytes as u64));
    group.bench_function("test_units", |b| {
        b.iter(|| {
            let program = black_box(&project).resolve().unwrap();
            end_profiling_frame();
            black_box(program.diagnostics().len())
        });
    });
    group.finish();

    print_profiling_stats();
}

fn generated_benchmarks(c: &mut Criterion) {
    let mut group = c.benchmark_group("resolution/generated");

    for (label, sources) in [("chain_16x20", chain(16, 20)), ("fan_32x20", fan(32, 20))] {
        let bytes: usize = sources.iter().map(|(_, text)| text.len()).sum();
        group.throughput(Throughput::Bytes(bytes as u64));

        let sequential = project(&sources, ResolveOptions::new().with_parallel(false));
        group.bench_with_input(BenchmarkId::new("sequential", label), &sequential, |b, project| {
            b.iter(|| black_box(project.resolve().unwrap().is_clean()));
        });

        let parallel = project(&sources, ResolveOptions::new());
        group.bench_with_input(BenchmarkId::new("parallel", label), &parallel, |b, project| {
            b.iter(|| black_box(project.resolve().unwrap().is_clean()));
        });
    }

    group.finish();
}

criterion_group!(benches, fixture_benchmarks, generated_benchmarks);
criterion_main!(benches);
