//! Project-level API.
//!
//! A [`Project`] collects the source text of every unit together with its
//! origin, then parses and resolves them all in one batch.
//!
//! # Example
//!
//! ```
//! use delphi_analysis::Project;
//!
//! let mut project = Project::new();
//! project.add_source("Shapes.pas", "unit Shapes; interface
//!     type TShape = class procedure Draw; virtual; end;
//!     implementation
//!     procedure TShape.Draw; begin end;
//!     end.").unwrap();
//! project.add_source("App.pas", "unit App; interface uses Shapes;
//!     var Current: TShape;
//!     implementation
//!     end.").unwrap();
//!
//! let program = project.resolve().unwrap();
//! let app = program.unit("App").unwrap();
//! assert!(program.errors(app.id).is_empty());
//! ```

use std::ops::Deref;

use bumpalo::Bump;
use rustc_hash::FxHashMap;
use thiserror::Error;
use tracing::debug;

use delphi_core::{AnalysisError, ParseErrors, SemanticError, UnitId};
use delphi_parser::{ParsedUnit, Parser};
use delphi_registry::{UnitOrigin, UnitRegistry};
use delphi_sema::{ProgramFacts, ResolveOptions, SourceUnit, resolve_program};

/// One source file of a project.
#[derive(Debug, Clone)]
struct ProjectSource {
    filename: String,
    text: String,
    origin: UnitOrigin,
}

/// A set of Delphi units to resolve together.
///
/// Units are added as project sources, search-path units or
/// standard-library units. All are resolved alike; the origin only decides
/// which diagnostics are reported for the unit.
#[derive(Debug, Clone, Default)]
pub struct Project {
    sources: Vec<ProjectSource>,
    options: ResolveOptions,
}

impl Project {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `options` when resolving.
    pub fn with_options(mut self, options: ResolveOptions) -> Self {
        self.options = options;
        self
    }

    /// Add a project source file.
    pub fn add_source(&mut self, filename: impl Into<String>, text: impl Into<String>) -> Result<(), ProjectError> {
        self.add_unit(filename, text, UnitOrigin::Source)
    }

    /// Add a unit found on the search path; it is resolved best-effort.
    pub fn add_search_path_unit(
        &mut self,
        filename: impl Into<String>,
        text: impl Into<String>,
    ) -> Result<(), ProjectError> {
        self.add_unit(filename, text, UnitOrigin::SearchPath)
    }

    /// Add a declarations-only standard library unit, such as `System.SysUtils`.
    ///
    /// Imports of it are never reported as unused.
    pub fn add_standard_library_unit(
        &mut self,
        filename: impl Into<String>,
        text: impl Into<String>,
    ) -> Result<(), ProjectError> {
        self.add_unit(filename, text, UnitOrigin::StandardLibrary)
    }

    /// Add a unit with an explicit origin.
    ///
    /// # Errors
    ///
    /// Returns an error if a file of the same name was already added, or if
    /// `origin` is the unresolved-import sentinel.
    pub fn add_unit(
        &mut self,
        filename: impl Into<String>,
        text: impl Into<String>,
        origin: UnitOrigin,
    ) -> Result<(), ProjectError> {
        let filename = filename.into();
        if origin == UnitOrigin::Unresolved {
            return Err(ProjectError::InvalidOrigin(filename));
        }
        if self.sources.iter().any(|s| s.filename == filename) {
            return Err(ProjectError::DuplicateFile(filename));
        }
        self.sources.push(ProjectSource {
            filename,
            text: text.into(),
            origin,
        });
        Ok(())
    }

    pub fn source_count(&self) -> usize {
        self.sources.len()
    }

    /// Render parse failures from [`ProjectError::ParseErrors`] with the
    /// offending source line under each error.
    pub fn render_parse_errors(&self, failures: &[(String, ParseErrors)]) -> String {
        let mut out = String::new();
        for (filename, errors) in failures {
            let text = self
                .sources
                .iter()
                .find(|s| &s.filename == filename)
                .map_or("", |s| s.text.as_str());
            for error in errors.iter() {
                out.push_str(filename);
                out.push_str(": ");
                out.push_str(&error.display_with_source(text));
                out.push('\n');
            }
        }
        out
    }

    /// Parse and resolve every unit.
    ///
    /// # Errors
    ///
    /// Fails if there are no sources, if any file does not parse, or if two
    /// files declare the same unit. Semantic errors do not fail the call;
    /// they are reported per unit on the returned program.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn resolve(&self) -> Result<ResolvedProgram, ProjectError> {
        if self.sources.is_empty() {
            return Err(ProjectError::NoSources);
        }

        let arena = Bump::new();
        let parsed = {
            #[cfg(feature = "profiling")]
            profiling::scope!("parsing");

            let mut parsed: Vec<ParsedUnit<'_>> = Vec::with_capacity(self.sources.len());
            let mut failures = Vec::new();
            for source in &self.sources {
                match Parser::parse(&source.text, &arena) {
                    Ok(unit) => parsed.push(unit),
                    Err(errors) => failures.push((source.filename.clone(), errors)),
                }
            }
            if !failures.is_empty() {
                return Err(ProjectError::ParseErrors(failures));
            }
            parsed
        };

        let units: Vec<SourceUnit<'_, '_>> = parsed
            .iter()
            .zip(&self.sources)
            .map(|(unit, source)| SourceUnit::new(unit, source.origin))
            .collect();

        let facts = {
            #[cfg(feature = "profiling")]
            profiling::scope!("resolution");

            resolve_program(&UnitRegistry::new(), &units, &self.options)?
        };

        let mut files = FxHashMap::default();
        for (unit, source) in units.iter().zip(&self.sources) {
            if let Some(resolved) = facts.unit(&unit.name()) {
                files.insert(resolved.id, source.filename.clone());
            }
        }
        debug!(units = files.len(), "project resolved");
        Ok(ResolvedProgram { facts, files })
    }
}

/// The result of resolving a [`Project`].
///
/// Dereferences to [`ProgramFacts`] for every query.
#[derive(Debug, Clone)]
pub struct ResolvedProgram {
    facts: ProgramFacts,
    files: FxHashMap<UnitId, String>,
}

impl ResolvedProgram {
    pub fn facts(&self) -> &ProgramFacts {
        &self.facts
    }

    /// File a unit was read from; `None` for `System`.
    pub fn filename(&self, unit: UnitId) -> Option<&str> {
        self.files.get(&unit).map(String::as_str)
    }

    /// Every diagnostic of every unit, with the file it belongs to.
    pub fn diagnostics(&self) -> Vec<(&str, &SemanticError)> {
        self.facts
            .units()
            .filter_map(|unit| self.filename(unit.id).map(|file| (file, unit)))
            .flat_map(|(file, unit)| unit.errors.iter().map(move |error| (file, error)))
            .collect()
    }

    /// Whether no unit reported a diagnostic.
    pub fn is_clean(&self) -> bool {
        self.facts.units().all(|unit| unit.errors.is_empty())
    }
}

impl Deref for ResolvedProgram {
    type Target = ProgramFacts;

    fn deref(&self) -> &ProgramFacts {
        &self.facts
    }
}

/// Errors that can occur while building a project.
#[derive(Debug, Error)]
pub enum ProjectError {
    /// No sources have been added.
    #[error("no sources added to project")]
    NoSources,

    /// A file was added twice.
    #[error("file '{0}' was already added")]
    DuplicateFile(String),

    /// Units can only be added as source, search-path or standard library units.
    #[error("file '{0}' cannot be added as an unresolved unit")]
    InvalidOrigin(String),

    /// Parse errors occurred.
    #[error("parse errors in {} file(s)", .0.len())]
    ParseErrors(Vec<(String, ParseErrors)>),

    /// Resolution could not run.
    #[error(transparent)]
    Analysis(#[from] AnalysisError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_project_is_rejected() {
        assert!(matches!(Project::new().resolve(), Err(ProjectError::NoSources)));
    }

    #[test]
    fn duplicate_files_are_rejected() {
        let mut project = Project::new();
        project.add_source("A.pas", "unit A; interface implementation end.").unwrap();
        assert!(matches!(
            project.add_source("A.pas", "unit B; interface implementation end."),
            Err(ProjectError::DuplicateFile(_))
        ));
        assert!(matches!(
            project.add_unit("C.pas", "unit C; interface implementation end.", UnitOrigin::Unresolved),
            Err(ProjectError::InvalidOrigin(_))
        ));
        assert_eq!(project.source_count(), 1);
    }

    #[test]
    fn parse_errors_name_the_file() {
        let mut project = Project::new();
        project.add_source("Broken.pas", "unit Broken; interface type = ;").unwrap();
        match project.resolve() {
            Err(ProjectError::ParseErrors(failures)) => {
                assert_eq!(failures[0].0, "Broken.pas");
                let rendered = project.render_parse_errors(&failures);
                assert!(rendered.starts_with("Broken.pas: "));
                assert!(rendered.contains("unit Broken; interface type = ;"));
                assert!(rendered.contains('^'));
            }
            other => panic!("expected parse errors, got {other:?}"),
        }
    }

    #[test]
    fn duplicate_units_are_an_analysis_error() {
        let mut project = Project::new();
        project.add_source("One.pas", "unit Same; interface implementation end.").unwrap();
        project.add_source("Two.pas", "unit Same; interface implementation end.").unwrap();
        assert!(matches!(
            project.resolve(),
            Err(ProjectError::Analysis(AnalysisError::DuplicateUnit(_)))
        ));
    }

    #[test]
    fn diagnostics_carry_filenames() {
        let mut project = Project::new();
        project
            .add_source("Typo.pas", "unit Typo; interface var X: TMissing; implementation end.")
            .unwrap();
        let program = project.resolve().unwrap();
        assert!(!program.is_clean());
        let diagnostics = program.diagnostics();
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].0, "Typo.pas");
        assert!(matches!(diagnostics[0].1, SemanticError::UnknownIdentifier { .. }));
    }
}
