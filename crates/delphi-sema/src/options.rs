//! Runtime configuration of a resolution batch.

use std::num::NonZeroUsize;
use std::thread;

use delphi_core::{DirectiveSnapshot, DirectiveValue, InvalidConfiguration, Name};

/// Options for [`resolve_program`](crate::resolve_program).
///
/// # Example
///
/// ```
/// use delphi_core::DirectiveValue;
/// use delphi_sema::ResolveOptions;
///
/// let options = ResolveOptions::new()
///     .with_directive("ZEROBASEDSTRINGS", DirectiveValue::Off)
///     .with_max_workers(2)
///     .unwrap();
/// assert_eq!(options.workers(), 2);
/// ```
#[derive(Debug, Clone)]
pub struct ResolveOptions {
    directives: DirectiveSnapshot,
    parallel: bool,
    max_workers: Option<NonZeroUsize>,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self {
            directives: DirectiveSnapshot::new(),
            parallel: true,
            max_workers: None,
        }
    }
}

impl ResolveOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Directive state in effect before the first token of every unit.
    pub fn with_directives(mut self, directives: DirectiveSnapshot) -> Self {
        self.directives = directives;
        self
    }

    /// Set one initial directive switch.
    pub fn with_directive(mut self, name: &str, value: DirectiveValue) -> Self {
        self.directives = self
            .directives
            .with(Name::new(crate::directives::canonical_name(name)), value);
        self
    }

    /// Resolve independent units on worker threads.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Cap the number of worker threads.
    pub fn with_max_workers(mut self, workers: usize) -> Result<Self, InvalidConfiguration> {
        let workers = NonZeroUsize::new(workers).ok_or_else(|| InvalidConfiguration::InvalidOption {
            option: "max_workers".to_string(),
            reason: "must be at least 1".to_string(),
        })?;
        self.max_workers = Some(workers);
        Ok(self)
    }

    pub fn directives(&self) -> &DirectiveSnapshot {
        &self.directives
    }

    pub fn is_parallel(&self) -> bool {
        self.parallel
    }

    /// Worker threads a wave may use.
    pub fn workers(&self) -> usize {
        if !self.parallel {
            return 1;
        }
        match self.max_workers {
            Some(n) => n.get(),
            None => thread::available_parallelism().map_or(1, NonZeroUsize::get),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequential_uses_one_worker() {
        let options = ResolveOptions::new().with_parallel(false);
        assert_eq!(options.workers(), 1);
        assert!(!options.is_parallel());
    }

    #[test]
    fn zero_workers_is_rejected() {
        let err = ResolveOptions::new().with_max_workers(0).unwrap_err();
        assert!(matches!(err, InvalidConfiguration::InvalidOption { .. }));
    }

    #[test]
    fn short_directive_names_are_canonical() {
        let options = ResolveOptions::new().with_directive("R", DirectiveValue::On);
        assert!(options.directives().is_on("RANGECHECKS"));
    }
}
