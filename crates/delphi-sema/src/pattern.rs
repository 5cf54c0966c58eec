//! Declaration patterns supplied by checks.
//!
//! A check names declarations by fully qualified name, for example a forbidden
//! member `System.SysUtils.TStringHelper.Contains`. Patterns are regular
//! expressions matched case-insensitively against the whole dotted name.

use regex::{Regex, RegexBuilder};

use delphi_core::{InvalidConfiguration, QualifiedName};

#[derive(Debug, Clone)]
pub struct DeclarationPattern {
    source: String,
    regex: Regex,
}

impl DeclarationPattern {
    /// Compile a pattern. A malformed expression is an [`InvalidConfiguration`].
    pub fn new(pattern: &str) -> Result<Self, InvalidConfiguration> {
        let regex = RegexBuilder::new(&format!("^(?:{pattern})$"))
            .case_insensitive(true)
            .build()
            .map_err(|err| InvalidConfiguration::InvalidPattern {
                pattern: pattern.to_string(),
                reason: err.to_string(),
            })?;
        Ok(Self {
            source: pattern.to_string(),
            regex,
        })
    }

    /// A pattern matching exactly one dotted name.
    pub fn exact(name: &str) -> Result<Self, InvalidConfiguration> {
        let mut pattern = Self::new(&regex::escape(name))?;
        pattern.source = name.to_string();
        Ok(pattern)
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn matches(&self, name: &QualifiedName) -> bool {
        self.regex.is_match(&name.to_string())
    }

    pub fn matches_str(&self, name: &str) -> bool {
        self.regex.is_match(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whole_name_case_insensitive() {
        let pattern = DeclarationPattern::new(r"System\.SysUtils\.TStringHelper\.Contains").unwrap();
        assert!(pattern.matches(&QualifiedName::from_dotted("system.sysutils.tstringhelper.contains")));
        assert!(!pattern.matches(&QualifiedName::from_dotted("System.SysUtils.TStringHelper.ContainsText")));
    }

    #[test]
    fn wildcards() {
        let pattern = DeclarationPattern::new(r"Foo\..*\.Bar").unwrap();
        assert!(pattern.matches_str("Foo.TFoo.Bar"));
        assert!(!pattern.matches_str("Baz.TFoo.Bar"));
    }

    #[test]
    fn malformed_pattern_is_configuration_error() {
        let err = DeclarationPattern::new("Foo(").unwrap_err();
        match err {
            InvalidConfiguration::InvalidPattern { pattern, .. } => assert_eq!(pattern, "Foo("),
            other => panic!("expected InvalidPattern, got {other:?}"),
        }
    }

    #[test]
    fn exact_names_escape_dots() {
        let pattern = DeclarationPattern::exact("A.B").unwrap();
        assert_eq!(pattern.as_str(), "A.B");
        assert!(pattern.matches_str("a.b"));
        assert!(!pattern.matches_str("AxB"));
    }
}
