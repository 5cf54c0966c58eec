use std::fmt;
use std::hash::{Hash, Hasher};

/// A case-insensitive identifier.
///
/// Pascal identifiers compare without regard to ASCII case, but diagnostics and
/// facts must keep the spelling used at the declaration. `Name` stores the
/// original text and compares/hashes on its ASCII-lowercased form.
///
/// # Examples
///
/// ```
/// use delphi_core::Name;
///
/// let a = Name::new("TFoo");
/// let b = Name::new("tfoo");
/// assert_eq!(a, b);
/// assert_eq!(a.as_str(), "TFoo");
/// ```
#[derive(Clone, Default)]
pub struct Name {
    text: String,
    key: String,
}

impl Name {
    /// Create a name from its source spelling.
    pub fn new(text: impl Into<String>) -> Self {
        let text = text.into();
        let key = text.to_ascii_lowercase();
        Self { text, key }
    }

    /// The original spelling.
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// The lookup key (ASCII-lowercased).
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Compare against a raw string ignoring ASCII case.
    pub fn matches(&self, other: &str) -> bool {
        self.text.eq_ignore_ascii_case(other)
    }
}

impl PartialEq for Name {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for Name {}

impl Hash for Name {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}

impl PartialOrd for Name {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Name {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.key.cmp(&other.key)
    }
}

impl fmt::Debug for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.text)
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

impl From<&str> for Name {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for Name {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

/// Qualified name of a declaration: `Unit.Name.Space.TOuter.Member`.
///
/// Used as the identity that checks match against (for example a forbidden
/// member given as `System.SysUtils.TStringHelper.Contains`).
///
/// # Examples
///
/// ```
/// use delphi_core::QualifiedName;
///
/// let bar = QualifiedName::new("Bar", vec!["Foo".into(), "TFoo".into()]);
/// assert_eq!(bar.to_string(), "Foo.TFoo.Bar");
///
/// let parsed = QualifiedName::from_dotted("System.SysUtils.Format");
/// assert_eq!(parsed.simple_name(), "Format");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct QualifiedName {
    /// Simple name (e.g., "Bar", "Format").
    pub name: Name,
    /// Enclosing path: the unit name segments followed by enclosing types.
    pub namespace: Vec<Name>,
}

impl QualifiedName {
    /// Create a new qualified name with an enclosing path.
    pub fn new(name: impl Into<Name>, namespace: Vec<Name>) -> Self {
        Self {
            name: name.into(),
            namespace,
        }
    }

    /// Create a name with no enclosing path.
    pub fn global(name: impl Into<Name>) -> Self {
        Self {
            name: name.into(),
            namespace: Vec::new(),
        }
    }

    /// Split a dotted string; the last segment is the simple name.
    pub fn from_dotted(s: &str) -> Self {
        let mut parts: Vec<Name> = s
            .split('.')
            .filter(|p| !p.is_empty())
            .map(Name::new)
            .collect();
        match parts.pop() {
            Some(name) => Self {
                name,
                namespace: parts,
            },
            None => Self::global(""),
        }
    }

    /// Check if this has no enclosing path.
    pub fn is_global(&self) -> bool {
        self.namespace.is_empty()
    }

    /// Get the simple (unqualified) name.
    pub fn simple_name(&self) -> &str {
        self.name.as_str()
    }

    /// All segments including the simple name.
    pub fn segments(&self) -> impl Iterator<Item = &Name> {
        self.namespace.iter().chain(std::iter::once(&self.name))
    }

    /// Number of segments including the simple name.
    pub fn len(&self) -> usize {
        self.namespace.len() + 1
    }

    /// Always false; a qualified name has at least its simple name.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Create a child name within this one.
    ///
    /// Example: `Foo.TFoo` + `Bar` = `Foo.TFoo.Bar`
    pub fn child(&self, name: impl Into<Name>) -> Self {
        let mut namespace = self.namespace.clone();
        namespace.push(self.name.clone());
        Self {
            name: name.into(),
            namespace,
        }
    }

    /// Get the enclosing name (if any).
    pub fn parent(&self) -> Option<Self> {
        let (last, rest) = self.namespace.split_last()?;
        Some(Self {
            name: last.clone(),
            namespace: rest.to_vec(),
        })
    }

    /// Whether this name ends with the given dotted suffix (case-insensitive).
    pub fn ends_with(&self, suffix: &QualifiedName) -> bool {
        let own: Vec<&Name> = self.segments().collect();
        let other: Vec<&Name> = suffix.segments().collect();
        other.len() <= own.len() && own[own.len() - other.len()..] == other[..]
    }
}

impl fmt::Display for QualifiedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for segment in &self.namespace {
            write!(f, "{}.", segment)?;
        }
        write!(f, "{}", self.name)
    }
}

impl From<&str> for QualifiedName {
    fn from(s: &str) -> Self {
        Self::from_dotted(s)
    }
}

impl From<String> for QualifiedName {
    fn from(s: String) -> Self {
        Self::from_dotted(&s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn names_ignore_case() {
        let a = Name::new("Integer");
        let b = Name::new("INTEGER");
        assert_eq!(a, b);
        assert!(a.matches("integer"));
        assert_eq!(b.to_string(), "INTEGER");

        let mut set = HashSet::new();
        set.insert(a);
        assert!(set.contains(&b));
    }

    #[test]
    fn from_dotted() {
        let name = QualifiedName::from_dotted("System.SysUtils.Format");
        assert_eq!(name.simple_name(), "Format");
        assert_eq!(name.namespace.len(), 2);
        assert_eq!(name.to_string(), "System.SysUtils.Format");

        let global = QualifiedName::from_dotted("Integer");
        assert!(global.is_global());

        let empty = QualifiedName::from_dotted("");
        assert_eq!(empty.simple_name(), "");
    }

    #[test]
    fn child_and_parent() {
        let unit = QualifiedName::from_dotted("Foo");
        let ty = unit.child("TFoo");
        let member = ty.child("Bar");
        assert_eq!(member.to_string(), "Foo.TFoo.Bar");
        assert_eq!(member.parent().unwrap(), ty);
        assert!(unit.parent().is_none());
    }

    #[test]
    fn suffix_matching_is_case_insensitive() {
        let full = QualifiedName::from_dotted("System.SysUtils.TStringHelper.Contains");
        assert!(full.ends_with(&QualifiedName::from_dotted("tstringhelper.contains")));
        assert!(full.ends_with(&full.clone()));
        assert!(!full.ends_with(&QualifiedName::from_dotted("TStrings.Contains")));
    }
}
