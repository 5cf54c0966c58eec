//! Visibility sections for class and record members.

use std::fmt;

/// Visibility section of a member.
///
/// Ordered from most to least restrictive: `strict private < private <
/// protected < strict protected < public < published`. Reachability between
/// two code locations also depends on unit and hierarchy containment, which
/// the resolver evaluates; this type only carries the declared section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub enum Visibility {
    StrictPrivate,
    Private,
    Protected,
    StrictProtected,
    #[default]
    Public,
    Published,
}

impl Visibility {
    /// Whether this is one of the `strict` sections.
    pub fn is_strict(self) -> bool {
        matches!(self, Visibility::StrictPrivate | Visibility::StrictProtected)
    }

    /// Whether members in this section are reachable from any unit.
    pub fn is_public(self) -> bool {
        matches!(self, Visibility::Public | Visibility::Published)
    }

    /// Whether this is a private section (strict or not).
    pub fn is_private(self) -> bool {
        matches!(self, Visibility::StrictPrivate | Visibility::Private)
    }

    /// Whether this is a protected section (strict or not).
    pub fn is_protected(self) -> bool {
        matches!(self, Visibility::Protected | Visibility::StrictProtected)
    }

    /// The section keyword(s) as written in source.
    pub fn as_str(self) -> &'static str {
        match self {
            Visibility::StrictPrivate => "strict private",
            Visibility::Private => "private",
            Visibility::Protected => "protected",
            Visibility::StrictProtected => "strict protected",
            Visibility::Public => "public",
            Visibility::Published => "published",
        }
    }
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
