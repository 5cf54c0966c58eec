//! Basic node types shared by declarations, types and expressions.

use delphi_core::{NodeId, Span};

/// An identifier occurrence.
///
/// Every identifier carries its own [`NodeId`], so a declaration name and each
/// segment of a dotted path can be bound independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ident<'ast> {
    pub id: NodeId,
    /// The identifier text as written.
    pub name: &'ast str,
    pub span: Span,
}

impl<'ast> Ident<'ast> {
    pub fn new(id: NodeId, name: &'ast str, span: Span) -> Self {
        Self { id, name, span }
    }

    /// Case-insensitive comparison with a raw string.
    pub fn is(&self, other: &str) -> bool {
        self.name.eq_ignore_ascii_case(other)
    }
}

/// A dotted name: `System.SysUtils`, `TFoo.Bar`, `Integer`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DottedName<'ast> {
    pub parts: &'ast [Ident<'ast>],
    pub span: Span,
}

impl<'ast> DottedName<'ast> {
    /// The last segment.
    pub fn last(&self) -> Option<&Ident<'ast>> {
        self.parts.last()
    }

    /// Whether the name has a single segment.
    pub fn is_simple(&self) -> bool {
        self.parts.len() == 1
    }

    /// The dotted text, e.g. `System.SysUtils`.
    pub fn to_dotted(&self) -> String {
        let mut out = String::new();
        for (i, part) in self.parts.iter().enumerate() {
            if i > 0 {
                out.push('.');
            }
            out.push_str(part.name);
        }
        out
    }
}

/// A custom attribute: `[Weak]`, `[Test('x')]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Attribute<'ast> {
    pub name: DottedName<'ast>,
    pub args: &'ast [crate::ast::expr::Expr<'ast>],
    pub span: Span,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dotted_name_text() {
        let parts = [
            Ident::new(NodeId::new(0), "System", Span::new(1, 1, 6)),
            Ident::new(NodeId::new(1), "SysUtils", Span::new(1, 8, 8)),
        ];
        let name = DottedName {
            parts: &parts,
            span: Span::new(1, 1, 15),
        };
        assert_eq!(name.to_dotted(), "System.SysUtils");
        assert!(!name.is_simple());
        assert!(name.last().is_some_and(|p| p.is("sysutils")));
    }
}
