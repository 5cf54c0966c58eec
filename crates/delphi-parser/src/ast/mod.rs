//! Abstract syntax tree for Delphi units.
//!
//! This module provides:
//! - AST node definitions for units, declarations, statements and expressions
//! - The recursive-descent [`Parser`] that builds them in a bump arena
//! - [`ParsedUnit`], the parser's output with node anchors and raw directives
//!
//! # Example
//!
//! ```
//! use bumpalo::Bump;
//! use delphi_parser::Parser;
//!
//! let arena = Bump::new();
//! let source = "unit Shapes; interface type TShape = class end; implementation end.";
//!
//! match Parser::parse(source, &arena) {
//!     Ok(unit) => println!("parsed {}", unit.ast.name.to_dotted()),
//!     Err(errors) => eprintln!("parse errors: {errors}"),
//! }
//! ```

// Core types
pub mod node;
pub mod ops;

mod parser;
mod type_parser;
pub mod types;

pub mod expr;
mod expr_parser;

pub mod stmt;
mod stmt_parser;

pub mod decl;
mod decl_parser;

// Re-export error types from core
pub use delphi_core::{ParseError, ParseErrorKind, ParseErrors};

pub use decl::*;
pub use expr::*;
pub use node::*;
pub use ops::*;
pub use parser::Parser;
pub use stmt::*;
pub use types::*;

use crate::lexer::RawDirective;
use delphi_core::{NodeId, Span};

/// A parsed unit.
///
/// The tree borrows from the arena passed to [`Parser::parse`]; the anchor
/// table and directives are owned so they can outlive it.
#[derive(Debug)]
pub struct ParsedUnit<'ast> {
    /// Root of the syntax tree.
    pub ast: &'ast UnitAst<'ast>,
    /// Compiler directives in source order.
    pub directives: Vec<RawDirective>,
    /// Anchor span of every node, indexed by [`NodeId`].
    pub anchors: Vec<Span>,
}

impl<'ast> ParsedUnit<'ast> {
    /// The anchor span of `node`.
    pub fn anchor(&self, node: NodeId) -> Option<Span> {
        self.anchors.get(node.as_usize()).copied()
    }

    /// Number of node ids handed out while parsing.
    pub fn node_count(&self) -> usize {
        self.anchors.len()
    }
}
