//! Delphi parser crate.
//!
//! This crate provides the lexer and parser for the Delphi subset handled by
//! the semantic engine. It includes:
//! - Lexical analysis (tokenization) with compiler directive capture
//! - Abstract Syntax Tree (AST) definitions
//! - Parser for transforming tokens into an arena-allocated AST
//!
//! # Example
//!
//! ```
//! use bumpalo::Bump;
//! use delphi_parser::Parser;
//!
//! let arena = Bump::new();
//! let parsed = Parser::parse("unit A; interface implementation end.", &arena).unwrap();
//! assert_eq!(parsed.ast.name.to_dotted(), "A");
//! ```

// Lexer module
pub mod lexer;

// AST module
pub mod ast;

// Re-export commonly used types at crate root
pub use ast::{ParsedUnit, Parser};
pub use lexer::{Lexer, RawDirective, Token, TokenKind};
