//! Lexical analysis for Delphi source.

mod cursor;
#[allow(clippy::module_inception)]
mod lexer;
mod token;

pub use lexer::{LexOutput, Lexer, RawDirective};
pub use token::{Token, TokenKind, lookup_keyword};
