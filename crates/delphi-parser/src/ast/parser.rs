//! Parser state and token-level helpers.
//!
//! The [`Parser`] lexes the whole source up front and then walks the token
//! buffer. Grammar rules live in `type_parser`, `expr_parser`, `stmt_parser`
//! and `decl_parser`, each extending `Parser` with an `impl` block.

use bumpalo::Bump;

use crate::ast::ParsedUnit;
use crate::ast::node::{DottedName, Ident};
use crate::lexer::{Lexer, RawDirective, Token, TokenKind};
use bumpalo::collections::Vec as BVec;
use delphi_core::{NodeId, ParseError, ParseErrorKind, ParseErrors, Span};

/// Recursive-descent parser for Delphi units.
pub struct Parser<'ast> {
    /// Arena that owns every node and lexeme.
    pub(super) arena: &'ast Bump,
    /// All tokens of the source, terminated by `Eof`.
    pub(super) buffer: Vec<Token<'ast>>,
    /// Index of the current token.
    pub(super) position: usize,
    /// Errors collected while recovering.
    pub(super) errors: ParseErrors,
    /// Anchor span of every allocated node, indexed by [`NodeId`].
    pub(super) anchors: Vec<Span>,
    /// Compiler directives found by the lexer.
    directives: Vec<RawDirective>,
}

impl<'ast> Parser<'ast> {
    /// Lex `source` and prepare to parse it.
    pub fn new(source: &str, arena: &'ast Bump) -> Self {
        let output = Lexer::new(source, arena).tokenize();
        let mut errors = ParseErrors::new();
        for error in output.errors {
            errors.push(error.into());
        }
        let buffer = output
            .tokens
            .into_iter()
            .filter(|t| t.kind != TokenKind::Error)
            .collect();
        Self {
            arena,
            buffer,
            position: 0,
            errors,
            anchors: Vec::new(),
            directives: output.directives,
        }
    }

    /// Parse a complete unit.
    ///
    /// Returns every error found; the parser recovers at declaration and
    /// statement boundaries so one mistake does not hide the next.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn parse(source: &str, arena: &'ast Bump) -> Result<ParsedUnit<'ast>, ParseErrors> {
        let mut parser = Parser::new(source, arena);
        match parser.parse_unit() {
            Ok(unit) if parser.errors.is_empty() => Ok(ParsedUnit {
                ast: unit,
                directives: parser.directives,
                anchors: parser.anchors,
            }),
            Ok(_) => Err(parser.errors),
            Err(error) => {
                parser.errors.push(error);
                Err(parser.errors)
            }
        }
    }

    /// Errors collected so far.
    pub fn errors(&self) -> &ParseErrors {
        &self.errors
    }

    /// Anchor spans of the nodes allocated so far.
    pub fn anchors(&self) -> &[Span] {
        &self.anchors
    }

    // =========================================
    // Node allocation
    // =========================================

    /// Allocate a fresh node id anchored at `anchor`.
    pub(super) fn node(&mut self, anchor: Span) -> NodeId {
        let id = NodeId::new(self.anchors.len() as u32);
        self.anchors.push(anchor);
        id
    }

    /// Build an [`Ident`] from an identifier token.
    pub(super) fn ident_from(&mut self, token: Token<'ast>) -> Ident<'ast> {
        let id = self.node(token.span);
        Ident::new(id, token.lexeme, token.span)
    }

    // =========================================
    // Token access
    // =========================================

    /// The current token.
    pub(super) fn peek(&self) -> &Token<'ast> {
        self.peek_nth(0)
    }

    /// The token `n` positions ahead; `Eof` past the end.
    pub(super) fn peek_nth(&self, n: usize) -> &Token<'ast> {
        let last = self.buffer.len() - 1;
        &self.buffer[(self.position + n).min(last)]
    }

    /// Consume the current token. `Eof` is never consumed.
    pub(super) fn advance(&mut self) -> Token<'ast> {
        let token = *self.peek();
        if token.kind != TokenKind::Eof {
            self.position += 1;
        }
        token
    }

    pub(super) fn is_eof(&self) -> bool {
        self.peek().kind == TokenKind::Eof
    }

    pub(super) fn check(&self, kind: TokenKind) -> bool {
        self.peek().kind == kind
    }

    /// Whether the current token is the contextual word `word`.
    pub(super) fn check_contextual(&self, word: &str) -> bool {
        self.peek().is_word(word)
    }

    /// Consume the current token if it has the given kind.
    pub(super) fn eat(&mut self, kind: TokenKind) -> Option<Token<'ast>> {
        if self.check(kind) {
            Some(self.advance())
        } else {
            None
        }
    }

    /// Consume the current token if it is the contextual word `word`.
    pub(super) fn eat_contextual(&mut self, word: &str) -> Option<Token<'ast>> {
        if self.check_contextual(word) {
            Some(self.advance())
        } else {
            None
        }
    }

    /// Consume a token of the given kind or fail.
    pub(super) fn expect(&mut self, kind: TokenKind) -> Result<Token<'ast>, ParseError> {
        if self.check(kind) {
            return Ok(self.advance());
        }
        Err(self.error_expected(kind.description()))
    }

    /// Consume an identifier.
    pub(super) fn expect_ident(&mut self) -> Result<Ident<'ast>, ParseError> {
        let token = *self.peek();
        if token.kind == TokenKind::Identifier {
            self.advance();
            return Ok(self.ident_from(token));
        }
        if token.kind == TokenKind::Eof {
            return Err(ParseError::unexpected_eof(token.span));
        }
        Err(ParseError::expected_identifier(
            token.span,
            token.kind.description(),
        ))
    }

    /// Consume a member name after `.`; reserved words are accepted here.
    pub(super) fn expect_member_name(&mut self) -> Result<Ident<'ast>, ParseError> {
        let token = *self.peek();
        if token.kind == TokenKind::Identifier || token.kind.is_keyword() {
            self.advance();
            return Ok(self.ident_from(token));
        }
        Err(ParseError::expected_identifier(
            token.span,
            token.kind.description(),
        ))
    }

    /// Parse `A.B.C`.
    pub(super) fn parse_dotted_name(&mut self) -> Result<DottedName<'ast>, ParseError> {
        let first = self.expect_ident()?;
        let mut span = first.span;
        let mut parts = BVec::new_in(self.arena);
        parts.push(first);
        while self.check(TokenKind::Dot) && self.peek_nth(1).kind == TokenKind::Identifier {
            self.advance();
            let part = self.expect_ident()?;
            span = span.merge(part.span);
            parts.push(part);
        }
        Ok(DottedName {
            parts: parts.into_bump_slice(),
            span,
        })
    }

    // =========================================
    // Errors and recovery
    // =========================================

    pub(super) fn error_expected(&self, expected: &str) -> ParseError {
        let token = self.peek();
        if token.kind == TokenKind::Eof {
            return ParseError::unexpected_eof(token.span);
        }
        ParseError::expected_token(token.span, expected, token.kind.description())
    }

    pub(super) fn unsupported(&self, what: &str) -> ParseError {
        ParseError::new(
            ParseErrorKind::Unsupported,
            self.peek().span,
            format!("{what} is not supported"),
        )
    }

    /// Skip tokens until just past the next `;`, or until an `end` or a token
    /// that can start a new unit section.
    pub(super) fn synchronize(&mut self) {
        loop {
            match self.peek().kind {
                TokenKind::Eof
                | TokenKind::End
                | TokenKind::Implementation
                | TokenKind::Initialization
                | TokenKind::Finalization => return,
                TokenKind::Semicolon => {
                    self.advance();
                    return;
                }
                _ => {
                    self.advance();
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn helpers_walk_the_buffer() {
        let arena = Bump::new();
        let mut parser = Parser::new("unit Foo; virtual", &arena);
        assert!(parser.check(TokenKind::Unit));
        assert!(parser.eat(TokenKind::Unit).is_some());
        assert!(parser.eat(TokenKind::Unit).is_none());
        let name = parser.expect_ident().unwrap();
        assert_eq!(name.name, "Foo");
        assert!(parser.expect(TokenKind::Semicolon).is_ok());
        assert!(parser.check_contextual("VIRTUAL"));
        assert!(parser.eat_contextual("virtual").is_some());
        assert!(parser.is_eof());
        // Eof is sticky.
        parser.advance();
        assert!(parser.is_eof());
    }

    #[test]
    fn node_ids_are_sequential_and_anchored() {
        let arena = Bump::new();
        let mut parser = Parser::new("A.B", &arena);
        let name = parser.parse_dotted_name().unwrap();
        assert_eq!(name.parts.len(), 2);
        assert_eq!(name.parts[0].id, NodeId::new(0));
        assert_eq!(name.parts[1].id, NodeId::new(1));
        assert_eq!(parser.anchors()[1], Span::new(1, 3, 1));
    }

    #[test]
    fn lex_errors_become_parse_errors() {
        let arena = Bump::new();
        let parser = Parser::new("x ? y", &arena);
        assert_eq!(parser.errors().len(), 1);
    }

    #[test]
    fn expect_reports_found_token() {
        let arena = Bump::new();
        let mut parser = Parser::new("begin", &arena);
        let err = parser.expect(TokenKind::Semicolon).unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::ExpectedToken);
        assert!(err.message.contains("'begin'"));
    }
}
