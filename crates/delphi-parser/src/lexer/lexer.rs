//! Main lexer implementation for Delphi.
//!
//! The [`Lexer`] converts source text into a stream of [`Token`]s. Comments
//! are skipped, except compiler directives (`{$NAME ...}` and `(*$NAME ...*)`)
//! which are collected with their source position for the directive sweep.
//!
//! The lexer copies all lexemes into the arena, allowing the source string to
//! be freed after lexing completes.

use bumpalo::Bump;

use super::cursor::{Cursor, is_ident_continue, is_ident_start};
use super::token::{Token, TokenKind, lookup_keyword};
use delphi_core::{LexError, Span};

/// A compiler directive as written in a `{$...}` comment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawDirective {
    /// Directive name, e.g. `ZEROBASEDSTRINGS`, `WARN`, `R`.
    pub name: String,
    /// Everything after the name, trimmed. `{$R+}` has argument `+`.
    pub argument: String,
    /// Span of the whole comment.
    pub span: Span,
}

/// Everything the lexer produced for one source file.
#[derive(Debug)]
pub struct LexOutput<'ast> {
    /// Tokens, terminated by a single `Eof`.
    pub tokens: Vec<Token<'ast>>,
    /// Directives in source order.
    pub directives: Vec<RawDirective>,
    /// Lexical errors; the offending input produced `Error` tokens.
    pub errors: Vec<LexError>,
}

/// Lexer for Delphi source code.
///
/// The `'src` lifetime is the source string being lexed (temporary).
/// The `'ast` lifetime is the arena where token lexemes are allocated (persists).
pub struct Lexer<'src, 'ast> {
    /// Low-level character cursor.
    cursor: Cursor<'src>,
    /// Arena for allocating token lexemes.
    arena: &'ast Bump,
    /// Directives found in comments so far.
    directives: Vec<RawDirective>,
    /// Accumulated errors.
    errors: Vec<LexError>,
}

impl<'src, 'ast> Lexer<'src, 'ast> {
    /// Create a new lexer for the given source text.
    pub fn new(source: &'src str, arena: &'ast Bump) -> Self {
        Self {
            cursor: Cursor::new(source),
            arena,
            directives: Vec::new(),
            errors: Vec::new(),
        }
    }

    /// Lex the whole source.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn tokenize(mut self) -> LexOutput<'ast> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token();
            let done = token.kind == TokenKind::Eof;
            tokens.push(token);
            if done {
                break;
            }
        }
        LexOutput {
            tokens,
            directives: self.directives,
            errors: self.errors,
        }
    }

    /// Consume and return the next token.
    pub fn next_token(&mut self) -> Token<'ast> {
        if let Some(error) = self.skip_trivia() {
            return self.make_error(error);
        }

        let Some(first) = self.cursor.peek() else {
            return self.make_eof();
        };

        let start_line = self.cursor.line();
        let start_col = self.cursor.column();
        let start_offset = self.cursor.offset();

        match first {
            '\'' | '#' => self.scan_string(start_line, start_col, start_offset),
            c if c.is_ascii_digit() => self.scan_number(start_line, start_col, start_offset),
            '$' if self.cursor.peek_nth(1).is_some_and(|c| c.is_ascii_hexdigit()) => {
                self.scan_hex(start_line, start_col, start_offset)
            }
            '&' if self.cursor.peek_nth(1).is_some_and(is_ident_start) => {
                // `&begin` escapes a reserved word as an identifier.
                self.cursor.advance();
                let text = self.cursor.eat_while(is_ident_continue);
                let span = Span::new(start_line, start_col, self.cursor.offset() - start_offset);
                Token::new(TokenKind::Identifier, self.arena.alloc_str(text), span)
            }
            c if is_ident_start(c) => self.scan_identifier(start_line, start_col, start_offset),
            _ => self.scan_operator(start_line, start_col, start_offset),
        }
    }

    // =========================================
    // Internal: trivia
    // =========================================

    /// Skip whitespace and comments, collecting directives.
    fn skip_trivia(&mut self) -> Option<LexError> {
        if self.cursor.check_str("\u{FEFF}") {
            self.cursor.advance();
        }

        loop {
            match self.cursor.peek() {
                Some(c) if c.is_whitespace() => {
                    self.cursor.advance();
                }
                Some('/') if self.cursor.peek_nth(1) == Some('/') => {
                    self.cursor.eat_while(|c| c != '\n');
                }
                Some('{') => {
                    if let Err(error) = self.scan_brace_comment() {
                        return Some(error);
                    }
                }
                Some('(') if self.cursor.peek_nth(1) == Some('*') => {
                    if let Err(error) = self.scan_paren_comment() {
                        return Some(error);
                    }
                }
                _ => return None,
            }
        }
    }

    /// Scan `{ ... }`; a leading `$` makes it a directive.
    fn scan_brace_comment(&mut self) -> Result<(), LexError> {
        let start_line = self.cursor.line();
        let start_col = self.cursor.column();
        let start_offset = self.cursor.offset();
        self.cursor.advance(); // '{'

        let body_start = self.cursor.offset();
        loop {
            match self.cursor.peek() {
                None => {
                    let len = self.cursor.offset() - start_offset;
                    return Err(LexError::UnterminatedComment {
                        span: Span::new(start_line, start_col, len),
                    });
                }
                Some('}') => {
                    let body = self.cursor.slice_from(body_start);
                    self.cursor.advance();
                    let span = Span::new(start_line, start_col, self.cursor.offset() - start_offset);
                    self.record_directive(body, span);
                    return Ok(());
                }
                Some(_) => {
                    self.cursor.advance();
                }
            }
        }
    }

    /// Scan `(* ... *)`; a leading `$` makes it a directive.
    fn scan_paren_comment(&mut self) -> Result<(), LexError> {
        let start_line = self.cursor.line();
        let start_col = self.cursor.column();
        let start_offset = self.cursor.offset();
        self.cursor.advance(); // '('
        self.cursor.advance(); // '*'

        let body_start = self.cursor.offset();
        loop {
            if self.cursor.is_eof() {
                let len = self.cursor.offset() - start_offset;
                return Err(LexError::UnterminatedComment {
                    span: Span::new(start_line, start_col, len),
                });
            }
            if self.cursor.check_str("*)") {
                let body = self.cursor.slice_from(body_start);
                self.cursor.advance();
                self.cursor.advance();
                let span = Span::new(start_line, start_col, self.cursor.offset() - start_offset);
                self.record_directive(body, span);
                return Ok(());
            }
            self.cursor.advance();
        }
    }

    fn record_directive(&mut self, body: &str, span: Span) {
        let Some(text) = body.strip_prefix('$') else {
            return;
        };
        let name_len = text
            .find(|c: char| !is_ident_continue(c))
            .unwrap_or(text.len());
        if name_len == 0 {
            return;
        }
        self.directives.push(RawDirective {
            name: text[..name_len].to_ascii_uppercase(),
            argument: text[name_len..].trim().to_string(),
            span,
        });
    }

    // =========================================
    // Internal: token construction
    // =========================================

    /// Create an EOF token.
    fn make_eof(&self) -> Token<'ast> {
        let span = Span::point(self.cursor.line(), self.cursor.column());
        Token::new(TokenKind::Eof, "", span)
    }

    /// Create a token from start position to current position.
    fn make_token(
        &self,
        kind: TokenKind,
        start_line: u32,
        start_col: u32,
        start_offset: u32,
    ) -> Token<'ast> {
        let len = self.cursor.offset() - start_offset;
        let span = Span::new(start_line, start_col, len);
        let lexeme = self.arena.alloc_str(self.cursor.slice_from(start_offset));
        Token::new(kind, lexeme, span)
    }

    /// Create an error token and record the error.
    fn make_error(&mut self, error: LexError) -> Token<'ast> {
        let span = error.span();
        self.errors.push(error);
        Token::new(TokenKind::Error, "", span)
    }

    // =========================================
    // Scanning: strings
    // =========================================

    /// Scan a run of quoted strings and `#n` character codes as one literal.
    fn scan_string(&mut self, start_line: u32, start_col: u32, start_offset: u32) -> Token<'ast> {
        loop {
            match self.cursor.peek() {
                Some('\'') => {
                    self.cursor.advance();
                    loop {
                        match self.cursor.peek() {
                            None | Some('\n') | Some('\r') => {
                                let len = self.cursor.offset() - start_offset;
                                let error = LexError::UnterminatedString {
                                    span: Span::new(start_line, start_col, len),
                                };
                                return self.make_error(error);
                            }
                            Some('\'') => {
                                self.cursor.advance();
                                if !self.cursor.eat('\'') {
                                    break;
                                }
                            }
                            Some(_) => {
                                self.cursor.advance();
                            }
                        }
                    }
                }
                Some('#') => {
                    let code_line = self.cursor.line();
                    let code_col = self.cursor.column();
                    self.cursor.advance();
                    let digits = if self.cursor.eat('$') {
                        self.cursor.eat_while(|c| c.is_ascii_hexdigit())
                    } else {
                        self.cursor.eat_while(|c| c.is_ascii_digit())
                    };
                    if digits.is_empty() {
                        let error = LexError::InvalidNumber {
                            span: Span::new(code_line, code_col, 1),
                            detail: "expected character code after '#'".to_string(),
                        };
                        return self.make_error(error);
                    }
                }
                _ => break,
            }
        }
        self.make_token(TokenKind::StringLiteral, start_line, start_col, start_offset)
    }

    // =========================================
    // Scanning: numbers
    // =========================================

    fn scan_hex(&mut self, start_line: u32, start_col: u32, start_offset: u32) -> Token<'ast> {
        self.cursor.advance(); // '$'
        self.cursor.eat_while(|c| c.is_ascii_hexdigit());
        self.make_token(TokenKind::HexLiteral, start_line, start_col, start_offset)
    }

    fn scan_number(&mut self, start_line: u32, start_col: u32, start_offset: u32) -> Token<'ast> {
        self.cursor.eat_while(|c| c.is_ascii_digit());
        let mut kind = TokenKind::IntLiteral;

        // `1..10` is a range, not a real.
        if self.cursor.peek() == Some('.')
            && self.cursor.peek_nth(1).is_some_and(|c| c.is_ascii_digit())
        {
            self.cursor.advance();
            self.cursor.eat_while(|c| c.is_ascii_digit());
            kind = TokenKind::RealLiteral;
        }

        if matches!(self.cursor.peek(), Some('e') | Some('E')) {
            let sign = matches!(self.cursor.peek_nth(1), Some('+') | Some('-'));
            let digit_at = if sign { 2 } else { 1 };
            if self
                .cursor
                .peek_nth(digit_at)
                .is_some_and(|c| c.is_ascii_digit())
            {
                self.cursor.advance();
                if sign {
                    self.cursor.advance();
                }
                self.cursor.eat_while(|c| c.is_ascii_digit());
                kind = TokenKind::RealLiteral;
            }
        }

        self.make_token(kind, start_line, start_col, start_offset)
    }

    // =========================================
    // Scanning: identifiers and operators
    // =========================================

    fn scan_identifier(&mut self, start_line: u32, start_col: u32, start_offset: u32) -> Token<'ast> {
        let text = self.cursor.eat_while(is_ident_continue);
        let kind = lookup_keyword(text).unwrap_or(TokenKind::Identifier);
        self.make_token(kind, start_line, start_col, start_offset)
    }

    fn scan_operator(&mut self, start_line: u32, start_col: u32, start_offset: u32) -> Token<'ast> {
        let Some(c) = self.cursor.advance() else {
            return self.make_eof();
        };
        let kind = match c {
            '+' => TokenKind::Plus,
            '-' => TokenKind::Minus,
            '*' => TokenKind::Star,
            '/' => TokenKind::Slash,
            '=' => TokenKind::Equal,
            '<' => {
                if self.cursor.eat('>') {
                    TokenKind::NotEqual
                } else if self.cursor.eat('=') {
                    TokenKind::LessEqual
                } else {
                    TokenKind::Less
                }
            }
            '>' => {
                if self.cursor.eat('=') {
                    TokenKind::GreaterEqual
                } else {
                    TokenKind::Greater
                }
            }
            ':' => {
                if self.cursor.eat('=') {
                    TokenKind::Assign
                } else {
                    TokenKind::Colon
                }
            }
            '.' => {
                if self.cursor.eat('.') {
                    TokenKind::DotDot
                } else {
                    TokenKind::Dot
                }
            }
            ',' => TokenKind::Comma,
            ';' => TokenKind::Semicolon,
            '(' => TokenKind::LeftParen,
            ')' => TokenKind::RightParen,
            '[' => TokenKind::LeftBracket,
            ']' => TokenKind::RightBracket,
            '^' => TokenKind::Caret,
            '@' => TokenKind::At,
            other => {
                let error = LexError::UnexpectedChar {
                    ch: other,
                    span: Span::new(start_line, start_col, other.len_utf8() as u32),
                };
                return self.make_error(error);
            }
        };
        self.make_token(kind, start_line, start_col, start_offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        let arena = Bump::new();
        Lexer::new(source, &arena)
            .tokenize()
            .tokens
            .iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn keywords_are_case_insensitive() {
        assert_eq!(
            kinds("BEGIN End bEgIn"),
            vec![TokenKind::Begin, TokenKind::End, TokenKind::Begin, TokenKind::Eof]
        );
    }

    #[test]
    fn operators() {
        assert_eq!(
            kinds(":= <> <= >= .. . ^ @"),
            vec![
                TokenKind::Assign,
                TokenKind::NotEqual,
                TokenKind::LessEqual,
                TokenKind::GreaterEqual,
                TokenKind::DotDot,
                TokenKind::Dot,
                TokenKind::Caret,
                TokenKind::At,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn numbers_and_ranges() {
        assert_eq!(
            kinds("1..10 1.5 2E10 $FF"),
            vec![
                TokenKind::IntLiteral,
                TokenKind::DotDot,
                TokenKind::IntLiteral,
                TokenKind::RealLiteral,
                TokenKind::RealLiteral,
                TokenKind::HexLiteral,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn string_runs_form_one_literal() {
        let arena = Bump::new();
        let out = Lexer::new("'it''s'#13#10'x' #$41", &arena).tokenize();
        assert_eq!(out.tokens[0].kind, TokenKind::StringLiteral);
        assert_eq!(out.tokens[0].lexeme, "'it''s'#13#10'x'");
        assert_eq!(out.tokens[1].lexeme, "#$41");
        assert!(out.errors.is_empty());
    }

    #[test]
    fn comments_are_skipped_and_directives_kept() {
        let arena = Bump::new();
        let source = "{ plain }\n(* also *)\n// line\n{$ZEROBASEDSTRINGS ON} x {$R+} (*$WARN SYMBOL_PLATFORM OFF*)";
        let out = Lexer::new(source, &arena).tokenize();
        assert_eq!(out.tokens.len(), 2);
        assert_eq!(out.tokens[0].lexeme, "x");
        assert_eq!(out.directives.len(), 3);
        assert_eq!(out.directives[0].name, "ZEROBASEDSTRINGS");
        assert_eq!(out.directives[0].argument, "ON");
        assert_eq!(out.directives[0].span, Span::new(4, 1, 22));
        assert_eq!(out.directives[1].name, "R");
        assert_eq!(out.directives[1].argument, "+");
        assert_eq!(out.directives[2].name, "WARN");
        assert_eq!(out.directives[2].argument, "SYMBOL_PLATFORM OFF");
    }

    #[test]
    fn escaped_identifier() {
        let arena = Bump::new();
        let out = Lexer::new("&Type", &arena).tokenize();
        assert_eq!(out.tokens[0].kind, TokenKind::Identifier);
        assert_eq!(out.tokens[0].lexeme, "Type");
    }

    #[test]
    fn errors_are_recorded() {
        let arena = Bump::new();
        let out = Lexer::new("'open\n{ never closed", &arena).tokenize();
        assert_eq!(out.tokens[0].kind, TokenKind::Error);
        assert_eq!(out.errors.len(), 2);
        assert!(matches!(out.errors[0], LexError::UnterminatedString { .. }));
        assert!(matches!(out.errors[1], LexError::UnterminatedComment { .. }));
    }

    #[test]
    fn spans_track_lines() {
        let arena = Bump::new();
        let out = Lexer::new("unit Foo;\n  interface", &arena).tokenize();
        assert_eq!(out.tokens[3].span, Span::new(2, 3, 9));
    }
}
