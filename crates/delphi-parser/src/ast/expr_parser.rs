//! Expression parsing using Pratt parsing (precedence climbing).
//!
//! This module implements expression parsing with Pascal operator precedence
//! and left associativity. Postfix forms (call, index, member access and
//! dereference) bind tighter than every prefix and binary operator.

use super::parser::Parser;
use crate::ast::expr::*;
use crate::ast::{BinaryOp, UnaryOp};
use crate::lexer::TokenKind;
use bumpalo::collections::Vec as BVec;
use delphi_core::{ParseError, ParseErrorKind};

/// Binding power of postfix operators.
const POSTFIX_BP: u8 = 9;

impl<'ast> Parser<'ast> {
    /// Parse an expression with a minimum binding power.
    ///
    /// This is the core of the Pratt parser. It handles operator precedence
    /// by only consuming operators with sufficient binding power.
    pub fn parse_expr(&mut self, min_bp: u8) -> Result<&'ast Expr<'ast>, ParseError> {
        let mut lhs = self.parse_prefix()?;

        loop {
            let kind = self.peek().kind;

            if matches!(
                kind,
                TokenKind::Dot | TokenKind::LeftParen | TokenKind::LeftBracket | TokenKind::Caret
            ) {
                if POSTFIX_BP < min_bp {
                    break;
                }
                lhs = self.parse_postfix(lhs)?;
                continue;
            }

            if let Some(op) = BinaryOp::from_token(kind) {
                let (l_bp, r_bp) = op.binding_power();
                if l_bp < min_bp {
                    break;
                }
                let op_token = self.advance();
                let rhs = self.parse_expr(r_bp)?;
                let span = lhs.span.merge(rhs.span);
                let id = self.node(op_token.span);
                lhs = self.arena.alloc(Expr {
                    id,
                    kind: ExprKind::Binary {
                        op,
                        left: lhs,
                        right: rhs,
                    },
                    span,
                });
                continue;
            }

            break;
        }

        Ok(lhs)
    }

    /// Parse a prefix expression (the start of an expression).
    fn parse_prefix(&mut self) -> Result<&'ast Expr<'ast>, ParseError> {
        let token = *self.peek();

        let kind = match token.kind {
            TokenKind::IntLiteral => {
                self.advance();
                let value = token.lexeme.parse::<i64>().map_err(|_| {
                    ParseError::new(
                        ParseErrorKind::InvalidLiteral,
                        token.span,
                        format!("integer literal '{}' is out of range", token.lexeme),
                    )
                })?;
                ExprKind::Literal(Literal::Integer(value))
            }
            TokenKind::HexLiteral => {
                self.advance();
                let digits = token.lexeme.trim_start_matches('$');
                let value = u64::from_str_radix(digits, 16).map_err(|_| {
                    ParseError::new(
                        ParseErrorKind::InvalidLiteral,
                        token.span,
                        format!("hex literal '{}' is out of range", token.lexeme),
                    )
                })?;
                // `$FFFFFFFFFFFFFFFF` denotes -1 in a 64-bit context.
                ExprKind::Literal(Literal::Integer(value as i64))
            }
            TokenKind::RealLiteral => {
                self.advance();
                let value = token.lexeme.parse::<f64>().map_err(|_| {
                    ParseError::new(
                        ParseErrorKind::InvalidLiteral,
                        token.span,
                        format!("invalid real literal '{}'", token.lexeme),
                    )
                })?;
                ExprKind::Literal(Literal::Real(value))
            }
            TokenKind::StringLiteral => {
                self.advance();
                let text = decode_string(token.lexeme).ok_or_else(|| {
                    ParseError::new(
                        ParseErrorKind::InvalidLiteral,
                        token.span,
                        "invalid character code in string literal",
                    )
                })?;
                ExprKind::Literal(Literal::String(self.arena.alloc_str(&text)))
            }
            TokenKind::Nil => {
                self.advance();
                ExprKind::Literal(Literal::Nil)
            }
            // `string(P)` is a typecast through the `string` keyword.
            TokenKind::Identifier | TokenKind::String => {
                self.advance();
                let ident = self.ident_from(token);
                return Ok(self.arena.alloc(Expr {
                    id: ident.id,
                    kind: ExprKind::Ident(ident),
                    span: token.span,
                }));
            }
            TokenKind::Inherited => {
                self.advance();
                let name = if self.check(TokenKind::Identifier) {
                    Some(self.expect_ident()?)
                } else {
                    None
                };
                ExprKind::Inherited(name)
            }
            TokenKind::LeftParen => {
                self.advance();
                let inner = self.parse_expr(0)?;
                self.expect(TokenKind::RightParen)?;
                ExprKind::Paren(inner)
            }
            TokenKind::LeftBracket => ExprKind::SetCtor(self.parse_set_elements()?),
            _ => {
                if let Some(op) = UnaryOp::from_token(token.kind) {
                    self.advance();
                    let operand = self.parse_expr(UnaryOp::binding_power())?;
                    ExprKind::Unary { op, operand }
                } else if token.kind == TokenKind::Eof {
                    return Err(ParseError::unexpected_eof(token.span));
                } else {
                    return Err(ParseError::expected_expression(
                        token.span,
                        token.kind.description(),
                    ));
                }
            }
        };

        let span = token.span.merge(self.previous_span());
        let id = self.node(token.span);
        Ok(self.arena.alloc(Expr { id, kind, span }))
    }

    /// Parse one postfix form applied to `base`.
    fn parse_postfix(&mut self, base: &'ast Expr<'ast>) -> Result<&'ast Expr<'ast>, ParseError> {
        let token = self.advance();
        let (kind, anchor) = match token.kind {
            TokenKind::Dot => {
                let name = self.expect_member_name()?;
                (ExprKind::Member { base, name }, name.span)
            }
            TokenKind::LeftParen => {
                let args = self.parse_expr_list(TokenKind::RightParen)?;
                self.expect(TokenKind::RightParen)?;
                (ExprKind::Call { callee: base, args }, base.span)
            }
            TokenKind::LeftBracket => {
                let indices = self.parse_expr_list(TokenKind::RightBracket)?;
                self.expect(TokenKind::RightBracket)?;
                // Anchored at `[`: positional queries see the state there.
                (ExprKind::Index { base, indices }, token.span)
            }
            _ => (ExprKind::Deref(base), token.span),
        };
        let span = base.span.merge(self.previous_span());
        let id = self.node(anchor);
        Ok(self.arena.alloc(Expr { id, kind, span }))
    }

    /// Comma-separated expressions up to (not including) `close`.
    pub(super) fn parse_expr_list(&mut self, close: TokenKind) -> Result<&'ast [Expr<'ast>], ParseError> {
        let mut items = BVec::new_in(self.arena);
        if self.check(close) {
            return Ok(items.into_bump_slice());
        }
        loop {
            items.push(*self.parse_expr(0)?);
            if self.eat(TokenKind::Comma).is_none() {
                break;
            }
        }
        Ok(items.into_bump_slice())
    }

    /// `[a, b..c]`; the current token is `[`.
    fn parse_set_elements(&mut self) -> Result<&'ast [SetElement<'ast>], ParseError> {
        self.expect(TokenKind::LeftBracket)?;
        let mut elements = BVec::new_in(self.arena);
        if self.eat(TokenKind::RightBracket).is_some() {
            return Ok(elements.into_bump_slice());
        }
        loop {
            let low = self.parse_expr(0)?;
            let high = if self.eat(TokenKind::DotDot).is_some() {
                Some(self.parse_expr(0)?)
            } else {
                None
            };
            elements.push(SetElement { low, high });
            if self.eat(TokenKind::Comma).is_none() {
                break;
            }
        }
        self.expect(TokenKind::RightBracket)?;
        Ok(elements.into_bump_slice())
    }

    /// Parse the value of a typed constant, which may be an aggregate
    /// `(1, 2)` or a record constant `(X: 1; Y: 2)`.
    pub(super) fn parse_const_value(&mut self) -> Result<&'ast Expr<'ast>, ParseError> {
        if !self.check(TokenKind::LeftParen) {
            return self.parse_expr(0);
        }
        let open = *self.peek();
        let is_record = self.peek_nth(1).kind == TokenKind::Identifier
            && self.peek_nth(2).kind == TokenKind::Colon;

        let kind = if is_record {
            self.advance();
            let mut fields = BVec::new_in(self.arena);
            while !self.check(TokenKind::RightParen) {
                let name = self.expect_ident()?;
                self.expect(TokenKind::Colon)?;
                let value = self.parse_const_value()?;
                fields.push(FieldInit { name, value });
                if self.eat(TokenKind::Semicolon).is_none() {
                    break;
                }
            }
            self.expect(TokenKind::RightParen)?;
            ExprKind::RecordConst(fields.into_bump_slice())
        } else {
            // Could be `(1, 2)` or a parenthesized scalar like `(1 + 2) * 3`.
            let start = self.position;
            self.advance();
            let mut items = BVec::new_in(self.arena);
            loop {
                items.push(*self.parse_const_value()?);
                if self.eat(TokenKind::Comma).is_none() {
                    break;
                }
            }
            self.expect(TokenKind::RightParen)?;
            if items.len() == 1 {
                // Re-parse as an ordinary expression so trailing operators apply.
                self.position = start;
                return self.parse_expr(0);
            }
            ExprKind::Aggregate(items.into_bump_slice())
        };

        let span = open.span.merge(self.previous_span());
        let id = self.node(open.span);
        Ok(self.arena.alloc(Expr { id, kind, span }))
    }
}

/// Decode a string literal run such as `'it''s'#13#10` into its text.
fn decode_string(lexeme: &str) -> Option<String> {
    let mut out = String::new();
    let mut chars = lexeme.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\'' => loop {
                match chars.next()? {
                    '\'' if chars.peek() == Some(&'\'') => {
                        chars.next();
                        out.push('\'');
                    }
                    '\'' => break,
                    other => out.push(other),
                }
            },
            '#' => {
                let code = if chars.peek() == Some(&'$') {
                    chars.next();
                    let digits: String =
                        std::iter::from_fn(|| chars.next_if(|c| c.is_ascii_hexdigit())).collect();
                    u32::from_str_radix(&digits, 16).ok()?
                } else {
                    let digits: String =
                        std::iter::from_fn(|| chars.next_if(|c| c.is_ascii_digit())).collect();
                    digits.parse::<u32>().ok()?
                };
                out.push(char::from_u32(code)?);
            }
            _ => return None,
        }
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bumpalo::Bump;
    use delphi_core::Span;

    fn parse<'a>(source: &str, arena: &'a Bump) -> &'a Expr<'a> {
        let mut parser = Parser::new(source, arena);
        parser.parse_expr(0).unwrap()
    }

    #[test]
    fn literals() {
        let arena = Bump::new();
        assert!(matches!(
            parse("42", &arena).kind,
            ExprKind::Literal(Literal::Integer(42))
        ));
        assert!(matches!(
            parse("$FF", &arena).kind,
            ExprKind::Literal(Literal::Integer(255))
        ));
        assert!(matches!(
            parse("1.5", &arena).kind,
            ExprKind::Literal(Literal::Real(v)) if v == 1.5
        ));
        assert!(matches!(
            parse("'it''s'#33", &arena).kind,
            ExprKind::Literal(Literal::String("it's!"))
        ));
        assert!(matches!(
            parse("nil", &arena).kind,
            ExprKind::Literal(Literal::Nil)
        ));
    }

    #[test]
    fn pascal_precedence() {
        let arena = Bump::new();
        // `a = b and c` is `a = (b and c)`.
        match parse("a = b and c", &arena).kind {
            ExprKind::Binary { op, right, .. } => {
                assert_eq!(op, BinaryOp::Equal);
                assert!(matches!(
                    right.kind,
                    ExprKind::Binary {
                        op: BinaryOp::And,
                        ..
                    }
                ));
            }
            other => panic!("expected binary, got {other:?}"),
        }
        // Left associative.
        match parse("1 - 2 - 3", &arena).kind {
            ExprKind::Binary { left, .. } => {
                assert!(matches!(left.kind, ExprKind::Binary { .. }));
            }
            other => panic!("expected binary, got {other:?}"),
        }
    }

    #[test]
    fn unary_binds_tighter_than_binary_but_looser_than_postfix() {
        let arena = Bump::new();
        match parse("not A[0] or B", &arena).kind {
            ExprKind::Binary { op, left, .. } => {
                assert_eq!(op, BinaryOp::Or);
                match left.kind {
                    ExprKind::Unary { op, operand } => {
                        assert_eq!(op, UnaryOp::Not);
                        assert!(matches!(operand.kind, ExprKind::Index { .. }));
                    }
                    other => panic!("expected unary, got {other:?}"),
                }
            }
            other => panic!("expected binary, got {other:?}"),
        }
    }

    #[test]
    fn postfix_chain() {
        let arena = Bump::new();
        let expr = parse("Foo.Bar(1, 2)[3]^", &arena);
        match expr.kind {
            ExprKind::Deref(inner) => match inner.kind {
                ExprKind::Index { base, indices } => {
                    assert_eq!(indices.len(), 1);
                    match base.kind {
                        ExprKind::Call { callee, args } => {
                            assert_eq!(args.len(), 2);
                            assert!(matches!(callee.kind, ExprKind::Member { .. }));
                        }
                        other => panic!("expected call, got {other:?}"),
                    }
                }
                other => panic!("expected index, got {other:?}"),
            },
            other => panic!("expected deref, got {other:?}"),
        }
    }

    #[test]
    fn index_is_anchored_at_bracket() {
        let arena = Bump::new();
        let mut parser = Parser::new("S[0]", &arena);
        let expr = parser.parse_expr(0).unwrap();
        assert!(matches!(expr.kind, ExprKind::Index { .. }));
        assert_eq!(parser.anchors()[expr.id.as_usize()], Span::new(1, 2, 1));
    }

    #[test]
    fn set_constructors() {
        let arena = Bump::new();
        match parse("[1, 3..5]", &arena).kind {
            ExprKind::SetCtor(elements) => {
                assert_eq!(elements.len(), 2);
                assert!(elements[1].high.is_some());
            }
            other => panic!("expected set, got {other:?}"),
        }
    }

    #[test]
    fn inherited_forms() {
        let arena = Bump::new();
        assert!(matches!(parse("inherited", &arena).kind, ExprKind::Inherited(None)));
        match parse("inherited Create(1)", &arena).kind {
            ExprKind::Call { callee, .. } => {
                assert!(matches!(callee.kind, ExprKind::Inherited(Some(_))));
            }
            other => panic!("expected call, got {other:?}"),
        }
    }

    #[test]
    fn typecasts_parse_as_calls() {
        let arena = Bump::new();
        assert!(matches!(parse("Single(1.0)", &arena).kind, ExprKind::Call { .. }));
        assert!(matches!(parse("string(P)", &arena).kind, ExprKind::Call { .. }));
        assert!(matches!(
            parse("Obj as TFoo", &arena).kind,
            ExprKind::Binary {
                op: BinaryOp::As,
                ..
            }
        ));
    }

    #[test]
    fn const_aggregates() {
        let arena = Bump::new();
        let mut parser = Parser::new("(1, 2, 3)", &arena);
        assert!(matches!(
            parser.parse_const_value().unwrap().kind,
            ExprKind::Aggregate(items) if items.len() == 3
        ));
        let mut parser = Parser::new("(X: 1; Y: 2)", &arena);
        assert!(matches!(
            parser.parse_const_value().unwrap().kind,
            ExprKind::RecordConst(fields) if fields.len() == 2
        ));
        let mut parser = Parser::new("(1 + 2) * 3", &arena);
        assert!(matches!(
            parser.parse_const_value().unwrap().kind,
            ExprKind::Binary {
                op: BinaryOp::Mul,
                ..
            }
        ));
    }

    #[test]
    fn decode_rejects_garbage() {
        assert_eq!(decode_string("#$41#66"), Some("AB".to_string()));
        assert_eq!(decode_string("'a''"), None);
        assert_eq!(decode_string("#"), None);
    }
}
