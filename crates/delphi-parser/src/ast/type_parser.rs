//! Type expression parsing.
//!
//! Grammar:
//! ```text
//! TYPE     ::= '^' TYPE | 'string' ('[' EXPR ']')? | 'packed'? 'array' ('[' TYPE (',' TYPE)* ']')? 'of' ('const' | TYPE)
//!            | 'set' 'of' TYPE | 'class' 'of' NAME | '(' ENUM ')' | PROCTYPE
//!            | NAME ('..' EXPR)? | EXPR '..' EXPR
//! PROCTYPE ::= ('reference' 'to')? ('procedure' | 'function') PARAMS? (':' TYPE)? ('of' 'object')?
//! ```

use super::parser::Parser;
use crate::ast::expr::{Expr, ExprKind};
use crate::ast::node::DottedName;
use crate::ast::types::*;
use crate::lexer::TokenKind;
use bumpalo::collections::Vec as BVec;
use delphi_core::{ParseError, ProceduralKind, Span};

/// Binding power used for subrange bounds, so `1..10 = 5` stops before `=`.
const SUBRANGE_BP: u8 = 3;

impl<'ast> Parser<'ast> {
    /// Parse a type expression.
    pub fn parse_type(&mut self) -> Result<&'ast TypeExpr<'ast>, ParseError> {
        let token = *self.peek();
        let kind = match token.kind {
            TokenKind::Caret => {
                self.advance();
                TypeExprKind::Pointer(self.parse_type()?)
            }
            TokenKind::String => {
                self.advance();
                let max_len = if self.eat(TokenKind::LeftBracket).is_some() {
                    let len = self.parse_expr(0)?;
                    self.expect(TokenKind::RightBracket)?;
                    Some(len)
                } else {
                    None
                };
                TypeExprKind::String { max_len }
            }
            TokenKind::Packed => {
                self.advance();
                if !self.check(TokenKind::Array) {
                    return Err(self.error_expected("'array'"));
                }
                return self.parse_array_type(token.span, true);
            }
            TokenKind::Array => return self.parse_array_type(token.span, false),
            TokenKind::Set => {
                self.advance();
                self.expect(TokenKind::Of)?;
                TypeExprKind::Set(self.parse_type()?)
            }
            TokenKind::Class => {
                self.advance();
                self.expect(TokenKind::Of)?;
                TypeExprKind::ClassOf(self.parse_dotted_name()?)
            }
            TokenKind::LeftParen => TypeExprKind::Enum(self.parse_enum_members()?),
            TokenKind::Procedure | TokenKind::Function => {
                TypeExprKind::Procedural(self.parse_procedural_type(false)?)
            }
            TokenKind::Identifier
                if token.is_word("reference") && self.peek_nth(1).kind == TokenKind::To =>
            {
                self.advance();
                self.advance();
                TypeExprKind::Procedural(self.parse_procedural_type(true)?)
            }
            TokenKind::Identifier => {
                let name = self.parse_dotted_name()?;
                if self.check(TokenKind::DotDot) {
                    let low = self.name_to_expr(name);
                    return self.finish_subrange(low);
                }
                TypeExprKind::Named(name)
            }
            TokenKind::IntLiteral
            | TokenKind::HexLiteral
            | TokenKind::StringLiteral
            | TokenKind::Minus
            | TokenKind::Plus => {
                let low = self.parse_expr(SUBRANGE_BP)?;
                return self.finish_subrange(low);
            }
            TokenKind::Record => return Err(self.unsupported("an anonymous record type")),
            TokenKind::File => return Err(self.unsupported("a file type")),
            TokenKind::Eof => return Err(ParseError::unexpected_eof(token.span)),
            _ => {
                return Err(ParseError::expected_type(
                    token.span,
                    token.kind.description(),
                ));
            }
        };

        let end = self.previous_span();
        let span = token.span.merge(end);
        let id = self.node(token.span);
        Ok(self.arena.alloc(TypeExpr { id, kind, span }))
    }

    /// `array [dims] of element`; the current token is `array`.
    fn parse_array_type(
        &mut self,
        start: Span,
        is_packed: bool,
    ) -> Result<&'ast TypeExpr<'ast>, ParseError> {
        self.expect(TokenKind::Array)?;
        let mut dims = BVec::new_in(self.arena);
        if self.eat(TokenKind::LeftBracket).is_some() {
            loop {
                dims.push(*self.parse_type()?);
                if self.eat(TokenKind::Comma).is_none() {
                    break;
                }
            }
            self.expect(TokenKind::RightBracket)?;
        }
        self.expect(TokenKind::Of)?;

        let kind = if dims.is_empty() && self.eat(TokenKind::Const).is_some() {
            TypeExprKind::ArrayOfConst
        } else {
            TypeExprKind::Array {
                dims: dims.into_bump_slice(),
                element: self.parse_type()?,
                is_packed,
            }
        };
        let span = start.merge(self.previous_span());
        let id = self.node(start);
        Ok(self.arena.alloc(TypeExpr { id, kind, span }))
    }

    /// `(A, B = 1, C)`
    fn parse_enum_members(&mut self) -> Result<&'ast [EnumMember<'ast>], ParseError> {
        self.expect(TokenKind::LeftParen)?;
        let mut members = BVec::new_in(self.arena);
        loop {
            let name = self.expect_ident()?;
            let value = if self.eat(TokenKind::Equal).is_some() {
                Some(self.parse_expr(0)?)
            } else {
                None
            };
            members.push(EnumMember { name, value });
            if self.eat(TokenKind::Comma).is_none() {
                break;
            }
        }
        self.expect(TokenKind::RightParen)?;
        Ok(members.into_bump_slice())
    }

    /// `procedure(...)`, `function(...): T`, each optionally `of object`.
    fn parse_procedural_type(
        &mut self,
        is_reference: bool,
    ) -> Result<&'ast ProceduralTypeExpr<'ast>, ParseError> {
        let is_function = self.advance().kind == TokenKind::Function;
        let params = self.parse_formal_params()?;
        let result = if is_function {
            self.expect(TokenKind::Colon)?;
            Some(self.parse_type()?)
        } else {
            None
        };
        let kind = if is_reference {
            ProceduralKind::Reference
        } else if self.check(TokenKind::Of) && self.peek_nth(1).kind == TokenKind::Object {
            self.advance();
            self.advance();
            ProceduralKind::OfObject
        } else {
            ProceduralKind::Plain
        };
        Ok(self.arena.alloc(ProceduralTypeExpr {
            params,
            result,
            kind,
        }))
    }

    /// Complete `low .. high` once `low` is parsed.
    fn finish_subrange(&mut self, low: &'ast Expr<'ast>) -> Result<&'ast TypeExpr<'ast>, ParseError> {
        self.expect(TokenKind::DotDot)?;
        let high = self.parse_expr(SUBRANGE_BP)?;
        let span = low.span.merge(high.span);
        let id = self.node(low.span);
        Ok(self.arena.alloc(TypeExpr {
            id,
            kind: TypeExprKind::Subrange { low, high },
            span,
        }))
    }

    /// Turn an already parsed dotted name into an identifier/member expression.
    pub(super) fn name_to_expr(&mut self, name: DottedName<'ast>) -> &'ast Expr<'ast> {
        let mut parts = name.parts.iter();
        let Some(first) = parts.next() else {
            // A dotted name always has at least one part.
            let id = self.node(name.span);
            return self.arena.alloc(Expr {
                id,
                kind: ExprKind::Literal(crate::ast::expr::Literal::Nil),
                span: name.span,
            });
        };
        let mut expr: &'ast Expr<'ast> = self.arena.alloc(Expr {
            id: first.id,
            kind: ExprKind::Ident(*first),
            span: first.span,
        });
        for part in parts {
            let span = expr.span.merge(part.span);
            let id = self.node(part.span);
            expr = self.arena.alloc(Expr {
                id,
                kind: ExprKind::Member {
                    base: expr,
                    name: *part,
                },
                span,
            });
        }
        expr
    }

    /// Span of the most recently consumed token.
    pub(super) fn previous_span(&self) -> Span {
        if self.position == 0 {
            return self.peek().span;
        }
        self.buffer[self.position - 1].span
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bumpalo::Bump;

    fn parse<'a>(source: &str, arena: &'a Bump) -> &'a TypeExpr<'a> {
        let mut parser = Parser::new(source, arena);
        parser.parse_type().unwrap()
    }

    #[test]
    fn named_and_dotted() {
        let arena = Bump::new();
        let ty = parse("System.SysUtils.TBytes", &arena);
        let name = ty.as_named().unwrap();
        assert_eq!(name.to_dotted(), "System.SysUtils.TBytes");
        assert!(ty.is_alias_target());
    }

    #[test]
    fn arrays() {
        let arena = Bump::new();
        match parse("array[0..9, Boolean] of Integer", &arena).kind {
            TypeExprKind::Array { dims, element, .. } => {
                assert_eq!(dims.len(), 2);
                assert!(matches!(dims[0].kind, TypeExprKind::Subrange { .. }));
                assert!(matches!(dims[1].kind, TypeExprKind::Named(_)));
                assert!(element.as_named().is_some());
            }
            other => panic!("expected array, got {other:?}"),
        }
        assert!(matches!(
            parse("array of const", &arena).kind,
            TypeExprKind::ArrayOfConst
        ));
        match parse("packed array of Byte", &arena).kind {
            TypeExprKind::Array { dims, is_packed, .. } => {
                assert!(dims.is_empty());
                assert!(is_packed);
            }
            other => panic!("expected array, got {other:?}"),
        }
    }

    #[test]
    fn subranges() {
        let arena = Bump::new();
        assert!(matches!(
            parse("-5..5", &arena).kind,
            TypeExprKind::Subrange { .. }
        ));
        assert!(matches!(
            parse("'a'..'z'", &arena).kind,
            TypeExprKind::Subrange { .. }
        ));
        assert!(matches!(
            parse("Low..High", &arena).kind,
            TypeExprKind::Subrange { .. }
        ));
    }

    #[test]
    fn strings_sets_pointers() {
        let arena = Bump::new();
        assert!(matches!(
            parse("string[20]", &arena).kind,
            TypeExprKind::String { max_len: Some(_) }
        ));
        assert!(matches!(parse("set of Char", &arena).kind, TypeExprKind::Set(_)));
        assert!(matches!(parse("^Integer", &arena).kind, TypeExprKind::Pointer(_)));
        assert!(matches!(parse("class of TFoo", &arena).kind, TypeExprKind::ClassOf(_)));
    }

    #[test]
    fn enums() {
        let arena = Bump::new();
        match parse("(Red, Green = 5, Blue)", &arena).kind {
            TypeExprKind::Enum(members) => {
                assert_eq!(members.len(), 3);
                assert!(members[1].value.is_some());
            }
            other => panic!("expected enum, got {other:?}"),
        }
    }

    #[test]
    fn procedural_types() {
        let arena = Bump::new();
        match parse("function(A: Integer): Boolean of object", &arena).kind {
            TypeExprKind::Procedural(proc) => {
                assert_eq!(proc.kind, ProceduralKind::OfObject);
                assert_eq!(proc.params.len(), 1);
                assert!(proc.result.is_some());
            }
            other => panic!("expected procedural, got {other:?}"),
        }
        match parse("reference to procedure", &arena).kind {
            TypeExprKind::Procedural(proc) => {
                assert_eq!(proc.kind, ProceduralKind::Reference);
                assert!(proc.params.is_empty());
            }
            other => panic!("expected procedural, got {other:?}"),
        }
    }

    #[test]
    fn anonymous_records_are_unsupported() {
        let arena = Bump::new();
        let mut parser = Parser::new("record end", &arena);
        let err = parser.parse_type().unwrap_err();
        assert_eq!(err.kind, delphi_core::ParseErrorKind::Unsupported);
    }
}
