//! Statement parsing functions for Delphi.
//!
//! Implements parsing of all supported statement types including control
//! flow, loops, `with` and exception handling. Statements are separated by
//! `;`, which is optional before a closing `end`, `until`, `except`,
//! `finally` or `else`.

use super::parser::Parser;
use crate::ast::expr::Expr;
use crate::ast::stmt::*;
use crate::lexer::TokenKind;
use bumpalo::collections::Vec as BVec;
use delphi_core::ParseError;

impl<'ast> Parser<'ast> {
    /// Parse a statement.
    ///
    /// This is the main entry point for statement parsing and dispatches
    /// to specific statement parsers based on the current token.
    pub fn parse_statement(&mut self) -> Result<Stmt<'ast>, ParseError> {
        let token = *self.peek();

        match token.kind {
            TokenKind::Begin => {
                let block = self.parse_block()?;
                Ok(Stmt {
                    kind: StmtKind::Compound(block),
                    span: block.span,
                })
            }
            TokenKind::If => self.parse_if(),
            TokenKind::Case => self.parse_case(),
            TokenKind::While => self.parse_while(),
            TokenKind::Repeat => self.parse_repeat(),
            TokenKind::For => self.parse_for(),
            TokenKind::With => self.parse_with(),
            TokenKind::Try => self.parse_try(),
            TokenKind::Raise => self.parse_raise(),

            // Empty statement: nothing before the separator or terminator.
            TokenKind::Semicolon
            | TokenKind::End
            | TokenKind::Else
            | TokenKind::Until
            | TokenKind::Except
            | TokenKind::Finally => Ok(Stmt {
                kind: StmtKind::Empty,
                span: token.span.start(),
            }),

            TokenKind::Goto | TokenKind::Label => Err(self.unsupported("'goto' and labels")),
            TokenKind::Asm => Err(self.unsupported("an 'asm' block")),
            TokenKind::Var | TokenKind::Const => {
                Err(self.unsupported("an inline variable declaration"))
            }

            _ => self.parse_simple_statement(),
        }
    }

    /// Parse an assignment or an expression statement.
    ///
    /// Grammar: `EXPR (':=' EXPR)?`
    fn parse_simple_statement(&mut self) -> Result<Stmt<'ast>, ParseError> {
        let target = self.parse_expr(0)?;
        if self.eat(TokenKind::Assign).is_some() {
            let value = self.parse_expr(0)?;
            return Ok(Stmt {
                kind: StmtKind::Assign { target, value },
                span: target.span.merge(value.span),
            });
        }
        Ok(Stmt {
            kind: StmtKind::Expr(target),
            span: target.span,
        })
    }

    /// Parse `begin ... end`.
    pub fn parse_block(&mut self) -> Result<Block<'ast>, ParseError> {
        let start = self.expect(TokenKind::Begin)?.span;
        let stmts = self.parse_stmt_list()?;
        let end = self.expect(TokenKind::End)?.span;
        Ok(Block {
            stmts,
            span: start.merge(end),
        })
    }

    /// Parse `;`-separated statements up to a terminator, recovering from
    /// errors at statement boundaries.
    pub(super) fn parse_stmt_list(&mut self) -> Result<&'ast [Stmt<'ast>], ParseError> {
        let mut stmts = BVec::new_in(self.arena);
        loop {
            if self.at_stmt_terminator() {
                break;
            }
            match self.parse_statement() {
                Ok(stmt) => {
                    if !matches!(stmt.kind, StmtKind::Empty) {
                        stmts.push(stmt);
                    }
                }
                Err(error) => {
                    self.errors.push(error);
                    self.synchronize_statement();
                    continue;
                }
            }
            if self.eat(TokenKind::Semicolon).is_none() {
                break;
            }
        }
        Ok(stmts.into_bump_slice())
    }

    /// Skip past the next `;`, stopping early at a statement-list terminator.
    fn synchronize_statement(&mut self) {
        while !self.at_stmt_terminator() {
            if self.advance().kind == TokenKind::Semicolon {
                return;
            }
        }
    }

    fn at_stmt_terminator(&self) -> bool {
        matches!(
            self.peek().kind,
            TokenKind::End
                | TokenKind::Until
                | TokenKind::Except
                | TokenKind::Finally
                | TokenKind::Else
                | TokenKind::Eof
                | TokenKind::Initialization
                | TokenKind::Finalization
        )
    }

    /// Allocate a statement in the arena.
    fn alloc_stmt(&self, stmt: Stmt<'ast>) -> &'ast Stmt<'ast> {
        self.arena.alloc(stmt)
    }

    /// Parse `if C then S [else S]`.
    pub fn parse_if(&mut self) -> Result<Stmt<'ast>, ParseError> {
        let start = self.expect(TokenKind::If)?.span;
        let condition = self.parse_expr(0)?;
        self.expect(TokenKind::Then)?;
        let then_branch = self.parse_statement()?;
        let then_branch = self.alloc_stmt(then_branch);
        let else_branch = if self.eat(TokenKind::Else).is_some() {
            let stmt = self.parse_statement()?;
            Some(self.alloc_stmt(stmt))
        } else {
            None
        };
        Ok(Stmt {
            kind: StmtKind::If {
                condition,
                then_branch,
                else_branch,
            },
            span: start.merge(self.previous_span()),
        })
    }

    /// Parse `case X of labels: S; ... [else S...] end`.
    pub fn parse_case(&mut self) -> Result<Stmt<'ast>, ParseError> {
        let start = self.expect(TokenKind::Case)?.span;
        let selector = self.parse_expr(0)?;
        self.expect(TokenKind::Of)?;

        let mut arms = BVec::new_in(self.arena);
        while !self.check(TokenKind::Else) && !self.check(TokenKind::End) && !self.is_eof() {
            let mut labels = BVec::new_in(self.arena);
            loop {
                let low = self.parse_expr(0)?;
                let high = if self.eat(TokenKind::DotDot).is_some() {
                    Some(self.parse_expr(0)?)
                } else {
                    None
                };
                labels.push(CaseLabel { low, high });
                if self.eat(TokenKind::Comma).is_none() {
                    break;
                }
            }
            self.expect(TokenKind::Colon)?;
            let body = self.parse_statement()?;
            arms.push(CaseArm {
                labels: labels.into_bump_slice(),
                body: self.alloc_stmt(body),
            });
            if self.eat(TokenKind::Semicolon).is_none() {
                break;
            }
        }

        let else_branch = if self.eat(TokenKind::Else).is_some() {
            Some(self.parse_stmt_list()?)
        } else {
            None
        };
        let end = self.expect(TokenKind::End)?.span;

        let case = self.arena.alloc(CaseStmt {
            selector,
            arms: arms.into_bump_slice(),
            else_branch,
        });
        Ok(Stmt {
            kind: StmtKind::Case(case),
            span: start.merge(end),
        })
    }

    /// Parse `while C do S`.
    pub fn parse_while(&mut self) -> Result<Stmt<'ast>, ParseError> {
        let start = self.expect(TokenKind::While)?.span;
        let condition = self.parse_expr(0)?;
        self.expect(TokenKind::Do)?;
        let body = self.parse_statement()?;
        Ok(Stmt {
            kind: StmtKind::While {
                condition,
                body: self.alloc_stmt(body),
            },
            span: start.merge(self.previous_span()),
        })
    }

    /// Parse `repeat S... until C`.
    pub fn parse_repeat(&mut self) -> Result<Stmt<'ast>, ParseError> {
        let start = self.expect(TokenKind::Repeat)?.span;
        let body = self.parse_stmt_list()?;
        self.expect(TokenKind::Until)?;
        let condition = self.parse_expr(0)?;
        Ok(Stmt {
            kind: StmtKind::Repeat { body, condition },
            span: start.merge(condition.span),
        })
    }

    /// Parse `for [var] I [: T] := A to|downto B do S` or `for [var] X in C do S`.
    pub fn parse_for(&mut self) -> Result<Stmt<'ast>, ParseError> {
        let start = self.expect(TokenKind::For)?.span;
        let is_inline = self.eat(TokenKind::Var).is_some();
        let name = self.expect_ident()?;
        let ty = if is_inline && self.eat(TokenKind::Colon).is_some() {
            Some(self.parse_type()?)
        } else {
            None
        };
        let var = LoopVar {
            name,
            is_inline,
            ty,
        };

        if self.eat(TokenKind::In).is_some() {
            let collection = self.parse_expr(0)?;
            self.expect(TokenKind::Do)?;
            let body = self.parse_statement()?;
            let for_in = self.arena.alloc(ForInStmt {
                var,
                collection,
                body: self.alloc_stmt(body),
            });
            return Ok(Stmt {
                kind: StmtKind::ForIn(for_in),
                span: start.merge(self.previous_span()),
            });
        }

        self.expect(TokenKind::Assign)?;
        let from = self.parse_expr(0)?;
        let is_downto = if self.eat(TokenKind::Downto).is_some() {
            true
        } else {
            self.expect(TokenKind::To)?;
            false
        };
        let to = self.parse_expr(0)?;
        self.expect(TokenKind::Do)?;
        let body = self.parse_statement()?;
        let for_stmt = self.arena.alloc(ForStmt {
            var,
            from,
            to,
            is_downto,
            body: self.alloc_stmt(body),
        });
        Ok(Stmt {
            kind: StmtKind::For(for_stmt),
            span: start.merge(self.previous_span()),
        })
    }

    /// Parse `with A, B do S`.
    pub fn parse_with(&mut self) -> Result<Stmt<'ast>, ParseError> {
        let start = self.expect(TokenKind::With)?.span;
        let mut subjects = BVec::new_in(self.arena);
        loop {
            subjects.push(*self.parse_expr(0)?);
            if self.eat(TokenKind::Comma).is_none() {
                break;
            }
        }
        self.expect(TokenKind::Do)?;
        let body = self.parse_statement()?;
        Ok(Stmt {
            kind: StmtKind::With {
                subjects: subjects.into_bump_slice(),
                body: self.alloc_stmt(body),
            },
            span: start.merge(self.previous_span()),
        })
    }

    /// Parse `try ... except ... end` or `try ... finally ... end`.
    pub fn parse_try(&mut self) -> Result<Stmt<'ast>, ParseError> {
        let start = self.expect(TokenKind::Try)?.span;
        let body = self.parse_stmt_list()?;

        let handler = if self.eat(TokenKind::Finally).is_some() {
            TryHandler::Finally(self.parse_stmt_list()?)
        } else {
            self.expect(TokenKind::Except)?;
            self.parse_except_handlers()?
        };
        let end = self.expect(TokenKind::End)?.span;

        let try_stmt = self.arena.alloc(TryStmt { body, handler });
        Ok(Stmt {
            kind: StmtKind::Try(try_stmt),
            span: start.merge(end),
        })
    }

    /// The part of an `except` block before `end`.
    fn parse_except_handlers(&mut self) -> Result<TryHandler<'ast>, ParseError> {
        if !self.check_contextual("on") {
            let stmts = self.parse_stmt_list()?;
            return Ok(TryHandler::Except {
                handlers: &[],
                stmts,
                else_branch: None,
            });
        }

        let mut handlers = BVec::new_in(self.arena);
        while let Some(on) = self.eat_contextual("on") {
            let var = if self.peek_nth(1).kind == TokenKind::Colon {
                let var = self.expect_ident()?;
                self.expect(TokenKind::Colon)?;
                Some(var)
            } else {
                None
            };
            let ty = self.parse_type()?;
            self.expect(TokenKind::Do)?;
            let body = self.parse_statement()?;
            handlers.push(ExceptHandler {
                var,
                ty,
                body: self.alloc_stmt(body),
                span: on.span.merge(self.previous_span()),
            });
            if self.eat(TokenKind::Semicolon).is_none() {
                break;
            }
        }

        let else_branch = if self.eat(TokenKind::Else).is_some() {
            Some(self.parse_stmt_list()?)
        } else {
            None
        };
        Ok(TryHandler::Except {
            handlers: handlers.into_bump_slice(),
            stmts: &[],
            else_branch,
        })
    }

    /// Parse `raise [E [at Addr]]`.
    pub fn parse_raise(&mut self) -> Result<Stmt<'ast>, ParseError> {
        let start = self.expect(TokenKind::Raise)?.span;
        let mut span = start;
        let exception: Option<&'ast Expr<'ast>> =
            if self.check(TokenKind::Semicolon) || self.at_stmt_terminator() {
                None
            } else {
                let expr = self.parse_expr(0)?;
                span = span.merge(expr.span);
                Some(expr)
            };
        let at = if exception.is_some() && self.eat_contextual("at").is_some() {
            let expr = self.parse_expr(0)?;
            span = span.merge(expr.span);
            Some(expr)
        } else {
            None
        };
        Ok(Stmt {
            kind: StmtKind::Raise { exception, at },
            span,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::expr::ExprKind;
    use bumpalo::Bump;

    fn parse<'a>(source: &str, arena: &'a Bump) -> Stmt<'a> {
        let mut parser = Parser::new(source, arena);
        let stmt = parser.parse_statement().unwrap();
        assert!(parser.errors().is_empty(), "{}", parser.errors());
        stmt
    }

    #[test]
    fn assignment_and_call() {
        let arena = Bump::new();
        assert!(matches!(parse("X := 42", &arena).kind, StmtKind::Assign { .. }));
        match parse("Foo.Bar(1)", &arena).kind {
            StmtKind::Expr(expr) => assert!(matches!(expr.kind, ExprKind::Call { .. })),
            other => panic!("expected expression statement, got {other:?}"),
        }
    }

    #[test]
    fn compound_skips_empty_statements() {
        let arena = Bump::new();
        match parse("begin ; X := 1; ; Y := 2; end", &arena).kind {
            StmtKind::Compound(block) => assert_eq!(block.stmts.len(), 2),
            other => panic!("expected compound, got {other:?}"),
        }
    }

    #[test]
    fn if_else_binds_to_nearest_if() {
        let arena = Bump::new();
        match parse("if A then if B then X := 1 else X := 2", &arena).kind {
            StmtKind::If {
                then_branch,
                else_branch,
                ..
            } => {
                assert!(else_branch.is_none());
                assert!(matches!(
                    then_branch.kind,
                    StmtKind::If {
                        else_branch: Some(_),
                        ..
                    }
                ));
            }
            other => panic!("expected if, got {other:?}"),
        }
    }

    #[test]
    fn case_with_ranges_and_else() {
        let arena = Bump::new();
        let source = "case X of 1, 2: A; 3..5: B; else C; D end";
        match parse(source, &arena).kind {
            StmtKind::Case(case) => {
                assert_eq!(case.arms.len(), 2);
                assert_eq!(case.arms[0].labels.len(), 2);
                assert!(case.arms[1].labels[0].high.is_some());
                assert_eq!(case.else_branch.map(|s| s.len()), Some(2));
            }
            other => panic!("expected case, got {other:?}"),
        }
    }

    #[test]
    fn loops() {
        let arena = Bump::new();
        assert!(matches!(parse("while A do B", &arena).kind, StmtKind::While { .. }));
        match parse("repeat A; B until C", &arena).kind {
            StmtKind::Repeat { body, .. } => assert_eq!(body.len(), 2),
            other => panic!("expected repeat, got {other:?}"),
        }
        match parse("for I := 10 downto 1 do X", &arena).kind {
            StmtKind::For(f) => {
                assert!(f.is_downto);
                assert!(!f.var.is_inline);
            }
            other => panic!("expected for, got {other:?}"),
        }
        match parse("for var S: string in List do X", &arena).kind {
            StmtKind::ForIn(f) => {
                assert!(f.var.is_inline);
                assert!(f.var.ty.is_some());
            }
            other => panic!("expected for-in, got {other:?}"),
        }
    }

    #[test]
    fn try_forms() {
        let arena = Bump::new();
        match parse("try A finally B end", &arena).kind {
            StmtKind::Try(t) => assert!(matches!(t.handler, TryHandler::Finally(s) if s.len() == 1)),
            other => panic!("expected try, got {other:?}"),
        }
        let source = "try A except on E: EFoo do B; on EBar do C else D end";
        match parse(source, &arena).kind {
            StmtKind::Try(t) => match t.handler {
                TryHandler::Except {
                    handlers,
                    else_branch,
                    ..
                } => {
                    assert_eq!(handlers.len(), 2);
                    assert!(handlers[0].var.is_some());
                    assert!(handlers[1].var.is_none());
                    assert!(else_branch.is_some());
                }
                other => panic!("expected except, got {other:?}"),
            },
            other => panic!("expected try, got {other:?}"),
        }
    }

    #[test]
    fn raise_forms() {
        let arena = Bump::new();
        assert!(matches!(
            parse("raise", &arena).kind,
            StmtKind::Raise {
                exception: None,
                at: None
            }
        ));
        assert!(matches!(
            parse("raise E at Addr", &arena).kind,
            StmtKind::Raise {
                exception: Some(_),
                at: Some(_)
            }
        ));
    }

    #[test]
    fn errors_recover_at_semicolon() {
        let arena = Bump::new();
        let mut parser = Parser::new("begin X := ; Y := 2 end", &arena);
        let block = parser.parse_block().unwrap();
        assert_eq!(parser.errors().len(), 1);
        assert_eq!(block.stmts.len(), 1);
    }

    #[test]
    fn with_multiple_subjects() {
        let arena = Bump::new();
        match parse("with A, B.C do X := 1", &arena).kind {
            StmtKind::With { subjects, .. } => assert_eq!(subjects.len(), 2),
            other => panic!("expected with, got {other:?}"),
        }
    }
}
