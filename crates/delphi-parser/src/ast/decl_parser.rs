//! Unit and declaration parsing.
//!
//! Grammar (simplified):
//! ```text
//! UNIT      ::= 'unit' NAME ';' 'interface' USES? DECLS 'implementation' USES? DECLS
//!               ('initialization' STMTS)? ('finalization' STMTS)? 'end' '.'
//! DECLS     ::= ('type' TYPEDECL+ | 'const' CONST+ | 'resourcestring' CONST+
//!               | 'var' VAR+ | 'threadvar' VAR+ | ATTRS? ROUTINE)*
//! ROUTINE   ::= 'class'? HEADER (DECLS BLOCK ';')?
//! HEADER    ::= ('procedure' | 'function' | 'constructor' | 'destructor') NAME PARAMS? (':' TYPE)? ';' DIRECTIVE*
//! ```

use super::parser::Parser;
use crate::ast::decl::*;
use crate::ast::node::{Attribute, DottedName, Ident};
use crate::ast::stmt::Block;
use crate::lexer::TokenKind;
use bumpalo::collections::Vec as BVec;
use delphi_core::{ParamFlags, ParseError, ParseErrorKind, RoutineFlags, RoutineKind, Visibility};

/// Where a declaration section appears; decides whether routines have bodies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DeclContext {
    Interface,
    Implementation,
    Local,
}

/// The kind of declaration section currently open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SectionKind {
    Type,
    Const,
    ResourceString,
    Var,
    ThreadVar,
}

/// Running state while parsing a type body.
struct MemberState<'ast> {
    visibility: Visibility,
    /// Inside a `class var` block.
    class_vars: bool,
    /// Attributes waiting for the next member.
    pending: &'ast [Attribute<'ast>],
    allow_fields: bool,
}

/// Routine directives recognised after a heading.
const ROUTINE_DIRECTIVES: &[&str] = &[
    "virtual",
    "dynamic",
    "override",
    "abstract",
    "overload",
    "reintroduce",
    "static",
    "final",
    "inline",
    "forward",
    "external",
    "deprecated",
    "message",
    "stdcall",
    "cdecl",
    "register",
    "pascal",
    "safecall",
    "winapi",
    "platform",
    "experimental",
    "assembler",
    "varargs",
    "export",
    "dispid",
];

impl<'ast> Parser<'ast> {
    // =========================================
    // Units
    // =========================================

    /// Parse a complete `unit`.
    pub fn parse_unit(&mut self) -> Result<&'ast UnitAst<'ast>, ParseError> {
        let start = self.expect(TokenKind::Unit)?.span;
        let name = self.parse_dotted_name()?;
        self.skip_hints();
        self.expect(TokenKind::Semicolon)?;

        let interface_start = self.expect(TokenKind::Interface)?.span;
        let uses = self.parse_uses_clause()?;
        let decls = self.parse_decl_sections(DeclContext::Interface)?;
        let interface = UnitSection {
            uses,
            decls,
            span: interface_start.merge(self.previous_span()),
        };

        let implementation_start = self.expect(TokenKind::Implementation)?.span;
        let uses = self.parse_uses_clause()?;
        let decls = self.parse_decl_sections(DeclContext::Implementation)?;
        let implementation = UnitSection {
            uses,
            decls,
            span: implementation_start.merge(self.previous_span()),
        };

        let mut initialization = None;
        let mut finalization = None;
        if let Some(token) = self.eat(TokenKind::Initialization) {
            let stmts = self.parse_stmt_list()?;
            initialization = Some(Block {
                stmts,
                span: token.span.merge(self.previous_span()),
            });
            if let Some(token) = self.eat(TokenKind::Finalization) {
                let stmts = self.parse_stmt_list()?;
                finalization = Some(Block {
                    stmts,
                    span: token.span.merge(self.previous_span()),
                });
            }
        } else if let Some(token) = self.eat(TokenKind::Begin) {
            // Old-style `begin ... end.` initialization part.
            let stmts = self.parse_stmt_list()?;
            initialization = Some(Block {
                stmts,
                span: token.span.merge(self.previous_span()),
            });
        }

        self.expect(TokenKind::End)?;
        let end = self.expect(TokenKind::Dot)?.span;

        Ok(self.arena.alloc(UnitAst {
            name,
            interface,
            implementation,
            initialization,
            finalization,
            span: start.merge(end),
        }))
    }

    /// Parse an optional `uses A, B in 'B.pas';` clause.
    fn parse_uses_clause(&mut self) -> Result<&'ast [UsesItem<'ast>], ParseError> {
        let mut items = BVec::new_in(self.arena);
        if self.eat(TokenKind::Uses).is_none() {
            return Ok(items.into_bump_slice());
        }
        loop {
            let start = self.peek().span;
            let id = self.node(start);
            let name = self.parse_dotted_name()?;
            let path = if self.eat(TokenKind::In).is_some() {
                let token = self.expect(TokenKind::StringLiteral)?;
                Some(&*self.arena.alloc_str(token.lexeme.trim_matches('\'')))
            } else {
                None
            };
            items.push(UsesItem {
                id,
                name,
                path,
                span: start.merge(self.previous_span()),
            });
            if self.eat(TokenKind::Comma).is_none() {
                break;
            }
        }
        self.expect(TokenKind::Semicolon)?;
        Ok(items.into_bump_slice())
    }

    // =========================================
    // Declaration sections
    // =========================================

    /// Parse declaration sections until a token that cannot continue them.
    fn parse_decl_sections(&mut self, context: DeclContext) -> Result<&'ast [Decl<'ast>], ParseError> {
        let mut decls = BVec::new_in(self.arena);
        let mut section: Option<SectionKind> = None;
        let mut pending: &'ast [Attribute<'ast>] = &[];

        loop {
            let token = *self.peek();
            let result = match token.kind {
                TokenKind::Type => {
                    self.advance();
                    section = Some(SectionKind::Type);
                    continue;
                }
                TokenKind::Const => {
                    self.advance();
                    section = Some(SectionKind::Const);
                    continue;
                }
                TokenKind::ResourceString => {
                    self.advance();
                    section = Some(SectionKind::ResourceString);
                    continue;
                }
                TokenKind::Var => {
                    self.advance();
                    section = Some(SectionKind::Var);
                    continue;
                }
                TokenKind::ThreadVar => {
                    self.advance();
                    section = Some(SectionKind::ThreadVar);
                    continue;
                }
                TokenKind::LeftBracket => self.parse_attributes().map(|attrs| {
                    pending = attrs;
                    None
                }),
                TokenKind::Procedure
                | TokenKind::Function
                | TokenKind::Constructor
                | TokenKind::Destructor => {
                    section = None;
                    let attrs = std::mem::take(&mut pending);
                    self.parse_routine_decl(context, attrs).map(|d| Some(Decl::Routine(d)))
                }
                TokenKind::Class if self.peek_nth(1).kind.starts_routine() => {
                    section = None;
                    let attrs = std::mem::take(&mut pending);
                    self.parse_routine_decl(context, attrs).map(|d| Some(Decl::Routine(d)))
                }
                TokenKind::Identifier if section.is_some() => {
                    let attrs = std::mem::take(&mut pending);
                    match section {
                        Some(SectionKind::Type) => self
                            .parse_type_decl(attrs)
                            .map(|d| Some(Decl::Type(d))),
                        Some(SectionKind::Const) => self
                            .parse_const_decl(attrs, false)
                            .map(|d| Some(Decl::Const(d))),
                        Some(SectionKind::ResourceString) => self
                            .parse_const_decl(attrs, true)
                            .map(|d| Some(Decl::Const(d))),
                        Some(SectionKind::Var) => {
                            self.parse_var_decl(attrs, false).map(|d| Some(Decl::Var(d)))
                        }
                        Some(SectionKind::ThreadVar) => {
                            self.parse_var_decl(attrs, true).map(|d| Some(Decl::Var(d)))
                        }
                        None => Ok(None),
                    }
                }
                TokenKind::Label => Err(self.unsupported("a 'label' section")),
                _ => break,
            };

            match result {
                Ok(Some(decl)) => decls.push(decl),
                Ok(None) => {}
                Err(error) => {
                    self.errors.push(error);
                    self.synchronize();
                }
            }
        }

        if context == DeclContext::Local && !self.check(TokenKind::Begin) {
            if self.check(TokenKind::Asm) {
                return Err(self.unsupported("an 'asm' block"));
            }
            return Err(self.error_expected("'begin'"));
        }
        Ok(decls.into_bump_slice())
    }

    /// Parse `[Attr, Other(1)] [More]`.
    pub(super) fn parse_attributes(&mut self) -> Result<&'ast [Attribute<'ast>], ParseError> {
        let mut attrs = BVec::new_in(self.arena);
        while let Some(open) = self.eat(TokenKind::LeftBracket) {
            loop {
                let name = self.parse_dotted_name()?;
                let args = if self.eat(TokenKind::LeftParen).is_some() {
                    let args = self.parse_expr_list(TokenKind::RightParen)?;
                    self.expect(TokenKind::RightParen)?;
                    args
                } else {
                    &[]
                };
                attrs.push(Attribute {
                    name,
                    args,
                    span: open.span.merge(self.previous_span()),
                });
                if self.eat(TokenKind::Comma).is_none() {
                    break;
                }
            }
            self.expect(TokenKind::RightBracket)?;
        }
        Ok(attrs.into_bump_slice())
    }

    /// Skip hint directives such as `deprecated 'use X'`, `platform`, `experimental`.
    fn skip_hints(&mut self) {
        loop {
            if self.eat_contextual("deprecated").is_some() {
                self.eat(TokenKind::StringLiteral);
            } else if self.eat_contextual("platform").is_none()
                && self.eat_contextual("experimental").is_none()
                && self.eat(TokenKind::Library).is_none()
            {
                return;
            }
        }
    }

    // =========================================
    // Constants and variables
    // =========================================

    /// `X = 5;` or `X: T = value;`
    fn parse_const_decl(
        &mut self,
        attributes: &'ast [Attribute<'ast>],
        is_resource_string: bool,
    ) -> Result<&'ast ConstDecl<'ast>, ParseError> {
        let name = self.expect_ident()?;
        let ty = if self.eat(TokenKind::Colon).is_some() {
            Some(self.parse_type()?)
        } else {
            None
        };
        self.expect(TokenKind::Equal)?;
        let value = if ty.is_some() {
            self.parse_const_value()?
        } else {
            self.parse_expr(0)?
        };
        self.skip_hints();
        let end = self.expect(TokenKind::Semicolon)?.span;
        Ok(self.arena.alloc(ConstDecl {
            name,
            ty,
            value,
            attributes,
            is_resource_string,
            span: name.span.merge(end),
        }))
    }

    /// `A, B: T;` or `X: T = value;`
    fn parse_var_decl(
        &mut self,
        attributes: &'ast [Attribute<'ast>],
        is_thread_var: bool,
    ) -> Result<&'ast VarDecl<'ast>, ParseError> {
        let names = self.parse_ident_list()?;
        self.expect(TokenKind::Colon)?;
        let ty = self.parse_type()?;
        if self.check_contextual("absolute") {
            return Err(self.unsupported("'absolute' variables"));
        }
        let init = if self.eat(TokenKind::Equal).is_some() {
            Some(self.parse_const_value()?)
        } else {
            None
        };
        self.skip_hints();
        let end = self.expect(TokenKind::Semicolon)?.span;
        let start = names.first().map(|n| n.span).unwrap_or(end);
        Ok(self.arena.alloc(VarDecl {
            names,
            ty,
            init,
            attributes,
            is_thread_var,
            span: start.merge(end),
        }))
    }

    /// `A, B, C`
    fn parse_ident_list(&mut self) -> Result<&'ast [Ident<'ast>], ParseError> {
        let mut names = BVec::new_in(self.arena);
        loop {
            names.push(self.expect_ident()?);
            if self.eat(TokenKind::Comma).is_none() {
                break;
            }
        }
        Ok(names.into_bump_slice())
    }

    // =========================================
    // Types
    // =========================================

    /// `TFoo = ...;`
    fn parse_type_decl(
        &mut self,
        attributes: &'ast [Attribute<'ast>],
    ) -> Result<&'ast TypeDecl<'ast>, ParseError> {
        let name = self.expect_ident()?;
        if self.check(TokenKind::Less) {
            return Err(self.unsupported("a generic type declaration"));
        }
        self.expect(TokenKind::Equal)?;

        let def = if self.eat(TokenKind::Type).is_some() {
            TypeDef::Strong(self.parse_type()?)
        } else {
            match self.peek().kind {
                TokenKind::Class if self.peek_nth(1).kind == TokenKind::Semicolon => {
                    self.advance();
                    TypeDef::ClassForward
                }
                TokenKind::Class if self.peek_nth(1).kind == TokenKind::Of => {
                    TypeDef::Type(self.parse_type()?)
                }
                TokenKind::Class => TypeDef::Class(self.parse_class_def()?),
                TokenKind::Interface if self.peek_nth(1).kind == TokenKind::Semicolon => {
                    self.advance();
                    TypeDef::InterfaceForward
                }
                TokenKind::Interface => TypeDef::Interface(self.parse_interface_def()?),
                TokenKind::Record => TypeDef::Record(self.parse_record_def(false)?),
                TokenKind::Packed if self.peek_nth(1).kind == TokenKind::Record => {
                    self.advance();
                    TypeDef::Record(self.parse_record_def(true)?)
                }
                TokenKind::DispInterface => return Err(self.unsupported("'dispinterface'")),
                TokenKind::Object => return Err(self.unsupported("old-style object types")),
                _ => TypeDef::Type(self.parse_type()?),
            }
        };

        self.skip_hints();
        let end = self.expect(TokenKind::Semicolon)?.span;
        Ok(self.arena.alloc(TypeDecl {
            name,
            attributes,
            def,
            span: name.span.merge(end),
        }))
    }

    /// `class [abstract|sealed] [(Ancestors)] members end`
    fn parse_class_def(&mut self) -> Result<&'ast ClassDef<'ast>, ParseError> {
        let start = self.expect(TokenKind::Class)?.span;
        let is_abstract = self.eat_contextual("abstract").is_some();
        let is_sealed = self.eat_contextual("sealed").is_some();
        if self.check_contextual("helper") {
            return Err(self.unsupported("class helpers"));
        }
        let ancestors = self.parse_ancestor_list()?;

        // `TFoo = class(TBase);` has no body.
        let members = if self.check(TokenKind::Semicolon) {
            &[]
        } else {
            let members = self.parse_members(Visibility::Public, true)?;
            self.expect(TokenKind::End)?;
            members
        };

        Ok(self.arena.alloc(ClassDef {
            ancestors,
            members,
            is_abstract,
            is_sealed,
            span: start.merge(self.previous_span()),
        }))
    }

    /// `interface [(Ancestors)] ['{GUID}'] members end`
    fn parse_interface_def(&mut self) -> Result<&'ast InterfaceDef<'ast>, ParseError> {
        let start = self.expect(TokenKind::Interface)?.span;
        let ancestors = self.parse_ancestor_list()?;
        let guid = if self.check(TokenKind::LeftBracket)
            && self.peek_nth(1).kind == TokenKind::StringLiteral
        {
            self.advance();
            let token = self.advance();
            self.expect(TokenKind::RightBracket)?;
            Some(&*self.arena.alloc_str(token.lexeme.trim_matches('\'')))
        } else {
            None
        };
        let members = self.parse_members(Visibility::Public, false)?;
        self.expect(TokenKind::End)?;
        Ok(self.arena.alloc(InterfaceDef {
            ancestors,
            guid,
            members,
            span: start.merge(self.previous_span()),
        }))
    }

    /// `record members end`
    fn parse_record_def(&mut self, is_packed: bool) -> Result<&'ast RecordDef<'ast>, ParseError> {
        let start = self.expect(TokenKind::Record)?.span;
        let members = self.parse_members(Visibility::Public, true)?;
        self.expect(TokenKind::End)?;
        Ok(self.arena.alloc(RecordDef {
            members,
            is_packed,
            span: start.merge(self.previous_span()),
        }))
    }

    /// `(TBase, IFoo)`
    fn parse_ancestor_list(&mut self) -> Result<&'ast [DottedName<'ast>], ParseError> {
        let mut ancestors = BVec::new_in(self.arena);
        if self.eat(TokenKind::LeftParen).is_some() {
            loop {
                ancestors.push(self.parse_dotted_name()?);
                if self.eat(TokenKind::Comma).is_none() {
                    break;
                }
            }
            self.expect(TokenKind::RightParen)?;
        }
        Ok(ancestors.into_bump_slice())
    }

    /// Parse the members of a class, record or interface up to `end`.
    fn parse_members(
        &mut self,
        default_visibility: Visibility,
        allow_fields: bool,
    ) -> Result<&'ast [Member<'ast>], ParseError> {
        let mut members = BVec::new_in(self.arena);
        let mut state = MemberState {
            visibility: default_visibility,
            class_vars: false,
            pending: &[],
            allow_fields,
        };

        while !matches!(self.peek().kind, TokenKind::End | TokenKind::Eof) {
            if let Some(visibility) = self.parse_visibility() {
                state.visibility = visibility;
                state.class_vars = false;
                continue;
            }
            if let Err(error) = self.parse_member(&mut state, &mut members) {
                self.errors.push(error);
                self.synchronize();
            }
        }

        Ok(members.into_bump_slice())
    }

    /// Parse one member (or member-section keyword) into `members`.
    fn parse_member(
        &mut self,
        state: &mut MemberState<'ast>,
        members: &mut BVec<'ast, Member<'ast>>,
    ) -> Result<(), ParseError> {
        let token = *self.peek();
        let visibility = state.visibility;
        match token.kind {
            TokenKind::LeftBracket => {
                state.pending = self.parse_attributes()?;
            }
            kind if kind.starts_routine() => {
                state.class_vars = false;
                let attrs = std::mem::take(&mut state.pending);
                let header = self.parse_routine_header(false, attrs)?;
                members.push(Member {
                    visibility,
                    kind: MemberKind::Method(header),
                });
            }
            TokenKind::Class => {
                self.advance();
                let attrs = std::mem::take(&mut state.pending);
                match self.peek().kind {
                    kind if kind.starts_routine() => {
                        let header = self.parse_routine_header(true, attrs)?;
                        members.push(Member {
                            visibility,
                            kind: MemberKind::Method(header),
                        });
                    }
                    TokenKind::Var => {
                        self.advance();
                        state.class_vars = true;
                    }
                    TokenKind::Property => {
                        let property = self.parse_property(true, attrs)?;
                        members.push(Member {
                            visibility,
                            kind: MemberKind::Property(property),
                        });
                    }
                    _ if self.check_contextual("operator") => {
                        return Err(self.unsupported("operator overloading"));
                    }
                    _ => {
                        return Err(
                            self.error_expected("'procedure', 'function', 'var' or 'property'")
                        );
                    }
                }
            }
            TokenKind::Property => {
                let attrs = std::mem::take(&mut state.pending);
                let property = self.parse_property(false, attrs)?;
                members.push(Member {
                    visibility,
                    kind: MemberKind::Property(property),
                });
            }
            TokenKind::Const => {
                self.advance();
                while self.check(TokenKind::Identifier)
                    && matches!(self.peek_nth(1).kind, TokenKind::Equal | TokenKind::Colon)
                {
                    let decl = self.parse_const_decl(&[], false)?;
                    members.push(Member {
                        visibility,
                        kind: MemberKind::Const(decl),
                    });
                }
            }
            TokenKind::Type => {
                self.advance();
                while self.check(TokenKind::Identifier) && self.peek_nth(1).kind == TokenKind::Equal
                {
                    let decl = self.parse_type_decl(&[])?;
                    members.push(Member {
                        visibility,
                        kind: MemberKind::Type(decl),
                    });
                }
            }
            TokenKind::Var if state.allow_fields => {
                self.advance();
                state.class_vars = false;
            }
            TokenKind::Identifier if state.allow_fields => {
                let attrs = std::mem::take(&mut state.pending);
                let field = self.parse_field(attrs, state.class_vars)?;
                members.push(Member {
                    visibility,
                    kind: MemberKind::Field(field),
                });
            }
            TokenKind::Case if state.allow_fields => {
                return Err(self.unsupported("variant records"));
            }
            _ => {
                return Err(ParseError::new(
                    ParseErrorKind::ExpectedMember,
                    token.span,
                    format!("expected member, found {}", token.kind.description()),
                ));
            }
        }
        Ok(())
    }

    /// Consume a visibility section keyword, if present.
    fn parse_visibility(&mut self) -> Option<Visibility> {
        // A field may legitimately be named `Public`; `Public: Integer` is a field.
        if matches!(
            self.peek_nth(1).kind,
            TokenKind::Colon | TokenKind::Comma
        ) {
            return None;
        }
        let strict = self.check_contextual("strict");
        let word = if strict { self.peek_nth(1) } else { self.peek() };
        let visibility = if word.is_word("private") {
            if strict {
                Visibility::StrictPrivate
            } else {
                Visibility::Private
            }
        } else if word.is_word("protected") {
            if strict {
                Visibility::StrictProtected
            } else {
                Visibility::Protected
            }
        } else if !strict && word.is_word("public") {
            Visibility::Public
        } else if !strict && word.is_word("published") {
            Visibility::Published
        } else {
            return None;
        };
        if strict {
            self.advance();
        }
        self.advance();
        Some(visibility)
    }

    /// `A, B: T;` inside a type body.
    fn parse_field(
        &mut self,
        attributes: &'ast [Attribute<'ast>],
        is_class_var: bool,
    ) -> Result<&'ast FieldDecl<'ast>, ParseError> {
        let names = self.parse_ident_list()?;
        self.expect(TokenKind::Colon)?;
        let ty = self.parse_type()?;
        self.skip_hints();
        // The last field before `end` may omit its semicolon.
        if !self.check(TokenKind::End) {
            self.expect(TokenKind::Semicolon)?;
        }
        let start = names.first().map(|n| n.span).unwrap_or(ty.span);
        Ok(self.arena.alloc(FieldDecl {
            names,
            ty,
            attributes,
            is_class_var,
            span: start.merge(self.previous_span()),
        }))
    }

    /// `property Name[Params]: T read R write W; default;`
    fn parse_property(
        &mut self,
        is_class: bool,
        attributes: &'ast [Attribute<'ast>],
    ) -> Result<&'ast PropertyDecl<'ast>, ParseError> {
        let start = self.expect(TokenKind::Property)?.span;
        let name = self.expect_ident()?;

        let params = if self.eat(TokenKind::LeftBracket).is_some() {
            let params = self.parse_param_groups(TokenKind::RightBracket)?;
            self.expect(TokenKind::RightBracket)?;
            params
        } else {
            &[]
        };
        let ty = if self.eat(TokenKind::Colon).is_some() {
            Some(self.parse_type()?)
        } else {
            None
        };

        let mut read = None;
        let mut write = None;
        let mut index = None;
        loop {
            if self.eat_contextual("read").is_some() {
                read = Some(self.parse_accessor()?);
            } else if self.eat_contextual("write").is_some() {
                write = Some(self.parse_accessor()?);
            } else if self.eat_contextual("index").is_some() {
                index = Some(self.parse_expr(0)?);
            } else if self.eat_contextual("stored").is_some() {
                self.parse_expr(0)?;
            } else if self.check_contextual("default")
                && self.peek_nth(1).kind != TokenKind::Semicolon
            {
                // `default 0` is a storage specifier; a trailing `default;` marks the default property.
                self.advance();
                self.parse_expr(0)?;
            } else if self.eat_contextual("nodefault").is_some() {
                continue;
            } else if self.eat_contextual("implements").is_some() {
                self.parse_dotted_name()?;
            } else {
                break;
            }
        }
        let mut end = self.expect(TokenKind::Semicolon)?.span;

        let is_default =
            self.check_contextual("default") && self.peek_nth(1).kind == TokenKind::Semicolon;
        if is_default {
            self.advance();
            end = self.advance().span;
        }

        Ok(self.arena.alloc(PropertyDecl {
            name,
            params,
            ty,
            read,
            write,
            index,
            is_default,
            is_class,
            attributes,
            span: start.merge(end),
        }))
    }

    /// The field or method named by a `read`/`write` specifier.
    fn parse_accessor(&mut self) -> Result<Ident<'ast>, ParseError> {
        let name = self.expect_ident()?;
        // `read FPoint.X` names a sub-field; only the first field is bound.
        while self.check(TokenKind::Dot) {
            self.advance();
            self.expect_member_name()?;
        }
        Ok(name)
    }

    // =========================================
    // Routines
    // =========================================

    /// Parse a routine declaration; implementations also get their body.
    fn parse_routine_decl(
        &mut self,
        context: DeclContext,
        attributes: &'ast [Attribute<'ast>],
    ) -> Result<&'ast RoutineDecl<'ast>, ParseError> {
        let is_class = self.eat(TokenKind::Class).is_some();
        let header = self.parse_routine_header(is_class, attributes)?;

        let has_body = context != DeclContext::Interface
            && !header
                .flags
                .intersects(RoutineFlags::FORWARD | RoutineFlags::EXTERNAL);
        let body = if has_body {
            let decls = self.parse_decl_sections(DeclContext::Local)?;
            let block = self.parse_block()?;
            self.expect(TokenKind::Semicolon)?;
            Some(&*self.arena.alloc(RoutineBody { decls, block }))
        } else {
            None
        };

        Ok(self.arena.alloc(RoutineDecl { header, body }))
    }

    /// Parse a routine heading with its trailing directives.
    fn parse_routine_header(
        &mut self,
        is_class: bool,
        attributes: &'ast [Attribute<'ast>],
    ) -> Result<&'ast RoutineHeader<'ast>, ParseError> {
        let start = self.peek().span;
        let kind = match self.advance().kind {
            TokenKind::Procedure => RoutineKind::Procedure,
            TokenKind::Function => RoutineKind::Function,
            TokenKind::Constructor => RoutineKind::Constructor,
            TokenKind::Destructor => RoutineKind::Destructor,
            _ => {
                return Err(ParseError::new(
                    ParseErrorKind::ExpectedDeclaration,
                    start,
                    "expected 'procedure', 'function', 'constructor' or 'destructor'",
                ));
            }
        };
        let name = self.parse_dotted_name()?;
        if self.check(TokenKind::Less) {
            return Err(self.unsupported("a generic routine"));
        }
        let params = self.parse_formal_params()?;
        let result = if self.eat(TokenKind::Colon).is_some() {
            Some(self.parse_type()?)
        } else {
            None
        };
        let mut end = self.expect(TokenKind::Semicolon)?.span;

        let mut flags = RoutineFlags::empty();
        if is_class {
            flags |= RoutineFlags::CLASS;
        }
        while let Some(directive) = self.peek_routine_directive() {
            self.advance();
            flags |= self.parse_directive_arguments(&directive)?;
            if let Some(semi) = self.eat(TokenKind::Semicolon) {
                end = semi.span;
            }
        }

        Ok(self.arena.alloc(RoutineHeader {
            kind,
            name,
            params,
            result,
            flags,
            attributes,
            span: start.merge(end),
        }))
    }

    /// The lowercase directive name at the cursor, if it is one.
    fn peek_routine_directive(&self) -> Option<String> {
        let token = self.peek();
        if token.kind == TokenKind::Library {
            return Some("library".to_string());
        }
        if token.kind != TokenKind::Identifier
            || matches!(self.peek_nth(1).kind, TokenKind::Colon | TokenKind::Comma)
        {
            return None;
        }
        let lower = token.lexeme.to_ascii_lowercase();
        ROUTINE_DIRECTIVES
            .contains(&lower.as_str())
            .then_some(lower)
    }

    /// Consume a directive's arguments and map it to its flag.
    fn parse_directive_arguments(&mut self, directive: &str) -> Result<RoutineFlags, ParseError> {
        Ok(match directive {
            "virtual" => RoutineFlags::VIRTUAL,
            "dynamic" => RoutineFlags::DYNAMIC,
            "override" => RoutineFlags::OVERRIDE,
            "abstract" => RoutineFlags::ABSTRACT,
            "overload" => RoutineFlags::OVERLOAD,
            "reintroduce" => RoutineFlags::REINTRODUCE,
            "static" => RoutineFlags::STATIC,
            "final" => RoutineFlags::FINAL,
            "inline" => RoutineFlags::INLINE,
            "forward" => RoutineFlags::FORWARD,
            "external" => {
                // `external 'lib' name 'Sym' index 3`
                if !self.check(TokenKind::Semicolon) && !self.check_contextual("name") {
                    self.parse_expr(0)?;
                }
                while self.eat_contextual("name").is_some() || self.eat_contextual("index").is_some()
                {
                    self.parse_expr(0)?;
                }
                RoutineFlags::EXTERNAL
            }
            "deprecated" => {
                self.eat(TokenKind::StringLiteral);
                RoutineFlags::DEPRECATED
            }
            "message" => {
                self.parse_expr(0)?;
                RoutineFlags::MESSAGE
            }
            "dispid" => {
                self.parse_expr(0)?;
                RoutineFlags::empty()
            }
            _ => RoutineFlags::empty(),
        })
    }

    /// Parse an optional `( groups )` parameter list.
    pub(super) fn parse_formal_params(&mut self) -> Result<&'ast [ParamGroup<'ast>], ParseError> {
        if self.eat(TokenKind::LeftParen).is_none() {
            return Ok(&[]);
        }
        let groups = self.parse_param_groups(TokenKind::RightParen)?;
        self.expect(TokenKind::RightParen)?;
        Ok(groups)
    }

    /// `;`-separated parameter groups up to (not including) `close`.
    fn parse_param_groups(&mut self, close: TokenKind) -> Result<&'ast [ParamGroup<'ast>], ParseError> {
        let mut groups = BVec::new_in(self.arena);
        if self.check(close) {
            return Ok(groups.into_bump_slice());
        }
        loop {
            groups.push(self.parse_param_group()?);
            if self.eat(TokenKind::Semicolon).is_none() {
                break;
            }
        }
        Ok(groups.into_bump_slice())
    }

    /// `[Attr] const A, B: T = Default`
    fn parse_param_group(&mut self) -> Result<ParamGroup<'ast>, ParseError> {
        let attributes = self.parse_attributes()?;
        let mut flags = ParamFlags::empty();
        if self.eat(TokenKind::Const).is_some() {
            flags |= ParamFlags::CONST;
        } else if self.eat(TokenKind::Var).is_some() {
            flags |= ParamFlags::VAR;
        } else if self.peek_nth(1).kind == TokenKind::Identifier {
            if self.eat_contextual("out").is_some() {
                flags |= ParamFlags::OUT;
            } else if self.eat_contextual("constref").is_some() {
                flags |= ParamFlags::CONST;
            }
        }

        let names = self.parse_ident_list()?;
        let ty = if self.eat(TokenKind::Colon).is_some() {
            Some(self.parse_type()?)
        } else {
            None
        };
        let default = if self.eat(TokenKind::Equal).is_some() {
            flags |= ParamFlags::HAS_DEFAULT;
            Some(self.parse_expr(0)?)
        } else {
            None
        };
        Ok(ParamGroup {
            names,
            ty,
            flags,
            default,
            attributes,
        })
    }
}

impl TokenKind {
    /// Whether this token starts a routine heading.
    pub(crate) fn starts_routine(self) -> bool {
        matches!(
            self,
            TokenKind::Procedure | TokenKind::Function | TokenKind::Constructor | TokenKind::Destructor
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::types::TypeExprKind;
    use bumpalo::Bump;

    fn parse_ok<'a>(source: &str, arena: &'a Bump) -> &'a UnitAst<'a> {
        match Parser::parse(source, arena) {
            Ok(unit) => unit.ast,
            Err(errors) => panic!("unexpected errors: {errors}"),
        }
    }

    #[test]
    fn minimal_unit() {
        let arena = Bump::new();
        let unit = parse_ok("unit A.B; interface implementation end.", &arena);
        assert_eq!(unit.name.to_dotted(), "A.B");
        assert!(unit.interface.decls.is_empty());
        assert!(unit.initialization.is_none());
    }

    #[test]
    fn uses_clauses() {
        let arena = Bump::new();
        let unit = parse_ok(
            "unit U; interface uses SysUtils, Foo in 'src\\Foo.pas'; implementation uses Bar; end.",
            &arena,
        );
        assert_eq!(unit.interface.uses.len(), 2);
        assert_eq!(unit.interface.uses[1].name.to_dotted(), "Foo");
        assert_eq!(unit.interface.uses[1].path, Some("src\\Foo.pas"));
        assert_eq!(unit.implementation.uses.len(), 1);
    }

    #[test]
    fn sections_and_items() {
        let arena = Bump::new();
        let unit = parse_ok(
            r#"unit U;
interface
const
  Max = 10;
  Origin: TPoint = (X: 0; Y: 0);
resourcestring
  SHello = 'Hello';
type
  TPoint = record X, Y: Integer; end;
  TIds = array of Integer;
  THandle = type Integer;
var
  A, B: Integer;
  C: Integer = 5;
threadvar
  T: Integer;
implementation
end."#,
            &arena,
        );
        let decls = unit.interface.decls;
        assert_eq!(decls.len(), 9);
        match decls[2] {
            Decl::Const(c) => assert!(c.is_resource_string),
            other => panic!("expected const, got {other:?}"),
        }
        match decls[5] {
            Decl::Type(t) => assert!(matches!(t.def, TypeDef::Strong(_))),
            other => panic!("expected type, got {other:?}"),
        }
        match decls[6] {
            Decl::Var(v) => assert_eq!(v.names.len(), 2),
            other => panic!("expected var, got {other:?}"),
        }
        match decls[8] {
            Decl::Var(v) => assert!(v.is_thread_var),
            other => panic!("expected var, got {other:?}"),
        }
    }

    #[test]
    fn class_with_members() {
        let arena = Bump::new();
        let unit = parse_ok(
            r#"unit U;
interface
type
  TBase = class;
  TShape = class abstract(TBase, IShape)
  strict private
    FName: string;
  protected
    procedure Draw; virtual; abstract;
  public
    constructor Create(const AName: string; Scale: Double = 1.0);
    class function Count: Integer; static;
    function Area: Double; overload;
    property Name: string read FName write FName;
    property Items[Index: Integer]: TObject read GetItem; default;
  end;
  TMeta = class of TShape;
implementation
end."#,
            &arena,
        );
        let decls = unit.interface.decls;
        assert!(matches!(
            decls[0],
            Decl::Type(TypeDecl { def: TypeDef::ClassForward, .. })
        ));
        let Decl::Type(TypeDecl { def: TypeDef::Class(class), .. }) = decls[1] else {
            panic!("expected class, got {:?}", decls[1]);
        };
        assert!(class.is_abstract);
        assert_eq!(class.ancestors.len(), 2);
        assert_eq!(class.members.len(), 7);
        assert_eq!(class.members[0].visibility, Visibility::StrictPrivate);

        match class.members[1].kind {
            MemberKind::Method(header) => {
                assert!(header.flags.contains(RoutineFlags::VIRTUAL | RoutineFlags::ABSTRACT));
                assert_eq!(class.members[1].visibility, Visibility::Protected);
            }
            other => panic!("expected method, got {other:?}"),
        }
        match class.members[2].kind {
            MemberKind::Method(header) => {
                assert_eq!(header.kind, RoutineKind::Constructor);
                assert_eq!(header.param_count(), 2);
                assert!(header.params[1].flags.contains(ParamFlags::HAS_DEFAULT));
                assert!(header.params[0].flags.contains(ParamFlags::CONST));
            }
            other => panic!("expected constructor, got {other:?}"),
        }
        match class.members[3].kind {
            MemberKind::Method(header) => {
                assert!(header.flags.contains(RoutineFlags::CLASS | RoutineFlags::STATIC));
            }
            other => panic!("expected class function, got {other:?}"),
        }
        match class.members[6].kind {
            MemberKind::Property(prop) => {
                assert!(prop.is_default);
                assert_eq!(prop.params.len(), 1);
                assert!(prop.write.is_none());
            }
            other => panic!("expected property, got {other:?}"),
        }
        match decls[2] {
            Decl::Type(TypeDecl { def: TypeDef::Type(ty), .. }) => {
                assert!(matches!(ty.kind, TypeExprKind::ClassOf(_)));
            }
            other => panic!("expected class reference, got {other:?}"),
        }
    }

    #[test]
    fn interfaces_with_guid() {
        let arena = Bump::new();
        let unit = parse_ok(
            r#"unit U;
interface
type
  IShape = interface(IInterface)
    ['{8A1F2C3D-0000-0000-0000-000000000001}']
    function Area: Double;
  end;
implementation
end."#,
            &arena,
        );
        match unit.interface.decls[0] {
            Decl::Type(TypeDecl { def: TypeDef::Interface(intf), .. }) => {
                assert!(intf.guid.is_some());
                assert_eq!(intf.members.len(), 1);
            }
            other => panic!("expected interface, got {other:?}"),
        }
    }

    #[test]
    fn routine_bodies_in_implementation() {
        let arena = Bump::new();
        let unit = parse_ok(
            r#"unit U;
interface
procedure Run(var X: Integer; out Y: Integer);
implementation
procedure Helper; forward;
procedure Run(var X: Integer; out Y: Integer);
var
  I: Integer;
  procedure Nested;
  begin
  end;
begin
  for I := 1 to 10 do X := X + I;
  Y := X;
end;
procedure Helper;
begin
end;
initialization
  Helper;
finalization
end."#,
            &arena,
        );
        match unit.interface.decls[0] {
            Decl::Routine(r) => {
                assert!(r.body.is_none());
                assert!(r.header.params[0].flags.contains(ParamFlags::VAR));
                assert!(r.header.params[1].flags.contains(ParamFlags::OUT));
            }
            other => panic!("expected routine, got {other:?}"),
        }
        let decls = unit.implementation.decls;
        assert_eq!(decls.len(), 3);
        match decls[0] {
            Decl::Routine(r) => assert!(r.body.is_none()),
            other => panic!("expected forward routine, got {other:?}"),
        }
        match decls[1] {
            Decl::Routine(r) => {
                let body = r.body.unwrap();
                assert_eq!(body.decls.len(), 2);
                assert_eq!(body.block.stmts.len(), 2);
            }
            other => panic!("expected routine, got {other:?}"),
        }
        assert_eq!(unit.initialization.unwrap().stmts.len(), 1);
        assert!(unit.finalization.is_some());
    }

    #[test]
    fn method_implementations_use_dotted_names() {
        let arena = Bump::new();
        let unit = parse_ok(
            r#"unit U;
interface
implementation
constructor TShape.Create;
begin
  inherited Create;
end;
end."#,
            &arena,
        );
        match unit.implementation.decls[0] {
            Decl::Routine(r) => assert_eq!(r.header.name.to_dotted(), "TShape.Create"),
            other => panic!("expected routine, got {other:?}"),
        }
    }

    #[test]
    fn field_named_like_a_directive() {
        let arena = Bump::new();
        let unit = parse_ok(
            r#"unit U;
interface
type
  TRec = record
    procedure Clear;
    Message: string;
    Public: Boolean
  end;
implementation
end."#,
            &arena,
        );
        match unit.interface.decls[0] {
            Decl::Type(TypeDecl { def: TypeDef::Record(rec), .. }) => {
                assert_eq!(rec.members.len(), 3);
                assert!(matches!(rec.members[1].kind, MemberKind::Field(_)));
                assert!(matches!(rec.members[2].kind, MemberKind::Field(_)));
            }
            other => panic!("expected record, got {other:?}"),
        }
    }

    #[test]
    fn recovers_and_reports_every_error() {
        let arena = Bump::new();
        let errors = Parser::parse(
            r#"unit U;
interface
var
  A: ;
  B: Integer;
  C Integer;
implementation
end."#,
            &arena,
        )
        .unwrap_err();
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn unsupported_constructs_are_reported() {
        let arena = Bump::new();
        let errors = Parser::parse(
            r#"unit U;
interface
type
  TList<T> = array of T;
  TVariant = record case Integer of 0: (A: Integer); end;
implementation
end."#,
            &arena,
        )
        .unwrap_err();
        assert!(errors.iter().all(|e| e.kind == ParseErrorKind::Unsupported));
        assert!(!errors.is_empty());
    }
}
