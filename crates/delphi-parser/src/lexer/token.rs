//! Token types and definitions for the Delphi lexer.
//!
//! Reserved words are keywords; directives such as `virtual`, `override`,
//! `private` or `read` are ordinary identifiers that the parser recognises
//! by context.

use delphi_core::Span;
use std::fmt;

/// A token from the source code.
///
/// The `'ast` lifetime refers to the arena where the lexeme string is allocated.
#[derive(Clone, Copy, PartialEq)]
pub struct Token<'ast> {
    /// The type of token.
    pub kind: TokenKind,
    /// The source text of this token (allocated in arena).
    pub lexeme: &'ast str,
    /// Location in source.
    pub span: Span,
}

impl<'ast> Token<'ast> {
    /// Create a new token.
    #[inline]
    pub fn new(kind: TokenKind, lexeme: &'ast str, span: Span) -> Self {
        Self { kind, lexeme, span }
    }

    /// Whether this token is the identifier `word`, ignoring case.
    #[inline]
    pub fn is_word(&self, word: &str) -> bool {
        self.kind == TokenKind::Identifier && self.lexeme.eq_ignore_ascii_case(word)
    }
}

impl fmt::Debug for Token<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}({:?} @ {:?})", self.kind, self.lexeme, self.span)
    }
}

/// All token types of the supported Delphi surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    // =========================================
    // Literals
    // =========================================
    /// Decimal integer: `42`
    IntLiteral,
    /// Hexadecimal integer: `$FF`
    HexLiteral,
    /// Real literal: `1.5`, `2E10`
    RealLiteral,
    /// Quoted string and/or character codes: `'it''s'`, `#13#10`, `'a'#9'b'`
    StringLiteral,

    // =========================================
    // Identifiers
    // =========================================
    Identifier,

    // =========================================
    // Reserved words
    // =========================================
    And,
    Array,
    As,
    Asm,
    Begin,
    Case,
    Class,
    Const,
    Constructor,
    Destructor,
    DispInterface,
    Div,
    Do,
    Downto,
    Else,
    End,
    Except,
    File,
    Finalization,
    Finally,
    For,
    Function,
    Goto,
    If,
    Implementation,
    In,
    Inherited,
    Initialization,
    Interface,
    Is,
    Label,
    Library,
    Mod,
    Nil,
    Not,
    Object,
    Of,
    Or,
    Packed,
    Procedure,
    Program,
    Property,
    Raise,
    Record,
    Repeat,
    ResourceString,
    Set,
    Shl,
    Shr,
    String,
    Then,
    ThreadVar,
    To,
    Try,
    Type,
    Unit,
    Until,
    Uses,
    Var,
    While,
    With,
    Xor,

    // =========================================
    // Operators and punctuation
    // =========================================
    /// `+`
    Plus,
    /// `-`
    Minus,
    /// `*`
    Star,
    /// `/`
    Slash,
    /// `=`
    Equal,
    /// `<>`
    NotEqual,
    /// `<`
    Less,
    /// `>`
    Greater,
    /// `<=`
    LessEqual,
    /// `>=`
    GreaterEqual,
    /// `:=`
    Assign,
    /// `.`
    Dot,
    /// `..`
    DotDot,
    /// `,`
    Comma,
    /// `;`
    Semicolon,
    /// `:`
    Colon,
    /// `(`
    LeftParen,
    /// `)`
    RightParen,
    /// `[`
    LeftBracket,
    /// `]`
    RightBracket,
    /// `^`
    Caret,
    /// `@`
    At,

    // =========================================
    // Special
    // =========================================
    /// End of file
    Eof,
    /// Lexer error (unrecognized input)
    Error,
}

impl TokenKind {
    /// Check if this token kind is a reserved word.
    pub fn is_keyword(self) -> bool {
        lookup_keyword(self.description().trim_matches('\'')) == Some(self)
    }

    /// Check if this token kind is a literal.
    pub fn is_literal(self) -> bool {
        use TokenKind::*;
        matches!(
            self,
            IntLiteral | HexLiteral | RealLiteral | StringLiteral | Nil
        )
    }

    /// Human-readable description used in error messages.
    pub fn description(self) -> &'static str {
        use TokenKind::*;
        match self {
            IntLiteral => "integer literal",
            HexLiteral => "hex literal",
            RealLiteral => "real literal",
            StringLiteral => "string literal",
            Identifier => "identifier",
            And => "'and'",
            Array => "'array'",
            As => "'as'",
            Asm => "'asm'",
            Begin => "'begin'",
            Case => "'case'",
            Class => "'class'",
            Const => "'const'",
            Constructor => "'constructor'",
            Destructor => "'destructor'",
            DispInterface => "'dispinterface'",
            Div => "'div'",
            Do => "'do'",
            Downto => "'downto'",
            Else => "'else'",
            End => "'end'",
            Except => "'except'",
            File => "'file'",
            Finalization => "'finalization'",
            Finally => "'finally'",
            For => "'for'",
            Function => "'function'",
            Goto => "'goto'",
            If => "'if'",
            Implementation => "'implementation'",
            In => "'in'",
            Inherited => "'inherited'",
            Initialization => "'initialization'",
            Interface => "'interface'",
            Is => "'is'",
            Label => "'label'",
            Library => "'library'",
            Mod => "'mod'",
            Nil => "'nil'",
            Not => "'not'",
            Object => "'object'",
            Of => "'of'",
            Or => "'or'",
            Packed => "'packed'",
            Procedure => "'procedure'",
            Program => "'program'",
            Property => "'property'",
            Raise => "'raise'",
            Record => "'record'",
            Repeat => "'repeat'",
            ResourceString => "'resourcestring'",
            Set => "'set'",
            Shl => "'shl'",
            Shr => "'shr'",
            String => "'string'",
            Then => "'then'",
            ThreadVar => "'threadvar'",
            To => "'to'",
            Try => "'try'",
            Type => "'type'",
            Unit => "'unit'",
            Until => "'until'",
            Uses => "'uses'",
            Var => "'var'",
            While => "'while'",
            With => "'with'",
            Xor => "'xor'",
            Plus => "'+'",
            Minus => "'-'",
            Star => "'*'",
            Slash => "'/'",
            Equal => "'='",
            NotEqual => "'<>'",
            Less => "'<'",
            Greater => "'>'",
            LessEqual => "'<='",
            GreaterEqual => "'>='",
            Assign => "':='",
            Dot => "'.'",
            DotDot => "'..'",
            Comma => "','",
            Semicolon => "';'",
            Colon => "':'",
            LeftParen => "'('",
            RightParen => "')'",
            LeftBracket => "'['",
            RightBracket => "']'",
            Caret => "'^'",
            At => "'@'",
            Eof => "end of file",
            Error => "error",
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// Map an identifier to its reserved-word [`TokenKind`], ignoring case.
pub fn lookup_keyword(ident: &str) -> Option<TokenKind> {
    use TokenKind::*;
    if ident.len() > 14 {
        return None;
    }
    let lower = ident.to_ascii_lowercase();
    Some(match lower.as_str() {
        "and" => And,
        "array" => Array,
        "as" => As,
        "asm" => Asm,
        "begin" => Begin,
        "case" => Case,
        "class" => Class,
        "const" => Const,
        "constructor" => Constructor,
        "destructor" => Destructor,
        "dispinterface" => DispInterface,
        "div" => Div,
        "do" => Do,
        "downto" => Downto,
        "else" => Else,
        "end" => End,
        "except" => Except,
        "file" => File,
        "finalization" => Finalization,
        "finally" => Finally,
        "for" => For,
        "function" => Function,
        "goto" => Goto,
        "if" => If,
        "implementation" => Implementation,
        "in" => In,
        "inherited" => Inherited,
        "initialization" => Initialization,
        "interface" => Interface,
        "is" => Is,
        "label" => Label,
        "library" => Library,
        "mod" => Mod,
        "nil" => Nil,
        "not" => Not,
        "object" => Object,
        "of" => Of,
        "or" => Or,
        "packed" => Packed,
        "procedure" => Procedure,
        "program" => Program,
        "property" => Property,
        "raise" => Raise,
        "record" => Record,
        "repeat" => Repeat,
        "resourcestring" => ResourceString,
        "set" => Set,
        "shl" => Shl,
        "shr" => Shr,
        "string" => String,
        "then" => Then,
        "threadvar" => ThreadVar,
        "to" => To,
        "try" => Try,
        "type" => Type,
        "unit" => Unit,
        "until" => Until,
        "uses" => Uses,
        "var" => Var,
        "while" => While,
        "with" => With,
        "xor" => Xor,
        _ => return None,
    })
}
