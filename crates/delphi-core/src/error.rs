//! Unified error types for the Delphi semantic engine.
//!
//! ## Error Hierarchy
//!
//! ```text
//! AnalysisError (top-level wrapper)
//! ├── LexError              - Lexer/tokenization errors
//! ├── ParseError            - Parser errors (with ParseErrorKind)
//! ├── SemanticError         - Resolution diagnostics, categorized by ErrorCategory
//! └── InvalidConfiguration  - Malformed patterns supplied by a check
//! ```
//!
//! Semantic errors never abort a batch. They are collected on the unit that
//! produced them; only [`ErrorCategory::Structural`] errors mark that unit's
//! resolution as failed.

use thiserror::Error;

use crate::Span;

// ============================================================================
// Lexer Errors
// ============================================================================

/// Errors that occur during lexical analysis (tokenization).
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LexError {
    /// An unexpected character was encountered.
    #[error("unexpected character '{ch}' at {span}")]
    UnexpectedChar { ch: char, span: Span },

    /// A string literal was not properly terminated.
    #[error("unterminated string at {span}")]
    UnterminatedString { span: Span },

    /// A `{ }` or `(* *)` comment was not properly terminated.
    #[error("unterminated comment at {span}")]
    UnterminatedComment { span: Span },

    /// A numeric literal or character code could not be parsed.
    #[error("invalid number at {span}: {detail}")]
    InvalidNumber { span: Span, detail: String },
}

impl LexError {
    /// Get the span where this error occurred.
    pub fn span(&self) -> Span {
        match self {
            LexError::UnexpectedChar { span, .. } => *span,
            LexError::UnterminatedString { span } => *span,
            LexError::UnterminatedComment { span } => *span,
            LexError::InvalidNumber { span, .. } => *span,
        }
    }
}

// ============================================================================
// Parse Errors
// ============================================================================

/// Categories of parse errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParseErrorKind {
    // Token-level errors
    /// A specific token was expected but not found.
    ExpectedToken,
    /// An unexpected token was encountered.
    UnexpectedToken,
    /// Unexpected end of file.
    UnexpectedEof,

    // Expression errors
    /// An expression was expected.
    ExpectedExpression,
    /// The expression is invalid.
    InvalidExpression,

    // Type errors
    /// A type was expected.
    ExpectedType,
    /// The type is invalid.
    InvalidType,

    // Statement errors
    /// A statement was expected.
    ExpectedStatement,

    // Declaration errors
    /// A declaration was expected.
    ExpectedDeclaration,
    /// The declaration is invalid.
    InvalidDeclaration,
    /// A class or record member was expected.
    ExpectedMember,

    // Identifier errors
    /// An identifier was expected.
    ExpectedIdentifier,

    // Literal errors
    /// A literal value could not be parsed.
    InvalidLiteral,

    // Other
    /// A construct outside the supported surface.
    Unsupported,
}

impl ParseErrorKind {
    /// Returns a human-readable name for this error kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            ParseErrorKind::ExpectedToken => "expected token",
            ParseErrorKind::UnexpectedToken => "unexpected token",
            ParseErrorKind::UnexpectedEof => "unexpected end of file",
            ParseErrorKind::ExpectedExpression => "expected expression",
            ParseErrorKind::InvalidExpression => "invalid expression",
            ParseErrorKind::ExpectedType => "expected type",
            ParseErrorKind::InvalidType => "invalid type",
            ParseErrorKind::ExpectedStatement => "expected statement",
            ParseErrorKind::ExpectedDeclaration => "expected declaration",
            ParseErrorKind::InvalidDeclaration => "invalid declaration",
            ParseErrorKind::ExpectedMember => "expected member",
            ParseErrorKind::ExpectedIdentifier => "expected identifier",
            ParseErrorKind::InvalidLiteral => "invalid literal",
            ParseErrorKind::Unsupported => "unsupported construct",
        }
    }
}

impl std::fmt::Display for ParseErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A parse error with location and context.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{kind} at {span}: {message}")]
pub struct ParseError {
    /// The category of this error.
    pub kind: ParseErrorKind,
    /// The source location where the error occurred.
    pub span: Span,
    /// A detailed error message.
    pub message: String,
}

impl ParseError {
    /// Create a new parse error.
    pub fn new(kind: ParseErrorKind, span: Span, message: impl Into<String>) -> Self {
        Self {
            kind,
            span,
            message: message.into(),
        }
    }

    /// Create an "expected token" error.
    pub fn expected_token(span: Span, expected: &str, found: &str) -> Self {
        Self::new(
            ParseErrorKind::ExpectedToken,
            span,
            format!("expected {expected}, found {found}"),
        )
    }

    /// Create an "unexpected token" error.
    pub fn unexpected_token(span: Span, token: &str) -> Self {
        Self::new(
            ParseErrorKind::UnexpectedToken,
            span,
            format!("unexpected token: {token}"),
        )
    }

    /// Create an "unexpected EOF" error.
    pub fn unexpected_eof(span: Span) -> Self {
        Self::new(ParseErrorKind::UnexpectedEof, span, "unexpected end of file")
    }

    /// Create an "expected identifier" error.
    pub fn expected_identifier(span: Span, found: &str) -> Self {
        Self::new(
            ParseErrorKind::ExpectedIdentifier,
            span,
            format!("expected identifier, found {found}"),
        )
    }

    /// Create an "expected expression" error.
    pub fn expected_expression(span: Span, found: &str) -> Self {
        Self::new(
            ParseErrorKind::ExpectedExpression,
            span,
            format!("expected expression, found {found}"),
        )
    }

    /// Create an "expected type" error.
    pub fn expected_type(span: Span, found: &str) -> Self {
        Self::new(
            ParseErrorKind::ExpectedType,
            span,
            format!("expected type, found {found}"),
        )
    }

    /// Format the error with source context for display.
    ///
    /// Shows the offending source line with a caret under the error location.
    pub fn display_with_source(&self, source: &str) -> String {
        let mut output = String::new();
        let line = self.span.line;
        let column = self.span.col;

        output.push_str(&format!("Error at {}:{}: {}\n", line, column, self.kind));
        if !self.message.is_empty() {
            output.push_str(&format!("  {}\n", self.message));
        }

        if let Some(line_text) = source.lines().nth((line as usize).saturating_sub(1)) {
            output.push_str("  |\n");
            output.push_str(&format!("{:>3} | {}\n", line, line_text));

            let indent = " ".repeat((column as usize).saturating_sub(1));
            let pointer = if self.span.len <= 1 {
                "^".to_string()
            } else {
                "^".to_string() + &"~".repeat((self.span.len - 1) as usize)
            };
            output.push_str(&format!("  | {}{}\n", indent, pointer));
        }

        output
    }
}

impl From<LexError> for ParseError {
    fn from(err: LexError) -> Self {
        let kind = match err {
            LexError::InvalidNumber { .. } => ParseErrorKind::InvalidLiteral,
            _ => ParseErrorKind::UnexpectedToken,
        };
        ParseError::new(kind, err.span(), err.to_string())
    }
}

/// A collection of parse errors.
///
/// The parser recovers at statement and declaration boundaries, so several
/// errors can be reported at once.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParseErrors {
    errors: Vec<ParseError>,
}

impl ParseErrors {
    /// Create a new empty error collection.
    pub fn new() -> Self {
        Self { errors: Vec::new() }
    }

    /// Add an error to the collection.
    pub fn push(&mut self, error: ParseError) {
        self.errors.push(error);
    }

    /// Check if there are any errors.
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Get the number of errors.
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// Iterate over the errors.
    pub fn iter(&self) -> impl Iterator<Item = &ParseError> {
        self.errors.iter()
    }

    /// Convert to a Vec of errors.
    pub fn into_vec(self) -> Vec<ParseError> {
        self.errors
    }

    /// The first error, if any.
    pub fn first(&self) -> Option<&ParseError> {
        self.errors.first()
    }
}

impl IntoIterator for ParseErrors {
    type Item = ParseError;
    type IntoIter = std::vec::IntoIter<ParseError>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.into_iter()
    }
}

impl<'a> IntoIterator for &'a ParseErrors {
    type Item = &'a ParseError;
    type IntoIter = std::slice::Iter<'a, ParseError>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.iter()
    }
}

impl From<ParseError> for ParseErrors {
    fn from(error: ParseError) -> Self {
        Self {
            errors: vec![error],
        }
    }
}

impl std::fmt::Display for ParseErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, error) in self.errors.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{error}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ParseErrors {}

// ============================================================================
// Semantic Errors
// ============================================================================

/// Coarse classification of a semantic error.
///
/// Decides how far an error propagates: `Unresolved` and `Ambiguous` degrade
/// to sentinel results, `Type` is reported, and `Structural` marks the whole
/// unit as failed while sibling units keep resolving.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    Unresolved,
    Ambiguous,
    Structural,
    Type,
}

impl ErrorCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCategory::Unresolved => "unresolved",
            ErrorCategory::Ambiguous => "ambiguous",
            ErrorCategory::Structural => "structural",
            ErrorCategory::Type => "type",
        }
    }
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Diagnostics produced while resolving a unit.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SemanticError {
    /// Identifier not found in any enclosing scope.
    #[error("at {span}: unknown identifier '{name}'")]
    UnknownIdentifier { name: String, span: Span },

    /// A `uses` entry names a unit that is not registered.
    #[error("at {span}: unknown unit '{name}'")]
    UnknownUnit { name: String, span: Span },

    /// Member lookup failed on a resolved type.
    #[error("at {span}: '{type_name}' has no member '{member}'")]
    UnknownMember {
        type_name: String,
        member: String,
        span: Span,
    },

    /// Two or more overloads tie at the minimal conversion cost.
    #[error("at {span}: ambiguous call to '{name}': {candidates}")]
    AmbiguousOverload {
        name: String,
        candidates: String,
        span: Span,
    },

    /// No overload accepts the argument list.
    #[error("at {span}: no matching overload for '{name}({args})'")]
    NoMatchingOverload {
        name: String,
        args: String,
        span: Span,
    },

    /// A name resolves to several unrelated declarations.
    #[error("at {span}: ambiguous symbol '{name}': could be {candidates}")]
    AmbiguousSymbol {
        name: String,
        candidates: String,
        span: Span,
    },

    /// A non-overloadable name was declared twice in one scope.
    #[error("at {span}: duplicate declaration '{name}' (first declared at {original})")]
    DuplicateDeclaration {
        name: String,
        original: Span,
        span: Span,
    },

    /// A chain of aliases leads back to itself.
    #[error("at {span}: cyclic type alias '{name}'")]
    CyclicAlias { name: String, span: Span },

    /// Interface sections of two or more units use each other.
    #[error("at {span}: circular unit reference to '{name}'")]
    CircularUnitReference { name: String, span: Span },
    /// A class or interface is its own ancestor.
    #[error("at {span}: circular inheritance for '{name}'")]
    CircularInheritance { name: String, span: Span },

    /// `override` without a virtual or dynamic ancestor method of the same signature.
    #[error("at {span}: '{name}' is marked override but no ancestor declares a matching virtual method")]
    NoOverrideTarget { name: String, span: Span },

    /// `inherited` where no ancestor declares the method.
    #[error("at {span}: no ancestor of '{type_name}' declares '{name}'")]
    NoInheritedTarget {
        type_name: String,
        name: String,
        span: Span,
    },

    /// A class lists an interface but does not implement one of its methods.
    #[error("at {span}: '{class_name}' does not implement '{interface_name}.{method}'")]
    MissingInterfaceMethod {
        class_name: String,
        interface_name: String,
        method: String,
        span: Span,
    },

    /// A member was referenced from a location its visibility does not reach.
    #[error("at {span}: '{name}' is {visibility} and not accessible here")]
    Inaccessible {
        name: String,
        visibility: String,
        span: Span,
    },

    /// A value cannot be implicitly converted to the required type.
    #[error("at {span}: cannot convert '{from}' to '{to}'")]
    TypeMismatch { from: String, to: String, span: Span },

    /// An explicit cast between unrelated types.
    #[error("at {span}: invalid cast from '{from}' to '{to}'")]
    InvalidCast { from: String, to: String, span: Span },

    /// A construct the engine recognises syntactically but cannot resolve.
    #[error("at {span}: {message}")]
    Unsupported { message: String, span: Span },
}

impl SemanticError {
    /// The category that decides how far this error propagates.
    pub fn category(&self) -> ErrorCategory {
        match self {
            SemanticError::UnknownIdentifier { .. }
            | SemanticError::UnknownUnit { .. }
            | SemanticError::UnknownMember { .. }
            | SemanticError::NoInheritedTarget { .. } => ErrorCategory::Unresolved,
            SemanticError::AmbiguousOverload { .. } | SemanticError::AmbiguousSymbol { .. } => {
                ErrorCategory::Ambiguous
            }
            SemanticError::DuplicateDeclaration { .. }
            | SemanticError::CyclicAlias { .. }
            | SemanticError::CircularInheritance { .. }
            | SemanticError::CircularUnitReference { .. }
            | SemanticError::Unsupported { .. } => ErrorCategory::Structural,
            SemanticError::NoMatchingOverload { .. }
            | SemanticError::NoOverrideTarget { .. }
            | SemanticError::MissingInterfaceMethod { .. }
            | SemanticError::Inaccessible { .. }
            | SemanticError::TypeMismatch { .. }
            | SemanticError::InvalidCast { .. } => ErrorCategory::Type,
        }
    }

    /// Whether this error marks the unit as failed.
    pub fn is_structural(&self) -> bool {
        self.category() == ErrorCategory::Structural
    }

    /// Get the span where this error occurred.
    pub fn span(&self) -> Span {
        match self {
            SemanticError::UnknownIdentifier { span, .. }
            | SemanticError::UnknownUnit { span, .. }
            | SemanticError::UnknownMember { span, .. }
            | SemanticError::AmbiguousOverload { span, .. }
            | SemanticError::NoMatchingOverload { span, .. }
            | SemanticError::AmbiguousSymbol { span, .. }
            | SemanticError::DuplicateDeclaration { span, .. }
            | SemanticError::CyclicAlias { span, .. }
            | SemanticError::CircularInheritance { span, .. }
            | SemanticError::CircularUnitReference { span, .. }
            | SemanticError::NoOverrideTarget { span, .. }
            | SemanticError::NoInheritedTarget { span, .. }
            | SemanticError::MissingInterfaceMethod { span, .. }
            | SemanticError::Inaccessible { span, .. }
            | SemanticError::TypeMismatch { span, .. }
            | SemanticError::InvalidCast { span, .. }
            | SemanticError::Unsupported { span, .. } => *span,
        }
    }
}

// ============================================================================
// Configuration Errors
// ============================================================================

/// A malformed pattern or option handed to the engine by a check.
///
/// Fatal for the single query that supplied it, never for the batch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidConfiguration {
    /// A declaration pattern is not a valid regular expression.
    #[error("invalid pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    /// An option value is out of range.
    #[error("invalid option '{option}': {reason}")]
    InvalidOption { option: String, reason: String },
}

// ============================================================================
// Top-level Error
// ============================================================================

/// Any error the engine can produce.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AnalysisError {
    /// A lexer error.
    #[error(transparent)]
    Lex(#[from] LexError),

    /// Parse errors for one unit.
    #[error("unit '{unit}': {errors}")]
    Parse { unit: String, errors: ParseErrors },

    /// A semantic error.
    #[error(transparent)]
    Semantic(#[from] SemanticError),

    /// A configuration error.
    #[error(transparent)]
    Configuration(#[from] InvalidConfiguration),

    /// Two units were registered under the same name.
    #[error("unit '{0}' is already registered")]
    DuplicateUnit(String),

    /// A unit was published without a reserved registry slot.
    #[error("unit '{0}' was published without being reserved")]
    UnreservedUnit(String),
}

impl AnalysisError {
    /// Check if this is a lexer error.
    pub fn is_lex(&self) -> bool {
        matches!(self, AnalysisError::Lex(_))
    }

    /// Check if this is a parse error.
    pub fn is_parse(&self) -> bool {
        matches!(self, AnalysisError::Parse { .. })
    }

    /// Check if this is a semantic error.
    pub fn is_semantic(&self) -> bool {
        matches!(self, AnalysisError::Semantic(_))
    }

    /// Check if this is a configuration error.
    pub fn is_configuration(&self) -> bool {
        matches!(self, AnalysisError::Configuration(_))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lex_error_display() {
        let err = LexError::UnexpectedChar {
            ch: '?',
            span: Span::new(1, 5, 1),
        };
        assert_eq!(format!("{err}"), "unexpected character '?' at 1:5");
    }

    #[test]
    fn lex_error_converts_to_parse_error() {
        let err: ParseError = LexError::InvalidNumber {
            span: Span::new(2, 3, 4),
            detail: "bad hex".into(),
        }
        .into();
        assert_eq!(err.kind, ParseErrorKind::InvalidLiteral);
        assert_eq!(err.span, Span::new(2, 3, 4));
    }

    #[test]
    fn parse_error_display() {
        let err = ParseError::new(
            ParseErrorKind::ExpectedToken,
            Span::new(1, 10, 3),
            "expected ';', found 'end'",
        );
        assert_eq!(
            format!("{err}"),
            "expected token at 1:10: expected ';', found 'end'"
        );
    }

    #[test]
    fn parse_error_with_source() {
        let source = "unit Foo;\ninterface\nvar X: ;\n";
        let err = ParseError::expected_type(Span::new(3, 8, 1), "';'");
        let rendered = err.display_with_source(source);
        assert!(rendered.contains("  3 | var X: ;"));
        assert!(rendered.contains("^"));
    }

    #[test]
    fn parse_errors_collection() {
        let mut errors = ParseErrors::new();
        assert!(errors.is_empty());
        errors.push(ParseError::unexpected_eof(Span::new(1, 1, 0)));
        errors.push(ParseError::unexpected_token(Span::new(2, 1, 1), "'@'"));
        assert_eq!(errors.len(), 2);
        assert_eq!(errors.first().map(|e| e.kind), Some(ParseErrorKind::UnexpectedEof));
        assert_eq!(format!("{errors}").lines().count(), 2);
    }

    #[test]
    fn semantic_error_categories() {
        let span = Span::new(4, 2, 3);
        let dup = SemanticError::DuplicateDeclaration {
            name: "X".into(),
            original: Span::new(3, 2, 1),
            span,
        };
        assert_eq!(dup.category(), ErrorCategory::Structural);
        assert!(dup.is_structural());

        let ambiguous = SemanticError::AmbiguousOverload {
            name: "IntPower".into(),
            candidates: "IntPower(Single, Integer), IntPower(Double, Integer)".into(),
            span,
        };
        assert_eq!(ambiguous.category(), ErrorCategory::Ambiguous);
        assert_eq!(ambiguous.span(), span);

        let unknown = SemanticError::UnknownUnit {
            name: "System.Missing".into(),
            span,
        };
        assert_eq!(unknown.category(), ErrorCategory::Unresolved);
        assert!(!unknown.is_structural());
    }

    #[test]
    fn analysis_error_wraps() {
        let err: AnalysisError = InvalidConfiguration::InvalidPattern {
            pattern: "(".into(),
            reason: "unclosed group".into(),
        }
        .into();
        assert!(err.is_configuration());
        assert_eq!(err.to_string(), "invalid pattern '(': unclosed group");

        let err: AnalysisError = SemanticError::CyclicAlias {
            name: "TA".into(),
            span: Span::new(1, 1, 2),
        }
        .into();
        assert!(err.is_semantic());
    }
}
