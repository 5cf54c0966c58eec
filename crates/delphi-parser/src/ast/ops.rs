//! Operator definitions for Delphi expressions.
//!
//! Provides enums for binary and unary operators along with binding powers
//! for the Pratt parser. Pascal has only four precedence levels:
//!
//! 1. relational: `= <> < > <= >= in is`
//! 2. additive: `+ - or xor`
//! 3. multiplicative: `* / div mod and shl shr as`
//! 4. unary: `not - + @`

use crate::lexer::TokenKind;
use std::fmt;

/// Binary operators, organized by precedence from lowest to highest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    // Relational
    Equal,
    NotEqual,
    Less,
    Greater,
    LessEqual,
    GreaterEqual,
    In,
    Is,

    // Additive
    Add,
    Sub,
    Or,
    Xor,

    // Multiplicative
    Mul,
    /// `/`, always real division.
    Divide,
    /// `div`, integer division.
    IntDiv,
    Mod,
    And,
    Shl,
    Shr,
    As,
}

impl BinaryOp {
    /// Map a token to its binary operator.
    pub fn from_token(kind: TokenKind) -> Option<Self> {
        Some(match kind {
            TokenKind::Equal => BinaryOp::Equal,
            TokenKind::NotEqual => BinaryOp::NotEqual,
            TokenKind::Less => BinaryOp::Less,
            TokenKind::Greater => BinaryOp::Greater,
            TokenKind::LessEqual => BinaryOp::LessEqual,
            TokenKind::GreaterEqual => BinaryOp::GreaterEqual,
            TokenKind::In => BinaryOp::In,
            TokenKind::Is => BinaryOp::Is,
            TokenKind::Plus => BinaryOp::Add,
            TokenKind::Minus => BinaryOp::Sub,
            TokenKind::Or => BinaryOp::Or,
            TokenKind::Xor => BinaryOp::Xor,
            TokenKind::Star => BinaryOp::Mul,
            TokenKind::Slash => BinaryOp::Divide,
            TokenKind::Div => BinaryOp::IntDiv,
            TokenKind::Mod => BinaryOp::Mod,
            TokenKind::And => BinaryOp::And,
            TokenKind::Shl => BinaryOp::Shl,
            TokenKind::Shr => BinaryOp::Shr,
            TokenKind::As => BinaryOp::As,
            _ => return None,
        })
    }

    /// Left and right binding power. All binary operators are left associative.
    pub fn binding_power(self) -> (u8, u8) {
        match self {
            BinaryOp::Equal
            | BinaryOp::NotEqual
            | BinaryOp::Less
            | BinaryOp::Greater
            | BinaryOp::LessEqual
            | BinaryOp::GreaterEqual
            | BinaryOp::In
            | BinaryOp::Is => (1, 2),
            BinaryOp::Add | BinaryOp::Sub | BinaryOp::Or | BinaryOp::Xor => (3, 4),
            BinaryOp::Mul
            | BinaryOp::Divide
            | BinaryOp::IntDiv
            | BinaryOp::Mod
            | BinaryOp::And
            | BinaryOp::Shl
            | BinaryOp::Shr
            | BinaryOp::As => (5, 6),
        }
    }

    /// Whether the operator compares its operands and yields `Boolean`.
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinaryOp::Equal
                | BinaryOp::NotEqual
                | BinaryOp::Less
                | BinaryOp::Greater
                | BinaryOp::LessEqual
                | BinaryOp::GreaterEqual
        )
    }

    /// Whether the operator is one of `and or xor`, logical or bitwise by operand type.
    pub fn is_logical(self) -> bool {
        matches!(self, BinaryOp::And | BinaryOp::Or | BinaryOp::Xor)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BinaryOp::Equal => "=",
            BinaryOp::NotEqual => "<>",
            BinaryOp::Less => "<",
            BinaryOp::Greater => ">",
            BinaryOp::LessEqual => "<=",
            BinaryOp::GreaterEqual => ">=",
            BinaryOp::In => "in",
            BinaryOp::Is => "is",
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Or => "or",
            BinaryOp::Xor => "xor",
            BinaryOp::Mul => "*",
            BinaryOp::Divide => "/",
            BinaryOp::IntDiv => "div",
            BinaryOp::Mod => "mod",
            BinaryOp::And => "and",
            BinaryOp::Shl => "shl",
            BinaryOp::Shr => "shr",
            BinaryOp::As => "as",
        }
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Prefix unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    /// `not`: logical on Boolean, bitwise on integers.
    Not,
    /// `-`
    Negate,
    /// `+`
    Plus,
    /// `@`
    AddressOf,
}

impl UnaryOp {
    pub fn from_token(kind: TokenKind) -> Option<Self> {
        Some(match kind {
            TokenKind::Not => UnaryOp::Not,
            TokenKind::Minus => UnaryOp::Negate,
            TokenKind::Plus => UnaryOp::Plus,
            TokenKind::At => UnaryOp::AddressOf,
            _ => return None,
        })
    }

    /// Binding power of the operand: tighter than every binary operator.
    pub fn binding_power() -> u8 {
        7
    }

    pub fn as_str(self) -> &'static str {
        match self {
            UnaryOp::Not => "not",
            UnaryOp::Negate => "-",
            UnaryOp::Plus => "+",
            UnaryOp::AddressOf => "@",
        }
    }
}

impl fmt::Display for UnaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
