//! The token stream consumed by the AST builder.
//!
//! Tokens are produced by an external tokeniser which has already folded
//! indentation into balanced [`Indent`](TokenKind::Indent)/[`Dedent`](TokenKind::Dedent)
//! pairs, classified keywords, and resolved type keywords against a shared
//! [`Types`](crate::types::Types) registry. The last token of a stream is
//! always [`Eof`](TokenKind::Eof).

use std::fmt;
use crate::types::{Span, TypeId};

/// A single token, carrying its kind and the source span it covers.
#[derive(Clone, Debug, PartialEq)]
pub struct Token {
  /// The region of the source text this token was lexed from.
  pub span: Span,
  /// What the token is, plus any attached value.
  pub kind: TokenKind,
}

impl Token {
  /// Construct a token over the given span.
  #[must_use] pub fn new(span: Span, kind: TokenKind) -> Self { Self { span, kind } }
}

/// The kind of a token. Payload variants carry the value attached by the
/// tokeniser; `Type` carries an id into the shared type registry.
#[derive(Clone, Debug, PartialEq)]
pub enum TokenKind {
  /// An identifier, with its text.
  Identifier(String),
  /// An integer literal, with its value.
  Number(i64),
  /// A character literal.
  Character(char),
  /// The opening quote of an interpolated string.
  StringStart,
  /// A run of plain characters inside a string.
  StringChars(String),
  /// The `{` opening an interpolated expression.
  StringExprStart,
  /// The `}` closing an interpolated expression.
  StringExprEnd,
  /// The closing quote of an interpolated string.
  StringEnd,
  /// A type keyword, resolved by the tokeniser against the registry.
  Type(TypeId),
  /// End of a logical line.
  Newline,
  /// Start of an indented block.
  Indent,
  /// End of an indented block.
  Dedent,
  /// End of the token stream.
  Eof,
  ParenOpen,
  ParenClose,
  Comma,
  Colon,
  Semicolon,
  Dot,
  Equal,
  PlusEqual,
  MinusEqual,
  StarEqual,
  SlashEqual,
  EqualEqual,
  NotEqual,
  Less,
  LessEqual,
  Greater,
  GreaterEqual,
  AndAnd,
  OrOr,
  Not,
  Plus,
  Minus,
  Star,
  Slash,
  Increment,
  Decrement,
  Tilde,
  If,
  Else,
  For,
  While,
  Break,
  Breakall,
  Continue,
  Return,
  Print,
  Println,
  True,
  False,
  Null,
  Class,
  This,
}

impl TokenKind {
  /// The source (and C) spelling of a fixed-text token. Payload tokens and
  /// structural markers have no fixed spelling and return `None`.
  #[must_use] pub fn fixed_str(&self) -> Option<&'static str> {
    Some(match self {
      TokenKind::ParenOpen => "(",
      TokenKind::ParenClose => ")",
      TokenKind::Comma => ",",
      TokenKind::Colon => ":",
      TokenKind::Semicolon => ";",
      TokenKind::Dot => ".",
      TokenKind::Equal => "=",
      TokenKind::PlusEqual => "+=",
      TokenKind::MinusEqual => "-=",
      TokenKind::StarEqual => "*=",
      TokenKind::SlashEqual => "/=",
      TokenKind::EqualEqual => "==",
      TokenKind::NotEqual => "!=",
      TokenKind::Less => "<",
      TokenKind::LessEqual => "<=",
      TokenKind::Greater => ">",
      TokenKind::GreaterEqual => ">=",
      TokenKind::AndAnd => "&&",
      TokenKind::OrOr => "||",
      TokenKind::Not => "!",
      TokenKind::Plus => "+",
      TokenKind::Minus => "-",
      TokenKind::Star => "*",
      TokenKind::Slash => "/",
      TokenKind::Increment => "++",
      TokenKind::Decrement => "--",
      TokenKind::Tilde => "~",
      TokenKind::If => "if",
      TokenKind::Else => "else",
      TokenKind::For => "for",
      TokenKind::While => "while",
      TokenKind::Break => "break",
      TokenKind::Breakall => "breakall",
      TokenKind::Continue => "continue",
      TokenKind::Return => "return",
      TokenKind::Print => "print",
      TokenKind::Println => "println",
      TokenKind::True => "true",
      TokenKind::False => "false",
      TokenKind::Null => "null",
      TokenKind::Class => "class",
      TokenKind::This => "this",
      _ => return None,
    })
  }

  /// True for the operators that turn an expression into an assignment
  /// statement: `=`, `+=`, `-=`, `*=`, `/=`.
  #[must_use] pub fn is_assignment_form(&self) -> bool {
    matches!(self,
      TokenKind::Equal | TokenKind::PlusEqual | TokenKind::MinusEqual |
      TokenKind::StarEqual | TokenKind::SlashEqual)
  }
}

impl fmt::Display for TokenKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if let Some(s) = self.fixed_str() { return write!(f, "{s}") }
    match self {
      TokenKind::Identifier(name) => write!(f, "{name}"),
      TokenKind::Number(n) => write!(f, "{n}"),
      TokenKind::Character(c) => write!(f, "'{c}'"),
      TokenKind::StringChars(s) => write!(f, "{s}"),
      TokenKind::StringStart | TokenKind::StringEnd => write!(f, "\""),
      TokenKind::StringExprStart => write!(f, "{{"),
      TokenKind::StringExprEnd => write!(f, "}}"),
      TokenKind::Type(_) => write!(f, "<type>"),
      TokenKind::Newline => write!(f, "<newline>"),
      TokenKind::Indent => write!(f, "<indent>"),
      TokenKind::Dedent => write!(f, "<dedent>"),
      TokenKind::Eof => write!(f, "<end-of-file>"),
      _ => unreachable!("fixed-text token without a spelling"),
    }
  }
}

impl fmt::Display for Token {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { self.kind.fmt(f) }
}
