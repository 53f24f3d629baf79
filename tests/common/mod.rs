//! Shared test support: builds a token stream and the source text it was
//! "lexed" from in lockstep, so token spans always point at real source.
#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use taplc::types::ast::Ast;
use taplc::{Span, Token, TokenKind, Types};

/// A program under construction: the source text, the matching token
/// stream, and the type registry shared with the "tokeniser".
pub struct Program {
  pub src: String,
  pub tokens: Vec<Token>,
  pub types: Types,
}

impl Program {
  pub fn new() -> Self {
    Self { src: String::new(), tokens: Vec::new(), types: Types::new() }
  }

  fn push(&mut self, kind: TokenKind, text: &str) -> &mut Self {
    let span = Span::new(self.src.len() as u32, text.len() as u32);
    self.src.push_str(text);
    self.tokens.push(Token::new(span, kind));
    self
  }

  /// Source-only whitespace, no token.
  pub fn sp(&mut self) -> &mut Self {
    self.src.push(' ');
    self
  }

  /// A fixed-spelling token: operators, punctuation, keywords.
  pub fn tok(&mut self, kind: TokenKind) -> &mut Self {
    let text = kind.fixed_str().expect("token with a fixed spelling").to_string();
    self.push(kind, &text)
  }

  pub fn ident(&mut self, name: &str) -> &mut Self {
    self.push(TokenKind::Identifier(name.into()), name)
  }

  pub fn num(&mut self, value: i64) -> &mut Self {
    self.push(TokenKind::Number(value), &value.to_string())
  }

  pub fn ch(&mut self, c: char) -> &mut Self {
    let text = format!("'{c}'");
    self.push(TokenKind::Character(c), &text)
  }

  /// A type keyword already known to the registry (builtin or sugar).
  pub fn ty(&mut self, keyword: &str) -> &mut Self {
    let id = self.types.get(keyword).expect("registered type keyword").id;
    self.push(TokenKind::Type(id), keyword)
  }

  /// A class type keyword, interned on first use like the tokeniser does.
  pub fn class_ty(&mut self, keyword: &str) -> &mut Self {
    let id = self.types.add_class_type(keyword);
    self.push(TokenKind::Type(id), keyword)
  }

  /// A `list[T]` type keyword, interned on first use.
  pub fn list_ty(&mut self, inner: &str) -> &mut Self {
    let inner_id = self.types.get(inner).expect("registered element type").id;
    let id = self.types.add_list_type(inner_id);
    let text = format!("list[{inner}]");
    self.push(TokenKind::Type(id), &text)
  }

  pub fn nl(&mut self) -> &mut Self { self.push(TokenKind::Newline, "\n") }
  pub fn indent(&mut self) -> &mut Self { self.push(TokenKind::Indent, "") }
  pub fn dedent(&mut self) -> &mut Self { self.push(TokenKind::Dedent, "") }
  pub fn eof(&mut self) -> &mut Self { self.push(TokenKind::Eof, "") }

  pub fn str_start(&mut self) -> &mut Self { self.push(TokenKind::StringStart, "\"") }
  pub fn str_chars(&mut self, chars: &str) -> &mut Self {
    self.push(TokenKind::StringChars(chars.into()), chars)
  }
  pub fn str_expr_start(&mut self) -> &mut Self { self.push(TokenKind::StringExprStart, "{") }
  pub fn str_expr_end(&mut self) -> &mut Self { self.push(TokenKind::StringExprEnd, "}") }
  pub fn str_end(&mut self) -> &mut Self { self.push(TokenKind::StringEnd, "\"") }

  /// Write the accumulated source text next to the emitted files and
  /// return its path.
  pub fn write_source(&self, dir: &Path) -> PathBuf {
    let path = dir.join("main.tapl");
    fs::write(&path, &self.src).expect("write test source");
    path
  }

  /// Parse the stream, panicking on parse errors.
  pub fn parse(&self) -> Ast {
    taplc::build_ast::AstBuilder::new(PathBuf::from("main.tapl"), &self.tokens, &self.types)
      .generate()
      .unwrap_or_else(|errors| panic!("unexpected parse errors: {errors:#?}"))
  }

  /// Parse the stream, returning the accumulated errors.
  pub fn parse_errors(&self) -> Vec<taplc::TaplError> {
    match taplc::build_ast::AstBuilder::new(
      PathBuf::from("main.tapl"), &self.tokens, &self.types).generate()
    {
      Ok(_) => panic!("expected parse errors"),
      Err(errors) => errors,
    }
  }

  /// Parse and run both semantic passes, panicking on any error.
  pub fn check(&self) -> Ast {
    let mut ast = self.parse();
    taplc::check_ast(&mut ast, &self.types)
      .unwrap_or_else(|errors| panic!("unexpected check errors: {errors:#?}"));
    ast
  }

  /// Parse successfully, then return the errors of the failing semantic
  /// pass.
  pub fn check_errors(&self) -> Vec<taplc::TaplError> {
    let mut ast = self.parse();
    match taplc::check_ast(&mut ast, &self.types) {
      Ok(()) => panic!("expected check errors"),
      Err(errors) => errors,
    }
  }
}

/// A minimal list template, with the `TYPE` placeholder the emitter
/// substitutes per instantiation.
pub const LIST_TEMPLATE: &str = "\
typedef struct {
    TYPE* data;
    uint64_t size;
} list_TYPE;
void list_TYPE_constructor(list_TYPE* this);
";

/// Create `headers/` and `templates/` (with a list template) under `dir`.
pub fn emit_dirs(dir: &Path) -> (PathBuf, PathBuf) {
  let headers = dir.join("tapl_headers");
  let templates = dir.join("templates");
  fs::create_dir_all(&headers).expect("create header dir");
  fs::create_dir_all(&templates).expect("create templates dir");
  fs::write(templates.join("list.h"), LIST_TEMPLATE).expect("write list template");
  (headers, templates)
}
