//! User-visible diagnostics.
//!
//! Every pass accumulates [`TaplError`]s and keeps going, so one bad
//! statement does not hide diagnostics for the rest of the file; only
//! between passes do accumulated errors stop the pipeline. Internal
//! invariant violations are not errors but panics: they indicate a
//! compiler bug and are intentionally fatal.

use std::fmt;
use std::io;
use std::path::PathBuf;
use crate::types::Span;

pub const RED: &str = "\x1b[31m";
pub const BOLD: &str = "\x1b[1m";
pub const RESET: &str = "\x1b[0m";

/// Which pass produced a diagnostic.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
  /// Raised while building the AST.
  Ast,
  /// Raised by the scoping pass.
  Scoping,
  /// Raised by the typing pass.
  Typing,
}

impl ErrorKind {
  #[must_use] fn describe(self) -> &'static str {
    match self {
      ErrorKind::Ast => "syntax error",
      ErrorKind::Scoping => "scoping error",
      ErrorKind::Typing => "type error",
    }
  }
}

/// A user-visible diagnostic: the producing pass, a message, and the
/// source region it points at.
#[derive(Clone, Debug)]
pub struct TaplError {
  pub kind: ErrorKind,
  pub message: String,
  /// The offending source region, when one is known.
  pub span: Option<Span>,
  /// The file the error was found in.
  pub filename: PathBuf,
}

impl TaplError {
  #[must_use] pub fn new(
    kind: ErrorKind, message: impl Into<String>, span: Option<Span>, filename: PathBuf,
  ) -> Self {
    Self { kind, message: message.into(), span, filename }
  }

  /// The 1-based line number of the error in `source`, or `None` when the
  /// error has no span or the span lies outside the text.
  #[must_use] pub fn line_number(&self, source: &str) -> Option<usize> {
    let span = self.span?;
    if span.start as usize > source.len() { return None }
    Some(source[..span.start as usize].matches('\n').count() + 1)
  }

  /// Render the diagnostic with its line number and source line, given the
  /// source text of the file it points into.
  #[must_use] pub fn render(&self, source: &str) -> String {
    let header = format!("{BOLD}{RED}{}{RESET}: {}", self.kind.describe(), self.message);
    match self.line_number(source) {
      Some(line) => {
        let snippet = source.lines().nth(line - 1).unwrap_or("<no source code line available>");
        format!("{header}\n  --> {}:{line}\n  {snippet}", self.filename.display())
      }
      None => format!("{header}\n  --> {}", self.filename.display()),
    }
  }
}

impl fmt::Display for TaplError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}: {}", self.kind.describe(), self.message)
  }
}

impl std::error::Error for TaplError {}

/// The failure modes of a whole compilation.
#[derive(Debug)]
pub enum CompileError {
  /// One or more user errors were collected; the driver should print them
  /// and exit with status 1.
  User(Vec<TaplError>),
  /// Reading a template or writing an emitted file failed.
  Io(io::Error),
}

impl From<Vec<TaplError>> for CompileError {
  fn from(errors: Vec<TaplError>) -> Self { Self::User(errors) }
}

impl From<io::Error> for CompileError {
  fn from(e: io::Error) -> Self { Self::Io(e) }
}

impl fmt::Display for CompileError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      CompileError::User(errors) => write!(f, "{} error(s) found", errors.len()),
      CompileError::Io(e) => write!(f, "io error: {e}"),
    }
  }
}

impl std::error::Error for CompileError {}
