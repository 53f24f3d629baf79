//! Compiler front-end and C emitter for TAPL, a small statically-typed,
//! indentation-structured, class-bearing language.
//!
//! The crate consumes a pre-tokenised stream (the tokeniser and the CLI
//! driver are external) and runs a strictly linear pipeline:
//!
//! 1. [`build_ast`] parses the tokens into a typed AST, recovering at
//!    statement boundaries so every bad statement yields one diagnostic.
//! 2. [`scoping`] walks the tree and validates identifier resolution
//!    against the lexical scope chain.
//! 3. [`infer`] walks the tree a second time, assigns a resolved type to
//!    every expression, and validates calls, returns, assignments and
//!    casts; a final verification walk asserts no expression was left
//!    untyped.
//! 4. [`codegen`] lowers the annotated tree to a C source tree: support
//!    headers, per-class struct-plus-method blocks, free functions, and a
//!    `main` wrapping the remaining top-level statements.
//!
//! The [`Types`] registry is shared with the tokeniser, which resolves
//! type keywords against it while lexing. Passes accumulate user errors
//! and report them all at once; the library never exits the process, the
//! driver maps [`CompileError::User`] to diagnostics and exit code 1.

pub mod build_ast;
pub mod codegen;
pub mod errors;
pub mod infer;
pub mod scope;
pub mod scoping;
pub mod token;
pub mod types;

use std::path::{Path, PathBuf};

pub use errors::{CompileError, ErrorKind, TaplError};
pub use token::{Token, TokenKind};
pub use types::ast::Ast;
pub use types::{Span, Spanned, TypeId, TypeRef, Types};

/// Run the semantic passes over a freshly parsed AST: scoping, then
/// typing, then the completeness verification of the type slots.
///
/// Each pass reports all its errors at once; a later pass only runs when
/// the earlier one found none.
pub fn check_ast(ast: &mut Ast, types: &Types) -> Result<(), Vec<TaplError>> {
  scoping::ScopingPass::run(ast)?;
  infer::TypingPass::run(ast, types)?;
  infer::verify_types(ast);
  Ok(())
}

/// Compile one token stream end to end: parse, check, and emit the C
/// source tree.
///
/// `filename` is the source file the tokens were lexed from (read back for
/// diagnostics and `{expr=}` interpolations), `types` the registry shared
/// with the tokeniser. Headers are emitted into `header_dir`, list
/// templates are read from `templates_dir`, and the program body goes to
/// `main_c_file`.
pub fn compile(
  filename: PathBuf,
  tokens: &[Token],
  types: &Types,
  header_dir: &Path,
  templates_dir: &Path,
  main_c_file: &Path,
) -> Result<(), CompileError> {
  let mut ast = build_ast::AstBuilder::new(filename, tokens, types).generate()?;
  check_ast(&mut ast, types)?;
  let emitter = codegen::CodeGenerator::new(&ast, types)?;
  emitter.generate_c(header_dir, templates_dir, main_c_file)?;
  Ok(())
}
