//! The scoping pass: the first tree walk over a fresh AST.
//!
//! It builds the lexical scope chain, checks that declarations do not
//! collide within their innermost scope, and that identifier operands
//! resolve to a reachable declaration. Class bodies are skipped here; the
//! typing pass scopes them against a clean class scope. The pass never
//! mutates the AST.

use std::path::PathBuf;
use tracing::debug;
use crate::errors::{ErrorKind, TaplError};
use crate::scope::ScopeTree;
use crate::token::TokenKind;
use crate::types::TypeRef;
use crate::types::ast::*;

/// The scoping pass state. Create-and-run through [`ScopingPass::run`].
pub struct ScopingPass {
  scopes: ScopeTree,
  errors: Vec<TaplError>,
  filename: PathBuf,
}

impl ScopingPass {
  /// Walk the whole program, accumulating scoping errors. A failed
  /// statement does not stop the walk; the collected errors are returned
  /// at the end.
  pub fn run(ast: &Ast) -> Result<(), Vec<TaplError>> {
    debug!("running the scoping pass over {:?}", ast.filename);
    let mut this = Self {
      scopes: ScopeTree::new(),
      errors: Vec::new(),
      filename: ast.filename.clone(),
    };
    for stmt in &ast.stmts { this.stmt(stmt) }

    // the walk must end balanced: only the global scope, nothing stashed
    assert!(this.scopes.at_root(), "more scopes than the global scope left after scoping");
    assert!(this.scopes.stash_empty(), "scope stash is not empty after scoping");

    if this.errors.is_empty() { Ok(()) } else { Err(this.errors) }
  }

  /// Visit a statement, catching its error so later statements still get
  /// checked.
  fn stmt(&mut self, stmt: &Stmt) {
    if let Err(e) = self.stmt_inner(stmt) { self.errors.push(e) }
  }

  /// Visit an expression, catching its error at the expression root.
  fn expr(&mut self, expr: &Expr) {
    if let Err(e) = self.expr_inner(expr) { self.errors.push(e) }
  }

  fn scoped<R>(&mut self, f: impl FnOnce(&mut Self) -> R) -> R {
    self.scopes.push();
    let result = f(self);
    debug!("leaving scope with identifiers: {:?}",
      self.scopes.current_names().collect::<Vec<_>>());
    self.scopes.pop();
    result
  }

  fn declare(&mut self, ident: &Ident, ty: TypeRef) -> Result<(), TaplError> {
    if self.scopes.declare(&ident.name, ty) { return Ok(()) }
    Err(TaplError::new(ErrorKind::Scoping,
      format!("identifier '{}' already exists!", ident.name),
      Some(ident.span), self.filename.clone()))
  }

  fn resolve(&self, ident_span: crate::types::Span, name: &str) -> Result<TypeRef, TaplError> {
    self.scopes.lookup(name).ok_or_else(|| TaplError::new(ErrorKind::Scoping,
      format!("unknown identifier '{name}'!"), Some(ident_span), self.filename.clone()))
  }

  fn stmt_inner(&mut self, stmt: &Stmt) -> Result<(), TaplError> {
    match &stmt.k {
      StmtKind::Assign(assign) => {
        self.expr(&assign.lhs);
        self.expr(&assign.value);
      }
      StmtKind::Break | StmtKind::Breakall(_) | StmtKind::Continue => {}
      // class bodies see a clean scope during the typing pass instead
      StmtKind::Class(_) => {}
      StmtKind::Expr(e) => self.expr(e),
      StmtKind::For(f) => self.scoped(|this| {
        if let Some(init) = &f.init { this.stmt(init) }
        if let Some(check) = &f.check { this.expr(check) }
        if let Some(step) = &f.step { this.stmt(step) }
        for s in &f.body { this.stmt(s) }
      }),
      StmtKind::Function(f) => {
        // the name goes into the surrounding scope, the arguments into
        // the body scope
        self.declare(&f.name, f.ret.k)?;
        self.scoped(|this| -> Result<(), TaplError> {
          for arg in &f.args { this.declare(&arg.name, arg.ty.k)? }
          for s in &f.body { this.stmt(s) }
          Ok(())
        })?;
      }
      StmtKind::If(i) => {
        self.scoped(|this| {
          this.expr(&i.cond);
          for s in &i.body { this.stmt(s) }
        });
        for (cond, body) in &i.else_ifs {
          self.scoped(|this| {
            this.expr(cond);
            for s in body { this.stmt(s) }
          });
        }
        if let Some(body) = &i.else_body {
          self.scoped(|this| for s in body { this.stmt(s) });
        }
      }
      StmtKind::List(l) => self.declare(&l.name, l.ty.k)?,
      StmtKind::Print(p) => self.expr(&p.value),
      StmtKind::Return(value) => {
        if let Some(value) = value { self.expr(value) }
      }
      StmtKind::VarDecl(v) => {
        // the initialiser cannot see the declaration it initialises
        if let Some(init) = &v.init { self.expr(init) }
        self.declare(&v.name, v.ty.k)?;
      }
    }
    Ok(())
  }

  fn expr_inner(&mut self, expr: &Expr) -> Result<(), TaplError> {
    match &expr.k {
      ExprKind::Binary(b) => {
        self.expr(&b.left);
        self.expr(&b.right);
      }
      ExprKind::Call(c) => {
        // the callee is resolved during the typing pass; only the
        // arguments contain identifier operands to check here
        for arg in &c.args { self.expr(arg) }
      }
      ExprKind::Ident(ie) => {
        if let Some(inner) = &ie.inner { self.expr(inner) }
      }
      ExprKind::StrEq(inner) => self.expr(inner),
      ExprKind::Str(s) => {
        for element in &s.elements {
          if let StrElem::Expr(e) = element { self.expr(e) }
        }
      }
      ExprKind::This(_) =>
        unreachable!("`this` only occurs inside class bodies, which this pass skips"),
      ExprKind::Token(token) => {
        if let TokenKind::Identifier(name) = &token.kind {
          self.resolve(token.span, name)?;
        }
      }
      ExprKind::Cast(c) => self.expr(&c.inner),
      ExprKind::Unary(u) => self.expr(&u.inner),
    }
    Ok(())
  }
}
