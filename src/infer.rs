//! The typing pass: the second tree walk, assigning a resolved type to
//! every expression and validating calls, returns, assignments and casts.
//!
//! The pass keeps the same scope machinery as the scoping pass plus three
//! extra structures: the retained clean scope of every class (methods are
//! resolved against it at call sites), a stack of enclosing function
//! return types, and a stack of receiver types for member chains. Integer
//! literals start out as the undetermined `base` type and take on the
//! concrete type of whatever slot they flow into, with a range check at
//! that point.

use std::path::PathBuf;
use hashbrown::HashMap;
use tracing::debug;
use crate::errors::{ErrorKind, TaplError};
use crate::scope::{FnSig, ScopeId, ScopeTree};
use crate::token::TokenKind;
use crate::types::ast::*;
use crate::types::{NumericKind, Span, TypeId, TypeKind, TypeRef, Types};

/// The typing pass state. Create-and-run through [`TypingPass::run`].
pub struct TypingPass<'a> {
  types: &'a Types,
  scopes: ScopeTree,
  /// The retained clean scope of each typed class, for member and method
  /// resolution at use sites.
  class_scopes: HashMap<TypeId, ScopeId>,
  /// Return types of the enclosing function declarations.
  fn_stack: Vec<TypeRef>,
  /// Receiver types of the member chains currently being resolved.
  recv_stack: Vec<TypeRef>,
  errors: Vec<TaplError>,
  filename: PathBuf,
}

type Result<T, E = TaplError> = std::result::Result<T, E>;

impl<'a> TypingPass<'a> {
  /// Walk the whole program, filling in every expression's type slot and
  /// accumulating type errors. A failed statement does not stop the walk.
  pub fn run(ast: &mut Ast, types: &'a Types) -> Result<(), Vec<TaplError>> {
    debug!("running the typing pass over {:?}", ast.filename);
    let mut this = Self {
      types,
      scopes: ScopeTree::new(),
      class_scopes: HashMap::new(),
      fn_stack: Vec::new(),
      recv_stack: Vec::new(),
      errors: Vec::new(),
      filename: ast.filename.clone(),
    };
    this.add_stdlib_functions();
    for stmt in &mut ast.stmts { this.stmt(stmt) }

    assert!(this.scopes.at_root(), "more scopes than the global scope left after typing");
    assert!(this.scopes.stash_empty(), "scope stash is not empty after typing");

    if this.errors.is_empty() { Ok(()) } else { Err(this.errors) }
  }

  /// Inject the file standard library into the current (top-level or
  /// class) scope: `bool read_file(string, list[char])` and
  /// `bool write_file(string, list[char])`.
  fn add_stdlib_functions(&mut self) {
    let ret = self.types.type_ref("bool");
    let string = self.types.type_ref("string");
    let list_char = self.types.type_ref("list[char]");
    for name in ["read_file", "write_file"] {
      self.scopes.declare(name, ret);
      self.scopes.declare_function(FnSig {
        name: name.into(),
        ret,
        args: vec![(string, "filename".into()), (list_char, "list".into())],
      });
    }
  }

  fn stmt(&mut self, stmt: &mut Stmt) {
    if let Err(e) = self.stmt_inner(stmt) { self.errors.push(e) }
  }

  fn expr(&mut self, expr: &mut Expr) {
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

  fn error(&self, message: String, span: Span) -> TaplError {
    TaplError::new(ErrorKind::Typing, message, Some(span), self.filename.clone())
  }

  fn keyword(&self, ty: TypeRef) -> &str { &self.types[ty.id].keyword }

  fn declare(&mut self, ident: &Ident, ty: TypeRef) -> Result<()> {
    if self.scopes.declare(&ident.name, ty) { return Ok(()) }
    Err(self.error(format!("identifier '{}' already exists!", ident.name), ident.span))
  }

  /// The type an expression contributes to its surroundings: for a member
  /// chain, the type of the deepest member; `None` when typing the
  /// expression already failed.
  fn expr_type(expr: &Expr) -> Option<TypeRef> {
    if let ExprKind::Ident(ie) = &expr.k {
      if let Some(inner) = &ie.inner { return Self::expr_type(inner) }
    }
    expr.ty
  }

  /// The `base` compatibility rule. Two numerics where at least one is the
  /// undetermined literal type resolve to the concrete side; otherwise the
  /// types must be identical.
  fn check_types(&self, left: TypeRef, right: TypeRef, span: Span) -> Result<TypeRef> {
    let both_numeric =
      self.types[left.id].numeric().is_some() && self.types[right.id].numeric().is_some();
    if both_numeric {
      if left.id == Types::BASE && right.id == Types::BASE { return Ok(left) }
      if left.id == Types::BASE { return Ok(right) }
      if right.id == Types::BASE { return Ok(left) }
    }
    if left.id == right.id { return Ok(left) }
    Err(self.error(format!(
      "invalid types provided, '{}' and '{}' can't be used together!",
      self.keyword(left), self.keyword(right)), span))
  }

  fn check_expr_types(&self, left: &Expr, right: &Expr, span: Span) -> Result<Option<TypeRef>> {
    match (Self::expr_type(left), Self::expr_type(right)) {
      (Some(l), Some(r)) => Ok(Some(self.check_types(l, r, span)?)),
      // one of the sides already failed to type; avoid a cascade
      _ => Ok(None),
    }
  }

  /// Range-check an undetermined integer literal flowing into a concrete
  /// integer slot. Non-literals and float targets pass unchecked.
  fn check_number_range(&self, expected: TypeRef, value: &Expr) -> Result<()> {
    if expected.id == Types::BASE { return Ok(()) }
    let Some((kind, bits)) = self.types[expected.id].numeric() else { return Ok(()) };
    let ExprKind::Token(token) = &value.k else { return Ok(()) };
    let TokenKind::Number(v) = &token.kind else { return Ok(()) };
    let v = *v;
    let (min, max): (i128, i128) = match kind {
      NumericKind::Signed => (-(1_i128 << (bits - 1)), (1_i128 << (bits - 1)) - 1),
      NumericKind::Unsigned => (0, (1_i128 << bits) - 1),
      NumericKind::Float => return Ok(()),
    };
    if i128::from(v) < min || i128::from(v) > max {
      return Err(self.error(format!(
        "can't assign '{v}' to '{}', value must be between [{min}, {max}]!",
        self.keyword(expected)), value.span))
    }
    Ok(())
  }

  fn stmt_inner(&mut self, stmt: &mut Stmt) -> Result<()> {
    let span = stmt.span;
    match &mut stmt.k {
      StmtKind::Assign(assign) => {
        self.expr(&mut assign.lhs);
        self.expr(&mut assign.value);
        let value_span = assign.value.span;
        self.check_expr_types(&assign.lhs, &assign.value, value_span)?;
        if let Some(lhs) = Self::expr_type(&assign.lhs) {
          self.check_number_range(lhs, &assign.value)?;
        }
      }
      StmtKind::Break | StmtKind::Breakall(_) | StmtKind::Continue => {}
      StmtKind::Class(class) => self.class_stmt(class),
      StmtKind::Expr(e) => self.expr(e),
      StmtKind::For(f) => self.scoped(|this| {
        if let Some(init) = &mut f.init { this.stmt(init) }
        if let Some(check) = &mut f.check { this.expr(check) }
        if let Some(step) = &mut f.step { this.stmt(step) }
        for s in &mut f.body { this.stmt(s) }
      }),
      StmtKind::Function(f) => self.function_stmt(f)?,
      StmtKind::If(i) => {
        self.scoped(|this| {
          this.expr(&mut i.cond);
          for s in &mut i.body { this.stmt(s) }
        });
        for (cond, body) in &mut i.else_ifs {
          self.scoped(|this| {
            this.expr(cond);
            for s in body { this.stmt(s) }
          });
        }
        if let Some(body) = &mut i.else_body {
          self.scoped(|this| for s in body { this.stmt(s) });
        }
      }
      StmtKind::List(l) => self.declare(&l.name, l.ty.k)?,
      StmtKind::Print(p) => self.expr(&mut p.value),
      StmtKind::Return(value) => self.return_stmt(span, value)?,
      StmtKind::VarDecl(v) => {
        // the declaration is visible to its own initialiser here
        self.declare(&v.name, v.ty.k)?;
        if let Some(init) = &mut v.init {
          let requested = self.scopes.lookup(&v.name.name).expect("just declared");
          self.expr(init);
          if let Some(found) = Self::expr_type(init) {
            self.check_types(requested, found, init.span)?;
            self.check_number_range(requested, init)?;
          }
        }
      }
    }
    Ok(())
  }

  /// Type a class body against a clean scope, retained afterwards for
  /// member resolution at use sites.
  fn class_stmt(&mut self, class: &mut ClassStmt) {
    let class_scope = self.scopes.stash_clean();
    self.class_scopes.insert(class.class, class_scope);
    self.add_stdlib_functions();

    for variable in &mut class.variables { self.stmt(variable) }
    if let Some(constructor) = &mut class.constructor {
      if let Err(e) = self.lifecycle_stmt(constructor) { self.errors.push(e) }
    }
    if let Some(destructor) = &mut class.destructor {
      if let Err(e) = self.lifecycle_stmt(destructor) { self.errors.push(e) }
    }
    for function in &mut class.functions {
      if let Err(e) = self.function_stmt(function) { self.errors.push(e) }
    }

    debug!("returning clean scope with identifiers: {:?}",
      self.scopes.current_names().collect::<Vec<_>>());
    self.scopes.restore();
  }

  fn function_stmt(&mut self, f: &mut FunctionStmt) -> Result<()> {
    // the name is visible in the surrounding scope, as are calls to it
    self.declare(&f.name, f.ret.k)?;
    let sig = FnSig {
      name: f.name.name.clone(),
      ret: f.ret.k,
      args: f.args.iter().map(|a| (a.ty.k, a.name.name.clone())).collect(),
    };
    if !self.scopes.declare_function(sig) {
      return Err(self.error(format!("function '{}' already exists!", f.name.name), f.span))
    }
    let ret = f.ret.k;
    self.scoped(|this| {
      this.fn_stack.push(ret);
      let result = this.args_and_body(&mut f.args, &mut f.body);
      this.fn_stack.pop();
      result
    })
  }

  fn lifecycle_stmt(&mut self, l: &mut LifecycleStmt) -> Result<()> {
    let ret = self.types.type_ref("void");
    self.scoped(|this| {
      this.fn_stack.push(ret);
      let result = this.args_and_body(&mut l.args, &mut l.body);
      this.fn_stack.pop();
      result
    })
  }

  fn args_and_body(&mut self, args: &mut [Arg], body: &mut [Stmt]) -> Result<()> {
    for arg in args.iter_mut() {
      // parameters are passed by reference in the emitted C
      arg.ty.k.is_reference = true;
      self.declare(&arg.name, arg.ty.k)?;
    }
    for s in body { self.stmt(s) }
    Ok(())
  }

  fn return_stmt(&mut self, span: Span, value: &mut Option<Expr>) -> Result<()> {
    let ret = *self.fn_stack.last().expect("return statement outside of a function");
    let non_void = self.types[ret.id].non_void();
    match value {
      None if non_void =>
        return Err(self.error("non-void function expects a return value!".into(), span)),
      Some(v) if !non_void =>
        return Err(self.error("void function expects no return value!".into(), v.span)),
      Some(v) => {
        self.expr(v);
        if let Some(found) = Self::expr_type(v) {
          if self.check_types(ret, found, v.span).is_err() {
            return Err(self.error(format!(
              "expected return value of type '{}', but found '{}'!",
              self.keyword(ret), self.keyword(found)), v.span))
          }
          self.check_number_range(ret, v)?;
        }
      }
      None => {}
    }
    Ok(())
  }

  fn expr_inner(&mut self, expr: &mut Expr) -> Result<()> {
    let span = expr.span;
    match &mut expr.k {
      ExprKind::Binary(b) => {
        self.expr(&mut b.left);
        self.expr(&mut b.right);
        // comparison and logical operators keep the operand type as well
        expr.ty = self.check_expr_types(&b.left, &b.right, span)?;
      }
      ExprKind::Call(c) => expr.ty = Some(self.call_expr(span, c)?),
      ExprKind::Ident(ie) => expr.ty = Some(self.ident_expr(ie, None)?),
      ExprKind::StrEq(inner) => {
        self.expr(inner);
        expr.ty = inner.ty;
      }
      ExprKind::Str(s) => {
        for element in &mut s.elements {
          if let StrElem::Expr(e) = element { self.expr(e) }
        }
        expr.ty = Some(TypeRef::new(Types::STRING));
      }
      ExprKind::This(inner) => {
        self.expr(inner);
        expr.ty = inner.ty;
      }
      ExprKind::Token(token) => {
        expr.ty = Some(match &token.kind {
          TokenKind::Character(_) => TypeRef::new(Types::CHAR),
          // literals stay undetermined until they flow somewhere concrete
          TokenKind::Number(_) => TypeRef::new(Types::BASE),
          TokenKind::StringChars(_) => TypeRef::new(Types::STRING),
          TokenKind::Identifier(name) => self.lookup(token.span, name)?,
          TokenKind::True | TokenKind::False | TokenKind::Null => TypeRef::new(Types::BASE),
          k => unreachable!("token '{k}' in expression position"),
        });
      }
      ExprKind::Cast(c) => {
        self.expr(&mut c.inner);
        if let Some(inner) = Self::expr_type(&c.inner) {
          let castable = |id: TypeId| matches!(
            self.types[id].kind, TypeKind::Character | TypeKind::Numeric { .. });
          if !castable(inner.id) || !castable(c.target.k.id) {
            return Err(self.error(format!(
              "cannot type cast from '{}' to '{}'!",
              self.keyword(inner), self.keyword(c.target.k)), span))
          }
          expr.ty = Some(c.target.k);
        }
      }
      ExprKind::Unary(u) => {
        self.expr(&mut u.inner);
        if let Some(inner) = Self::expr_type(&u.inner) {
          if u.op != UnOp::Grouping && self.types[inner.id].numeric().is_none() {
            return Err(self.error(format!(
              "expected numeric type for unary expression '{}', found '{}'!",
              u.op.describe(), self.keyword(inner)), u.inner.span))
          }
          expr.ty = Some(inner);
        }
      }
    }
    Ok(())
  }

  /// Resolve an identifier: from the current scope chain, or from the
  /// receiver's class scope when resolving the inner part of a member
  /// chain.
  fn lookup(&self, span: Span, name: &str) -> Result<TypeRef> {
    self.scopes.lookup(name).ok_or_else(|| {
      self.error(format!("unknown identifier '{name}'!"), span)
    })
  }

  fn lookup_member(&self, recv: TypeRef, span: Span, name: &str) -> Result<TypeRef> {
    let resolved = match self.class_scopes.get(&recv.id) {
      // members of a class resolve inside its retained scope
      Some(&scope) => self.scopes.lookup_in(scope, name),
      None => self.scopes.lookup(name),
    };
    resolved.ok_or_else(|| self.error(format!("unknown identifier '{name}'!"), span))
  }

  /// Type an identifier expression, `recv` being the receiver type when
  /// this identifier is the inner part of a member chain.
  fn ident_expr(&mut self, ie: &mut IdentExpr, recv: Option<TypeRef>) -> Result<TypeRef> {
    let ty = match recv {
      Some(recv) => self.lookup_member(recv, ie.name.span, &ie.name.name)?,
      None => self.lookup(ie.name.span, &ie.name.name)?,
    };
    match self.types[ty.id].kind {
      TypeKind::Class => ie.class = Some(ty.id),
      TypeKind::List { .. } => ie.list = Some(ty.id),
      _ => {}
    }
    if let Some(inner) = &mut ie.inner {
      self.recv_stack.push(ty);
      match &mut inner.k {
        ExprKind::Ident(inner_ie) => {
          match self.ident_expr(inner_ie, Some(ty)) {
            Ok(t) => inner.ty = Some(t),
            Err(e) => self.errors.push(e),
          }
        }
        // a call terminates the chain; it resolves against the receiver
        ExprKind::Call(_) => self.expr(inner),
        _ => unreachable!("member chains contain identifiers and calls only"),
      }
      self.recv_stack.pop();
    }
    Ok(ty)
  }

  /// Type a call: a list or class method when a receiver is on the stack,
  /// a function in the scope chain otherwise.
  fn call_expr(&mut self, span: Span, c: &mut CallExpr) -> Result<TypeRef> {
    if let Some(&recv) = self.recv_stack.last() {
      match self.types[recv.id].kind {
        TypeKind::List { inner } => {
          // list method arguments are traversed but not matched against a
          // signature table
          for arg in &mut c.args { self.expr(arg) }
          if let Some(ret) = self.types.list_method(inner, &c.name.name) {
            return Ok(TypeRef::new(ret))
          }
        }
        TypeKind::Class => {
          c.class = Some(recv.id);
          if let Some(&scope) = self.class_scopes.get(&recv.id) {
            if let Some(sig) = self.scopes.function_in(scope, &c.name.name).cloned() {
              self.check_function(&sig, span, c)?;
              return Ok(sig.ret)
            }
          }
        }
        _ => {}
      }
      return Err(self.error(format!(
        "identifier '{}' of a '{}' is not callable!",
        c.name.name, self.keyword(recv)), c.name.span))
    }

    if let Some(sig) = self.scopes.function(&c.name.name).cloned() {
      self.check_function(&sig, span, c)?;
      return Ok(sig.ret)
    }
    Err(self.error(format!("identifier '{}' is not callable!", c.name.name), c.name.span))
  }

  /// Check a call against a declared signature: exact arity, and every
  /// argument compatible with its parameter type.
  fn check_function(&mut self, sig: &FnSig, span: Span, c: &mut CallExpr) -> Result<()> {
    if sig.args.len() != c.args.len() {
      return Err(self.error(format!(
        "'{}' expected {} argument(s), but {} were passed!",
        c.name.name, sig.args.len(), c.args.len()), span))
    }
    for (index, ((required, _), arg)) in sig.args.iter().zip(&mut c.args).enumerate() {
      self.expr(arg);
      if let Some(passed) = Self::expr_type(arg) {
        if self.check_types(*required, passed, arg.span).is_err() {
          return Err(self.error(format!(
            "expected 'argument {}' of type '{}', but found '{}'!",
            index + 1, self.keyword(*required), self.keyword(passed)), arg.span))
        }
        self.check_number_range(*required, arg)?;
      }
    }
    Ok(())
  }
}

/// Assert that the typing pass left no reachable expression without a
/// resolved type. This is a structural bug detector: it must hold for any
/// accepted program, and a violation is a compiler bug.
pub fn verify_types(ast: &Ast) {
  for stmt in &ast.stmts { verify_stmt(stmt) }
}

fn verify_stmt(stmt: &Stmt) {
  match &stmt.k {
    StmtKind::Assign(a) => {
      verify_expr(&a.lhs);
      verify_expr(&a.value);
    }
    StmtKind::Break | StmtKind::Breakall(_) | StmtKind::Continue => {}
    StmtKind::Class(c) => {
      if let Some(constructor) = &c.constructor {
        for s in &constructor.body { verify_stmt(s) }
      }
      if let Some(destructor) = &c.destructor {
        for s in &destructor.body { verify_stmt(s) }
      }
      for f in &c.functions {
        for s in &f.body { verify_stmt(s) }
      }
      for v in &c.variables { verify_stmt(v) }
    }
    StmtKind::Expr(e) => verify_expr(e),
    StmtKind::For(f) => {
      if let Some(check) = &f.check { verify_expr(check) }
      if let Some(init) = &f.init { verify_stmt(init) }
      if let Some(step) = &f.step { verify_stmt(step) }
      for s in &f.body { verify_stmt(s) }
    }
    StmtKind::Function(f) => for s in &f.body { verify_stmt(s) },
    StmtKind::If(i) => {
      verify_expr(&i.cond);
      for s in &i.body { verify_stmt(s) }
      for (cond, body) in &i.else_ifs {
        verify_expr(cond);
        for s in body { verify_stmt(s) }
      }
      if let Some(body) = &i.else_body {
        for s in body { verify_stmt(s) }
      }
    }
    StmtKind::List(_) => {}
    StmtKind::Print(p) => verify_expr(&p.value),
    StmtKind::Return(value) => {
      if let Some(value) = value { verify_expr(value) }
    }
    StmtKind::VarDecl(v) => {
      if let Some(init) = &v.init { verify_expr(init) }
    }
  }
}

fn verify_expr(expr: &Expr) {
  assert!(expr.ty.is_some(),
    "expression at offset {} has no resolved type after the typing pass", expr.span.start);
  match &expr.k {
    ExprKind::Binary(b) => {
      verify_expr(&b.left);
      verify_expr(&b.right);
    }
    ExprKind::Call(c) => for arg in &c.args { verify_expr(arg) },
    ExprKind::Ident(ie) => {
      if let Some(inner) = &ie.inner { verify_expr(inner) }
    }
    ExprKind::StrEq(inner) => verify_expr(inner),
    ExprKind::Str(s) => for element in &s.elements {
      if let StrElem::Expr(e) = element { verify_expr(e) }
    },
    ExprKind::This(inner) => verify_expr(inner),
    ExprKind::Token(_) => {}
    ExprKind::Cast(c) => verify_expr(&c.inner),
    ExprKind::Unary(u) => verify_expr(&u.inner),
  }
}
