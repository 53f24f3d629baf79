//! Build the AST from the token stream.
//!
//! The parser is recursive-descent over a random-access token buffer, with
//! a precedence ladder for expressions (logical, comparison, additive,
//! multiplicative, primary; all binary operators left-associative). It
//! never backtracks past a consumed token; speculation is limited to one
//! or two tokens of lookahead. Recovery is per statement: on an error the
//! parser skips to the next newline, drops any residual indentation
//! markers, and continues, so every erroneous statement yields exactly one
//! diagnostic.

use std::path::PathBuf;
use if_chain::if_chain;
use crate::errors::{ErrorKind, TaplError};
use crate::token::{Token, TokenKind};
use crate::types::ast::*;
use crate::types::{Span, Spanned, TypeId, TypeKind, TypeRef, Types};

/// The parser state over one token stream.
pub struct AstBuilder<'a> {
  tokens: &'a [Token],
  types: &'a Types,
  filename: PathBuf,
  index: usize,
  /// True while parsing a function or lifecycle body; gates `return`.
  in_function: bool,
  /// Nesting depth of the loop currently being parsed; gates `break`,
  /// `breakall` and `continue`.
  loop_count: u32,
  /// The label of the outermost loop of the current nest, shared by every
  /// `breakall` inside it.
  breakall_label: String,
  /// The class currently being parsed; gates `this` and tags methods.
  class_type: Option<TypeId>,
}

type Result<T, E = TaplError> = std::result::Result<T, E>;

impl<'a> AstBuilder<'a> {
  /// Construct a parser over a token stream whose last token is `Eof`.
  #[must_use] pub fn new(filename: PathBuf, tokens: &'a [Token], types: &'a Types) -> Self {
    assert!(!tokens.is_empty(), "token stream must at least contain an EOF token");
    Self {
      tokens, types, filename,
      index: 0,
      in_function: false,
      loop_count: 0,
      breakall_label: "breakall".into(),
      class_type: None,
    }
  }

  /// Parse the whole token stream. All statement errors are accumulated;
  /// any error at end of input fails the parse.
  pub fn generate(mut self) -> Result<Ast, Vec<TaplError>> {
    let mut ast = Ast::new(self.filename.clone());
    let mut errors = Vec::new();
    while !self.is_at_end() {
      match self.statement(true) {
        Ok(stmt) => ast.stmts.push(stmt),
        Err(e) => {
          errors.push(e);
          // discard tokens until the next statement boundary
          while self.match_any(&[TokenKind::Newline, TokenKind::Eof]).is_none() {
            if self.consume().is_err() { break }
          }
          if self.is_at_end() { break }
          // also drop any residual indentation markers
          while self.match_any(&[TokenKind::Indent, TokenKind::Dedent]).is_some() {}
        }
      }
    }
    if errors.is_empty() { Ok(ast) } else { Err(errors) }
  }

  fn at(&self, index: usize) -> &Token {
    self.tokens.get(index).unwrap_or_else(|| self.tokens.last().expect("nonempty"))
  }

  /// The token at the current location.
  fn current(&self) -> &Token { self.at(self.index) }

  /// The token `offset` places after the current location, clamped to the
  /// trailing `Eof`.
  fn next(&self, offset: usize) -> &Token { self.at(self.index + offset) }

  /// The most recently consumed token.
  fn previous(&self) -> &Token {
    assert!(self.index > 0, "no tokens have been consumed yet");
    self.at(self.index - 1)
  }

  fn is_at_end(&self) -> bool {
    self.index >= self.tokens.len() || self.current().kind == TokenKind::Eof
  }

  /// Consume the token at the current location.
  fn consume(&mut self) -> Result<Token> {
    if self.index >= self.tokens.len() {
      return Err(self.error("unexpected end-of-file, can't consume more tokens!"))
    }
    self.index += 1;
    Ok(self.previous().clone())
  }

  /// Consume and return the current token if its kind equals `kind`.
  /// Only meaningful for payload-free kinds.
  fn match_tok(&mut self, kind: TokenKind) -> Option<Token> {
    self.match_any(std::slice::from_ref(&kind))
  }

  fn match_any(&mut self, kinds: &[TokenKind]) -> Option<Token> {
    if kinds.contains(&self.current().kind) {
      self.index += 1;
      return Some(self.previous().clone())
    }
    None
  }

  fn expect(&mut self, kind: TokenKind) -> Result<Token> {
    self.match_tok(kind.clone()).ok_or_else(|| {
      self.error(format!("expected '{kind}' but found '{}'!", self.current()))
    })
  }

  fn match_identifier(&mut self) -> Option<Ident> {
    if let TokenKind::Identifier(name) = &self.current().kind {
      let ident = Ident { span: self.current().span, name: name.clone() };
      self.index += 1;
      return Some(ident)
    }
    None
  }

  fn expect_identifier(&mut self) -> Result<Ident> {
    self.match_identifier().ok_or_else(|| {
      self.error(format!("expected an identifier but found '{}'!", self.current()))
    })
  }

  fn match_type(&mut self) -> Option<Spanned<TypeId>> {
    if let TokenKind::Type(id) = self.current().kind {
      let ty = Spanned::new(self.current().span, id);
      self.index += 1;
      return Some(ty)
    }
    None
  }

  fn expect_type(&mut self) -> Result<Spanned<TypeId>> {
    self.match_type().ok_or_else(|| {
      self.error(format!("expected a type but found '{}'!", self.current()))
    })
  }

  fn expect_newline(&mut self, what: &str, must_end_with_newline: bool) -> Result<()> {
    if !must_end_with_newline { return Ok(()) }
    if self.match_any(&[TokenKind::Newline, TokenKind::Eof]).is_none() {
      return Err(self.error(format!(
        "expected a newline or End-Of-File after {what}, found '{}'!", self.current())))
    }
    Ok(())
  }

  /// Construct a syntax error at the current (or last consumed) token.
  fn error(&self, message: impl Into<String>) -> TaplError {
    let span = if self.index < self.tokens.len() {
      Some(self.current().span)
    } else if self.index > 0 {
      Some(self.previous().span)
    } else {
      None
    };
    TaplError::new(ErrorKind::Ast, message, span, self.filename.clone())
  }

  /// Consume the indent opening a block, if there is one.
  fn has_indent(&mut self) -> bool {
    !self.is_at_end() && self.match_tok(TokenKind::Indent).is_some()
  }

  /// The label a `breakall` in the current nest jumps to; only the
  /// outermost loop materialises it.
  fn breakall_label(&self) -> Option<String> {
    if self.loop_count == 0 { Some(self.breakall_label.clone()) } else { None }
  }

  fn set_breakall_label(&mut self, loop_token: &Token) {
    if self.loop_count == 0 {
      self.breakall_label = format!("breakall_{}", loop_token.span.start);
    }
  }

  /// A statement block: empty, or an indent followed by statements until
  /// the matching dedent.
  fn statement_block(&mut self) -> Result<Vec<Stmt>> {
    if !self.has_indent() { return Ok(Vec::new()) }
    let mut statements = Vec::new();
    while self.match_tok(TokenKind::Dedent).is_none() {
      statements.push(self.statement(true)?);
    }
    Ok(statements)
  }

  /// A statement block inside a loop body, where the loop control
  /// statements become legal.
  fn statement_block_in_loop(&mut self) -> Result<Vec<Stmt>> {
    self.loop_count += 1;
    let statements = self.statement_block();
    self.loop_count -= 1;
    statements
  }

  fn block_span(base: Span, statements: &[Stmt]) -> Span {
    statements.iter().fold(base, |span, s| span + s.span)
  }

  /// Parse one statement of any kind, dispatched on the leading token.
  pub fn statement(&mut self, must_end_with_newline: bool) -> Result<Stmt> {
    if let Some(stmt) = self.type_statement(must_end_with_newline)? { return Ok(stmt) }
    if matches!(self.current().kind, TokenKind::Return) { return self.return_statement() }
    if matches!(self.current().kind, TokenKind::Print | TokenKind::Println) {
      return self.print_statement()
    }
    if matches!(self.current().kind, TokenKind::If) { return self.if_statement() }
    if matches!(self.current().kind, TokenKind::For) { return self.for_loop_statement() }
    if matches!(self.current().kind, TokenKind::While) { return self.while_loop_statement() }
    if matches!(self.current().kind, TokenKind::Class) { return self.class_statement() }
    if let Some(stmt) = self.loop_control_statement()? { return Ok(stmt) }

    // fall back to a bare expression, which may turn out to head an
    // assignment statement
    let expression = self.expression()?;
    self.assignment_statement(expression, must_end_with_newline)
  }

  /// A statement starting with a type: a function declaration when the
  /// identifier is followed by `(`, a variable or list declaration
  /// otherwise.
  fn type_statement(&mut self, must_end_with_newline: bool) -> Result<Option<Stmt>> {
    if_chain! {
      if let TokenKind::Type(_) = self.current().kind;
      if let TokenKind::Identifier(_) = self.next(1).kind;
      then {
        if self.next(2).kind == TokenKind::ParenOpen {
          return Ok(Some(self.function_statement()?))
        }
        Ok(Some(self.var_decl_statement(must_end_with_newline)?))
      } else {
        Ok(None)
      }
    }
  }

  fn var_decl_statement(&mut self, must_end_with_newline: bool) -> Result<Stmt> {
    // type_statement already checked the tokens, so consume directly
    let ty = self.match_type().expect("checked");
    let name = self.expect_identifier()?;

    let mut init = None;
    if self.match_tok(TokenKind::Equal).is_some() {
      init = Some(self.expression()?);
    }
    self.expect_newline("statement", must_end_with_newline)?;

    let mut span = ty.span + name.span;
    if let Some(init) = &init { span += init.span }
    if matches!(self.types[ty.k].kind, TypeKind::List { .. }) {
      let list = ListStmt { ty: Spanned::new(ty.span, TypeRef::new(ty.k)), name };
      return Ok(Stmt::new(span, StmtKind::List(list)))
    }
    Ok(Stmt::new(span, StmtKind::VarDecl(Box::new(VarDeclStmt {
      ty: Spanned::new(ty.span, TypeRef::new(ty.k)), name, init,
    }))))
  }

  /// Consume a parenthesised `type name, ...` argument list into `args`,
  /// growing `span` over the consumed tokens.
  fn argument_list(&mut self, args: &mut Vec<Arg>, span: &mut Span) -> Result<()> {
    self.expect(TokenKind::ParenOpen)?;
    if self.match_tok(TokenKind::ParenClose).is_some() { return Ok(()) }
    loop {
      let ty = self.expect_type()?;
      if !self.types[ty.k].non_void() {
        return Err(self.error("function arguments cannot be of type void!"))
      }
      let name = self.expect_identifier()?;
      *span += ty.span + name.span;
      args.push(Arg { ty: Spanned::new(ty.span, TypeRef::new(ty.k)), name });
      if self.match_tok(TokenKind::Comma).is_none() { break }
    }
    self.expect(TokenKind::ParenClose)?;
    Ok(())
  }

  /// The `: NEWLINE block` tail shared by function and lifecycle bodies,
  /// with `return` made legal inside.
  fn function_body(&mut self) -> Result<Vec<Stmt>> {
    self.expect(TokenKind::Colon)?;
    self.expect_newline("statement", true)?;
    let saved = std::mem::replace(&mut self.in_function, true);
    let body = self.statement_block();
    self.in_function = saved;
    body
  }

  fn function_statement(&mut self) -> Result<Stmt> {
    // type_statement already checked the tokens, so consume directly
    let ret = self.match_type().expect("checked");
    let name = self.expect_identifier()?;
    let mut span = ret.span + name.span;
    let mut args = Vec::new();
    self.argument_list(&mut args, &mut span)?;
    let body = self.function_body()?;
    span = Self::block_span(span, &body);
    Ok(Stmt::new(span, StmtKind::Function(Box::new(FunctionStmt {
      span,
      ret: Spanned::new(ret.span, TypeRef::new(ret.k)),
      name,
      class: self.class_type,
      args,
      body,
    }))))
  }

  fn return_statement(&mut self) -> Result<Stmt> {
    let token = self.consume()?;
    if !self.in_function {
      return Err(self.error("return statement is not allowed here!"))
    }
    // a bare `return` ends the line immediately
    if self.match_any(&[TokenKind::Newline, TokenKind::Eof]).is_some() {
      return Ok(Stmt::new(token.span, StmtKind::Return(None)))
    }
    let value = self.expression()?;
    self.expect_newline("statement", true)?;
    let span = token.span + value.span;
    Ok(Stmt::new(span, StmtKind::Return(Some(value))))
  }

  fn print_statement(&mut self) -> Result<Stmt> {
    let token = self.consume()?;
    let newline = token.kind == TokenKind::Println;
    self.expect(TokenKind::ParenOpen)?;
    let value = self.expression()?;
    self.expect(TokenKind::ParenClose)?;
    self.expect_newline("statement", true)?;
    let span = token.span + value.span;
    Ok(Stmt::new(span, StmtKind::Print(PrintStmt { newline, value })))
  }

  /// An `if expr:` head plus its block.
  fn if_block(&mut self) -> Result<(Expr, Vec<Stmt>)> {
    let cond = self.expression()?;
    self.expect(TokenKind::Colon)?;
    self.expect_newline("statement", true)?;
    let body = self.statement_block()?;
    Ok((cond, body))
  }

  fn if_statement(&mut self) -> Result<Stmt> {
    let token = self.consume()?;
    let (cond, body) = self.if_block()?;
    let mut span = Self::block_span(token.span + cond.span, &body);
    let mut stmt = IfStmt { cond, body, else_ifs: Vec::new(), else_body: None };
    if self.is_at_end() {
      return Ok(Stmt::new(span, StmtKind::If(Box::new(stmt))))
    }

    while let Some(else_token) = self.match_tok(TokenKind::Else) {
      span += else_token.span;
      if self.match_tok(TokenKind::If).is_some() {
        let (cond, body) = self.if_block()?;
        span = Self::block_span(span + cond.span, &body);
        stmt.else_ifs.push((cond, body));
      } else {
        // a bare else closes the chain
        self.expect(TokenKind::Colon)?;
        self.expect_newline("statement", true)?;
        let body = self.statement_block()?;
        span = Self::block_span(span, &body);
        stmt.else_body = Some(body);
        break
      }
    }
    Ok(Stmt::new(span, StmtKind::If(Box::new(stmt))))
  }

  fn for_loop_statement(&mut self) -> Result<Stmt> {
    let token = self.consume()?;
    self.set_breakall_label(&token);
    self.expect(TokenKind::ParenOpen)?;

    // each of the three loop-head components is independently optional
    let mut init = None;
    if self.match_tok(TokenKind::Semicolon).is_none() {
      init = Some(self.statement(false)?);
      self.expect(TokenKind::Semicolon)?;
    }
    let mut check = None;
    if self.match_tok(TokenKind::Semicolon).is_none() {
      check = Some(self.expression()?);
      self.expect(TokenKind::Semicolon)?;
    }
    let mut step = None;
    if self.match_tok(TokenKind::ParenClose).is_none() {
      step = Some(self.statement(false)?);
      self.expect(TokenKind::ParenClose)?;
    }
    self.expect(TokenKind::Colon)?;
    self.expect_newline("statement", true)?;

    let body = self.statement_block_in_loop()?;
    let mut span = token.span;
    if let Some(init) = &init { span += init.span }
    if let Some(check) = &check { span += check.span }
    if let Some(step) = &step { span += step.span }
    span = Self::block_span(span, &body);
    Ok(Stmt::new(span, StmtKind::For(Box::new(ForStmt {
      breakall_label: self.breakall_label(), init, check, step, body,
    }))))
  }

  /// A `while expr:` loop, lowered to a `for` with only a check.
  fn while_loop_statement(&mut self) -> Result<Stmt> {
    let token = self.consume()?;
    self.set_breakall_label(&token);
    let check = self.expression()?;
    self.expect(TokenKind::Colon)?;
    self.expect_newline("statement", true)?;
    let body = self.statement_block_in_loop()?;
    let span = Self::block_span(token.span + check.span, &body);
    Ok(Stmt::new(span, StmtKind::For(Box::new(ForStmt {
      breakall_label: self.breakall_label(),
      init: None,
      check: Some(check),
      step: None,
      body,
    }))))
  }

  /// A constructor member: the class name heading an argument list.
  fn constructor(&mut self, class: TypeId) -> Result<LifecycleStmt> {
    let name = self.match_type().expect("checked");
    if name.k != class {
      return Err(self.error(format!(
        "expected {} in constructor, but found {}!",
        self.types[class].keyword, self.types[name.k].keyword)))
    }
    let mut span = name.span;
    let mut args = Vec::new();
    self.argument_list(&mut args, &mut span)?;
    let body = self.function_body()?;
    let span = Self::block_span(span, &body);
    Ok(LifecycleStmt { span, kind: LifecycleKind::Constructor, class, args, body })
  }

  /// A destructor member: `~ClassName()` with no arguments.
  fn destructor(&mut self, class: TypeId) -> Result<LifecycleStmt> {
    let tilde = self.consume()?;
    let Some(name) = self.match_type() else {
      return Err(self.error(format!("expected {} in destructor!", self.types[class].keyword)))
    };
    if name.k != class {
      return Err(self.error(format!(
        "expected {} in destructor, but found {}!",
        self.types[class].keyword, self.types[name.k].keyword)))
    }
    self.expect(TokenKind::ParenOpen)?;
    self.expect(TokenKind::ParenClose)?;
    let body = self.function_body()?;
    let span = Self::block_span(tilde.span + name.span, &body);
    Ok(LifecycleStmt { span, kind: LifecycleKind::Destructor, class, args: Vec::new(), body })
  }

  fn class_statement(&mut self) -> Result<Stmt> {
    let token = self.consume()?;
    let name = self.expect_type()?;
    assert!(matches!(self.types[name.k].kind, TypeKind::Class),
      "tokeniser resolved a class name to a non-class type");
    let mut span = token.span + name.span;
    self.expect(TokenKind::Colon)?;
    self.expect_newline("statement", true)?;

    let mut class = ClassStmt {
      class: name.k,
      variables: Vec::new(),
      functions: Vec::new(),
      constructor: None,
      destructor: None,
    };
    if !self.has_indent() {
      // an empty class without any members
      return Ok(Stmt::new(span, StmtKind::Class(Box::new(class))))
    }

    // class-specific syntax (`this`, method tagging) is legal inside
    let saved = self.class_type.replace(name.k);
    let result = self.class_members(name.k, &mut class, &mut span);
    self.class_type = saved;
    result?;
    Ok(Stmt::new(span, StmtKind::Class(Box::new(class))))
  }

  fn class_members(&mut self, id: TypeId, class: &mut ClassStmt, span: &mut Span) -> Result<()> {
    while self.match_tok(TokenKind::Dedent).is_none() {
      // a member starting `type identifier` is a method or a field
      if let Some(stmt) = self.type_statement(true)? {
        *span += stmt.span;
        match stmt.k {
          StmtKind::Function(f) => class.functions.push(*f),
          StmtKind::VarDecl(_) | StmtKind::List(_) => class.variables.push(stmt),
          _ => unreachable!("type_statement returned a non-member statement"),
        }
        continue
      }

      // a member starting with the bare class type is the constructor
      if matches!(self.current().kind, TokenKind::Type(_)) {
        let constructor = self.constructor(id)?;
        if class.constructor.is_some() {
          let keyword = &self.types[id].keyword;
          return Err(TaplError::new(ErrorKind::Ast,
            format!("found a {keyword} constructor while another constructor was already found!"),
            Some(constructor.span), self.filename.clone()))
        }
        *span += constructor.span;
        class.constructor = Some(constructor);
        continue
      }

      if matches!(self.current().kind, TokenKind::Tilde) {
        let destructor = self.destructor(id)?;
        if class.destructor.is_some() {
          let keyword = &self.types[id].keyword;
          return Err(TaplError::new(ErrorKind::Ast,
            format!("found a {keyword} destructor while another destructor was already found!"),
            Some(destructor.span), self.filename.clone()))
        }
        *span += destructor.span;
        class.destructor = Some(destructor);
        continue
      }

      return Err(self.error(format!(
        "expected a function, variable declaration, constructor or destructor, found '{}'",
        self.current())))
    }
    Ok(())
  }

  /// `break`, `breakall` and `continue`, legal only inside a loop body.
  fn loop_control_statement(&mut self) -> Result<Option<Stmt>> {
    if self.loop_count == 0 { return Ok(None) }

    if let Some(token) = self.match_tok(TokenKind::Break) {
      self.expect_newline("break", true)?;
      return Ok(Some(Stmt::new(token.span, StmtKind::Break)))
    }
    if let Some(token) = self.match_tok(TokenKind::Breakall) {
      self.expect_newline("breakall", true)?;
      return Ok(Some(Stmt::new(token.span, StmtKind::Breakall(self.breakall_label.clone()))))
    }
    if let Some(token) = self.match_tok(TokenKind::Continue) {
      self.expect_newline("continue", true)?;
      return Ok(Some(Stmt::new(token.span, StmtKind::Continue)))
    }
    Ok(None)
  }

  /// Turn a parsed expression into an assignment statement when an
  /// assignment-form operator follows a `this` or identifier expression,
  /// and into a bare expression statement otherwise.
  fn assignment_statement(
    &mut self, expression: Expr, must_end_with_newline: bool,
  ) -> Result<Stmt> {
    let assignable = matches!(expression.k, ExprKind::This(_) | ExprKind::Ident(_));
    if !assignable || !self.current().kind.is_assignment_form() {
      self.expect_newline("expression", must_end_with_newline)?;
      let span = expression.span;
      return Ok(Stmt::new(span, StmtKind::Expr(expression)))
    }

    let op = self.consume()?;
    let value = self.expression()?;
    self.expect_newline("statement", must_end_with_newline)?;
    let span = expression.span + value.span;
    Ok(Stmt::new(span, StmtKind::Assign(Box::new(AssignStmt {
      lhs: expression, op, value,
    }))))
  }

  /// Parse an expression, starting at the lowest precedence level.
  pub fn expression(&mut self) -> Result<Expr> {
    self.boolean()
  }

  /// `&&` and `||`, the lowest precedence level.
  fn boolean(&mut self) -> Result<Expr> {
    let mut expression = self.comparison()?;
    while let Some(op) = self.match_any(&[TokenKind::AndAnd, TokenKind::OrOr]) {
      let right = self.comparison()?;
      expression = Self::binary(expression, op, right);
    }
    Ok(expression)
  }

  fn comparison(&mut self) -> Result<Expr> {
    let mut expression = self.additive()?;
    while let Some(op) = self.match_any(&[
      TokenKind::EqualEqual, TokenKind::Greater, TokenKind::GreaterEqual,
      TokenKind::Less, TokenKind::LessEqual, TokenKind::NotEqual,
    ]) {
      let right = self.additive()?;
      expression = Self::binary(expression, op, right);
    }
    Ok(expression)
  }

  fn additive(&mut self) -> Result<Expr> {
    let mut expression = self.multiplicative()?;
    while let Some(op) = self.match_any(&[TokenKind::Plus, TokenKind::Minus]) {
      let right = self.multiplicative()?;
      expression = Self::binary(expression, op, right);
    }
    Ok(expression)
  }

  fn multiplicative(&mut self) -> Result<Expr> {
    let mut expression = self.primary()?;
    while let Some(op) = self.match_any(&[TokenKind::Star, TokenKind::Slash]) {
      let right = self.primary()?;
      expression = Self::binary(expression, op, right);
    }
    Ok(expression)
  }

  fn binary(left: Expr, op: Token, right: Expr) -> Expr {
    let span = left.span + op.span + right.span;
    Expr::new(span, ExprKind::Binary(Box::new(BinaryExpr { op, left, right })))
  }

  fn unary(op: UnOp, span: Span, inner: Expr) -> Expr {
    Expr::new(span, ExprKind::Unary(Box::new(UnaryExpr { op, inner })))
  }

  /// A primary expression: literals, groupings and casts, unary operators,
  /// identifiers and `this` chains.
  fn primary(&mut self) -> Result<Expr> {
    // the primary keywords and literal tokens become token expressions
    if let Some(token) = self.match_any(&[TokenKind::False, TokenKind::Null, TokenKind::True]) {
      return Ok(Expr::new(token.span, ExprKind::Token(token)))
    }
    if matches!(self.current().kind, TokenKind::Character(_) | TokenKind::Number(_)) {
      let token = self.consume()?;
      return Ok(Expr::new(token.span, ExprKind::Token(token)))
    }
    if matches!(self.current().kind, TokenKind::StringStart) {
      return self.string_expression()
    }

    // a parenthesis opens a type cast or a grouping
    if let Some(paren_open) = self.match_tok(TokenKind::ParenOpen) {
      if let Some(target) = self.match_type() {
        self.expect(TokenKind::ParenClose)?;
        let inner = self.primary()?;
        let span = paren_open.span + inner.span;
        return Ok(Expr::new(span, ExprKind::Cast(Box::new(CastExpr {
          target: Spanned::new(target.span, TypeRef::new(target.k)), inner,
        }))))
      }
      let inner = self.expression()?;
      let paren_close = self.match_tok(TokenKind::ParenClose).ok_or_else(|| {
        self.error(format!("expected closing parenthesis, but found '{}'!", self.current()))
      })?;
      return Ok(Self::unary(UnOp::Grouping, paren_open.span + paren_close.span, inner))
    }

    if let Some(token) = self.match_tok(TokenKind::Not) {
      let inner = self.primary()?;
      let span = token.span + inner.span;
      return Ok(Self::unary(UnOp::Not, span, inner))
    }
    if let Some(token) = self.match_tok(TokenKind::Minus) {
      let inner = self.primary()?;
      let span = token.span + inner.span;
      return Ok(Self::unary(UnOp::Minus, span, inner))
    }

    // pre-increment and pre-decrement apply to a bare identifier
    if let Some(token) = self.match_tok(TokenKind::Increment) {
      let ident = self.expect_identifier()?;
      let span = token.span + ident.span;
      let inner = Expr::new(ident.span,
        ExprKind::Token(Token::new(ident.span, TokenKind::Identifier(ident.name))));
      return Ok(Self::unary(UnOp::PreIncrement, span, inner))
    }
    if let Some(token) = self.match_tok(TokenKind::Decrement) {
      let ident = self.expect_identifier()?;
      let span = token.span + ident.span;
      let inner = Expr::new(ident.span,
        ExprKind::Token(Token::new(ident.span, TokenKind::Identifier(ident.name))));
      return Ok(Self::unary(UnOp::PreDecrement, span, inner))
    }

    if let Some(ident) = self.match_identifier() {
      return self.identifier_expression(ident)
    }

    if let Some(this) = self.match_tok(TokenKind::This) {
      if self.class_type.is_none() {
        return Err(self.error("found 'this' while not in a class!"))
      }
      self.expect(TokenKind::Dot)?;
      let ident = self.expect_identifier()?;
      let inner = self.identifier_expression(ident)?;
      let span = this.span + inner.span;
      return Ok(Expr::new(span, ExprKind::This(Box::new(inner))))
    }

    Err(self.error(format!("expected an expression, found '{}'!", self.current())))
  }

  /// The tail of an identifier: post-increment/decrement, a call, or a
  /// `.`-joined member chain.
  fn identifier_expression(&mut self, ident: Ident) -> Result<Expr> {
    if let Some(token) = self.match_tok(TokenKind::Increment) {
      let span = ident.span + token.span;
      let inner = Expr::new(ident.span, ExprKind::Ident(Box::new(IdentExpr {
        name: ident, inner: None, class: None, list: None,
      })));
      return Ok(Self::unary(UnOp::PostIncrement, span, inner))
    }
    if let Some(token) = self.match_tok(TokenKind::Decrement) {
      let span = ident.span + token.span;
      let inner = Expr::new(ident.span, ExprKind::Ident(Box::new(IdentExpr {
        name: ident, inner: None, class: None, list: None,
      })));
      return Ok(Self::unary(UnOp::PostDecrement, span, inner))
    }

    if self.match_tok(TokenKind::ParenOpen).is_some() {
      return self.call_expression(ident)
    }

    let mut inner = None;
    let mut span = ident.span;
    if self.match_tok(TokenKind::Dot).is_some() {
      let inner_ident = self.expect_identifier()?;
      let inner_expr = self.identifier_expression(inner_ident)?;
      span += inner_expr.span;
      inner = Some(inner_expr);
    }
    Ok(Expr::new(span, ExprKind::Ident(Box::new(IdentExpr {
      name: ident, inner, class: None, list: None,
    }))))
  }

  /// The argument list of a call; the opening parenthesis is consumed.
  fn call_expression(&mut self, name: Ident) -> Result<Expr> {
    if let Some(paren_close) = self.match_tok(TokenKind::ParenClose) {
      let span = name.span + paren_close.span;
      return Ok(Expr::new(span, ExprKind::Call(Box::new(CallExpr {
        name, class: self.class_type, args: Vec::new(),
      }))))
    }

    let mut args = Vec::new();
    loop {
      args.push(self.expression()?);
      if self.match_tok(TokenKind::Comma).is_none() { break }
    }
    let paren_close = self.expect(TokenKind::ParenClose)?;
    let span = name.span + paren_close.span;
    Ok(Expr::new(span, ExprKind::Call(Box::new(CallExpr {
      name, class: self.class_type, args,
    }))))
  }

  /// Collect the pieces of an interpolated string until the closing quote:
  /// character runs, `{expr}` embeddings, and `{expr=}` labelled values.
  fn string_expression(&mut self) -> Result<Expr> {
    let start = self.consume()?;
    let mut span = start.span;
    let mut elements = vec![StrElem::Token(start)];
    loop {
      let token = self.consume()?;
      span += token.span;
      let kind = token.kind.clone();
      elements.push(StrElem::Token(token));
      if kind == TokenKind::StringEnd { break }
      if kind == TokenKind::StringExprStart {
        let expression = self.expression()?;
        span += expression.span;
        if self.match_tok(TokenKind::StringExprEnd).is_some() {
          // a plain embedded expression
          elements.push(StrElem::Expr(expression));
        } else if let Some(equal) = self.match_tok(TokenKind::Equal) {
          // the `{expr=}` form prints the source text and the value
          let eq_span = expression.span + equal.span;
          span += eq_span;
          elements.push(StrElem::Expr(
            Expr::new(eq_span, ExprKind::StrEq(Box::new(expression)))));
        }
        // further format modifiers would be handled here
      }
    }
    Ok(Expr::new(span, ExprKind::Str(StringExpr { elements })))
  }
}
