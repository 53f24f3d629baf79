//! The abstract syntax tree built by [`build_ast`](crate::build_ast) and
//! annotated by the semantic passes.
//!
//! Statements and expressions are two tagged-variant families; every node
//! carries the source span it covers. Expressions additionally carry a
//! type slot, `None` until the typing pass resolves it. The emitter reads
//! the tree without mutating it.

use std::path::PathBuf;
use crate::token::Token;
use crate::types::{Span, Spanned, TypeId, TypeRef};

/// The root of a parsed program: the source filename plus the top-level
/// statement list.
#[derive(Debug)]
pub struct Ast {
  /// The source file the program was lexed from.
  pub filename: PathBuf,
  /// The top-level statements, in source order.
  pub stmts: Vec<Stmt>,
}

impl Ast {
  /// An empty program for the given source file.
  #[must_use] pub fn new(filename: PathBuf) -> Self { Self { filename, stmts: Vec::new() } }
}

/// An identifier occurrence.
#[derive(Clone, Debug)]
pub struct Ident {
  pub span: Span,
  pub name: String,
}

/// A `type name` argument of a function or lifecycle declaration.
#[derive(Debug)]
pub struct Arg {
  /// The declared type. The typing pass marks it as a reference.
  pub ty: Spanned<TypeRef>,
  pub name: Ident,
}

/// A statement, with the span it covers.
#[derive(Debug)]
pub struct Stmt {
  pub span: Span,
  pub k: StmtKind,
}

impl Stmt {
  #[must_use] pub fn new(span: Span, k: StmtKind) -> Self { Self { span, k } }
}

/// The statement variants of the language.
#[derive(Debug)]
pub enum StmtKind {
  /// `lhs = value` and the compound forms; the left side is a `this` or
  /// identifier expression.
  Assign(Box<AssignStmt>),
  /// `break` out of the innermost loop.
  Break,
  /// `breakall` out of the whole loop nest, via the recorded label.
  Breakall(String),
  /// A `class Name:` declaration with its members.
  Class(Box<ClassStmt>),
  /// `continue` with the innermost loop.
  Continue,
  /// A bare expression in statement position.
  Expr(Expr),
  /// A `for(init; check; step):` loop; `while` lowers to this as well.
  For(Box<ForStmt>),
  /// A free function or method declaration.
  Function(Box<FunctionStmt>),
  /// An `if:`/`else if:`/`else:` chain.
  If(Box<IfStmt>),
  /// A `list[T] name` declaration.
  List(ListStmt),
  /// `print(value)` or `println(value)`.
  Print(PrintStmt),
  /// `return` with an optional value; only legal inside a function body.
  Return(Option<Expr>),
  /// A `type name [= init]` declaration.
  VarDecl(Box<VarDeclStmt>),
}

#[derive(Debug)]
pub struct AssignStmt {
  /// The assigned location; a `this` or identifier expression.
  pub lhs: Expr,
  /// The assignment operator token (`=`, `+=`, `-=`, `*=`, `/=`).
  pub op: Token,
  pub value: Expr,
}

#[derive(Debug)]
pub struct ClassStmt {
  /// The class type, interned in the registry.
  pub class: TypeId,
  /// Member variable and list declarations, in source order.
  pub variables: Vec<Stmt>,
  /// Methods, in source order.
  pub functions: Vec<FunctionStmt>,
  /// The constructor, when declared. At most one.
  pub constructor: Option<LifecycleStmt>,
  /// The destructor, when declared. At most one.
  pub destructor: Option<LifecycleStmt>,
}

#[derive(Debug)]
pub struct ForStmt {
  /// The label emitted after the closing brace, on the outermost loop of a
  /// nest only; `breakall` jumps here.
  pub breakall_label: Option<String>,
  pub init: Option<Stmt>,
  pub check: Option<Expr>,
  pub step: Option<Stmt>,
  pub body: Vec<Stmt>,
}

#[derive(Debug)]
pub struct FunctionStmt {
  pub span: Span,
  /// The declared return type.
  pub ret: Spanned<TypeRef>,
  pub name: Ident,
  /// The owning class, for methods.
  pub class: Option<TypeId>,
  pub args: Vec<Arg>,
  pub body: Vec<Stmt>,
}

#[derive(Debug)]
pub struct IfStmt {
  pub cond: Expr,
  pub body: Vec<Stmt>,
  /// The `else if` chain, in source order.
  pub else_ifs: Vec<(Expr, Vec<Stmt>)>,
  /// The final `else` block, when present.
  pub else_body: Option<Vec<Stmt>>,
}

/// Whether a lifecycle declaration is the constructor or the destructor.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LifecycleKind {
  Constructor,
  Destructor,
}

/// A constructor or destructor of a class: has a receiver but no return
/// value.
#[derive(Debug)]
pub struct LifecycleStmt {
  pub span: Span,
  pub kind: LifecycleKind,
  /// The owning class.
  pub class: TypeId,
  pub args: Vec<Arg>,
  pub body: Vec<Stmt>,
}

#[derive(Debug)]
pub struct ListStmt {
  /// The declared `list[T]` type.
  pub ty: Spanned<TypeRef>,
  pub name: Ident,
}

#[derive(Debug)]
pub struct PrintStmt {
  /// True for `println`, appending a newline to the emitted format.
  pub newline: bool,
  pub value: Expr,
}

#[derive(Debug)]
pub struct VarDeclStmt {
  pub ty: Spanned<TypeRef>,
  pub name: Ident,
  pub init: Option<Expr>,
}

/// An expression, with its span and the type slot resolved by the typing
/// pass.
#[derive(Debug)]
pub struct Expr {
  pub span: Span,
  /// `None` until the typing pass assigns the resolved type. The
  /// verification walk asserts every reachable slot is filled.
  pub ty: Option<TypeRef>,
  pub k: ExprKind,
}

impl Expr {
  #[must_use] pub fn new(span: Span, k: ExprKind) -> Self { Self { span, ty: None, k } }
}

/// The expression variants of the language.
#[derive(Debug)]
pub enum ExprKind {
  /// A binary operation; the operator token keeps its source spelling.
  Binary(Box<BinaryExpr>),
  /// A call of a free function, method, or list method.
  Call(Box<CallExpr>),
  /// An identifier, possibly heading a `.`-joined member chain.
  Ident(Box<IdentExpr>),
  /// The `{expr=}` interpolation form: the value plus its source text.
  StrEq(Box<Expr>),
  /// An interpolated string between its quote markers.
  Str(StringExpr),
  /// A `this.`-prefixed member access or method call.
  This(Box<Expr>),
  /// A single primitive token in expression position: a literal, a bare
  /// identifier operand, `true`, `false`, or `null`.
  Token(Token),
  /// A `(T) expr` cast.
  Cast(Box<CastExpr>),
  /// A unary operation or parenthesised grouping.
  Unary(Box<UnaryExpr>),
}

#[derive(Debug)]
pub struct BinaryExpr {
  pub op: Token,
  pub left: Expr,
  pub right: Expr,
}

#[derive(Debug)]
pub struct CallExpr {
  /// The called name.
  pub name: Ident,
  /// The class whose method this resolves to: the enclosing class when
  /// parsed inside a class body, or the receiver's class when the typing
  /// pass resolves a method call through a member chain.
  pub class: Option<TypeId>,
  pub args: Vec<Expr>,
}

#[derive(Debug)]
pub struct IdentExpr {
  pub name: Ident,
  /// The rest of the member chain: another identifier expression, or the
  /// call expression terminating the chain.
  pub inner: Option<Expr>,
  /// Set by the typing pass when this identifier names a class instance.
  pub class: Option<TypeId>,
  /// Set by the typing pass when this identifier names a list.
  pub list: Option<TypeId>,
}

/// The ordered pieces of an interpolated string: the start/chars/end
/// marker tokens interleaved with embedded expressions.
#[derive(Debug)]
pub struct StringExpr {
  pub elements: Vec<StrElem>,
}

/// One piece of an interpolated string.
#[derive(Debug)]
pub enum StrElem {
  /// A marker or character-run token.
  Token(Token),
  /// An embedded `{expr}` or `{expr=}` region.
  Expr(Expr),
}

#[derive(Debug)]
pub struct CastExpr {
  /// The target type.
  pub target: Spanned<TypeRef>,
  pub inner: Expr,
}

/// The operator of a [`UnaryExpr`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnOp {
  /// A parenthesised grouping; types and emits as its inner expression.
  Grouping,
  /// Logical `!`.
  Not,
  /// Arithmetic negation.
  Minus,
  PreIncrement,
  PreDecrement,
  PostIncrement,
  PostDecrement,
}

impl UnOp {
  /// The name used in diagnostics.
  #[must_use] pub fn describe(self) -> &'static str {
    match self {
      UnOp::Grouping => "grouping",
      UnOp::Not => "not",
      UnOp::Minus => "minus",
      UnOp::PreIncrement => "pre-increment",
      UnOp::PreDecrement => "pre-decrement",
      UnOp::PostIncrement => "post-increment",
      UnOp::PostDecrement => "post-decrement",
    }
  }
}

#[derive(Debug)]
pub struct UnaryExpr {
  pub op: UnOp,
  pub inner: Expr,
}
