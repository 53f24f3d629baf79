//! Lower the annotated AST to a C source tree.
//!
//! The emitter is read-only over the AST: the typing pass has already
//! resolved every expression type and set the `class`/`list`/reference
//! annotations that steer lowering. Emission produces the fixed
//! `utility_functions.h`, the registry-driven `types.h` and `list.h`, a
//! `classes.h` with one struct-plus-methods block per class, a
//! `functions.h` with free-function declarations and definitions, and the
//! main C file wrapping the remaining top-level statements in `main`.

use std::fs;
use std::io;
use std::iter::once;
use std::path::Path;
use itertools::Itertools;
use crate::token::TokenKind;
use crate::types::ast::*;
use crate::types::{NumericKind, Span, TypeKind, TypeRef, Types};

/// The emitter over one annotated program.
pub struct CodeGenerator<'a> {
  ast: &'a Ast,
  types: &'a Types,
  /// The source text, for `{expr=}` interpolations that print their own
  /// source.
  source: String,
}

impl<'a> CodeGenerator<'a> {
  /// Construct an emitter, reading the source text of the compiled file.
  pub fn new(ast: &'a Ast, types: &'a Types) -> io::Result<Self> {
    let source = fs::read_to_string(&ast.filename)?;
    Ok(Self { ast, types, source })
  }

  /// Emit the whole C source tree: the support headers into `header_dir`
  /// (instantiating list templates from `templates_dir`) and the program
  /// itself into `main_c_file`.
  pub fn generate_c(
    &self, header_dir: &Path, templates_dir: &Path, main_c_file: &Path,
  ) -> io::Result<()> {
    self.write_utility_functions(header_dir)?;
    self.types.generate_c_headers(header_dir, templates_dir)?;

    let mut class_definitions = Vec::new();
    let mut function_declarations = Vec::new();
    let mut function_definitions = Vec::new();
    let mut main_lines = Vec::new();
    for stmt in &self.ast.stmts {
      match &stmt.k {
        StmtKind::Class(c) => class_definitions.push(format!("{}\n", self.class_c(c))),
        StmtKind::Function(f) => {
          function_declarations.push(format!("{};\n", self.function_decl_base(f)));
          function_definitions.push(format!("{}\n", self.function_c(f)));
        }
        _ => main_lines.push(format!("{}\n", self.stmt_c(stmt))),
      }
    }

    self.write_classes_h(header_dir, &class_definitions)?;
    self.write_functions_h(header_dir, &function_declarations, &function_definitions)?;
    self.write_main_c(main_c_file, &main_lines)
  }

  fn write_utility_functions(&self, header_dir: &Path) -> io::Result<()> {
    let code = "\
      #pragma once\n\
      \n\
      // include the needed system headers\n\
      #include <stdio.h>\n\
      #include <stdlib.h>\n\
      \n\
      #define RED   \"\\x1b[31m\"\n\
      #define GRN   \"\\x1b[32m\"\n\
      #define YEL   \"\\x1b[33m\"\n\
      #define BLU   \"\\x1b[34m\"\n\
      #define MAG   \"\\x1b[35m\"\n\
      #define CYN   \"\\x1b[36m\"\n\
      #define WHT   \"\\x1b[37m\"\n\
      #define RESET \"\\x1b[0m\"\n\
      \n\
      void panic(const char* message) {\n\
      \x20   fprintf(stderr, RED \"panic: %s!\\n\" RESET, message);\n\
      \x20   exit(1);\n\
      }\n";
    fs::write(header_dir.join("utility_functions.h"), code)
  }

  fn write_classes_h(&self, header_dir: &Path, definitions: &[String]) -> io::Result<()> {
    let mut code = String::from(
      "#pragma once\n\
       \n\
       // include the needed system headers\n\
       #include <stdio.h>\n\
       \n\
       // also include the needed TAPL headers\n\
       #include <tapl_headers/types.h>\n\
       \n\
       // classes declarations\n");
    for definition in definitions { code.push_str(definition) }
    fs::write(header_dir.join("classes.h"), code)
  }

  fn write_functions_h(
    &self, header_dir: &Path, declarations: &[String], definitions: &[String],
  ) -> io::Result<()> {
    let mut code = String::from(
      "#pragma once\n\
       \n\
       // include the needed system headers\n\
       #include <stdio.h>\n\
       \n\
       // also include the needed TAPL headers\n\
       #include <tapl_headers/types.h>\n\
       \n\
       // function declarations\n");
    for declaration in declarations { code.push_str(declaration) }
    code.push_str("\n// function definitions\n");
    for definition in definitions { code.push_str(definition) }
    fs::write(header_dir.join("functions.h"), code)
  }

  fn write_main_c(&self, main_c_file: &Path, lines: &[String]) -> io::Result<()> {
    let mut code = String::from(
      "// include the needed system headers\n\
       #include <stdio.h>\n\
       \n\
       // also include the needed TAPL headers\n\
       #include <tapl_headers/classes.h>\n\
       #include <tapl_headers/file.h>\n\
       #include <tapl_headers/functions.h>\n\
       #include <tapl_headers/list.h>\n\
       #include <tapl_headers/types.h>\n\
       \n\
       int main(int argc, char** argv) {\n");
    for line in lines { code.push_str(line) }
    code.push_str("}\n");
    fs::write(main_c_file, code)
  }

  /// The source text covered by a span.
  ///
  /// # Panics
  /// If the span lies outside the source file; the parser only produces
  /// spans inside it.
  fn source_text(&self, span: Span) -> &str {
    assert!((span.start as usize) < self.source.len(), "span starts outside the source file");
    assert!((span.end() as usize) <= self.source.len(), "span ends outside the source file");
    &self.source[span.start as usize..span.end() as usize]
  }

  /// The resolved type an expression contributes to its surroundings (the
  /// deepest member of a chain).
  fn value_type(e: &Expr) -> TypeRef {
    if let ExprKind::Ident(ie) = &e.k {
      if let Some(inner) = &ie.inner { return Self::value_type(inner) }
    }
    e.ty.expect("expression left untyped by the typing pass")
  }

  /// Render a type in a declaration. Reference-marked class and list
  /// types become pointers; basic types stay by value.
  fn type_c(&self, ty: TypeRef) -> String {
    let name = self.types.c_name(ty.id);
    let pointer = ty.is_reference
      && matches!(self.types[ty.id].kind, TypeKind::Class | TypeKind::List { .. });
    if pointer { format!("{name}*") } else { name }
  }

  /// The printf conversion for a value: `%c` for characters, `%d`/`%u`/`%f`
  /// for numerics with an `l` prefix past 32 bits.
  fn format_spec(&self, e: &Expr) -> String {
    let ty = Self::value_type(e);
    match self.types[ty.id].kind {
      TypeKind::Character => "%c".into(),
      TypeKind::Numeric { kind, bits, .. } => {
        let long = if bits > 32 { "l" } else { "" };
        match kind {
          NumericKind::Signed => format!("%{long}d"),
          NumericKind::Unsigned => format!("%{long}u"),
          NumericKind::Float => format!("%{long}f"),
        }
      }
      _ => panic!("no print format for a value of type '{}'", self.types[ty.id].keyword),
    }
  }

  /// Lower one statement to C.
  pub fn stmt_c(&self, stmt: &Stmt) -> String {
    match &stmt.k {
      StmtKind::Assign(a) => {
        let op = a.op.kind.fixed_str().expect("assignment operator spelling");
        format!("{} {} {};", self.expr_c(&a.lhs), op, self.expr_c(&a.value))
      }
      StmtKind::Break => "break;".into(),
      StmtKind::Breakall(label) => format!("goto {label};"),
      StmtKind::Class(c) => self.class_c(c),
      StmtKind::Continue => "continue;".into(),
      StmtKind::Expr(e) => format!("{};", self.expr_c(e)),
      StmtKind::For(f) => self.for_c(f),
      StmtKind::Function(f) => self.function_c(f),
      StmtKind::If(i) => self.if_c(i),
      StmtKind::List(l) => {
        let base = self.types.c_name(l.ty.k.id);
        format!("{base} {name};{base}_constructor(&{name});", name = l.name.name)
      }
      StmtKind::Print(p) => self.print_c(p),
      StmtKind::Return(Some(value)) => format!("return {};", self.expr_c(value)),
      StmtKind::Return(None) => "return;".into(),
      StmtKind::VarDecl(v) => match &v.init {
        Some(init) => format!(
          "{} {} = {};", self.type_c(v.ty.k), v.name.name, self.expr_c(init)),
        None => format!("{} {};", self.type_c(v.ty.k), v.name.name),
      },
    }
  }

  fn for_c(&self, f: &ForStmt) -> String {
    let init = f.init.as_ref().map_or(String::new(), |s| self.stmt_c(s));
    let check = f.check.as_ref().map_or(String::new(), |e| self.expr_c(e));
    let step = f.step.as_ref().map_or(String::new(), |s| self.stmt_c(s));
    // c supplies the two semicolons of the loop head
    let init = init.strip_suffix(';').unwrap_or(&init);
    let step = step.strip_suffix(';').unwrap_or(&step);

    let mut code = format!("for ({init}; {check}; {step}) {{\n");
    for stmt in &f.body {
      code.push_str(&format!("{}\n", self.stmt_c(stmt)));
    }
    code.push('}');
    // the outermost loop of a nest carries the label breakall jumps to
    if let Some(label) = &f.breakall_label {
      code.push_str(&format!("\n{label}:;"));
    }
    code
  }

  fn if_block_c(&self, cond: &Expr, body: &[Stmt]) -> String {
    let mut code = format!("if ({}) {{\n", self.expr_c(cond));
    for stmt in body {
      code.push_str(&format!("{}\n", self.stmt_c(stmt)));
    }
    code.push('}');
    code
  }

  fn if_c(&self, i: &IfStmt) -> String {
    let mut code = self.if_block_c(&i.cond, &i.body);
    for (cond, body) in &i.else_ifs {
      code.push_str(" else ");
      code.push_str(&self.if_block_c(cond, body));
    }
    if let Some(body) = &i.else_body {
      code.push_str(" else {\n");
      for stmt in body {
        code.push_str(&format!("{}\n", self.stmt_c(stmt)));
      }
      code.push('}');
    }
    code
  }

  fn print_c(&self, p: &PrintStmt) -> String {
    let line_end = if p.newline { "\\n" } else { "" };
    if let ExprKind::Str(s) = &p.value.k {
      return format!("printf({});", self.string_c(s, line_end))
    }
    let spec = self.format_spec(&p.value);
    format!("printf(\"{spec}{line_end}\", {});", self.expr_c(&p.value))
  }

  /// Lower an interpolated string to a printf format plus its arguments.
  /// `{expr}` becomes a conversion and an argument; `{expr=}` prepends a
  /// `%s` holding the expression's own source text.
  fn string_c(&self, s: &StringExpr, line_end: &str) -> String {
    let mut format = String::new();
    let mut args = Vec::new();
    for element in &s.elements {
      match element {
        StrElem::Expr(e) => {
          if let ExprKind::StrEq(inner) = &e.k {
            format.push_str("%s");
            format.push_str(&self.format_spec(inner));
            args.push(format!("\"{}\"", self.source_text(e.span)));
            args.push(self.expr_c(inner));
          } else {
            format.push_str(&self.format_spec(e));
            args.push(self.expr_c(e));
          }
        }
        StrElem::Token(token) => match &token.kind {
          TokenKind::StringStart => format.push('"'),
          TokenKind::StringEnd => {
            format.push_str(line_end);
            format.push('"');
          }
          TokenKind::StringChars(chars) => format.push_str(chars),
          // the expression markers contribute nothing to the format
          _ => {}
        },
      }
    }
    once(format).chain(args).join(", ")
  }

  fn class_c(&self, c: &ClassStmt) -> String {
    let name = &self.types[c.class].keyword;
    let mut code = format!("typedef struct {name}_struct {name};\n");
    code.push_str(&format!("struct {name}_struct {{\n"));
    for variable in &c.variables {
      code.push_str(&format!("{}\n", self.stmt_c(variable)));
    }
    code.push_str("};\n");

    // a class always gets a constructor and destructor, default-empty when
    // not declared
    match &c.constructor {
      Some(constructor) => code.push_str(&self.lifecycle_c(constructor)),
      None => code.push_str(&self.default_lifecycle_c(c, LifecycleKind::Constructor)),
    }
    code.push('\n');
    match &c.destructor {
      Some(destructor) => code.push_str(&self.lifecycle_c(destructor)),
      None => code.push_str(&self.default_lifecycle_c(c, LifecycleKind::Destructor)),
    }
    code.push('\n');

    for method in &c.functions {
      code.push_str(&format!("{}\n", self.function_c(method)));
    }
    code
  }

  fn lifecycle_name(&self, class: crate::types::TypeId, kind: LifecycleKind) -> String {
    let what = match kind {
      LifecycleKind::Constructor => "constructor",
      LifecycleKind::Destructor => "destructor",
    };
    format!("{}_{what}", self.types[class].keyword)
  }

  fn lifecycle_c(&self, l: &LifecycleStmt) -> String {
    let mut args = vec![format!("{}* this", self.types[l.class].keyword)];
    for arg in &l.args {
      args.push(format!("{} {}", self.type_c(arg.ty.k), arg.name.name));
    }
    let mut code = format!("void {}({}) {{\n", self.lifecycle_name(l.class, l.kind),
      args.iter().join(", "));
    for stmt in &l.body {
      code.push_str(&format!("{}\n", self.stmt_c(stmt)));
    }
    code.push('}');
    code
  }

  fn default_lifecycle_c(&self, c: &ClassStmt, kind: LifecycleKind) -> String {
    format!("void {}({}* this) {{\n}}",
      self.lifecycle_name(c.class, kind), self.types[c.class].keyword)
  }

  fn function_name(&self, f: &FunctionStmt) -> String {
    match f.class {
      Some(class) => format!("{}_{}", self.types[class].keyword, f.name.name),
      None => f.name.name.clone(),
    }
  }

  /// The declaration line of a function, without the trailing `;` or body.
  fn function_decl_base(&self, f: &FunctionStmt) -> String {
    let mut args = Vec::new();
    // methods take the receiver as an explicit first parameter
    if let Some(class) = f.class {
      args.push(format!("{}* this", self.types[class].keyword));
    }
    for arg in &f.args {
      args.push(format!("{} {}", self.type_c(arg.ty.k), arg.name.name));
    }
    format!("{} {}({})", self.type_c(f.ret.k), self.function_name(f), args.iter().join(", "))
  }

  fn function_c(&self, f: &FunctionStmt) -> String {
    let mut code = format!("{} {{\n", self.function_decl_base(f));
    for stmt in &f.body {
      code.push_str(&format!("{}\n", self.stmt_c(stmt)));
    }
    code.push('}');
    code
  }

  /// Lower one expression to C.
  pub fn expr_c(&self, e: &Expr) -> String {
    match &e.k {
      ExprKind::Binary(b) => {
        let op = b.op.kind.fixed_str().expect("binary operator spelling");
        format!("({} {} {})", self.expr_c(&b.left), op, self.expr_c(&b.right))
      }
      ExprKind::Call(c) => self.call_c(c),
      ExprKind::Ident(ie) => self.ident_chain_c(e, ie, ""),
      ExprKind::StrEq(inner) => format!("{}=", self.expr_c(inner)),
      ExprKind::Str(s) => self.string_c(s, ""),
      ExprKind::This(inner) => self.this_c(inner),
      ExprKind::Token(token) => match &token.kind {
        TokenKind::Character(c) => format!("'{c}'"),
        TokenKind::Number(n) => n.to_string(),
        TokenKind::StringChars(s) => format!("\"{s}\""),
        TokenKind::Identifier(name) => name.clone(),
        // no pointers yet, so null is plain zero
        TokenKind::Null => "0".into(),
        k => k.fixed_str().expect("literal token spelling").into(),
      },
      ExprKind::Cast(c) => {
        format!("(({}){})", self.type_c(c.target.k), self.expr_c(&c.inner))
      }
      ExprKind::Unary(u) => {
        let inner = self.expr_c(&u.inner);
        match u.op {
          UnOp::Grouping => format!("({inner})"),
          UnOp::Not => format!("(!({inner}))"),
          UnOp::Minus => format!("(-({inner}))"),
          UnOp::PreIncrement => format!("(++({inner}))"),
          UnOp::PreDecrement => format!("(--({inner}))"),
          UnOp::PostIncrement => format!("(({inner})++)"),
          UnOp::PostDecrement => format!("(({inner})--)"),
        }
      }
    }
  }

  /// A standalone call: a free function, or a method of the enclosing
  /// class with the implicit `this` receiver.
  fn call_c(&self, c: &CallExpr) -> String {
    let mut name = c.name.name.clone();
    let mut args = Vec::new();
    if let Some(class) = c.class {
      args.push("this".to_string());
      name = format!("{}_{name}", self.types[class].keyword);
    }
    args.extend(c.args.iter().map(|arg| self.expr_c(arg)));
    format!("{name}({})", args.iter().join(", "))
  }

  /// `this.member` chains: a terminating call renders itself with the
  /// implicit receiver; a member path renders behind `this->`.
  fn this_c(&self, inner: &Expr) -> String {
    match &inner.k {
      ExprKind::Call(_) => self.expr_c(inner),
      ExprKind::Ident(ie) => self.ident_chain_c(inner, ie, "this->"),
      _ => unreachable!("`this` is followed by a member or a call"),
    }
  }

  /// An identifier heading a member chain. A chain ending in a method call
  /// lowers to `Class_method(&receiver, args)` (or `list_T_method`); the
  /// `&` is dropped when the receiver is already a reference. A bare list
  /// lowers to its address for by-reference passing.
  fn ident_chain_c(&self, e: &Expr, ie: &IdentExpr, prefix: &str) -> String {
    if let Some(class) = ie.class {
      if let Some((method, args)) = self.chain_call(ie) {
        let receiver = format!("{}{prefix}{}", self.deref(e), self.path_c(e, ie));
        return format!("{}_{method}({})",
          self.types[class].keyword, once(receiver).chain(args).join(", "))
      }
    }
    if let Some(list) = ie.list {
      let inner = self.types.list_inner(list).expect("list type has an element type");
      if let Some((method, args)) = self.chain_call(ie) {
        let receiver = format!("{}{prefix}{}", self.deref(e), self.path_c(e, ie));
        return format!("list_{}_{method}({})",
          self.types[inner].keyword, once(receiver).chain(args).join(", "))
      }
      // lists travel by address, not by value
      return format!("{}{prefix}{}", self.deref(e), self.path_c(e, ie))
    }
    format!("{prefix}{}", self.path_c(e, ie))
  }

  /// `&` unless the expression is already a reference.
  fn deref(&self, e: &Expr) -> &'static str {
    if e.ty.expect("expression typed").is_reference { "" } else { "&" }
  }

  /// The join between an identifier and its member: `->` through a
  /// reference, `.` into a value.
  fn join_op(&self, e: &Expr) -> &'static str {
    if e.ty.expect("expression typed").is_reference { "->" } else { "." }
  }

  /// The member path of a chain, stopping short of a terminating call.
  fn path_c(&self, e: &Expr, ie: &IdentExpr) -> String {
    if let Some(inner) = &ie.inner {
      if let ExprKind::Ident(inner_ie) = &inner.k {
        return format!("{}{}{}", ie.name.name, self.join_op(e), self.path_c(inner, inner_ie))
      }
    }
    ie.name.name.clone()
  }

  /// The call terminating a member chain, rendered as its name and
  /// argument list.
  fn chain_call(&self, ie: &IdentExpr) -> Option<(String, Vec<String>)> {
    match &ie.inner.as_ref()?.k {
      ExprKind::Ident(inner_ie) => self.chain_call(inner_ie),
      ExprKind::Call(c) => Some((
        c.name.name.clone(),
        c.args.iter().map(|arg| self.expr_c(arg)).collect(),
      )),
      _ => None,
    }
  }
}
