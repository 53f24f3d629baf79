//! Scoping and typing behaviour: identifier resolution, shadowing, the
//! `base` literal flow rules, range checks, call checking, and the
//! post-pass invariants.

mod common;

use common::Program;
use taplc::types::ast::*;
use taplc::{ErrorKind, TokenKind, Types};

#[test]
fn literal_out_of_range_for_declared_type() {
  // u8 x = 300
  let mut p = Program::new();
  p.ty("u8").sp().ident("x").sp().tok(TokenKind::Equal).sp().num(300).nl().eof();
  let errors = p.check_errors();
  assert_eq!(errors.len(), 1);
  assert_eq!(errors[0].kind, ErrorKind::Typing);
  assert!(errors[0].message.contains("'300'"), "{}", errors[0].message);
  assert!(errors[0].message.contains("[0, 255]"), "{}", errors[0].message);
}

#[test]
fn negative_range_of_signed_types() {
  // s8 x = -200 is written as an assignment of a unary minus, which is not
  // a bare literal, so the checked case is the positive overflow
  let mut p = Program::new();
  p.ty("s8").sp().ident("x").sp().tok(TokenKind::Equal).sp().num(200).nl().eof();
  let errors = p.check_errors();
  assert!(errors[0].message.contains("[-128, 127]"), "{}", errors[0].message);
}

#[test]
fn return_type_mismatch_with_promoted_argument() {
  // u8 f(u16 x):
  //   return x
  // f(1000)
  let mut p = Program::new();
  p.ty("u8").sp().ident("f").tok(TokenKind::ParenOpen);
  p.ty("u16").sp().ident("x").tok(TokenKind::ParenClose).tok(TokenKind::Colon).nl();
  p.indent().tok(TokenKind::Return).sp().ident("x").nl().dedent();
  p.ident("f").tok(TokenKind::ParenOpen).num(1000).tok(TokenKind::ParenClose).nl();
  p.eof();
  let errors = p.check_errors();
  assert_eq!(errors.len(), 1);
  assert!(errors[0].message.contains("expected return value of type 'u8', but found 'u16'"),
    "{}", errors[0].message);
}

#[test]
fn base_literals_flow_into_concrete_slots() {
  // u16 x = 1000; x = 2; u16 y = x + 1
  let mut p = Program::new();
  p.ty("u16").sp().ident("x").sp().tok(TokenKind::Equal).sp().num(1000).nl();
  p.ident("x").sp().tok(TokenKind::Equal).sp().num(2).nl();
  p.ty("u16").sp().ident("y").sp().tok(TokenKind::Equal).sp().ident("x").sp();
  p.tok(TokenKind::Plus).sp().num(1).nl();
  p.eof();
  let ast = p.check();
  // the binary expression took the concrete side of the base literal
  let StmtKind::VarDecl(v) = &ast.stmts[2].k else { panic!("expected a var decl") };
  assert_eq!(v.init.as_ref().unwrap().ty.unwrap().id, Types::U16);
}

#[test]
fn incompatible_types_cannot_be_mixed() {
  // u8 x = 'a' + 1 is fine (char vs base is not: both sides non-numeric)
  let mut p = Program::new();
  p.ty("u8").sp().ident("x").sp().tok(TokenKind::Equal).sp();
  p.str_start().str_chars("abc").str_end().nl().eof();
  let errors = p.check_errors();
  assert!(errors[0].message.contains("'u8' and 'string'"), "{}", errors[0].message);
}

#[test]
fn unknown_identifier_in_scoping_pass() {
  // pre-increment operands are plain token identifiers, checked while
  // scoping
  let mut p = Program::new();
  p.tok(TokenKind::Increment).ident("y").nl().eof();
  let errors = p.check_errors();
  assert_eq!(errors[0].kind, ErrorKind::Scoping);
  assert!(errors[0].message.contains("unknown identifier 'y'"), "{}", errors[0].message);
}

#[test]
fn unknown_identifier_in_typing_pass() {
  let mut p = Program::new();
  p.tok(TokenKind::Print).tok(TokenKind::ParenOpen).ident("y").tok(TokenKind::ParenClose);
  p.nl().eof();
  let errors = p.check_errors();
  assert_eq!(errors[0].kind, ErrorKind::Typing);
  assert!(errors[0].message.contains("unknown identifier 'y'"), "{}", errors[0].message);
}

#[test]
fn duplicate_identifier_in_innermost_scope() {
  let mut p = Program::new();
  p.ty("u8").sp().ident("x").sp().tok(TokenKind::Equal).sp().num(1).nl();
  p.ty("u16").sp().ident("x").sp().tok(TokenKind::Equal).sp().num(2).nl();
  p.eof();
  let errors = p.check_errors();
  assert_eq!(errors[0].kind, ErrorKind::Scoping);
  assert!(errors[0].message.contains("already exists"), "{}", errors[0].message);
}

#[test]
fn shadowing_outer_scopes_is_allowed() {
  // u8 x = 1
  // if true:
  //   u16 x = 60000
  //   x = 60001
  // x = 2
  let mut p = Program::new();
  p.ty("u8").sp().ident("x").sp().tok(TokenKind::Equal).sp().num(1).nl();
  p.tok(TokenKind::If).sp().tok(TokenKind::True).tok(TokenKind::Colon).nl();
  p.indent();
  p.ty("u16").sp().ident("x").sp().tok(TokenKind::Equal).sp().num(60000).nl();
  p.ident("x").sp().tok(TokenKind::Equal).sp().num(60001).nl();
  p.dedent();
  p.ident("x").sp().tok(TokenKind::Equal).sp().num(2).nl();
  p.eof();
  // 60000 fits the inner u16 but not the outer u8; 2 fits the outer u8
  p.check();
}

#[test]
fn shadowed_outer_variable_keeps_its_type() {
  // same as above, but the assignment after the block overflows the
  // outer u8, proving the inner u16 did not leak out
  let mut p = Program::new();
  p.ty("u8").sp().ident("x").sp().tok(TokenKind::Equal).sp().num(1).nl();
  p.tok(TokenKind::If).sp().tok(TokenKind::True).tok(TokenKind::Colon).nl();
  p.indent();
  p.ty("u16").sp().ident("x").sp().tok(TokenKind::Equal).sp().num(60000).nl();
  p.dedent();
  p.ident("x").sp().tok(TokenKind::Equal).sp().num(300).nl();
  p.eof();
  let errors = p.check_errors();
  assert!(errors[0].message.contains("[0, 255]"), "{}", errors[0].message);
}

#[test]
fn call_arity_is_checked() {
  let mut p = Program::new();
  p.ty("u8").sp().ident("f").tok(TokenKind::ParenOpen);
  p.ty("u8").sp().ident("x").tok(TokenKind::ParenClose).tok(TokenKind::Colon).nl();
  p.indent().tok(TokenKind::Return).sp().ident("x").nl().dedent();
  p.ident("f").tok(TokenKind::ParenOpen).tok(TokenKind::ParenClose).nl();
  p.eof();
  let errors = p.check_errors();
  assert!(errors[0].message.contains("expected 1 argument(s), but 0 were passed"),
    "{}", errors[0].message);
}

#[test]
fn call_argument_types_are_checked() {
  let mut p = Program::new();
  p.ty("u8").sp().ident("f").tok(TokenKind::ParenOpen);
  p.ty("string").sp().ident("s").tok(TokenKind::ParenClose).tok(TokenKind::Colon).nl();
  p.indent().tok(TokenKind::Return).sp().num(0).nl().dedent();
  p.ident("f").tok(TokenKind::ParenOpen).num(3).tok(TokenKind::ParenClose).nl();
  p.eof();
  let errors = p.check_errors();
  assert!(errors[0].message.contains("'argument 1' of type 'string'"), "{}", errors[0].message);
}

#[test]
fn call_of_an_unknown_function() {
  let mut p = Program::new();
  p.ident("missing").tok(TokenKind::ParenOpen).tok(TokenKind::ParenClose).nl().eof();
  let errors = p.check_errors();
  assert!(errors[0].message.contains("'missing' is not callable"), "{}", errors[0].message);
}

#[test]
fn stdlib_file_functions_are_injected() {
  // list[char] l
  // read_file("in.txt", l)
  let mut p = Program::new();
  p.list_ty("char").sp().ident("l").nl();
  p.ident("read_file").tok(TokenKind::ParenOpen);
  p.str_start().str_chars("in.txt").str_end().tok(TokenKind::Comma).sp().ident("l");
  p.tok(TokenKind::ParenClose).nl();
  p.eof();
  p.check();
}

#[test]
fn members_are_not_callable_on_basic_types() {
  let mut p = Program::new();
  p.ty("u8").sp().ident("x").sp().tok(TokenKind::Equal).sp().num(1).nl();
  p.ident("x").tok(TokenKind::Dot).ident("foo").tok(TokenKind::ParenOpen).tok(TokenKind::ParenClose);
  p.nl().eof();
  let errors = p.check_errors();
  assert!(errors[0].message.contains("'foo' of a 'u8' is not callable"), "{}", errors[0].message);
}

#[test]
fn list_methods_type_as_the_method_table_says() {
  // list[u8] l / l.push(3) / u64 n = l.size() / u8 v = l.pop()
  let mut p = Program::new();
  p.list_ty("u8").sp().ident("l").nl();
  p.ident("l").tok(TokenKind::Dot).ident("push").tok(TokenKind::ParenOpen).num(3);
  p.tok(TokenKind::ParenClose).nl();
  p.ty("u64").sp().ident("n").sp().tok(TokenKind::Equal).sp();
  p.ident("l").tok(TokenKind::Dot).ident("size").tok(TokenKind::ParenOpen).tok(TokenKind::ParenClose).nl();
  p.ty("u8").sp().ident("v").sp().tok(TokenKind::Equal).sp();
  p.ident("l").tok(TokenKind::Dot).ident("pop").tok(TokenKind::ParenOpen).tok(TokenKind::ParenClose).nl();
  p.eof();
  p.check();
}

#[test]
fn unknown_list_method_is_not_callable() {
  let mut p = Program::new();
  p.list_ty("u8").sp().ident("l").nl();
  p.ident("l").tok(TokenKind::Dot).ident("sort").tok(TokenKind::ParenOpen).tok(TokenKind::ParenClose);
  p.nl().eof();
  let errors = p.check_errors();
  assert!(errors[0].message.contains("'sort' of a 'list[u8]' is not callable"),
    "{}", errors[0].message);
}

fn counter_class(p: &mut Program) {
  // class Counter:
  //   u32 n
  //   Counter():
  //     this.n = 0
  //   u32 inc():
  //     this.n = this.n + 1
  //     return this.n
  p.tok(TokenKind::Class).sp().class_ty("Counter").tok(TokenKind::Colon).nl();
  p.indent();
  p.ty("u32").sp().ident("n").nl();
  p.class_ty("Counter").tok(TokenKind::ParenOpen).tok(TokenKind::ParenClose).tok(TokenKind::Colon).nl();
  p.indent();
  p.tok(TokenKind::This).tok(TokenKind::Dot).ident("n").sp().tok(TokenKind::Equal).sp().num(0).nl();
  p.dedent();
  p.ty("u32").sp().ident("inc").tok(TokenKind::ParenOpen).tok(TokenKind::ParenClose).tok(TokenKind::Colon).nl();
  p.indent();
  p.tok(TokenKind::This).tok(TokenKind::Dot).ident("n").sp().tok(TokenKind::Equal).sp();
  p.tok(TokenKind::This).tok(TokenKind::Dot).ident("n").sp().tok(TokenKind::Plus).sp().num(1).nl();
  p.tok(TokenKind::Return).sp().tok(TokenKind::This).tok(TokenKind::Dot).ident("n").nl();
  p.dedent();
  p.dedent();
}

#[test]
fn class_method_dispatch_types_through_the_class_scope() {
  let mut p = Program::new();
  counter_class(&mut p);
  p.class_ty("Counter").sp().ident("c").nl();
  p.ty("u32").sp().ident("n").sp().tok(TokenKind::Equal).sp();
  p.ident("c").tok(TokenKind::Dot).ident("inc").tok(TokenKind::ParenOpen).tok(TokenKind::ParenClose).nl();
  p.eof();
  let ast = p.check();
  // the call took the method's declared return type
  let StmtKind::VarDecl(v) = &ast.stmts[2].k else { panic!("expected a var decl") };
  let init = v.init.as_ref().unwrap();
  let ExprKind::Ident(ie) = &init.k else { panic!("expected an identifier chain") };
  assert!(ie.class.is_some());
  assert_eq!(ie.inner.as_ref().unwrap().ty.unwrap().id, Types::U32);
}

#[test]
fn class_members_are_invisible_outside() {
  let mut p = Program::new();
  counter_class(&mut p);
  // n is a member of Counter, not a global
  p.tok(TokenKind::Print).tok(TokenKind::ParenOpen).ident("n").tok(TokenKind::ParenClose).nl();
  p.eof();
  let errors = p.check_errors();
  assert!(errors[0].message.contains("unknown identifier 'n'"), "{}", errors[0].message);
}

#[test]
fn surrounding_identifiers_are_invisible_inside_classes() {
  // u32 outer = 1
  // class C:
  //   u32 get():
  //     return outer
  let mut p = Program::new();
  p.ty("u32").sp().ident("outer").sp().tok(TokenKind::Equal).sp().num(1).nl();
  p.tok(TokenKind::Class).sp().class_ty("C").tok(TokenKind::Colon).nl();
  p.indent();
  p.ty("u32").sp().ident("get").tok(TokenKind::ParenOpen).tok(TokenKind::ParenClose).tok(TokenKind::Colon).nl();
  p.indent().tok(TokenKind::Return).sp().ident("outer").nl().dedent();
  p.dedent().eof();
  let errors = p.check_errors();
  assert!(errors[0].message.contains("unknown identifier 'outer'"), "{}", errors[0].message);
}

#[test]
fn casts_require_numeric_or_character_operands() {
  let mut p = Program::new();
  p.ty("u8").sp().ident("x").sp().tok(TokenKind::Equal).sp();
  p.tok(TokenKind::ParenOpen).ty("u8").tok(TokenKind::ParenClose).sp().ch('a').nl();
  p.eof();
  p.check();

  let mut p = Program::new();
  p.ty("u8").sp().ident("x").sp().tok(TokenKind::Equal).sp();
  p.tok(TokenKind::ParenOpen).ty("u8").tok(TokenKind::ParenClose).sp();
  p.str_start().str_chars("abc").str_end().nl();
  p.eof();
  let errors = p.check_errors();
  assert!(errors[0].message.contains("cannot type cast from 'string' to 'u8'"),
    "{}", errors[0].message);
}

#[test]
fn unary_operators_require_numeric_operands() {
  let mut p = Program::new();
  p.tok(TokenKind::Not).str_start().str_chars("abc").str_end().nl().eof();
  let errors = p.check_errors();
  assert!(errors[0].message.contains("expected numeric type"), "{}", errors[0].message);
}

#[test]
fn void_functions_reject_return_values() {
  let mut p = Program::new();
  p.ty("void").sp().ident("f").tok(TokenKind::ParenOpen).tok(TokenKind::ParenClose);
  p.tok(TokenKind::Colon).nl();
  p.indent().tok(TokenKind::Return).sp().num(1).nl().dedent().eof();
  let errors = p.check_errors();
  assert!(errors[0].message.contains("void function expects no return value"),
    "{}", errors[0].message);
}

#[test]
fn non_void_functions_require_return_values() {
  let mut p = Program::new();
  p.ty("u8").sp().ident("f").tok(TokenKind::ParenOpen).tok(TokenKind::ParenClose);
  p.tok(TokenKind::Colon).nl();
  p.indent().tok(TokenKind::Return).nl().dedent().eof();
  let errors = p.check_errors();
  assert!(errors[0].message.contains("non-void function expects a return value"),
    "{}", errors[0].message);
}

#[test]
fn parameters_become_references_and_globals_do_not() {
  let mut p = Program::new();
  p.ty("u8").sp().ident("g").nl();
  p.ty("u8").sp().ident("f").tok(TokenKind::ParenOpen);
  p.ty("u16").sp().ident("x").tok(TokenKind::ParenClose).tok(TokenKind::Colon).nl();
  p.indent().tok(TokenKind::Return).sp().num(1).nl().dedent();
  p.eof();
  let ast = p.check();
  let StmtKind::VarDecl(g) = &ast.stmts[0].k else { panic!("expected a var decl") };
  assert!(!g.ty.k.is_reference);
  let StmtKind::Function(f) = &ast.stmts[1].k else { panic!("expected a function") };
  assert!(f.args[0].ty.k.is_reference);
}

#[test]
fn typing_errors_accumulate_across_statements() {
  let mut p = Program::new();
  p.ty("u8").sp().ident("x").sp().tok(TokenKind::Equal).sp().num(300).nl();
  p.ty("u8").sp().ident("y").sp().tok(TokenKind::Equal).sp().num(400).nl();
  p.eof();
  let errors = p.check_errors();
  assert_eq!(errors.len(), 2);
}
