//! Emitted-C behaviour: statement and expression lowering, method call
//! shapes, breakall labels, string interpolation, and the header tree.

mod common;

use std::fs;
use common::Program;
use taplc::TokenKind;
use taplc::build_ast::AstBuilder;
use taplc::codegen::CodeGenerator;

struct Emitted {
  main_c: String,
  classes_h: String,
  functions_h: String,
  types_h: String,
  list_h: String,
  utility_h: String,
}

/// Run the whole pipeline over a built program and read back the emitted
/// tree.
fn emit(p: &Program) -> Emitted {
  let dir = tempfile::tempdir().expect("tempdir");
  let (headers, templates) = common::emit_dirs(dir.path());
  let source = p.write_source(dir.path());

  let mut ast = AstBuilder::new(source, &p.tokens, &p.types).generate()
    .unwrap_or_else(|errors| panic!("unexpected parse errors: {errors:#?}"));
  taplc::check_ast(&mut ast, &p.types)
    .unwrap_or_else(|errors| panic!("unexpected check errors: {errors:#?}"));

  let main_c_path = dir.path().join("main.c");
  CodeGenerator::new(&ast, &p.types).expect("read source")
    .generate_c(&headers, &templates, &main_c_path).expect("emit");

  let read = |name: &str| fs::read_to_string(headers.join(name)).expect("read header");
  Emitted {
    main_c: fs::read_to_string(&main_c_path).expect("read main.c"),
    classes_h: read("classes.h"),
    functions_h: read("functions.h"),
    types_h: read("types.h"),
    list_h: read("list.h"),
    utility_h: read("utility_functions.h"),
  }
}

#[test]
fn nested_loops_share_one_breakall_label() {
  let mut p = Program::new();
  p.tok(TokenKind::For).tok(TokenKind::ParenOpen);
  p.ty("u8").sp().ident("i").sp().tok(TokenKind::Equal).sp().num(0).tok(TokenKind::Semicolon);
  p.sp().ident("i").sp().tok(TokenKind::Less).sp().num(10).tok(TokenKind::Semicolon);
  p.sp().tok(TokenKind::Increment).ident("i").tok(TokenKind::ParenClose).tok(TokenKind::Colon);
  p.nl().indent();
  p.tok(TokenKind::For).tok(TokenKind::ParenOpen);
  p.ty("u8").sp().ident("j").sp().tok(TokenKind::Equal).sp().num(0).tok(TokenKind::Semicolon);
  p.sp().ident("j").sp().tok(TokenKind::Less).sp().num(10).tok(TokenKind::Semicolon);
  p.sp().tok(TokenKind::Increment).ident("j").tok(TokenKind::ParenClose).tok(TokenKind::Colon);
  p.nl().indent();
  p.tok(TokenKind::Breakall).nl();
  p.dedent().dedent().eof();

  let emitted = emit(&p);
  // one label after the outer loop, one goto inside the inner body
  assert_eq!(emitted.main_c.matches("breakall_0:;").count(), 1);
  assert_eq!(emitted.main_c.matches("goto breakall_0;").count(), 1);
  assert_eq!(emitted.main_c.matches("breakall_").count(), 2);
}

#[test]
fn for_loop_head_loses_duplicated_semicolons() {
  let mut p = Program::new();
  p.tok(TokenKind::For).tok(TokenKind::ParenOpen);
  p.ty("u8").sp().ident("i").sp().tok(TokenKind::Equal).sp().num(0).tok(TokenKind::Semicolon);
  p.sp().ident("i").sp().tok(TokenKind::Less).sp().num(10).tok(TokenKind::Semicolon);
  p.sp().tok(TokenKind::Increment).ident("i").tok(TokenKind::ParenClose).tok(TokenKind::Colon);
  p.nl().indent().tok(TokenKind::Break).nl().dedent().eof();

  let emitted = emit(&p);
  assert!(emitted.main_c.contains("for (u8 i = 0; (i < 10); (++(i))) {"), "{}", emitted.main_c);
  assert!(emitted.main_c.contains("break;"));
}

fn counter_class(p: &mut Program) {
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
fn class_lowers_to_struct_plus_prefixed_methods() {
  let mut p = Program::new();
  counter_class(&mut p);
  p.class_ty("Counter").sp().ident("c").nl();
  p.ident("c").tok(TokenKind::Dot).ident("inc").tok(TokenKind::ParenOpen).tok(TokenKind::ParenClose).nl();
  p.eof();

  let emitted = emit(&p);
  assert!(emitted.classes_h.contains("typedef struct Counter_struct Counter;"));
  assert!(emitted.classes_h.contains("struct Counter_struct {"));
  assert!(emitted.classes_h.contains("u32 n;"));
  assert!(emitted.classes_h.contains("void Counter_constructor(Counter* this) {"));
  // no destructor was declared, so the default empty one is generated
  assert!(emitted.classes_h.contains("void Counter_destructor(Counter* this) {"));
  assert!(emitted.classes_h.contains("u32 Counter_inc(Counter* this) {"));
  assert!(emitted.classes_h.contains("this->n = 0;"));
  assert!(emitted.classes_h.contains("this->n = (this->n + 1);"));
  assert!(emitted.classes_h.contains("return this->n;"));

  // a value receiver is passed by address
  assert!(emitted.main_c.contains("Counter c;"));
  assert!(emitted.main_c.contains("Counter_inc(&c);"));
}

#[test]
fn string_interpolation_with_source_label() {
  // u8 x = 5
  // println("value is {x=}")
  let mut p = Program::new();
  p.ty("u8").sp().ident("x").sp().tok(TokenKind::Equal).sp().num(5).nl();
  p.tok(TokenKind::Println).tok(TokenKind::ParenOpen);
  p.str_start().str_chars("value is ").str_expr_start().ident("x").tok(TokenKind::Equal);
  p.str_expr_end().str_end().tok(TokenKind::ParenClose).nl();
  p.eof();

  let emitted = emit(&p);
  assert!(emitted.main_c.contains(r#"printf("value is %s%u\n", "x=", x);"#),
    "{}", emitted.main_c);
}

#[test]
fn plain_interpolation_uses_the_format_table() {
  // s64 big = 7
  // print("{big}")
  let mut p = Program::new();
  p.ty("s64").sp().ident("big").sp().tok(TokenKind::Equal).sp().num(7).nl();
  p.tok(TokenKind::Print).tok(TokenKind::ParenOpen);
  p.str_start().str_expr_start().ident("big").str_expr_end().str_end();
  p.tok(TokenKind::ParenClose).nl();
  p.eof();

  let emitted = emit(&p);
  // 64-bit signed gets the long prefix, and print appends no newline
  assert!(emitted.main_c.contains(r#"printf("%ld", big);"#), "{}", emitted.main_c);
}

#[test]
fn printing_a_character_value() {
  let mut p = Program::new();
  p.tok(TokenKind::Print).tok(TokenKind::ParenOpen).ch('a').tok(TokenKind::ParenClose).nl();
  p.eof();
  let emitted = emit(&p);
  assert!(emitted.main_c.contains(r#"printf("%c", 'a');"#), "{}", emitted.main_c);
}

#[test]
fn lists_declare_construct_and_dispatch() {
  let mut p = Program::new();
  p.list_ty("u8").sp().ident("l").nl();
  p.ident("l").tok(TokenKind::Dot).ident("push").tok(TokenKind::ParenOpen).num(3);
  p.tok(TokenKind::ParenClose).nl();
  p.eof();

  let emitted = emit(&p);
  assert!(emitted.main_c.contains("list_u8 l;list_u8_constructor(&l);"), "{}", emitted.main_c);
  assert!(emitted.main_c.contains("list_u8_push(&l, 3);"), "{}", emitted.main_c);
  // the template was instantiated for u8 next to the prepopulated char
  assert!(emitted.list_h.contains("list_u8;"));
  assert!(emitted.list_h.contains("list_char;"));
  assert!(!emitted.list_h.contains("TYPE"));
}

#[test]
fn free_functions_are_declared_and_defined() {
  let mut p = Program::new();
  p.ty("u16").sp().ident("twice").tok(TokenKind::ParenOpen);
  p.ty("u16").sp().ident("x").tok(TokenKind::ParenClose).tok(TokenKind::Colon).nl();
  p.indent().tok(TokenKind::Return).sp().ident("x").nl().dedent();
  p.ident("twice").tok(TokenKind::ParenOpen).num(2).tok(TokenKind::ParenClose).nl();
  p.eof();

  let emitted = emit(&p);
  assert!(emitted.functions_h.contains("u16 twice(u16 x);\n"), "{}", emitted.functions_h);
  assert!(emitted.functions_h.contains("u16 twice(u16 x) {"), "{}", emitted.functions_h);
  assert!(emitted.main_c.contains("twice(2);"));
}

#[test]
fn literal_lowering() {
  let mut p = Program::new();
  p.ty("s64").sp().ident("y").sp().tok(TokenKind::Equal).sp().tok(TokenKind::Null).nl();
  p.ty("bool").sp().ident("b").sp().tok(TokenKind::Equal).sp().tok(TokenKind::True).nl();
  p.eof();
  let emitted = emit(&p);
  // null lowers to plain zero until pointers exist
  assert!(emitted.main_c.contains("s64 y = 0;"), "{}", emitted.main_c);
  assert!(emitted.main_c.contains("u1 b = true;"), "{}", emitted.main_c);
}

#[test]
fn if_chains_join_with_else() {
  let mut p = Program::new();
  p.ty("u8").sp().ident("x").sp().tok(TokenKind::Equal).sp().num(1).nl();
  p.tok(TokenKind::If).sp().ident("x").sp().tok(TokenKind::Less).sp().num(1).tok(TokenKind::Colon).nl();
  p.indent().ident("x").sp().tok(TokenKind::Equal).sp().num(2).nl().dedent();
  p.tok(TokenKind::Else).sp().tok(TokenKind::If).sp().ident("x").sp().tok(TokenKind::Less).sp().num(3);
  p.tok(TokenKind::Colon).nl();
  p.indent().ident("x").sp().tok(TokenKind::Equal).sp().num(4).nl().dedent();
  p.tok(TokenKind::Else).tok(TokenKind::Colon).nl();
  p.indent().ident("x").sp().tok(TokenKind::Equal).sp().num(5).nl().dedent();
  p.eof();

  let emitted = emit(&p);
  assert!(emitted.main_c.contains("if ((x < 1)) {"), "{}", emitted.main_c);
  assert!(emitted.main_c.contains("} else if ((x < 3)) {"), "{}", emitted.main_c);
  assert!(emitted.main_c.contains("} else {"), "{}", emitted.main_c);
}

#[test]
fn cast_and_compound_assignment_lowering() {
  let mut p = Program::new();
  p.ty("u8").sp().ident("x").sp().tok(TokenKind::Equal).sp();
  p.tok(TokenKind::ParenOpen).ty("u8").tok(TokenKind::ParenClose).sp().ch('a').nl();
  p.ident("x").sp().tok(TokenKind::PlusEqual).sp().num(1).nl();
  p.eof();
  let emitted = emit(&p);
  assert!(emitted.main_c.contains("u8 x = ((u8)'a');"), "{}", emitted.main_c);
  assert!(emitted.main_c.contains("x += 1;"), "{}", emitted.main_c);
}

#[test]
fn compile_drives_the_whole_pipeline() {
  let dir = tempfile::tempdir().expect("tempdir");
  let (headers, templates) = common::emit_dirs(dir.path());

  let mut p = Program::new();
  p.ty("u8").sp().ident("x").sp().tok(TokenKind::Equal).sp().num(1).nl().eof();
  let source = p.write_source(dir.path());
  let main_c = dir.path().join("main.c");
  taplc::compile(source, &p.tokens, &p.types, &headers, &templates, &main_c)
    .expect("pipeline succeeds");
  assert!(main_c.exists());

  // a collected user error surfaces as CompileError::User
  let mut bad = Program::new();
  bad.ty("u8").sp().ident("x").sp().tok(TokenKind::Equal).sp().num(300).nl().eof();
  let source = bad.write_source(dir.path());
  match taplc::compile(source, &bad.tokens, &bad.types, &headers, &templates, &main_c) {
    Err(taplc::CompileError::User(errors)) => assert_eq!(errors.len(), 1),
    other => panic!("expected a user error, found {other:?}"),
  }
}

#[test]
fn header_tree_inventory() {
  let mut p = Program::new();
  p.ty("u8").sp().ident("x").sp().tok(TokenKind::Equal).sp().num(1).nl().eof();
  let emitted = emit(&p);

  for header in [
    &emitted.classes_h, &emitted.functions_h, &emitted.types_h,
    &emitted.list_h, &emitted.utility_h,
  ] {
    assert!(header.starts_with("#pragma once"));
  }
  assert!(emitted.types_h.contains("typedef uint8_t u8;"));
  assert!(emitted.utility_h.contains("void panic(const char* message)"));
  assert!(emitted.utility_h.contains("#define RED"));
  assert!(emitted.main_c.contains("#include <tapl_headers/functions.h>"));
  assert!(emitted.main_c.contains("int main(int argc, char** argv) {"));
  assert!(emitted.main_c.trim_end().ends_with('}'));
}
