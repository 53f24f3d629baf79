//! The shared data model of the compiler: source spans, the type registry,
//! and the AST (in [`ast`]).
//!
//! The registry interns one immutable [`Type`] per keyword and hands out
//! [`TypeId`]s; everything that *uses* a type carries a [`TypeRef`], which
//! pairs the id with the per-use `is_reference` modifier. This keeps type
//! identity shared while use-site state stays local to the using node.

pub mod ast;

use std::fs;
use std::io;
use std::ops::{Add, AddAssign, Index};
use std::path::Path;
use hashbrown::HashMap;
use smallvec::SmallVec;

/// A region of the source text, as a start offset plus a length in bytes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Span {
  /// Byte offset of the first character covered.
  pub start: u32,
  /// Number of bytes covered.
  pub len: u32,
}

impl Span {
  /// Construct a span from a start offset and length.
  #[must_use] pub fn new(start: u32, len: u32) -> Self { Self { start, len } }
  /// One past the last byte covered.
  #[must_use] pub fn end(self) -> u32 { self.start + self.len }
  /// True if `other` lies entirely within `self`.
  #[must_use] pub fn contains(self, other: Span) -> bool {
    self.start <= other.start && other.end() <= self.end()
  }
}

impl Add for Span {
  type Output = Span;
  /// The smallest span covering both operands.
  fn add(self, other: Span) -> Span {
    let start = self.start.min(other.start);
    Span { start, len: self.end().max(other.end()) - start }
  }
}

impl AddAssign for Span {
  fn add_assign(&mut self, other: Span) { *self = *self + other }
}

/// A value paired with the source span it came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Spanned<T> {
  /// The covered source region.
  pub span: Span,
  /// The wrapped value.
  pub k: T,
}

impl<T> Spanned<T> {
  /// Pair a value with a span.
  #[must_use] pub fn new(span: Span, k: T) -> Self { Self { span, k } }
}

/// An index into the [`Types`] registry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TypeId(u32);

impl TypeId {
  #[must_use] fn into_usize(self) -> usize { self.0 as usize }
}

/// A use of a type: the interned identity plus the use-site reference flag.
///
/// The typing pass marks function and lifecycle parameters as references;
/// the flag then steers the emitter's `->`/`.` joins and `&` insertions.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TypeRef {
  /// The interned type.
  pub id: TypeId,
  /// Whether this use is by reference.
  pub is_reference: bool,
}

impl TypeRef {
  /// A by-value reference to an interned type.
  #[must_use] pub fn new(id: TypeId) -> Self { Self { id, is_reference: false } }
}

/// The signedness class of a numeric type.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NumericKind {
  Signed,
  Unsigned,
  Float,
}

/// The structural classification of a type.
#[derive(Clone, Debug)]
pub enum TypeKind {
  /// The `void` type.
  Void,
  /// The `string` type.
  Str,
  /// The `char` type.
  Character,
  /// A sized integer or float type, with the wider types it may flow into.
  Numeric {
    kind: NumericKind,
    bits: u8,
    promotions: SmallVec<[TypeId; 4]>,
  },
  /// A user-declared class.
  Class,
  /// A `list[T]` instantiation.
  List {
    /// The element type `T`.
    inner: TypeId,
  },
}

/// An interned type. Immutable once registered; per-use state lives in
/// [`TypeRef`].
#[derive(Clone, Debug)]
pub struct Type {
  /// The canonical keyword, e.g. `u8`, `char`, `list[char]`, `MyClass`.
  pub keyword: String,
  /// Alternative keywords mapping to the same type, e.g. `bool` for `u1`.
  pub sugar: &'static [&'static str],
  /// The C typedef target, when it differs from the keyword.
  underlying: Option<&'static str>,
  /// Structural classification.
  pub kind: TypeKind,
  /// All built-in types are basic; classes and lists are not.
  pub is_basic: bool,
}

impl Type {
  /// The C type this keyword aliases; the keyword itself if none.
  #[must_use] pub fn underlying(&self) -> &str { self.underlying.unwrap_or(&self.keyword) }

  /// True unless this is the `void` type.
  #[must_use] pub fn non_void(&self) -> bool { !matches!(self.kind, TypeKind::Void) }

  /// The signedness and bit width, for numeric types.
  #[must_use] pub fn numeric(&self) -> Option<(NumericKind, u8)> {
    match self.kind {
      TypeKind::Numeric { kind, bits, .. } => Some((kind, bits)),
      _ => None,
    }
  }
}

/// The canonical dictionary of every type in a compilation: built-ins,
/// classes, and `list[T]` instantiations. Shared between the tokeniser
/// (which resolves type keywords) and the compiler core.
#[derive(Debug)]
pub struct Types {
  types: Vec<Type>,
  keywords: HashMap<String, TypeId>,
}

impl Index<TypeId> for Types {
  type Output = Type;
  fn index(&self, id: TypeId) -> &Type { &self.types[id.into_usize()] }
}

impl Default for Types {
  fn default() -> Self { Self::new() }
}

/// Ids of the built-in types, fixed by registration order in [`Types::new`].
impl Types {
  pub const VOID: TypeId = TypeId(0);
  pub const U1: TypeId = TypeId(1);
  pub const U8: TypeId = TypeId(2);
  pub const U16: TypeId = TypeId(3);
  pub const U32: TypeId = TypeId(4);
  pub const U64: TypeId = TypeId(5);
  pub const S8: TypeId = TypeId(6);
  pub const S16: TypeId = TypeId(7);
  pub const S32: TypeId = TypeId(8);
  pub const S64: TypeId = TypeId(9);
  pub const F32: TypeId = TypeId(10);
  pub const F64: TypeId = TypeId(11);
  /// The undetermined-integer-literal type: signed, 64 bits, promoted to
  /// the concrete side wherever it meets one.
  pub const BASE: TypeId = TypeId(12);
  pub const CHAR: TypeId = TypeId(13);
  pub const STRING: TypeId = TypeId(14);
}

impl Types {
  /// Construct the registry with the built-in table, the numeric promotion
  /// graph, and the `list[char]` instantiation required by the file
  /// standard library.
  #[must_use] pub fn new() -> Self {
    let mut this = Self { types: Vec::new(), keywords: HashMap::new() };
    let num = |kind, bits| TypeKind::Numeric { kind, bits, promotions: SmallVec::new() };
    use NumericKind::{Float, Signed, Unsigned};
    this.intern(Type {
      keyword: "void".into(), sugar: &[], underlying: None,
      kind: TypeKind::Void, is_basic: true,
    });
    for (keyword, sugar, underlying, kind, bits) in [
      ("u1", &["bool"][..], "bool", Unsigned, 1),
      ("u8", &[], "uint8_t", Unsigned, 8),
      ("u16", &[], "uint16_t", Unsigned, 16),
      ("u32", &[], "uint32_t", Unsigned, 32),
      ("u64", &[], "uint64_t", Unsigned, 64),
      ("s8", &[], "int8_t", Signed, 8),
      ("s16", &[], "int16_t", Signed, 16),
      ("s32", &[], "int32_t", Signed, 32),
      ("s64", &[], "int64_t", Signed, 64),
      ("f32", &[], "float", Float, 32),
      ("f64", &[], "double", Float, 64),
    ] {
      this.intern(Type {
        keyword: keyword.into(), sugar, underlying: Some(underlying),
        kind: num(kind, bits), is_basic: true,
      });
    }
    this.intern(Type {
      keyword: "base".into(), sugar: &[], underlying: None,
      kind: num(Signed, 64), is_basic: true,
    });
    this.intern(Type {
      keyword: "char".into(), sugar: &[], underlying: None,
      kind: TypeKind::Character, is_basic: true,
    });
    this.intern(Type {
      keyword: "string".into(), sugar: &[], underlying: None,
      kind: TypeKind::Str, is_basic: true,
    });
    debug_assert_eq!(this.keywords["string"], Self::STRING);

    this.add_promotions(Self::U1, &[Self::U8, Self::U16, Self::U32, Self::U64]);
    this.add_promotions(Self::U8, &[Self::U16, Self::U32, Self::U64]);
    this.add_promotions(Self::U16, &[Self::U32, Self::U64]);
    this.add_promotions(Self::U32, &[Self::U64]);
    this.add_promotions(Self::S8, &[Self::S16, Self::S32, Self::S64]);
    this.add_promotions(Self::S16, &[Self::S32, Self::S64]);
    this.add_promotions(Self::S32, &[Self::S64]);
    this.add_promotions(Self::F32, &[Self::F64]);

    // the file stdlib signatures need list[char] from the start
    this.add_list_type(Self::CHAR);
    this
  }

  fn intern(&mut self, ty: Type) -> TypeId {
    let id = TypeId(u32::try_from(self.types.len()).expect("type registry overflow"));
    self.keywords.insert(ty.keyword.clone(), id);
    for &s in ty.sugar { self.keywords.insert(s.into(), id); }
    self.types.push(ty);
    id
  }

  fn add_promotions(&mut self, id: TypeId, wider: &[TypeId]) {
    let TypeKind::Numeric { promotions, .. } = &mut self.types[id.into_usize()].kind
      else { unreachable!("promotions on a non-numeric type") };
    promotions.extend_from_slice(wider);
  }

  /// Register a bare named type, used for forward references by the
  /// tokeniser. Idempotent: a known keyword returns its existing id.
  /// A forward-referenced bare keyword can only name a class.
  pub fn add(&mut self, keyword: &str) -> TypeId {
    self.add_class_type(keyword)
  }

  /// Register a class type. Idempotent.
  pub fn add_class_type(&mut self, keyword: &str) -> TypeId {
    if let Some(&id) = self.keywords.get(keyword) {
      assert!(matches!(self[id].kind, TypeKind::Class), "'{keyword}' is not a class type");
      return id
    }
    self.intern(Type {
      keyword: keyword.into(), sugar: &[], underlying: None,
      kind: TypeKind::Class, is_basic: false,
    })
  }

  /// Register (or find) the `list[T]` instantiation for an element type.
  /// Instantiations are materialised lazily on first request and shared
  /// afterwards.
  pub fn add_list_type(&mut self, inner: TypeId) -> TypeId {
    let keyword = format!("list[{}]", self[inner].keyword);
    if let Some(&id) = self.keywords.get(keyword.as_str()) { return id }
    self.intern(Type {
      keyword, sugar: &[], underlying: None,
      kind: TypeKind::List { inner }, is_basic: false,
    })
  }

  /// Look up a keyword (or sugar alias), returning a fresh by-value
  /// [`TypeRef`] into the registry.
  #[must_use] pub fn get(&self, keyword: &str) -> Option<TypeRef> {
    self.keywords.get(keyword).map(|&id| TypeRef::new(id))
  }

  /// Look up a keyword that is known to exist.
  ///
  /// # Panics
  /// If the keyword is not registered.
  #[must_use] pub fn type_ref(&self, keyword: &str) -> TypeRef {
    self.get(keyword).unwrap_or_else(|| panic!("unknown type keyword '{keyword}'"))
  }

  /// The element type of a `list[T]`, if `id` is a list.
  #[must_use] pub fn list_inner(&self, id: TypeId) -> Option<TypeId> {
    match self[id].kind {
      TypeKind::List { inner } => Some(inner),
      _ => None,
    }
  }

  /// Whether `from` may flow into a `to` slot: equal, or `to` is in
  /// `from`'s promotion set.
  #[must_use] pub fn can_promote(&self, from: TypeId, to: TypeId) -> bool {
    if from == to { return true }
    match &self[from].kind {
      TypeKind::Numeric { promotions, .. } => promotions.contains(&to),
      _ => false,
    }
  }

  /// The return type of a method callable on a `list[T]` receiver, or
  /// `None` if the name is not a list method.
  #[must_use] pub fn list_method(&self, inner: TypeId, name: &str) -> Option<TypeId> {
    match name {
      "push" => Some(Self::VOID),
      "pop" | "get" => Some(inner),
      "size" => Some(Self::U64),
      _ => None,
    }
  }

  /// The spelling of a type in emitted C: `list_T` for lists, the keyword
  /// for everything else.
  #[must_use] pub fn c_name(&self, id: TypeId) -> String {
    match self[id].kind {
      TypeKind::List { inner } => format!("list_{}", self[inner].keyword),
      _ => self[id].keyword.clone(),
    }
  }

  /// Iterate over the canonical types in registration order.
  pub fn iter(&self) -> impl Iterator<Item = (TypeId, &Type)> {
    self.types.iter().enumerate().map(|(i, ty)| (TypeId(i as u32), ty))
  }

  /// Write `types.h` (typedefs for the basic types) and `list.h` (one
  /// filled-in template per `list[T]` instantiation) into `header_dir`.
  pub fn generate_c_headers(&self, header_dir: &Path, templates_dir: &Path) -> io::Result<()> {
    self.write_basic_type_header(header_dir)?;
    self.write_list_type_header(header_dir, templates_dir)
  }

  fn write_basic_type_header(&self, header_dir: &Path) -> io::Result<()> {
    let mut code = String::from(
      "#pragma once\n\
       \n\
       #include <stdbool.h>\n\
       #include <stdint.h>\n\
       \n\
       // typedefs for the builtin basic types defined in TAPL\n");
    for (_, ty) in self.iter() {
      // only alias the types that have a different name in c
      if ty.is_basic && ty.underlying() != ty.keyword {
        code.push_str(&format!("typedef {} {};\n", ty.underlying(), ty.keyword));
      }
    }
    fs::write(header_dir.join("types.h"), code)
  }

  fn write_list_type_header(&self, header_dir: &Path, templates_dir: &Path) -> io::Result<()> {
    let mut code = String::from(
      "#pragma once\n\
       \n\
       // include the needed system headers\n\
       #include <stdio.h>\n\
       #include <stdlib.h>\n\
       \n\
       // also include the needed TAPL headers\n\
       #include <tapl_headers/types.h>\n\
       #include <tapl_headers/utility_functions.h>\n\
       \n");
    for (_, ty) in self.iter() {
      if let TypeKind::List { inner } = ty.kind {
        let template = fs::read_to_string(templates_dir.join("list.h"))?;
        code.push_str(&template.replace("TYPE", &self[inner].keyword));
      }
    }
    fs::write(header_dir.join("list.h"), code)
  }
}
