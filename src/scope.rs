//! Lexical scopes for the semantic passes.
//!
//! Scopes live in an arena owned by the pass; a scope points at its parent
//! by index, and the [`ScopeTree`] keeps a cursor to the innermost scope.
//! "Popping" a scope only moves the cursor, so a scope retained elsewhere
//! (the typing pass keeps every class scope in a side table) stays valid
//! for the lifetime of the pass.

use hashbrown::HashMap;
use crate::types::TypeRef;

/// An index into the scope arena of a [`ScopeTree`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScopeId(u32);

impl ScopeId {
  fn into_usize(self) -> usize { self.0 as usize }
}

/// The signature of a declared function, copied into the scope that
/// declares it so call sites can be checked without holding on to the AST
/// node.
#[derive(Clone, Debug)]
pub struct FnSig {
  pub name: String,
  /// The declared return type.
  pub ret: TypeRef,
  /// The declared parameters, as `(type, name)` pairs.
  pub args: Vec<(TypeRef, String)>,
}

/// One lexical scope: the identifiers and functions declared directly in
/// it, plus a back-pointer to the enclosing scope.
#[derive(Debug, Default)]
struct Scope {
  parent: Option<ScopeId>,
  identifiers: HashMap<String, TypeRef>,
  functions: HashMap<String, FnSig>,
}

/// The scope arena plus the cursor to the currently innermost scope, with
/// a stash of size one for swapping in a clean top-level scope.
#[derive(Debug)]
pub struct ScopeTree {
  scopes: Vec<Scope>,
  current: ScopeId,
  stash: Option<ScopeId>,
}

impl Default for ScopeTree {
  fn default() -> Self { Self::new() }
}

impl ScopeTree {
  /// A tree holding only the global scope.
  #[must_use] pub fn new() -> Self {
    Self { scopes: vec![Scope::default()], current: ScopeId(0), stash: None }
  }

  fn alloc(&mut self, parent: Option<ScopeId>) -> ScopeId {
    let id = ScopeId(u32::try_from(self.scopes.len()).expect("scope arena overflow"));
    self.scopes.push(Scope { parent, ..Scope::default() });
    id
  }

  /// The innermost scope.
  #[must_use] pub fn current(&self) -> ScopeId { self.current }

  /// True when the cursor is back at the global scope. Every pass asserts
  /// this on exit.
  #[must_use] pub fn at_root(&self) -> bool {
    self.scopes[self.current.into_usize()].parent.is_none()
  }

  /// True when no clean scope is stashed away. Every pass asserts this on
  /// exit.
  #[must_use] pub fn stash_empty(&self) -> bool { self.stash.is_none() }

  /// Enter a new scope nested in the current one.
  pub fn push(&mut self) {
    self.current = self.alloc(Some(self.current));
  }

  /// Leave the current scope, back to its parent.
  ///
  /// # Panics
  /// If the cursor is at the global scope.
  pub fn pop(&mut self) {
    self.current = self.scopes[self.current.into_usize()].parent
      .expect("scope underflow: cannot pop the global scope");
  }

  /// Stash the current scope chain aside and switch to a fresh top-level
  /// scope, returning its id. Used when entering a class body, which must
  /// not see the surrounding identifiers.
  ///
  /// # Panics
  /// If a clean scope is already active.
  pub fn stash_clean(&mut self) -> ScopeId {
    assert!(self.stash.is_none(), "clean scope already active");
    self.stash = Some(self.current);
    self.current = self.alloc(None);
    self.current
  }

  /// Restore the scope chain stashed by [`stash_clean`](Self::stash_clean).
  ///
  /// # Panics
  /// If no scope is stashed.
  pub fn restore(&mut self) {
    self.current = self.stash.take().expect("no stashed scope to restore");
  }

  /// Declare an identifier in the innermost scope. Returns `false` when
  /// the name already exists there; shadowing outer scopes is allowed.
  pub fn declare(&mut self, name: &str, ty: TypeRef) -> bool {
    let scope = &mut self.scopes[self.current.into_usize()];
    if scope.identifiers.contains_key(name) { return false }
    scope.identifiers.insert(name.into(), ty);
    true
  }

  /// Record a function signature in the innermost scope. Returns `false`
  /// when the name already has one there.
  pub fn declare_function(&mut self, sig: FnSig) -> bool {
    let scope = &mut self.scopes[self.current.into_usize()];
    if scope.functions.contains_key(&sig.name) { return false }
    scope.functions.insert(sig.name.clone(), sig);
    true
  }

  /// Look an identifier up from the innermost scope outward.
  #[must_use] pub fn lookup(&self, name: &str) -> Option<TypeRef> {
    self.lookup_in(self.current, name)
  }

  /// Look an identifier up from `scope` outward. Used to resolve member
  /// accesses inside a retained class scope.
  #[must_use] pub fn lookup_in(&self, scope: ScopeId, name: &str) -> Option<TypeRef> {
    let mut at = Some(scope);
    while let Some(id) = at {
      let scope = &self.scopes[id.into_usize()];
      if let Some(&ty) = scope.identifiers.get(name) { return Some(ty) }
      at = scope.parent;
    }
    None
  }

  /// Look a function up from the innermost scope outward.
  #[must_use] pub fn function(&self, name: &str) -> Option<&FnSig> {
    self.function_in(self.current, name)
  }

  /// Look a function up from `scope` outward.
  #[must_use] pub fn function_in(&self, scope: ScopeId, name: &str) -> Option<&FnSig> {
    let mut at = Some(scope);
    while let Some(id) = at {
      let scope = &self.scopes[id.into_usize()];
      if let Some(sig) = scope.functions.get(name) { return Some(sig) }
      at = scope.parent;
    }
    None
  }

  /// The names declared directly in the innermost scope, for trace output.
  pub fn current_names(&self) -> impl Iterator<Item = &str> {
    self.scopes[self.current.into_usize()].identifiers.keys().map(String::as_str)
  }
}
