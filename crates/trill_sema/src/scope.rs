//! Lexical scope tracking (§4.6.1): module → type → function → compound,
//! each scope mapping identifiers to overload-aware declaration lists.

use rustc_hash::FxHashMap;
use trill_base::Symbol;
use trill_syntax::ast::DeclId;

/// What kind of scope a [`Scope`] represents — only used to decide
/// shadowing/`mutating`/`self` diagnostics, not to change lookup
/// semantics (lookup always walks outward).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    Module,
    Type,
    Function,
    Compound,
}

#[derive(Default)]
struct Scope {
    kind: Option<ScopeKind>,
    names: FxHashMap<Symbol, Vec<DeclId>>,
}

/// Outcome of [`ScopeStack::declare`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Declared {
    /// First declaration of this name in the current scope.
    Fresh,
    /// Added to an existing overload set for the current scope (only
    /// legal for functions/initializers).
    Overload,
    /// Invalid redeclaration: a non-overloadable name clashes with an
    /// existing entry in the current scope (§4.6.6).
    Redeclared,
    /// Shadows a parameter visible in an enclosing function scope — not
    /// an error, a warning (§4.6.6).
    ShadowsParameter,
}

/// A stack of nested scopes. Lookups walk from the innermost scope
/// outward; declarations always land in the innermost scope.
pub struct ScopeStack {
    scopes: Vec<Scope>,
}

impl ScopeStack {
    pub fn new() -> Self {
        Self { scopes: vec![Scope { kind: Some(ScopeKind::Module), names: FxHashMap::default() }] }
    }

    pub fn push(&mut self, kind: ScopeKind) {
        self.scopes.push(Scope { kind: Some(kind), names: FxHashMap::default() });
    }

    pub fn pop(&mut self) {
        self.scopes.pop();
    }

    /// Declares `name` as `decl` in the current (innermost) scope.
    /// `overloadable` should be `true` only for function-like
    /// declarations (functions, initializers) — everything else clashes
    /// on redeclaration.
    pub fn declare(&mut self, name: Symbol, decl: DeclId, overloadable: bool) -> Declared {
        let shadows_param = self.shadows_enclosing_parameter(name);
        let scope = self.scopes.last_mut().expect("at least the module scope is always present");
        match scope.names.get_mut(&name) {
            None => {
                scope.names.insert(name, vec![decl]);
                if shadows_param {
                    Declared::ShadowsParameter
                } else {
                    Declared::Fresh
                }
            }
            Some(existing) => {
                if overloadable {
                    existing.push(decl);
                    Declared::Overload
                } else {
                    Declared::Redeclared
                }
            }
        }
    }

    /// `true` if `name` is already bound to a parameter in an *enclosing*
    /// (not the current) function scope — used only to drive the
    /// shadowing warning, not lookup.
    fn shadows_enclosing_parameter(&self, name: Symbol) -> bool {
        for scope in self.scopes.iter().rev().skip(1) {
            if scope.names.contains_key(&name) {
                return true;
            }
            if scope.kind == Some(ScopeKind::Function) {
                break;
            }
        }
        false
    }

    /// Resolves `name` by walking outward from the innermost scope,
    /// returning the first scope's overload set that contains it (an
    /// inner declaration always hides an outer one of the same name,
    /// never merges with it).
    pub fn lookup(&self, name: Symbol) -> Option<&[DeclId]> {
        for scope in self.scopes.iter().rev() {
            if let Some(decls) = scope.names.get(&name) {
                return Some(decls);
            }
        }
        None
    }

    /// `true` if we are currently inside a function scope whose nearest
    /// enclosing (non-function) scope is a type scope — i.e. inside a
    /// method, initializer, deinitializer, or accessor body, where `self`
    /// is legal (§4.6.6).
    pub fn inside_method(&self) -> bool {
        let mut saw_function = false;
        for scope in self.scopes.iter().rev() {
            match scope.kind {
                Some(ScopeKind::Function) => saw_function = true,
                Some(ScopeKind::Type) => return saw_function,
                Some(ScopeKind::Module) => return false,
                _ => {}
            }
        }
        false
    }
}

impl Default for ScopeStack {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sym(n: u32) -> Symbol {
        // Symbols are opaque; tests only need distinct stable values, and
        // `Symbol` has no public constructor outside `Interner`, so we
        // route through a real interner.
        let mut interner = trill_base::Interner::new();
        interner.intern(&format!("s{n}"))
    }

    fn id(n: u32) -> DeclId {
        // DeclId has no public constructor either; build one indirectly
        // via a throwaway AstContext.
        let mut ctx = trill_syntax::ast::AstContext::new();
        for _ in 0..n {
            ctx.alloc_decl(
                trill_syntax::ast::DeclKind::Operator(trill_syntax::ast::OperatorDecl { symbol: Symbol::EMPTY }),
                None,
                trill_syntax::ast::Attributes::none(),
            );
        }
        ctx.alloc_decl(
            trill_syntax::ast::DeclKind::Operator(trill_syntax::ast::OperatorDecl { symbol: Symbol::EMPTY }),
            None,
            trill_syntax::ast::Attributes::none(),
        )
    }

    #[test]
    fn fresh_declaration_succeeds() {
        let mut scopes = ScopeStack::new();
        assert_eq!(scopes.declare(sym(0), id(0), false), Declared::Fresh);
    }

    #[test]
    fn redeclaring_a_non_overloadable_name_is_rejected() {
        let mut scopes = ScopeStack::new();
        scopes.declare(sym(0), id(0), false);
        assert_eq!(scopes.declare(sym(0), id(1), false), Declared::Redeclared);
    }

    #[test]
    fn overloadable_names_accumulate() {
        let mut scopes = ScopeStack::new();
        scopes.declare(sym(0), id(0), true);
        assert_eq!(scopes.declare(sym(0), id(1), true), Declared::Overload);
        assert_eq!(scopes.lookup(sym(0)).unwrap().len(), 2);
    }

    #[test]
    fn inner_scope_shadows_outer() {
        let mut scopes = ScopeStack::new();
        scopes.declare(sym(0), id(0), false);
        scopes.push(ScopeKind::Compound);
        scopes.declare(sym(0), id(1), false);
        assert_eq!(scopes.lookup(sym(0)), Some(&[id(1)][..]));
        scopes.pop();
        assert_eq!(scopes.lookup(sym(0)), Some(&[id(0)][..]));
    }

    #[test]
    fn shadowing_a_parameter_is_flagged() {
        let mut scopes = ScopeStack::new();
        scopes.push(ScopeKind::Function);
        scopes.declare(sym(1), id(0), false); // parameter
        scopes.push(ScopeKind::Compound);
        assert_eq!(scopes.declare(sym(1), id(1), false), Declared::ShadowsParameter);
    }

    #[test]
    fn inside_method_detects_type_then_function_nesting() {
        let mut scopes = ScopeStack::new();
        assert!(!scopes.inside_method());
        scopes.push(ScopeKind::Type);
        scopes.push(ScopeKind::Function);
        assert!(scopes.inside_method());
        scopes.push(ScopeKind::Compound);
        assert!(scopes.inside_method());
    }

    #[test]
    fn top_level_function_is_not_a_method() {
        let mut scopes = ScopeStack::new();
        scopes.push(ScopeKind::Function);
        assert!(!scopes.inside_method());
    }
}
