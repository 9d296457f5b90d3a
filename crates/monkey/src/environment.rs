//! Lexically-scoped name -> value bindings for the tree-walk evaluator.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use ahash::RandomState;

use crate::object::Object;

/// A shared handle to an [`Environment`].
///
/// Closures hold a clone of this handle rather than an owned `Environment`,
/// so later bindings in the defining scope (e.g. a second `let` in the same
/// block) stay visible to any closure captured earlier from that scope —
/// this is what makes the classic counter-closure idiom work.
pub type EnvRef = Rc<RefCell<Environment>>;

/// One lexical scope: a local name table plus an optional link to the
/// enclosing scope.
#[derive(Debug, Default)]
pub struct Environment {
    store: HashMap<String, Object, RandomState>,
    outer: Option<EnvRef>,
}

impl Environment {
    /// A fresh, outer-less environment — used as the global scope.
    pub fn new() -> EnvRef {
        Rc::new(RefCell::new(Environment {
            store: HashMap::default(),
            outer: None,
        }))
    }

    /// A new scope enclosed by `outer`, e.g. the per-call scope created when
    /// invoking a function.
    pub fn enclosed(outer: EnvRef) -> EnvRef {
        Rc::new(RefCell::new(Environment {
            store: HashMap::default(),
            outer: Some(outer),
        }))
    }

    /// Looks up `name` in this scope, then walks `outer` links until found
    /// or the chain is exhausted.
    pub fn get(&self, name: &str) -> Option<Object> {
        if let Some(value) = self.store.get(name) {
            return Some(value.clone());
        }
        self.outer.as_ref().and_then(|outer| outer.borrow().get(name))
    }

    /// Binds `name` to `value` in this (the innermost) scope, shadowing any
    /// outer binding of the same name.
    pub fn set(&mut self, name: impl Into<String>, value: Object) {
        self.store.insert(name.into(), value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_finds_local_bindings() {
        let env = Environment::new();
        env.borrow_mut().set("x", Object::Int(5));
        assert_eq!(env.borrow().get("x"), Some(Object::Int(5)));
    }

    #[test]
    fn get_walks_outer_chain() {
        let global = Environment::new();
        global.borrow_mut().set("x", Object::Int(5));
        let inner = Environment::enclosed(global);
        assert_eq!(inner.borrow().get("x"), Some(Object::Int(5)));
    }

    #[test]
    fn inner_binding_shadows_outer() {
        let global = Environment::new();
        global.borrow_mut().set("x", Object::Int(5));
        let inner = Environment::enclosed(global.clone());
        inner.borrow_mut().set("x", Object::Int(10));
        assert_eq!(inner.borrow().get("x"), Some(Object::Int(10)));
        assert_eq!(global.borrow().get("x"), Some(Object::Int(5)));
    }

    #[test]
    fn missing_name_returns_none() {
        let env = Environment::new();
        assert_eq!(env.borrow().get("missing"), None);
    }
}
