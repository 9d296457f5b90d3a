//! Maps identifier names to storage slots at compile time. The compiler
//! consults this instead of an `Environment` — scope resolution happens once,
//! up front, rather than at every variable access.

use ahash::AHashMap;

/// Where a symbol's value lives at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Global,
    Local,
    Builtin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Symbol {
    pub scope: Scope,
    pub index: usize,
}

/// One lexical scope's bindings, optionally chained to an enclosing scope.
///
/// Redefining a name in the same scope overwrites its slot rather than
/// shadowing with a fresh index — the last `let` for a given name wins, and
/// earlier compiled references to that name keep pointing at the same slot
/// they always did.
#[derive(Debug, Default)]
pub struct SymbolTable {
    store: AHashMap<String, Symbol>,
    outer: Option<Box<SymbolTable>>,
    num_defs: usize,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enclosed(outer: SymbolTable) -> Self {
        Self {
            store: AHashMap::new(),
            outer: Some(Box::new(outer)),
            num_defs: 0,
        }
    }

    /// Unwraps one scope level, handing the caller back the enclosing table.
    /// Panics if this is already the outermost table — compiler scope
    /// entry/exit is always balanced.
    pub fn pop(self) -> SymbolTable {
        *self.outer.expect("pop called on outermost symbol table")
    }

    pub fn define(&mut self, name: impl Into<String>) -> Symbol {
        let name = name.into();
        if let Some(existing) = self.store.get(&name) {
            return *existing;
        }
        let scope = if self.outer.is_some() { Scope::Local } else { Scope::Global };
        let index = self.num_defs;
        let symbol = Symbol { scope, index };
        self.store.insert(name, symbol);
        self.num_defs += 1;
        symbol
    }

    pub fn define_builtin(&mut self, index: usize, name: impl Into<String>) -> Symbol {
        let symbol = Symbol { scope: Scope::Builtin, index };
        self.store.insert(name.into(), symbol);
        symbol
    }

    pub fn resolve(&self, name: &str) -> Option<Symbol> {
        self.store
            .get(name)
            .copied()
            .or_else(|| self.outer.as_ref().and_then(|outer| outer.resolve(name)))
    }

    pub fn num_definitions(&self) -> usize {
        self.num_defs
    }

    pub fn is_global(&self) -> bool {
        self.outer.is_none()
    }
}
