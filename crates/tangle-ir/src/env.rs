//! The environment: global declarations of one function's compilation.
//!
//! The environment owns externs, temporaries and tensor indices.
//! Registration is idempotent by identity (variable name, index key):
//! registering the same logical entity twice is a no-op, which makes the
//! lowering passes safe to re-run over the same expression.

use crate::{TensorIndex, Var};
use rustc_hash::FxHashMap;
use tangle_intern::Symbol;

/// Registry of global declarations for one function.
#[derive(Clone, Debug, Default)]
pub struct Environment {
    externs: Vec<Var>,
    temporaries: Vec<Var>,
    tensor_indices: Vec<TensorIndex>,

    // Identity maps guarding against duplicate registration.
    extern_names: FxHashMap<Symbol, usize>,
    temporary_names: FxHashMap<Symbol, usize>,
    index_keys: FxHashMap<Symbol, usize>,
}

impl Environment {
    /// Create an empty environment.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an extern. Returns `false` if a variable of the same name
    /// was already registered.
    pub fn add_extern(&mut self, var: Var) -> bool {
        if self.extern_names.contains_key(&var.name()) {
            return false;
        }
        self.extern_names.insert(var.name(), self.externs.len());
        self.externs.push(var);
        true
    }

    /// Register a temporary. Returns `false` on duplicate names.
    pub fn add_temporary(&mut self, var: Var) -> bool {
        if self.temporary_names.contains_key(&var.name()) {
            return false;
        }
        self.temporary_names
            .insert(var.name(), self.temporaries.len());
        self.temporaries.push(var);
        true
    }

    /// Register the tensor index for an entity (a sparse tensor or an edge
    /// set), keyed by that entity's name. Returns `false` if an index was
    /// already registered under the key.
    pub fn add_tensor_index(&mut self, key: Symbol, index: TensorIndex) -> bool {
        if self.index_keys.contains_key(&key) {
            return false;
        }
        self.index_keys.insert(key, self.tensor_indices.len());
        self.tensor_indices.push(index);
        true
    }

    /// Look up the tensor index registered for an entity.
    #[must_use]
    pub fn tensor_index(&self, key: Symbol) -> Option<&TensorIndex> {
        self.index_keys.get(&key).map(|&i| &self.tensor_indices[i])
    }

    /// Check whether an entity has a registered tensor index.
    #[must_use]
    pub fn has_tensor_index(&self, key: Symbol) -> bool {
        self.index_keys.contains_key(&key)
    }

    /// All registered externs, in registration order.
    #[must_use]
    pub fn externs(&self) -> &[Var] {
        &self.externs
    }

    /// All registered temporaries, in registration order.
    #[must_use]
    pub fn temporaries(&self) -> &[Var] {
        &self.temporaries
    }

    /// All registered tensor indices, in registration order.
    #[must_use]
    pub fn tensor_indices(&self) -> &[TensorIndex] {
        &self.tensor_indices
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::IndexSet;

    #[test]
    fn registration_is_idempotent() {
        let mut env = Environment::new();
        let n = Var::int("points_len");

        assert!(env.add_extern(n.clone()));
        assert!(!env.add_extern(n));
        assert_eq!(env.externs().len(), 1);

        let key = Symbol::intern("A");
        let idx = TensorIndex::new(
            Symbol::intern("A_row2col"),
            IndexSet::set("points"),
            IndexSet::set("points"),
        );
        assert!(env.add_tensor_index(key, idx.clone()));
        assert!(!env.add_tensor_index(key, idx));
        assert_eq!(env.tensor_indices().len(), 1);
        assert!(env.has_tensor_index(key));
    }

    #[test]
    fn lookup_by_key() {
        let mut env = Environment::new();
        let key = Symbol::intern("B");
        let idx = TensorIndex::new(
            Symbol::intern("B_row2col"),
            IndexSet::set("points"),
            IndexSet::set("points"),
        );
        env.add_tensor_index(key, idx.clone());

        assert_eq!(env.tensor_index(key), Some(&idx));
        assert_eq!(env.tensor_index(Symbol::intern("missing")), None);
    }
}
