//! String interning for the Tangle compiler.
//!
//! Every name that flows through the compiler — set names, variable names,
//! tensor names, generated induction-variable names — is interned into a
//! [`Symbol`]: a small copyable id with `O(1)` equality and hashing.
//!
//! Interned strings live for the duration of the process. The interner is a
//! process-wide singleton behind a lock; interning the same string twice
//! returns the same `Symbol`.

#![warn(missing_docs)]

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::sync::OnceLock;

/// An interned string.
///
/// `Symbol`s are cheap to copy and compare. Two symbols are equal exactly
/// when the strings they were interned from are equal.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Symbol(u32);

impl Symbol {
    /// Intern a string, returning its symbol.
    #[must_use]
    pub fn intern(s: &str) -> Self {
        interner().intern(s)
    }

    /// Get the string this symbol was interned from.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        interner().resolve(self)
    }

    /// The raw index of this symbol. Only meaningful within one process.
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self.0
    }
}

impl fmt::Debug for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Symbol({:?})", self.as_str())
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// Symbols serialize as the string they denote, so serialized IR does not
// depend on interner state.
impl Serialize for Symbol {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Symbol {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(Symbol::intern(&s))
    }
}

/// The process-wide interner.
struct Interner {
    inner: RwLock<InternerInner>,
}

struct InternerInner {
    map: FxHashMap<&'static str, Symbol>,
    strings: Vec<&'static str>,
}

impl Interner {
    fn new() -> Self {
        Self {
            inner: RwLock::new(InternerInner {
                map: FxHashMap::default(),
                strings: Vec::new(),
            }),
        }
    }

    fn intern(&self, s: &str) -> Symbol {
        if let Some(&sym) = self.inner.read().map.get(s) {
            return sym;
        }

        let mut inner = self.inner.write();
        // Re-check under the write lock; another thread may have raced us.
        if let Some(&sym) = inner.map.get(s) {
            return sym;
        }

        let leaked: &'static str = Box::leak(s.to_owned().into_boxed_str());
        let sym = Symbol(inner.strings.len() as u32);
        inner.strings.push(leaked);
        inner.map.insert(leaked, sym);
        sym
    }

    fn resolve(&self, sym: Symbol) -> &'static str {
        self.inner.read().strings[sym.0 as usize]
    }
}

fn interner() -> &'static Interner {
    static INTERNER: OnceLock<Interner> = OnceLock::new();
    INTERNER.get_or_init(Interner::new)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intern_is_idempotent() {
        let a = Symbol::intern("stiffness");
        let b = Symbol::intern("stiffness");
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "stiffness");
    }

    #[test]
    fn distinct_strings_distinct_symbols() {
        let a = Symbol::intern("rows");
        let b = Symbol::intern("cols");
        assert_ne!(a, b);
        assert_ne!(a.as_u32(), b.as_u32());
    }

    #[test]
    fn display_round_trips() {
        let sym = Symbol::intern("edge_endpoints");
        assert_eq!(sym.to_string(), "edge_endpoints");
    }
}
