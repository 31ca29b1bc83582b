use std::fmt;

use rustc_hash::FxHashMap;
use serde::Serialize;

/// A small handle identifying an interned string.
///
/// Two symbols are equal exactly when they were interned from the same
/// text by the same [`Interner`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Symbol(u32);

impl Symbol {
    /// The raw index of this symbol inside its interner.
    pub fn index(self) -> u32 {
        self.0
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Maps text to [`Symbol`] handles and back.
///
/// Interning is append-only: a symbol stays valid for the lifetime of the
/// interner that produced it.
#[derive(Default, Debug)]
pub struct Interner {
    map: FxHashMap<Box<str>, Symbol>,
    strings: Vec<Box<str>>,
}

impl Interner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern `text`, returning the existing handle if it was seen before.
    pub fn intern(&mut self, text: &str) -> Symbol {
        if let Some(&sym) = self.map.get(text) {
            return sym;
        }
        let sym = Symbol(self.strings.len() as u32);
        let owned: Box<str> = text.into();
        self.strings.push(owned.clone());
        self.map.insert(owned, sym);
        sym
    }

    /// Look up `text` without interning it.
    pub fn get(&self, text: &str) -> Option<Symbol> {
        self.map.get(text).copied()
    }

    /// The text behind a symbol.
    ///
    /// # Panics
    ///
    /// Panics if `sym` was produced by a different interner.
    pub fn resolve(&self, sym: Symbol) -> &str {
        &self.strings[sym.0 as usize]
    }

    /// Number of distinct strings interned so far.
    pub fn len(&self) -> usize {
        self.strings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interning_is_idempotent() {
        let mut interner = Interner::new();
        let a = interner.intern("Point");
        let b = interner.intern("Point");
        assert_eq!(a, b);
        assert_eq!(interner.len(), 1);
    }

    #[test]
    fn distinct_text_gets_distinct_symbols() {
        let mut interner = Interner::new();
        let a = interner.intern("x");
        let b = interner.intern("y");
        assert_ne!(a, b);
        assert_eq!(interner.resolve(a), "x");
        assert_eq!(interner.resolve(b), "y");
    }

    #[test]
    fn get_does_not_intern() {
        let mut interner = Interner::new();
        assert!(interner.get("missing").is_none());
        let sym = interner.intern("present");
        assert_eq!(interner.get("present"), Some(sym));
        assert_eq!(interner.len(), 1);
    }
}
