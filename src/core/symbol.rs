//! Canonical symbol handle
//!
//! A `Symbol` is a cheap, clonable reference to the single heap instance the
//! `SymbolCache` keeps for its content. Two symbols resolved through the same
//! cache with equal content point at the same allocation, so identity checks
//! are a pointer compare.

use std::borrow::Borrow;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::Deref;
use std::sync::Arc;

#[derive(Clone)]
#[repr(transparent)]
pub struct Symbol(Arc<str>);

impl Symbol {
    /// Wrap content into a fresh (non-canonical) instance.
    ///
    /// Only the cache should call this; everyone else resolves.
    #[inline]
    pub(crate) fn new(content: &str) -> Self {
        Self(Arc::from(content))
    }

    #[inline(always)]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Reference identity (same canonical instance)
    #[inline(always)]
    pub fn ptr_eq(a: &Self, b: &Self) -> bool {
        Arc::ptr_eq(&a.0, &b.0)
    }

    /// Number of live handles to this instance, cache included
    #[inline]
    pub fn handle_count(&self) -> usize {
        Arc::strong_count(&self.0)
    }
}

impl Deref for Symbol {
    type Target = str;

    #[inline(always)]
    fn deref(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for Symbol {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for Symbol {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl PartialEq for Symbol {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        Self::ptr_eq(self, other) || self.0 == other.0
    }
}

impl Eq for Symbol {}

impl PartialEq<str> for Symbol {
    fn eq(&self, other: &str) -> bool {
        &*self.0 == other
    }
}

impl PartialEq<&str> for Symbol {
    fn eq(&self, other: &&str) -> bool {
        &*self.0 == *other
    }
}

impl Hash for Symbol {
    #[inline]
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.hash(state);
    }
}

impl fmt::Debug for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Symbol({:?})", &*self.0)
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_equality() {
        let a = Symbol::new("IBM");
        let b = Symbol::new("IBM");
        assert_eq!(a, b);
        assert!(!Symbol::ptr_eq(&a, &b));
        assert_eq!(a, "IBM");
    }

    #[test]
    fn test_clone_shares_instance() {
        let a = Symbol::new("MSFT");
        let b = a.clone();
        assert!(Symbol::ptr_eq(&a, &b));
        assert_eq!(a.handle_count(), 2);
    }

    #[test]
    fn test_display_and_deref() {
        let s = Symbol::new("AAPL{=d}");
        assert_eq!(s.to_string(), "AAPL{=d}");
        assert_eq!(s.len(), 8);
        assert!(s.starts_with("AAPL"));
    }
}
