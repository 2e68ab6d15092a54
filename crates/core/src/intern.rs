//! Unique-string table
//!
//! Every distinct identifier text maps to a single [`Name`]: a dense
//! index with the text's hash cached beside it. All symbol comparison
//! in the toolchain is `Name` equality, never character comparison.
//!
//! Text is stored once, in an arena owned by the table, so the bytes
//! never move for the table's lifetime.

use crate::arena::{Arena, ArenaConfig};
use std::collections::HashMap;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// An interned string: identity is the index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Name(u32);

impl Name {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

struct Entry {
    /// Pointer and length of the text inside `StringTable::arena`.
    /// Valid for the table's lifetime: the arena is never cleared and
    /// arena allocations never move.
    text: *const u8,
    len: usize,
    hash: u64,
}

/// Interning table: text in, stable [`Name`] out.
pub struct StringTable {
    arena: Arena,
    by_text: HashMap<u64, Vec<u32>>,
    entries: Vec<Entry>,
}

fn hash_text(s: &str) -> u64 {
    let mut h = DefaultHasher::new();
    s.hash(&mut h);
    h.finish()
}

impl StringTable {
    pub fn new() -> Self {
        StringTable::with_reserve(256 * 1024)
    }

    pub fn with_reserve(reserve_z: usize) -> Self {
        StringTable {
            arena: Arena::new(ArenaConfig::with_reserve(reserve_z)),
            by_text: HashMap::new(),
            entries: Vec::new(),
        }
    }

    fn entry_text(&self, e: &Entry) -> &str {
        // Safety: `text`/`len` were produced by `arena.alloc_str`; the
        // arena lives as long as `self` and is never cleared, and the
        // bytes are valid UTF-8 by construction.
        unsafe {
            std::str::from_utf8_unchecked(std::slice::from_raw_parts(e.text, e.len))
        }
    }

    /// Intern `s`, returning its unique [`Name`]. Two calls with equal
    /// text return the identical name.
    pub fn intern(&mut self, s: &str) -> Name {
        let hash = hash_text(s);
        if let Some(bucket) = self.by_text.get(&hash) {
            for &ix in bucket {
                if self.entry_text(&self.entries[ix as usize]) == s {
                    return Name(ix);
                }
            }
        }
        let stored = self
            .arena
            .alloc_str(s)
            .expect("string table arena exhausted");
        let entry = Entry {
            text: stored.as_ptr(),
            len: stored.len(),
            hash,
        };
        let ix = self.entries.len() as u32;
        self.entries.push(entry);
        self.by_text.entry(hash).or_default().push(ix);
        Name(ix)
    }

    /// The name for `s`, if it has been interned.
    pub fn lookup(&self, s: &str) -> Option<Name> {
        let hash = hash_text(s);
        let bucket = self.by_text.get(&hash)?;
        bucket
            .iter()
            .copied()
            .find(|&ix| self.entry_text(&self.entries[ix as usize]) == s)
            .map(Name)
    }

    /// The text behind a name.
    pub fn resolve(&self, n: Name) -> &str {
        self.entry_text(&self.entries[n.index()])
    }

    /// The cached hash of a name's text.
    pub fn hash_of(&self, n: Name) -> u64 {
        self.entries[n.index()].hash
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for StringTable {
    fn default() -> Self {
        StringTable::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intern_identity() {
        let mut table = StringTable::new();
        let a = table.intern("lambda");
        let b = table.intern("lambda");
        assert_eq!(a, b);
    }

    #[test]
    fn test_distinct_text_distinct_names() {
        let mut table = StringTable::new();
        let a = table.intern("x");
        let b = table.intern("y");
        assert_ne!(a, b);
    }

    #[test]
    fn test_resolve_round_trip() {
        let mut table = StringTable::new();
        let n = table.intern("pi");
        assert_eq!(table.resolve(n), "pi");
    }

    #[test]
    fn test_lookup_without_insert() {
        let mut table = StringTable::new();
        assert_eq!(table.lookup("missing"), None);
        let n = table.intern("present");
        assert_eq!(table.lookup("present"), Some(n));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_hash_cached_and_stable() {
        let mut table = StringTable::new();
        let n = table.intern("stable");
        let h = table.hash_of(n);
        // interning more text does not disturb earlier entries
        for i in 0..100 {
            table.intern(&format!("filler_{i}"));
        }
        assert_eq!(table.hash_of(n), h);
        assert_eq!(table.resolve(n), "stable");
    }
}
