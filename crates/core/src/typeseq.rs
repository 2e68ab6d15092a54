//! Dense runtime type sequence numbers
//!
//! Every concrete type (and every facet) gets a small process-wide
//! integer, assigned at first request. The numbers are dense so they
//! can index the facet registry's tables directly.

use std::any::TypeId;
use std::collections::HashMap;
use std::sync::{Mutex, OnceLock};

/// A dense, process-wide sequence number for a type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeSeq(u32);

impl TypeSeq {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Display for TypeSeq {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ts#{}", self.0)
    }
}

fn sequencer() -> &'static Mutex<HashMap<TypeId, TypeSeq>> {
    static SEQUENCER: OnceLock<Mutex<HashMap<TypeId, TypeSeq>>> = OnceLock::new();
    SEQUENCER.get_or_init(|| Mutex::new(HashMap::new()))
}

/// Sequence number for `T`, assigning one on first request.
///
/// `T` may be a trait object type; facets are numbered from the same
/// sequencer as concrete representations.
pub fn typeseq_of<T: ?Sized + 'static>() -> TypeSeq {
    typeseq_of_id(TypeId::of::<T>())
}

/// Sequence number for a runtime `TypeId`, assigning one on first
/// request. Used when only a `&dyn Any` is in hand.
pub fn typeseq_of_id(id: TypeId) -> TypeSeq {
    let mut map = sequencer().lock().expect("typeseq sequencer poisoned");
    let next = TypeSeq(map.len() as u32);
    *map.entry(id).or_insert(next)
}

/// Sequence number for a runtime `TypeId` if one has been assigned.
pub fn lookup_typeseq(id: TypeId) -> Option<TypeSeq> {
    sequencer()
        .lock()
        .expect("typeseq sequencer poisoned")
        .get(&id)
        .copied()
}

/// Number of sequence numbers assigned so far. Upper bound for table
/// sizing in the facet registry.
pub fn typeseq_count() -> usize {
    sequencer().lock().expect("typeseq sequencer poisoned").len()
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Alpha;
    struct Beta;

    #[test]
    fn test_same_type_same_seq() {
        assert_eq!(typeseq_of::<Alpha>(), typeseq_of::<Alpha>());
    }

    #[test]
    fn test_distinct_types_distinct_seqs() {
        assert_ne!(typeseq_of::<Alpha>(), typeseq_of::<Beta>());
    }

    #[test]
    fn test_lookup_after_assignment() {
        let seq = typeseq_of::<Alpha>();
        assert_eq!(lookup_typeseq(TypeId::of::<Alpha>()), Some(seq));
    }

    #[test]
    fn test_dense_indices() {
        let a = typeseq_of::<Alpha>();
        let b = typeseq_of::<Beta>();
        assert!(a.index() < typeseq_count());
        assert!(b.index() < typeseq_count());
    }
}
