//! Facet registry: dynamic (facet, representation) dispatch
//!
//! A facet is an abstract capability expressed as a trait object type
//! (`dyn Printable`, `dyn Procedure`, ...). The registry stores, for
//! each (facet, concrete type) pair, a caster that produces the facet
//! view of an opaque `&dyn Any`. Closed variants in the toolchain use
//! plain enums; the registry carries the open extensions.
//!
//! The table is process-global and append-only: subsystems register
//! their implementations from one-shot `init::require()` functions at
//! startup, and everything afterwards is read-only lookups.

use crate::typeseq::{self, TypeSeq};
use std::any::Any;
use std::sync::{OnceLock, RwLock};

/// Caster from an opaque data reference to a facet view.
///
/// Registered casters are only invoked when the registry has already
/// matched the concrete type, so the downcast inside always succeeds.
pub type CastFn<F> = fn(&dyn Any) -> &F;

struct CastEntry(Box<dyn Any + Send + Sync>);

/// Two-level table: `[facet typeseq][concrete typeseq]` -> caster.
pub struct FacetRegistry {
    table: RwLock<Vec<Vec<Option<CastEntry>>>>,
}

impl FacetRegistry {
    fn new() -> Self {
        FacetRegistry {
            table: RwLock::new(Vec::new()),
        }
    }

    /// The process-wide registry.
    pub fn instance() -> &'static FacetRegistry {
        static INSTANCE: OnceLock<FacetRegistry> = OnceLock::new();
        INSTANCE.get_or_init(FacetRegistry::new)
    }

    /// Record that representation `T` implements facet `F`.
    ///
    /// The caster is total for `T`; registering the same pair twice is
    /// idempotent (last write wins, all writes are equivalent).
    pub fn register<F, T>(&self, cast: CastFn<F>)
    where
        F: ?Sized + 'static,
        T: 'static,
    {
        let f_seq = typeseq::typeseq_of::<F>();
        let t_seq = typeseq::typeseq_of::<T>();
        let mut table = self.table.write().expect("facet registry poisoned");
        if table.len() <= f_seq.index() {
            table.resize_with(f_seq.index() + 1, Vec::new);
        }
        let row = &mut table[f_seq.index()];
        if row.len() <= t_seq.index() {
            row.resize_with(t_seq.index() + 1, || None);
        }
        row[t_seq.index()] = Some(CastEntry(Box::new(cast)));
    }

    /// Dynamic conversion: the `F` view of `data`, if its concrete type
    /// registered an implementation. `None` is the null fat pointer.
    pub fn variant<'a, F>(&self, data: &'a dyn Any) -> Option<&'a F>
    where
        F: ?Sized + 'static,
    {
        let f_seq = typeseq::typeseq_of::<F>();
        let t_seq = typeseq::lookup_typeseq(data.type_id())?;
        let table = self.table.read().expect("facet registry poisoned");
        let entry = table.get(f_seq.index())?.get(t_seq.index())?.as_ref()?;
        let cast = entry
            .0
            .downcast_ref::<CastFn<F>>()
            .expect("facet table entry has caster of matching facet");
        Some(cast(data))
    }

    /// Whether `data`'s concrete type implements facet `F`.
    pub fn implements<F>(&self, data: &dyn Any) -> bool
    where
        F: ?Sized + 'static,
    {
        self.variant::<F>(data).is_some()
    }

    /// The canonical caster for (facet `F`, representation `T`), if
    /// registered. Lets callers that already know the concrete type
    /// skip the per-object lookup.
    pub fn impl_for<F, T>(&self) -> Option<CastFn<F>>
    where
        F: ?Sized + 'static,
        T: 'static,
    {
        let f_seq = typeseq::typeseq_of::<F>();
        let t_seq = typeseq::typeseq_of::<T>();
        let table = self.table.read().expect("facet registry poisoned");
        let entry = table.get(f_seq.index())?.get(t_seq.index())?.as_ref()?;
        entry.0.downcast_ref::<CastFn<F>>().copied()
    }

    /// Registered (facet, type) pair count, for introspection.
    pub fn n_registered(&self) -> usize {
        let table = self.table.read().expect("facet registry poisoned");
        table
            .iter()
            .map(|row| row.iter().filter(|e| e.is_some()).count())
            .sum()
    }

    pub fn facet_seq_of<F: ?Sized + 'static>(&self) -> TypeSeq {
        typeseq::typeseq_of::<F>()
    }
}

/// Register facet `F` for representation `T`.
///
/// Expands to the boilerplate caster; the downcast cannot fail because
/// the registry matches the concrete type before invoking it.
#[macro_export]
macro_rules! impl_facet {
    ($facet:ty, $ty:ty) => {
        $crate::facet::FacetRegistry::instance().register::<$facet, $ty>(|data| {
            data.downcast_ref::<$ty>()
                .expect("caster invoked for its registered type") as &$facet
        });
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    trait Greet {
        fn greet(&self) -> String;
    }

    trait Count {
        fn count(&self) -> usize;
    }

    struct English(String);
    struct Numbers(Vec<i64>);

    impl Greet for English {
        fn greet(&self) -> String {
            format!("hello, {}", self.0)
        }
    }

    impl Count for English {
        fn count(&self) -> usize {
            self.0.len()
        }
    }

    impl Count for Numbers {
        fn count(&self) -> usize {
            self.0.len()
        }
    }

    fn register_test_facets() {
        impl_facet!(dyn Greet, English);
        impl_facet!(dyn Count, English);
        impl_facet!(dyn Count, Numbers);
    }

    #[test]
    #[serial]
    fn test_variant_present() {
        register_test_facets();
        let e = English("world".to_string());
        let g = FacetRegistry::instance()
            .variant::<dyn Greet>(&e)
            .expect("English registered Greet");
        assert_eq!(g.greet(), "hello, world");
    }

    #[test]
    #[serial]
    fn test_variant_absent_is_null() {
        register_test_facets();
        let n = Numbers(vec![1, 2, 3]);
        assert!(
            FacetRegistry::instance()
                .variant::<dyn Greet>(&n)
                .is_none()
        );
    }

    #[test]
    #[serial]
    fn test_variant_consistency_across_facets() {
        register_test_facets();
        let e = English("ab".to_string());
        // a type implementing two facets is reachable through both views
        let g = FacetRegistry::instance().variant::<dyn Greet>(&e).unwrap();
        let c = FacetRegistry::instance().variant::<dyn Count>(&e).unwrap();
        assert_eq!(g.greet(), "hello, ab");
        assert_eq!(c.count(), 2);
    }

    #[test]
    #[serial]
    fn test_impl_for_canonical() {
        register_test_facets();
        let cast = FacetRegistry::instance()
            .impl_for::<dyn Count, Numbers>()
            .expect("Numbers registered Count");
        let n = Numbers(vec![7; 5]);
        assert_eq!(cast(&n).count(), 5);
    }

    #[test]
    #[serial]
    fn test_reregistration_idempotent() {
        register_test_facets();
        let before = FacetRegistry::instance().n_registered();
        register_test_facets();
        assert_eq!(FacetRegistry::instance().n_registered(), before);
    }
}
