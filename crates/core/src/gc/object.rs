//! Heap object contract and references
//!
//! Every value the collector manages implements [`GcObject`]. The
//! collector relocates objects between spaces; an object's only duty is
//! to report its footprint and to walk the [`GcRef`] slots it owns when
//! asked, so the collector can rewrite them to forwarded targets.

use std::any::Any;

/// Reference to a heap object: owning generation plus slot index in
/// that generation's current space.
///
/// A `GcRef` is stable between collections. During a collection every
/// live reference reachable from the roots is rewritten in place to its
/// evacuated location; holding a `GcRef` across a collection without
/// registering it as a root (or storing it inside a rooted object) is
/// a use-after-free in handle form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GcRef {
    r#gen: u8,
    slot: u32,
}

impl GcRef {
    pub(crate) fn new(r#gen: usize, slot: usize) -> Self {
        GcRef {
            r#gen: r#gen as u8,
            slot: slot as u32,
        }
    }

    pub fn generation(&self) -> usize {
        self.r#gen as usize
    }

    pub(crate) fn slot(&self) -> usize {
        self.slot as usize
    }
}

impl std::fmt::Display for GcRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "g{}:{}", self.r#gen, self.slot)
    }
}

/// Slot rewriter handed to [`GcObject::forward_children`] during a
/// collection. See [`crate::gc::Collector`] for the forwarding rules.
pub struct Forwarder<'a> {
    pub(crate) inner: &'a mut crate::gc::CollectState,
}

impl Forwarder<'_> {
    /// Rewrite one owned slot to its forwarded target, evacuating the
    /// referent first if it has not moved yet. Idempotent once a
    /// forwarding entry exists.
    pub fn forward_inplace(&mut self, slot: &mut GcRef) {
        self.inner.forward_inplace(slot);
    }
}

/// The GC facet every heap type implements.
pub trait GcObject: Any {
    /// Footprint in bytes charged to the owning space's arena.
    fn shallow_size(&self) -> usize;

    /// Call [`Forwarder::forward_inplace`] on every `GcRef` this object
    /// owns. Objects with no children use the default empty body.
    fn forward_children(&mut self, fwd: &mut Forwarder<'_>) {
        let _ = fwd;
    }

    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}
