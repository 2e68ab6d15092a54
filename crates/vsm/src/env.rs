//! Runtime environments
//!
//! The global environment is one value array indexed by global symtab
//! slots. A local environment is a frame's value array plus a parent
//! link; the chain mirrors the lexical frames the parser resolved
//! against, so a binding path `(i_link, j_slot)` walks `i_link`
//! parents and indexes slot `j_slot`.

use skm_core::gc::{Forwarder, GcObject, GcRef};
use std::any::Any;

/// Value array for toplevel definitions; grows as slots are defined.
#[derive(Debug, Default)]
pub struct GlobalEnv {
    slots: Vec<Option<GcRef>>,
}

impl GlobalEnv {
    pub fn new() -> Self {
        GlobalEnv::default()
    }

    pub fn get(&self, slot: u32) -> Option<GcRef> {
        self.slots.get(slot as usize).copied().flatten()
    }

    pub fn set(&mut self, slot: u32, value: GcRef) {
        let ix = slot as usize;
        if self.slots.len() <= ix {
            self.slots.resize(ix + 1, None);
        }
        self.slots[ix] = Some(value);
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

impl GcObject for GlobalEnv {
    fn shallow_size(&self) -> usize {
        std::mem::size_of::<GlobalEnv>() + self.slots.len() * std::mem::size_of::<Option<GcRef>>()
    }

    fn forward_children(&mut self, fwd: &mut Forwarder<'_>) {
        for slot in self.slots.iter_mut().flatten() {
            fwd.forward_inplace(slot);
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// One lambda activation's bindings. Mutable only while the frame is
/// under construction (argument binding, block-level defines).
#[derive(Debug)]
pub struct LocalEnv {
    parent: Option<GcRef>,
    slots: Vec<Option<GcRef>>,
}

impl LocalEnv {
    /// Environment of `n_slots` slots, the first `args.len()` bound to
    /// the argument values.
    pub fn bind(parent: Option<GcRef>, n_slots: usize, args: &[GcRef]) -> Self {
        debug_assert!(args.len() <= n_slots, "more arguments than slots");
        let mut slots = vec![None; n_slots];
        for (slot, arg) in slots.iter_mut().zip(args.iter()) {
            *slot = Some(*arg);
        }
        LocalEnv { parent, slots }
    }

    pub fn parent(&self) -> Option<GcRef> {
        self.parent
    }

    pub fn get(&self, slot: u32) -> Option<GcRef> {
        self.slots.get(slot as usize).copied().flatten()
    }

    pub fn set(&mut self, slot: u32, value: GcRef) {
        self.slots[slot as usize] = Some(value);
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

impl GcObject for LocalEnv {
    fn shallow_size(&self) -> usize {
        std::mem::size_of::<LocalEnv>() + self.slots.len() * std::mem::size_of::<Option<GcRef>>()
    }

    fn forward_children(&mut self, fwd: &mut Forwarder<'_>) {
        if let Some(p) = self.parent.as_mut() {
            fwd.forward_inplace(p);
        }
        for slot in self.slots.iter_mut().flatten() {
            fwd.forward_inplace(slot);
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use skm_core::gc::{Collector, GcConfig};
    use skm_core::value::Value;

    #[test]
    fn test_global_env_grows() {
        let mut gc = Collector::new(GcConfig::default());
        let v = gc.alloc(Value::I64(7)).unwrap();
        let mut env = GlobalEnv::new();
        assert_eq!(env.get(3), None);
        env.set(3, v);
        assert_eq!(env.len(), 4);
        assert_eq!(env.get(3), Some(v));
        assert_eq!(env.get(0), None);
    }

    #[test]
    fn test_local_env_binds_prefix() {
        let mut gc = Collector::new(GcConfig::default());
        let a = gc.alloc(Value::I64(1)).unwrap();
        let b = gc.alloc(Value::I64(2)).unwrap();
        let env = LocalEnv::bind(None, 3, &[a, b]);
        assert_eq!(env.get(0), Some(a));
        assert_eq!(env.get(1), Some(b));
        assert_eq!(env.get(2), None);
    }

    #[test]
    fn test_env_chain_survives_collection() {
        let mut gc = Collector::new(GcConfig::default());
        let v = gc.alloc(Value::F64(2.5)).unwrap();
        let outer = gc.alloc(LocalEnv::bind(None, 1, &[v])).unwrap();
        let inner = gc.alloc(LocalEnv::bind(Some(outer), 0, &[])).unwrap();
        let root = gc.add_gc_root(inner);
        gc.collect(0);
        let inner = gc.root(root).unwrap();
        let parent = gc.get_as::<LocalEnv>(inner).unwrap().parent().unwrap();
        let slot = gc.get_as::<LocalEnv>(parent).unwrap().get(0).unwrap();
        assert_eq!(gc.get_as::<Value>(slot).unwrap().as_f64(), Some(2.5));
    }
}
