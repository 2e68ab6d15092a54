//! Global and local symbol tables
//!
//! The global table maps interned names to stable slot indices; the
//! runtime keeps a parallel value array indexed the same way. Local
//! frames hold a lambda's formals (and any block-level defines added
//! while its body parses) in declaration order; at parse time a stack
//! of frames drives lexical resolution, and the resulting binding path
//! `(i_link, j_slot)` is burned into each variable node.

use crate::types::TypeRef;
use skm_core::intern::Name;
use std::collections::HashMap;

/// Process-lifetime name -> slot mapping for toplevel definitions.
#[derive(Debug, Default)]
pub struct GlobalSymtab {
    by_name: HashMap<Name, u32>,
    names: Vec<Name>,
    types: Vec<Option<TypeRef>>,
}

impl GlobalSymtab {
    pub fn new() -> Self {
        GlobalSymtab::default()
    }

    pub fn lookup(&self, name: Name) -> Option<u32> {
        self.by_name.get(&name).copied()
    }

    /// Slot for `name`, defining one on first sight. Redefinition
    /// reuses the slot (the REPL overwrites bindings).
    pub fn define(&mut self, name: Name, ty: Option<TypeRef>) -> u32 {
        if let Some(&slot) = self.by_name.get(&name) {
            self.types[slot as usize] = ty;
            return slot;
        }
        let slot = self.names.len() as u32;
        self.names.push(name);
        self.types.push(ty);
        self.by_name.insert(name, slot);
        slot
    }

    pub fn name_of(&self, slot: u32) -> Name {
        self.names[slot as usize]
    }

    pub fn declared_type(&self, slot: u32) -> Option<TypeRef> {
        self.types[slot as usize]
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// One lexical frame: a lambda's formals plus block-level defines
/// appended while its body parses.
#[derive(Debug, Clone)]
pub struct LocalFrame {
    bindings: Vec<(Name, Option<TypeRef>)>,
    n_formals: usize,
}

impl LocalFrame {
    pub fn new(formals: impl IntoIterator<Item = (Name, TypeRef)>) -> Self {
        let bindings: Vec<_> = formals
            .into_iter()
            .map(|(n, t)| (n, Some(t)))
            .collect();
        let n_formals = bindings.len();
        LocalFrame {
            bindings,
            n_formals,
        }
    }

    /// Innermost-wins slot lookup.
    pub fn lookup(&self, name: Name) -> Option<u32> {
        self.bindings
            .iter()
            .rposition(|(n, _)| *n == name)
            .map(|ix| ix as u32)
    }

    /// Append a block-level define; returns its slot.
    pub fn add_local(&mut self, name: Name, ty: Option<TypeRef>) -> u32 {
        self.bindings.push((name, ty));
        (self.bindings.len() - 1) as u32
    }

    pub fn n_formals(&self) -> usize {
        self.n_formals
    }

    /// Total slots a runtime environment for this frame needs.
    pub fn n_slots(&self) -> usize {
        self.bindings.len()
    }

    pub fn name_at(&self, slot: u32) -> Name {
        self.bindings[slot as usize].0
    }
}

/// A resolved binding path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Binding {
    /// `i_link` enclosing frames out, slot `j_slot`
    Local { i_link: u32, j_slot: u32 },
    Global { slot: u32 },
}

/// Walk the frame stack outward, then the global table.
pub fn resolve(frames: &[LocalFrame], globals: &GlobalSymtab, name: Name) -> Option<Binding> {
    for (dist, frame) in frames.iter().rev().enumerate() {
        if let Some(j) = frame.lookup(name) {
            return Some(Binding::Local {
                i_link: dist as u32,
                j_slot: j,
            });
        }
    }
    globals.lookup(name).map(|slot| Binding::Global { slot })
}

#[cfg(test)]
mod tests {
    use super::*;
    use skm_core::intern::StringTable;

    #[test]
    fn test_global_define_and_redefine() {
        let mut names = StringTable::new();
        let mut globals = GlobalSymtab::new();
        let pi = names.intern("pi");
        let s1 = globals.define(pi, None);
        let s2 = globals.define(pi, None);
        assert_eq!(s1, s2);
        assert_eq!(globals.len(), 1);
        assert_eq!(globals.name_of(s1), pi);
    }

    #[test]
    fn test_resolution_prefers_inner_frame() {
        let mut names = StringTable::new();
        let types = crate::types::TypeTable::new(&mut names);
        let x = names.intern("x");
        let outer = LocalFrame::new([(x, types.t_i64())]);
        let inner = LocalFrame::new([(x, types.t_f64())]);
        let globals = GlobalSymtab::new();
        let b = resolve(&[outer, inner], &globals, x).unwrap();
        assert_eq!(b, Binding::Local { i_link: 0, j_slot: 0 });
    }

    #[test]
    fn test_resolution_walks_outward() {
        let mut names = StringTable::new();
        let types = crate::types::TypeTable::new(&mut names);
        let x = names.intern("x");
        let y = names.intern("y");
        let outer = LocalFrame::new([(x, types.t_i64())]);
        let inner = LocalFrame::new([(y, types.t_i64())]);
        let globals = GlobalSymtab::new();
        let b = resolve(&[outer, inner], &globals, x).unwrap();
        assert_eq!(b, Binding::Local { i_link: 1, j_slot: 0 });
    }

    #[test]
    fn test_resolution_falls_back_to_global() {
        let mut names = StringTable::new();
        let mut globals = GlobalSymtab::new();
        let pi = names.intern("pi");
        let slot = globals.define(pi, None);
        let b = resolve(&[], &globals, pi).unwrap();
        assert_eq!(b, Binding::Global { slot });
    }

    #[test]
    fn test_unbound_name() {
        let names_stack: Vec<LocalFrame> = Vec::new();
        let globals = GlobalSymtab::new();
        let mut names = StringTable::new();
        let ghost = names.intern("ghost");
        assert_eq!(resolve(&names_stack, &globals, ghost), None);
    }

    #[test]
    fn test_block_define_extends_frame() {
        let mut names = StringTable::new();
        let types = crate::types::TypeTable::new(&mut names);
        let x = names.intern("x");
        let y = names.intern("y");
        let mut frame = LocalFrame::new([(x, types.t_f64())]);
        assert_eq!(frame.n_slots(), 1);
        let j = frame.add_local(y, None);
        assert_eq!(j, 1);
        assert_eq!(frame.n_slots(), 2);
        assert_eq!(frame.n_formals(), 1);
        assert_eq!(frame.lookup(y), Some(1));
    }
}
