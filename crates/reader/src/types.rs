//! Declared-type table
//!
//! Types named in source (`def pi : f64 = ...`, formal parameter
//! annotations) resolve to entries in a per-interpreter table. Type
//! equality is reference equality: one `TypeRef` per distinct type for
//! the table's lifetime.

use skm_core::intern::{Name, StringTable};
use std::collections::HashMap;

/// Reference into the type table; equality is identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeRef(u32);

impl TypeRef {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// The built-in type universe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeKind {
    Bool,
    I64,
    F64,
    Str,
}

#[derive(Debug)]
struct TypeInfo {
    name: Name,
    kind: TypeKind,
}

/// Per-interpreter table of declared types.
pub struct TypeTable {
    infos: Vec<TypeInfo>,
    by_name: HashMap<Name, TypeRef>,
    t_bool: TypeRef,
    t_i64: TypeRef,
    t_f64: TypeRef,
    t_str: TypeRef,
}

impl TypeTable {
    pub fn new(names: &mut StringTable) -> Self {
        let mut table = TypeTable {
            infos: Vec::new(),
            by_name: HashMap::new(),
            t_bool: TypeRef(0),
            t_i64: TypeRef(0),
            t_f64: TypeRef(0),
            t_str: TypeRef(0),
        };
        table.t_bool = table.add(names.intern("bool"), TypeKind::Bool);
        table.t_i64 = table.add(names.intern("i64"), TypeKind::I64);
        table.t_f64 = table.add(names.intern("f64"), TypeKind::F64);
        table.t_str = table.add(names.intern("string"), TypeKind::Str);
        table
    }

    fn add(&mut self, name: Name, kind: TypeKind) -> TypeRef {
        let r = TypeRef(self.infos.len() as u32);
        self.infos.push(TypeInfo { name, kind });
        self.by_name.insert(name, r);
        r
    }

    /// Resolve a type name from a declared-type position.
    pub fn lookup(&self, name: Name) -> Option<TypeRef> {
        self.by_name.get(&name).copied()
    }

    pub fn name_of(&self, r: TypeRef) -> Name {
        self.infos[r.index()].name
    }

    pub fn kind_of(&self, r: TypeRef) -> TypeKind {
        self.infos[r.index()].kind
    }

    pub fn t_bool(&self) -> TypeRef {
        self.t_bool
    }

    pub fn t_i64(&self) -> TypeRef {
        self.t_i64
    }

    pub fn t_f64(&self) -> TypeRef {
        self.t_f64
    }

    pub fn t_str(&self) -> TypeRef {
        self.t_str
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_lookup() {
        let mut names = StringTable::new();
        let types = TypeTable::new(&mut names);
        let f64_name = names.intern("f64");
        assert_eq!(types.lookup(f64_name), Some(types.t_f64()));
        assert_eq!(types.kind_of(types.t_f64()), TypeKind::F64);
    }

    #[test]
    fn test_reference_equality() {
        let mut names = StringTable::new();
        let types = TypeTable::new(&mut names);
        let a = types.lookup(names.intern("i64")).unwrap();
        let b = types.lookup(names.intern("i64")).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, types.t_f64());
    }

    #[test]
    fn test_unknown_type_name() {
        let mut names = StringTable::new();
        let types = TypeTable::new(&mut names);
        let unknown = names.intern("quaternion");
        assert_eq!(types.lookup(unknown), None);
    }
}
