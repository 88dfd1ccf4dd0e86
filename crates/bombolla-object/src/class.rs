//! Classes and method tables

use crate::instance::Instance;
use crate::registry::TypeSystem;
use crate::type_id::TypeId;
use crate::value::Value;
use crate::ObjectResult;
use rustc_hash::FxHashMap;
use std::fmt;
use std::sync::Arc;

/// A method implementation stored in a vtable slot
pub type MethodFn =
    Arc<dyn Fn(&TypeSystem, &mut Instance, &[Value]) -> ObjectResult<Value> + Send + Sync>;

/// Wrap a closure as a vtable method
pub fn method<F>(f: F) -> MethodFn
where
    F: Fn(&TypeSystem, &mut Instance, &[Value]) -> ObjectResult<Value> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Virtual method table for dynamic dispatch
///
/// Slots are keyed by name. A class starts with a copy of its parent's
/// table, so overriding a slot never affects the parent.
#[derive(Clone, Default)]
pub struct VTable {
    methods: FxHashMap<Arc<str>, MethodFn>,
}

impl VTable {
    /// Create a new empty vtable
    pub fn new() -> Self {
        Self::default()
    }

    /// Install or override a method
    pub fn set(&mut self, name: &str, method: MethodFn) -> Option<MethodFn> {
        self.methods.insert(Arc::from(name), method)
    }

    /// Get a method by name
    pub fn get(&self, name: &str) -> Option<&MethodFn> {
        self.methods.get(name)
    }

    /// Check if a slot is filled
    pub fn contains(&self, name: &str) -> bool {
        self.methods.contains_key(name)
    }

    /// Get number of methods
    pub fn method_count(&self) -> usize {
        self.methods.len()
    }

    /// Slot names, in no particular order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.methods.keys().map(|k| k.as_ref())
    }
}

impl fmt::Debug for VTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.names().collect();
        names.sort_unstable();
        f.debug_struct("VTable").field("methods", &names).finish()
    }
}

/// Class structure of a registered type
///
/// Built once per type by [`TypeSystem::class_of`].
#[derive(Clone)]
pub struct Class {
    type_id: TypeId,
    data: Vec<u8>,
    vtable: VTable,
    /// Chain-up targets recorded during class activation, keyed by tag
    chainups: FxHashMap<TypeId, TypeId>,
}

impl Class {
    pub(crate) fn root(type_id: TypeId, class_size: usize) -> Self {
        Self {
            type_id,
            data: vec![0; class_size],
            vtable: VTable::new(),
            chainups: FxHashMap::default(),
        }
    }

    /// Derive a class from its parent: the parent's block and vtable are
    /// copied, the block grows to `class_size`.
    pub(crate) fn derive(parent: &Class, type_id: TypeId, class_size: usize) -> Self {
        let mut data = parent.data.clone();
        data.resize(class_size, 0);
        Self {
            type_id,
            data,
            vtable: parent.vtable.clone(),
            chainups: parent.chainups.clone(),
        }
    }

    /// Type this class belongs to
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Class block
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Class block, mutable
    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Size of the class block
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Method table
    pub fn vtable(&self) -> &VTable {
        &self.vtable
    }

    /// Method table, mutable (only reachable during class init)
    pub fn vtable_mut(&mut self) -> &mut VTable {
        &mut self.vtable
    }

    /// Get method from vtable
    pub fn method(&self, name: &str) -> Option<&MethodFn> {
        self.vtable.get(name)
    }

    /// Record the ancestor to chain up to for `tag`
    pub fn bind_chainup(&mut self, tag: TypeId, ancestor: TypeId) {
        self.chainups.insert(tag, ancestor);
    }

    /// Ancestor recorded for `tag`
    pub fn chainup(&self, tag: TypeId) -> Option<TypeId> {
        self.chainups.get(&tag).copied()
    }
}

impl fmt::Debug for Class {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Class")
            .field("type_id", &self.type_id)
            .field("size", &self.data.len())
            .field("vtable", &self.vtable)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn constant(v: i64) -> MethodFn {
        method(move |_, _, _| Ok(Value::Int(v)))
    }

    #[test]
    fn test_vtable() {
        let mut vtable = VTable::new();
        vtable.set("a", constant(10));
        vtable.set("b", constant(20));

        assert_eq!(vtable.method_count(), 2);
        assert!(vtable.contains("a"));
        assert!(vtable.get("c").is_none());
    }

    #[test]
    fn test_vtable_override() {
        let mut vtable = VTable::new();
        assert!(vtable.set("a", constant(10)).is_none());
        assert!(vtable.set("a", constant(30)).is_some());
        assert_eq!(vtable.method_count(), 1);
    }

    #[test]
    fn test_derive_copies_parent() {
        let parent_id = TypeId::from_parts(1, 1);
        let child_id = TypeId::from_parts(1, 2);

        let mut parent = Class::root(parent_id, 4);
        parent.data_mut()[0] = 7;
        parent.vtable_mut().set("a", constant(1));
        parent.bind_chainup(parent_id, TypeId::OBJECT);

        let mut child = Class::derive(&parent, child_id, 8);
        child.vtable_mut().set("a", constant(2));

        assert_eq!(child.size(), 8);
        assert_eq!(child.data()[0], 7);
        assert_eq!(child.chainup(parent_id), Some(TypeId::OBJECT));
        assert_eq!(parent.vtable().method_count(), 1);
        assert_eq!(child.type_id(), child_id);
    }
}
