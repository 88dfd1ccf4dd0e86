//! Object instances

use crate::class::Class;
use crate::type_id::TypeId;
use rustc_hash::FxHashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Unique identifier for an instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstanceId(u64);

impl InstanceId {
    /// Create a new unique instance ID
    pub fn new() -> Self {
        static NEXT_ID: AtomicU64 = AtomicU64::new(1);
        InstanceId(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for InstanceId {
    fn default() -> Self {
        Self::new()
    }
}

/// A sub-block of an instance claimed by one stacked layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slot {
    /// Instance the block belongs to
    pub owner: InstanceId,
    /// Type that owns the block
    pub layer: TypeId,
    /// Byte offset inside the instance block
    pub offset: usize,
    /// Length of the block
    pub len: usize,
}

/// Object instance
///
/// The data block is zeroed at creation and sized by the concrete
/// type's cumulative instance size.
#[derive(Debug)]
pub struct Instance {
    id: InstanceId,
    type_id: TypeId,
    class: Arc<Class>,
    data: Vec<u8>,
    slots: FxHashMap<TypeId, Slot>,
}

impl Instance {
    pub(crate) fn new(type_id: TypeId, class: Arc<Class>, instance_size: usize) -> Self {
        Self {
            id: InstanceId::new(),
            type_id,
            class,
            data: vec![0; instance_size],
            slots: FxHashMap::default(),
        }
    }

    /// Unique instance id
    pub fn id(&self) -> InstanceId {
        self.id
    }

    /// Concrete type
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Class of the concrete type
    pub fn class(&self) -> &Arc<Class> {
        &self.class
    }

    /// Instance block
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Instance block, mutable
    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Size of the instance block
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Record a sub-block under `tag`, owned by this instance
    pub fn bind_slot(&mut self, tag: TypeId, layer: TypeId, offset: usize, len: usize) -> Slot {
        let slot = Slot {
            owner: self.id,
            layer,
            offset,
            len,
        };
        self.slots.insert(tag, slot);
        slot
    }

    /// Sub-block recorded under `tag`
    pub fn slot(&self, tag: TypeId) -> Option<Slot> {
        self.slots.get(&tag).copied()
    }

    /// Number of recorded sub-blocks
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instance_ids_are_unique() {
        let a = InstanceId::new();
        let b = InstanceId::new();
        assert_ne!(a, b);
        assert!(b.as_u64() > a.as_u64());
    }

    #[test]
    fn test_slots() {
        let class = Arc::new(Class::root(TypeId::OBJECT, 0));
        let mut instance = Instance::new(TypeId::OBJECT, class, 16);
        let tag = TypeId::from_parts(4, 1);

        let slot = instance.bind_slot(tag, TypeId::OBJECT, 8, 4);

        assert_eq!(slot.owner, instance.id());
        assert_eq!(instance.slot(tag), Some(slot));
        assert_eq!(instance.slot_count(), 1);
        assert_eq!(instance.size(), 16);
        assert!(instance.data().iter().all(|b| *b == 0));
    }
}
