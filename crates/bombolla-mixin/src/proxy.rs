//! Activation trampolines
//!
//! Every composite gets the same pair of init callbacks. When the type
//! system builds the composite's class, or a new instance of any type
//! derived from it, the trampoline locates the mixin's layer from the
//! concrete type, records the chain-up class or the instance slot, and
//! hands the author's init a view scoped to the mixin's own block.

use crate::descriptor::{MixinClassInit, MixinInstanceInit, MixinTypeId};
use crate::introspect;
use bombolla_object::{
    class_init, instance_init, Class, ClassInitFn, Instance, InstanceId, InstanceInitFn, Slot,
    TypeId, TypeSystem, VTable,
};
use std::ops::Range;

/// View of one mixin's instance block, given to its instance init
pub struct MixinInstance<'a> {
    system: &'a TypeSystem,
    instance: &'a mut Instance,
    mixin: MixinTypeId,
    slot: Slot,
}

impl<'a> MixinInstance<'a> {
    /// Mixin being initialized
    pub fn mixin(&self) -> MixinTypeId {
        self.mixin
    }

    /// The whole object
    pub fn owner(&self) -> &Instance {
        &*self.instance
    }

    /// The whole object, mutable
    pub fn owner_mut(&mut self) -> &mut Instance {
        &mut *self.instance
    }

    /// Id of the whole object, as recorded in the mixin's slot
    pub fn owner_id(&self) -> InstanceId {
        self.slot.owner
    }

    /// Layer that stacked the mixin
    pub fn layer(&self) -> TypeId {
        self.slot.layer
    }

    /// Offset of the block inside the whole object
    pub fn offset(&self) -> usize {
        self.slot.offset
    }

    /// Length of the block
    pub fn len(&self) -> usize {
        self.slot.len
    }

    /// Check if the mixin declared no instance block
    pub fn is_empty(&self) -> bool {
        self.slot.len == 0
    }

    /// The mixin's own block
    pub fn data(&self) -> &[u8] {
        &self.instance.data()[self.range()]
    }

    /// The mixin's own block, mutable
    pub fn data_mut(&mut self) -> &mut [u8] {
        let range = self.range();
        &mut self.instance.data_mut()[range]
    }

    /// Another mixin stacked in the same object, by name
    pub fn find_mixin(&self, name: &str) -> Option<MixinTypeId> {
        introspect::find_mixin(self.system, self.instance.type_id(), name)
    }

    /// Block of another mixin in the same object
    pub fn mixin_data(&self, other: MixinTypeId) -> Option<&[u8]> {
        introspect::instance_data(self.system, &*self.instance, other)
    }

    /// Block of another mixin in the same object, mutable
    pub fn mixin_data_mut(&mut self, other: MixinTypeId) -> Option<&mut [u8]> {
        introspect::instance_data_mut(self.system, &mut *self.instance, other)
    }

    /// The type system building the object
    pub fn system(&self) -> &TypeSystem {
        self.system
    }

    fn range(&self) -> Range<usize> {
        self.slot.offset..self.slot.offset + self.slot.len
    }
}

/// View of one mixin's class block, given to its class init
pub struct MixinClass<'a> {
    system: &'a TypeSystem,
    class: &'a mut Class,
    mixin: MixinTypeId,
    layer: TypeId,
    chainup: TypeId,
    range: Range<usize>,
}

impl<'a> MixinClass<'a> {
    /// Mixin being initialized
    pub fn mixin(&self) -> MixinTypeId {
        self.mixin
    }

    /// Layer that stacked the mixin
    pub fn layer(&self) -> TypeId {
        self.layer
    }

    /// Type to chain up to from this layer
    pub fn chainup(&self) -> TypeId {
        self.chainup
    }

    /// Offset of the block inside the whole class
    pub fn offset(&self) -> usize {
        self.range.start
    }

    /// The mixin's own class block
    pub fn data(&self) -> &[u8] {
        &self.class.data()[self.range.clone()]
    }

    /// The mixin's own class block, mutable
    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.class.data_mut()[self.range.clone()]
    }

    /// The whole class
    pub fn class(&self) -> &Class {
        &*self.class
    }

    /// The whole class, mutable
    pub fn class_mut(&mut self) -> &mut Class {
        &mut *self.class
    }

    /// Method table of the composite
    pub fn vtable_mut(&mut self) -> &mut VTable {
        self.class.vtable_mut()
    }

    /// Mixin stacked lower in the same composite, by name
    pub fn find_mixin(&self, name: &str) -> Option<MixinTypeId> {
        introspect::find_mixin(self.system, self.class.type_id(), name)
    }

    /// Class block of a mixin stacked lower in the same composite
    pub fn mixin_data_mut(&mut self, other: MixinTypeId) -> Option<&mut [u8]> {
        introspect::class_data_mut(self.system, &mut *self.class, other)
    }

    /// The type system building the class
    pub fn system(&self) -> &TypeSystem {
        self.system
    }
}

/// Class init installed on every composite
pub(crate) fn class_trampoline(mixin: MixinTypeId, init: Option<MixinClassInit>) -> ClassInitFn {
    class_init(move |system, class| {
        let Some(loc) = introspect::locate(system, class.type_id(), mixin) else {
            tracing::error!(
                "Type '{}' doesn't contain mixin '{}'",
                system.display_name(class.type_id()),
                system.display_name(mixin.type_id())
            );
            return;
        };
        class.bind_chainup(mixin.type_id(), loc.parent);
        tracing::trace!(
            layer = %system.display_name(loc.layer),
            chainup = %system.display_name(loc.parent),
            offset = loc.class_offset,
            "class activated"
        );

        if let Some(init) = &init {
            let mut view = MixinClass {
                system,
                class,
                mixin,
                layer: loc.layer,
                chainup: loc.parent,
                range: loc.class_range(),
            };
            init(&mut view);
        }
    })
}

/// Instance init installed on every composite
pub(crate) fn instance_trampoline(
    mixin: MixinTypeId,
    init: Option<MixinInstanceInit>,
) -> InstanceInitFn {
    instance_init(move |system, instance| {
        let Some(loc) = introspect::locate(system, instance.type_id(), mixin) else {
            tracing::error!(
                "Type '{}' doesn't contain mixin '{}'",
                system.display_name(instance.type_id()),
                system.display_name(mixin.type_id())
            );
            return;
        };
        let slot = instance.bind_slot(mixin.type_id(), loc.layer, loc.instance_offset, loc.instance_len);
        tracing::trace!(
            layer = %system.display_name(loc.layer),
            owner = slot.owner.as_u64(),
            offset = slot.offset,
            "instance activated"
        );

        if let Some(init) = &init {
            let mut view = MixinInstance {
                system,
                instance,
                mixin,
                slot,
            };
            init(&mut view);
        }
    })
}
