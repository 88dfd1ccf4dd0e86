//! Layer lookup
//!
//! A composite never stores absolute offsets. Every query walks the
//! ancestry one parent link at a time until it meets the layer tagged
//! with the wanted mixin; that layer's block starts where its parent's
//! cumulative layout ends.

use crate::descriptor::MixinTypeId;
use bombolla_object::{Class, Instance, Layout, TypeId, TypeSystem};
use std::ops::Range;
use std::sync::Arc;

/// Metadata key tagging a composite with the mixin stacked at that layer
pub(crate) const LAYER_KEY: &str = "bombolla.mixin.layer";

/// Where one mixin's blocks live inside a composite
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayerLocation {
    /// Type that stacked the mixin
    pub layer: TypeId,
    /// Type directly below the layer
    pub parent: TypeId,
    /// Offset of the mixin's instance block
    pub instance_offset: usize,
    /// Length of the mixin's instance block
    pub instance_len: usize,
    /// Offset of the mixin's class block
    pub class_offset: usize,
    /// Length of the mixin's class block
    pub class_len: usize,
}

impl LayerLocation {
    /// Byte range of the instance block
    pub fn instance_range(&self) -> Range<usize> {
        self.instance_offset..self.instance_offset + self.instance_len
    }

    /// Byte range of the class block
    pub fn class_range(&self) -> Range<usize> {
        self.class_offset..self.class_offset + self.class_len
    }
}

/// One entry of [`describe`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerInfo {
    /// Type id
    pub type_id: TypeId,
    /// Registered name
    pub name: String,
    /// Mixin stacked at this layer, if any
    pub mixin: Option<MixinTypeId>,
    /// Cumulative sizes
    pub layout: Layout,
    /// Own instance block as `(offset, len)`
    pub instance_block: (usize, usize),
    /// Own class block as `(offset, len)`
    pub class_block: (usize, usize),
    /// Registered abstract
    pub is_abstract: bool,
}

/// Mixin stacked at exactly `ty`, if it is a composite layer
pub fn layer_tag(system: &TypeSystem, ty: TypeId) -> Option<MixinTypeId> {
    system
        .get_metadata_as::<MixinTypeId>(ty, LAYER_KEY)
        .map(|tag| *tag)
}

/// Type in `ty`'s ancestry that stacked `mixin`
pub fn peek_layer(system: &TypeSystem, ty: TypeId, mixin: MixinTypeId) -> Option<TypeId> {
    let mut current = Some(ty);
    while let Some(t) = current {
        if layer_tag(system, t) == Some(mixin) {
            return Some(t);
        }
        current = system.parent_of(t);
    }
    None
}

/// Mixin stacked somewhere in `ty`'s ancestry under the given name
///
/// Lets a mixin's callbacks reach a dependency without holding its id.
pub fn find_mixin(system: &TypeSystem, ty: TypeId, name: &str) -> Option<MixinTypeId> {
    system
        .ancestry(ty)
        .into_iter()
        .filter_map(|t| layer_tag(system, t))
        .find(|tag| system.name_of(tag.type_id()).as_deref() == Some(name))
}

/// Locate `mixin`'s blocks inside `ty`
pub fn locate(system: &TypeSystem, ty: TypeId, mixin: MixinTypeId) -> Option<LayerLocation> {
    let layer = peek_layer(system, ty, mixin)?;
    let parent = system.parent_of(layer)?;
    let own = system.query_layout(layer)?;
    let below = system.query_layout(parent)?;

    Some(LayerLocation {
        layer,
        parent,
        instance_offset: below.instance_size,
        instance_len: own.instance_size - below.instance_size,
        class_offset: below.class_size,
        class_len: own.class_size - below.class_size,
    })
}

fn locate_or_report(system: &TypeSystem, ty: TypeId, mixin: MixinTypeId) -> Option<LayerLocation> {
    let location = locate(system, ty, mixin);
    if location.is_none() {
        tracing::error!(
            "Type '{}' doesn't contain mixin '{}'",
            system.display_name(ty),
            system.display_name(mixin.type_id())
        );
    }
    location
}

fn instance_range(system: &TypeSystem, instance: &Instance, mixin: MixinTypeId) -> Option<Range<usize>> {
    // Activation already recorded the block for this instance
    if let Some(slot) = instance.slot(mixin.type_id()) {
        return Some(slot.offset..slot.offset + slot.len);
    }
    locate_or_report(system, instance.type_id(), mixin).map(|loc| loc.instance_range())
}

/// Private instance block of `mixin`
pub fn instance_data<'i>(
    system: &TypeSystem,
    instance: &'i Instance,
    mixin: MixinTypeId,
) -> Option<&'i [u8]> {
    let range = instance_range(system, instance, mixin)?;
    instance.data().get(range)
}

/// Private instance block of `mixin`, mutable
pub fn instance_data_mut<'i>(
    system: &TypeSystem,
    instance: &'i mut Instance,
    mixin: MixinTypeId,
) -> Option<&'i mut [u8]> {
    let range = instance_range(system, instance, mixin)?;
    instance.data_mut().get_mut(range)
}

/// Private class block of `mixin`
pub fn class_data<'c>(system: &TypeSystem, class: &'c Class, mixin: MixinTypeId) -> Option<&'c [u8]> {
    let loc = locate_or_report(system, class.type_id(), mixin)?;
    class.data().get(loc.class_range())
}

/// Private class block of `mixin`, mutable
pub fn class_data_mut<'c>(
    system: &TypeSystem,
    class: &'c mut Class,
    mixin: MixinTypeId,
) -> Option<&'c mut [u8]> {
    let loc = locate_or_report(system, class.type_id(), mixin)?;
    class.data_mut().get_mut(loc.class_range())
}

/// Class directly below the layer that stacked `mixin`
pub fn chain_up(system: &TypeSystem, class: &Class, mixin: MixinTypeId) -> Option<Arc<Class>> {
    let parent = match class.chainup(mixin.type_id()) {
        Some(parent) => parent,
        None => locate_or_report(system, class.type_id(), mixin)?.parent,
    };
    system.class_of(parent).ok()
}

/// Ancestry of `ty` with layouts and layer tags, leaf first
pub fn describe(system: &TypeSystem, ty: TypeId) -> Vec<LayerInfo> {
    system
        .ancestry(ty)
        .into_iter()
        .map(|t| {
            let layout = system.query_layout(t).unwrap_or_default();
            let below = system
                .parent_of(t)
                .and_then(|p| system.query_layout(p))
                .unwrap_or_default();
            LayerInfo {
                type_id: t,
                name: system.display_name(t),
                mixin: layer_tag(system, t),
                layout,
                instance_block: (
                    below.instance_size,
                    layout.instance_size.saturating_sub(below.instance_size),
                ),
                class_block: (below.class_size, layout.class_size.saturating_sub(below.class_size)),
                is_abstract: system.is_abstract(t),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use bombolla_object::{TypeFlags, TypeInfo, OBJECT_CLASS_SIZE, OBJECT_INSTANCE_SIZE};

    /// Object <- Plain <- Tagged(mixin), built by hand
    fn tagged_chain() -> (TypeSystem, MixinTypeId, TypeId, TypeId) {
        let ts = TypeSystem::new();
        let root = ts.new_fundamental("Mixins").unwrap();
        let mixin = ts
            .register_type(root, "M", TypeInfo::default(), TypeFlags::empty())
            .unwrap();
        let mixin = MixinTypeId::new(mixin);

        let base = Layout::new(OBJECT_INSTANCE_SIZE, OBJECT_CLASS_SIZE);
        let plain = ts
            .register_type(
                TypeId::OBJECT,
                "Plain",
                TypeInfo::new(base.extend(8, 0)),
                TypeFlags::empty(),
            )
            .unwrap();
        let tagged = ts
            .register_type(
                plain,
                "Plain+M",
                TypeInfo::new(base.extend(8, 0).extend(4, 16)),
                TypeFlags::empty(),
            )
            .unwrap();
        ts.attach_metadata(tagged, LAYER_KEY, Arc::new(mixin)).unwrap();
        (ts, mixin, plain, tagged)
    }

    #[test]
    fn test_locate_offsets_come_from_parent_layout() {
        let (ts, mixin, plain, tagged) = tagged_chain();

        let loc = locate(&ts, tagged, mixin).unwrap();
        assert_eq!(loc.layer, tagged);
        assert_eq!(loc.parent, plain);
        assert_eq!(loc.instance_range(), OBJECT_INSTANCE_SIZE + 8..OBJECT_INSTANCE_SIZE + 12);
        assert_eq!(loc.class_range(), OBJECT_CLASS_SIZE..OBJECT_CLASS_SIZE + 16);
    }

    #[test]
    fn test_peek_layer_walks_up() {
        let (ts, mixin, plain, tagged) = tagged_chain();
        let leaf = ts
            .register_type(
                tagged,
                "Leaf",
                TypeInfo::new(ts.query_layout(tagged).unwrap()),
                TypeFlags::empty(),
            )
            .unwrap();

        assert_eq!(peek_layer(&ts, leaf, mixin), Some(tagged));
        assert_eq!(peek_layer(&ts, plain, mixin), None);
        assert_eq!(layer_tag(&ts, tagged), Some(mixin));
        assert_eq!(layer_tag(&ts, leaf), None);
        assert_eq!(find_mixin(&ts, leaf, "M"), Some(mixin));
        assert_eq!(find_mixin(&ts, leaf, "Plain"), None);
    }

    #[test]
    fn test_missing_mixin_yields_none() {
        let (ts, mixin, plain, _) = tagged_chain();
        let obj = ts.instantiate(plain).unwrap();
        assert!(instance_data(&ts, &obj, mixin).is_none());
        assert!(chain_up(&ts, obj.class(), mixin).is_none());
    }

    #[test]
    fn test_data_views() {
        let (ts, mixin, plain, tagged) = tagged_chain();
        let mut obj = ts.instantiate(tagged).unwrap();

        instance_data_mut(&ts, &mut obj, mixin).unwrap().fill(0xab);
        assert_eq!(instance_data(&ts, &obj, mixin).unwrap(), &[0xab; 4]);
        assert_eq!(obj.data()[OBJECT_INSTANCE_SIZE + 7], 0);

        let class = ts.class_of(tagged).unwrap();
        assert_eq!(class_data(&ts, &class, mixin).unwrap().len(), 16);
        assert_eq!(chain_up(&ts, &class, mixin).unwrap().type_id(), plain);
    }

    #[test]
    fn test_describe() {
        let (ts, mixin, _, tagged) = tagged_chain();
        let layers = describe(&ts, tagged);

        let names: Vec<&str> = layers.iter().map(|l| l.name.as_str()).collect();
        assert_eq!(names, vec!["Plain+M", "Plain", "Object"]);
        assert_eq!(layers[0].mixin, Some(mixin));
        assert_eq!(layers[0].instance_block, (OBJECT_INSTANCE_SIZE + 8, 4));
        assert_eq!(layers[2].instance_block, (0, OBJECT_INSTANCE_SIZE));
    }
}
