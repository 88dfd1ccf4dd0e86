//! Mixin registry
//!
//! Each descriptor is registered once per type system as a type under
//! the mixin fundamental, and stored as that type's metadata. An engine
//! keeps a name map of the mixins it has seen and adopts ones another
//! engine over the same type system registered first.
//! Registration is double-checked: a read-locked lookup first, then a
//! write-locked re-check before the type system is touched.

use crate::descriptor::{MixinDescriptor, MixinRef, MixinTypeId};
use crate::engine::MixinEngine;
use crate::error::{MixinError, MixinResult};
use bombolla_object::{ObjectError, TypeFlags, TypeId, TypeInfo};
use std::sync::Arc;

/// Metadata key holding a mixin's descriptor
pub(crate) const DESCRIPTOR_KEY: &str = "bombolla.mixin.descriptor";

impl MixinEngine {
    /// Register a mixin descriptor under `name`
    ///
    /// Calling this again with the same descriptor returns the id assigned
    /// the first time. Reusing the name for a different descriptor fails.
    pub fn register_mixin(
        &self,
        name: &str,
        descriptor: Arc<MixinDescriptor>,
    ) -> MixinResult<MixinTypeId> {
        if let Some(id) = self.mixins.read().get(name).copied() {
            return self.check_same_descriptor(name, id, &descriptor);
        }

        let mut mixins = self.mixins.write();
        if let Some(id) = mixins.get(name).copied() {
            return self.check_same_descriptor(name, id, &descriptor);
        }
        if let Some(id) = self.shared_mixin(name) {
            let id = self.check_same_descriptor(name, id, &descriptor)?;
            mixins.insert(name.to_string(), id);
            tracing::debug!(mixin = name, id = %id.type_id(), "adopted mixin from the type system");
            return Ok(id);
        }

        let ty = self.system.register_type(
            self.mixin_root,
            name,
            TypeInfo::default(),
            TypeFlags::empty(),
        )?;
        self.system
            .attach_metadata(ty, DESCRIPTOR_KEY, descriptor.clone())?;

        let id = MixinTypeId::new(ty);
        mixins.insert(name.to_string(), id);

        tracing::debug!(
            mixin = name,
            id = %ty,
            instance_size = descriptor.instance_size(),
            class_size = descriptor.class_size(),
            requirements = descriptor.requirements().len(),
            "registered mixin"
        );
        Ok(id)
    }

    /// Register a descriptor under its own name
    pub fn register(&self, descriptor: &Arc<MixinDescriptor>) -> MixinResult<MixinTypeId> {
        self.register_mixin(descriptor.name(), descriptor.clone())
    }

    fn check_same_descriptor(
        &self,
        name: &str,
        id: MixinTypeId,
        descriptor: &Arc<MixinDescriptor>,
    ) -> MixinResult<MixinTypeId> {
        let registered = self.descriptor(id)?;
        if Arc::ptr_eq(&registered, descriptor) {
            Ok(id)
        } else {
            Err(ObjectError::DuplicateName(name.to_string()).into())
        }
    }

    /// Descriptor registered for a mixin
    pub fn descriptor(&self, mixin: MixinTypeId) -> MixinResult<Arc<MixinDescriptor>> {
        self.system
            .get_metadata_as::<MixinDescriptor>(mixin.type_id(), DESCRIPTOR_KEY)
            .ok_or_else(|| MixinError::UnknownMixin(self.system.display_name(mixin.type_id())))
    }

    /// Look up a registered mixin by name
    ///
    /// Also finds mixins another engine registered in the same type system.
    pub fn mixin_from_name(&self, name: &str) -> Option<MixinTypeId> {
        if let Some(id) = self.mixins.read().get(name).copied() {
            return Some(id);
        }
        let id = self.shared_mixin(name)?;
        Some(*self.mixins.write().entry(name.to_string()).or_insert(id))
    }

    /// Mixin with a descriptor registered in the type system under `name`
    fn shared_mixin(&self, name: &str) -> Option<MixinTypeId> {
        let id = self.as_mixin(self.system.type_from_name(name)?)?;
        self.descriptor(id).is_ok().then_some(id)
    }

    /// Check whether an id belongs to the mixin namespace
    ///
    /// Decided from the id alone; the mixin may still lack a descriptor.
    pub fn is_mixin(&self, ty: TypeId) -> bool {
        ty.in_namespace(self.mixin_root) && !ty.is_fundamental()
    }

    /// View an id from the mixin namespace as a mixin id
    pub fn as_mixin(&self, ty: TypeId) -> Option<MixinTypeId> {
        self.is_mixin(ty).then(|| MixinTypeId::new(ty))
    }

    /// Number of registered mixins
    pub fn mixin_count(&self) -> usize {
        self.mixins.read().len()
    }

    /// Turn a dependency reference into a registered mixin id
    pub(crate) fn resolve_mixin_ref(&self, mixin: &MixinRef) -> MixinResult<MixinTypeId> {
        match mixin {
            MixinRef::Id(id) => {
                self.descriptor(*id)?;
                Ok(*id)
            }
            MixinRef::Descriptor(descriptor) => self.register(descriptor),
            MixinRef::Name(name) => self
                .mixin_from_name(name)
                .ok_or_else(|| MixinError::UnknownMixin(name.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_is_idempotent() {
        let engine = MixinEngine::new().unwrap();
        let hairy = MixinDescriptor::builder("Hairy").build();

        let first = engine.register(&hairy).unwrap();
        let second = engine.register_mixin("Hairy", hairy.clone()).unwrap();

        assert_eq!(first, second);
        assert_eq!(engine.mixin_count(), 1);
        assert_eq!(engine.mixin_from_name("Hairy"), Some(first));
        assert!(Arc::ptr_eq(&engine.descriptor(first).unwrap(), &hairy));
    }

    #[test]
    fn test_mixin_ids_live_in_their_own_namespace() {
        let engine = MixinEngine::new().unwrap();
        let id = engine
            .register(&MixinDescriptor::builder("HasTail").build())
            .unwrap();

        assert!(engine.is_mixin(id.type_id()));
        assert!(!engine.is_mixin(TypeId::OBJECT));
        assert!(!engine.is_mixin(engine.mixin_root()));
        assert!(!id.type_id().in_namespace(TypeId::OBJECT));
    }

    #[test]
    fn test_same_name_different_descriptor_fails() {
        let engine = MixinEngine::new().unwrap();
        engine
            .register(&MixinDescriptor::builder("Animal").build())
            .unwrap();

        let err = engine
            .register(&MixinDescriptor::builder("Animal").build())
            .unwrap_err();
        assert_eq!(
            err,
            MixinError::RegistrationFailed(ObjectError::DuplicateName("Animal".to_string()))
        );
    }

    #[test]
    fn test_descriptor_reference_registers_on_demand() {
        let engine = MixinEngine::new().unwrap();
        let tail = MixinDescriptor::builder("HasTail").build();

        let id = engine
            .resolve_mixin_ref(&MixinRef::from(&tail))
            .unwrap();
        assert_eq!(engine.mixin_from_name("HasTail"), Some(id));
        assert_eq!(engine.resolve_mixin_ref(&MixinRef::from("HasTail")), Ok(id));
        assert_eq!(
            engine.resolve_mixin_ref(&MixinRef::from("Hairy")),
            Err(MixinError::UnknownMixin("Hairy".to_string()))
        );
    }

    #[test]
    fn test_unknown_mixin() {
        let engine = MixinEngine::new().unwrap();
        let ghost = engine
            .system()
            .register_type(engine.mixin_root(), "Ghost", TypeInfo::default(), TypeFlags::empty())
            .unwrap();
        let ghost = engine.as_mixin(ghost).unwrap();

        assert_eq!(
            engine.descriptor(ghost).unwrap_err(),
            MixinError::UnknownMixin("Ghost".to_string())
        );
    }
}
