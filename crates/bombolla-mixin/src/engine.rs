//! Mixin engine
//!
//! The engine owns the mixin namespace of one type system together with
//! the name → id map of registered mixins. Registry, resolver,
//! synthesizer and introspection are implemented as `impl MixinEngine`
//! blocks in their own modules.

use crate::config::EngineConfig;
use crate::descriptor::MixinTypeId;
use crate::error::{MixinError, MixinResult};
use crate::introspect::{self, LayerInfo};
use crate::synth::CompositeType;
use bombolla_object::{Class, Instance, TypeId, TypeSystem, Value};
use once_cell::sync::Lazy;
use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHashMap;
use std::fmt;
use std::sync::Arc;

/// Name of the fundamental type every mixin derives from
pub const MIXIN_ROOT_NAME: &str = "BMixin";

static GLOBAL: Lazy<MixinEngine> = Lazy::new(|| {
    MixinEngine::new().unwrap_or_else(|e| panic!("failed to bootstrap the mixin engine: {}", e))
});

/// Mixin composition engine
pub struct MixinEngine {
    pub(crate) system: Arc<TypeSystem>,
    pub(crate) mixin_root: TypeId,
    pub(crate) config: EngineConfig,
    pub(crate) mixins: RwLock<FxHashMap<String, MixinTypeId>>,
    /// Serializes the name check, registration and tagging of composites
    pub(crate) compose_lock: Mutex<()>,
}

impl MixinEngine {
    /// Create an engine over a fresh type system with default configuration
    pub fn new() -> MixinResult<Self> {
        Self::with_system(Arc::new(TypeSystem::new()), EngineConfig::default())
    }

    /// Create an engine over a fresh type system
    pub fn with_config(config: EngineConfig) -> MixinResult<Self> {
        Self::with_system(Arc::new(TypeSystem::new()), config)
    }

    /// Create an engine over an existing type system
    ///
    /// Engines sharing a type system share its mixin namespace.
    pub fn with_system(system: Arc<TypeSystem>, config: EngineConfig) -> MixinResult<Self> {
        config.validate()?;
        let mixin_root = match system.type_from_name(MIXIN_ROOT_NAME) {
            Some(root) if root.is_fundamental() => root,
            Some(_) => return Err(MixinError::NameCollision(MIXIN_ROOT_NAME.to_string())),
            None => system.new_fundamental(MIXIN_ROOT_NAME)?,
        };

        Ok(Self {
            system,
            mixin_root,
            config,
            mixins: RwLock::new(FxHashMap::default()),
            compose_lock: Mutex::new(()),
        })
    }

    /// Process-wide engine, created on first use
    ///
    /// Plugins loaded into one shell register their mixins here. Tests
    /// should build their own engine instead.
    pub fn global() -> &'static MixinEngine {
        &GLOBAL
    }

    /// The underlying type system
    pub fn system(&self) -> &Arc<TypeSystem> {
        &self.system
    }

    /// Engine configuration
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Root type of the mixin namespace
    pub fn mixin_root(&self) -> TypeId {
        self.mixin_root
    }

    /// Stack `mixin`, with all its dependencies, on top of `base`
    ///
    /// Without an explicit name the composite is called
    /// `<resolved base><separator><mixin>`. Composites are looked up by
    /// name: composing the same pair under the same name returns the same
    /// type, while a different name registers a separate composite.
    pub fn compose(
        &self,
        base: TypeId,
        mixin: MixinTypeId,
        name: Option<&str>,
    ) -> MixinResult<CompositeType> {
        self.synthesize(base, mixin, name)
    }

    /// Stack several mixins left to right
    ///
    /// Intermediate composites get generated names; only the last one
    /// receives `name`.
    pub fn compose_chain(
        &self,
        base: TypeId,
        mixins: &[MixinTypeId],
        name: Option<&str>,
    ) -> MixinResult<CompositeType> {
        let Some((last, intermediate)) = mixins.split_last() else {
            return Err(MixinError::EmptyChain);
        };

        let mut base = base;
        for mixin in intermediate {
            base = self.synthesize(base, *mixin, None)?.type_id;
        }
        self.synthesize(base, *last, name)
    }

    /// Create an instance of an object type or of a bare mixin
    ///
    /// A mixin id is first composed onto the root object type.
    pub fn create(&self, ty: TypeId) -> MixinResult<Instance> {
        let ty = match self.as_mixin(ty) {
            Some(mixin) => self.synthesize(TypeId::OBJECT, mixin, None)?.type_id,
            None => ty,
        };
        Ok(self.system.instantiate(ty)?)
    }

    /// Check if a type was registered abstract
    pub fn is_abstract(&self, ty: TypeId) -> bool {
        self.system.is_abstract(ty)
    }

    /// Type in `ty`'s ancestry that stacked `mixin`
    pub fn peek_layer(&self, ty: TypeId, mixin: MixinTypeId) -> Option<TypeId> {
        introspect::peek_layer(&self.system, ty, mixin)
    }

    /// Private instance block of `mixin` inside `instance`
    pub fn get_mixin_data<'i>(&self, instance: &'i Instance, mixin: MixinTypeId) -> Option<&'i [u8]> {
        introspect::instance_data(&self.system, instance, mixin)
    }

    /// Private instance block of `mixin` inside `instance`, mutable
    pub fn get_mixin_data_mut<'i>(
        &self,
        instance: &'i mut Instance,
        mixin: MixinTypeId,
    ) -> Option<&'i mut [u8]> {
        introspect::instance_data_mut(&self.system, instance, mixin)
    }

    /// Private class block of `mixin` inside `class`
    pub fn get_mixin_class_data<'c>(&self, class: &'c Class, mixin: MixinTypeId) -> Option<&'c [u8]> {
        introspect::class_data(&self.system, class, mixin)
    }

    /// Class one link below the layer that stacked `mixin`
    pub fn chain_up(&self, class: &Class, mixin: MixinTypeId) -> Option<Arc<Class>> {
        introspect::chain_up(&self.system, class, mixin)
    }

    /// Call `method` as implemented below the layer that stacked `mixin`
    pub fn chain_up_call(
        &self,
        instance: &mut Instance,
        mixin: MixinTypeId,
        method: &str,
        args: &[Value],
    ) -> MixinResult<Value> {
        let class = instance.class().clone();
        let parent = self
            .chain_up(&class, mixin)
            .ok_or_else(|| MixinError::UnknownMixin(self.system.display_name(mixin.type_id())))?;
        Ok(self.system.call_on(&parent, instance, method, args)?)
    }

    /// Ancestry of a type with its layout, leaf first
    ///
    /// Like [`create`](Self::create), a mixin id is first composed onto
    /// the root object type.
    pub fn describe(&self, ty: TypeId) -> MixinResult<Vec<LayerInfo>> {
        let ty = match self.as_mixin(ty) {
            Some(mixin) => self.synthesize(TypeId::OBJECT, mixin, None)?.type_id,
            None => ty,
        };
        Ok(introspect::describe(&self.system, ty))
    }
}

impl fmt::Debug for MixinEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MixinEngine")
            .field("mixin_root", &self.mixin_root)
            .field("mixins", &self.mixins.read().len())
            .field("config", &self.config)
            .finish()
    }
}
