//! Bombolla mixin engine
//!
//! Builds composite object types on demand by stacking mixins on a base
//! type:
//! - Mixin registry (one type id per descriptor, in its own namespace)
//! - Dependency resolution with base widening and diamond elimination
//! - Composite synthesis with stacked layouts and idempotent naming
//! - Activation trampolines handing each mixin a view of its own block
//! - Introspection of a mixin's block inside any composite
//!
//! ```no_run
//! use bombolla_mixin::{MixinDescriptor, MixinEngine};
//! use bombolla_object::TypeId;
//!
//! let engine = MixinEngine::new()?;
//! let tail = MixinDescriptor::builder("HasTail").instance_size(4).build();
//! let tail = engine.register(&tail)?;
//! let composite = engine.compose(TypeId::OBJECT, tail, None)?;
//! assert_eq!(composite.name, "Object+HasTail");
//! # Ok::<(), bombolla_mixin::MixinError>(())
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod config;
pub mod descriptor;
pub mod engine;
pub mod error;
pub mod introspect;
pub mod proxy;
pub mod registry;
pub mod resolver;
pub mod synth;

pub use config::EngineConfig;
pub use descriptor::{
    MixinClassInit, MixinDescriptor, MixinDescriptorBuilder, MixinInstanceInit, MixinRef,
    MixinTypeId, ProvidedInterface, Requirement, TypeRef,
};
pub use engine::{MixinEngine, MIXIN_ROOT_NAME};
pub use error::{MixinError, MixinResult};
pub use introspect::{LayerInfo, LayerLocation};
pub use proxy::{MixinClass, MixinInstance};
pub use resolver::Resolution;
pub use synth::CompositeType;
