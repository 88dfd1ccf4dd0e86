//! Bombolla object system
//!
//! This crate provides the reflective runtime the mixin engine builds on:
//! - Type table with fundamental namespaces and single inheritance
//! - Per-type metadata side table and interfaces
//! - Lazily-built classes with copy-on-derive class blocks and vtables
//! - Instances with byte-addressed data blocks

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod block;
pub mod class;
pub mod instance;
pub mod registry;
pub mod type_id;
pub mod value;

pub use block::ByteBlock;
pub use class::{method, Class, MethodFn, VTable};
pub use instance::{Instance, InstanceId, Slot};
pub use registry::{
    class_init, instance_init, interface_init, ClassInitFn, InstanceInitFn, InterfaceInitFn,
    Layout, Metadata, TypeInfo, TypeSystem, OBJECT_CLASS_SIZE, OBJECT_INSTANCE_SIZE,
};
pub use type_id::{TypeFlags, TypeId};
pub use value::Value;

/// Object system errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ObjectError {
    /// Id not registered
    #[error("Unknown type: {0}")]
    UnknownType(TypeId),

    /// Name already taken
    #[error("Type name already registered: {0}")]
    DuplicateName(String),

    /// Parent type cannot be derived from
    #[error("Type '{0}' is not derivable")]
    NotDerivable(String),

    /// Layout smaller than the parent's
    #[error("Invalid layout for '{name}': {reason}")]
    InvalidLayout {
        /// Type being registered
        name: String,
        /// What is wrong
        reason: String,
    },

    /// Instantiation of an abstract type
    #[error("Cannot instantiate abstract type '{0}'")]
    AbstractType(String),

    /// Instantiation of a type outside the object namespace
    #[error("Type '{0}' is not instantiable")]
    NotInstantiable(String),

    /// Id is not a registered interface
    #[error("Type {0} is not an interface")]
    NotAnInterface(TypeId),

    /// No ids left in a namespace
    #[error("Type namespace exhausted")]
    NamespaceExhausted,

    /// Vtable has no such slot
    #[error("Method '{method}' not found on '{type_name}'")]
    MethodNotFound {
        /// Type whose class was searched
        type_name: String,
        /// Missing slot
        method: String,
    },

    /// Error raised by a method implementation
    #[error("Method error: {0}")]
    Method(String),
}

/// Object system result
pub type ObjectResult<T> = Result<T, ObjectError>;
