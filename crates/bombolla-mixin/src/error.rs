//! Mixin engine errors

use bombolla_object::{ObjectError, TypeId};
use thiserror::Error;

/// Errors raised while registering or composing mixins
///
/// A failed composition never leaves a partially registered type behind:
/// registering the composite is the last step and either succeeds
/// completely or is never reached.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MixinError {
    /// A required base type is neither an ancestor nor a descendant of the base
    #[error("Mixin '{mixin}' needs base type '{required}', but '{base}' is unrelated")]
    UnsatisfiableBaseType {
        /// Mixin declaring the requirement
        mixin: String,
        /// Required object type
        required: String,
        /// Base the requirement was checked against
        base: String,
    },

    /// Id in the mixin namespace with no registered descriptor
    #[error("Unknown mixin: {0}")]
    UnknownMixin(String),

    /// Id not registered in the type system
    #[error("Unknown type: {0}")]
    UnknownType(TypeId),

    /// Name not registered in the type system
    #[error("Unknown type name: {0}")]
    UnknownTypeName(String),

    /// Base of a composition is not an object type
    #[error("Type '{0}' cannot be used as a base: not an object type")]
    InvalidBase(String),

    /// Explicit composite name already taken by a type that is not a composite
    #[error("Type '{0}' already exists and is not a mixed type")]
    NameCollision(String),

    /// Mixins depend on each other
    #[error("Circular mixin dependency: {0}")]
    CircularDependency(String),

    /// Resolution nested deeper than the configured limit
    #[error("Mixin dependencies nested deeper than {0} levels")]
    DependencyTooDeep(usize),

    /// `compose_chain` called without mixins
    #[error("No mixins listed")]
    EmptyChain,

    /// Engine configuration rejected
    #[error("Invalid engine configuration: {0}")]
    InvalidConfig(String),

    /// The type system refused a registration or an instantiation
    #[error("Type system error: {0}")]
    RegistrationFailed(#[from] ObjectError),
}

/// Mixin engine result
pub type MixinResult<T> = Result<T, MixinError>;
