//! Mixin descriptors and requirements
//!
//! A descriptor is authored once per mixin and never changes after it
//! is registered. Build one with [`MixinDescriptor::builder`] and keep
//! it in an `Arc` (typically a `once_cell::sync::Lazy` static).

use crate::proxy::{MixinClass, MixinInstance};
use bombolla_object::{InterfaceInitFn, TypeId, VTable};
use std::fmt;
use std::sync::Arc;

/// Author's class init, called with a view of the mixin's class block
pub type MixinClassInit = Arc<dyn Fn(&mut MixinClass<'_>) + Send + Sync>;

/// Author's instance init, called with a view of the mixin's instance block
pub type MixinInstanceInit = Arc<dyn Fn(&mut MixinInstance<'_>) + Send + Sync>;

/// Identifier of a registered mixin
///
/// Always lives in the engine's mixin namespace, so it can never be
/// confused with an ordinary object type id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MixinTypeId(TypeId);

impl MixinTypeId {
    pub(crate) fn new(ty: TypeId) -> Self {
        MixinTypeId(ty)
    }

    /// The underlying type id
    pub fn type_id(self) -> TypeId {
        self.0
    }
}

impl fmt::Display for MixinTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "mixin {}", self.0)
    }
}

/// Reference to a type, by id or by registered name
///
/// Names let statically-built descriptors point at types that are
/// registered later, or separately in every type system.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeRef {
    /// Known id
    Id(TypeId),
    /// Looked up by name when needed
    Name(Arc<str>),
}

impl From<TypeId> for TypeRef {
    fn from(ty: TypeId) -> Self {
        TypeRef::Id(ty)
    }
}

impl From<&str> for TypeRef {
    fn from(name: &str) -> Self {
        TypeRef::Name(Arc::from(name))
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeRef::Id(ty) => write!(f, "{}", ty),
            TypeRef::Name(name) => write!(f, "{}", name),
        }
    }
}

/// Reference to another mixin
#[derive(Clone)]
pub enum MixinRef {
    /// Already registered
    Id(MixinTypeId),
    /// Registered on first use under the descriptor's own name
    Descriptor(Arc<MixinDescriptor>),
    /// Looked up among registered mixins when needed
    Name(Arc<str>),
}

impl From<MixinTypeId> for MixinRef {
    fn from(id: MixinTypeId) -> Self {
        MixinRef::Id(id)
    }
}

impl From<&str> for MixinRef {
    fn from(name: &str) -> Self {
        MixinRef::Name(Arc::from(name))
    }
}

impl From<Arc<MixinDescriptor>> for MixinRef {
    fn from(descriptor: Arc<MixinDescriptor>) -> Self {
        MixinRef::Descriptor(descriptor)
    }
}

impl From<&Arc<MixinDescriptor>> for MixinRef {
    fn from(descriptor: &Arc<MixinDescriptor>) -> Self {
        MixinRef::Descriptor(descriptor.clone())
    }
}

impl fmt::Debug for MixinRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MixinRef::Id(id) => f.debug_tuple("Id").field(id).finish(),
            MixinRef::Descriptor(d) => f.debug_tuple("Descriptor").field(&d.name()).finish(),
            MixinRef::Name(name) => f.debug_tuple("Name").field(name).finish(),
        }
    }
}

/// A dependency declared by a mixin
///
/// Requirements are processed in declaration order.
#[derive(Debug, Clone)]
pub enum Requirement {
    /// An object type that must be an ancestor or descendant of the base
    BaseType(TypeRef),
    /// Another mixin that must be somewhere in the ancestry
    Mixin(MixinRef),
    /// A capability that makes the composite abstract while missing
    Interface(TypeRef),
}

/// An interface the mixin implements itself
#[derive(Clone)]
pub struct ProvidedInterface {
    /// Interface type
    pub interface: TypeRef,
    /// Fills the vtable of the composite's class
    pub init: Option<InterfaceInitFn>,
}

impl fmt::Debug for ProvidedInterface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProvidedInterface")
            .field("interface", &self.interface)
            .field("has_init", &self.init.is_some())
            .finish()
    }
}

/// Static description of a mixin
pub struct MixinDescriptor {
    name: String,
    instance_size: usize,
    class_size: usize,
    class_init: Option<MixinClassInit>,
    instance_init: Option<MixinInstanceInit>,
    requirements: Vec<Requirement>,
    provides: Vec<ProvidedInterface>,
}

impl MixinDescriptor {
    /// Start building a descriptor
    pub fn builder(name: &str) -> MixinDescriptorBuilder {
        MixinDescriptorBuilder {
            descriptor: MixinDescriptor {
                name: name.to_string(),
                instance_size: 0,
                class_size: 0,
                class_init: None,
                instance_init: None,
                requirements: Vec::new(),
                provides: Vec::new(),
            },
        }
    }

    /// Human-readable name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Size of the mixin's own instance block
    pub fn instance_size(&self) -> usize {
        self.instance_size
    }

    /// Size of the mixin's own class block
    pub fn class_size(&self) -> usize {
        self.class_size
    }

    /// Author's class init
    pub fn class_init(&self) -> Option<&MixinClassInit> {
        self.class_init.as_ref()
    }

    /// Author's instance init
    pub fn instance_init(&self) -> Option<&MixinInstanceInit> {
        self.instance_init.as_ref()
    }

    /// Requirements in declaration order
    pub fn requirements(&self) -> &[Requirement] {
        &self.requirements
    }

    /// Interface requirements only
    pub fn required_interfaces(&self) -> impl Iterator<Item = &TypeRef> {
        self.requirements.iter().filter_map(|r| match r {
            Requirement::Interface(iface) => Some(iface),
            _ => None,
        })
    }

    /// Interfaces the mixin implements itself
    pub fn provides(&self) -> &[ProvidedInterface] {
        &self.provides
    }
}

impl fmt::Debug for MixinDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MixinDescriptor")
            .field("name", &self.name)
            .field("instance_size", &self.instance_size)
            .field("class_size", &self.class_size)
            .field("requirements", &self.requirements)
            .field("provides", &self.provides)
            .finish()
    }
}

/// Builder for [`MixinDescriptor`]
pub struct MixinDescriptorBuilder {
    descriptor: MixinDescriptor,
}

impl MixinDescriptorBuilder {
    /// Size of the mixin's own instance block
    pub fn instance_size(mut self, size: usize) -> Self {
        self.descriptor.instance_size = size;
        self
    }

    /// Size of the mixin's own class block
    pub fn class_size(mut self, size: usize) -> Self {
        self.descriptor.class_size = size;
        self
    }

    /// Class init, run once per composite class that contains the mixin
    pub fn class_init<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut MixinClass<'_>) + Send + Sync + 'static,
    {
        self.descriptor.class_init = Some(Arc::new(f));
        self
    }

    /// Instance init, run for every new instance that contains the mixin
    pub fn instance_init<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut MixinInstance<'_>) + Send + Sync + 'static,
    {
        self.descriptor.instance_init = Some(Arc::new(f));
        self
    }

    /// Require an object type in the base
    pub fn requires_base(mut self, ty: impl Into<TypeRef>) -> Self {
        self.descriptor
            .requirements
            .push(Requirement::BaseType(ty.into()));
        self
    }

    /// Require another mixin below this one
    pub fn requires_mixin(mut self, mixin: impl Into<MixinRef>) -> Self {
        self.descriptor
            .requirements
            .push(Requirement::Mixin(mixin.into()));
        self
    }

    /// Require an interface somewhere in the final composite
    pub fn requires_interface(mut self, iface: impl Into<TypeRef>) -> Self {
        self.descriptor
            .requirements
            .push(Requirement::Interface(iface.into()));
        self
    }

    /// Declare an implemented interface with no vtable init
    pub fn provides(mut self, iface: impl Into<TypeRef>) -> Self {
        self.descriptor.provides.push(ProvidedInterface {
            interface: iface.into(),
            init: None,
        });
        self
    }

    /// Declare an implemented interface whose init fills the vtable
    pub fn provides_with<F>(mut self, iface: impl Into<TypeRef>, init: F) -> Self
    where
        F: Fn(&mut VTable) + Send + Sync + 'static,
    {
        self.descriptor.provides.push(ProvidedInterface {
            interface: iface.into(),
            init: Some(Arc::new(init)),
        });
        self
    }

    /// Finish the descriptor
    pub fn build(self) -> Arc<MixinDescriptor> {
        Arc::new(self.descriptor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_keeps_declaration_order() {
        let tail = MixinDescriptor::builder("HasTail").build();
        let dog = MixinDescriptor::builder("Dog")
            .instance_size(4)
            .class_size(8)
            .requires_mixin(&tail)
            .requires_base("Animal")
            .requires_interface("IBark")
            .provides("IPet")
            .build();

        assert_eq!(dog.name(), "Dog");
        assert_eq!(dog.instance_size(), 4);
        assert_eq!(dog.class_size(), 8);
        assert!(matches!(dog.requirements()[0], Requirement::Mixin(MixinRef::Descriptor(_))));
        assert!(matches!(dog.requirements()[1], Requirement::BaseType(TypeRef::Name(_))));
        assert_eq!(
            dog.required_interfaces().collect::<Vec<_>>(),
            vec![&TypeRef::from("IBark")]
        );
        assert_eq!(dog.provides().len(), 1);
        assert!(dog.class_init().is_none());
    }

    #[test]
    fn test_type_ref_display() {
        assert_eq!(TypeRef::from("IPaint").to_string(), "IPaint");
        assert_eq!(TypeRef::from(TypeId::OBJECT).to_string(), TypeId::OBJECT.to_string());
    }
}
