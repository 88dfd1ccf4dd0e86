//! Runtime type table
//!
//! The type system maps `TypeId` to a type node (name, parent, layout,
//! flags, callbacks, interfaces, and a per-type metadata side table),
//! and lazily builds one class per type.
//!
//! Type registration and class construction are serialized through
//! `RwLock`s. Building a class holds only that type's build guard while
//! its class-init runs, so a callback may query the type system and
//! build other classes, but not its own.

use crate::class::{Class, VTable};
use crate::instance::Instance;
use crate::type_id::{TypeFlags, TypeId, MAX_FUNDAMENTALS};
use crate::value::Value;
use crate::{ObjectError, ObjectResult};
use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHashMap;
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// Intrinsic instance size of the root object type
pub const OBJECT_INSTANCE_SIZE: usize = 24;

/// Intrinsic class size of the root object type
pub const OBJECT_CLASS_SIZE: usize = 136;

const MAX_SERIAL: u32 = (1 << 24) - 1;

/// Class init callback, run once when a type's class is built
///
/// Threads racing to build the same class wait for the first build, so
/// the callback runs exactly once per type.
pub type ClassInitFn = Arc<dyn Fn(&TypeSystem, &mut Class) + Send + Sync>;

/// Instance init callback, run for every layer of every new instance
pub type InstanceInitFn = Arc<dyn Fn(&TypeSystem, &mut Instance) + Send + Sync>;

/// Interface init callback, fills the implementing class's vtable
pub type InterfaceInitFn = Arc<dyn Fn(&mut VTable) + Send + Sync>;

/// Value stored in the per-type metadata side table
pub type Metadata = Arc<dyn Any + Send + Sync>;

/// Wrap a closure as a class init callback
pub fn class_init<F>(f: F) -> ClassInitFn
where
    F: Fn(&TypeSystem, &mut Class) + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Wrap a closure as an instance init callback
pub fn instance_init<F>(f: F) -> InstanceInitFn
where
    F: Fn(&TypeSystem, &mut Instance) + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Wrap a closure as an interface init callback
pub fn interface_init<F>(f: F) -> InterfaceInitFn
where
    F: Fn(&mut VTable) + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Cumulative block sizes of a type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Layout {
    /// Instance block size, including all ancestors
    pub instance_size: usize,
    /// Class block size, including all ancestors
    pub class_size: usize,
}

impl Layout {
    /// Create a layout
    pub const fn new(instance_size: usize, class_size: usize) -> Self {
        Self {
            instance_size,
            class_size,
        }
    }

    /// Layout of a child adding its own blocks on top of `self`
    pub const fn extend(self, instance_size: usize, class_size: usize) -> Self {
        Self {
            instance_size: self.instance_size + instance_size,
            class_size: self.class_size + class_size,
        }
    }
}

/// Registration info for a new type
#[derive(Clone, Default)]
pub struct TypeInfo {
    /// Cumulative sizes
    pub layout: Layout,
    /// Optional class init
    pub class_init: Option<ClassInitFn>,
    /// Optional instance init
    pub instance_init: Option<InstanceInitFn>,
}

impl TypeInfo {
    /// Create type info with the given cumulative layout
    pub fn new(layout: Layout) -> Self {
        Self {
            layout,
            class_init: None,
            instance_init: None,
        }
    }

    /// Set the class init callback
    pub fn with_class_init(mut self, f: ClassInitFn) -> Self {
        self.class_init = Some(f);
        self
    }

    /// Set the instance init callback
    pub fn with_instance_init(mut self, f: InstanceInitFn) -> Self {
        self.instance_init = Some(f);
        self
    }
}

impl fmt::Debug for TypeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeInfo")
            .field("layout", &self.layout)
            .field("has_class_init", &self.class_init.is_some())
            .field("has_instance_init", &self.instance_init.is_some())
            .finish()
    }
}

struct TypeNode {
    name: Arc<str>,
    parent: Option<TypeId>,
    flags: TypeFlags,
    info: TypeInfo,
    interfaces: Vec<(TypeId, Option<InterfaceInitFn>)>,
    metadata: FxHashMap<&'static str, Metadata>,
}

#[derive(Default)]
struct TypeTable {
    nodes: FxHashMap<TypeId, TypeNode>,
    name_to_id: FxHashMap<Arc<str>, TypeId>,
    next_serial: FxHashMap<u32, u32>,
    next_fundamental: u32,
}

impl TypeTable {
    fn node(&self, ty: TypeId) -> ObjectResult<&TypeNode> {
        self.nodes.get(&ty).ok_or(ObjectError::UnknownType(ty))
    }

    fn check_name(&self, name: &str) -> ObjectResult<()> {
        if self.name_to_id.contains_key(name) {
            return Err(ObjectError::DuplicateName(name.to_string()));
        }
        Ok(())
    }

    fn allocate(&mut self, root: TypeId) -> ObjectResult<TypeId> {
        let serial = self.next_serial.entry(root.fundamental_index()).or_insert(1);
        if *serial > MAX_SERIAL {
            return Err(ObjectError::NamespaceExhausted);
        }
        let id = TypeId::from_parts(root.fundamental_index(), *serial);
        *serial += 1;
        Ok(id)
    }

    fn insert(&mut self, id: TypeId, name: &str, parent: Option<TypeId>, flags: TypeFlags, info: TypeInfo) {
        let name: Arc<str> = Arc::from(name);
        self.name_to_id.insert(name.clone(), id);
        self.nodes.insert(
            id,
            TypeNode {
                name,
                parent,
                flags,
                info,
                interfaces: Vec::new(),
                metadata: FxHashMap::default(),
            },
        );
    }
}

/// The object type system
///
/// Owns every registered type and the classes built for them. Create
/// one per process (or one per test); it is `Send + Sync`.
pub struct TypeSystem {
    table: RwLock<TypeTable>,
    classes: RwLock<FxHashMap<TypeId, Arc<Class>>>,
    /// One guard per type whose class is being built
    building: Mutex<FxHashMap<TypeId, Arc<Mutex<()>>>>,
}

impl TypeSystem {
    /// Create a type system with the built-in `Object` and `Interface` roots
    pub fn new() -> Self {
        Self::with_root_layout(Layout::new(OBJECT_INSTANCE_SIZE, OBJECT_CLASS_SIZE))
    }

    /// Create a type system whose root object type has the given intrinsic layout
    pub fn with_root_layout(root: Layout) -> Self {
        let mut table = TypeTable {
            next_fundamental: TypeId::INTERFACE.fundamental_index() + 1,
            ..Default::default()
        };
        table.insert(
            TypeId::OBJECT,
            "Object",
            None,
            TypeFlags::DERIVABLE,
            TypeInfo::new(root),
        );
        table.insert(
            TypeId::INTERFACE,
            "Interface",
            None,
            TypeFlags::ABSTRACT,
            TypeInfo::default(),
        );

        Self {
            table: RwLock::new(table),
            classes: RwLock::new(FxHashMap::default()),
            building: Mutex::new(FxHashMap::default()),
        }
    }

    /// Create a new fundamental namespace and return its root type
    pub fn new_fundamental(&self, name: &str) -> ObjectResult<TypeId> {
        let mut table = self.table.write();
        table.check_name(name)?;
        if table.next_fundamental > MAX_FUNDAMENTALS {
            return Err(ObjectError::NamespaceExhausted);
        }
        let id = TypeId::from_parts(table.next_fundamental, 0);
        table.next_fundamental += 1;
        table.insert(id, name, None, TypeFlags::DERIVABLE, TypeInfo::default());

        tracing::debug!(name, id = %id, "registered fundamental");
        Ok(id)
    }

    /// Register a new type under `parent`
    ///
    /// The layout in `info` is cumulative and may not be smaller than
    /// the parent's. The new type is derivable.
    pub fn register_type(
        &self,
        parent: TypeId,
        name: &str,
        info: TypeInfo,
        flags: TypeFlags,
    ) -> ObjectResult<TypeId> {
        let mut table = self.table.write();
        table.check_name(name)?;

        let parent_node = table.node(parent)?;
        if !parent_node.flags.contains(TypeFlags::DERIVABLE) {
            return Err(ObjectError::NotDerivable(parent_node.name.to_string()));
        }
        let parent_layout = parent_node.info.layout;
        if info.layout.instance_size < parent_layout.instance_size
            || info.layout.class_size < parent_layout.class_size
        {
            return Err(ObjectError::InvalidLayout {
                name: name.to_string(),
                reason: format!(
                    "{:?} is smaller than parent layout {:?}",
                    info.layout, parent_layout
                ),
            });
        }

        let id = table.allocate(parent.fundamental())?;
        let layout = info.layout;
        table.insert(id, name, Some(parent), flags | TypeFlags::DERIVABLE, info);

        tracing::debug!(
            name,
            id = %id,
            parent = %parent,
            instance_size = layout.instance_size,
            class_size = layout.class_size,
            "registered type"
        );
        Ok(id)
    }

    /// Register a new interface type
    pub fn register_interface(&self, name: &str) -> ObjectResult<TypeId> {
        let mut table = self.table.write();
        table.check_name(name)?;
        let id = table.allocate(TypeId::INTERFACE)?;
        table.insert(
            id,
            name,
            Some(TypeId::INTERFACE),
            TypeFlags::ABSTRACT,
            TypeInfo::default(),
        );
        Ok(id)
    }

    /// Cumulative layout of a type
    pub fn query_layout(&self, ty: TypeId) -> Option<Layout> {
        self.table.read().nodes.get(&ty).map(|n| n.info.layout)
    }

    /// Parent of a type (`None` for fundamentals and unknown ids)
    pub fn parent_of(&self, ty: TypeId) -> Option<TypeId> {
        self.table.read().nodes.get(&ty).and_then(|n| n.parent)
    }

    /// Look up a type by name
    pub fn type_from_name(&self, name: &str) -> Option<TypeId> {
        self.table.read().name_to_id.get(name).copied()
    }

    /// Name of a type
    pub fn name_of(&self, ty: TypeId) -> Option<Arc<str>> {
        self.table.read().nodes.get(&ty).map(|n| n.name.clone())
    }

    /// Name of a type, or its id when unknown (for diagnostics)
    pub fn display_name(&self, ty: TypeId) -> String {
        match self.name_of(ty) {
            Some(name) => name.to_string(),
            None => ty.to_string(),
        }
    }

    /// Flags of a type
    pub fn flags(&self, ty: TypeId) -> Option<TypeFlags> {
        self.table.read().nodes.get(&ty).map(|n| n.flags)
    }

    /// Check if a type is registered abstract
    pub fn is_abstract(&self, ty: TypeId) -> bool {
        self.flags(ty)
            .is_some_and(|f| f.contains(TypeFlags::ABSTRACT))
    }

    /// Check if a type is registered
    pub fn contains(&self, ty: TypeId) -> bool {
        self.table.read().nodes.contains_key(&ty)
    }

    /// Number of registered types, fundamentals included
    pub fn len(&self) -> usize {
        self.table.read().nodes.len()
    }

    /// Check if no types are registered (never true after `new`)
    pub fn is_empty(&self) -> bool {
        self.table.read().nodes.is_empty()
    }

    /// Store a metadata value on a type, replacing any previous value
    pub fn attach_metadata(&self, ty: TypeId, key: &'static str, value: Metadata) -> ObjectResult<()> {
        let mut table = self.table.write();
        let node = table.nodes.get_mut(&ty).ok_or(ObjectError::UnknownType(ty))?;
        node.metadata.insert(key, value);
        Ok(())
    }

    /// Metadata stored on exactly this type (ancestors are not consulted)
    pub fn get_metadata(&self, ty: TypeId, key: &'static str) -> Option<Metadata> {
        self.table
            .read()
            .nodes
            .get(&ty)
            .and_then(|n| n.metadata.get(key).cloned())
    }

    /// Metadata downcast to a concrete type
    pub fn get_metadata_as<T: Any + Send + Sync>(&self, ty: TypeId, key: &'static str) -> Option<Arc<T>> {
        self.get_metadata(ty, key)
            .and_then(|value| value.downcast::<T>().ok())
    }

    /// Check if a type is a registered interface
    pub fn is_interface(&self, ty: TypeId) -> bool {
        ty.in_namespace(TypeId::INTERFACE) && !ty.is_fundamental() && self.contains(ty)
    }

    /// Declare that `ty` implements `iface`
    ///
    /// `init` runs on the vtable of every class of `ty` (and of its
    /// descendants) built after this call.
    pub fn attach_interface(
        &self,
        ty: TypeId,
        iface: TypeId,
        init: Option<InterfaceInitFn>,
    ) -> ObjectResult<()> {
        if !self.is_interface(iface) {
            return Err(ObjectError::NotAnInterface(iface));
        }
        let mut table = self.table.write();
        let node = table.nodes.get_mut(&ty).ok_or(ObjectError::UnknownType(ty))?;
        if !node.interfaces.iter().any(|(i, _)| *i == iface) {
            node.interfaces.push((iface, init));
        }
        Ok(())
    }

    /// Ancestry of a type, from the type itself up to its fundamental
    pub fn ancestry(&self, ty: TypeId) -> Vec<TypeId> {
        let table = self.table.read();
        let mut chain = Vec::new();
        let mut current = table.nodes.get(&ty).map(|_| ty);
        while let Some(t) = current {
            chain.push(t);
            current = table.nodes.get(&t).and_then(|n| n.parent);
        }
        chain
    }

    /// Check if `ty` is `ancestor` or one of its descendants
    pub fn is_a(&self, ty: TypeId, ancestor: TypeId) -> bool {
        self.ancestry(ty).contains(&ancestor)
    }

    /// Check if `ty` or one of its ancestors implements `iface`
    pub fn implements(&self, ty: TypeId, iface: TypeId) -> bool {
        let table = self.table.read();
        let mut current = Some(ty);
        while let Some(t) = current {
            let Some(node) = table.nodes.get(&t) else {
                return false;
            };
            if node.interfaces.iter().any(|(i, _)| *i == iface) {
                return true;
            }
            current = node.parent;
        }
        false
    }

    /// Interfaces attached directly to `ty`
    pub fn interfaces_of(&self, ty: TypeId) -> Vec<TypeId> {
        self.table
            .read()
            .nodes
            .get(&ty)
            .map(|n| n.interfaces.iter().map(|(i, _)| *i).collect())
            .unwrap_or_default()
    }

    /// Get the class of a type, building it (and its ancestors) on first use
    pub fn class_of(&self, ty: TypeId) -> ObjectResult<Arc<Class>> {
        if let Some(class) = self.classes.read().get(&ty) {
            return Ok(class.clone());
        }

        let guard = self.building.lock().entry(ty).or_default().clone();
        let _building = guard.lock();
        if let Some(class) = self.classes.read().get(&ty) {
            return Ok(class.clone());
        }

        let (parent, layout, class_init, iface_inits) = {
            let table = self.table.read();
            let node = table.node(ty)?;
            let inits: Vec<InterfaceInitFn> = node
                .interfaces
                .iter()
                .filter_map(|(_, init)| init.clone())
                .collect();
            (node.parent, node.info.layout, node.info.class_init.clone(), inits)
        };

        let mut class = match parent {
            Some(parent) => {
                let parent_class = self.class_of(parent)?;
                Class::derive(&parent_class, ty, layout.class_size)
            }
            None => Class::root(ty, layout.class_size),
        };

        if let Some(init) = class_init {
            init(self, &mut class);
        }
        for init in iface_inits {
            init(class.vtable_mut());
        }

        let class = Arc::new(class);
        self.classes.write().insert(ty, class.clone());
        self.building.lock().remove(&ty);
        Ok(class)
    }

    /// Check if a class has been built for `ty`
    pub fn has_class(&self, ty: TypeId) -> bool {
        self.classes.read().contains_key(&ty)
    }

    /// Create a new instance of an object type
    ///
    /// Instance inits run from the root object type down to `ty`.
    pub fn instantiate(&self, ty: TypeId) -> ObjectResult<Instance> {
        let (layout, flags, name) = {
            let table = self.table.read();
            let node = table.node(ty)?;
            (node.info.layout, node.flags, node.name.clone())
        };
        if !ty.in_namespace(TypeId::OBJECT) {
            return Err(ObjectError::NotInstantiable(name.to_string()));
        }
        if flags.contains(TypeFlags::ABSTRACT) {
            return Err(ObjectError::AbstractType(name.to_string()));
        }

        let class = self.class_of(ty)?;
        let mut instance = Instance::new(ty, class, layout.instance_size);

        let inits: Vec<InstanceInitFn> = {
            let table = self.table.read();
            self.ancestry_unlocked(&table, ty)
                .into_iter()
                .rev()
                .filter_map(|t| table.nodes.get(&t).and_then(|n| n.info.instance_init.clone()))
                .collect()
        };
        for init in inits {
            init(self, &mut instance);
        }

        tracing::trace!(type_name = %name, id = instance.id().as_u64(), "instantiated");
        Ok(instance)
    }

    fn ancestry_unlocked(&self, table: &TypeTable, ty: TypeId) -> Vec<TypeId> {
        let mut chain = Vec::new();
        let mut current = Some(ty);
        while let Some(t) = current {
            chain.push(t);
            current = table.nodes.get(&t).and_then(|n| n.parent);
        }
        chain
    }

    /// Call a method through the instance's own class
    pub fn call(&self, instance: &mut Instance, method: &str, args: &[Value]) -> ObjectResult<Value> {
        let class = instance.class().clone();
        self.call_on(&class, instance, method, args)
    }

    /// Call a method through an explicit class, typically an ancestor
    /// class reached by chaining up
    pub fn call_on(
        &self,
        class: &Class,
        instance: &mut Instance,
        method: &str,
        args: &[Value],
    ) -> ObjectResult<Value> {
        let f = class
            .method(method)
            .cloned()
            .ok_or_else(|| ObjectError::MethodNotFound {
                type_name: self.display_name(class.type_id()),
                method: method.to_string(),
            })?;
        f(self, instance, args)
    }
}

impl Default for TypeSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for TypeSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeSystem")
            .field("types", &self.len())
            .field("classes", &self.classes.read().len())
            .finish()
    }
}
