//! Composite type synthesis

use crate::descriptor::{MixinDescriptor, MixinTypeId};
use crate::engine::MixinEngine;
use crate::error::{MixinError, MixinResult};
use crate::introspect::{self, LAYER_KEY};
use crate::proxy::{class_trampoline, instance_trampoline};
use bombolla_object::{InterfaceInitFn, Layout, ObjectError, TypeFlags, TypeId, TypeInfo};
use std::sync::Arc;

/// An object type produced by stacking one mixin on a base
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompositeType {
    /// Id in the object namespace
    pub type_id: TypeId,
    /// Resolved base the mixin was stacked on
    pub parent: TypeId,
    /// Mixin stacked at this layer
    pub mixin: MixinTypeId,
    /// Cumulative sizes
    pub layout: Layout,
    /// Registered abstract
    pub is_abstract: bool,
    /// Registered name
    pub name: String,
}

impl MixinEngine {
    /// Stack `mixin` on `base`, resolving its dependencies first
    pub fn synthesize(
        &self,
        base: TypeId,
        mixin: MixinTypeId,
        name: Option<&str>,
    ) -> MixinResult<CompositeType> {
        self.synthesize_with(base, mixin, name, &mut Vec::new())
    }

    pub(crate) fn synthesize_with(
        &self,
        base: TypeId,
        mixin: MixinTypeId,
        name: Option<&str>,
        stack: &mut Vec<MixinTypeId>,
    ) -> MixinResult<CompositeType> {
        if !self.system.contains(base) {
            return Err(MixinError::UnknownType(base));
        }
        if !base.in_namespace(TypeId::OBJECT) {
            return Err(MixinError::InvalidBase(self.system.display_name(base)));
        }
        let descriptor = self.descriptor(mixin)?;

        if let Some(start) = stack.iter().position(|m| *m == mixin) {
            let cycle: Vec<String> = stack[start..]
                .iter()
                .chain(std::iter::once(&mixin))
                .map(|m| self.system.display_name(m.type_id()))
                .collect();
            return Err(MixinError::CircularDependency(cycle.join(" -> ")));
        }
        if stack.len() >= self.config.max_depth {
            return Err(MixinError::DependencyTooDeep(self.config.max_depth));
        }

        stack.push(mixin);
        let resolution = self.resolve_with(base, &descriptor, stack);
        stack.pop();
        let resolved = resolution?.base;

        let name = match name {
            Some(name) => name.to_string(),
            None => format!(
                "{}{}{}",
                self.system.display_name(resolved),
                self.config.name_separator,
                self.system.display_name(mixin.type_id())
            ),
        };

        let _guard = self.compose_lock.lock();
        if let Some(existing) = self.system.type_from_name(&name) {
            return self.existing_composite(existing, mixin, &name);
        }

        let provided = self.provided_interfaces(&descriptor)?;
        let pending = self.pending_interfaces(resolved, &descriptor, &provided);
        let is_abstract = !pending.is_empty();
        if is_abstract {
            let pending = pending.join(", ");
            if self.config.warn_unsatisfied_interfaces {
                tracing::warn!(composite = %name, interfaces = %pending, "composite is abstract");
            } else {
                tracing::debug!(composite = %name, interfaces = %pending, "composite is abstract");
            }
        }

        let layout = self
            .system
            .query_layout(resolved)
            .ok_or(MixinError::UnknownType(resolved))?
            .extend(descriptor.instance_size(), descriptor.class_size());
        let info = TypeInfo::new(layout)
            .with_class_init(class_trampoline(mixin, descriptor.class_init().cloned()))
            .with_instance_init(instance_trampoline(mixin, descriptor.instance_init().cloned()));
        let flags = if is_abstract {
            TypeFlags::ABSTRACT
        } else {
            TypeFlags::empty()
        };

        let ty = match self.system.register_type(resolved, &name, info, flags) {
            Ok(ty) => ty,
            // Registered behind the engine's back since the check above
            Err(ObjectError::DuplicateName(_)) => {
                let existing = self
                    .system
                    .type_from_name(&name)
                    .ok_or_else(|| MixinError::NameCollision(name.clone()))?;
                return self.existing_composite(existing, mixin, &name);
            }
            Err(e) => return Err(e.into()),
        };
        self.system.attach_metadata(ty, LAYER_KEY, Arc::new(mixin))?;
        for (iface, init) in provided {
            self.system.attach_interface(ty, iface, init)?;
        }

        tracing::debug!(
            composite = %name,
            base = %self.system.display_name(resolved),
            mixin = descriptor.name(),
            instance_size = layout.instance_size,
            class_size = layout.class_size,
            is_abstract,
            "synthesized composite"
        );

        Ok(CompositeType {
            type_id: ty,
            parent: resolved,
            mixin,
            layout,
            is_abstract,
            name,
        })
    }

    fn existing_composite(
        &self,
        existing: TypeId,
        mixin: MixinTypeId,
        name: &str,
    ) -> MixinResult<CompositeType> {
        match introspect::layer_tag(&self.system, existing) {
            Some(tag) if tag == mixin => {}
            Some(tag) => tracing::warn!(
                composite = name,
                requested = %self.system.display_name(mixin.type_id()),
                stacked = %self.system.display_name(tag.type_id()),
                "name already taken by a different mixin layer"
            ),
            None => return Err(MixinError::NameCollision(name.to_string())),
        }
        self.composite(existing)
            .ok_or(MixinError::UnknownType(existing))
    }

    fn provided_interfaces(
        &self,
        descriptor: &MixinDescriptor,
    ) -> MixinResult<Vec<(TypeId, Option<InterfaceInitFn>)>> {
        descriptor
            .provides()
            .iter()
            .map(|p| Ok((self.lookup_interface(&p.interface)?, p.init.clone())))
            .collect()
    }

    /// Interface requirements of every mixin in the new chain that
    /// neither the resolved base nor the new layer satisfies
    fn pending_interfaces(
        &self,
        resolved: TypeId,
        descriptor: &MixinDescriptor,
        provided: &[(TypeId, Option<InterfaceInitFn>)],
    ) -> Vec<String> {
        let mut descriptors = vec![];
        for layer in self.system.ancestry(resolved) {
            if let Some(tag) = introspect::layer_tag(&self.system, layer) {
                if let Ok(d) = self.descriptor(tag) {
                    descriptors.push(d);
                }
            }
        }

        let mut pending: Vec<String> = Vec::new();
        let required = descriptor
            .required_interfaces()
            .chain(descriptors.iter().flat_map(|d| d.required_interfaces()));
        for iface in required {
            if self.interface_satisfied(resolved, iface) {
                continue;
            }
            let provided_here = self
                .lookup_type(iface)
                .is_ok_and(|id| provided.iter().any(|(p, _)| *p == id));
            let iface = iface.to_string();
            if !provided_here && !pending.contains(&iface) {
                pending.push(iface);
            }
        }
        pending
    }

    /// Describe a type previously produced by synthesis
    pub fn composite(&self, ty: TypeId) -> Option<CompositeType> {
        let mixin = introspect::layer_tag(&self.system, ty)?;
        Some(CompositeType {
            type_id: ty,
            parent: self.system.parent_of(ty)?,
            mixin,
            layout: self.system.query_layout(ty)?,
            is_abstract: self.system.is_abstract(ty),
            name: self.system.name_of(ty)?.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bombolla_object::{OBJECT_CLASS_SIZE, OBJECT_INSTANCE_SIZE};

    #[test]
    fn test_layout_is_stacked() {
        let engine = MixinEngine::new().unwrap();
        let clock = engine
            .register(
                &MixinDescriptor::builder("Clock")
                    .instance_size(8)
                    .class_size(16)
                    .build(),
            )
            .unwrap();

        let composite = engine.compose(TypeId::OBJECT, clock, None).unwrap();
        assert_eq!(composite.name, "Object+Clock");
        assert_eq!(composite.parent, TypeId::OBJECT);
        assert_eq!(
            composite.layout,
            Layout::new(OBJECT_INSTANCE_SIZE + 8, OBJECT_CLASS_SIZE + 16)
        );
        assert!(!composite.is_abstract);
        assert_eq!(engine.composite(composite.type_id), Some(composite));
    }

    #[test]
    fn test_compose_is_idempotent() {
        let engine = MixinEngine::new().unwrap();
        let clock = engine
            .register(&MixinDescriptor::builder("Clock").build())
            .unwrap();

        let first = engine.compose(TypeId::OBJECT, clock, None).unwrap();
        let named = engine
            .compose(TypeId::OBJECT, clock, Some("Object+Clock"))
            .unwrap();
        assert_eq!(first, named);
    }

    #[test]
    fn test_composites_are_keyed_by_name() {
        let engine = MixinEngine::new().unwrap();
        let clock = engine
            .register(&MixinDescriptor::builder("Clock").instance_size(4).build())
            .unwrap();

        let named = engine
            .compose(TypeId::OBJECT, clock, Some("MyClock"))
            .unwrap();
        let auto = engine.compose(TypeId::OBJECT, clock, None).unwrap();

        assert_eq!(named.name, "MyClock");
        assert_eq!(auto.name, "Object+Clock");
        assert_ne!(named.type_id, auto.type_id);
        assert_eq!(named.layout, auto.layout);
        assert_eq!(named.mixin, auto.mixin);
        assert_eq!(
            engine.compose(TypeId::OBJECT, clock, Some("MyClock")).unwrap(),
            named
        );
    }

    #[derive(Clone, Default)]
    struct CapturedLog(Arc<parking_lot::Mutex<Vec<u8>>>);

    impl std::io::Write for CapturedLog {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    /// Warnings emitted while composing a Canvas that requires `IPaint`
    fn abstract_canvas_warnings(warn_unsatisfied_interfaces: bool) -> String {
        let config = crate::config::EngineConfig {
            warn_unsatisfied_interfaces,
            ..Default::default()
        };
        let engine = MixinEngine::with_config(config).unwrap();
        engine.system().register_interface("IPaint").unwrap();
        let canvas = engine
            .register(
                &MixinDescriptor::builder("Canvas")
                    .requires_interface("IPaint")
                    .build(),
            )
            .unwrap();

        let log = CapturedLog::default();
        let writer = log.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_max_level(tracing::Level::WARN)
            .with_ansi(false)
            .finish();
        let composite = tracing::subscriber::with_default(subscriber, || {
            engine.compose(TypeId::OBJECT, canvas, None).unwrap()
        });
        assert!(composite.is_abstract);

        let bytes = log.0.lock().clone();
        String::from_utf8(bytes).unwrap()
    }

    #[test]
    fn test_unsatisfied_interfaces_warn_when_enabled() {
        let output = abstract_canvas_warnings(true);
        assert!(output.contains("WARN"));
        assert!(output.contains("composite is abstract"));
        assert!(output.contains("IPaint"));

        assert!(abstract_canvas_warnings(false).is_empty());
    }

    #[test]
    fn test_custom_separator() {
        let config = crate::config::EngineConfig {
            name_separator: "::".to_string(),
            ..Default::default()
        };
        let engine = MixinEngine::with_config(config).unwrap();
        let clock = engine
            .register(&MixinDescriptor::builder("Clock").build())
            .unwrap();
        assert_eq!(
            engine.compose(TypeId::OBJECT, clock, None).unwrap().name,
            "Object::Clock"
        );
    }

    #[test]
    fn test_explicit_name_of_plain_type_collides() {
        let engine = MixinEngine::new().unwrap();
        let clock = engine
            .register(&MixinDescriptor::builder("Clock").build())
            .unwrap();
        assert_eq!(
            engine.compose(TypeId::OBJECT, clock, Some("Object")),
            Err(MixinError::NameCollision("Object".to_string()))
        );
    }

    #[test]
    fn test_mixin_namespace_is_not_a_base() {
        let engine = MixinEngine::new().unwrap();
        let clock = engine
            .register(&MixinDescriptor::builder("Clock").build())
            .unwrap();
        assert_eq!(
            engine.compose(clock.type_id(), clock, None),
            Err(MixinError::InvalidBase("Clock".to_string()))
        );
    }

    #[test]
    fn test_cycle_is_reported() {
        let engine = MixinEngine::new().unwrap();
        let a = engine
            .register(&MixinDescriptor::builder("A").requires_mixin("B").build())
            .unwrap();
        engine
            .register(&MixinDescriptor::builder("B").requires_mixin("A").build())
            .unwrap();

        assert_eq!(
            engine.compose(TypeId::OBJECT, a, None),
            Err(MixinError::CircularDependency("A -> B -> A".to_string()))
        );
        assert_eq!(engine.system().type_from_name("Object+B"), None);
    }

    #[test]
    fn test_depth_limit() {
        let config = crate::config::EngineConfig {
            max_depth: 2,
            ..Default::default()
        };
        let engine = MixinEngine::with_config(config).unwrap();
        let c = MixinDescriptor::builder("C").build();
        let b = MixinDescriptor::builder("B").requires_mixin(&c).build();
        let a = engine
            .register(&MixinDescriptor::builder("A").requires_mixin(&b).build())
            .unwrap();

        assert_eq!(
            engine.compose(TypeId::OBJECT, a, None),
            Err(MixinError::DependencyTooDeep(2))
        );
    }

    #[test]
    fn test_provided_interface_fills_vtable() {
        use bombolla_object::{method, Value};

        let engine = MixinEngine::new().unwrap();
        let paint = engine.system().register_interface("IPaint").unwrap();
        let brush = engine
            .register(
                &MixinDescriptor::builder("Brush")
                    .provides_with(paint, |vtable| {
                        vtable.set("paint", method(|_, _, _| Ok(Value::str("stroke"))));
                    })
                    .build(),
            )
            .unwrap();

        let composite = engine.compose(TypeId::OBJECT, brush, None).unwrap();
        assert!(engine.system().implements(composite.type_id, paint));

        let mut obj = engine.create(composite.type_id).unwrap();
        assert_eq!(
            engine.system().call(&mut obj, "paint", &[]).unwrap(),
            Value::str("stroke")
        );
    }
}
