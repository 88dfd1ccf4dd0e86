//! Dependency resolution
//!
//! Requirements are walked in declaration order against an evolving
//! base type. Base-type requirements may narrow the base to a more
//! specific descendant, missing mixins are stacked on it depth first,
//! and mixins already present anywhere in the ancestry are skipped, so a
//! mixin reachable through two paths ends up in the chain once.

use crate::descriptor::{MixinDescriptor, MixinTypeId, Requirement, TypeRef};
use crate::engine::MixinEngine;
use crate::error::{MixinError, MixinResult};
use crate::introspect;
use bombolla_object::{ObjectError, TypeId};
use std::sync::Arc;

/// Outcome of resolving one mixin against a base
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    /// Base that now contains every dependency of the mixin
    pub base: TypeId,
    /// Interface requirements of the mixin the base does not implement
    pub unsatisfied: Vec<TypeRef>,
}

impl Resolution {
    /// Check if the mixin left an interface requirement open
    pub fn became_abstract(&self) -> bool {
        !self.unsatisfied.is_empty()
    }
}

impl MixinEngine {
    /// Resolve `mixin`'s requirements against `base`
    ///
    /// May register intermediate composites for missing dependencies.
    pub fn resolve(&self, base: TypeId, mixin: MixinTypeId) -> MixinResult<Resolution> {
        let descriptor = self.descriptor(mixin)?;
        let mut stack = vec![mixin];
        self.resolve_with(base, &descriptor, &mut stack)
    }

    /// `stack` holds the mixins whose synthesis is in progress, outermost
    /// first, ending with the one being resolved.
    pub(crate) fn resolve_with(
        &self,
        base: TypeId,
        descriptor: &Arc<MixinDescriptor>,
        stack: &mut Vec<MixinTypeId>,
    ) -> MixinResult<Resolution> {
        let mut base = base;
        let mut unsatisfied = Vec::new();

        for requirement in descriptor.requirements() {
            match requirement {
                Requirement::BaseType(required) => {
                    let required = self.lookup_type(required)?;
                    if self.system.is_a(base, required) {
                        continue;
                    }
                    if !self.system.is_a(required, base) {
                        return Err(MixinError::UnsatisfiableBaseType {
                            mixin: descriptor.name().to_string(),
                            required: self.system.display_name(required),
                            base: self.system.display_name(base),
                        });
                    }
                    tracing::debug!(
                        mixin = descriptor.name(),
                        from = %self.system.display_name(base),
                        to = %self.system.display_name(required),
                        "widened base"
                    );
                    base = required;
                }
                Requirement::Mixin(dependency) => {
                    let dependency = self.resolve_mixin_ref(dependency)?;
                    if let Some(layer) = introspect::peek_layer(&self.system, base, dependency) {
                        tracing::debug!(
                            mixin = descriptor.name(),
                            dependency = %self.system.display_name(dependency.type_id()),
                            layer = %self.system.display_name(layer),
                            "dependency already stacked"
                        );
                        continue;
                    }
                    base = self.synthesize_with(base, dependency, None, stack)?.type_id;
                }
                Requirement::Interface(iface) => {
                    if !self.interface_satisfied(base, iface) {
                        unsatisfied.push(iface.clone());
                    }
                }
            }
        }

        Ok(Resolution { base, unsatisfied })
    }

    pub(crate) fn lookup_type(&self, ty: &TypeRef) -> MixinResult<TypeId> {
        match ty {
            TypeRef::Id(id) if self.system.contains(*id) => Ok(*id),
            TypeRef::Id(id) => Err(MixinError::UnknownType(*id)),
            TypeRef::Name(name) => self
                .system
                .type_from_name(name)
                .ok_or_else(|| MixinError::UnknownTypeName(name.to_string())),
        }
    }

    pub(crate) fn lookup_interface(&self, iface: &TypeRef) -> MixinResult<TypeId> {
        let id = self.lookup_type(iface)?;
        if !self.system.is_interface(id) {
            return Err(ObjectError::NotAnInterface(id).into());
        }
        Ok(id)
    }

    /// An interface that is not registered yet is never satisfied
    pub(crate) fn interface_satisfied(&self, ty: TypeId, iface: &TypeRef) -> bool {
        self.lookup_type(iface)
            .is_ok_and(|iface| self.system.implements(ty, iface))
    }
}
