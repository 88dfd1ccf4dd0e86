//! Type identifiers and type flags
//!
//! A `TypeId` packs its fundamental namespace into the high byte, so
//! "which namespace does this id belong to" never needs a table lookup.

use std::fmt;
use std::ops::BitOr;

const FUNDAMENTAL_SHIFT: u32 = 24;
const SERIAL_MASK: u32 = (1 << FUNDAMENTAL_SHIFT) - 1;

/// Largest fundamental index that fits in a `TypeId`
pub const MAX_FUNDAMENTALS: u32 = 0xff;

/// Opaque identifier of a registered type
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeId(u32);

impl TypeId {
    /// Root of the object namespace
    pub const OBJECT: TypeId = TypeId::from_parts(1, 0);

    /// Root of the interface namespace
    pub const INTERFACE: TypeId = TypeId::from_parts(2, 0);

    pub(crate) const fn from_parts(fundamental: u32, serial: u32) -> Self {
        TypeId((fundamental << FUNDAMENTAL_SHIFT) | (serial & SERIAL_MASK))
    }

    /// Root type of the namespace this id belongs to
    pub const fn fundamental(self) -> TypeId {
        TypeId(self.0 & !SERIAL_MASK)
    }

    /// Check if this id is the root of its namespace
    pub const fn is_fundamental(self) -> bool {
        self.0 & SERIAL_MASK == 0
    }

    /// Check if this id lives in the same namespace as `root`
    pub const fn in_namespace(self, root: TypeId) -> bool {
        self.fundamental().0 == root.fundamental().0
    }

    pub(crate) const fn fundamental_index(self) -> u32 {
        self.0 >> FUNDAMENTAL_SHIFT
    }

    pub(crate) const fn serial(self) -> u32 {
        self.0 & SERIAL_MASK
    }

    /// Get the raw id value
    pub const fn as_u32(self) -> u32 {
        self.0
    }
}

impl fmt::Debug for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeId({}:{})", self.fundamental_index(), self.serial())
    }
}

impl fmt::Display for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}:{}", self.fundamental_index(), self.serial())
    }
}

/// Flags attached to a type at registration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct TypeFlags(u8);

impl TypeFlags {
    /// Type cannot be instantiated
    pub const ABSTRACT: TypeFlags = TypeFlags(1 << 0);

    /// Type may be used as a parent
    pub const DERIVABLE: TypeFlags = TypeFlags(1 << 1);

    /// No flags
    pub const fn empty() -> Self {
        TypeFlags(0)
    }

    /// Check if all bits of `other` are set
    pub const fn contains(self, other: TypeFlags) -> bool {
        self.0 & other.0 == other.0
    }

    /// Set the bits of `other`
    pub fn insert(&mut self, other: TypeFlags) {
        self.0 |= other.0;
    }
}

impl BitOr for TypeFlags {
    type Output = TypeFlags;

    fn bitor(self, rhs: TypeFlags) -> TypeFlags {
        TypeFlags(self.0 | rhs.0)
    }
}
