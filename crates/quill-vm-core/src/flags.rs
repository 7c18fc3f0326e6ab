//! Class, method and field flags
//!
//! The low bits mirror the wire encoding (`i16`). Bits above 15 are
//! runtime-only state and are never accepted from an image.

use bitflags::bitflags;

bitflags! {
    /// Class flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ClassFlags: u32 {
        /// Visible outside the module
        const PUBLIC = 1 << 1;
        /// No instances
        const STATIC = 1 << 2;
        /// Visible inside the module only
        const INTERNAL = 1 << 3;
        /// Visible to subclasses
        const PROTECTED = 1 << 4;
        /// Visible to the declaring scope
        const PRIVATE = 1 << 5;
        /// Cannot be instantiated
        const ABSTRACT = 1 << 6;
        /// Compiler-generated
        const SPECIAL = 1 << 7;
        /// Interface
        const INTERFACE = 1 << 8;
        /// Aspect declaration
        const ASPECT = 1 << 9;
        /// Body not yet constructed
        const NOT_COMPLETED = 1 << 16;
        /// Parent or member types still pending resolution
        const UNRESOLVED = 1 << 17;
    }
}

bitflags! {
    /// Method flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct MethodFlags: u32 {
        /// Visible outside the class
        const PUBLIC = 1 << 0;
        /// No receiver
        const STATIC = 1 << 1;
        /// Visible inside the module only
        const INTERNAL = 1 << 2;
        /// Visible to subclasses
        const PROTECTED = 1 << 3;
        /// Visible to the declaring class
        const PRIVATE = 1 << 4;
        /// Implemented natively
        const EXTERN = 1 << 5;
        /// Dispatched through the vtable
        const VIRTUAL = 1 << 6;
        /// No body
        const ABSTRACT = 1 << 7;
        /// Overrides a parent method
        const OVERRIDE = 1 << 8;
        /// Compiler-generated
        const SPECIAL = 1 << 9;
    }
}

bitflags! {
    /// Field flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct FieldFlags: u32 {
        /// Compile-time constant
        const LITERAL = 1 << 1;
        /// Visible outside the class
        const PUBLIC = 1 << 2;
        /// Shared by all instances
        const STATIC = 1 << 3;
        /// Visible to subclasses
        const PROTECTED = 1 << 4;
        /// Property-like accessor slot
        const VIRTUAL = 1 << 5;
        /// No storage in the declaring class
        const ABSTRACT = 1 << 6;
        /// Overrides a parent field
        const OVERRIDE = 1 << 7;
        /// Compiler-generated
        const SPECIAL = 1 << 8;
        /// Assigned once
        const READONLY = 1 << 9;
        /// Visible inside the module only
        const INTERNAL = 1 << 10;
    }
}

/// Convert raw wire flags, dropping unknown and runtime-only bits
pub fn from_wire<F: bitflags::Flags<Bits = u32>>(raw: i16) -> F {
    F::from_bits_truncate(u32::from(raw as u16))
}
