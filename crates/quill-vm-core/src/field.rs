//! Field descriptors

use crate::aspect::RuntimeAspect;
use crate::class::TypeRef;
use crate::flags::FieldFlags;
use crate::names::FieldName;

/// Runtime field descriptor
#[derive(Debug, Clone)]
pub struct RuntimeField {
    /// Qualified field name
    pub name: FieldName,
    /// Field type
    pub ty: TypeRef,
    /// Flags
    pub flags: FieldFlags,
    /// Attached aspects
    pub aspects: Vec<RuntimeAspect>,
}

impl RuntimeField {
    /// Create a field with no aspects
    pub fn new(name: FieldName, ty: TypeRef, flags: FieldFlags) -> Self {
        Self {
            name,
            ty,
            flags,
            aspects: Vec::new(),
        }
    }

    /// Whether the field is shared by all instances
    pub fn is_static(&self) -> bool {
        self.flags.contains(FieldFlags::STATIC)
    }
}
