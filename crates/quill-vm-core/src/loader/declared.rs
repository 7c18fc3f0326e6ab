//! First-pass class shapes
//!
//! A declared class is a class body decoded structurally: names are still
//! table indices and method blocks are still raw bytes.

use quill_vm_bytecode::{ClassBody, FieldDecl};

use crate::class::ClassRef;
use crate::flags::ClassFlags;
use crate::names::QualifiedTypeName;

/// Class body captured before type resolution
#[derive(Debug, Clone)]
pub struct DeclaredClass {
    /// Stub class defined for this body
    pub class: ClassRef,
    /// Qualified name
    pub name: QualifiedTypeName,
    /// Declared flags
    pub flags: ClassFlags,
    /// Parent type-name indices
    pub parents: Vec<i32>,
    /// Raw method blocks
    pub methods: Vec<Vec<u8>>,
    /// Field declarations
    pub fields: Vec<FieldDecl>,
}

impl DeclaredClass {
    /// Capture `body` for the stub `class`
    pub fn new(class: ClassRef, name: QualifiedTypeName, flags: ClassFlags, body: ClassBody) -> Self {
        Self {
            class,
            name,
            flags,
            parents: body.parents,
            methods: body.methods,
            fields: body.fields,
        }
    }
}
