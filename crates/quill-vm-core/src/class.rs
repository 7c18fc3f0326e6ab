//! Class descriptors

use std::fmt;
use std::sync::Arc;

use quill_vm_bytecode::{GenericConstraintKind, TypeCode};
use quill_vm_gc::Handle;
use rustc_hash::FxHashMap;

use crate::aspect::RuntimeAspect;
use crate::field::RuntimeField;
use crate::flags::ClassFlags;
use crate::method::RuntimeMethod;
use crate::names::QualifiedTypeName;

/// Handle to a class in the vault's immortal class arena
pub type ClassRef = Handle<RuntimeClass>;

/// Module id as granted by the vault
pub type ModuleId = u16;

/// `(module id, class id)` pair identifying a class within the process
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct RuntimeToken {
    /// Owning module id
    pub module_id: u16,
    /// Class id
    pub class_id: u16,
}

impl RuntimeToken {
    /// Token of a class that was never assigned one
    pub const DEFAULT: Self = Self {
        module_id: 0,
        class_id: 0,
    };

    /// Create a token
    pub fn new(module_id: u16, class_id: u16) -> Self {
        Self {
            module_id,
            class_id,
        }
    }

    /// Whether the token was granted
    pub fn is_initialized(self) -> bool {
        self != Self::DEFAULT
    }
}

impl fmt::Debug for RuntimeToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Token({}:{})", self.module_id, self.class_id)
    }
}

/// Constraint on a generic parameter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenericConstraint {
    /// Kind of constraint
    pub kind: GenericConstraintKind,
    /// Constraining type, for `Type` and `Signature` constraints
    pub ty: Option<ClassRef>,
}

/// Generic type parameter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenericParam {
    /// Parameter name
    pub name: Arc<str>,
    /// Constraints
    pub constraints: Vec<GenericConstraint>,
}

/// A resolved type reference
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeRef {
    /// Concrete class
    Class(ClassRef),
    /// Generic parameter
    Generic(Arc<GenericParam>),
}

impl TypeRef {
    /// Concrete class, if any
    pub fn class(&self) -> Option<ClassRef> {
        match self {
            Self::Class(c) => Some(*c),
            Self::Generic(_) => None,
        }
    }
}

/// Field offsets of a completed class
#[derive(Debug, Clone, Default)]
pub struct VTableLayout {
    offsets: FxHashMap<Arc<str>, usize>,
    size: usize,
}

impl VTableLayout {
    /// Append a slot for `name`; a redeclared name keeps its inherited slot
    pub fn push(&mut self, name: Arc<str>) -> usize {
        if let Some(offset) = self.offsets.get(&name) {
            return *offset;
        }
        let offset = self.size;
        self.offsets.insert(name, offset);
        self.size += 1;
        offset
    }

    /// Offset of a slot by field name
    pub fn offset(&self, name: &str) -> Option<usize> {
        self.offsets.get(name).copied()
    }

    /// Total slot count
    pub fn size(&self) -> usize {
        self.size
    }
}

/// Runtime class descriptor
#[derive(Debug, Clone)]
pub struct RuntimeClass {
    /// Qualified name
    pub full_name: QualifiedTypeName,
    /// Parent class; `None` only for the root object class
    pub parent: Option<ClassRef>,
    /// Flags
    pub flags: ClassFlags,
    /// Primitive type code, `Class` for user types
    pub type_code: TypeCode,
    /// Declared fields
    pub fields: Vec<RuntimeField>,
    /// Declared methods
    pub methods: Vec<RuntimeMethod>,
    /// Attached aspects
    pub aspects: Vec<RuntimeAspect>,
    /// Runtime token
    pub token: RuntimeToken,
    /// Module that owns this descriptor
    pub owner: ModuleId,
    pub(crate) layout: Option<VTableLayout>,
}

impl RuntimeClass {
    /// Create an incomplete class with no members
    pub fn new(full_name: QualifiedTypeName, owner: ModuleId, token: RuntimeToken) -> Self {
        Self {
            full_name,
            parent: None,
            flags: ClassFlags::NOT_COMPLETED,
            type_code: TypeCode::Class,
            fields: Vec::new(),
            methods: Vec::new(),
            aspects: Vec::new(),
            token,
            owner,
            layout: None,
        }
    }

    /// Short name
    pub fn name(&self) -> &str {
        self.full_name.name()
    }

    /// Whether the class body was constructed
    pub fn is_completed(&self) -> bool {
        !self.flags.contains(ClassFlags::NOT_COMPLETED)
    }

    /// Field offsets, present once the vtable is initialized
    pub fn layout(&self) -> Option<&VTableLayout> {
        self.layout.as_ref()
    }

    /// Number of vtable slots an instance needs
    pub fn vtable_size(&self) -> usize {
        self.layout.as_ref().map_or(0, VTableLayout::size)
    }

    /// Find a declared field by short name
    pub fn find_field(&self, name: &str) -> Option<&RuntimeField> {
        self.fields.iter().find(|f| f.name.name() == name)
    }

    /// Find a declared method by name or signature name
    pub fn find_method(&self, name: &str) -> Option<(usize, &RuntimeMethod)> {
        self.methods
            .iter()
            .enumerate()
            .find(|(_, m)| &*m.name == name || &*m.signature == name)
    }
}
