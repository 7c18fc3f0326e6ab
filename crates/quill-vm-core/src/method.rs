//! Method descriptors and decoded method headers

use std::fmt;
use std::sync::Arc;

use quill_vm_bytecode::LabelEntry;

use crate::aspect::RuntimeAspect;
use crate::class::{ClassRef, TypeRef};
use crate::error::ErrorCode;
use crate::ffi::{NativeFn, NativeImportEntity};
use crate::flags::MethodFlags;

/// Handle to a method: owning class plus index in its method table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MethodRef {
    /// Owning class
    pub class: ClassRef,
    /// Index into the class's method table
    pub index: u32,
}

/// Method argument
#[derive(Debug, Clone)]
pub struct MethodArgument {
    /// Argument name
    pub name: Arc<str>,
    /// Argument type
    pub ty: TypeRef,
}

/// Exception region with resolved catch types
#[derive(Debug, Clone, Default)]
pub struct ProtectedZone {
    /// First covered instruction address
    pub start_address: i32,
    /// Label ending the try block
    pub try_end_label: i32,
    /// Address after the last handler
    pub end_address: i32,
    /// Filter entry addresses
    pub filter_addresses: Vec<i32>,
    /// Catch entry addresses
    pub catch_addresses: Vec<i32>,
    /// Caught classes; `None` catches everything
    pub catch_types: Vec<Option<ClassRef>>,
    /// Handler kinds
    pub kinds: Vec<u8>,
}

impl ProtectedZone {
    /// Whether `ip` lies inside the zone
    pub fn covers(&self, ip: u32) -> bool {
        let ip = ip as i64;
        ip >= self.start_address as i64 && ip < self.end_address as i64
    }
}

/// Decoded method body
#[derive(Debug, Clone, Default)]
pub struct MethodHeader {
    /// Instruction words
    pub code: Vec<u32>,
    /// Maximum evaluation stack depth
    pub max_stack: u8,
    /// Number of locals
    pub locals: u8,
    /// Label table
    pub labels: Vec<i32>,
    /// Label map
    pub label_map: Vec<LabelEntry>,
    /// Exception regions
    pub zones: Vec<ProtectedZone>,
}

/// How an extern method is bound
#[derive(Clone)]
pub enum NativeBinding {
    /// Internal builtin
    Builtin {
        /// Builtin key it was resolved by
        key: String,
        /// Entry point
        function: NativeFn,
    },
    /// Symbol from an external library
    Import(NativeImportEntity),
    /// Linking failed; calling the method is a fatal condition
    Unavailable {
        /// Reason code reported when the method is called
        code: ErrorCode,
        /// Diagnostic naming the library or symbol
        reason: String,
    },
}

impl fmt::Debug for NativeBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Builtin { key, .. } => f.debug_struct("Builtin").field("key", key).finish(),
            Self::Import(entity) => f.debug_tuple("Import").field(entity).finish(),
            Self::Unavailable { code, reason } => f
                .debug_struct("Unavailable")
                .field("code", code)
                .field("reason", reason)
                .finish(),
        }
    }
}

/// Runtime method descriptor
#[derive(Debug, Clone)]
pub struct RuntimeMethod {
    /// Plain name
    pub name: Arc<str>,
    /// `name(ArgType,...)`
    pub signature: Arc<str>,
    /// Flags
    pub flags: MethodFlags,
    /// Return type
    pub return_type: TypeRef,
    /// Arguments
    pub arguments: Vec<MethodArgument>,
    /// Decoded body; `None` for extern and abstract methods
    pub header: Option<MethodHeader>,
    /// Attached aspects
    pub aspects: Vec<RuntimeAspect>,
    /// Native binding of an extern method, set by the linker
    pub native: Option<NativeBinding>,
}

impl RuntimeMethod {
    /// Whether the method is implemented natively
    pub fn is_extern(&self) -> bool {
        self.flags.contains(MethodFlags::EXTERN)
    }

    /// Whether the method has no receiver
    pub fn is_static(&self) -> bool {
        self.flags.contains(MethodFlags::STATIC)
    }
}
