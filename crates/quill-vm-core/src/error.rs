//! VM error types

use std::fmt;

use quill_vm_gc::GcError;
use thiserror::Error;

/// Reason codes for fatal process conditions
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// Module header malformed or format version mismatch
    AssemblyCouldNotLoad = 1,
    /// Required method (entry point) missing
    MissingMethod = 2,
    /// Required field missing
    MissingField = 3,
    /// Heap exhausted
    OutOfMemory = 4,
    /// Native library failed to load
    NativeLibraryCouldNotLoad = 5,
    /// Native symbol missing from a loaded library
    NativeLibrarySymbolCouldNotFound = 6,
    /// Internal invariant broken
    StateCorrupt = 7,
    /// Type metadata is unusable
    TypeLoad = 8,
}

impl ErrorCode {
    /// Stable identifier used in diagnostics
    pub fn as_str(self) -> &'static str {
        match self {
            Self::AssemblyCouldNotLoad => "ASSEMBLY_COULD_NOT_LOAD",
            Self::MissingMethod => "MISSING_METHOD",
            Self::MissingField => "MISSING_FIELD",
            Self::OutOfMemory => "OUT_OF_MEMORY",
            Self::NativeLibraryCouldNotLoad => "NATIVE_LIBRARY_COULD_NOT_LOAD",
            Self::NativeLibrarySymbolCouldNotFound => "NATIVE_LIBRARY_SYMBOL_COULD_NOT_FOUND",
            Self::StateCorrupt => "STATE_CORRUPT",
            Self::TypeLoad => "TYPE_LOAD",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Language-level fault kinds, each backed by a predefined exception class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaultKind {
    /// Dereference of null
    NullPointer,
    /// Index outside the valid range
    OutOfRange,
    /// Value of the wrong class
    TypeMismatch,
    /// Generic exception
    Exception,
}

/// VM errors
#[derive(Debug, Error)]
pub enum VmError {
    /// Unrecoverable condition; the process is expected to stop
    #[error("[{code}] {message}")]
    Fatal {
        /// Reason code
        code: ErrorCode,
        /// Diagnostic message
        message: String,
    },

    /// Qualified type name did not resolve
    #[error("Type '{name}' not found (searched from module '{module}')")]
    TypeNotFound {
        /// Qualified type name
        name: String,
        /// Module doing the lookup
        module: String,
    },

    /// Type-name table index missing
    #[error("Type name index {index} not found in module '{module}'")]
    TypeNameNotFound {
        /// Table index
        index: i32,
        /// Module doing the lookup
        module: String,
    },

    /// Field-name table index missing
    #[error("Field name index {index} not found in module '{module}'")]
    FieldNameNotFound {
        /// Table index
        index: i32,
        /// Module doing the lookup
        module: String,
    },

    /// String table index missing
    #[error("String index {index} not found in module '{module}'")]
    StringNotFound {
        /// Table index
        index: i32,
        /// Module doing the lookup
        module: String,
    },

    /// Generics table key missing
    #[error("Generic parameter {index} not found in module '{module}'")]
    GenericNotFound {
        /// Table key
        index: i32,
        /// Module doing the lookup
        module: String,
    },

    /// Dependency could not be supplied by the resolver
    #[error("Dependency '{name}@{version}' of module '{module}' not found: {reason}")]
    DependencyNotFound {
        /// Dependency name
        name: String,
        /// Requested version
        version: String,
        /// Module declaring the dependency
        module: String,
        /// Resolver diagnostic
        reason: String,
    },

    /// Module requested again while it is still being loaded
    #[error("Dependency cycle detected while loading '{0}'")]
    DependencyCycle(String),

    /// Aspect targets a class that was never resolved
    #[error("Class '{0}' is unresolved")]
    UnresolvedClass(String),

    /// Language-level fault detected by a kernel operation
    #[error("{kind:?}: {message}")]
    Fault {
        /// Fault kind
        kind: FaultKind,
        /// Description
        message: String,
    },

    /// Heap error
    #[error(transparent)]
    Gc(#[from] GcError),

    /// IO error while locating modules
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl VmError {
    /// Create a fatal error
    pub fn fatal(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Fatal {
            code,
            message: message.into(),
        }
    }

    /// Create a language-level fault
    pub fn fault(kind: FaultKind, message: impl Into<String>) -> Self {
        Self::Fault {
            kind,
            message: message.into(),
        }
    }

    /// Create a state-corrupt fatal error
    pub fn state_corrupt(message: impl Into<String>) -> Self {
        Self::fatal(ErrorCode::StateCorrupt, message)
    }

    /// Reason code when this error is fatal
    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            Self::Fatal { code, .. } => Some(*code),
            Self::Gc(GcError::OutOfMemory { .. }) => Some(ErrorCode::OutOfMemory),
            _ => None,
        }
    }

    /// Whether this error belongs to the type-load category
    pub fn is_type_load(&self) -> bool {
        matches!(
            self,
            Self::TypeNotFound { .. }
                | Self::TypeNameNotFound { .. }
                | Self::FieldNameNotFound { .. }
                | Self::StringNotFound { .. }
                | Self::GenericNotFound { .. }
                | Self::DependencyNotFound { .. }
                | Self::DependencyCycle(_)
                | Self::UnresolvedClass(_)
                | Self::Fatal {
                    code: ErrorCode::TypeLoad,
                    ..
                }
        )
    }
}

/// Result type for VM operations
pub type VmResult<T> = std::result::Result<T, VmError>;
