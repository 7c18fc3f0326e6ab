//! # Quill VM Core
//!
//! Runtime kernel for Quill: object model, module loading, aspects, native
//! linking and call frames.
//!
//! ## Design Principles
//!
//! - **Handles, not pointers**: objects are [`ObjectRef`]s into the collected heap,
//!   classes and frames are handles into owner-scoped immortal arenas
//! - **Two-pass loading**: class bodies are captured first and built after every
//!   referenced type resolves
//! - **Explicit injection**: the [`NativeRegistry`] and the [`ModuleResolver`] are
//!   passed in, never global
//! - **One owner**: a [`Vault`] is `Send` and driven by one thread at a time

#![warn(clippy::all)]
#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod array;
pub mod aspect;
pub mod class;
pub mod error;
pub mod ffi;
pub mod field;
pub mod flags;
pub mod frame;
pub mod loader;
pub mod marshal;
pub mod method;
pub mod module;
pub mod names;
pub mod object;
pub mod resolver;
pub mod token;
pub mod types;
pub mod value;
pub mod vault;
pub mod version;
mod vtable;

pub use aspect::{AspectArgument, AspectTarget, RuntimeAspect};
pub use class::{ClassRef, ModuleId, RuntimeClass, RuntimeToken, TypeRef};
pub use error::{ErrorCode, FaultKind, VmError, VmResult};
pub use ffi::{
    FfiError, LibraryLoader, MAX_NATIVE_ARGS, NativeArgs, NativeContext, NativeFn,
    NativeLibraryHandle, NativeRegistry, NativeSymbol,
};
pub use field::RuntimeField;
pub use flags::{ClassFlags, FieldFlags, MethodFlags};
pub use frame::{CallFrame, FrameId, FrameMethod, HandlerSearch};
pub use marshal::FromValue;
pub use method::{MethodRef, NativeBinding, RuntimeMethod};
pub use module::{ConstStorage, Module};
pub use names::{FieldName, QualifiedTypeName};
pub use resolver::{ModuleResolver, ModuleSearcher};
pub use types::CoreTypes;
pub use value::{ObjectRef, Value};
pub use vault::{DisposeReport, Vault, VaultConfig};
pub use version::Version;
