//! # Quill FFI
//!
//! Native side of extern method linking.
//!
//! ## Design Principles
//!
//! - **Pluggable loader**: [`LibloadingLoader`] implements the kernel's
//!   `LibraryLoader` trait, so tests can swap in a counting fake
//! - **Builtins by signature**: every builtin is registered under
//!   `name(ArgType,...)` and found by the linker the same way
//! - **Faults stay on the frame**: a builtin that hits a fault throws it on the
//!   calling frame and returns no value

#![warn(clippy::all)]
#![warn(missing_docs)]

pub mod builtins;
pub mod call;
pub mod loader;

use quill_vm_core::NativeRegistry;

pub use call::{ExternFn, extern_fn};
pub use loader::LibloadingLoader;

/// Registry backed by the platform loader with every builtin installed
pub fn native_registry() -> NativeRegistry {
    let registry = NativeRegistry::new(LibloadingLoader);
    builtins::install(&registry);
    registry
}
