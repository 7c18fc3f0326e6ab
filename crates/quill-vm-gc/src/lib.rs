//! # Quill VM Garbage Collector
//!
//! Handle-based heap for the Quill runtime.
//!
//! ## Design
//!
//! - **Generation-checked handles**: objects are addressed by [`GcRef`] (index + generation),
//!   a stale handle simply fails to dereference
//! - **Collected region**: mark/sweep over an intrusive liveness list threaded through headers
//! - **Immortal objects**: flagged in the header, never swept, always treated as roots
//! - **Immortal arenas**: [`ImmortalArena`] backs structural metadata whose lifetime is
//!   scoped by an owner id rather than by reachability

#![warn(clippy::all)]
#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod arena;
pub mod error;
pub mod heap;
pub mod mark_sweep;
pub mod object;

pub use arena::{Handle, ImmortalArena};
pub use error::{GcError, Result};
pub use heap::{GcConfig, GcHeap, GcStats};
pub use object::{GcHeader, GcRef, GcTraceable, MarkColor};

/// Size of a single vtable slot in bytes, used for allocation accounting
pub const SLOT_SIZE: usize = 8;
