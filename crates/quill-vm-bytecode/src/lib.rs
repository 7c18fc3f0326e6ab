//! # Quill VM Bytecode
//!
//! Structural codec for the Quill binary module format.
//!
//! ## Design Principles
//!
//! - **Sequential**: sections are read strictly in order, each prefixed by a count
//! - **Structural only**: names stay as table indices, nothing is resolved here
//! - **Deferred method bodies**: class bodies keep method blocks as raw bytes so the
//!   loader can decode them after type resolution
//! - **Symmetric**: every section has a writer so tools and tests can build images

#![warn(clippy::all)]
#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod class;
pub mod constant;
pub mod error;
pub mod image;
pub mod method;
pub mod reader;
pub mod writer;

pub use class::{ClassBody, ComplexType, FieldDecl};
pub use constant::{ConstEntry, ConstStorageImage, ConstantValue, TypeCode};
pub use error::BytecodeError;
pub use image::{
    AliasEntry, AliasTarget, DependencyEntry, FieldNameEntry, GenericConstraint,
    GenericConstraintKind, GenericEntry, ModuleImage, TypeNameEntry,
};
pub use method::{ArgumentDecl, IlBody, LabelEntry, MethodBody, ProtectedZone};
pub use reader::ByteReader;
pub use writer::ByteWriter;

/// Module format version, checked in the header
pub const FORMAT_VERSION: i32 = 13;

/// Two-byte sentinel that opens the protected-zone trailer of a method body
pub const PROTECTED_ZONE_MAGIC: i16 = -0xFF1;
