//! Slot values
//!
//! Every vtable slot, argument slot and evaluation-stack entry holds a
//! [`Value`]. Scalars are stored inline; objects are referenced by handle.

use std::sync::Arc;

use quill_vm_bytecode::{ConstantValue, TypeCode};
use quill_vm_gc::GcRef;

use crate::class::RuntimeToken;

/// Handle to a collected object
pub type ObjectRef = GcRef;

/// A slot value
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    /// Empty slot / null reference
    #[default]
    Null,
    /// Boolean
    Bool(bool),
    /// Character
    Char(char),
    /// Signed 8-bit
    I8(i8),
    /// Unsigned 8-bit
    U8(u8),
    /// Signed 16-bit
    I16(i16),
    /// Unsigned 16-bit
    U16(u16),
    /// Signed 32-bit
    I32(i32),
    /// Unsigned 32-bit
    U32(u32),
    /// Signed 64-bit
    I64(i64),
    /// Unsigned 64-bit
    U64(u64),
    /// Single precision
    F32(f32),
    /// Double precision
    F64(f64),
    /// Immutable string
    Str(Arc<str>),
    /// Object handle
    Object(ObjectRef),
    /// Native address
    Raw(usize),
    /// Class identity stored as its runtime token
    Token(RuntimeToken),
    /// Array element storage
    Elements(Vec<Value>),
}

impl Value {
    /// Type code of the scalar carried by this value
    pub fn type_code(&self) -> TypeCode {
        match self {
            Self::Null => TypeCode::None,
            Self::Bool(_) => TypeCode::Boolean,
            Self::Char(_) => TypeCode::Char,
            Self::I8(_) => TypeCode::I1,
            Self::U8(_) => TypeCode::U1,
            Self::I16(_) => TypeCode::I2,
            Self::U16(_) => TypeCode::U2,
            Self::I32(_) => TypeCode::I4,
            Self::U32(_) => TypeCode::U4,
            Self::I64(_) => TypeCode::I8,
            Self::U64(_) => TypeCode::U8,
            Self::F32(_) => TypeCode::R4,
            Self::F64(_) => TypeCode::R8,
            Self::Str(_) => TypeCode::String,
            Self::Object(_) => TypeCode::Class,
            Self::Raw(_) => TypeCode::Raw,
            Self::Token(_) => TypeCode::Token,
            Self::Elements(_) => TypeCode::Array,
        }
    }

    /// Object handle, if this slot references one
    pub fn as_object(&self) -> Option<ObjectRef> {
        match self {
            Self::Object(r) => Some(*r),
            _ => None,
        }
    }

    /// Whether the slot is empty
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Report every object handle held by this value
    pub fn trace(&self, tracer: &mut dyn FnMut(ObjectRef)) {
        match self {
            Self::Object(r) => tracer(*r),
            Self::Elements(items) => items.iter().for_each(|v| v.trace(tracer)),
            _ => {}
        }
    }
}

impl From<ConstantValue> for Value {
    fn from(value: ConstantValue) -> Self {
        match value {
            ConstantValue::Null => Self::Null,
            ConstantValue::Bool(v) => Self::Bool(v),
            ConstantValue::Char(v) => Self::Char(v),
            ConstantValue::I8(v) => Self::I8(v),
            ConstantValue::U8(v) => Self::U8(v),
            ConstantValue::I16(v) => Self::I16(v),
            ConstantValue::U16(v) => Self::U16(v),
            ConstantValue::I32(v) => Self::I32(v),
            ConstantValue::U32(v) => Self::U32(v),
            ConstantValue::I64(v) => Self::I64(v),
            ConstantValue::U64(v) => Self::U64(v),
            ConstantValue::F32(v) => Self::F32(v),
            ConstantValue::F64(v) => Self::F64(v),
            ConstantValue::String(v) => Self::Str(v.into()),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Str(s.into())
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::I32(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::I64(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}
