//! Boxing and value conversion
//!
//! `FromValue` turns a slot value into a Rust type; the `From` impls on
//! [`Value`] go the other way. Boxing wraps a scalar into an object of the
//! matching predefined class by writing its `!!value` slot.

use std::sync::Arc;

use crate::error::{FaultKind, VmError, VmResult};
use crate::object::VALUE_FIELD;
use crate::value::{ObjectRef, Value};
use crate::vault::Vault;

/// Convert a slot value into a Rust type
pub trait FromValue: Sized {
    /// Convert, faulting with `TypeMismatch` when the value has the wrong type
    fn from_value(value: &Value) -> VmResult<Self>;
}

fn mismatch(expected: &str, value: &Value) -> VmError {
    VmError::fault(
        FaultKind::TypeMismatch,
        format!("Expected {expected}, found {:?}", value.type_code()),
    )
}

impl FromValue for i32 {
    fn from_value(value: &Value) -> VmResult<Self> {
        match *value {
            Value::I8(v) => Ok(v.into()),
            Value::U8(v) => Ok(v.into()),
            Value::I16(v) => Ok(v.into()),
            Value::U16(v) => Ok(v.into()),
            Value::I32(v) => Ok(v),
            Value::Char(c) => Ok(c as i32),
            _ => Err(mismatch("Int32", value)),
        }
    }
}

impl FromValue for i64 {
    fn from_value(value: &Value) -> VmResult<Self> {
        match *value {
            Value::U32(v) => Ok(v.into()),
            Value::I64(v) => Ok(v),
            Value::U64(v) => i64::try_from(v).map_err(|_| {
                VmError::fault(FaultKind::OutOfRange, format!("{v} does not fit in Int64"))
            }),
            _ => i32::from_value(value)
                .map(i64::from)
                .map_err(|_| mismatch("Int64", value)),
        }
    }
}

impl FromValue for bool {
    fn from_value(value: &Value) -> VmResult<Self> {
        match *value {
            Value::Bool(b) => Ok(b),
            _ => Err(mismatch("Boolean", value)),
        }
    }
}

impl FromValue for f64 {
    fn from_value(value: &Value) -> VmResult<Self> {
        match *value {
            Value::F32(v) => Ok(v.into()),
            Value::F64(v) => Ok(v),
            _ => i64::from_value(value)
                .map(|v| v as f64)
                .map_err(|_| mismatch("Double", value)),
        }
    }
}

impl FromValue for Arc<str> {
    fn from_value(value: &Value) -> VmResult<Self> {
        match value {
            Value::Str(s) => Ok(s.clone()),
            _ => Err(mismatch("String", value)),
        }
    }
}

impl Vault {
    /// Box a scalar into a fresh object of its predefined class
    ///
    /// An object value is returned as is.
    pub fn box_value(&mut self, value: Value) -> VmResult<ObjectRef> {
        if let Value::Object(object) = value {
            return Ok(object);
        }
        let class = self.types.for_type_code(value.type_code()).ok_or_else(|| {
            VmError::fault(
                FaultKind::TypeMismatch,
                format!("Cannot box a {:?} value", value.type_code()),
            )
        })?;
        let offset = self.field_offset(class, VALUE_FIELD)?;
        let object = self.allocate(class)?;
        self.set_slot(object, offset, value)?;
        Ok(object)
    }

    /// Copy the scalar out of a primitive object
    pub fn unbox(&self, object: ObjectRef) -> VmResult<Value> {
        let class = self.class_of(object)?;
        let offset = self.field_offset(class, VALUE_FIELD).map_err(|_| {
            VmError::fault(
                FaultKind::TypeMismatch,
                format!("'{}' is not a primitive class", self.class_name(class)),
            )
        })?;
        Ok(self.slot(object, offset)?.clone())
    }

    /// Unbox and convert
    pub fn unbox_as<T: FromValue>(&self, object: ObjectRef) -> VmResult<T> {
        T::from_value(&self.unbox(object)?)
    }

    /// Unbox an `Int32`-compatible object
    pub fn to_i32(&self, object: ObjectRef) -> VmResult<i32> {
        self.unbox_as(object)
    }

    /// Unbox an integer object as `Int64`
    pub fn to_i64(&self, object: ObjectRef) -> VmResult<i64> {
        self.unbox_as(object)
    }

    /// Unbox a `Boolean` object
    pub fn to_bool(&self, object: ObjectRef) -> VmResult<bool> {
        self.unbox_as(object)
    }

    /// Unbox a numeric object as `Double`
    pub fn to_f64(&self, object: ObjectRef) -> VmResult<f64> {
        self.unbox_as(object)
    }

    /// Unbox a `String` object
    pub fn to_str(&self, object: ObjectRef) -> VmResult<Arc<str>> {
        self.unbox_as(object)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integer_widening() {
        assert_eq!(i32::from_value(&Value::U16(7)).unwrap(), 7);
        assert_eq!(i64::from_value(&Value::I32(-3)).unwrap(), -3);
        assert_eq!(f64::from_value(&Value::I64(2)).unwrap(), 2.0);
    }

    #[test]
    fn test_mismatch_is_fault() {
        let err = bool::from_value(&Value::I32(1)).unwrap_err();
        assert!(matches!(
            err,
            VmError::Fault {
                kind: FaultKind::TypeMismatch,
                ..
            }
        ));
        assert!(i32::from_value(&Value::I64(1)).is_err());
    }

    #[test]
    fn test_u64_overflow_is_out_of_range() {
        let err = i64::from_value(&Value::U64(u64::MAX)).unwrap_err();
        assert!(matches!(
            err,
            VmError::Fault {
                kind: FaultKind::OutOfRange,
                ..
            }
        ));
    }
}
