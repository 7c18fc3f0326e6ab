//! Arrays
//!
//! An array is an instance of the predefined `Array` class. Its element
//! storage lives in the `!!value` slot; size, rank, block size and the
//! element class token sit in the other reserved slots. Primitive elements
//! are stored unboxed.

use quill_vm_gc::SLOT_SIZE;

use crate::class::ClassRef;
use crate::error::{FaultKind, VmError, VmResult};
use crate::object::VALUE_FIELD;
use crate::types::{ARRAY_BLOCK_FIELD, ARRAY_CLASS_FIELD, ARRAY_RANK_FIELD, ARRAY_SIZE_FIELD};
use crate::value::{ObjectRef, Value};
use crate::vault::Vault;

impl Vault {
    /// Allocate a one-dimensional array of `size` null elements
    pub fn new_array(&mut self, element: ClassRef, size: usize) -> VmResult<ObjectRef> {
        let token = self.class_or_corrupt(element)?.token;
        let array = self.types.array;
        let storage = self.field_offset(array, VALUE_FIELD)?;
        let block = self.field_offset(array, ARRAY_BLOCK_FIELD)?;
        let len = self.field_offset(array, ARRAY_SIZE_FIELD)?;
        let rank = self.field_offset(array, ARRAY_RANK_FIELD)?;
        let class = self.field_offset(array, ARRAY_CLASS_FIELD)?;

        let object = self.allocate_sized(array, size)?;
        self.set_slot(object, storage, Value::Elements(vec![Value::Null; size]))?;
        self.set_slot(object, block, Value::U64(SLOT_SIZE as u64))?;
        self.set_slot(object, len, Value::U64(size as u64))?;
        self.set_slot(object, rank, Value::U64(1))?;
        self.set_slot(object, class, Value::Token(token))?;
        tracing::trace!(size, element = %self.class_name(element), "array allocated");
        Ok(object)
    }

    fn ensure_array(&self, object: ObjectRef) -> VmResult<()> {
        let class = self.class_of(object)?;
        if class != self.types.array {
            return Err(VmError::fault(
                FaultKind::TypeMismatch,
                format!("'{}' is not an array", self.class_name(class)),
            ));
        }
        Ok(())
    }

    fn array_u64(&self, object: ObjectRef, field: &str) -> VmResult<u64> {
        self.ensure_array(object)?;
        match self.get_field(object, field)? {
            Value::U64(v) => Ok(*v),
            other => Err(VmError::state_corrupt(format!(
                "Array slot '{field}' holds {other:?}"
            ))),
        }
    }

    /// Number of elements
    pub fn array_len(&self, array: ObjectRef) -> VmResult<usize> {
        Ok(self.array_u64(array, ARRAY_SIZE_FIELD)? as usize)
    }

    /// Number of dimensions
    pub fn array_rank(&self, array: ObjectRef) -> VmResult<u64> {
        self.array_u64(array, ARRAY_RANK_FIELD)
    }

    /// Element class of an array
    pub fn array_element_class(&self, array: ObjectRef) -> VmResult<ClassRef> {
        self.ensure_array(array)?;
        match self.get_field(array, ARRAY_CLASS_FIELD)? {
            Value::Token(token) => self.find_type_by_token(*token).ok_or_else(|| {
                VmError::state_corrupt(format!("Array element class {token:?} is gone"))
            }),
            other => Err(VmError::state_corrupt(format!(
                "Array class slot holds {other:?}"
            ))),
        }
    }

    fn checked_index(&self, array: ObjectRef, index: i64) -> VmResult<usize> {
        let len = self.array_len(array)?;
        match usize::try_from(index) {
            Ok(i) if i < len => Ok(i),
            _ => Err(VmError::fault(
                FaultKind::OutOfRange,
                format!("Index {index} out of range for length {len}"),
            )),
        }
    }

    fn elements(&self, array: ObjectRef) -> VmResult<&[Value]> {
        match self.get_field(array, VALUE_FIELD)? {
            Value::Elements(items) => Ok(items),
            other => Err(VmError::state_corrupt(format!(
                "Array storage holds {other:?}"
            ))),
        }
    }

    /// Read an element
    ///
    /// Primitive elements come back boxed in a fresh object of the element
    /// class; reference elements return the stored handle. A null element is
    /// `None`.
    pub fn array_get(&mut self, array: ObjectRef, index: i64) -> VmResult<Option<ObjectRef>> {
        let at = self.checked_index(array, index)?;
        let value = self.elements(array)?.get(at).cloned().unwrap_or_default();
        match value {
            Value::Null => Ok(None),
            Value::Object(object) => Ok(Some(object)),
            scalar => {
                let element = self.array_element_class(array)?;
                let offset = self.field_offset(element, VALUE_FIELD)?;
                let boxed = self.allocate(element)?;
                self.set_slot(boxed, offset, scalar)?;
                Ok(Some(boxed))
            }
        }
    }

    /// Write an element
    ///
    /// The value's class must be the element class or inherit from it.
    pub fn array_set(
        &mut self,
        array: ObjectRef,
        index: i64,
        value: Option<ObjectRef>,
    ) -> VmResult<()> {
        let at = self.checked_index(array, index)?;
        let element = self.array_element_class(array)?;
        let stored = match value {
            None => Value::Null,
            Some(object) => {
                let class = self.class_of(object)?;
                if !self.is_assignable(class, element) {
                    return Err(VmError::fault(
                        FaultKind::TypeMismatch,
                        format!(
                            "Cannot store '{}' in an array of '{}'",
                            self.class_name(class),
                            self.class_name(element)
                        ),
                    ));
                }
                if self.class_or_corrupt(element)?.type_code.is_primitive() {
                    self.unbox(object)?
                } else {
                    Value::Object(object)
                }
            }
        };

        let offset = self.field_offset(self.types.array, VALUE_FIELD)?;
        let slot = self
            .heap
            .get_mut(array)
            .and_then(|obj| obj.slot_mut(offset))
            .ok_or_else(|| VmError::fault(FaultKind::NullPointer, format!("{array:?} is not alive")))?;
        match slot {
            Value::Elements(items) => match items.get_mut(at) {
                Some(item) => {
                    *item = stored;
                    Ok(())
                }
                None => Err(VmError::state_corrupt("Array storage shorter than its size")),
            },
            other => Err(VmError::state_corrupt(format!(
                "Array storage holds {other:?}"
            ))),
        }
    }
}
