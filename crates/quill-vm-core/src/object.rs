//! Heap objects
//!
//! An object is its class handle plus a vtable of slots sized to the
//! class's layout. GC flags and the liveness links live in the heap's
//! [`GcHeader`](quill_vm_gc::GcHeader) next to it.

use quill_vm_gc::{GcHeap, GcRef, GcTraceable};

use crate::class::ClassRef;
use crate::value::Value;

/// Name of the slot holding the scalar of a primitive object
pub const VALUE_FIELD: &str = "!!value";

/// Heap type used by a vault
pub type ObjectHeap = GcHeap<HeapObject>;

/// A collected object
#[derive(Debug, Clone)]
pub struct HeapObject {
    class: ClassRef,
    vtable: Box<[Value]>,
}

impl HeapObject {
    /// Create an object with `slots` empty slots
    pub fn new(class: ClassRef, slots: usize) -> Self {
        Self {
            class,
            vtable: vec![Value::Null; slots].into_boxed_slice(),
        }
    }

    /// Class of this object
    pub fn class(&self) -> ClassRef {
        self.class
    }

    /// Number of vtable slots
    pub fn vtable_size(&self) -> usize {
        self.vtable.len()
    }

    /// Read a slot
    pub fn slot(&self, offset: usize) -> Option<&Value> {
        self.vtable.get(offset)
    }

    /// Mutably borrow a slot
    pub fn slot_mut(&mut self, offset: usize) -> Option<&mut Value> {
        self.vtable.get_mut(offset)
    }
}

impl GcTraceable for HeapObject {
    fn trace(&self, tracer: &mut dyn FnMut(GcRef)) {
        for slot in self.vtable.iter() {
            slot.trace(tracer);
        }
    }
}
