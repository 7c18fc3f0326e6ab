//! GC object header and handles

use std::fmt;

/// Tri-color marking state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MarkColor {
    /// Not yet visited, candidate for reclamation
    #[default]
    White,
    /// Discovered, children not yet traced
    Gray,
    /// Fully traced
    Black,
}

/// Handle to an object in a [`GcHeap`](crate::GcHeap)
///
/// A handle stays valid until its slot is freed. After that the slot's
/// generation moves on and every lookup through the old handle yields `None`.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct GcRef {
    pub(crate) index: u32,
    pub(crate) generation: u32,
}

impl GcRef {
    /// Slot index inside the heap
    pub fn index(self) -> u32 {
        self.index
    }

    /// Generation of the slot when this handle was issued
    pub fn generation(self) -> u32 {
        self.generation
    }
}

impl fmt::Debug for GcRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GcRef({}v{})", self.index, self.generation)
    }
}

/// Header stored in front of every heap value
#[derive(Debug, Clone)]
pub struct GcHeader {
    mark: MarkColor,
    immortal: bool,
    size: usize,
    pub(crate) prev: Option<u32>,
    pub(crate) next: Option<u32>,
}

impl GcHeader {
    pub(crate) fn new(size: usize, immortal: bool) -> Self {
        Self {
            mark: MarkColor::White,
            immortal,
            size,
            prev: None,
            next: None,
        }
    }

    /// Current mark color
    pub fn mark(&self) -> MarkColor {
        self.mark
    }

    pub(crate) fn set_mark(&mut self, color: MarkColor) {
        self.mark = color;
    }

    /// Whether the object is excluded from collection
    pub fn is_immortal(&self) -> bool {
        self.immortal
    }

    /// Payload bytes requested for this object
    pub fn size(&self) -> usize {
        self.size
    }
}

/// Values stored on the heap report the handles they keep alive
pub trait GcTraceable {
    /// Call `tracer` for every object handle reachable from this value
    fn trace(&self, tracer: &mut dyn FnMut(GcRef));
}
