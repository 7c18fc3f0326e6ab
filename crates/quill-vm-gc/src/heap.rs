//! GC Heap management

use crate::error::{GcError, Result};
use crate::object::{GcHeader, GcRef, GcTraceable};

/// GC configuration
#[derive(Debug, Clone)]
pub struct GcConfig {
    /// Hard limit on alive payload bytes (default: 256MB)
    pub max_bytes: usize,
    /// Alive bytes after which a collection is suggested (default: 1MB)
    pub gc_threshold: usize,
    /// Verify on shutdown that only sentinel objects survived
    pub check_memory_leak: bool,
}

impl Default for GcConfig {
    fn default() -> Self {
        Self {
            max_bytes: 256 * 1024 * 1024, // 256MB
            gc_threshold: 1024 * 1024,    // 1MB
            check_memory_leak: false,
        }
    }
}

/// Heap counters
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct GcStats {
    /// Objects currently alive (collected and immortal)
    pub alive_objects: usize,
    /// Payload bytes currently alive
    pub alive_bytes: usize,
    /// Number of allocations ever made
    pub total_allocations: usize,
    /// Number of objects ever freed
    pub total_frees: usize,
    /// Payload bytes ever requested
    pub total_bytes_requested: usize,
    /// Number of collections
    pub collections: usize,
    /// Objects reclaimed in the last collection
    pub last_reclaimed: usize,
}

struct Entry<T> {
    header: GcHeader,
    value: T,
}

struct Slot<T> {
    generation: u32,
    entry: Option<Entry<T>>,
    next_free: Option<u32>,
}

/// Heap of generation-checked slots
///
/// Every live object is linked into a doubly linked liveness list (`head` to
/// `tail`) through its header. Only the heap touches those links.
pub struct GcHeap<T> {
    config: GcConfig,
    slots: Vec<Slot<T>>,
    free_head: Option<u32>,
    head: Option<u32>,
    tail: Option<u32>,
    pub(crate) stats: GcStats,
}

impl<T: GcTraceable> Default for GcHeap<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: GcTraceable> GcHeap<T> {
    /// Create new heap with default config
    pub fn new() -> Self {
        Self::with_config(GcConfig::default())
    }

    /// Create new heap with custom config
    pub fn with_config(config: GcConfig) -> Self {
        Self {
            config,
            slots: Vec::new(),
            free_head: None,
            head: None,
            tail: None,
            stats: GcStats::default(),
        }
    }

    /// Heap configuration
    pub fn config(&self) -> &GcConfig {
        &self.config
    }

    /// Allocate a collected object with a payload of `size` bytes
    pub fn allocate(&mut self, value: T, size: usize) -> Result<GcRef> {
        self.insert(value, size, false)
    }

    /// Allocate an object that is never swept and always acts as a root
    pub fn allocate_immortal(&mut self, value: T, size: usize) -> Result<GcRef> {
        self.insert(value, size, true)
    }

    fn insert(&mut self, value: T, size: usize, immortal: bool) -> Result<GcRef> {
        let alive = self.stats.alive_bytes;
        if alive.saturating_add(size) > self.config.max_bytes {
            return Err(GcError::OutOfMemory {
                requested: size,
                alive,
                limit: self.config.max_bytes,
            });
        }

        let index = match self.free_head {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                self.free_head = slot.next_free.take();
                index
            }
            None => {
                let index = u32::try_from(self.slots.len()).map_err(|_| GcError::OutOfMemory {
                    requested: size,
                    alive,
                    limit: self.config.max_bytes,
                })?;
                self.slots.push(Slot {
                    generation: 0,
                    entry: None,
                    next_free: None,
                });
                index
            }
        };

        let mut header = GcHeader::new(size, immortal);
        header.prev = self.tail;
        if let Some(tail) = self.tail {
            if let Some(entry) = self.slots[tail as usize].entry.as_mut() {
                entry.header.next = Some(index);
            }
        } else {
            self.head = Some(index);
        }
        self.tail = Some(index);

        let slot = &mut self.slots[index as usize];
        slot.entry = Some(Entry { header, value });

        self.stats.alive_objects += 1;
        self.stats.alive_bytes += size;
        self.stats.total_allocations += 1;
        self.stats.total_bytes_requested += size;

        #[cfg(feature = "gc_logging")]
        tracing::trace!(index, size, immortal, "gc: allocated");

        Ok(GcRef {
            index,
            generation: slot.generation,
        })
    }

    fn entry(&self, r: GcRef) -> Option<&Entry<T>> {
        let slot = self.slots.get(r.index as usize)?;
        if slot.generation != r.generation {
            return None;
        }
        slot.entry.as_ref()
    }

    fn entry_mut(&mut self, r: GcRef) -> Option<&mut Entry<T>> {
        let slot = self.slots.get_mut(r.index as usize)?;
        if slot.generation != r.generation {
            return None;
        }
        slot.entry.as_mut()
    }

    /// Borrow the value behind a handle
    pub fn get(&self, r: GcRef) -> Option<&T> {
        self.entry(r).map(|e| &e.value)
    }

    /// Mutably borrow the value behind a handle
    pub fn get_mut(&mut self, r: GcRef) -> Option<&mut T> {
        self.entry_mut(r).map(|e| &mut e.value)
    }

    /// Header of a live object
    pub fn header(&self, r: GcRef) -> Option<&GcHeader> {
        self.entry(r).map(|e| &e.header)
    }

    pub(crate) fn header_mut(&mut self, r: GcRef) -> Option<&mut GcHeader> {
        self.entry_mut(r).map(|e| &mut e.header)
    }

    /// Whether the handle still refers to a live object
    pub fn contains(&self, r: GcRef) -> bool {
        self.entry(r).is_some()
    }

    /// Free a single object, immortal or not
    pub fn free(&mut self, r: GcRef) -> Result<T> {
        if self.entry(r).is_none() {
            return Err(GcError::StaleHandle(r));
        }
        self.remove(r.index).ok_or(GcError::StaleHandle(r))
    }

    pub(crate) fn remove(&mut self, index: u32) -> Option<T> {
        let slot = self.slots.get_mut(index as usize)?;
        let entry = slot.entry.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        slot.next_free = self.free_head;
        self.free_head = Some(index);

        let (prev, next) = (entry.header.prev, entry.header.next);
        match prev {
            Some(p) => {
                if let Some(e) = self.slots[p as usize].entry.as_mut() {
                    e.header.next = next;
                }
            }
            None => self.head = next,
        }
        match next {
            Some(n) => {
                if let Some(e) = self.slots[n as usize].entry.as_mut() {
                    e.header.prev = prev;
                }
            }
            None => self.tail = prev,
        }

        self.stats.alive_objects -= 1;
        self.stats.alive_bytes -= entry.header.size();
        self.stats.total_frees += 1;
        Some(entry.value)
    }

    /// Handles of all live objects in allocation order
    pub fn handles(&self) -> Vec<GcRef> {
        let mut out = Vec::with_capacity(self.stats.alive_objects);
        let mut cursor = self.head;
        while let Some(index) = cursor {
            let slot = &self.slots[index as usize];
            match slot.entry.as_ref() {
                Some(entry) => {
                    out.push(GcRef {
                        index,
                        generation: slot.generation,
                    });
                    cursor = entry.header.next;
                }
                None => break,
            }
        }
        out
    }

    /// Free every collected object whose value matches `pred`
    ///
    /// Immortal objects are never passed to `pred`.
    pub fn free_where(&mut self, mut pred: impl FnMut(&T) -> bool) -> usize {
        let doomed: Vec<u32> = self
            .handles()
            .into_iter()
            .filter(|r| {
                self.entry(*r)
                    .is_some_and(|e| !e.header.is_immortal() && pred(&e.value))
            })
            .map(|r| r.index)
            .collect();
        for index in &doomed {
            self.remove(*index);
        }
        doomed.len()
    }

    /// Free every collected object, keeping immortal ones
    pub fn free_collected(&mut self) -> usize {
        self.free_where(|_| true)
    }

    /// Check if a collection should run before the next allocation
    pub fn should_collect(&self) -> bool {
        self.stats.alive_bytes > self.config.gc_threshold
    }

    /// Snapshot of the heap counters
    pub fn stats(&self) -> GcStats {
        self.stats.clone()
    }

    /// Verify that exactly `expected` objects are still alive
    pub fn verify_no_leaks(&self, expected: usize) -> Result<()> {
        let alive = self.stats.alive_objects;
        if alive != expected {
            #[cfg(feature = "gc_logging")]
            tracing::error!(alive, expected, "gc: leak check failed");
            return Err(GcError::LeakDetected { alive, expected });
        }
        Ok(())
    }
}
