//! Immortal arenas
//!
//! Structural metadata (classes, call frames) never goes through mark/sweep.
//! Each entry is tagged with an owner id and lives until it is freed
//! explicitly or its owner is disposed.

use rustc_hash::FxHashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

/// Typed, generation-checked index into an [`ImmortalArena`]
pub struct Handle<T> {
    index: u32,
    generation: u32,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Handle<T> {
    /// Slot index of this handle
    pub fn index(self) -> u32 {
        self.index
    }
}

impl<T> Clone for Handle<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Handle<T> {}

impl<T> PartialEq for Handle<T> {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index && self.generation == other.generation
    }
}

impl<T> Eq for Handle<T> {}

impl<T> Hash for Handle<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.index.hash(state);
        self.generation.hash(state);
    }
}

impl<T> fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Handle({}v{})", self.index, self.generation)
    }
}

struct Slot<T> {
    generation: u32,
    value: Option<(u32, T)>,
}

/// Owner-scoped arena with stable handles
pub struct ImmortalArena<T> {
    slots: Vec<Slot<T>>,
    free: Vec<u32>,
    owners: FxHashMap<u32, Vec<u32>>,
    len: usize,
}

impl<T> Default for ImmortalArena<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> ImmortalArena<T> {
    /// Create an empty arena
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            owners: FxHashMap::default(),
            len: 0,
        }
    }

    /// Store `value` on behalf of `owner`
    pub fn allocate(&mut self, owner: u32, value: T) -> Handle<T> {
        let index = match self.free.pop() {
            Some(index) => index,
            None => {
                self.slots.push(Slot {
                    generation: 0,
                    value: None,
                });
                (self.slots.len() - 1) as u32
            }
        };
        let slot = &mut self.slots[index as usize];
        slot.value = Some((owner, value));
        self.owners.entry(owner).or_default().push(index);
        self.len += 1;
        Handle {
            index,
            generation: slot.generation,
            _marker: PhantomData,
        }
    }

    /// Borrow an entry
    pub fn get(&self, handle: Handle<T>) -> Option<&T> {
        let slot = self.slots.get(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        slot.value.as_ref().map(|(_, v)| v)
    }

    /// Mutably borrow an entry
    pub fn get_mut(&mut self, handle: Handle<T>) -> Option<&mut T> {
        let slot = self.slots.get_mut(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        slot.value.as_mut().map(|(_, v)| v)
    }

    /// Owner id an entry was allocated for
    pub fn owner_of(&self, handle: Handle<T>) -> Option<u32> {
        let slot = self.slots.get(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        slot.value.as_ref().map(|(owner, _)| *owner)
    }

    /// Free a single entry
    pub fn free(&mut self, handle: Handle<T>) -> Option<T> {
        let owner = self.owner_of(handle)?;
        if let Some(list) = self.owners.get_mut(&owner) {
            list.retain(|i| *i != handle.index);
        }
        self.release(handle.index)
    }

    fn release(&mut self, index: u32) -> Option<T> {
        let slot = self.slots.get_mut(index as usize)?;
        let (_, value) = slot.value.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(index);
        self.len -= 1;
        Some(value)
    }

    /// Free everything allocated on behalf of `owner`
    pub fn free_owned_by(&mut self, owner: u32) -> Vec<T> {
        let indices = self.owners.remove(&owner).unwrap_or_default();
        indices
            .into_iter()
            .filter_map(|index| self.release(index))
            .collect()
    }

    /// Number of live entries
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the arena holds no entries
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Iterate live entries with their handles
    pub fn iter(&self) -> impl Iterator<Item = (Handle<T>, &T)> {
        self.slots.iter().enumerate().filter_map(|(i, slot)| {
            slot.value.as_ref().map(|(_, v)| {
                (
                    Handle {
                        index: i as u32,
                        generation: slot.generation,
                        _marker: PhantomData,
                    },
                    v,
                )
            })
        })
    }
}
