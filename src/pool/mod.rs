//! Fixed-chunk recycling pools.
//!
//! Every frequently created object kind lives in a [`Pool`]: a slab whose
//! slots are handed out from a free list and returned to it on release. The
//! slab grows one chunk at a time, so high-churn kinds (IO operations) are
//! configured with large chunks and low-churn kinds (circuits) with small
//! ones. Each slot carries a generation that is bumped on release; a
//! [`PoolKey`] kept past its object's lifetime fails lookups instead of
//! reaching the slot's next occupant.

mod buffer_pool;

pub use buffer_pool::*;


/// Generation-checked handle to a pool slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PoolKey {
    index: u32,
    generation: u32,
}

impl PoolKey {
    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }
}

#[derive(Debug)]
struct Slot<T> {
    generation: u32,
    value: Option<T>,
}

#[derive(Debug)]
pub struct Pool<T> {
    slots: Vec<Slot<T>>,
    free: Vec<u32>,
    chunk: usize,
    live: usize,
}

impl<T> Pool<T> {
    pub fn with_chunk(chunk: usize) -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            chunk: chunk.max(1),
            live: 0,
        }
    }

    /// Adds a chunk of empty slots and returns the index of the first one;
    /// the rest go to the free list.
    fn grow(&mut self) -> u32 {
        let start = self.slots.len();
        self.slots.reserve_exact(self.chunk);
        for _ in 0..self.chunk {
            self.slots.push(Slot {
                generation: 0,
                value: None,
            });
        }
        // lowest index is handed out first
        self.free
            .extend((start + 1..start + self.chunk).rev().map(|i| i as u32));
        start as u32
    }

    pub fn insert(
        &mut self,
        value: T,
    ) -> PoolKey {
        let index = match self.free.pop() {
            Some(index) => index,
            None => self.grow(),
        };
        let slot = &mut self.slots[index as usize];
        debug_assert!(slot.value.is_none(), "free list handed out an occupied slot");
        slot.value = Some(value);
        self.live += 1;
        PoolKey {
            index,
            generation: slot.generation,
        }
    }

    fn slot(
        &self,
        key: PoolKey,
    ) -> Option<&Slot<T>> {
        self.slots
            .get(key.index as usize)
            .filter(|slot| slot.generation == key.generation)
    }

    pub fn get(
        &self,
        key: PoolKey,
    ) -> Option<&T> {
        self.slot(key).and_then(|slot| slot.value.as_ref())
    }

    pub fn get_mut(
        &mut self,
        key: PoolKey,
    ) -> Option<&mut T> {
        self.slots
            .get_mut(key.index as usize)
            .filter(|slot| slot.generation == key.generation)
            .and_then(|slot| slot.value.as_mut())
    }

    /// Release a slot back to the free list. A stale key is a miss.
    pub fn remove(
        &mut self,
        key: PoolKey,
    ) -> Option<T> {
        let slot = self
            .slots
            .get_mut(key.index as usize)
            .filter(|slot| slot.generation == key.generation)?;
        let value = slot.value.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(key.index);
        self.live -= 1;
        Some(value)
    }

    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Slots allocated so far, live or free
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (PoolKey, &T)> {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            slot.value.as_ref().map(|value| {
                (
                    PoolKey {
                        index: index as u32,
                        generation: slot.generation,
                    },
                    value,
                )
            })
        })
    }
}
