//! Chronological identifier tables.
//!
//! An [`IdTable`] maps the 32-bit ids that travel on the wire to objects held
//! in a [`Pool`]. Ids come from a monotonically increasing counter that skips
//! any id still registered after wrap-around, so an id is never handed out
//! again while its previous owner is reachable, and a late response carrying
//! a retired id simply misses.

use std::collections::HashMap;

use crate::Pool;
use crate::PoolKey;


#[derive(Debug)]
pub struct IdTable<T> {
    pool: Pool<T>,
    index: HashMap<u32, PoolKey>,
    next_id: u32,
}

impl<T> IdTable<T> {
    pub fn with_chunk(chunk: usize) -> Self {
        Self {
            pool: Pool::with_chunk(chunk),
            index: HashMap::new(),
            next_id: 1,
        }
    }

    /// Next free id from this table's own counter
    pub fn allocate_id(&mut self) -> u32 {
        loop {
            let id = self.next_id;
            self.next_id = self.next_id.wrapping_add(1);
            if !self.index.contains_key(&id) {
                return id;
            }
        }
    }

    /// Register a value under a fresh id built by `make`.
    pub fn insert_with(
        &mut self,
        make: impl FnOnce(u32) -> T,
    ) -> u32 {
        let id = self.allocate_id();
        self.insert_at(id, make(id));
        id
    }

    /// Register a value under an id allocated elsewhere.
    ///
    /// # Panics
    /// If `id` is already registered: reusing a live id would let one object
    /// receive another's responses.
    pub fn insert_at(
        &mut self,
        id: u32,
        value: T,
    ) {
        assert!(!self.index.contains_key(&id), "id {id} registered twice");
        let key = self.pool.insert(value);
        self.index.insert(id, key);
    }

    pub fn contains(
        &self,
        id: u32,
    ) -> bool {
        self.index.contains_key(&id)
    }

    pub fn get(
        &self,
        id: u32,
    ) -> Option<&T> {
        self.index.get(&id).and_then(|key| self.pool.get(*key))
    }

    pub fn get_mut(
        &mut self,
        id: u32,
    ) -> Option<&mut T> {
        let key = *self.index.get(&id)?;
        self.pool.get_mut(key)
    }

    /// Unregister `id` and release its slot.
    pub fn remove(
        &mut self,
        id: u32,
    ) -> Option<T> {
        let key = self.index.remove(&id)?;
        self.pool.remove(key)
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn ids(&self) -> Vec<u32> {
        self.index.keys().copied().collect()
    }

    pub fn values(&self) -> impl Iterator<Item = &T> {
        self.pool.iter().map(|(_, value)| value)
    }

    /// Pool slots allocated so far
    pub fn capacity(&self) -> usize {
        self.pool.capacity()
    }

    #[cfg(test)]
    pub(crate) fn set_next_id(
        &mut self,
        next_id: u32,
    ) {
        self.next_id = next_id;
    }
}
