use bytes::BytesMut;
use parking_lot::Mutex;
use tracing::trace;

/// Recycles circuit receive buffers in two size classes.
///
/// Small buffers back every circuit; a circuit swaps to a large buffer only
/// while it reassembles a message bigger than the small class. The pool
/// locks internally so it can be used without the context's state lock.
#[derive(Debug)]
pub struct BufferPool {
    small_size: usize,
    large_size: usize,
    max_cached: usize,
    small: Mutex<Vec<BytesMut>>,
    large: Mutex<Vec<BytesMut>>,
}

impl BufferPool {
    pub fn new(
        small_size: usize,
        large_size: usize,
        max_cached: usize,
    ) -> Self {
        Self {
            small_size,
            large_size: large_size.max(small_size),
            max_cached,
            small: Mutex::new(Vec::new()),
            large: Mutex::new(Vec::new()),
        }
    }

    pub fn small_size(&self) -> usize {
        self.small_size
    }

    pub fn large_size(&self) -> usize {
        self.large_size
    }

    pub fn allocate_small(&self) -> BytesMut {
        self.small
            .lock()
            .pop()
            .unwrap_or_else(|| BytesMut::with_capacity(self.small_size))
    }

    pub fn allocate_large(&self) -> BytesMut {
        self.large
            .lock()
            .pop()
            .unwrap_or_else(|| BytesMut::with_capacity(self.large_size))
    }

    /// Return a buffer taken with [`BufferPool::allocate_small`].
    pub fn release_small(
        &self,
        buf: BytesMut,
    ) {
        Self::recycle(&self.small, buf, self.small_size, self.max_cached);
    }

    /// Return a buffer taken with [`BufferPool::allocate_large`].
    pub fn release_large(
        &self,
        buf: BytesMut,
    ) {
        Self::recycle(&self.large, buf, self.large_size, self.max_cached);
    }

    fn recycle(
        list: &Mutex<Vec<BytesMut>>,
        mut buf: BytesMut,
        size: usize,
        max_cached: usize,
    ) {
        buf.clear();
        // reclaims the space given away by earlier splits when possible
        buf.reserve(size);

        let mut list = list.lock();
        if list.len() < max_cached {
            list.push(buf);
        } else {
            trace!(capacity = buf.capacity(), "buffer pool full, dropping buffer");
        }
    }

    /// Buffers currently cached as (small, large)
    pub fn cached(&self) -> (usize, usize) {
        (self.small.lock().len(), self.large.lock().len())
    }
}
