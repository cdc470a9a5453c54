use std::sync::Mutex;

/// A pool of fixed-capacity byte buffers. `get` never blocks indefinitely: if the free list is
/// empty, a new buffer is allocated. Buffers come back from `get` at full length (`capacity`
/// bytes), contents undefined, mirroring a fixed-size scratch array rather than a growable
/// accumulator. Callers that need their own read/write cursor (the connection ring, the
/// in-memory segment buffer) track it themselves instead of relying on `Vec::len`.
pub struct BufferPool {
    capacity: usize,
    free: Mutex<Vec<Vec<u8>>>,
}

impl BufferPool {
    pub fn new(capacity: usize) -> Self {
        BufferPool {
            capacity,
            free: Mutex::new(Vec::new()),
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Claims a buffer of at least `capacity` bytes. Pool membership is unordered.
    pub fn get(&self) -> Vec<u8> {
        let mut free = self.free.lock().expect("buffer pool mutex poisoned");
        match free.pop() {
            Some(buf) => buf,
            None => vec![0u8; self.capacity],
        }
    }

    /// Relinquishes ownership of a buffer claimed via `get`. Capacity is restored to the pool's
    /// configured size and any length interpretation the caller gave the buffer is reset, so a
    /// later `get` always comes back at exactly `capacity` bytes regardless of how this buffer
    /// was used. Callers must call this exactly once per `get`; double-return or post-return
    /// access is a programming error, not one this pool detects.
    pub fn release(&self, mut buf: Vec<u8>) {
        buf.resize(self.capacity, 0);
        let mut free = self.free.lock().expect("buffer pool mutex poisoned");
        free.push(buf);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_without_free_buffers_allocates_fresh() {
        let pool = BufferPool::new(128);
        let buf = pool.get();
        assert_eq!(buf.len(), 128);
    }

    #[test]
    fn release_makes_buffer_reusable() {
        let pool = BufferPool::new(64);
        let buf = pool.get();
        pool.release(buf);

        let reused = pool.get();
        assert_eq!(reused.len(), 64);
        assert_eq!(pool.free.lock().unwrap().len(), 0);
    }

    #[test]
    fn balanced_get_release_pairs_leave_pool_with_one_entry() {
        let pool = BufferPool::new(32);
        for _ in 0..10 {
            let buf = pool.get();
            pool.release(buf);
        }
        assert_eq!(pool.free.lock().unwrap().len(), 1);
    }
}
