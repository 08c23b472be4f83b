//! Bounded allocator for player session ids.

use std::{
    cmp::Reverse,
    collections::{BinaryHeap, HashSet},
    sync::{Mutex, PoisonError},
};

use crate::error::UidError;

/// Player session identifier, assigned when a client joins.
pub type Uid = u32;

/// Pool of ids in `[0, capacity)`.
///
/// Always hands out the smallest free id, so a player who reconnects after a
/// drop usually gets their old number back. Free ids live in a min-heap,
/// making both allocation and release `O(log n)`.
///
/// Safe to share between accept tasks; every operation takes the internal
/// lock for the duration of one heap operation.
#[derive(Debug)]
pub struct UidPool {
    capacity: u32,
    inner: Mutex<PoolState>,
}

#[derive(Debug)]
struct PoolState {
    free: BinaryHeap<Reverse<Uid>>,
    issued: HashSet<Uid>,
}

impl UidPool {
    /// Pool holding every id in `[0, capacity)`.
    pub fn new(capacity: u32) -> Self {
        let free = (0..capacity).map(Reverse).collect();
        Self { capacity, inner: Mutex::new(PoolState { free, issued: HashSet::new() }) }
    }

    /// Take the smallest free id.
    ///
    /// # Errors
    ///
    /// `UidError::Exhausted` when every id is issued.
    pub fn allocate(&self) -> Result<Uid, UidError> {
        let mut state = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let Reverse(uid) = state.free.pop().ok_or(UidError::Exhausted { capacity: self.capacity })?;
        state.issued.insert(uid);
        Ok(uid)
    }

    /// Return `uid` to the pool.
    ///
    /// Releasing an id that is not currently issued (twice, or out of range)
    /// is a no-op and returns `false`, so racing cleanup paths cannot put a
    /// duplicate into the heap.
    pub fn release(&self, uid: Uid) -> bool {
        let mut state = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        if !state.issued.remove(&uid) {
            return false;
        }
        state.free.push(Reverse(uid));
        true
    }

    /// Number of ids currently issued.
    pub fn in_use(&self) -> usize {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner).issued.len()
    }

    /// Total number of ids the pool manages.
    pub fn capacity(&self) -> u32 {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocates_lowest_first() {
        let pool = UidPool::new(4);
        assert_eq!(pool.allocate(), Ok(0));
        assert_eq!(pool.allocate(), Ok(1));
        assert_eq!(pool.allocate(), Ok(2));
    }

    #[test]
    fn reuses_released_low_id() {
        let pool = UidPool::new(4);
        for _ in 0..3 {
            pool.allocate().unwrap();
        }
        assert!(pool.release(1));
        assert_eq!(pool.allocate(), Ok(1));
        assert_eq!(pool.allocate(), Ok(3));
    }

    #[test]
    fn exhaustion_is_reported() {
        let pool = UidPool::new(1);
        pool.allocate().unwrap();
        assert_eq!(pool.allocate(), Err(UidError::Exhausted { capacity: 1 }));
    }

    #[test]
    fn double_release_is_ignored() {
        let pool = UidPool::new(2);
        let uid = pool.allocate().unwrap();
        assert!(pool.release(uid));
        assert!(!pool.release(uid));
        assert!(!pool.release(99));
        assert_eq!(pool.allocate(), Ok(0));
        assert_eq!(pool.allocate(), Ok(1));
        assert!(pool.allocate().is_err());
    }
}
