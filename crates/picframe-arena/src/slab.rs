//! Lock-free bounded slab allocator for frame indices.
//!
//! [`SlabAllocator`] hands out frame indices in `0..capacity` to any number
//! of concurrent callers. It combines a bump cursor (indices never issued
//! before) with a tagged free stack (indices returned by [`free`]).
//!
//! The allocator never blocks and never grows. When both the stack and the
//! cursor are exhausted, [`allocate`] returns `None` and the caller decides
//! what a shortage means; for a simulation step it is fatal.
//!
//! [`allocate`]: SlabAllocator::allocate
//! [`free`]: SlabAllocator::free

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use crate::error::SlabError;
use crate::handle::{FrameHandle, NIL};

/// Per-index state word: `generation << 1 | live`.
const LIVE_BIT: u32 = 1;

/// Concurrent allocator of frame indices with generation tracking.
pub struct SlabAllocator {
    capacity: u32,
    /// Free stack head: ABA tag in the high 32 bits, index in the low 32.
    free_head: AtomicU64,
    /// Successor links of the free stack.
    free_next: Box<[AtomicU32]>,
    /// Indices `[0, cursor)` have been issued at least once.
    cursor: AtomicU32,
    /// Generation and live bit per index.
    state: Box<[AtomicU32]>,
    live: AtomicU32,
    high_water: AtomicU32,
    allocation_calls: AtomicU64,
    failed_allocations: AtomicU64,
}

// Compile-time assertion: the allocator is shared by reference across lanes.
const _: fn() = || {
    fn assert<T: Send + Sync>() {}
    assert::<SlabAllocator>();
};

impl SlabAllocator {
    /// Create an allocator over `capacity` indices.
    pub fn new(capacity: u32) -> Self {
        Self {
            capacity,
            free_head: AtomicU64::new(NIL as u64),
            free_next: (0..capacity).map(|_| AtomicU32::new(NIL)).collect(),
            cursor: AtomicU32::new(0),
            state: (0..capacity).map(|_| AtomicU32::new(0)).collect(),
            live: AtomicU32::new(0),
            high_water: AtomicU32::new(0),
            allocation_calls: AtomicU64::new(0),
            failed_allocations: AtomicU64::new(0),
        }
    }

    /// Allocate one frame index.
    ///
    /// Returns `None` when every index is live. Never blocks; a concurrent
    /// `free` racing with exhaustion may or may not be observed.
    pub fn allocate(&self) -> Option<FrameHandle> {
        self.allocation_calls.fetch_add(1, Ordering::Relaxed);

        let index = match self.pop_free().or_else(|| self.bump()) {
            Some(index) => index,
            None => {
                self.failed_allocations.fetch_add(1, Ordering::Relaxed);
                return None;
            }
        };

        let prev = self.state[index as usize].fetch_or(LIVE_BIT, Ordering::AcqRel);
        debug_assert_eq!(prev & LIVE_BIT, 0, "slab index {index} issued while live");
        let live = self.live.fetch_add(1, Ordering::Relaxed) + 1;
        self.high_water.fetch_max(live, Ordering::Relaxed);
        Some(FrameHandle::new(index, prev >> 1))
    }

    /// Return a frame index to the allocator.
    ///
    /// The index's generation advances, invalidating every copy of `handle`.
    pub fn free(&self, handle: FrameHandle) -> Result<(), SlabError> {
        let slot = self.state_of(handle)?;
        let expected = (handle.generation << 1) | LIVE_BIT;
        let retired = (handle.generation.wrapping_add(1)) << 1;
        if let Err(actual) =
            slot.compare_exchange(expected, retired, Ordering::AcqRel, Ordering::Acquire)
        {
            if actual >> 1 != handle.generation {
                return Err(SlabError::StaleHandle {
                    handle,
                    current_generation: actual >> 1,
                });
            }
            return Err(SlabError::DoubleFree { handle });
        }
        self.live.fetch_sub(1, Ordering::Relaxed);
        self.push_free(handle.index);
        Ok(())
    }

    /// Check that `handle` still refers to a live frame.
    pub fn validate(&self, handle: FrameHandle) -> Result<(), SlabError> {
        let word = self.state_of(handle)?.load(Ordering::Acquire);
        if word >> 1 != handle.generation {
            return Err(SlabError::StaleHandle {
                handle,
                current_generation: word >> 1,
            });
        }
        if word & LIVE_BIT == 0 {
            return Err(SlabError::DoubleFree { handle });
        }
        Ok(())
    }

    /// Whether the index is currently issued.
    pub fn is_live(&self, index: u32) -> bool {
        self.state
            .get(index as usize)
            .is_some_and(|s| s.load(Ordering::Acquire) & LIVE_BIT != 0)
    }

    /// Handle for a live index, reconstructing its current generation.
    pub fn handle_at(&self, index: u32) -> Option<FrameHandle> {
        let word = self.state.get(index as usize)?.load(Ordering::Acquire);
        (word & LIVE_BIT != 0).then(|| FrameHandle::new(index, word >> 1))
    }

    /// Number of indices the allocator manages.
    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Indices currently issued.
    pub fn live_frames(&self) -> u32 {
        self.live.load(Ordering::Relaxed)
    }

    /// Largest number of simultaneously issued indices so far.
    pub fn high_water(&self) -> u32 {
        self.high_water.load(Ordering::Relaxed)
    }

    /// Total calls to [`allocate`](Self::allocate), successful or not.
    pub fn allocation_calls(&self) -> u64 {
        self.allocation_calls.load(Ordering::Relaxed)
    }

    /// Calls to [`allocate`](Self::allocate) that returned `None`.
    pub fn failed_allocations(&self) -> u64 {
        self.failed_allocations.load(Ordering::Relaxed)
    }

    fn state_of(&self, handle: FrameHandle) -> Result<&AtomicU32, SlabError> {
        self.state
            .get(handle.index as usize)
            .ok_or(SlabError::OutOfRange {
                handle,
                capacity: self.capacity,
            })
    }

    fn pop_free(&self) -> Option<u32> {
        let mut head = self.free_head.load(Ordering::Acquire);
        loop {
            let index = head as u32;
            if index == NIL {
                return None;
            }
            let next = self.free_next[index as usize].load(Ordering::Acquire);
            let tag = (head >> 32).wrapping_add(1);
            let new_head = (tag << 32) | next as u64;
            match self.free_head.compare_exchange_weak(
                head,
                new_head,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return Some(index),
                Err(actual) => head = actual,
            }
        }
    }

    fn push_free(&self, index: u32) {
        let mut head = self.free_head.load(Ordering::Acquire);
        loop {
            self.free_next[index as usize].store(head as u32, Ordering::Release);
            let tag = (head >> 32).wrapping_add(1);
            let new_head = (tag << 32) | index as u64;
            match self.free_head.compare_exchange_weak(
                head,
                new_head,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return,
                Err(actual) => head = actual,
            }
        }
    }

    fn bump(&self) -> Option<u32> {
        let capacity = self.capacity;
        self.cursor
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |c| {
                (c < capacity).then_some(c + 1)
            })
            .ok()
    }
}

impl std::fmt::Debug for SlabAllocator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlabAllocator")
            .field("capacity", &self.capacity)
            .field("live", &self.live_frames())
            .field("high_water", &self.high_water())
            .field("failed_allocations", &self.failed_allocations())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;

    #[test]
    fn allocates_distinct_indices() {
        let slab = SlabAllocator::new(4);
        let a = slab.allocate().unwrap();
        let b = slab.allocate().unwrap();
        assert_ne!(a.index(), b.index());
        assert_eq!(slab.live_frames(), 2);
    }

    #[test]
    fn exhaustion_returns_none() {
        let slab = SlabAllocator::new(2);
        assert!(slab.allocate().is_some());
        assert!(slab.allocate().is_some());
        assert!(slab.allocate().is_none());
        assert_eq!(slab.failed_allocations(), 1);
        assert_eq!(slab.allocation_calls(), 3);
    }

    #[test]
    fn freed_index_is_reused_with_new_generation() {
        let slab = SlabAllocator::new(1);
        let a = slab.allocate().unwrap();
        slab.free(a).unwrap();
        let b = slab.allocate().unwrap();
        assert_eq!(a.index(), b.index());
        assert_eq!(b.generation(), a.generation() + 1);
    }

    #[test]
    fn double_free_detected() {
        let slab = SlabAllocator::new(2);
        let a = slab.allocate().unwrap();
        slab.free(a).unwrap();
        assert!(matches!(slab.free(a), Err(SlabError::StaleHandle { .. })));
    }

    #[test]
    fn stale_handle_after_reissue() {
        let slab = SlabAllocator::new(1);
        let a = slab.allocate().unwrap();
        slab.free(a).unwrap();
        let _b = slab.allocate().unwrap();
        assert!(matches!(
            slab.validate(a),
            Err(SlabError::StaleHandle { .. })
        ));
        assert!(matches!(slab.free(a), Err(SlabError::StaleHandle { .. })));
    }

    #[test]
    fn out_of_range_handle_rejected() {
        let slab = SlabAllocator::new(1);
        let bogus = FrameHandle::new(9, 0);
        assert!(matches!(slab.free(bogus), Err(SlabError::OutOfRange { .. })));
    }

    #[test]
    fn high_water_tracks_peak() {
        let slab = SlabAllocator::new(8);
        let hs: Vec<_> = (0..5).map(|_| slab.allocate().unwrap()).collect();
        for h in hs {
            slab.free(h).unwrap();
        }
        slab.allocate().unwrap();
        assert_eq!(slab.high_water(), 5);
        assert_eq!(slab.live_frames(), 1);
    }

    #[test]
    fn concurrent_allocation_never_duplicates() {
        let slab = Arc::new(SlabAllocator::new(512));
        let threads: Vec<_> = (0..8)
            .map(|_| {
                let slab = Arc::clone(&slab);
                std::thread::spawn(move || {
                    let mut mine = Vec::new();
                    for round in 0..200 {
                        if let Some(h) = slab.allocate() {
                            mine.push(h);
                        }
                        if round % 3 == 0 {
                            if let Some(h) = mine.pop() {
                                slab.free(h).unwrap();
                            }
                        }
                    }
                    mine
                })
            })
            .collect();

        let mut seen = HashSet::new();
        let mut held = 0;
        for t in threads {
            for h in t.join().unwrap() {
                assert!(seen.insert(h.index()), "index {} issued twice", h.index());
                held += 1;
            }
        }
        assert_eq!(slab.live_frames(), held);
    }
}
