//! Per-lane execution context handed to kernel bodies.

use std::any::Any;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

use picframe_core::SuperCellId;

/// Launch shape of a kernel: how many lanes cooperate on each block.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WorkerCfg {
    lanes: usize,
}

impl WorkerCfg {
    /// Launch with `lanes` lanes per block; zero is raised to one.
    pub fn new(lanes: usize) -> Self {
        Self {
            lanes: lanes.max(1),
        }
    }

    /// Lanes per block.
    pub fn lanes(&self) -> usize {
        self.lanes
    }
}

impl Default for WorkerCfg {
    fn default() -> Self {
        Self::new(1)
    }
}

/// How lanes of one launch wait for each other.
#[derive(Clone, Copy)]
pub(crate) enum LaneSync<'s> {
    Team(&'s LaneBarrier),
    Single,
}

/// Unwind payload for lanes leaving a launch because a peer panicked.
pub(crate) struct TeamBroken;

#[derive(Default)]
struct BarrierState {
    arrived: usize,
    generation: u64,
    broken: bool,
}

/// Reusable barrier for a fixed team of lanes that can be broken.
///
/// Once [`break_team`](Self::break_team) is called, every lane blocked in
/// [`wait`](Self::wait), and every later caller, unwinds with
/// [`TeamBroken`] instead of waiting for a peer that will never arrive.
pub(crate) struct LaneBarrier {
    lanes: usize,
    state: Mutex<BarrierState>,
    cvar: Condvar,
}

impl LaneBarrier {
    pub(crate) fn new(lanes: usize) -> Self {
        Self {
            lanes,
            state: Mutex::new(BarrierState::default()),
            cvar: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, BarrierState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Block until all lanes arrive, or unwind if the team is broken.
    pub(crate) fn wait(&self) {
        let mut state = self.lock();
        if state.broken {
            drop(state);
            std::panic::resume_unwind(Box::new(TeamBroken));
        }
        state.arrived += 1;
        if state.arrived == self.lanes {
            state.arrived = 0;
            state.generation = state.generation.wrapping_add(1);
            self.cvar.notify_all();
            return;
        }
        let generation = state.generation;
        while state.generation == generation && !state.broken {
            state = self.cvar.wait(state).unwrap_or_else(PoisonError::into_inner);
        }
        if state.generation == generation {
            drop(state);
            std::panic::resume_unwind(Box::new(TeamBroken));
        }
    }

    /// Release every waiting lane and fail all later waits.
    pub(crate) fn break_team(&self) {
        self.lock().broken = true;
        self.cvar.notify_all();
    }
}

/// Value lane 0 publishes for the other lanes to read.
#[derive(Default)]
pub(crate) struct BroadcastSlot {
    value: Mutex<Option<Box<dyn Any + Send>>>,
}

/// One lane's view of a kernel launch.
///
/// Work is addressed by logical index. [`for_each`](Self::for_each) maps
/// `0..n` onto the lanes in passes of `lanes()` indices: in pass `k`, lane
/// `i` handles index `k * lanes() + i`, and every pass ends in a barrier.
/// The mapping never depends on scheduling, so a kernel whose per-index
/// work is independent produces the same result for any lane count.
pub struct Worker<'s> {
    lane: usize,
    lanes: usize,
    block: usize,
    supercell: SuperCellId,
    sync: LaneSync<'s>,
    slot: &'s BroadcastSlot,
}

impl<'s> Worker<'s> {
    pub(crate) fn new(
        lane: usize,
        lanes: usize,
        block: usize,
        supercell: SuperCellId,
        sync: LaneSync<'s>,
        slot: &'s BroadcastSlot,
    ) -> Self {
        Self {
            lane,
            lanes,
            block,
            supercell,
            sync,
            slot,
        }
    }

    /// Index of this lane, `0..lanes()`.
    pub fn lane(&self) -> usize {
        self.lane
    }

    /// Number of lanes in the launch.
    pub fn lanes(&self) -> usize {
        self.lanes
    }

    /// Index of the current block in the launch.
    pub fn block(&self) -> usize {
        self.block
    }

    /// Supercell the current block works on.
    pub fn supercell(&self) -> SuperCellId {
        self.supercell
    }

    /// Whether this lane is the block's master (lane 0).
    pub fn is_master(&self) -> bool {
        self.lane == 0
    }

    /// Wait until every lane of the block reaches this point.
    ///
    /// Every lane must call `sync` the same number of times. If a peer lane
    /// panicked, this lane unwinds out of the kernel instead of waiting.
    pub fn sync(&self) {
        if let LaneSync::Team(barrier) = self.sync {
            barrier.wait();
        }
    }

    /// Number of passes needed to cover `n` logical indices.
    pub fn passes(&self, n: usize) -> usize {
        n.div_ceil(self.lanes)
    }

    /// Run `f` for every logical index in `0..n`, one pass at a time.
    pub fn for_each(&self, n: usize, mut f: impl FnMut(usize)) {
        for pass in 0..self.passes(n) {
            let idx = pass * self.lanes + self.lane;
            if idx < n {
                f(idx);
            }
            self.sync();
        }
    }

    /// Lane-local storage for the indices this lane will handle in a
    /// `for_each` over `0..n`, initialised per index.
    pub fn lane_var<T>(&self, n: usize, mut init: impl FnMut(usize) -> T) -> LaneVar<T> {
        let values = (0..self.passes(n))
            .map(|pass| pass * self.lanes + self.lane)
            .take_while(|&idx| idx < n)
            .map(&mut init)
            .collect();
        LaneVar { values }
    }

    /// Like [`for_each`](Self::for_each), handing `f` the lane-local value
    /// for each index.
    pub fn for_each_var<T>(&self, n: usize, var: &mut LaneVar<T>, mut f: impl FnMut(usize, &mut T)) {
        for pass in 0..self.passes(n) {
            let idx = pass * self.lanes + self.lane;
            if let Some(v) = var.values.get_mut(pass).filter(|_| idx < n) {
                f(idx, v);
            }
            self.sync();
        }
    }

    /// Lane 0 computes a value; every lane returns a copy of it.
    ///
    /// Used for decisions the whole block must agree on, such as the frame
    /// a fill pass writes into or whether an allocation failed.
    pub fn broadcast<T>(&self, f: impl FnOnce() -> T) -> T
    where
        T: Clone + Send + 'static,
    {
        let lock = || self.slot.value.lock().unwrap_or_else(PoisonError::into_inner);
        if self.is_master() {
            *lock() = Some(Box::new(f()));
        }
        self.sync();
        let value = lock()
            .as_ref()
            .and_then(|v| v.downcast_ref::<T>())
            .cloned()
            .expect("lane 0 published a value of the broadcast type");
        self.sync();
        value
    }
}

/// Per-lane values, one per pass this lane takes part in.
#[derive(Debug)]
pub struct LaneVar<T> {
    values: Vec<T>,
}

impl<T> LaneVar<T> {
    /// Value for this lane's `pass`-th index.
    pub fn get(&self, pass: usize) -> Option<&T> {
        self.values.get(pass)
    }

    /// Values in pass order.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.values.iter()
    }

    /// Consume into the per-pass values.
    pub fn into_inner(self) -> Vec<T> {
        self.values
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solo<'s>(slot: &'s BroadcastSlot, lanes: usize, lane: usize) -> Worker<'s> {
        Worker::new(lane, lanes, 0, SuperCellId(0), LaneSync::Single, slot)
    }

    #[test]
    fn zero_lanes_become_one() {
        assert_eq!(WorkerCfg::new(0).lanes(), 1);
    }

    #[test]
    fn for_each_strides_by_lane_count() {
        let slot = BroadcastSlot::default();
        let w = solo(&slot, 4, 1);
        let mut seen = Vec::new();
        w.for_each(10, |i| seen.push(i));
        assert_eq!(seen, vec![1, 5, 9]);
        assert_eq!(w.passes(10), 3);
    }

    #[test]
    fn lane_var_matches_for_each_indices() {
        let slot = BroadcastSlot::default();
        let w = solo(&slot, 4, 2);
        let mut var = w.lane_var(7, |i| i * 10);
        assert_eq!(var.iter().copied().collect::<Vec<_>>(), vec![20, 60]);
        let mut seen = Vec::new();
        w.for_each_var(7, &mut var, |i, v| {
            *v += 1;
            seen.push(i);
        });
        assert_eq!(seen, vec![2, 6]);
        assert_eq!(var.into_inner(), vec![21, 61]);
    }

    #[test]
    fn broken_barrier_releases_a_waiting_lane() {
        let barrier = LaneBarrier::new(2);
        std::thread::scope(|s| {
            let waiter = s.spawn(|| barrier.wait());
            // Give the waiter a chance to block; either order must release it.
            std::thread::yield_now();
            barrier.break_team();
            let payload = waiter.join().unwrap_err();
            assert!(payload.is::<TeamBroken>());
        });
    }

    #[test]
    fn full_team_passes_the_barrier_repeatedly() {
        let barrier = LaneBarrier::new(3);
        std::thread::scope(|s| {
            for _ in 0..3 {
                s.spawn(|| {
                    for _ in 0..10 {
                        barrier.wait();
                    }
                });
            }
        });
    }

    #[test]
    fn single_lane_broadcast_returns_value() {
        let slot = BroadcastSlot::default();
        let w = solo(&slot, 1, 0);
        assert_eq!(w.broadcast(|| 42u32), 42);
        assert_eq!(w.broadcast(|| "again".to_string()), "again");
    }
}
