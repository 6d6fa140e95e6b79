//! Physical execution backends for lockstep kernels.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::thread;

use picframe_core::{StepError, SuperCellId};

use super::kernel::Kernel;
use super::worker::{BroadcastSlot, LaneBarrier, LaneSync, TeamBroken, Worker, WorkerCfg};

/// Something that can run a kernel over a list of blocks.
///
/// Every lane finishes every block before `launch` returns, so all writes
/// a kernel made are visible to the caller afterwards.
pub trait Backend: Send + Sync + Default {
    /// Run `kernel` once per lane for each block, in block order.
    fn launch<A, K>(
        &self,
        kernel: &K,
        cfg: WorkerCfg,
        blocks: &[SuperCellId],
        args: &A,
    ) -> Result<(), StepError>
    where
        A: Sync + ?Sized,
        K: Kernel<A> + ?Sized;

    /// Human-readable backend name for logs.
    fn name(&self) -> &'static str;
}

/// Runs every block on the calling thread with a single lane.
///
/// The requested lane count is ignored; kernels must not depend on it.
#[derive(Clone, Copy, Debug, Default)]
pub struct Sequential;

impl Backend for Sequential {
    fn launch<A, K>(
        &self,
        kernel: &K,
        _cfg: WorkerCfg,
        blocks: &[SuperCellId],
        args: &A,
    ) -> Result<(), StepError>
    where
        A: Sync + ?Sized,
        K: Kernel<A> + ?Sized,
    {
        let slot = BroadcastSlot::default();
        for (block, &id) in blocks.iter().enumerate() {
            let worker = Worker::new(0, 1, block, id, LaneSync::Single, &slot);
            kernel.run(&worker, args)?;
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "sequential"
    }
}

/// One scoped OS thread per lane, synchronised by a shared barrier.
///
/// The team walks the blocks together and meets at a barrier after each
/// one. If any lane fails a block, every lane stops after that block and
/// the lowest lane's error is returned. A panicking lane breaks the
/// barrier so its peers leave the launch, and the first panic is re-raised
/// on the calling thread once the scope joins.
#[derive(Clone, Copy, Debug, Default)]
pub struct ThreadTeam;

impl Backend for ThreadTeam {
    fn launch<A, K>(
        &self,
        kernel: &K,
        cfg: WorkerCfg,
        blocks: &[SuperCellId],
        args: &A,
    ) -> Result<(), StepError>
    where
        A: Sync + ?Sized,
        K: Kernel<A> + ?Sized,
    {
        let lanes = cfg.lanes();
        if lanes == 1 || blocks.is_empty() {
            return Sequential.launch(kernel, cfg, blocks, args);
        }
        let barrier = LaneBarrier::new(lanes);
        let slot = BroadcastSlot::default();
        // Lowest block any lane failed; usize::MAX while none has.
        let failed = AtomicUsize::new(usize::MAX);
        let panicked: Mutex<Option<Box<dyn Any + Send>>> = Mutex::new(None);

        let results: Vec<Result<(), StepError>> = thread::scope(|s| {
            let handles: Vec<_> = (0..lanes)
                .map(|lane| {
                    let (barrier, slot, failed, panicked) = (&barrier, &slot, &failed, &panicked);
                    s.spawn(move || {
                        let walk = AssertUnwindSafe(|| {
                            for (block, &id) in blocks.iter().enumerate() {
                                let worker = Worker::new(
                                    lane,
                                    lanes,
                                    block,
                                    id,
                                    LaneSync::Team(barrier),
                                    slot,
                                );
                                let result = kernel.run(&worker, args);
                                if result.is_err() {
                                    failed.fetch_min(block, Ordering::AcqRel);
                                }
                                barrier.wait();
                                if failed.load(Ordering::Acquire) <= block {
                                    return result;
                                }
                            }
                            Ok(())
                        });
                        panic::catch_unwind(walk).unwrap_or_else(|payload| {
                            barrier.break_team();
                            if !payload.is::<TeamBroken>() {
                                panicked
                                    .lock()
                                    .unwrap_or_else(PoisonError::into_inner)
                                    .get_or_insert(payload);
                            }
                            Ok(())
                        })
                    })
                })
                .collect();
            handles
                .into_iter()
                .map(|h| h.join().unwrap_or_else(|payload| panic::resume_unwind(payload)))
                .collect()
        });
        if let Some(payload) = panicked.into_inner().unwrap_or_else(PoisonError::into_inner) {
            panic::resume_unwind(payload);
        }
        results.into_iter().collect()
    }

    fn name(&self) -> &'static str {
        "thread-team"
    }
}

/// Backend selected at build time.
#[cfg(not(feature = "sequential"))]
pub type DefaultBackend = ThreadTeam;

/// Backend selected at build time.
#[cfg(feature = "sequential")]
pub type DefaultBackend = Sequential;
