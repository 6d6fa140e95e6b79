//! The kernel abstraction launched by an [`Executor`](super::Executor).

use picframe_core::StepError;

use super::worker::Worker;

/// A per-supercell kernel body.
///
/// `run` is called once per lane per block. Lanes of one block must all
/// return the same variant at the same point: a lane that leaves early
/// while its peers wait in [`Worker::sync`] stalls the launch. Decisions
/// that can fail (such as frame allocation) are made by lane 0 and shared
/// with [`Worker::broadcast`].
pub trait Kernel<A: ?Sized>: Sync {
    /// Execute this lane's share of the current block.
    fn run(&self, worker: &Worker<'_>, args: &A) -> Result<(), StepError>;
}

impl<A: ?Sized, F> Kernel<A> for F
where
    F: Fn(&Worker<'_>, &A) -> Result<(), StepError> + Sync,
{
    fn run(&self, worker: &Worker<'_>, args: &A) -> Result<(), StepError> {
        self(worker, args)
    }
}
