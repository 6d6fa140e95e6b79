//! Kernel submission over an area of the supercell grid.

use picframe_core::StepError;
use picframe_space::AreaMapper;

use super::backend::{Backend, DefaultBackend};
use super::kernel::Kernel;
use super::worker::WorkerCfg;

/// Submits kernels to a backend, one block per supercell of an area.
#[derive(Clone, Debug, Default)]
pub struct Executor<B: Backend = DefaultBackend> {
    backend: B,
}

impl Executor {
    /// Executor on the build-time default backend.
    pub fn new() -> Self {
        Self::default()
    }
}

impl<B: Backend> Executor<B> {
    /// Executor on an explicit backend.
    pub fn with_backend(backend: B) -> Self {
        Self { backend }
    }

    /// The backend kernels run on.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Run `kernel` over every supercell `mapper` selects, in mapper order.
    ///
    /// Returns once every lane has finished every block.
    pub fn submit<A, K>(
        &self,
        kernel: &K,
        cfg: WorkerCfg,
        mapper: &AreaMapper,
        args: &A,
    ) -> Result<(), StepError>
    where
        A: Sync + ?Sized,
        K: Kernel<A> + ?Sized,
    {
        self.backend.launch(kernel, cfg, mapper.supercells(), args)
    }
}
