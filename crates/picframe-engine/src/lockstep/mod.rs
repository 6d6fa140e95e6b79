//! Lockstep kernel execution.
//!
//! A launch covers a list of blocks (supercells). For each block, `lanes`
//! workers run the kernel body together; logical indices are dealt out in
//! passes with a barrier after every pass, and the whole launch ends in a
//! join so side effects are visible to the submitting thread.

mod backend;
mod executor;
mod kernel;
mod worker;

pub use backend::{Backend, DefaultBackend, Sequential, ThreadTeam};
pub use executor::Executor;
pub use kernel::Kernel;
pub use worker::{LaneVar, Worker, WorkerCfg};
