//! Bounded frame storage for picframe particle buffers.
//!
//! Provides a lock-free slab allocator over a fixed number of frames and
//! the structure-of-arrays storage those frames live in. This crate is the
//! only place frame memory is created; particle lists above it refer to
//! frames purely by index.
//!
//! # Architecture
//!
//! ```text
//! FramePool
//! ├── SlabAllocator (tagged free stack + bump cursor, never blocks)
//! ├── attribute columns × schema.len() (AtomicU32 words, frame-major)
//! ├── mask / local cell columns (one word per slot)
//! └── next link / insertion cursor (one word per frame)
//! ```
//!
//! # Capacity
//!
//! The pool never grows. An exhausted allocator answers `None`; whether
//! that aborts a step is the caller's decision.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod config;
pub mod error;
pub mod handle;
pub mod pool;
pub mod slab;

pub use config::SlabConfig;
pub use error::SlabError;
pub use handle::FrameHandle;
pub use pool::{FramePool, FrameRef, SLOT_LIVE};
pub use slab::SlabAllocator;
