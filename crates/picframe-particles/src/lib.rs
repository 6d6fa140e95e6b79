//! Per-supercell particle storage for the picframe substrate.
//!
//! A [`ParticleBuffer`] owns a frame pool and one frame list per supercell.
//! Kernels work through [`ParticleBox`], a `Copy` view that every lane can
//! hold at once.
//!
//! # Storage invariant
//!
//! After [`ParticleBox::fill_all_gaps`], every frame but the last of each
//! supercell is full. Insertions preserve this; removals only clear a mask
//! bit and leave the repair to the next gap fill.
//!
//! # Movement
//!
//! [`shift_particles`] re-homes particles whose cell changed, possibly
//! into guard supercells. [`pack_guard`] and [`unpack`] carry guard
//! particles to and from neighbouring devices as [`ParticleRecord`]s.
//!
//! [`ParticleRecord`]: picframe_core::ParticleRecord

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod buffer;
pub mod error;
pub mod guard;
pub mod particle_box;
pub mod shift;

pub use buffer::ParticleBuffer;
pub use error::{InvariantViolation, ParticleError, ViolationKind};
pub use guard::{pack_guard, shift_records, unpack};
pub use particle_box::{Frames, GapFillStats, ParticleBox};
pub use shift::{shift_particles, ShiftStats};
