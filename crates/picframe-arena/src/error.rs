//! Arena-specific error types.

use std::error::Error;
use std::fmt;

use crate::handle::FrameHandle;

/// Errors that can occur during frame pool operations.
///
/// Exhaustion is deliberately absent: [`SlabAllocator::allocate`](crate::SlabAllocator::allocate)
/// reports it by returning `None`, leaving the reaction to the caller.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SlabError {
    /// The configuration violates a structural constraint.
    InvalidConfig {
        /// What went wrong.
        reason: String,
    },
    /// The handle refers to a frame that has since been freed and possibly
    /// reissued.
    StaleHandle {
        /// The offending handle.
        handle: FrameHandle,
        /// Current generation of the frame index.
        current_generation: u32,
    },
    /// The handle was freed twice.
    DoubleFree {
        /// The offending handle.
        handle: FrameHandle,
    },
    /// The handle's index lies outside the pool.
    OutOfRange {
        /// The offending handle.
        handle: FrameHandle,
        /// Number of frames in the pool.
        capacity: u32,
    },
    /// A frame index reached through a list link is not currently issued.
    NotLive {
        /// The frame index.
        index: u32,
    },
}

impl fmt::Display for SlabError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidConfig { reason } => write!(f, "invalid slab config: {reason}"),
            Self::StaleHandle {
                handle,
                current_generation,
            } => write!(
                f,
                "stale handle {handle}: frame is at generation {current_generation}"
            ),
            Self::DoubleFree { handle } => write!(f, "frame {handle} freed twice"),
            Self::OutOfRange { handle, capacity } => {
                write!(f, "frame {handle} outside pool of {capacity} frames")
            }
            Self::NotLive { index } => write!(f, "frame index {index} is not allocated")
        }
    }
}

impl Error for SlabError {}
