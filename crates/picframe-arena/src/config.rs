//! Frame pool configuration parameters.

use crate::error::SlabError;

/// Configuration for the frame pool and its slab allocator.
///
/// Validated at construction; all values are immutable after creation.
/// The pool never grows: `max_frames` is a hard ceiling.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SlabConfig {
    /// Number of frames the pool can hand out at once.
    ///
    /// Default: 1024.
    pub max_frames: u32,

    /// Particle slots per frame.
    ///
    /// Default: 256, one slot per cell of an 8x8x4 supercell.
    pub slots_per_frame: u32,
}

impl SlabConfig {
    /// Default frame ceiling.
    pub const DEFAULT_MAX_FRAMES: u32 = 1024;

    /// Default slots per frame.
    pub const DEFAULT_SLOTS_PER_FRAME: u32 = 256;

    /// Largest accepted frame count. `u32::MAX` is the null link.
    pub const MAX_FRAMES_LIMIT: u32 = u32::MAX - 1;

    /// Create a config with the given frame ceiling and slot count.
    pub fn new(max_frames: u32, slots_per_frame: u32) -> Self {
        Self {
            max_frames,
            slots_per_frame,
        }
    }

    /// Check the structural constraints.
    pub fn validate(&self) -> Result<(), SlabError> {
        if self.max_frames == 0 || self.max_frames > Self::MAX_FRAMES_LIMIT {
            return Err(SlabError::InvalidConfig {
                reason: format!(
                    "max_frames must be in 1..={}, got {}",
                    Self::MAX_FRAMES_LIMIT,
                    self.max_frames
                ),
            });
        }
        if self.slots_per_frame == 0 {
            return Err(SlabError::InvalidConfig {
                reason: "slots_per_frame must be non-zero".into(),
            });
        }
        let total = self.max_frames as u64 * self.slots_per_frame as u64;
        if total > usize::MAX as u64 / 16 {
            return Err(SlabError::InvalidConfig {
                reason: format!("{total} slots do not fit in memory"),
            });
        }
        Ok(())
    }

    /// Total slot count across all frames.
    pub fn total_slots(&self) -> usize {
        self.max_frames as usize * self.slots_per_frame as usize
    }
}

impl Default for SlabConfig {
    fn default() -> Self {
        Self::new(Self::DEFAULT_MAX_FRAMES, Self::DEFAULT_SLOTS_PER_FRAME)
    }
}
