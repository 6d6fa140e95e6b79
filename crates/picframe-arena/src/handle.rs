//! Frame handles.
//!
//! A [`FrameHandle`] is an index into the frame arena plus the generation
//! the index had when it was handed out. The generation advances on every
//! free, so a handle kept past its frame's lifetime is caught in O(1).

use std::fmt;

/// Index of a frame in the arena, scoped to one allocation lifetime.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[must_use]
pub struct FrameHandle {
    pub(crate) index: u32,
    pub(crate) generation: u32,
}

impl FrameHandle {
    pub(crate) fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    /// Position of the frame in the arena.
    pub fn index(&self) -> u32 {
        self.index
    }

    /// Generation of the frame index when this handle was issued.
    pub fn generation(&self) -> u32 {
        self.generation
    }
}

impl fmt::Display for FrameHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Frame(idx={}, gen={})", self.index, self.generation)
    }
}

/// Null value for frame links stored as raw `u32` indices.
pub const NIL: u32 = u32::MAX;
