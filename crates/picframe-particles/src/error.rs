//! Errors raised by particle list operations.

use std::error::Error;
use std::fmt;

use picframe_arena::SlabError;
use picframe_core::{Float3, StepError, StepId, SuperCellId};

/// Errors from inserting, moving or compacting particles.
#[derive(Clone, Debug, PartialEq)]
pub enum ParticleError {
    /// The frame pool had no free frame.
    CapacityExhausted {
        /// Supercell that needed the frame, if known.
        supercell: Option<SuperCellId>,
        /// Frame capacity of the pool.
        capacity: u32,
    },
    /// A particle's new cell lies beyond the guard ring.
    Escaped {
        /// Supercell the particle was leaving.
        supercell: SuperCellId,
        /// Its position.
        position: Float3,
    },
    /// A received particle does not belong to this device's local domain.
    Misrouted {
        /// Its position.
        position: Float3,
    },
    /// A particle position is NaN or infinite.
    NonFinitePosition {
        /// Supercell holding the particle, if it was stored already.
        supercell: Option<SuperCellId>,
        /// Its position.
        position: Float3,
    },
    /// The frame pool rejected a frame operation.
    Arena(SlabError),
}

impl ParticleError {
    /// Attach the supercell a capacity failure occurred in.
    pub fn in_supercell(self, id: SuperCellId) -> Self {
        match self {
            Self::CapacityExhausted { capacity, .. } => Self::CapacityExhausted {
                supercell: Some(id),
                capacity,
            },
            other => other,
        }
    }

    /// Convert into a step-level error.
    pub fn at_step(self, step: StepId) -> StepError {
        match self {
            Self::CapacityExhausted {
                supercell,
                capacity,
            } => StepError::CapacityExhausted {
                supercell,
                step,
                capacity,
            },
            Self::Escaped { supercell, .. } => StepError::ParticleEscaped {
                supercell: Some(supercell),
                step,
            },
            Self::Misrouted { .. } => StepError::ParticleEscaped {
                supercell: None,
                step,
            },
            Self::NonFinitePosition {
                supercell,
                position,
            } => StepError::InvariantViolated {
                supercell,
                step,
                reason: format!("non-finite particle position {position:?}"),
            },
            Self::Arena(e) => StepError::InvariantViolated {
                supercell: None,
                step,
                reason: e.to_string(),
            },
        }
    }
}

impl fmt::Display for ParticleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CapacityExhausted {
                supercell: Some(sc),
                capacity,
            } => write!(f, "no free frame for supercell {sc} (capacity {capacity})"),
            Self::CapacityExhausted {
                supercell: None,
                capacity,
            } => write!(f, "no free frame (capacity {capacity})"),
            Self::Escaped {
                supercell,
                position,
            } => write!(
                f,
                "particle at {position:?} left supercell {supercell} beyond the guard ring"
            ),
            Self::Misrouted { position } => {
                write!(f, "received particle at {position:?} outside the local domain")
            }
            Self::NonFinitePosition {
                supercell: Some(sc),
                position,
            } => write!(f, "particle in supercell {sc} has non-finite position {position:?}"),
            Self::NonFinitePosition {
                supercell: None,
                position,
            } => write!(f, "particle has non-finite position {position:?}"),
            Self::Arena(e) => write!(f, "frame pool: {e}"),
        }
    }
}

impl Error for ParticleError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Arena(e) => Some(e),
            _ => None,
        }
    }
}

impl From<SlabError> for ParticleError {
    fn from(e: SlabError) -> Self {
        Self::Arena(e)
    }
}

/// A broken storage invariant, found by
/// [`ParticleBox::check_invariants`](crate::ParticleBox::check_invariants).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InvariantViolation {
    /// The offending supercell.
    pub supercell: SuperCellId,
    /// Arena index of the offending frame, if one is to blame.
    pub frame: Option<u32>,
    /// What is wrong.
    pub kind: ViolationKind,
}

/// The ways a supercell's frame list can be malformed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ViolationKind {
    /// A frame other than the last has empty slots.
    PartialInnerFrame {
        /// Live slots in the frame.
        live: u32,
        /// Slots per frame.
        slots: u32,
    },
    /// The last frame's insertion cursor disagrees with its live prefix.
    CursorMismatch {
        /// Cursor value.
        cursor: u32,
        /// Live slots.
        live: u32,
    },
    /// The tail field does not point at the end of the list.
    TailMismatch {
        /// Frame the tail field names.
        tail: Option<u32>,
        /// Frame traversal ended at.
        last: Option<u32>,
    },
    /// A linked frame is not allocated.
    DeadFrame,
}

impl InvariantViolation {
    /// Convert into a step-level error.
    pub fn at_step(self, step: StepId) -> StepError {
        StepError::InvariantViolated {
            supercell: Some(self.supercell),
            step,
            reason: self.kind_message(),
        }
    }

    fn kind_message(&self) -> String {
        let frame = self
            .frame
            .map(|f| format!("frame {f}: "))
            .unwrap_or_default();
        match &self.kind {
            ViolationKind::PartialInnerFrame { live, slots } => {
                format!("{frame}inner frame has {live} of {slots} slots live")
            }
            ViolationKind::CursorMismatch { cursor, live } => {
                format!("{frame}cursor {cursor} but {live} live slots")
            }
            ViolationKind::TailMismatch { tail, last } => {
                format!("tail names {tail:?}, list ends at {last:?}")
            }
            ViolationKind::DeadFrame => format!("{frame}linked frame is not allocated"),
        }
    }
}

impl fmt::Display for InvariantViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "supercell {}: {}", self.supercell, self.kind_message())
    }
}

impl Error for InvariantViolation {}
