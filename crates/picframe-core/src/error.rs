//! Error types shared across the picframe workspace.
//!
//! Two classes of failure exist at the step level: capacity exhaustion
//! (the frame pool ran dry) and defects (a storage invariant was broken).
//! Neither is recoverable inside a step; both carry the supercell and step
//! they were detected in so the run can be aborted with a useful message.

use std::error::Error;
use std::fmt;

use crate::id::{DeviceRank, StepId, SuperCellId};
use crate::schema::AttributeKind;

/// Errors from a simulation step.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StepError {
    /// The frame pool had no free frame for an insertion.
    CapacityExhausted {
        /// Supercell that needed a frame, if known.
        supercell: Option<SuperCellId>,
        /// Step during which the pool ran dry.
        step: StepId,
        /// Configured frame capacity of the pool.
        capacity: u32,
    },
    /// A storage invariant was found broken.
    InvariantViolated {
        /// The offending supercell, if the defect is local to one.
        supercell: Option<SuperCellId>,
        /// Step during which the violation was detected.
        step: StepId,
        /// Description of the violation.
        reason: String,
    },
    /// A particle moved further than the guard ring in one step, or a
    /// received particle fell outside the receiver's local domain.
    ParticleEscaped {
        /// Supercell the particle was leaving, if it had one.
        supercell: Option<SuperCellId>,
        /// Step during which it moved.
        step: StepId,
    },
    /// An outgoing exchange carried more particles than it may hold.
    ExchangeOverflow {
        /// Encoded direction of the exchange.
        direction: u32,
        /// Particles the exchange had to carry.
        requested: usize,
        /// Configured exchange capacity in particles.
        capacity: usize,
    },
    /// A peer device stopped taking part in a collective or exchange.
    Communication {
        /// The device reporting the failure.
        rank: DeviceRank,
        /// Step during which communication broke down.
        step: StepId,
        /// Description from the communicator.
        reason: String,
    },
}

impl fmt::Display for StepError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CapacityExhausted {
                supercell,
                step,
                capacity,
            } => {
                write!(f, "frame pool exhausted at step {step} (capacity {capacity} frames)")?;
                if let Some(sc) = supercell {
                    write!(f, " while filling supercell {sc}")?;
                }
                Ok(())
            }
            Self::InvariantViolated {
                supercell,
                step,
                reason,
            } => match supercell {
                Some(sc) => write!(
                    f,
                    "storage invariant violated in supercell {sc} at step {step}: {reason}"
                ),
                None => write!(f, "storage invariant violated at step {step}: {reason}"),
            },
            Self::ParticleEscaped { supercell, step } => match supercell {
                Some(sc) => write!(
                    f,
                    "particle left supercell {sc} beyond the guard ring at step {step}"
                ),
                None => write!(f, "received particle outside the local domain at step {step}"),
            },
            Self::ExchangeOverflow {
                direction,
                requested,
                capacity,
            } => write!(
                f,
                "exchange {direction} overflow: {requested} particles, capacity {capacity}"
            ),
            Self::Communication { rank, step, reason } => {
                write!(f, "device {rank} communication failed at step {step}: {reason}")
            }
        }
    }
}

impl Error for StepError {}

/// Errors raised while building or querying a [`ParticleSchema`](crate::ParticleSchema).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SchemaError {
    /// Two attributes share a name.
    DuplicateName {
        /// The repeated name.
        name: String,
    },
    /// An attribute uses a name reserved for a builtin column.
    ReservedName {
        /// The reserved name.
        name: String,
    },
    /// An attribute was declared with zero components.
    ZeroComponents {
        /// The attribute name.
        name: String,
    },
    /// The default value has the wrong number of components.
    DefaultWidth {
        /// The attribute name.
        name: String,
        /// Components the kind requires.
        expected: u32,
        /// Components the default provided.
        got: u32,
    },
    /// No attribute of that name exists.
    UnknownAttribute {
        /// The requested name.
        name: String,
    },
    /// The requested value type does not match the stored kind.
    KindMismatch {
        /// The attribute name.
        name: String,
        /// Kind the schema declares.
        stored: AttributeKind,
        /// Components of the requested value type.
        requested_components: u32,
    },
}

impl fmt::Display for SchemaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateName { name } => write!(f, "duplicate attribute '{name}'"),
            Self::ReservedName { name } => write!(f, "attribute name '{name}' is reserved"),
            Self::ZeroComponents { name } => {
                write!(f, "attribute '{name}' has zero components")
            }
            Self::DefaultWidth {
                name,
                expected,
                got,
            } => write!(
                f,
                "attribute '{name}' default has {got} components, expected {expected}"
            ),
            Self::UnknownAttribute { name } => write!(f, "unknown attribute '{name}'"),
            Self::KindMismatch {
                name,
                stored,
                requested_components,
            } => write!(
                f,
                "attribute '{name}' is {stored}, requested a {requested_components}-component value"
            ),
        }
    }
}

impl Error for SchemaError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capacity_message_names_supercell_and_step() {
        let err = StepError::CapacityExhausted {
            supercell: Some(SuperCellId(12)),
            step: StepId(3),
            capacity: 64,
        };
        let msg = err.to_string();
        assert!(msg.contains("step 3"));
        assert!(msg.contains("supercell 12"));
        assert!(msg.contains("64"));
    }

    #[test]
    fn invariant_message_names_supercell() {
        let err = StepError::InvariantViolated {
            supercell: Some(SuperCellId(5)),
            step: StepId(9),
            reason: "frame 2 of 3 has 10 empty slots".into(),
        };
        assert!(err.to_string().contains("supercell 5"));
    }
}
