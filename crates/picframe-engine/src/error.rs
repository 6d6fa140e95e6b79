//! Engine error types.

use std::error::Error;
use std::fmt;

use picframe_arena::SlabError;
use picframe_core::{DeviceRank, SchemaError, StepError, StepId};
use picframe_space::SpaceError;

use crate::comm::Tag;
use crate::config::ConfigError;

/// Failures of point-to-point or collective messaging.
///
/// All of them are fatal for the run: there is no partial-failure mode
/// for a collective.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CommError {
    /// The peer's endpoint is gone.
    PeerDisconnected {
        /// The unreachable peer.
        peer: DeviceRank,
    },
    /// A rank outside the communicator was addressed.
    InvalidRank {
        /// The offending rank.
        rank: DeviceRank,
        /// Number of ranks in the communicator.
        size: usize,
    },
    /// A message of the wrong kind arrived on a tag.
    UnexpectedMessage {
        /// Sender.
        peer: DeviceRank,
        /// Tag the message arrived on.
        tag: Tag,
        /// Kind of message received.
        got: &'static str,
    },
    /// A buffer arrived with a different length than the receiving region.
    LengthMismatch {
        /// Sender.
        peer: DeviceRank,
        /// Values the receiver expected.
        expected: usize,
        /// Values received.
        got: usize,
    },
}

impl CommError {
    /// Convert into a step-level error reported by `rank`.
    pub fn at_step(self, rank: DeviceRank, step: StepId) -> StepError {
        StepError::Communication {
            rank,
            step,
            reason: self.to_string(),
        }
    }
}

impl fmt::Display for CommError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PeerDisconnected { peer } => write!(f, "peer {peer} disconnected"),
            Self::InvalidRank { rank, size } => {
                write!(f, "rank {rank} outside communicator of {size}")
            }
            Self::UnexpectedMessage { peer, tag, got } => {
                write!(f, "unexpected {got} message from {peer} on tag {tag}")
            }
            Self::LengthMismatch {
                peer,
                expected,
                got,
            } => write!(f, "peer {peer} sent {got} values, expected {expected}"),
        }
    }
}

impl Error for CommError {}

/// Errors registering or using an exchange.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ExchangeError {
    /// An exchange with this tag is already registered.
    DuplicateTag {
        /// The repeated tag.
        tag: u32,
    },
    /// No exchange is registered under this tag.
    UnknownTag {
        /// The missing tag.
        tag: u32,
    },
    /// The tag collides with the engine's reserved message tags.
    ReservedTag {
        /// The reserved tag.
        tag: u32,
    },
    /// The direction mask selects no direction.
    EmptyMask {
        /// Tag of the offending exchange.
        tag: u32,
    },
    /// The guard width does not fit the exchange kind.
    InvalidGuard {
        /// Tag of the offending exchange.
        tag: u32,
        /// What is wrong with it.
        reason: String,
    },
}

impl fmt::Display for ExchangeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateTag { tag } => write!(f, "exchange tag {tag} already registered"),
            Self::UnknownTag { tag } => write!(f, "no exchange registered with tag {tag}"),
            Self::ReservedTag { tag } => write!(f, "exchange tag {tag} is reserved"),
            Self::EmptyMask { tag } => write!(f, "exchange {tag} has an empty direction mask"),
            Self::InvalidGuard { tag, reason } => {
                write!(f, "exchange {tag} has an invalid guard: {reason}")
            }
        }
    }
}

impl Error for ExchangeError {}

/// Errors from building or running a simulation.
#[derive(Clone, Debug, PartialEq)]
pub enum SimulationError {
    /// The configuration is invalid.
    Config(ConfigError),
    /// Grid or decomposition setup failed.
    Space(SpaceError),
    /// The frame pool could not be built.
    Arena(SlabError),
    /// The model's schema lacks a required attribute.
    Schema(SchemaError),
    /// Exchange registration failed.
    Exchange(ExchangeError),
    /// Messaging failed outside a step.
    Comm(CommError),
    /// A step failed.
    Step(StepError),
}

impl fmt::Display for SimulationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(e) => write!(f, "config: {e}"),
            Self::Space(e) => write!(f, "space: {e}"),
            Self::Arena(e) => write!(f, "arena: {e}"),
            Self::Schema(e) => write!(f, "schema: {e}"),
            Self::Exchange(e) => write!(f, "exchange: {e}"),
            Self::Comm(e) => write!(f, "communication: {e}"),
            Self::Step(e) => write!(f, "step: {e}"),
        }
    }
}

impl Error for SimulationError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Config(e) => Some(e),
            Self::Space(e) => Some(e),
            Self::Arena(e) => Some(e),
            Self::Schema(e) => Some(e),
            Self::Exchange(e) => Some(e),
            Self::Comm(e) => Some(e),
            Self::Step(e) => Some(e),
        }
    }
}

impl From<ConfigError> for SimulationError {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

impl From<SpaceError> for SimulationError {
    fn from(e: SpaceError) -> Self {
        Self::Space(e)
    }
}

impl From<SlabError> for SimulationError {
    fn from(e: SlabError) -> Self {
        Self::Arena(e)
    }
}

impl From<SchemaError> for SimulationError {
    fn from(e: SchemaError) -> Self {
        Self::Schema(e)
    }
}

impl From<ExchangeError> for SimulationError {
    fn from(e: ExchangeError) -> Self {
        Self::Exchange(e)
    }
}

impl From<CommError> for SimulationError {
    fn from(e: CommError) -> Self {
        Self::Comm(e)
    }
}

impl From<StepError> for SimulationError {
    fn from(e: StepError) -> Self {
        Self::Step(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_error_is_the_source() {
        let inner = StepError::ParticleEscaped {
            supercell: None,
            step: StepId(3),
        };
        let e = SimulationError::from(inner.clone());
        assert_eq!(e.source().map(|s| s.to_string()), Some(inner.to_string()));
        assert!(e.to_string().starts_with("step: "));
    }

    #[test]
    fn comm_error_names_rank_and_step() {
        let e = CommError::PeerDisconnected { peer: DeviceRank(2) }.at_step(DeviceRank(0), StepId(7));
        let msg = e.to_string();
        assert!(msg.contains("step 7"), "{msg}");
        assert!(msg.contains("peer 2 disconnected"), "{msg}");
    }
}
