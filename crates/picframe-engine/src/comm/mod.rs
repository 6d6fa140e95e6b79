//! Point-to-point and collective messaging between devices.
//!
//! [`Communicator`] is the seam the exchange and gather layers talk
//! through. [`LocalCommunicator`] connects devices that run as threads of
//! one process.

mod local;

use std::fmt;

use picframe_core::{DeviceRank, ParticleRecord};

pub use local::LocalCommunicator;

use crate::error::CommError;

/// Identifies which logical stream a message belongs to.
///
/// Messages between the same pair of ranks are delivered in send order
/// per tag; a receive for one tag never consumes a message of another.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Tag {
    /// Stream identifier, such as an exchange's registered tag.
    pub base: u32,
    /// Sub-stream, such as an exchange direction code.
    pub channel: u32,
}

impl Tag {
    /// Base of every tag the engine uses internally; user streams must not
    /// use it.
    pub const RESERVED_BASE: u32 = u32::MAX;
    /// Reserved for [`Communicator::barrier`].
    pub const BARRIER: Self = Self::new(Self::RESERVED_BASE, 0);
    /// Reserved for the gather layer's participation round.
    pub const PARTICIPATE: Self = Self::new(Self::RESERVED_BASE, 1);
    /// Reserved for the gather layer's data round.
    pub const GATHER: Self = Self::new(Self::RESERVED_BASE, 2);

    /// A tag from its parts.
    pub const fn new(base: u32, channel: u32) -> Self {
        Self { base, channel }
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.base, self.channel)
    }
}

/// Message body.
#[derive(Clone, Debug, PartialEq)]
pub enum Message {
    /// Serialised particles.
    Particles(Vec<ParticleRecord>),
    /// Cell values of a scalar field.
    Scalars(Vec<f32>),
    /// A yes/no vote.
    Flag(bool),
    /// Barrier arrival.
    Arrive,
}

impl Message {
    /// Short name of the variant, for diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Particles(_) => "particles",
            Self::Scalars(_) => "scalars",
            Self::Flag(_) => "flag",
            Self::Arrive => "arrive",
        }
    }
}

/// Messaging between the devices of one run.
///
/// Every rank must issue matching collective calls in the same order;
/// there is no timeout, so a rank that skips a collective leaves its peers
/// blocked until it disconnects.
pub trait Communicator: Send {
    /// This device's rank.
    fn rank(&self) -> DeviceRank;

    /// Number of devices.
    fn size(&self) -> usize;

    /// Queue `message` for `dest`. Never blocks.
    fn send(&self, dest: DeviceRank, tag: Tag, message: Message) -> Result<(), CommError>;

    /// Block until a message with `tag` arrives from `src`.
    fn recv(&self, src: DeviceRank, tag: Tag) -> Result<Message, CommError>;

    /// Block until every device has entered the barrier.
    fn barrier(&self) -> Result<(), CommError> {
        let me = self.rank();
        let ranks = (0..self.size() as u32).map(DeviceRank).filter(|&r| r != me);
        for peer in ranks.clone() {
            self.send(peer, Tag::BARRIER, Message::Arrive)?;
        }
        for peer in ranks {
            match self.recv(peer, Tag::BARRIER)? {
                Message::Arrive => {}
                other => {
                    return Err(CommError::UnexpectedMessage {
                        peer,
                        tag: Tag::BARRIER,
                        got: other.kind(),
                    })
                }
            }
        }
        Ok(())
    }
}
