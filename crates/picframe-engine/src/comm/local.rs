//! In-process communicator over crossbeam channels.

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

use crossbeam_channel::{unbounded, Receiver, Sender};
use picframe_core::DeviceRank;

use super::{Communicator, Message, Tag};
use crate::error::CommError;

struct Envelope {
    tag: Tag,
    message: Message,
}

/// One device's endpoint of a fully connected channel mesh.
///
/// There is one unbounded channel per ordered pair of ranks, so sends never
/// block. A receive for one tag stashes whatever other-tagged messages it
/// has to read past and serves them to later receives in arrival order.
pub struct LocalCommunicator {
    rank: DeviceRank,
    to: Vec<Sender<Envelope>>,
    from: Vec<Receiver<Envelope>>,
    stash: Vec<Mutex<VecDeque<Envelope>>>,
}

impl LocalCommunicator {
    /// Endpoints for `n` devices; element `i` belongs to rank `i`.
    pub fn mesh(n: usize) -> Vec<Self> {
        let mut senders: Vec<Vec<Sender<Envelope>>> = (0..n).map(|_| Vec::with_capacity(n)).collect();
        let mut receivers: Vec<Vec<Receiver<Envelope>>> =
            (0..n).map(|_| Vec::with_capacity(n)).collect();
        for src in 0..n {
            for dst in 0..n {
                let (tx, rx) = unbounded();
                senders[src].push(tx);
                // receivers[dst] is indexed by src, filled in src order.
                receivers[dst].push(rx);
            }
        }
        senders
            .into_iter()
            .zip(receivers)
            .enumerate()
            .map(|(rank, (to, from))| Self {
                rank: DeviceRank(rank as u32),
                to,
                from,
                stash: (0..n).map(|_| Mutex::new(VecDeque::new())).collect(),
            })
            .collect()
    }

    fn check(&self, peer: DeviceRank) -> Result<usize, CommError> {
        let i = peer.index();
        if i < self.to.len() {
            Ok(i)
        } else {
            Err(CommError::InvalidRank {
                rank: peer,
                size: self.to.len(),
            })
        }
    }
}

impl Communicator for LocalCommunicator {
    fn rank(&self) -> DeviceRank {
        self.rank
    }

    fn size(&self) -> usize {
        self.to.len()
    }

    fn send(&self, dest: DeviceRank, tag: Tag, message: Message) -> Result<(), CommError> {
        let i = self.check(dest)?;
        self.to[i]
            .send(Envelope { tag, message })
            .map_err(|_| CommError::PeerDisconnected { peer: dest })
    }

    fn recv(&self, src: DeviceRank, tag: Tag) -> Result<Message, CommError> {
        let i = self.check(src)?;
        let mut stash = self.stash[i].lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(pos) = stash.iter().position(|e| e.tag == tag) {
            if let Some(envelope) = stash.remove(pos) {
                return Ok(envelope.message);
            }
        }
        loop {
            let envelope = self.from[i]
                .recv()
                .map_err(|_| CommError::PeerDisconnected { peer: src })?;
            if envelope.tag == tag {
                return Ok(envelope.message);
            }
            stash.push_back(envelope);
        }
    }
}

// Compile-time assertion: endpoints move into device threads.
const _: fn() = || {
    fn assert_send<T: Send>() {}
    assert_send::<LocalCommunicator>();
};
