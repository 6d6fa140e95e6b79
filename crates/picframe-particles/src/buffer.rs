//! Owner of a device's particle storage.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use picframe_arena::{FramePool, SlabConfig, SlabError};
use picframe_core::{ParticleSchema, SuperCellId};
use picframe_space::MappingDescription;

use crate::particle_box::ParticleBox;

/// Raw "no frame" value of a head or tail field.
pub(crate) const NO_FRAME: u32 = u32::MAX;

/// Head and tail of one supercell's frame list.
#[derive(Debug)]
pub(crate) struct SuperCellEntry {
    pub(crate) head: AtomicU32,
    pub(crate) tail: AtomicU32,
}

impl SuperCellEntry {
    fn empty() -> Self {
        Self {
            head: AtomicU32::new(NO_FRAME),
            tail: AtomicU32::new(NO_FRAME),
        }
    }

    pub(crate) fn head(&self) -> Option<u32> {
        let h = self.head.load(Ordering::Acquire);
        (h != NO_FRAME).then_some(h)
    }

    pub(crate) fn tail(&self) -> Option<u32> {
        let t = self.tail.load(Ordering::Acquire);
        (t != NO_FRAME).then_some(t)
    }

    pub(crate) fn set(&self, head: Option<u32>, tail: Option<u32>) {
        self.head.store(head.unwrap_or(NO_FRAME), Ordering::Release);
        self.tail.store(tail.unwrap_or(NO_FRAME), Ordering::Release);
    }
}

/// Frame pool plus one frame list per supercell of a mapping.
///
/// Kernels never see the buffer itself; they get a [`ParticleBox`], a
/// `Copy` view that every lane can hold.
pub struct ParticleBuffer {
    pool: FramePool,
    mapping: MappingDescription,
    supercells: Box<[SuperCellEntry]>,
}

// Compile-time assertion: lanes share the buffer by reference.
const _: fn() = || {
    fn assert<T: Send + Sync>() {}
    assert::<ParticleBuffer>();
};

impl ParticleBuffer {
    /// Storage for `mapping.supercell_count()` empty supercells backed by a
    /// pool of `config.max_frames` frames.
    pub fn new(
        schema: Arc<ParticleSchema>,
        config: SlabConfig,
        mapping: MappingDescription,
    ) -> Result<Self, SlabError> {
        let pool = FramePool::new(schema, config)?;
        let supercells = (0..mapping.supercell_count())
            .map(|_| SuperCellEntry::empty())
            .collect();
        Ok(Self {
            pool,
            mapping,
            supercells,
        })
    }

    /// Kernel-side view of this buffer.
    pub fn particle_box(&self) -> ParticleBox<'_> {
        ParticleBox::new(self)
    }

    /// The frame pool.
    pub fn pool(&self) -> &FramePool {
        &self.pool
    }

    /// The supercell mapping.
    pub fn mapping(&self) -> &MappingDescription {
        &self.mapping
    }

    /// The particle schema.
    pub fn schema(&self) -> &Arc<ParticleSchema> {
        self.pool.schema()
    }

    /// Number of supercells, guard ring included.
    pub fn supercell_count(&self) -> usize {
        self.supercells.len()
    }

    pub(crate) fn entry(&self, id: SuperCellId) -> &SuperCellEntry {
        &self.supercells[id.index()]
    }
}

impl std::fmt::Debug for ParticleBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParticleBuffer")
            .field("pool", &self.pool)
            .field("supercells", &self.supercells.len())
            .finish()
    }
}
