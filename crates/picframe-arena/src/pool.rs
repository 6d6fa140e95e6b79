//! Structure-of-arrays frame storage.
//!
//! [`FramePool`] owns the slot memory of every frame the slab allocator can
//! issue. Each attribute is one flat column of 32-bit words, frame-major:
//! word `(frame * slots + slot) * components + c` holds component `c` of
//! `slot` in `frame`. Two builtin columns carry the validity mask and the
//! local cell index; two per-frame words carry the list link and the
//! insertion cursor.
//!
//! Every word is an atomic so that all lanes of a kernel can work through a
//! shared `&FramePool`. Plain loads and stores use `Relaxed`; ordering
//! between lanes comes from the executor's barriers.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use picframe_core::{AttrKey, AttributeValue, ParticleRecord, ParticleSchema};

use crate::config::SlabConfig;
use crate::error::SlabError;
use crate::handle::{FrameHandle, NIL};
use crate::slab::SlabAllocator;

/// Mask value of a live slot.
pub const SLOT_LIVE: u32 = 1;

/// One attribute column.
struct Column {
    components: u32,
    words: Box<[AtomicU32]>,
}

impl Column {
    fn new(components: u32, slots: usize) -> Self {
        Self {
            components,
            words: (0..slots * components as usize)
                .map(|_| AtomicU32::new(0))
                .collect(),
        }
    }
}

/// Arena of frames plus the allocator that hands them out.
pub struct FramePool {
    schema: Arc<ParticleSchema>,
    config: SlabConfig,
    slab: SlabAllocator,
    columns: Vec<Column>,
    mask: Box<[AtomicU32]>,
    local_cell: Box<[AtomicU32]>,
    next: Box<[AtomicU32]>,
    fill: Box<[AtomicU32]>,
}

// Compile-time assertion: the pool is shared by reference across lanes.
const _: fn() = || {
    fn assert<T: Send + Sync>() {}
    assert::<FramePool>();
};

impl FramePool {
    /// Allocate backing storage for `config.max_frames` frames of `schema`.
    pub fn new(schema: Arc<ParticleSchema>, config: SlabConfig) -> Result<Self, SlabError> {
        config.validate()?;
        let total = config.total_slots();
        let frames = config.max_frames as usize;
        let columns = schema
            .attributes()
            .iter()
            .map(|def| Column::new(def.components(), total))
            .collect();
        log::debug!(
            "frame pool: {} frames x {} slots, {} attribute columns",
            config.max_frames,
            config.slots_per_frame,
            schema.len()
        );
        Ok(Self {
            slab: SlabAllocator::new(config.max_frames),
            columns,
            mask: (0..total).map(|_| AtomicU32::new(0)).collect(),
            local_cell: (0..total).map(|_| AtomicU32::new(0)).collect(),
            next: (0..frames).map(|_| AtomicU32::new(NIL)).collect(),
            fill: (0..frames).map(|_| AtomicU32::new(0)).collect(),
            schema,
            config,
        })
    }

    /// Take an empty frame from the allocator.
    ///
    /// The frame comes back with every slot dead, its cursor at zero and no
    /// successor. Returns `None` if the pool is exhausted.
    pub fn get_empty_frame(&self) -> Option<FrameHandle> {
        let handle = self.slab.allocate()?;
        let frame = self.frame_at(handle.index);
        frame.reset();
        Some(handle)
    }

    /// Return a frame to the allocator.
    pub fn free_frame(&self, handle: FrameHandle) -> Result<(), SlabError> {
        self.slab.free(handle)
    }

    /// Checked view of a frame.
    pub fn frame(&self, handle: FrameHandle) -> Result<FrameRef<'_>, SlabError> {
        self.slab.validate(handle)?;
        Ok(self.frame_at(handle.index))
    }

    /// View of the frame at a raw index.
    ///
    /// Used by list traversal, where indices come from links the list
    /// itself maintains. Debug builds assert the index is live.
    pub fn frame_at(&self, index: u32) -> FrameRef<'_> {
        debug_assert!(
            (index as usize) < self.next.len(),
            "frame index {index} outside pool"
        );
        FrameRef { pool: self, index }
    }

    /// The allocator backing this pool.
    pub fn slab(&self) -> &SlabAllocator {
        &self.slab
    }

    /// The shared particle schema.
    pub fn schema(&self) -> &Arc<ParticleSchema> {
        &self.schema
    }

    /// Slots per frame.
    pub fn slots_per_frame(&self) -> u32 {
        self.config.slots_per_frame
    }

    /// Pool configuration.
    pub fn config(&self) -> &SlabConfig {
        &self.config
    }

    /// Approximate memory used by slot storage, in bytes.
    pub fn memory_bytes(&self) -> usize {
        let words: usize = self.columns.iter().map(|c| c.words.len()).sum::<usize>()
            + self.mask.len()
            + self.local_cell.len()
            + self.next.len()
            + self.fill.len();
        words * std::mem::size_of::<u32>()
    }

    fn slot_index(&self, frame: u32, slot: u32) -> usize {
        debug_assert!(slot < self.config.slots_per_frame, "slot {slot} out of range");
        frame as usize * self.config.slots_per_frame as usize + slot as usize
    }
}

impl std::fmt::Debug for FramePool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FramePool")
            .field("config", &self.config)
            .field("slab", &self.slab)
            .finish()
    }
}

/// Shared view of one frame.
///
/// Cheap to copy; all mutation goes through atomics.
#[derive(Clone, Copy)]
pub struct FrameRef<'a> {
    pool: &'a FramePool,
    index: u32,
}

impl<'a> FrameRef<'a> {
    /// Arena index of this frame.
    pub fn index(&self) -> u32 {
        self.index
    }

    /// Current handle of this frame, if it is live.
    pub fn handle(&self) -> Option<FrameHandle> {
        self.pool.slab.handle_at(self.index)
    }

    /// Return this frame to the allocator.
    pub fn release(self) -> Result<(), SlabError> {
        let handle = self
            .handle()
            .ok_or(SlabError::NotLive { index: self.index })?;
        self.pool.free_frame(handle)
    }

    /// Number of slots.
    pub fn slots(&self) -> u32 {
        self.pool.config.slots_per_frame
    }

    /// Whether `slot` holds a live particle.
    pub fn is_live(&self, slot: u32) -> bool {
        self.mask_word(slot).load(Ordering::Relaxed) == SLOT_LIVE
    }

    /// Mark `slot` live or dead.
    pub fn set_live(&self, slot: u32, live: bool) {
        let v = if live { SLOT_LIVE } else { 0 };
        self.mask_word(slot).store(v, Ordering::Relaxed);
    }

    /// Invalidate `slot` with an atomic AND. Returns whether it was live.
    ///
    /// Storage is not reclaimed until the next gap fill.
    pub fn kill(&self, slot: u32) -> bool {
        self.mask_word(slot).fetch_and(0, Ordering::AcqRel) == SLOT_LIVE
    }

    /// Read an attribute value.
    pub fn get<T: AttributeValue>(&self, key: AttrKey<T>, slot: u32) -> T {
        let column = &self.pool.columns[key.id().0 as usize];
        let base = self.pool.slot_index(self.index, slot) * column.components as usize;
        let mut bits = [0u32; 16];
        let n = T::COMPONENTS as usize;
        for (c, b) in bits[..n].iter_mut().enumerate() {
            *b = column.words[base + c].load(Ordering::Relaxed);
        }
        T::read_bits(&bits[..n])
    }

    /// Write an attribute value.
    pub fn set<T: AttributeValue>(&self, key: AttrKey<T>, slot: u32, value: T) {
        let column = &self.pool.columns[key.id().0 as usize];
        let base = self.pool.slot_index(self.index, slot) * column.components as usize;
        let mut bits = [0u32; 16];
        let n = T::COMPONENTS as usize;
        value.write_bits(&mut bits[..n]);
        for (c, b) in bits[..n].iter().enumerate() {
            column.words[base + c].store(*b, Ordering::Relaxed);
        }
    }

    /// Local cell index of `slot` within its supercell.
    pub fn local_cell(&self, slot: u32) -> u32 {
        let i = self.pool.slot_index(self.index, slot);
        self.pool.local_cell[i].load(Ordering::Relaxed)
    }

    /// Set the local cell index of `slot`.
    pub fn set_local_cell(&self, slot: u32, cell: u32) {
        let i = self.pool.slot_index(self.index, slot);
        self.pool.local_cell[i].store(cell, Ordering::Relaxed);
    }

    /// Write every attribute's schema default into `slot`.
    pub fn init_slot(&self, slot: u32) {
        let i = self.pool.slot_index(self.index, slot);
        for (column, def) in self.pool.columns.iter().zip(self.pool.schema.attributes()) {
            let base = i * column.components as usize;
            for (c, bits) in def.default_bits.iter().enumerate() {
                column.words[base + c].store(*bits, Ordering::Relaxed);
            }
        }
        self.pool.local_cell[i].store(0, Ordering::Relaxed);
    }

    /// Copy every attribute and the local cell index of `slot` into
    /// `dst_slot` of `dst`. Masks are left untouched.
    pub fn copy_slot_to(&self, slot: u32, dst: &FrameRef<'_>, dst_slot: u32) {
        let src_i = self.pool.slot_index(self.index, slot);
        let dst_i = dst.pool.slot_index(dst.index, dst_slot);
        for column in &self.pool.columns {
            let n = column.components as usize;
            for c in 0..n {
                let v = column.words[src_i * n + c].load(Ordering::Relaxed);
                column.words[dst_i * n + c].store(v, Ordering::Relaxed);
            }
        }
        let cell = self.pool.local_cell[src_i].load(Ordering::Relaxed);
        dst.pool.local_cell[dst_i].store(cell, Ordering::Relaxed);
    }

    /// Serialise `slot` into a record (attributes in id order, then the
    /// local cell index).
    pub fn read_record(&self, slot: u32) -> ParticleRecord {
        let i = self.pool.slot_index(self.index, slot);
        let mut record = ParticleRecord::with_width(self.pool.schema.record_width());
        for column in &self.pool.columns {
            let n = column.components as usize;
            for c in 0..n {
                record.words.push(column.words[i * n + c].load(Ordering::Relaxed));
            }
        }
        record
            .words
            .push(self.pool.local_cell[i].load(Ordering::Relaxed));
        record
    }

    /// Fill `slot` from a record produced by [`read_record`](Self::read_record).
    ///
    /// # Panics
    ///
    /// Panics if the record is shorter than the schema's record width.
    pub fn write_record(&self, slot: u32, record: &ParticleRecord) {
        let i = self.pool.slot_index(self.index, slot);
        let mut offset = 0;
        for column in &self.pool.columns {
            let n = column.components as usize;
            for (c, w) in record.slice(offset, n).iter().enumerate() {
                column.words[i * n + c].store(*w, Ordering::Relaxed);
            }
            offset += n;
        }
        self.pool.local_cell[i].store(record.words[offset], Ordering::Relaxed);
    }

    /// Number of live slots.
    pub fn live_count(&self) -> u32 {
        (0..self.slots()).filter(|&s| self.is_live(s)).count() as u32
    }

    /// Whether every slot is live.
    pub fn is_full(&self) -> bool {
        (0..self.slots()).all(|s| self.is_live(s))
    }

    /// Claim the next never-used slot of this frame.
    ///
    /// Returns `None` once every slot has been claimed since the last
    /// [`set_cursor`](Self::set_cursor). Concurrent callers receive
    /// distinct slots.
    pub fn claim_slot(&self) -> Option<u32> {
        let slots = self.slots();
        self.pool.fill[self.index as usize]
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |c| {
                (c < slots).then_some(c + 1)
            })
            .ok()
    }

    /// Slots claimed so far.
    pub fn cursor(&self) -> u32 {
        self.pool.fill[self.index as usize].load(Ordering::Acquire)
    }

    /// Reset the insertion cursor, e.g. after compaction.
    pub fn set_cursor(&self, value: u32) {
        self.pool.fill[self.index as usize].store(value.min(self.slots()), Ordering::Release);
    }

    /// Arena index of the successor frame, if any.
    pub fn next_index(&self) -> Option<u32> {
        let n = self.pool.next[self.index as usize].load(Ordering::Acquire);
        (n != NIL).then_some(n)
    }

    /// Set the successor link.
    pub fn set_next_index(&self, next: Option<u32>) {
        self.pool.next[self.index as usize].store(next.unwrap_or(NIL), Ordering::Release);
    }

    fn reset(&self) {
        for s in 0..self.slots() {
            self.set_live(s, false);
        }
        self.set_cursor(0);
        self.set_next_index(None);
    }

    fn mask_word(&self, slot: u32) -> &'a AtomicU32 {
        &self.pool.mask[self.pool.slot_index(self.index, slot)]
    }
}

impl std::fmt::Debug for FrameRef<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameRef")
            .field("index", &self.index)
            .field("cursor", &self.cursor())
            .finish()
    }
}
