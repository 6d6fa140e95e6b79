//! Kernel-side view of a particle buffer.
//!
//! Each supercell owns a singly linked list of frames, head to tail. Only
//! the tail may have empty slots once [`ParticleBox::fill_gaps`] has run.
//! Removing a particle just clears its mask; the space is reclaimed by the
//! next gap fill.

use std::sync::atomic::Ordering;

use picframe_arena::{FramePool, FrameHandle, FrameRef};
use picframe_core::SuperCellId;
use picframe_space::{AreaMapper, AreaType, MappingDescription};
use smallvec::SmallVec;

use crate::buffer::{ParticleBuffer, NO_FRAME};
use crate::error::{InvariantViolation, ParticleError, ViolationKind};

/// What one gap fill did.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct GapFillStats {
    /// Particles moved into holes.
    pub moved: usize,
    /// Frames returned to the pool.
    pub freed: usize,
}

impl std::ops::AddAssign for GapFillStats {
    fn add_assign(&mut self, rhs: Self) {
        self.moved += rhs.moved;
        self.freed += rhs.freed;
    }
}

/// Shareable handle on a [`ParticleBuffer`].
#[derive(Clone, Copy)]
pub struct ParticleBox<'a> {
    buffer: &'a ParticleBuffer,
}

impl<'a> ParticleBox<'a> {
    pub(crate) fn new(buffer: &'a ParticleBuffer) -> Self {
        Self { buffer }
    }

    /// The frame pool.
    pub fn pool(&self) -> &'a FramePool {
        self.buffer.pool()
    }

    /// The supercell mapping.
    pub fn mapping(&self) -> &'a MappingDescription {
        self.buffer.mapping()
    }

    /// Take an empty frame from the pool.
    pub fn get_empty_frame(&self) -> Result<FrameHandle, ParticleError> {
        let pool = self.pool();
        pool.get_empty_frame()
            .ok_or(ParticleError::CapacityExhausted {
                supercell: None,
                capacity: pool.slab().capacity(),
            })
    }

    /// Append `frame` as the new last frame of `id`.
    ///
    /// Safe to call concurrently for the same supercell; the relative order
    /// of concurrently appended frames is unspecified.
    pub fn set_as_last_frame(
        &self,
        frame: FrameHandle,
        id: SuperCellId,
    ) -> Result<(), ParticleError> {
        let new = self.pool().frame(frame)?;
        new.set_next_index(None);
        let entry = self.buffer.entry(id);
        let prev = entry.tail.swap(new.index(), Ordering::AcqRel);
        if prev == NO_FRAME {
            entry.head.store(new.index(), Ordering::Release);
        } else {
            self.pool().frame_at(prev).set_next_index(Some(new.index()));
        }
        Ok(())
    }

    /// Last frame of `id`, or `None` for an empty supercell.
    pub fn get_last_frame(&self, id: SuperCellId) -> Option<FrameRef<'a>> {
        self.buffer
            .entry(id)
            .tail()
            .map(|i| self.pool().frame_at(i))
    }

    /// First frame of `id`, or `None` for an empty supercell.
    pub fn first_frame(&self, id: SuperCellId) -> Option<FrameRef<'a>> {
        self.buffer
            .entry(id)
            .head()
            .map(|i| self.pool().frame_at(i))
    }

    /// Successor of `frame` in its supercell's list.
    pub fn next_frame(&self, frame: FrameRef<'_>) -> Option<FrameRef<'a>> {
        frame.next_index().map(|i| self.pool().frame_at(i))
    }

    /// Frames of `id`, head first.
    pub fn frames(&self, id: SuperCellId) -> Frames<'a> {
        Frames {
            pool: self.pool(),
            next: self.buffer.entry(id).head(),
        }
    }

    /// Claim a slot for a new particle in `id`.
    ///
    /// The slot comes back live and holding the schema defaults. When the
    /// last frame is full, exactly one frame is allocated and appended.
    pub fn insert(&self, id: SuperCellId) -> Result<(FrameRef<'a>, u32), ParticleError> {
        if let Some(last) = self.get_last_frame(id) {
            if let Some(slot) = last.claim_slot() {
                last.init_slot(slot);
                last.set_live(slot, true);
                return Ok((last, slot));
            }
        }
        let handle = self.get_empty_frame().map_err(|e| e.in_supercell(id))?;
        let frame = self.pool().frame_at(handle.index());
        // Slot 0 is ours before other inserters can see the frame.
        frame.set_cursor(1);
        frame.init_slot(0);
        frame.set_live(0, true);
        self.set_as_last_frame(handle, id)?;
        Ok((frame, 0))
    }

    /// Mark a particle dead. Returns whether it was live.
    pub fn remove(&self, frame: FrameRef<'_>, slot: u32) -> bool {
        frame.kill(slot)
    }

    /// Live particles in `id`.
    pub fn count_particles(&self, id: SuperCellId) -> u32 {
        self.frames(id).map(|f| f.live_count()).sum()
    }

    /// Live particles in every supercell, guard ring included.
    pub fn total_particles(&self) -> u64 {
        (0..self.buffer.supercell_count() as u32)
            .map(|i| self.count_particles(SuperCellId(i)) as u64)
            .sum()
    }

    /// Live particles in the supercells of `area`.
    pub fn count_in(&self, area: AreaType) -> u64 {
        AreaMapper::new(self.mapping(), area)
            .supercells()
            .iter()
            .map(|id| self.count_particles(*id) as u64)
            .sum()
    }

    /// Compact every supercell. See [`fill_gaps`](Self::fill_gaps).
    pub fn fill_all_gaps(&self) -> Result<GapFillStats, ParticleError> {
        let mut stats = GapFillStats::default();
        for i in 0..self.buffer.supercell_count() as u32 {
            stats += self.fill_gaps(SuperCellId(i))?;
        }
        Ok(stats)
    }

    /// Compact one supercell.
    ///
    /// Live particles from the back of the list move into holes nearer the
    /// head until the live particles form a contiguous prefix. Frames left
    /// empty are freed. Afterwards every frame but the last is full and the
    /// last frame's cursor equals its live count. Running it again without
    /// intervening changes moves nothing.
    pub fn fill_gaps(&self, id: SuperCellId) -> Result<GapFillStats, ParticleError> {
        let frames: SmallVec<[FrameRef<'a>; 8]> = self.frames(id).collect();
        if frames.is_empty() {
            return Ok(GapFillStats::default());
        }
        let slots = self.pool().slots_per_frame() as usize;
        let at = |p: usize| (frames[p / slots], (p % slots) as u32);
        let live_at = |p: usize| {
            let (f, s) = at(p);
            f.is_live(s)
        };
        #[cfg(debug_assertions)]
        let before = self.count_particles(id);

        let mut stats = GapFillStats::default();
        let mut hole = 0;
        let mut end = frames.len() * slots;
        loop {
            while hole < end && live_at(hole) {
                hole += 1;
            }
            while end > hole && !live_at(end - 1) {
                end -= 1;
            }
            if hole >= end {
                break;
            }
            let (src, src_slot) = at(end - 1);
            let (dst, dst_slot) = at(hole);
            src.copy_slot_to(src_slot, &dst, dst_slot);
            dst.set_live(dst_slot, true);
            src.set_live(src_slot, false);
            stats.moved += 1;
            hole += 1;
            end -= 1;
        }

        let live = hole;
        let keep = live.div_ceil(slots);
        for frame in &frames[keep..] {
            frame.release()?;
            stats.freed += 1;
        }
        let entry = self.buffer.entry(id);
        if keep == 0 {
            entry.set(None, None);
        } else {
            for frame in &frames[..keep - 1] {
                frame.set_cursor(slots as u32);
            }
            let last = frames[keep - 1];
            last.set_next_index(None);
            last.set_cursor((live - (keep - 1) * slots) as u32);
            entry.set(Some(frames[0].index()), Some(last.index()));
        }

        #[cfg(debug_assertions)]
        {
            debug_assert_eq!(self.count_particles(id), before, "gap fill lost particles in {id}");
            debug_assert_eq!(self.check_supercell(id), Ok(()));
        }
        Ok(stats)
    }

    /// Verify the storage invariant of every supercell.
    ///
    /// Holds after every gap fill and across insertions; removals break it
    /// until the next gap fill.
    pub fn check_invariants(&self) -> Result<(), InvariantViolation> {
        (0..self.buffer.supercell_count() as u32)
            .try_for_each(|i| self.check_supercell(SuperCellId(i)))
    }

    /// Verify the storage invariant of one supercell.
    pub fn check_supercell(&self, id: SuperCellId) -> Result<(), InvariantViolation> {
        let violation = |frame, kind| InvariantViolation {
            supercell: id,
            frame,
            kind,
        };
        let slots = self.pool().slots_per_frame();
        let mut last = None;
        for frame in self.frames(id) {
            if frame.handle().is_none() {
                return Err(violation(Some(frame.index()), ViolationKind::DeadFrame));
            }
            let live = frame.live_count();
            if frame.next_index().is_some() {
                if live != slots {
                    return Err(violation(
                        Some(frame.index()),
                        ViolationKind::PartialInnerFrame { live, slots },
                    ));
                }
            } else if frame.cursor() != live {
                return Err(violation(
                    Some(frame.index()),
                    ViolationKind::CursorMismatch {
                        cursor: frame.cursor(),
                        live,
                    },
                ));
            }
            last = Some(frame.index());
        }
        let tail = self.buffer.entry(id).tail();
        if tail != last {
            return Err(violation(None, ViolationKind::TailMismatch { tail, last }));
        }
        Ok(())
    }

    /// Free every frame of `id`. Returns the number of live particles
    /// dropped.
    pub fn delete_supercell(&self, id: SuperCellId) -> Result<u32, ParticleError> {
        let frames: SmallVec<[FrameRef<'a>; 8]> = self.frames(id).collect();
        let mut dropped = 0;
        for frame in frames {
            dropped += frame.live_count();
            frame.release()?;
        }
        self.buffer.entry(id).set(None, None);
        Ok(dropped)
    }

    /// Empty every guard supercell. Returns the number of particles dropped.
    pub fn delete_guard_particles(&self) -> Result<u64, ParticleError> {
        let mut dropped = 0;
        for id in AreaMapper::new(self.mapping(), AreaType::GUARD).supercells() {
            dropped += self.delete_supercell(*id)? as u64;
        }
        Ok(dropped)
    }
}

impl std::fmt::Debug for ParticleBox<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParticleBox")
            .field("supercells", &self.buffer.supercell_count())
            .finish()
    }
}

/// Iterator over one supercell's frames.
pub struct Frames<'a> {
    pool: &'a FramePool,
    next: Option<u32>,
}

impl<'a> Iterator for Frames<'a> {
    type Item = FrameRef<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let frame = self.pool.frame_at(self.next?);
        self.next = frame.next_index();
        Some(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use picframe_arena::SlabConfig;
    use picframe_core::{AttributeDef, Coord3, ParticleSchema};

    fn buffer(frames: u32, slots: u32) -> ParticleBuffer {
        let schema = ParticleSchema::builder()
            .attribute(AttributeDef::scalar("mass", 1.0))
            .attribute(AttributeDef::index("tag", 0))
            .build()
            .unwrap();
        let mapping =
            MappingDescription::new(Coord3::splat(2), Coord3::splat(1), Coord3::ZERO).unwrap();
        ParticleBuffer::new(schema, SlabConfig::new(frames, slots), mapping).unwrap()
    }

    fn tags(pbox: &ParticleBox<'_>, id: SuperCellId) -> Vec<u32> {
        let tag = pbox.pool().schema().key::<u32>("tag").unwrap();
        let mut out: Vec<u32> = pbox
            .frames(id)
            .flat_map(|f| (0..f.slots()).filter(move |&s| f.is_live(s)).map(move |s| f.get(tag, s)))
            .collect();
        out.sort_unstable();
        out
    }

    #[test]
    fn empty_supercell_has_no_frames() {
        let buf = buffer(4, 4);
        let pbox = buf.particle_box();
        assert!(pbox.get_last_frame(SuperCellId(0)).is_none());
        assert!(pbox.first_frame(SuperCellId(0)).is_none());
        assert_eq!(pbox.frames(SuperCellId(0)).count(), 0);
    }

    #[test]
    fn set_as_last_frame_links_in_order() {
        let buf = buffer(4, 4);
        let pbox = buf.particle_box();
        let a = pbox.get_empty_frame().unwrap();
        let b = pbox.get_empty_frame().unwrap();
        pbox.set_as_last_frame(a, SuperCellId(1)).unwrap();
        pbox.set_as_last_frame(b, SuperCellId(1)).unwrap();
        let order: Vec<u32> = pbox.frames(SuperCellId(1)).map(|f| f.index()).collect();
        assert_eq!(order, vec![a.index(), b.index()]);
        assert_eq!(pbox.get_last_frame(SuperCellId(1)).unwrap().index(), b.index());
        let first = pbox.first_frame(SuperCellId(1)).unwrap();
        assert_eq!(pbox.next_frame(first).unwrap().index(), b.index());
    }

    #[test]
    fn insert_grows_by_one_frame_when_full() {
        let buf = buffer(4, 2);
        let pbox = buf.particle_box();
        let id = SuperCellId(0);
        pbox.insert(id).unwrap();
        pbox.insert(id).unwrap();
        assert_eq!(pbox.frames(id).count(), 1);
        pbox.insert(id).unwrap();
        assert_eq!(pbox.frames(id).count(), 2);
        assert_eq!(pbox.count_particles(id), 3);
        pbox.check_invariants().unwrap();
    }

    #[test]
    fn insert_reports_exhaustion_with_supercell() {
        let buf = buffer(1, 1);
        let pbox = buf.particle_box();
        pbox.insert(SuperCellId(2)).unwrap();
        let err = pbox.insert(SuperCellId(2)).unwrap_err();
        assert_eq!(
            err,
            ParticleError::CapacityExhausted {
                supercell: Some(SuperCellId(2)),
                capacity: 1
            }
        );
        assert_eq!(pbox.count_particles(SuperCellId(2)), 1);
    }

    #[test]
    fn gap_fill_compacts_and_frees_tail() {
        let buf = buffer(8, 4);
        let pbox = buf.particle_box();
        let tag = buf.schema().key::<u32>("tag").unwrap();
        let id = SuperCellId(3);
        let mut slots = Vec::new();
        for t in 0..10 {
            let (f, s) = pbox.insert(id).unwrap();
            f.set(tag, s, t);
            slots.push((f, s));
        }
        for &(f, s) in slots.iter().step_by(2) {
            assert!(pbox.remove(f, s));
        }
        assert!(pbox.check_supercell(id).is_err());

        let stats = pbox.fill_all_gaps().unwrap();
        assert_eq!(pbox.count_particles(id), 5);
        assert_eq!(pbox.frames(id).count(), 2);
        assert_eq!(stats.freed, 1);
        assert_eq!(tags(&pbox, id), vec![1, 3, 5, 7, 9]);
        pbox.check_invariants().unwrap();
        assert_eq!(buf.pool().slab().live_frames(), 2);
    }

    #[test]
    fn gap_fill_of_emptied_supercell_frees_everything() {
        let buf = buffer(4, 2);
        let pbox = buf.particle_box();
        let id = SuperCellId(0);
        let (f, s) = pbox.insert(id).unwrap();
        pbox.remove(f, s);
        pbox.fill_gaps(id).unwrap();
        assert!(pbox.first_frame(id).is_none());
        assert!(pbox.get_last_frame(id).is_none());
        assert_eq!(buf.pool().slab().live_frames(), 0);
    }

    #[test]
    fn gap_fill_is_idempotent() {
        let buf = buffer(8, 4);
        let pbox = buf.particle_box();
        let id = SuperCellId(5);
        let handles: Vec<_> = (0..9).map(|_| pbox.insert(id).unwrap()).collect();
        pbox.remove(handles[1].0, handles[1].1);
        pbox.remove(handles[6].0, handles[6].1);
        pbox.fill_gaps(id).unwrap();
        let second = pbox.fill_gaps(id).unwrap();
        assert_eq!(second, GapFillStats::default());
    }

    #[test]
    fn delete_supercell_returns_frames() {
        let buf = buffer(4, 2);
        let pbox = buf.particle_box();
        for _ in 0..3 {
            pbox.insert(SuperCellId(1)).unwrap();
        }
        assert_eq!(pbox.delete_supercell(SuperCellId(1)).unwrap(), 3);
        assert_eq!(buf.pool().slab().live_frames(), 0);
        assert_eq!(pbox.total_particles(), 0);
    }

    #[test]
    fn tail_mismatch_detected() {
        let buf = buffer(4, 2);
        let pbox = buf.particle_box();
        pbox.insert(SuperCellId(0)).unwrap();
        let stray = pbox.get_empty_frame().unwrap();
        buf.entry(SuperCellId(0))
            .tail
            .store(stray.index(), Ordering::Release);
        let err = pbox.check_supercell(SuperCellId(0)).unwrap_err();
        assert!(matches!(err.kind, ViolationKind::TailMismatch { .. }));
    }
}
