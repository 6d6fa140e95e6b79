//! Serialised particle records, the unit carried by exchanges.

use smallvec::SmallVec;

/// One particle flattened to raw 32-bit words.
///
/// Layout: every schema attribute in id order (each `components` words),
/// followed by the local cell index. The validity mask is implicit: only
/// live particles are ever serialised.
///
/// Sixteen inline words cover position, momentum, mass, charge and a few
/// ids without touching the heap.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ParticleRecord {
    /// Raw attribute words.
    pub words: SmallVec<[u32; 16]>,
}

impl ParticleRecord {
    /// An empty record with room for `width` words.
    pub fn with_width(width: usize) -> Self {
        Self {
            words: SmallVec::with_capacity(width),
        }
    }

    /// Number of words.
    pub fn len(&self) -> usize {
        self.words.len()
    }

    /// Whether the record carries no words.
    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Words `[offset, offset + len)`.
    pub fn slice(&self, offset: usize, len: usize) -> &[u32] {
        &self.words[offset..offset + len]
    }

    /// Mutable words `[offset, offset + len)`.
    pub fn slice_mut(&mut self, offset: usize, len: usize) -> &mut [u32] {
        &mut self.words[offset..offset + len]
    }
}
