//! Particle attribute schema and typed attribute keys.
//!
//! A [`ParticleSchema`] is sealed once per simulation and shared by every
//! frame. Attributes are stored column-wise; each column holds
//! `components` 32-bit words per slot. Two per-slot columns exist for
//! every schema and are not listed here: the validity mask (`multiMask`)
//! and the local cell index (`localCellIdx`).

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use indexmap::IndexMap;
use smallvec::SmallVec;

use crate::coord::Float3;
use crate::error::SchemaError;
use crate::id::AttributeId;
use crate::record::ParticleRecord;

/// Names reserved for the builtin per-slot columns.
pub const RESERVED_NAMES: [&str; 2] = ["multiMask", "localCellIdx"];

/// Storage class of an attribute.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AttributeKind {
    /// One `f32` per particle.
    Scalar,
    /// A fixed number of `f32` components per particle.
    Vector {
        /// Number of components (e.g. 3 for a position).
        dims: u32,
    },
    /// One `u32` per particle (ids, species indices).
    Index,
}

impl AttributeKind {
    /// Number of 32-bit words this attribute needs per slot.
    pub fn components(&self) -> u32 {
        match self {
            Self::Scalar | Self::Index => 1,
            Self::Vector { dims } => *dims,
        }
    }
}

impl fmt::Display for AttributeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scalar => write!(f, "scalar"),
            Self::Vector { dims } => write!(f, "vector{dims}"),
            Self::Index => write!(f, "index"),
        }
    }
}

/// Definition of one particle attribute.
#[derive(Clone, Debug, PartialEq)]
pub struct AttributeDef {
    /// Name used for lookup (e.g. `"position"`).
    pub name: String,
    /// Storage class.
    pub kind: AttributeKind,
    /// Value written into fresh slots, as raw 32-bit words.
    pub default_bits: SmallVec<[u32; 4]>,
}

impl AttributeDef {
    /// A scalar `f32` attribute.
    pub fn scalar(name: &str, default: f32) -> Self {
        Self {
            name: name.to_string(),
            kind: AttributeKind::Scalar,
            default_bits: SmallVec::from_slice(&[default.to_bits()]),
        }
    }

    /// A 3-component `f32` attribute.
    pub fn vector3(name: &str, default: Float3) -> Self {
        Self {
            name: name.to_string(),
            kind: AttributeKind::Vector { dims: 3 },
            default_bits: default.iter().map(|v| v.to_bits()).collect(),
        }
    }

    /// A `u32` attribute.
    pub fn index(name: &str, default: u32) -> Self {
        Self {
            name: name.to_string(),
            kind: AttributeKind::Index,
            default_bits: SmallVec::from_slice(&[default]),
        }
    }

    /// Number of 32-bit words per slot.
    pub fn components(&self) -> u32 {
        self.kind.components()
    }
}

/// A value type that can be stored in an attribute column.
///
/// Values travel through the frame pool as raw 32-bit words so that every
/// column can be a flat array of `AtomicU32`.
pub trait AttributeValue: Copy + Send + Sync + 'static {
    /// Number of 32-bit words per value.
    const COMPONENTS: u32;

    /// Whether a column of the given kind can hold this type.
    fn accepts(kind: AttributeKind) -> bool;

    /// Encode into `out` (length `COMPONENTS`).
    fn write_bits(self, out: &mut [u32]);

    /// Decode from `bits` (length `COMPONENTS`).
    fn read_bits(bits: &[u32]) -> Self;
}

impl AttributeValue for f32 {
    const COMPONENTS: u32 = 1;

    fn accepts(kind: AttributeKind) -> bool {
        kind == AttributeKind::Scalar
    }

    fn write_bits(self, out: &mut [u32]) {
        out[0] = self.to_bits();
    }

    fn read_bits(bits: &[u32]) -> Self {
        f32::from_bits(bits[0])
    }
}

impl AttributeValue for Float3 {
    const COMPONENTS: u32 = 3;

    fn accepts(kind: AttributeKind) -> bool {
        kind == AttributeKind::Vector { dims: 3 }
    }

    fn write_bits(self, out: &mut [u32]) {
        for (o, v) in out.iter_mut().zip(self) {
            *o = v.to_bits();
        }
    }

    fn read_bits(bits: &[u32]) -> Self {
        [
            f32::from_bits(bits[0]),
            f32::from_bits(bits[1]),
            f32::from_bits(bits[2]),
        ]
    }
}

impl AttributeValue for u32 {
    const COMPONENTS: u32 = 1;

    fn accepts(kind: AttributeKind) -> bool {
        kind == AttributeKind::Index
    }

    fn write_bits(self, out: &mut [u32]) {
        out[0] = self;
    }

    fn read_bits(bits: &[u32]) -> Self {
        bits[0]
    }
}

/// A typed handle to one attribute column.
///
/// Obtained from [`ParticleSchema::key`], which checks that `T` matches the
/// attribute's kind. Holding a key is proof the column exists.
pub struct AttrKey<T> {
    id: AttributeId,
    _value: PhantomData<fn() -> T>,
}

impl<T> AttrKey<T> {
    /// The attribute this key refers to.
    pub fn id(&self) -> AttributeId {
        self.id
    }
}

impl<T> Clone for AttrKey<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for AttrKey<T> {}

impl<T> fmt::Debug for AttrKey<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AttrKey({})", self.id)
    }
}

impl<T> PartialEq for AttrKey<T> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<T> Eq for AttrKey<T> {}

/// Sealed attribute list shared by every frame of a particle buffer.
#[derive(Debug, PartialEq)]
pub struct ParticleSchema {
    attributes: Vec<AttributeDef>,
    by_name: IndexMap<String, AttributeId>,
}

impl ParticleSchema {
    /// Start building a schema.
    pub fn builder() -> SchemaBuilder {
        SchemaBuilder {
            attributes: Vec::new(),
        }
    }

    /// Number of user attributes.
    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    /// Whether the schema has no user attributes.
    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    /// Attribute definitions in id order.
    pub fn attributes(&self) -> &[AttributeDef] {
        &self.attributes
    }

    /// Definition of an attribute by id.
    pub fn def(&self, id: AttributeId) -> Option<&AttributeDef> {
        self.attributes.get(id.0 as usize)
    }

    /// Look up an attribute id by name.
    pub fn id_of(&self, name: &str) -> Option<AttributeId> {
        self.by_name.get(name).copied()
    }

    /// Resolve a typed key, checking that `T` matches the stored kind.
    pub fn key<T: AttributeValue>(&self, name: &str) -> Result<AttrKey<T>, SchemaError> {
        let id = self
            .id_of(name)
            .ok_or_else(|| SchemaError::UnknownAttribute {
                name: name.to_string(),
            })?;
        let kind = self.attributes[id.0 as usize].kind;
        if !T::accepts(kind) {
            return Err(SchemaError::KindMismatch {
                name: name.to_string(),
                stored: kind,
                requested_components: T::COMPONENTS,
            });
        }
        Ok(AttrKey {
            id,
            _value: PhantomData,
        })
    }

    /// Words in one serialised particle record: every attribute plus the
    /// local cell index. The validity mask is never serialised.
    pub fn record_width(&self) -> usize {
        self.attributes
            .iter()
            .map(|a| a.components() as usize)
            .sum::<usize>()
            + 1
    }

    /// Word offset of an attribute inside a serialised record.
    pub fn record_offset(&self, id: AttributeId) -> usize {
        self.attributes[..id.0 as usize]
            .iter()
            .map(|a| a.components() as usize)
            .sum()
    }

    /// Read a typed attribute out of a serialised record.
    pub fn read_from<T: AttributeValue>(&self, key: AttrKey<T>, record: &ParticleRecord) -> T {
        T::read_bits(record.slice(self.record_offset(key.id), T::COMPONENTS as usize))
    }

    /// Overwrite a typed attribute inside a serialised record.
    pub fn write_into<T: AttributeValue>(
        &self,
        key: AttrKey<T>,
        record: &mut ParticleRecord,
        value: T,
    ) {
        let offset = self.record_offset(key.id);
        value.write_bits(record.slice_mut(offset, T::COMPONENTS as usize));
    }
}

/// Builder for [`ParticleSchema`].
#[derive(Debug)]
pub struct SchemaBuilder {
    attributes: Vec<AttributeDef>,
}

impl SchemaBuilder {
    /// Append an attribute. Ids are assigned in insertion order.
    pub fn attribute(mut self, def: AttributeDef) -> Self {
        self.attributes.push(def);
        self
    }

    /// Validate and seal the schema.
    pub fn build(self) -> Result<Arc<ParticleSchema>, SchemaError> {
        let mut by_name = IndexMap::with_capacity(self.attributes.len());
        for (i, def) in self.attributes.iter().enumerate() {
            if RESERVED_NAMES.contains(&def.name.as_str()) {
                return Err(SchemaError::ReservedName {
                    name: def.name.clone(),
                });
            }
            if def.components() == 0 {
                return Err(SchemaError::ZeroComponents {
                    name: def.name.clone(),
                });
            }
            if def.default_bits.len() != def.components() as usize {
                return Err(SchemaError::DefaultWidth {
                    name: def.name.clone(),
                    expected: def.components(),
                    got: def.default_bits.len() as u32,
                });
            }
            if by_name
                .insert(def.name.clone(), AttributeId(i as u32))
                .is_some()
            {
                return Err(SchemaError::DuplicateName {
                    name: def.name.clone(),
                });
            }
        }
        Ok(Arc::new(ParticleSchema {
            attributes: self.attributes,
            by_name,
        }))
    }
}
