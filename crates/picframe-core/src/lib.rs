//! Core types for the picframe particle-in-cell substrate.
//!
//! This is the leaf crate with zero internal dependencies. It defines
//! the vocabulary every other crate speaks: identifiers, 3-D coordinates,
//! the particle attribute schema, serialised particle records and the
//! step-level error taxonomy.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod coord;
pub mod error;
pub mod id;
pub mod record;
pub mod schema;

pub use coord::{float3, Coord3, Float3};
pub use error::{SchemaError, StepError};
pub use id::{AttributeId, DeviceRank, StepId, SuperCellId};
pub use record::ParticleRecord;
pub use schema::{
    AttrKey, AttributeDef, AttributeKind, AttributeValue, ParticleSchema, SchemaBuilder,
};
