//! Spatial decomposition for the picframe particle-in-cell substrate.
//!
//! A simulation domain is split over a [`DeviceGrid`], one [`SubGrid`]
//! per device. Each device cuts its local domain into supercells described
//! by a [`MappingDescription`], classifies them into CORE, BORDER and GUARD
//! areas, and talks to up to 26 neighbours addressed by [`Direction`].

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod device;
pub mod direction;
pub mod edge;
pub mod error;
pub mod layout;
pub mod mapping;
pub mod subgrid;

pub use device::{DeviceGrid, NeighborList};
pub use direction::{Direction, DirectionMask, NUMBER_OF_EXCHANGES};
pub use edge::Boundary;
pub use error::SpaceError;
pub use layout::{CellRegion, GridLayout};
pub use mapping::{AreaMapper, AreaType, MappingDescription};
pub use subgrid::{Domain, SubGrid};
