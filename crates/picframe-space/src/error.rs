//! Error types for grid and decomposition setup.

use picframe_core::Coord3;
use std::fmt;

/// Errors arising from mapping, layout or decomposition construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpaceError {
    /// An extent has a zero or negative component.
    EmptyExtent {
        /// Which extent was empty.
        name: &'static str,
        /// The offending value.
        extent: Coord3,
    },
    /// An extent is not a whole multiple of another.
    NotDivisible {
        /// What was being divided.
        name: &'static str,
        /// The dividend.
        extent: Coord3,
        /// The divisor.
        by: Coord3,
    },
    /// A local domain does not fit inside the global domain.
    LocalOutsideGlobal {
        /// Offset of the local domain.
        offset: Coord3,
        /// Size of the local domain.
        size: Coord3,
        /// Size of the global domain.
        global: Coord3,
    },
    /// A coordinate lies outside the grid it indexes.
    CoordOutOfBounds {
        /// The offending coordinate.
        coord: Coord3,
        /// The valid extent.
        extent: Coord3,
    },
    /// Guard width is negative.
    NegativeGuard {
        /// The offending guard width.
        guard: Coord3,
    },
}

impl fmt::Display for SpaceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyExtent { name, extent } => {
                write!(f, "{name} must be positive in every axis, got {extent}")
            }
            Self::NotDivisible { name, extent, by } => {
                write!(f, "{name} {extent} is not divisible by {by}")
            }
            Self::LocalOutsideGlobal {
                offset,
                size,
                global,
            } => write!(
                f,
                "local domain at {offset} of size {size} exceeds global domain {global}"
            ),
            Self::CoordOutOfBounds { coord, extent } => {
                write!(f, "coordinate {coord} out of bounds for extent {extent}")
            }
            Self::NegativeGuard { guard } => write!(f, "guard width {guard} is negative"),
        }
    }
}

impl std::error::Error for SpaceError {}

/// Reject extents with a non-positive component.
pub(crate) fn require_positive(name: &'static str, extent: Coord3) -> Result<(), SpaceError> {
    if extent.is_positive() {
        Ok(())
    } else {
        Err(SpaceError::EmptyExtent { name, extent })
    }
}
