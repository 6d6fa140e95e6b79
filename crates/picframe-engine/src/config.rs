//! Run configuration, validation and error types.
//!
//! [`SimulationConfig`] describes one run: the device grid, the global
//! domain, the supercell geometry, frame pool sizing and the physics
//! parameters the reference kernels read. [`validate()`](SimulationConfig::validate)
//! checks everything that can be checked before any device is built.

use std::error::Error;
use std::fmt;

use picframe_arena::{SlabConfig, SlabError};
use picframe_core::Coord3;
use picframe_space::{MappingDescription, SpaceError};

// ── ConfigError ────────────────────────────────────────────────────

/// Errors detected by [`SimulationConfig::validate()`].
#[derive(Clone, Debug, PartialEq)]
pub enum ConfigError {
    /// Grid geometry is inconsistent.
    Space(SpaceError),
    /// Frame pool sizing is invalid.
    Arena(SlabError),
    /// `lanes` is zero.
    ZeroLanes,
    /// `timestep` is NaN, infinite, zero or negative.
    InvalidTimestep {
        /// The invalid value.
        value: f32,
    },
    /// `epsilon` is NaN, infinite, zero or negative.
    InvalidEpsilon {
        /// The invalid value.
        value: f32,
    },
    /// More initial particles per supercell than it has cells.
    TooManyParticles {
        /// Requested particles per supercell.
        requested: u32,
        /// Cells per supercell.
        cells: u32,
    },
    /// The communicator and the device grid disagree on the device count.
    DeviceCountMismatch {
        /// Devices in the grid.
        devices: usize,
        /// Ranks in the communicator.
        communicator: usize,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Space(e) => write!(f, "space: {e}"),
            Self::Arena(e) => write!(f, "arena: {e}"),
            Self::ZeroLanes => write!(f, "lanes must be at least 1"),
            Self::InvalidTimestep { value } => {
                write!(f, "timestep must be finite and positive, got {value}")
            }
            Self::InvalidEpsilon { value } => {
                write!(f, "epsilon must be finite and positive, got {value}")
            }
            Self::TooManyParticles { requested, cells } => write!(
                f,
                "{requested} particles per supercell exceed its {cells} cells"
            ),
            Self::DeviceCountMismatch {
                devices,
                communicator,
            } => write!(
                f,
                "device grid has {devices} devices but the communicator has {communicator} ranks"
            ),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Space(e) => Some(e),
            Self::Arena(e) => Some(e),
            _ => None,
        }
    }
}

impl From<SpaceError> for ConfigError {
    fn from(e: SpaceError) -> Self {
        Self::Space(e)
    }
}

impl From<SlabError> for ConfigError {
    fn from(e: SlabError) -> Self {
        Self::Arena(e)
    }
}

// ── SimulationConfig ───────────────────────────────────────────────

/// Everything needed to build the devices of one run.
#[derive(Clone, Debug, PartialEq)]
pub struct SimulationConfig {
    /// Devices per axis. Default: 1×1×1.
    pub devices: Coord3,
    /// Per-axis periodicity flags (non-zero = periodic). Default: all periodic.
    pub periodic: Coord3,
    /// Global domain in cells. Default: 16×16×8.
    pub global_cells: Coord3,
    /// Cells per supercell. Default: 8×8×4.
    pub supercell_size: Coord3,
    /// Guard ring width in supercells. Default: 1.
    pub guard_supercells: Coord3,
    /// Slots per frame. Default: 256.
    pub slots_per_frame: u32,
    /// Frame pool capacity per device. Default: 1024.
    pub max_frames: u32,
    /// Particles the fill kernel creates in each CORE and BORDER supercell.
    /// Default: 256.
    pub particles_per_supercell: u32,
    /// Lanes per kernel block. Default: 4.
    pub lanes: usize,
    /// Force softening length. Default: 1e-4.
    pub epsilon: f32,
    /// Integration timestep. Default: 0.1.
    pub timestep: f32,
    /// Steps `run_cluster` performs. Default: 10.
    pub steps: u64,
    /// Most particles one exchange direction may carry per step.
    /// `None` = unbounded. Default: `None`.
    pub exchange_capacity: Option<usize>,
    /// Tag of the particle exchange. Default: 0.
    pub particle_exchange_tag: u32,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            devices: Coord3::splat(1),
            periodic: Coord3::splat(1),
            global_cells: Coord3::new(16, 16, 8),
            supercell_size: Coord3::new(8, 8, 4),
            guard_supercells: Coord3::splat(1),
            slots_per_frame: SlabConfig::DEFAULT_SLOTS_PER_FRAME,
            max_frames: SlabConfig::DEFAULT_MAX_FRAMES,
            particles_per_supercell: 256,
            lanes: 4,
            epsilon: 1e-4,
            timestep: 0.1,
            steps: 10,
            exchange_capacity: None,
            particle_exchange_tag: 0,
        }
    }
}

impl SimulationConfig {
    /// Check the configuration.
    ///
    /// Verifies that:
    /// - the global domain splits evenly over the devices and each local
    ///   domain splits evenly into supercells,
    /// - the frame pool sizing is valid and `lanes` is non-zero,
    /// - `timestep` and `epsilon` are finite and positive,
    /// - the initial particle count fits the supercell's cells.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.mapping()?;
        self.slab().validate()?;
        if self.lanes == 0 {
            return Err(ConfigError::ZeroLanes);
        }
        if !self.timestep.is_finite() || self.timestep <= 0.0 {
            return Err(ConfigError::InvalidTimestep {
                value: self.timestep,
            });
        }
        if !self.epsilon.is_finite() || self.epsilon <= 0.0 {
            return Err(ConfigError::InvalidEpsilon {
                value: self.epsilon,
            });
        }
        let cells = self.supercell_size.volume() as u32;
        if self.particles_per_supercell > cells {
            return Err(ConfigError::TooManyParticles {
                requested: self.particles_per_supercell,
                cells,
            });
        }
        Ok(())
    }

    /// Cells owned by each device.
    pub fn local_cells(&self) -> Result<Coord3, SpaceError> {
        if !self.devices.is_positive() {
            return Err(SpaceError::EmptyExtent {
                name: "device grid",
                extent: self.devices,
            });
        }
        if !self.global_cells.is_positive() {
            return Err(SpaceError::EmptyExtent {
                name: "global domain",
                extent: self.global_cells,
            });
        }
        if self.global_cells.rem_euclid(self.devices) != Coord3::ZERO {
            return Err(SpaceError::NotDivisible {
                name: "global domain",
                extent: self.global_cells,
                by: self.devices,
            });
        }
        Ok(self.global_cells.div_floor(self.devices))
    }

    /// Supercell mapping every device uses.
    pub fn mapping(&self) -> Result<MappingDescription, SpaceError> {
        MappingDescription::new(
            self.local_cells()?,
            self.supercell_size,
            self.guard_supercells,
        )
    }

    /// Frame pool sizing.
    pub fn slab(&self) -> SlabConfig {
        SlabConfig::new(self.max_frames, self.slots_per_frame)
    }

    /// Number of devices.
    pub fn device_count(&self) -> usize {
        self.devices.volume()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let c = SimulationConfig::default();
        c.validate().unwrap();
        assert_eq!(c.local_cells().unwrap(), Coord3::new(16, 16, 8));
        assert_eq!(c.device_count(), 1);
    }

    #[test]
    fn uneven_device_split_is_rejected() {
        let c = SimulationConfig {
            devices: Coord3::new(3, 1, 1),
            ..Default::default()
        };
        assert!(matches!(
            c.validate(),
            Err(ConfigError::Space(SpaceError::NotDivisible { .. }))
        ));
    }

    #[test]
    fn local_domain_must_hold_whole_supercells() {
        let c = SimulationConfig {
            devices: Coord3::new(4, 1, 1),
            ..Default::default()
        };
        // 16 / 4 = 4 cells per device, supercells are 8 wide.
        assert!(matches!(
            c.validate(),
            Err(ConfigError::Space(SpaceError::NotDivisible { .. }))
        ));
    }

    #[test]
    fn bad_timestep_and_epsilon_are_rejected() {
        for dt in [0.0, -1.0, f32::NAN, f32::INFINITY] {
            let c = SimulationConfig {
                timestep: dt,
                ..Default::default()
            };
            assert!(matches!(c.validate(), Err(ConfigError::InvalidTimestep { .. })));
        }
        for eps in [0.0, -0.0, -1e-3, f32::NAN] {
            let c = SimulationConfig {
                epsilon: eps,
                ..Default::default()
            };
            assert!(matches!(c.validate(), Err(ConfigError::InvalidEpsilon { .. })));
        }
    }

    #[test]
    fn zero_lanes_and_oversized_fill_are_rejected() {
        let c = SimulationConfig {
            lanes: 0,
            ..Default::default()
        };
        assert_eq!(c.validate(), Err(ConfigError::ZeroLanes));
        let c = SimulationConfig {
            particles_per_supercell: 257,
            ..Default::default()
        };
        assert_eq!(
            c.validate(),
            Err(ConfigError::TooManyParticles {
                requested: 257,
                cells: 256
            })
        );
    }

    #[test]
    fn zero_slots_is_an_arena_error() {
        let c = SimulationConfig {
            slots_per_frame: 0,
            ..Default::default()
        };
        assert!(matches!(c.validate(), Err(ConfigError::Arena(_))));
    }
}
