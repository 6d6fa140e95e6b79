//! Benchmark profiles for the picframe particle substrate.
//!
//! - [`reference_profile`]: one device, 32x32x16 cells in 8x8x4 supercells,
//!   one full frame of particles per supercell
//! - [`cluster_profile`]: the same domain split over 2x2x1 devices
//! - [`stress_profile`]: one device with four frames per supercell

#![forbid(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use picframe_core::Coord3;
use picframe_engine::SimulationConfig;

/// One device, 32x32x16 cells, 256 particles per supercell (one frame each).
pub fn reference_profile() -> SimulationConfig {
    SimulationConfig {
        devices: Coord3::splat(1),
        global_cells: Coord3::new(32, 32, 16),
        supercell_size: Coord3::new(8, 8, 4),
        slots_per_frame: 256,
        max_frames: 512,
        particles_per_supercell: 256,
        lanes: 8,
        steps: 10,
        ..SimulationConfig::default()
    }
}

/// [`reference_profile`] split over 2x2x1 devices.
pub fn cluster_profile() -> SimulationConfig {
    SimulationConfig {
        devices: Coord3::new(2, 2, 1),
        max_frames: 256,
        lanes: 4,
        ..reference_profile()
    }
}

/// One device with 64-slot frames, so every supercell spans four frames.
pub fn stress_profile() -> SimulationConfig {
    SimulationConfig {
        slots_per_frame: 64,
        max_frames: 2048,
        ..reference_profile()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profiles_validate() {
        for config in [reference_profile(), cluster_profile(), stress_profile()] {
            config.validate().unwrap();
        }
    }

    #[test]
    fn cluster_profile_splits_the_reference_domain() {
        let config = cluster_profile();
        assert_eq!(config.device_count(), 4);
        assert_eq!(config.local_cells().unwrap(), Coord3::new(16, 16, 16));
    }
}
