//! Per-step performance and bookkeeping metrics.
//!
//! [`StepMetrics`] captures timing and particle traffic for a single step
//! on one device.

/// Metrics collected during a single step.
///
/// All durations are in microseconds.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StepMetrics {
    /// Step these metrics describe.
    pub step: u64,
    /// Wall-clock time for the whole step.
    pub total_us: u64,
    /// Time spent in the model's kernels.
    pub kernel_us: u64,
    /// Time spent re-homing particles between supercells.
    pub shift_us: u64,
    /// Time spent in the particle exchange, barrier included.
    pub exchange_us: u64,
    /// Time spent gap filling.
    pub gap_fill_us: u64,
    /// Particles that changed supercell.
    pub moved: u64,
    /// Particles sent to neighbouring devices.
    pub sent: u64,
    /// Particles received from neighbouring devices.
    pub received: u64,
    /// Guard particles dropped at non-periodic edges.
    pub absorbed: u64,
    /// Particles moved by gap filling.
    pub compacted: u64,
    /// Frames returned to the pool by gap filling.
    pub frames_freed: u64,
    /// Live particles after the step.
    pub live_particles: u64,
    /// Frames in use after the step.
    pub live_frames: u32,
    /// Cumulative failed frame allocations.
    pub failed_allocations: u64,
}

/// Elapsed microseconds since `start`.
pub(crate) fn micros_since(start: std::time::Instant) -> u64 {
    start.elapsed().as_micros() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_metrics_are_zero() {
        let m = StepMetrics::default();
        assert_eq!(m.step, 0);
        assert_eq!(m.total_us, 0);
        assert_eq!(m.sent + m.received + m.absorbed, 0);
        assert_eq!(m.live_frames, 0);
    }
}
