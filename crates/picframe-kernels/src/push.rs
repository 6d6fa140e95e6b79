//! Velocity and position updates.

use picframe_core::{float3, StepError};
use picframe_engine::{Kernel, Worker};
use picframe_particles::ParticleBox;

use crate::nbody::NBodyKeys;

/// Arguments of [`VelocityKernel`] and [`PositionKernel`].
pub struct PushArgs<'a> {
    /// Particle storage.
    pub pbox: ParticleBox<'a>,
    /// Attribute keys.
    pub keys: NBodyKeys,
    /// Softening length.
    pub epsilon: f32,
    /// Timestep.
    pub timestep: f32,
}

/// `v_i += dt * Σ_j m_j (x_j - x_i) / (|x_j - x_i|² + ε²)^{3/2}` over the
/// live particles `j != i` of the same supercell.
///
/// Every lane handles slots of one frame per pass. The sum runs over the
/// supercell's frames head first and slots in order, so the result does
/// not depend on the lane count. Only velocities are written, so reading
/// positions needs no extra barrier.
#[derive(Clone, Copy, Debug, Default)]
pub struct VelocityKernel;

impl Kernel<PushArgs<'_>> for VelocityKernel {
    fn run(&self, w: &Worker<'_>, a: &PushArgs<'_>) -> Result<(), StepError> {
        let id = w.supercell();
        let eps2 = a.epsilon * a.epsilon;
        for frame in a.pbox.frames(id) {
            w.for_each(frame.slots() as usize, |s| {
                let slot = s as u32;
                if !frame.is_live(slot) {
                    return;
                }
                let xi = frame.get(a.keys.position, slot);
                let mut acc = [0.0f32; 3];
                for other in a.pbox.frames(id) {
                    let same = other.index() == frame.index();
                    for j in (0..other.slots()).filter(|&j| other.is_live(j)) {
                        if same && j == slot {
                            continue;
                        }
                        let r = float3::sub(other.get(a.keys.position, j), xi);
                        let d2 = float3::dot(r, r) + eps2;
                        let inv = 1.0 / (d2 * d2.sqrt());
                        acc = float3::add(acc, float3::scale(r, other.get(a.keys.mass, j) * inv));
                    }
                }
                let v = frame.get(a.keys.velocity, slot);
                frame.set(a.keys.velocity, slot, float3::add(v, float3::scale(acc, a.timestep)));
            });
        }
        Ok(())
    }
}

/// `x_i += dt * v_i` for every live particle.
#[derive(Clone, Copy, Debug, Default)]
pub struct PositionKernel;

impl Kernel<PushArgs<'_>> for PositionKernel {
    fn run(&self, w: &Worker<'_>, a: &PushArgs<'_>) -> Result<(), StepError> {
        for frame in a.pbox.frames(w.supercell()) {
            w.for_each(frame.slots() as usize, |s| {
                let slot = s as u32;
                if frame.is_live(slot) {
                    let x = frame.get(a.keys.position, slot);
                    let v = frame.get(a.keys.velocity, slot);
                    frame.set(a.keys.position, slot, float3::add(x, float3::scale(v, a.timestep)));
                }
            });
        }
        Ok(())
    }
}
