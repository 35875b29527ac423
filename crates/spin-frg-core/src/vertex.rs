//! Vertex-evaluator interfaces consumed by measurements.
//!
//! The one- and two-particle vertex functions are solver state owned by the
//! RG flow driver; measurements only query them. Both traits are `Sync`
//! because a measurement evaluates separation indices in parallel against
//! shared read-only solver state.

use crate::bundle::{Channel, ChannelBundle};

/// Single-particle vertex (self-energy) evaluator.
pub trait SingleParticleVertex: Sync {
    /// Vertex value at a Matsubara frequency.
    fn value(&self, w: f32) -> f32;
}

/// Two-particle vertex evaluator.
///
/// Frequency arguments follow the `(s, t, u)` transfer-frequency convention
/// of the flow solver.
pub trait TwoParticleVertex: Sync {
    /// Pointwise vertex value at zero separation for one channel.
    fn origin_value(&self, s: f32, t: f32, u: f32, channel: Channel) -> f32;

    /// Batched vertex evaluation: fill `out` with the value for every
    /// representative separation and every channel at one frequency triple.
    ///
    /// `out` is sized to the lattice's reduced separation count.
    fn bundle(&self, s: f32, t: f32, u: f32, out: &mut ChannelBundle);
}
