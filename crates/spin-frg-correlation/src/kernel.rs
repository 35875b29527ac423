//! Susceptibility kernel: nested singular integration over two Matsubara
//! frequencies.
//!
//! One kernel evaluation produces the full 4-channel susceptibility bundle
//! over all representative separations for the current RG cutoff and a fixed
//! external offset frequency. The integrand has integrable singularities at
//! the cutoff scale, so both the outer integral over `w` and the inner
//! integral over `wp` split the frequency domain at the cutoff breakpoints
//! and integrate each sub-interval with off-mesh boundary quadrature.
//!
//! Two diagram classes contribute: a product of dressed propagators feeding
//! only the zero-separation entry, and a two-particle vertex correction that
//! contributes to every separation through the batched vertex query plus a
//! zero-separation channel mixing of pointwise vertex values.

use std::f32::consts::PI;

use spin_frg_core::bundle::{Channel, ChannelBundle};
use spin_frg_core::frequency::FrequencyGrid;
use spin_frg_core::lattice::Lattice;
use spin_frg_core::quadrature::{self, Accumulate};
use spin_frg_core::vertex::{SingleParticleVertex, TwoParticleVertex};

/// Outer integration regions dropped because the cutoff lies outside the
/// frequency mesh.
///
/// A dropped region contributes zero silently; callers may surface a
/// diagnostic so the data loss is observable in logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutOfMeshRegions {
    /// The negative-frequency tail `[w_min, -cutoff - nu]` is empty.
    pub negative_tail: bool,
    /// The positive-frequency tail `[cutoff, w_max]` is empty.
    pub positive_tail: bool,
}

impl OutOfMeshRegions {
    /// Whether any region was dropped.
    #[must_use]
    pub fn any(&self) -> bool {
        self.negative_tail || self.positive_tail
    }
}

/// Evaluation context for one susceptibility computation.
pub struct SusceptibilityKernel<'a> {
    /// Current RG cutoff scale.
    pub cutoff: f32,
    /// External offset frequency of the correlation (0 for the
    /// static/equal-time correlation function).
    pub offset_frequency: f32,
    /// Lattice representation, defines the reduced separation space.
    pub lattice: &'a Lattice,
    /// Matsubara frequency mesh.
    pub grid: &'a FrequencyGrid,
    /// Single-particle vertex (self-energy) evaluator.
    pub single_particle: &'a dyn SingleParticleVertex,
    /// Two-particle vertex evaluator.
    pub two_particle: &'a dyn TwoParticleVertex,
}

impl SusceptibilityKernel<'_> {
    /// Outer integration regions that the domain split will drop because the
    /// cutoff breakpoints fall outside the mesh bounds.
    #[must_use]
    pub fn out_of_mesh_regions(&self) -> OutOfMeshRegions {
        let nu = self.offset_frequency;
        OutOfMeshRegions {
            negative_tail: -(nu + self.cutoff) <= self.grid.min(),
            positive_tail: self.cutoff >= self.grid.max(),
        }
    }

    /// Compute the 4-channel susceptibility bundle over all representative
    /// separations.
    #[must_use]
    pub fn evaluate(&self) -> ChannelBundle {
        let size = self.lattice.reduced_size();
        let cut = self.cutoff;
        let nu = self.offset_frequency;
        let grid = self.grid;
        let v2 = self.single_particle;
        let v4 = self.two_particle;

        let mut susceptibility = ChannelBundle::new(size);
        let mut outer_scratch = ChannelBundle::new(size);
        let mut outer_out = ChannelBundle::new(size);

        let mut stack = ChannelBundle::new(size);
        let mut inner_scratch = ChannelBundle::new(size);
        let mut inner_out = ChannelBundle::new(size);

        let mut outer = |w: f32, ret: &mut ChannelBundle| {
            ret.reset();

            // Propagator product; contributes to the zero separation only.
            let local = 1.0 / ((w + v2.value(w)) * (w + nu + v2.value(w + nu)));
            ret.channel_mut(Channel::X)[0] += local / (4.0 * PI);
            ret.channel_mut(Channel::Y)[0] += local / (4.0 * PI);
            ret.channel_mut(Channel::Z)[0] += local / (4.0 * PI);
            ret.channel_mut(Channel::Density)[0] += local / PI;

            // Vertex correction, integrated over the second frequency.
            let mut inner = |wp: f32, out: &mut ChannelBundle| {
                out.reset();

                let (s, t, u) = (w + wp + nu, nu, w - wp);
                v4.bundle(s, t, u, &mut stack);
                let vx = v4.origin_value(s, t, u, Channel::X);
                let vy = v4.origin_value(s, t, u, Channel::Y);
                let vz = v4.origin_value(s, t, u, Channel::Z);
                let vd = v4.origin_value(s, t, u, Channel::Density);

                out.mult_sub_channel(Channel::X, 1.0, &stack);
                out.mult_sub_channel(Channel::Y, 1.0, &stack);
                out.mult_sub_channel(Channel::Z, 1.0, &stack);
                out.mult_sub_channel(Channel::Density, 4.0, &stack);

                out.channel_mut(Channel::X)[0] += 0.5 * (vx - vy - vz + vd);
                out.channel_mut(Channel::Y)[0] += 0.5 * (-vx + vy - vz + vd);
                out.channel_mut(Channel::Z)[0] += 0.5 * (-vx - vy + vz + vd);
                out.channel_mut(Channel::Density)[0] += 2.0 * (vx + vy + vz + vd);

                let normalization = 1.0
                    / ((w + v2.value(w))
                        * (w + nu + v2.value(w + nu))
                        * (wp + v2.value(wp))
                        * (wp + nu + v2.value(wp + nu))
                        * (4.0 * PI * PI));
                out.scale(normalization);
            };

            if -(nu + cut) > grid.min() {
                quadrature::integrate_to(
                    grid,
                    grid.first_negative(),
                    -cut - nu,
                    &mut inner,
                    &mut inner_scratch,
                    &mut inner_out,
                );
                ret.add(&inner_out);
            }
            if nu - cut > cut {
                quadrature::integrate_between(
                    grid,
                    cut - nu,
                    -cut,
                    &mut inner,
                    &mut inner_scratch,
                    &mut inner_out,
                );
                ret.add(&inner_out);
            }
            if cut < grid.max() {
                quadrature::integrate_from(
                    grid,
                    cut,
                    grid.last(),
                    &mut inner,
                    &mut inner_scratch,
                    &mut inner_out,
                );
                ret.add(&inner_out);
            }
        };

        if -(nu + cut) > grid.min() {
            quadrature::integrate_to(
                grid,
                grid.first_negative(),
                -cut - nu,
                &mut outer,
                &mut outer_scratch,
                &mut outer_out,
            );
            susceptibility.add(&outer_out);
        }
        if nu - cut > cut {
            quadrature::integrate_between(
                grid,
                cut - nu,
                -cut,
                &mut outer,
                &mut outer_scratch,
                &mut outer_out,
            );
            susceptibility.add(&outer_out);
        }
        if cut < grid.max() {
            quadrature::integrate_from(
                grid,
                cut,
                grid.last(),
                &mut outer,
                &mut outer_scratch,
                &mut outer_out,
            );
            susceptibility.add(&outer_out);
        }

        susceptibility
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    struct ZeroSelfEnergy;

    impl SingleParticleVertex for ZeroSelfEnergy {
        fn value(&self, _w: f32) -> f32 {
            0.0
        }
    }

    struct ZeroTwoParticle;

    impl TwoParticleVertex for ZeroTwoParticle {
        fn origin_value(&self, _s: f32, _t: f32, _u: f32, _channel: Channel) -> f32 {
            0.0
        }

        fn bundle(&self, _s: f32, _t: f32, _u: f32, out: &mut ChannelBundle) {
            out.reset();
        }
    }

    /// Constant two-particle vertex over all separations and channels.
    struct ConstantTwoParticle(f32);

    impl TwoParticleVertex for ConstantTwoParticle {
        fn origin_value(&self, _s: f32, _t: f32, _u: f32, _channel: Channel) -> f32 {
            0.0
        }

        fn bundle(&self, _s: f32, _t: f32, _u: f32, out: &mut ChannelBundle) {
            for channel in Channel::ALL {
                out.channel_mut(channel).fill(self.0);
            }
        }
    }

    /// Trapezoid of 1/w^2 over the two outer regions of the mesh mirror of
    /// [1, 2] with cutoff 1: 0.5 (1/4 + 1) on each side.
    const PROPAGATOR_INTEGRAL: f32 = 1.25;

    fn kernel_fixture<'a>(
        lattice: &'a Lattice,
        grid: &'a FrequencyGrid,
        v2: &'a dyn SingleParticleVertex,
        v4: &'a dyn TwoParticleVertex,
    ) -> SusceptibilityKernel<'a> {
        SusceptibilityKernel {
            cutoff: 1.0,
            offset_frequency: 0.0,
            lattice,
            grid,
            single_particle: v2,
            two_particle: v4,
        }
    }

    #[test]
    fn test_local_term_only() {
        let lattice = Lattice::single_basis_chain(4);
        let grid = FrequencyGrid::new(&[1.0, 2.0]).unwrap();
        let kernel = kernel_fixture(&lattice, &grid, &ZeroSelfEnergy, &ZeroTwoParticle);

        let bundle = kernel.evaluate();
        assert_relative_eq!(
            bundle.channel(Channel::Density)[0],
            PROPAGATOR_INTEGRAL / PI,
            epsilon = 1e-5
        );
        for channel in [Channel::X, Channel::Y, Channel::Z] {
            assert_relative_eq!(
                bundle.channel(channel)[0],
                PROPAGATOR_INTEGRAL / (4.0 * PI),
                epsilon = 1e-5
            );
        }
        for channel in Channel::ALL {
            for rid in 1..4 {
                assert_eq!(bundle.channel(channel)[rid], 0.0);
            }
        }
    }

    #[test]
    fn test_vertex_correction_at_finite_separation() {
        // With a separable integrand the nested integral factorizes, so the
        // finite-separation entries are exactly
        //   -weight * b * I^2 / (4 pi^2)
        // with I the propagator integral and per-channel weights (1,1,1,4).
        let b = 1.0_f32;
        let lattice = Lattice::single_basis_chain(3);
        let grid = FrequencyGrid::new(&[1.0, 2.0]).unwrap();
        let v4 = ConstantTwoParticle(b);
        let kernel = kernel_fixture(&lattice, &grid, &ZeroSelfEnergy, &v4);

        let bundle = kernel.evaluate();
        let base = b * PROPAGATOR_INTEGRAL * PROPAGATOR_INTEGRAL / (4.0 * PI * PI);
        for channel in [Channel::X, Channel::Y, Channel::Z] {
            assert_relative_eq!(bundle.channel(channel)[1], -base, epsilon = 1e-5);
        }
        assert_relative_eq!(bundle.channel(Channel::Density)[2], -4.0 * base, epsilon = 1e-5);
    }

    #[test]
    fn test_out_of_mesh_regions_flagged() {
        let lattice = Lattice::single_basis_chain(1);
        let grid = FrequencyGrid::new(&[1.0, 2.0]).unwrap();

        let mut kernel = kernel_fixture(&lattice, &grid, &ZeroSelfEnergy, &ZeroTwoParticle);
        assert!(!kernel.out_of_mesh_regions().any());

        kernel.cutoff = 5.0;
        let regions = kernel.out_of_mesh_regions();
        assert!(regions.negative_tail);
        assert!(regions.positive_tail);

        // Both tails dropped: the result is identically zero.
        let bundle = kernel.evaluate();
        for channel in Channel::ALL {
            assert_eq!(bundle.channel(channel)[0], 0.0);
        }
    }
}
