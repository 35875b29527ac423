//! Trapezoidal quadrature on the Matsubara frequency mesh.
//!
//! Integration boundaries may either coincide with mesh points (given by
//! index) or lie between them (given by value). Off-mesh boundaries arise
//! when an integration region is split at the RG cutoff; the integrand is
//! then evaluated at the exact boundary value, which keeps integrable
//! singularities at the split points under control.
//!
//! Integrands write their result into a caller-provided buffer implementing
//! [`Accumulate`], so the same routines serve scalar integrands and
//! multi-channel bundles without allocating per evaluation point.

use crate::frequency::FrequencyGrid;

/// Buffer semantics required by the quadrature routines.
pub trait Accumulate {
    /// Write zeros.
    fn reset(&mut self);

    /// Fused multiply-add: `self += weight * rhs`.
    fn mult_add(&mut self, weight: f32, rhs: &Self);

    /// Elementwise addition: `self += rhs`.
    fn add(&mut self, rhs: &Self);

    /// Scalar multiplication: `self *= factor`.
    fn scale(&mut self, factor: f32);
}

impl Accumulate for f32 {
    fn reset(&mut self) {
        *self = 0.0;
    }

    fn mult_add(&mut self, weight: f32, rhs: &Self) {
        *self += weight * rhs;
    }

    fn add(&mut self, rhs: &Self) {
        *self += rhs;
    }

    fn scale(&mut self, factor: f32) {
        *self *= factor;
    }
}

/// Trapezoidal integration between two mesh points.
pub fn integrate<T, F>(grid: &FrequencyGrid, lo: usize, hi: usize, mut integrand: F, scratch: &mut T, out: &mut T)
where
    T: Accumulate,
    F: FnMut(f32, &mut T),
{
    debug_assert!(grid.at(lo) <= grid.at(hi));

    out.reset();
    if lo == hi {
        return;
    }

    let mut i = lo;
    integrand(grid.at(i), scratch);
    out.mult_add(grid.at(i + 1) - grid.at(i), scratch);
    i += 1;
    while i != hi {
        integrand(grid.at(i), scratch);
        out.mult_add(grid.at(i + 1) - grid.at(i - 1), scratch);
        i += 1;
    }
    integrand(grid.at(i), scratch);
    out.mult_add(grid.at(i) - grid.at(i - 1), scratch);
    out.scale(0.5);
}

/// Trapezoidal integration from an off-mesh lower boundary to a mesh point.
pub fn integrate_from<T, F>(grid: &FrequencyGrid, lo: f32, hi: usize, mut integrand: F, scratch: &mut T, out: &mut T)
where
    T: Accumulate,
    F: FnMut(f32, &mut T),
{
    debug_assert!(lo <= grid.at(hi));

    out.reset();
    let mut i = grid.greater(lo);
    if i != hi {
        integrand(lo, scratch);
        out.mult_add(grid.at(i) - lo, scratch);

        integrand(grid.at(i), scratch);
        out.mult_add(grid.at(i + 1) - lo, scratch);

        i += 1;
        while i != hi {
            integrand(grid.at(i), scratch);
            out.mult_add(grid.at(i + 1) - grid.at(i - 1), scratch);
            i += 1;
        }

        integrand(grid.at(i), scratch);
        out.mult_add(grid.at(i) - grid.at(i - 1), scratch);

        out.scale(0.5);
    } else {
        integrand(lo, scratch);
        out.add(scratch);

        integrand(grid.at(i), scratch);
        out.add(scratch);

        out.scale(0.5 * (grid.at(i) - lo));
    }
}

/// Trapezoidal integration from a mesh point to an off-mesh upper boundary.
pub fn integrate_to<T, F>(grid: &FrequencyGrid, lo: usize, hi: f32, mut integrand: F, scratch: &mut T, out: &mut T)
where
    T: Accumulate,
    F: FnMut(f32, &mut T),
{
    debug_assert!(grid.at(lo) <= hi);

    out.reset();
    let mut i = lo;
    let hi_mesh = grid.lesser(hi);
    if i != hi_mesh {
        integrand(grid.at(i), scratch);
        out.mult_add(grid.at(i + 1) - grid.at(i), scratch);

        i += 1;
        while i != hi_mesh {
            integrand(grid.at(i), scratch);
            out.mult_add(grid.at(i + 1) - grid.at(i - 1), scratch);
            i += 1;
        }

        integrand(grid.at(i), scratch);
        out.mult_add(hi - grid.at(i - 1), scratch);

        integrand(hi, scratch);
        out.mult_add(hi - grid.at(i), scratch);

        out.scale(0.5);
    } else {
        integrand(hi, scratch);
        out.add(scratch);

        integrand(grid.at(i), scratch);
        out.add(scratch);

        out.scale(0.5 * (hi - grid.at(i)));
    }
}

/// Trapezoidal integration between two off-mesh boundaries.
pub fn integrate_between<T, F>(grid: &FrequencyGrid, lo: f32, hi: f32, mut integrand: F, scratch: &mut T, out: &mut T)
where
    T: Accumulate,
    F: FnMut(f32, &mut T),
{
    debug_assert!(lo <= hi);

    out.reset();
    let mut i = grid.greater(lo);
    let hi_mesh = grid.lesser(hi);
    if hi_mesh >= i {
        integrand(lo, scratch);
        out.mult_add(grid.at(i) - lo, scratch);

        if hi_mesh != i {
            integrand(grid.at(i), scratch);
            out.mult_add(grid.at(i + 1) - lo, scratch);

            i += 1;
            while i != hi_mesh {
                integrand(grid.at(i), scratch);
                out.mult_add(grid.at(i + 1) - grid.at(i - 1), scratch);
                i += 1;
            }

            integrand(grid.at(i), scratch);
            out.mult_add(hi - grid.at(i - 1), scratch);
        } else {
            integrand(grid.at(i), scratch);
            out.mult_add(hi - lo, scratch);
        }

        integrand(hi, scratch);
        out.mult_add(hi - grid.at(i), scratch);

        out.scale(0.5);
    } else {
        integrand(hi, scratch);
        out.add(scratch);

        integrand(lo, scratch);
        out.add(scratch);

        out.scale(0.5 * (hi - lo));
    }
}
