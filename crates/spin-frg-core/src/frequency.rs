//! Discretization of Matsubara frequency space.
//!
//! The mesh is constructed from a strictly positive, ascending list of
//! frequencies; the symmetry-related negative values are generated
//! automatically, so the full mesh is mirror symmetric around the origin.
//! Quadrature routines in [`crate::quadrature`] consume mesh points by index.

use crate::error::GridError;

/// Mirror-symmetric discretization of Matsubara frequency space.
///
/// Indices run over the full mesh in ascending order: `0` is the most
/// negative point, `len() - 1` the largest positive point, and `len() / 2`
/// the smallest positive point.
#[derive(Debug, Clone)]
pub struct FrequencyGrid {
    /// Full mesh in ascending order; length is twice the positive mesh size.
    values: Vec<f32>,
}

impl FrequencyGrid {
    /// Construct a frequency grid from an ascending list of positive mesh points.
    ///
    /// The negative mirror points are generated automatically.
    pub fn new(positive: &[f32]) -> Result<Self, GridError> {
        if positive.len() < 2 {
            return Err(GridError::TooFewPoints {
                count: positive.len(),
            });
        }
        for (index, &value) in positive.iter().enumerate() {
            if value <= 0.0 {
                return Err(GridError::NonPositivePoint { value, index });
            }
            if index > 0 && positive[index - 1] > value {
                return Err(GridError::Unsorted { index });
            }
        }

        let half = positive.len();
        let mut values = vec![0.0_f32; 2 * half];
        for (i, &w) in positive.iter().enumerate() {
            values[half - i - 1] = -w;
            values[half + i] = w;
        }

        tracing::debug!(points = values.len(), "initialized frequency grid");
        Ok(Self { values })
    }

    /// Number of points in the full (mirrored) mesh.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Always false; construction requires at least two positive points.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Mesh value at a full-mesh index.
    #[must_use]
    pub fn at(&self, index: usize) -> f32 {
        self.values[index]
    }

    /// Index of the first negative mesh point (largest absolute value).
    #[must_use]
    pub fn first_negative(&self) -> usize {
        0
    }

    /// Index of the first positive mesh point (smallest absolute value).
    #[must_use]
    pub fn first_positive(&self) -> usize {
        self.values.len() / 2
    }

    /// Index of the last mesh point (largest positive value).
    #[must_use]
    pub fn last(&self) -> usize {
        self.values.len() - 1
    }

    /// Value of the most negative mesh point.
    #[must_use]
    pub fn min(&self) -> f32 {
        self.values[0]
    }

    /// Value of the largest mesh point.
    #[must_use]
    pub fn max(&self) -> f32 {
        self.values[self.values.len() - 1]
    }

    /// Index of the closest mesh point lesser than `w`.
    ///
    /// If no lesser mesh point exists, the closest mesh point is returned.
    #[must_use]
    pub fn lesser(&self, w: f32) -> usize {
        let half = self.values.len() / 2;
        if w < 0.0 {
            let mirrored = self.greater(-w);
            half - 1 - (mirrored - half)
        } else {
            let positive = &self.values[half..];
            if w <= positive[0] {
                return half;
            }
            for i in 1..positive.len() {
                if positive[i] > w {
                    return half + i - 1;
                }
            }
            half + positive.len() - 1
        }
    }

    /// Index of the closest mesh point greater than `w`.
    ///
    /// If no greater mesh point exists, the closest mesh point is returned.
    #[must_use]
    pub fn greater(&self, w: f32) -> usize {
        let half = self.values.len() / 2;
        if w < 0.0 {
            let mirrored = self.lesser(-w);
            half - 1 - (mirrored - half)
        } else {
            let positive = &self.values[half..];
            if w <= positive[0] {
                return half;
            }
            for i in 1..positive.len() {
                if positive[i] > w {
                    return half + i;
                }
            }
            half + positive.len() - 1
        }
    }
}
