//! Lattice geometry and the symmetry map.
//!
//! A lattice is described by a small set of inequivalent basis sites and, for
//! each basis site, a range of representative neighbor sites within an
//! extended neighborhood. Ordered site pairs are addressed through a dense
//! *separation index* iterating basis sites in the outer loop and neighbors
//! in the inner loop; this index is both the unit of parallel work and the
//! offset into the flat correlation buffers.
//!
//! The symmetry map reduces the pair space: any two site pairs related by a
//! declared lattice symmetry resolve to the same representative index in the
//! reduced susceptibility storage, together with a sign factor accounting
//! for symmetry-induced value inversion. Representative index 0 is the zero
//! separation by convention.

use serde::{Deserialize, Serialize};

use crate::bundle::Channel;
use crate::error::LatticeError;

/// Cartesian position of a lattice site.
pub type Position = [f32; 3];

/// Real-space geometry persisted alongside correlation data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LatticeGeometry {
    /// Bravais lattice vectors.
    pub bravais_vectors: Vec<Position>,
    /// Positions of the inequivalent basis sites.
    pub basis_positions: Vec<Position>,
    /// Representative neighbor positions, one row per basis site.
    pub site_positions: Vec<Vec<Position>>,
}

/// Result of a symmetry lookup: where a site pair lives in reduced storage.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SymmetryImage {
    /// Representative index into the reduced susceptibility storage.
    pub rid: usize,
    /// Sign factor accounting for symmetry-induced value inversion.
    pub sign: f32,
}

/// Lattice representation with a channel-resolved symmetry map.
#[derive(Debug, Clone)]
pub struct Lattice {
    geometry: LatticeGeometry,
    range_count: usize,
    reduced_size: usize,
    /// Per separation index, per channel.
    symmetry: Vec<[SymmetryImage; 4]>,
}

impl Lattice {
    /// Construct a lattice from explicit geometry and symmetry tables.
    ///
    /// `symmetry` must hold one entry per separation index (basis outer,
    /// range inner), each mapping all four channels into the reduced storage
    /// of size `reduced_size`.
    pub fn new(
        geometry: LatticeGeometry,
        reduced_size: usize,
        symmetry: Vec<[SymmetryImage; 4]>,
    ) -> Result<Self, LatticeError> {
        let basis_count = geometry.basis_positions.len();
        if basis_count == 0 {
            return Err(LatticeError::InconsistentGeometry {
                message: "lattice must contain at least one basis site".into(),
            });
        }
        if geometry.site_positions.len() != basis_count {
            return Err(LatticeError::InconsistentGeometry {
                message: format!(
                    "site position table has {} rows, expected one per basis site ({})",
                    geometry.site_positions.len(),
                    basis_count
                ),
            });
        }
        let range_count = geometry.site_positions[0].len();
        if range_count == 0 || geometry.site_positions.iter().any(|row| row.len() != range_count) {
            return Err(LatticeError::InconsistentGeometry {
                message: "every basis site must declare the same non-empty neighbor range".into(),
            });
        }

        let expected = basis_count * range_count;
        if symmetry.len() != expected {
            return Err(LatticeError::SymmetryTableSize {
                expected,
                actual: symmetry.len(),
            });
        }
        for entry in &symmetry {
            for image in entry {
                if image.rid >= reduced_size {
                    return Err(LatticeError::RepresentativeOutOfBounds {
                        rid: image.rid,
                        reduced_size,
                    });
                }
            }
        }

        Ok(Self {
            geometry,
            range_count,
            reduced_size,
            symmetry,
        })
    }

    /// Single basis site with `range_count` collinear neighbors and trivial
    /// symmetry (every separation is its own representative).
    #[must_use]
    pub fn single_basis_chain(range_count: usize) -> Self {
        let range_count = range_count.max(1);
        let geometry = LatticeGeometry {
            bravais_vectors: vec![[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
            basis_positions: vec![[0.0, 0.0, 0.0]],
            site_positions: vec![(0..range_count).map(|i| [i as f32, 0.0, 0.0]).collect()],
        };
        let symmetry = (0..range_count)
            .map(|rid| [SymmetryImage { rid, sign: 1.0 }; 4])
            .collect();
        Self {
            geometry,
            range_count,
            reduced_size: range_count,
            symmetry,
        }
    }

    /// Real-space geometry of the lattice.
    #[must_use]
    pub fn geometry(&self) -> &LatticeGeometry {
        &self.geometry
    }

    /// Number of inequivalent basis sites.
    #[must_use]
    pub fn basis_count(&self) -> usize {
        self.geometry.basis_positions.len()
    }

    /// Number of representative neighbor sites per basis site.
    #[must_use]
    pub fn range_count(&self) -> usize {
        self.range_count
    }

    /// Total number of separation indices (basis count times range count).
    #[must_use]
    pub fn separation_count(&self) -> usize {
        self.basis_count() * self.range_count
    }

    /// Number of symmetry-inequivalent representative separations.
    #[must_use]
    pub fn reduced_size(&self) -> usize {
        self.reduced_size
    }

    /// Basis site of a separation index.
    #[must_use]
    pub fn basis_site(&self, separation: usize) -> usize {
        separation / self.range_count
    }

    /// Neighbor site (within the basis site's range) of a separation index.
    #[must_use]
    pub fn neighbor_site(&self, separation: usize) -> usize {
        separation % self.range_count
    }

    /// Symmetry map: resolve an ordered site pair and channel to reduced storage.
    #[must_use]
    pub fn transform(&self, basis: usize, neighbor: usize, channel: Channel) -> SymmetryImage {
        self.symmetry[basis * self.range_count + neighbor][channel.index()]
    }

    /// Symmetry map addressed by separation index.
    #[must_use]
    pub fn transform_separation(&self, separation: usize, channel: Channel) -> SymmetryImage {
        self.symmetry[separation][channel.index()]
    }
}
