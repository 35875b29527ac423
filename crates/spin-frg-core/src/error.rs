//! Error types for the core pf-FRG primitives.
//!
//! Each subsystem defines its own error enum via [`thiserror`]; [`CoreError`]
//! unifies them for callers that cross subsystem boundaries.

use thiserror::Error;

/// A specialized `Result` type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Top-level error type for the core crate.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum CoreError {
    /// Frequency discretization error
    #[error("Frequency grid error: {0}")]
    Grid(#[from] GridError),

    /// Lattice geometry or symmetry error
    #[error("Lattice error: {0}")]
    Lattice(#[from] LatticeError),
}

/// Errors raised when constructing or querying the frequency discretization.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum GridError {
    /// Fewer than two mesh points were supplied
    #[error("Frequency mesh must contain at least two values, got {count}")]
    TooFewPoints {
        /// Number of mesh points supplied
        count: usize,
    },

    /// A mesh point was zero or negative
    #[error("Frequency mesh values must be strictly positive, got {value} at position {index}")]
    NonPositivePoint {
        /// Offending mesh value
        value: f32,
        /// Position in the supplied mesh
        index: usize,
    },

    /// The mesh was not sorted in ascending order
    #[error("Frequency mesh values must be in ascending order (violation at position {index})")]
    Unsorted {
        /// Position of the first out-of-order value
        index: usize,
    },
}

/// Errors raised when constructing a lattice representation.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum LatticeError {
    /// The symmetry table does not cover every separation index
    #[error("Symmetry table has {actual} entries, expected {expected}")]
    SymmetryTableSize {
        /// Expected number of entries (basis count times range count)
        expected: usize,
        /// Actual number of entries supplied
        actual: usize,
    },

    /// A representative index points outside the reduced storage
    #[error("Representative index {rid} out of bounds (reduced size {reduced_size})")]
    RepresentativeOutOfBounds {
        /// Offending representative index
        rid: usize,
        /// Size of the symmetry-reduced storage
        reduced_size: usize,
    },

    /// Geometry arrays are inconsistent with the declared site counts
    #[error("Inconsistent geometry: {message}")]
    InconsistentGeometry {
        /// Description of the inconsistency
        message: String,
    },
}
