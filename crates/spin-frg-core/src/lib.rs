//! # spin-frg-core
//!
//! Core primitives for pseudo-fermion functional renormalization group
//! (pf-FRG) calculations on lattice spin models:
//!
//! - **Frequency discretization**: mirror-symmetric Matsubara mesh with
//!   clamped nearest-point searches ([`FrequencyGrid`]).
//! - **Quadrature**: trapezoidal integration on the mesh, tolerant of
//!   off-mesh (singular) boundaries ([`quadrature`]).
//! - **Channel bundles**: fixed four-channel value buffers shared by the
//!   three spin components and the density channel ([`ChannelBundle`]).
//! - **Lattice**: geometry, dense separation indexing, and the
//!   symmetry-reduction map ([`Lattice`]).
//! - **Vertex traits**: the opaque one- and two-particle vertex evaluator
//!   interfaces measurements consume ([`vertex`]).
//! - **Dispatch**: deterministic partitioning of per-separation work across
//!   cooperating workers ([`dispatch`]).

#![forbid(unsafe_code)]

pub mod bundle;
pub mod dispatch;
pub mod error;
pub mod frequency;
pub mod lattice;
pub mod quadrature;
pub mod vertex;

pub use bundle::{Channel, ChannelBundle};
pub use dispatch::{ChannelSample, ChannelTargets, Dispatcher};
pub use error::{CoreError, CoreResult, GridError, LatticeError};
pub use frequency::FrequencyGrid;
pub use lattice::{Lattice, LatticeGeometry, Position, SymmetryImage};
pub use quadrature::Accumulate;
pub use vertex::{SingleParticleVertex, TwoParticleVertex};
