//! # spin-frg-correlation
//!
//! Equal-frequency real-space spin-spin correlation (susceptibility)
//! measurement for pf-FRG flows:
//!
//! - **Kernel**: the nested singular integral over two Matsubara frequencies
//!   producing the 4-channel susceptibility bundle over all representative
//!   separations ([`SusceptibilityKernel`]).
//! - **Measurement**: cutoff-keyed memoization, symmetry demultiplexing into
//!   the dense separation buffers, and master-only persistence
//!   ([`CorrelationMeasurement`]).
//! - **Store**: append-only, deduplicated snapshot persistence with one-time
//!   geometry metadata ([`ResultStore`]).

#![forbid(unsafe_code)]

pub mod kernel;
pub mod measurement;
pub mod store;

pub use kernel::{OutOfMeshRegions, SusceptibilityKernel};
pub use measurement::{CorrelationConfig, CorrelationMeasurement, FlowState, MeasurementError};
pub use store::{ResultStore, Snapshot, SnapshotChannels, SnapshotOutcome, StoreError, StoreResult};
