//! Correlation measurement protocol: memoized recomputation plus persistence.
//!
//! One measurement owns the four flat real-space buffers
//! (`basis_count * range_count` entries each) and a cutoff-keyed cache. A
//! `take_measurement` call recomputes only when the flow has moved to a new
//! cutoff since the last call; otherwise it is a complete no-op, neither
//! recomputing nor writing. After a recomputation, the designated writer
//! persists one snapshot through the result store.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use spin_frg_core::bundle::{Channel, ChannelBundle};
use spin_frg_core::dispatch::{ChannelSample, ChannelTargets, Dispatcher};
use spin_frg_core::frequency::FrequencyGrid;
use spin_frg_core::lattice::Lattice;
use spin_frg_core::vertex::{SingleParticleVertex, TwoParticleVertex};

use crate::kernel::SusceptibilityKernel;
use crate::store::{ResultStore, StoreError};

/// The effective-action surface the flow driver exposes to measurements.
pub trait FlowState {
    /// Current RG cutoff scale.
    fn cutoff(&self) -> f32;

    /// Single-particle vertex (self-energy) at the current cutoff.
    fn single_particle(&self) -> &dyn SingleParticleVertex;

    /// Two-particle vertex at the current cutoff.
    fn two_particle(&self) -> &dyn TwoParticleVertex;
}

/// Configuration of one correlation measurement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorrelationConfig {
    /// Observable group the snapshots are stored under.
    pub observable_group: String,
    /// Lower bound of the cutoff window in which the measurement is active.
    pub min_cutoff: f32,
    /// Upper bound of the cutoff window in which the measurement is active.
    pub max_cutoff: f32,
    /// External offset frequency of the correlation (0 for the static
    /// correlation function).
    pub offset_frequency: f32,
    /// Number of cooperating workers for the per-separation demultiplex.
    pub workers: usize,
    /// Deferred measurements are skipped during the flow and taken only
    /// through [`CorrelationMeasurement::take_deferred_measurement`] in
    /// postprocessing.
    pub deferred: bool,
}

impl Default for CorrelationConfig {
    fn default() -> Self {
        Self {
            observable_group: "correlation".to_string(),
            min_cutoff: 0.0,
            max_cutoff: f32::INFINITY,
            offset_frequency: 0.0,
            workers: 1,
            deferred: false,
        }
    }
}

/// Errors raised while taking a measurement.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum MeasurementError {
    /// Snapshot persistence failed
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Real-space spin-spin correlation measurement with cutoff-keyed memoization.
pub struct CorrelationMeasurement {
    config: CorrelationConfig,
    lattice: Arc<Lattice>,
    grid: Arc<FrequencyGrid>,
    store: ResultStore,
    dispatcher: Dispatcher,
    cached_cutoff: f32,
    x: Vec<f32>,
    y: Vec<f32>,
    z: Vec<f32>,
    density: Vec<f32>,
}

impl CorrelationMeasurement {
    /// Create a measurement over the given lattice and frequency mesh,
    /// persisting into `store`.
    #[must_use]
    pub fn new(
        config: CorrelationConfig,
        lattice: Arc<Lattice>,
        grid: Arc<FrequencyGrid>,
        store: ResultStore,
    ) -> Self {
        let len = lattice.separation_count();
        let dispatcher = Dispatcher::new(config.workers);
        Self {
            config,
            lattice,
            grid,
            store,
            dispatcher,
            // No flow cutoff is ever negative, so the first call always
            // recomputes.
            cached_cutoff: -1.0,
            x: vec![0.0; len],
            y: vec![0.0; len],
            z: vec![0.0; len],
            density: vec![0.0; len],
        }
    }

    /// Measurement configuration.
    #[must_use]
    pub fn config(&self) -> &CorrelationConfig {
        &self.config
    }

    /// Cutoff of the most recent recomputation, or -1.0 before the first.
    #[must_use]
    pub fn cached_cutoff(&self) -> f32 {
        self.cached_cutoff
    }

    /// Current buffer of one channel, indexed by separation.
    #[must_use]
    pub fn channel_values(&self, channel: Channel) -> &[f32] {
        match channel {
            Channel::X => &self.x,
            Channel::Y => &self.y,
            Channel::Z => &self.z,
            Channel::Density => &self.density,
        }
    }

    /// Whether a cutoff lies inside the configured measurement window.
    #[must_use]
    pub fn in_window(&self, cutoff: f32) -> bool {
        cutoff >= self.config.min_cutoff && cutoff <= self.config.max_cutoff
    }

    /// Take a measurement at the flow's current cutoff.
    ///
    /// Deferred measurements and cutoffs outside the configured window are
    /// skipped. An unchanged cutoff is a complete no-op: no recomputation and
    /// no snapshot. Only the call with `is_master` set persists a snapshot.
    pub fn take_measurement(
        &mut self,
        state: &dyn FlowState,
        is_master: bool,
    ) -> Result<(), MeasurementError> {
        if self.config.deferred {
            debug!("measurement is deferred, skipping during flow");
            return Ok(());
        }
        self.measure(state, is_master)
    }

    /// Take a deferred measurement in postprocessing, ignoring the deferred
    /// flag but honoring the cutoff window and the memoization.
    pub fn take_deferred_measurement(
        &mut self,
        state: &dyn FlowState,
        is_master: bool,
    ) -> Result<(), MeasurementError> {
        self.measure(state, is_master)
    }

    fn measure(&mut self, state: &dyn FlowState, is_master: bool) -> Result<(), MeasurementError> {
        let cutoff = state.cutoff();
        if !self.in_window(cutoff) {
            debug!(
                cutoff,
                min = self.config.min_cutoff,
                max = self.config.max_cutoff,
                "cutoff outside measurement window, skipping"
            );
            return Ok(());
        }
        if cutoff == self.cached_cutoff {
            debug!(cutoff, "susceptibility already computed at this cutoff");
            return Ok(());
        }

        self.recompute(state, cutoff);

        if is_master {
            self.store.write_snapshot(
                &self.config.observable_group,
                cutoff,
                &self.lattice,
                [&self.x, &self.y, &self.z, &self.density],
            )?;
        }
        Ok(())
    }

    fn recompute(&mut self, state: &dyn FlowState, cutoff: f32) {
        let kernel = SusceptibilityKernel {
            cutoff,
            offset_frequency: self.config.offset_frequency,
            lattice: &self.lattice,
            grid: &self.grid,
            single_particle: state.single_particle(),
            two_particle: state.two_particle(),
        };

        let regions = kernel.out_of_mesh_regions();
        if regions.any() {
            warn!(
                cutoff,
                negative_tail = regions.negative_tail,
                positive_tail = regions.positive_tail,
                "cutoff breakpoints fall outside the frequency mesh, dropping out-of-mesh regions"
            );
        }

        // The kernel yields the representative-space bundle once; the workers
        // demultiplex it into the dense separation buffers through the
        // symmetry map.
        let representative = kernel.evaluate();
        let lattice: &Lattice = &self.lattice;
        self.dispatcher.calculate(
            lattice.separation_count(),
            |separation| demultiplex(lattice, &representative, separation),
            &mut ChannelTargets {
                x: &mut self.x,
                y: &mut self.y,
                z: &mut self.z,
                density: &mut self.density,
            },
        );
        self.cached_cutoff = cutoff;
    }
}

/// Resolve one dense separation index against the representative-space bundle.
fn demultiplex(lattice: &Lattice, bundle: &ChannelBundle, separation: usize) -> ChannelSample {
    let mut values = [0.0_f32; 4];
    for channel in Channel::ALL {
        let image = lattice.transform_separation(separation, channel);
        values[channel.index()] = image.sign * bundle.channel(channel)[image.rid];
    }
    ChannelSample {
        x: values[Channel::X.index()],
        y: values[Channel::Y.index()],
        z: values[Channel::Z.index()],
        density: values[Channel::Density.index()],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    struct ZeroSelfEnergy;

    impl SingleParticleVertex for ZeroSelfEnergy {
        fn value(&self, _w: f32) -> f32 {
            0.0
        }
    }

    /// Zero vertex that counts how often it is queried.
    struct CountingVertex {
        calls: AtomicUsize,
    }

    impl CountingVertex {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::Relaxed)
        }
    }

    impl TwoParticleVertex for CountingVertex {
        fn origin_value(&self, _s: f32, _t: f32, _u: f32, _channel: Channel) -> f32 {
            self.calls.fetch_add(1, Ordering::Relaxed);
            0.0
        }

        fn bundle(&self, _s: f32, _t: f32, _u: f32, out: &mut ChannelBundle) {
            self.calls.fetch_add(1, Ordering::Relaxed);
            use spin_frg_core::quadrature::Accumulate;
            out.reset();
        }
    }

    struct StaticState {
        cutoff: f32,
        sigma: ZeroSelfEnergy,
        vertex: CountingVertex,
    }

    impl StaticState {
        fn new(cutoff: f32) -> Self {
            Self {
                cutoff,
                sigma: ZeroSelfEnergy,
                vertex: CountingVertex::new(),
            }
        }
    }

    impl FlowState for StaticState {
        fn cutoff(&self) -> f32 {
            self.cutoff
        }

        fn single_particle(&self) -> &dyn SingleParticleVertex {
            &self.sigma
        }

        fn two_particle(&self) -> &dyn TwoParticleVertex {
            &self.vertex
        }
    }

    fn measurement(config: CorrelationConfig, dir: &TempDir) -> CorrelationMeasurement {
        let lattice = Arc::new(Lattice::single_basis_chain(4));
        let grid = Arc::new(FrequencyGrid::new(&[1.0, 2.0]).unwrap());
        let store = ResultStore::open(dir.path()).unwrap();
        CorrelationMeasurement::new(config, lattice, grid, store)
    }

    #[test]
    fn test_unchanged_cutoff_is_a_no_op() {
        let dir = TempDir::new().unwrap();
        let mut m = measurement(CorrelationConfig::default(), &dir);
        let state = StaticState::new(1.0);

        m.take_measurement(&state, true).unwrap();
        let calls_after_first = state.vertex.calls();
        assert!(calls_after_first > 0);
        assert_eq!(m.store.snapshot_count("correlation").unwrap(), 1);

        m.take_measurement(&state, true).unwrap();
        assert_eq!(state.vertex.calls(), calls_after_first);
        assert_eq!(m.store.snapshot_count("correlation").unwrap(), 1);
    }

    #[test]
    fn test_cutoff_window_skips_without_caching() {
        let dir = TempDir::new().unwrap();
        let config = CorrelationConfig {
            max_cutoff: 2.0,
            ..CorrelationConfig::default()
        };
        let mut m = measurement(config, &dir);

        let outside = StaticState::new(5.0);
        m.take_measurement(&outside, true).unwrap();
        assert_eq!(outside.vertex.calls(), 0);
        assert_eq!(m.cached_cutoff(), -1.0);
        assert_eq!(m.store.snapshot_count("correlation").unwrap(), 0);

        let inside = StaticState::new(1.0);
        m.take_measurement(&inside, true).unwrap();
        assert_eq!(m.cached_cutoff(), 1.0);
        assert_eq!(m.store.snapshot_count("correlation").unwrap(), 1);
    }

    #[test]
    fn test_deferred_measurement_skips_during_flow() {
        let dir = TempDir::new().unwrap();
        let config = CorrelationConfig {
            deferred: true,
            ..CorrelationConfig::default()
        };
        let mut m = measurement(config, &dir);
        let state = StaticState::new(1.0);

        m.take_measurement(&state, true).unwrap();
        assert_eq!(state.vertex.calls(), 0);
        assert_eq!(m.store.snapshot_count("correlation").unwrap(), 0);

        m.take_deferred_measurement(&state, true).unwrap();
        assert!(state.vertex.calls() > 0);
        assert_eq!(m.store.snapshot_count("correlation").unwrap(), 1);
    }

    #[test]
    fn test_only_master_persists() {
        let dir = TempDir::new().unwrap();
        let mut m = measurement(CorrelationConfig::default(), &dir);
        let state = StaticState::new(1.0);

        m.take_measurement(&state, false).unwrap();
        assert_eq!(m.cached_cutoff(), 1.0);
        assert_eq!(m.store.snapshot_count("correlation").unwrap(), 0);

        let later = StaticState::new(0.5);
        m.take_measurement(&later, true).unwrap();
        assert_eq!(m.store.snapshot_count("correlation").unwrap(), 1);
    }
}
