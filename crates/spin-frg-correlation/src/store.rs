//! Structured result store for correlation snapshots.
//!
//! The store is a directory tree mirroring the logical schema: one directory
//! per observable group, holding a `meta.json` with the lattice geometry
//! (written once, never overwritten) and a `data/` collection of sequentially
//! named snapshots. Each snapshot carries the cutoff it was taken at, a write
//! timestamp, and one 2-D array per correlation channel shaped
//! `[basis_count, range_count]`.
//!
//! Snapshots are append-only and deduplicated by exact cutoff equality: a
//! snapshot whose cutoff matches an existing entry is logged and discarded,
//! never overwritten. Only the designated writer worker may call into the
//! store; there is no concurrent-writer handling by construction.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use spin_frg_core::lattice::{Lattice, LatticeGeometry};

/// A specialized `Result` type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors raised by the result store. All are fatal to the offending write;
/// nothing is retried.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum StoreError {
    /// Filesystem access failed
    #[error("Could not access result store path [{path}]: {source}")]
    Io {
        /// Offending path
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Snapshot or metadata (de)serialization failed
    #[error("Could not encode or decode store entry [{path}]: {source}")]
    Serialization {
        /// Offending path
        path: PathBuf,
        /// Underlying serialization error
        #[source]
        source: serde_json::Error,
    },

    /// A flat channel buffer does not match the lattice shape
    #[error("Channel buffer of length {len} does not match lattice shape {basis}x{range}")]
    Shape {
        /// Buffer length
        len: usize,
        /// Lattice basis count
        basis: usize,
        /// Lattice range count
        range: usize,
    },
}

/// Per-channel 2-D correlation arrays of one snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotChannels {
    /// Spin-spin correlation along x.
    pub x: Array2<f32>,
    /// Spin-spin correlation along y.
    pub y: Array2<f32>,
    /// Spin-spin correlation along z.
    pub z: Array2<f32>,
    /// Density-density correlation.
    pub density: Array2<f32>,
}

/// One persisted correlation measurement, keyed by cutoff.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    /// RG cutoff the snapshot was taken at.
    pub cutoff: f32,
    /// Wall-clock write time.
    pub written_at: DateTime<Utc>,
    /// Channel data, shaped `[basis_count, range_count]`.
    pub channels: SnapshotChannels,
}

/// Header-only view of a snapshot, used for cheap dedup scans.
#[derive(Debug, Deserialize)]
struct SnapshotHead {
    cutoff: f32,
}

/// Outcome of a snapshot write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SnapshotOutcome {
    /// A new snapshot was persisted under the given name.
    Written(String),
    /// A snapshot with the same cutoff already exists; nothing was written.
    Duplicate,
}

/// Append-only, deduplicated snapshot store rooted at a directory.
#[derive(Debug, Clone)]
pub struct ResultStore {
    root: PathBuf,
}

impl ResultStore {
    /// Open a store, creating the root directory if necessary.
    pub fn open(root: impl AsRef<Path>) -> StoreResult<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root).map_err(|source| StoreError::Io {
            path: root.clone(),
            source,
        })?;
        Ok(Self { root })
    }

    /// Root directory of the store.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Whether an observable group already carries geometry metadata.
    #[must_use]
    pub fn has_meta(&self, group: &str) -> bool {
        self.meta_path(group).exists()
    }

    /// Write the one-time geometry metadata of an observable group.
    ///
    /// Returns `false` (with a warning) if the group already carries
    /// metadata; existing metadata is never overwritten.
    pub fn write_meta_once(&self, group: &str, geometry: &LatticeGeometry) -> StoreResult<bool> {
        let path = self.meta_path(group);
        if path.exists() {
            warn!(
                group,
                "observable group already contains geometry metadata, skipping write"
            );
            return Ok(false);
        }
        self.ensure_dir(&self.group_dir(group))?;
        write_json(&path, geometry)?;
        debug!(group, "wrote geometry metadata");
        Ok(true)
    }

    /// Persist the four flat correlation buffers as one snapshot keyed by
    /// `cutoff`.
    ///
    /// Geometry metadata is written lazily on the first snapshot of a group.
    /// If any existing snapshot in the group was taken at exactly the same
    /// cutoff, the new snapshot is discarded with a warning.
    pub fn write_snapshot(
        &self,
        group: &str,
        cutoff: f32,
        lattice: &Lattice,
        channels: [&[f32]; 4],
    ) -> StoreResult<SnapshotOutcome> {
        let data_dir = self.data_dir(group);
        self.ensure_dir(&data_dir)?;

        if !self.has_meta(group) {
            self.write_meta_once(group, lattice.geometry())?;
        }

        let existing = self.snapshot_names(group)?;
        for name in &existing {
            let path = data_dir.join(name);
            let head: SnapshotHead = read_json(&path)?;
            if head.cutoff == cutoff {
                warn!(
                    group,
                    cutoff, "found existing correlation snapshot at this cutoff, discarding duplicate"
                );
                return Ok(SnapshotOutcome::Duplicate);
            }
        }

        let basis = lattice.basis_count();
        let range = lattice.range_count();
        let [x, y, z, density] = channels;
        let snapshot = Snapshot {
            cutoff,
            written_at: Utc::now(),
            channels: SnapshotChannels {
                x: to_array(x, basis, range)?,
                y: to_array(y, basis, range)?,
                z: to_array(z, basis, range)?,
                density: to_array(density, basis, range)?,
            },
        };

        let name = format!("measurement_{}.json", existing.len());
        write_json(&data_dir.join(&name), &snapshot)?;
        debug!(group, cutoff, name, "wrote correlation snapshot");
        Ok(SnapshotOutcome::Written(name))
    }

    /// Names of the snapshots in a group, in write order.
    pub fn snapshot_names(&self, group: &str) -> StoreResult<Vec<String>> {
        let data_dir = self.data_dir(group);
        if !data_dir.exists() {
            return Ok(Vec::new());
        }
        let entries = fs::read_dir(&data_dir).map_err(|source| StoreError::Io {
            path: data_dir.clone(),
            source,
        })?;

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| StoreError::Io {
                path: data_dir.clone(),
                source,
            })?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with("measurement_") && name.ends_with(".json") {
                names.push(name);
            }
        }
        names.sort_by_key(|name| sequence_number(name));
        Ok(names)
    }

    /// Number of snapshots in a group.
    pub fn snapshot_count(&self, group: &str) -> StoreResult<usize> {
        Ok(self.snapshot_names(group)?.len())
    }

    /// Read one snapshot back by name.
    pub fn read_snapshot(&self, group: &str, name: &str) -> StoreResult<Snapshot> {
        read_json(&self.data_dir(group).join(name))
    }

    fn group_dir(&self, group: &str) -> PathBuf {
        self.root.join(group)
    }

    fn data_dir(&self, group: &str) -> PathBuf {
        self.group_dir(group).join("data")
    }

    fn meta_path(&self, group: &str) -> PathBuf {
        self.group_dir(group).join("meta.json")
    }

    fn ensure_dir(&self, dir: &Path) -> StoreResult<()> {
        fs::create_dir_all(dir).map_err(|source| StoreError::Io {
            path: dir.to_path_buf(),
            source,
        })
    }
}

fn sequence_number(name: &str) -> usize {
    name.trim_start_matches("measurement_")
        .trim_end_matches(".json")
        .parse()
        .unwrap_or(usize::MAX)
}

fn to_array(flat: &[f32], basis: usize, range: usize) -> StoreResult<Array2<f32>> {
    Array2::from_shape_vec((basis, range), flat.to_vec()).map_err(|_| StoreError::Shape {
        len: flat.len(),
        basis,
        range,
    })
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> StoreResult<()> {
    let file = File::create(path).map_err(|source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::to_writer_pretty(BufWriter::new(file), value).map_err(|source| {
        StoreError::Serialization {
            path: path.to_path_buf(),
            source,
        }
    })
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> StoreResult<T> {
    let file = File::open(path).map_err(|source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_reader(BufReader::new(file)).map_err(|source| StoreError::Serialization {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn flat(lattice: &Lattice, fill: f32) -> Vec<f32> {
        vec![fill; lattice.separation_count()]
    }

    #[test]
    fn test_snapshot_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = ResultStore::open(dir.path()).unwrap();
        let lattice = Lattice::single_basis_chain(3);

        let x = vec![1.0, 2.0, 3.0];
        let outcome = store
            .write_snapshot("correlation", 0.75, &lattice, [&x, &x, &x, &x])
            .unwrap();
        let SnapshotOutcome::Written(name) = outcome else {
            panic!("expected a written snapshot");
        };

        let snapshot = store.read_snapshot("correlation", &name).unwrap();
        assert_eq!(snapshot.cutoff, 0.75);
        assert_eq!(snapshot.channels.x.shape(), &[1, 3]);
        assert_eq!(snapshot.channels.density[[0, 2]], 3.0);
    }

    #[test]
    fn test_deduplication_by_exact_cutoff() {
        let dir = TempDir::new().unwrap();
        let store = ResultStore::open(dir.path()).unwrap();
        let lattice = Lattice::single_basis_chain(2);
        let buf = flat(&lattice, 1.0);
        let channels = [buf.as_slice(); 4];

        assert!(matches!(
            store.write_snapshot("correlation", 1.0, &lattice, channels).unwrap(),
            SnapshotOutcome::Written(_)
        ));
        assert_eq!(
            store.write_snapshot("correlation", 1.0, &lattice, channels).unwrap(),
            SnapshotOutcome::Duplicate
        );
        assert!(matches!(
            store.write_snapshot("correlation", 0.5, &lattice, channels).unwrap(),
            SnapshotOutcome::Written(_)
        ));

        assert_eq!(store.snapshot_count("correlation").unwrap(), 2);
        assert_eq!(
            store.snapshot_names("correlation").unwrap(),
            vec!["measurement_0.json", "measurement_1.json"]
        );
    }

    #[test]
    fn test_metadata_written_once() {
        let dir = TempDir::new().unwrap();
        let store = ResultStore::open(dir.path()).unwrap();
        let lattice = Lattice::single_basis_chain(2);
        let buf = flat(&lattice, 0.0);
        let channels = [buf.as_slice(); 4];

        store.write_snapshot("correlation", 1.0, &lattice, channels).unwrap();
        assert!(store.has_meta("correlation"));
        store.write_snapshot("correlation", 0.5, &lattice, channels).unwrap();

        // The explicit metadata write is refused once present.
        assert!(!store.write_meta_once("correlation", lattice.geometry()).unwrap());

        let group_files: Vec<String> = fs::read_dir(dir.path().join("correlation"))
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            group_files.iter().filter(|n| n.as_str() == "meta.json").count(),
            1
        );
    }

    #[test]
    fn test_shape_mismatch_is_rejected() {
        let dir = TempDir::new().unwrap();
        let store = ResultStore::open(dir.path()).unwrap();
        let lattice = Lattice::single_basis_chain(3);
        let short = vec![1.0, 2.0];

        let result = store.write_snapshot(
            "correlation",
            1.0,
            &lattice,
            [&short, &short, &short, &short],
        );
        assert!(matches!(result, Err(StoreError::Shape { len: 2, .. })));
    }
}
