use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;
use tracing::info;

use crate::domain::{FrontierKey, LensModel, SimKey};
use crate::drive::DriveClient;
use crate::error::KappaError;
use crate::frontier::FrontierClient;
use crate::index::{FrontierMapIndex, SimMapIndex};
use crate::output::{ProgressEvent, ProgressSink};
use crate::store::Store;

/// Root drive folder holding the simulated map realizations.
pub const DEFAULT_DRIVE_ROOT_ID: &str = "1ZjN46EvDirPeBVv3Ucsfn289VUiPh2e6";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchAction {
    AlreadyPresent,
    Downloaded,
}

#[derive(Debug, Clone, Serialize)]
pub struct FetchOutcome {
    pub specifier: String,
    pub action: FetchAction,
    pub path: String,
    pub downloaded_at: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RangeItem {
    pub specifier: String,
    pub action: Option<FetchAction>,
    pub path: Option<String>,
    pub error: Option<String>,
}

/// Per-key outcomes of a Cartesian-product fetch. A failing key never
/// aborts the rest of the range.
#[derive(Debug, Clone, Serialize)]
pub struct RangeReport {
    pub downloaded: usize,
    pub already_present: usize,
    pub failed: usize,
    pub items: Vec<RangeItem>,
}

/// Ensures maps exist locally, resolving remote identifiers through the
/// index side-stores and fetching exactly when a file is absent (or
/// overwrite is requested).
pub struct Fetcher<D: DriveClient, F: FrontierClient> {
    store: Store,
    drive: D,
    frontier: F,
    drive_root_id: String,
    sim_index: Mutex<Option<SimMapIndex>>,
    write_locks: Mutex<HashMap<Utf8PathBuf, Arc<Mutex<()>>>>,
}

impl<D: DriveClient, F: FrontierClient> Fetcher<D, F> {
    pub fn new(store: Store, drive: D, frontier: F, drive_root_id: &str) -> Self {
        Self {
            store,
            drive,
            frontier,
            drive_root_id: drive_root_id.to_string(),
            sim_index: Mutex::new(None),
            write_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Builds the simulated-map index from the remote folder structure and
    /// persists it to the side-store. Returns the number of rows.
    pub fn build_sim_index(&self) -> Result<usize, KappaError> {
        let index = SimMapIndex::build(&self.drive, &self.drive_root_id)?;
        self.store.ensure_index_root()?;
        index.save(&self.store.sim_index_path(&self.drive_root_id))?;
        let rows = index.entries().len();
        info!(rows, "built simulated-map index");
        *self.lock_sim_index() = Some(index);
        Ok(rows)
    }

    /// Loads the frontier index for a model, building and persisting it on
    /// first use. The archive endpoint is unauthenticated, so an absent
    /// side-store is not a precondition failure here.
    pub fn frontier_index(&self, model: &LensModel) -> Result<FrontierMapIndex, KappaError> {
        let path = self.store.frontier_index_path(model);
        if self.store.is_downloaded(&path) {
            return FrontierMapIndex::load(&path);
        }
        self.build_frontier_index(model)
    }

    /// Rebuilds the frontier index from the live archive listing, replacing
    /// any cached side-store.
    pub fn build_frontier_index(&self, model: &LensModel) -> Result<FrontierMapIndex, KappaError> {
        let index = FrontierMapIndex::build(&self.frontier, model)?;
        self.store.ensure_index_root()?;
        index.save(&self.store.frontier_index_path(model))?;
        info!(model = %model, rows = index.entries().len(), "built frontier index");
        Ok(index)
    }

    pub fn sim_realizations(&self) -> Result<Vec<u32>, KappaError> {
        let mut guard = self.lock_sim_index();
        let index = self.loaded_sim_index(&mut guard)?;
        Ok(index.realizations())
    }

    pub fn ensure_sim(
        &self,
        key: &SimKey,
        overwrite: bool,
        sink: &dyn ProgressSink,
    ) -> Result<FetchOutcome, KappaError> {
        let path = self.store.sim_map_path(key);
        let lock = self.path_lock(&path);
        let _guard = lock.lock().unwrap_or_else(|err| err.into_inner());

        if !overwrite && self.store.is_downloaded(&path) {
            sink.event(ProgressEvent {
                message: format!("map file {} already downloaded", key.filename()),
                elapsed: None,
            });
            return Ok(already_present(key.to_string(), &path));
        }

        let map_id = {
            let mut guard = self.lock_sim_index();
            let index = self.loaded_sim_index(&mut guard)?;
            index.lookup(key)?.map_id.clone()
        };

        sink.event(ProgressEvent {
            message: format!("downloading map {} (id {map_id})", key.filename()),
            elapsed: None,
        });
        info!(key = %key, map_id = %map_id, "fetching simulated map");
        let bytes = self.drive.download_file(&map_id, sink)?;
        Store::write_bytes_atomic(&path, &bytes)?;

        Ok(downloaded(key.to_string(), &path))
    }

    pub fn ensure_frontier(
        &self,
        key: &FrontierKey,
        overwrite: bool,
        sink: &dyn ProgressSink,
    ) -> Result<FetchOutcome, KappaError> {
        let path = self.store.frontier_map_path(key);
        let lock = self.path_lock(&path);
        let _guard = lock.lock().unwrap_or_else(|err| err.into_inner());

        if !overwrite && self.store.is_downloaded(&path) {
            sink.event(ProgressEvent {
                message: format!("map file {} already downloaded", key.filename()),
                elapsed: None,
            });
            return Ok(already_present(key.to_string(), &path));
        }

        sink.event(ProgressEvent {
            message: format!("downloading {}", key.filename()),
            elapsed: None,
        });
        info!(key = %key, "fetching archive map");
        let bytes = self.frontier.download_map(&key.model, &key.filename())?;
        Store::write_bytes_atomic(&path, &bytes)?;

        Ok(downloaded(key.to_string(), &path))
    }

    /// Fetches the Cartesian product of the supplied key ranges, collecting
    /// per-key outcomes instead of aborting on the first failure.
    pub fn ensure_sim_range(
        &self,
        realizations: &[u32],
        redshifts: &[f64],
        projections: &[u32],
        overwrite: bool,
        sink: &dyn ProgressSink,
    ) -> RangeReport {
        let mut report = RangeReport {
            downloaded: 0,
            already_present: 0,
            failed: 0,
            items: Vec::new(),
        };

        for &realization in realizations {
            for &redshift in redshifts {
                for &projection in projections {
                    let key = SimKey::new(realization, redshift, projection);
                    match self.ensure_sim(&key, overwrite, sink) {
                        Ok(outcome) => {
                            match outcome.action {
                                FetchAction::Downloaded => report.downloaded += 1,
                                FetchAction::AlreadyPresent => report.already_present += 1,
                            }
                            report.items.push(RangeItem {
                                specifier: outcome.specifier,
                                action: Some(outcome.action),
                                path: Some(outcome.path),
                                error: None,
                            });
                        }
                        Err(err) => {
                            report.failed += 1;
                            report.items.push(RangeItem {
                                specifier: key.to_string(),
                                action: None,
                                path: None,
                                error: Some(err.to_string()),
                            });
                        }
                    }
                }
            }
        }

        report
    }

    fn lock_sim_index(&self) -> std::sync::MutexGuard<'_, Option<SimMapIndex>> {
        self.sim_index.lock().unwrap_or_else(|err| err.into_inner())
    }

    /// Returns the cached index, loading the side-store on first use. No
    /// remote calls: an absent side-store is a precondition failure.
    fn loaded_sim_index<'a>(
        &self,
        guard: &'a mut Option<SimMapIndex>,
    ) -> Result<&'a SimMapIndex, KappaError> {
        if guard.is_none() {
            let path = self.store.sim_index_path(&self.drive_root_id);
            if !self.store.is_downloaded(&path) {
                return Err(KappaError::IndexUnavailable(path.to_string()));
            }
            *guard = Some(SimMapIndex::load(&path)?);
        }
        Ok(guard.as_ref().expect("index loaded above"))
    }

    fn path_lock(&self, path: &Utf8Path) -> Arc<Mutex<()>> {
        let mut locks = self
            .write_locks
            .lock()
            .unwrap_or_else(|err| err.into_inner());
        locks.entry(path.to_path_buf()).or_default().clone()
    }
}

fn already_present(specifier: String, path: &Utf8Path) -> FetchOutcome {
    FetchOutcome {
        specifier,
        action: FetchAction::AlreadyPresent,
        path: path.to_string(),
        downloaded_at: None,
    }
}

fn downloaded(specifier: String, path: &Utf8Path) -> FetchOutcome {
    FetchOutcome {
        specifier,
        action: FetchAction::Downloaded,
        path: path.to_string(),
        downloaded_at: Some(chrono::Utc::now().to_rfc3339()),
    }
}
