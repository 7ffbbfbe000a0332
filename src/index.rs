use camino::Utf8Path;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::domain::{LensModel, SimKey, parse_frontier_filename};
use crate::drive::DriveClient;
use crate::error::KappaError;
use crate::frontier::FrontierClient;
use crate::store::Store;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimIndexEntry {
    pub realization_id: String,
    pub realization_name: String,
    pub map_id: String,
    pub map_filename: String,
    pub redshift: f64,
    pub realization: u32,
    pub projection: u32,
}

/// Table mapping (realization, redshift, projection) to the drive file id
/// holding that map, persisted as a csv side-store keyed by the remote
/// root folder id.
#[derive(Debug, Clone, PartialEq)]
pub struct SimMapIndex {
    entries: Vec<SimIndexEntry>,
}

impl SimMapIndex {
    /// Enumerates the remote folder structure and derives key fields from
    /// each map filename. Entries are filtered on the full name predicate
    /// (not stop-at-first-mismatch), so unsorted listings cannot silently
    /// truncate the table.
    pub fn build(drive: &dyn DriveClient, root_folder_id: &str) -> Result<Self, KappaError> {
        let mut entries = Vec::new();

        for folder in drive.list_children(root_folder_id)? {
            if !folder.is_folder || !folder.name.starts_with('D') {
                continue;
            }
            info!(realization = %folder.name, "found realization folder");
            for file in drive.list_children(&folder.id)? {
                if file.is_folder || !file.name.starts_with("map_") {
                    continue;
                }
                let key = SimKey::from_filename(&file.name)?;
                entries.push(SimIndexEntry {
                    realization_id: folder.id.clone(),
                    realization_name: folder.name.clone(),
                    map_id: file.id,
                    map_filename: file.name,
                    redshift: key.redshift,
                    realization: key.realization,
                    projection: key.projection,
                });
            }
        }

        entries.sort_by_key(|entry| {
            (
                entry.realization,
                (entry.redshift * 100.0).round() as u32,
                entry.projection,
            )
        });
        Ok(Self { entries })
    }

    pub fn from_entries(entries: Vec<SimIndexEntry>) -> Self {
        Self { entries }
    }

    pub fn load(path: &Utf8Path) -> Result<Self, KappaError> {
        let mut reader = csv::Reader::from_path(path.as_std_path())
            .map_err(|err| KappaError::Filesystem(err.to_string()))?;
        let entries = reader
            .deserialize()
            .collect::<Result<Vec<SimIndexEntry>, _>>()
            .map_err(|err| KappaError::IndexCorrupt(format!("{path}: {err}")))?;
        Ok(Self { entries })
    }

    pub fn save(&self, path: &Utf8Path) -> Result<(), KappaError> {
        Store::write_bytes_atomic(path, &self.to_csv_bytes()?)
    }

    pub fn to_csv_bytes(&self) -> Result<Vec<u8>, KappaError> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        for entry in &self.entries {
            writer
                .serialize(entry)
                .map_err(|err| KappaError::Filesystem(err.to_string()))?;
        }
        writer
            .into_inner()
            .map_err(|err| KappaError::Filesystem(err.to_string()))
    }

    /// Unique row for a key. Zero matches is NotFound; more than one means
    /// the side-store is corrupt and never resolved arbitrarily.
    pub fn lookup(&self, key: &SimKey) -> Result<&SimIndexEntry, KappaError> {
        let filename = key.filename();
        let mut matches = self
            .entries
            .iter()
            .filter(|entry| entry.map_filename == filename);
        let first = matches
            .next()
            .ok_or_else(|| KappaError::MapNotFound(key.to_string()))?;
        if matches.next().is_some() {
            return Err(KappaError::IndexIntegrity(key.to_string()));
        }
        Ok(first)
    }

    pub fn realizations(&self) -> Vec<u32> {
        let mut realizations = self
            .entries
            .iter()
            .map(|entry| entry.realization)
            .collect::<Vec<_>>();
        realizations.sort_unstable();
        realizations.dedup();
        realizations
    }

    pub fn entries(&self) -> &[SimIndexEntry] {
        &self.entries
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrontierIndexEntry {
    pub map_filename: String,
    pub kind: String,
    pub realization: u32,
}

/// Table of maps published for one lens model release. Kinds other than
/// "kappa" (shear components, magnification) are kept so `realizations`
/// can distinguish them.
#[derive(Debug, Clone, PartialEq)]
pub struct FrontierMapIndex {
    entries: Vec<FrontierIndexEntry>,
}

impl FrontierMapIndex {
    pub fn build(client: &dyn FrontierClient, model: &LensModel) -> Result<Self, KappaError> {
        let mut entries = Vec::new();
        for filename in client.list_maps(model)? {
            let (kind, realization) = parse_frontier_filename(&filename)?;
            entries.push(FrontierIndexEntry {
                map_filename: filename,
                kind,
                realization,
            });
        }
        entries.sort_by(|a, b| {
            (a.kind.as_str(), a.realization).cmp(&(b.kind.as_str(), b.realization))
        });
        Ok(Self { entries })
    }

    pub fn from_entries(entries: Vec<FrontierIndexEntry>) -> Self {
        Self { entries }
    }

    pub fn load(path: &Utf8Path) -> Result<Self, KappaError> {
        let mut reader = csv::Reader::from_path(path.as_std_path())
            .map_err(|err| KappaError::Filesystem(err.to_string()))?;
        let entries = reader
            .deserialize()
            .collect::<Result<Vec<FrontierIndexEntry>, _>>()
            .map_err(|err| KappaError::IndexCorrupt(format!("{path}: {err}")))?;
        Ok(Self { entries })
    }

    pub fn save(&self, path: &Utf8Path) -> Result<(), KappaError> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        for entry in &self.entries {
            writer
                .serialize(entry)
                .map_err(|err| KappaError::Filesystem(err.to_string()))?;
        }
        let bytes = writer
            .into_inner()
            .map_err(|err| KappaError::Filesystem(err.to_string()))?;
        Store::write_bytes_atomic(path, &bytes)
    }

    pub fn lookup(&self, n: u32) -> Result<&FrontierIndexEntry, KappaError> {
        let mut matches = self
            .entries
            .iter()
            .filter(|entry| entry.kind == "kappa" && entry.realization == n);
        let first = matches
            .next()
            .ok_or_else(|| KappaError::MapNotFound(format!("kappa map {n}")))?;
        if matches.next().is_some() {
            return Err(KappaError::IndexIntegrity(format!("kappa map {n}")));
        }
        Ok(first)
    }

    /// Sequence numbers of the published kappa maps.
    pub fn realizations(&self) -> Vec<u32> {
        self.entries
            .iter()
            .filter(|entry| entry.kind == "kappa")
            .map(|entry| entry.realization)
            .collect()
    }

    pub fn entries(&self) -> &[FrontierIndexEntry] {
        &self.entries
    }
}
