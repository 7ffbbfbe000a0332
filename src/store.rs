use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use directories::BaseDirs;

use crate::domain::{FrontierKey, LensModel, SimKey};
use crate::error::KappaError;

/// Computes canonical local paths for map files and index side-stores.
/// All path functions are pure; only the `ensure_*`/write helpers touch disk.
#[derive(Debug, Clone)]
pub struct Store {
    data_root: Utf8PathBuf,
    index_root: Utf8PathBuf,
}

impl Store {
    pub fn new() -> Result<Self, KappaError> {
        let cwd = std::env::current_dir().map_err(|err| KappaError::Filesystem(err.to_string()))?;
        let data_root = Utf8PathBuf::from_path_buf(cwd.join("kappa-maps"))
            .map_err(|_| KappaError::Filesystem("invalid data path".to_string()))?;

        let index_root = BaseDirs::new()
            .and_then(|dirs| {
                Utf8PathBuf::from_path_buf(dirs.home_dir().join(".cache").join("kappa-map-manager"))
                    .ok()
            })
            .ok_or_else(|| {
                KappaError::Filesystem("unable to resolve index cache directory".to_string())
            })?;

        Ok(Self {
            data_root,
            index_root,
        })
    }

    pub fn new_with_paths(data_root: Utf8PathBuf, index_root: Utf8PathBuf) -> Self {
        Self {
            data_root,
            index_root,
        }
    }

    pub fn data_root(&self) -> &Utf8Path {
        &self.data_root
    }

    pub fn index_root(&self) -> &Utf8Path {
        &self.index_root
    }

    pub fn sim_map_path(&self, key: &SimKey) -> Utf8PathBuf {
        self.data_root
            .join("simulated")
            .join(key.realization_dir())
            .join(key.filename())
    }

    pub fn frontier_map_path(&self, key: &FrontierKey) -> Utf8PathBuf {
        self.frontier_model_dir(&key.model)
            .join("range")
            .join(key.filename())
    }

    pub fn frontier_model_dir(&self, model: &LensModel) -> Utf8PathBuf {
        self.data_root
            .join("abell2744")
            .join("models")
            .join(&model.method)
            .join(&model.version)
    }

    pub fn sim_index_path(&self, root_folder_id: &str) -> Utf8PathBuf {
        self.index_root.join(format!("{root_folder_id}.csv"))
    }

    pub fn frontier_index_path(&self, model: &LensModel) -> Utf8PathBuf {
        self.index_root
            .join(format!("frontier_{}_{}.csv", model.method, model.version))
    }

    /// Existence on disk is the only cache-hit signal.
    pub fn is_downloaded(&self, path: &Utf8Path) -> bool {
        path.as_std_path().exists()
    }

    pub fn ensure_index_root(&self) -> Result<(), KappaError> {
        fs::create_dir_all(self.index_root.as_std_path())
            .map_err(|err| KappaError::Filesystem(err.to_string()))
    }

    /// Writes through a temp file in the destination directory and renames
    /// into place, so a crash mid-write never leaves a truncated map file
    /// masquerading as a cache hit.
    pub fn write_bytes_atomic(path: &Utf8Path, content: &[u8]) -> Result<(), KappaError> {
        let parent = path
            .parent()
            .ok_or_else(|| KappaError::Filesystem("invalid destination path".to_string()))?;
        fs::create_dir_all(parent.as_std_path())
            .map_err(|err| KappaError::Filesystem(err.to_string()))?;
        let temp = tempfile::Builder::new()
            .prefix("kappa-mm")
            .tempfile_in(parent.as_std_path())
            .map_err(|err| KappaError::Filesystem(err.to_string()))?;
        fs::write(temp.path(), content).map_err(|err| KappaError::Filesystem(err.to_string()))?;
        if path.as_std_path().exists() {
            fs::remove_file(path.as_std_path())
                .map_err(|err| KappaError::Filesystem(err.to_string()))?;
        }
        temp.persist(path.as_std_path())
            .map_err(|err| KappaError::Filesystem(err.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{FrontierKey, LensModel, SimKey};

    fn test_store() -> Store {
        Store::new_with_paths(Utf8PathBuf::from("/data"), Utf8PathBuf::from("/index"))
    }

    #[test]
    fn layout_paths() {
        let store = test_store();

        let sim = store.sim_map_path(&SimKey::new(7, 1.0, 3));
        assert!(sim.ends_with("D7/map_100_7_3_sph.fits"));

        let key = FrontierKey::new(LensModel::new("cats", "v4.1"), 5);
        let frontier = store.frontier_map_path(&key);
        assert!(frontier.ends_with(
            "abell2744/models/cats/v4.1/range/hlsp_frontier_model_abell2744_cats-map005_v4.1_kappa.fits"
        ));

        assert!(store.sim_index_path("folder123").ends_with("folder123.csv"));
        assert!(
            store
                .frontier_index_path(&key.model)
                .ends_with("frontier_cats_v4.1.csv")
        );
    }

    #[test]
    fn path_function_is_deterministic() {
        let store = test_store();
        let key = SimKey::new(12, 1.5, 0);
        assert_eq!(store.sim_map_path(&key), store.sim_map_path(&key));
    }
}
