use std::fs;
use std::path::PathBuf;

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};

use crate::domain::LensModel;
use crate::error::KappaError;
use crate::fetcher::DEFAULT_DRIVE_ROOT_ID;

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub data_root: Option<String>,
    #[serde(default)]
    pub index_root: Option<String>,
    #[serde(default)]
    pub drive_root_id: Option<String>,
    #[serde(default)]
    pub drive_token: Option<String>,
    #[serde(default)]
    pub models: Vec<String>,
    #[serde(default)]
    pub sim: Option<SimRangeConfig>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct SimRangeConfig {
    pub realizations: Vec<u32>,
    pub redshifts: Vec<f64>,
    pub projections: Vec<u32>,
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub data_root: Option<Utf8PathBuf>,
    pub index_root: Option<Utf8PathBuf>,
    pub drive_root_id: String,
    pub drive_token: Option<String>,
    pub models: Vec<LensModel>,
    pub sim: Option<SimRange>,
}

#[derive(Debug, Clone)]
pub struct SimRange {
    pub realizations: Vec<u32>,
    pub redshifts: Vec<f64>,
    pub projections: Vec<u32>,
}

pub struct ConfigLoader;

impl ConfigLoader {
    pub fn resolve(path: Option<&str>) -> Result<ResolvedConfig, KappaError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from("kappa-mm.json"),
        };

        if path.is_none() && !config_path.exists() {
            return Err(KappaError::MissingConfig);
        }

        let content = fs::read_to_string(&config_path)
            .map_err(|_| KappaError::ConfigRead(config_path.clone()))?;
        let config: Config = serde_json::from_str(&content)
            .map_err(|err| KappaError::ConfigParse(err.to_string()))?;

        Self::resolve_config(config)
    }

    pub fn resolve_config(config: Config) -> Result<ResolvedConfig, KappaError> {
        let models = config
            .models
            .iter()
            .map(|value| value.parse::<LensModel>())
            .collect::<Result<Vec<_>, _>>()?;

        Ok(ResolvedConfig {
            data_root: config.data_root.map(Utf8PathBuf::from),
            index_root: config.index_root.map(Utf8PathBuf::from),
            drive_root_id: config
                .drive_root_id
                .unwrap_or_else(|| DEFAULT_DRIVE_ROOT_ID.to_string()),
            drive_token: config.drive_token,
            models,
            sim: config.sim.map(|sim| SimRange {
                realizations: sim.realizations,
                redshifts: sim.redshifts,
                projections: sim.projections,
            }),
        })
    }
}
