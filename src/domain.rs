use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::KappaError;

/// Key of one simulated convergence map: (realization, redshift, projection).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimKey {
    pub realization: u32,
    pub redshift: f64,
    pub projection: u32,
}

impl SimKey {
    pub fn new(realization: u32, redshift: f64, projection: u32) -> Self {
        Self {
            realization,
            redshift,
            projection,
        }
    }

    /// Redshift encoded the way the map filenames encode it: int(100 * z).
    /// The epsilon guards against values like 1.00 stored as 0.999999...
    pub fn redshift_code(&self) -> u32 {
        (100.0 * (self.redshift + 1e-16)) as u32
    }

    pub fn filename(&self) -> String {
        format!(
            "map_{:03}_{}_{}_sph.fits",
            self.redshift_code(),
            self.realization,
            self.projection
        )
    }

    pub fn realization_dir(&self) -> String {
        format!("D{}", self.realization)
    }

    pub fn from_filename(name: &str) -> Result<Self, KappaError> {
        let tokens = name.split('_').collect::<Vec<_>>();
        let [prefix, code, realization, projection, suffix] = tokens.as_slice() else {
            return Err(KappaError::InvalidFilename(name.to_string()));
        };
        if *prefix != "map" || *suffix != "sph.fits" {
            return Err(KappaError::InvalidFilename(name.to_string()));
        }
        let code = code
            .parse::<u32>()
            .map_err(|_| KappaError::InvalidFilename(name.to_string()))?;
        let realization = realization
            .parse::<u32>()
            .map_err(|_| KappaError::InvalidFilename(name.to_string()))?;
        let projection = projection
            .parse::<u32>()
            .map_err(|_| KappaError::InvalidFilename(name.to_string()))?;
        Ok(Self {
            realization,
            redshift: code as f64 / 100.0,
            projection,
        })
    }
}

impl fmt::Display for SimKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "sim:{}:{}:{}",
            self.realization, self.redshift, self.projection
        )
    }
}

/// One Frontier Fields lensing model (reconstruction method + release version).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LensModel {
    pub method: String,
    pub version: String,
}

impl LensModel {
    pub fn new(method: &str, version: &str) -> Self {
        Self {
            method: method.to_string(),
            version: version.to_string(),
        }
    }

    /// Published Abell 2744 model releases on the STScI archive.
    pub fn known_models() -> Vec<LensModel> {
        [
            ("cats", "v4.1"),
            ("williams", "v4"),
            ("bradac", "v2"),
            ("glafic", "v4"),
        ]
        .iter()
        .map(|(method, version)| LensModel::new(method, version))
        .collect()
    }

    fn default_version(method: &str) -> Option<&'static str> {
        match method {
            "cats" => Some("v4.1"),
            "williams" => Some("v4"),
            "bradac" => Some("v2"),
            "glafic" => Some("v4"),
            _ => None,
        }
    }
}

impl fmt::Display for LensModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.method, self.version)
    }
}

impl FromStr for LensModel {
    type Err = KappaError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        if let Some((method, version)) = trimmed.split_once('/') {
            if method.is_empty() || version.is_empty() {
                return Err(KappaError::UnknownModel(value.to_string()));
            }
            return Ok(LensModel::new(method, version));
        }
        match Self::default_version(trimmed) {
            Some(version) => Ok(LensModel::new(trimmed, version)),
            None => Err(KappaError::UnknownModel(value.to_string())),
        }
    }
}

/// Key of one archive map: sequence number scoped by a lens model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrontierKey {
    pub model: LensModel,
    pub n: u32,
}

impl FrontierKey {
    pub fn new(model: LensModel, n: u32) -> Self {
        Self { model, n }
    }

    pub fn filename(&self) -> String {
        format!(
            "hlsp_frontier_model_abell2744_{}-map{:03}_{}_kappa.fits",
            self.model.method, self.n, self.model.version
        )
    }
}

impl fmt::Display for FrontierKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "frontier:{}:{}", self.model, self.n)
    }
}

/// Fields derivable from any `hlsp_*` archive filename: the map kind
/// (trailing token, e.g. "kappa" or "gamma") and the sequence number.
pub fn parse_frontier_filename(name: &str) -> Result<(String, u32), KappaError> {
    let stem = name
        .strip_suffix(".fits")
        .ok_or_else(|| KappaError::InvalidFilename(name.to_string()))?;
    let kind = stem
        .rsplit('_')
        .next()
        .filter(|kind| !kind.is_empty())
        .ok_or_else(|| KappaError::InvalidFilename(name.to_string()))?;
    let after_map = name
        .split_once("map")
        .map(|(_, rest)| rest)
        .ok_or_else(|| KappaError::InvalidFilename(name.to_string()))?;
    let digits = after_map
        .chars()
        .take_while(|ch| ch.is_ascii_digit())
        .collect::<String>();
    if digits.is_empty() {
        return Err(KappaError::InvalidFilename(name.to_string()));
    }
    let n = digits
        .parse::<u32>()
        .map_err(|_| KappaError::InvalidFilename(name.to_string()))?;
    Ok((kind.to_string(), n))
}

#[derive(Debug, Clone, PartialEq)]
pub enum MapSpecifier {
    Sim(SimKey),
    Frontier(FrontierKey),
}

impl MapSpecifier {
    pub fn source(&self) -> &'static str {
        match self {
            MapSpecifier::Sim(_) => "sim",
            MapSpecifier::Frontier(_) => "frontier",
        }
    }
}

impl fmt::Display for MapSpecifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MapSpecifier::Sim(key) => write!(f, "{key}"),
            MapSpecifier::Frontier(key) => write!(f, "{key}"),
        }
    }
}

impl FromStr for MapSpecifier {
    type Err = KappaError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        let (kind, rest) = trimmed
            .split_once(':')
            .ok_or_else(|| KappaError::InvalidSpecifier(value.to_string()))?;
        match kind {
            "sim" => {
                let parts = rest.split(':').collect::<Vec<_>>();
                let [realization, redshift, projection] = parts.as_slice() else {
                    return Err(KappaError::InvalidSpecifier(value.to_string()));
                };
                let realization = realization
                    .parse::<u32>()
                    .map_err(|_| KappaError::InvalidSpecifier(value.to_string()))?;
                let redshift = redshift
                    .parse::<f64>()
                    .map_err(|_| KappaError::InvalidSpecifier(value.to_string()))?;
                let projection = projection
                    .parse::<u32>()
                    .map_err(|_| KappaError::InvalidSpecifier(value.to_string()))?;
                if !redshift.is_finite() || redshift < 0.0 {
                    return Err(KappaError::InvalidSpecifier(value.to_string()));
                }
                Ok(MapSpecifier::Sim(SimKey::new(
                    realization,
                    redshift,
                    projection,
                )))
            }
            "frontier" => {
                let (model, n) = rest
                    .rsplit_once(':')
                    .ok_or_else(|| KappaError::InvalidSpecifier(value.to_string()))?;
                let model = model.parse::<LensModel>()?;
                let n = n
                    .parse::<u32>()
                    .map_err(|_| KappaError::InvalidSpecifier(value.to_string()))?;
                Ok(MapSpecifier::Frontier(FrontierKey::new(model, n)))
            }
            _ => Err(KappaError::InvalidSpecifier(value.to_string())),
        }
    }
}
