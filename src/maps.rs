use camino::Utf8Path;
use fitrs::{Fits, FitsData, Hdu, HeaderValue};
use ndarray::{Array2, s};

use crate::cosmo;
use crate::error::KappaError;

const DEG_TO_ARCSEC: f64 = 3600.0;

/// A physically-scaled convergence map: dimensionless kappa samples plus
/// the total angular extent of the field.
#[derive(Debug, Clone, PartialEq)]
pub struct ConvergenceMap {
    angle_arcsec: f64,
    data: Array2<f64>,
}

impl ConvergenceMap {
    pub fn new(angle_arcsec: f64, data: Array2<f64>) -> Self {
        Self { angle_arcsec, data }
    }

    pub fn angle_arcsec(&self) -> f64 {
        self.angle_arcsec
    }

    pub fn data(&self) -> &Array2<f64> {
        &self.data
    }

    pub fn side(&self) -> usize {
        self.data.nrows()
    }

    pub fn pixel_scale_arcsec(&self) -> f64 {
        self.angle_arcsec / self.side() as f64
    }

    pub fn mean(&self) -> f64 {
        self.data.mean().unwrap_or(0.0)
    }

    pub fn min(&self) -> f64 {
        self.data.iter().copied().fold(f64::INFINITY, f64::min)
    }

    pub fn max(&self) -> f64 {
        self.data.iter().copied().fold(f64::NEG_INFINITY, f64::max)
    }
}

struct PrimaryHdu {
    hdu: Hdu,
    path: String,
}

impl PrimaryHdu {
    fn open(path: &Utf8Path) -> Result<Self, KappaError> {
        let fits = Fits::open(path.as_std_path())
            .map_err(|err| KappaError::Filesystem(format!("open {path}: {err}")))?;
        let hdu = fits
            .get(0)
            .ok_or_else(|| KappaError::MalformedImage(format!("{path}: no primary HDU")))?;
        Ok(Self {
            hdu,
            path: path.to_string(),
        })
    }

    fn header_f64(&self, field: &str) -> Result<f64, KappaError> {
        let value = match self.hdu.value(field) {
            Some(HeaderValue::RealFloatingNumber(value)) => *value,
            Some(HeaderValue::IntegerNumber(value)) => f64::from(*value),
            _ => {
                return Err(KappaError::MalformedHeader {
                    field: field.to_string(),
                    path: self.path.clone(),
                });
            }
        };
        if !value.is_finite() {
            return Err(KappaError::MalformedHeader {
                field: field.to_string(),
                path: self.path.clone(),
            });
        }
        Ok(value)
    }

    fn image(&self) -> Result<Array2<f64>, KappaError> {
        let data = self.hdu.read_data();
        let (shape, values): (Vec<usize>, Vec<f64>) = match &data {
            FitsData::FloatingPoint32(array) => (
                array.shape.clone(),
                array.data.iter().map(|&v| f64::from(v)).collect(),
            ),
            FitsData::FloatingPoint64(array) => (array.shape.clone(), array.data.clone()),
            FitsData::IntegersI32(array) => (
                array.shape.clone(),
                array
                    .data
                    .iter()
                    .map(|v| v.map(f64::from).unwrap_or(f64::NAN))
                    .collect(),
            ),
            FitsData::IntegersU32(array) => (
                array.shape.clone(),
                array
                    .data
                    .iter()
                    .map(|v| v.map(f64::from).unwrap_or(f64::NAN))
                    .collect(),
            ),
            FitsData::Characters(_) => {
                return Err(KappaError::MalformedImage(format!(
                    "{}: character data in image HDU",
                    self.path
                )));
            }
        };
        let [naxis1, naxis2] = shape.as_slice() else {
            return Err(KappaError::MalformedImage(format!(
                "{}: expected a 2D image, got {} axes",
                self.path,
                shape.len()
            )));
        };
        // FITS stores NAXIS1 (columns) fastest
        Array2::from_shape_vec((*naxis2, *naxis1), values)
            .map_err(|err| KappaError::MalformedImage(format!("{}: {err}", self.path)))
    }
}

/// Loads a simulated map: raw Msun/kpc^2 pixels scaled by the critical
/// surface density at the lens redshift (ZL header) into kappa.
pub fn load_sim_map(path: &Utf8Path) -> Result<ConvergenceMap, KappaError> {
    let primary = PrimaryHdu::open(path)?;
    let cdelt1 = primary.header_f64("CDELT1")?;
    if cdelt1 == 0.0 {
        return Err(KappaError::MalformedHeader {
            field: "CDELT1".to_string(),
            path: path.to_string(),
        });
    }
    let z_lens = primary.header_f64("ZL")?;
    if z_lens <= 0.0 {
        return Err(KappaError::MalformedHeader {
            field: "ZL".to_string(),
            path: path.to_string(),
        });
    }

    let crit = cosmo::critical_density_scale(z_lens);
    let data = primary
        .image()?
        .mapv(|v| v * cosmo::MSUN_PER_KPC2_TO_G_PER_CM2 / crit);

    let angle_arcsec = data.nrows() as f64 * cdelt1.abs() * DEG_TO_ARCSEC;
    Ok(ConvergenceMap::new(angle_arcsec, data))
}

/// Loads an archive map: already dimensionless kappa, but with NaN padding
/// and a possibly non-square field. Non-finite pixels become zero and the
/// array is cropped to the largest origin-anchored square.
pub fn load_frontier_map(path: &Utf8Path) -> Result<ConvergenceMap, KappaError> {
    let primary = PrimaryHdu::open(path)?;
    let cdelt1 = primary.header_f64("CDELT1")?;
    if cdelt1 == 0.0 {
        return Err(KappaError::MalformedHeader {
            field: "CDELT1".to_string(),
            path: path.to_string(),
        });
    }

    let full = primary.image()?;
    let nside = full.nrows().min(full.ncols());
    let data = full
        .slice(s![..nside, ..nside])
        .mapv(|v| if v.is_finite() { v } else { 0.0 });

    let angle_arcsec = nside as f64 * cdelt1.abs() * DEG_TO_ARCSEC;
    Ok(ConvergenceMap::new(angle_arcsec, data))
}
