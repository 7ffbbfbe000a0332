use assert_matches::assert_matches;
use camino::Utf8PathBuf;
use fitrs::{Fits, Hdu, HeaderValue};

use kappa_map_manager::error::KappaError;
use kappa_map_manager::maps::{load_frontier_map, load_sim_map};

struct FixtureMap {
    shape: [usize; 2],
    values: Vec<f32>,
    cdelt1: Option<f64>,
    z_lens: Option<f64>,
}

fn write_fixture(dir: &tempfile::TempDir, name: &str, fixture: FixtureMap) -> Utf8PathBuf {
    let path = Utf8PathBuf::from_path_buf(dir.path().join(name)).unwrap();
    let mut hdu = Hdu::new(&fixture.shape, fixture.values);
    // scale values here must render within the fixed-width FITS value field
    if let Some(cdelt1) = fixture.cdelt1 {
        hdu.insert("CDELT1", HeaderValue::RealFloatingNumber(cdelt1));
    }
    if let Some(z_lens) = fixture.z_lens {
        hdu.insert("ZL", HeaderValue::RealFloatingNumber(z_lens));
    }
    Fits::create(path.as_std_path(), hdu).expect("write fixture FITS file");
    path
}

#[test]
fn sim_map_scales_to_dimensionless_convergence() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_fixture(
        &dir,
        "map_100_7_3_sph.fits",
        FixtureMap {
            shape: [8, 8],
            values: vec![1.0e12; 64],
            cdelt1: Some(-0.0001),
            z_lens: Some(0.5),
        },
    );

    let map = load_sim_map(&path).unwrap();
    assert_eq!(map.side(), 8);
    assert!((map.angle_arcsec() - 8.0 * 0.0001 * 3600.0).abs() < 1e-9);

    // uniform input stays uniform, positive and finite after scaling
    let first = map.data()[[0, 0]];
    assert!(first.is_finite() && first > 0.0);
    assert!(map.data().iter().all(|&v| (v - first).abs() < 1e-9));
}

#[test]
fn sim_map_angle_is_side_times_pixel_scale() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_fixture(
        &dir,
        "map_150_2_0_sph.fits",
        FixtureMap {
            shape: [16, 16],
            values: vec![5.0e11; 256],
            cdelt1: Some(0.0002),
            z_lens: Some(1.0),
        },
    );

    let map = load_sim_map(&path).unwrap();
    let recomputed = map.side() as f64 * map.pixel_scale_arcsec();
    assert!((recomputed - map.angle_arcsec()).abs() < 1e-9);
}

#[test]
fn sim_map_missing_lens_redshift_is_malformed() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_fixture(
        &dir,
        "no_zl.fits",
        FixtureMap {
            shape: [4, 4],
            values: vec![1.0; 16],
            cdelt1: Some(0.0001),
            z_lens: None,
        },
    );

    let err = load_sim_map(&path).unwrap_err();
    assert_matches!(err, KappaError::MalformedHeader { field, .. } if field == "ZL");
}

#[test]
fn sim_map_missing_pixel_scale_is_malformed() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_fixture(
        &dir,
        "no_cdelt.fits",
        FixtureMap {
            shape: [4, 4],
            values: vec![1.0; 16],
            cdelt1: None,
            z_lens: Some(0.5),
        },
    );

    let err = load_sim_map(&path).unwrap_err();
    assert_matches!(err, KappaError::MalformedHeader { field, .. } if field == "CDELT1");
}

#[test]
fn frontier_map_zeroes_nan_and_crops_square() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_fixture(
        &dir,
        "hlsp_frontier_model_abell2744_cats-map005_v4.1_kappa.fits",
        FixtureMap {
            shape: [60, 40],
            values: vec![f32::NAN; 2400],
            cdelt1: Some(-1.0e-4),
            z_lens: None,
        },
    );

    let map = load_frontier_map(&path).unwrap();
    assert_eq!(map.side(), 40);
    assert_eq!(map.data().ncols(), 40);
    assert!(map.data().iter().all(|&v| v == 0.0));
    assert!((map.angle_arcsec() - 40.0 * 1.0e-4 * 3600.0).abs() < 1e-9);
}

#[test]
fn frontier_map_keeps_finite_values() {
    let dir = tempfile::tempdir().unwrap();
    let mut values = vec![0.25f32; 36];
    values[7] = f32::NAN;
    let path = write_fixture(
        &dir,
        "partial_nan.fits",
        FixtureMap {
            shape: [6, 6],
            values,
            cdelt1: Some(1.0e-4),
            z_lens: None,
        },
    );

    let map = load_frontier_map(&path).unwrap();
    assert_eq!(map.side(), 6);
    let zeros = map.data().iter().filter(|&&v| v == 0.0).count();
    let quarters = map.data().iter().filter(|&&v| (v - 0.25).abs() < 1e-9).count();
    assert_eq!(zeros, 1);
    assert_eq!(quarters, 35);
}
