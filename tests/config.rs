use assert_matches::assert_matches;

use kappa_map_manager::config::ConfigLoader;
use kappa_map_manager::domain::LensModel;
use kappa_map_manager::error::KappaError;
use kappa_map_manager::fetcher::DEFAULT_DRIVE_ROOT_ID;

#[test]
fn resolve_full_config_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("kappa-mm.json");
    std::fs::write(
        &path,
        r#"{
            "data_root": "/srv/kappa",
            "drive_root_id": "folder-abc",
            "drive_token": "tok",
            "models": ["cats", "glafic/v4"],
            "sim": {
                "realizations": [1, 2],
                "redshifts": [1.0, 1.5],
                "projections": [0]
            }
        }"#,
    )
    .unwrap();

    let resolved = ConfigLoader::resolve(Some(path.to_str().unwrap())).unwrap();
    assert_eq!(resolved.data_root.as_deref().map(|p| p.as_str()), Some("/srv/kappa"));
    assert_eq!(resolved.drive_root_id, "folder-abc");
    assert_eq!(resolved.drive_token.as_deref(), Some("tok"));
    assert_eq!(resolved.models[0], LensModel::new("cats", "v4.1"));
    assert_eq!(resolved.models[1], LensModel::new("glafic", "v4"));
    let sim = resolved.sim.unwrap();
    assert_eq!(sim.realizations, vec![1, 2]);
    assert_eq!(sim.redshifts, vec![1.0, 1.5]);
    assert_eq!(sim.projections, vec![0]);
}

#[test]
fn explicit_missing_path_is_a_read_error() {
    let err = ConfigLoader::resolve(Some("/nonexistent/kappa-mm.json")).unwrap_err();
    assert_matches!(err, KappaError::ConfigRead(_));
}

#[test]
fn unknown_model_in_config_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("kappa-mm.json");
    std::fs::write(&path, r#"{ "models": ["mystery"] }"#).unwrap();

    let err = ConfigLoader::resolve(Some(path.to_str().unwrap())).unwrap_err();
    assert_matches!(err, KappaError::UnknownModel(_));
}

#[test]
fn defaults_apply_when_fields_are_omitted() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("kappa-mm.json");
    std::fs::write(&path, "{}").unwrap();

    let resolved = ConfigLoader::resolve(Some(path.to_str().unwrap())).unwrap();
    assert_eq!(resolved.drive_root_id, DEFAULT_DRIVE_ROOT_ID);
    assert!(resolved.drive_token.is_none());
    assert!(resolved.models.is_empty());
}
