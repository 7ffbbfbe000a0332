use std::sync::Mutex;

use assert_matches::assert_matches;
use camino::Utf8PathBuf;

use kappa_map_manager::domain::{LensModel, SimKey};
use kappa_map_manager::drive::{DriveClient, DriveEntry};
use kappa_map_manager::error::KappaError;
use kappa_map_manager::frontier::FrontierClient;
use kappa_map_manager::index::{FrontierMapIndex, SimMapIndex};
use kappa_map_manager::output::ProgressSink;
use kappa_map_manager::store::Store;

struct MockDrive {
    list_calls: Mutex<usize>,
}

impl MockDrive {
    fn new() -> Self {
        Self {
            list_calls: Mutex::new(0),
        }
    }

    fn list_calls(&self) -> usize {
        *self.list_calls.lock().unwrap()
    }
}

fn folder(id: &str, name: &str) -> DriveEntry {
    DriveEntry {
        id: id.to_string(),
        name: name.to_string(),
        is_folder: true,
    }
}

fn file(id: &str, name: &str) -> DriveEntry {
    DriveEntry {
        id: id.to_string(),
        name: name.to_string(),
        is_folder: false,
    }
}

impl DriveClient for MockDrive {
    fn list_children(&self, folder_id: &str) -> Result<Vec<DriveEntry>, KappaError> {
        *self.list_calls.lock().unwrap() += 1;
        // deliberately unsorted, with non-matching names interleaved
        match folder_id {
            "root" => Ok(vec![
                folder("f9", "D9"),
                file("junk", "readme.txt"),
                folder("f7", "D7"),
                folder("trash", "old_runs"),
            ]),
            "f7" => Ok(vec![
                file("id-7-150-0", "map_150_7_0_sph.fits"),
                file("cover", "cover.png"),
                file("id-7-100-3", "map_100_7_3_sph.fits"),
            ]),
            "f9" => Ok(vec![file("id-9-100-0", "map_100_9_0_sph.fits")]),
            other => panic!("unexpected folder id {other}"),
        }
    }

    fn download_file(
        &self,
        _file_id: &str,
        _sink: &dyn ProgressSink,
    ) -> Result<Vec<u8>, KappaError> {
        panic!("index build must not download file content");
    }
}

#[test]
fn build_filters_and_sorts_rows() {
    let drive = MockDrive::new();
    let index = SimMapIndex::build(&drive, "root").unwrap();

    let names = index
        .entries()
        .iter()
        .map(|entry| entry.map_filename.as_str())
        .collect::<Vec<_>>();
    assert_eq!(
        names,
        vec![
            "map_100_7_3_sph.fits",
            "map_150_7_0_sph.fits",
            "map_100_9_0_sph.fits",
        ]
    );
    assert_eq!(index.realizations(), vec![7, 9]);
}

#[test]
fn build_is_idempotent_byte_for_byte() {
    let first = SimMapIndex::build(&MockDrive::new(), "root").unwrap();
    let second = SimMapIndex::build(&MockDrive::new(), "root").unwrap();
    assert_eq!(
        first.to_csv_bytes().unwrap(),
        second.to_csv_bytes().unwrap()
    );
}

#[test]
fn side_store_round_trip() {
    let temp = tempfile::tempdir().unwrap();
    let index_root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
    let store = Store::new_with_paths(index_root.clone(), index_root);
    let path = store.sim_index_path("root");

    let built = SimMapIndex::build(&MockDrive::new(), "root").unwrap();
    built.save(&path).unwrap();

    let loaded = SimMapIndex::load(&path).unwrap();
    assert_eq!(loaded, built);

    // loading the side-store touches no remote listing
    let drive = MockDrive::new();
    let _ = SimMapIndex::load(&path).unwrap();
    assert_eq!(drive.list_calls(), 0);
}

#[test]
fn corrupt_side_store_is_reported_as_such() {
    let temp = tempfile::tempdir().unwrap();
    let path = Utf8PathBuf::from_path_buf(temp.path().join("root.csv")).unwrap();
    std::fs::write(
        path.as_std_path(),
        "realization_id,realization_name,map_id,map_filename,redshift,realization,projection\n\
         f7,D7,id-7-100-3,map_100_7_3_sph.fits,not-a-number,7,3\n",
    )
    .unwrap();

    assert_matches!(
        SimMapIndex::load(&path),
        Err(KappaError::IndexCorrupt(_))
    );
}

#[test]
fn lookup_resolves_concrete_key() {
    let index = SimMapIndex::build(&MockDrive::new(), "root").unwrap();
    let entry = index.lookup(&SimKey::new(7, 1.0, 3)).unwrap();
    assert_eq!(entry.map_id, "id-7-100-3");
    assert_eq!(entry.realization_name, "D7");
}

#[test]
fn lookup_missing_key_is_not_found() {
    let index = SimMapIndex::build(&MockDrive::new(), "root").unwrap();
    assert_matches!(
        index.lookup(&SimKey::new(7, 2.0, 3)),
        Err(KappaError::MapNotFound(_))
    );
}

struct MockFrontier {
    maps: Vec<String>,
}

impl FrontierClient for MockFrontier {
    fn list_maps(&self, _model: &LensModel) -> Result<Vec<String>, KappaError> {
        Ok(self.maps.clone())
    }

    fn download_map(&self, _model: &LensModel, _filename: &str) -> Result<Vec<u8>, KappaError> {
        panic!("index build must not download map content");
    }
}

#[test]
fn frontier_build_derives_kind_and_number() {
    let client = MockFrontier {
        maps: vec![
            "hlsp_frontier_model_abell2744_cats-map002_v4.1_kappa.fits".to_string(),
            "hlsp_frontier_model_abell2744_cats-map001_v4.1_kappa.fits".to_string(),
            "hlsp_frontier_model_abell2744_cats-map001_v4.1_gamma.fits".to_string(),
        ],
    };
    let model = LensModel::new("cats", "v4.1");
    let index = FrontierMapIndex::build(&client, &model).unwrap();

    assert_eq!(index.realizations(), vec![1, 2]);
    let entry = index.lookup(1).unwrap();
    assert_eq!(
        entry.map_filename,
        "hlsp_frontier_model_abell2744_cats-map001_v4.1_kappa.fits"
    );
}
