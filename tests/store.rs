use std::sync::{Arc, Barrier};
use std::time::Duration;

use assert_matches::assert_matches;
use camino::{Utf8Path, Utf8PathBuf};
use once_cell::sync::Lazy;

use curtain_core::datastore::DataStore;
use curtain_core::domain::LinkId;
use curtain_core::error::CurtainError;
use curtain_core::mapping::{MappingStore, PrimaryIdMapping};
use curtain_core::store::{DatabaseManager, DatasetDatabase, SqliteHandle, StoreLayout};

fn layout(dir: &tempfile::TempDir) -> StoreLayout {
    StoreLayout::new_with_root(Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap())
}

fn mapping(split_id: &str, primary_id: &str) -> PrimaryIdMapping {
    PrimaryIdMapping {
        split_id: split_id.to_string(),
        primary_id: primary_id.to_string(),
    }
}

#[test]
fn layout_paths() {
    let dir = tempfile::tempdir().unwrap();
    let layout = layout(&dir);
    let link: LinkId = "f4e2a1b0-demo".parse().unwrap();

    let mappings: DatabaseManager<MappingStore> = DatabaseManager::new(layout.clone());
    let data: DatabaseManager<DataStore> = DatabaseManager::new(layout.clone());

    assert!(
        mappings
            .db_path(&link)
            .ends_with("datasets/protein_mapping_f4e2a1b0-demo.db")
    );
    assert!(
        data.db_path(&link)
            .ends_with("datasets/proteomics_data_f4e2a1b0-demo.db")
    );
    assert!(layout.user_db_path().ends_with("curtain_user.db"));
}

#[test]
fn same_link_id_shares_one_handle() {
    let dir = tempfile::tempdir().unwrap();
    let manager: DatabaseManager<MappingStore> = DatabaseManager::new(layout(&dir));
    let link: LinkId = "shared".parse().unwrap();

    let handles = std::thread::scope(|scope| {
        let workers = (0..4)
            .map(|_| scope.spawn(|| manager.get_store(&link).unwrap()))
            .collect::<Vec<_>>();
        workers
            .into_iter()
            .map(|worker| worker.join().unwrap())
            .collect::<Vec<_>>()
    });

    for handle in &handles[1..] {
        assert!(Arc::ptr_eq(&handles[0], handle));
    }
    assert_eq!(manager.cached_link_ids(), vec![link]);
}

#[test]
fn delete_store_closes_and_removes_files() {
    let dir = tempfile::tempdir().unwrap();
    let manager: DatabaseManager<MappingStore> = DatabaseManager::new(layout(&dir));
    let link: LinkId = "to-delete".parse().unwrap();

    let store = manager.get_store(&link).unwrap();
    store
        .insert_primary_id_mappings(&[mapping("P12345", "P12345")])
        .unwrap();
    let path = manager.db_path(&link);
    assert!(path.exists());

    manager.delete_store(&link);
    assert!(!path.exists());
    assert!(manager.cached_store(&link).is_none());
    assert_matches!(
        store.primary_id_mapping_count(),
        Err(CurtainError::StoreClosed(_))
    );

    // deleting twice is fine
    manager.delete_store(&link);

    let reopened = manager.get_store(&link).unwrap();
    assert_eq!(reopened.primary_id_mapping_count().unwrap(), 0);
}

static OPEN_STARTED: Lazy<Barrier> = Lazy::new(|| Barrier::new(2));
static OPEN_RELEASED: Lazy<Barrier> = Lazy::new(|| Barrier::new(2));

/// Store whose open blocks until the test releases it.
struct GatedStore {
    handle: SqliteHandle,
}

impl DatasetDatabase for GatedStore {
    const FILE_PREFIX: &'static str = "gated";

    fn open(link_id: &LinkId, path: &Utf8Path) -> Result<Self, CurtainError> {
        OPEN_STARTED.wait();
        OPEN_RELEASED.wait();
        Ok(Self {
            handle: SqliteHandle::open(link_id.as_str(), path, "CREATE TABLE IF NOT EXISTS t (x INTEGER);")?,
        })
    }

    fn close(&self) {
        self.handle.close();
    }

    fn clear_all(&self) -> Result<(), CurtainError> {
        self.handle.with_conn(|conn| {
            conn.execute("DELETE FROM t", [])?;
            Ok(())
        })
    }
}

#[test]
fn delete_waits_for_an_open_in_progress() {
    let dir = tempfile::tempdir().unwrap();
    let manager: DatabaseManager<GatedStore> = DatabaseManager::new(layout(&dir));
    let link: LinkId = "racing".parse().unwrap();
    let path = manager.db_path(&link);

    std::thread::scope(|scope| {
        let opener = scope.spawn(|| manager.get_store(&link).unwrap());
        OPEN_STARTED.wait();
        let deleter = scope.spawn(|| manager.delete_store(&link));
        std::thread::sleep(Duration::from_millis(50));
        OPEN_RELEASED.wait();

        let store = opener.join().unwrap();
        deleter.join().unwrap();
        assert!(store.handle.is_closed());
    });

    assert!(!path.exists());
    assert!(manager.cached_store(&link).is_none());
}

#[test]
fn close_all_evicts_every_handle() {
    let dir = tempfile::tempdir().unwrap();
    let manager: DatabaseManager<DataStore> = DatabaseManager::new(layout(&dir));
    let first: LinkId = "first".parse().unwrap();
    let second: LinkId = "second".parse().unwrap();

    let store = manager.get_store(&first).unwrap();
    manager.get_store(&second).unwrap();
    assert_eq!(manager.cached_link_ids().len(), 2);

    manager.close_all();
    assert!(manager.cached_link_ids().is_empty());
    assert_matches!(store.processed_row_count(), Err(CurtainError::StoreClosed(_)));
    assert!(!store.check_data_exists());
}

#[test]
fn invalid_link_ids_are_rejected() {
    assert_matches!("".parse::<LinkId>(), Err(CurtainError::InvalidLinkId(_)));
    assert_matches!("../escape".parse::<LinkId>(), Err(CurtainError::InvalidLinkId(_)));
    assert_matches!(".hidden".parse::<LinkId>(), Err(CurtainError::InvalidLinkId(_)));
    let link: LinkId = "  abc-123  ".parse().unwrap();
    assert_eq!(link.as_str(), "abc-123");
}
