use std::fs;
use std::io;
use std::sync::Arc;
use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use directories::BaseDirs;
use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use rusqlite::Connection;
use tracing::{debug, info, warn};

use crate::domain::LinkId;
use crate::error::CurtainError;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);
const SIDE_FILE_SUFFIXES: [&str; 3] = ["-wal", "-shm", "-journal"];

#[derive(Debug, Clone)]
pub struct StoreLayout {
    data_root: Utf8PathBuf,
}

impl StoreLayout {
    pub fn new() -> Result<Self, CurtainError> {
        let data_root = BaseDirs::new()
            .and_then(|dirs| {
                Utf8PathBuf::from_path_buf(dirs.home_dir().join(".cache").join("curtain")).ok()
            })
            .ok_or_else(|| CurtainError::Filesystem("unable to resolve data directory".to_string()))?;
        Ok(Self { data_root })
    }

    pub fn new_with_root(data_root: Utf8PathBuf) -> Self {
        Self { data_root }
    }

    pub fn data_root(&self) -> &Utf8Path {
        &self.data_root
    }

    pub fn datasets_dir(&self) -> Utf8PathBuf {
        self.data_root.join("datasets")
    }

    pub fn dataset_db_path(&self, prefix: &str, link_id: &LinkId) -> Utf8PathBuf {
        self.datasets_dir().join(format!("{prefix}_{link_id}.db"))
    }

    pub fn user_db_path(&self) -> Utf8PathBuf {
        self.data_root.join("curtain_user.db")
    }

    pub fn ensure_datasets_dir(&self) -> Result<(), CurtainError> {
        fs::create_dir_all(self.datasets_dir().as_std_path())
            .map_err(|err| CurtainError::Filesystem(err.to_string()))
    }
}

pub struct SqliteHandle {
    label: String,
    conn: Mutex<Option<Connection>>,
}

impl SqliteHandle {
    pub fn open(label: &str, path: &Utf8Path, schema: &str) -> Result<Self, CurtainError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent.as_std_path())
                .map_err(|err| CurtainError::Filesystem(err.to_string()))?;
        }
        let conn = Connection::open(path.as_std_path())?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        let mode: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        debug!(%path, journal_mode = %mode, "opened sqlite database");
        conn.execute_batch(schema)?;
        Ok(Self {
            label: label.to_string(),
            conn: Mutex::new(Some(conn)),
        })
    }

    pub fn open_in_memory(label: &str, schema: &str) -> Result<Self, CurtainError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(schema)?;
        Ok(Self {
            label: label.to_string(),
            conn: Mutex::new(Some(conn)),
        })
    }

    pub fn with_conn<T, F>(&self, f: F) -> Result<T, CurtainError>
    where
        F: FnOnce(&mut Connection) -> Result<T, CurtainError>,
    {
        let mut guard = self.conn.lock();
        let conn = guard
            .as_mut()
            .ok_or_else(|| CurtainError::StoreClosed(self.label.clone()))?;
        f(conn)
    }

    pub fn close(&self) {
        if let Some(conn) = self.conn.lock().take() {
            if let Err((_, err)) = conn.close() {
                warn!(label = %self.label, error = %err, "failed to close sqlite connection");
            }
        }
    }

    pub fn is_closed(&self) -> bool {
        self.conn.lock().is_none()
    }
}

pub trait DatasetDatabase: Send + Sync + Sized {
    const FILE_PREFIX: &'static str;

    fn open(link_id: &LinkId, path: &Utf8Path) -> Result<Self, CurtainError>;
    fn close(&self);
    fn clear_all(&self) -> Result<(), CurtainError>;
}

pub struct DatabaseManager<S: DatasetDatabase> {
    layout: StoreLayout,
    handles: DashMap<LinkId, Arc<OnceCell<Arc<S>>>>,
}

impl<S: DatasetDatabase> DatabaseManager<S> {
    pub fn new(layout: StoreLayout) -> Self {
        Self {
            layout,
            handles: DashMap::new(),
        }
    }

    pub fn layout(&self) -> &StoreLayout {
        &self.layout
    }

    pub fn db_path(&self, link_id: &LinkId) -> Utf8PathBuf {
        self.layout.dataset_db_path(S::FILE_PREFIX, link_id)
    }

    pub fn get_store(&self, link_id: &LinkId) -> Result<Arc<S>, CurtainError> {
        let cell = self
            .handles
            .entry(link_id.clone())
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .clone();
        let store = cell.get_or_try_init(|| {
            let path = self.db_path(link_id);
            info!(link_id = %link_id, %path, "opening dataset store");
            S::open(link_id, &path).map(Arc::new)
        })?;
        Ok(Arc::clone(store))
    }

    pub fn cached_store(&self, link_id: &LinkId) -> Option<Arc<S>> {
        self.handles
            .get(link_id)
            .and_then(|cell| cell.get().cloned())
    }

    pub fn cached_link_ids(&self) -> Vec<LinkId> {
        let mut ids = self
            .handles
            .iter()
            .filter(|entry| entry.value().get().is_some())
            .map(|entry| entry.key().clone())
            .collect::<Vec<_>>();
        ids.sort();
        ids
    }

    pub fn clear_all(&self, link_id: &LinkId) -> Result<(), CurtainError> {
        self.get_store(link_id)?.clear_all()
    }

    /// Closes, evicts and removes the database files. Never fails.
    pub fn delete_store(&self, link_id: &LinkId) {
        let path = self.db_path(link_id);
        match self.handles.entry(link_id.clone()) {
            Entry::Occupied(entry) => {
                // waits for an open already in progress on this key
                let opened = entry
                    .get()
                    .get_or_try_init(|| Err(()))
                    .ok()
                    .cloned();
                if let Some(store) = opened {
                    store.close();
                }
                delete_database_files(&path);
                entry.remove();
            }
            Entry::Vacant(_) => delete_database_files(&path),
        }
        info!(link_id = %link_id, %path, "deleted dataset store");
    }

    pub fn close_all(&self) {
        for entry in self.handles.iter() {
            if let Some(store) = entry.value().get() {
                store.close();
            }
        }
        self.handles.clear();
        debug!(prefix = S::FILE_PREFIX, "closed all dataset stores");
    }
}

pub fn delete_database_files(path: &Utf8Path) {
    remove_file_if_exists(path.as_std_path());
    for suffix in SIDE_FILE_SUFFIXES {
        let side = Utf8PathBuf::from(format!("{path}{suffix}"));
        remove_file_if_exists(side.as_std_path());
    }
}

fn remove_file_if_exists(path: &std::path::Path) {
    match fs::remove_file(path) {
        Ok(()) => {}
        Err(err) if err.kind() == io::ErrorKind::NotFound => {}
        Err(err) => warn!(path = %path.display(), error = %err, "failed to delete database file"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_paths() {
        let layout = StoreLayout::new_with_root(Utf8PathBuf::from("/data/curtain"));
        let link: LinkId = "abc-123".parse().unwrap();

        let path = layout.dataset_db_path("protein_mapping", &link);
        assert!(path.ends_with("datasets/protein_mapping_abc-123.db"));
        assert!(layout.user_db_path().ends_with("curtain_user.db"));
    }

    #[test]
    fn closed_handle_rejects_queries() {
        let handle = SqliteHandle::open_in_memory("test", "CREATE TABLE t (x INTEGER);").unwrap();
        handle.close();
        assert!(handle.is_closed());
        let result = handle.with_conn(|conn| {
            conn.execute("INSERT INTO t (x) VALUES (1)", [])?;
            Ok(())
        });
        assert!(matches!(result, Err(CurtainError::StoreClosed(_))));
    }
}
