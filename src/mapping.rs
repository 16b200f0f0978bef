use std::collections::BTreeSet;

use camino::Utf8Path;
use rusqlite::{OptionalExtension, params};
use tracing::warn;

use crate::domain::LinkId;
use crate::error::CurtainError;
use crate::store::{DatasetDatabase, SqliteHandle};

pub const MAPPING_SCHEMA_VERSION: i64 = 3;

const SCHEMA_VERSION_KEY: &str = "schema_version";

const MAPPING_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS primary_id_mapping (
    split_id   TEXT NOT NULL,
    primary_id TEXT NOT NULL,
    PRIMARY KEY (split_id, primary_id)
);
CREATE TABLE IF NOT EXISTS gene_name_mapping (
    gene_name  TEXT NOT NULL,
    primary_id TEXT NOT NULL,
    PRIMARY KEY (gene_name, primary_id)
);
CREATE TABLE IF NOT EXISTS metadata (
    key   TEXT PRIMARY KEY,
    value INTEGER NOT NULL
);
"#;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct PrimaryIdMapping {
    pub split_id: String,
    pub primary_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct GeneNameMapping {
    pub gene_name: String,
    pub primary_id: String,
}

pub struct MappingStore {
    link_id: LinkId,
    handle: SqliteHandle,
}

impl MappingStore {
    pub fn open_in_memory(link_id: &LinkId) -> Result<Self, CurtainError> {
        Ok(Self {
            link_id: link_id.clone(),
            handle: SqliteHandle::open_in_memory(link_id.as_str(), MAPPING_SCHEMA)?,
        })
    }

    pub fn link_id(&self) -> &LinkId {
        &self.link_id
    }

    pub fn insert_primary_id_mappings(
        &self,
        mappings: &[PrimaryIdMapping],
    ) -> Result<usize, CurtainError> {
        self.handle.with_conn(|conn| {
            let tx = conn.transaction()?;
            let mut inserted = 0;
            {
                let mut stmt = tx.prepare(
                    "INSERT OR REPLACE INTO primary_id_mapping (split_id, primary_id) VALUES (?1, ?2)",
                )?;
                for mapping in mappings {
                    inserted += stmt.execute(params![mapping.split_id, mapping.primary_id])?;
                }
            }
            tx.commit()?;
            Ok(inserted)
        })
    }

    pub fn insert_gene_name_mappings(
        &self,
        mappings: &[GeneNameMapping],
    ) -> Result<usize, CurtainError> {
        self.handle.with_conn(|conn| {
            let tx = conn.transaction()?;
            let mut inserted = 0;
            {
                let mut stmt = tx.prepare(
                    "INSERT OR REPLACE INTO gene_name_mapping (gene_name, primary_id) VALUES (?1, ?2)",
                )?;
                for mapping in mappings {
                    inserted += stmt.execute(params![mapping.gene_name, mapping.primary_id])?;
                }
            }
            tx.commit()?;
            Ok(inserted)
        })
    }

    pub fn set_schema_version(&self, version: i64) -> Result<(), CurtainError> {
        self.handle.with_conn(|conn| {
            conn.execute(
                "INSERT OR REPLACE INTO metadata (key, value) VALUES (?1, ?2)",
                params![SCHEMA_VERSION_KEY, version],
            )?;
            Ok(())
        })
    }

    pub fn schema_version(&self) -> Result<Option<i64>, CurtainError> {
        self.handle.with_conn(|conn| {
            let value = conn
                .query_row(
                    "SELECT value FROM metadata WHERE key = ?1",
                    params![SCHEMA_VERSION_KEY],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(value)
        })
    }

    pub fn primary_id_mapping_count(&self) -> Result<i64, CurtainError> {
        self.handle.with_conn(|conn| {
            Ok(conn.query_row("SELECT COUNT(*) FROM primary_id_mapping", [], |row| row.get(0))?)
        })
    }

    pub fn gene_name_mapping_count(&self) -> Result<i64, CurtainError> {
        self.handle.with_conn(|conn| {
            Ok(conn.query_row("SELECT COUNT(*) FROM gene_name_mapping", [], |row| row.get(0))?)
        })
    }

    /// True only when rows exist and were written by the current schema.
    pub fn check_mappings_exist(&self) -> bool {
        let check = || -> Result<bool, CurtainError> {
            let count = self.primary_id_mapping_count()?;
            let version = self.schema_version()?;
            Ok(count > 0 && version == Some(MAPPING_SCHEMA_VERSION))
        };
        match check() {
            Ok(exists) => exists,
            Err(err) => {
                warn!(link_id = %self.link_id, error = %err, "mapping check failed, treating as absent");
                false
            }
        }
    }

    pub fn primary_ids_for_split_id(&self, split_id: &str) -> Result<BTreeSet<String>, CurtainError> {
        self.handle.with_conn(|conn| {
            let mut stmt =
                conn.prepare_cached("SELECT primary_id FROM primary_id_mapping WHERE split_id = ?1")?;
            let rows = stmt.query_map(params![split_id], |row| row.get::<_, String>(0))?;
            Ok(rows.collect::<rusqlite::Result<BTreeSet<_>>>()?)
        })
    }

    pub fn primary_ids_for_gene_name(
        &self,
        gene_name: &str,
    ) -> Result<BTreeSet<String>, CurtainError> {
        self.handle.with_conn(|conn| {
            let mut stmt =
                conn.prepare_cached("SELECT primary_id FROM gene_name_mapping WHERE gene_name = ?1")?;
            let rows = stmt.query_map(params![gene_name], |row| row.get::<_, String>(0))?;
            Ok(rows.collect::<rusqlite::Result<BTreeSet<_>>>()?)
        })
    }

    pub fn split_ids_for_primary_id(
        &self,
        primary_id: &str,
    ) -> Result<BTreeSet<String>, CurtainError> {
        self.handle.with_conn(|conn| {
            let mut stmt =
                conn.prepare_cached("SELECT split_id FROM primary_id_mapping WHERE primary_id = ?1")?;
            let rows = stmt.query_map(params![primary_id], |row| row.get::<_, String>(0))?;
            Ok(rows.collect::<rusqlite::Result<BTreeSet<_>>>()?)
        })
    }
}

impl DatasetDatabase for MappingStore {
    const FILE_PREFIX: &'static str = "protein_mapping";

    fn open(link_id: &LinkId, path: &Utf8Path) -> Result<Self, CurtainError> {
        Ok(Self {
            link_id: link_id.clone(),
            handle: SqliteHandle::open(link_id.as_str(), path, MAPPING_SCHEMA)?,
        })
    }

    fn close(&self) {
        self.handle.close();
    }

    fn clear_all(&self) -> Result<(), CurtainError> {
        self.handle.with_conn(|conn| {
            let tx = conn.transaction()?;
            tx.execute("DELETE FROM primary_id_mapping", [])?;
            tx.execute("DELETE FROM gene_name_mapping", [])?;
            tx.execute("DELETE FROM metadata", [])?;
            tx.commit()?;
            Ok(())
        })
    }
}
