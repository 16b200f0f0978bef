use std::collections::BTreeSet;

use camino::Utf8Path;
use rusqlite::{OptionalExtension, Row, params};
use serde::Serialize;
use serde_json::Value;
use tracing::warn;

use crate::domain::LinkId;
use crate::error::CurtainError;
use crate::settings::CurtainSettings;
use crate::store::{DatasetDatabase, SqliteHandle};

pub const DATA_SCHEMA_VERSION: &str = "3";

const SCHEMA_VERSION_KEY: &str = "schema_version";
const SETTINGS_KEY: &str = "settings";
const UNIPROT_KEY: &str = "uniprot";

const DATA_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS processed_data (
    primary_id   TEXT NOT NULL,
    comparison   TEXT NOT NULL,
    gene_names   TEXT,
    log2_fc      REAL NOT NULL,
    p_value      REAL NOT NULL,
    neg_log10_p  REAL NOT NULL,
    PRIMARY KEY (primary_id, comparison)
);
CREATE TABLE IF NOT EXISTS raw_data (
    primary_id TEXT NOT NULL,
    sample     TEXT NOT NULL,
    value      REAL,
    PRIMARY KEY (primary_id, sample)
);
CREATE TABLE IF NOT EXISTS metadata (
    key   TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS genes_map (
    primary_id TEXT PRIMARY KEY,
    gene_names TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS primary_ids_map (
    split_id   TEXT NOT NULL,
    primary_id TEXT NOT NULL,
    PRIMARY KEY (split_id, primary_id)
);
CREATE TABLE IF NOT EXISTS gene_name_to_acc (
    gene_name TEXT NOT NULL,
    accession TEXT NOT NULL,
    PRIMARY KEY (gene_name, accession)
);
CREATE TABLE IF NOT EXISTS all_genes (
    gene_name TEXT PRIMARY KEY
);
CREATE INDEX IF NOT EXISTS idx_processed_comparison ON processed_data (comparison);
"#;

const DATA_TABLES: [&str; 7] = [
    "processed_data",
    "raw_data",
    "metadata",
    "genes_map",
    "primary_ids_map",
    "gene_name_to_acc",
    "all_genes",
];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessedRow {
    pub primary_id: String,
    pub comparison: String,
    pub gene_names: Option<String>,
    pub log2_fc: f64,
    pub p_value: f64,
    pub neg_log10_p: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RawValue {
    pub primary_id: String,
    pub sample: String,
    pub value: Option<f64>,
}

#[derive(Debug, Clone, Default)]
pub struct LookupTables {
    pub genes_map: Vec<(String, String)>,
    pub primary_ids_map: Vec<(String, String)>,
    pub gene_name_to_acc: Vec<(String, String)>,
    pub all_genes: BTreeSet<String>,
}

pub struct DataStore {
    link_id: LinkId,
    handle: SqliteHandle,
}

impl DataStore {
    pub fn open_in_memory(link_id: &LinkId) -> Result<Self, CurtainError> {
        Ok(Self {
            link_id: link_id.clone(),
            handle: SqliteHandle::open_in_memory(link_id.as_str(), DATA_SCHEMA)?,
        })
    }

    pub fn insert_processed_rows(&self, rows: &[ProcessedRow]) -> Result<usize, CurtainError> {
        self.handle.with_conn(|conn| {
            let tx = conn.transaction()?;
            let mut inserted = 0;
            {
                let mut stmt = tx.prepare(
                    "INSERT OR REPLACE INTO processed_data \
                     (primary_id, comparison, gene_names, log2_fc, p_value, neg_log10_p) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                )?;
                for row in rows {
                    inserted += stmt.execute(params![
                        row.primary_id,
                        row.comparison,
                        row.gene_names,
                        row.log2_fc,
                        row.p_value,
                        row.neg_log10_p
                    ])?;
                }
            }
            tx.commit()?;
            Ok(inserted)
        })
    }

    pub fn insert_raw_values(&self, values: &[RawValue]) -> Result<usize, CurtainError> {
        self.handle.with_conn(|conn| {
            let tx = conn.transaction()?;
            let mut inserted = 0;
            {
                let mut stmt = tx.prepare(
                    "INSERT OR REPLACE INTO raw_data (primary_id, sample, value) VALUES (?1, ?2, ?3)",
                )?;
                for value in values {
                    inserted += stmt.execute(params![value.primary_id, value.sample, value.value])?;
                }
            }
            tx.commit()?;
            Ok(inserted)
        })
    }

    pub fn insert_lookup_tables(&self, tables: &LookupTables) -> Result<(), CurtainError> {
        self.handle.with_conn(|conn| {
            let tx = conn.transaction()?;
            {
                let mut stmt = tx.prepare(
                    "INSERT OR REPLACE INTO genes_map (primary_id, gene_names) VALUES (?1, ?2)",
                )?;
                for (primary_id, genes) in &tables.genes_map {
                    stmt.execute(params![primary_id, genes])?;
                }
                let mut stmt = tx.prepare(
                    "INSERT OR REPLACE INTO primary_ids_map (split_id, primary_id) VALUES (?1, ?2)",
                )?;
                for (split_id, primary_id) in &tables.primary_ids_map {
                    stmt.execute(params![split_id, primary_id])?;
                }
                let mut stmt = tx.prepare(
                    "INSERT OR REPLACE INTO gene_name_to_acc (gene_name, accession) VALUES (?1, ?2)",
                )?;
                for (gene, accession) in &tables.gene_name_to_acc {
                    stmt.execute(params![gene, accession])?;
                }
                let mut stmt =
                    tx.prepare("INSERT OR REPLACE INTO all_genes (gene_name) VALUES (?1)")?;
                for gene in &tables.all_genes {
                    stmt.execute(params![gene])?;
                }
            }
            tx.commit()?;
            Ok(())
        })
    }

    pub fn set_metadata(&self, key: &str, value: &str) -> Result<(), CurtainError> {
        self.handle.with_conn(|conn| {
            conn.execute(
                "INSERT OR REPLACE INTO metadata (key, value) VALUES (?1, ?2)",
                params![key, value],
            )?;
            Ok(())
        })
    }

    pub fn metadata(&self, key: &str) -> Result<Option<String>, CurtainError> {
        self.handle.with_conn(|conn| {
            let value = conn
                .query_row(
                    "SELECT value FROM metadata WHERE key = ?1",
                    params![key],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(value)
        })
    }

    pub fn set_schema_version(&self, version: &str) -> Result<(), CurtainError> {
        self.set_metadata(SCHEMA_VERSION_KEY, version)
    }

    pub fn schema_version(&self) -> Result<Option<String>, CurtainError> {
        self.metadata(SCHEMA_VERSION_KEY)
    }

    pub fn save_dataset_context(
        &self,
        settings: &CurtainSettings,
        uniprot: &Value,
    ) -> Result<(), CurtainError> {
        self.set_metadata(SETTINGS_KEY, &serde_json::to_string(settings)?)?;
        self.set_metadata(UNIPROT_KEY, &serde_json::to_string(uniprot)?)
    }

    pub fn dataset_settings(&self) -> Result<Option<CurtainSettings>, CurtainError> {
        match self.metadata(SETTINGS_KEY)? {
            Some(text) => Ok(Some(serde_json::from_str(&text)?)),
            None => Ok(None),
        }
    }

    pub fn uniprot_blob(&self) -> Result<Option<Value>, CurtainError> {
        match self.metadata(UNIPROT_KEY)? {
            Some(text) => Ok(Some(serde_json::from_str(&text)?)),
            None => Ok(None),
        }
    }

    pub fn processed_row_count(&self) -> Result<i64, CurtainError> {
        self.handle.with_conn(|conn| {
            Ok(conn.query_row("SELECT COUNT(*) FROM processed_data", [], |row| row.get(0))?)
        })
    }

    pub fn check_data_exists(&self) -> bool {
        let check = || -> Result<bool, CurtainError> {
            let count = self.processed_row_count()?;
            let version = self.schema_version()?;
            Ok(count > 0 && version.as_deref() == Some(DATA_SCHEMA_VERSION))
        };
        match check() {
            Ok(exists) => exists,
            Err(err) => {
                warn!(link_id = %self.link_id, error = %err, "data check failed, treating as absent");
                false
            }
        }
    }

    pub fn comparisons(&self) -> Result<Vec<String>, CurtainError> {
        self.handle.with_conn(|conn| {
            let mut stmt =
                conn.prepare("SELECT DISTINCT comparison FROM processed_data ORDER BY comparison")?;
            let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
            Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
        })
    }

    pub fn processed_rows(&self, comparison: Option<&str>) -> Result<Vec<ProcessedRow>, CurtainError> {
        self.handle.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT primary_id, comparison, gene_names, log2_fc, p_value, neg_log10_p \
                 FROM processed_data WHERE ?1 IS NULL OR comparison = ?1 ORDER BY rowid",
            )?;
            let rows = stmt.query_map(params![comparison], processed_from_row)?;
            Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
        })
    }

    pub fn processed_rows_for(&self, primary_id: &str) -> Result<Vec<ProcessedRow>, CurtainError> {
        self.handle.with_conn(|conn| {
            let mut stmt = conn.prepare_cached(
                "SELECT primary_id, comparison, gene_names, log2_fc, p_value, neg_log10_p \
                 FROM processed_data WHERE primary_id = ?1 ORDER BY rowid",
            )?;
            let rows = stmt.query_map(params![primary_id], processed_from_row)?;
            Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
        })
    }

    pub fn raw_values_for(&self, primary_id: &str) -> Result<Vec<RawValue>, CurtainError> {
        self.handle.with_conn(|conn| {
            let mut stmt = conn.prepare_cached(
                "SELECT primary_id, sample, value FROM raw_data WHERE primary_id = ?1 ORDER BY rowid",
            )?;
            let rows = stmt.query_map(params![primary_id], |row| {
                Ok(RawValue {
                    primary_id: row.get(0)?,
                    sample: row.get(1)?,
                    value: row.get(2)?,
                })
            })?;
            Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
        })
    }

    pub fn gene_names_for(&self, primary_id: &str) -> Result<Option<String>, CurtainError> {
        self.handle.with_conn(|conn| {
            let value = conn
                .query_row(
                    "SELECT gene_names FROM genes_map WHERE primary_id = ?1",
                    params![primary_id],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(value)
        })
    }

    pub fn accessions_for_gene(&self, gene_name: &str) -> Result<BTreeSet<String>, CurtainError> {
        self.handle.with_conn(|conn| {
            let mut stmt = conn
                .prepare_cached("SELECT accession FROM gene_name_to_acc WHERE gene_name = ?1")?;
            let rows = stmt.query_map(params![gene_name], |row| row.get::<_, String>(0))?;
            Ok(rows.collect::<rusqlite::Result<BTreeSet<_>>>()?)
        })
    }

    pub fn all_genes(&self) -> Result<Vec<String>, CurtainError> {
        self.handle.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT gene_name FROM all_genes ORDER BY gene_name")?;
            let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
            Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
        })
    }
}

fn processed_from_row(row: &Row<'_>) -> rusqlite::Result<ProcessedRow> {
    Ok(ProcessedRow {
        primary_id: row.get(0)?,
        comparison: row.get(1)?,
        gene_names: row.get(2)?,
        log2_fc: row.get(3)?,
        p_value: row.get(4)?,
        neg_log10_p: row.get(5)?,
    })
}

impl DatasetDatabase for DataStore {
    const FILE_PREFIX: &'static str = "proteomics_data";

    fn open(link_id: &LinkId, path: &Utf8Path) -> Result<Self, CurtainError> {
        Ok(Self {
            link_id: link_id.clone(),
            handle: SqliteHandle::open(link_id.as_str(), path, DATA_SCHEMA)?,
        })
    }

    fn close(&self) {
        self.handle.close();
    }

    fn clear_all(&self) -> Result<(), CurtainError> {
        self.handle.with_conn(|conn| {
            let tx = conn.transaction()?;
            for table in DATA_TABLES {
                tx.execute(&format!("DELETE FROM {table}"), [])?;
            }
            tx.commit()?;
            Ok(())
        })
    }
}
