use camino::Utf8Path;
use rusqlite::{OptionalExtension, Row, params};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::domain::{LinkId, SearchType};
use crate::error::CurtainError;
use crate::selection::{SearchList, SelectionGroup};
use crate::settings::{SelectionSnapshot, SettingsOverlay, SettingsVariant};
use crate::store::{SqliteHandle, StoreLayout};

const USER_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS selection_groups (
    id              TEXT PRIMARY KEY,
    curtain_link_id TEXT NOT NULL,
    name            TEXT NOT NULL,
    color           TEXT NOT NULL,
    proteins        TEXT NOT NULL,
    is_active       INTEGER NOT NULL,
    created_at      INTEGER NOT NULL,
    modified_at     INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_selection_groups_link ON selection_groups (curtain_link_id);
CREATE TABLE IF NOT EXISTS search_lists (
    id              TEXT PRIMARY KEY,
    curtain_link_id TEXT NOT NULL,
    name            TEXT NOT NULL,
    description     TEXT,
    proteins        TEXT NOT NULL,
    search_type     TEXT NOT NULL,
    created_at      INTEGER NOT NULL,
    modified_at     INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_search_lists_link ON search_lists (curtain_link_id);
CREATE TABLE IF NOT EXISTS data_filter_lists (
    id         TEXT PRIMARY KEY,
    api_id     INTEGER UNIQUE,
    name       TEXT NOT NULL,
    category   TEXT NOT NULL,
    data       TEXT NOT NULL,
    is_default INTEGER NOT NULL
);
CREATE TABLE IF NOT EXISTS settings_variants (
    id              TEXT PRIMARY KEY,
    curtain_link_id TEXT NOT NULL,
    name            TEXT NOT NULL,
    description     TEXT,
    created_at      INTEGER NOT NULL,
    is_default      INTEGER NOT NULL,
    settings        TEXT NOT NULL,
    selection       TEXT
);
CREATE INDEX IF NOT EXISTS idx_settings_variants_link ON settings_variants (curtain_link_id);
"#;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataFilterList {
    pub id: String,
    pub api_id: Option<i64>,
    pub name: String,
    pub category: String,
    pub data: String,
    pub is_default: bool,
}

impl DataFilterList {
    pub fn new(name: &str, category: &str, data: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            api_id: None,
            name: name.to_string(),
            category: category.to_string(),
            data: data.to_string(),
            is_default: false,
        }
    }

    pub fn identifiers(&self) -> Vec<String> {
        self.data
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(|line| line.to_string())
            .collect()
    }
}

pub struct UserDataStore {
    handle: SqliteHandle,
}

impl UserDataStore {
    pub fn open(layout: &StoreLayout) -> Result<Self, CurtainError> {
        Self::open_at(&layout.user_db_path())
    }

    pub fn open_at(path: &Utf8Path) -> Result<Self, CurtainError> {
        debug!(%path, "opening user data store");
        Ok(Self {
            handle: SqliteHandle::open("user-data", path, USER_SCHEMA)?,
        })
    }

    pub fn open_in_memory() -> Result<Self, CurtainError> {
        Ok(Self {
            handle: SqliteHandle::open_in_memory("user-data", USER_SCHEMA)?,
        })
    }

    pub fn close(&self) {
        self.handle.close();
    }

    // selection groups

    pub fn save_selection_group(&self, group: &SelectionGroup) -> Result<(), CurtainError> {
        let proteins = serde_json::to_string(&group.proteins)?;
        self.handle.with_conn(|conn| {
            conn.execute(
                "INSERT OR REPLACE INTO selection_groups \
                 (id, curtain_link_id, name, color, proteins, is_active, created_at, modified_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    group.id,
                    group.curtain_link_id.as_str(),
                    group.name,
                    group.color,
                    proteins,
                    group.is_active,
                    group.created_at,
                    group.modified_at
                ],
            )?;
            Ok(())
        })
    }

    pub fn selection_groups(&self, link_id: &LinkId) -> Result<Vec<SelectionGroup>, CurtainError> {
        self.handle.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, curtain_link_id, name, color, proteins, is_active, created_at, modified_at \
                 FROM selection_groups WHERE curtain_link_id = ?1 ORDER BY created_at, rowid",
            )?;
            let rows = stmt.query_map(params![link_id.as_str()], selection_group_columns)?;
            let rows = rows.collect::<rusqlite::Result<Vec<_>>>()?;
            rows.into_iter().map(selection_group_from_columns).collect()
        })
    }

    pub fn selection_group(&self, id: &str) -> Result<Option<SelectionGroup>, CurtainError> {
        self.handle.with_conn(|conn| {
            let columns = conn
                .query_row(
                    "SELECT id, curtain_link_id, name, color, proteins, is_active, created_at, modified_at \
                     FROM selection_groups WHERE id = ?1",
                    params![id],
                    selection_group_columns,
                )
                .optional()?;
            columns.map(selection_group_from_columns).transpose()
        })
    }

    pub fn delete_selection_group(&self, id: &str) -> Result<bool, CurtainError> {
        self.handle.with_conn(|conn| {
            Ok(conn.execute("DELETE FROM selection_groups WHERE id = ?1", params![id])? > 0)
        })
    }

    // search lists

    pub fn search_list_name_exists(&self, link_id: &LinkId, name: &str) -> Result<bool, CurtainError> {
        self.handle.with_conn(|conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM search_lists WHERE curtain_link_id = ?1 AND name = ?2",
                params![link_id.as_str(), name],
                |row| row.get(0),
            )?;
            Ok(count > 0)
        })
    }

    pub fn save_search_list(&self, list: &SearchList) -> Result<(), CurtainError> {
        let proteins = serde_json::to_string(&list.proteins)?;
        self.handle.with_conn(|conn| {
            conn.execute(
                "INSERT OR REPLACE INTO search_lists \
                 (id, curtain_link_id, name, description, proteins, search_type, created_at, modified_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    list.id,
                    list.curtain_link_id.as_str(),
                    list.name,
                    list.description,
                    proteins,
                    list.search_type.to_string(),
                    list.created_at,
                    list.modified_at
                ],
            )?;
            Ok(())
        })
    }

    pub fn search_lists(&self, link_id: &LinkId) -> Result<Vec<SearchList>, CurtainError> {
        self.handle.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, curtain_link_id, name, description, proteins, search_type, created_at, modified_at \
                 FROM search_lists WHERE curtain_link_id = ?1 ORDER BY created_at, rowid",
            )?;
            let rows = stmt.query_map(params![link_id.as_str()], search_list_columns)?;
            let rows = rows.collect::<rusqlite::Result<Vec<_>>>()?;
            rows.into_iter().map(search_list_from_columns).collect()
        })
    }

    pub fn delete_search_list(&self, id: &str) -> Result<bool, CurtainError> {
        self.handle.with_conn(|conn| {
            Ok(conn.execute("DELETE FROM search_lists WHERE id = ?1", params![id])? > 0)
        })
    }

    pub fn delete_dataset_records(&self, link_id: &LinkId) -> Result<(), CurtainError> {
        self.handle.with_conn(|conn| {
            let tx = conn.transaction()?;
            for table in ["selection_groups", "search_lists", "settings_variants"] {
                tx.execute(
                    &format!("DELETE FROM {table} WHERE curtain_link_id = ?1"),
                    params![link_id.as_str()],
                )?;
            }
            tx.commit()?;
            Ok(())
        })
    }

    // data filter lists

    pub fn upsert_filter_lists(&self, lists: &[DataFilterList]) -> Result<usize, CurtainError> {
        self.handle.with_conn(|conn| {
            let tx = conn.transaction()?;
            {
                let mut by_api = tx.prepare("SELECT id FROM data_filter_lists WHERE api_id = ?1")?;
                let mut upsert = tx.prepare(
                    "INSERT OR REPLACE INTO data_filter_lists \
                     (id, api_id, name, category, data, is_default) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                )?;
                for list in lists {
                    let existing: Option<String> = match list.api_id {
                        Some(api_id) => by_api
                            .query_row(params![api_id], |row| row.get(0))
                            .optional()?,
                        None => None,
                    };
                    let id = existing.as_deref().unwrap_or(&list.id);
                    upsert.execute(params![
                        id,
                        list.api_id,
                        list.name,
                        list.category,
                        list.data,
                        list.is_default
                    ])?;
                }
            }
            tx.commit()?;
            Ok(lists.len())
        })
    }

    pub fn filter_lists(&self, category: Option<&str>) -> Result<Vec<DataFilterList>, CurtainError> {
        self.handle.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, api_id, name, category, data, is_default FROM data_filter_lists \
                 WHERE ?1 IS NULL OR category = ?1 ORDER BY category, name",
            )?;
            let rows = stmt.query_map(params![category], filter_list_from_row)?;
            Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
        })
    }

    pub fn filter_list(&self, id: &str) -> Result<Option<DataFilterList>, CurtainError> {
        self.handle.with_conn(|conn| {
            Ok(conn
                .query_row(
                    "SELECT id, api_id, name, category, data, is_default FROM data_filter_lists WHERE id = ?1",
                    params![id],
                    filter_list_from_row,
                )
                .optional()?)
        })
    }

    pub fn filter_list_categories(&self) -> Result<Vec<String>, CurtainError> {
        self.handle.with_conn(|conn| {
            let mut stmt =
                conn.prepare("SELECT DISTINCT category FROM data_filter_lists ORDER BY category")?;
            let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
            Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
        })
    }

    /// Deletes a user list. Curated default lists are refused.
    pub fn delete_filter_list(&self, id: &str) -> Result<bool, CurtainError> {
        self.handle.with_conn(|conn| {
            let is_default: Option<bool> = conn
                .query_row(
                    "SELECT is_default FROM data_filter_lists WHERE id = ?1",
                    params![id],
                    |row| row.get(0),
                )
                .optional()?;
            match is_default {
                None => Ok(false),
                Some(true) => Err(CurtainError::DefaultFilterList(id.to_string())),
                Some(false) => {
                    conn.execute("DELETE FROM data_filter_lists WHERE id = ?1", params![id])?;
                    Ok(true)
                }
            }
        })
    }

    pub fn delete_filter_category(&self, category: &str) -> Result<usize, CurtainError> {
        self.handle.with_conn(|conn| {
            let deleted = conn.execute(
                "DELETE FROM data_filter_lists WHERE category = ?1 AND is_default = 0",
                params![category],
            )?;
            info!(category, deleted, "deleted filter lists");
            Ok(deleted)
        })
    }

    // settings variants

    pub fn save_variant(&self, variant: &SettingsVariant) -> Result<(), CurtainError> {
        let settings = serde_json::to_string(&variant.settings)?;
        let selection = variant
            .selection
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        self.handle.with_conn(|conn| {
            let tx = conn.transaction()?;
            if variant.is_default {
                tx.execute(
                    "UPDATE settings_variants SET is_default = 0 WHERE curtain_link_id = ?1",
                    params![variant.curtain_link_id.as_str()],
                )?;
            }
            tx.execute(
                "INSERT OR REPLACE INTO settings_variants \
                 (id, curtain_link_id, name, description, created_at, is_default, settings, selection) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    variant.id,
                    variant.curtain_link_id.as_str(),
                    variant.name,
                    variant.description,
                    variant.created_at,
                    variant.is_default,
                    settings,
                    selection
                ],
            )?;
            tx.commit()?;
            Ok(())
        })
    }

    pub fn variants(&self, link_id: &LinkId) -> Result<Vec<SettingsVariant>, CurtainError> {
        self.handle.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, curtain_link_id, name, description, created_at, is_default, settings, selection \
                 FROM settings_variants WHERE curtain_link_id = ?1 ORDER BY created_at, rowid",
            )?;
            let rows = stmt.query_map(params![link_id.as_str()], variant_columns)?;
            let rows = rows.collect::<rusqlite::Result<Vec<_>>>()?;
            rows.into_iter().map(variant_from_columns).collect()
        })
    }

    pub fn variant(&self, id: &str) -> Result<Option<SettingsVariant>, CurtainError> {
        self.handle.with_conn(|conn| {
            let columns = conn
                .query_row(
                    "SELECT id, curtain_link_id, name, description, created_at, is_default, settings, selection \
                     FROM settings_variants WHERE id = ?1",
                    params![id],
                    variant_columns,
                )
                .optional()?;
            columns.map(variant_from_columns).transpose()
        })
    }

    pub fn default_variant(&self, link_id: &LinkId) -> Result<Option<SettingsVariant>, CurtainError> {
        self.handle.with_conn(|conn| {
            let columns = conn
                .query_row(
                    "SELECT id, curtain_link_id, name, description, created_at, is_default, settings, selection \
                     FROM settings_variants WHERE curtain_link_id = ?1 AND is_default = 1 \
                     ORDER BY created_at DESC LIMIT 1",
                    params![link_id.as_str()],
                    variant_columns,
                )
                .optional()?;
            columns.map(variant_from_columns).transpose()
        })
    }

    pub fn set_default_variant(&self, link_id: &LinkId, variant_id: &str) -> Result<(), CurtainError> {
        self.handle.with_conn(|conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "UPDATE settings_variants SET is_default = 0 WHERE curtain_link_id = ?1",
                params![link_id.as_str()],
            )?;
            let updated = tx.execute(
                "UPDATE settings_variants SET is_default = 1 WHERE curtain_link_id = ?1 AND id = ?2",
                params![link_id.as_str(), variant_id],
            )?;
            if updated == 0 {
                return Err(CurtainError::VariantNotFound(variant_id.to_string()));
            }
            tx.commit()?;
            Ok(())
        })
    }

    pub fn clear_default_variant(&self, link_id: &LinkId) -> Result<(), CurtainError> {
        self.handle.with_conn(|conn| {
            conn.execute(
                "UPDATE settings_variants SET is_default = 0 WHERE curtain_link_id = ?1",
                params![link_id.as_str()],
            )?;
            Ok(())
        })
    }

    pub fn delete_variant(&self, id: &str) -> Result<bool, CurtainError> {
        self.handle.with_conn(|conn| {
            Ok(conn.execute("DELETE FROM settings_variants WHERE id = ?1", params![id])? > 0)
        })
    }
}

type SelectionGroupColumns = (String, String, String, String, String, bool, i64, i64);

fn selection_group_columns(row: &Row<'_>) -> rusqlite::Result<SelectionGroupColumns> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
        row.get(7)?,
    ))
}

fn selection_group_from_columns(columns: SelectionGroupColumns) -> Result<SelectionGroup, CurtainError> {
    let (id, link_id, name, color, proteins, is_active, created_at, modified_at) = columns;
    Ok(SelectionGroup {
        id,
        curtain_link_id: link_id.parse()?,
        name,
        color,
        proteins: serde_json::from_str(&proteins)?,
        is_active,
        created_at,
        modified_at,
    })
}

type SearchListColumns = (String, String, String, Option<String>, String, String, i64, i64);

fn search_list_columns(row: &Row<'_>) -> rusqlite::Result<SearchListColumns> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
        row.get(7)?,
    ))
}

fn search_list_from_columns(columns: SearchListColumns) -> Result<SearchList, CurtainError> {
    let (id, link_id, name, description, proteins, search_type, created_at, modified_at) = columns;
    Ok(SearchList {
        id,
        curtain_link_id: link_id.parse()?,
        name,
        description,
        proteins: serde_json::from_str(&proteins)?,
        search_type: search_type.parse::<SearchType>()?,
        created_at,
        modified_at,
    })
}

fn filter_list_from_row(row: &Row<'_>) -> rusqlite::Result<DataFilterList> {
    Ok(DataFilterList {
        id: row.get(0)?,
        api_id: row.get(1)?,
        name: row.get(2)?,
        category: row.get(3)?,
        data: row.get(4)?,
        is_default: row.get(5)?,
    })
}

type VariantColumns = (String, String, String, Option<String>, i64, bool, String, Option<String>);

fn variant_columns(row: &Row<'_>) -> rusqlite::Result<VariantColumns> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
        row.get(7)?,
    ))
}

fn variant_from_columns(columns: VariantColumns) -> Result<SettingsVariant, CurtainError> {
    let (id, link_id, name, description, created_at, is_default, settings, selection) = columns;
    Ok(SettingsVariant {
        id,
        curtain_link_id: link_id.parse()?,
        name,
        description,
        created_at,
        is_default,
        settings: serde_json::from_str::<SettingsOverlay>(&settings)?,
        selection: selection
            .map(|text| serde_json::from_str::<SelectionSnapshot>(&text))
            .transpose()?,
    })
}
