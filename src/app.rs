use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::color::default_palette;
use crate::datastore::{DATA_SCHEMA_VERSION, DataStore, LookupTables, ProcessedRow, RawValue};
use crate::domain::{LinkId, SearchType};
use crate::error::CurtainError;
use crate::identifiers::split_gene_names;
use crate::mapping::MappingStore;
use crate::payload::DatasetPayload;
use crate::progress::{CancelToken, ProgressEvent, ProgressSink};
use crate::resolver::{IdentifierResolver, build_mappings};
use crate::selection::SearchList;
use crate::session::DatasetSession;
use crate::settings::{self, CurtainSettings};
use crate::store::{DatabaseManager, DatasetDatabase, StoreLayout};
use crate::uniprot::UniprotIndex;
use crate::userdata::UserDataStore;

const DATA_CHUNK: usize = 5_000;

#[derive(Debug, Clone, Default)]
pub struct ImportOptions {
    pub force: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ImportResult {
    pub link_id: String,
    pub processed_rows: usize,
    pub raw_values: usize,
    pub data_rebuilt: bool,
    pub mappings_rebuilt: bool,
    pub organism: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RemoveResult {
    pub link_id: String,
    pub removed: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResolveResult {
    pub link_id: String,
    pub query: String,
    pub primary_ids: BTreeSet<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
    pub list: SearchList,
    pub unresolved: Vec<String>,
}

pub struct App {
    layout: StoreLayout,
    mappings: Arc<DatabaseManager<MappingStore>>,
    data: Arc<DatabaseManager<DataStore>>,
    resolver: IdentifierResolver,
    user: UserDataStore,
    palette: Option<Vec<String>>,
}

impl App {
    pub fn new(layout: StoreLayout) -> Result<Self, CurtainError> {
        layout.ensure_datasets_dir()?;
        let user = UserDataStore::open(&layout)?;
        Ok(Self::with_user_store(layout, user))
    }

    pub fn with_user_store(layout: StoreLayout, user: UserDataStore) -> Self {
        let mappings = Arc::new(DatabaseManager::new(layout.clone()));
        let data = Arc::new(DatabaseManager::new(layout.clone()));
        let resolver = IdentifierResolver::new(Arc::clone(&mappings));
        Self {
            layout,
            mappings,
            data,
            resolver,
            user,
            palette: None,
        }
    }

    pub fn with_palette(mut self, palette: Vec<String>) -> Self {
        self.palette = (!palette.is_empty()).then_some(palette);
        self
    }

    pub fn layout(&self) -> &StoreLayout {
        &self.layout
    }

    pub fn resolver(&self) -> &IdentifierResolver {
        &self.resolver
    }

    pub fn mappings(&self) -> &DatabaseManager<MappingStore> {
        &self.mappings
    }

    pub fn data(&self) -> &DatabaseManager<DataStore> {
        &self.data
    }

    pub fn user_data(&self) -> &UserDataStore {
        &self.user
    }

    pub fn import_dataset(
        &self,
        link_id: &LinkId,
        payload: &DatasetPayload,
        options: &ImportOptions,
        cancel: &CancelToken,
        sink: &dyn ProgressSink,
    ) -> Result<ImportResult, CurtainError> {
        let started = Instant::now();
        sink.event(ProgressEvent::message(format!("phase=Parse; reading dataset {link_id}")));
        let rows = payload.processed_rows()?;
        let raw = payload.raw_values()?;
        let index = payload.uniprot_index();

        if options.force {
            self.data.clear_all(link_id)?;
            self.mappings.clear_all(link_id)?;
        }

        let data_store = self.data.get_store(link_id)?;
        let data_rebuilt = if data_store.check_data_exists() {
            false
        } else {
            data_store.clear_all()?;
            let written = write_data(&data_store, &rows, &raw, &index, cancel, sink).and_then(|()| {
                data_store.save_dataset_context(&payload.settings(), &payload.uniprot_blob())
            });
            if let Err(err) = written {
                if let Err(clear_err) = data_store.clear_all() {
                    warn!(link_id = %link_id, error = %clear_err, "failed to clear partial data");
                }
                return Err(err);
            }
            data_store.set_schema_version(DATA_SCHEMA_VERSION)?;
            true
        };

        let mappings_rebuilt = self
            .resolver
            .ensure_mappings(link_id, &rows, &index, cancel, sink)?;

        sink.event(ProgressEvent {
            message: format!("phase=Done; imported {link_id}"),
            done: rows.len(),
            total: Some(rows.len()),
            elapsed: Some(started.elapsed()),
        });
        info!(
            link_id = %link_id,
            rows = rows.len(),
            data_rebuilt,
            mappings_rebuilt,
            "dataset imported"
        );

        Ok(ImportResult {
            link_id: link_id.to_string(),
            processed_rows: rows.len(),
            raw_values: raw.len(),
            data_rebuilt,
            mappings_rebuilt,
            organism: index.organism().map(|o| o.to_string()),
        })
    }

    pub fn open_session(
        &self,
        link_id: &LinkId,
        payload: &DatasetPayload,
    ) -> Result<DatasetSession, CurtainError> {
        let settings = self.session_settings(link_id, payload.settings());
        let data_store = self.data.get_store(link_id)?;
        let rows = if data_store.check_data_exists() {
            data_store.processed_rows(None)?
        } else {
            payload.processed_rows()?
        };
        self.build_session(link_id, payload.uniprot_index(), settings, rows)
    }

    pub fn open_stored_session(&self, link_id: &LinkId) -> Result<DatasetSession, CurtainError> {
        let data_store = self.data.get_store(link_id)?;
        let rows = data_store.processed_rows(None)?;
        let stored = data_store.dataset_settings().unwrap_or_else(|err| {
            warn!(link_id = %link_id, error = %err, "unreadable stored settings, using defaults");
            None
        });
        let index = match data_store.uniprot_blob() {
            Ok(Some(blob)) => UniprotIndex::from_blob(&blob),
            Ok(None) => UniprotIndex::default(),
            Err(err) => {
                warn!(link_id = %link_id, error = %err, "unreadable stored annotations");
                UniprotIndex::default()
            }
        };
        let settings = self.session_settings(link_id, stored.unwrap_or_default());
        self.build_session(link_id, index, settings, rows)
    }

    fn build_session(
        &self,
        link_id: &LinkId,
        index: UniprotIndex,
        settings: CurtainSettings,
        rows: Vec<ProcessedRow>,
    ) -> Result<DatasetSession, CurtainError> {
        let mut session = DatasetSession::new(link_id.clone(), index, settings, rows);
        session.load_selection_groups(&self.user.selection_groups(link_id)?);
        session.load_search_lists(&self.user.search_lists(link_id)?, false);
        Ok(session)
    }

    fn session_settings(&self, link_id: &LinkId, mut settings: CurtainSettings) -> CurtainSettings {
        if let Some(palette) = &self.palette {
            if settings.default_color_list.is_empty()
                || settings.default_color_list == default_palette()
            {
                settings.default_color_list = palette.clone();
            }
        }
        self.with_default_variant(link_id, settings)
    }

    fn with_default_variant(&self, link_id: &LinkId, settings: CurtainSettings) -> CurtainSettings {
        match self.user.default_variant(link_id) {
            Ok(Some(variant)) => settings::apply(&variant, &settings),
            Ok(None) => settings,
            Err(err) => {
                warn!(link_id = %link_id, error = %err, "could not read default variant");
                settings
            }
        }
    }

    pub fn toggle_group_active(
        &self,
        session: &mut DatasetSession,
        key: &str,
    ) -> Result<bool, CurtainError> {
        let active = session.toggle_active(key);
        if let Some(mut group) = self.user.selection_group(key)? {
            group.set_active(active);
            self.user.save_selection_group(&group)?;
            debug!(group = %group.name, active, "persisted selection group state");
        }
        Ok(active)
    }

    pub fn resolve_split_id(&self, link_id: &LinkId, split_id: &str) -> ResolveResult {
        ResolveResult {
            link_id: link_id.to_string(),
            query: split_id.to_string(),
            primary_ids: self.resolver.primary_ids_for_split_id(link_id, split_id),
        }
    }

    pub fn resolve_gene_name(&self, link_id: &LinkId, gene_name: &str) -> ResolveResult {
        ResolveResult {
            link_id: link_id.to_string(),
            query: gene_name.to_string(),
            primary_ids: self.resolver.primary_ids_for_gene_name(link_id, gene_name),
        }
    }

    /// A list with the same name in the same dataset is replaced rather than
    /// duplicated.
    pub fn create_search_list(
        &self,
        link_id: &LinkId,
        name: &str,
        terms: &[String],
        search_type: SearchType,
    ) -> Result<SearchResult, CurtainError> {
        let description = format!("{} search of {} terms", search_type, terms.len());
        self.save_resolved_list(link_id, name, &description, terms, search_type)
    }

    pub fn import_filter_list(
        &self,
        link_id: &LinkId,
        filter_id: &str,
        name: Option<&str>,
    ) -> Result<SearchResult, CurtainError> {
        let filter = self
            .user
            .filter_list(filter_id)?
            .ok_or_else(|| CurtainError::FilterListNotFound(filter_id.to_string()))?;
        let description = format!("{} ({})", filter.name, filter.category);
        self.save_resolved_list(
            link_id,
            name.unwrap_or(&filter.name),
            &description,
            &filter.identifiers(),
            SearchType::FilterList,
        )
    }

    fn save_resolved_list(
        &self,
        link_id: &LinkId,
        name: &str,
        description: &str,
        terms: &[String],
        search_type: SearchType,
    ) -> Result<SearchResult, CurtainError> {
        let (primary_ids, unresolved) = self.resolver.resolve_terms(link_id, terms);
        let existing = if self.user.search_list_name_exists(link_id, name)? {
            self.user
                .search_lists(link_id)?
                .into_iter()
                .find(|list| list.name == name)
        } else {
            None
        };
        let list = match existing {
            Some(mut list) => {
                list.replace_proteins(primary_ids);
                list.search_type = search_type;
                list
            }
            None => SearchList::new(link_id, name, Some(description), primary_ids, search_type),
        };
        self.user.save_search_list(&list)?;
        info!(
            link_id = %link_id,
            list = %list.name,
            matched = list.proteins.len(),
            unresolved = unresolved.len(),
            "saved search list"
        );
        Ok(SearchResult { list, unresolved })
    }

    pub fn remove_dataset(&self, link_id: &LinkId) -> Result<RemoveResult, CurtainError> {
        self.mappings.delete_store(link_id);
        self.data.delete_store(link_id);
        self.user.delete_dataset_records(link_id)?;
        Ok(RemoveResult {
            link_id: link_id.to_string(),
            removed: true,
        })
    }

    pub fn close_all(&self) {
        self.mappings.close_all();
        self.data.close_all();
    }
}

fn write_data(
    store: &DataStore,
    rows: &[ProcessedRow],
    raw: &[RawValue],
    index: &UniprotIndex,
    cancel: &CancelToken,
    sink: &dyn ProgressSink,
) -> Result<(), CurtainError> {
    let total = Some(rows.len() + raw.len());
    let mut done = 0;
    for chunk in rows.chunks(DATA_CHUNK) {
        cancel.checkpoint()?;
        store.insert_processed_rows(chunk)?;
        done += chunk.len();
        sink.event(ProgressEvent::step("phase=Data; processed rows", done, total));
    }
    for chunk in raw.chunks(DATA_CHUNK) {
        cancel.checkpoint()?;
        store.insert_raw_values(chunk)?;
        done += chunk.len();
        sink.event(ProgressEvent::step("phase=Data; raw values", done, total));
    }
    cancel.checkpoint()?;
    store.insert_lookup_tables(&lookup_tables(rows, index))?;
    cancel.checkpoint()
}

fn lookup_tables(rows: &[ProcessedRow], index: &UniprotIndex) -> LookupTables {
    let mut tables = LookupTables::default();
    let mappings = build_mappings(rows, index);
    let mut seen = BTreeSet::new();
    for row in rows {
        if !seen.insert(row.primary_id.as_str()) {
            continue;
        }
        let genes = row.gene_names.clone().or_else(|| {
            index
                .record_for_primary_id(&row.primary_id)
                .and_then(|record| record.gene_names())
                .map(|names| names.to_string())
        });
        if let Some(genes) = genes {
            tables.all_genes.extend(split_gene_names(&genes));
            tables.genes_map.push((row.primary_id.clone(), genes));
        }
    }
    tables.primary_ids_map = mappings
        .primary_ids
        .into_iter()
        .map(|mapping| (mapping.split_id, mapping.primary_id))
        .collect();
    tables.gene_name_to_acc = index
        .gene_name_to_acc()
        .map(|(gene, accession)| (gene.to_string(), accession.to_string()))
        .collect();
    tables
}
