use std::collections::BTreeSet;
use std::sync::Arc;

use indexmap::IndexSet;
use tracing::{info, warn};

use crate::datastore::ProcessedRow;
use crate::domain::LinkId;
use crate::error::CurtainError;
use crate::identifiers::{accession_from_token, split_gene_names, split_primary_id};
use crate::mapping::{GeneNameMapping, MAPPING_SCHEMA_VERSION, MappingStore, PrimaryIdMapping};
use crate::progress::{CancelToken, ProgressEvent, ProgressSink};
use crate::store::{DatabaseManager, DatasetDatabase};
use crate::uniprot::UniprotIndex;

const INSERT_CHUNK: usize = 5_000;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MappingSet {
    pub primary_ids: Vec<PrimaryIdMapping>,
    pub gene_names: Vec<GeneNameMapping>,
}

impl MappingSet {
    pub fn len(&self) -> usize {
        self.primary_ids.len() + self.gene_names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.primary_ids.is_empty() && self.gene_names.is_empty()
    }
}

pub fn build_mappings(rows: &[ProcessedRow], index: &UniprotIndex) -> MappingSet {
    let mut primary = BTreeSet::new();
    let mut genes = BTreeSet::new();
    let mut seen: IndexSet<&str> = IndexSet::new();

    for row in rows {
        if !seen.insert(row.primary_id.as_str()) {
            continue;
        }
        let primary_id = row.primary_id.as_str();
        primary.insert((primary_id.to_string(), primary_id.to_string()));
        for token in split_primary_id(primary_id) {
            if let Some(accession) = accession_from_token(&token) {
                primary.insert((accession, primary_id.to_string()));
            }
            primary.insert((token, primary_id.to_string()));
        }

        let gene_names = row.gene_names.clone().or_else(|| {
            index
                .record_for_primary_id(primary_id)
                .and_then(|record| record.gene_names())
                .map(|names| names.to_string())
        });
        if let Some(gene_names) = gene_names {
            for gene in split_gene_names(&gene_names) {
                genes.insert((gene, primary_id.to_string()));
            }
        }
    }

    MappingSet {
        primary_ids: primary
            .into_iter()
            .map(|(split_id, primary_id)| PrimaryIdMapping {
                split_id,
                primary_id,
            })
            .collect(),
        gene_names: genes
            .into_iter()
            .map(|(gene_name, primary_id)| GeneNameMapping {
                gene_name,
                primary_id,
            })
            .collect(),
    }
}

#[derive(Clone)]
pub struct IdentifierResolver {
    mappings: Arc<DatabaseManager<MappingStore>>,
}

impl IdentifierResolver {
    pub fn new(mappings: Arc<DatabaseManager<MappingStore>>) -> Self {
        Self { mappings }
    }

    pub fn manager(&self) -> &DatabaseManager<MappingStore> {
        &self.mappings
    }

    pub fn check_mappings_exist(&self, link_id: &LinkId) -> bool {
        match self.mappings.get_store(link_id) {
            Ok(store) => store.check_mappings_exist(),
            Err(err) => {
                warn!(link_id = %link_id, error = %err, "mapping store unavailable");
                false
            }
        }
    }

    pub fn primary_ids_for_split_id(&self, link_id: &LinkId, split_id: &str) -> BTreeSet<String> {
        self.lookup(link_id, |store| store.primary_ids_for_split_id(split_id))
    }

    pub fn primary_ids_for_gene_name(&self, link_id: &LinkId, gene_name: &str) -> BTreeSet<String> {
        self.lookup(link_id, |store| store.primary_ids_for_gene_name(gene_name))
    }

    pub fn resolve_query(&self, link_id: &LinkId, term: &str) -> BTreeSet<String> {
        let term = term.trim();
        if term.is_empty() {
            return BTreeSet::new();
        }
        let mut found = self.primary_ids_for_split_id(link_id, term);
        found.extend(self.primary_ids_for_gene_name(link_id, term));
        if found.is_empty() {
            let upper = term.to_uppercase();
            if upper != term {
                found.extend(self.primary_ids_for_gene_name(link_id, &upper));
            }
        }
        found
    }

    pub fn resolve_terms(&self, link_id: &LinkId, terms: &[String]) -> (Vec<String>, Vec<String>) {
        let mut matched: IndexSet<String> = IndexSet::new();
        let mut unresolved = Vec::new();
        for term in terms.iter().map(|t| t.trim()).filter(|t| !t.is_empty()) {
            let found = self.resolve_query(link_id, term);
            if found.is_empty() {
                unresolved.push(term.to_string());
            }
            matched.extend(found);
        }
        (matched.into_iter().collect(), unresolved)
    }

    pub fn ensure_mappings(
        &self,
        link_id: &LinkId,
        rows: &[ProcessedRow],
        index: &UniprotIndex,
        cancel: &CancelToken,
        sink: &dyn ProgressSink,
    ) -> Result<bool, CurtainError> {
        let store = self.mappings.get_store(link_id)?;
        if store.check_mappings_exist() {
            return Ok(false);
        }

        sink.event(ProgressEvent::message(format!(
            "phase=Mappings; rebuilding mappings for {link_id}"
        )));
        store.clear_all()?;
        let set = build_mappings(rows, index);
        match write_mappings(&store, &set, cancel, sink) {
            Ok(()) => {
                store.set_schema_version(MAPPING_SCHEMA_VERSION)?;
                info!(
                    link_id = %link_id,
                    primary = set.primary_ids.len(),
                    genes = set.gene_names.len(),
                    "rebuilt identifier mappings"
                );
                Ok(true)
            }
            Err(err) => {
                if let Err(clear_err) = store.clear_all() {
                    warn!(link_id = %link_id, error = %clear_err, "failed to clear partial mappings");
                }
                Err(err)
            }
        }
    }

    fn lookup<F>(&self, link_id: &LinkId, query: F) -> BTreeSet<String>
    where
        F: FnOnce(&MappingStore) -> Result<BTreeSet<String>, CurtainError>,
    {
        let result = self
            .mappings
            .get_store(link_id)
            .and_then(|store| query(&store));
        match result {
            Ok(found) => found,
            Err(err) => {
                warn!(link_id = %link_id, error = %err, "identifier lookup failed, returning no match");
                BTreeSet::new()
            }
        }
    }
}

fn write_mappings(
    store: &MappingStore,
    set: &MappingSet,
    cancel: &CancelToken,
    sink: &dyn ProgressSink,
) -> Result<(), CurtainError> {
    let total = Some(set.len());
    let mut done = 0;
    for chunk in set.primary_ids.chunks(INSERT_CHUNK) {
        cancel.checkpoint()?;
        store.insert_primary_id_mappings(chunk)?;
        done += chunk.len();
        sink.event(ProgressEvent::step("phase=Mappings; primary ids", done, total));
    }
    for chunk in set.gene_names.chunks(INSERT_CHUNK) {
        cancel.checkpoint()?;
        store.insert_gene_name_mappings(chunk)?;
        done += chunk.len();
        sink.event(ProgressEvent::step("phase=Mappings; gene names", done, total));
    }
    cancel.checkpoint()
}
