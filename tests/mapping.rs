use std::collections::BTreeSet;
use std::sync::Arc;

use assert_matches::assert_matches;
use camino::Utf8PathBuf;
use serde_json::json;

use curtain_core::datastore::ProcessedRow;
use curtain_core::domain::LinkId;
use curtain_core::error::CurtainError;
use curtain_core::mapping::{
    GeneNameMapping, MAPPING_SCHEMA_VERSION, MappingStore, PrimaryIdMapping,
};
use curtain_core::output::JsonOutput;
use curtain_core::progress::{CancelToken, ProgressEvent, ProgressSink};
use curtain_core::resolver::{IdentifierResolver, build_mappings};
use curtain_core::store::{DatabaseManager, DatasetDatabase, StoreLayout};
use curtain_core::uniprot::UniprotIndex;

fn link() -> LinkId {
    "mapping-test".parse().unwrap()
}

fn row(primary_id: &str, gene_names: Option<&str>) -> ProcessedRow {
    ProcessedRow {
        primary_id: primary_id.to_string(),
        comparison: "A vs B".to_string(),
        gene_names: gene_names.map(|g| g.to_string()),
        log2_fc: 1.0,
        p_value: 0.01,
        neg_log10_p: 2.0,
    }
}

fn set(values: &[&str]) -> BTreeSet<String> {
    values.iter().map(|v| v.to_string()).collect()
}

fn resolver(dir: &tempfile::TempDir) -> IdentifierResolver {
    let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
    IdentifierResolver::new(Arc::new(DatabaseManager::new(StoreLayout::new_with_root(root))))
}

/// Cancels the shared token once the first batch has been written.
struct CancelAfterFirstBatch {
    cancel: CancelToken,
}

impl ProgressSink for CancelAfterFirstBatch {
    fn event(&self, event: ProgressEvent) {
        if event.done > 0 {
            self.cancel.cancel();
        }
    }
}

#[test]
fn mapping_round_trip() {
    let store = MappingStore::open_in_memory(&link()).unwrap();
    store
        .insert_primary_id_mappings(&[
            PrimaryIdMapping {
                split_id: "P12345".to_string(),
                primary_id: "P12345;Q67890".to_string(),
            },
            PrimaryIdMapping {
                split_id: "Q67890".to_string(),
                primary_id: "P12345;Q67890".to_string(),
            },
            PrimaryIdMapping {
                split_id: "P12345".to_string(),
                primary_id: "P12345-2".to_string(),
            },
        ])
        .unwrap();
    store
        .insert_gene_name_mappings(&[GeneNameMapping {
            gene_name: "ABC1".to_string(),
            primary_id: "P12345;Q67890".to_string(),
        }])
        .unwrap();

    assert_eq!(
        store.primary_ids_for_split_id("P12345").unwrap(),
        set(&["P12345;Q67890", "P12345-2"])
    );
    assert_eq!(
        store.primary_ids_for_split_id("Q67890").unwrap(),
        set(&["P12345;Q67890"])
    );
    assert_eq!(
        store.primary_ids_for_gene_name("ABC1").unwrap(),
        set(&["P12345;Q67890"])
    );
    assert!(store.primary_ids_for_split_id("missing").unwrap().is_empty());
}

#[test]
fn schema_version_gates_existing_mappings() {
    let store = MappingStore::open_in_memory(&link()).unwrap();
    assert!(!store.check_mappings_exist());

    // version without rows
    store.set_schema_version(MAPPING_SCHEMA_VERSION).unwrap();
    assert!(!store.check_mappings_exist());

    store.clear_all().unwrap();
    store
        .insert_primary_id_mappings(&[PrimaryIdMapping {
            split_id: "P1".to_string(),
            primary_id: "P1".to_string(),
        }])
        .unwrap();
    // rows without version
    assert!(!store.check_mappings_exist());

    store.set_schema_version(MAPPING_SCHEMA_VERSION - 1).unwrap();
    assert!(!store.check_mappings_exist());

    store.set_schema_version(MAPPING_SCHEMA_VERSION).unwrap();
    assert!(store.check_mappings_exist());
    assert_eq!(store.schema_version().unwrap(), Some(MAPPING_SCHEMA_VERSION));
}

#[test]
fn built_mappings_cover_tokens_accessions_and_genes() {
    let index = UniprotIndex::from_blob(&json!({
        "db": {"Q67890": {"Entry": "Q67890", "Gene Names": "XYZ2 XYZ"}}
    }));
    let rows = vec![
        row("sp|P12345|ABC_HUMAN;P12345-2", Some("ABC1")),
        row("Q67890", None),
        row("Q67890", None),
    ];
    let set = build_mappings(&rows, &index);

    let splits = set
        .primary_ids
        .iter()
        .filter(|m| m.primary_id == "sp|P12345|ABC_HUMAN;P12345-2")
        .map(|m| m.split_id.as_str())
        .collect::<BTreeSet<_>>();
    assert!(splits.contains("sp|P12345|ABC_HUMAN;P12345-2"));
    assert!(splits.contains("sp|P12345|ABC_HUMAN"));
    assert!(splits.contains("P12345-2"));
    assert!(splits.contains("P12345"));

    let genes = set
        .gene_names
        .iter()
        .map(|m| (m.gene_name.as_str(), m.primary_id.as_str()))
        .collect::<BTreeSet<_>>();
    assert!(genes.contains(&("ABC1", "sp|P12345|ABC_HUMAN;P12345-2")));
    assert!(genes.contains(&("XYZ2", "Q67890")));
    assert!(genes.contains(&("XYZ", "Q67890")));
}

#[test]
fn ensure_mappings_builds_once() {
    let dir = tempfile::tempdir().unwrap();
    let resolver = resolver(&dir);
    let rows = vec![row("P12345;Q67890", Some("ABC1"))];
    let index = UniprotIndex::default();
    let cancel = CancelToken::new();

    assert!(
        resolver
            .ensure_mappings(&link(), &rows, &index, &cancel, &JsonOutput)
            .unwrap()
    );
    assert!(resolver.check_mappings_exist(&link()));
    assert!(
        !resolver
            .ensure_mappings(&link(), &rows, &index, &cancel, &JsonOutput)
            .unwrap()
    );

    assert_eq!(
        resolver.resolve_query(&link(), "Q67890"),
        set(&["P12345;Q67890"])
    );
    assert_eq!(resolver.resolve_query(&link(), "abc1"), set(&["P12345;Q67890"]));
    let (matched, unresolved) = resolver.resolve_terms(
        &link(),
        &["ABC1".to_string(), "NOPE".to_string(), " ".to_string()],
    );
    assert_eq!(matched, vec!["P12345;Q67890".to_string()]);
    assert_eq!(unresolved, vec!["NOPE".to_string()]);
}

#[test]
fn cancelled_rebuild_leaves_no_mappings() {
    let dir = tempfile::tempdir().unwrap();
    let resolver = resolver(&dir);
    let rows = vec![row("P12345", Some("ABC1")), row("Q67890", Some("XYZ2"))];
    let cancel = CancelToken::new();
    let sink = CancelAfterFirstBatch {
        cancel: cancel.clone(),
    };

    let result = resolver.ensure_mappings(&link(), &rows, &UniprotIndex::default(), &cancel, &sink);
    assert_matches!(result, Err(CurtainError::Cancelled));
    assert!(!resolver.check_mappings_exist(&link()));

    let store = resolver.manager().get_store(&link()).unwrap();
    assert_eq!(store.primary_id_mapping_count().unwrap(), 0);
    assert_eq!(store.schema_version().unwrap(), None);

    let fresh = CancelToken::new();
    assert!(
        resolver
            .ensure_mappings(&link(), &rows, &UniprotIndex::default(), &fresh, &JsonOutput)
            .unwrap()
    );
}

#[test]
fn lookups_degrade_to_empty_on_closed_store() {
    let dir = tempfile::tempdir().unwrap();
    let resolver = resolver(&dir);
    let store = resolver.manager().get_store(&link()).unwrap();
    store.close();
    assert!(resolver.primary_ids_for_split_id(&link(), "P12345").is_empty());
    assert!(resolver.primary_ids_for_gene_name(&link(), "ABC1").is_empty());
    assert!(!resolver.check_mappings_exist(&link()));
}
