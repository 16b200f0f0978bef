use serde_json::json;

use curtain_core::blob::{FlexMap, MapEncoding};
use curtain_core::uniprot::UniprotIndex;

fn blob() -> serde_json::Value {
    json!({
        "organism": "Homo sapiens",
        "results": {"P69905": {"Entry": "P69905"}},
        "db": {
            "P69905": {
                "Entry": "P69905",
                "Gene Names": "HBA1 HBA2",
                "Protein names": "Hemoglobin subunit alpha",
                "Organism": "Homo sapiens (Human)"
            },
            "P68871": {
                "Entry": "P68871",
                "Gene Names": "HBB",
                "Protein names": "Hemoglobin subunit beta"
            }
        },
        "dataMap": [["P69905-1", "P69905"], ["P68871-1", "P68871"]],
        "accMap": "{\"Q6LDH1\": [\"P69905-1\"], \"P02023\": [\"P68871-1\"]}",
        "geneNameToAcc": {"HBA1": ["P69905"], "HBB": ["P68871"]}
    })
}

#[test]
fn direct_lookup() {
    let index = UniprotIndex::from_blob(&blob());
    let record = index.record_for("P69905").unwrap();
    assert_eq!(record.entry(), Some("P69905"));
    assert_eq!(record.gene_names(), Some("HBA1 HBA2"));
    assert_eq!(record.primary_gene_name(), Some("HBA1"));
    assert_eq!(index.organism(), Some("Homo sapiens"));
    assert_eq!(index.len(), 2);
    assert!(index.result_for("P69905").is_some());
}

#[test]
fn two_hop_lookup_through_alias_maps() {
    let index = UniprotIndex::from_blob(&blob());
    let record = index.record_for("Q6LDH1").unwrap();
    assert_eq!(record.entry(), Some("P69905"));
    assert_eq!(
        index.protein_name_for("P02023"),
        Some("Hemoglobin subunit beta")
    );
    assert!(index.record_for("P99999").is_none());
}

#[test]
fn compound_primary_ids_use_first_resolvable_token() {
    let index = UniprotIndex::from_blob(&blob());
    let record = index
        .record_for_primary_id("CON__P00000;sp|P68871|HBB_HUMAN")
        .unwrap();
    assert_eq!(record.entry(), Some("P68871"));
    assert_eq!(
        index.record_for_primary_id("P69905-3").and_then(|r| r.entry()),
        Some("P69905")
    );
}

#[test]
fn gene_lookups() {
    let index = UniprotIndex::from_blob(&blob());
    assert_eq!(index.accessions_for_gene("HBB"), ["P68871".to_string()]);
    assert!(index.accessions_for_gene("NOPE").is_empty());
    let pairs = index.gene_name_to_acc().collect::<Vec<_>>();
    assert_eq!(pairs, vec![("HBA1", "P69905"), ("HBB", "P68871")]);
}

#[test]
fn malformed_sections_are_left_empty() {
    let index = UniprotIndex::from_blob(&json!({
        "db": {"P69905": {"Entry": "P69905"}},
        "dataMap": 42,
        "accMap": [["Q6LDH1"]],
    }));
    assert!(index.record_for("P69905").is_some());
    assert!(index.record_for("Q6LDH1").is_none());

    let empty = UniprotIndex::from_blob(&serde_json::Value::Null);
    assert!(empty.is_empty());
}

#[test]
fn both_map_encodings_parse_to_the_same_entries() {
    let object = FlexMap::parse(&json!({"a": 1, "b": 2}));
    let pairs = FlexMap::parse(&json!([["a", 1], ["b", 2]]));
    let encoded = FlexMap::parse(&json!("[[\"a\", 1], [\"b\", 2]]"));

    match (&object, &pairs) {
        (
            FlexMap::Parsed {
                encoding: MapEncoding::Object,
                entries: left,
            },
            FlexMap::Parsed {
                encoding: MapEncoding::PairArray,
                entries: right,
            },
        ) => assert_eq!(left, right),
        other => panic!("unexpected parse results: {other:?}"),
    }
    assert_eq!(encoded.into_entries(), pairs.into_entries());
    assert!(matches!(FlexMap::parse(&json!(true)), FlexMap::Malformed(_)));
}
