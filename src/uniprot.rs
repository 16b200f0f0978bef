use indexmap::IndexMap;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::blob::{FlexMap, string_list};
use crate::identifiers::{accession_from_token, split_primary_id};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UniprotRecord {
    attributes: Map<String, Value>,
}

impl UniprotRecord {
    pub fn from_value(value: &Value) -> Option<Self> {
        value.as_object().map(|attributes| Self {
            attributes: attributes.clone(),
        })
    }

    pub fn attribute(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }

    pub fn attributes(&self) -> &Map<String, Value> {
        &self.attributes
    }

    pub fn entry(&self) -> Option<&str> {
        self.text(&["Entry", "accession", "primaryAccession"])
    }

    pub fn gene_names(&self) -> Option<&str> {
        self.text(&["Gene Names", "Gene names", "geneNames"])
    }

    pub fn primary_gene_name(&self) -> Option<&str> {
        self.gene_names().and_then(|names| {
            names
                .split(|ch: char| ch.is_whitespace() || ch == ';')
                .find(|name| !name.is_empty())
        })
    }

    pub fn protein_name(&self) -> Option<&str> {
        self.text(&["Protein names", "Protein Names", "proteinName", "description"])
    }

    pub fn organism(&self) -> Option<&str> {
        self.text(&["Organism", "organism"])
    }

    fn text(&self, keys: &[&str]) -> Option<&str> {
        keys.iter()
            .find_map(|key| self.attributes.get(*key).and_then(|v| v.as_str()))
            .map(str::trim)
            .filter(|value| !value.is_empty())
    }
}

#[derive(Debug, Clone, Default)]
pub struct UniprotIndex {
    results: IndexMap<String, Value>,
    data_map: IndexMap<String, String>,
    db: IndexMap<String, UniprotRecord>,
    acc_map: IndexMap<String, Vec<String>>,
    gene_name_to_acc: IndexMap<String, Vec<String>>,
    organism: Option<String>,
}

impl UniprotIndex {
    pub fn from_blob(blob: &Value) -> Self {
        let results = parse_section(blob, "results");

        let data_map = parse_section(blob, "dataMap")
            .into_iter()
            .filter_map(|(key, value)| {
                let target = match value {
                    Value::String(text) => Some(text),
                    other => string_list(&other).into_iter().next(),
                };
                target.map(|target| (key, target))
            })
            .collect::<IndexMap<_, _>>();

        let db = parse_section(blob, "db")
            .into_iter()
            .filter_map(|(key, value)| UniprotRecord::from_value(&value).map(|record| (key, record)))
            .collect::<IndexMap<_, _>>();

        let acc_map = parse_section(blob, "accMap")
            .into_iter()
            .map(|(key, value)| (key, string_list(&value)))
            .collect::<IndexMap<_, _>>();

        let gene_name_to_acc = parse_section(blob, "geneNameToAcc")
            .into_iter()
            .map(|(key, value)| (key, string_list(&value)))
            .collect::<IndexMap<_, _>>();

        let organism = blob
            .get("organism")
            .and_then(|v| v.as_str())
            .map(|v| v.to_string())
            .filter(|v| !v.is_empty());

        debug!(
            results = results.len(),
            db = db.len(),
            data_map = data_map.len(),
            acc_map = acc_map.len(),
            genes = gene_name_to_acc.len(),
            "built uniprot index"
        );

        Self {
            results,
            data_map,
            db,
            acc_map,
            gene_name_to_acc,
            organism,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.db.is_empty() && self.results.is_empty()
    }

    pub fn organism(&self) -> Option<&str> {
        self.organism.as_deref()
    }

    pub fn len(&self) -> usize {
        self.db.len()
    }

    /// Direct hit in `db`, else an alias of `accession` that `dataMap`
    /// redirects to a known record.
    pub fn record_for(&self, accession: &str) -> Option<&UniprotRecord> {
        if let Some(record) = self.db.get(accession) {
            return Some(record);
        }
        self.acc_map.get(accession)?.iter().find_map(|alias| {
            let target = self.data_map.get(alias)?;
            self.db.get(target)
        })
    }

    pub fn record_for_primary_id(&self, primary_id: &str) -> Option<&UniprotRecord> {
        if let Some(record) = self.record_for(primary_id) {
            return Some(record);
        }
        split_primary_id(primary_id).iter().find_map(|token| {
            self.record_for(token).or_else(|| {
                accession_from_token(token).and_then(|accession| self.record_for(&accession))
            })
        })
    }

    pub fn result_for(&self, accession: &str) -> Option<&Value> {
        self.results.get(accession)
    }

    pub fn gene_names_for(&self, accession: &str) -> Option<&str> {
        self.record_for(accession).and_then(UniprotRecord::gene_names)
    }

    pub fn protein_name_for(&self, accession: &str) -> Option<&str> {
        self.record_for(accession).and_then(UniprotRecord::protein_name)
    }

    pub fn accessions_for_gene(&self, gene_name: &str) -> &[String] {
        self.gene_name_to_acc
            .get(gene_name)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn gene_name_to_acc(&self) -> impl Iterator<Item = (&str, &str)> {
        self.gene_name_to_acc.iter().flat_map(|(gene, accessions)| {
            accessions
                .iter()
                .map(move |accession| (gene.as_str(), accession.as_str()))
        })
    }
}

fn parse_section(blob: &Value, key: &str) -> IndexMap<String, Value> {
    let Some(value) = blob.get(key) else {
        return IndexMap::new();
    };
    match FlexMap::parse(value) {
        FlexMap::Parsed { entries, .. } => entries,
        FlexMap::Malformed(reason) => {
            warn!(section = key, %reason, "malformed uniprot section, leaving it empty");
            IndexMap::new()
        }
    }
}
