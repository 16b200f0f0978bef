use std::path::Path;

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::datastore::{ProcessedRow, RawValue};
use crate::error::CurtainError;
use crate::fs_util;
use crate::settings::CurtainSettings;
use crate::uniprot::UniprotIndex;

pub const DEFAULT_COMPARISON: &str = "CurtainSetComparison";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawForm {
    #[serde(rename = "_primaryIDs")]
    pub primary_ids: String,
    #[serde(rename = "_samples")]
    pub samples: Vec<String>,
    #[serde(rename = "_log2")]
    pub log2: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DifferentialForm {
    #[serde(rename = "_primaryIDs")]
    pub primary_ids: String,
    #[serde(rename = "_geneNames")]
    pub gene_names: String,
    #[serde(rename = "_foldChange")]
    pub fold_change: String,
    #[serde(rename = "_significant")]
    pub significant: String,
    #[serde(rename = "_comparison")]
    pub comparison: String,
    #[serde(rename = "_comparisonSelect")]
    pub comparison_select: Value,
    #[serde(rename = "_transformFC")]
    pub transform_fc: bool,
    #[serde(rename = "_transformSignificant")]
    pub transform_significant: bool,
    #[serde(rename = "_reverseFoldChange")]
    pub reverse_fold_change: bool,
}

impl DifferentialForm {
    pub fn selected_comparisons(&self) -> Vec<String> {
        crate::blob::string_list(&self.comparison_select)
            .into_iter()
            .filter(|c| !c.is_empty())
            .collect()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DatasetPayload {
    pub raw: Option<String>,
    pub processed: Option<String>,
    pub raw_form: RawForm,
    pub differential_form: DifferentialForm,
    pub settings: Value,
    pub extra_data: Value,
}

impl DatasetPayload {
    pub fn from_slice(bytes: &[u8]) -> Result<Self, CurtainError> {
        serde_json::from_slice(bytes).map_err(|err| CurtainError::PayloadParse(err.to_string()))
    }

    pub fn from_path(path: &Path) -> Result<Self, CurtainError> {
        let bytes = fs_util::read_maybe_gzip(path)?;
        Self::from_slice(&bytes)
    }

    pub fn settings(&self) -> CurtainSettings {
        let value = decode_nested(&self.settings);
        if value.is_null() {
            return CurtainSettings::default();
        }
        match serde_json::from_value::<CurtainSettings>(value) {
            Ok(settings) => settings,
            Err(err) => {
                warn!(error = %err, "unreadable settings object, using defaults");
                CurtainSettings::default()
            }
        }
    }

    pub fn uniprot_blob(&self) -> Value {
        let extra = decode_nested(&self.extra_data);
        extra
            .get("uniprot")
            .map(decode_nested)
            .unwrap_or(Value::Null)
    }

    pub fn uniprot_index(&self) -> UniprotIndex {
        UniprotIndex::from_blob(&self.uniprot_blob())
    }

    pub fn processed_rows(&self) -> Result<Vec<ProcessedRow>, CurtainError> {
        match &self.processed {
            Some(text) => parse_processed(text, &self.differential_form),
            None => Ok(Vec::new()),
        }
    }

    pub fn raw_values(&self) -> Result<Vec<RawValue>, CurtainError> {
        match &self.raw {
            Some(text) => parse_raw(text, &self.raw_form),
            None => Ok(Vec::new()),
        }
    }
}

fn decode_nested(value: &Value) -> Value {
    match value {
        Value::String(text) => serde_json::from_str(text).unwrap_or(Value::Null),
        other => other.clone(),
    }
}

fn tsv_reader(text: &str) -> csv::Reader<&[u8]> {
    csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .flexible(true)
        .from_reader(text.as_bytes())
}

fn column_index(headers: &csv::StringRecord, name: &str) -> Option<usize> {
    if name.is_empty() {
        return None;
    }
    headers.iter().position(|header| header.trim() == name)
}

fn required_column(headers: &csv::StringRecord, name: &str) -> Result<usize, CurtainError> {
    column_index(headers, name)
        .ok_or_else(|| CurtainError::PayloadParse(format!("missing column '{name}'")))
}

pub fn parse_processed(text: &str, form: &DifferentialForm) -> Result<Vec<ProcessedRow>, CurtainError> {
    let mut reader = tsv_reader(text);
    let headers = reader
        .headers()
        .map_err(|err| CurtainError::PayloadParse(err.to_string()))?
        .clone();
    let id_col = required_column(&headers, &form.primary_ids)?;
    let fc_col = required_column(&headers, &form.fold_change)?;
    let sig_col = required_column(&headers, &form.significant)?;
    let gene_col = column_index(&headers, &form.gene_names);
    let comparison_col = column_index(&headers, &form.comparison);
    let selected = form.selected_comparisons();

    let mut rows = Vec::new();
    let mut skipped = 0usize;
    for record in reader.records() {
        let record = record.map_err(|err| CurtainError::PayloadParse(err.to_string()))?;
        let primary_id = record.get(id_col).unwrap_or("").trim();
        if primary_id.is_empty() {
            skipped += 1;
            continue;
        }
        let comparison = comparison_col
            .and_then(|col| record.get(col))
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .unwrap_or(DEFAULT_COMPARISON);
        if comparison_col.is_some() && !selected.is_empty() && !selected.iter().any(|s| s == comparison) {
            continue;
        }
        let fold_change = parse_number(record.get(fc_col));
        let significance = parse_number(record.get(sig_col));
        let (Some(fold_change), Some(significance)) = (fold_change, significance) else {
            skipped += 1;
            continue;
        };

        let mut log2_fc = if form.transform_fc {
            fold_change.log2()
        } else {
            fold_change
        };
        if form.reverse_fold_change {
            log2_fc = -log2_fc;
        }
        let (p_value, neg_log10_p) = if form.transform_significant {
            (significance, -significance.log10())
        } else {
            (10f64.powf(-significance), significance)
        };
        if !(log2_fc.is_finite() && p_value.is_finite() && neg_log10_p.is_finite()) {
            skipped += 1;
            continue;
        }

        rows.push(ProcessedRow {
            primary_id: primary_id.to_string(),
            comparison: comparison.to_string(),
            gene_names: gene_col
                .and_then(|col| record.get(col))
                .map(str::trim)
                .filter(|g| !g.is_empty())
                .map(|g| g.to_string()),
            log2_fc,
            p_value,
            neg_log10_p,
        });
    }
    if skipped > 0 {
        warn!(skipped, "skipped differential rows without id or finite values");
    }
    debug!(rows = rows.len(), "parsed differential table");
    Ok(rows)
}

pub fn parse_raw(text: &str, form: &RawForm) -> Result<Vec<RawValue>, CurtainError> {
    let mut reader = tsv_reader(text);
    let headers = reader
        .headers()
        .map_err(|err| CurtainError::PayloadParse(err.to_string()))?
        .clone();
    let id_col = required_column(&headers, &form.primary_ids)?;
    let sample_cols = form
        .samples
        .iter()
        .map(|sample| required_column(&headers, sample).map(|col| (sample.as_str(), col)))
        .collect::<Result<Vec<_>, _>>()?;

    let mut values = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|err| CurtainError::PayloadParse(err.to_string()))?;
        let primary_id = record.get(id_col).unwrap_or("").trim();
        if primary_id.is_empty() {
            continue;
        }
        for (sample, col) in &sample_cols {
            values.push(RawValue {
                primary_id: primary_id.to_string(),
                sample: sample.to_string(),
                value: parse_number(record.get(*col)),
            });
        }
    }
    Ok(values)
}

fn parse_number(cell: Option<&str>) -> Option<f64> {
    cell.map(str::trim)
        .filter(|c| !c.is_empty())
        .and_then(|c| c.parse::<f64>().ok())
        .filter(|v| v.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form() -> DifferentialForm {
        DifferentialForm {
            primary_ids: "Index".to_string(),
            gene_names: "Gene".to_string(),
            fold_change: "FC".to_string(),
            significant: "P".to_string(),
            transform_significant: true,
            ..DifferentialForm::default()
        }
    }

    #[test]
    fn transforms_raw_p_values() {
        let text = "Index\tGene\tFC\tP\nP1\tGENE1\t1.5\t0.01\nP2\t\tNA\t0.5\n";
        let rows = parse_processed(text, &form()).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].comparison, DEFAULT_COMPARISON);
        assert_eq!(rows[0].gene_names.as_deref(), Some("GENE1"));
        assert!((rows[0].neg_log10_p - 2.0).abs() < 1e-9);
    }

    #[test]
    fn non_finite_transforms_are_skipped() {
        let form = DifferentialForm {
            transform_fc: true,
            ..form()
        };
        let text = "Index\tGene\tFC\tP\nP1\t\t2.0\t0.01\nP2\t\t-0.5\t0.2\nP3\t\t0\t0.2\nP4\t\t2.0\t0\n";
        let rows = parse_processed(text, &form).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].primary_id, "P1");
        assert!((rows[0].log2_fc - 1.0).abs() < 1e-9);
    }

    #[test]
    fn missing_column_is_an_error() {
        let text = "Index\tFC\nP1\t1.0\n";
        assert!(parse_processed(text, &form()).is_err());
    }
}
