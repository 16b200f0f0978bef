use std::collections::HashSet;

use serde::Serialize;

use crate::datastore::ProcessedRow;
use crate::nearby::PlotPoint;
use crate::selection::GroupEngine;
use crate::settings::CurtainSettings;
use crate::uniprot::UniprotIndex;

pub const BACKGROUND_GREY: &str = "#a4a2a2";
pub const UNASSIGNED_COLOR: &str = "#cccccc";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VolcanoPoint {
    pub id: String,
    pub comparison: String,
    pub gene_names: Option<String>,
    pub protein_name: Option<String>,
    pub label: String,
    pub x: f64,
    pub y: f64,
    pub p_value: f64,
    pub color: String,
    pub is_significant: bool,
    pub significance_group: String,
    pub groups: Vec<String>,
}

impl VolcanoPoint {
    pub fn plot_point(&self) -> PlotPoint {
        PlotPoint::new(&self.id, self.x, self.y)
    }
}

pub fn is_significant(row: &ProcessedRow, settings: &CurtainSettings) -> bool {
    row.p_value <= settings.p_cutoff && row.log2_fc.abs() > settings.log2_fc_cutoff
}

/// Curtain's significance bucket name, e.g. `P-value <= 0.05;FC > 0.6`.
pub fn significance_group(row: &ProcessedRow, settings: &CurtainSettings) -> String {
    let p_part = if row.p_value <= settings.p_cutoff {
        format!("P-value <= {}", settings.p_cutoff)
    } else {
        format!("P-value > {}", settings.p_cutoff)
    };
    let fc_part = if row.log2_fc.abs() > settings.log2_fc_cutoff {
        format!("FC > {}", settings.log2_fc_cutoff)
    } else {
        format!("FC <= {}", settings.log2_fc_cutoff)
    };
    format!("{p_part};{fc_part}")
}

pub fn significance_groups(settings: &CurtainSettings) -> [String; 4] {
    let p = settings.p_cutoff;
    let fc = settings.log2_fc_cutoff;
    [
        format!("P-value <= {p};FC > {fc}"),
        format!("P-value <= {p};FC <= {fc}"),
        format!("P-value > {p};FC > {fc}"),
        format!("P-value > {p};FC <= {fc}"),
    ]
}

pub fn build_points(
    rows: &[ProcessedRow],
    index: &UniprotIndex,
    engine: &GroupEngine,
    settings: &CurtainSettings,
) -> Vec<VolcanoPoint> {
    rows.iter()
        .map(|row| {
            let record = index.record_for_primary_id(&row.primary_id);
            let gene_names = row
                .gene_names
                .clone()
                .or_else(|| record.and_then(|r| r.gene_names()).map(|g| g.to_string()));
            let label = gene_names
                .as_deref()
                .and_then(|names| {
                    names
                        .split(|ch: char| ch == ';' || ch.is_whitespace())
                        .find(|name| !name.is_empty())
                })
                .unwrap_or(&row.primary_id)
                .to_string();
            let bucket = significance_group(row, settings);
            let color = match engine.color_for_protein(&row.primary_id) {
                Some(color) => color.to_string(),
                None if settings.background_color_grey => BACKGROUND_GREY.to_string(),
                None => settings
                    .color_map
                    .get(&bucket)
                    .cloned()
                    .unwrap_or_else(|| UNASSIGNED_COLOR.to_string()),
            };
            VolcanoPoint {
                id: row.primary_id.clone(),
                comparison: row.comparison.clone(),
                gene_names,
                protein_name: record.and_then(|r| r.protein_name()).map(|p| p.to_string()),
                label,
                x: row.log2_fc,
                y: row.neg_log10_p,
                p_value: row.p_value,
                color,
                is_significant: is_significant(row, settings),
                significance_group: bucket,
                groups: engine.groups_for_protein(&row.primary_id),
            }
        })
        .collect()
}

pub fn filter_points(points: Vec<VolcanoPoint>, filtered: &[String]) -> Vec<VolcanoPoint> {
    if filtered.is_empty() {
        return points;
    }
    let keep: HashSet<&str> = filtered.iter().map(String::as_str).collect();
    points
        .into_iter()
        .filter(|point| keep.contains(point.id.as_str()))
        .collect()
}
