use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::color::{AllocatorState, default_palette};
use crate::domain::{LinkId, now_millis};

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VolcanoAxis {
    pub min_x: Option<f64>,
    pub max_x: Option<f64>,
    pub min_y: Option<f64>,
    pub max_y: Option<f64>,
    pub x_title: Option<String>,
    pub y_title: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VolcanoDimension {
    pub width: u32,
    pub height: u32,
}

impl Default for VolcanoDimension {
    fn default() -> Self {
        Self {
            width: 800,
            height: 1000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CurtainSettings {
    pub p_cutoff: f64,
    #[serde(rename = "log2FCCutoff")]
    pub log2_fc_cutoff: f64,
    pub color_map: IndexMap<String, String>,
    pub default_color_list: Vec<String>,
    pub current_color_position: usize,
    pub volcano_axis: VolcanoAxis,
    pub volcano_plot_dimension: VolcanoDimension,
    pub volcano_plot_title: String,
    #[serde(rename = "backGroundColorGrey")]
    pub background_color_grey: bool,
    pub marker_size: f64,
    pub plot_font_family: String,
    pub text_annotation: IndexMap<String, Value>,
    pub current_comparison: String,
    pub condition_order: Vec<String>,
    pub sample_visible: IndexMap<String, bool>,
    pub fdr_curve_text: String,
    pub fdr_curve_text_enable: bool,
    pub custom_volcano_text_col: String,
    pub selected_map: IndexMap<String, IndexMap<String, bool>>,
    pub select_operation_names: Vec<String>,
}

impl Default for CurtainSettings {
    fn default() -> Self {
        Self {
            p_cutoff: 0.05,
            log2_fc_cutoff: 0.6,
            color_map: IndexMap::new(),
            default_color_list: default_palette(),
            current_color_position: 0,
            volcano_axis: VolcanoAxis::default(),
            volcano_plot_dimension: VolcanoDimension::default(),
            volcano_plot_title: String::new(),
            background_color_grey: false,
            marker_size: 10.0,
            plot_font_family: "Arial".to_string(),
            text_annotation: IndexMap::new(),
            current_comparison: String::new(),
            condition_order: Vec::new(),
            sample_visible: IndexMap::new(),
            fdr_curve_text: String::new(),
            fdr_curve_text_enable: false,
            custom_volcano_text_col: String::new(),
            selected_map: IndexMap::new(),
            select_operation_names: Vec::new(),
        }
    }
}

impl CurtainSettings {
    pub fn palette(&self) -> Vec<String> {
        if self.default_color_list.is_empty() {
            default_palette()
        } else {
            self.default_color_list.clone()
        }
    }

    pub fn allocator(&self) -> AllocatorState {
        AllocatorState {
            cursor: self.current_color_position,
        }
    }

    pub fn stored_selections(&self) -> IndexMap<String, Vec<String>> {
        let mut selections: IndexMap<String, Vec<String>> = self
            .select_operation_names
            .iter()
            .map(|name| (name.clone(), Vec::new()))
            .collect();
        for (primary_id, names) in &self.selected_map {
            for (name, selected) in names {
                if *selected {
                    selections
                        .entry(name.clone())
                        .or_default()
                        .push(primary_id.clone());
                }
            }
        }
        selections
    }
}

/// Settings fields carried by a variant. `None` means "not captured" and
/// leaves the active value alone when applied.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SettingsOverlay {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub p_cutoff: Option<f64>,
    #[serde(rename = "log2FCCutoff", skip_serializing_if = "Option::is_none")]
    pub log2_fc_cutoff: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color_map: Option<IndexMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_color_list: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_color_position: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volcano_axis: Option<VolcanoAxis>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volcano_plot_dimension: Option<VolcanoDimension>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volcano_plot_title: Option<String>,
    #[serde(rename = "backGroundColorGrey", skip_serializing_if = "Option::is_none")]
    pub background_color_grey: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub marker_size: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plot_font_family: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_annotation: Option<IndexMap<String, Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_comparison: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub condition_order: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sample_visible: Option<IndexMap<String, bool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fdr_curve_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fdr_curve_text_enable: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_volcano_text_col: Option<String>,
}

impl SettingsOverlay {
    pub fn full(settings: &CurtainSettings) -> Self {
        Self {
            p_cutoff: Some(settings.p_cutoff),
            log2_fc_cutoff: Some(settings.log2_fc_cutoff),
            color_map: Some(settings.color_map.clone()),
            default_color_list: Some(settings.default_color_list.clone()),
            current_color_position: Some(settings.current_color_position),
            volcano_axis: Some(settings.volcano_axis.clone()),
            volcano_plot_dimension: Some(settings.volcano_plot_dimension.clone()),
            volcano_plot_title: Some(settings.volcano_plot_title.clone()),
            background_color_grey: Some(settings.background_color_grey),
            marker_size: Some(settings.marker_size),
            plot_font_family: Some(settings.plot_font_family.clone()),
            text_annotation: Some(settings.text_annotation.clone()),
            current_comparison: Some(settings.current_comparison.clone()),
            condition_order: Some(settings.condition_order.clone()),
            sample_visible: Some(settings.sample_visible.clone()),
            fdr_curve_text: Some(settings.fdr_curve_text.clone()),
            fdr_curve_text_enable: Some(settings.fdr_curve_text_enable),
            custom_volcano_text_col: Some(settings.custom_volcano_text_col.clone()),
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn merge_into(&self, target: &mut CurtainSettings) {
        if let Some(value) = self.p_cutoff {
            target.p_cutoff = value;
        }
        if let Some(value) = self.log2_fc_cutoff {
            target.log2_fc_cutoff = value;
        }
        if let Some(value) = &self.color_map {
            target.color_map = value.clone();
        }
        if let Some(value) = &self.default_color_list {
            target.default_color_list = value.clone();
        }
        if let Some(value) = self.current_color_position {
            target.current_color_position = value;
        }
        if let Some(value) = &self.volcano_axis {
            target.volcano_axis = value.clone();
        }
        if let Some(value) = &self.volcano_plot_dimension {
            target.volcano_plot_dimension = value.clone();
        }
        if let Some(value) = &self.volcano_plot_title {
            target.volcano_plot_title = value.clone();
        }
        if let Some(value) = self.background_color_grey {
            target.background_color_grey = value;
        }
        if let Some(value) = self.marker_size {
            target.marker_size = value;
        }
        if let Some(value) = &self.plot_font_family {
            target.plot_font_family = value.clone();
        }
        if let Some(value) = &self.text_annotation {
            target.text_annotation = value.clone();
        }
        if let Some(value) = &self.current_comparison {
            target.current_comparison = value.clone();
        }
        if let Some(value) = &self.condition_order {
            target.condition_order = value.clone();
        }
        if let Some(value) = &self.sample_visible {
            target.sample_visible = value.clone();
        }
        if let Some(value) = &self.fdr_curve_text {
            target.fdr_curve_text = value.clone();
        }
        if let Some(value) = self.fdr_curve_text_enable {
            target.fdr_curve_text_enable = value;
        }
        if let Some(value) = &self.custom_volcano_text_col {
            target.custom_volcano_text_col = value.clone();
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SelectionSnapshot {
    pub selected_map: IndexMap<String, IndexMap<String, bool>>,
    pub select_operation_names: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsVariant {
    pub id: String,
    pub curtain_link_id: LinkId,
    pub name: String,
    pub description: Option<String>,
    pub created_at: i64,
    pub is_default: bool,
    pub settings: SettingsOverlay,
    pub selection: Option<SelectionSnapshot>,
}

impl SettingsVariant {
    pub fn partial(link_id: &LinkId, name: &str, settings: SettingsOverlay) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            curtain_link_id: link_id.clone(),
            name: name.to_string(),
            description: None,
            created_at: now_millis(),
            is_default: false,
            settings,
            selection: None,
        }
    }
}

pub fn capture(
    current: &CurtainSettings,
    link_id: &LinkId,
    name: &str,
    description: Option<&str>,
) -> SettingsVariant {
    SettingsVariant {
        id: Uuid::new_v4().to_string(),
        curtain_link_id: link_id.clone(),
        name: name.to_string(),
        description: description.map(|d| d.to_string()),
        created_at: now_millis(),
        is_default: false,
        settings: SettingsOverlay::full(current),
        selection: None,
    }
}

pub fn capture_with_selection(
    current: &CurtainSettings,
    link_id: &LinkId,
    name: &str,
    description: Option<&str>,
) -> SettingsVariant {
    let mut variant = capture(current, link_id, name, description);
    variant.selection = Some(SelectionSnapshot {
        selected_map: current.selected_map.clone(),
        select_operation_names: current.select_operation_names.clone(),
    });
    variant
}

pub fn apply(variant: &SettingsVariant, current: &CurtainSettings) -> CurtainSettings {
    let mut next = current.clone();
    variant.settings.merge_into(&mut next);
    if let Some(selection) = &variant.selection {
        next.selected_map = selection.selected_map.clone();
        next.select_operation_names = selection.select_operation_names.clone();
    }
    next
}
