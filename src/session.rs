use std::collections::HashSet;

use tracing::debug;

use crate::color::{colors_in_use, next_color};
use crate::datastore::ProcessedRow;
use crate::domain::LinkId;
use crate::nearby::{NearbyPoint, find_nearby, find_nearby_at};
use crate::selection::{GroupEngine, OverlayGroup, SearchList, SelectionGroup};
use crate::settings::{self, CurtainSettings, SettingsVariant};
use crate::uniprot::UniprotIndex;
use crate::volcano::{self, VolcanoPoint};

pub struct DatasetSession {
    link_id: LinkId,
    index: UniprotIndex,
    settings: CurtainSettings,
    engine: GroupEngine,
    rows: Vec<ProcessedRow>,
}

impl DatasetSession {
    pub fn new(
        link_id: LinkId,
        index: UniprotIndex,
        settings: CurtainSettings,
        rows: Vec<ProcessedRow>,
    ) -> Self {
        let engine = engine_for(&settings);
        let mut session = Self {
            link_id,
            index,
            settings,
            engine,
            rows,
        };
        session.assign_significance_colors();
        session
    }

    pub fn link_id(&self) -> &LinkId {
        &self.link_id
    }

    pub fn index(&self) -> &UniprotIndex {
        &self.index
    }

    pub fn settings(&self) -> &CurtainSettings {
        &self.settings
    }

    pub fn engine(&self) -> &GroupEngine {
        &self.engine
    }

    pub fn rows(&self) -> &[ProcessedRow] {
        &self.rows
    }

    pub fn load_selection_groups(&mut self, groups: &[SelectionGroup]) {
        for group in groups {
            let stored = self.add_group(OverlayGroup::from(group));
            self.engine.set_active(&stored.id, group.is_active);
        }
    }

    pub fn load_search_lists(&mut self, lists: &[SearchList], active: bool) {
        for list in lists {
            let color = self.settings.color_map.get(&list.name).cloned();
            let stored = self.add_group(OverlayGroup::from_search_list(list, color.as_deref()));
            self.settings
                .color_map
                .insert(stored.name.clone(), stored.color.clone());
            self.engine.set_active(&stored.id, active);
        }
    }

    pub fn add_group(&mut self, candidate: OverlayGroup) -> OverlayGroup {
        let stored = self.engine.add_group(candidate);
        self.settings.current_color_position = self.engine.allocator().cursor;
        stored
    }

    pub fn remove_group(&mut self, id: &str) -> Option<OverlayGroup> {
        self.engine.remove_group(id)
    }

    pub fn toggle_active(&mut self, key: &str) -> bool {
        self.engine.toggle_active(key)
    }

    pub fn filtered_proteins(&self) -> Vec<String> {
        self.engine
            .filtered_proteins(&self.settings.stored_selections())
    }

    pub fn active_comparison(&self) -> Option<&str> {
        let current = self.settings.current_comparison.as_str();
        if !current.is_empty() && self.rows.iter().any(|row| row.comparison == current) {
            return Some(current);
        }
        self.rows.first().map(|row| row.comparison.as_str())
    }

    pub fn points(&self) -> Vec<VolcanoPoint> {
        let rows = match self.active_comparison() {
            Some(comparison) => self
                .rows
                .iter()
                .filter(|row| row.comparison == comparison)
                .cloned()
                .collect::<Vec<_>>(),
            None => Vec::new(),
        };
        volcano::build_points(&rows, &self.index, &self.engine, &self.settings)
    }

    pub fn visible_points(&self) -> Vec<VolcanoPoint> {
        volcano::filter_points(self.points(), &self.filtered_proteins())
    }

    pub fn nearby(&self, point_id: &str, cutoff: f64) -> Vec<NearbyPoint> {
        let points = self
            .points()
            .iter()
            .map(VolcanoPoint::plot_point)
            .collect::<Vec<_>>();
        match points.iter().find(|point| point.id == point_id) {
            Some(center) => find_nearby(center, &points, cutoff),
            None => Vec::new(),
        }
    }

    pub fn nearby_at(&self, x: f64, y: f64, cutoff: f64) -> Vec<NearbyPoint> {
        let points = self
            .points()
            .iter()
            .map(VolcanoPoint::plot_point)
            .collect::<Vec<_>>();
        find_nearby_at(x, y, &points, cutoff)
    }

    pub fn capture_variant(
        &self,
        name: &str,
        description: Option<&str>,
        include_selection: bool,
    ) -> SettingsVariant {
        if include_selection {
            settings::capture_with_selection(&self.settings, &self.link_id, name, description)
        } else {
            settings::capture(&self.settings, &self.link_id, name, description)
        }
    }

    pub fn apply_variant(&mut self, variant: &SettingsVariant) {
        self.settings = settings::apply(variant, &self.settings);
        debug!(link_id = %self.link_id, variant = %variant.name, "applied settings variant");
        self.assign_significance_colors();
    }

    pub fn replace_settings(&mut self, settings: CurtainSettings) {
        self.settings = settings;
        self.assign_significance_colors();
    }

    fn assign_significance_colors(&mut self) {
        let palette = self.settings.palette();
        let conditions: HashSet<String> = self.settings.condition_order.iter().cloned().collect();
        let mut state = self.settings.allocator();
        for bucket in volcano::significance_groups(&self.settings) {
            if self.settings.color_map.contains_key(&bucket) {
                continue;
            }
            let in_use = colors_in_use(
                self.settings
                    .color_map
                    .iter()
                    .map(|(name, color)| (name.as_str(), color.as_str())),
                &conditions,
            );
            let (color, next) = next_color(state, &palette, &in_use);
            state = next;
            self.settings.color_map.insert(bucket, color);
        }
        self.settings.current_color_position = state.cursor;
        self.engine = rebuild_engine(&self.engine, &self.settings);
    }
}

fn engine_for(settings: &CurtainSettings) -> GroupEngine {
    GroupEngine::new(settings.palette())
        .with_allocator(settings.allocator())
        .with_conditions(settings.condition_order.iter().cloned())
        .with_external_colors(settings.color_map.clone())
}

fn rebuild_engine(previous: &GroupEngine, settings: &CurtainSettings) -> GroupEngine {
    let mut engine = engine_for(settings);
    for group in previous.groups() {
        engine.add_group(group.clone());
    }
    for key in previous.active_keys() {
        engine.set_active(key, true);
    }
    engine
}
