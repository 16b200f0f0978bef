use std::collections::HashSet;

use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::color::{AllocatorState, colors_in_use, next_color};
use crate::domain::{LinkId, SearchType, now_millis};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectionGroup {
    pub id: String,
    pub curtain_link_id: LinkId,
    pub name: String,
    pub color: String,
    pub proteins: Vec<String>,
    pub is_active: bool,
    pub created_at: i64,
    pub modified_at: i64,
}

impl SelectionGroup {
    pub fn new(link_id: &LinkId, name: &str, color: &str, proteins: Vec<String>) -> Self {
        let now = now_millis();
        Self {
            id: Uuid::new_v4().to_string(),
            curtain_link_id: link_id.clone(),
            name: name.to_string(),
            color: color.to_string(),
            proteins: dedup_preserving(proteins),
            is_active: true,
            created_at: now,
            modified_at: now,
        }
    }

    pub fn add_proteins<I: IntoIterator<Item = String>>(&mut self, proteins: I) {
        let mut seen: HashSet<String> = self.proteins.iter().cloned().collect();
        for protein in proteins {
            if seen.insert(protein.clone()) {
                self.proteins.push(protein);
            }
        }
        self.touch();
    }

    pub fn remove_proteins(&mut self, proteins: &[String]) {
        self.proteins.retain(|protein| !proteins.contains(protein));
        self.touch();
    }

    pub fn rename(&mut self, name: &str) {
        self.name = name.to_string();
        self.touch();
    }

    pub fn recolor(&mut self, color: &str) {
        self.color = color.to_string();
        self.touch();
    }

    pub fn set_active(&mut self, active: bool) {
        self.is_active = active;
        self.touch();
    }

    fn touch(&mut self) {
        self.modified_at = now_millis().max(self.modified_at);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchList {
    pub id: String,
    pub curtain_link_id: LinkId,
    pub name: String,
    pub description: Option<String>,
    pub proteins: Vec<String>,
    pub search_type: SearchType,
    pub created_at: i64,
    pub modified_at: i64,
}

impl SearchList {
    pub fn new(
        link_id: &LinkId,
        name: &str,
        description: Option<&str>,
        proteins: Vec<String>,
        search_type: SearchType,
    ) -> Self {
        let now = now_millis();
        Self {
            id: Uuid::new_v4().to_string(),
            curtain_link_id: link_id.clone(),
            name: name.to_string(),
            description: description.map(|d| d.to_string()),
            proteins: dedup_preserving(proteins),
            search_type,
            created_at: now,
            modified_at: now,
        }
    }

    pub fn replace_proteins(&mut self, proteins: Vec<String>) {
        self.proteins = dedup_preserving(proteins);
        self.modified_at = now_millis().max(self.modified_at);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OverlayGroup {
    pub id: String,
    pub name: String,
    pub color: String,
    pub proteins: Vec<String>,
}

impl OverlayGroup {
    pub fn new(id: &str, name: &str, color: &str, proteins: Vec<String>) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            color: color.to_string(),
            proteins,
        }
    }

    pub fn from_search_list(list: &SearchList, color: Option<&str>) -> Self {
        Self::new(&list.id, &list.name, color.unwrap_or(""), list.proteins.clone())
    }
}

impl From<&SelectionGroup> for OverlayGroup {
    fn from(group: &SelectionGroup) -> Self {
        Self::new(&group.id, &group.name, &group.color, group.proteins.clone())
    }
}

#[derive(Debug, Clone)]
pub struct GroupEngine {
    palette: Vec<String>,
    allocator: AllocatorState,
    conditions: HashSet<String>,
    external_colors: IndexMap<String, String>,
    groups: Vec<OverlayGroup>,
    active: IndexSet<String>,
}

impl GroupEngine {
    pub fn new(palette: Vec<String>) -> Self {
        Self {
            palette,
            allocator: AllocatorState::default(),
            conditions: HashSet::new(),
            external_colors: IndexMap::new(),
            groups: Vec::new(),
            active: IndexSet::new(),
        }
    }

    pub fn with_allocator(mut self, allocator: AllocatorState) -> Self {
        self.allocator = allocator;
        self
    }

    pub fn with_conditions<I: IntoIterator<Item = String>>(mut self, conditions: I) -> Self {
        self.conditions = conditions.into_iter().collect();
        self
    }

    pub fn with_external_colors(mut self, colors: IndexMap<String, String>) -> Self {
        self.external_colors = colors;
        self
    }

    pub fn allocator(&self) -> AllocatorState {
        self.allocator
    }

    pub fn groups(&self) -> &[OverlayGroup] {
        &self.groups
    }

    pub fn group(&self, id: &str) -> Option<&OverlayGroup> {
        self.groups.iter().find(|group| group.id == id)
    }

    pub fn is_active(&self, key: &str) -> bool {
        self.active.contains(key)
    }

    pub fn active_keys(&self) -> impl Iterator<Item = &str> {
        self.active.iter().map(String::as_str)
    }

    pub fn add_group(&mut self, mut candidate: OverlayGroup) -> OverlayGroup {
        if candidate.color.trim().is_empty() {
            let in_use = self.colors_in_use();
            let (color, allocator) = next_color(self.allocator, &self.palette, &in_use);
            candidate.color = color;
            self.allocator = allocator;
        }
        self.groups.push(candidate.clone());
        candidate
    }

    pub fn remove_group(&mut self, id: &str) -> Option<OverlayGroup> {
        self.active.shift_remove(id);
        let position = self.groups.iter().position(|group| group.id == id)?;
        Some(self.groups.remove(position))
    }

    pub fn toggle_active(&mut self, key: &str) -> bool {
        if self.active.shift_remove(key) {
            false
        } else {
            self.active.insert(key.to_string());
            true
        }
    }

    pub fn set_active(&mut self, key: &str, active: bool) {
        if active {
            self.active.insert(key.to_string());
        } else {
            self.active.shift_remove(key);
        }
    }

    pub fn set_color(&mut self, id: &str, color: &str) -> bool {
        match self.groups.iter_mut().find(|group| group.id == id) {
            Some(group) => {
                group.color = color.to_string();
                true
            }
            None => false,
        }
    }

    pub fn rename(&mut self, id: &str, name: &str) -> bool {
        match self.groups.iter_mut().find(|group| group.id == id) {
            Some(group) => {
                group.name = name.to_string();
                true
            }
            None => false,
        }
    }

    /// An empty result means no filter is active and the caller shows the
    /// whole dataset.
    pub fn filtered_proteins(&self, stored_selections: &IndexMap<String, Vec<String>>) -> Vec<String> {
        let mut union: IndexSet<String> = IndexSet::new();
        for group in self.groups.iter().filter(|group| self.active.contains(&group.id)) {
            union.extend(group.proteins.iter().cloned());
        }
        for (name, proteins) in stored_selections {
            if self.active.contains(name) {
                union.extend(proteins.iter().cloned());
            }
        }
        union.into_iter().collect()
    }

    pub fn groups_for_protein(&self, protein: &str) -> Vec<String> {
        self.groups
            .iter()
            .filter(|group| group.proteins.iter().any(|p| p == protein))
            .map(|group| group.name.clone())
            .collect()
    }

    pub fn color_for_protein(&self, protein: &str) -> Option<&str> {
        self.groups
            .iter()
            .filter(|group| self.active.contains(&group.id))
            .find(|group| group.proteins.iter().any(|p| p == protein))
            .map(|group| group.color.as_str())
    }

    fn colors_in_use(&self) -> HashSet<String> {
        let entries = self
            .groups
            .iter()
            .map(|group| (group.name.as_str(), group.color.as_str()))
            .chain(
                self.external_colors
                    .iter()
                    .map(|(name, color)| (name.as_str(), color.as_str())),
            );
        colors_in_use(entries, &self.conditions)
    }
}

fn dedup_preserving(proteins: Vec<String>) -> Vec<String> {
    let set: IndexSet<String> = proteins.into_iter().collect();
    set.into_iter().collect()
}
