use std::collections::HashSet;

use indexmap::IndexMap;

use curtain_core::color::{AllocatorState, DEFAULT_PALETTE, colors_in_use, default_palette, next_color};
use curtain_core::domain::{LinkId, SearchType};
use curtain_core::selection::{GroupEngine, OverlayGroup, SearchList, SelectionGroup};

fn proteins(ids: &[&str]) -> Vec<String> {
    ids.iter().map(|id| id.to_string()).collect()
}

#[test]
fn allocation_is_deterministic() {
    let mut engine = GroupEngine::new(default_palette());
    let a = engine.add_group(OverlayGroup::new("a", "A", "", proteins(&["P1"])));
    let b = engine.add_group(OverlayGroup::new("b", "B", "", proteins(&["P2"])));
    let c = engine.add_group(OverlayGroup::new("c", "C", "", proteins(&["P3"])));

    assert_eq!(a.color, DEFAULT_PALETTE[0]);
    assert_eq!(b.color, DEFAULT_PALETTE[1]);
    assert_eq!(c.color, DEFAULT_PALETTE[2]);
    assert_eq!(engine.allocator(), AllocatorState { cursor: 3 });
}

#[test]
fn allocation_skips_colors_in_use() {
    let palette = default_palette();
    let in_use: HashSet<String> = [DEFAULT_PALETTE[0].to_uppercase(), DEFAULT_PALETTE[1].to_string()]
        .into_iter()
        .map(|c| c.to_lowercase())
        .collect();
    let (color, state) = next_color(AllocatorState::default(), &palette, &in_use);
    assert_eq!(color, DEFAULT_PALETTE[2]);
    assert_eq!(state.cursor, 3);
}

#[test]
fn explicit_colors_are_kept_and_block_the_palette() {
    let mut engine = GroupEngine::new(default_palette());
    engine.add_group(OverlayGroup::new("x", "X", DEFAULT_PALETTE[0], proteins(&["P1"])));
    let next = engine.add_group(OverlayGroup::new("y", "Y", "", proteins(&["P2"])));
    assert_eq!(next.color, DEFAULT_PALETTE[1]);
}

#[test]
fn condition_colors_do_not_block() {
    let conditions: HashSet<String> = ["Control".to_string()].into();
    let used = colors_in_use(
        [("Control", DEFAULT_PALETTE[0]), ("Group", DEFAULT_PALETTE[1])],
        &conditions,
    );
    assert_eq!(used, [DEFAULT_PALETTE[1].to_string()].into());

    let mut external = IndexMap::new();
    external.insert("Control".to_string(), DEFAULT_PALETTE[0].to_string());
    let mut engine = GroupEngine::new(default_palette())
        .with_conditions(["Control".to_string()])
        .with_external_colors(external);
    let group = engine.add_group(OverlayGroup::new("g", "G", "", proteins(&["P1"])));
    assert_eq!(group.color, DEFAULT_PALETTE[0]);
}

#[test]
fn filtered_proteins_is_the_ordered_union_of_active_sources() {
    let mut engine = GroupEngine::new(default_palette());
    engine.add_group(OverlayGroup::new("g1", "G1", "", proteins(&["P3", "P1"])));
    engine.add_group(OverlayGroup::new("g2", "G2", "", proteins(&["P1", "P2"])));
    engine.add_group(OverlayGroup::new("g3", "G3", "", proteins(&["P9"])));

    let mut stored = IndexMap::new();
    stored.insert("Saved".to_string(), proteins(&["P2", "P4"]));
    stored.insert("Other".to_string(), proteins(&["P8"]));

    assert!(engine.filtered_proteins(&stored).is_empty());

    assert!(engine.toggle_active("g1"));
    assert!(engine.toggle_active("g2"));
    engine.set_active("Saved", true);
    assert_eq!(
        engine.filtered_proteins(&stored),
        proteins(&["P3", "P1", "P2", "P4"])
    );

    assert!(!engine.toggle_active("g1"));
    assert_eq!(engine.filtered_proteins(&stored), proteins(&["P1", "P2", "P4"]));

    engine.remove_group("g2");
    assert!(!engine.is_active("g2"));
    assert_eq!(engine.filtered_proteins(&stored), proteins(&["P2", "P4"]));
}

#[test]
fn protein_membership_and_color() {
    let mut engine = GroupEngine::new(default_palette());
    let first = engine.add_group(OverlayGroup::new("g1", "First", "", proteins(&["P1"])));
    engine.add_group(OverlayGroup::new("g2", "Second", "", proteins(&["P1", "P2"])));

    assert_eq!(engine.groups_for_protein("P1"), vec!["First", "Second"]);
    assert_eq!(engine.color_for_protein("P1"), None);
    engine.set_active("g1", true);
    assert_eq!(engine.color_for_protein("P1"), Some(first.color.as_str()));

    assert!(engine.set_color("g1", "#000000"));
    assert_eq!(engine.color_for_protein("P1"), Some("#000000"));
    assert!(engine.rename("g1", "Renamed"));
    assert_eq!(engine.group("g1").unwrap().name, "Renamed");
    assert!(!engine.rename("missing", "x"));
}

#[test]
fn selection_group_edits() {
    let link: LinkId = "sel".parse().unwrap();
    let mut group = SelectionGroup::new(&link, "Hits", "#fd7f6f", proteins(&["P1", "P1", "P2"]));
    assert_eq!(group.proteins, proteins(&["P1", "P2"]));
    assert!(group.is_active);

    group.add_proteins(proteins(&["P2", "P3"]));
    group.remove_proteins(&proteins(&["P1"]));
    assert_eq!(group.proteins, proteins(&["P2", "P3"]));
    assert!(group.modified_at >= group.created_at);

    let list = SearchList::new(&link, "Batch", None, proteins(&["P5", "P5"]), SearchType::Batch);
    assert_eq!(list.proteins, proteins(&["P5"]));
    let overlay = OverlayGroup::from_search_list(&list, None);
    assert_eq!(overlay.id, list.id);
    assert!(overlay.color.is_empty());
}
