use assert_matches::assert_matches;
use serde_json::json;

use curtain_core::domain::LinkId;
use curtain_core::error::CurtainError;
use curtain_core::settings::{
    self, CurtainSettings, SettingsOverlay, SettingsVariant, capture, capture_with_selection,
};
use curtain_core::userdata::UserDataStore;

fn link() -> LinkId {
    "settings-test".parse().unwrap()
}

fn customised() -> CurtainSettings {
    let mut settings = CurtainSettings::default();
    settings.p_cutoff = 0.05;
    settings.log2_fc_cutoff = 1.5;
    settings.marker_size = 14.0;
    settings.volcano_plot_title = "My plot".to_string();
    settings
        .color_map
        .insert("Kinases".to_string(), "#123456".to_string());
    settings
}

#[test]
fn partial_overlay_only_touches_present_fields() {
    let overlay = SettingsOverlay {
        p_cutoff: Some(0.01),
        ..SettingsOverlay::default()
    };
    let variant = SettingsVariant::partial(&link(), "strict", overlay);
    let current = customised();

    let applied = settings::apply(&variant, &current);
    assert_eq!(applied.p_cutoff, 0.01);
    assert_eq!(applied.log2_fc_cutoff, 1.5);
    assert_eq!(applied.marker_size, 14.0);
    assert_eq!(applied.volcano_plot_title, "My plot");
    assert_eq!(applied.color_map, current.color_map);
}

#[test]
fn partial_overlay_serializes_only_present_fields() {
    let overlay = SettingsOverlay {
        p_cutoff: Some(0.01),
        ..SettingsOverlay::default()
    };
    assert_eq!(serde_json::to_value(&overlay).unwrap(), json!({"pCutoff": 0.01}));

    let parsed: SettingsOverlay =
        serde_json::from_value(json!({"log2FCCutoff": 2.0, "backGroundColorGrey": true})).unwrap();
    assert_eq!(parsed.log2_fc_cutoff, Some(2.0));
    assert_eq!(parsed.background_color_grey, Some(true));
    assert_eq!(parsed.p_cutoff, None);
    assert!(!parsed.is_empty());
    assert!(SettingsOverlay::default().is_empty());
}

#[test]
fn full_capture_round_trips() {
    let current = customised();
    let variant = capture(&current, &link(), "snapshot", Some("all fields"));
    let applied = settings::apply(&variant, &CurtainSettings::default());
    assert_eq!(applied, current);
    assert!(variant.selection.is_none());
}

#[test]
fn selection_is_only_restored_when_captured() {
    let mut current = customised();
    current
        .selected_map
        .entry("P12345".to_string())
        .or_default()
        .insert("Hits".to_string(), true);
    current.select_operation_names.push("Hits".to_string());

    let with = capture_with_selection(&current, &link(), "with", None);
    let without = capture(&current, &link(), "without", None);

    let applied = settings::apply(&with, &CurtainSettings::default());
    assert_eq!(applied.select_operation_names, vec!["Hits"]);
    assert_eq!(
        applied.stored_selections().get("Hits"),
        Some(&vec!["P12345".to_string()])
    );

    let applied = settings::apply(&without, &CurtainSettings::default());
    assert!(applied.select_operation_names.is_empty());
}

#[test]
fn only_one_default_variant_per_dataset() {
    let store = UserDataStore::open_in_memory().unwrap();
    let other: LinkId = "another-dataset".parse().unwrap();

    let mut first = capture(&customised(), &link(), "first", None);
    first.is_default = true;
    store.save_variant(&first).unwrap();

    let mut elsewhere = capture(&customised(), &other, "elsewhere", None);
    elsewhere.is_default = true;
    store.save_variant(&elsewhere).unwrap();

    let mut second = capture(&customised(), &link(), "second", None);
    second.is_default = true;
    store.save_variant(&second).unwrap();

    let defaults = store
        .variants(&link())
        .unwrap()
        .into_iter()
        .filter(|v| v.is_default)
        .map(|v| v.id)
        .collect::<Vec<_>>();
    assert_eq!(defaults, vec![second.id.clone()]);

    store.set_default_variant(&link(), &first.id).unwrap();
    assert_eq!(store.default_variant(&link()).unwrap().unwrap().id, first.id);
    assert_eq!(
        store.variants(&link()).unwrap().iter().filter(|v| v.is_default).count(),
        1
    );
    assert_eq!(store.default_variant(&other).unwrap().unwrap().id, elsewhere.id);

    assert_matches!(
        store.set_default_variant(&link(), "missing"),
        Err(CurtainError::VariantNotFound(_))
    );
    // a failed switch keeps the previous default
    assert_eq!(store.default_variant(&link()).unwrap().unwrap().id, first.id);

    store.clear_default_variant(&link()).unwrap();
    assert!(store.default_variant(&link()).unwrap().is_none());
}

#[test]
fn stored_variants_keep_partial_overlays() {
    let store = UserDataStore::open_in_memory().unwrap();
    let overlay = SettingsOverlay {
        p_cutoff: Some(0.001),
        ..SettingsOverlay::default()
    };
    let variant = SettingsVariant::partial(&link(), "strict", overlay);
    store.save_variant(&variant).unwrap();

    let loaded = store.variant(&variant.id).unwrap().unwrap();
    assert_eq!(loaded, variant);
    assert!(store.delete_variant(&variant.id).unwrap());
    assert!(store.variant(&variant.id).unwrap().is_none());
}
