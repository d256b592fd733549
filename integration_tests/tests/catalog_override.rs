mod common;

use mission_core::{load_mission_catalog_from_env, ScenarioComposer, COMPACT_REALM};
use mission_core::{EmpireSizeProvider, ScoringRule};

#[test]
fn catalog_path_override_is_honoured() {
    common::ensure_test_catalog();

    let (catalog, source) = load_mission_catalog_from_env();
    assert_eq!(
        source.path(),
        Some(common::fixture_path("test_mission_catalog.json").as_path())
    );
    let ids: Vec<&str> = catalog.ids().collect();
    assert_eq!(ids, vec!["trial_layout", "trial_compact"]);

    let composer = ScenarioComposer::from_env();
    let mut scenario = composer
        .compose("trial_layout", 42)
        .expect("fixture mission composes");
    scenario.run_setup().expect("setup runs");
    assert_eq!(scenario.installed_rules().len(), 4);
    assert_eq!(scenario.layout().map(|layout| layout.centers.len()), Some(4));

    let mut compact = composer
        .compose("trial_compact", 42)
        .expect("fixture mission composes");
    compact.run_setup().expect("setup runs");
    let expected = COMPACT_REALM.empire_size_rule();
    let variants: Vec<String> = compact
        .scoring_rules()
        .iter()
        .filter(|rule| rule.kind() == expected.kind())
        .map(|rule| rule.variant().to_string())
        .collect();
    assert_eq!(variants, vec![expected.variant().to_string()]);
}
