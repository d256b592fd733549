use mission_core::{EmpireStats, ScenarioComposer, Trigger};

#[test]
fn excluding_empire_size_installs_four_rules() {
    let composer = ScenarioComposer::builtin();
    let mut scenario = composer.compose("quickstart", 5).expect("quickstart composes");
    scenario.run_setup().expect("setup runs");
    assert_eq!(
        scenario.installed_rules(),
        vec!["planets", "political_power", "unfinished_quests", "happiness"]
    );

    scenario.fire(&Trigger::GameLoaded).expect("load runs");
    assert_eq!(scenario.installed_rules().len(), 4);
}

#[test]
fn frontier_replaces_empire_size_and_drops_happiness() {
    let composer = ScenarioComposer::builtin();
    let mut scenario = composer.compose("frontier", 5).expect("frontier composes");
    scenario.run_setup().expect("setup runs");

    let rules = scenario.scoring_rules();
    let summary: Vec<(&str, &str)> = rules.iter().map(|rule| (rule.name(), rule.variant())).collect();
    assert_eq!(
        summary,
        vec![
            ("planets", "standard"),
            ("political_power", "standard"),
            ("empire_size", "frontier_sprawl"),
            ("unfinished_quests", "standard"),
        ]
    );

    let breakdown = scenario.score(&EmpireStats {
        planets: 9,
        political_power: 12,
        unfinished_quests: 2,
        happiness: 40,
    });
    assert_eq!(breakdown.lines.len(), 4);
    assert_eq!(breakdown.total, 90 + 12 + 45 - 50);
}
