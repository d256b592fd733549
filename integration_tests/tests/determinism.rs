use mission_core::{
    EmpireHoldings, FactionMember, FactionRoster, MapLayoutSpec, QuestOffer, ScenarioComposer,
};

fn run_mission(seed: u64) -> (MapLayoutSpec, Vec<QuestOffer>) {
    let composer = ScenarioComposer::builtin();
    let mut scenario = composer.compose("sandbox", seed).expect("sandbox composes");
    scenario.run_setup().expect("setup runs");

    let world = scenario.context_mut().world_mut();
    world.insert_resource(FactionRoster {
        members: vec![
            FactionMember::new("envoy_vattori", "vattori", 0.2),
            FactionMember::new("envoy_kessari", "kessari", 0.6),
            FactionMember::new("envoy_oruun", "oruun", 0.5),
        ],
    });
    let mut holdings = EmpireHoldings::default();
    holdings.resources.insert("food".to_string());
    holdings.planet_kinds.insert("desert".to_string());
    world.insert_resource(holdings);

    let layout = scenario.layout().cloned().expect("layout generated");
    let offers = scenario
        .quest_board()
        .expect("sandbox has a quest board")
        .offers(scenario.context(), seed);
    (layout, offers)
}

#[test]
fn identical_seeds_reproduce_layout_and_offers() {
    let (layout_a, offers_a) = run_mission(42);
    let (layout_b, offers_b) = run_mission(42);

    assert_eq!(layout_a, layout_b);
    assert_eq!(offers_a, offers_b);
    assert!(!offers_a.is_empty());
}

#[test]
fn different_seeds_diverge() {
    let (layout_a, _) = run_mission(42);
    let (layout_b, _) = run_mission(43);
    assert_ne!(layout_a.centers, layout_b.centers);
}
