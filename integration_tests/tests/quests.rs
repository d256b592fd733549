use anyhow::Result;
use mission_core::{
    quest_started_key, EmpireHoldings, FactionMember, FactionRoster, FlagStore, Scenario,
    ScenarioComposer, ScenarioError, Trigger, ACCEPT_QUEST_ACTION,
};
use serde_json::json;

fn sandbox_with_roster(seed: u64) -> Result<Scenario> {
    let composer = ScenarioComposer::builtin();
    let mut scenario = composer.compose("sandbox", seed)?;
    scenario.run_setup()?;
    let world = scenario.context_mut().world_mut();
    world.insert_resource(FactionRoster {
        members: vec![
            FactionMember::new("envoy_vattori", "vattori", 0.1),
            FactionMember::new("envoy_kessari", "kessari", 0.4),
        ],
    });
    world.insert_resource(EmpireHoldings::default());
    Ok(scenario)
}

fn accept_action(kind: &str) -> Trigger {
    let payload = json!({ "kind": kind });
    Trigger::action(
        ACCEPT_QUEST_ACTION,
        payload.as_object().cloned().unwrap_or_default(),
    )
}

#[test]
fn accepted_quest_survives_save_and_load() -> Result<()> {
    let mut scenario = sandbox_with_roster(11)?;
    let offers = scenario
        .quest_board()
        .expect("quest board")
        .offers(scenario.context(), 11);
    let chosen = offers
        .iter()
        .find(|offer| offer.kind.0 == "deliver_food")
        .cloned()
        .expect("vattori offer deliveries");
    assert!(!chosen.valid, "no food is held yet");

    scenario.fire(&accept_action("deliver_food"))?;
    let bytes = scenario.context().flags().to_bytes()?;

    let mut reloaded = sandbox_with_roster(11)?;
    reloaded.load(FlagStore::from_bytes(&bytes)?)?;
    assert!(reloaded
        .context()
        .flags()
        .get_bool_or(&quest_started_key(&chosen.kind), false));

    for seed in [11, 12, 13] {
        let offers = reloaded
            .quest_board()
            .expect("quest board")
            .offers(reloaded.context(), seed);
        assert!(offers.iter().all(|offer| offer.kind != chosen.kind));
    }

    let err = reloaded
        .fire(&accept_action("deliver_food"))
        .expect_err("already started");
    assert!(matches!(err, ScenarioError::QuestAlreadyStarted(_)));
    Ok(())
}

#[test]
fn unknown_quest_kind_is_rejected() -> Result<()> {
    let mut scenario = sandbox_with_roster(2)?;
    let err = scenario
        .fire(&accept_action("slay_dragon"))
        .expect_err("kind is not registered");
    assert!(matches!(err, ScenarioError::UnknownQuestKind(_)));
    assert!(scenario.context().flags().is_empty());
    Ok(())
}
