use std::any::Any;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

use bevy_ecs::prelude::*;
use mission_runtime::{
    FactionMember, MissionRng, QuestDetail, QuestKindId, QuestOffer, RaceId, RngFactory, Trigger,
    TriggerKind,
};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::{
    context::ScenarioContext,
    error::ScenarioError,
    module::{Activation, ConditionModule},
};

pub const BUILTIN_QUEST_KINDS: &str = include_str!("data/quest_kinds.json");
pub const QUEST_STARTED_PREFIX: &str = "quest_started_";
pub const ACCEPT_QUEST_ACTION: &str = "accept_quest";

/// Flag key recording that `kind` has been started in this save.
pub fn quest_started_key(kind: &QuestKindId) -> String {
    format!("{QUEST_STARTED_PREFIX}{kind}")
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestKindDefinition {
    pub id: QuestKindId,
    pub race: RaceId,
    pub rule: QuestRule,
}

/// How a candidate's detail is rolled and when it is valid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum QuestRule {
    /// Valid while the empire holds `resource`.
    Deliver {
        resource: String,
        amount: [u32; 2],
        reward_per_unit: u32,
    },
    /// Valid while the empire holds a planet of kind `planet`.
    Settle {
        planet: String,
        count: [u32; 2],
        reward: u32,
    },
    /// Valid until the tier reaches `min_tier`.
    Research { min_tier: u8, reward: u32 },
}

fn roll(rng: &mut MissionRng, [a, b]: [u32; 2]) -> u32 {
    let (low, high) = if a <= b { (a, b) } else { (b, a) };
    rng.gen_range(low..=high)
}

impl QuestRule {
    pub fn construct(
        &self,
        rng: &mut MissionRng,
        holdings: &EmpireHoldings,
        tier: u8,
    ) -> (bool, QuestDetail) {
        match self {
            QuestRule::Deliver {
                resource,
                amount,
                reward_per_unit,
            } => {
                let amount = roll(rng, *amount);
                (
                    holdings.resources.contains(resource),
                    QuestDetail {
                        target: resource.clone(),
                        amount,
                        reward: amount.saturating_mul(*reward_per_unit),
                    },
                )
            }
            QuestRule::Settle {
                planet,
                count,
                reward,
            } => {
                let count = roll(rng, *count);
                (
                    holdings.planet_kinds.contains(planet),
                    QuestDetail {
                        target: planet.clone(),
                        amount: count,
                        reward: reward.saturating_mul(count),
                    },
                )
            }
            QuestRule::Research { min_tier, reward } => (
                tier < *min_tier,
                QuestDetail {
                    target: format!("tier_{min_tier}"),
                    amount: u32::from(min_tier.saturating_sub(tier)),
                    reward: *reward,
                },
            ),
        }
    }
}

#[derive(Debug, Deserialize)]
struct QuestKindsFile {
    kinds: Vec<QuestKindDefinition>,
}

/// Quest kinds grouped by the race that offers them.
#[derive(Debug, Clone, Default)]
pub struct QuestRegistry {
    by_race: BTreeMap<RaceId, Vec<QuestKindDefinition>>,
}

impl QuestRegistry {
    pub fn builtin() -> Self {
        Self::from_json_str(BUILTIN_QUEST_KINDS).expect("builtin quest kinds should parse")
    }

    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        let file: QuestKindsFile = serde_json::from_str(json)?;
        let mut registry = Self::default();
        for definition in file.kinds {
            registry.register(definition);
        }
        Ok(registry)
    }

    pub fn register(&mut self, definition: QuestKindDefinition) {
        self.by_race
            .entry(definition.race.clone())
            .or_default()
            .push(definition);
    }

    pub fn kinds_for(&self, race: &RaceId) -> &[QuestKindDefinition] {
        self.by_race.get(race).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn find(&self, kind: &QuestKindId) -> Option<&QuestKindDefinition> {
        self.by_race
            .values()
            .flatten()
            .find(|definition| &definition.id == kind)
    }

    pub fn races(&self) -> impl Iterator<Item = &RaceId> {
        self.by_race.keys()
    }

    pub fn len(&self) -> usize {
        self.by_race.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Faction members as last reported by the host.
#[derive(Resource, Debug, Clone, Default)]
pub struct FactionRoster {
    pub members: Vec<FactionMember>,
}

/// What the empire currently owns, for quest validity checks.
#[derive(Resource, Debug, Clone, Default)]
pub struct EmpireHoldings {
    pub resources: BTreeSet<String>,
    pub planet_kinds: BTreeSet<String>,
}

/// Decides whether an offer round happens at all.
pub trait OfferPolicy: fmt::Debug {
    fn allows_offers(&self, members: &[FactionMember]) -> bool;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysOffer;

impl OfferPolicy for AlwaysOffer {
    fn allows_offers(&self, _members: &[FactionMember]) -> bool {
        true
    }
}

/// Vetoes offers while every active member is at or above `threshold`.
#[derive(Debug, Clone, Copy)]
pub struct SuppressWhenContent {
    pub threshold: f32,
}

impl OfferPolicy for SuppressWhenContent {
    fn allows_offers(&self, members: &[FactionMember]) -> bool {
        let mut active = members.iter().filter(|member| member.active).peekable();
        if active.peek().is_none() {
            return true;
        }
        active.any(|member| member.satisfaction < self.threshold)
    }
}

#[derive(Debug)]
pub struct QuestOfferGenerator {
    registry: Arc<QuestRegistry>,
    policy: Box<dyn OfferPolicy>,
}

impl QuestOfferGenerator {
    pub fn new(registry: Arc<QuestRegistry>) -> Self {
        Self {
            registry,
            policy: Box::new(AlwaysOffer),
        }
    }

    pub fn with_policy(mut self, policy: impl OfferPolicy + 'static) -> Self {
        self.policy = Box::new(policy);
        self
    }

    pub fn registry(&self) -> &QuestRegistry {
        &self.registry
    }

    /// Candidates for every active member and every kind its race offers,
    /// minus kinds already started. Invalid candidates are included and
    /// marked.
    pub fn generate(&self, ctx: &ScenarioContext, seed: u64) -> Vec<QuestOffer> {
        let members = ctx
            .world()
            .get_resource::<FactionRoster>()
            .map(|roster| roster.members.as_slice())
            .unwrap_or(&[]);
        if !self.policy.allows_offers(members) {
            tracing::info!(target: "mission::quests", seed, "quests.offers.vetoed");
            return Vec::new();
        }

        let empty = EmpireHoldings::default();
        let holdings = ctx
            .world()
            .get_resource::<EmpireHoldings>()
            .unwrap_or(&empty);
        let tier = ctx.tech_tier();
        let flags = ctx.flags();
        let factory = RngFactory::new(seed);

        let mut offers = Vec::new();
        for member in members.iter().filter(|member| member.active) {
            for definition in self.registry.kinds_for(&member.race) {
                if flags.get_bool_or(&quest_started_key(&definition.id), false) {
                    tracing::trace!(
                        target: "mission::quests",
                        kind = %definition.id,
                        "quests.offer.already_started"
                    );
                    continue;
                }
                let mut rng = factory.rng(&format!(
                    "quest:{}:{}:{}",
                    member.race, member.id, definition.id
                ));
                let (valid, detail) = definition.rule.construct(&mut rng, holdings, tier);
                offers.push(QuestOffer {
                    member: member.id.clone(),
                    race: member.race.clone(),
                    kind: definition.id.clone(),
                    valid,
                    detail,
                });
            }
        }
        tracing::debug!(
            target: "mission::quests",
            seed,
            offers = offers.len(),
            valid = offers.iter().filter(|offer| offer.valid).count(),
            "quests.offers.generated"
        );
        offers
    }

    pub fn accept(&self, ctx: &mut ScenarioContext, offer: &QuestOffer) -> Result<(), ScenarioError> {
        self.accept_kind(ctx, &offer.kind)
    }

    /// Records `kind` as started. The flag is written before this returns.
    pub fn accept_kind(
        &self,
        ctx: &mut ScenarioContext,
        kind: &QuestKindId,
    ) -> Result<(), ScenarioError> {
        if self.registry.find(kind).is_none() {
            return Err(ScenarioError::UnknownQuestKind(kind.to_string()));
        }
        let key = quest_started_key(kind);
        if ctx.flags().get_bool_or(&key, false) {
            return Err(ScenarioError::QuestAlreadyStarted(kind.to_string()));
        }
        ctx.flags_mut().set(key, true);
        tracing::info!(target: "mission::quests", kind = %kind, "quests.offer.accepted");
        Ok(())
    }
}

/// Condition module exposing quest offers and routing `accept_quest` actions.
#[derive(Debug)]
pub struct QuestBoard {
    generator: Rc<QuestOfferGenerator>,
    activation: Activation,
}

impl QuestBoard {
    pub const KIND: &'static str = "quest_board";

    pub fn new(generator: QuestOfferGenerator) -> Self {
        Self {
            generator: Rc::new(generator),
            activation: Activation::default(),
        }
    }

    pub fn generator(&self) -> &QuestOfferGenerator {
        &self.generator
    }

    pub fn offers(&self, ctx: &ScenarioContext, seed: u64) -> Vec<QuestOffer> {
        self.generator.generate(ctx, seed)
    }

    pub fn accept(&self, ctx: &mut ScenarioContext, offer: &QuestOffer) -> Result<(), ScenarioError> {
        self.generator.accept(ctx, offer)
    }
}

impl ConditionModule for QuestBoard {
    fn kind(&self) -> &'static str {
        Self::KIND
    }

    fn activate(&mut self, key: &str, ctx: &mut ScenarioContext) -> Result<(), ScenarioError> {
        self.activation.begin(key)?;
        ctx.world_mut().init_resource::<FactionRoster>();
        ctx.world_mut().init_resource::<EmpireHoldings>();
        let generator = Rc::clone(&self.generator);
        let id = ctx.subscribe(TriggerKind::ActionTaken, key, move |trigger, ctx| {
            let Trigger::ActionTaken { action, payload } = trigger else {
                return Ok(());
            };
            if action != ACCEPT_QUEST_ACTION {
                return Ok(());
            }
            let kind = payload
                .get("kind")
                .and_then(|value| value.as_str())
                .ok_or_else(|| ScenarioError::InvalidPayload {
                    action: action.clone(),
                    field: "kind",
                })?;
            generator.accept_kind(ctx, &QuestKindId(kind.to_string()))
        });
        self.activation.track(id);
        Ok(())
    }

    fn deactivate(&mut self, ctx: &mut ScenarioContext) {
        self.activation.end(ctx);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn registry() -> Arc<QuestRegistry> {
        Arc::new(QuestRegistry::builtin())
    }

    fn seeded_context() -> ScenarioContext {
        let mut ctx = ScenarioContext::with_seed(8);
        ctx.world_mut().insert_resource(FactionRoster {
            members: vec![
                FactionMember::new("envoy_a", "vattori", 0.4),
                FactionMember::new("envoy_b", "kessari", 0.9),
            ],
        });
        let mut holdings = EmpireHoldings::default();
        holdings.resources.insert("food".to_string());
        ctx.world_mut().insert_resource(holdings);
        ctx
    }

    #[test]
    fn members_of_one_race_roll_their_own_details() {
        let mut ctx = ScenarioContext::with_seed(8);
        ctx.world_mut().insert_resource(FactionRoster {
            members: vec![
                FactionMember::new("scout_a", "vattori", 0.2),
                FactionMember::new("scout_b", "vattori", 0.2),
            ],
        });
        let generator = QuestOfferGenerator::new(registry());
        let food_amounts = |offers: &[QuestOffer], member: &str| -> u32 {
            offers
                .iter()
                .find(|offer| offer.member == member && offer.kind.0 == "deliver_food")
                .map(|offer| offer.detail.amount)
                .expect("both scouts are offered deliveries")
        };

        let mut differing = 0;
        for seed in 0..16 {
            let offers = generator.generate(&ctx, seed);
            assert_eq!(offers, generator.generate(&ctx, seed));
            if food_amounts(&offers, "scout_a") != food_amounts(&offers, "scout_b") {
                differing += 1;
            }
        }
        assert!(differing > 0, "same-race members must not share a stream");
    }

    #[test]
    fn builtin_registry_covers_every_rule_type() {
        let registry = QuestRegistry::builtin();
        assert!(!registry.is_empty());
        let rules: BTreeSet<&str> = registry
            .races()
            .flat_map(|race| registry.kinds_for(race))
            .map(|kind| match kind.rule {
                QuestRule::Deliver { .. } => "deliver",
                QuestRule::Settle { .. } => "settle",
                QuestRule::Research { .. } => "research",
            })
            .collect();
        assert_eq!(rules.len(), 3);
    }

    #[test]
    fn offers_are_deterministic_and_keep_invalid_candidates() {
        let ctx = seeded_context();
        let generator = QuestOfferGenerator::new(registry());
        let first = generator.generate(&ctx, 77);
        assert_eq!(first, generator.generate(&ctx, 77));

        let expected: usize = ["vattori", "kessari"]
            .iter()
            .map(|race| generator.registry().kinds_for(&RaceId(race.to_string())).len())
            .sum();
        assert_eq!(first.len(), expected);
        assert!(first.iter().any(|offer| offer.valid));
        assert!(first.iter().any(|offer| !offer.valid));
    }

    #[test]
    fn inactive_members_get_no_offers() {
        let mut ctx = seeded_context();
        ctx.world_mut()
            .resource_mut::<FactionRoster>()
            .members
            .iter_mut()
            .for_each(|member| member.active = false);
        let generator = QuestOfferGenerator::new(registry());
        assert!(generator.generate(&ctx, 1).is_empty());
    }

    #[test]
    fn accepted_kind_is_never_offered_again() {
        let mut ctx = seeded_context();
        let generator = QuestOfferGenerator::new(registry());
        let offers = generator.generate(&ctx, 5);
        let chosen = offers[0].clone();

        generator.accept(&mut ctx, &chosen).expect("first accept");
        assert!(ctx.flags().get_bool_or(&quest_started_key(&chosen.kind), false));

        let err = generator
            .accept(&mut ctx, &chosen)
            .expect_err("second accept is refused");
        assert!(matches!(err, ScenarioError::QuestAlreadyStarted(_)));

        for seed in 0..16 {
            assert!(generator
                .generate(&ctx, seed)
                .iter()
                .all(|offer| offer.kind != chosen.kind));
        }
    }

    #[test]
    fn content_members_suppress_offers() {
        let ctx = seeded_context();
        let generator = QuestOfferGenerator::new(registry())
            .with_policy(SuppressWhenContent { threshold: 0.3 });
        assert!(generator.generate(&ctx, 2).is_empty());

        let generator = QuestOfferGenerator::new(registry())
            .with_policy(SuppressWhenContent { threshold: 0.5 });
        assert!(!generator.generate(&ctx, 2).is_empty());
    }

    #[test]
    fn research_rule_tracks_tier() {
        let rule = QuestRule::Research {
            min_tier: 2,
            reward: 100,
        };
        let mut rng = RngFactory::new(0).rng("test");
        let holdings = EmpireHoldings::default();
        let (valid, detail) = rule.construct(&mut rng, &holdings, 0);
        assert!(valid);
        assert_eq!(detail.amount, 2);
        let (valid, _) = rule.construct(&mut rng, &holdings, 2);
        assert!(!valid);
    }

    #[test]
    fn accept_quest_action_routes_to_accept() {
        let mut ctx = seeded_context();
        let mut board = QuestBoard::new(QuestOfferGenerator::new(registry()));
        board
            .activate("quest_board{}", &mut ctx)
            .expect("activation succeeds");
        let kind = board.offers(&ctx, 3)[0].kind.clone();

        let payload = json!({ "kind": kind.to_string() });
        let trigger = Trigger::action(
            ACCEPT_QUEST_ACTION,
            payload.as_object().cloned().unwrap_or_default(),
        );
        ctx.dispatch(&trigger).expect("accept succeeds");
        assert!(ctx.flags().get_bool_or(&quest_started_key(&kind), false));

        let err = ctx.dispatch(&trigger).expect_err("already started");
        assert!(matches!(err, ScenarioError::QuestAlreadyStarted(_)));

        let err = ctx
            .dispatch(&Trigger::action(ACCEPT_QUEST_ACTION, Default::default()))
            .expect_err("missing kind");
        assert!(matches!(err, ScenarioError::InvalidPayload { field: "kind", .. }));

        ctx.dispatch(&Trigger::action("open_diplomacy", Default::default()))
            .expect("other actions are ignored");
    }
}
