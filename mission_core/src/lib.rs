//! Mission rule-composition core.
//!
//! Condition modules are composed per mission by the [`ScenarioComposer`],
//! subscribe to lifecycle triggers on activation and react synchronously when
//! the host fires them through [`Scenario::fire`]. Everything seeded goes
//! through [`RngFactory`], so a seed reproduces the same layout and offers.

mod briefing;
mod bus;
mod composer;
mod context;
mod error;
mod module;
mod procgen;
mod progression;
mod quests;
mod scoring;

pub use briefing::{Briefing, Perks, TechPattern};
pub use bus::{HandlerResult, SubscriptionId, TriggerBus};
pub use composer::{
    builtin_strings, load_mission_catalog_from_env, load_strings_from_env, strings_from_file,
    MissionCatalog, MissionCatalogError, MissionDataSource, Scenario, ScenarioComposer,
    BUILTIN_MISSION_CATALOG, BUILTIN_STRINGS, MAP_SEED_KEY, MISSION_CATALOG_ENV,
    MISSION_STRINGS_ENV,
};
pub use context::{PersistentFlags, ScenarioContext, WorldValues};
pub use error::ScenarioError;
pub use module::{Activation, ConditionModule, Hooks};
pub use procgen::{
    chain_ratio, ChainSample, GeneratedLayout, LayoutGenerator, MapLayout, CHAIN_RNG_KEY,
    ZONE_RNG_KEY,
};
pub use progression::{
    BaseRules, InventableRange, ProgressionGate, SimplifiedRules, TechProgression, TechState,
    TierInfo, TierRules, HIGHEST_LEVEL, LOWEST_LEVEL,
};
pub use quests::{
    quest_started_key, AlwaysOffer, EmpireHoldings, FactionRoster, OfferPolicy, QuestBoard,
    QuestKindDefinition, QuestOfferGenerator, QuestRegistry, QuestRule, SuppressWhenContent,
    ACCEPT_QUEST_ACTION, BUILTIN_QUEST_KINDS, QUEST_STARTED_PREFIX,
};
pub use scoring::{
    builtin_providers, EmpireSizeOverride, EmpireSizeProvider, EmpireSizeProviders,
    EmpireSizeRule, HappinessRule, PlanetsRule, PoliticalPowerRule, RuleKind, ScoringAggregator,
    ScoringContext, ScoringRule, StandardScoring, SteppedEmpireSize, UnfinishedQuestsRule,
    COMPACT_REALM, FRONTIER_SPRAWL,
};

pub use mission_runtime::{
    FlagStore, FlagValue, HostCommand, LocArg, Localizer, MissionManifest, ModuleSpec,
    RngFactory, StringCatalog,
};
pub use mission_schema::{
    EmpireStats, FactionMember, Inventability, MapLayoutSpec, QuestKindId, QuestOffer, RaceId,
    ScoreBreakdown, TechKind, Trigger, TriggerKind, NO_TIER_ADVANCE_TAG,
};
