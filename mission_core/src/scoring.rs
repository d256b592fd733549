use std::any::Any;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use bevy_ecs::prelude::*;
use mission_runtime::{EmpireStats, ScoreBreakdown, ScoreLine, TriggerKind};

use crate::{
    context::ScenarioContext,
    error::ScenarioError,
    module::{Activation, ConditionModule, Hooks},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RuleKind {
    Planets,
    PoliticalPower,
    EmpireSize,
    UnfinishedQuests,
    Happiness,
}

impl RuleKind {
    /// Standard catalog, in evaluation order.
    pub const CATALOG: [RuleKind; 5] = [
        RuleKind::Planets,
        RuleKind::PoliticalPower,
        RuleKind::EmpireSize,
        RuleKind::UnfinishedQuests,
        RuleKind::Happiness,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RuleKind::Planets => "planets",
            RuleKind::PoliticalPower => "political_power",
            RuleKind::EmpireSize => "empire_size",
            RuleKind::UnfinishedQuests => "unfinished_quests",
            RuleKind::Happiness => "happiness",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::CATALOG.into_iter().find(|kind| kind.as_str() == name)
    }
}

impl fmt::Display for RuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub trait ScoringRule: fmt::Debug + Send + Sync {
    fn kind(&self) -> RuleKind;

    fn name(&self) -> &'static str {
        self.kind().as_str()
    }

    fn variant(&self) -> &str {
        "standard"
    }

    fn evaluate(&self, stats: &EmpireStats) -> i64;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlanetsRule {
    pub points_per_planet: i64,
}

impl Default for PlanetsRule {
    fn default() -> Self {
        Self {
            points_per_planet: 10,
        }
    }
}

impl ScoringRule for PlanetsRule {
    fn kind(&self) -> RuleKind {
        RuleKind::Planets
    }

    fn evaluate(&self, stats: &EmpireStats) -> i64 {
        i64::from(stats.planets) * self.points_per_planet
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoliticalPowerRule {
    pub points_per_power: i64,
}

impl Default for PoliticalPowerRule {
    fn default() -> Self {
        Self {
            points_per_power: 1,
        }
    }
}

impl ScoringRule for PoliticalPowerRule {
    fn kind(&self) -> RuleKind {
        RuleKind::PoliticalPower
    }

    fn evaluate(&self, stats: &EmpireStats) -> i64 {
        stats.political_power * self.points_per_power
    }
}

/// Stepped bonus for the number of planets held.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EmpireSizeRule {
    pub variant: &'static str,
    pub planets_per_step: u32,
    pub points_per_step: i64,
}

impl Default for EmpireSizeRule {
    fn default() -> Self {
        Self {
            variant: "standard",
            planets_per_step: 5,
            points_per_step: 20,
        }
    }
}

impl ScoringRule for EmpireSizeRule {
    fn kind(&self) -> RuleKind {
        RuleKind::EmpireSize
    }

    fn variant(&self) -> &str {
        self.variant
    }

    fn evaluate(&self, stats: &EmpireStats) -> i64 {
        let steps = stats.planets.checked_div(self.planets_per_step).unwrap_or(0);
        i64::from(steps) * self.points_per_step
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnfinishedQuestsRule {
    pub penalty_per_quest: i64,
}

impl Default for UnfinishedQuestsRule {
    fn default() -> Self {
        Self {
            penalty_per_quest: 25,
        }
    }
}

impl ScoringRule for UnfinishedQuestsRule {
    fn kind(&self) -> RuleKind {
        RuleKind::UnfinishedQuests
    }

    fn evaluate(&self, stats: &EmpireStats) -> i64 {
        -(i64::from(stats.unfinished_quests) * self.penalty_per_quest)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HappinessRule {
    pub points_per_happiness: i64,
}

impl Default for HappinessRule {
    fn default() -> Self {
        Self {
            points_per_happiness: 1,
        }
    }
}

impl ScoringRule for HappinessRule {
    fn kind(&self) -> RuleKind {
        RuleKind::Happiness
    }

    fn evaluate(&self, stats: &EmpireStats) -> i64 {
        stats.happiness * self.points_per_happiness
    }
}

fn standard_rule(kind: RuleKind) -> Box<dyn ScoringRule> {
    match kind {
        RuleKind::Planets => Box::new(PlanetsRule::default()),
        RuleKind::PoliticalPower => Box::new(PoliticalPowerRule::default()),
        RuleKind::EmpireSize => Box::new(EmpireSizeRule::default()),
        RuleKind::UnfinishedQuests => Box::new(UnfinishedQuestsRule::default()),
        RuleKind::Happiness => Box::new(HappinessRule::default()),
    }
}

/// Supplies a replacement for the standard empire-size rule.
pub trait EmpireSizeProvider: fmt::Debug + Send + Sync {
    fn name(&self) -> &str;

    fn empire_size_rule(&self) -> Box<dyn ScoringRule>;
}

/// Provider backed by a fixed stepped rule.
#[derive(Debug, Clone, Copy)]
pub struct SteppedEmpireSize {
    rule: EmpireSizeRule,
}

impl SteppedEmpireSize {
    pub const fn new(variant: &'static str, planets_per_step: u32, points_per_step: i64) -> Self {
        Self {
            rule: EmpireSizeRule {
                variant,
                planets_per_step,
                points_per_step,
            },
        }
    }
}

impl EmpireSizeProvider for SteppedEmpireSize {
    fn name(&self) -> &str {
        self.rule.variant
    }

    fn empire_size_rule(&self) -> Box<dyn ScoringRule> {
        Box::new(self.rule)
    }
}

/// Rewards wide, thinly held empires.
pub const FRONTIER_SPRAWL: SteppedEmpireSize = SteppedEmpireSize::new("frontier_sprawl", 3, 15);
/// Rewards a small number of developed worlds.
pub const COMPACT_REALM: SteppedEmpireSize = SteppedEmpireSize::new("compact_realm", 8, 40);

pub fn builtin_providers() -> Vec<Arc<dyn EmpireSizeProvider>> {
    vec![Arc::new(FRONTIER_SPRAWL), Arc::new(COMPACT_REALM)]
}

/// Registered empire-size providers; the most recent registration is used.
#[derive(Resource, Debug, Default)]
pub struct EmpireSizeProviders {
    providers: Vec<Arc<dyn EmpireSizeProvider>>,
}

impl EmpireSizeProviders {
    pub fn register(&mut self, provider: Arc<dyn EmpireSizeProvider>) {
        self.providers.push(provider);
    }

    pub fn active(&self) -> Option<&Arc<dyn EmpireSizeProvider>> {
        self.providers.last()
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

/// Builds the rule list from the standard catalog minus exclusions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScoringAggregator {
    exclusions: BTreeSet<String>,
}

impl ScoringAggregator {
    pub fn new<I, S>(exclusions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let exclusions: BTreeSet<String> = exclusions.into_iter().map(Into::into).collect();
        for name in &exclusions {
            if RuleKind::from_name(name).is_none() {
                tracing::warn!(
                    target: "mission::scoring",
                    exclusion = %name,
                    "scoring.exclusion.unknown"
                );
            }
        }
        Self { exclusions }
    }

    pub fn exclusions(&self) -> impl Iterator<Item = &str> {
        self.exclusions.iter().map(String::as_str)
    }

    /// Exclusion names that match no catalog rule. They are otherwise ignored.
    pub fn unknown_exclusions(&self) -> Vec<&str> {
        self.exclusions()
            .filter(|name| RuleKind::from_name(name).is_none())
            .collect()
    }

    pub fn scoring_rules(
        &self,
        providers: Option<&EmpireSizeProviders>,
    ) -> Vec<Box<dyn ScoringRule>> {
        RuleKind::CATALOG
            .into_iter()
            .filter(|kind| !self.exclusions.contains(kind.as_str()))
            .map(|kind| match (kind, providers.and_then(EmpireSizeProviders::active)) {
                (RuleKind::EmpireSize, Some(provider)) => provider.empire_size_rule(),
                (kind, _) => standard_rule(kind),
            })
            .collect()
    }
}

/// Rules currently in force for the running mission.
#[derive(Resource, Debug, Default)]
pub struct ScoringContext {
    rules: Vec<Box<dyn ScoringRule>>,
    installs: u32,
}

impl ScoringContext {
    /// Adds rules whose kind is not yet present. A rule whose kind is present
    /// under a different variant replaces the existing one in place. Returns
    /// the number of rules added or replaced.
    pub fn install(&mut self, rules: Vec<Box<dyn ScoringRule>>) -> usize {
        self.installs += 1;
        let mut changed = 0;
        for rule in rules {
            match self
                .rules
                .iter()
                .position(|existing| existing.kind() == rule.kind())
            {
                Some(index) if self.rules[index].variant() != rule.variant() => {
                    tracing::debug!(
                        target: "mission::scoring",
                        rule = rule.name(),
                        from = self.rules[index].variant(),
                        to = rule.variant(),
                        "scoring.rule.replaced"
                    );
                    self.rules[index] = rule;
                    changed += 1;
                }
                Some(_) => {}
                None => {
                    self.rules.push(rule);
                    changed += 1;
                }
            }
        }
        changed
    }

    pub fn rules(&self) -> &[Box<dyn ScoringRule>] {
        &self.rules
    }

    pub fn rule_names(&self) -> Vec<&'static str> {
        self.rules.iter().map(|rule| rule.name()).collect()
    }

    pub fn install_count(&self) -> u32 {
        self.installs
    }

    pub fn score(&self, stats: &EmpireStats) -> ScoreBreakdown {
        let lines: Vec<ScoreLine> = self
            .rules
            .iter()
            .map(|rule| ScoreLine {
                rule: rule.name().to_string(),
                variant: rule.variant().to_string(),
                points: rule.evaluate(stats),
            })
            .collect();
        let total = lines.iter().map(|line| line.points).sum();
        ScoreBreakdown { lines, total }
    }
}

fn install_rules(aggregator: &ScoringAggregator, owner: &str, ctx: &mut ScenarioContext) {
    let rules = aggregator.scoring_rules(ctx.world().get_resource::<EmpireSizeProviders>());
    let mut scoring = ctx
        .world_mut()
        .get_resource_or_insert_with(ScoringContext::default);
    let changed = scoring.install(rules);
    tracing::debug!(
        target: "mission::scoring",
        owner,
        changed,
        rules = scoring.rules().len(),
        "scoring.rules.installed"
    );
}

/// Installs the standard catalog on setup and again after a load.
#[derive(Debug)]
pub struct StandardScoring {
    aggregator: ScoringAggregator,
    activation: Activation,
}

impl StandardScoring {
    pub const KIND: &'static str = "standard_scoring";

    pub fn new<I, S>(exclusions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            aggregator: ScoringAggregator::new(exclusions),
            activation: Activation::default(),
        }
    }

    pub fn aggregator(&self) -> &ScoringAggregator {
        &self.aggregator
    }
}

impl ConditionModule for StandardScoring {
    fn kind(&self) -> &'static str {
        Self::KIND
    }

    fn hooks(&self) -> Hooks {
        Hooks::SCORING_RULES
    }

    fn activate(&mut self, key: &str, ctx: &mut ScenarioContext) -> Result<(), ScenarioError> {
        self.activation.begin(key)?;
        ctx.world_mut().init_resource::<ScoringContext>();
        for kind in [TriggerKind::ScenarioSetup, TriggerKind::GameLoaded] {
            let aggregator = self.aggregator.clone();
            let owner = key.to_string();
            let id = ctx.subscribe(kind, key, move |_, ctx| {
                install_rules(&aggregator, &owner, ctx);
                Ok(())
            });
            self.activation.track(id);
        }
        Ok(())
    }

    fn scoring_rules(&self, ctx: &ScenarioContext) -> Vec<Box<dyn ScoringRule>> {
        self.aggregator
            .scoring_rules(ctx.world().get_resource::<EmpireSizeProviders>())
    }

    fn deactivate(&mut self, ctx: &mut ScenarioContext) {
        self.activation.end(ctx);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Registers a replacement empire-size provider on activation.
#[derive(Debug)]
pub struct EmpireSizeOverride {
    provider: Arc<dyn EmpireSizeProvider>,
    activation: Activation,
}

impl EmpireSizeOverride {
    pub const KIND: &'static str = "empire_size_override";

    pub fn new(provider: Arc<dyn EmpireSizeProvider>) -> Self {
        Self {
            provider,
            activation: Activation::default(),
        }
    }

    pub fn provider(&self) -> &dyn EmpireSizeProvider {
        self.provider.as_ref()
    }
}

impl ConditionModule for EmpireSizeOverride {
    fn kind(&self) -> &'static str {
        Self::KIND
    }

    fn activate(&mut self, key: &str, ctx: &mut ScenarioContext) -> Result<(), ScenarioError> {
        self.activation.begin(key)?;
        ctx.world_mut()
            .get_resource_or_insert_with(EmpireSizeProviders::default)
            .register(self.provider.clone());
        tracing::info!(
            target: "mission::scoring",
            provider = self.provider.name(),
            "scoring.empire_size.overridden"
        );
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
    use mission_runtime::Trigger;

    use super::*;

    fn names(rules: &[Box<dyn ScoringRule>]) -> Vec<&'static str> {
        rules.iter().map(|rule| rule.name()).collect()
    }

    #[test]
    fn catalog_order_is_stable() {
        let rules = ScoringAggregator::default().scoring_rules(None);
        insta::assert_debug_snapshot!(names(&rules), @r###"
        [
            "planets",
            "political_power",
            "empire_size",
            "unfinished_quests",
            "happiness",
        ]
        "###);
    }

    #[test]
    fn excluding_empire_size_leaves_four_rules() {
        let rules = ScoringAggregator::new(["empire_size"]).scoring_rules(None);
        assert_eq!(
            names(&rules),
            vec!["planets", "political_power", "unfinished_quests", "happiness"]
        );
    }

    #[test]
    fn unknown_exclusions_are_ignored() {
        let aggregator = ScoringAggregator::new(["morale", "happiness"]);
        assert_eq!(aggregator.unknown_exclusions(), vec!["morale"]);
        assert_eq!(aggregator.scoring_rules(None).len(), 4);
    }

    #[test]
    fn last_registered_provider_wins() {
        let mut providers = EmpireSizeProviders::default();
        providers.register(Arc::new(FRONTIER_SPRAWL));
        providers.register(Arc::new(COMPACT_REALM));
        let rules = ScoringAggregator::default().scoring_rules(Some(&providers));
        let empire: Vec<&str> = rules
            .iter()
            .filter(|rule| rule.kind() == RuleKind::EmpireSize)
            .map(|rule| rule.variant())
            .collect();
        assert_eq!(empire, vec!["compact_realm"]);
    }

    #[test]
    fn install_deduplicates_by_kind_and_replaces_variants() {
        let mut scoring = ScoringContext::default();
        assert_eq!(scoring.install(ScoringAggregator::default().scoring_rules(None)), 5);
        assert_eq!(scoring.install(ScoringAggregator::default().scoring_rules(None)), 0);
        assert_eq!(scoring.install(vec![FRONTIER_SPRAWL.empire_size_rule()]), 1);
        assert_eq!(scoring.rules().len(), 5);
        assert_eq!(scoring.rules()[2].variant(), "frontier_sprawl");
        assert_eq!(scoring.install_count(), 3);
    }

    #[test]
    fn score_sums_rule_lines() {
        let mut scoring = ScoringContext::default();
        scoring.install(ScoringAggregator::default().scoring_rules(None));
        let stats = EmpireStats {
            planets: 12,
            political_power: 30,
            unfinished_quests: 1,
            happiness: 5,
        };
        let breakdown = scoring.score(&stats);
        let points: Vec<i64> = breakdown.lines.iter().map(|line| line.points).collect();
        assert_eq!(points, vec![120, 30, 40, -25, 5]);
        assert_eq!(breakdown.total, 170);
    }

    #[test]
    fn setup_and_load_install_idempotently() {
        let mut ctx = ScenarioContext::with_seed(3);
        let mut module = StandardScoring::new(["empire_size"]);
        module
            .activate("standard_scoring{}", &mut ctx)
            .expect("activation succeeds");
        ctx.dispatch(&Trigger::ScenarioSetup).expect("setup");
        ctx.dispatch(&Trigger::GameLoaded).expect("load");

        let scoring = ctx
            .world()
            .get_resource::<ScoringContext>()
            .expect("scoring context installed");
        assert_eq!(scoring.rules().len(), 4);
        assert_eq!(scoring.install_count(), 2);
    }

    #[test]
    fn override_replaces_empire_size_rule_before_setup() {
        let mut ctx = ScenarioContext::with_seed(3);
        let mut scoring = StandardScoring::new(Vec::<String>::new());
        let mut sprawl = EmpireSizeOverride::new(Arc::new(FRONTIER_SPRAWL));
        scoring
            .activate("standard_scoring{}", &mut ctx)
            .expect("activation succeeds");
        sprawl
            .activate("empire_size_override{}", &mut ctx)
            .expect("activation succeeds");
        ctx.dispatch(&Trigger::ScenarioSetup).expect("setup");

        let installed = ctx
            .world()
            .get_resource::<ScoringContext>()
            .expect("scoring context installed");
        assert_eq!(installed.rules()[2].variant(), "frontier_sprawl");
        assert_eq!(installed.rules().len(), 5);
    }
}
