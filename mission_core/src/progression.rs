use std::any::Any;
use std::fmt;
use std::rc::Rc;

use bevy_ecs::prelude::*;
use mission_runtime::{
    HostCommand, Inventability, Localizer, RulesetKind, TechKind, Trigger, TriggerKind,
};
use serde::Serialize;

use crate::{
    context::ScenarioContext,
    error::ScenarioError,
    module::{Activation, ConditionModule},
};

pub const LOWEST_LEVEL: u8 = 0;
pub const HIGHEST_LEVEL: u8 = 4;

pub const REMAINING_KEY: &str = "tech.level.remaining";
pub const TOOLTIP_UNLOCK_KEY: &str = "tech.level.tooltip.unlock";
pub const TOOLTIP_SKIP_KEY: &str = "tech.level.tooltip.skip";

/// Current technology tier. Only changed by applying an `UpgradeTier` command.
#[derive(Resource, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TechState {
    tier: u8,
}

impl TechState {
    pub fn tier(&self) -> u8 {
        self.tier
    }

    /// Advances by one unless already at `max_tier`. Returns whether it moved.
    pub(crate) fn apply_upgrade(&mut self, max_tier: u8) -> bool {
        if self.tier < max_tier {
            self.tier += 1;
            true
        } else {
            false
        }
    }
}

/// Strategy describing one tier ruleset.
pub trait TierRules: fmt::Debug {
    fn name(&self) -> &'static str;

    fn max_tier(&self) -> u8;

    /// Whether non-root technologies advance the tier.
    fn counts_non_root(&self) -> bool;

    /// Unclamped `(low, high)` inventable levels at `tier`.
    fn raw_range(&self, tier: u8) -> (i32, i32);

    fn inventions_to_next_level(&self, tier: u8) -> u8 {
        2 - (tier % 2)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BaseRules {
    counts_non_root: bool,
}

impl BaseRules {
    pub const MAX_TIER: u8 = 3;

    pub fn new() -> Self {
        Self {
            counts_non_root: false,
        }
    }

    pub fn counting_non_root(mut self, counts: bool) -> Self {
        self.counts_non_root = counts;
        self
    }
}

impl Default for BaseRules {
    fn default() -> Self {
        Self::new()
    }
}

impl TierRules for BaseRules {
    fn name(&self) -> &'static str {
        "base"
    }

    fn max_tier(&self) -> u8 {
        Self::MAX_TIER
    }

    fn counts_non_root(&self) -> bool {
        self.counts_non_root
    }

    fn raw_range(&self, tier: u8) -> (i32, i32) {
        let effective = (i32::from(tier) / 2).clamp(0, 3);
        (effective, effective + 1)
    }
}

/// Everything is inventable from the start and every invention counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimplifiedRules {
    counts_non_root: bool,
}

impl SimplifiedRules {
    pub const MAX_TIER: u8 = 4;

    pub fn new() -> Self {
        Self {
            counts_non_root: true,
        }
    }

    pub fn counting_non_root(mut self, counts: bool) -> Self {
        self.counts_non_root = counts;
        self
    }
}

impl Default for SimplifiedRules {
    fn default() -> Self {
        Self::new()
    }
}

impl TierRules for SimplifiedRules {
    fn name(&self) -> &'static str {
        "simplified"
    }

    fn max_tier(&self) -> u8 {
        Self::MAX_TIER
    }

    fn counts_non_root(&self) -> bool {
        self.counts_non_root
    }

    fn raw_range(&self, _tier: u8) -> (i32, i32) {
        (i32::from(LOWEST_LEVEL), i32::from(HIGHEST_LEVEL))
    }

    fn inventions_to_next_level(&self, _tier: u8) -> u8 {
        1
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct InventableRange {
    pub low: u8,
    pub high: u8,
}

impl InventableRange {
    pub fn contains(&self, level: u8) -> bool {
        (self.low..=self.high).contains(&level)
    }
}

/// UI text for the first locked level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TierInfo {
    pub level: u8,
    pub remaining: u8,
    pub count_text: String,
    pub tooltip: String,
}

fn clamp_range(raw_low: i32, raw_high: i32) -> InventableRange {
    // Both clamps keep the value inside 0..=4, so the narrowing is lossless.
    InventableRange {
        low: raw_low.clamp(0, 3) as u8,
        high: raw_high.clamp(1, i32::from(HIGHEST_LEVEL)) as u8,
    }
}

/// Pure tier queries over a validated rule set.
#[derive(Debug, Clone)]
pub struct ProgressionGate {
    rules: Rc<dyn TierRules>,
}

impl ProgressionGate {
    pub fn new(rules: impl TierRules + 'static) -> Result<Self, ScenarioError> {
        Self::from_shared(Rc::new(rules))
    }

    pub fn from_shared(rules: Rc<dyn TierRules>) -> Result<Self, ScenarioError> {
        for tier in 0..=rules.max_tier() {
            let (raw_low, raw_high) = rules.raw_range(tier);
            let range = clamp_range(raw_low, raw_high);
            if range.low > range.high {
                return Err(ScenarioError::InvalidParameter {
                    owner: rules.name().to_string(),
                    parameter: "raw_range",
                    reason: format!(
                        "tier {tier} yields low {} above high {}",
                        range.low, range.high
                    ),
                });
            }
            if rules.inventions_to_next_level(tier) == 0 {
                return Err(ScenarioError::InvalidParameter {
                    owner: rules.name().to_string(),
                    parameter: "inventions_to_next_level",
                    reason: format!("tier {tier} needs zero inventions"),
                });
            }
        }
        Ok(Self { rules })
    }

    pub fn from_ruleset(
        ruleset: RulesetKind,
        counts_non_root: Option<bool>,
    ) -> Result<Self, ScenarioError> {
        match ruleset {
            RulesetKind::Base => {
                let rules = BaseRules::new();
                Self::new(rules.counting_non_root(counts_non_root.unwrap_or(rules.counts_non_root)))
            }
            RulesetKind::Simplified => {
                let rules = SimplifiedRules::new();
                Self::new(rules.counting_non_root(counts_non_root.unwrap_or(rules.counts_non_root)))
            }
        }
    }

    pub fn rules(&self) -> &dyn TierRules {
        self.rules.as_ref()
    }

    pub fn max_tier(&self) -> u8 {
        self.rules.max_tier()
    }

    /// Whether inventing `tech` advances the tier.
    pub fn counts_for_tier(&self, tech: &TechKind) -> bool {
        let counts = tech.root || self.rules.counts_non_root();
        counts && !tech.skips_tier_advance()
    }

    pub fn inventable_range(&self, tier: u8) -> InventableRange {
        let (raw_low, raw_high) = self.rules.raw_range(tier.min(self.max_tier()));
        clamp_range(raw_low, raw_high)
    }

    /// Upgrades are pulled up to the lowest inventable level.
    pub fn effective_tier(&self, tier: u8, tech: &TechKind) -> u8 {
        if tech.upgrade {
            self.inventable_range(tier).low.max(tech.base_tier)
        } else {
            tech.base_tier
        }
    }

    pub fn inventability(&self, tier: u8, tech: &TechKind) -> Inventability {
        let range = self.inventable_range(tier);
        let level = self.effective_tier(tier, tech);
        if level < range.low {
            Inventability::Skipped
        } else if level > range.high {
            Inventability::Locked
        } else {
            Inventability::Available
        }
    }

    /// Text for the level just above the inventable range; `None` for every
    /// other level.
    pub fn info_for_level(
        &self,
        tier: u8,
        level: u8,
        localizer: &dyn Localizer,
    ) -> Result<Option<TierInfo>, ScenarioError> {
        let range = self.inventable_range(tier);
        if u16::from(level) != u16::from(range.high) + 1 {
            return Ok(None);
        }
        let remaining = self.rules.inventions_to_next_level(tier);
        let count = i64::from(remaining);
        let count_text = localizer.plural(REMAINING_KEY, count, &[remaining.into()])?;
        let unlock = localizer.plural(TOOLTIP_UNLOCK_KEY, count, &[remaining.into(), level.into()])?;
        let skip = localizer.format(TOOLTIP_SKIP_KEY, &[range.low.into()])?;
        Ok(Some(TierInfo {
            level,
            remaining,
            count_text,
            tooltip: format!("{unlock}\n{skip}"),
        }))
    }
}

/// Condition module that advances the tier as qualifying techs are invented.
#[derive(Debug)]
pub struct TechProgression {
    gate: ProgressionGate,
    activation: Activation,
}

impl TechProgression {
    pub const KIND: &'static str = "tech_progression";

    pub fn new(gate: ProgressionGate) -> Self {
        Self {
            gate,
            activation: Activation::default(),
        }
    }

    pub fn gate(&self) -> &ProgressionGate {
        &self.gate
    }

    pub fn tier(&self, ctx: &ScenarioContext) -> u8 {
        ctx.tech_tier().min(self.gate.max_tier())
    }

    pub fn inventable_range(&self, ctx: &ScenarioContext) -> InventableRange {
        self.gate.inventable_range(self.tier(ctx))
    }

    pub fn effective_tier(&self, ctx: &ScenarioContext, tech: &TechKind) -> u8 {
        self.gate.effective_tier(self.tier(ctx), tech)
    }

    pub fn inventability(&self, ctx: &ScenarioContext, tech: &TechKind) -> Inventability {
        self.gate.inventability(self.tier(ctx), tech)
    }

    pub fn info_for_level(
        &self,
        ctx: &ScenarioContext,
        level: u8,
    ) -> Result<Option<TierInfo>, ScenarioError> {
        self.gate.info_for_level(self.tier(ctx), level, ctx.localizer())
    }

    /// The subset of `catalog` inventable at the current tier.
    pub fn available_techs<'a>(
        &self,
        ctx: &ScenarioContext,
        catalog: &'a [TechKind],
    ) -> Vec<&'a TechKind> {
        catalog
            .iter()
            .filter(|tech| self.inventability(ctx, tech) == Inventability::Available)
            .collect()
    }
}

impl ConditionModule for TechProgression {
    fn kind(&self) -> &'static str {
        Self::KIND
    }

    fn activate(&mut self, key: &str, ctx: &mut ScenarioContext) -> Result<(), ScenarioError> {
        self.activation.begin(key)?;
        ctx.world_mut().init_resource::<TechState>();

        let gate = self.gate.clone();
        let owner = key.to_string();
        let id = ctx.subscribe(TriggerKind::TechInvented, key, move |trigger, ctx| {
            let Trigger::TechInvented { tech } = trigger else {
                return Ok(());
            };
            if !gate.counts_for_tier(tech) {
                tracing::debug!(
                    target: "mission::progression",
                    tech = %tech.id,
                    root = tech.root,
                    "progression.tech.ignored"
                );
                return Ok(());
            }
            let before = ctx.tech_tier();
            ctx.issue(
                &owner,
                HostCommand::UpgradeTier {
                    max_tier: gate.max_tier(),
                },
            );
            let after = ctx.tech_tier();
            if after > before {
                tracing::info!(
                    target: "mission::progression",
                    tech = %tech.id,
                    tier = after,
                    "progression.tier.advanced"
                );
            } else {
                tracing::debug!(
                    target: "mission::progression",
                    tech = %tech.id,
                    tier = after,
                    "progression.tier.capped"
                );
            }
            Ok(())
        });
        self.activation.track(id);
        tracing::debug!(
            target: "mission::progression",
            ruleset = self.gate.rules().name(),
            max_tier = self.gate.max_tier(),
            "progression.activated"
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
    use super::*;

    #[derive(Debug)]
    struct InvertedRules;

    impl TierRules for InvertedRules {
        fn name(&self) -> &'static str {
            "inverted"
        }

        fn max_tier(&self) -> u8 {
            2
        }

        fn counts_non_root(&self) -> bool {
            false
        }

        fn raw_range(&self, tier: u8) -> (i32, i32) {
            if tier == 2 {
                (3, 0)
            } else {
                (0, 1)
            }
        }
    }

    fn base_gate() -> ProgressionGate {
        ProgressionGate::new(BaseRules::new()).expect("base rules are valid")
    }

    fn invent(ctx: &mut ScenarioContext, tech: TechKind) {
        ctx.dispatch(&Trigger::TechInvented { tech })
            .expect("dispatch succeeds");
    }

    fn active_module(ctx: &mut ScenarioContext, gate: ProgressionGate) -> TechProgression {
        let mut module = TechProgression::new(gate);
        module
            .activate("tech_progression{}", ctx)
            .expect("activation succeeds");
        module
    }

    #[test]
    fn base_ranges_follow_half_tier() {
        let gate = base_gate();
        let ranges: Vec<(u8, u8)> = (0..=3)
            .map(|tier| {
                let range = gate.inventable_range(tier);
                (range.low, range.high)
            })
            .collect();
        assert_eq!(ranges, vec![(0, 1), (0, 1), (1, 2), (1, 2)]);
    }

    #[test]
    fn every_ruleset_keeps_ranges_ordered() {
        let gates = [
            base_gate(),
            ProgressionGate::new(SimplifiedRules::new()).expect("simplified rules are valid"),
        ];
        for gate in &gates {
            for tier in 0..=u8::MAX {
                let range = gate.inventable_range(tier);
                assert!(range.low <= range.high, "{:?} at tier {tier}", gate.rules());
                assert!(range.high <= HIGHEST_LEVEL);
            }
        }
    }

    #[test]
    fn invalid_ruleset_is_rejected_at_construction() {
        let err = ProgressionGate::new(InvertedRules).expect_err("tier 2 is inverted");
        assert!(err.is_configuration());
        assert!(err.to_string().contains("tier 2"));
    }

    #[test]
    fn upgrades_are_pulled_to_low_and_classified() {
        let gate = base_gate();
        let upgrade = TechKind::new("hull_plating_ii", 0).as_upgrade();
        let old = TechKind::new("ion_drive", 0);
        let future = TechKind::new("warp_gate", 3);
        assert_eq!(gate.effective_tier(2, &upgrade), 1);
        assert_eq!(gate.inventability(2, &upgrade), Inventability::Available);
        assert_eq!(gate.inventability(2, &old), Inventability::Skipped);
        assert_eq!(gate.inventability(2, &future), Inventability::Locked);
        assert_eq!(gate.inventability(0, &old), Inventability::Available);
    }

    #[test]
    fn info_is_only_given_for_first_locked_level() {
        let gate = base_gate();
        let strings = crate::composer::builtin_strings();
        assert!(gate.info_for_level(0, 1, &strings).unwrap().is_none());
        assert!(gate.info_for_level(0, 3, &strings).unwrap().is_none());

        let info = gate
            .info_for_level(0, 2, &strings)
            .unwrap()
            .expect("level 2 is next");
        assert_eq!(info.remaining, 2);
        assert_eq!(info.tooltip.lines().count(), 2);

        let info = gate
            .info_for_level(1, 2, &strings)
            .unwrap()
            .expect("level 2 is next");
        assert_eq!(info.remaining, 1);
        assert_ne!(info.count_text, "");
    }

    #[test]
    fn three_root_techs_reach_tier_three_on_base_rules() {
        let mut ctx = ScenarioContext::with_seed(5);
        let module = active_module(&mut ctx, base_gate());
        for id in ["survey", "mining", "refining"] {
            invent(&mut ctx, TechKind::new(id, 0).as_root());
        }
        assert_eq!(module.tier(&ctx), 3);
        invent(&mut ctx, TechKind::new("fusion", 1).as_root());
        assert_eq!(module.tier(&ctx), 3);
        assert_eq!(ctx.commands().count_named("upgrade_tier"), 4);
    }

    #[test]
    fn non_root_and_tagged_techs_do_not_advance_base_tier() {
        let mut ctx = ScenarioContext::with_seed(5);
        let module = active_module(&mut ctx, base_gate());
        invent(&mut ctx, TechKind::new("armor", 0));
        invent(
            &mut ctx,
            TechKind::new("archive", 0)
                .as_root()
                .with_tag(mission_runtime::NO_TIER_ADVANCE_TAG),
        );
        assert_eq!(module.tier(&ctx), 0);
        assert!(ctx.commands().is_empty());
    }

    #[test]
    fn simplified_rules_count_every_tech_and_open_all_levels() {
        let mut ctx = ScenarioContext::with_seed(5);
        let gate = ProgressionGate::from_ruleset(RulesetKind::Simplified, None)
            .expect("simplified rules are valid");
        let module = active_module(&mut ctx, gate);
        invent(&mut ctx, TechKind::new("armor", 0));
        assert_eq!(module.tier(&ctx), 1);
        let range = module.inventable_range(&ctx);
        assert_eq!((range.low, range.high), (0, 4));

        let catalog = vec![TechKind::new("a", 0), TechKind::new("b", 4)];
        assert_eq!(module.available_techs(&ctx, &catalog).len(), 2);
    }

    #[test]
    fn second_activation_is_refused() {
        let mut ctx = ScenarioContext::with_seed(5);
        let mut module = active_module(&mut ctx, base_gate());
        let err = module
            .activate("tech_progression{}", &mut ctx)
            .expect_err("already active");
        assert!(matches!(err, ScenarioError::AlreadyActive(_)));
        assert_eq!(ctx.bus().subscriber_count(TriggerKind::TechInvented), 1);
    }
}
