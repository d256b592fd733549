use std::any::Any;

use bitflags::bitflags;
use mission_runtime::{ConditionSpec, HookName, SelectScreenSpec};

use crate::{
    bus::SubscriptionId, context::ScenarioContext, error::ScenarioError, scoring::ScoringRule,
};

bitflags! {
    /// Query hooks a module answers.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Hooks: u8 {
        const SCORING_RULES = 1 << 0;
        const PERKS_AVAILABLE = 1 << 1;
        const POTENTIAL_TECHS = 1 << 2;
        const SELECT_SCREEN = 1 << 3;
        const CONDITIONS = 1 << 4;
        const THINGS_TO_EXPLAIN = 1 << 5;
    }
}

const HOOK_NAMES: [HookName; 6] = [
    HookName::ScoringRules,
    HookName::PerksAvailable,
    HookName::PotentialTechs,
    HookName::SelectScreen,
    HookName::Conditions,
    HookName::ThingsToExplain,
];

impl Hooks {
    pub fn names(self) -> Vec<HookName> {
        HOOK_NAMES
            .into_iter()
            .filter(|name| self.contains(Hooks::from(*name)))
            .collect()
    }
}

impl From<HookName> for Hooks {
    fn from(name: HookName) -> Self {
        match name {
            HookName::ScoringRules => Hooks::SCORING_RULES,
            HookName::PerksAvailable => Hooks::PERKS_AVAILABLE,
            HookName::PotentialTechs => Hooks::POTENTIAL_TECHS,
            HookName::SelectScreen => Hooks::SELECT_SCREEN,
            HookName::Conditions => Hooks::CONDITIONS,
            HookName::ThingsToExplain => Hooks::THINGS_TO_EXPLAIN,
        }
    }
}

/// A unit of mission behaviour composed into a scenario.
///
/// `activate` runs once, right after the module joins the scenario, and is
/// where trigger subscriptions are made. Query hooks default to "nothing";
/// a module lists the hooks it really answers in [`ConditionModule::hooks`]
/// so composition can check mission requirements.
pub trait ConditionModule: Any {
    fn kind(&self) -> &'static str;

    fn hooks(&self) -> Hooks {
        Hooks::empty()
    }

    fn activate(&mut self, key: &str, ctx: &mut ScenarioContext) -> Result<(), ScenarioError> {
        let _ = (key, ctx);
        Ok(())
    }

    /// Drops the module's subscriptions when its scenario ends.
    fn deactivate(&mut self, ctx: &mut ScenarioContext) {
        let _ = ctx;
    }

    fn scoring_rules(&self, _ctx: &ScenarioContext) -> Vec<Box<dyn ScoringRule>> {
        Vec::new()
    }

    fn perks_available(&self, _ctx: &ScenarioContext) -> Vec<String> {
        Vec::new()
    }

    fn potential_techs(&self, _ctx: &ScenarioContext) -> Vec<String> {
        Vec::new()
    }

    fn select_screen(&self, _ctx: &ScenarioContext) -> Option<SelectScreenSpec> {
        None
    }

    fn conditions(&self, _ctx: &ScenarioContext) -> Vec<ConditionSpec> {
        Vec::new()
    }

    fn things_to_explain(&self, _ctx: &ScenarioContext) -> Vec<String> {
        Vec::new()
    }

    fn as_any(&self) -> &dyn Any;
}

/// Activation bookkeeping shared by the builtin modules.
#[derive(Debug, Clone, Default)]
pub struct Activation {
    key: Option<String>,
    subscriptions: Vec<SubscriptionId>,
}

impl Activation {
    /// Marks the module active under `key`. Fails if it already is.
    pub fn begin(&mut self, key: &str) -> Result<(), ScenarioError> {
        if let Some(existing) = &self.key {
            return Err(ScenarioError::AlreadyActive(existing.clone()));
        }
        self.key = Some(key.to_string());
        Ok(())
    }

    pub fn track(&mut self, id: SubscriptionId) {
        self.subscriptions.push(id);
    }

    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    /// Unsubscribes everything tracked so far. The module stays marked as
    /// activated, so it cannot be activated again. Returns how many
    /// subscriptions were removed.
    pub fn end(&mut self, ctx: &mut ScenarioContext) -> usize {
        self.subscriptions
            .drain(..)
            .filter(|id| ctx.bus_mut().unsubscribe(*id))
            .count()
    }
}

#[cfg(test)]
mod tests {
    use mission_runtime::TriggerKind;

    use super::*;

    #[test]
    fn activation_is_single_shot() {
        let mut activation = Activation::default();
        activation.begin("perks[]").expect("first activation");
        let err = activation.begin("perks[]").expect_err("second activation");
        assert!(matches!(err, ScenarioError::AlreadyActive(ref key) if key == "perks[]"));
        assert_eq!(activation.key(), Some("perks[]"));
    }

    #[test]
    fn ending_activation_drops_tracked_subscriptions() {
        let mut ctx = ScenarioContext::with_seed(0);
        let mut activation = Activation::default();
        activation.begin("scoring").expect("first activation");
        for kind in [TriggerKind::ScenarioSetup, TriggerKind::GameLoaded] {
            activation.track(ctx.subscribe(kind, "scoring", |_, _| Ok(())));
        }
        let unrelated = ctx.subscribe(TriggerKind::GameLoaded, "other", |_, _| Ok(()));

        assert_eq!(activation.end(&mut ctx), 2);
        assert_eq!(activation.end(&mut ctx), 0);
        assert_eq!(ctx.bus().subscriber_count(TriggerKind::ScenarioSetup), 0);
        assert_eq!(ctx.bus().subscriber_count(TriggerKind::GameLoaded), 1);
        assert!(ctx.bus_mut().unsubscribe(unrelated));
        assert!(activation.begin("scoring").is_err());
    }

    #[test]
    fn hook_names_round_trip_through_flags() {
        let hooks = Hooks::from(HookName::Conditions) | Hooks::SCORING_RULES;
        assert_eq!(
            hooks.names(),
            vec![HookName::ScoringRules, HookName::Conditions]
        );
        assert!(Hooks::empty().names().is_empty());
    }
}
