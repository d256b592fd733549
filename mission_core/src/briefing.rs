//! Static modules answering the presentation hooks of a mission.

use std::any::Any;

use mission_runtime::{ConditionSpec, SelectScreenSpec};

use crate::{
    context::ScenarioContext,
    module::{ConditionModule, Hooks},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Perks {
    perks: Vec<String>,
}

impl Perks {
    pub const KIND: &'static str = "perks";

    pub fn new(perks: Vec<String>) -> Self {
        Self { perks }
    }
}

impl ConditionModule for Perks {
    fn kind(&self) -> &'static str {
        Self::KIND
    }

    fn hooks(&self) -> Hooks {
        Hooks::PERKS_AVAILABLE
    }

    fn perks_available(&self, _ctx: &ScenarioContext) -> Vec<String> {
        self.perks.clone()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Technologies the mission highlights as worth pursuing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TechPattern {
    techs: Vec<String>,
}

impl TechPattern {
    pub const KIND: &'static str = "tech_pattern";

    pub fn new(techs: Vec<String>) -> Self {
        Self { techs }
    }
}

impl ConditionModule for TechPattern {
    fn kind(&self) -> &'static str {
        Self::KIND
    }

    fn hooks(&self) -> Hooks {
        Hooks::POTENTIAL_TECHS
    }

    fn potential_techs(&self, _ctx: &ScenarioContext) -> Vec<String> {
        self.techs.clone()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Select screen, end conditions and explanation topics. Only the parts that
/// are configured count as provided hooks.
#[derive(Debug, Clone, PartialEq)]
pub struct Briefing {
    select_screen: Option<SelectScreenSpec>,
    conditions: Vec<ConditionSpec>,
    explain: Vec<String>,
}

impl Briefing {
    pub const KIND: &'static str = "briefing";

    pub fn new(
        select_screen: Option<SelectScreenSpec>,
        conditions: Vec<ConditionSpec>,
        explain: Vec<String>,
    ) -> Self {
        Self {
            select_screen,
            conditions,
            explain,
        }
    }
}

impl ConditionModule for Briefing {
    fn kind(&self) -> &'static str {
        Self::KIND
    }

    fn hooks(&self) -> Hooks {
        let mut hooks = Hooks::empty();
        hooks.set(Hooks::SELECT_SCREEN, self.select_screen.is_some());
        hooks.set(Hooks::CONDITIONS, !self.conditions.is_empty());
        hooks.set(Hooks::THINGS_TO_EXPLAIN, !self.explain.is_empty());
        hooks
    }

    fn select_screen(&self, _ctx: &ScenarioContext) -> Option<SelectScreenSpec> {
        self.select_screen.clone()
    }

    fn conditions(&self, _ctx: &ScenarioContext) -> Vec<ConditionSpec> {
        self.conditions.clone()
    }

    fn things_to_explain(&self, _ctx: &ScenarioContext) -> Vec<String> {
        self.explain.clone()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
