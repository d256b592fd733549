//! Mission manifests: the declarative description of which condition modules a
//! game mode or mission composes, in which order, with which parameters.

use std::collections::HashSet;
use std::fmt;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct MissionCatalogFile {
    pub missions: Vec<MissionManifest>,
}

impl MissionCatalogFile {
    pub fn parse_str(contents: &str) -> Result<Self, ManifestError> {
        let file: MissionCatalogFile = serde_json::from_str(contents).map_err(|err| {
            ManifestError::Parse(err.to_string())
        })?;
        file.validate()?;
        Ok(file)
    }

    pub fn validate(&self) -> Result<(), ManifestError> {
        let mut errors = Vec::new();
        let mut seen = HashSet::new();
        for mission in &self.missions {
            if !seen.insert(mission.id.as_str()) {
                errors.push(format!("duplicate mission id '{}'", mission.id));
            }
            errors.extend(mission.problems());
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ManifestError::Invalid(errors))
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct MissionManifest {
    pub id: String,
    #[serde(default)]
    pub title_key: Option<String>,
    /// Static data packages loaded alongside the modules.
    #[serde(default)]
    pub packages: Vec<String>,
    /// Hooks at least one module of the mission must implement.
    #[serde(default)]
    pub requires: Vec<HookName>,
    pub modules: Vec<ModuleSpec>,
}

impl MissionManifest {
    pub fn validate(&self) -> Result<(), ManifestError> {
        let errors = self.problems();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ManifestError::Invalid(errors))
        }
    }

    fn problems(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.id.trim().is_empty() {
            errors.push("mission id cannot be empty".to_string());
        }
        if self.modules.is_empty() {
            errors.push(format!("mission '{}' declares no modules", self.id));
        }
        let mut keys = HashSet::new();
        for module in &self.modules {
            let key = module.registration_key();
            if !keys.insert(key.clone()) {
                errors.push(format!(
                    "mission '{}' registers module '{key}' twice",
                    self.id
                ));
            }
        }
        let progressions = self
            .modules
            .iter()
            .filter(|module| matches!(module, ModuleSpec::TechProgression { .. }))
            .count();
        if progressions > 1 {
            errors.push(format!(
                "mission '{}' declares {progressions} tech_progression modules",
                self.id
            ));
        }
        errors
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum HookName {
    ScoringRules,
    PerksAvailable,
    PotentialTechs,
    SelectScreen,
    Conditions,
    ThingsToExplain,
}

impl HookName {
    pub fn as_str(&self) -> &'static str {
        match self {
            HookName::ScoringRules => "scoring_rules",
            HookName::PerksAvailable => "perks_available",
            HookName::PotentialTechs => "potential_techs",
            HookName::SelectScreen => "select_screen",
            HookName::Conditions => "conditions",
            HookName::ThingsToExplain => "things_to_explain",
        }
    }
}

impl fmt::Display for HookName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One condition module and its constructor arguments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModuleSpec {
    StandardScoring {
        #[serde(default)]
        exclude: Vec<String>,
    },
    EmpireSizeOverride {
        provider: String,
    },
    TechProgression {
        #[serde(default)]
        ruleset: RulesetKind,
        #[serde(default)]
        counts_non_root: Option<bool>,
    },
    MapLayout {
        #[serde(default)]
        layout: LayoutParams,
    },
    QuestBoard {
        /// Offers are vetoed while every active member is at or above this satisfaction.
        #[serde(default)]
        suppress_when_satisfied: Option<f32>,
    },
    Perks {
        perks: Vec<String>,
    },
    TechPattern {
        techs: Vec<String>,
    },
    Briefing {
        #[serde(default)]
        select_screen: Option<SelectScreenSpec>,
        #[serde(default)]
        conditions: Vec<ConditionSpec>,
        #[serde(default)]
        explain: Vec<String>,
    },
}

impl ModuleSpec {
    pub fn kind_name(&self) -> &'static str {
        match self {
            ModuleSpec::StandardScoring { .. } => "standard_scoring",
            ModuleSpec::EmpireSizeOverride { .. } => "empire_size_override",
            ModuleSpec::TechProgression { .. } => "tech_progression",
            ModuleSpec::MapLayout { .. } => "map_layout",
            ModuleSpec::QuestBoard { .. } => "quest_board",
            ModuleSpec::Perks { .. } => "perks",
            ModuleSpec::TechPattern { .. } => "tech_pattern",
            ModuleSpec::Briefing { .. } => "briefing",
        }
    }

    /// Stable identity derived from the constructor arguments, used to look the
    /// module up after composition. Object keys serialize sorted, so equal
    /// arguments always yield the same key.
    pub fn registration_key(&self) -> String {
        let kind = self.kind_name();
        match serde_json::to_value(self) {
            Ok(JsonValue::Object(mut args)) => {
                args.remove("kind");
                format!("{kind}{}", JsonValue::Object(args))
            }
            _ => kind.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum RulesetKind {
    /// Three tiers, two inventions per level, only root techs advance.
    #[default]
    Base,
    /// Four tiers, everything inventable immediately, every tech advances.
    Simplified,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct LayoutParams {
    pub chain_length: usize,
    pub step_distance: f32,
    pub ratio_window: [f32; 2],
    pub max_attempts: u32,
    pub terminal: ZoneTable,
    pub interior: ZoneTable,
}

impl Default for LayoutParams {
    fn default() -> Self {
        Self {
            chain_length: 4,
            step_distance: 9.0,
            ratio_window: [0.86, 0.92],
            max_attempts: 100,
            terminal: ZoneTable {
                zones_per_center: 2,
                point_count: [3, 5],
                inner_radius: 1.5,
                outer_radius: 3.5,
                link_value: 0.6,
            },
            interior: ZoneTable {
                zones_per_center: 3,
                point_count: [4, 8],
                inner_radius: 2.0,
                outer_radius: 4.5,
                link_value: 1.0,
            },
        }
    }
}

/// Zone parameters for one center classification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ZoneTable {
    pub zones_per_center: u32,
    /// Inclusive point-count range per zone.
    pub point_count: [u32; 2],
    pub inner_radius: f32,
    pub outer_radius: f32,
    pub link_value: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SelectScreenSpec {
    pub id: String,
    pub title_key: String,
    #[serde(default)]
    pub options: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ConditionOutcome {
    Victory,
    Defeat,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ConditionSpec {
    pub id: String,
    pub outcome: ConditionOutcome,
    pub description_key: String,
    #[serde(default)]
    pub target: Option<i64>,
}

/// Why a mission catalog or manifest was refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ManifestError {
    #[error("failed to parse mission catalog JSON: {0}")]
    Parse(String),
    /// Every problem found, so authors can fix a catalog in one pass.
    #[error("{}", .0.join("; "))]
    Invalid(Vec<String>),
}

impl ManifestError {
    /// Individual problems; a parse failure is a single problem.
    pub fn problems(&self) -> Vec<String> {
        match self {
            ManifestError::Parse(_) => vec![self.to_string()],
            ManifestError::Invalid(problems) => problems.clone(),
        }
    }
}

pub fn manifest_schema() -> schemars::schema::RootSchema {
    schemars::schema_for!(MissionCatalogFile)
}
