//! Data contracts shared between the mission core and its host.
//!
//! Everything here is plain serialisable data: trigger payloads, technology
//! descriptors, generated layout output, quest offers and score breakdowns.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map as JsonMap, Value as JsonValue};

/// Tag that prevents an invented technology from advancing the tier.
pub const NO_TIER_ADVANCE_TAG: &str = "no_tier_advance";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerKind {
    ScenarioSetup,
    GameLoaded,
    GameWorldSetup,
    MapSetup,
    TechInvented,
    ActionTaken,
}

impl TriggerKind {
    pub const ALL: [TriggerKind; 6] = [
        TriggerKind::ScenarioSetup,
        TriggerKind::GameLoaded,
        TriggerKind::GameWorldSetup,
        TriggerKind::MapSetup,
        TriggerKind::TechInvented,
        TriggerKind::ActionTaken,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TriggerKind::ScenarioSetup => "scenario_setup",
            TriggerKind::GameLoaded => "game_loaded",
            TriggerKind::GameWorldSetup => "game_world_setup",
            TriggerKind::MapSetup => "map_setup",
            TriggerKind::TechInvented => "tech_invented",
            TriggerKind::ActionTaken => "action_taken",
        }
    }
}

impl fmt::Display for TriggerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle event fired by the host. Payloads are only valid for the
/// duration of a single dispatch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "trigger", rename_all = "snake_case")]
pub enum Trigger {
    ScenarioSetup,
    GameLoaded,
    GameWorldSetup,
    MapSetup {
        seed: u64,
    },
    TechInvented {
        tech: TechKind,
    },
    ActionTaken {
        action: String,
        #[serde(default)]
        payload: JsonMap<String, JsonValue>,
    },
}

impl Trigger {
    pub fn kind(&self) -> TriggerKind {
        match self {
            Trigger::ScenarioSetup => TriggerKind::ScenarioSetup,
            Trigger::GameLoaded => TriggerKind::GameLoaded,
            Trigger::GameWorldSetup => TriggerKind::GameWorldSetup,
            Trigger::MapSetup { .. } => TriggerKind::MapSetup,
            Trigger::TechInvented { .. } => TriggerKind::TechInvented,
            Trigger::ActionTaken { .. } => TriggerKind::ActionTaken,
        }
    }

    pub fn action(action: impl Into<String>, payload: JsonMap<String, JsonValue>) -> Self {
        Trigger::ActionTaken {
            action: action.into(),
            payload,
        }
    }
}

/// Static description of a technology as seen by the progression rules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TechKind {
    pub id: String,
    pub base_tier: u8,
    #[serde(default)]
    pub upgrade: bool,
    #[serde(default)]
    pub root: bool,
    #[serde(default)]
    pub tags: BTreeSet<String>,
}

impl TechKind {
    pub fn new(id: impl Into<String>, base_tier: u8) -> Self {
        Self {
            id: id.into(),
            base_tier: base_tier.min(4),
            upgrade: false,
            root: false,
            tags: BTreeSet::new(),
        }
    }

    pub fn as_root(mut self) -> Self {
        self.root = true;
        self
    }

    pub fn as_upgrade(mut self) -> Self {
        self.upgrade = true;
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.insert(tag.into());
        self
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.contains(tag)
    }

    pub fn skips_tier_advance(&self) -> bool {
        self.has_tag(NO_TIER_ADVANCE_TAG)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Inventability {
    Skipped,
    Available,
    Locked,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point2 {
    pub x: f32,
    pub y: f32,
}

impl Point2 {
    pub const ORIGIN: Point2 = Point2 { x: 0.0, y: 0.0 };

    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &Point2) -> f32 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }
}

/// Ring-shaped cluster of placement points around one generated center.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneSpec {
    pub center_index: usize,
    pub center: Point2,
    pub terminal: bool,
    pub point_count: u32,
    pub link_value: f32,
    pub points: Vec<Point2>,
}

/// Diagnostics recorded by the rejection sampler.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SamplingReport {
    pub attempts: u32,
    /// Ratio of the retained chain.
    pub ratio: f32,
    /// Ratio closest to the acceptance window across all attempts.
    pub best_ratio: f32,
    pub accepted: bool,
}

/// Output of the layout generator consumed by map instantiation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapLayoutSpec {
    pub seed: u64,
    pub centers: Vec<Point2>,
    /// Zones from every center, ascending by point count.
    pub zones: Vec<ZoneSpec>,
    pub point_counts: Vec<u32>,
    pub link_values: Vec<f32>,
    pub start: Point2,
    pub end: Point2,
    pub sampling: SamplingReport,
}

impl MapLayoutSpec {
    pub fn total_points(&self) -> u32 {
        self.point_counts.iter().sum()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RaceId(pub String);

impl fmt::Display for RaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QuestKindId(pub String);

impl fmt::Display for QuestKindId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A faction member as reported by the host world.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactionMember {
    pub id: String,
    pub race: RaceId,
    #[serde(default)]
    pub satisfaction: f32,
    #[serde(default = "default_member_active")]
    pub active: bool,
}

fn default_member_active() -> bool {
    true
}

impl FactionMember {
    pub fn new(id: impl Into<String>, race: impl Into<String>, satisfaction: f32) -> Self {
        Self {
            id: id.into(),
            race: RaceId(race.into()),
            satisfaction,
            active: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestDetail {
    pub target: String,
    pub amount: u32,
    pub reward: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestOffer {
    pub member: String,
    pub race: RaceId,
    pub kind: QuestKindId,
    pub valid: bool,
    pub detail: QuestDetail,
}

/// Inputs the scoring rules read from the empire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EmpireStats {
    pub planets: u32,
    pub political_power: i64,
    pub unfinished_quests: u32,
    pub happiness: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreLine {
    pub rule: String,
    pub variant: String,
    pub points: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub lines: Vec<ScoreLine>,
    pub total: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trigger_kind_matches_variant() {
        let trigger = Trigger::TechInvented {
            tech: TechKind::new("mining", 1),
        };
        assert_eq!(trigger.kind(), TriggerKind::TechInvented);
        assert_eq!(Trigger::MapSetup { seed: 3 }.kind(), TriggerKind::MapSetup);
    }

    #[test]
    fn trigger_parses_from_tagged_json() {
        let trigger: Trigger = serde_json::from_str(
            r#"{"trigger":"action_taken","action":"accept_quest","payload":{"kind":"deliver_food"}}"#,
        )
        .expect("trigger json should parse");
        match trigger {
            Trigger::ActionTaken { action, payload } => {
                assert_eq!(action, "accept_quest");
                assert_eq!(payload["kind"], "deliver_food");
            }
            other => panic!("unexpected trigger {other:?}"),
        }
    }

    #[test]
    fn tech_kind_reports_skip_tag() {
        let tech = TechKind::new("archive", 2).with_tag(NO_TIER_ADVANCE_TAG);
        assert!(tech.skips_tier_advance());
        assert!(!TechKind::new("archive", 2).skips_tier_advance());
    }

    #[test]
    fn base_tier_is_capped() {
        assert_eq!(TechKind::new("singularity", 9).base_tier, 4);
    }
}
