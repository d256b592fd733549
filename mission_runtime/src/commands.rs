use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Commands the core issues to the host. The host commits each command
/// synchronously before control returns to the issuer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum HostCommand {
    /// Advance the technology tier by exactly one, saturating at `max_tier`.
    UpgradeTier { max_tier: u8 },
    /// Generic world-state write keyed by a host-defined path.
    UpdateWorld { key: String, value: JsonValue },
}

impl HostCommand {
    pub fn name(&self) -> &'static str {
        match self {
            HostCommand::UpgradeTier { .. } => "upgrade_tier",
            HostCommand::UpdateWorld { .. } => "update_world",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IssuedCommand {
    pub sequence: u64,
    pub issuer: String,
    pub command: HostCommand,
}

/// Append-only record of every command issued during a mission.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CommandLog {
    entries: Vec<IssuedCommand>,
}

impl CommandLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, issuer: impl Into<String>, command: HostCommand) -> &IssuedCommand {
        let sequence = self.entries.len() as u64;
        self.entries.push(IssuedCommand {
            sequence,
            issuer: issuer.into(),
            command,
        });
        &self.entries[self.entries.len() - 1]
    }

    pub fn entries(&self) -> &[IssuedCommand] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn count_named(&self, name: &str) -> usize {
        self.entries
            .iter()
            .filter(|entry| entry.command.name() == name)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_assigns_increasing_sequence_numbers() {
        let mut log = CommandLog::new();
        log.record("tech", HostCommand::UpgradeTier { max_tier: 3 });
        let second = log
            .record(
                "quests",
                HostCommand::UpdateWorld {
                    key: "quests.active".to_string(),
                    value: JsonValue::from(1),
                },
            )
            .sequence;
        assert_eq!(second, 1);
        assert_eq!(log.count_named("upgrade_tier"), 1);
        assert_eq!(log.count_named("update_world"), 1);
    }

    #[test]
    fn commands_serialize_with_tag() {
        let json = serde_json::to_value(HostCommand::UpgradeTier { max_tier: 4 })
            .expect("command should serialize");
        assert_eq!(json["command"], "upgrade_tier");
        assert_eq!(json["max_tier"], 4);
    }
}
