use mission_runtime::{FlagStoreError, LocalizationError};
use thiserror::Error;

use crate::composer::MissionCatalogError;

/// Failures surfaced to the host from composition, dispatch and queries.
///
/// Configuration variants are fatal and name the offending module or hook.
/// Handler failures abort the rest of the dispatch that raised them; effects
/// committed before the failure remain in place.
#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error("'{owner}' requires hook '{hook}' but no implementation is provided")]
    MissingHook { owner: String, hook: String },
    #[error("invalid parameter '{parameter}' for '{owner}': {reason}")]
    InvalidParameter {
        owner: String,
        parameter: &'static str,
        reason: String,
    },
    #[error("module '{0}' is already registered in this scenario")]
    DuplicateModule(String),
    #[error("module '{0}' has already been activated")]
    AlreadyActive(String),
    #[error("unknown mission '{0}'")]
    UnknownMission(String),
    #[error("action '{action}' payload is missing field '{field}'")]
    InvalidPayload { action: String, field: &'static str },
    #[error("quest kind '{0}' has already been started")]
    QuestAlreadyStarted(String),
    #[error("unknown quest kind '{0}'")]
    UnknownQuestKind(String),
    #[error(transparent)]
    Flags(#[from] FlagStoreError),
    #[error(transparent)]
    Localization(#[from] LocalizationError),
    #[error(transparent)]
    Catalog(#[from] MissionCatalogError),
}

impl ScenarioError {
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            ScenarioError::MissingHook { .. }
                | ScenarioError::InvalidParameter { .. }
                | ScenarioError::DuplicateModule(_)
                | ScenarioError::AlreadyActive(_)
                | ScenarioError::UnknownMission(_)
                | ScenarioError::Catalog(_)
        )
    }
}
