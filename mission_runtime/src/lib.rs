//! Host-facing contracts for the mission core.
//!
//! This crate re-exports the data contracts from `mission_schema` and adds the
//! pieces the core consumes from its host without depending on the ECS runtime
//! in `mission_core`: command issuance, the persistent flag store, seeded RNG
//! factories, localized string formatting and mission manifests.

pub use mission_schema::*;

pub mod commands;
pub mod flags;
pub mod localization;
pub mod manifest;
pub mod rng;

pub use commands::{CommandLog, HostCommand, IssuedCommand};
pub use flags::{FlagStore, FlagStoreError, FlagValue};
pub use localization::{LocArg, LocalizationError, Localizer, StringCatalog, StringEntry};
pub use manifest::{
    manifest_schema, ConditionOutcome, ConditionSpec, HookName, LayoutParams, ManifestError,
    MissionCatalogFile, MissionManifest, ModuleSpec, RulesetKind, SelectScreenSpec, ZoneTable,
};
pub use rng::{MissionRng, RngFactory};
