use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use bevy_ecs::prelude::*;
use mission_runtime::{
    CommandLog, FlagStore, HostCommand, Localizer, RngFactory, Trigger, TriggerKind,
};
use serde_json::Value as JsonValue;

use crate::{
    bus::{HandlerResult, SubscriptionId, TriggerBus},
    composer::builtin_strings,
    error::ScenarioError,
    progression::TechState,
};

static EMPTY_FLAGS: FlagStore = FlagStore::new();

/// Host-persisted flags, replaced wholesale when a save is loaded.
#[derive(Resource, Debug, Clone, Default)]
pub struct PersistentFlags(pub FlagStore);

/// Values pushed to the host world through [`HostCommand::UpdateWorld`].
#[derive(Resource, Debug, Clone, Default)]
pub struct WorldValues(pub BTreeMap<String, JsonValue>);

/// Everything a module or handler is allowed to touch.
///
/// Shared state lives as resources in a bevy `World`; lifecycle triggers go
/// through the bus; host commands are applied immediately and logged.
pub struct ScenarioContext {
    world: World,
    bus: TriggerBus,
    rng: RngFactory,
    localizer: Arc<dyn Localizer>,
    commands: CommandLog,
    depth: u32,
}

impl ScenarioContext {
    pub fn new(seed: u64, localizer: Arc<dyn Localizer>) -> Self {
        let mut world = World::new();
        world.init_resource::<PersistentFlags>();
        world.init_resource::<WorldValues>();
        Self {
            world,
            bus: TriggerBus::new(),
            rng: RngFactory::new(seed),
            localizer,
            commands: CommandLog::default(),
            depth: 0,
        }
    }

    /// Context backed by the builtin English strings.
    pub fn with_seed(seed: u64) -> Self {
        Self::new(seed, Arc::new(builtin_strings()))
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    pub fn bus(&self) -> &TriggerBus {
        &self.bus
    }

    pub fn bus_mut(&mut self) -> &mut TriggerBus {
        &mut self.bus
    }

    pub fn rng(&self) -> &RngFactory {
        &self.rng
    }

    pub fn localizer(&self) -> &dyn Localizer {
        self.localizer.as_ref()
    }

    pub fn commands(&self) -> &CommandLog {
        &self.commands
    }

    pub fn flags(&self) -> &FlagStore {
        self.world
            .get_resource::<PersistentFlags>()
            .map(|flags| &flags.0)
            .unwrap_or(&EMPTY_FLAGS)
    }

    pub fn flags_mut(&mut self) -> &mut FlagStore {
        &mut self
            .world
            .get_resource_or_insert_with(PersistentFlags::default)
            .into_inner()
            .0
    }

    pub fn restore_flags(&mut self, flags: FlagStore) {
        tracing::debug!(
            target: "mission::composer",
            flags = flags.len(),
            "scenario.flags.restored"
        );
        self.world.insert_resource(PersistentFlags(flags));
    }

    pub fn tech_tier(&self) -> u8 {
        self.world
            .get_resource::<TechState>()
            .map(TechState::tier)
            .unwrap_or(0)
    }

    pub fn world_value(&self, key: &str) -> Option<&JsonValue> {
        self.world
            .get_resource::<WorldValues>()
            .and_then(|values| values.0.get(key))
    }

    pub fn subscribe<F>(&mut self, kind: TriggerKind, owner: &str, handler: F) -> SubscriptionId
    where
        F: Fn(&Trigger, &mut ScenarioContext) -> HandlerResult + 'static,
    {
        self.bus.subscribe(kind, owner, handler)
    }

    /// Delivers `trigger` to a snapshot of its subscribers in subscription
    /// order. The first failing handler aborts the remainder of this dispatch;
    /// effects committed by earlier handlers stay applied.
    pub fn dispatch(&mut self, trigger: &Trigger) -> Result<(), ScenarioError> {
        let kind = trigger.kind();
        let subscribers = self.bus.snapshot(kind);
        self.bus.record_dispatch(kind);
        self.depth += 1;
        tracing::trace!(
            target: "mission::bus",
            kind = %kind,
            handlers = subscribers.len(),
            depth = self.depth,
            "bus.dispatch"
        );

        let mut outcome = Ok(());
        for subscriber in &subscribers {
            if let Err(err) = subscriber.invoke(trigger, self) {
                tracing::warn!(
                    target: "mission::bus",
                    kind = %kind,
                    owner = subscriber.owner(),
                    error = %err,
                    "bus.dispatch.aborted"
                );
                outcome = Err(err);
                break;
            }
        }
        self.depth -= 1;
        outcome
    }

    /// Applies a host command and appends it to the command log.
    pub fn issue(&mut self, issuer: &str, command: HostCommand) {
        match &command {
            HostCommand::UpgradeTier { max_tier } => {
                let mut state = self.world.get_resource_or_insert_with(TechState::default);
                let before = state.tier();
                let advanced = state.apply_upgrade(*max_tier);
                tracing::debug!(
                    target: "mission::commands",
                    issuer,
                    before,
                    after = state.tier(),
                    advanced,
                    "command.upgrade_tier"
                );
            }
            HostCommand::UpdateWorld { key, value } => {
                self.world
                    .get_resource_or_insert_with(WorldValues::default)
                    .0
                    .insert(key.clone(), value.clone());
                tracing::debug!(target: "mission::commands", issuer, key = %key, "command.update_world");
            }
        }
        self.commands.record(issuer, command);
    }
}

impl fmt::Debug for ScenarioContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScenarioContext")
            .field("seed", &self.rng.base_seed())
            .field("bus", &self.bus)
            .field("commands", &self.commands.len())
            .finish_non_exhaustive()
    }
}
