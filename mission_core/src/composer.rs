use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use mission_runtime::{
    ConditionSpec, EmpireStats, FlagStore, HookName, ManifestError, MapLayoutSpec,
    MissionCatalogFile, MissionManifest, ModuleSpec, ScoreBreakdown, SelectScreenSpec,
    StringCatalog, Trigger,
};
use thiserror::Error;

use crate::{
    briefing::{Briefing, Perks, TechPattern},
    context::ScenarioContext,
    error::ScenarioError,
    module::{ConditionModule, Hooks},
    procgen::{GeneratedLayout, MapLayout},
    progression::{ProgressionGate, TechProgression},
    quests::{QuestBoard, QuestOfferGenerator, QuestRegistry, SuppressWhenContent},
    scoring::{
        builtin_providers, EmpireSizeOverride, EmpireSizeProvider, ScoringContext, ScoringRule,
        StandardScoring,
    },
};

pub const BUILTIN_MISSION_CATALOG: &str = include_str!("data/mission_catalog.json");
pub const BUILTIN_STRINGS: &str = include_str!("data/strings_en.json");

pub const MISSION_CATALOG_ENV: &str = "MISSION_CATALOG_PATH";
pub const MISSION_STRINGS_ENV: &str = "MISSION_STRINGS_PATH";

/// RNG key for the seed handed to `MapSetup` by the standard setup sequence.
pub const MAP_SEED_KEY: &str = "map";

#[derive(Debug, Error)]
pub enum MissionCatalogError {
    #[error("failed to parse mission data: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid mission catalog: {0}")]
    Invalid(#[from] ManifestError),
    #[error("failed to read mission data from {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

pub fn builtin_strings() -> StringCatalog {
    StringCatalog::from_json_str(BUILTIN_STRINGS).expect("builtin strings should parse")
}

pub fn strings_from_file(path: &Path) -> Result<StringCatalog, MissionCatalogError> {
    let contents = fs::read_to_string(path).map_err(|source| MissionCatalogError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(StringCatalog::from_json_str(&contents)?)
}

#[derive(Debug, Clone)]
pub struct MissionCatalog {
    missions: Vec<MissionManifest>,
}

impl MissionCatalog {
    pub fn builtin() -> Arc<Self> {
        let catalog = Self::from_json_str(BUILTIN_MISSION_CATALOG)
            .expect("builtin mission catalog should parse");
        Arc::new(catalog)
    }

    pub fn from_json_str(json: &str) -> Result<Self, MissionCatalogError> {
        let file = MissionCatalogFile::parse_str(json)?;
        Ok(Self {
            missions: file.missions,
        })
    }

    pub fn from_file(path: &Path) -> Result<Self, MissionCatalogError> {
        let contents = fs::read_to_string(path).map_err(|source| MissionCatalogError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&contents)
    }

    pub fn mission(&self, id: &str) -> Option<&MissionManifest> {
        self.missions.iter().find(|mission| mission.id == id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.missions.iter().map(|mission| mission.id.as_str())
    }

    pub fn missions(&self) -> &[MissionManifest] {
        &self.missions
    }

    pub fn len(&self) -> usize {
        self.missions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.missions.is_empty()
    }
}

/// Where a piece of mission data came from; `None` means the builtin copy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MissionDataSource {
    path: Option<PathBuf>,
}

impl MissionDataSource {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self { path }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

fn load_from_env<T>(
    env_var: &str,
    kind: &str,
    load: impl Fn(&Path) -> Result<T, MissionCatalogError>,
    builtin: impl FnOnce() -> T,
) -> (T, MissionDataSource) {
    if let Some(path) = env::var(env_var).ok().map(PathBuf::from) {
        match load(&path) {
            Ok(value) => {
                tracing::info!(
                    target: "mission::composer",
                    kind,
                    path = %path.display(),
                    "mission_data.loaded=file"
                );
                return (value, MissionDataSource::new(Some(path)));
            }
            Err(err) => {
                tracing::warn!(
                    target: "mission::composer",
                    kind,
                    path = %path.display(),
                    error = %err,
                    "mission_data.load_failed"
                );
            }
        }
    }
    tracing::debug!(target: "mission::composer", kind, "mission_data.loaded=builtin");
    (builtin(), MissionDataSource::default())
}

/// Mission catalog from `MISSION_CATALOG_PATH`, or the builtin catalog when
/// the variable is unset or the file fails to load.
pub fn load_mission_catalog_from_env() -> (Arc<MissionCatalog>, MissionDataSource) {
    load_from_env(
        MISSION_CATALOG_ENV,
        "mission_catalog",
        |path| MissionCatalog::from_file(path).map(Arc::new),
        MissionCatalog::builtin,
    )
}

pub fn load_strings_from_env() -> (Arc<StringCatalog>, MissionDataSource) {
    load_from_env(
        MISSION_STRINGS_ENV,
        "strings",
        |path| strings_from_file(path).map(Arc::new),
        || Arc::new(builtin_strings()),
    )
}

struct RegisteredModule {
    key: String,
    module: Box<dyn ConditionModule>,
}

/// A composed mission: its modules, in declared order, and their context.
pub struct Scenario {
    mission: String,
    packages: Vec<String>,
    modules: Vec<RegisteredModule>,
    ctx: ScenarioContext,
}

impl Scenario {
    pub fn new(mission: impl Into<String>, ctx: ScenarioContext) -> Self {
        Self {
            mission: mission.into(),
            packages: Vec::new(),
            modules: Vec::new(),
            ctx,
        }
    }

    pub fn with_packages(mut self, packages: Vec<String>) -> Self {
        self.packages = packages;
        self
    }

    pub fn mission(&self) -> &str {
        &self.mission
    }

    pub fn packages(&self) -> &[String] {
        &self.packages
    }

    pub fn context(&self) -> &ScenarioContext {
        &self.ctx
    }

    pub fn context_mut(&mut self) -> &mut ScenarioContext {
        &mut self.ctx
    }

    /// Activates `module` under `key` and adds it. A module whose activation
    /// fails is not registered.
    pub fn add_module(
        &mut self,
        key: impl Into<String>,
        mut module: Box<dyn ConditionModule>,
    ) -> Result<(), ScenarioError> {
        let key = key.into();
        if self.modules.iter().any(|entry| entry.key == key) {
            return Err(ScenarioError::DuplicateModule(key));
        }
        if let Err(err) = module.activate(&key, &mut self.ctx) {
            module.deactivate(&mut self.ctx);
            return Err(err);
        }
        tracing::debug!(
            target: "mission::composer",
            mission = %self.mission,
            module = %key,
            kind = module.kind(),
            "scenario.module.activated"
        );
        self.modules.push(RegisteredModule { key, module });
        Ok(())
    }

    /// Ends the mission: modules drop their subscriptions in reverse order
    /// and are destroyed. The context, with its flags, is handed back.
    pub fn end(mut self) -> ScenarioContext {
        while let Some(mut entry) = self.modules.pop() {
            entry.module.deactivate(&mut self.ctx);
            tracing::debug!(
                target: "mission::composer",
                mission = %self.mission,
                module = %entry.key,
                "scenario.module.deactivated"
            );
        }
        self.ctx
    }

    pub fn module_keys(&self) -> impl Iterator<Item = &str> {
        self.modules.iter().map(|entry| entry.key.as_str())
    }

    /// Typed lookup by registration key.
    pub fn module<T: ConditionModule>(&self, key: &str) -> Option<&T> {
        self.modules
            .iter()
            .find(|entry| entry.key == key)
            .and_then(|entry| entry.module.as_any().downcast_ref::<T>())
    }

    /// First module of type `T`, with its registration key.
    pub fn find_module<T: ConditionModule>(&self) -> Option<(&str, &T)> {
        self.modules.iter().find_map(|entry| {
            entry
                .module
                .as_any()
                .downcast_ref::<T>()
                .map(|module| (entry.key.as_str(), module))
        })
    }

    pub fn hooks(&self) -> Hooks {
        self.modules
            .iter()
            .fold(Hooks::empty(), |hooks, entry| hooks | entry.module.hooks())
    }

    /// Fails with the first required hook no module provides.
    pub fn require_hooks(&self, required: &[HookName]) -> Result<(), ScenarioError> {
        let provided = self.hooks();
        match required
            .iter()
            .find(|hook| !provided.contains(Hooks::from(**hook)))
        {
            Some(hook) => Err(ScenarioError::MissingHook {
                owner: self.mission.clone(),
                hook: hook.to_string(),
            }),
            None => Ok(()),
        }
    }

    pub fn fire(&mut self, trigger: &Trigger) -> Result<(), ScenarioError> {
        self.ctx.dispatch(trigger)
    }

    /// ScenarioSetup, GameWorldSetup, then MapSetup with a seed derived from
    /// the scenario seed.
    pub fn run_setup(&mut self) -> Result<(), ScenarioError> {
        let map_seed = self.ctx.rng().seed_for(MAP_SEED_KEY);
        self.fire(&Trigger::ScenarioSetup)?;
        self.fire(&Trigger::GameWorldSetup)?;
        self.fire(&Trigger::MapSetup { seed: map_seed })?;
        tracing::info!(
            target: "mission::composer",
            mission = %self.mission,
            map_seed,
            "scenario.setup.complete"
        );
        Ok(())
    }

    /// Restores persisted flags and fires GameLoaded.
    pub fn load(&mut self, flags: FlagStore) -> Result<(), ScenarioError> {
        self.ctx.restore_flags(flags);
        self.fire(&Trigger::GameLoaded)
    }

    pub fn scoring_rules(&self) -> Vec<Box<dyn ScoringRule>> {
        self.modules
            .iter()
            .flat_map(|entry| entry.module.scoring_rules(&self.ctx))
            .collect()
    }

    pub fn perks_available(&self) -> Vec<String> {
        self.modules
            .iter()
            .flat_map(|entry| entry.module.perks_available(&self.ctx))
            .collect()
    }

    pub fn potential_techs(&self) -> Vec<String> {
        self.modules
            .iter()
            .flat_map(|entry| entry.module.potential_techs(&self.ctx))
            .collect()
    }

    /// The first select screen offered, in module order.
    pub fn select_screen(&self) -> Option<SelectScreenSpec> {
        self.modules
            .iter()
            .find_map(|entry| entry.module.select_screen(&self.ctx))
    }

    pub fn conditions(&self) -> Vec<ConditionSpec> {
        self.modules
            .iter()
            .flat_map(|entry| entry.module.conditions(&self.ctx))
            .collect()
    }

    pub fn things_to_explain(&self) -> Vec<String> {
        self.modules
            .iter()
            .flat_map(|entry| entry.module.things_to_explain(&self.ctx))
            .collect()
    }

    pub fn tech_progression(&self) -> Option<&TechProgression> {
        self.find_module::<TechProgression>().map(|(_, module)| module)
    }

    pub fn quest_board(&self) -> Option<&QuestBoard> {
        self.find_module::<QuestBoard>().map(|(_, module)| module)
    }

    pub fn layout(&self) -> Option<&MapLayoutSpec> {
        self.ctx
            .world()
            .get_resource::<GeneratedLayout>()
            .map(|generated| &generated.0)
    }

    pub fn installed_rules(&self) -> Vec<&'static str> {
        self.ctx
            .world()
            .get_resource::<ScoringContext>()
            .map(ScoringContext::rule_names)
            .unwrap_or_default()
    }

    pub fn score(&self, stats: &EmpireStats) -> ScoreBreakdown {
        self.ctx
            .world()
            .get_resource::<ScoringContext>()
            .map(|scoring| scoring.score(stats))
            .unwrap_or_default()
    }
}

impl std::fmt::Debug for Scenario {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scenario")
            .field("mission", &self.mission)
            .field("modules", &self.module_keys().collect::<Vec<_>>())
            .field("ctx", &self.ctx)
            .finish()
    }
}

/// Builds scenarios from mission manifests.
#[derive(Debug, Clone)]
pub struct ScenarioComposer {
    catalog: Arc<MissionCatalog>,
    strings: Arc<StringCatalog>,
    quests: Arc<QuestRegistry>,
    providers: BTreeMap<String, Arc<dyn EmpireSizeProvider>>,
}

impl ScenarioComposer {
    pub fn new(catalog: Arc<MissionCatalog>, strings: Arc<StringCatalog>) -> Self {
        let mut composer = Self {
            catalog,
            strings,
            quests: Arc::new(QuestRegistry::builtin()),
            providers: BTreeMap::new(),
        };
        for provider in builtin_providers() {
            composer.register_provider(provider);
        }
        composer
    }

    pub fn builtin() -> Self {
        Self::new(MissionCatalog::builtin(), Arc::new(builtin_strings()))
    }

    pub fn from_env() -> Self {
        let (catalog, _) = load_mission_catalog_from_env();
        let (strings, _) = load_strings_from_env();
        Self::new(catalog, strings)
    }

    pub fn with_quest_registry(mut self, registry: QuestRegistry) -> Self {
        self.quests = Arc::new(registry);
        self
    }

    /// Makes `provider` available to `empire_size_override` modules by name.
    pub fn register_provider(&mut self, provider: Arc<dyn EmpireSizeProvider>) {
        self.providers.insert(provider.name().to_string(), provider);
    }

    pub fn catalog(&self) -> &MissionCatalog {
        &self.catalog
    }

    pub fn compose(&self, mission_id: &str, seed: u64) -> Result<Scenario, ScenarioError> {
        let manifest = self
            .catalog
            .mission(mission_id)
            .ok_or_else(|| ScenarioError::UnknownMission(mission_id.to_string()))?;
        self.compose_manifest(manifest, seed)
    }

    pub fn compose_manifest(
        &self,
        manifest: &MissionManifest,
        seed: u64,
    ) -> Result<Scenario, ScenarioError> {
        manifest.validate().map_err(MissionCatalogError::from)?;
        let ctx = ScenarioContext::new(seed, self.strings.clone());
        let mut scenario =
            Scenario::new(manifest.id.clone(), ctx).with_packages(manifest.packages.clone());
        for spec in &manifest.modules {
            let key = spec.registration_key();
            let module = self.build_module(&key, spec)?;
            scenario.add_module(key, module)?;
        }
        scenario.require_hooks(&manifest.requires)?;
        tracing::info!(
            target: "mission::composer",
            mission = %manifest.id,
            seed,
            modules = manifest.modules.len(),
            "scenario.composed"
        );
        Ok(scenario)
    }

    fn build_module(
        &self,
        key: &str,
        spec: &ModuleSpec,
    ) -> Result<Box<dyn ConditionModule>, ScenarioError> {
        let module: Box<dyn ConditionModule> = match spec {
            ModuleSpec::StandardScoring { exclude } => {
                Box::new(StandardScoring::new(exclude.iter().cloned()))
            }
            ModuleSpec::EmpireSizeOverride { provider } => {
                let provider = self.providers.get(provider).cloned().ok_or_else(|| {
                    ScenarioError::MissingHook {
                        owner: key.to_string(),
                        hook: format!("empire_size_provider:{provider}"),
                    }
                })?;
                Box::new(EmpireSizeOverride::new(provider))
            }
            ModuleSpec::TechProgression {
                ruleset,
                counts_non_root,
            } => Box::new(TechProgression::new(ProgressionGate::from_ruleset(
                *ruleset,
                *counts_non_root,
            )?)),
            ModuleSpec::MapLayout { layout } => Box::new(MapLayout::new(layout.clone())?),
            ModuleSpec::QuestBoard {
                suppress_when_satisfied,
            } => {
                let generator = QuestOfferGenerator::new(self.quests.clone());
                let generator = match suppress_when_satisfied {
                    Some(threshold) => generator.with_policy(SuppressWhenContent {
                        threshold: *threshold,
                    }),
                    None => generator,
                };
                Box::new(QuestBoard::new(generator))
            }
            ModuleSpec::Perks { perks } => Box::new(Perks::new(perks.clone())),
            ModuleSpec::TechPattern { techs } => Box::new(TechPattern::new(techs.clone())),
            ModuleSpec::Briefing {
                select_screen,
                conditions,
                explain,
            } => Box::new(Briefing::new(
                select_screen.clone(),
                conditions.clone(),
                explain.clone(),
            )),
        };
        Ok(module)
    }
}
