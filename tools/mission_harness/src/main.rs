use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use mission_core::{
    EmpireHoldings, EmpireStats, FactionMember, FactionRoster, Scenario, ScenarioComposer,
    TechKind, Trigger,
};
use mission_runtime::{LayoutParams, RngFactory};
use serde_json::{json, Value as JsonValue};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Composes a mission and prints what the host would see", long_about = None)]
struct Args {
    /// Mission catalog to load instead of MISSION_CATALOG_PATH or the builtin
    #[arg(long, global = true)]
    catalog: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the setup sequence and report hooks, rules and layout
    Setup {
        mission: String,
        #[arg(long, default_value_t = 0)]
        seed: u64,
        /// Empire statistics JSON to score after setup
        #[arg(long)]
        stats: Option<String>,
        /// Invent a tech after setup, as `id:base_tier[:root]`
        #[arg(long = "invent")]
        inventions: Vec<String>,
    },
    /// Generate a layout directly from parameters
    Layout {
        #[arg(long, default_value_t = 0)]
        seed: u64,
        /// Layout parameter overrides as inline JSON
        #[arg(long)]
        params: Option<String>,
    },
    /// Generate quest offers for a roster given as `id:race:satisfaction`
    Offers {
        mission: String,
        #[arg(long, default_value_t = 0)]
        seed: u64,
        #[arg(long = "member")]
        members: Vec<String>,
        /// Resources already held, making deliveries valid
        #[arg(long = "resource")]
        resources: Vec<String>,
        /// Fire accept_quest for this kind before listing offers
        #[arg(long)]
        accept: Option<String>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let composer = composer_for(args.catalog.as_ref())?;
    let output = match args.command {
        Command::Setup {
            mission,
            seed,
            stats,
            inventions,
        } => setup(&composer, &mission, seed, stats.as_deref(), &inventions)?,
        Command::Layout { seed, params } => layout(seed, params.as_deref())?,
        Command::Offers {
            mission,
            seed,
            members,
            resources,
            accept,
        } => offers(&composer, &mission, seed, &members, resources, accept)?,
    };
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn composer_for(catalog: Option<&PathBuf>) -> Result<ScenarioComposer> {
    let Some(path) = catalog else {
        return Ok(ScenarioComposer::from_env());
    };
    let catalog = mission_core::MissionCatalog::from_file(path)
        .with_context(|| format!("Failed to load mission catalog at {}", path.display()))?;
    let (strings, _) = mission_core::load_strings_from_env();
    Ok(ScenarioComposer::new(catalog.into(), strings))
}

fn prepared(composer: &ScenarioComposer, mission: &str, seed: u64) -> Result<Scenario> {
    let mut scenario = composer
        .compose(mission, seed)
        .with_context(|| format!("Failed to compose mission '{mission}'"))?;
    scenario
        .run_setup()
        .with_context(|| format!("Setup failed for mission '{mission}'"))?;
    tracing::info!(
        target: "mission::harness",
        mission,
        seed,
        modules = scenario.module_keys().count(),
        "harness.scenario.ready"
    );
    Ok(scenario)
}

fn setup(
    composer: &ScenarioComposer,
    mission: &str,
    seed: u64,
    stats: Option<&str>,
    inventions: &[String],
) -> Result<JsonValue> {
    let mut scenario = prepared(composer, mission, seed)?;
    for raw in inventions {
        let tech = parse_tech(raw)?;
        scenario
            .fire(&Trigger::TechInvented { tech })
            .with_context(|| format!("Invention '{raw}' failed"))?;
    }
    let tier = scenario
        .tech_progression()
        .map(|progression| progression.tier(scenario.context()));
    let score = match stats {
        Some(raw) => {
            let stats: EmpireStats =
                serde_json::from_str(raw).with_context(|| "Failed to parse --stats JSON")?;
            Some(scenario.score(&stats))
        }
        None => None,
    };
    Ok(json!({
        "mission": scenario.mission(),
        "packages": scenario.packages(),
        "modules": scenario.module_keys().collect::<Vec<_>>(),
        "hooks": scenario.hooks().names(),
        "rules": scenario.installed_rules(),
        "perks": scenario.perks_available(),
        "potential_techs": scenario.potential_techs(),
        "explain": scenario.things_to_explain(),
        "tier": tier,
        "layout": scenario.layout(),
        "score": score,
        "commands": scenario.context().commands().len(),
    }))
}

fn layout(seed: u64, params: Option<&str>) -> Result<JsonValue> {
    let params: LayoutParams = match params {
        Some(raw) => serde_json::from_str(raw).with_context(|| "Failed to parse --params JSON")?,
        None => LayoutParams::default(),
    };
    let generator = mission_core::LayoutGenerator::new(params)?;
    let map_seed = RngFactory::new(seed).seed_for(mission_core::MAP_SEED_KEY);
    Ok(serde_json::to_value(generator.generate(map_seed))?)
}

fn offers(
    composer: &ScenarioComposer,
    mission: &str,
    seed: u64,
    members: &[String],
    resources: Vec<String>,
    accept: Option<String>,
) -> Result<JsonValue> {
    let mut scenario = prepared(composer, mission, seed)?;
    let roster = members
        .iter()
        .map(|raw| parse_member(raw))
        .collect::<Result<Vec<_>>>()?;
    let world = scenario.context_mut().world_mut();
    world.insert_resource(FactionRoster { members: roster });
    world.insert_resource(EmpireHoldings {
        resources: resources.into_iter().collect(),
        ..EmpireHoldings::default()
    });

    if let Some(kind) = accept {
        let mut payload = serde_json::Map::new();
        payload.insert("kind".to_string(), JsonValue::String(kind.clone()));
        scenario
            .fire(&Trigger::action(mission_core::ACCEPT_QUEST_ACTION, payload))
            .with_context(|| format!("Failed to accept quest '{kind}'"))?;
    }

    let board = scenario
        .quest_board()
        .ok_or_else(|| anyhow::anyhow!("Mission '{mission}' has no quest board"))?;
    let offers = board.offers(scenario.context(), seed);
    let flags: Vec<&str> = scenario.context().flags().keys().collect();
    Ok(json!({ "offers": offers, "flags": flags }))
}

fn parse_tech(raw: &str) -> Result<TechKind> {
    let mut parts = raw.split(':');
    let (Some(id), Some(tier)) = (parts.next(), parts.next()) else {
        anyhow::bail!("Tech must be in id:base_tier[:root] form, got '{raw}'");
    };
    let base_tier = tier
        .parse::<u8>()
        .with_context(|| format!("Invalid base tier in '{raw}'"))?;
    let tech = TechKind::new(id, base_tier);
    Ok(match parts.next() {
        Some("root") => tech.as_root(),
        Some(other) => anyhow::bail!("Unknown tech flag '{other}' in '{raw}'"),
        None => tech,
    })
}

fn parse_member(raw: &str) -> Result<FactionMember> {
    let mut parts = raw.split(':');
    let (Some(id), Some(race)) = (parts.next(), parts.next()) else {
        anyhow::bail!("Member must be in id:race[:satisfaction] form, got '{raw}'");
    };
    let satisfaction = match parts.next() {
        Some(value) => value
            .parse::<f32>()
            .with_context(|| format!("Invalid satisfaction in '{raw}'"))?,
        None => 0.5,
    };
    Ok(FactionMember::new(id, race, satisfaction))
}
