use std::env;
use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};

use jsonschema::JSONSchema;
use mission_runtime::{manifest_schema, MissionCatalogFile};

const SCHEMA_PATH: &str = "mission_runtime/schema/mission_catalog.schema.json";
const CATALOG_GLOBS: [&str; 2] = [
    "mission_core/src/data/mission_catalog.json",
    "integration_tests/tests/fixtures/*.json",
];

fn main() -> Result<(), Box<dyn Error>> {
    let mut args = env::args().skip(1);
    match args.next().as_deref() {
        Some("schema") => write_schema(),
        Some("validate") => validate_catalogs(args.collect()),
        Some("help") | None => {
            print_usage();
            Ok(())
        }
        Some(cmd) => {
            eprintln!("Unknown xtask '{cmd}'.");
            print_usage();
            std::process::exit(1);
        }
    }
}

fn print_usage() {
    eprintln!("Usage: cargo xtask schema");
    eprintln!("       cargo xtask validate [catalog.json...]");
    eprintln!("       cargo xtask help");
}

fn write_schema() -> Result<(), Box<dyn Error>> {
    let schema = serde_json::to_string_pretty(&manifest_schema())?;
    let path = Path::new(SCHEMA_PATH);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, schema + "\n")?;
    println!("Wrote mission catalog schema to {}", path.display());
    Ok(())
}

fn validate_catalogs(explicit: Vec<String>) -> Result<(), Box<dyn Error>> {
    let paths = if explicit.is_empty() {
        default_catalogs()?
    } else {
        explicit.into_iter().map(PathBuf::from).collect()
    };
    if paths.is_empty() {
        return Err("no mission catalogs found".into());
    }

    let schema = serde_json::to_value(manifest_schema())?;
    let compiled = JSONSchema::compile(&schema)
        .map_err(|err| format!("mission catalog schema does not compile: {err}"))?;

    let mut failures = 0usize;
    for path in &paths {
        let contents = fs::read_to_string(path)
            .map_err(|err| format!("failed to read {}: {err}", path.display()))?;
        let instance: serde_json::Value = serde_json::from_str(&contents)
            .map_err(|err| format!("{} is not valid JSON: {err}", path.display()))?;

        let mut problems: Vec<String> = match compiled.validate(&instance) {
            Ok(()) => Vec::new(),
            Err(errors) => errors
                .map(|error| format!("{}: {error}", error.instance_path))
                .collect(),
        };
        if problems.is_empty() {
            if let Err(err) = MissionCatalogFile::parse_str(&contents) {
                problems.extend(err.problems());
            }
        }

        if problems.is_empty() {
            println!("ok   {}", path.display());
        } else {
            failures += 1;
            println!("FAIL {}", path.display());
            for problem in problems {
                println!("     {problem}");
            }
        }
    }

    if failures > 0 {
        return Err(format!("{failures} mission catalog(s) failed validation").into());
    }
    Ok(())
}

fn default_catalogs() -> Result<Vec<PathBuf>, Box<dyn Error>> {
    let mut paths = Vec::new();
    for pattern in CATALOG_GLOBS {
        for entry in glob::glob(pattern)? {
            paths.push(entry?);
        }
    }
    Ok(paths)
}
