use std::path::{Path, PathBuf};
use std::process;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tiler_wm::common::config::{Config, config_file};
use tiler_wm::common::log;
use tiler_wm::sys::sim::Scenario;

#[derive(Parser)]
struct Cli {
    /// Path to configuration file to use (overrides default).
    #[arg(long, value_name = "PATH", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a scripted session against an in-memory window manager and
    /// print the resulting layout.
    Simulate {
        /// RON file describing monitors and steps.
        script: PathBuf,

        /// Print final window frames as JSON instead of the layout trees.
        #[arg(long)]
        json: bool,
    },
    /// Parse and validate the configuration file.
    CheckConfig,
}

fn main() {
    let opt = Cli::parse();
    log::init_logging();

    let config_path = opt.config.clone().unwrap_or_else(config_file);
    let result = match &opt.command {
        Commands::Simulate { script, json } => simulate(&config_path, script, *json),
        Commands::CheckConfig => check_config(&config_path),
    };
    if let Err(e) = result {
        eprintln!("{e:#}");
        process::exit(1);
    }
}

fn check_config(config_path: &Path) -> anyhow::Result<()> {
    let config = Config::read(config_path)
        .with_context(|| format!("Could not read {}", config_path.display()))?;
    let issues = config.validate();
    if issues.is_empty() {
        println!("Config validation passed");
        return Ok(());
    }
    for issue in issues {
        eprintln!("{}", issue);
    }
    process::exit(1);
}

fn simulate(config_path: &Path, script: &Path, json: bool) -> anyhow::Result<()> {
    let config = Config::read_or_default(config_path)
        .with_context(|| format!("Could not read {}", config_path.display()))?;
    let issues = config.validate();
    if !issues.is_empty() {
        anyhow::bail!("Invalid config:\n{}", issues.join("\n"));
    }
    let buf = std::fs::read_to_string(script)
        .with_context(|| format!("Could not read {}", script.display()))?;
    let scenario = Scenario::parse(&buf)?;

    let (host, registry) = scenario.run(config.settings);
    if json {
        println!("{}", serde_json::to_string_pretty(&host.report(&registry))?);
    } else {
        print!("{}", registry.debug_tree());
    }
    for key in registry.keys() {
        let issues = registry.root(key).map(|root| root.validate()).unwrap_or_default();
        for issue in issues {
            eprintln!("{key:?}: {issue}");
        }
    }
    Ok(())
}
