use anyhow::{Context, Result};
use clap::Parser;
use petri_core::{init_logging_with_level, AppConfig, Population};
use petri_lib::{Ancestor, AncestorParams};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(author, version, about = "Runs a petri population headless", long_about = None)]
struct Args {
    /// Config file path
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Number of updates to run
    #[arg(short, long, default_value_t = 1000)]
    updates: u64,

    /// Override the world seed
    #[arg(short, long)]
    seed: Option<u64>,

    /// Write a snapshot here when the run ends (`.gz` compresses)
    #[arg(long)]
    save: Option<PathBuf>,

    /// Resume from a snapshot taken under the same config
    #[arg(long)]
    load: Option<PathBuf>,

    /// Log at debug level
    #[arg(short, long)]
    verbose: bool,
}

/// Settings in `config.toml` that belong to the runner rather than the core.
#[derive(Deserialize, Debug, Default)]
#[serde(default)]
struct RunnerSection {
    ancestor: AncestorParams,
    /// Cell the first ancestor is injected into; defaults to the centre.
    inject_cell: Option<usize>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(default)]
struct RunnerFile {
    runner: RunnerSection,
}

#[derive(Serialize, Debug)]
struct RunSummary {
    seed: u64,
    update: u64,
    organisms: usize,
    genotypes: usize,
    average_merit: f64,
    max_generation: u64,
    resources: Vec<(String, f64)>,
}

fn load_config(path: &Path) -> Result<(AppConfig, RunnerSection)> {
    if !path.exists() {
        tracing::warn!(?path, "Config file not found, using defaults");
        return Ok((AppConfig::default(), RunnerSection::default()));
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    let config = AppConfig::from_toml(&content)
        .with_context(|| format!("invalid config {}", path.display()))?;
    let file: RunnerFile = toml::from_str(&content)?;
    Ok((config, file.runner))
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging_with_level(if args.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    });

    let (mut config, runner) = load_config(&args.config)?;
    if let Some(seed) = args.seed {
        config.world.seed = Some(seed);
    }
    let fingerprint = config.fingerprint();
    let mut population = Population::new(config)?;
    let params = runner.ancestor;

    if let Some(path) = &args.load {
        let file = petri_io::load_snapshot(path, Some(&fingerprint))?;
        let seed = population.seed();
        population.restore(&file.snapshot, |record| {
            Ancestor::boxed(params, seed ^ record.cell_id as u64)
        })?;
        tracing::info!(
            run_id = %file.run_id,
            update = population.update_number(),
            organisms = population.live_count(),
            "Snapshot restored"
        );
    } else {
        let (width, height) = population.resources().dimensions();
        let cell = runner
            .inject_cell
            .unwrap_or((height / 2) * width + width / 2);
        let seed = population.seed();
        population.inject(cell, Ancestor::boxed(params, seed), 1.0)?;
    }

    for _ in 0..args.updates {
        population.tick()?;
        if population.live_count() == 0 {
            tracing::info!(update = population.update_number(), "Population extinct");
            break;
        }
    }

    if let Some(path) = &args.save {
        let run_id = petri_io::save_snapshot(&population.snapshot(), &fingerprint, path)?;
        tracing::info!(%run_id, ?path, "Snapshot saved");
    }

    let stats = population.stats();
    let summary = RunSummary {
        seed: population.seed(),
        update: population.update_number(),
        organisms: population.live_count(),
        genotypes: stats.genotypes,
        average_merit: stats.average_merit,
        max_generation: stats.max_generation,
        resources: stats.resource_levels.clone(),
    };
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
