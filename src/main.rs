use anyhow::{bail, Context, Result};
use clap::{Args as ClapArgs, Parser, Subcommand};
use rand::{Rng, SeedableRng};
use rand::rngs::StdRng;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

use hedge_challenge_sim::report;
use hedge_challenge_sim::simulation::{
    run_repeated, run_sequence, validate_stages, Preset, SimulatorSettings, Stage, StageFile,
};
use hedge_challenge_sim::stats::RepeatedReport;

#[derive(Parser, Debug)]
#[command(name = "hedge-sim")]
#[command(about = "Monte Carlo simulator for hedged prop-firm challenges")]
struct Args {
    #[command(subcommand)]
    command: Commands,

    /// Random seed (drawn and logged when omitted)
    #[arg(long, global = true, env = "HEDGE_SIM_SEED")]
    seed: Option<u64>,

    /// Print verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(ClapArgs, Debug)]
struct StageSource {
    /// Built-in stage preset
    #[arg(short, long, value_enum)]
    preset: Option<Preset>,

    /// JSON stage file ({"stages": [...]}), overrides --preset
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the full challenge once and print every stage
    Single {
        #[command(flatten)]
        source: StageSource,

        /// Print the per-event log of each stage
        #[arg(long)]
        history: bool,

        /// Write the full result (including history) as JSON
        #[arg(long)]
        json: Option<PathBuf>,
    },

    /// Repeat the challenge many times and summarize the outcomes
    MonteCarlo {
        #[command(flatten)]
        source: StageSource,

        /// Number of independent runs
        #[arg(short, long, default_value = "100000")]
        runs: usize,

        /// Upper percentile kept in the trimmed statistics
        #[arg(long, default_value = "97.0")]
        trim_percentile: f64,

        /// Write one row per run to this CSV file
        #[arg(long)]
        csv: Option<PathBuf>,

        /// Write the summary as JSON
        #[arg(long)]
        json: Option<PathBuf>,
    },

    /// Print a preset as JSON, ready to edit into a stage file
    Presets {
        #[arg(short, long, value_enum, default_value = "challenge-15k")]
        preset: Preset,
    },
}

fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let level = if args.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("hedge_challenge_sim={level},hedge_sim={level}")));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match args.command {
        Commands::Single { source, history, json } => {
            run_single(&source, Preset::Challenge15k, args.seed, history, json.as_deref())?;
        }
        Commands::MonteCarlo { source, runs, trim_percentile, csv, json } => {
            run_monte_carlo(
                &source,
                runs,
                args.seed,
                trim_percentile,
                csv.as_deref(),
                json.as_deref(),
            )?;
        }
        Commands::Presets { preset } => {
            let file = StageFile { stages: preset.stages() };
            println!("{}", serde_json::to_string_pretty(&file)?);
        }
    }

    Ok(())
}

/// Use the given seed, or draw one and log it so the run can be replayed
fn resolve_seed(seed: Option<u64>) -> u64 {
    match seed {
        Some(seed) => seed,
        None => {
            let seed = rand::thread_rng().gen();
            info!("No seed given, using {}", seed);
            seed
        }
    }
}

/// Resolve the stage list from a file or a preset
fn load_stages(source: &StageSource, default_preset: Preset) -> Result<Vec<Stage>> {
    let configs = match &source.config {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read stage file {:?}", path))?;
            let file: StageFile = serde_json::from_str(&raw)
                .with_context(|| format!("Failed to parse stage file {:?}", path))?;
            info!("Loaded {} stages from {:?}", file.stages.len(), path);
            file.stages
        }
        None => {
            let preset = source.preset.unwrap_or(default_preset);
            info!("Using preset {}", preset);
            preset.stages()
        }
    };

    if configs.is_empty() {
        bail!("No stages configured");
    }

    validate_stages(configs).context("Invalid stage configuration")
}

fn run_single(
    source: &StageSource,
    default_preset: Preset,
    seed: Option<u64>,
    with_history: bool,
    json: Option<&Path>,
) -> Result<()> {
    info!("=== SINGLE RUN ===");
    let stages = load_stages(source, default_preset)?;
    let seed = resolve_seed(seed);
    info!("Seed: {}", seed);

    let mut rng = StdRng::seed_from_u64(seed);
    let sequence = run_sequence(&stages, SimulatorSettings::default(), &mut rng);

    report::print_sequence(&sequence, with_history);

    if let Some(path) = json {
        report::write_json(path, &sequence)?;
        info!("Wrote result to {:?}", path);
    }

    Ok(())
}

fn run_monte_carlo(
    source: &StageSource,
    runs: usize,
    seed: Option<u64>,
    trim_percentile: f64,
    csv: Option<&Path>,
    json: Option<&Path>,
) -> Result<()> {
    info!("=== MONTE CARLO MODE ===");
    if !(0.0..=100.0).contains(&trim_percentile) {
        bail!("--trim-percentile must be within [0, 100], got {}", trim_percentile);
    }

    let stages = load_stages(source, Preset::MonteCarlo15k)?;
    let stage_names: Vec<String> = stages.iter().map(|s| s.name().to_string()).collect();

    let seed = resolve_seed(seed);
    info!("Seed: {}", seed);
    let samples = run_repeated(&stages, runs, seed, SimulatorSettings::bulk());

    let Some(summary) = RepeatedReport::from_runs(&samples, &stage_names, trim_percentile) else {
        info!("No runs to summarize");
        return Ok(());
    };
    report::print_repeated(&summary);

    if let Some(path) = csv {
        report::write_runs_csv(path, &samples, &stage_names)?;
        info!("Wrote {} runs to {:?}", samples.runs(), path);
    }

    if let Some(path) = json {
        report::write_json(path, &summary)?;
        info!("Wrote summary to {:?}", path);
    }

    Ok(())
}
