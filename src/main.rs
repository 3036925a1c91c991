//! CLI entry point for disc_probe
//!
//! Provides command-line interface for:
//! - Processing recordings into angle-binned rows (one CSV per batch)
//! - Inspecting the full per-wire statistics of a single recording
//! - Writing synthetic recordings for testing without the probe
//! - Printing the effective configuration
//!
//! # Usage
//!
//! ```bash
//! disc_probe process scans/ --output profile.csv --ignore 2
//! disc_probe inspect scans/017.json
//! disc_probe simulate demo.json --wires 4 --ccw
//! ```

// Global allocator: batch runs allocate many short-lived sample vectors across threads
#[cfg(not(test))]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use disc_probe::analysis::analyze_recording;
use disc_probe::batch::{run_batch, RecordingStatus};
use disc_probe::config::ProbeConfig;
use disc_probe::discovery::discover_recordings;
use disc_probe::logging;
use disc_probe::recording::{JsonRecordingLoader, RecordingLoader};
use disc_probe::sink::{RunHeader, SinkTarget};
use disc_probe::sync::{Direction, SpeedPolicy, Statistic};
use disc_probe::synthetic::SyntheticRecording;

#[derive(Parser)]
#[command(name = "disc_probe")]
#[command(about = "Angle-synchronized analysis of spinning-disc wire probe recordings", long_about = None)]
struct Cli {
    /// Configuration file (defaults to ./disc_probe.toml if present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Process recordings into angle-binned rows
    Process {
        /// Recording files or directories
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Output CSV file, or '-' for stdout
        #[arg(long, short)]
        output: PathBuf,

        /// Recordings processed concurrently (0 = all cores)
        #[arg(long)]
        workers: Option<usize>,

        /// Wire indices excluded from the output
        #[arg(long, num_args = 1..)]
        ignore: Vec<usize>,

        /// What to do when the rotation speed is not constant
        #[arg(long)]
        speed_policy: Option<SpeedPolicy>,

        /// Statistic written per bin
        #[arg(long)]
        statistic: Option<Statistic>,
    },

    /// Print the full per-wire statistics table of one recording
    Inspect {
        file: PathBuf,
    },

    /// Write a synthetic recording
    Simulate {
        file: PathBuf,

        #[arg(long, default_value = "4")]
        wires: usize,

        /// Samples per rotation
        #[arg(long, default_value = "3600")]
        rotation_samples: usize,

        #[arg(long, default_value = "10")]
        rotations: usize,

        /// Spin counter-clockwise
        #[arg(long)]
        ccw: bool,

        /// Uniform noise amplitude
        #[arg(long, default_value = "0.0")]
        noise: f64,

        #[arg(long, default_value = "0")]
        seed: u64,
    },

    /// Print the effective configuration as TOML
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => ProbeConfig::load_from(path)?,
        None => ProbeConfig::load()?,
    };
    logging::init_from_config(&config)?;

    match cli.command {
        Commands::Process {
            inputs,
            output,
            workers,
            ignore,
            speed_policy,
            statistic,
        } => {
            let mut config = config;
            if let Some(workers) = workers {
                config.batch.workers = workers;
            }
            config.analysis.ignore.extend(ignore);
            if let Some(policy) = speed_policy {
                config.analysis.speed_policy = policy;
            }
            if let Some(statistic) = statistic {
                config.analysis.statistic = statistic;
            }
            process(config, inputs, output).await
        }
        Commands::Inspect { file } => inspect(&config, &file),
        Commands::Simulate {
            file,
            wires,
            rotation_samples,
            rotations,
            ccw,
            noise,
            seed,
        } => {
            let direction = if ccw { Direction::Ccw } else { Direction::Cw };
            let recording = SyntheticRecording::new(wires, rotation_samples)
                .rotations(rotations)
                .direction(direction)
                .noise(noise, seed)
                .build();
            recording
                .save_json(&file)
                .with_context(|| format!("writing {}", file.display()))?;
            info!(file = %file.display(), samples = recording.samples(), %direction, "synthetic recording written");
            Ok(())
        }
        Commands::Config => {
            print!("{}", config.to_toml()?);
            Ok(())
        }
    }
}

async fn process(config: ProbeConfig, inputs: Vec<PathBuf>, output: PathBuf) -> Result<()> {
    config.validate()?;

    let paths = discover_recordings(&inputs, &config.batch.extension)?;
    if paths.is_empty() {
        bail!("no recordings found in the given inputs");
    }

    let target = if output == Path::new("-") {
        SinkTarget::Stdout
    } else {
        SinkTarget::Csv(output)
    };
    let header = RunHeader::new(config.analysis.grid(), config.analysis.statistic);
    let sink = target.open(&header)?;

    let loader: Arc<dyn RecordingLoader> = Arc::new(JsonRecordingLoader);
    let (report, _sink) = run_batch(paths, loader, &config, sink).await?;

    for outcome in &report.outcomes {
        match &outcome.status {
            RecordingStatus::Clean => eprintln!("ok        {} ({} rows)", outcome.id, outcome.rows),
            RecordingStatus::Degraded { speed_ratio } => eprintln!(
                "degraded  {} ({} rows, speed ratio {:.5})",
                outcome.id, outcome.rows, speed_ratio
            ),
            RecordingStatus::Failed { error } => eprintln!("failed    {}: {}", outcome.id, error),
        }
    }

    let failed = report.failed().count();
    if failed > 0 {
        bail!("{} of {} recordings failed", failed, report.outcomes.len());
    }
    Ok(())
}

fn inspect(config: &ProbeConfig, file: &Path) -> Result<()> {
    config.analysis.validate()?;
    let recording = JsonRecordingLoader.load(file)?;
    let analysis = analyze_recording(&recording, &config.analysis)?;
    let sync = &analysis.sync;

    println!("recording   {}", analysis.id);
    println!("samples     {}", recording.samples());
    println!("direction   {}", sync.direction);
    println!("rotations   {}", sync.rotations);
    println!(
        "speed       ratio {:.5}{}",
        sync.speed.ratio,
        if sync.speed.stable { "" } else { " (unstable)" }
    );
    println!("binned      {} samples", sync.samples_binned);

    let table = analysis.table();
    for (wire, bins) in table.stats.iter().enumerate() {
        let ignored = if config.analysis.ignore.contains(&wire) {
            " [ignored]"
        } else {
            ""
        };
        println!();
        println!("wire {} radius {}{}", wire, analysis.radii[wire], ignored);
        println!(
            "{:>10} {:>7} {:>12} {:>12} {:>12} {:>12} {:>12}",
            "theta", "count", "mean", "median", "std", "min", "max"
        );
        for (theta, s) in table.theta.iter().zip(bins) {
            println!(
                "{:>10.4} {:>7} {:>12.5} {:>12.5} {:>12.5} {:>12.5} {:>12.5}",
                theta, s.count, s.mean, s.median, s.std, s.min, s.max
            );
        }
    }
    Ok(())
}
