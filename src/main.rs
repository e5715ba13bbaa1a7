use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use episim::config::Config;
use episim::engine::Engine;
use episim::stats::{ProgressLogger, Tracker};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(version, about)]
struct CLI {
    #[arg(long)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    Run {
        #[arg(long)]
        seed: Option<u64>,
    },

    Check,
}

fn main() {
    env_logger::Builder::new()
        .format_timestamp_millis()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    if let Err(error) = run_cli() {
        log::error!("{error:#?}");
        std::process::exit(1);
    }
}

fn run_cli() -> Result<()> {
    let args = CLI::parse();
    log::info!("{args:#?}");

    let mut cfg = Config::from_file(&args.config).context("failed to construct cfg")?;
    log::info!("{cfg:#?}");

    match args.command {
        Command::Run { seed } => {
            if seed.is_some() {
                cfg.init.seed = seed;
            }
            run_simulation(cfg)?
        }
        Command::Check => {
            let engine = Engine::generate_initial_condition(cfg)
                .context("failed to generate initial condition")?;
            log::info!("valid config, {} steps per run", engine.total_steps());
        }
    }

    Ok(())
}

fn run_simulation(cfg: Config) -> Result<()> {
    let mut engine =
        Engine::generate_initial_condition(cfg).context("failed to generate initial condition")?;

    let progress = ProgressLogger::new(engine.total_steps(), engine.cfg().output.steps_per_report);
    let mut tracker = Tracker::new();
    engine
        .run_simulation((progress, &mut tracker))
        .context("failed to run simulation")?;

    let summary = tracker.summary(
        engine.model().n_unstable(),
        engine.reconciler().n_anomalies(),
    );
    let summary = toml::to_string_pretty(&summary).context("failed to serialize summary")?;
    print!("{summary}");

    Ok(())
}
