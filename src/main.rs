use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use group_assign::config::AllocationConfig;
use group_assign::io;
use group_assign::pipeline;

#[derive(Parser, Debug)]
#[command(name = "group-assign")]
#[command(
    about = "Assigns persons to groups by ranked wishes: exact solve, then local search",
    long_about = None
)]
struct Args {
    /// Preference sheet (Name, W1.., N1..N3)
    #[arg(long)]
    prefs: PathBuf,

    /// Capacity sheet (group names, capacities)
    #[arg(long)]
    caps: PathBuf,

    /// Time limit of the exact solver in seconds
    #[arg(long)]
    mip_time: Option<f64>,

    /// Time limit of the local search in seconds
    #[arg(long)]
    local_time: Option<f64>,

    /// TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Seed for the local search
    #[arg(long)]
    seed: Option<u64>,

    /// Result CSV path
    #[arg(short, long, default_value = "result.csv")]
    output: PathBuf,
}

fn load_config(args: &Args) -> Result<AllocationConfig, Box<dyn std::error::Error>> {
    let mut config = match &args.config {
        Some(path) => AllocationConfig::load(path)?,
        None => AllocationConfig::default(),
    };
    if let Some(secs) = args.mip_time {
        config = config.with_mip_time_secs(secs);
    }
    if let Some(secs) = args.local_time {
        config = config.with_local_time_secs(secs);
    }
    if let Some(seed) = args.seed {
        config = config.with_random_seed(seed);
    }
    config.validate()?;
    Ok(config)
}

fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(&args)?;

    info!(path = %args.caps.display(), "reading group capacities");
    let groups = io::read_capacities(&args.caps)?;
    info!(path = %args.prefs.display(), "reading preferences");
    let persons = io::read_preferences(&args.prefs)?;
    info!(groups = groups.len(), persons = persons.len(), "input loaded");

    let outcome = pipeline::run(groups, &persons, &config)?;

    println!("{}", outcome.solver);
    println!("{}", outcome.report);
    io::write_result_file(&args.output, &outcome.report)?;
    info!(path = %args.output.display(), "result written");
    Ok(())
}

fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match run(Args::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err}");
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}
