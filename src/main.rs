//! FARS Explorer - command line front end
//!
//! `fars summarize 2013 2014 2015` prints accidents per month for each year.
//! `fars map --state 1 --year 2013` draws that state's accident locations.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use fars_explorer::data::write_summary_csv;
use fars_explorer::{Fars, FarsConfig, MapError, MapOutcome};
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "fars")]
#[command(about = "FARS accident summaries and state accident maps")]
struct Args {
    /// JSON config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory holding accident_<year>.csv.bz2 files (overrides config)
    #[arg(short, long)]
    data_dir: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Count accidents per month for each year
    Summarize {
        #[arg(required = true)]
        years: Vec<i64>,

        /// Also write the summary as CSV
        #[arg(long)]
        csv: Option<PathBuf>,
    },
    /// Plot one state's accident locations for a year
    Map {
        #[arg(short, long)]
        state: i64,

        #[arg(short, long)]
        year: i64,

        /// Image path (.svg or .png); defaults to <output_dir>/state_<state>_<year>.png
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();

    let default_filter = if args.verbose { "debug" } else { "info" };
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    fmt::Subscriber::builder().with_env_filter(env).init();

    let mut config = match &args.config {
        Some(path) => FarsConfig::load(path)?,
        None => FarsConfig::default(),
    };
    if let Some(dir) = args.data_dir {
        config.data_dir = dir;
    }
    let fars = Fars::new(config);

    match args.command {
        Command::Summarize { years, csv } => {
            let mut summary = fars
                .summarize_years(&years)
                .context("Failed to summarize years")?;
            println!("{}", summary);

            if let Some(path) = csv {
                write_summary_csv(&mut summary, &path)?;
                info!("summary written to {}", path.display());
            }
        }
        Command::Map {
            state,
            year,
            output,
        } => {
            let output = output.unwrap_or_else(|| fars.config().map_output(state, year));
            match fars.map_state(state, year, &output) {
                Ok(MapOutcome::Rendered(map)) => {
                    println!(
                        "{} of {} accidents plotted -> {}",
                        map.points.len(),
                        map.accidents,
                        output.display()
                    );
                }
                Ok(MapOutcome::NoAccidents { .. }) => println!("no accidents to plot"),
                Ok(MapOutcome::NoCoordinates { accidents, .. }) => {
                    println!("{} accidents, none with reported coordinates", accidents)
                }
                Err(MapError::InvalidState { state, present }) => {
                    warn!("states present in {}: {:?}", year, present);
                    return Err(MapError::InvalidState { state, present }.into());
                }
                Err(e) => return Err(e).context("Failed to map state"),
            }
        }
    }

    Ok(())
}
