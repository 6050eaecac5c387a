//! # wmsim
//!
//! A wireless medium simulator. Virtual radio interfaces submit frames
//! over a Unix datagram control channel; the medium walks each frame's
//! multi-rate retry schedule against a probabilistic channel, schedules
//! delivery on a single shared timer, fans receive copies out to the
//! matching stations and reports transmit status back to the sender.

use clap::Parser;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use wmsim_runner::{install_signal_handlers, RunnerError, Supervisor};

/// wmsim - a wireless medium simulator
#[derive(Parser, Debug)]
#[command(name = "wmsim", version, about = "a wireless medium simulator")]
struct Cli {
    /// Input configuration file.
    #[arg(short = 'c', value_name = "FILE")]
    config: Option<PathBuf>,

    /// Write a skeleton configuration for N stations and exit.
    #[arg(short = 'o', value_names = ["FILE", "N"], num_args = 2)]
    output: Option<Vec<String>>,
}

fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("wmsim: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode, RunnerError> {
    if let Some(output) = &cli.output {
        let count: usize = output[1].parse().map_err(|_| {
            RunnerError::Usage(format!("station count must be a number, got {:?}", output[1]))
        })?;
        wmsim_model::write_skeleton(Path::new(&output[0]), count)?;
        return Ok(ExitCode::SUCCESS);
    }

    let Some(config_path) = &cli.config else {
        eprintln!("wmsim: a configuration file is required (-c FILE, or -o FILE N)");
        return Ok(ExitCode::from(2));
    };

    let config = wmsim_model::load_config(config_path)?;
    install_signal_handlers()?;

    let mut supervisor = Supervisor::new(&config)?;
    let stats = supervisor.run()?;

    log::info!(
        "run finished: {} received, {} acked, {} delivered, {} dropped",
        stats.received,
        stats.acked,
        stats.delivered,
        stats.dropped,
    );
    println!("{}", serde_json::to_string_pretty(&stats)?);
    Ok(ExitCode::SUCCESS)
}
