//! # granulo CLI
//!
//! Command-line front end for the granulo pipeline: discovers laser-diffraction
//! export files, runs the tidy/clr transformation, and writes the summary
//! table as CSV or JSON.
//!
//! ## Usage
//!
//! ```bash
//! # Process a directory of exports into a summary CSV
//! granulo process "Data/*.csv" -o summary.csv
//!
//! # Inspect a single export's preamble
//! granulo inspect Data/GS_150_1.csv
//! ```

use std::io;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::info;

use granulo::phi::PhiUnit;
use granulo::pipeline::{MalformedPolicy, Pipeline, PipelineConfig};
use granulo::preamble;
use granulo::summary::SummaryRow;
use granulo::table;

/// granulo - Tidy Grain-Size Distributions from Laser-Diffraction Exports
#[derive(Parser)]
#[command(name = "granulo")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Verbosity level (-v for info, -vv for debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Process export files into a per-depth clr summary table
    Process {
        /// Input files or glob patterns (e.g. "Data/*.csv")
        #[arg(value_name = "INPUTS", required = true)]
        inputs: Vec<String>,

        /// Output file path (stdout when omitted)
        #[arg(short, long, value_name = "OUTPUT")]
        output: Option<PathBuf>,

        /// Channel diameter unit in the exports
        #[arg(short, long, default_value = "\u{b5}m")]
        unit: String,

        /// Zero-replacement delta (defaults to 1/n^2)
        #[arg(long)]
        delta: Option<f64>,

        /// Skip malformed files instead of aborting the run
        #[arg(long)]
        skip_malformed: bool,

        /// Emit JSON instead of CSV
        #[arg(long)]
        json: bool,
    },

    /// Scan one export's preamble and report what would be parsed
    Inspect {
        /// Input export file path
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    match cli.command {
        Commands::Process {
            inputs,
            output,
            unit,
            delta,
            skip_malformed,
            json,
        } => run_process(inputs, output, unit, delta, skip_malformed, json),
        Commands::Inspect { file } => run_inspect(file),
    }
}

fn run_process(
    inputs: Vec<String>,
    output: Option<PathBuf>,
    unit: String,
    delta: Option<f64>,
    skip_malformed: bool,
    json: bool,
) -> Result<()> {
    let paths = discover(&inputs)?;
    anyhow::ensure!(!paths.is_empty(), "no files match the given inputs");

    let unit: PhiUnit = unit.parse()?;
    let config = PipelineConfig {
        unit,
        replacement_delta: delta,
        malformed: if skip_malformed {
            MalformedPolicy::Skip
        } else {
            MalformedPolicy::Abort
        },
    };

    let result = Pipeline::new(config).process_files(&paths)?;
    info!(
        "processed {} files ({} skipped), {} summary rows",
        result.stats.files_processed,
        result.stats.files_skipped,
        result.summary.len()
    );

    match output {
        Some(path) => {
            let file = std::fs::File::create(&path)
                .with_context(|| format!("failed to create {}", path.display()))?;
            write_summary(file, &result.summary, json)?;
            info!("wrote {}", path.display());
        }
        None => write_summary(io::stdout().lock(), &result.summary, json)?,
    }

    Ok(())
}

fn run_inspect(file: PathBuf) -> Result<()> {
    let scanned = preamble::scan(&file)
        .with_context(|| format!("failed to scan {}", file.display()))?;
    let loaded = table::load_sample_table(&file, &scanned)
        .with_context(|| format!("failed to load table from {}", file.display()))?;

    println!("File:        {}", file.display());
    println!("Table start: row {}", scanned.table_start);
    println!("Depth code:  {} (depth {})", scanned.depth_code, scanned.depth);
    println!("Channels:    {}", loaded.row_count());
    println!("Replicates:  {}", loaded.replicates.len());
    for column in &loaded.replicates {
        let present = column.values.iter().filter(|v| v.is_some()).count();
        println!("  {}: {present} readings", column.label);
    }

    Ok(())
}

/// Expand glob patterns and collect plain paths, sorted for a deterministic
/// processing order.
fn discover(inputs: &[String]) -> Result<Vec<PathBuf>> {
    let mut paths = Vec::new();
    for input in inputs {
        if input.contains(&['*', '?', '['][..]) {
            let matches =
                glob::glob(input).with_context(|| format!("invalid glob pattern {input:?}"))?;
            for entry in matches {
                paths.push(entry?);
            }
        } else {
            paths.push(PathBuf::from(input));
        }
    }
    paths.sort();
    paths.dedup();
    Ok(paths)
}

fn write_summary<W: io::Write>(writer: W, rows: &[SummaryRow], json: bool) -> Result<()> {
    if json {
        serde_json::to_writer_pretty(writer, rows).context("failed to serialize summary")?;
    } else {
        let mut csv_writer = csv::Writer::from_writer(writer);
        for row in rows {
            csv_writer.serialize(row)?;
        }
        csv_writer.flush()?;
    }
    Ok(())
}
