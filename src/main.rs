#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::uninlined_format_args)]

mod config;
mod csv_reader;
mod error;
mod ml;
mod structs;

use clap::{Parser, Subcommand};
use config::AnalysisConfig;
use std::path::{Path, PathBuf};
use structs::{BatchReport, CsvData, Label, Result, VipError};

/// vipr - rank features by OPLS-DA VIP across group comparisons
#[derive(Parser, Debug)]
#[command(name = "vipr")]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Fit every comparison and write rankings, quality tables and charts
    Run {
        /// Input CSV/TSV dataset, one row per sample
        #[arg(short, long)]
        data: PathBuf,

        /// YAML configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Output directory (overrides the config file)
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        /// Reference panel file, one feature name per line
        #[arg(short, long)]
        panel: Option<PathBuf>,

        /// Treat input as TSV instead of CSV
        #[arg(long)]
        tsv: bool,

        /// Skip bar chart rendering
        #[arg(long)]
        no_charts: bool,
    },

    /// Print the comparisons a run would perform
    List {
        /// Input CSV/TSV dataset, one row per sample
        #[arg(short, long)]
        data: PathBuf,

        /// YAML configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Treat input as TSV instead of CSV
        #[arg(long)]
        tsv: bool,
    },
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(e) = run() {
        log::error!("{e}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let args = Args::parse();

    match args.command {
        Some(Commands::Run {
            data,
            config,
            output_dir,
            panel,
            tsv,
            no_charts,
        }) => {
            let mut config = load_config(config.as_deref())?;
            if let Some(dir) = output_dir {
                config.output_dir = dir;
            }
            if no_charts {
                config.charts.enabled = false;
            }
            run_analysis(&data, &config, panel.as_deref(), tsv).map(|_| ())
        }

        Some(Commands::List { data, config, tsv }) => {
            let config = load_config(config.as_deref())?;
            list_comparisons(&data, &config, tsv)
        }

        None => {
            eprintln!("No subcommand provided. Use 'vipr run' or 'vipr list'.");
            eprintln!("Run 'vipr --help' for usage information.");
            std::process::exit(1);
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<AnalysisConfig> {
    match path {
        Some(path) => {
            if !path.exists() {
                return Err(VipError::Config(format!(
                    "Config file not found: {}",
                    path.display()
                )));
            }
            AnalysisConfig::from_file(path)
        }
        None => Ok(AnalysisConfig::default()),
    }
}

fn load_dataset(path: &Path, tsv: bool) -> Result<CsvData> {
    if !path.exists() {
        return Err(VipError::Config(format!(
            "Dataset file not found: {}",
            path.display()
        )));
    }
    let table = CsvData::from_file(path, tsv)?;
    log::info!(
        "Loaded {} rows x {} columns from {}",
        table.row_count(),
        table.col_count(),
        path.display()
    );
    Ok(table)
}

/// Run the full batch and write the summary
///
/// Only setup problems are errors. Failed comparisons, including an
/// unwritable output directory, are logged and returned in the report.
fn run_analysis(
    data_path: &Path,
    config: &AnalysisConfig,
    panel_path: Option<&Path>,
    tsv: bool,
) -> Result<BatchReport> {
    let table = load_dataset(data_path, tsv)?;
    let panel = config.reference_panel(panel_path)?;
    if panel.is_empty() {
        log::info!("No reference panel, rankings carry no highlights");
    } else {
        log::info!("Reference panel: {} features", panel.len());
    }

    let report = ml::pipeline::run_batch(&table, &panel, config)?;
    log::info!(
        "{} of {} comparisons completed",
        report.completed.len(),
        report.completed.len() + report.failures.len()
    );

    if !report.is_success() {
        log::warn!("{} comparison(s) failed:", report.failures.len());
        for failure in &report.failures {
            log::warn!("  - {}: {}", failure.comparison, failure.error);
        }
    }

    match ml::output::write_summary_json(&config.output_dir, &report) {
        Ok(summary) => log::info!("Output written to {}", summary.display()),
        Err(e) => log::warn!("Could not write batch summary: {e}"),
    }

    Ok(report)
}

/// Print each comparison with its per-label sample counts
fn list_comparisons(data_path: &Path, config: &AnalysisConfig, tsv: bool) -> Result<()> {
    let table = load_dataset(data_path, tsv)?;
    let builder = ml::features::FeatureBuilder::new(&table, &config.columns)?;
    let comparisons = ml::comparisons::enumerate(&table, &config.columns)?;

    println!("{} features", builder.feature_names().len());
    for comparison in &comparisons {
        let selected = builder.select(comparison);
        let positive = selected
            .iter()
            .filter(|(_, label)| *label == Label::Positive)
            .count();
        println!(
            "{:<12} {:<40} {} ({}) vs {} ({})",
            comparison.kind.family(),
            comparison.name,
            comparison.positive,
            positive,
            comparison.negative,
            selected.len() - positive
        );
    }

    Ok(())
}
