//! CLI implementation for solidbench

mod config;
mod display;

use config::{apply_config_defaults, command_config};

use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};

use solidbench::config::Config;
use solidbench::record::load_ground_truth;
use solidbench::run::{discover_folders, run_folders, write_reports, RunOptions};
use solidbench::{extract_labels, ExternalPoolLookup, GroundTruthMode, Strategy};

#[derive(Parser)]
#[command(name = "solidbench")]
#[command(about = "Score language-model answers on SOLID violation detection")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Suppress progress output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Show debug info (sets RUST_LOG=debug)
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Compare every result folder against ground truth
    Compare {
        /// Directory of <violation>--<model>--<strategy> folders
        #[arg(long)]
        outputs: Option<PathBuf>,
        /// Directory of <type>_violations.json files
        #[arg(long)]
        ground_truth: Option<PathBuf>,
        /// Ground-truth source: external, embedded
        #[arg(long)]
        mode: Option<GroundTruthMode>,
        /// Fuzzy match cut-off (a match must score strictly above it)
        #[arg(long)]
        threshold: Option<f64>,
        /// Where to write result and review documents
        #[arg(long)]
        report_dir: Option<PathBuf>,
        /// Don't write report files
        #[arg(long)]
        no_reports: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Extract the violation label from one response
    Extract {
        /// Prompting strategy the response was produced under
        #[arg(short, long)]
        strategy: Strategy,
        /// Response file (stdin if omitted)
        file: Option<PathBuf>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Find the ground-truth entry a code snippet corresponds to
    Match {
        /// Ground-truth file (list or {"code_examples": [...]})
        #[arg(long)]
        ground_truth: PathBuf,
        /// Snippet file (stdin if omitted)
        file: Option<PathBuf>,
        /// Fuzzy match cut-off (a match must score strictly above it)
        #[arg(long)]
        threshold: Option<f64>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

/// Load config files and fold them into the global switches
///
/// Runs before logging is set up so a config `verbose = true` takes effect.
pub fn load_config(cli: &mut Cli) -> Config {
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let config = Config::load(&cwd);
    apply_config_defaults(cli, &config);
    config
}

/// Run CLI with pre-parsed arguments and the config from [`load_config`]
pub fn run_with(cli: Cli, config: Config) -> Result<()> {
    let merged = command_config(&config, &cli.command);
    match cli.command {
        Commands::Compare {
            no_reports, json, ..
        } => cmd_compare(&cli, &merged, no_reports, json),
        Commands::Extract {
            strategy,
            ref file,
            json,
        } => cmd_extract(strategy, file.as_deref(), json),
        Commands::Match {
            ref ground_truth,
            ref file,
            json,
            ..
        } => cmd_match(&merged, ground_truth, file.as_deref(), json),
    }
}

/// Read a file, or all of stdin when no path is given
fn read_input(file: Option<&Path>) -> Result<String> {
    match file {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display())),
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read stdin")?;
            Ok(buf)
        }
    }
}

fn cmd_compare(cli: &Cli, config: &Config, no_reports: bool, json: bool) -> Result<()> {
    let _span = tracing::info_span!("cmd_compare").entered();
    config.validate()?;
    let options = RunOptions::from_config(config);

    let folders = discover_folders(&options.outputs_dir)?;
    if folders.is_empty() {
        anyhow::bail!(
            "No result folders found in {} (expected <violation>--<model>--<strategy>)",
            options.outputs_dir.display()
        );
    }
    let sources = options.sources();

    let progress = if cli.quiet || json {
        ProgressBar::hidden()
    } else {
        let pb = ProgressBar::new(folders.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}")
                .unwrap_or_else(|e| {
                    tracing::warn!("Progress template error: {}, using default", e);
                    ProgressStyle::default_bar()
                }),
        );
        pb
    };

    let report = run_folders(
        &options.outputs_dir,
        &folders,
        &options.output_file,
        &sources,
        |info| {
            progress.set_message(info.name.clone());
            progress.inc(1);
        },
    )?;
    progress.finish_and_clear();

    let written = if no_reports {
        Vec::new()
    } else {
        write_reports(&report, &config.report_dir_or_default())?
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        display::display_run_report(&report, &written);
    }
    Ok(())
}

fn cmd_extract(strategy: Strategy, file: Option<&Path>, json: bool) -> Result<()> {
    let _span = tracing::info_span!("cmd_extract", %strategy).entered();
    let text = read_input(file)?;
    let result = extract_labels(&text, strategy);
    if json {
        display::display_extraction_json(strategy, &result)?;
    } else {
        display::display_extraction(strategy, &result);
    }
    Ok(())
}

fn cmd_match(config: &Config, ground_truth: &Path, file: Option<&Path>, json: bool) -> Result<()> {
    let _span = tracing::info_span!("cmd_match").entered();
    config.validate()?;
    let snippet = read_input(file)?;
    let pool = load_ground_truth(ground_truth)?;
    let lookup = ExternalPoolLookup::new(pool, config.fuzzy_threshold_or_default())
        .with_autojunk(config.autojunk_or_default());
    let found = lookup.match_snippet(&snippet);
    tracing::debug!(matched = found.is_some(), "Snippet looked up");
    if json {
        display::display_match_json(lookup.pool(), found)?;
    } else {
        display::display_match(lookup.pool(), found);
    }
    Ok(())
}
