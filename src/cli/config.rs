//! Config file application
//!
//! CLI flags always override config values.

use solidbench::config::Config;

use super::{Cli, Commands};

/// Apply config file defaults to global CLI switches
pub(super) fn apply_config_defaults(cli: &mut Cli, config: &Config) {
    if !cli.quiet && config.quiet_or_default() {
        cli.quiet = true;
    }
    if !cli.verbose && config.verbose_or_default() {
        cli.verbose = true;
    }
}

/// Layer subcommand flags on top of the loaded config
pub(super) fn command_config(config: &Config, command: &Commands) -> Config {
    let overrides = match command {
        Commands::Compare {
            outputs,
            ground_truth,
            mode,
            threshold,
            report_dir,
            ..
        } => Config {
            outputs_dir: outputs.clone(),
            ground_truth_dir: ground_truth.clone(),
            mode: *mode,
            fuzzy_threshold: *threshold,
            report_dir: report_dir.clone(),
            ..Default::default()
        },
        Commands::Match { threshold, .. } => Config {
            fuzzy_threshold: *threshold,
            ..Default::default()
        },
        Commands::Extract { .. } => Config::default(),
    };
    config.clone().override_with(overrides)
}
