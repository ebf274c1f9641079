//! Configuration file support for solidbench
//!
//! Config files are loaded in order (later overrides earlier):
//! 1. `~/.config/solidbench/config.toml` (user defaults)
//! 2. `.solidbench.toml` in the working directory (project overrides)
//!
//! CLI flags override all config file values.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::ground_truth::{GroundTruthMode, DEFAULT_FUZZY_THRESHOLD};

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("fuzzy_threshold must be within [0, 1], got {0}")]
    ThresholdOutOfRange(f64),
    #[error("output_file must be a plain file name, got '{0}'")]
    InvalidOutputFile(String),
}

/// Configuration options loaded from config files
///
/// # Example
///
/// ```toml
/// # ~/.config/solidbench/config.toml or .solidbench.toml
/// outputs_dir = "outputs"            # Folders named <violation>--<model>--<strategy>
/// ground_truth_dir = "ground_truth"  # <type>_violations.json files
/// mode = "external"                  # or "embedded"
/// fuzzy_threshold = 0.9              # Strictly-greater cut-off for fuzzy matches
/// autojunk = true                    # Ignore popular chars in long snippets
/// output_file = "output_test.jsonl"  # JSONL file inside each folder
/// report_dir = "reports"
/// quiet = false
/// verbose = false
/// ```
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub outputs_dir: Option<PathBuf>,
    pub ground_truth_dir: Option<PathBuf>,
    /// Ground-truth source (overridden by --mode)
    pub mode: Option<GroundTruthMode>,
    pub fuzzy_threshold: Option<f64>,
    pub autojunk: Option<bool>,
    pub output_file: Option<String>,
    /// Where review and result documents are written (overridden by --report-dir)
    pub report_dir: Option<PathBuf>,
    /// Enable quiet mode by default
    pub quiet: Option<bool>,
    /// Enable verbose mode by default
    pub verbose: Option<bool>,
}

impl Config {
    /// Load configuration from user and project config files
    pub fn load(project_root: &Path) -> Self {
        let user_config = dirs::config_dir()
            .map(|d| d.join("solidbench/config.toml"))
            .and_then(|p| Self::load_file(&p))
            .unwrap_or_default();

        let project_config =
            Self::load_file(&project_root.join(".solidbench.toml")).unwrap_or_default();

        // Project overrides user
        let merged = user_config.override_with(project_config);
        tracing::debug!(
            outputs_dir = ?merged.outputs_dir,
            ground_truth_dir = ?merged.ground_truth_dir,
            mode = ?merged.mode,
            fuzzy_threshold = ?merged.fuzzy_threshold,
            autojunk = ?merged.autojunk,
            "Effective config after merge"
        );
        merged
    }

    /// Load configuration from a specific file
    pub fn load_file(path: &Path) -> Option<Self> {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                tracing::warn!("Failed to read config {}: {}", path.display(), e);
                return None;
            }
        };

        match toml::from_str::<Self>(&content) {
            Ok(config) => {
                tracing::debug!(path = %path.display(), mode = ?config.mode, "Loaded config");
                Some(config)
            }
            Err(e) => {
                tracing::warn!("Failed to parse config {}: {}", path.display(), e);
                None
            }
        }
    }

    /// Layer another config on top (other overrides self where present)
    pub fn override_with(self, other: Self) -> Self {
        Config {
            outputs_dir: other.outputs_dir.or(self.outputs_dir),
            ground_truth_dir: other.ground_truth_dir.or(self.ground_truth_dir),
            mode: other.mode.or(self.mode),
            fuzzy_threshold: other.fuzzy_threshold.or(self.fuzzy_threshold),
            autojunk: other.autojunk.or(self.autojunk),
            output_file: other.output_file.or(self.output_file),
            report_dir: other.report_dir.or(self.report_dir),
            quiet: other.quiet.or(self.quiet),
            verbose: other.verbose.or(self.verbose),
        }
    }

    /// Reject values the pipeline cannot work with
    pub fn validate(&self) -> Result<(), ConfigError> {
        let t = self.fuzzy_threshold_or_default();
        if !(0.0..=1.0).contains(&t) {
            return Err(ConfigError::ThresholdOutOfRange(t));
        }
        let file = self.output_file_or_default();
        if file.is_empty() || file.contains('/') || file.contains('\\') {
            return Err(ConfigError::InvalidOutputFile(file.to_string()));
        }
        Ok(())
    }

    // ===== Accessors with defaults =====

    pub const DEFAULT_OUTPUTS_DIR: &'static str = "outputs";
    pub const DEFAULT_GROUND_TRUTH_DIR: &'static str = "ground_truth";
    pub const DEFAULT_OUTPUT_FILE: &'static str = "output_test.jsonl";
    pub const DEFAULT_REPORT_DIR: &'static str = "reports";

    pub fn outputs_dir_or_default(&self) -> PathBuf {
        self.outputs_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from(Self::DEFAULT_OUTPUTS_DIR))
    }

    pub fn ground_truth_dir_or_default(&self) -> PathBuf {
        self.ground_truth_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from(Self::DEFAULT_GROUND_TRUTH_DIR))
    }

    pub fn mode_or_default(&self) -> GroundTruthMode {
        self.mode.unwrap_or_default()
    }

    /// Get fuzzy threshold with default fallback (0.9)
    pub fn fuzzy_threshold_or_default(&self) -> f64 {
        self.fuzzy_threshold.unwrap_or(DEFAULT_FUZZY_THRESHOLD)
    }

    /// Get autojunk with default fallback (true)
    pub fn autojunk_or_default(&self) -> bool {
        self.autojunk.unwrap_or(true)
    }

    pub fn output_file_or_default(&self) -> &str {
        self.output_file.as_deref().unwrap_or(Self::DEFAULT_OUTPUT_FILE)
    }

    pub fn report_dir_or_default(&self) -> PathBuf {
        self.report_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from(Self::DEFAULT_REPORT_DIR))
    }

    /// Get quiet mode with default fallback (false)
    pub fn quiet_or_default(&self) -> bool {
        self.quiet.unwrap_or(false)
    }

    /// Get verbose mode with default fallback (false)
    pub fn verbose_or_default(&self) -> bool {
        self.verbose.unwrap_or(false)
    }
}
