//! Comparison run over a directory of result folders
//!
//! Each folder is named `<violation>--<model>--<strategy>` and holds one JSONL
//! file of model responses. Folders are compared in parallel; every worker
//! fills its own [`ReviewLog`], and the logs are merged once all folders are
//! done.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use rayon::prelude::*;
use serde::Serialize;

use crate::compare::Comparator;
use crate::config::Config;
use crate::ground_truth::{EmbeddedLabel, ExternalPoolLookup, GroundTruthMode, GroundTruthSource};
use crate::label::{Grouping, ViolationType};
use crate::record::{load_ground_truth_dir, load_output_records, OutputRecord};
use crate::review::{FailedExtractionReport, MultipleViolationsReport, PatternLibrary, ReviewLog};
use crate::stats::{RunStats, VerdictCounts, ViolationTypeReport};
use crate::strategy::Strategy;

/// What a result folder's name says about its contents
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FolderInfo {
    pub name: String,
    pub violation: ViolationType,
    /// Everything between the first and last `--`, rejoined
    pub model: String,
    pub strategy: Strategy,
}

/// Parse `<violation>--<model>--<strategy>`
///
/// The model part may itself contain `--`. Unknown violation types or
/// strategies yield `None`.
pub fn parse_folder_name(name: &str) -> Option<FolderInfo> {
    let parts: Vec<&str> = name.split("--").collect();
    if parts.len() < 3 {
        return None;
    }
    let violation = parts[0].parse::<ViolationType>().ok()?;
    let strategy = parts[parts.len() - 1].parse::<Strategy>().ok()?;
    let model = parts[1..parts.len() - 1].join("--");
    if model.is_empty() {
        return None;
    }
    Some(FolderInfo {
        name: name.to_string(),
        violation,
        model,
        strategy,
    })
}

/// Result folders under `dir`, sorted by name
pub fn discover_folders(dir: &Path) -> Result<Vec<FolderInfo>> {
    let entries = std::fs::read_dir(dir)
        .with_context(|| format!("Failed to read outputs directory {}", dir.display()))?;

    let mut folders = Vec::new();
    for entry in entries.flatten() {
        if !entry.file_type().map(|t| t.is_dir()).unwrap_or(false) {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        let has_prefix = ViolationType::ALL
            .iter()
            .any(|vt| name.starts_with(&format!("{}--", vt)));
        if !has_prefix {
            tracing::debug!(folder = %name, "Not a result folder");
            continue;
        }
        match parse_folder_name(&name) {
            Some(info) => folders.push(info),
            None => tracing::warn!(folder = %name, "Skipping folder with unparsable name"),
        }
    }
    folders.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(folders)
}

/// Ground-truth sources for every violation type, per the configured mode
pub enum GroundTruthSources {
    External {
        pools: HashMap<ViolationType, ExternalPoolLookup>,
        /// Stand-in for types without a pool; resolves nothing
        empty: ExternalPoolLookup,
    },
    Embedded(EmbeddedLabel),
}

impl GroundTruthSources {
    /// Load `<type>_violations.json` pools from `dir`
    pub fn external(dir: &Path, threshold: f64, autojunk: bool) -> Self {
        let pools = load_ground_truth_dir(dir)
            .into_iter()
            .map(|(vt, records)| {
                (
                    vt,
                    ExternalPoolLookup::new(records, threshold).with_autojunk(autojunk),
                )
            })
            .collect();
        Self::from_pools(pools, threshold)
    }

    pub fn from_pools(pools: HashMap<ViolationType, ExternalPoolLookup>, threshold: f64) -> Self {
        GroundTruthSources::External {
            pools,
            empty: ExternalPoolLookup::new(Vec::new(), threshold),
        }
    }

    pub fn embedded() -> Self {
        GroundTruthSources::Embedded(EmbeddedLabel)
    }

    pub fn for_type(&self, vt: ViolationType) -> &dyn GroundTruthSource {
        match self {
            GroundTruthSources::External { pools, empty } => {
                pools.get(&vt).unwrap_or(empty) as &dyn GroundTruthSource
            }
            GroundTruthSources::Embedded(source) => source,
        }
    }

    pub fn mode(&self) -> GroundTruthMode {
        match self {
            GroundTruthSources::External { .. } => GroundTruthMode::External,
            GroundTruthSources::Embedded(_) => GroundTruthMode::Embedded,
        }
    }
}

/// Verdicts for one result folder
#[derive(Debug, Clone, Serialize)]
pub struct FolderReport {
    pub model: String,
    pub strategy: Strategy,
    /// Records parsed from the output file
    pub total_items: usize,
    /// Lines dropped as malformed
    pub skipped_lines: usize,
    /// Records whose grouping is not a known violation type
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub skipped_groupings: BTreeMap<String, usize>,
    pub violation_results: BTreeMap<ViolationType, ViolationTypeReport>,
    pub overall_stats: RunStats,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FolderOutcome {
    Compared(FolderReport),
    Failed { error: String },
}

/// Compare already-loaded records of one folder
pub fn compare_records(
    info: &FolderInfo,
    records: Vec<OutputRecord>,
    skipped_lines: usize,
    sources: &GroundTruthSources,
    log: &mut ReviewLog,
) -> FolderReport {
    let total_items = records.len();
    let mut groups: BTreeMap<ViolationType, Vec<OutputRecord>> = BTreeMap::new();
    let mut skipped_groupings: BTreeMap<String, usize> = BTreeMap::new();
    for record in records {
        match &record.grouping {
            Grouping::Known(vt) => groups.entry(*vt).or_default().push(record),
            Grouping::Unrecognized(_) => {
                *skipped_groupings.entry(record.grouping.to_string()).or_default() += 1;
            }
        }
    }
    for (grouping, n) in &skipped_groupings {
        tracing::info!(folder = %info.name, %grouping, records = n, "Skipping unknown violation type");
    }

    let mut overall_stats = RunStats::default();
    let mut violation_results = BTreeMap::new();
    for (vt, group) in groups {
        let comparator = Comparator::new(sources.for_type(vt));
        let items: Vec<_> = group
            .iter()
            .map(|record| comparator.compare(record, info.strategy, log))
            .collect();
        for item in &items {
            overall_stats.record(item);
        }
        let report = ViolationTypeReport::from_items(items);
        tracing::info!(
            folder = %info.name,
            violation = %vt,
            pass = report.stats.pass,
            total = report.stats.total,
            "Compared"
        );
        violation_results.insert(vt, report);
    }

    FolderReport {
        model: info.model.clone(),
        strategy: info.strategy,
        total_items,
        skipped_lines,
        skipped_groupings,
        violation_results,
        overall_stats,
    }
}

/// Load and compare one result folder
///
/// A missing output file or one with no parsable records fails the folder,
/// not the run.
pub fn compare_folder(
    folder: &Path,
    info: &FolderInfo,
    output_file: &str,
    sources: &GroundTruthSources,
    log: &mut ReviewLog,
) -> FolderOutcome {
    let _span = tracing::info_span!("compare_folder", folder = %info.name).entered();
    let path = folder.join(output_file);
    if !path.exists() {
        tracing::warn!(path = %path.display(), "Output file not found");
        return FolderOutcome::Failed {
            error: format!("Output file not found: {}", path.display()),
        };
    }
    let loaded = match load_output_records(&path) {
        Ok(loaded) => loaded,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to load output file");
            return FolderOutcome::Failed {
                error: e.to_string(),
            };
        }
    };
    if loaded.records.is_empty() {
        return FolderOutcome::Failed {
            error: format!("No data loaded from {}", path.display()),
        };
    }
    FolderOutcome::Compared(compare_records(
        info,
        loaded.records,
        loaded.skipped,
        sources,
        log,
    ))
}

/// Settings for one comparison run
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub outputs_dir: PathBuf,
    pub ground_truth_dir: PathBuf,
    pub mode: GroundTruthMode,
    pub fuzzy_threshold: f64,
    pub autojunk: bool,
    pub output_file: String,
}

impl RunOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            outputs_dir: config.outputs_dir_or_default(),
            ground_truth_dir: config.ground_truth_dir_or_default(),
            mode: config.mode_or_default(),
            fuzzy_threshold: config.fuzzy_threshold_or_default(),
            autojunk: config.autojunk_or_default(),
            output_file: config.output_file_or_default().to_string(),
        }
    }

    pub fn sources(&self) -> GroundTruthSources {
        match self.mode {
            GroundTruthMode::External => GroundTruthSources::external(
                &self.ground_truth_dir,
                self.fuzzy_threshold,
                self.autojunk,
            ),
            GroundTruthMode::Embedded => GroundTruthSources::embedded(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FolderEntry {
    pub folder: String,
    pub violation: ViolationType,
    #[serde(flatten)]
    pub outcome: FolderOutcome,
}

/// Everything a run produced
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub generated_at: String,
    pub mode: GroundTruthMode,
    pub folders: Vec<FolderEntry>,
    pub overall_stats: RunStats,
    /// Counts per violation type across all folders
    pub by_violation_type: BTreeMap<ViolationType, VerdictCounts>,
    #[serde(skip)]
    pub review: ReviewLog,
}

impl RunReport {
    pub fn failed_folders(&self) -> usize {
        self.folders
            .iter()
            .filter(|f| matches!(f.outcome, FolderOutcome::Failed { .. }))
            .count()
    }
}

/// Compare every result folder under `outputs_dir`
///
/// `on_folder` is called once per finished folder, from worker threads.
pub fn run_comparison<F>(options: &RunOptions, on_folder: F) -> Result<RunReport>
where
    F: Fn(&FolderInfo) + Sync,
{
    let folders = discover_folders(&options.outputs_dir)?;
    tracing::info!(folders = folders.len(), mode = %options.mode, "Starting comparison");
    let sources = options.sources();
    run_folders(&options.outputs_dir, &folders, &options.output_file, &sources, on_folder)
}

/// Compare the given folders against prepared sources
pub fn run_folders<F>(
    outputs_dir: &Path,
    folders: &[FolderInfo],
    output_file: &str,
    sources: &GroundTruthSources,
    on_folder: F,
) -> Result<RunReport>
where
    F: Fn(&FolderInfo) + Sync,
{
    let results: Vec<(FolderEntry, ReviewLog)> = folders
        .par_iter()
        .map(|info| {
            let mut log = ReviewLog::default();
            let outcome = compare_folder(
                &outputs_dir.join(&info.name),
                info,
                output_file,
                sources,
                &mut log,
            );
            on_folder(info);
            let entry = FolderEntry {
                folder: info.name.clone(),
                violation: info.violation,
                outcome,
            };
            (entry, log)
        })
        .collect();

    let mut report = RunReport {
        generated_at: chrono::Utc::now().to_rfc3339(),
        mode: sources.mode(),
        folders: Vec::with_capacity(results.len()),
        overall_stats: RunStats::default(),
        by_violation_type: BTreeMap::new(),
        review: ReviewLog::default(),
    };
    for (entry, log) in results {
        if let FolderOutcome::Compared(folder) = &entry.outcome {
            report.overall_stats.merge(&folder.overall_stats);
            for (vt, vr) in &folder.violation_results {
                report
                    .by_violation_type
                    .entry(*vt)
                    .or_default()
                    .merge(&vr.stats);
            }
        }
        report.review.merge(log);
        report.folders.push(entry);
    }
    report.folders.sort_by(|a, b| a.folder.cmp(&b.folder));
    Ok(report)
}

/// File names written by [`write_reports`]
pub const DETAILED_RESULTS_FILE: &str = "detailed_results.json";
pub const FAILED_EXTRACTION_FILE: &str = "failed_extraction_for_review.json";
pub const MULTIPLE_VIOLATIONS_FILE: &str = "multiple_violations_for_review.json";
pub const PATTERNS_FILE: &str = "extracted_patterns.json";

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)
        .with_context(|| format!("Failed to serialize {}", path.display()))?;
    std::fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))
}

/// Write the result and review documents into `dir`
pub fn write_reports(report: &RunReport, dir: &Path) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create report directory {}", dir.display()))?;

    let detailed = dir.join(DETAILED_RESULTS_FILE);
    write_json(&detailed, report)?;

    let failed = dir.join(FAILED_EXTRACTION_FILE);
    write_json(
        &failed,
        &FailedExtractionReport::build(&report.review.failed_extractions),
    )?;

    let multiple = dir.join(MULTIPLE_VIOLATIONS_FILE);
    write_json(
        &multiple,
        &MultipleViolationsReport::build(&report.review.multiple_violations),
    )?;

    let patterns = dir.join(PATTERNS_FILE);
    write_json(&patterns, &PatternLibrary::build(&report.review.patterns))?;

    tracing::info!(dir = %dir.display(), "Reports written");
    Ok(vec![detailed, failed, multiple, patterns])
}
