//! Output and ground-truth records
//!
//! Both sources arrive as loosely shaped JSON. They are validated into typed
//! records at load time: a line missing a required field is rejected there,
//! logged, and counted as skipped, so the comparison code never deals with
//! absent keys.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::label::{Grouping, ViolationLabel, ViolationType};
use crate::strategy::Strategy;

/// Placeholder for absent model / language / level values
pub const UNKNOWN: &str = "UNKNOWN";

#[derive(Error, Debug)]
pub enum RecordError {
    #[error("missing required field '{0}'")]
    MissingField(&'static str),
    #[error("invalid label in field '{field}': {source}")]
    InvalidLabel {
        field: &'static str,
        #[source]
        source: crate::label::ParseLabelError,
    },
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("unexpected layout in {}: expected a list or an object with `code_examples`", .0.display())]
    Layout(PathBuf),
}

/// Normalize a free-form language tag: `"c sharp"` -> `"C#"`, `"java"` -> `"JAVA"`
pub fn normalize_language(raw: &str) -> String {
    let squashed: String = raw
        .trim()
        .to_uppercase()
        .chars()
        .filter(|c| *c != ' ' && *c != '_')
        .collect();
    match squashed.as_str() {
        "" => UNKNOWN.to_string(),
        "CSHARP" | "C#" | "CS" => "C#".to_string(),
        _ => squashed,
    }
}

/// One model response to one code example
#[derive(Debug, Clone, PartialEq)]
pub struct OutputRecord {
    pub id: i64,
    /// Strategy declared in the record itself (folder name is authoritative)
    pub strategy: Option<Strategy>,
    pub grouping: Grouping,
    pub model: String,
    /// Normalized language tag
    pub language: String,
    /// The code snippet the model was shown
    pub input: String,
    pub raw_response: String,
    /// Self-declared expected label, used when ground truth is embedded
    pub declared_violation: Option<ViolationLabel>,
}

#[derive(Debug, Deserialize)]
struct RawOutputRecord {
    id: Option<i64>,
    strategy: Option<String>,
    violation_type: Option<String>,
    expected_violation: Option<String>,
    model: Option<String>,
    language: Option<String>,
    input: Option<String>,
    raw_response: Option<String>,
}

impl TryFrom<RawOutputRecord> for OutputRecord {
    type Error = RecordError;

    fn try_from(raw: RawOutputRecord) -> Result<Self, Self::Error> {
        let id = raw.id.ok_or(RecordError::MissingField("id"))?;
        let raw_response = raw
            .raw_response
            .ok_or(RecordError::MissingField("raw_response"))?;

        let grouping = Grouping::parse(raw.violation_type.as_deref().unwrap_or(""));
        let declared_violation = match raw.expected_violation.as_deref() {
            Some(s) => Some(s.parse::<ViolationLabel>().map_err(|source| {
                RecordError::InvalidLabel {
                    field: "expected_violation",
                    source,
                }
            })?),
            None => grouping.known().map(|vt| vt.label()),
        };
        let strategy = raw.strategy.as_deref().and_then(|s| s.parse().ok());

        Ok(OutputRecord {
            id,
            strategy,
            grouping,
            model: raw
                .model
                .filter(|m| !m.trim().is_empty())
                .unwrap_or_else(|| UNKNOWN.to_string()),
            language: normalize_language(raw.language.as_deref().unwrap_or("")),
            input: raw.input.unwrap_or_default(),
            raw_response,
            declared_violation,
        })
    }
}

impl OutputRecord {
    /// Parse and validate one JSONL line
    pub fn from_json_line(line: &str) -> Result<Self, RecordError> {
        let raw: RawOutputRecord = serde_json::from_str(line)?;
        raw.try_into()
    }
}

/// One curated, labeled example
#[derive(Debug, Clone, PartialEq)]
pub struct GroundTruthRecord {
    pub input: String,
    pub violation: ViolationLabel,
    /// Difficulty level, free-form (`"easy"`, `"hard"`, ...)
    pub level: String,
    pub language: String,
}

#[derive(Debug, Deserialize)]
struct RawGroundTruth {
    input: Option<String>,
    violation: Option<String>,
    level: Option<String>,
    language: Option<String>,
}

impl TryFrom<RawGroundTruth> for GroundTruthRecord {
    type Error = RecordError;

    fn try_from(raw: RawGroundTruth) -> Result<Self, Self::Error> {
        let input = raw.input.ok_or(RecordError::MissingField("input"))?;
        let violation = raw
            .violation
            .ok_or(RecordError::MissingField("violation"))?
            .parse::<ViolationLabel>()
            .map_err(|source| RecordError::InvalidLabel {
                field: "violation",
                source,
            })?;
        Ok(GroundTruthRecord {
            input,
            violation,
            level: raw
                .level
                .filter(|l| !l.trim().is_empty())
                .unwrap_or_else(|| UNKNOWN.to_string()),
            language: normalize_language(raw.language.as_deref().unwrap_or("")),
        })
    }
}

/// Records parsed from one output file, plus how many lines were dropped
#[derive(Debug, Default)]
pub struct LoadedRecords {
    pub records: Vec<OutputRecord>,
    pub skipped: usize,
}

/// Parse JSONL content, skipping blank lines and logging bad ones
pub fn parse_output_records(content: &str, source: &str) -> LoadedRecords {
    let mut loaded = LoadedRecords::default();
    for (lineno, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match OutputRecord::from_json_line(line) {
            Ok(record) => loaded.records.push(record),
            Err(e) => {
                tracing::warn!(source, line = lineno + 1, error = %e, "Skipping malformed record");
                loaded.skipped += 1;
            }
        }
    }
    loaded
}

/// Load an output JSONL file
pub fn load_output_records(path: &Path) -> Result<LoadedRecords, LoadError> {
    let content = std::fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let loaded = parse_output_records(&content, &path.display().to_string());
    tracing::debug!(
        path = %path.display(),
        records = loaded.records.len(),
        skipped = loaded.skipped,
        "Loaded output records"
    );
    Ok(loaded)
}

/// Parse a ground-truth document
///
/// Accepts a bare list of examples, an object with a `code_examples` list,
/// or a single example object. Entries that fail validation are skipped.
pub fn parse_ground_truth(content: &str, path: &Path) -> Result<Vec<GroundTruthRecord>, LoadError> {
    let value: serde_json::Value =
        serde_json::from_str(content).map_err(|source| LoadError::Json {
            path: path.to_path_buf(),
            source,
        })?;

    let entries = match value {
        serde_json::Value::Array(items) => items,
        serde_json::Value::Object(mut map) => match map.remove("code_examples") {
            Some(serde_json::Value::Array(items)) => items,
            Some(_) => return Err(LoadError::Layout(path.to_path_buf())),
            None => vec![serde_json::Value::Object(map)],
        },
        _ => return Err(LoadError::Layout(path.to_path_buf())),
    };

    let mut records = Vec::with_capacity(entries.len());
    for (idx, entry) in entries.into_iter().enumerate() {
        let parsed = serde_json::from_value::<RawGroundTruth>(entry)
            .map_err(RecordError::from)
            .and_then(GroundTruthRecord::try_from);
        match parsed {
            Ok(record) => records.push(record),
            Err(e) => {
                tracing::warn!(path = %path.display(), index = idx, error = %e, "Skipping ground-truth entry");
            }
        }
    }
    Ok(records)
}

/// Load one ground-truth file
pub fn load_ground_truth(path: &Path) -> Result<Vec<GroundTruthRecord>, LoadError> {
    let content = std::fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_ground_truth(&content, path)
}

/// Ground-truth file name for a violation type: `dip_violations.json`
pub fn ground_truth_file_name(vt: ViolationType) -> String {
    format!("{}_violations.json", vt)
}

/// Load every `<type>_violations.json` present in `dir`
///
/// Missing or unreadable files are logged; their violation type simply has
/// no pool, which makes every record of that type resolve to ERROR.
pub fn load_ground_truth_dir(dir: &Path) -> HashMap<ViolationType, Vec<GroundTruthRecord>> {
    let mut pools = HashMap::new();
    for vt in ViolationType::ALL {
        let path = dir.join(ground_truth_file_name(vt));
        if !path.exists() {
            tracing::warn!(path = %path.display(), "Ground truth file not found");
            continue;
        }
        match load_ground_truth(&path) {
            Ok(records) => {
                tracing::info!(violation = %vt, examples = records.len(), "Loaded ground truth");
                pools.insert(vt, records);
            }
            Err(e) => tracing::warn!(error = %e, "Failed to load ground truth"),
        }
    }
    pools
}
