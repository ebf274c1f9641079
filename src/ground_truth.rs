//! Ground-truth resolution
//!
//! Output records carry no stable key into the curated examples, so the
//! expected label is found one of two ways, picked by configuration:
//!
//! - [`ExternalPoolLookup`]: find the pool entry whose input snippet matches
//!   the record's, by exact text, then whitespace-normalized text, then
//!   sequence ratio above a threshold. No match means ERROR.
//! - [`EmbeddedLabel`]: trust the label the record declares about itself.

use serde::{Deserialize, Serialize};

use crate::label::ViolationLabel;
use crate::record::{GroundTruthRecord, OutputRecord, UNKNOWN};
use crate::similarity::{normalize_whitespace, SequenceRatio};

/// Default fuzzy threshold; a candidate must score strictly above it
pub const DEFAULT_FUZZY_THRESHOLD: f64 = 0.9;

/// Which rule located the ground-truth entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchRule {
    Exact,
    Normalized,
    Fuzzy,
    /// Taken from the record itself, no lookup
    Embedded,
}

impl std::fmt::Display for MatchRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MatchRule::Exact => write!(f, "exact"),
            MatchRule::Normalized => write!(f, "normalized"),
            MatchRule::Fuzzy => write!(f, "fuzzy"),
            MatchRule::Embedded => write!(f, "embedded"),
        }
    }
}

/// How a record was tied to its expected label
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroundTruthMatch {
    pub rule: MatchRule,
    /// Sequence ratio between the two raw snippets (1.0 when embedded)
    pub similarity: f64,
    pub level: String,
    /// Position in the pool (absent when embedded)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pool_index: Option<usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    Resolved {
        expected: ViolationLabel,
        matched: GroundTruthMatch,
    },
    Unresolved,
}

/// Strategy for establishing what the right answer for a record is
pub trait GroundTruthSource: Send + Sync {
    fn resolve(&self, record: &OutputRecord) -> Resolution;
}

/// Look the record's input snippet up in a curated pool
pub struct ExternalPoolLookup {
    pool: Vec<GroundTruthRecord>,
    /// Pool inputs, trimmed and whitespace-collapsed, computed once
    normalized: Vec<String>,
    threshold: f64,
    ratio: SequenceRatio,
}

impl ExternalPoolLookup {
    pub fn new(pool: Vec<GroundTruthRecord>, threshold: f64) -> Self {
        let normalized = pool.iter().map(|gt| normalize_whitespace(&gt.input)).collect();
        Self {
            pool,
            normalized,
            threshold,
            ratio: SequenceRatio::new(),
        }
    }

    /// Toggle the popular-element heuristic of the fuzzy rule
    pub fn with_autojunk(mut self, on: bool) -> Self {
        self.ratio = self.ratio.autojunk(on);
        self
    }

    pub fn len(&self) -> usize {
        self.pool.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pool.is_empty()
    }

    /// Find the pool entry for `snippet`
    ///
    /// Rules are tried in priority order over the whole pool; a later rule
    /// never overrides an earlier one, whatever the scores. Exact and fuzzy
    /// comparisons ignore leading and trailing whitespace.
    pub fn lookup(&self, snippet: &str) -> Option<(usize, MatchRule)> {
        let trimmed = snippet.trim();
        if let Some(idx) = self.pool.iter().position(|gt| gt.input.trim() == trimmed) {
            return Some((idx, MatchRule::Exact));
        }

        let wanted = normalize_whitespace(snippet);
        if let Some(idx) = self.normalized.iter().position(|n| *n == wanted) {
            return Some((idx, MatchRule::Normalized));
        }

        self.pool
            .iter()
            .position(|gt| self.ratio.ratio(trimmed, gt.input.trim()) > self.threshold)
            .map(|idx| (idx, MatchRule::Fuzzy))
    }

    /// [`lookup`](Self::lookup) plus the sequence ratio of the raw snippets
    ///
    /// The ratio uses the same settings as the fuzzy rule.
    pub fn match_snippet(&self, snippet: &str) -> Option<(usize, MatchRule, f64)> {
        self.lookup(snippet)
            .map(|(idx, rule)| (idx, rule, self.ratio.ratio(snippet, &self.pool[idx].input)))
    }

    pub fn pool(&self) -> &[GroundTruthRecord] {
        &self.pool
    }
}

impl GroundTruthSource for ExternalPoolLookup {
    fn resolve(&self, record: &OutputRecord) -> Resolution {
        match self.match_snippet(&record.input) {
            Some((idx, rule, similarity)) => {
                let gt = &self.pool[idx];
                tracing::debug!(id = record.id, %rule, idx, similarity, "Ground truth matched");
                Resolution::Resolved {
                    expected: gt.violation,
                    matched: GroundTruthMatch {
                        rule,
                        similarity,
                        level: gt.level.clone(),
                        pool_index: Some(idx),
                    },
                }
            }
            None => {
                tracing::debug!(id = record.id, pool = self.pool.len(), "No ground truth found");
                Resolution::Unresolved
            }
        }
    }
}

/// Trust the record's own declared violation
#[derive(Debug, Default, Clone, Copy)]
pub struct EmbeddedLabel;

impl GroundTruthSource for EmbeddedLabel {
    fn resolve(&self, record: &OutputRecord) -> Resolution {
        match (record.grouping.known(), record.declared_violation) {
            (Some(_), Some(expected)) => Resolution::Resolved {
                expected,
                matched: GroundTruthMatch {
                    rule: MatchRule::Embedded,
                    similarity: 1.0,
                    level: UNKNOWN.to_string(),
                    pool_index: None,
                },
            },
            _ => Resolution::Unresolved,
        }
    }
}

/// Configured ground-truth source
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroundTruthMode {
    /// Fuzzy lookup into `<type>_violations.json` pools
    #[default]
    External,
    /// Self-declared label in each output record
    Embedded,
}

impl std::fmt::Display for GroundTruthMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GroundTruthMode::External => write!(f, "external"),
            GroundTruthMode::Embedded => write!(f, "embedded"),
        }
    }
}

impl std::str::FromStr for GroundTruthMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "external" => Ok(GroundTruthMode::External),
            "embedded" => Ok(GroundTruthMode::Embedded),
            _ => Err(format!("Unknown mode '{}'. Valid: external, embedded", s)),
        }
    }
}
