//! Manual-review side channel
//!
//! Responses the extractor could not reduce to one label are kept with full
//! context so a person can read them later. Detection and code-pattern
//! counts are gathered alongside. A [`ReviewLog`] is owned by whoever runs
//! the comparisons; parallel workers each fill their own and merge at the end.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::analysis::{refactoring_catalogue, CodeAnalysis, CodeLanguage};
use crate::extract::ExtractionResult;
use crate::label::{ViolationLabel, ViolationType};
use crate::record::OutputRecord;
use crate::strategy::Strategy;

/// Why a response needs a human
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReviewReason {
    NoMatch,
    MultipleViolations,
}

impl std::fmt::Display for ReviewReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReviewReason::NoMatch => write!(f, "NO_MATCH"),
            ReviewReason::MultipleViolations => write!(f, "MULTIPLE_VIOLATIONS"),
        }
    }
}

/// One response routed to manual review, with everything needed to judge it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReviewCase {
    pub id: i64,
    pub model: String,
    pub strategy: Strategy,
    pub language: String,
    pub expected_violation: ViolationLabel,
    pub reason: ReviewReason,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub all_violations_found: Vec<ViolationLabel>,
    /// Regex source of the extraction rule that was applied
    pub pattern_used: &'static str,
    pub raw_response: String,
    pub input_code: String,
    /// `<violation>--<model>--<strategy>`
    pub folder_source: String,
}

impl ReviewCase {
    pub fn new(
        record: &OutputRecord,
        strategy: Strategy,
        expected: ViolationLabel,
        extraction: &ExtractionResult,
        reason: ReviewReason,
    ) -> Self {
        Self {
            id: record.id,
            model: record.model.clone(),
            strategy,
            language: record.language.clone(),
            expected_violation: expected,
            reason,
            all_violations_found: extraction.labels.iter().copied().collect(),
            pattern_used: extraction.rule.pattern(),
            raw_response: record.raw_response.clone(),
            input_code: record.input.clone(),
            folder_source: format!("{}--{}--{}", record.grouping, record.model, strategy),
        }
    }
}

/// Detection and code-pattern counts, reusable as a reference library
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PatternStats {
    /// Successfully extracted labels
    pub detected: BTreeMap<ViolationLabel, usize>,
    pub by_language: BTreeMap<String, BTreeMap<ViolationLabel, usize>>,
    pub by_violation_type: BTreeMap<ViolationType, BTreeMap<ViolationLabel, usize>>,
    /// Fenced blocks seen per fence language
    pub code_blocks: BTreeMap<CodeLanguage, usize>,
    /// Refactoring pattern hits per detected principle
    pub refactoring: BTreeMap<ViolationLabel, BTreeMap<&'static str, usize>>,
}

impl PatternStats {
    pub fn record_detection(
        &mut self,
        language: &str,
        violation_type: Option<ViolationType>,
        label: ViolationLabel,
    ) {
        *self.detected.entry(label).or_default() += 1;
        *self
            .by_language
            .entry(language.to_string())
            .or_default()
            .entry(label)
            .or_default() += 1;
        if let Some(vt) = violation_type {
            *self
                .by_violation_type
                .entry(vt)
                .or_default()
                .entry(label)
                .or_default() += 1;
        }
    }

    pub fn record_analysis(&mut self, analysis: &CodeAnalysis, label: ViolationLabel) {
        for (lang, blocks) in &analysis.code_blocks {
            *self.code_blocks.entry(*lang).or_default() += blocks.len();
        }
        for refactoring in analysis.refactoring.values() {
            let hits = self.refactoring.entry(label).or_default();
            for hit in &refactoring.specific_patterns {
                *hits.entry(hit.pattern).or_default() += hit.matches.len();
            }
        }
    }

    pub fn merge(&mut self, other: PatternStats) {
        fn add<K: Ord>(into: &mut BTreeMap<K, usize>, from: BTreeMap<K, usize>) {
            for (k, v) in from {
                *into.entry(k).or_default() += v;
            }
        }
        add(&mut self.detected, other.detected);
        for (lang, counts) in other.by_language {
            add(self.by_language.entry(lang).or_default(), counts);
        }
        for (vt, counts) in other.by_violation_type {
            add(self.by_violation_type.entry(vt).or_default(), counts);
        }
        add(&mut self.code_blocks, other.code_blocks);
        for (label, hits) in other.refactoring {
            add(self.refactoring.entry(label).or_default(), hits);
        }
    }

    pub fn total_detected(&self) -> usize {
        self.detected.values().sum()
    }
}

/// Everything a comparison run sets aside besides its verdicts
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReviewLog {
    pub failed_extractions: Vec<ReviewCase>,
    pub multiple_violations: Vec<ReviewCase>,
    pub patterns: PatternStats,
}

impl ReviewLog {
    /// File a case under its reason
    pub fn push(&mut self, case: ReviewCase) {
        match case.reason {
            ReviewReason::NoMatch => self.failed_extractions.push(case),
            ReviewReason::MultipleViolations => self.multiple_violations.push(case),
        }
    }

    /// Append another log (order within each list is kept)
    pub fn merge(&mut self, other: ReviewLog) {
        self.failed_extractions.extend(other.failed_extractions);
        self.multiple_violations.extend(other.multiple_violations);
        self.patterns.merge(other.patterns);
    }

    pub fn case_count(&self) -> usize {
        self.failed_extractions.len() + self.multiple_violations.len()
    }
}

fn count_by_model(cases: &[ReviewCase]) -> BTreeMap<String, usize> {
    let mut by_model = BTreeMap::new();
    for case in cases {
        *by_model.entry(case.model.clone()).or_default() += 1;
    }
    by_model
}

/// Export document for responses with no recognizable label
#[derive(Debug, Serialize)]
pub struct FailedExtractionReport<'a> {
    pub generated_at: String,
    pub total_cases: usize,
    pub by_model: BTreeMap<String, usize>,
    pub cases: &'a [ReviewCase],
}

impl<'a> FailedExtractionReport<'a> {
    pub fn build(cases: &'a [ReviewCase]) -> Self {
        Self {
            generated_at: chrono::Utc::now().to_rfc3339(),
            total_cases: cases.len(),
            by_model: count_by_model(cases),
            cases,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MultipleViolationsSummary {
    pub total_cases: usize,
    pub by_violation_type: BTreeMap<ViolationLabel, usize>,
    pub by_model: BTreeMap<String, usize>,
}

/// Export document for responses naming several principles
#[derive(Debug, Serialize)]
pub struct MultipleViolationsReport<'a> {
    pub generated_at: String,
    pub summary: MultipleViolationsSummary,
    /// Expected violation, then model
    pub cases_by_violation_type: BTreeMap<ViolationLabel, BTreeMap<String, Vec<&'a ReviewCase>>>,
    pub all_cases: &'a [ReviewCase],
}

impl<'a> MultipleViolationsReport<'a> {
    pub fn build(cases: &'a [ReviewCase]) -> Self {
        let mut grouped: BTreeMap<ViolationLabel, BTreeMap<String, Vec<&'a ReviewCase>>> =
            BTreeMap::new();
        for case in cases {
            grouped
                .entry(case.expected_violation)
                .or_default()
                .entry(case.model.clone())
                .or_default()
                .push(case);
        }
        let by_violation_type = grouped
            .iter()
            .map(|(label, models)| (*label, models.values().map(Vec::len).sum()))
            .collect();

        Self {
            generated_at: chrono::Utc::now().to_rfc3339(),
            summary: MultipleViolationsSummary {
                total_cases: cases.len(),
                by_violation_type,
                by_model: count_by_model(cases),
            },
            cases_by_violation_type: grouped,
            all_cases: cases,
        }
    }
}

/// Timestamped export of pattern statistics and the regexes behind them
#[derive(Debug, Serialize)]
pub struct PatternLibrary<'a> {
    pub generated_at: String,
    /// Strategy name to extraction regex
    pub extraction_patterns: BTreeMap<Strategy, &'static str>,
    pub refactoring_patterns: BTreeMap<ViolationLabel, BTreeMap<&'static str, &'static str>>,
    pub statistics: &'a PatternStats,
    pub total_detected: usize,
}

impl<'a> PatternLibrary<'a> {
    pub fn build(stats: &'a PatternStats) -> Self {
        let extraction_patterns = Strategy::ALL
            .iter()
            .map(|s| (*s, s.rule().pattern()))
            .collect();
        let refactoring_patterns = ViolationLabel::ALL
            .iter()
            .filter(|l| **l != ViolationLabel::None)
            .map(|l| (*l, refactoring_catalogue(*l).iter().copied().collect()))
            .collect();
        Self {
            generated_at: chrono::Utc::now().to_rfc3339(),
            extraction_patterns,
            refactoring_patterns,
            statistics: stats,
            total_detected: stats.total_detected(),
        }
    }
}
