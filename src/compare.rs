//! Per-record classification
//!
//! Each output record goes through one pass, with no retries:
//!
//! 1. Resolve the expected label. Unresolvable means `ERROR`; nothing else runs.
//! 2. Extract the detected label. Nothing found or several distinct labels
//!    means `FAIL` with no detected label, and the case goes to review.
//! 3. Compare. Equal labels give `PASS`; otherwise `FAIL` (`LABEL_MISMATCH`).
//! 4. For labelled outcomes, run the secondary code analysis (verdict unchanged).
//!
//! Side effects go into a caller-owned [`ReviewLog`], never into comparator state.

use serde::Serialize;

use crate::analysis::{analyze_response, CodeAnalysis};
use crate::extract::{extract_labels, Extraction, ExtractionResult};
use crate::ground_truth::{GroundTruthMatch, GroundTruthSource, Resolution};
use crate::label::ViolationLabel;
use crate::record::OutputRecord;
use crate::review::{ReviewCase, ReviewLog, ReviewReason};
use crate::strategy::Strategy;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Status {
    Pass,
    Fail,
    Error,
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Status::Pass => write!(f, "PASS"),
            Status::Fail => write!(f, "FAIL"),
            Status::Error => write!(f, "ERROR"),
        }
    }
}

/// Why a record did not pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailureReason {
    ExtractionNoMatch,
    ExtractionMultiple,
    GroundTruthUnresolved,
    LabelMismatch,
}

impl FailureReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureReason::ExtractionNoMatch => "EXTRACTION_NO_MATCH",
            FailureReason::ExtractionMultiple => "EXTRACTION_MULTIPLE",
            FailureReason::GroundTruthUnresolved => "GROUND_TRUTH_UNRESOLVED",
            FailureReason::LabelMismatch => "LABEL_MISMATCH",
        }
    }

    /// Status a record with this reason ends in
    pub fn status(&self) -> Status {
        match self {
            FailureReason::GroundTruthUnresolved => Status::Error,
            _ => Status::Fail,
        }
    }
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Verdict for one output record
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonResult {
    pub id: i64,
    pub status: Status,
    pub model: String,
    pub strategy: Strategy,
    pub language: String,
    /// `None` only when ground truth could not be resolved
    pub expected: Option<ViolationLabel>,
    pub detected: Option<ViolationLabel>,
    pub violation_match: bool,
    pub failure_reason: Option<FailureReason>,
    /// Distinct labels the extractor saw (more than one for EXTRACTION_MULTIPLE)
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub candidates: Vec<ViolationLabel>,
    pub ground_truth: Option<GroundTruthMatch>,
    /// Response length in characters
    pub response_length: usize,
    #[serde(skip_serializing_if = "CodeAnalysis::is_empty")]
    pub analysis: CodeAnalysis,
}

impl ComparisonResult {
    fn new(record: &OutputRecord, strategy: Strategy, status: Status) -> Self {
        Self {
            id: record.id,
            status,
            model: record.model.clone(),
            strategy,
            language: record.language.clone(),
            expected: None,
            detected: None,
            violation_match: false,
            failure_reason: None,
            candidates: Vec::new(),
            ground_truth: None,
            response_length: record.raw_response.chars().count(),
            analysis: CodeAnalysis::default(),
        }
    }
}

/// Runs records through the classification pipeline against one source
pub struct Comparator<'a> {
    source: &'a dyn GroundTruthSource,
}

impl<'a> Comparator<'a> {
    pub fn new(source: &'a dyn GroundTruthSource) -> Self {
        Self { source }
    }

    /// Classify one record
    ///
    /// `strategy` is the strategy the responses were generated under (taken
    /// from the result folder, not the record). Review cases and pattern
    /// statistics are appended to `log`.
    pub fn compare(
        &self,
        record: &OutputRecord,
        strategy: Strategy,
        log: &mut ReviewLog,
    ) -> ComparisonResult {
        let (expected, matched) = match self.source.resolve(record) {
            Resolution::Resolved { expected, matched } => (expected, matched),
            Resolution::Unresolved => {
                tracing::debug!(id = record.id, "ERROR: ground truth unresolved");
                let mut result = ComparisonResult::new(record, strategy, Status::Error);
                result.failure_reason = Some(FailureReason::GroundTruthUnresolved);
                return result;
            }
        };

        let extraction = extract_labels(&record.raw_response, strategy);
        let label = match extraction.outcome() {
            Extraction::Single(label) => label,
            Extraction::NoMatch => {
                return extraction_failure(
                    record,
                    strategy,
                    (expected, matched),
                    extraction,
                    ReviewReason::NoMatch,
                    log,
                )
            }
            Extraction::Multiple(_) => {
                return extraction_failure(
                    record,
                    strategy,
                    (expected, matched),
                    extraction,
                    ReviewReason::MultipleViolations,
                    log,
                )
            }
        };

        log.patterns
            .record_detection(&record.language, record.grouping.known(), label);

        let violation_match = label == expected;
        let status = if violation_match {
            Status::Pass
        } else {
            Status::Fail
        };

        let analysis = analyze_response(&record.raw_response, label);
        log.patterns.record_analysis(&analysis, label);

        tracing::debug!(id = record.id, %expected, detected = %label, %status, "Classified");
        let mut result = ComparisonResult::new(record, strategy, status);
        result.expected = Some(expected);
        result.detected = Some(label);
        result.violation_match = violation_match;
        result.failure_reason = (!violation_match).then_some(FailureReason::LabelMismatch);
        result.candidates = vec![label];
        result.ground_truth = Some(matched);
        result.analysis = analysis;
        result
    }
}

/// FAIL with no detected label; the case is filed for manual review
fn extraction_failure(
    record: &OutputRecord,
    strategy: Strategy,
    (expected, matched): (ViolationLabel, GroundTruthMatch),
    extraction: ExtractionResult,
    reason: ReviewReason,
    log: &mut ReviewLog,
) -> ComparisonResult {
    log.push(ReviewCase::new(record, strategy, expected, &extraction, reason));
    tracing::debug!(id = record.id, %reason, "FAIL: extraction");

    let mut result = ComparisonResult::new(record, strategy, Status::Fail);
    result.expected = Some(expected);
    result.failure_reason = Some(match reason {
        ReviewReason::NoMatch => FailureReason::ExtractionNoMatch,
        ReviewReason::MultipleViolations => FailureReason::ExtractionMultiple,
    });
    result.candidates = extraction.labels.into_iter().collect();
    result.ground_truth = Some(matched);
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ground_truth::{EmbeddedLabel, ExternalPoolLookup, MatchRule};
    use crate::label::{Grouping, ViolationType};
    use crate::record::GroundTruthRecord;

    fn record(id: i64, response: &str) -> OutputRecord {
        OutputRecord {
            id,
            strategy: None,
            grouping: Grouping::Known(ViolationType::Srp),
            model: "llama".into(),
            language: "JAVA".into(),
            input: "class Report { void print() {} void save() {} }".into(),
            raw_response: response.into(),
            declared_violation: Some(ViolationLabel::Srp),
        }
    }

    #[test]
    fn test_pass_single_label() {
        let mut log = ReviewLog::default();
        let r = Comparator::new(&EmbeddedLabel).compare(
            &record(1, "**SRP**\nThis violates SRP because..."),
            Strategy::Example,
            &mut log,
        );
        assert_eq!(r.status, Status::Pass);
        assert_eq!(r.expected, Some(ViolationLabel::Srp));
        assert_eq!(r.detected, Some(ViolationLabel::Srp));
        assert!(r.violation_match);
        assert_eq!(r.failure_reason, None);
        assert_eq!(log.case_count(), 0);
        assert_eq!(log.patterns.detected[&ViolationLabel::Srp], 1);
    }

    #[test]
    fn test_multiple_goes_to_review() {
        let mut log = ReviewLog::default();
        let r = Comparator::new(&EmbeddedLabel).compare(
            &record(2, "**SRP**\n...\n**OCP**\n..."),
            Strategy::Smell,
            &mut log,
        );
        assert_eq!(r.status, Status::Fail);
        assert_eq!(r.detected, None);
        assert_eq!(r.failure_reason, Some(FailureReason::ExtractionMultiple));
        assert_eq!(r.candidates, vec![ViolationLabel::Srp, ViolationLabel::Ocp]);
        assert_eq!(log.multiple_violations.len(), 1);
        assert!(log.failed_extractions.is_empty());
        let case = &log.multiple_violations[0];
        assert_eq!(
            case.all_violations_found,
            vec![ViolationLabel::Srp, ViolationLabel::Ocp]
        );
        assert_eq!(case.folder_source, "srp--llama--smell");
    }

    #[test]
    fn test_no_match_goes_to_review() {
        let mut log = ReviewLog::default();
        let r = Comparator::new(&EmbeddedLabel).compare(
            &record(3, "This class does too much."),
            Strategy::Example,
            &mut log,
        );
        assert_eq!(r.status, Status::Fail);
        assert_eq!(r.detected, None);
        assert_eq!(r.failure_reason, Some(FailureReason::ExtractionNoMatch));
        assert_eq!(log.failed_extractions.len(), 1);
        assert_eq!(log.failed_extractions[0].reason, ReviewReason::NoMatch);
        assert_eq!(
            log.failed_extractions[0].pattern_used,
            Strategy::Example.rule().pattern()
        );
    }

    #[test]
    fn test_label_mismatch() {
        let mut log = ReviewLog::default();
        let r = Comparator::new(&EmbeddedLabel).compare(
            &record(4, "MOST IMPACTFUL VIOLATION: DIP"),
            Strategy::Ensemble,
            &mut log,
        );
        assert_eq!(r.status, Status::Fail);
        assert_eq!(r.detected, Some(ViolationLabel::Dip));
        assert_eq!(r.failure_reason, Some(FailureReason::LabelMismatch));
        assert!(!r.violation_match);
        assert_eq!(log.case_count(), 0);
    }

    #[test]
    fn test_unresolved_is_error_without_review() {
        let lookup = ExternalPoolLookup::new(
            vec![GroundTruthRecord {
                input: "interface Bird { void fly(); }".into(),
                violation: ViolationLabel::Lsp,
                level: "easy".into(),
                language: "JAVA".into(),
            }],
            0.9,
        );
        let mut log = ReviewLog::default();
        // Response would be NO_MATCH, but resolution fails first
        let r = Comparator::new(&lookup).compare(&record(5, "nothing"), Strategy::Example, &mut log);
        assert_eq!(r.status, Status::Error);
        assert_eq!(r.expected, None);
        assert_eq!(r.detected, None);
        assert_eq!(r.failure_reason, Some(FailureReason::GroundTruthUnresolved));
        assert_eq!(log.case_count(), 0);
    }

    #[test]
    fn test_external_exact_match_then_compare() {
        let rec = record(6, "**NONE**");
        let lookup = ExternalPoolLookup::new(
            vec![GroundTruthRecord {
                input: rec.input.clone(),
                violation: ViolationLabel::None,
                level: "hard".into(),
                language: "JAVA".into(),
            }],
            0.9,
        );
        let mut log = ReviewLog::default();
        let r = Comparator::new(&lookup).compare(&rec, Strategy::Smell, &mut log);
        assert_eq!(r.status, Status::Pass);
        let gt = r.ground_truth.unwrap();
        assert_eq!(gt.rule, MatchRule::Exact);
        assert_eq!(gt.level, "hard");
    }

    #[test]
    fn test_analysis_runs_on_pass_with_code() {
        let response = "**SRP**\n```java\nclass Invoice {}\nclass InvoicePrinter {}\n```";
        let mut log = ReviewLog::default();
        let r = Comparator::new(&EmbeddedLabel).compare(&record(7, response), Strategy::Example, &mut log);
        assert_eq!(r.status, Status::Pass);
        assert!(!r.analysis.is_empty());
        assert!(r.analysis.refactoring.values().all(|a| a.violation_addressed));
    }

    #[test]
    fn test_response_length_counts_chars() {
        let mut log = ReviewLog::default();
        let r = Comparator::new(&EmbeddedLabel).compare(&record(8, "**SRP** é"), Strategy::Example, &mut log);
        assert_eq!(r.response_length, 9);
    }

    #[test]
    fn test_failure_reason_status() {
        assert_eq!(FailureReason::GroundTruthUnresolved.status(), Status::Error);
        assert_eq!(FailureReason::LabelMismatch.status(), Status::Fail);
        assert_eq!(
            serde_json::to_string(&FailureReason::ExtractionNoMatch).unwrap(),
            "\"EXTRACTION_NO_MATCH\""
        );
    }
}
