//! # solidbench - SOLID violation detection benchmark
//!
//! Scores free-form language-model answers to "which SOLID principle does
//! this code violate?" against curated ground truth.
//!
//! ## Features
//!
//! - **Strategy-aware extraction**: each prompting strategy has its own label convention
//! - **De-duplicate then count**: repeating a label never makes an answer ambiguous
//! - **Ground-truth matching**: exact, whitespace-normalized, then fuzzy (ratio > 0.9)
//! - **Review side channel**: ambiguous and unreadable answers kept for a human
//! - **Two accuracy metrics**: with and without ERROR in the denominator
//!
//! ## Quick Start
//!
//! ```no_run
//! use solidbench::{Comparator, EmbeddedLabel, ReviewLog, Strategy};
//! use solidbench::record::OutputRecord;
//!
//! # fn main() -> anyhow::Result<()> {
//! let line = r#"{"id": 1, "violation_type": "srp", "raw_response": "**SRP**"}"#;
//! let record = OutputRecord::from_json_line(line)?;
//!
//! let mut log = ReviewLog::default();
//! let result = Comparator::new(&EmbeddedLabel).compare(&record, Strategy::Example, &mut log);
//! println!("{} -> {}", record.id, result.status);
//! # Ok(())
//! # }
//! ```

pub mod analysis;
pub mod compare;
pub mod config;
pub mod extract;
pub mod ground_truth;
pub mod label;
pub mod record;
pub mod review;
pub mod run;
pub mod similarity;
pub mod stats;
pub mod strategy;

pub use compare::{Comparator, ComparisonResult, FailureReason, Status};
pub use extract::{extract_labels, Extraction, ExtractionResult, ExtractionRule};
pub use ground_truth::{
    EmbeddedLabel, ExternalPoolLookup, GroundTruthMatch, GroundTruthMode, GroundTruthSource,
    MatchRule, Resolution,
};
pub use label::{Grouping, ViolationLabel, ViolationType};
pub use record::{GroundTruthRecord, OutputRecord};
pub use review::{ReviewCase, ReviewLog, ReviewReason};
pub use run::{run_comparison, RunOptions, RunReport};
pub use stats::{RunStats, VerdictCounts};
pub use strategy::Strategy;
