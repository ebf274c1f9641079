//! Verdict aggregation
//!
//! Two accuracy figures are kept side by side and never folded into one:
//! `accuracy_all` counts ERROR records in the denominator, while
//! `accuracy_resolved` leaves them out.

use std::collections::BTreeMap;

use serde::ser::SerializeStruct;
use serde::Serialize;

use crate::compare::{ComparisonResult, Status};

/// PASS/FAIL/ERROR tallies
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VerdictCounts {
    pub total: usize,
    pub pass: usize,
    pub fail: usize,
    pub error: usize,
}

impl VerdictCounts {
    pub fn record(&mut self, status: Status) {
        self.total += 1;
        match status {
            Status::Pass => self.pass += 1,
            Status::Fail => self.fail += 1,
            Status::Error => self.error += 1,
        }
    }

    pub fn merge(&mut self, other: &VerdictCounts) {
        self.total += other.total;
        self.pass += other.pass;
        self.fail += other.fail;
        self.error += other.error;
    }

    /// PASS / (PASS + FAIL + ERROR)
    pub fn accuracy_all(&self) -> f64 {
        ratio(self.pass, self.total)
    }

    /// PASS / (PASS + FAIL)
    pub fn accuracy_resolved(&self) -> f64 {
        ratio(self.pass, self.pass + self.fail)
    }
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

impl<'a> FromIterator<&'a ComparisonResult> for VerdictCounts {
    fn from_iter<I: IntoIterator<Item = &'a ComparisonResult>>(iter: I) -> Self {
        let mut counts = VerdictCounts::default();
        for r in iter {
            counts.record(r.status);
        }
        counts
    }
}

impl Serialize for VerdictCounts {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("VerdictCounts", 6)?;
        s.serialize_field("total", &self.total)?;
        s.serialize_field("pass", &self.pass)?;
        s.serialize_field("fail", &self.fail)?;
        s.serialize_field("error", &self.error)?;
        s.serialize_field("accuracy_all", &self.accuracy_all())?;
        s.serialize_field("accuracy_resolved", &self.accuracy_resolved())?;
        s.end()
    }
}

/// Verdicts for one violation type within one result folder
#[derive(Debug, Clone, Serialize)]
pub struct ViolationTypeReport {
    pub items: Vec<ComparisonResult>,
    pub stats: VerdictCounts,
}

impl ViolationTypeReport {
    pub fn from_items(items: Vec<ComparisonResult>) -> Self {
        let stats = items.iter().collect();
        Self { items, stats }
    }
}

/// Run-level tallies plus the language distribution of compared records
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunStats {
    pub counts: VerdictCounts,
    pub languages: BTreeMap<String, usize>,
}

impl RunStats {
    pub fn record(&mut self, result: &ComparisonResult) {
        self.counts.record(result.status);
        *self.languages.entry(result.language.clone()).or_default() += 1;
    }

    pub fn merge(&mut self, other: &RunStats) {
        self.counts.merge(&other.counts);
        for (lang, n) in &other.languages {
            *self.languages.entry(lang.clone()).or_default() += n;
        }
    }
}
