//! Prompting strategies
//!
//! Each strategy shapes how a model phrases its answer, so each maps to
//! exactly one extraction rule. Unknown strategy names are rejected up front
//! instead of quietly falling back to the keyword rule.

use serde::{Deserialize, Serialize};

use crate::extract::ExtractionRule;

/// A named prompting convention used to generate the responses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// Plain question, answer in free prose
    Default,
    /// Several analyses merged, one "most impactful" verdict
    Ensemble,
    /// Few-shot examples with a bold verdict
    Example,
    /// Code-smell framing with a bold verdict
    Smell,
}

impl Strategy {
    pub const ALL: [Strategy; 4] = [
        Strategy::Default,
        Strategy::Ensemble,
        Strategy::Example,
        Strategy::Smell,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::Default => "default",
            Strategy::Ensemble => "ensemble",
            Strategy::Example => "example",
            Strategy::Smell => "smell",
        }
    }

    /// The extraction rule responses under this strategy are read with
    pub fn rule(&self) -> ExtractionRule {
        match self {
            Strategy::Default => ExtractionRule::Keyword,
            Strategy::Ensemble => ExtractionRule::LabeledLine,
            Strategy::Example | Strategy::Smell => ExtractionRule::Emphasis,
        }
    }
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown strategy name
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown strategy '{input}'. Valid: default, ensemble, example, smell")]
pub struct ParseStrategyError {
    /// The rejected input
    pub input: String,
}

impl std::str::FromStr for Strategy {
    type Err = ParseStrategyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "default" => Ok(Strategy::Default),
            "ensemble" => Ok(Strategy::Ensemble),
            "example" => Ok(Strategy::Example),
            "smell" => Ok(Strategy::Smell),
            _ => Err(ParseStrategyError {
                input: s.to_string(),
            }),
        }
    }
}
