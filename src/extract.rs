//! Violation-label extraction from free-form model responses
//!
//! A response is scanned with the rule its prompting strategy implies, every
//! hit is upper-cased and checked against the closed vocabulary, and the
//! surviving labels are collapsed into a set *before* counting. A response
//! that names SRP in its reasoning and again in its verdict therefore yields
//! one label, not two.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::label::ViolationLabel;
use crate::strategy::Strategy;

const KEYWORD_PATTERN: &str = r"\b(SRP|OCP|LSP|ISP|DIP|NONE)\b";
const EMPHASIS_PATTERN: &str = r"\*\*([A-Z]{2,3}|NONE)\*\*";
const LABELED_LINE_PATTERN: &str =
    r"(?:MOST IMPACTFUL VIOLATION:\s*(NONE|[A-Z]{2,3})\b|\*\*([A-Z]{2,3}|NONE)\*\*)";

static KEYWORD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&format!("(?i){KEYWORD_PATTERN}")).expect("valid regex"));
static EMPHASIS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&format!("(?i){EMPHASIS_PATTERN}")).expect("valid regex"));
static LABELED_LINE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&format!("(?i){LABELED_LINE_PATTERN}")).expect("valid regex"));

/// Lexical convention a label is recognized by
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionRule {
    /// Bare word match against the vocabulary anywhere in the text
    Keyword,
    /// Label wrapped in markdown bold: `**SRP**`
    Emphasis,
    /// `MOST IMPACTFUL VIOLATION: X` lines, merged with any emphasis hits
    LabeledLine,
}

impl ExtractionRule {
    /// Regex source for this rule (matched case-insensitively)
    ///
    /// Recorded verbatim in review cases so a reviewer can see what failed.
    pub fn pattern(&self) -> &'static str {
        match self {
            ExtractionRule::Keyword => KEYWORD_PATTERN,
            ExtractionRule::Emphasis => EMPHASIS_PATTERN,
            ExtractionRule::LabeledLine => LABELED_LINE_PATTERN,
        }
    }

    fn regex(&self) -> &'static Regex {
        match self {
            ExtractionRule::Keyword => &KEYWORD_RE,
            ExtractionRule::Emphasis => &EMPHASIS_RE,
            ExtractionRule::LabeledLine => &LABELED_LINE_RE,
        }
    }

    /// Scan `text` and return the distinct vocabulary labels found
    pub fn scan(&self, text: &str) -> BTreeSet<ViolationLabel> {
        self.regex()
            .captures_iter(text)
            .filter_map(|caps| {
                // LabeledLine has one group per alternative; the others have one
                caps.iter()
                    .skip(1)
                    .flatten()
                    .next()
                    .map(|m| m.as_str())
            })
            .filter_map(|raw| raw.parse::<ViolationLabel>().ok())
            .collect()
    }
}

impl std::fmt::Display for ExtractionRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExtractionRule::Keyword => write!(f, "keyword"),
            ExtractionRule::Emphasis => write!(f, "emphasis"),
            ExtractionRule::LabeledLine => write!(f, "labeled_line"),
        }
    }
}

/// Distinct labels recognized in one response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionResult {
    /// Rule the response was scanned with
    pub rule: ExtractionRule,
    /// De-duplicated labels, in vocabulary order
    pub labels: BTreeSet<ViolationLabel>,
}

/// What an extraction amounts to once duplicates are collapsed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extraction {
    /// Exactly one distinct label
    Single(ViolationLabel),
    /// Nothing recognizable under the active rule
    NoMatch,
    /// Two or more distinct labels (sorted)
    Multiple(Vec<ViolationLabel>),
}

impl ExtractionResult {
    pub fn outcome(&self) -> Extraction {
        let mut iter = self.labels.iter();
        match (iter.next(), iter.next()) {
            (None, _) => Extraction::NoMatch,
            (Some(label), None) => Extraction::Single(*label),
            (Some(_), Some(_)) => Extraction::Multiple(self.labels.iter().copied().collect()),
        }
    }
}

/// Extract candidate labels from `text` using the rule for `strategy`
pub fn extract_labels(text: &str, strategy: Strategy) -> ExtractionResult {
    let rule = strategy.rule();
    let labels = rule.scan(text);
    tracing::trace!(%strategy, %rule, found = labels.len(), "Scanned response");
    ExtractionResult { rule, labels }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(text: &str, strategy: Strategy) -> Vec<ViolationLabel> {
        extract_labels(text, strategy).labels.into_iter().collect()
    }

    #[test]
    fn test_emphasis_single_label() {
        let r = extract_labels("**SRP**\nThis violates SRP because...", Strategy::Example);
        assert_eq!(r.rule, ExtractionRule::Emphasis);
        assert_eq!(r.outcome(), Extraction::Single(ViolationLabel::Srp));
    }

    #[test]
    fn test_emphasis_two_labels_is_multiple() {
        let r = extract_labels("**SRP**\nfirst\n**OCP**\nsecond", Strategy::Smell);
        assert_eq!(
            r.outcome(),
            Extraction::Multiple(vec![ViolationLabel::Srp, ViolationLabel::Ocp])
        );
    }

    #[test]
    fn test_emphasis_no_markers_is_no_match() {
        let r = extract_labels("This class violates SRP.", Strategy::Example);
        assert_eq!(r.outcome(), Extraction::NoMatch);
    }

    #[test]
    fn test_emphasis_repeated_label_collapses() {
        let text = "**DIP** is the issue.\n\nFinal answer: **DIP**";
        assert_eq!(
            extract_labels(text, Strategy::Smell).outcome(),
            Extraction::Single(ViolationLabel::Dip)
        );
    }

    #[test]
    fn test_emphasis_lowercase_normalized() {
        assert_eq!(labels("**isp**", Strategy::Example), vec![ViolationLabel::Isp]);
    }

    #[test]
    fn test_emphasis_discards_out_of_vocabulary() {
        // **API** fits [A-Z]{2,3} but is not a principle
        assert_eq!(
            labels("Uses an **API** call. **LSP**", Strategy::Example),
            vec![ViolationLabel::Lsp]
        );
    }

    #[test]
    fn test_emphasis_requires_adjacent_markers() {
        assert!(labels("** SRP **", Strategy::Example).is_empty());
        assert!(labels("*SRP*", Strategy::Example).is_empty());
    }

    #[test]
    fn test_keyword_word_boundary() {
        assert_eq!(
            labels("The answer is dip.", Strategy::Default),
            vec![ViolationLabel::Dip]
        );
        // Embedded in a longer word: no match
        assert!(labels("SRPs and DIPLOMA", Strategy::Default).is_empty());
    }

    #[test]
    fn test_keyword_matches_bold_too() {
        assert_eq!(labels("**OCP**", Strategy::Default), vec![ViolationLabel::Ocp]);
    }

    #[test]
    fn test_keyword_multiple_distinct() {
        let r = extract_labels("Either SRP or ISP applies", Strategy::Default);
        assert!(matches!(r.outcome(), Extraction::Multiple(v) if v.len() == 2));
    }

    #[test]
    fn test_ensemble_labeled_line() {
        let text = "Analysis...\nMOST IMPACTFUL VIOLATION: LSP\nDetails";
        assert_eq!(
            extract_labels(text, Strategy::Ensemble).outcome(),
            Extraction::Single(ViolationLabel::Lsp)
        );
    }

    #[test]
    fn test_ensemble_labeled_line_none() {
        let text = "Analysis...\nMOST IMPACTFUL VIOLATION: NONE\n";
        assert_eq!(
            extract_labels(text, Strategy::Ensemble).outcome(),
            Extraction::Single(ViolationLabel::None)
        );
    }

    #[test]
    fn test_ensemble_labeled_line_needs_whole_word() {
        // Neither NONE nor a 3-letter prefix may be cut out of a longer word
        assert!(labels("MOST IMPACTFUL VIOLATION: NONEXISTENT", Strategy::Ensemble).is_empty());
        assert!(labels("MOST IMPACTFUL VIOLATION: SRPX", Strategy::Ensemble).is_empty());
    }

    #[test]
    fn test_ensemble_falls_back_to_emphasis() {
        assert_eq!(
            extract_labels("Verdict: **NONE**", Strategy::Ensemble).outcome(),
            Extraction::Single(ViolationLabel::None)
        );
    }

    #[test]
    fn test_ensemble_merges_both_forms() {
        let agree = "MOST IMPACTFUL VIOLATION: OCP\n\n**OCP**";
        assert_eq!(
            extract_labels(agree, Strategy::Ensemble).outcome(),
            Extraction::Single(ViolationLabel::Ocp)
        );
        let disagree = "most impactful violation: ocp\n\n**SRP**";
        assert_eq!(
            extract_labels(disagree, Strategy::Ensemble).outcome(),
            Extraction::Multiple(vec![ViolationLabel::Srp, ViolationLabel::Ocp])
        );
    }

    #[test]
    fn test_ensemble_label_wrapped_in_bold() {
        let text = "MOST IMPACTFUL VIOLATION: **ISP**";
        assert_eq!(
            extract_labels(text, Strategy::Ensemble).outcome(),
            Extraction::Single(ViolationLabel::Isp)
        );
    }

    #[test]
    fn test_rule_patterns_are_distinct() {
        assert_ne!(
            ExtractionRule::Keyword.pattern(),
            ExtractionRule::Emphasis.pattern()
        );
        assert!(ExtractionRule::LabeledLine
            .pattern()
            .contains("MOST IMPACTFUL VIOLATION"));
    }

    mod fuzz {
        use super::super::{extract_labels, Extraction};
        use crate::label::ViolationLabel;
        use crate::strategy::Strategy as Prompt;
        use proptest::prelude::*;

        fn any_prompt() -> impl Strategy<Value = Prompt> {
            prop_oneof![
                Just(Prompt::Default),
                Just(Prompt::Ensemble),
                Just(Prompt::Example),
                Just(Prompt::Smell),
            ]
        }

        fn any_label() -> impl Strategy<Value = ViolationLabel> {
            prop_oneof![
                Just(ViolationLabel::Srp),
                Just(ViolationLabel::Ocp),
                Just(ViolationLabel::Lsp),
                Just(ViolationLabel::Isp),
                Just(ViolationLabel::Dip),
                Just(ViolationLabel::None),
            ]
        }

        proptest! {
            /// Fuzz: arbitrary text never panics and never leaves the vocabulary
            #[test]
            fn fuzz_closed_vocabulary(input in "\\PC{0,300}", prompt in any_prompt()) {
                let result = extract_labels(&input, prompt);
                for label in &result.labels {
                    prop_assert!(ViolationLabel::ALL.contains(label));
                }
            }

            /// Fuzz: every emphasis hit is literally present in the text
            #[test]
            fn fuzz_emphasis_hits_are_present(input in "(\\*\\*[A-Za-z]{2,4}\\*\\*| |[a-z]{1,5}){0,30}") {
                let upper = input.to_uppercase();
                for label in extract_labels(&input, Prompt::Example).labels {
                    let needle = format!("**{}**", label);
                    prop_assert!(upper.contains(&needle));
                }
            }

            /// The same label mentioned N times in the recognized form yields one candidate
            #[test]
            fn dedup_is_idempotent(
                label in any_label(),
                n in 2usize..8,
                filler in "[xyz ]{0,40}",
                prompt in any_prompt(),
                labeled_line in any::<bool>()
            ) {
                // The labeled-line form is only recognized by the keyword and labeled-line rules
                let mention = if labeled_line && matches!(prompt, Prompt::Default | Prompt::Ensemble) {
                    format!("MOST IMPACTFUL VIOLATION: {}", label)
                } else {
                    format!("**{}**", label)
                };
                let text = std::iter::repeat(mention)
                    .take(n)
                    .collect::<Vec<_>>()
                    .join(&format!("\n{}\n", filler));
                let result = extract_labels(&text, prompt);
                prop_assert_eq!(result.outcome(), Extraction::Single(label));
            }
        }
    }
}
