//! Violation labels and violation-type groupings
//!
//! The closed vocabulary every extracted answer must fall into. Anything a
//! model writes that is not one of these six labels is noise.

use serde::{Deserialize, Serialize};

/// A SOLID principle named as the violated one, or `NONE`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ViolationLabel {
    /// Single Responsibility Principle
    Srp,
    /// Open/Closed Principle
    Ocp,
    /// Liskov Substitution Principle
    Lsp,
    /// Interface Segregation Principle
    Isp,
    /// Dependency Inversion Principle
    Dip,
    /// No violation present
    None,
}

impl ViolationLabel {
    /// Every label, in display order
    pub const ALL: [ViolationLabel; 6] = [
        ViolationLabel::Srp,
        ViolationLabel::Ocp,
        ViolationLabel::Lsp,
        ViolationLabel::Isp,
        ViolationLabel::Dip,
        ViolationLabel::None,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ViolationLabel::Srp => "SRP",
            ViolationLabel::Ocp => "OCP",
            ViolationLabel::Lsp => "LSP",
            ViolationLabel::Isp => "ISP",
            ViolationLabel::Dip => "DIP",
            ViolationLabel::None => "NONE",
        }
    }

    /// The violation-type grouping this label belongs to (`None` for `NONE`)
    pub fn violation_type(&self) -> Option<ViolationType> {
        match self {
            ViolationLabel::Srp => Some(ViolationType::Srp),
            ViolationLabel::Ocp => Some(ViolationType::Ocp),
            ViolationLabel::Lsp => Some(ViolationType::Lsp),
            ViolationLabel::Isp => Some(ViolationType::Isp),
            ViolationLabel::Dip => Some(ViolationType::Dip),
            ViolationLabel::None => None,
        }
    }
}

impl std::fmt::Display for ViolationLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a string is not in the label vocabulary
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown violation label: '{input}'. Valid: SRP, OCP, LSP, ISP, DIP, NONE")]
pub struct ParseLabelError {
    /// The rejected input
    pub input: String,
}

impl std::str::FromStr for ViolationLabel {
    type Err = ParseLabelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "SRP" => Ok(ViolationLabel::Srp),
            "OCP" => Ok(ViolationLabel::Ocp),
            "LSP" => Ok(ViolationLabel::Lsp),
            "ISP" => Ok(ViolationLabel::Isp),
            "DIP" => Ok(ViolationLabel::Dip),
            "NONE" => Ok(ViolationLabel::None),
            _ => Err(ParseLabelError {
                input: s.to_string(),
            }),
        }
    }
}

/// The violation type a result folder / ground-truth file is scoped to
///
/// Displayed lowercase because that is how folder prefixes
/// (`dip--model--smell`) and the `violation_type` field spell it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViolationType {
    Dip,
    Isp,
    Lsp,
    Ocp,
    Srp,
}

impl ViolationType {
    /// All groupings, in the order result folders are processed
    pub const ALL: [ViolationType; 5] = [
        ViolationType::Dip,
        ViolationType::Isp,
        ViolationType::Lsp,
        ViolationType::Ocp,
        ViolationType::Srp,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ViolationType::Dip => "dip",
            ViolationType::Isp => "isp",
            ViolationType::Lsp => "lsp",
            ViolationType::Ocp => "ocp",
            ViolationType::Srp => "srp",
        }
    }

    /// The label a correct answer for this grouping carries
    pub fn label(&self) -> ViolationLabel {
        match self {
            ViolationType::Dip => ViolationLabel::Dip,
            ViolationType::Isp => ViolationLabel::Isp,
            ViolationType::Lsp => ViolationLabel::Lsp,
            ViolationType::Ocp => ViolationLabel::Ocp,
            ViolationType::Srp => ViolationLabel::Srp,
        }
    }
}

impl std::fmt::Display for ViolationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ViolationType {
    type Err = ParseLabelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "dip" => Ok(ViolationType::Dip),
            "isp" => Ok(ViolationType::Isp),
            "lsp" => Ok(ViolationType::Lsp),
            "ocp" => Ok(ViolationType::Ocp),
            "srp" => Ok(ViolationType::Srp),
            _ => Err(ParseLabelError {
                input: s.to_string(),
            }),
        }
    }
}

/// The grouping an output record declares
///
/// Records with an unrecognized grouping are loaded but never compared.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Grouping {
    Known(ViolationType),
    Unrecognized(String),
}

impl Grouping {
    pub fn parse(raw: &str) -> Self {
        match raw.parse::<ViolationType>() {
            Ok(vt) => Grouping::Known(vt),
            Err(_) => Grouping::Unrecognized(raw.trim().to_ascii_lowercase()),
        }
    }

    pub fn known(&self) -> Option<ViolationType> {
        match self {
            Grouping::Known(vt) => Some(*vt),
            Grouping::Unrecognized(_) => None,
        }
    }
}

impl std::fmt::Display for Grouping {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Grouping::Known(vt) => write!(f, "{}", vt),
            Grouping::Unrecognized(s) if s.is_empty() => f.write_str("unknown"),
            Grouping::Unrecognized(s) => f.write_str(s),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_parse_case_insensitive() {
        assert_eq!("srp".parse::<ViolationLabel>().unwrap(), ViolationLabel::Srp);
        assert_eq!(" Dip ".parse::<ViolationLabel>().unwrap(), ViolationLabel::Dip);
        assert_eq!("none".parse::<ViolationLabel>().unwrap(), ViolationLabel::None);
    }

    #[test]
    fn test_label_parse_rejects_unknown() {
        let err = "ABC".parse::<ViolationLabel>().unwrap_err();
        assert_eq!(err.input, "ABC");
        assert!(err.to_string().contains("Valid: SRP"));
    }

    #[test]
    fn test_label_display_roundtrip() {
        for label in ViolationLabel::ALL {
            assert_eq!(label.to_string().parse::<ViolationLabel>().unwrap(), label);
        }
    }

    #[test]
    fn test_label_serde_uppercase() {
        let json = serde_json::to_string(&ViolationLabel::Isp).unwrap();
        assert_eq!(json, "\"ISP\"");
        let back: ViolationLabel = serde_json::from_str("\"NONE\"").unwrap();
        assert_eq!(back, ViolationLabel::None);
    }

    #[test]
    fn test_violation_type_label() {
        for vt in ViolationType::ALL {
            assert_eq!(vt.label().violation_type(), Some(vt));
        }
        assert_eq!(ViolationLabel::None.violation_type(), None);
    }

    #[test]
    fn test_grouping_parse() {
        assert_eq!(Grouping::parse("OCP"), Grouping::Known(ViolationType::Ocp));
        assert_eq!(
            Grouping::parse("Coupling"),
            Grouping::Unrecognized("coupling".into())
        );
        assert_eq!(Grouping::parse("").to_string(), "unknown");
    }
}
