//! Secondary code analysis on model responses.
//!
//! Heuristic regex scans over the fenced code a model proposes as a fix.
//! NOT a parser: best-effort text matching, and a scan that finds nothing
//! simply yields an empty/default result. Nothing here feeds back into the
//! PASS/FAIL/ERROR verdict.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::label::ViolationLabel;

/// Fence language a code block was tagged with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CodeLanguage {
    Java,
    Python,
    Kotlin,
    #[serde(rename = "csharp")]
    CSharp,
    /// Untagged or unknown fence, used only when no tagged block exists
    Generic,
}

impl CodeLanguage {
    pub const TAGGED: [CodeLanguage; 4] = [
        CodeLanguage::Java,
        CodeLanguage::Python,
        CodeLanguage::Kotlin,
        CodeLanguage::CSharp,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CodeLanguage::Java => "java",
            CodeLanguage::Python => "python",
            CodeLanguage::Kotlin => "kotlin",
            CodeLanguage::CSharp => "csharp",
            CodeLanguage::Generic => "generic",
        }
    }

    fn fence_regex(&self) -> &'static Regex {
        match self {
            CodeLanguage::Java => &JAVA_FENCE,
            CodeLanguage::Python => &PYTHON_FENCE,
            CodeLanguage::Kotlin => &KOTLIN_FENCE,
            CodeLanguage::CSharp => &CSHARP_FENCE,
            CodeLanguage::Generic => &GENERIC_FENCE,
        }
    }
}

impl std::fmt::Display for CodeLanguage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).expect("valid regex")
}

static JAVA_FENCE: LazyLock<Regex> = LazyLock::new(|| compile(r"(?is)```java\n(.*?)\n```"));
static PYTHON_FENCE: LazyLock<Regex> = LazyLock::new(|| compile(r"(?is)```python\n(.*?)\n```"));
static KOTLIN_FENCE: LazyLock<Regex> = LazyLock::new(|| compile(r"(?is)```kotlin\n(.*?)\n```"));
static CSHARP_FENCE: LazyLock<Regex> =
    LazyLock::new(|| compile(r"(?is)```(?:c#|csharp)\n(.*?)\n```"));
static GENERIC_FENCE: LazyLock<Regex> = LazyLock::new(|| compile(r"(?is)```(?:\w+)?\n(.*?)\n```"));

/// Pull fenced code out of a response, grouped by fence language
///
/// Tagged fences are collected per language. Untagged fences are returned
/// under [`CodeLanguage::Generic`] only when no tagged block was found.
pub fn extract_code_blocks(text: &str) -> BTreeMap<CodeLanguage, Vec<String>> {
    let mut blocks = BTreeMap::new();
    for lang in CodeLanguage::TAGGED {
        let found = captures(lang.fence_regex(), text);
        if !found.is_empty() {
            blocks.insert(lang, found);
        }
    }
    if blocks.is_empty() {
        let generic = captures(&GENERIC_FENCE, text);
        if !generic.is_empty() {
            blocks.insert(CodeLanguage::Generic, generic);
        }
    }
    blocks
}

fn captures(re: &Regex, text: &str) -> Vec<String> {
    re.captures_iter(text)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .collect()
}

// Structure scans per language: (interface, class, injection)
static JAVA_INTERFACE: LazyLock<Regex> =
    LazyLock::new(|| compile(r"(?i)(?:public\s+)?interface\s+(\w+)"));
static JAVA_CLASS: LazyLock<Regex> =
    LazyLock::new(|| compile(r"(?i)(?:public\s+)?class\s+(\w+)(?:\s+implements\s+(\w+))?"));
static JAVA_INJECTION: LazyLock<Regex> =
    LazyLock::new(|| compile(r"(?i)public\s+\w+\s*\(\s*\w+\s+\w+\s*\)"));
static PYTHON_CLASS: LazyLock<Regex> =
    LazyLock::new(|| compile(r"(?i)class\s+(\w+)(?:\s*\([^)]*\))?:"));
static PYTHON_INJECTION: LazyLock<Regex> =
    LazyLock::new(|| compile(r"(?i)def\s+__init__\s*\(\s*self\s*,\s*\w+"));
static KOTLIN_INTERFACE: LazyLock<Regex> = LazyLock::new(|| compile(r"(?i)interface\s+(\w+)"));
static KOTLIN_CLASS: LazyLock<Regex> =
    LazyLock::new(|| compile(r"(?i)class\s+(\w+)(?:\s*:\s*(\w+))?"));
static KOTLIN_INJECTION: LazyLock<Regex> =
    LazyLock::new(|| compile(r"(?i)constructor\s*\(\s*\w+\s*:\s*\w+\s*\)"));
static CSHARP_INTERFACE: LazyLock<Regex> =
    LazyLock::new(|| compile(r"(?i)(?:public\s+)?interface\s+I(\w+)"));
static CSHARP_CLASS: LazyLock<Regex> =
    LazyLock::new(|| compile(r"(?i)(?:public\s+)?class\s+(\w+)(?:\s*:\s*I?(\w+))?"));
static CSHARP_INJECTION: LazyLock<Regex> =
    LazyLock::new(|| compile(r"(?i)public\s+\w+\s*\(\s*I?\w+\s+\w+\s*\)"));

/// Interfaces, classes and constructor injection found in one block
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LanguageAnalysis {
    pub interfaces: Vec<String>,
    pub classes: Vec<String>,
    pub has_dependency_injection: bool,
    /// 2 for interfaces, 1 for classes, 3 for injection
    pub quality_score: u32,
}

/// Scan a code block with the structure rules for its language
///
/// Python has no interface rule; generic blocks are not scanned.
pub fn analyze_language(code: &str, lang: CodeLanguage) -> LanguageAnalysis {
    let (interface, class, injection): (Option<&Regex>, &Regex, &Regex) = match lang {
        CodeLanguage::Java => (Some(&JAVA_INTERFACE), &JAVA_CLASS, &JAVA_INJECTION),
        CodeLanguage::Python => (None, &PYTHON_CLASS, &PYTHON_INJECTION),
        CodeLanguage::Kotlin => (Some(&KOTLIN_INTERFACE), &KOTLIN_CLASS, &KOTLIN_INJECTION),
        CodeLanguage::CSharp => (Some(&CSHARP_INTERFACE), &CSHARP_CLASS, &CSHARP_INJECTION),
        CodeLanguage::Generic => return LanguageAnalysis::default(),
    };

    let mut analysis = LanguageAnalysis {
        interfaces: interface.map(|re| captures(re, code)).unwrap_or_default(),
        classes: captures(class, code),
        has_dependency_injection: injection.is_match(code),
        quality_score: 0,
    };
    if !analysis.interfaces.is_empty() {
        analysis.quality_score += 2;
    }
    if !analysis.classes.is_empty() {
        analysis.quality_score += 1;
    }
    if analysis.has_dependency_injection {
        analysis.quality_score += 3;
    }
    analysis
}

/// How convincingly a proposed fix addresses the violation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Quality {
    #[default]
    Low,
    Medium,
    High,
}

/// A named refactoring pattern and the text it matched
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PatternHit {
    pub pattern: &'static str,
    pub matches: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RefactoringAnalysis {
    pub violation_addressed: bool,
    pub quality: Quality,
    pub specific_patterns: Vec<PatternHit>,
}

/// Named refactoring patterns per principle, as `(name, regex source)`
///
/// All are matched case-insensitively with `.` spanning newlines.
pub fn refactoring_catalogue(label: ViolationLabel) -> &'static [(&'static str, &'static str)] {
    match label {
        ViolationLabel::Dip => &[
            ("interface_creation", r"(?:interface|abstract\s+class)\s+\w+"),
            ("dependency_injection", r"(?:constructor|__init__|init)\s*\([^)]*\w+\s+\w+"),
            ("abstraction_usage", r"private\s+(?:final\s+)?\w+\s+\w+;|self\.\w+\s*=\s*\w+"),
        ],
        ViolationLabel::Srp => &[
            ("class_separation", r"class\s+\w+"),
            ("method_extraction", r"(?:public|private|def)\s+\w+\s*\([^)]*\)"),
            ("responsibility_split", r"class\s+\w*(?:Service|Manager|Handler|Controller)"),
        ],
        ViolationLabel::Isp => &[
            ("interface_segregation", r"interface\s+\w+\s*\{[^}]*\}"),
            (
                "small_interfaces",
                r"interface\s+\w+\s*\{[^{]*(?:\w+\s*\([^)]*\);?\s*){1,3}[^}]*\}",
            ),
            ("multiple_interfaces", r"class\s+\w+\s+implements\s+\w+(?:\s*,\s*\w+)+"),
        ],
        ViolationLabel::Lsp => &[
            ("proper_inheritance", r"class\s+\w+\s+extends\s+\w+"),
            ("override_behavior", r"@Override|override\s+"),
            ("exception_throwing", r"throw\s+new\s+\w+Exception"),
        ],
        ViolationLabel::Ocp => &[
            ("polymorphism_usage", r"@Override|override\s+"),
            ("interface_implementation", r"implements\s+\w+"),
            ("abstract_methods", r"abstract\s+\w+\s+\w+\s*\("),
            ("if_else_chains", r"if\s*\([^)]+\)\s*\{[^}]*\}\s*else\s*if"),
        ],
        ViolationLabel::None => &[],
    }
}

struct CompiledCatalogue {
    label: ViolationLabel,
    patterns: Vec<(&'static str, Regex)>,
}

static CATALOGUE: LazyLock<Vec<CompiledCatalogue>> = LazyLock::new(|| {
    ViolationLabel::ALL
        .iter()
        .map(|&label| CompiledCatalogue {
            label,
            patterns: refactoring_catalogue(label)
                .iter()
                .map(|(name, src)| (*name, compile(&format!("(?is){src}"))))
                .collect(),
        })
        .collect()
});

fn compiled(label: ViolationLabel) -> &'static [(&'static str, Regex)] {
    CATALOGUE
        .iter()
        .find(|c| c.label == label)
        .map(|c| c.patterns.as_slice())
        .unwrap_or(&[])
}

/// Split code into sections, each starting at a class declaration
///
/// Text before the first declaration is dropped.
fn class_sections(code: &str, class_re: &Regex) -> Vec<String> {
    let starts: Vec<usize> = class_re.find_iter(code).map(|m| m.start()).collect();
    starts
        .iter()
        .enumerate()
        .map(|(i, &start)| {
            let end = starts.get(i + 1).copied().unwrap_or(code.len());
            code[start..end].to_string()
        })
        .collect()
}

/// Judge how a proposed fix addresses the detected principle
pub fn analyze_refactoring(code: &str, label: ViolationLabel) -> RefactoringAnalysis {
    let patterns = compiled(label);
    let mut analysis = RefactoringAnalysis::default();
    let mut counts: BTreeMap<&'static str, usize> = BTreeMap::new();

    for &(name, ref re) in patterns {
        let matches: Vec<String> = if name == "class_separation" {
            class_sections(code, re)
        } else {
            re.find_iter(code).map(|m| m.as_str().to_string()).collect()
        };
        counts.insert(name, matches.len());
        if !matches.is_empty() {
            analysis.specific_patterns.push(PatternHit {
                pattern: name,
                matches,
            });
        }
    }

    let hit = |name: &str| counts.get(name).copied().unwrap_or(0);
    match label {
        ViolationLabel::Dip => {
            let has_interface = hit("interface_creation") > 0;
            let has_injection = hit("dependency_injection") > 0;
            if has_interface && has_injection {
                analysis.violation_addressed = true;
                analysis.quality = Quality::High;
            } else if has_interface || has_injection {
                analysis.quality = Quality::Medium;
            }
        }
        ViolationLabel::Srp => {
            if hit("class_separation") > 1 {
                analysis.violation_addressed = true;
                analysis.quality = Quality::Medium;
            }
        }
        ViolationLabel::Isp => {
            if hit("small_interfaces") > 1 {
                analysis.violation_addressed = true;
                analysis.quality = Quality::Medium;
            }
        }
        ViolationLabel::Lsp => {
            if hit("override_behavior") > 0 && hit("exception_throwing") == 0 {
                analysis.violation_addressed = true;
                analysis.quality = Quality::Medium;
            }
        }
        ViolationLabel::Ocp => {
            let has_polymorphism = hit("polymorphism_usage") > 0;
            let has_interfaces = hit("interface_implementation") > 0;
            if has_polymorphism && has_interfaces {
                analysis.violation_addressed = true;
                analysis.quality = Quality::High;
            } else if has_polymorphism || has_interfaces {
                analysis.quality = Quality::Medium;
            }
        }
        ViolationLabel::None => {}
    }
    analysis
}

/// Everything the secondary analysis found in one response
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CodeAnalysis {
    pub code_blocks: BTreeMap<CodeLanguage, Vec<String>>,
    pub language: BTreeMap<CodeLanguage, LanguageAnalysis>,
    pub refactoring: BTreeMap<CodeLanguage, RefactoringAnalysis>,
}

impl CodeAnalysis {
    pub fn is_empty(&self) -> bool {
        self.code_blocks.is_empty()
    }
}

/// Run the secondary analysis for a response with a detected label
///
/// Only the first block per language is scanned. `NONE` gets the blocks
/// but no scans.
pub fn analyze_response(text: &str, detected: ViolationLabel) -> CodeAnalysis {
    let code_blocks = extract_code_blocks(text);
    let mut analysis = CodeAnalysis::default();
    if detected != ViolationLabel::None {
        for (lang, blocks) in &code_blocks {
            if let Some(primary) = blocks.first() {
                analysis
                    .language
                    .insert(*lang, analyze_language(primary, *lang));
                analysis
                    .refactoring
                    .insert(*lang, analyze_refactoring(primary, detected));
            }
        }
    }
    analysis.code_blocks = code_blocks;
    analysis
}

#[cfg(test)]
mod tests {
    use super::*;

    const JAVA_FIX: &str = "Here is the fix:\n```java\npublic interface Notifier { void send(String m); }\npublic class EmailNotifier implements Notifier {\n    @Override\n    public void send(String m) {}\n}\npublic class OrderService {\n    private final Notifier notifier;\n    public OrderService(Notifier notifier) { this.notifier = notifier; }\n}\n```\nDone.";

    #[test]
    fn test_extract_tagged_blocks() {
        let text = "```java\nclass A {}\n```\n\n```python\nclass B:\n    pass\n```";
        let blocks = extract_code_blocks(text);
        assert_eq!(blocks[&CodeLanguage::Java], vec!["class A {}"]);
        assert_eq!(blocks[&CodeLanguage::Python], vec!["class B:\n    pass"]);
        assert!(!blocks.contains_key(&CodeLanguage::Generic));
    }

    #[test]
    fn test_extract_csharp_alias() {
        let blocks = extract_code_blocks("```c#\nclass A {}\n```\n```csharp\nclass B {}\n```");
        assert_eq!(blocks[&CodeLanguage::CSharp].len(), 2);
    }

    #[test]
    fn test_generic_only_without_tagged() {
        let blocks = extract_code_blocks("```\nfoo()\n```\n```rust\nfn x() {}\n```");
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[&CodeLanguage::Generic], vec!["foo()", "fn x() {}"]);
    }

    #[test]
    fn test_no_blocks() {
        assert!(extract_code_blocks("no code here").is_empty());
    }

    #[test]
    fn test_analyze_language_java_scores() {
        let blocks = extract_code_blocks(JAVA_FIX);
        let a = analyze_language(&blocks[&CodeLanguage::Java][0], CodeLanguage::Java);
        assert_eq!(a.interfaces, vec!["Notifier"]);
        assert_eq!(a.classes, vec!["EmailNotifier", "OrderService"]);
        assert!(a.has_dependency_injection);
        assert_eq!(a.quality_score, 6);
    }

    #[test]
    fn test_analyze_language_python() {
        let code = "class Repo:\n    pass\nclass Service:\n    def __init__(self, repo):\n        self.repo = repo";
        let a = analyze_language(code, CodeLanguage::Python);
        assert!(a.interfaces.is_empty());
        assert_eq!(a.classes, vec!["Repo", "Service"]);
        assert!(a.has_dependency_injection);
        assert_eq!(a.quality_score, 4);
    }

    #[test]
    fn test_analyze_language_generic_is_empty() {
        assert_eq!(
            analyze_language("class A {}", CodeLanguage::Generic),
            LanguageAnalysis::default()
        );
    }

    #[test]
    fn test_refactoring_dip_high() {
        let code = "interface Repo {}\nclass S { S() {} constructor(Repo repo) {} }";
        let a = analyze_refactoring(code, ViolationLabel::Dip);
        assert!(a.violation_addressed);
        assert_eq!(a.quality, Quality::High);
    }

    #[test]
    fn test_refactoring_dip_medium() {
        let a = analyze_refactoring("abstract class Base {}", ViolationLabel::Dip);
        assert!(!a.violation_addressed);
        assert_eq!(a.quality, Quality::Medium);
    }

    #[test]
    fn test_refactoring_srp_sections() {
        let code = "class Invoice { total() }\nclass InvoicePrinter { print() }";
        let a = analyze_refactoring(code, ViolationLabel::Srp);
        assert!(a.violation_addressed);
        assert_eq!(a.quality, Quality::Medium);
        let sections = a
            .specific_patterns
            .iter()
            .find(|h| h.pattern == "class_separation")
            .unwrap();
        assert_eq!(sections.matches.len(), 2);
        assert!(sections.matches[0].starts_with("class Invoice "));
        assert!(sections.matches[1].starts_with("class InvoicePrinter"));
    }

    #[test]
    fn test_refactoring_srp_single_class_low() {
        let a = analyze_refactoring("class Everything { }", ViolationLabel::Srp);
        assert!(!a.violation_addressed);
        assert_eq!(a.quality, Quality::Low);
    }

    #[test]
    fn test_refactoring_isp_small_interfaces() {
        let code = "interface Printer { void print(); }\ninterface Scanner { void scan(); }";
        let a = analyze_refactoring(code, ViolationLabel::Isp);
        assert!(a.violation_addressed);
    }

    #[test]
    fn test_refactoring_lsp_override_without_throw() {
        let ok = analyze_refactoring("@Override\nvoid fly() {}", ViolationLabel::Lsp);
        assert!(ok.violation_addressed);
        let bad = analyze_refactoring(
            "@Override\nvoid fly() { throw new UnsupportedOperationException(); }",
            ViolationLabel::Lsp,
        );
        assert!(!bad.violation_addressed);
        assert_eq!(bad.quality, Quality::Low);
    }

    #[test]
    fn test_refactoring_ocp_levels() {
        let high = analyze_refactoring(
            "class Circle implements Shape { @Override double area() {} }",
            ViolationLabel::Ocp,
        );
        assert_eq!(high.quality, Quality::High);
        let medium = analyze_refactoring("class Circle implements Shape {}", ViolationLabel::Ocp);
        assert_eq!(medium.quality, Quality::Medium);
        assert!(!medium.violation_addressed);
    }

    #[test]
    fn test_refactoring_none_label_empty() {
        assert_eq!(
            analyze_refactoring("class A {}", ViolationLabel::None),
            RefactoringAnalysis::default()
        );
    }

    #[test]
    fn test_analyze_response_first_block_only() {
        let text = format!("{}\n```java\ninterface Extra {{}}\n```", JAVA_FIX);
        let a = analyze_response(&text, ViolationLabel::Dip);
        assert_eq!(a.code_blocks[&CodeLanguage::Java].len(), 2);
        assert_eq!(a.language[&CodeLanguage::Java].interfaces, vec!["Notifier"]);
        // Java constructors are not matched by the DIP injection rule
        assert_eq!(a.refactoring[&CodeLanguage::Java].quality, Quality::Medium);
    }

    #[test]
    fn test_analyze_response_none_skips_scans() {
        let a = analyze_response(JAVA_FIX, ViolationLabel::None);
        assert!(!a.code_blocks.is_empty());
        assert!(a.language.is_empty());
        assert!(a.refactoring.is_empty());
    }

    #[test]
    fn test_analyze_response_without_code() {
        let a = analyze_response("**DIP**, no code", ViolationLabel::Dip);
        assert!(a.is_empty());
        assert!(a.language.is_empty());
    }
}
