//! Output and display functions for CLI results

use std::path::PathBuf;

use anyhow::Result;
use colored::Colorize;

use solidbench::run::{FolderOutcome, RunReport};
use solidbench::{Extraction, ExtractionResult, GroundTruthRecord, MatchRule, Strategy};

fn percent(x: f64) -> String {
    format!("{:.1}%", x * 100.0)
}

/// Human summary of a comparison run
pub fn display_run_report(report: &RunReport, written: &[PathBuf]) {
    for entry in &report.folders {
        match &entry.outcome {
            FolderOutcome::Compared(folder) => {
                let c = &folder.overall_stats.counts;
                let line = format!(
                    "{}/{} passed ({})",
                    c.pass,
                    c.total,
                    percent(c.accuracy_all())
                );
                let line = if c.total > 0 && c.pass == c.total {
                    line.green()
                } else if c.pass == 0 {
                    line.red()
                } else {
                    line.yellow()
                };
                println!("{} {}", entry.folder.bold(), line);
                for (vt, vr) in &folder.violation_results {
                    println!(
                        "    {}: {}/{} passed, {} fail, {} error",
                        vt.as_str().to_uppercase(),
                        vr.stats.pass,
                        vr.stats.total,
                        vr.stats.fail,
                        vr.stats.error
                    );
                }
                if folder.skipped_lines > 0 {
                    println!(
                        "    {}",
                        format!("{} malformed line(s) skipped", folder.skipped_lines).dimmed()
                    );
                }
            }
            FolderOutcome::Failed { error } => {
                println!("{} {}", entry.folder.bold(), error.red());
            }
        }
    }

    let c = &report.overall_stats.counts;
    println!();
    println!("{}", "Overall".bold());
    println!(
        "  total {}  {} {}  {} {}  {} {}",
        c.total,
        "pass".green(),
        c.pass,
        "fail".red(),
        c.fail,
        "error".yellow(),
        c.error
    );
    println!("  accuracy (all):      {}", percent(c.accuracy_all()));
    println!("  accuracy (resolved): {}", percent(c.accuracy_resolved()));
    if !report.by_violation_type.is_empty() {
        for (vt, counts) in &report.by_violation_type {
            println!(
                "  {}: {}/{} ({} all, {} resolved)",
                vt.as_str().to_uppercase(),
                counts.pass,
                counts.total,
                percent(counts.accuracy_all()),
                percent(counts.accuracy_resolved())
            );
        }
    }
    if !report.overall_stats.languages.is_empty() {
        let langs: Vec<String> = report
            .overall_stats
            .languages
            .iter()
            .map(|(l, n)| format!("{}={}", l, n))
            .collect();
        println!("  languages: {}", langs.join(", "));
    }

    let review = &report.review;
    if review.case_count() > 0 {
        println!(
            "  {} for review: {} no match, {} multiple",
            review.case_count().to_string().yellow(),
            review.failed_extractions.len(),
            review.multiple_violations.len()
        );
    }
    let failed = report.failed_folders();
    if failed > 0 {
        println!("  {} folder(s) could not be compared", failed.to_string().red());
    }
    for path in written {
        println!("  {} {}", "wrote".dimmed(), path.display());
    }
}

pub fn display_extraction(strategy: Strategy, result: &ExtractionResult) {
    println!("strategy: {} (rule {})", strategy, result.rule);
    println!("pattern:  {}", result.rule.pattern().dimmed());
    match result.outcome() {
        Extraction::Single(label) => println!("{} {}", "label:".bold(), label.to_string().green()),
        Extraction::NoMatch => println!("{} {}", "label:".bold(), "NO_MATCH".red()),
        Extraction::Multiple(labels) => {
            let names: Vec<&str> = labels.iter().map(|l| l.as_str()).collect();
            println!(
                "{} {} ({})",
                "label:".bold(),
                "MULTIPLE_VIOLATIONS".yellow(),
                names.join(", ")
            );
        }
    }
}

pub fn display_extraction_json(strategy: Strategy, result: &ExtractionResult) -> Result<()> {
    let (outcome, label) = match result.outcome() {
        Extraction::Single(label) => ("single", Some(label)),
        Extraction::NoMatch => ("no_match", None),
        Extraction::Multiple(_) => ("multiple", None),
    };
    let value = serde_json::json!({
        "strategy": strategy,
        "rule": result.rule,
        "pattern": result.rule.pattern(),
        "labels": result.labels,
        "outcome": outcome,
        "label": label,
    });
    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}

pub fn display_match(pool: &[GroundTruthRecord], found: Option<(usize, MatchRule, f64)>) {
    match found {
        Some((idx, rule, similarity)) => {
            let gt = &pool[idx];
            println!(
                "{} entry #{} via {} (similarity {:.3})",
                "matched".green(),
                idx,
                rule,
                similarity
            );
            println!("  violation: {}", gt.violation.to_string().bold());
            println!("  level:     {}", gt.level);
            println!("  language:  {}", gt.language);
        }
        None => println!(
            "{} among {} entries",
            "no matching ground truth".red(),
            pool.len()
        ),
    }
}

pub fn display_match_json(
    pool: &[GroundTruthRecord],
    found: Option<(usize, MatchRule, f64)>,
) -> Result<()> {
    let value = match found {
        Some((idx, rule, similarity)) => serde_json::json!({
            "matched": true,
            "index": idx,
            "rule": rule,
            "similarity": similarity,
            "violation": pool[idx].violation,
            "level": pool[idx].level,
            "language": pool[idx].language,
        }),
        None => serde_json::json!({ "matched": false, "pool_size": pool.len() }),
    };
    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}
