//! Common test fixtures and helpers
//!
//! Usage in test files:
//! ```ignore
//! mod common;
//! use common::Workspace;
//! ```

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::json;
use tempfile::TempDir;

/// A benchmark workspace: `outputs/` result folders and `ground_truth/` pools
///
/// The backing `TempDir` lives as long as the workspace.
pub struct Workspace {
    _dir: TempDir,
    pub root: PathBuf,
}

impl Workspace {
    pub fn new() -> Self {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let root = dir.path().to_path_buf();
        fs::create_dir(root.join("outputs")).expect("Failed to create outputs dir");
        fs::create_dir(root.join("ground_truth")).expect("Failed to create ground_truth dir");
        Self { _dir: dir, root }
    }

    pub fn outputs(&self) -> PathBuf {
        self.root.join("outputs")
    }

    pub fn ground_truth(&self) -> PathBuf {
        self.root.join("ground_truth")
    }

    pub fn reports(&self) -> PathBuf {
        self.root.join("reports")
    }

    /// Write `<folder>/output_test.jsonl` with one line per record
    pub fn write_folder(&self, folder: &str, lines: &[String]) -> PathBuf {
        let dir = self.outputs().join(folder);
        fs::create_dir_all(&dir).expect("Failed to create result folder");
        let path = dir.join("output_test.jsonl");
        fs::write(&path, lines.join("\n") + "\n").expect("Failed to write output file");
        path
    }

    /// Write `<vt>_violations.json` in the `code_examples` layout
    pub fn write_pool(&self, vt: &str, examples: &[(&str, &str)]) -> PathBuf {
        let items: Vec<_> = examples
            .iter()
            .map(|(input, violation)| {
                json!({
                    "input": input,
                    "violation": violation,
                    "level": "easy",
                    "language": "java",
                })
            })
            .collect();
        let path = self.ground_truth().join(format!("{}_violations.json", vt));
        fs::write(&path, json!({ "code_examples": items }).to_string())
            .expect("Failed to write ground truth");
        path
    }
}

/// One output-record JSONL line
pub fn record_line(id: i64, violation_type: &str, input: &str, response: &str) -> String {
    json!({
        "id": id,
        "violation_type": violation_type,
        "model": "llama3:8b",
        "language": "java",
        "input": input,
        "raw_response": response,
    })
    .to_string()
}

/// Write arbitrary text to a file in `dir`
pub fn write_file(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, content).expect("Failed to write file");
    path
}
