//! Definition linting - static analysis of flow definition files.
//!
//! Checks files for:
//! - JSON syntax errors (E001)
//! - the wrong number of process blocks (E002)
//! - `$ref` targets missing from the schema's definitions (E003)
//! - file structure not matching the definition-file schema (E004)
//!
//! and warns about untyped variables (W001), flows without a description
//! (W002), schemas cut by a safety cap (W003) and reference cycles (W004).

use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::{json, Value};

use crate::error::AnomalyKind;
use crate::loader::{collect_definition_files, load_json, FlowFile};
use crate::resolver::resolve_root;
use crate::types::{json_type_name, sanitize_name};

/// Severity level for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

/// A single diagnostic message from linting.
#[derive(Debug, Clone, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub code: String,
    pub file: PathBuf,
    /// JSON pointer to the issue (e.g., "/processes/0/variables/2/type")
    pub path: String,
    pub message: String,
}

/// Result of linting a single file.
#[derive(Debug, Clone, Serialize)]
pub struct FileResult {
    pub file: PathBuf,
    pub status: FileStatus,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub diagnostics: Vec<Diagnostic>,
}

/// Status of a linted file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    Ok,
    Error,
    Warning,
}

/// Result of linting a directory or set of files.
#[derive(Debug, Clone, Serialize)]
pub struct LintResult {
    pub path: PathBuf,
    pub files_checked: usize,
    pub passed: usize,
    pub failed: usize,
    pub errors: usize,
    pub warnings: usize,
    pub results: Vec<FileResult>,
}

impl LintResult {
    /// Returns true if all files passed (no errors).
    pub fn is_ok(&self) -> bool {
        self.errors == 0
    }
}

/// Lint a file or directory.
///
/// Directories are searched recursively for `.json` files. With `strict`,
/// files with warnings count as failed.
pub fn lint(path: &Path, strict: bool) -> LintResult {
    let mut results = Vec::new();
    match collect_definition_files(path) {
        Ok(files) => {
            for file in &files {
                results.push(lint_file(file, path));
            }
        }
        Err(e) => results.push(FileResult {
            file: path.to_path_buf(),
            status: FileStatus::Error,
            diagnostics: vec![error("E001", path, "/", format!("cannot read: {}", e))],
        }),
    }

    let count = |severity: Severity| -> usize {
        results
            .iter()
            .flat_map(|r| &r.diagnostics)
            .filter(|d| d.severity == severity)
            .count()
    };
    let errors = count(Severity::Error);
    let warnings = count(Severity::Warning);

    let failed = results
        .iter()
        .filter(|r| {
            if strict {
                r.status != FileStatus::Ok
            } else {
                r.status == FileStatus::Error
            }
        })
        .count();

    LintResult {
        path: path.to_path_buf(),
        files_checked: results.len(),
        passed: results.len() - failed,
        failed,
        errors,
        warnings,
        results,
    }
}

/// Lint a single definition file.
pub fn lint_file(file: &Path, base_path: &Path) -> FileResult {
    let diagnostics = check_file(file);

    let status = if diagnostics.iter().any(|d| d.severity == Severity::Error) {
        FileStatus::Error
    } else if diagnostics.iter().any(|d| d.severity == Severity::Warning) {
        FileStatus::Warning
    } else {
        FileStatus::Ok
    };

    FileResult {
        file: file.strip_prefix(base_path).unwrap_or(file).to_path_buf(),
        status,
        diagnostics,
    }
}

fn check_file(file: &Path) -> Vec<Diagnostic> {
    let raw = match load_json(file) {
        Ok(raw) => raw,
        Err(e) => return vec![error("E001", file, "/", format!("syntax error: {}", e))],
    };

    let mut diagnostics = check_structure(&raw, file);
    if !diagnostics.is_empty() {
        return diagnostics;
    }

    let flow: FlowFile = match serde_json::from_value(raw) {
        Ok(flow) => flow,
        Err(e) => return vec![error("E004", file, "/", format!("invalid definition: {}", e))],
    };

    if flow.processes.len() != 1 {
        diagnostics.push(error(
            "E002",
            file,
            "/processes",
            format!(
                "expected exactly 1 process block, found {}",
                flow.processes.len()
            ),
        ));
    }

    if flow.description().trim().is_empty() {
        diagnostics.push(warning(
            "W002",
            file,
            "/meta/info",
            "flow has no description".to_string(),
        ));
    }

    for (p, process) in flow.processes.iter().enumerate() {
        for (v, variable) in process.variables.iter().enumerate() {
            let path = format!("/processes/{}/variables/{}", p, v);
            let Some(schema) = &variable.schema else {
                diagnostics.push(warning(
                    "W001",
                    file,
                    &path,
                    format!("variable '{}' has no type", variable.name),
                ));
                continue;
            };

            let name = sanitize_name(&variable.name);
            for anomaly in resolve_root(&name, schema).anomalies {
                let path = format!("{}/type", path);
                let diagnostic = match anomaly.kind {
                    AnomalyKind::UnresolvedReference => error("E003", file, &path, anomaly.to_string()),
                    AnomalyKind::Truncated => warning("W003", file, &path, anomaly.to_string()),
                    AnomalyKind::CycleDetected => warning("W004", file, &path, anomaly.to_string()),
                };
                diagnostics.push(diagnostic);
            }
        }
    }

    diagnostics
}

/// Validate the overall file shape with JSON Schema.
fn check_structure(raw: &Value, file: &Path) -> Vec<Diagnostic> {
    if !raw.is_object() {
        return vec![error(
            "E004",
            file,
            "/",
            format!("expected an object, got {}", json_type_name(raw)),
        )];
    }

    let validator = match jsonschema::validator_for(&definition_schema()) {
        Ok(v) => v,
        Err(e) => return vec![error("E004", file, "/", format!("schema error: {}", e))],
    };

    validator
        .iter_errors(raw)
        .map(|e| {
            let path = e.instance_path.to_string();
            let path = if path.is_empty() { "/".to_string() } else { path };
            error("E004", file, &path, e.to_string())
        })
        .collect()
}

/// JSON Schema of a flow definition file.
fn definition_schema() -> Value {
    json!({
        "type": "object",
        "required": ["processes"],
        "properties": {
            "name": {"type": "string"},
            "meta": {
                "type": "object",
                "properties": {"info": {"type": ["string", "null"]}}
            },
            "processes": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "name": {"type": "string"},
                        "variables": {
                            "type": "array",
                            "items": {
                                "type": "object",
                                "required": ["name"],
                                "properties": {
                                    "name": {"type": "string"},
                                    "isInput": {"type": "boolean"},
                                    "isOutput": {"type": "boolean"},
                                    "required": {"type": "boolean"},
                                    "meta": {
                                        "type": "object",
                                        "properties": {
                                            "description": {"type": ["string", "null"]}
                                        }
                                    },
                                    "type": {"type": ["string", "object", "null"]}
                                }
                            }
                        }
                    }
                }
            }
        }
    })
}

fn error(code: &str, file: &Path, path: &str, message: String) -> Diagnostic {
    diagnostic(Severity::Error, code, file, path, message)
}

fn warning(code: &str, file: &Path, path: &str, message: String) -> Diagnostic {
    diagnostic(Severity::Warning, code, file, path, message)
}

fn diagnostic(severity: Severity, code: &str, file: &Path, path: &str, message: String) -> Diagnostic {
    Diagnostic {
        severity,
        code: code.to_string(),
        file: file.to_path_buf(),
        path: path.to_string(),
        message,
    }
}
