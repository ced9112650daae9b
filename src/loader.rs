//! Definition loading from an unpacked integration package.
//!
//! A package holds one directory per integration under `flows/`; every
//! `.json` file below it describes one flow.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_json::Value;

use crate::error::ExtractError;
use crate::types::VariableSlot;

/// A flow definition file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FlowFile {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub processes: Vec<Process>,
    #[serde(default)]
    pub meta: FlowMeta,
}

/// Flow-level metadata.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FlowMeta {
    #[serde(default)]
    pub info: Option<String>,
}

/// A process (operation block) within a flow.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Process {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub variables: Vec<Variable>,
}

/// A variable of a process.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Variable {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub is_input: bool,
    #[serde(default)]
    pub is_output: bool,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub meta: VariableMeta,
    /// Schema-shaped type; absent for untyped variables.
    #[serde(default, rename = "type")]
    pub schema: Option<Value>,
}

/// Variable-level metadata.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct VariableMeta {
    #[serde(default)]
    pub description: Option<String>,
}

impl FlowFile {
    /// The one process of the file.
    ///
    /// # Errors
    ///
    /// Returns `ExtractError::StructuralViolation` unless the file holds exactly one process.
    pub fn single_process(&self, path: &Path) -> Result<&Process, ExtractError> {
        match self.processes.as_slice() {
            [process] => Ok(process),
            other => Err(ExtractError::StructuralViolation {
                path: path.to_path_buf(),
                found: other.len(),
            }),
        }
    }

    pub fn description(&self) -> &str {
        self.meta.info.as_deref().unwrap_or_default()
    }
}

impl Process {
    /// Find the typed variable a slot points at. For the output slot this is
    /// the last output variable, matching how the return type is chosen.
    pub fn find_variable(&self, slot: &VariableSlot) -> Option<&Variable> {
        match slot {
            VariableSlot::Input(name) => self
                .variables
                .iter()
                .find(|v| v.is_input && &v.name == name),
            VariableSlot::Output => self.variables.iter().rev().find(|v| v.is_output),
        }
    }
}

impl Variable {
    pub fn description(&self) -> &str {
        self.meta.description.as_deref().unwrap_or_default()
    }
}

/// Directory holding the definitions of `integration` inside an unpacked package.
///
/// # Errors
///
/// Returns `ExtractError::IntegrationNotFound` if `<source>/flows/<integration>` is not a directory.
pub fn locate_integration(source: &Path, integration: &str) -> Result<PathBuf, ExtractError> {
    let root = source.join("flows").join(integration);
    if root.is_dir() {
        Ok(root)
    } else {
        Err(ExtractError::IntegrationNotFound {
            integration: integration.to_string(),
            path: root,
        })
    }
}

/// Load a JSON file.
///
/// # Errors
///
/// Returns `ExtractError::ReadError` if the file can't be read,
/// or `ExtractError::InvalidJson` if it isn't valid JSON.
pub fn load_json(path: &Path) -> Result<Value, ExtractError> {
    let content = read(path)?;
    serde_json::from_str(&content).map_err(|source| ExtractError::InvalidJson {
        path: path.to_path_buf(),
        source,
    })
}

/// Load and parse a flow definition file.
///
/// # Errors
///
/// Returns `ExtractError::ReadError` if the file can't be read, or
/// `ExtractError::InvalidJson` if it isn't a well-formed flow definition.
pub fn load_flow(path: &Path) -> Result<FlowFile, ExtractError> {
    let content = read(path)?;
    serde_json::from_str(&content).map_err(|source| ExtractError::InvalidJson {
        path: path.to_path_buf(),
        source,
    })
}

/// Collect all `.json` files in a path (file or directory), sorted.
///
/// # Errors
///
/// Returns `ExtractError::ReadError` if a directory can't be listed.
pub fn collect_definition_files(path: &Path) -> Result<Vec<PathBuf>, ExtractError> {
    if path.is_file() {
        return Ok(if is_json(path) {
            vec![path.to_path_buf()]
        } else {
            vec![]
        });
    }

    let mut files = Vec::new();
    collect_files_recursive(path, &mut files)?;
    files.sort();
    Ok(files)
}

fn collect_files_recursive(dir: &Path, files: &mut Vec<PathBuf>) -> Result<(), ExtractError> {
    let entries = std::fs::read_dir(dir).map_err(|source| ExtractError::ReadError {
        path: dir.to_path_buf(),
        source,
    })?;

    for entry in entries {
        let entry = entry.map_err(|source| ExtractError::ReadError {
            path: dir.to_path_buf(),
            source,
        })?;
        let path = entry.path();
        if path.is_dir() {
            collect_files_recursive(&path, files)?;
        } else if is_json(&path) {
            files.push(path);
        }
    }
    Ok(())
}

fn is_json(path: &Path) -> bool {
    path.extension()
        .map(|e| e.eq_ignore_ascii_case("json"))
        .unwrap_or(false)
}

fn read(path: &Path) -> Result<String, ExtractError> {
    std::fs::read_to_string(path).map_err(|source| ExtractError::ReadError {
        path: path.to_path_buf(),
        source,
    })
}
