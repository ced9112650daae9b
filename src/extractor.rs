//! Operation extraction - definition files to [`Operation`]s.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use crate::error::{Anomaly, ExtractError};
use crate::loader::{self, Variable};
use crate::registry::{fingerprint, TypeDefinition, TypeRegistry};
use crate::render::{python_identifier, summary_annotation};
use crate::resolver::resolve_root;
use crate::types::{sanitize_name, Operation, Parameter, SourceLocation, VariableSlot};

/// Operations of one integration, with the schema anomalies met on the way.
#[derive(Debug, Clone, Default)]
pub struct Extraction {
    pub operations: Vec<Operation>,
    pub anomalies: Vec<Anomaly>,
}

/// Extract every operation below `root`, the directory of `integration`.
///
/// Files are visited in sorted path order. The first failing file aborts the
/// whole extraction.
///
/// # Errors
///
/// - `ExtractError::ReadError` / `InvalidJson` for unreadable files
/// - `ExtractError::StructuralViolation` unless a file has exactly one process
/// - `ExtractError::DuplicateOperation` if a module path defines a name twice
pub fn extract_operations(root: &Path, integration: &str) -> Result<Extraction, ExtractError> {
    let mut extraction = Extraction::default();
    let mut seen: BTreeMap<String, PathBuf> = BTreeMap::new();

    for path in loader::collect_definition_files(root)? {
        let (operation, anomalies) = extract_file(root, integration, &path)?;

        let qualified = operation.qualified_name();
        if let Some(first) = seen.get(&qualified) {
            return Err(ExtractError::DuplicateOperation {
                name: operation.name,
                module_path: operation.module_path,
                first: first.clone(),
                second: path,
            });
        }
        seen.insert(qualified, path);

        extraction.anomalies.extend(anomalies);
        extraction.operations.push(operation);
    }

    Ok(extraction)
}

/// Extract the operation defined in one file.
pub fn extract_file(
    root: &Path,
    integration: &str,
    path: &Path,
) -> Result<(Operation, Vec<Anomaly>), ExtractError> {
    let flow = loader::load_flow(path)?;
    let process = flow.single_process(path)?;

    let name = if flow.name.trim().is_empty() {
        path.file_stem()
            .map(|s| sanitize_name(&s.to_string_lossy()))
            .unwrap_or_default()
    } else {
        sanitize_name(flow.name.trim())
    };

    let mut operation = Operation {
        name,
        module_path: module_path(root, integration, path),
        parameters: Vec::new(),
        output: None,
        description: flow.description().trim().to_string(),
        source: path.to_path_buf(),
    };
    let mut anomalies = Vec::new();

    let mut taken = BTreeSet::new();
    for variable in process.variables.iter().filter(|v| v.is_input) {
        let param_name = unique_parameter_name(&variable.name, &mut taken);
        let type_name = sanitize_name(&format!("{}_{}_Type", operation.name, param_name));
        let (parameter, found) = parameter(variable, param_name, &type_name);
        anomalies.extend(found);
        operation.parameters.push(parameter);
    }

    // the last output variable is the return value
    if let Some(variable) = process.variables.iter().rev().find(|v| v.is_output) {
        let type_name = operation.result_type_name();
        let (output, found) = parameter(variable, sanitize_name(&variable.name), &type_name);
        anomalies.extend(found);
        operation.output = Some(output);
    }

    Ok((operation, anomalies))
}

/// Sanitized parameter name, suffixed `_2`, `_3`, ... when an earlier input
/// already maps to the same Python identifier.
fn unique_parameter_name(name: &str, taken: &mut BTreeSet<String>) -> String {
    let base = sanitize_name(name);
    let mut candidate = base.clone();
    let mut n = 2;
    while taken.contains(&python_identifier(&candidate)) {
        candidate = format!("{}_{}", base, n);
        n += 1;
    }
    taken.insert(python_identifier(&candidate));
    candidate
}

fn parameter(variable: &Variable, name: String, type_name: &str) -> (Parameter, Vec<Anomaly>) {
    let (schema, anomalies) = match &variable.schema {
        Some(raw) => {
            let resolution = resolve_root(type_name, raw);
            (Some(resolution.node), resolution.anomalies)
        }
        None => (None, Vec::new()),
    };

    let parameter = Parameter {
        name,
        variable: variable.name.clone(),
        schema,
        required: variable.required,
        description: variable.description().trim().to_string(),
    };
    (parameter, anomalies)
}

/// Dotted module path: the integration followed by the file's directories.
pub fn module_path(root: &Path, integration: &str, path: &Path) -> String {
    let mut segments = vec![sanitize_name(integration)];
    if let Some(parent) = path.strip_prefix(root).ok().and_then(Path::parent) {
        segments.extend(
            parent
                .components()
                .map(|c| sanitize_name(&c.as_os_str().to_string_lossy())),
        );
    }
    segments.join(".")
}

/// Register every object or array parameter and return type.
///
/// Returns the definitions as stored in the registry, in registration order.
pub fn register_complex_types(
    operations: &[Operation],
    registry: &mut TypeRegistry,
) -> Vec<TypeDefinition> {
    let mut registered = Vec::new();

    for operation in operations {
        for param in &operation.parameters {
            let type_name = operation.parameter_type_name(param);
            let slot = VariableSlot::Input(param.variable.clone());
            if let Some(def) = type_definition(operation, param, type_name, slot) {
                registered.push(registry.register(def));
            }
        }
        if let Some(output) = &operation.output {
            let type_name = operation.result_type_name();
            if let Some(def) = type_definition(operation, output, type_name, VariableSlot::Output) {
                registered.push(registry.register(def));
            }
        }
    }

    registered
}

fn type_definition(
    operation: &Operation,
    param: &Parameter,
    name: String,
    slot: VariableSlot,
) -> Option<TypeDefinition> {
    let node = param.schema.as_ref().filter(|node| node.is_complex())?;

    let description = if param.description.is_empty() {
        node.description.clone().unwrap_or_default()
    } else {
        param.description.clone()
    };

    Some(TypeDefinition {
        name,
        representation: summary_annotation(node),
        fingerprint: fingerprint(operation.service(), node),
        description,
        source: SourceLocation {
            path: operation.source.clone(),
            slot,
        },
        module_path: operation.module_path.clone(),
        operation: operation.qualified_name(),
    })
}
