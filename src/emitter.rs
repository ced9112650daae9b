//! Emission of the generated Python package.
//!
//! Layout below `<out>/<Integration>/`:
//!
//! ```text
//! _types/<service>/common_types.py            service-common types (always present)
//! _types/<service>/<sub...>/<Op>_types.py     operation-specific types
//! <service>/<sub...>/<Op>.py                  callable stub
//! **/__init__.py                              package markers
//! ```
//!
//! The tree is written into a staging directory inside `<out>` and renamed
//! into place at the end, so a failed run never leaves a partial package.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::{EmitError, SkippedType};
use crate::loader::{self, FlowFile};
use crate::registry::{TypeDefinition, TypeRegistry};
use crate::render::{
    self, order_declarations, python_identifier, render_stub, render_types_module, star_import,
    Declaration, Scope, Stub, StubParameter,
};
use crate::resolver::resolve_root;
use crate::types::{sanitize_name, Operation, Parameter, SchemaNode};

const TYPES_DIR: &str = "_types";
const COMMON_MODULE: &str = "common_types";
const PACKAGE_MARKER: &str = "__init__.py";

/// What an emission produced.
#[derive(Debug, Clone, Default, Serialize)]
pub struct EmitReport {
    /// The package directory, `<out>/<Integration>`.
    pub output: PathBuf,
    /// Written files relative to `output`, sorted.
    pub files: Vec<PathBuf>,
    pub skipped: Vec<SkippedType>,
}

impl EmitReport {
    pub fn files_written(&self) -> usize {
        self.files.len()
    }
}

/// Write the package for `operations` below `out_dir`.
///
/// `integration_root` is the directory definition paths are reported
/// relative to.
///
/// # Errors
///
/// Returns `EmitError::WriteError` if any file or directory can't be written
/// or the staged package can't be moved into place.
pub fn emit(
    operations: &[Operation],
    registry: &TypeRegistry,
    integration: &str,
    integration_root: &Path,
    out_dir: &Path,
) -> Result<EmitReport, EmitError> {
    fs::create_dir_all(out_dir).map_err(|source| write_error(out_dir, source))?;
    let staging = tempfile::Builder::new()
        .prefix(".flow-sdkgen-")
        .tempdir_in(out_dir)
        .map_err(|source| write_error(out_dir, source))?;

    let package = sanitize_name(integration);
    let staged = staging.path().join(&package);
    let mut emitter = Emitter {
        registry,
        integration,
        integration_root,
        staged: &staged,
        sources: BTreeMap::new(),
        skipped: BTreeMap::new(),
        files: BTreeSet::new(),
    };

    let services: BTreeSet<&str> = operations.iter().map(Operation::service).collect();
    let mut common_names: BTreeMap<&str, BTreeSet<String>> = BTreeMap::new();
    for service in services {
        let names = emitter.write_common(service)?;
        common_names.insert(service, names);
    }

    let mut sorted: Vec<&Operation> = operations.iter().collect();
    sorted.sort_by_key(|op| op.qualified_name());
    for operation in sorted {
        let common = common_names
            .get(operation.service())
            .cloned()
            .unwrap_or_default();
        emitter.write_operation(operation, &common)?;
    }

    emitter.write_markers()?;

    let output = out_dir.join(&package);
    if output.exists() {
        fs::remove_dir_all(&output).map_err(|source| write_error(&output, source))?;
    }
    fs::rename(&staged, &output).map_err(|source| write_error(&output, source))?;

    Ok(EmitReport {
        output,
        files: emitter.files.into_iter().collect(),
        skipped: emitter.skipped.into_values().collect(),
    })
}

fn write_error(path: &Path, source: std::io::Error) -> EmitError {
    EmitError::WriteError {
        path: path.to_path_buf(),
        source,
    }
}

struct Emitter<'a> {
    registry: &'a TypeRegistry,
    integration: &'a str,
    integration_root: &'a Path,
    staged: &'a Path,
    /// Definition files re-read during this emission.
    sources: BTreeMap<PathBuf, Result<FlowFile, String>>,
    skipped: BTreeMap<String, SkippedType>,
    files: BTreeSet<PathBuf>,
}

impl<'a> Emitter<'a> {
    /// Write `common_types.py` for a service and return the names it declares.
    fn write_common(&mut self, service: &str) -> Result<BTreeSet<String>, EmitError> {
        let registry = self.registry;
        let definitions: Vec<&TypeDefinition> = registry
            .service_common_types(service)
            .map(|types| types.values().collect())
            .unwrap_or_default();

        let declarations = order_declarations(self.declarations(&definitions));
        let names = declarations.iter().map(|d| d.name.clone()).collect();
        let text = render_types_module(&declarations, &[], &BTreeSet::new());

        let rel = PathBuf::from(TYPES_DIR)
            .join(service)
            .join(format!("{}.py", COMMON_MODULE));
        self.write(&rel, &text)?;
        Ok(names)
    }

    fn write_operation(
        &mut self,
        operation: &Operation,
        common: &BTreeSet<String>,
    ) -> Result<(), EmitError> {
        let service = operation.service();
        let sub = sub_packages(&operation.module_path);

        let registry = self.registry;
        let definitions: Vec<&TypeDefinition> = registry
            .operation_types(&operation.qualified_name())
            .map(|types| {
                types
                    .values()
                    .filter(|def| !registry.is_service_common(service, &def.name))
                    .collect()
            })
            .unwrap_or_default();
        let declarations = order_declarations(self.declarations(&definitions));

        let mut visible = common.clone();
        let mut imports = Vec::new();
        let stub_dir = stub_packages(&operation.module_path);
        let stub_dots = stub_dir.len() + 1;

        if !common.is_empty() || !declarations.is_empty() {
            imports.push(star_import(
                stub_dots,
                &format!("{}.{}.{}", TYPES_DIR, service, COMMON_MODULE),
            ));
        }

        if !declarations.is_empty() {
            let module = format!("{}_types", operation.name);
            let text = render_types_module(
                &declarations,
                &[star_import(sub.len() + 1, COMMON_MODULE)],
                common,
            );
            let mut rel = PathBuf::from(TYPES_DIR).join(service);
            rel.extend(&sub);
            rel.push(format!("{}.py", module));
            self.write(&rel, &text)?;

            visible.extend(declarations.iter().map(|d| d.name.clone()));
            let mut path = vec![TYPES_DIR.to_string(), service.to_string()];
            path.extend(sub.iter().cloned());
            path.push(module);
            imports.push(star_import(stub_dots, &path.join(".")));
        }

        let stub = self.stub(operation, &visible);
        let mut rel: PathBuf = stub_dir.iter().collect();
        rel.push(format!("{}.py", operation.name));
        self.write(&rel, &render_stub(&stub, &imports))
    }

    fn stub(&self, operation: &Operation, visible: &BTreeSet<String>) -> Stub {
        let parameters = operation
            .parameters
            .iter()
            .map(|param| StubParameter {
                name: python_identifier(&param.name),
                annotation: self.annotation(param, &operation.parameter_type_name(param), visible),
                required: param.required,
                description: param.description.clone(),
            })
            .collect();

        let returns = match &operation.output {
            Some(output) => self.annotation(output, &operation.result_type_name(), visible),
            None => "None".to_string(),
        };

        Stub {
            name: operation.name.clone(),
            description: operation.description.clone(),
            parameters,
            returns,
            integration: self.integration.to_string(),
        }
    }

    /// Annotation of a parameter or return value in a stub.
    fn annotation(&self, param: &Parameter, type_name: &str, visible: &BTreeSet<String>) -> String {
        let Some(node) = &param.schema else {
            return "Any".to_string();
        };
        if node.is_complex() {
            let canonical = self.registry.canonical_name(type_name);
            if visible.contains(canonical) {
                return canonical.to_string();
            }
            if let Some(def) = self.registry.get(canonical) {
                return def.representation.clone();
            }
        }
        render::annotation(node, &Scope::with_known(visible.clone()))
    }

    /// Declarations for registered types: each root plus its nested definitions.
    fn declarations(&mut self, definitions: &[&TypeDefinition]) -> Vec<Declaration> {
        let mut out = Vec::new();
        for def in definitions {
            let node = match self.load_schema(def) {
                Ok(node) => node,
                Err(reason) => {
                    self.skipped
                        .entry(def.name.clone())
                        .or_insert_with(|| SkippedType {
                            name: def.name.clone(),
                            source: def.source.path.clone(),
                            reason,
                        });
                    continue;
                }
            };

            let origin = self.origin(&def.source.path);
            let SchemaNode {
                name: _,
                description,
                kind,
                definitions: nested,
            } = node;

            let mut root = Declaration::new(&def.name, SchemaNode::new(&def.name, kind));
            root.description = Some(def.description.clone())
                .filter(|d| !d.is_empty())
                .or(description);
            out.push(root.origin(origin.clone()));

            for (name, nested) in nested {
                out.push(Declaration::new(sanitize_name(&name), nested).origin(origin.clone()));
            }
        }
        out
    }

    /// Re-read a registered type from its definition file.
    fn load_schema(&mut self, def: &TypeDefinition) -> Result<SchemaNode, String> {
        let path = &def.source.path;
        let loaded = self
            .sources
            .entry(path.clone())
            .or_insert_with(|| loader::load_flow(path).map_err(|e| e.to_string()));
        let flow = loaded.as_ref().map_err(|reason| reason.clone())?;

        let process = flow.single_process(path).map_err(|e| e.to_string())?;
        let variable = process
            .find_variable(&def.source.slot)
            .ok_or_else(|| format!("variable for {} no longer exists", def.name))?;
        let raw = variable
            .schema
            .as_ref()
            .ok_or_else(|| format!("variable '{}' has no type", variable.name))?;

        Ok(resolve_root(&def.name, raw).node)
    }

    fn origin(&self, path: &Path) -> String {
        let rel = path.strip_prefix(self.integration_root).unwrap_or(path);
        rel.components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join("/")
    }

    fn write(&mut self, rel: &Path, contents: &str) -> Result<(), EmitError> {
        let path = self.staged.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| write_error(parent, source))?;
        }
        fs::write(&path, contents).map_err(|source| write_error(&path, source))?;
        tracing::trace!(path = %rel.display(), "wrote");
        self.files.insert(rel.to_path_buf());
        Ok(())
    }

    /// Put an `__init__.py` into every directory of the package.
    fn write_markers(&mut self) -> Result<(), EmitError> {
        let mut dirs: BTreeSet<PathBuf> = BTreeSet::new();
        dirs.insert(PathBuf::new());
        for file in &self.files {
            let mut dir = file.parent();
            while let Some(d) = dir {
                dirs.insert(d.to_path_buf());
                dir = d.parent();
            }
        }
        for dir in dirs {
            self.write(&dir.join(PACKAGE_MARKER), "")?;
        }
        Ok(())
    }
}

/// Module path segments below the service (`AWS.ec2.vpc.nat` -> `[vpc, nat]`).
fn sub_packages(module_path: &str) -> Vec<String> {
    module_path.split('.').skip(2).map(String::from).collect()
}

/// Directory of a stub below the package root: the module path without the
/// integration (`AWS.ec2.vpc` -> `[ec2, vpc]`, `AWS` -> `[]`).
fn stub_packages(module_path: &str) -> Vec<String> {
    module_path.split('.').skip(1).map(String::from).collect()
}
