//! Flow SDK generator
//!
//! Generates typed Python declarations from automation flow definitions.
//!
//! Every definition file of an integration describes one operation with typed
//! input and output variables. The generator resolves those types, collects
//! the structural ones into a registry, shares the ones several operations of
//! a service use, and writes an importable Python package of `TypedDict`
//! declarations and callable stubs.
//!
//! # Example
//!
//! ```no_run
//! use flow_sdkgen::{generate, GenerateOptions};
//!
//! let options = GenerateOptions::new("AWS", "./package", "./sdk");
//! let report = generate(&options).unwrap();
//! println!("{} operations, {} files", report.operations, report.emit.files_written());
//! ```
//!
//! # Phases
//!
//! | Phase | Module | Result |
//! |-------|--------|--------|
//! | extract | `extractor` | operations and schema anomalies |
//! | register | `registry` | one entry per object / array type |
//! | classify | `registry` | service-common vs operation-specific |
//! | deduplicate | `registry` | identical types folded onto the first |
//! | emit | `emitter` | `<out>/<Integration>/` package |
//!
//! Schema problems never abort a run: unresolved references and cycles
//! become `Any`, and types whose definition can't be re-read are skipped.
//! Malformed definition files and write failures abort it, leaving no
//! output behind.

mod emitter;
mod error;
mod extractor;
mod linter;
mod loader;
mod registry;
mod render;
mod resolver;
mod types;

use serde::Serialize;

pub use emitter::{emit, EmitReport};
pub use error::{Anomaly, AnomalyKind, EmitError, ExtractError, GenerateError, SkippedType};
pub use extractor::{extract_operations, register_complex_types, Extraction};
pub use linter::{lint, lint_file, Diagnostic, FileResult, FileStatus, LintResult, Severity};
pub use loader::{collect_definition_files, load_flow, locate_integration, FlowFile};
pub use registry::{
    fingerprint, ClassifiedType, DedupReport, MergedType, Placement, TypeDefinition,
    TypeRegistry, UsageReport,
};
pub use resolver::{resolve, resolve_root, Resolution, SchemaResolver};
pub use types::{
    GenerateOptions, Language, Operation, Parameter, SchemaKind, SchemaNode, SourceLocation,
    TypeTag, VariableSlot,
};

/// Summary of one generation run.
#[derive(Debug, Clone, Serialize)]
pub struct GenerationReport {
    pub integration: String,
    pub operations: usize,
    pub types_registered: usize,
    pub merged: Vec<MergedType>,
    pub usage: UsageReport,
    pub anomalies: Vec<Anomaly>,
    pub emit: EmitReport,
}

/// Run extraction, registration, classification, deduplication and emission.
///
/// # Errors
///
/// Returns `GenerateError::Extract` if the integration can't be found or a
/// definition file is unreadable or malformed, and `GenerateError::Emit` if
/// the package can't be written. Nothing is written in either case.
pub fn generate(options: &GenerateOptions) -> Result<GenerationReport, GenerateError> {
    let integration = options.integration.as_str();
    let root = locate_integration(&options.source, integration)?;

    let extraction = extract_operations(&root, integration)?;
    tracing::info!(
        integration,
        operations = extraction.operations.len(),
        "extracted operations"
    );
    for anomaly in &extraction.anomalies {
        tracing::warn!(
            location = %anomaly.location,
            kind = ?anomaly.kind,
            "degraded schema: {}",
            anomaly.message
        );
    }

    let mut registry = TypeRegistry::new();
    register_complex_types(&extraction.operations, &mut registry);
    let usage = registry.analyze_usage();
    for classified in &usage.types {
        tracing::debug!(
            name = %classified.name,
            placement = ?classified.placement,
            "classified type"
        );
    }

    let dedup = registry.deduplicate();
    for merged in &dedup.merged {
        tracing::debug!(
            duplicate = %merged.duplicate,
            canonical = %merged.canonical,
            "merged identical type"
        );
    }
    tracing::info!(
        types = registry.len(),
        merged = dedup.merged.len(),
        common = dedup.usage.common_counts().values().sum::<usize>(),
        "classified types"
    );

    let emitted = match options.language {
        Language::Python => emit(
            &extraction.operations,
            &registry,
            integration,
            &root,
            &options.out_dir,
        )?,
    };
    for skipped in &emitted.skipped {
        tracing::warn!(
            name = %skipped.name,
            source = %skipped.source.display(),
            "skipped type: {}",
            skipped.reason
        );
    }
    tracing::info!(
        output = %emitted.output.display(),
        files = emitted.files_written(),
        "generation complete"
    );

    Ok(GenerationReport {
        integration: options.integration.clone(),
        operations: extraction.operations.len(),
        types_registered: registry.len(),
        merged: dedup.merged,
        usage: dedup.usage,
        anomalies: extraction.anomalies,
        emit: emitted,
    })
}
