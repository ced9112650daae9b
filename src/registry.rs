//! Type registry - classification and deduplication of structural types.
//!
//! The registry lives for exactly one generation run and is driven through
//! strictly sequential phases:
//!
//! 1. [`TypeRegistry::register`] for every complex parameter / return type,
//! 2. [`TypeRegistry::analyze_usage`] to classify each type,
//! 3. [`TypeRegistry::deduplicate`] to collapse structurally identical types,
//! 4. read-only access by the emitter.
//!
//! # Classification
//!
//! | Used by | Services | Placement |
//! |---------|----------|-----------|
//! | one operation | one | operation-specific |
//! | several operations | one | service-common |
//! | several operations | several | operation-specific, for every user |
//!
//! # Fingerprints
//!
//! A fingerprint is the owning service plus a canonical signature of the
//! schema: kinds, formats, the enum set, property names with their types and
//! requiredness, item and variant types, reference targets and nested
//! definitions. Names and descriptions do not participate, and property order
//! does not matter. The first type registered with a fingerprint is canonical;
//! later ones become aliases of it and their usage is folded into it.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::types::{sanitize_name, service_of, SchemaKind, SchemaNode, SourceLocation};

/// A registered structural type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TypeDefinition {
    /// Identifier-safe name.
    pub name: String,
    /// Summary annotation used wherever the full declaration is unavailable.
    pub representation: String,
    pub fingerprint: String,
    pub description: String,
    pub source: SourceLocation,
    pub module_path: String,
    /// Qualified name of the operation that registered the type.
    pub operation: String,
}

/// Where a classified type is declared.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "placement", rename_all = "snake_case")]
pub enum Placement {
    /// Shared by several operations of one service.
    ServiceCommon { service: String },
    /// Used by a single operation.
    OperationSpecific,
    /// Used by operations of several services; declared once per operation.
    CrossService { services: Vec<String> },
}

/// Classification of one canonical type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClassifiedType {
    pub name: String,
    pub placement: Placement,
    pub operations: Vec<String>,
}

/// Outcome of a classification pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UsageReport {
    pub types: Vec<ClassifiedType>,
}

impl UsageReport {
    /// Number of service-common types per service.
    pub fn common_counts(&self) -> BTreeMap<&str, usize> {
        let mut counts = BTreeMap::new();
        for classified in &self.types {
            if let Placement::ServiceCommon { service } = &classified.placement {
                *counts.entry(service.as_str()).or_insert(0) += 1;
            }
        }
        counts
    }
}

/// A duplicate folded into its canonical type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MergedType {
    pub duplicate: String,
    pub canonical: String,
}

/// Outcome of deduplication, including the reclassification it triggers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DedupReport {
    pub merged: Vec<MergedType>,
    pub usage: UsageReport,
}

#[derive(Debug, Clone)]
struct Usage {
    type_name: String,
    operation: String,
    module_path: String,
}

/// Registry of every structural type found in one generation run.
#[derive(Debug, Default)]
pub struct TypeRegistry {
    types: BTreeMap<String, TypeDefinition>,
    registration_order: Vec<String>,
    usages: Vec<Usage>,
    fingerprint_index: BTreeMap<String, String>,
    service_common_types: BTreeMap<String, BTreeMap<String, TypeDefinition>>,
    operation_types: BTreeMap<String, BTreeMap<String, TypeDefinition>>,
    type_usage: BTreeMap<String, BTreeSet<String>>,
    operation_to_service: BTreeMap<String, String>,
    type_dependencies: BTreeMap<String, BTreeSet<String>>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a type under its sanitized name.
    ///
    /// First writer wins: if the name is taken, the existing definition is
    /// returned unchanged and a structural mismatch is logged as a warning.
    /// The usage by `definition.operation` is recorded either way.
    pub fn register(&mut self, mut definition: TypeDefinition) -> TypeDefinition {
        definition.name = sanitize_name(&definition.name);
        self.usages.push(Usage {
            type_name: definition.name.clone(),
            operation: definition.operation.clone(),
            module_path: definition.module_path.clone(),
        });

        if let Some(existing) = self.types.get(&definition.name) {
            if existing.fingerprint != definition.fingerprint {
                tracing::warn!(
                    name = %definition.name,
                    operation = %definition.operation,
                    first = %existing.operation,
                    "type name already registered with a different structure, keeping the first"
                );
            }
            return existing.clone();
        }
        self.registration_order.push(definition.name.clone());
        self.types
            .insert(definition.name.clone(), definition.clone());
        definition
    }

    /// Build usage maps and classify every type.
    pub fn analyze_usage(&mut self) -> UsageReport {
        self.type_usage.clear();
        self.operation_to_service.clear();

        for usage in &self.usages {
            self.operation_to_service.insert(
                usage.operation.clone(),
                service_of(&usage.module_path).to_string(),
            );
            self.type_usage
                .entry(usage.type_name.clone())
                .or_default()
                .insert(usage.operation.clone());
        }

        self.classify()
    }

    /// Collapse structurally identical types onto the first one registered,
    /// then reclassify the canonical types with the merged usage.
    pub fn deduplicate(&mut self) -> DedupReport {
        let mut merged = Vec::new();

        for name in &self.registration_order {
            let fingerprint = &self.types[name].fingerprint;
            match self.fingerprint_index.get(fingerprint).cloned() {
                Some(canonical) if &canonical != name => {
                    self.type_dependencies
                        .entry(name.clone())
                        .or_default()
                        .insert(canonical.clone());
                    merged.push(MergedType {
                        duplicate: name.clone(),
                        canonical,
                    });
                }
                Some(_) => {}
                None => {
                    self.fingerprint_index
                        .insert(fingerprint.clone(), name.clone());
                }
            }
        }

        for merge in &merged {
            let operations = self
                .type_usage
                .get(&merge.duplicate)
                .cloned()
                .unwrap_or_default();
            self.type_usage
                .entry(merge.canonical.clone())
                .or_default()
                .extend(operations);
        }

        DedupReport {
            merged,
            usage: self.classify(),
        }
    }

    fn classify(&mut self) -> UsageReport {
        self.service_common_types.clear();
        self.operation_types.clear();
        let mut report = UsageReport::default();

        for (type_name, operations) in &self.type_usage {
            if self.type_dependencies.contains_key(type_name) {
                continue;
            }
            let Some(definition) = self.types.get(type_name) else {
                continue;
            };

            let services: BTreeSet<&String> = operations
                .iter()
                .filter_map(|op| self.operation_to_service.get(op))
                .collect();

            let placement = match services.iter().next() {
                Some(service) if operations.len() > 1 && services.len() == 1 => {
                    self.service_common_types
                        .entry(service.to_string())
                        .or_default()
                        .insert(type_name.clone(), definition.clone());
                    Placement::ServiceCommon {
                        service: service.to_string(),
                    }
                }
                _ => {
                    for operation in operations {
                        self.operation_types
                            .entry(operation.clone())
                            .or_default()
                            .insert(type_name.clone(), definition.clone());
                    }
                    if operations.len() > 1 {
                        Placement::CrossService {
                            services: services.iter().map(|s| s.to_string()).collect(),
                        }
                    } else {
                        Placement::OperationSpecific
                    }
                }
            };

            report.types.push(ClassifiedType {
                name: type_name.clone(),
                placement,
                operations: operations.iter().cloned().collect(),
            });
        }

        report
    }

    pub fn get(&self, name: &str) -> Option<&TypeDefinition> {
        self.types.get(name)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Follow duplicate edges to the canonical name.
    pub fn canonical_name<'a>(&'a self, name: &'a str) -> &'a str {
        let mut current = name;
        // each edge points at a first-seen type, so one hop is the norm
        for _ in 0..=self.type_dependencies.len() {
            match self
                .type_dependencies
                .get(current)
                .and_then(|deps| deps.iter().next())
            {
                Some(next) => current = next.as_str(),
                None => break,
            }
        }
        current
    }

    pub fn is_duplicate(&self, name: &str) -> bool {
        self.type_dependencies.contains_key(name)
    }

    pub fn fingerprint_index(&self) -> &BTreeMap<String, String> {
        &self.fingerprint_index
    }

    pub fn dependencies(&self, name: &str) -> Option<&BTreeSet<String>> {
        self.type_dependencies.get(name)
    }

    /// Services that own at least one service-common type.
    pub fn common_services(&self) -> impl Iterator<Item = &str> {
        self.service_common_types.keys().map(String::as_str)
    }

    pub fn service_common_types(&self, service: &str) -> Option<&BTreeMap<String, TypeDefinition>> {
        self.service_common_types.get(service)
    }

    /// Operation-specific types of a qualified operation name.
    pub fn operation_types(&self, operation: &str) -> Option<&BTreeMap<String, TypeDefinition>> {
        self.operation_types.get(operation)
    }

    pub fn type_usage(&self, name: &str) -> Option<&BTreeSet<String>> {
        self.type_usage.get(name)
    }

    /// True if `name` is declared in the common file of `service`.
    pub fn is_service_common(&self, service: &str, name: &str) -> bool {
        self.service_common_types
            .get(service)
            .map(|types| types.contains_key(name))
            .unwrap_or(false)
    }
}

/// Fingerprint of a root schema owned by `service`.
pub fn fingerprint(service: &str, node: &SchemaNode) -> String {
    let mut out = format!("{}|{}", service, signature(node));
    if !node.definitions.is_empty() {
        let defs: Vec<String> = node
            .definitions
            .iter()
            .map(|(name, def)| format!("{:?}={}", name, signature(def)))
            .collect();
        out.push_str(&format!("|defs{{{}}}", defs.join(";")));
    }
    out
}

/// Canonical structural signature, independent of names and descriptions.
pub fn signature(node: &SchemaNode) -> String {
    match &node.kind {
        SchemaKind::String { format: None } => "string".to_string(),
        SchemaKind::String {
            format: Some(format),
        } => format!("string<{}>", format),
        SchemaKind::Timestamp => "timestamp".to_string(),
        SchemaKind::Enum { values } => {
            let set: BTreeSet<&String> = values.iter().collect();
            format!("enum{:?}", set)
        }
        SchemaKind::Integer => "integer".to_string(),
        SchemaKind::Boolean => "boolean".to_string(),
        SchemaKind::Array { items } => format!(
            "array<{}>",
            items.as_deref().map(signature).unwrap_or_else(|| "any".into())
        ),
        SchemaKind::Object {
            properties,
            required,
        } => {
            let fields: Vec<String> = properties
                .iter()
                .map(|(name, prop)| {
                    let marker = if required.contains(name) { '!' } else { '?' };
                    format!("{:?}{}{}", name, marker, signature(prop))
                })
                .collect();
            format!("object{{{}}}", fields.join(","))
        }
        SchemaKind::Reference { target, .. } => format!("ref<{:?}>", target),
        SchemaKind::Union { variants } => {
            let set: BTreeSet<String> = variants.iter().map(signature).collect();
            format!(
                "union({})",
                set.into_iter().collect::<Vec<_>>().join("|")
            )
        }
        SchemaKind::Any => "any".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::resolve_root;
    use crate::types::VariableSlot;
    use serde_json::{json, Value};
    use std::path::PathBuf;

    fn definition(name: &str, module_path: &str, operation: &str, schema: &Value) -> TypeDefinition {
        let node = resolve_root(name, schema).node;
        TypeDefinition {
            name: name.to_string(),
            representation: "Dict[str, Any]".to_string(),
            fingerprint: fingerprint(service_of(module_path), &node),
            description: format!("Type definition for {}", name),
            source: SourceLocation {
                path: PathBuf::from(format!("{}.json", operation)),
                slot: VariableSlot::Output,
            },
            module_path: module_path.to_string(),
            operation: format!("{}.{}", module_path, operation),
        }
    }

    fn point() -> Value {
        json!({
            "type": "object",
            "required": ["x"],
            "properties": {"x": {"type": "integer"}, "y": {"type": "integer"}}
        })
    }

    // === Registration Tests ===

    #[test]
    fn register_is_idempotent() {
        let mut registry = TypeRegistry::new();
        let first = registry.register(definition("Op_P_Type", "AWS.ec2", "Op", &point()));

        let mut second = definition("Op_P_Type", "AWS.ec2", "Op", &json!({"type": "array"}));
        second.description = "a different description".into();
        let returned = registry.register(second);

        assert_eq!(first, returned);
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get("Op_P_Type").unwrap().description, first.description);
        assert_eq!(
            registry.type_usage("Op_P_Type"),
            None,
            "usage is only derived by analyze_usage"
        );
        registry.analyze_usage();
        assert_eq!(registry.type_usage("Op_P_Type").unwrap().len(), 1);
    }

    #[test]
    fn register_sanitizes_name() {
        let mut registry = TypeRegistry::new();
        let def = registry.register(definition("My Op-Input Type", "AWS.s3", "MyOp", &point()));
        assert_eq!(def.name, "My_Op_Input_Type");
        assert!(registry.get("My_Op_Input_Type").is_some());
    }

    // === Classification Tests ===

    #[test]
    fn single_operation_type_is_operation_specific() {
        let mut registry = TypeRegistry::new();
        registry.register(definition("A_P_Type", "AWS.ec2", "A", &point()));
        let report = registry.analyze_usage();

        assert_eq!(report.types.len(), 1);
        assert_eq!(report.types[0].placement, Placement::OperationSpecific);
        assert!(registry
            .operation_types("AWS.ec2.A")
            .unwrap()
            .contains_key("A_P_Type"));
        assert!(!registry.is_service_common("ec2", "A_P_Type"));
    }

    #[test]
    fn shared_name_within_service_is_common() {
        let mut registry = TypeRegistry::new();
        registry.register(definition("Shared_Type", "AWS.ec2", "A", &point()));
        registry.register(definition("Shared_Type", "AWS.ec2.vpc", "B", &point()));
        let report = registry.analyze_usage();

        assert_eq!(
            report.types[0].placement,
            Placement::ServiceCommon {
                service: "ec2".into()
            }
        );
        assert!(registry.is_service_common("ec2", "Shared_Type"));
        assert!(registry.operation_types("AWS.ec2.A").is_none());
        assert!(registry.operation_types("AWS.ec2.vpc.B").is_none());
        assert_eq!(report.common_counts().get("ec2"), Some(&1));
    }

    #[test]
    fn shared_name_across_services_stays_operation_specific() {
        let mut registry = TypeRegistry::new();
        registry.register(definition("Shared_Type", "AWS.ec2", "A", &point()));
        registry.register(definition("Shared_Type", "AWS.s3", "B", &point()));
        let report = registry.analyze_usage();

        assert_eq!(
            report.types[0].placement,
            Placement::CrossService {
                services: vec!["ec2".into(), "s3".into()]
            }
        );
        assert!(registry.common_services().next().is_none());
        assert!(registry
            .operation_types("AWS.ec2.A")
            .unwrap()
            .contains_key("Shared_Type"));
        assert!(registry
            .operation_types("AWS.s3.B")
            .unwrap()
            .contains_key("Shared_Type"));
    }

    #[test]
    fn classification_is_exclusive() {
        let mut registry = TypeRegistry::new();
        registry.register(definition("A_P_Type", "AWS.ec2", "A", &point()));
        registry.register(definition("B_P_Type", "AWS.ec2", "B", &point()));
        registry.register(definition("C_P_Type", "AWS.ec2", "C", &json!({"type": "array"})));
        registry.register(definition("D_P_Type", "AWS.s3", "D", &point()));
        registry.analyze_usage();
        let report = registry.deduplicate();

        for classified in &report.usage.types {
            let common = registry
                .common_services()
                .any(|s| registry.is_service_common(s, &classified.name));
            let specific = ["AWS.ec2.A", "AWS.ec2.B", "AWS.ec2.C", "AWS.s3.D"]
                .iter()
                .any(|op| {
                    registry
                        .operation_types(op)
                        .map(|types| types.contains_key(&classified.name))
                        .unwrap_or(false)
                });
            assert!(common ^ specific, "{} must be in exactly one category", classified.name);
        }
        assert_eq!(report.usage.types.len(), 3);
    }

    // === Deduplication Tests ===

    #[test]
    fn identical_types_in_one_service_collapse_into_common() {
        let mut registry = TypeRegistry::new();
        registry.register(definition("OpA_paramX_Type", "svc", "OpA", &point()));
        registry.register(definition("OpB_paramY_Type", "svc", "OpB", &point()));
        let usage = registry.analyze_usage();
        assert!(usage
            .types
            .iter()
            .all(|t| t.placement == Placement::OperationSpecific));

        let report = registry.deduplicate();
        assert_eq!(
            report.merged,
            vec![MergedType {
                duplicate: "OpB_paramY_Type".into(),
                canonical: "OpA_paramX_Type".into(),
            }]
        );
        assert_eq!(registry.canonical_name("OpB_paramY_Type"), "OpA_paramX_Type");
        assert_eq!(registry.canonical_name("OpA_paramX_Type"), "OpA_paramX_Type");
        assert!(registry.is_duplicate("OpB_paramY_Type"));
        assert!(!registry.is_duplicate("OpA_paramX_Type"));
        assert_eq!(
            registry
                .type_usage("OpA_paramX_Type")
                .unwrap()
                .iter()
                .collect::<Vec<_>>(),
            ["svc.OpA", "svc.OpB"]
        );
        assert!(registry.is_service_common("svc", "OpA_paramX_Type"));
        assert!(!registry.is_service_common("svc", "OpB_paramY_Type"));
        assert!(registry.operation_types("svc.OpA").is_none());
        assert!(registry.operation_types("svc.OpB").is_none());
        assert_eq!(
            registry
                .dependencies("OpB_paramY_Type")
                .unwrap()
                .iter()
                .collect::<Vec<_>>(),
            ["OpA_paramX_Type"]
        );
    }

    #[test]
    fn identical_types_in_different_services_are_not_merged() {
        let mut registry = TypeRegistry::new();
        registry.register(definition("A_P_Type", "AWS.ec2", "A", &point()));
        registry.register(definition("B_P_Type", "AWS.s3", "B", &point()));
        registry.analyze_usage();
        let report = registry.deduplicate();
        assert!(report.merged.is_empty());
        assert_eq!(registry.fingerprint_index().len(), 2);
    }

    #[test]
    fn requiredness_participates_in_fingerprint() {
        let mut optional_x = point();
        optional_x["required"] = json!([]);
        let mut registry = TypeRegistry::new();
        registry.register(definition("A_P_Type", "svc", "A", &point()));
        registry.register(definition("B_P_Type", "svc", "B", &optional_x));
        registry.analyze_usage();
        assert!(registry.deduplicate().merged.is_empty());
    }

    // === Fingerprint Tests ===

    #[test]
    fn fingerprint_ignores_property_order_and_descriptions() {
        let a = resolve_root(
            "A",
            &json!({"properties": {"x": {"type": "string", "description": "one"}, "y": "integer"}}),
        )
        .node;
        let b = resolve_root(
            "B",
            &json!({"properties": {"y": "integer", "x": {"type": "string"}}}),
        )
        .node;
        assert_eq!(fingerprint("svc", &a), fingerprint("svc", &b));
        assert_ne!(fingerprint("svc", &a), fingerprint("other", &b));
    }

    #[test]
    fn fingerprint_distinguishes_enum_sets_and_formats() {
        let a = resolve_root("A", &json!({"type": "string", "enum": ["on", "off"]})).node;
        let b = resolve_root("B", &json!({"type": "string", "enum": ["off", "on"]})).node;
        let c = resolve_root("C", &json!({"type": "string", "enum": ["on"]})).node;
        assert_eq!(signature(&a), signature(&b));
        assert_ne!(signature(&a), signature(&c));

        let uri = resolve_root("U", &json!({"type": "string", "format": "uri"})).node;
        let plain = resolve_root("P", &json!({"type": "string"})).node;
        assert_ne!(signature(&uri), signature(&plain));
    }

    #[test]
    fn fingerprint_covers_nested_definitions() {
        let a = resolve_root(
            "A",
            &json!({
                "properties": {"t": {"$ref": "#/definitions/Tag"}},
                "definitions": {"Tag": {"properties": {"k": "string"}}}
            }),
        )
        .node;
        let b = resolve_root(
            "B",
            &json!({
                "properties": {"t": {"$ref": "#/definitions/Tag"}},
                "definitions": {"Tag": {"properties": {"k": "integer"}}}
            }),
        )
        .node;
        assert_ne!(fingerprint("svc", &a), fingerprint("svc", &b));
    }
}
