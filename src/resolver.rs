//! Schema resolution - turns raw JSON Schema nodes into [`SchemaNode`] trees.
//!
//! Resolution never fails. Anything that cannot be resolved degrades to an
//! `Any` node and is recorded as an [`Anomaly`]:
//!
//! | Situation | Result | Anomaly |
//! |-----------|--------|---------|
//! | `$ref` target missing | `Any` | `UnresolvedReference` |
//! | `$ref` closes a cycle (including `$ref: "#"`) | `Any` | `CycleDetected` |
//! | more than 100 properties / 5 union variants / 50 definitions | surplus dropped | `Truncated` |
//!
//! References are resolved shallowly: a `$ref` node keeps the target's name
//! plus its kind and format, never its properties.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use serde_json::{Map, Value};

use crate::error::{Anomaly, AnomalyKind};
use crate::types::{
    json_type_name, SchemaKind, SchemaNode, TypeTag, MAX_DEFINITIONS, MAX_ENUM_VALUES,
    MAX_PROPERTIES, MAX_UNION_CANDIDATES, MAX_UNION_VARIANTS,
};

/// Token held while the root schema itself is being resolved.
const ROOT_REF_TOKEN: &str = "$ref:#";

const DEFINITIONS_PREFIX: &str = "#/definitions/";
const DEFS_PREFIX: &str = "#/$defs/";

/// A resolved root schema together with the anomalies found on the way.
#[derive(Debug, Clone)]
pub struct Resolution {
    pub node: SchemaNode,
    pub anomalies: Vec<Anomaly>,
}

/// Resolve one schema node against an explicit set of definitions.
///
/// The node's own `definitions` are not resolved; use [`resolve_root`] for
/// a self-contained root schema.
pub fn resolve(name: &str, raw: &Value, definitions: Option<&Map<String, Value>>) -> SchemaNode {
    let mut resolver = SchemaResolver::new(definitions);
    resolver
        .with_token(ROOT_REF_TOKEN.to_string(), name, |r| r.resolve_node(name, name, raw))
        .unwrap_or_else(|| SchemaNode::any(name))
}

/// Resolve a root schema, including its nested `definitions` (or `$defs`).
///
/// References are looked up only under the keyword the root declares them
/// with: a root using `$defs` leaves `#/definitions/...` unresolved.
pub fn resolve_root(name: &str, raw: &Value) -> Resolution {
    let (definitions, prefix) = match raw.get("definitions") {
        Some(defs) => (defs.as_object(), DEFINITIONS_PREFIX),
        None => (raw.get("$defs").and_then(Value::as_object), DEFS_PREFIX),
    };
    let mut resolver = SchemaResolver::new(definitions).with_prefix(prefix);

    let node = resolver
        .with_token(ROOT_REF_TOKEN.to_string(), name, |r| {
            let mut node = r.resolve_node(name, name, raw);
            if let Some(defs) = definitions {
                node.definitions = r.resolve_definitions(name, defs);
            }
            node
        })
        .unwrap_or_else(|| SchemaNode::any(name));

    Resolution {
        node,
        anomalies: resolver.into_anomalies(),
    }
}

/// Recursive resolver state: the definitions in scope, the path tokens held
/// by the active recursion, and the anomalies recorded so far.
#[derive(Debug)]
pub struct SchemaResolver<'a> {
    definitions: Option<&'a Map<String, Value>>,
    /// Reference prefix the definitions answer to; both when unset.
    prefix: Option<&'static str>,
    in_progress: HashSet<String>,
    anomalies: Vec<Anomaly>,
}

impl<'a> SchemaResolver<'a> {
    pub fn new(definitions: Option<&'a Map<String, Value>>) -> Self {
        Self {
            definitions,
            prefix: None,
            in_progress: HashSet::new(),
            anomalies: Vec::new(),
        }
    }

    pub fn with_prefix(mut self, prefix: &'static str) -> Self {
        self.prefix = Some(prefix);
        self
    }

    pub fn into_anomalies(self) -> Vec<Anomaly> {
        self.anomalies
    }

    /// Resolve `raw` as a node called `name`, located at `context`.
    pub fn resolve_node(&mut self, name: &str, context: &str, raw: &Value) -> SchemaNode {
        let obj = match raw {
            Value::String(ty) => return SchemaNode::new(name, scalar_kind(ty)),
            Value::Object(obj) => obj,
            _ => return SchemaNode::any(name),
        };

        let description = obj
            .get("description")
            .and_then(Value::as_str)
            .map(String::from);

        // $ref wins over every sibling keyword
        let kind = if let Some(target) = obj.get("$ref").and_then(Value::as_str) {
            self.resolve_reference(context, target)
        } else {
            match declared_type(obj) {
                Some("string") => self.resolve_string(context, obj),
                Some("integer") | Some("number") => SchemaKind::Integer,
                Some("boolean") => SchemaKind::Boolean,
                Some("array") => self.resolve_array(name, context, obj),
                Some("object") | Some("map") => self.resolve_object(context, obj),
                Some(_) => SchemaKind::Any,
                None if obj.contains_key("properties") => self.resolve_object(context, obj),
                None if obj.contains_key("enum") => self.resolve_string(context, obj),
                None if obj.contains_key("oneOf") => self.resolve_union(name, context, obj),
                None => SchemaKind::Any,
            }
        };

        SchemaNode::new(name, kind).with_description(description)
    }

    fn resolve_definitions(
        &mut self,
        root: &str,
        defs: &Map<String, Value>,
    ) -> BTreeMap<String, SchemaNode> {
        if defs.len() > MAX_DEFINITIONS {
            self.truncated(root, "definitions", defs.len(), MAX_DEFINITIONS);
        }

        let mut out = BTreeMap::new();
        for (def_name, def) in defs.iter().take(MAX_DEFINITIONS) {
            let token = format!("definitions.{}", def_name);
            let node = self
                .with_token(token.clone(), &token, |r| r.resolve_node(def_name, &token, def))
                .unwrap_or_else(|| SchemaNode::any(def_name));
            out.insert(def_name.clone(), node);
        }
        out
    }

    fn resolve_string(&mut self, context: &str, obj: &Map<String, Value>) -> SchemaKind {
        if let Some(values) = obj.get("enum").and_then(Value::as_array) {
            if values.len() > MAX_ENUM_VALUES {
                self.truncated(context, "enum values", values.len(), MAX_ENUM_VALUES);
            }
            let values: Vec<String> = values
                .iter()
                .take(MAX_ENUM_VALUES)
                .filter_map(enum_literal)
                .collect();
            if !values.is_empty() {
                return SchemaKind::Enum { values };
            }
        }

        match obj.get("format").and_then(Value::as_str) {
            Some("date-time") => SchemaKind::Timestamp,
            format => SchemaKind::String {
                format: format.map(String::from),
            },
        }
    }

    fn resolve_array(&mut self, name: &str, context: &str, obj: &Map<String, Value>) -> SchemaKind {
        let Some(items) = obj.get("items").filter(|v| v.is_object() || v.is_string()) else {
            return SchemaKind::Array { items: None };
        };

        let token = format!("{}.items", context);
        let item_name = format!("{}Item", name);
        let node = self
            .with_token(token.clone(), &token, |r| r.resolve_node(&item_name, &token, items))
            .unwrap_or_else(|| SchemaNode::any(&item_name));

        SchemaKind::Array {
            items: Some(Box::new(node)),
        }
    }

    fn resolve_object(&mut self, context: &str, obj: &Map<String, Value>) -> SchemaKind {
        let required: BTreeSet<String> = obj
            .get("required")
            .and_then(Value::as_array)
            .map(|names| {
                names
                    .iter()
                    .filter_map(|v| v.as_str().map(String::from))
                    .collect()
            })
            .unwrap_or_default();

        let mut properties = BTreeMap::new();
        if let Some(props) = obj.get("properties").and_then(Value::as_object) {
            if props.len() > MAX_PROPERTIES {
                self.truncated(context, "properties", props.len(), MAX_PROPERTIES);
            }

            for (prop_name, prop) in props.iter().take(MAX_PROPERTIES) {
                let token = format!("{}.properties.{}", context, prop_name);
                let node = self
                    .with_token(token.clone(), &token, |r| r.resolve_node(prop_name, &token, prop))
                    .unwrap_or_else(|| SchemaNode::any(prop_name));
                properties.insert(prop_name.clone(), node);
            }
        }

        SchemaKind::Object {
            properties,
            required,
        }
    }

    fn resolve_union(&mut self, name: &str, context: &str, obj: &Map<String, Value>) -> SchemaKind {
        let Some(candidates) = obj.get("oneOf").and_then(Value::as_array) else {
            return SchemaKind::Any;
        };
        if candidates.len() >= MAX_UNION_CANDIDATES {
            self.truncated(context, "oneOf variants", candidates.len(), 0);
            return SchemaKind::Any;
        }
        if candidates.len() > MAX_UNION_VARIANTS {
            self.truncated(context, "oneOf variants", candidates.len(), MAX_UNION_VARIANTS);
        }

        let token = format!("{}.oneOf", context);
        let variant_name = format!("{}OneOf", name);
        let variants = self.with_token(token.clone(), &token, |r| {
            candidates
                .iter()
                .take(MAX_UNION_VARIANTS)
                .enumerate()
                .map(|(i, candidate)| {
                    let variant_context = format!("{}.{}", token, i);
                    r.resolve_node(&variant_name, &variant_context, candidate)
                })
                .collect::<Vec<_>>()
        });

        match variants {
            Some(variants) if !variants.is_empty() => SchemaKind::Union { variants },
            _ => SchemaKind::Any,
        }
    }

    fn resolve_reference(&mut self, context: &str, target: &str) -> SchemaKind {
        let token = format!("$ref:{}", target);
        let resolved = self.with_token(token, context, |r| {
            let Some((def_name, def)) = r.lookup(target) else {
                r.record(
                    context,
                    AnomalyKind::UnresolvedReference,
                    format!("unresolved reference {}", target),
                );
                return None;
            };
            let (resolved, format) = r.shallow_kind(context, def);
            Some(SchemaKind::Reference {
                target: def_name,
                resolved,
                format,
            })
        });

        resolved.flatten().unwrap_or(SchemaKind::Any)
    }

    /// Kind and format of a referenced definition, without descending into it.
    fn shallow_kind(&mut self, context: &str, raw: &Value) -> (TypeTag, Option<String>) {
        let obj = match raw {
            Value::String(ty) => return (scalar_kind(ty).tag(), None),
            Value::Object(obj) => obj,
            _ => return (TypeTag::Any, None),
        };

        if let Some(target) = obj.get("$ref").and_then(Value::as_str) {
            // reference chain: follow it under its own token
            return match self.resolve_reference(context, target) {
                SchemaKind::Reference {
                    resolved, format, ..
                } => (resolved, format),
                other => (other.tag(), None),
            };
        }

        let format = obj.get("format").and_then(Value::as_str).map(String::from);
        let tag = match declared_type(obj) {
            Some("string") if obj.contains_key("enum") => TypeTag::Enum,
            Some("string") if format.as_deref() == Some("date-time") => TypeTag::Timestamp,
            Some("string") => TypeTag::String,
            Some("integer") | Some("number") => TypeTag::Integer,
            Some("boolean") => TypeTag::Boolean,
            Some("array") => TypeTag::Array,
            Some("object") | Some("map") => TypeTag::Object,
            Some(_) => TypeTag::Any,
            None if obj.contains_key("properties") => TypeTag::Object,
            None if obj.contains_key("enum") => TypeTag::Enum,
            None if obj.contains_key("oneOf") => TypeTag::Union,
            None => TypeTag::Any,
        };
        (tag, format)
    }

    /// Find a `#/definitions/<name>` or `#/$defs/<name>` target under the
    /// resolver's prefix.
    fn lookup(&self, target: &str) -> Option<(String, &'a Value)> {
        let name = match self.prefix {
            Some(prefix) => target.strip_prefix(prefix)?,
            None => target
                .strip_prefix(DEFINITIONS_PREFIX)
                .or_else(|| target.strip_prefix(DEFS_PREFIX))?,
        };
        // JSON Pointer escapes (~1 = /, ~0 = ~)
        let name = name.replace("~1", "/").replace("~0", "~");
        let def = self.definitions?.get(name.as_str())?;
        Some((name, def))
    }

    /// Run `f` while holding `token`. Returns `None` (and records a cycle)
    /// when the token is already held by an enclosing call.
    fn with_token<T>(
        &mut self,
        token: String,
        location: &str,
        f: impl FnOnce(&mut Self) -> T,
    ) -> Option<T> {
        if !self.in_progress.insert(token.clone()) {
            self.record(
                location,
                AnomalyKind::CycleDetected,
                format!("cycle through {}, substituted Any", token),
            );
            return None;
        }
        let out = f(self);
        self.in_progress.remove(&token);
        Some(out)
    }

    fn truncated(&mut self, context: &str, what: &str, found: usize, kept: usize) {
        self.record(
            context,
            AnomalyKind::Truncated,
            format!("{} {} found, only {} kept", found, what, kept),
        );
    }

    fn record(&mut self, location: &str, kind: AnomalyKind, message: String) {
        self.anomalies.push(Anomaly {
            location: location.to_string(),
            kind,
            message,
        });
    }
}

// --- Internal helpers ---

/// Kind of a node given as a bare type name, e.g. `"type": "string"`.
fn scalar_kind(ty: &str) -> SchemaKind {
    match ty {
        "string" => SchemaKind::String { format: None },
        "integer" | "number" => SchemaKind::Integer,
        "boolean" => SchemaKind::Boolean,
        "array" => SchemaKind::Array { items: None },
        "object" | "map" => SchemaKind::Object {
            properties: BTreeMap::new(),
            required: BTreeSet::new(),
        },
        _ => SchemaKind::Any,
    }
}

/// The `type` keyword; for a type list the first non-null entry.
fn declared_type(obj: &Map<String, Value>) -> Option<&str> {
    match obj.get("type")? {
        Value::String(ty) => Some(ty.as_str()),
        Value::Array(types) => types
            .iter()
            .filter_map(Value::as_str)
            .find(|ty| *ty != "null"),
        _ => None,
    }
}

fn enum_literal(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        other => {
            tracing::trace!(kind = json_type_name(other), "ignoring enum literal");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn properties(node: &SchemaNode) -> &BTreeMap<String, SchemaNode> {
        match &node.kind {
            SchemaKind::Object { properties, .. } => properties,
            other => panic!("expected object, got {:?}", other),
        }
    }

    // === Scalar Tests ===

    #[test]
    fn bare_string_type() {
        let node = resolve("x", &json!("boolean"), None);
        assert_eq!(node.kind, SchemaKind::Boolean);
        let node = resolve("x", &json!("number"), None);
        assert_eq!(node.kind, SchemaKind::Integer);
    }

    #[test]
    fn string_enum_and_timestamp() {
        let node = resolve("s", &json!({"type": "string", "enum": ["a", "b", 3]}), None);
        assert_eq!(
            node.kind,
            SchemaKind::Enum {
                values: vec!["a".into(), "b".into(), "3".into()]
            }
        );

        let node = resolve("t", &json!({"type": "string", "format": "date-time"}), None);
        assert_eq!(node.kind, SchemaKind::Timestamp);

        let node = resolve("u", &json!({"type": "string", "format": "uri"}), None);
        assert_eq!(
            node.kind,
            SchemaKind::String {
                format: Some("uri".into())
            }
        );
    }

    #[test]
    fn nullable_type_list_uses_first_non_null() {
        let node = resolve("x", &json!({"type": ["null", "integer"]}), None);
        assert_eq!(node.kind, SchemaKind::Integer);
    }

    #[test]
    fn description_is_kept() {
        let node = resolve("x", &json!({"type": "string", "description": "The id"}), None);
        assert_eq!(node.description.as_deref(), Some("The id"));
    }

    // === Structure Tests ===

    #[test]
    fn object_properties_and_required() {
        let node = resolve(
            "Root",
            &json!({
                "type": "object",
                "required": ["a"],
                "properties": {
                    "b": {"type": "integer"},
                    "a": {"type": "string"}
                }
            }),
            None,
        );
        let SchemaKind::Object {
            properties,
            required,
        } = &node.kind
        else {
            panic!("expected object");
        };
        assert_eq!(properties.keys().collect::<Vec<_>>(), ["a", "b"]);
        assert!(required.contains("a"));
        assert!(!required.contains("b"));
    }

    #[test]
    fn properties_without_type_is_object() {
        let node = resolve("Root", &json!({"properties": {"a": "string"}}), None);
        assert_eq!(properties(&node).len(), 1);
    }

    #[test]
    fn array_items_are_resolved() {
        let node = resolve(
            "Tags",
            &json!({"type": "array", "items": {"type": "string"}}),
            None,
        );
        let SchemaKind::Array { items: Some(items) } = &node.kind else {
            panic!("expected array with items");
        };
        assert_eq!(items.name, "TagsItem");
        assert_eq!(items.kind, SchemaKind::String { format: None });
    }

    #[test]
    fn deep_legitimate_nesting_is_not_a_cycle() {
        let mut raw = json!({"type": "string"});
        for _ in 0..40 {
            raw = json!({"type": "object", "properties": {"a": raw}});
        }
        let resolution = resolve_root("Deep", &raw);
        assert!(resolution.anomalies.is_empty());

        let mut node = &resolution.node;
        let mut depth = 0;
        while let SchemaKind::Object { properties, .. } = &node.kind {
            node = &properties["a"];
            depth += 1;
        }
        assert_eq!(depth, 40);
        assert_eq!(node.kind, SchemaKind::String { format: None });
    }

    // === Reference Tests ===

    #[test]
    fn reference_is_shallow() {
        let raw = json!({
            "type": "object",
            "properties": {
                "owner": {"$ref": "#/definitions/User"}
            },
            "definitions": {
                "User": {
                    "type": "object",
                    "properties": {"name": {"type": "string"}}
                }
            }
        });
        let resolution = resolve_root("Root", &raw);
        assert_eq!(
            properties(&resolution.node)["owner"].kind,
            SchemaKind::Reference {
                target: "User".into(),
                resolved: TypeTag::Object,
                format: None,
            }
        );
        assert!(resolution.node.definitions.contains_key("User"));
    }

    #[test]
    fn reference_copies_format() {
        let raw = json!({
            "properties": {"at": {"$ref": "#/definitions/When"}},
            "definitions": {"When": {"type": "string", "format": "date-time"}}
        });
        let resolution = resolve_root("Root", &raw);
        assert_eq!(
            properties(&resolution.node)["at"].kind,
            SchemaKind::Reference {
                target: "When".into(),
                resolved: TypeTag::Timestamp,
                format: Some("date-time".into()),
            }
        );
    }

    #[test]
    fn unresolved_reference_degrades_to_any() {
        let raw = json!({
            "properties": {"owner": {"$ref": "#/definitions/Missing"}}
        });
        let resolution = resolve_root("Root", &raw);
        assert_eq!(properties(&resolution.node)["owner"].kind, SchemaKind::Any);
        assert_eq!(resolution.anomalies.len(), 1);
        assert_eq!(resolution.anomalies[0].kind, AnomalyKind::UnresolvedReference);
        assert_eq!(resolution.anomalies[0].location, "Root.properties.owner");
    }

    #[test]
    fn reference_prefix_must_match_definitions_keyword() {
        let raw = json!({
            "properties": {
                "a": {"$ref": "#/$defs/Tag"},
                "b": {"$ref": "#/definitions/Tag"}
            },
            "$defs": {"Tag": {"type": "string"}}
        });
        let resolution = resolve_root("Root", &raw);
        let props = properties(&resolution.node);
        assert!(matches!(props["a"].kind, SchemaKind::Reference { .. }));
        assert_eq!(props["b"].kind, SchemaKind::Any);
        assert_eq!(resolution.anomalies.len(), 1);
        assert_eq!(resolution.anomalies[0].location, "Root.properties.b");

        let raw = json!({
            "properties": {"a": {"$ref": "#/$defs/Tag"}},
            "definitions": {"Tag": {"type": "string"}}
        });
        let resolution = resolve_root("Root", &raw);
        assert_eq!(properties(&resolution.node)["a"].kind, SchemaKind::Any);
        assert_eq!(resolution.anomalies[0].kind, AnomalyKind::UnresolvedReference);
    }

    #[test]
    fn self_reference_to_root_is_any() {
        let raw = json!({
            "type": "object",
            "properties": {
                "name": {"type": "string"},
                "parent": {"$ref": "#"}
            }
        });
        let resolution = resolve_root("Node", &raw);
        assert_eq!(properties(&resolution.node)["parent"].kind, SchemaKind::Any);
        assert!(resolution
            .anomalies
            .iter()
            .any(|a| a.kind == AnomalyKind::CycleDetected));
    }

    #[test]
    fn reference_chain_cycle_terminates() {
        let raw = json!({
            "properties": {"x": {"$ref": "#/definitions/A"}},
            "definitions": {
                "A": {"$ref": "#/definitions/B"},
                "B": {"$ref": "#/definitions/A"}
            }
        });
        let resolution = resolve_root("Root", &raw);
        assert_eq!(
            properties(&resolution.node)["x"].kind,
            SchemaKind::Reference {
                target: "A".into(),
                resolved: TypeTag::Any,
                format: None,
            }
        );
        assert!(resolution
            .anomalies
            .iter()
            .any(|a| a.kind == AnomalyKind::CycleDetected));
    }

    #[test]
    fn recursive_definition_refers_to_itself_by_name() {
        let raw = json!({
            "$ref": "#/definitions/Tree",
            "definitions": {
                "Tree": {
                    "type": "object",
                    "properties": {
                        "children": {"type": "array", "items": {"$ref": "#/definitions/Tree"}}
                    }
                }
            }
        });
        let resolution = resolve_root("Root", &raw);
        let tree = &resolution.node.definitions["Tree"];
        let SchemaKind::Array { items: Some(items) } = &properties(tree)["children"].kind else {
            panic!("expected array");
        };
        assert_eq!(
            items.kind,
            SchemaKind::Reference {
                target: "Tree".into(),
                resolved: TypeTag::Object,
                format: None,
            }
        );
        assert!(resolution.anomalies.is_empty());
    }

    #[test]
    fn same_reference_from_two_sites_resolves_twice() {
        let raw = json!({
            "properties": {
                "a": {"$ref": "#/definitions/Id"},
                "b": {"$ref": "#/definitions/Id"}
            },
            "definitions": {"Id": {"type": "string"}}
        });
        let resolution = resolve_root("Root", &raw);
        let props = properties(&resolution.node);
        assert_eq!(props["a"].kind, props["b"].kind);
        assert!(matches!(
            props["b"].kind,
            SchemaKind::Reference {
                resolved: TypeTag::String,
                ..
            }
        ));
    }

    // === Union and Cap Tests ===

    #[test]
    fn union_keeps_five_variants() {
        let variants: Vec<Value> = (0..7).map(|_| json!({"type": "string"})).collect();
        let resolution = resolve_root("U", &json!({"oneOf": variants}));
        let SchemaKind::Union { variants } = &resolution.node.kind else {
            panic!("expected union");
        };
        assert_eq!(variants.len(), 5);
        assert_eq!(resolution.anomalies[0].kind, AnomalyKind::Truncated);
    }

    #[test]
    fn oversized_union_is_any() {
        let variants: Vec<Value> = (0..12).map(|_| json!({"type": "string"})).collect();
        let resolution = resolve_root("U", &json!({"oneOf": variants}));
        assert_eq!(resolution.node.kind, SchemaKind::Any);
    }

    #[test]
    fn property_cap_drops_surplus_in_declaration_order() {
        let mut props = Map::new();
        for i in 0..120 {
            props.insert(format!("p{:03}", i), json!({"type": "string"}));
        }
        let raw = json!({"type": "object", "properties": props});
        let resolution = resolve_root("Wide", &raw);
        let props = properties(&resolution.node);
        assert_eq!(props.len(), MAX_PROPERTIES);
        assert!(props.contains_key("p099"));
        assert!(!props.contains_key("p100"));
        assert_eq!(resolution.anomalies.len(), 1);
        assert_eq!(resolution.anomalies[0].kind, AnomalyKind::Truncated);
    }

    #[test]
    fn definition_cap() {
        let mut defs = Map::new();
        for i in 0..60 {
            defs.insert(format!("D{:02}", i), json!({"type": "string"}));
        }
        let raw = json!({"type": "object", "definitions": defs});
        let resolution = resolve_root("Root", &raw);
        assert_eq!(resolution.node.definitions.len(), MAX_DEFINITIONS);
        assert!(resolution.node.definitions.contains_key("D49"));
        assert!(!resolution.node.definitions.contains_key("D50"));
    }
}
