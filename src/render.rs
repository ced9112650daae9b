//! Python rendering of resolved schemas and operation stubs.
//!
//! Everything here is pure string building; the emitter decides what goes
//! into which file.

use std::collections::{BTreeMap, BTreeSet};

use crate::types::{sanitize_name, SchemaKind, SchemaNode, TypeTag};

/// First line of every generated file.
pub const HEADER: &str = "# Generated by flow-sdkgen. Do not edit.";

const TYPING_IMPORTS: &str = "from typing import Any, Dict, List, Literal, Optional, TypedDict, Union";
const DATETIME_IMPORT: &str = "from datetime import datetime";

const PYTHON_KEYWORDS: &[&str] = &[
    "False", "None", "True", "and", "as", "assert", "async", "await", "break", "class",
    "continue", "def", "del", "elif", "else", "except", "finally", "for", "from", "global",
    "if", "import", "in", "is", "lambda", "nonlocal", "not", "or", "pass", "raise",
    "return", "try", "while", "with", "yield",
];

/// Names visible to a declaration being rendered.
#[derive(Debug, Clone, Default)]
pub struct Scope {
    /// Declared earlier in the file or imported.
    pub known: BTreeSet<String>,
    /// Declared in the file at or after the current declaration; quoted.
    pub pending: BTreeSet<String>,
}

impl Scope {
    pub fn with_known(known: BTreeSet<String>) -> Self {
        Self {
            known,
            pending: BTreeSet::new(),
        }
    }
}

/// Annotation for a node when no declarations are in scope.
pub fn summary_annotation(node: &SchemaNode) -> String {
    annotation(node, &Scope::default())
}

/// Python annotation for a node.
pub fn annotation(node: &SchemaNode, scope: &Scope) -> String {
    match &node.kind {
        SchemaKind::String { .. } => "str".to_string(),
        SchemaKind::Timestamp => "datetime".to_string(),
        SchemaKind::Enum { values } => {
            let literals: Vec<String> = values.iter().map(|v| literal(v)).collect();
            format!("Literal[{}]", literals.join(", "))
        }
        SchemaKind::Integer => "int".to_string(),
        SchemaKind::Boolean => "bool".to_string(),
        SchemaKind::Array { items: Some(items) } => format!("List[{}]", annotation(items, scope)),
        SchemaKind::Array { items: None } => "List[Any]".to_string(),
        SchemaKind::Object { .. } => "Dict[str, Any]".to_string(),
        SchemaKind::Reference {
            target, resolved, ..
        } => {
            let name = sanitize_name(target);
            if scope.pending.contains(&name) {
                format!("\"{}\"", name)
            } else if scope.known.contains(&name) {
                name
            } else {
                primitive(*resolved).to_string()
            }
        }
        SchemaKind::Union { variants } => {
            let mut rendered: Vec<String> = Vec::new();
            for variant in variants {
                let ann = annotation(variant, scope);
                if !rendered.contains(&ann) {
                    rendered.push(ann);
                }
            }
            match rendered.as_slice() {
                [] => "Any".to_string(),
                [single] => single.clone(),
                _ => format!("Union[{}]", rendered.join(", ")),
            }
        }
        SchemaKind::Any => "Any".to_string(),
    }
}

/// Fallback annotation for a tag whose declaration is not in scope.
pub fn primitive(tag: TypeTag) -> &'static str {
    match tag {
        TypeTag::String | TypeTag::Enum => "str",
        TypeTag::Timestamp => "datetime",
        TypeTag::Integer => "int",
        TypeTag::Boolean => "bool",
        TypeTag::Array => "List[Any]",
        TypeTag::Object => "Dict[str, Any]",
        TypeTag::Reference | TypeTag::Union | TypeTag::Any => "Any",
    }
}

/// Python string literal. JSON string escapes are valid Python escapes.
pub fn literal(value: &str) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| format!("\"{}\"", value))
}

pub fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_') && !is_keyword(name)
}

pub fn is_keyword(name: &str) -> bool {
    PYTHON_KEYWORDS.contains(&name)
}

/// Identifier usable as a Python parameter name.
pub fn python_identifier(name: &str) -> String {
    let mut ident = sanitize_name(name);
    if ident.is_empty() {
        ident.insert(0, '_');
    }
    if is_keyword(&ident) {
        ident.push('_');
    }
    ident
}

fn one_line(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Body of a `"""` docstring. A quote followed by another quote or by the end
/// of the text is escaped, so no run of three and no closing quote survives.
fn docstring(text: &str) -> String {
    let text = text.trim();
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' if matches!(chars.peek(), None | Some('"')) => out.push_str("\\\""),
            c => out.push(c),
        }
    }
    out
}

/// A named type to declare in a module.
#[derive(Debug, Clone, PartialEq)]
pub struct Declaration {
    pub name: String,
    pub node: SchemaNode,
    pub description: Option<String>,
    /// Relative path of the definition file the type was read from.
    pub origin: Option<String>,
}

impl Declaration {
    pub fn new(name: impl Into<String>, node: SchemaNode) -> Self {
        let description = node.description.clone();
        Self {
            name: name.into(),
            node,
            description,
            origin: None,
        }
    }

    pub fn origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = Some(origin.into());
        self
    }

    fn dependencies(&self) -> BTreeSet<String> {
        self.node
            .references()
            .iter()
            .map(|target| sanitize_name(target))
            .filter(|name| name != &self.name)
            .collect()
    }
}

/// Order declarations so that referenced names come first.
///
/// Kahn's algorithm with ties broken by name. Inside a reference cycle the
/// smallest remaining name is released first.
pub fn order_declarations(declarations: Vec<Declaration>) -> Vec<Declaration> {
    let mut remaining: BTreeMap<String, Declaration> = BTreeMap::new();
    for decl in declarations {
        remaining.entry(decl.name.clone()).or_insert(decl);
    }

    let mut waiting_on: BTreeMap<String, BTreeSet<String>> = remaining
        .iter()
        .map(|(name, decl)| {
            let deps = decl
                .dependencies()
                .into_iter()
                .filter(|dep| remaining.contains_key(dep))
                .collect();
            (name.clone(), deps)
        })
        .collect();

    let mut ordered = Vec::with_capacity(remaining.len());
    while !waiting_on.is_empty() {
        let next = waiting_on
            .iter()
            .find(|(_, deps)| deps.is_empty())
            .or_else(|| waiting_on.iter().next())
            .map(|(name, _)| name.clone());
        let Some(next) = next else { break };

        waiting_on.remove(&next);
        for deps in waiting_on.values_mut() {
            deps.remove(&next);
        }
        if let Some(decl) = remaining.remove(&next) {
            ordered.push(decl);
        }
    }
    ordered
}

/// Render a module of declarations. `imported` holds the names brought in by
/// `imports`; declarations must already be ordered.
pub fn render_types_module(
    declarations: &[Declaration],
    imports: &[String],
    imported: &BTreeSet<String>,
) -> String {
    let mut out = module_header(imports);

    let mut known = imported.clone();
    let mut pending: BTreeSet<String> = declarations.iter().map(|d| d.name.clone()).collect();

    for decl in declarations {
        let scope = Scope {
            known: known.clone(),
            pending: pending.clone(),
        };
        out.push_str("\n\n");
        out.push_str(&render_declaration(decl, &scope));

        pending.remove(&decl.name);
        known.insert(decl.name.clone());
    }
    out
}

fn module_header(imports: &[String]) -> String {
    let mut out = format!("{}\n{}\n{}\n", HEADER, DATETIME_IMPORT, TYPING_IMPORTS);
    if !imports.is_empty() {
        out.push('\n');
        for import in imports {
            out.push_str(import);
            out.push('\n');
        }
    }
    out
}

/// Render one declaration: a `TypedDict` for records, an alias otherwise.
pub fn render_declaration(decl: &Declaration, scope: &Scope) -> String {
    let mut out = String::new();
    if let Some(origin) = &decl.origin {
        out.push_str(&format!("# From: {}\n", origin));
    }

    match &decl.node.kind {
        SchemaKind::Object {
            properties,
            required,
        } if decl.node.is_record() => {
            let fields: Vec<(String, String, Option<&str>)> = properties
                .iter()
                .map(|(name, prop)| {
                    let mut ann = annotation(prop, scope);
                    if !required.contains(name) {
                        ann = format!("Optional[{}]", ann);
                    }
                    (name.clone(), ann, prop.description.as_deref())
                })
                .collect();

            if fields.iter().all(|(name, _, _)| is_identifier(name)) {
                out.push_str(&format!("class {}(TypedDict, total=False):\n", decl.name));
                if let Some(description) = &decl.description {
                    out.push_str(&format!("    \"\"\"{}\"\"\"\n\n", docstring(description)));
                }
                for (name, ann, description) in fields {
                    match description {
                        Some(d) => out.push_str(&format!("    {}: {}  # {}\n", name, ann, one_line(d))),
                        None => out.push_str(&format!("    {}: {}\n", name, ann)),
                    }
                }
            } else {
                if let Some(description) = &decl.description {
                    out.push_str(&format!("# {}\n", one_line(description)));
                }
                let entries: Vec<String> = fields
                    .iter()
                    .map(|(name, ann, _)| format!("    {}: {},", literal(name), ann))
                    .collect();
                out.push_str(&format!(
                    "{} = TypedDict(\n    {},\n    {{\n{}\n    }},\n    total=False,\n)\n",
                    decl.name,
                    literal(&decl.name),
                    entries
                        .iter()
                        .map(|e| format!("    {}", e))
                        .collect::<Vec<_>>()
                        .join("\n"),
                ));
            }
        }
        _ => {
            if let Some(description) = &decl.description {
                out.push_str(&format!("# {}\n", one_line(description)));
            }
            let mut alias_scope = scope.clone();
            // an alias cannot refer to itself, even quoted
            alias_scope.pending.remove(&decl.name);
            alias_scope.known.remove(&decl.name);
            out.push_str(&format!(
                "{} = {}\n",
                decl.name,
                annotation(&decl.node, &alias_scope)
            ));
        }
    }
    out
}

/// A parameter of a rendered stub.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StubParameter {
    pub name: String,
    pub annotation: String,
    pub required: bool,
    pub description: String,
}

/// A callable stub for one operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stub {
    pub name: String,
    pub description: String,
    pub parameters: Vec<StubParameter>,
    pub returns: String,
    pub integration: String,
}

/// Render a stub module: header, imports, and the function.
pub fn render_stub(stub: &Stub, imports: &[String]) -> String {
    let mut out = module_header(imports);

    let ordered: Vec<&StubParameter> = stub
        .parameters
        .iter()
        .filter(|p| p.required)
        .chain(stub.parameters.iter().filter(|p| !p.required))
        .collect();

    let signature: Vec<String> = ordered
        .iter()
        .map(|p| {
            if p.required {
                format!("{}: {}", p.name, p.annotation)
            } else {
                format!("{}: Optional[{}] = None", p.name, p.annotation)
            }
        })
        .collect();

    out.push_str("\n\n");
    out.push_str(&format!(
        "def {}({}) -> {}:\n",
        python_identifier(&stub.name),
        signature.join(", "),
        stub.returns
    ));

    let mut doc = docstring(&stub.description);
    if doc.is_empty() {
        doc = format!("Run {}.", stub.name);
    }
    out.push_str(&format!("    \"\"\"{}\n", doc));
    if !ordered.is_empty() {
        out.push_str("\n    Args:\n");
        for p in &ordered {
            let description = one_line(&p.description);
            if description.is_empty() {
                out.push_str(&format!("        {}\n", p.name));
            } else {
                out.push_str(&format!("        {}: {}\n", p.name, docstring(&description)));
            }
        }
    }
    out.push_str("    \"\"\"\n");
    out.push_str(&format!(
        "    raise NotImplementedError({})\n",
        literal(&format!(
            "{} is provided by the {} integration runtime",
            stub.name, stub.integration
        ))
    ));
    out
}

/// `from <dots><module> import *`
pub fn star_import(dots: usize, module: &str) -> String {
    format!("from {}{} import *", ".".repeat(dots), module)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::resolve_root;
    use serde_json::json;

    fn node(raw: serde_json::Value) -> SchemaNode {
        resolve_root("T", &raw).node
    }

    // === Annotation Tests ===

    #[test]
    fn scalar_annotations() {
        assert_eq!(summary_annotation(&node(json!("string"))), "str");
        assert_eq!(summary_annotation(&node(json!("integer"))), "int");
        assert_eq!(summary_annotation(&node(json!("boolean"))), "bool");
        assert_eq!(
            summary_annotation(&node(json!({"type": "string", "format": "date-time"}))),
            "datetime"
        );
        assert_eq!(summary_annotation(&node(json!({"type": "widget"}))), "Any");
    }

    #[test]
    fn enum_renders_literal() {
        let n = node(json!({"type": "string", "enum": ["on", "off", "say \"hi\""]}));
        assert_eq!(
            summary_annotation(&n),
            r#"Literal["on", "off", "say \"hi\""]"#
        );
    }

    #[test]
    fn array_and_union() {
        let n = node(json!({"type": "array", "items": {"type": "integer"}}));
        assert_eq!(summary_annotation(&n), "List[int]");
        let n = node(json!({"type": "array"}));
        assert_eq!(summary_annotation(&n), "List[Any]");
        let n = node(json!({"oneOf": ["string", "integer", "string"]}));
        assert_eq!(summary_annotation(&n), "Union[str, int]");
        let n = node(json!({"type": "object", "properties": {"a": "string"}}));
        assert_eq!(summary_annotation(&n), "Dict[str, Any]");
    }

    #[test]
    fn reference_depends_on_scope() {
        let n = node(json!({
            "$ref": "#/definitions/Tag",
            "definitions": {"Tag": {"properties": {"k": "string"}}}
        }));
        assert_eq!(summary_annotation(&n), "Dict[str, Any]");

        let known = Scope::with_known(["Tag".to_string()].into_iter().collect());
        assert_eq!(annotation(&n, &known), "Tag");

        let pending = Scope {
            known: BTreeSet::new(),
            pending: ["Tag".to_string()].into_iter().collect(),
        };
        assert_eq!(annotation(&n, &pending), "\"Tag\"");
    }

    #[test]
    fn python_identifiers() {
        assert_eq!(python_identifier("class"), "class_");
        assert_eq!(python_identifier("Image Id"), "Image_Id");
        assert_eq!(python_identifier("2fa"), "_2fa");
        assert!(is_identifier("abc_1"));
        assert!(!is_identifier("a-b"));
        assert!(!is_identifier("from"));
    }

    // === Declaration Tests ===

    #[test]
    fn record_declaration() {
        let n = node(json!({
            "description": "A point",
            "required": ["x"],
            "properties": {
                "x": {"type": "integer", "description": "Horizontal\nposition"},
                "y": "integer"
            }
        }));
        let decl = Declaration::new("Point", n).origin("geo/Move.json");
        let text = render_declaration(&decl, &Scope::default());
        assert_eq!(
            text,
            "# From: geo/Move.json\n\
             class Point(TypedDict, total=False):\n    \"\"\"A point\"\"\"\n\n    \
             x: int  # Horizontal position\n    y: Optional[int]\n"
        );
    }

    #[test]
    fn docstring_escapes_closing_quotes() {
        assert_eq!(docstring("plain \"quoted\" text"), "plain \"quoted\" text");
        assert_eq!(docstring("defaults to \"auto\""), "defaults to \"auto\\\"");
        assert_eq!(docstring("a \"\"\" b"), "a \\\"\\\"\" b");
        assert_eq!(docstring("back\\slash"), "back\\\\slash");

        let n = node(json!({
            "description": "Mode, defaults to \"auto\"",
            "properties": {"mode": "string"}
        }));
        let text = render_declaration(&Declaration::new("Opts", n), &Scope::default());
        assert!(text.contains("    \"\"\"Mode, defaults to \"auto\\\"\"\"\"\n"));
        assert!(!text.contains("\"auto\"\"\"\""));
    }

    #[test]
    fn non_identifier_properties_use_functional_form() {
        let n = node(json!({"required": ["a-b"], "properties": {"a-b": "string", "class": "integer"}}));
        let text = render_declaration(&Declaration::new("Odd", n), &Scope::default());
        assert!(text.starts_with("Odd = TypedDict(\n    \"Odd\",\n"));
        assert!(text.contains("\"a-b\": str,"));
        assert!(text.contains("\"class\": Optional[int],"));
        assert!(text.ends_with("    total=False,\n)\n"));
    }

    #[test]
    fn non_record_is_alias() {
        let n = node(json!({"type": "array", "items": "string", "description": "Tags"}));
        let text = render_declaration(&Declaration::new("Tags", n), &Scope::default());
        assert_eq!(text, "# Tags\nTags = List[str]\n");
    }

    #[test]
    fn ordering_puts_dependencies_first() {
        let root = resolve_root(
            "Root",
            &json!({
                "properties": {"b": {"$ref": "#/definitions/B"}},
                "definitions": {
                    "A": {"properties": {"x": "string"}},
                    "B": {"properties": {"a": {"$ref": "#/definitions/A"}}}
                }
            }),
        )
        .node;
        let mut decls: Vec<Declaration> = root
            .definitions
            .iter()
            .map(|(name, def)| Declaration::new(name.clone(), def.clone()))
            .collect();
        decls.insert(0, Declaration::new("Root", root.clone()));

        let names: Vec<String> = order_declarations(decls).into_iter().map(|d| d.name).collect();
        assert_eq!(names, ["A", "B", "Root"]);
    }

    #[test]
    fn cycle_is_broken_and_quoted() {
        let root = resolve_root(
            "Root",
            &json!({
                "definitions": {
                    "A": {"properties": {"b": {"$ref": "#/definitions/B"}}},
                    "B": {"properties": {"a": {"$ref": "#/definitions/A"}}}
                }
            }),
        )
        .node;
        let decls: Vec<Declaration> = root
            .definitions
            .iter()
            .map(|(name, def)| Declaration::new(name.clone(), def.clone()))
            .collect();
        let ordered = order_declarations(decls);
        assert_eq!(ordered[0].name, "A");

        let text = render_types_module(&ordered, &[], &BTreeSet::new());
        assert!(text.contains("    b: Optional[\"B\"]\n"));
        assert!(text.contains("    a: Optional[A]\n"));
    }

    #[test]
    fn duplicate_names_keep_first() {
        let a = Declaration::new("T", node(json!("string")));
        let b = Declaration::new("T", node(json!("integer")));
        let ordered = order_declarations(vec![a, b]);
        assert_eq!(ordered.len(), 1);
        assert_eq!(ordered[0].node.kind, SchemaKind::String { format: None });
    }

    // === Stub Tests ===

    #[test]
    fn stub_orders_required_first() {
        let stub = Stub {
            name: "RunInstances".into(),
            description: "Launch instances".into(),
            parameters: vec![
                StubParameter {
                    name: "Options".into(),
                    annotation: "RunInstances_Options_Type".into(),
                    required: false,
                    description: String::new(),
                },
                StubParameter {
                    name: "ImageId".into(),
                    annotation: "str".into(),
                    required: true,
                    description: "AMI".into(),
                },
            ],
            returns: "RunInstances_Result_Type".into(),
            integration: "AWS".into(),
        };
        let text = render_stub(&stub, &[star_import(2, "_types.ec2.common_types")]);
        assert!(text.starts_with(HEADER));
        assert!(text.contains("\nfrom .._types.ec2.common_types import *\n"));
        assert!(text.contains(
            "def RunInstances(ImageId: str, Options: Optional[RunInstances_Options_Type] = None) -> RunInstances_Result_Type:\n"
        ));
        assert!(text.contains("    Args:\n        ImageId: AMI\n        Options\n"));
        assert!(text.ends_with(
            "    raise NotImplementedError(\"RunInstances is provided by the AWS integration runtime\")\n"
        ));
    }
}
