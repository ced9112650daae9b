//! Core types shared by the resolver, extractor, registry and emitter.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::PathBuf;

use serde::Serialize;
use serde_json::Value;

/// Maximum number of properties resolved per object node.
pub const MAX_PROPERTIES: usize = 100;

/// Maximum number of `oneOf` variants resolved per union node.
pub const MAX_UNION_VARIANTS: usize = 5;

/// `oneOf` lists this long or longer are not expanded at all.
pub const MAX_UNION_CANDIDATES: usize = 10;

/// Maximum number of nested `definitions` resolved per root node.
pub const MAX_DEFINITIONS: usize = 50;

/// Maximum number of literals kept for an enumeration.
pub const MAX_ENUM_VALUES: usize = 100;

/// Returns the JSON type name for diagnostics.
pub fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Replace every character outside `[A-Za-z0-9_]` with an underscore and
/// prefix a leading digit with one, so the result is usable as a Python class
/// or module name.
pub fn sanitize_name(name: &str) -> String {
    let mut sanitized: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    if sanitized.starts_with(|c: char| c.is_ascii_digit()) {
        sanitized.insert(0, '_');
    }
    sanitized
}

/// Service owning a module path: the second segment, or the whole path
/// when it has a single segment (`"AWS.ec2.vpc"` -> `"ec2"`, `"AWS"` -> `"AWS"`).
pub fn service_of(module_path: &str) -> &str {
    module_path.split('.').nth(1).unwrap_or(module_path)
}

/// Payload-free tag of a [`SchemaKind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TypeTag {
    String,
    Timestamp,
    Enum,
    Integer,
    Boolean,
    Array,
    Object,
    Reference,
    Union,
    Any,
}

impl TypeTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            TypeTag::String => "string",
            TypeTag::Timestamp => "timestamp",
            TypeTag::Enum => "enum",
            TypeTag::Integer => "integer",
            TypeTag::Boolean => "boolean",
            TypeTag::Array => "array",
            TypeTag::Object => "object",
            TypeTag::Reference => "reference",
            TypeTag::Union => "union",
            TypeTag::Any => "any",
        }
    }

    /// Object and array shapes get their own registered declaration.
    pub fn is_complex(&self) -> bool {
        matches!(self, TypeTag::Object | TypeTag::Array)
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of a resolved schema node, with the fields that only exist for that kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaKind {
    String {
        format: Option<String>,
    },
    /// A string with `format: date-time`.
    Timestamp,
    /// A string restricted to a closed, ordered set of literals.
    Enum {
        values: Vec<String>,
    },
    /// `integer` and `number` alike.
    Integer,
    Boolean,
    Array {
        items: Option<Box<SchemaNode>>,
    },
    Object {
        properties: BTreeMap<String, SchemaNode>,
        required: BTreeSet<String>,
    },
    /// A `$ref` into the root's definitions. Only the target's kind and format
    /// are carried; its structure is declared once under the target's name.
    Reference {
        target: String,
        resolved: TypeTag,
        format: Option<String>,
    },
    Union {
        variants: Vec<SchemaNode>,
    },
    /// Unknown, untyped, unresolvable or cyclic.
    Any,
}

impl SchemaKind {
    pub fn tag(&self) -> TypeTag {
        match self {
            SchemaKind::String { .. } => TypeTag::String,
            SchemaKind::Timestamp => TypeTag::Timestamp,
            SchemaKind::Enum { .. } => TypeTag::Enum,
            SchemaKind::Integer => TypeTag::Integer,
            SchemaKind::Boolean => TypeTag::Boolean,
            SchemaKind::Array { .. } => TypeTag::Array,
            SchemaKind::Object { .. } => TypeTag::Object,
            SchemaKind::Reference { .. } => TypeTag::Reference,
            SchemaKind::Union { .. } => TypeTag::Union,
            SchemaKind::Any => TypeTag::Any,
        }
    }
}

/// A schema node after resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaNode {
    pub name: String,
    pub description: Option<String>,
    pub kind: SchemaKind,
    /// Nested definitions; only populated on root nodes.
    pub definitions: BTreeMap<String, SchemaNode>,
}

impl SchemaNode {
    pub fn new(name: impl Into<String>, kind: SchemaKind) -> Self {
        Self {
            name: name.into(),
            description: None,
            kind,
            definitions: BTreeMap::new(),
        }
    }

    /// Placeholder used for cycles and anything that cannot be resolved.
    pub fn any(name: impl Into<String>) -> Self {
        Self::new(name, SchemaKind::Any)
    }

    pub fn with_description(mut self, description: Option<String>) -> Self {
        self.description = description.filter(|d| !d.is_empty());
        self
    }

    pub fn tag(&self) -> TypeTag {
        self.kind.tag()
    }

    /// Tag after following a top-level reference.
    pub fn effective_tag(&self) -> TypeTag {
        match &self.kind {
            SchemaKind::Reference { resolved, .. } => *resolved,
            other => other.tag(),
        }
    }

    /// True when the node needs a registered declaration of its own.
    pub fn is_complex(&self) -> bool {
        self.effective_tag().is_complex()
    }

    /// Whether this node renders as a record declaration.
    pub fn is_record(&self) -> bool {
        matches!(&self.kind, SchemaKind::Object { properties, .. } if !properties.is_empty())
    }

    /// Names of every definition this node refers to, at any depth.
    pub fn references(&self) -> BTreeSet<String> {
        let mut out = BTreeSet::new();
        collect_references(self, &mut out);
        out
    }
}

fn collect_references(node: &SchemaNode, out: &mut BTreeSet<String>) {
    match &node.kind {
        SchemaKind::Reference { target, .. } => {
            out.insert(target.clone());
        }
        SchemaKind::Array { items: Some(items) } => collect_references(items, out),
        SchemaKind::Object { properties, .. } => {
            for property in properties.values() {
                collect_references(property, out);
            }
        }
        SchemaKind::Union { variants } => {
            for variant in variants {
                collect_references(variant, out);
            }
        }
        _ => {}
    }
}

/// Which variable of a definition file a type was taken from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "slot", content = "variable", rename_all = "lowercase")]
pub enum VariableSlot {
    /// An input variable, by its declared (unsanitized) name.
    Input(String),
    /// The output variable.
    Output,
}

/// Handle back to the definition a type was extracted from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct SourceLocation {
    pub path: PathBuf,
    pub slot: VariableSlot,
}

/// An input or output variable of an operation.
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    /// Identifier-safe name.
    pub name: String,
    /// Name as declared in the definition file.
    pub variable: String,
    /// Resolved type; `None` for untyped variables.
    pub schema: Option<SchemaNode>,
    pub required: bool,
    pub description: String,
}

/// One callable unit, sourced from one definition file.
#[derive(Debug, Clone, PartialEq)]
pub struct Operation {
    pub name: String,
    /// Dot-separated path, e.g. `AWS.ec2`.
    pub module_path: String,
    pub parameters: Vec<Parameter>,
    /// The output variable; `None` when the flow returns nothing.
    pub output: Option<Parameter>,
    pub description: String,
    pub source: PathBuf,
}

impl Operation {
    /// Registry key: `<module_path>.<name>`.
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.module_path, self.name)
    }

    pub fn service(&self) -> &str {
        service_of(&self.module_path)
    }

    /// Registered name of an input parameter's type.
    pub fn parameter_type_name(&self, parameter: &Parameter) -> String {
        sanitize_name(&format!("{}_{}_Type", self.name, parameter.name))
    }

    /// Registered name of the return type.
    pub fn result_type_name(&self) -> String {
        sanitize_name(&format!("{}_Result_Type", self.name))
    }
}

/// Target language of the generated declarations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Language {
    #[default]
    Python,
}

impl Language {
    /// Parse a language selector. Returns `None` for unsupported languages.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "python" | "py" => Some(Language::Python),
            _ => None,
        }
    }
}

/// Options for one generation run.
#[derive(Debug, Clone)]
pub struct GenerateOptions {
    /// Integration name, e.g. `AWS`.
    pub integration: String,
    /// Unpacked package directory containing `flows/<integration>`.
    pub source: PathBuf,
    /// Destination directory; the package lands in `<out_dir>/<integration>`.
    pub out_dir: PathBuf,
    pub language: Language,
}

impl GenerateOptions {
    pub fn new(
        integration: impl Into<String>,
        source: impl Into<PathBuf>,
        out_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            integration: integration.into(),
            source: source.into(),
            out_dir: out_dir.into(),
            language: Language::default(),
        }
    }

    pub fn language(mut self, language: Language) -> Self {
        self.language = language;
        self
    }
}
