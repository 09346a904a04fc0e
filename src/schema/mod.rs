//! Response schema validation
//!
//! Validates provider response text as JSON against a caller-supplied
//! structural schema (a JSON-Schema-flavored subset: `type`, `properties`,
//! `required`, `items`, `enum`, `minimum`, `maximum`, `minLength`,
//! `minItems`). Numeric-looking strings are coerced where the schema
//! expects a number. Compiled schemas are cached by the sha2 digest of the
//! schema value, so repeated validation against the same schema never
//! recompiles.

use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::debug;

mod shapes;


pub use shapes::{extraction_schema, narrative_schema, packet_schema};

/// Outcome of validating a response against a schema
#[derive(Debug, Clone)]
pub struct Validation {
    /// Whether the content conformed to the schema
    pub valid: bool,
    /// Parsed (and coerced) payload; `None` on failure
    pub data: Option<Value>,
    /// Field-qualified failure messages; empty on success
    pub errors: Vec<String>,
}

impl Validation {
    fn ok(data: Value) -> Self {
        Self {
            valid: true,
            data: Some(data),
            errors: Vec::new(),
        }
    }

    fn fail(errors: Vec<String>) -> Self {
        Self {
            valid: false,
            data: None,
            errors,
        }
    }
}

/// Expected JSON type for a schema node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SchemaType {
    Object,
    Array,
    String,
    Number,
    Integer,
    Boolean,
}

impl SchemaType {
    fn parse(name: &str) -> Option<Self> {
        match name {
            "object" => Some(Self::Object),
            "array" => Some(Self::Array),
            "string" => Some(Self::String),
            "number" => Some(Self::Number),
            "integer" => Some(Self::Integer),
            "boolean" => Some(Self::Boolean),
            _ => None,
        }
    }

    fn name(self) -> &'static str {
        match self {
            Self::Object => "object",
            Self::Array => "array",
            Self::String => "string",
            Self::Number => "number",
            Self::Integer => "integer",
            Self::Boolean => "boolean",
        }
    }
}

/// A compiled schema node
#[derive(Debug, Default)]
struct SchemaNode {
    ty: Option<SchemaType>,
    properties: HashMap<String, SchemaNode>,
    required: Vec<String>,
    items: Option<Box<SchemaNode>>,
    enum_values: Option<Vec<Value>>,
    minimum: Option<f64>,
    maximum: Option<f64>,
    min_length: Option<usize>,
    min_items: Option<usize>,
}

impl SchemaNode {
    /// Compile a schema value into its internal tree. Unknown keywords are
    /// ignored so callers may pass richer JSON-Schema documents.
    fn compile(schema: &Value) -> Self {
        let mut node = Self::default();
        let Some(obj) = schema.as_object() else {
            return node;
        };

        node.ty = obj
            .get("type")
            .and_then(Value::as_str)
            .and_then(SchemaType::parse);
        if let Some(props) = obj.get("properties").and_then(Value::as_object) {
            node.properties = props
                .iter()
                .map(|(k, v)| (k.clone(), Self::compile(v)))
                .collect();
        }
        if let Some(required) = obj.get("required").and_then(Value::as_array) {
            node.required = required
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect();
        }
        if let Some(items) = obj.get("items") {
            node.items = Some(Box::new(Self::compile(items)));
        }
        if let Some(variants) = obj.get("enum").and_then(Value::as_array) {
            node.enum_values = Some(variants.clone());
        }
        node.minimum = obj.get("minimum").and_then(Value::as_f64);
        node.maximum = obj.get("maximum").and_then(Value::as_f64);
        node.min_length = obj
            .get("minLength")
            .and_then(Value::as_u64)
            .map(|n| n as usize);
        node.min_items = obj
            .get("minItems")
            .and_then(Value::as_u64)
            .map(|n| n as usize);
        node
    }

    /// Validate `value` against this node, coercing in place and appending
    /// field-qualified messages to `errors`.
    fn check(&self, value: &mut Value, path: &str, errors: &mut Vec<String>) {
        if let Some(ty) = self.ty {
            // Numeric coercion before the type check: a numeric-looking
            // string satisfies a number/integer schema.
            if matches!(ty, SchemaType::Number | SchemaType::Integer) {
                coerce_numeric(value, ty);
            }
            if !type_matches(ty, value) {
                errors.push(format!(
                    "{}: expected {}, got {}",
                    display_path(path),
                    ty.name(),
                    type_name(value)
                ));
                return;
            }
        }

        if let Some(variants) = &self.enum_values {
            if !variants.contains(value) {
                errors.push(format!(
                    "{}: expected one of {}, got {}",
                    display_path(path),
                    serde_json::to_string(variants).unwrap_or_default(),
                    value
                ));
                return;
            }
        }

        match value {
            Value::Object(map) => {
                for name in &self.required {
                    if !map.contains_key(name) {
                        if path.is_empty() {
                            errors.push(format!("missing required property '{name}'"));
                        } else {
                            errors.push(format!("{path}: missing required property '{name}'"));
                        }
                    }
                }
                for (name, child) in &self.properties {
                    if let Some(field) = map.get_mut(name) {
                        let child_path = join_path(path, name);
                        child.check(field, &child_path, errors);
                    }
                }
            }
            Value::Array(elements) => {
                if let Some(min) = self.min_items {
                    if elements.len() < min {
                        errors.push(format!(
                            "{}: fewer than {} items",
                            display_path(path),
                            min
                        ));
                    }
                }
                if let Some(item_schema) = &self.items {
                    for (i, element) in elements.iter_mut().enumerate() {
                        let child_path = format!("{}[{i}]", display_path(path));
                        item_schema.check(element, &child_path, errors);
                    }
                }
            }
            Value::String(s) => {
                if let Some(min) = self.min_length {
                    if s.chars().count() < min {
                        errors.push(format!(
                            "{}: shorter than minimum length {}",
                            display_path(path),
                            min
                        ));
                    }
                }
            }
            Value::Number(n) => {
                let v = n.as_f64().unwrap_or(0.0);
                if let Some(min) = self.minimum {
                    if v < min {
                        errors.push(format!(
                            "{}: value {} below minimum {}",
                            display_path(path),
                            v,
                            min
                        ));
                    }
                }
                if let Some(max) = self.maximum {
                    if v > max {
                        errors.push(format!(
                            "{}: value {} above maximum {}",
                            display_path(path),
                            v,
                            max
                        ));
                    }
                }
            }
            _ => {}
        }
    }
}

fn display_path(path: &str) -> &str {
    if path.is_empty() {
        "response"
    } else {
        path
    }
}

fn join_path(path: &str, name: &str) -> String {
    if path.is_empty() {
        name.to_string()
    } else {
        format!("{path}.{name}")
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn type_matches(ty: SchemaType, value: &Value) -> bool {
    match ty {
        SchemaType::Object => value.is_object(),
        SchemaType::Array => value.is_array(),
        SchemaType::String => value.is_string(),
        SchemaType::Number => value.is_number(),
        SchemaType::Integer => value.is_i64() || value.is_u64(),
        SchemaType::Boolean => value.is_boolean(),
    }
}

/// Replace a numeric-looking string with the number it spells.
fn coerce_numeric(value: &mut Value, ty: SchemaType) {
    let Value::String(s) = &*value else { return };
    let trimmed = s.trim();
    match ty {
        SchemaType::Integer => {
            if let Ok(n) = trimmed.parse::<i64>() {
                *value = Value::from(n);
            }
        }
        SchemaType::Number => {
            if let Ok(n) = trimmed.parse::<i64>() {
                *value = Value::from(n);
            } else if let Ok(f) = trimmed.parse::<f64>() {
                if let Some(n) = serde_json::Number::from_f64(f) {
                    *value = Value::Number(n);
                }
            }
        }
        _ => {}
    }
}

/// Validator with a compiled-schema cache
///
/// Cheap to share behind an `Arc`; the cache is keyed by a structural hash
/// of the schema value, so structurally identical schemas built at
/// different call sites share one compiled entry.
#[derive(Debug, Default)]
pub struct SchemaValidator {
    cache: RwLock<HashMap<[u8; 32], Arc<SchemaNode>>>,
}

impl SchemaValidator {
    /// Create a validator with an empty cache
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct schemas compiled so far
    #[must_use]
    pub fn cached_schemas(&self) -> usize {
        self.cache.read().map(|c| c.len()).unwrap_or(0)
    }

    /// Validate response `content` against an optional schema.
    ///
    /// With no schema every input is valid and `data` is the raw text.
    /// Content that fails to parse as JSON yields exactly
    /// `errors == ["Invalid JSON format"]`.
    #[must_use]
    pub fn validate_response(&self, content: &str, schema: Option<&Value>) -> Validation {
        let Some(schema) = schema else {
            return Validation::ok(Value::String(content.to_string()));
        };

        let Ok(mut parsed) = serde_json::from_str::<Value>(content) else {
            return Validation::fail(vec!["Invalid JSON format".to_string()]);
        };

        let compiled = self.compiled(schema);
        let mut errors = Vec::new();
        compiled.check(&mut parsed, "", &mut errors);

        if errors.is_empty() {
            Validation::ok(parsed)
        } else {
            Validation::fail(errors)
        }
    }

    /// Fetch the compiled form of `schema`, compiling on first use.
    fn compiled(&self, schema: &Value) -> Arc<SchemaNode> {
        let key = schema_digest(schema);

        if let Ok(cache) = self.cache.read() {
            if let Some(node) = cache.get(&key) {
                return Arc::clone(node);
            }
        }

        let node = Arc::new(SchemaNode::compile(schema));
        debug!("Compiled response schema");
        if let Ok(mut cache) = self.cache.write() {
            cache.entry(key).or_insert_with(|| Arc::clone(&node));
        }
        node
    }
}

/// Structural hash of a schema value
fn schema_digest(schema: &Value) -> [u8; 32] {
    let bytes = serde_json::to_vec(schema).unwrap_or_default();
    let digest = Sha256::digest(&bytes);
    digest.into()
}
