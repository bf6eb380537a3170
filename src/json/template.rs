use serde_json::{Map, Value};

use crate::error::LLMError;

/// Shallow shape description used to accept or drop parsed objects.
///
/// Templates are written as JSON: an object whose values are type tags (`"string"`,
/// `"number"`, `"integer"`, `"boolean"`), nested objects, or single-element arrays
/// meaning "array whose members all match this shape".
///
/// # Examples
///
/// ```
/// use llmeasy::json::Template;
/// use serde_json::json;
///
/// let template = Template::from_value(&json!({
///     "name": "string",
///     "year_created": "number",
///     "paradigm": ["string"]
/// }))
/// .unwrap();
///
/// assert!(template.matches(&json!({
///     "name": "Rust",
///     "year_created": 2015,
///     "paradigm": ["systems", "functional"],
///     "extra": null
/// })));
/// assert!(!template.matches(&json!({"name": "Rust", "year_created": "2015"})));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum Template {
    String,
    Number,
    Integer,
    Boolean,
    /// Named fields that must all be present; extra fields are allowed.
    Object(Vec<(String, Template)>),
    /// Every member must match the inner shape.
    Array(Box<Template>),
}

impl Template {
    /// Builds a template from its JSON description. The root must be an object.
    ///
    /// # Errors
    ///
    /// Returns [`LLMError::InvalidTemplate`] naming the offending node when a tag is
    /// unknown, an array does not hold exactly one element, or a node is neither a tag,
    /// an object nor an array.
    pub fn from_value(value: &Value) -> Result<Self, LLMError> {
        match value {
            Value::Object(fields) => Self::parse_object(fields, "$"),
            _ => Err(LLMError::invalid_template(
                "$",
                "template root must be an object",
            )),
        }
    }

    fn parse_object(fields: &Map<String, Value>, path: &str) -> Result<Self, LLMError> {
        fields
            .iter()
            .map(|(name, node)| {
                let child = Self::parse_node(node, &format!("{path}.{name}"))?;
                Ok((name.clone(), child))
            })
            .collect::<Result<Vec<_>, LLMError>>()
            .map(Template::Object)
    }

    fn parse_node(node: &Value, path: &str) -> Result<Self, LLMError> {
        match node {
            Value::String(tag) => match tag.as_str() {
                "string" => Ok(Self::String),
                "number" => Ok(Self::Number),
                "integer" => Ok(Self::Integer),
                "boolean" => Ok(Self::Boolean),
                other => Err(LLMError::invalid_template(
                    path,
                    format!("unknown type tag {other:?}"),
                )),
            },
            Value::Object(fields) => Self::parse_object(fields, path),
            Value::Array(items) => match items.as_slice() {
                [inner] => Ok(Self::Array(Box::new(Self::parse_node(
                    inner,
                    &format!("{path}[]"),
                )?))),
                _ => Err(LLMError::invalid_template(
                    path,
                    format!(
                        "array templates need exactly one element, found {}",
                        items.len()
                    ),
                )),
            },
            other => Err(LLMError::invalid_template(
                path,
                format!("expected a type tag, object or array, found {other}"),
            )),
        }
    }

    /// Recursively checks presence of every named field and its runtime type.
    pub fn matches(&self, value: &Value) -> bool {
        match (self, value) {
            (Self::String, Value::String(_)) => true,
            (Self::Number, Value::Number(_)) => true,
            (Self::Integer, Value::Number(n)) => n.is_i64() || n.is_u64(),
            (Self::Boolean, Value::Bool(_)) => true,
            (Self::Object(fields), Value::Object(object)) => fields
                .iter()
                .all(|(name, shape)| object.get(name).is_some_and(|v| shape.matches(v))),
            (Self::Array(inner), Value::Array(items)) => items.iter().all(|v| inner.matches(v)),
            _ => false,
        }
    }

    /// Renders the template back into its JSON description.
    pub fn to_value(&self) -> Value {
        match self {
            Self::String => Value::from("string"),
            Self::Number => Value::from("number"),
            Self::Integer => Value::from("integer"),
            Self::Boolean => Value::from("boolean"),
            Self::Object(fields) => Value::Object(
                fields
                    .iter()
                    .map(|(name, shape)| (name.clone(), shape.to_value()))
                    .collect(),
            ),
            Self::Array(inner) => Value::Array(vec![inner.to_value()]),
        }
    }
}

impl TryFrom<Value> for Template {
    type Error = LLMError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        Self::from_value(&value)
    }
}
