//! List item field values and their flattening to display strings.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::{Number, Value};

/// A scalar field value.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Null,
    Bool(bool),
    Number(Number),
    Text(String),
}

/// A list item field value as returned by the API.
///
/// Person and lookup columns arrive as records, multi-value columns as
/// sequences; everything else is a scalar.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(from = "Value")]
pub enum FieldValue {
    Scalar(Scalar),
    Record(BTreeMap<String, FieldValue>),
    Sequence(Vec<FieldValue>),
}

impl From<Value> for FieldValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => FieldValue::Scalar(Scalar::Null),
            Value::Bool(b) => FieldValue::Scalar(Scalar::Bool(b)),
            Value::Number(n) => FieldValue::Scalar(Scalar::Number(n)),
            Value::String(s) => FieldValue::Scalar(Scalar::Text(s)),
            Value::Array(items) => {
                FieldValue::Sequence(items.into_iter().map(FieldValue::from).collect())
            }
            Value::Object(map) => FieldValue::Record(
                map.into_iter()
                    .map(|(k, v)| (k, FieldValue::from(v)))
                    .collect(),
            ),
        }
    }
}

impl From<&FieldValue> for Value {
    fn from(value: &FieldValue) -> Self {
        match value {
            FieldValue::Scalar(Scalar::Null) => Value::Null,
            FieldValue::Scalar(Scalar::Bool(b)) => Value::Bool(*b),
            FieldValue::Scalar(Scalar::Number(n)) => Value::Number(n.clone()),
            FieldValue::Scalar(Scalar::Text(s)) => Value::String(s.clone()),
            FieldValue::Sequence(items) => Value::Array(items.iter().map(Value::from).collect()),
            FieldValue::Record(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), Value::from(v)))
                    .collect(),
            ),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::Scalar(Scalar::Text(s.to_string()))
    }
}

/// Sub-fields tried, in order, when reducing a record.
const RECORD_LABEL_KEYS: [&str; 2] = ["LookupValue", "Email"];

/// Separator between normalized sequence elements.
const SEQUENCE_SEPARATOR: &str = "; ";

/// Reduce a field value to a single display string.
pub fn normalize_value(value: &FieldValue) -> String {
    match value {
        FieldValue::Scalar(scalar) => render_scalar(scalar),
        FieldValue::Record(map) => RECORD_LABEL_KEYS
            .iter()
            .filter_map(|key| map.get(*key))
            .map(normalize_value)
            .find(|label| !label.is_empty())
            .unwrap_or_else(|| Value::from(value).to_string()),
        FieldValue::Sequence(items) => items
            .iter()
            .map(normalize_value)
            .collect::<Vec<_>>()
            .join(SEQUENCE_SEPARATOR),
    }
}

fn render_scalar(scalar: &Scalar) -> String {
    match scalar {
        Scalar::Null => String::new(),
        Scalar::Bool(b) => b.to_string(),
        Scalar::Number(n) => n.to_string(),
        Scalar::Text(s) => s.clone(),
    }
}
