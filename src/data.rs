use std::fmt;
use std::str::FromStr;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use crate::types::FieldName;

/// One dataset record: an opaque, field-ordered JSON object.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DataRecord {
    fields: IndexMap<FieldName, Value>,
}

impl DataRecord {
    /// Build a record from ordered fields.
    pub fn new(fields: IndexMap<FieldName, Value>) -> Self {
        Self { fields }
    }

    /// Parse one JSONL line. The line must hold a JSON object.
    pub fn from_json_line(line: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(line.trim())
    }

    /// Serialize as a single JSONL line (no trailing newline).
    pub fn to_json_line(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Fields in source order.
    pub fn fields(&self) -> &IndexMap<FieldName, Value> {
        &self.fields
    }

    /// Look up one field.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// True if the record has no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl FromIterator<(FieldName, Value)> for DataRecord {
    fn from_iter<T: IntoIterator<Item = (FieldName, Value)>>(iter: T) -> Self {
        Self {
            fields: iter.into_iter().collect(),
        }
    }
}

/// Structural kind of a field value, used for schema comparison.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum FieldKind {
    /// JSON `null`, or a field absent from some records.
    Null,
    /// JSON boolean.
    Bool,
    /// Number without a fractional part.
    Integer,
    /// Number with a fractional part.
    Float,
    /// JSON string.
    String,
    /// Homogeneous list; `List(Null)` is an empty or all-null list.
    List(Box<FieldKind>),
    /// Nested JSON object.
    Object,
    /// Values of incompatible kinds were observed.
    Mixed,
}

impl FieldKind {
    /// Kind of a single JSON value.
    pub fn of(value: &Value) -> Self {
        match value {
            Value::Null => FieldKind::Null,
            Value::Bool(_) => FieldKind::Bool,
            Value::Number(number) => {
                if number.is_i64() || number.is_u64() {
                    FieldKind::Integer
                } else {
                    FieldKind::Float
                }
            }
            Value::String(_) => FieldKind::String,
            Value::Array(items) => FieldKind::List(Box::new(
                items
                    .iter()
                    .map(FieldKind::of)
                    .fold(FieldKind::Null, FieldKind::merge),
            )),
            Value::Object(_) => FieldKind::Object,
        }
    }

    /// Widest kind covering both inputs.
    pub fn merge(self, other: FieldKind) -> FieldKind {
        match (self, other) {
            (left, right) if left == right => left,
            (FieldKind::Null, kind) | (kind, FieldKind::Null) => kind,
            (FieldKind::Integer, FieldKind::Float) | (FieldKind::Float, FieldKind::Integer) => {
                FieldKind::Float
            }
            (FieldKind::List(left), FieldKind::List(right)) => {
                FieldKind::List(Box::new(left.merge(*right)))
            }
            _ => FieldKind::Mixed,
        }
    }

    /// True if values of `self` could have been drawn from a column of kind `expected`.
    pub fn is_compatible_with(&self, expected: &FieldKind) -> bool {
        self.clone().merge(expected.clone()) == *expected
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldKind::Null => write!(f, "null"),
            FieldKind::Bool => write!(f, "bool"),
            FieldKind::Integer => write!(f, "integer"),
            FieldKind::Float => write!(f, "float"),
            FieldKind::String => write!(f, "string"),
            FieldKind::List(inner) => write!(f, "list<{inner}>"),
            FieldKind::Object => write!(f, "object"),
            FieldKind::Mixed => write!(f, "mixed"),
        }
    }
}

impl FromStr for FieldKind {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let trimmed = raw.trim();
        if let Some(inner) = trimmed
            .strip_prefix("list<")
            .and_then(|rest| rest.strip_suffix('>'))
        {
            return Ok(FieldKind::List(Box::new(inner.parse()?)));
        }
        match trimmed {
            "null" => Ok(FieldKind::Null),
            "bool" => Ok(FieldKind::Bool),
            "integer" => Ok(FieldKind::Integer),
            "float" => Ok(FieldKind::Float),
            "string" => Ok(FieldKind::String),
            "object" => Ok(FieldKind::Object),
            "mixed" => Ok(FieldKind::Mixed),
            other => Err(format!("unknown field kind '{other}'")),
        }
    }
}

impl From<FieldKind> for String {
    fn from(kind: FieldKind) -> Self {
        kind.to_string()
    }
}

impl TryFrom<String> for FieldKind {
    type Error = String;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        raw.parse()
    }
}

/// Field names and merged kinds observed across a set of records.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Schema {
    fields: IndexMap<FieldName, FieldKind>,
}

impl Schema {
    /// Infer a schema from records.
    pub fn from_records<'a, I>(records: I) -> Self
    where
        I: IntoIterator<Item = &'a DataRecord>,
    {
        let mut schema = Schema::default();
        for record in records {
            schema.observe(record);
        }
        schema
    }

    /// Merge one record's fields into the schema.
    pub fn observe(&mut self, record: &DataRecord) {
        for (name, value) in record.fields() {
            let kind = FieldKind::of(value);
            match self.fields.get_mut(name) {
                Some(existing) => {
                    let merged = existing.clone().merge(kind);
                    *existing = merged;
                }
                None => {
                    self.fields.insert(name.clone(), kind);
                }
            }
        }
    }

    /// Merge another schema into this one.
    pub fn absorb(&mut self, other: Schema) {
        for (name, kind) in other.fields {
            match self.fields.get_mut(&name) {
                Some(existing) => {
                    let merged = existing.clone().merge(kind);
                    *existing = merged;
                }
                None => {
                    self.fields.insert(name, kind);
                }
            }
        }
    }

    /// Kind of a field, if present.
    pub fn get(&self, name: &str) -> Option<&FieldKind> {
        self.fields.get(name)
    }

    /// Field names in first-seen order.
    pub fn field_names(&self) -> Vec<&str> {
        self.fields.keys().map(String::as_str).collect()
    }

    /// Iterate `(name, kind)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&FieldName, &FieldKind)> {
        self.fields.iter()
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// True if no fields were observed.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}
