//! Typed rows and the schema that validates them
//!
//! Row sources hand back open-ended key/value records. They are checked once
//! against a [`RowSchema`] at the source boundary so the rest of the engine
//! can rely on required fields being present.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A single source record: field name to scalar or JSON value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Row {
    fields: Map<String, Value>,
}

impl Row {
    /// Create an empty row.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a row from a JSON object map.
    #[must_use]
    pub const fn from_map(fields: Map<String, Value>) -> Self {
        Self { fields }
    }

    /// Create a row from a JSON value, which must be an object.
    ///
    /// # Errors
    ///
    /// Returns `Error::Row` if the value is not a JSON object.
    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Object(fields) => Ok(Self { fields }),
            other => Err(Error::Row(format!(
                "expected a JSON object, got {}",
                json_kind(&other)
            ))),
        }
    }

    /// Builder-style insert.
    #[must_use]
    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(field, value);
        self
    }

    /// Insert or replace a field value.
    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(field.into(), value.into());
    }

    /// Raw value of a field.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Whether the field is present (even if null).
    #[must_use]
    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    /// Field names in row order.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// Number of fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether the row has no fields.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Text form of a field.
    ///
    /// Missing and null fields yield `None`, as do strings that are empty
    /// after trimming. Numbers and booleans are rendered with `to_string`;
    /// arrays and objects with their compact JSON encoding.
    #[must_use]
    pub fn text(&self, field: &str) -> Option<String> {
        let text = match self.fields.get(field)? {
            Value::Null => return None,
            Value::String(s) => s.trim().to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => n.to_string(),
            other @ (Value::Array(_) | Value::Object(_)) => other.to_string(),
        };
        (!text.is_empty()).then_some(text)
    }

    /// Consume the row into its underlying map.
    #[must_use]
    pub fn into_map(self) -> Map<String, Value> {
        self.fields
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Declared required and optional fields for a table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowSchema {
    required: Vec<String>,
    optional: Vec<String>,
}

impl RowSchema {
    /// Create a schema with the given required fields.
    #[must_use]
    pub fn new<I, S>(required: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            required: required.into_iter().map(Into::into).collect(),
            optional: Vec::new(),
        }
    }

    /// Add optional fields.
    #[must_use]
    pub fn with_optional<I, S>(mut self, optional: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.optional.extend(optional.into_iter().map(Into::into));
        self
    }

    /// Required field names.
    #[must_use]
    pub fn required(&self) -> &[String] {
        &self.required
    }

    /// Optional field names.
    #[must_use]
    pub fn optional(&self) -> &[String] {
        &self.optional
    }

    /// Whether the schema declares the field at all.
    #[must_use]
    pub fn declares(&self, field: &str) -> bool {
        self.required.iter().chain(&self.optional).any(|f| f == field)
    }

    /// Check one row.
    ///
    /// # Errors
    ///
    /// Returns `Error::Row` naming the first missing required field.
    pub fn validate_row(&self, row: &Row) -> Result<()> {
        match self.required.iter().find(|field| !row.contains(field)) {
            Some(missing) => Err(Error::Row(format!(
                "missing required field '{missing}'"
            ))),
            None => Ok(()),
        }
    }

    /// Check a whole row set.
    ///
    /// An empty schema accepts everything. For a non-empty row set, a
    /// required field absent from every row is a data error (the caller
    /// named a field the table does not have). Rows missing a required field
    /// that other rows do carry are dropped and logged.
    ///
    /// # Errors
    ///
    /// Returns `Error::Data` if a required field is absent from all rows.
    pub fn validate(&self, table: &str, rows: Vec<Row>) -> Result<Vec<Row>> {
        if rows.is_empty() || self.required.is_empty() {
            return Ok(rows);
        }

        for field in &self.required {
            if !rows.iter().any(|row| row.contains(field)) {
                return Err(Error::Data(format!(
                    "unknown field '{field}' in table '{table}'"
                )));
            }
        }

        let total = rows.len();
        let valid: Vec<Row> = rows
            .into_iter()
            .filter(|row| self.validate_row(row).is_ok())
            .collect();

        let dropped = total - valid.len();
        if dropped > 0 {
            tracing::warn!(table, dropped, "dropped malformed rows missing required fields");
        }

        Ok(valid)
    }
}
