//! Form Input Record parsing and validation

use crate::error::{FillError, Result};
use serde_json::{Map, Value};

/// User-supplied form data: a JSON object keyed by semantic field name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FormInput {
    values: Map<String, Value>,
}

impl FormInput {
    /// Parse JSON text. Anything but an object is rejected.
    pub fn parse(text: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(text).map_err(FillError::InvalidJson)?;
        Self::from_value(value)
    }

    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Object(values) => Ok(Self { values }),
            other => Err(FillError::NotAnObject(json_kind(&other))),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Value of `key` rendered as field text; absent keys read as "".
    pub fn text(&self, key: &str) -> String {
        self.values.get(key).map(render_value).unwrap_or_default()
    }

    /// Whether `key` is present and truthy.
    pub fn flag(&self, key: &str) -> bool {
        self.values.get(key).is_some_and(is_truthy)
    }

    /// Required keys that are absent or falsy, in the order given.
    pub fn missing<'a, I>(&self, required: I) -> Vec<String>
    where
        I: IntoIterator<Item = &'a String>,
    {
        required
            .into_iter()
            .filter(|key| !self.flag(key))
            .cloned()
            .collect()
    }

    /// Fail with [`FillError::MissingFields`] unless every required key is set.
    pub fn validate<'a, I>(&self, required: I) -> Result<()>
    where
        I: IntoIterator<Item = &'a String>,
    {
        let missing = self.missing(required);
        if missing.is_empty() {
            Ok(())
        } else {
            Err(FillError::MissingFields(missing))
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Falsy: `false`, `null`, `0`, `""`, `[]` and `{}`.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

fn render_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        compound => compound.to_string(),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
