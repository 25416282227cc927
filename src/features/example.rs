//! Stream examples
//!
//! An example is an ordered set of named raw fields, an optional label and
//! its position in the stream.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Raw value of a single example field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldValue {
    Numeric(f64),
    Categorical(String),
    Flag(bool),
}

impl FieldValue {
    /// Name of the value type, used in schema error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            FieldValue::Numeric(_) => "numeric",
            FieldValue::Categorical(_) => "categorical",
            FieldValue::Flag(_) => "flag",
        }
    }
}

/// A single stream example
///
/// Examples are built once and never mutated afterwards; the engine only
/// reads them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Example {
    /// Arrival sequence number
    seq: u64,
    /// Arrival time
    timestamp: DateTime<Utc>,
    /// Raw fields by name
    fields: BTreeMap<String, FieldValue>,
    /// Target value, if known
    label: Option<f64>,
    /// Importance of the example when learning from it
    weight: f64,
}

impl Example {
    /// Create an empty, unlabeled example arriving now
    pub fn new(seq: u64) -> Self {
        Self {
            seq,
            timestamp: Utc::now(),
            fields: BTreeMap::new(),
            label: None,
            weight: 1.0,
        }
    }

    /// Set the arrival time
    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Add or replace a field
    pub fn with_field(mut self, name: impl Into<String>, value: FieldValue) -> Self {
        self.fields.insert(name.into(), value);
        self
    }

    /// Add a numeric field
    pub fn with_numeric(self, name: impl Into<String>, value: f64) -> Self {
        self.with_field(name, FieldValue::Numeric(value))
    }

    /// Add a categorical field
    pub fn with_category(self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.with_field(name, FieldValue::Categorical(value.into()))
    }

    /// Add a boolean field
    pub fn with_flag(self, name: impl Into<String>, value: bool) -> Self {
        self.with_field(name, FieldValue::Flag(value))
    }

    /// Attach a label
    pub fn with_label(mut self, label: f64) -> Self {
        self.label = Some(label);
        self
    }

    /// Set the sample weight (default 1.0)
    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }

    pub fn seq(&self) -> u64 {
        self.seq
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn label(&self) -> Option<f64> {
        self.label
    }

    pub fn weight(&self) -> f64 {
        self.weight
    }

    pub fn is_labeled(&self) -> bool {
        self.label.is_some()
    }

    /// Look up a field by name
    pub fn field(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    /// Iterate over fields in name order
    pub fn fields(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }
}
