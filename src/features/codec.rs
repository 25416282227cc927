//! Feature Codec
//!
//! Maps raw example fields into a fixed-length numeric vector. The only
//! state is a learned vocabulary per categorical field and the most recent
//! value of every field (for `LastSeen` imputation).

use super::example::{Example, FieldValue};
use crate::error::{EngineError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// How a field is turned into numbers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    /// Single numeric column
    Numeric,
    /// Single 0/1 column
    Flag,
    /// One-hot block of `slots` columns; the last slot collects every value
    /// seen after the vocabulary is full
    Categorical { slots: usize },
}

impl FieldKind {
    /// Number of vector columns taken by the field
    pub fn width(&self) -> usize {
        match self {
            FieldKind::Numeric | FieldKind::Flag => 1,
            FieldKind::Categorical { slots } => *slots,
        }
    }

    fn expected(&self) -> &'static str {
        match self {
            FieldKind::Numeric => "numeric",
            FieldKind::Flag => "flag",
            FieldKind::Categorical { .. } => "categorical",
        }
    }
}

/// Default used when an optional field is absent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Imputation {
    /// Encode as all zeros
    #[default]
    Zero,
    /// Reuse the most recent observed value (zeros if none yet)
    LastSeen,
}

/// Description of one input field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    pub kind: FieldKind,
    pub required: bool,
    pub imputation: Imputation,
}

/// Ordered list of fields; order defines the vector layout
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureSchema {
    fields: Vec<FieldSpec>,
}

impl FeatureSchema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a field spec
    pub fn field(mut self, spec: FieldSpec) -> Self {
        self.fields.push(spec);
        self
    }

    /// Add a required numeric field
    pub fn numeric(self, name: &str) -> Self {
        self.field(FieldSpec {
            name: name.to_string(),
            kind: FieldKind::Numeric,
            required: true,
            imputation: Imputation::Zero,
        })
    }

    /// Add an optional numeric field
    pub fn optional_numeric(self, name: &str, imputation: Imputation) -> Self {
        self.field(FieldSpec {
            name: name.to_string(),
            kind: FieldKind::Numeric,
            required: false,
            imputation,
        })
    }

    /// Add a required categorical field with `slots` one-hot columns
    pub fn categorical(self, name: &str, slots: usize) -> Self {
        self.field(FieldSpec {
            name: name.to_string(),
            kind: FieldKind::Categorical { slots },
            required: true,
            imputation: Imputation::Zero,
        })
    }

    /// Add an optional categorical field
    pub fn optional_categorical(self, name: &str, slots: usize, imputation: Imputation) -> Self {
        self.field(FieldSpec {
            name: name.to_string(),
            kind: FieldKind::Categorical { slots },
            required: false,
            imputation,
        })
    }

    /// Add an optional boolean field
    pub fn optional_flag(self, name: &str, imputation: Imputation) -> Self {
        self.field(FieldSpec {
            name: name.to_string(),
            kind: FieldKind::Flag,
            required: false,
            imputation,
        })
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    /// Total vector width
    pub fn width(&self) -> usize {
        self.fields.iter().map(|f| f.kind.width()).sum()
    }

    /// Check the schema is usable
    pub fn validate(&self) -> Result<()> {
        if self.fields.is_empty() {
            return Err(EngineError::InvalidConfig("feature schema has no fields".into()));
        }

        let mut names = HashSet::new();
        for spec in &self.fields {
            if !names.insert(spec.name.as_str()) {
                return Err(EngineError::InvalidConfig(format!(
                    "duplicate field '{}' in feature schema",
                    spec.name
                )));
            }
            if let FieldKind::Categorical { slots } = spec.kind {
                if slots < 2 {
                    return Err(EngineError::InvalidConfig(format!(
                        "categorical field '{}' needs at least 2 slots, got {}",
                        spec.name, slots
                    )));
                }
            }
        }

        Ok(())
    }
}

/// Learned codec state
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CodecState {
    /// Categorical values in order of first appearance
    vocabulary: BTreeMap<String, Vec<String>>,
    /// Most recent observed value per field
    last_seen: BTreeMap<String, FieldValue>,
}

/// State changes an encoding would apply
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CodecDelta {
    new_categories: Vec<(String, String)>,
    last_seen: Vec<(String, FieldValue)>,
}

impl CodecDelta {
    pub fn is_empty(&self) -> bool {
        self.new_categories.is_empty() && self.last_seen.is_empty()
    }
}

/// Result of preparing an example
#[derive(Debug, Clone, PartialEq)]
pub struct Encoded {
    /// Fixed-length feature vector
    pub vector: Vec<f64>,
    /// Validated label
    pub label: Option<f64>,
    /// Validated sample weight
    pub weight: f64,
    /// Pending state changes
    pub delta: CodecDelta,
}

/// Feature codec
#[derive(Debug, Clone)]
pub struct FeatureCodec {
    schema: FeatureSchema,
    state: CodecState,
}

impl FeatureCodec {
    /// Create a codec with an empty vocabulary
    pub fn new(schema: FeatureSchema) -> Result<Self> {
        schema.validate()?;
        Ok(Self {
            schema,
            state: CodecState::default(),
        })
    }

    /// Create a codec with previously learned state
    pub fn with_state(schema: FeatureSchema, state: CodecState) -> Result<Self> {
        let mut codec = Self::new(schema)?;
        codec.state = state;
        Ok(codec)
    }

    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    pub fn state(&self) -> &CodecState {
        &self.state
    }

    /// Length of every encoded vector
    pub fn width(&self) -> usize {
        self.schema.width()
    }

    /// Encode an example and learn from it
    pub fn encode(&mut self, example: &Example) -> Result<Vec<f64>> {
        let encoded = self.prepare(example)?;
        self.commit(encoded.delta);
        Ok(encoded.vector)
    }

    /// Encode with the current state, without learning anything
    pub fn encode_readonly(&self, example: &Example) -> Result<Vec<f64>> {
        self.prepare(example).map(|encoded| encoded.vector)
    }

    /// Validate and encode an example without touching codec state.
    ///
    /// The returned delta must be passed to [`commit`](Self::commit) for the
    /// vocabulary and last-seen values to advance.
    pub fn prepare(&self, example: &Example) -> Result<Encoded> {
        let mut vector = Vec::with_capacity(self.width());
        let mut delta = CodecDelta::default();

        for spec in &self.schema.fields {
            match example.field(&spec.name) {
                Some(value) => {
                    self.encode_value(spec, value, &mut vector, &mut delta)?;
                    delta.last_seen.push((spec.name.clone(), value.clone()));
                }
                None if spec.required => {
                    return Err(EngineError::schema(&spec.name, "required field is missing"));
                }
                None => self.impute(spec, &mut vector),
            }
        }

        let label = match example.label() {
            Some(label) if !label.is_finite() => {
                return Err(EngineError::schema("label", format!("non-finite label {}", label)));
            }
            other => other,
        };

        let weight = example.weight();
        if !weight.is_finite() || weight <= 0.0 {
            return Err(EngineError::schema("weight", format!("weight must be positive, got {}", weight)));
        }

        Ok(Encoded {
            vector,
            label,
            weight,
            delta,
        })
    }

    /// Apply the state changes of a successful encoding
    pub fn commit(&mut self, delta: CodecDelta) {
        for (field, category) in delta.new_categories {
            let vocab = self.state.vocabulary.entry(field).or_default();
            if !vocab.contains(&category) {
                vocab.push(category);
            }
        }
        for (field, value) in delta.last_seen {
            self.state.last_seen.insert(field, value);
        }
    }

    fn encode_value(
        &self,
        spec: &FieldSpec,
        value: &FieldValue,
        out: &mut Vec<f64>,
        delta: &mut CodecDelta,
    ) -> Result<()> {
        match (spec.kind, value) {
            (FieldKind::Numeric, FieldValue::Numeric(x)) => {
                if !x.is_finite() {
                    return Err(EngineError::schema(&spec.name, format!("non-finite value {}", x)));
                }
                out.push(*x);
            }
            (FieldKind::Flag, FieldValue::Flag(b)) => out.push(if *b { 1.0 } else { 0.0 }),
            (FieldKind::Categorical { slots }, FieldValue::Categorical(category)) => {
                let index = match self.category_index(&spec.name, category, slots) {
                    Some(index) => index,
                    None => {
                        let known = self
                            .state
                            .vocabulary
                            .get(&spec.name)
                            .map_or(0, |v| v.len());
                        if known < slots - 1 {
                            delta.new_categories.push((spec.name.clone(), category.clone()));
                            known
                        } else {
                            slots - 1
                        }
                    }
                };
                push_one_hot(out, slots, Some(index));
            }
            (kind, other) => {
                return Err(EngineError::schema(
                    &spec.name,
                    format!("expected {}, found {}", kind.expected(), other.type_name()),
                ));
            }
        }
        Ok(())
    }

    /// Index of an already known category
    fn category_index(&self, field: &str, category: &str, slots: usize) -> Option<usize> {
        let vocab = self.state.vocabulary.get(field)?;
        vocab
            .iter()
            .position(|c| c == category)
            .map(|i| i.min(slots - 1))
    }

    fn impute(&self, spec: &FieldSpec, out: &mut Vec<f64>) {
        let previous = match spec.imputation {
            Imputation::Zero => None,
            Imputation::LastSeen => self.state.last_seen.get(&spec.name),
        };

        match (spec.kind, previous) {
            (FieldKind::Numeric, Some(FieldValue::Numeric(x))) => out.push(*x),
            (FieldKind::Flag, Some(FieldValue::Flag(b))) => out.push(if *b { 1.0 } else { 0.0 }),
            (FieldKind::Categorical { slots }, Some(FieldValue::Categorical(category))) => {
                let index = self
                    .category_index(&spec.name, category, slots)
                    .unwrap_or(slots - 1);
                push_one_hot(out, slots, Some(index));
            }
            (kind, _) => push_one_hot(out, kind.width(), None),
        }
    }
}

fn push_one_hot(out: &mut Vec<f64>, width: usize, hot: Option<usize>) {
    for i in 0..width {
        out.push(if Some(i) == hot { 1.0 } else { 0.0 });
    }
}
