//! Synthetic stream
//!
//! Seeded generator of labeled examples drawn from a sequence of concepts,
//! used to exercise drift detection and adaptation end to end.

use crate::features::{Example, FeatureSchema, Imputation};
use chrono::{DateTime, Duration, TimeZone, Utc};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Normal, StandardNormal};

/// Categories of the uninformative `venue` field
const VENUES: [&str; 4] = ["lse", "nyse", "tse", "xetra"];

/// One stationary segment of the stream
///
/// Numeric features `x0..xn` are standard normal. The label is
/// `1` when `weights · x + bias > 0` (classification) or the linear score
/// itself (regression), with `noise` as the flip probability or the standard
/// deviation of additive noise respectively.
#[derive(Debug, Clone, PartialEq)]
pub struct Concept {
    pub weights: Vec<f64>,
    pub bias: f64,
    /// Examples generated from this concept
    pub length: usize,
    pub noise: f64,
}

impl Concept {
    pub fn new(weights: Vec<f64>, length: usize) -> Self {
        Self {
            weights,
            bias: 0.0,
            length,
            noise: 0.0,
        }
    }

    pub fn with_bias(mut self, bias: f64) -> Self {
        self.bias = bias;
        self
    }

    pub fn with_noise(mut self, noise: f64) -> Self {
        self.noise = noise;
        self
    }

    fn score(&self, x: &[f64]) -> f64 {
        self.weights.iter().zip(x).map(|(w, xi)| w * xi).sum::<f64>() + self.bias
    }
}

/// Stream generator over a sequence of concepts
#[derive(Debug, Clone)]
pub struct SyntheticStream {
    concepts: Vec<Concept>,
    n_features: usize,
    regression: bool,
    rng: ChaCha8Rng,
    /// Next sequence number
    position: u64,
    start: DateTime<Utc>,
}

impl SyntheticStream {
    /// Create a classification stream; every concept must have the same
    /// number of weights
    pub fn new(concepts: Vec<Concept>, seed: u64) -> Self {
        let n_features = concepts.first().map_or(0, |c| c.weights.len());
        let start = Utc
            .timestamp_opt(1_704_067_200, 0)
            .single()
            .unwrap_or_else(Utc::now);

        Self {
            concepts,
            n_features,
            regression: false,
            rng: ChaCha8Rng::seed_from_u64(seed),
            position: 0,
            start,
        }
    }

    /// Emit the noisy linear score as a continuous label
    pub fn regression(mut self) -> Self {
        self.regression = true;
        self
    }

    /// Schema matching the generated examples
    pub fn schema(&self) -> FeatureSchema {
        let schema = (0..self.n_features).fold(FeatureSchema::new(), |schema, i| {
            schema.numeric(&format!("x{}", i))
        });
        schema.optional_categorical("venue", VENUES.len(), Imputation::LastSeen)
    }

    /// Sequence numbers at which a new concept starts
    pub fn change_points(&self) -> Vec<u64> {
        self.concepts
            .iter()
            .scan(0u64, |start, concept| {
                *start += concept.length as u64;
                Some(*start)
            })
            .take(self.concepts.len().saturating_sub(1))
            .collect()
    }

    /// Total number of examples the stream yields
    pub fn len(&self) -> usize {
        self.concepts.iter().map(|c| c.length).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Index of the concept that generates `seq`
    pub fn concept_index(&self, seq: u64) -> Option<usize> {
        let mut end = 0u64;
        for (i, concept) in self.concepts.iter().enumerate() {
            end += concept.length as u64;
            if seq < end {
                return Some(i);
            }
        }
        None
    }

    fn generate(&mut self, concept: usize) -> Example {
        let seq = self.position;
        self.position += 1;

        let x: Vec<f64> = (0..self.n_features)
            .map(|_| StandardNormal.sample(&mut self.rng))
            .collect();
        let venue = VENUES[self.rng.gen_range(0..VENUES.len())];

        let concept = &self.concepts[concept];
        let score = concept.score(&x);
        let label = if self.regression {
            let noise = Normal::new(0.0, concept.noise.max(0.0))
                .map(|n| n.sample(&mut self.rng))
                .unwrap_or(0.0);
            score + noise
        } else {
            let positive = score > 0.0;
            let flipped = concept.noise > 0.0 && self.rng.gen_bool(concept.noise.min(1.0));
            if positive != flipped {
                1.0
            } else {
                0.0
            }
        };

        let example = Example::new(seq)
            .at(self.start + Duration::seconds(seq as i64))
            .with_category("venue", venue)
            .with_label(label);
        x.iter()
            .enumerate()
            .fold(example, |example, (i, xi)| example.with_numeric(format!("x{}", i), *xi))
    }
}

impl Iterator for SyntheticStream {
    type Item = Example;

    fn next(&mut self) -> Option<Self::Item> {
        let concept = self.concept_index(self.position)?;
        Some(self.generate(concept))
    }
}
