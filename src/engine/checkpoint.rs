//! Engine checkpoints
//!
//! A checkpoint captures everything the engine has learned so a restarted
//! process continues exactly where the previous one stopped. Observers are
//! not part of it.

use super::learner::LifelongLearner;
use super::metrics::EngineStats;
use crate::adaptation::{AdaptationRecord, ConceptId, ConceptRepository};
use crate::config::EngineConfig;
use crate::drift::DriftDetector;
use crate::error::{EngineError, Result};
use crate::features::{CodecState, FeatureCodec, FeatureSchema};
use crate::memory::{LearningDelay, MemoryManager};
use crate::models::{ModelSnapshot, OnlineModel};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::path::Path;
use tracing::info;

/// Checkpoint format version written by this build
pub const CHECKPOINT_FORMAT_VERSION: u32 = 1;

#[derive(Serialize, Deserialize)]
struct Envelope {
    version: u32,
    payload: Vec<u8>,
}

#[derive(Serialize, Deserialize)]
struct EngineState {
    config: EngineConfig,
    codec: CodecState,
    model: ModelSnapshot,
    detector: DriftDetector,
    memory: MemoryManager,
    delay: LearningDelay,
    repository: ConceptRepository,
    recent: VecDeque<(Vec<f64>, f64)>,
    concept: ConceptId,
    next_concept: ConceptId,
    stats: EngineStats,
    last_adaptation: Option<AdaptationRecord>,
}

impl LifelongLearner {
    /// Serialize the full engine state
    pub fn checkpoint(&self) -> Result<Vec<u8>> {
        let state = EngineState {
            config: self.config.clone(),
            codec: self.codec.state().clone(),
            model: self.model.snapshot()?,
            detector: self.detector.clone(),
            memory: self.memory.clone(),
            delay: self.delay.clone(),
            repository: self.repository.clone(),
            recent: self.recent.clone(),
            concept: self.concept,
            next_concept: self.next_concept,
            stats: self.stats,
            last_adaptation: self.last_adaptation.clone(),
        };

        let envelope = Envelope {
            version: CHECKPOINT_FORMAT_VERSION,
            payload: bincode::serialize(&state)?,
        };
        Ok(bincode::serialize(&envelope)?)
    }

    /// Rebuild an engine from [`checkpoint`](Self::checkpoint) output
    ///
    /// The schema must produce vectors of the width the model was trained on.
    pub fn resume(bytes: &[u8], schema: FeatureSchema) -> Result<Self> {
        let envelope: Envelope = bincode::deserialize(bytes)?;
        if envelope.version > CHECKPOINT_FORMAT_VERSION {
            return Err(EngineError::IncompatibleVersion {
                found: envelope.version,
                supported: CHECKPOINT_FORMAT_VERSION,
            });
        }
        let state: EngineState = bincode::deserialize(&envelope.payload)?;
        state.config.validate()?;

        let codec = FeatureCodec::with_state(schema, state.codec)?;
        let model = OnlineModel::restore(&state.model)?;
        if codec.width() != model.n_features() {
            return Err(EngineError::DimensionMismatch {
                expected: model.n_features(),
                got: codec.width(),
            });
        }

        let mut learner = LifelongLearner::assemble(
            state.config,
            codec,
            model,
            state.detector,
            state.memory,
            state.delay,
            state.repository,
        );
        learner.recent = state.recent;
        learner.concept = state.concept;
        learner.next_concept = state.next_concept;
        learner.stats = state.stats;
        learner.last_adaptation = state.last_adaptation;

        info!(
            processed = learner.stats.processed,
            concept = %learner.concept,
            "resumed engine from checkpoint"
        );
        Ok(learner)
    }

    /// Write a checkpoint to disk
    pub fn save_checkpoint<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        std::fs::write(path, self.checkpoint()?)?;
        Ok(())
    }

    /// Resume from a checkpoint file
    pub fn load_checkpoint<P: AsRef<Path>>(path: P, schema: FeatureSchema) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        Self::resume(&bytes, schema)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::Example;
    use chrono::{TimeZone, Utc};

    fn schema() -> FeatureSchema {
        FeatureSchema::new().numeric("a").categorical("kind", 3)
    }

    fn example(seq: u64) -> Example {
        let a = (seq as f64 * 0.7).sin();
        Example::new(seq)
            .at(Utc.timestamp_opt(1_700_000_000 + seq as i64, 0).unwrap())
            .with_numeric("a", a)
            .with_category("kind", if seq % 3 == 0 { "x" } else { "y" })
            .with_label(if a > 0.0 { 1.0 } else { 0.0 })
    }

    fn config() -> EngineConfig {
        EngineConfig::new(20, 0.2, 0.4, 10, 5).with_min_samples(5)
    }

    #[test]
    fn test_resume_continues_identically() {
        let mut straight = LifelongLearner::new(config(), schema()).unwrap();
        let mut first = LifelongLearner::new(config(), schema()).unwrap();
        for seq in 0..150 {
            straight.process(&example(seq)).unwrap();
            first.process(&example(seq)).unwrap();
        }

        let bytes = first.checkpoint().unwrap();
        let mut resumed = LifelongLearner::resume(&bytes, schema()).unwrap();

        for seq in 150..300 {
            let a = straight.process(&example(seq)).unwrap();
            let b = resumed.process(&example(seq)).unwrap();
            assert_eq!(a, b);
        }
        assert_eq!(straight.checkpoint().unwrap(), resumed.checkpoint().unwrap());
    }

    #[test]
    fn test_newer_checkpoint_is_rejected() {
        let envelope = Envelope {
            version: CHECKPOINT_FORMAT_VERSION + 1,
            payload: Vec::new(),
        };
        let bytes = bincode::serialize(&envelope).unwrap();

        assert!(matches!(
            LifelongLearner::resume(&bytes, schema()),
            Err(EngineError::IncompatibleVersion { .. })
        ));
    }

    #[test]
    fn test_schema_width_must_match() {
        let learner = LifelongLearner::new(config(), schema()).unwrap();
        let bytes = learner.checkpoint().unwrap();

        let wider = schema().numeric("b");
        assert!(matches!(
            LifelongLearner::resume(&bytes, wider),
            Err(EngineError::DimensionMismatch { expected: 4, got: 5 })
        ));
    }

    #[test]
    fn test_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine.ckpt");

        let mut learner = LifelongLearner::new(config(), schema()).unwrap();
        for seq in 0..50 {
            learner.process(&example(seq)).unwrap();
        }
        learner.save_checkpoint(&path).unwrap();

        let resumed = LifelongLearner::load_checkpoint(&path, schema()).unwrap();
        assert_eq!(resumed.stats(), learner.stats());
    }

    #[test]
    fn test_garbage_is_checkpoint_error() {
        assert!(matches!(
            LifelongLearner::resume(&[0xff; 3], schema()),
            Err(EngineError::Checkpoint(_))
        ));
    }
}
