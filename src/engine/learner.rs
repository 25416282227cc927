//! Lifelong learning controller
//!
//! Owns every component and runs the per-example pass: encode, predict,
//! monitor, learn, retain, and adapt when the detector confirms drift.

use super::metrics::{EngineStats, MetricsObserver, RunSummary, StepRecord};
use crate::adaptation::{
    mean_loss, AdaptationRecord, AdaptationStrategy, ConceptId, ConceptRepository, ReplayOrder,
};
use crate::config::EngineConfig;
use crate::drift::{DriftDetector, DriftState};
use crate::error::{EngineError, Result};
use crate::features::{Example, FeatureCodec, FeatureSchema};
use crate::memory::{LearningDelay, MemoryManager, PendingUpdate};
use crate::models::OnlineModel;
use crate::streaming::StopSignal;
use std::collections::VecDeque;
use tracing::{info, warn};

/// Real-time lifelong learner
///
/// Every call to [`process`](Self::process) either fully applies one
/// example or leaves the engine exactly as it was.
pub struct LifelongLearner {
    pub(super) config: EngineConfig,
    pub(super) codec: FeatureCodec,
    pub(super) model: OnlineModel,
    pub(super) detector: DriftDetector,
    pub(super) memory: MemoryManager,
    pub(super) delay: LearningDelay,
    pub(super) repository: ConceptRepository,
    /// Last labeled vectors, used to score archived concepts
    pub(super) recent: VecDeque<(Vec<f64>, f64)>,
    pub(super) concept: ConceptId,
    /// Id handed to the next fresh concept
    pub(super) next_concept: ConceptId,
    pub(super) stats: EngineStats,
    pub(super) last_record: Option<StepRecord>,
    pub(super) last_adaptation: Option<AdaptationRecord>,
    observers: Vec<Box<dyn MetricsObserver>>,
}

impl LifelongLearner {
    /// Validate the configuration and build every component
    pub fn new(config: EngineConfig, schema: FeatureSchema) -> Result<Self> {
        config.validate()?;
        let codec = FeatureCodec::new(schema)?;
        let model = OnlineModel::new(config.model, codec.width(), config.learning_rate);

        Ok(Self::assemble(
            config.clone(),
            codec,
            model,
            detector_for(&config),
            MemoryManager::new(config.buffer_capacity, config.seed),
            LearningDelay::new(config.learning_delay),
            ConceptRepository::new(repository_size(&config)),
        ))
    }

    pub(super) fn assemble(
        config: EngineConfig,
        codec: FeatureCodec,
        model: OnlineModel,
        detector: DriftDetector,
        memory: MemoryManager,
        delay: LearningDelay,
        repository: ConceptRepository,
    ) -> Self {
        Self {
            config,
            codec,
            model,
            detector,
            memory,
            delay,
            repository,
            recent: VecDeque::new(),
            concept: ConceptId(0),
            next_concept: ConceptId(1),
            stats: EngineStats::default(),
            last_record: None,
            last_adaptation: None,
            observers: Vec::new(),
        }
    }

    /// Register a metrics observer
    pub fn observe<O: MetricsObserver + 'static>(&mut self, observer: O) {
        self.observers.push(Box::new(observer));
    }

    /// Run one example through the engine
    ///
    /// Schema errors are recoverable: the example is rejected and nothing
    /// else changes.
    pub fn process(&mut self, example: &Example) -> Result<StepRecord> {
        let encoded = match self.codec.prepare(example) {
            Ok(encoded) => encoded,
            Err(err) => return Err(self.reject(example.seq(), err)),
        };
        if let Err(err) = self.model.check_input(&encoded.vector) {
            return Err(self.reject(example.seq(), err));
        }

        let concept = self.concept;
        let prediction = self.model.predict(&encoded.vector)?;

        let error = match encoded.label {
            Some(label) => {
                let loss = self.model.loss(prediction, label);
                self.detector.update(loss);
                self.stats.labeled += 1;
                self.stats.total_error += loss;

                self.remember(encoded.vector.clone(), label);
                let released = self.delay.push(PendingUpdate {
                    seq: example.seq(),
                    vector: encoded.vector,
                    label,
                    weight: encoded.weight,
                });
                for update in released {
                    self.model.update(&update.vector, update.label, update.weight)?;
                }
                Some(loss)
            }
            None => None,
        };

        self.codec.commit(encoded.delta);
        let retained = self.memory.offer(example.clone());
        self.stats.processed += 1;

        let detector_state = self.detector.state();
        let drift_event = self.detector.drift_detected();
        if drift_event {
            self.stats.drift_events += 1;
            info!(
                seq = example.seq(),
                statistic = self.detector.statistic(),
                concept = %concept,
                "concept drift detected"
            );
            self.adapt(example.seq())?;
        }

        let record = StepRecord {
            seq: example.seq(),
            prediction,
            label: encoded.label,
            error,
            detector_state,
            drift_event,
            retained,
            concept,
        };
        for observer in self.observers.iter_mut() {
            observer.on_step(&record);
        }
        self.last_record = Some(record.clone());

        Ok(record)
    }

    /// Process examples until the input ends, a stop is requested, or a
    /// non-recoverable error occurs
    pub fn process_all<I>(&mut self, examples: I, stop: Option<&StopSignal>) -> Result<RunSummary>
    where
        I: IntoIterator<Item = Example>,
    {
        let mut summary = RunSummary::default();

        for example in examples {
            if stop.map_or(false, |s| s.is_stopped()) {
                summary.stopped = true;
                break;
            }
            summary.absorb(self.process(&example))?;
        }

        Ok(summary)
    }

    /// Predict without learning or monitoring
    pub fn predict(&self, example: &Example) -> Result<f64> {
        let x = self.codec.encode_readonly(example)?;
        self.model.predict(&x)
    }

    /// Restore the model as it was before the last adaptation
    ///
    /// Returns `Ok(false)` when no adaptation has happened since the last
    /// rollback.
    pub fn rollback_last_adaptation(&mut self) -> Result<bool> {
        let record = match self.last_adaptation.take() {
            Some(record) => record,
            None => {
                warn!("rollback requested but no adaptation is recorded");
                return Ok(false);
            }
        };

        let restored = OnlineModel::restore(&record.pre_drift)?;
        if matches!(record.strategy, AdaptationStrategy::Recall { .. }) {
            let seq = self.last_record.as_ref().map_or(record.seq, |r| r.seq);
            // the pre-drift concept becomes active again
            self.repository.recall(record.previous_concept)?;
            self.repository.archive(self.concept, &self.model, seq)?;
        }

        self.model = restored;
        self.concept = record.previous_concept;
        self.detector.reset();
        self.stats.rollbacks += 1;
        info!(seq = record.seq, concept = %self.concept, "rolled back adaptation");

        Ok(true)
    }

    /// Copy of the current statistics
    pub fn stats(&self) -> EngineStats {
        EngineStats {
            warnings: self.detector.warning_count(),
            detector_state: self.detector.state(),
            error_statistic: self.detector.statistic(),
            concept: self.concept,
            memory: self.memory.stats(),
            ..self.stats
        }
    }

    pub fn last_record(&self) -> Option<&StepRecord> {
        self.last_record.as_ref()
    }

    pub fn last_adaptation(&self) -> Option<&AdaptationRecord> {
        self.last_adaptation.as_ref()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn model(&self) -> &OnlineModel {
        &self.model
    }

    pub fn codec(&self) -> &FeatureCodec {
        &self.codec
    }

    pub fn detector_state(&self) -> DriftState {
        self.detector.state()
    }

    pub fn memory(&self) -> &MemoryManager {
        &self.memory
    }

    pub fn concept(&self) -> ConceptId {
        self.concept
    }

    /// Ids of the archived concepts
    pub fn archived_concepts(&self) -> Vec<ConceptId> {
        self.repository.ids()
    }

    fn reject(&mut self, seq: u64, err: EngineError) -> EngineError {
        self.stats.count_rejection(&err);
        warn!(seq, error = %err, "rejected example");
        err
    }

    fn remember(&mut self, vector: Vec<f64>, label: f64) {
        if self.config.recall_window == 0 {
            return;
        }
        if self.recent.len() == self.config.recall_window {
            self.recent.pop_front();
        }
        self.recent.push_back((vector, label));
    }

    fn adapt(&mut self, seq: u64) -> Result<()> {
        let pre_drift = self.model.snapshot()?;
        let previous_concept = self.concept;
        let discarded = self.delay.discard();

        let strategy = self.config.adaptation;
        let recalled = match strategy {
            AdaptationStrategy::Retain => None,
            AdaptationStrategy::PartialReset { factor } => {
                self.model.shrink(factor);
                None
            }
            AdaptationStrategy::FullReset => {
                self.open_concept();
                None
            }
            AdaptationStrategy::Recall { .. } => self.recall_or_reset(seq)?,
        };

        let rehearsed = self.rehearse()?;
        self.detector.reset();

        self.stats.adaptations += 1;
        self.stats.rehearsed += rehearsed as u64;
        self.stats.discarded += discarded as u64;
        info!(
            seq,
            %strategy,
            rehearsed,
            discarded,
            recalled = ?recalled,
            concept = %self.concept,
            "adapted to drift"
        );

        let record = AdaptationRecord {
            seq,
            strategy,
            rehearsed,
            discarded,
            recalled,
            previous_concept,
            concept: self.concept,
            pre_drift,
        };
        for observer in self.observers.iter_mut() {
            observer.on_adaptation(&record);
        }
        self.last_adaptation = Some(record);

        Ok(())
    }

    /// Switch to the archived concept that fits the recent examples better
    /// than the current model, or start a fresh one
    fn recall_or_reset(&mut self, seq: u64) -> Result<Option<ConceptId>> {
        let recent: Vec<(Vec<f64>, f64)> = self.recent.iter().cloned().collect();
        let current_loss = mean_loss(&self.model, &recent)?;

        if let Some((id, loss)) = self.repository.best_match(&recent)? {
            if loss < current_loss {
                if let Some(model) = self.repository.recall(id)? {
                    self.repository.archive(self.concept, &self.model, seq)?;
                    self.model = model;
                    self.concept = id;
                    return Ok(Some(id));
                }
            }
        }

        if let Some(evicted) = self.repository.archive(self.concept, &self.model, seq)? {
            info!(concept = %evicted, "evicted archived concept");
        }
        self.open_concept();
        Ok(None)
    }

    fn open_concept(&mut self) {
        self.model.reset();
        self.concept = self.next_concept;
        self.next_concept = self.next_concept.next();
    }

    /// Draw the rehearsal sample in replay order
    fn replay_sample(&mut self) -> Vec<Example> {
        let mut sample = self.memory.sample(self.config.rehearsal_sample_size);
        if self.config.rehearsal.order == ReplayOrder::Chronological {
            sample.sort_by_key(|e| e.seq());
        }
        sample
    }

    /// Replay a sample of the buffer into the model; the detector is not fed
    fn rehearse(&mut self) -> Result<usize> {
        let sample = self.replay_sample();

        let mut replayed = 0;
        for _ in 0..self.config.rehearsal.passes {
            for example in &sample {
                let label = match example.label() {
                    Some(label) => label,
                    None => continue,
                };
                match self.codec.encode_readonly(example) {
                    Ok(x) => {
                        self.model.update(&x, label, example.weight())?;
                        replayed += 1;
                    }
                    Err(err) => warn!(seq = example.seq(), error = %err, "skipping buffered example"),
                }
            }
        }

        Ok(replayed)
    }
}

pub(super) fn detector_for(config: &EngineConfig) -> DriftDetector {
    DriftDetector::new(
        config.signal,
        config.warning_threshold,
        config.drift_threshold,
        config.drift_window,
    )
    .with_min_samples(config.min_samples)
}

fn repository_size(config: &EngineConfig) -> usize {
    match config.adaptation {
        AdaptationStrategy::Recall { max_concepts } => max_concepts,
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adaptation::RehearsalPolicy;
    use crate::drift::ErrorSignal;
    use crate::engine::ChannelObserver;
    use crate::features::Imputation;
    use crate::models::ModelKind;

    fn schema() -> FeatureSchema {
        FeatureSchema::new()
            .numeric("x")
            .optional_categorical("side", 3, Imputation::Zero)
    }

    fn config() -> EngineConfig {
        // window of one: the statistic is the last error
        EngineConfig::new(16, 0.3, 0.6, 5, 8)
            .with_model(ModelKind::Logistic)
            .with_signal(ErrorSignal::Window { size: 1 })
            .with_min_samples(0)
    }

    fn labeled(seq: u64, x: f64, label: f64) -> Example {
        Example::new(seq).with_numeric("x", x).with_label(label)
    }

    /// Two confident mistakes in a row: warning, then drift
    fn drive_to_drift(learner: &mut LifelongLearner, start: u64) -> StepRecord {
        for i in 0..40 {
            let x = if i % 2 == 0 { 1.0 } else { -1.0 };
            learner
                .process(&labeled(start + i, x, if x > 0.0 { 1.0 } else { 0.0 }))
                .unwrap();
        }
        learner.process(&labeled(start + 40, 1.0, 0.0)).unwrap();
        learner.process(&labeled(start + 41, 1.0, 0.0)).unwrap()
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let bad = EngineConfig::new(0, 0.3, 0.6, 5, 8);
        assert!(matches!(
            LifelongLearner::new(bad, schema()),
            Err(EngineError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_schema_error_leaves_engine_untouched() {
        let mut learner = LifelongLearner::new(config(), schema()).unwrap();
        learner.process(&labeled(0, 1.0, 1.0)).unwrap();

        let model_before = learner.model().snapshot().unwrap();
        let codec_before = learner.codec().state().clone();
        let memory_before = learner.memory().clone();

        let bad = Example::new(1)
            .with_category("side", "buy")
            .with_label(1.0);
        let err = learner.process(&bad).unwrap_err();
        assert!(err.is_recoverable());

        assert_eq!(learner.model().snapshot().unwrap(), model_before);
        assert_eq!(learner.codec().state(), &codec_before);
        assert_eq!(learner.memory(), &memory_before);
        assert_eq!(learner.stats().rejected_schema, 1);
        assert_eq!(learner.stats().processed, 1);
    }

    #[test]
    fn test_unlabeled_example_only_predicts() {
        let mut learner = LifelongLearner::new(config(), schema()).unwrap();
        let record = learner
            .process(&Example::new(0).with_numeric("x", 2.0))
            .unwrap();

        assert!(record.error.is_none());
        assert_eq!(learner.model().samples_seen(), 0);
        assert_eq!(learner.stats().labeled, 0);
        assert_eq!(learner.stats().memory.size, 1);
    }

    #[test]
    fn test_drift_event_triggers_adaptation() {
        let config = config().with_rehearsal(RehearsalPolicy {
            order: ReplayOrder::Chronological,
            passes: 2,
        });
        let mut learner = LifelongLearner::new(config, schema()).unwrap();

        let record = drive_to_drift(&mut learner, 0);
        assert!(record.drift_event);
        assert_eq!(record.detector_state, DriftState::Drift);

        // detector is back to stable once adaptation is done
        assert_eq!(learner.detector_state(), DriftState::Stable);

        let adaptation = learner.last_adaptation().unwrap();
        assert_eq!(adaptation.seq, record.seq);
        assert_eq!(adaptation.rehearsed, 2 * 8);

        let stats = learner.stats();
        assert_eq!(stats.drift_events, 1);
        assert_eq!(stats.adaptations, 1);
    }

    #[test]
    fn test_full_reset_opens_new_concept() {
        let config = config().with_adaptation(AdaptationStrategy::FullReset);
        let mut learner = LifelongLearner::new(config, schema()).unwrap();
        assert_eq!(learner.concept(), ConceptId(0));

        let record = drive_to_drift(&mut learner, 0);
        assert_eq!(record.concept, ConceptId(0));
        assert_eq!(learner.concept(), ConceptId(1));
    }

    #[test]
    fn test_rollback_restores_pre_drift_model() {
        let config = config().with_adaptation(AdaptationStrategy::FullReset);
        let mut learner = LifelongLearner::new(config, schema()).unwrap();
        assert!(!learner.rollback_last_adaptation().unwrap());

        drive_to_drift(&mut learner, 0);
        let pre_drift = learner.last_adaptation().unwrap().pre_drift.clone();

        assert!(learner.rollback_last_adaptation().unwrap());
        assert_eq!(learner.model().snapshot().unwrap(), pre_drift);
        assert_eq!(learner.concept(), ConceptId(0));
        assert!(!learner.rollback_last_adaptation().unwrap());
        assert_eq!(learner.stats().rollbacks, 1);
    }

    #[test]
    fn test_learning_delay_holds_updates() {
        let config = config().with_learning_delay(3);
        let mut learner = LifelongLearner::new(config, schema()).unwrap();

        for seq in 0..3 {
            learner.process(&labeled(seq, 1.0, 1.0)).unwrap();
        }
        assert_eq!(learner.model().samples_seen(), 0);

        learner.process(&labeled(3, 1.0, 1.0)).unwrap();
        assert_eq!(learner.model().samples_seen(), 1);
    }

    #[test]
    fn test_drift_discards_pending_updates() {
        let config = config()
            .with_learning_delay(2)
            .with_rehearsal(RehearsalPolicy::default());
        let mut learner = LifelongLearner::new(config, schema()).unwrap();

        drive_to_drift(&mut learner, 0);
        assert_eq!(learner.last_adaptation().unwrap().discarded, 2);
        assert_eq!(learner.stats().discarded, 2);
    }

    #[test]
    fn test_observer_receives_every_step() {
        let mut learner = LifelongLearner::new(config(), schema()).unwrap();
        let (observer, mut feed) = ChannelObserver::new(64);
        learner.observe(observer);

        for seq in 0..5 {
            learner.process(&labeled(seq, 1.0, 1.0)).unwrap();
        }

        let mut seen = Vec::new();
        while let Some(record) = feed.try_recv() {
            seen.push(record.seq);
        }
        assert_eq!(seen, vec![0, 1, 2, 3, 4]);
        assert_eq!(learner.last_record().map(|r| r.seq), Some(4));
    }

    #[test]
    fn test_process_all_skips_rejected() {
        let mut learner = LifelongLearner::new(config(), schema()).unwrap();
        let examples = vec![
            labeled(0, 1.0, 1.0),
            Example::new(1).with_label(1.0),
            labeled(2, -1.0, 0.0),
        ];

        let summary = learner.process_all(examples, None).unwrap();
        assert_eq!(summary.processed, 2);
        assert_eq!(summary.rejected, 1);
        assert!(!summary.stopped);
    }

    #[test]
    fn test_process_all_honours_stop() {
        let mut learner = LifelongLearner::new(config(), schema()).unwrap();
        let (handle, signal) = crate::streaming::stop_channel();
        handle.stop();

        let summary = learner
            .process_all(vec![labeled(0, 1.0, 1.0)], Some(&signal))
            .unwrap();
        assert!(summary.stopped);
        assert_eq!(summary.processed, 0);
    }

    #[test]
    fn test_rollback_after_recall_reactivates_previous_concept() {
        let config = config().with_adaptation(AdaptationStrategy::Recall { max_concepts: 4 });
        let mut learner = LifelongLearner::new(config, schema()).unwrap();

        let record = drive_to_drift(&mut learner, 0);
        assert!(record.drift_event);

        let adaptation = learner.last_adaptation().cloned().unwrap();
        let adapted_concept = learner.concept();
        assert_ne!(adapted_concept, adaptation.previous_concept);
        assert!(learner.archived_concepts().contains(&adaptation.previous_concept));

        assert!(learner.rollback_last_adaptation().unwrap());

        assert_eq!(learner.concept(), adaptation.previous_concept);
        assert_eq!(learner.model().snapshot().unwrap(), adaptation.pre_drift);
        let archived = learner.archived_concepts();
        assert!(archived.contains(&adapted_concept));
        assert!(!archived.contains(&adaptation.previous_concept));
    }

    #[test]
    fn test_chronological_replay_is_oldest_first() {
        let config = config().with_rehearsal(RehearsalPolicy {
            order: ReplayOrder::Chronological,
            passes: 1,
        });
        let mut learner = LifelongLearner::new(config, schema()).unwrap();
        for seq in 0..200 {
            learner.process(&labeled(seq, 1.0, 1.0)).unwrap();
        }

        let seqs: Vec<u64> = learner.replay_sample().iter().map(|e| e.seq()).collect();
        assert_eq!(seqs.len(), 8);
        assert!(seqs.windows(2).all(|pair| pair[0] < pair[1]), "{:?}", seqs);
    }

    #[test]
    fn test_extreme_sizes_do_not_preallocate() {
        let config = EngineConfig::new(usize::MAX, 0.3, 0.6, u64::MAX, usize::MAX)
            .with_signal(ErrorSignal::Window { size: usize::MAX })
            .with_learning_delay(usize::MAX)
            .with_recall_window(usize::MAX)
            .with_adaptation(AdaptationStrategy::Recall { max_concepts: usize::MAX });
        assert!(config.validate().is_ok());

        let mut learner = LifelongLearner::new(config, schema()).unwrap();
        let record = learner.process(&labeled(0, 1.0, 1.0)).unwrap();
        assert!(record.retained);
        assert_eq!(learner.model().samples_seen(), 0);
    }

    #[test]
    fn test_extreme_feature_values_keep_predictions_finite() {
        let mut learner = LifelongLearner::new(config(), schema()).unwrap();
        for seq in 0..20 {
            let x = if seq % 2 == 0 { 1e300 } else { -1e300 };
            let record = learner.process(&labeled(seq, x, (seq % 2) as f64)).unwrap();
            assert!((0.0..=1.0).contains(&record.prediction), "{:?}", record);
        }
        assert_eq!(learner.stats().labeled, 20);
    }
}
