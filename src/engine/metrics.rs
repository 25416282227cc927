//! Engine metrics
//!
//! Per-example step records, cumulative counters, and the observer hook
//! that pushes both out of the engine.

use crate::adaptation::{AdaptationRecord, ConceptId};
use crate::drift::DriftState;
use crate::error::{EngineError, Result};
use crate::memory::MemoryStats;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::warn;

/// Outcome of processing one example
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepRecord {
    pub seq: u64,
    pub prediction: f64,
    pub label: Option<f64>,
    /// Loss fed to the detector; `None` for unlabeled examples
    pub error: Option<f64>,
    /// Detector state right after this example, before any adaptation
    pub detector_state: DriftState,
    /// Whether this example triggered a drift event
    pub drift_event: bool,
    /// Whether the example entered the rehearsal buffer
    pub retained: bool,
    /// Concept active when the prediction was made
    pub concept: ConceptId,
}

/// Cumulative engine statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineStats {
    /// Examples processed successfully
    pub processed: u64,
    /// Processed examples that carried a label
    pub labeled: u64,
    /// Examples rejected by the codec
    pub rejected_schema: u64,
    /// Examples rejected because codec and model disagree on the width
    pub rejected_dimension: u64,
    pub drift_events: u64,
    pub warnings: u64,
    pub adaptations: u64,
    /// Buffered examples replayed across all adaptations
    pub rehearsed: u64,
    /// Delayed observations discarded on drift
    pub discarded: u64,
    pub rollbacks: u64,
    /// Sum of all detector inputs
    pub total_error: f64,
    pub detector_state: DriftState,
    /// Current value of the rolling error statistic
    pub error_statistic: f64,
    pub concept: ConceptId,
    pub memory: MemoryStats,
}

impl EngineStats {
    /// All rejected examples
    pub fn rejected(&self) -> u64 {
        self.rejected_schema + self.rejected_dimension
    }

    /// Mean detector input over all labeled examples
    pub fn mean_error(&self) -> Option<f64> {
        if self.labeled == 0 {
            None
        } else {
            Some(self.total_error / self.labeled as f64)
        }
    }

    pub(crate) fn count_rejection(&mut self, err: &EngineError) {
        match err {
            EngineError::DimensionMismatch { .. } => self.rejected_dimension += 1,
            _ => self.rejected_schema += 1,
        }
    }
}

/// Summary of a run over many examples
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub processed: u64,
    /// Examples skipped after a recoverable error
    pub rejected: u64,
    /// Examples overwritten in the ingestion queue before being processed
    pub dropped: u64,
    pub drift_events: u64,
    /// Whether the run ended on a stop request rather than end of input
    pub stopped: bool,
}

impl RunSummary {
    /// Account for one step; fatal errors are handed back to the caller
    pub(crate) fn absorb(&mut self, outcome: Result<StepRecord>) -> Result<()> {
        match outcome {
            Ok(record) => {
                self.processed += 1;
                if record.drift_event {
                    self.drift_events += 1;
                }
                Ok(())
            }
            Err(err) if err.is_recoverable() => {
                self.rejected += 1;
                Ok(())
            }
            Err(err) => Err(err),
        }
    }
}

/// Receives engine metrics as they are produced
///
/// Called synchronously from the processing loop, so implementations must
/// not block.
pub trait MetricsObserver: Send {
    fn on_step(&mut self, record: &StepRecord);

    fn on_adaptation(&mut self, _record: &AdaptationRecord) {}
}

/// Forwards step records into a bounded channel
///
/// A full channel never stalls the engine: the record is dropped and counted.
pub struct ChannelObserver {
    sender: mpsc::Sender<StepRecord>,
    overflow: Arc<AtomicU64>,
}

impl ChannelObserver {
    pub fn new(capacity: usize) -> (Self, MetricsFeed) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let overflow = Arc::new(AtomicU64::new(0));
        let feed = MetricsFeed {
            receiver,
            overflow: Arc::clone(&overflow),
        };
        (Self { sender, overflow }, feed)
    }
}

impl MetricsObserver for ChannelObserver {
    fn on_step(&mut self, record: &StepRecord) {
        match self.sender.try_send(record.clone()) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                let dropped = self.overflow.fetch_add(1, Ordering::Relaxed) + 1;
                if dropped == 1 || dropped % 1000 == 0 {
                    warn!(dropped, "metrics channel full, dropping step records");
                }
            }
            // nobody is listening any more
            Err(mpsc::error::TrySendError::Closed(_)) => {}
        }
    }
}

/// Consumer side of a [`ChannelObserver`]
pub struct MetricsFeed {
    receiver: mpsc::Receiver<StepRecord>,
    overflow: Arc<AtomicU64>,
}

impl MetricsFeed {
    /// Next record; `None` once the engine is gone and the channel drained
    pub async fn recv(&mut self) -> Option<StepRecord> {
        self.receiver.recv().await
    }

    pub fn try_recv(&mut self) -> Option<StepRecord> {
        self.receiver.try_recv().ok()
    }

    /// Records dropped because the channel was full
    pub fn overflowed(&self) -> u64 {
        self.overflow.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(seq: u64, drift_event: bool) -> StepRecord {
        StepRecord {
            seq,
            prediction: 0.5,
            label: Some(1.0),
            error: Some(0.0),
            detector_state: DriftState::Stable,
            drift_event,
            retained: true,
            concept: ConceptId(0),
        }
    }

    #[test]
    fn test_channel_observer_counts_overflow() {
        let (mut observer, mut feed) = ChannelObserver::new(2);
        for seq in 0..5 {
            observer.on_step(&record(seq, false));
        }

        assert_eq!(feed.overflowed(), 3);
        assert_eq!(feed.try_recv().map(|r| r.seq), Some(0));
        assert_eq!(feed.try_recv().map(|r| r.seq), Some(1));
        assert!(feed.try_recv().is_none());
    }

    #[test]
    fn test_summary_absorb() {
        let mut summary = RunSummary::default();
        summary.absorb(Ok(record(0, true))).unwrap();
        summary.absorb(Err(EngineError::schema("x", "missing"))).unwrap();
        assert!(summary
            .absorb(Err(EngineError::DimensionMismatch { expected: 2, got: 3 }))
            .is_err());

        assert_eq!(summary.processed, 1);
        assert_eq!(summary.rejected, 1);
        assert_eq!(summary.drift_events, 1);
    }

    #[test]
    fn test_mean_error() {
        let mut stats = EngineStats::default();
        assert!(stats.mean_error().is_none());

        stats.labeled = 4;
        stats.total_error = 1.0;
        approx::assert_relative_eq!(stats.mean_error().unwrap(), 0.25);
    }
}
