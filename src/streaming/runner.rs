//! Async stream runner
//!
//! Drains an ingestion queue into a [`LifelongLearner`], strictly one example
//! at a time, until the queue closes or a stop is requested.

use super::ingest::{ExampleReceiver, StopSignal};
use crate::engine::{LifelongLearner, RunSummary};
use crate::error::Result;
use tracing::{error, info};

/// Feeds queued examples to a learner
pub struct StreamRunner {
    learner: LifelongLearner,
}

impl StreamRunner {
    pub fn new(learner: LifelongLearner) -> Self {
        Self { learner }
    }

    /// Process queued examples until the queue is closed and drained or
    /// `stop` fires
    ///
    /// Recoverable errors are counted and skipped; any other error ends the
    /// run and is returned.
    pub async fn run(&mut self, receiver: &mut ExampleReceiver, stop: &mut StopSignal) -> Result<RunSummary> {
        let mut summary = RunSummary::default();

        loop {
            if stop.is_stopped() {
                summary.stopped = true;
                break;
            }

            tokio::select! {
                biased;

                _ = stop.stopped() => {
                    summary.stopped = true;
                    break;
                }
                next = receiver.recv() => match next {
                    Some(example) => {
                        let outcome = self.learner.process(&example);
                        if let Err(err) = summary.absorb(outcome) {
                            error!(
                                processed = summary.processed,
                                dropped = receiver.dropped(),
                                error = %err,
                                "stream runner stopped on a fatal error"
                            );
                            return Err(err);
                        }
                    }
                    None => break,
                },
            }
        }

        summary.dropped = receiver.dropped();
        info!(
            processed = summary.processed,
            rejected = summary.rejected,
            dropped = summary.dropped,
            drift_events = summary.drift_events,
            stopped = summary.stopped,
            "stream run finished"
        );
        Ok(summary)
    }

    pub fn learner(&self) -> &LifelongLearner {
        &self.learner
    }

    pub fn learner_mut(&mut self) -> &mut LifelongLearner {
        &mut self.learner
    }

    pub fn into_learner(self) -> LifelongLearner {
        self.learner
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{EngineConfig, IngestConfig, OverflowPolicy};
    use crate::features::{Example, FeatureSchema};
    use crate::streaming::{ingest_channel, stop_channel};

    fn learner() -> LifelongLearner {
        let schema = FeatureSchema::new().numeric("x");
        LifelongLearner::new(EngineConfig::new(8, 0.3, 0.6, 5, 4), schema).unwrap()
    }

    #[tokio::test]
    async fn test_runs_until_queue_closes() {
        let (tx, mut rx) = ingest_channel(IngestConfig::new(16, OverflowPolicy::Block)).unwrap();
        let (_handle, mut stop) = stop_channel();

        let producer = tokio::spawn(async move {
            for seq in 0..10 {
                let example = if seq == 5 {
                    Example::new(seq).with_label(1.0)
                } else {
                    Example::new(seq).with_numeric("x", 1.0).with_label(1.0)
                };
                tx.send(example).await.unwrap();
            }
        });

        let mut runner = StreamRunner::new(learner());
        let summary = runner.run(&mut rx, &mut stop).await.unwrap();
        producer.await.unwrap();

        assert_eq!(summary.processed, 9);
        assert_eq!(summary.rejected, 1);
        assert!(!summary.stopped);
        assert_eq!(runner.learner().stats().processed, 9);
    }

    #[tokio::test]
    async fn test_stops_while_idle() {
        let (_tx, mut rx) = ingest_channel(IngestConfig::new(4, OverflowPolicy::Block)).unwrap();
        let (handle, mut stop) = stop_channel();

        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            handle.stop();
        });

        let mut runner = StreamRunner::new(learner());
        let summary = runner.run(&mut rx, &mut stop).await.unwrap();
        assert!(summary.stopped);
        assert_eq!(summary.processed, 0);
    }
}
