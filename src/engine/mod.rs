//! Lifelong Learning Engine Module
//!
//! The controller that ties codec, model, detector and memory together,
//! its metrics, and its checkpoints.

mod checkpoint;
mod learner;
mod metrics;

pub use checkpoint::CHECKPOINT_FORMAT_VERSION;
pub use learner::LifelongLearner;
pub use metrics::{ChannelObserver, EngineStats, MetricsFeed, MetricsObserver, RunSummary, StepRecord};
