//! Real-Time Lifelong Learning Engine
//!
//! Learns continuously from an unbounded stream of examples, notices when
//! the data distribution shifts, and adapts without forgetting everything it
//! learned before.
//!
//! # Modules
//!
//! - `features` - Raw examples and their encoding into fixed-length vectors
//! - `models` - Online models (linear regression, logistic regression)
//! - `drift` - Rolling error signal and the drift state machine
//! - `memory` - Reservoir rehearsal buffer and learning delay
//! - `adaptation` - Drift responses, rehearsal policy, concept repository
//! - `engine` - The controller, its metrics and checkpoints
//! - `streaming` - Async ingestion, stream runner, synthetic source
//!
//! # Example
//!
//! ```rust,no_run
//! use lifelong_learning::prelude::*;
//!
//! fn main() -> lifelong_learning::Result<()> {
//!     let stream = SyntheticStream::new(
//!         vec![
//!             Concept::new(vec![1.0, 1.0], 1000),
//!             Concept::new(vec![1.0, -1.0], 1000),
//!         ],
//!         42,
//!     );
//!
//!     let config = EngineConfig::new(500, 0.2, 0.35, 30, 64);
//!     let mut learner = LifelongLearner::new(config, stream.schema())?;
//!
//!     for example in stream {
//!         let record = learner.process(&example)?;
//!         if record.drift_event {
//!             println!("drift at {}", record.seq);
//!         }
//!     }
//!     Ok(())
//! }
//! ```

pub mod adaptation;
pub mod config;
pub mod drift;
pub mod engine;
pub mod error;
pub mod features;
pub mod memory;
pub mod models;
pub mod streaming;

// Re-export commonly used types
pub use adaptation::{AdaptationRecord, AdaptationStrategy, ConceptId, RehearsalPolicy, ReplayOrder};
pub use config::{EngineConfig, IngestConfig, OverflowPolicy};
pub use drift::{DriftDetector, DriftState, ErrorSignal};
pub use engine::{ChannelObserver, EngineStats, LifelongLearner, MetricsObserver, RunSummary, StepRecord};
pub use error::{EngineError, Result};
pub use features::{Example, FeatureCodec, FeatureSchema, FieldValue, Imputation};
pub use memory::MemoryManager;
pub use models::{ModelKind, ModelSnapshot, OnlineModel};
pub use streaming::{StreamRunner, SyntheticStream};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::adaptation::{AdaptationStrategy, ConceptId, RehearsalPolicy, ReplayOrder};
    pub use crate::config::{EngineConfig, IngestConfig, OverflowPolicy};
    pub use crate::drift::{DriftState, ErrorSignal};
    pub use crate::engine::{
        ChannelObserver, EngineStats, LifelongLearner, MetricsFeed, MetricsObserver, RunSummary, StepRecord,
    };
    pub use crate::error::{EngineError, Result};
    pub use crate::features::{Example, FeatureSchema, FieldValue, Imputation};
    pub use crate::models::{ModelKind, ModelSnapshot, OnlineModel};
    pub use crate::streaming::{
        ingest_channel, stop_channel, Concept, ExampleReceiver, ExampleSender, StopHandle, StopSignal, StreamRunner,
        SyntheticStream,
    };
}
