//! Streaming Module
//!
//! The ingestion boundary between producers and the engine, the async
//! runner that drains it, and a synthetic stream source.

mod ingest;
mod runner;
mod simulator;

pub use ingest::{ingest_channel, stop_channel, ExampleReceiver, ExampleSender, StopHandle, StopSignal};
pub use runner::StreamRunner;
pub use simulator::{Concept, SyntheticStream};
