//! Lifelong Learning CLI Application
//!
//! Runs synthetic drifting streams through the engine.

use clap::{Parser, Subcommand};
use lifelong_learning::engine::MetricsFeed;
use lifelong_learning::prelude::*;
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "lifelong_learning")]
#[command(about = "Real-time lifelong learning with concept drift adaptation")]
struct Cli {
    /// Log detector transitions and rejected examples
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Stream a synthetic drifting dataset through the engine
    Simulate {
        /// Engine configuration (JSON); defaults are used when omitted
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Write an engine checkpoint here when the run ends
        #[arg(long)]
        checkpoint: Option<PathBuf>,

        /// Number of concept segments (alternating between two concepts)
        #[arg(short, long, default_value = "3")]
        segments: usize,

        /// Examples per segment
        #[arg(short, long, default_value = "1500")]
        length: usize,

        /// Label flip probability
        #[arg(short, long, default_value = "0.0")]
        noise: f64,

        /// Ingestion queue capacity
        #[arg(long, default_value = "256")]
        queue: usize,

        /// Overwrite the oldest queued examples instead of waiting for room
        #[arg(long)]
        drop_oldest: bool,

        /// Stream seed
        #[arg(long, default_value = "7")]
        seed: u64,
    },

    /// Print the default engine configuration as JSON
    DefaultConfig,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Commands::Simulate {
            config,
            checkpoint,
            segments,
            length,
            noise,
            queue,
            drop_oldest,
            seed,
        } => {
            let config = match config {
                Some(path) => EngineConfig::from_file(&path)?,
                None => EngineConfig::default(),
            };
            info!("Engine: {:?} model, adaptation {}", config.model, config.adaptation);

            let concepts = (0..segments)
                .map(|i| {
                    let weights = if i % 2 == 0 { vec![1.0, 1.0, 0.5] } else { vec![1.0, -1.0, -0.5] };
                    Concept::new(weights, length).with_noise(noise)
                })
                .collect();
            let stream = SyntheticStream::new(concepts, seed);
            info!("Streaming {} examples, concept changes at {:?}", stream.len(), stream.change_points());

            let kind = config.model;
            let mut learner = LifelongLearner::new(config, stream.schema())?;
            let (observer, feed) = ChannelObserver::new(4096);
            learner.observe(observer);
            let tracker = tokio::spawn(track_segments(feed, stream.change_points()));

            let overflow = if drop_oldest { OverflowPolicy::DropOldest } else { OverflowPolicy::Block };
            let (sender, mut receiver) = ingest_channel(IngestConfig::new(queue, overflow))?;
            let (stop_handle, mut stop) = stop_channel();

            let producer = tokio::spawn(async move {
                for example in stream {
                    if sender.send(example).await.is_err() {
                        break;
                    }
                }
            });
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    info!("Interrupted, stopping after the current example");
                    stop_handle.stop();
                }
            });

            let mut runner = StreamRunner::new(learner);
            let summary = runner.run(&mut receiver, &mut stop).await?;
            drop(receiver);
            producer.await?;

            let learner = runner.into_learner();
            let stats = learner.stats();

            info!("=== Run Summary ===");
            info!(
                "Processed: {}, rejected: {}, dropped: {}, stopped early: {}",
                summary.processed, summary.rejected, summary.dropped, summary.stopped
            );
            info!(
                "Drift events: {}, warnings: {}, adaptations: {}, rehearsed: {}",
                stats.drift_events, stats.warnings, stats.adaptations, stats.rehearsed
            );
            if let Some(mean) = stats.mean_error() {
                info!("Mean prequential error: {:.4}", mean);
            }
            info!("Active concept: {}, memory: {}/{}", stats.concept, stats.memory.size, stats.memory.capacity);

            if let Some(path) = checkpoint {
                learner.save_checkpoint(&path)?;
                info!("Checkpoint written to {}", path.display());
            }

            drop(learner);
            let segments = tracker.await?;
            for (i, segment) in segments.iter().enumerate() {
                if let Some(line) = segment.describe(kind) {
                    info!("Segment {}: {}", i, line);
                }
            }
        }

        Commands::DefaultConfig => {
            println!("{}", serde_json::to_string_pretty(&EngineConfig::default())?);
        }
    }

    Ok(())
}

/// Prequential error of one concept segment
#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct SegmentTally {
    labeled: u64,
    /// Steps with zero error (correct classifications)
    exact: u64,
    total_error: f64,
}

impl SegmentTally {
    fn add(&mut self, error: f64) {
        self.labeled += 1;
        self.total_error += error;
        if error == 0.0 {
            self.exact += 1;
        }
    }

    /// Accuracy for classifiers, mean absolute error for regressors
    fn describe(&self, kind: ModelKind) -> Option<String> {
        if self.labeled == 0 {
            return None;
        }
        let n = self.labeled as f64;
        Some(match kind {
            ModelKind::Logistic => format!(
                "accuracy {:.2}% over {} labeled examples",
                self.exact as f64 / n * 100.0,
                self.labeled
            ),
            ModelKind::Linear => format!(
                "mean absolute error {:.4} over {} labeled examples",
                self.total_error / n,
                self.labeled
            ),
        })
    }
}

/// Tally prequential error per concept segment, logging drift events
async fn track_segments(mut feed: MetricsFeed, change_points: Vec<u64>) -> Vec<SegmentTally> {
    let mut segments = vec![SegmentTally::default(); change_points.len() + 1];

    while let Some(record) = feed.recv().await {
        if record.drift_event {
            info!("Drift detected at example {} (concept {})", record.seq, record.concept);
        }
        if let Some(error) = record.error {
            let segment = change_points.iter().filter(|&&cp| record.seq >= cp).count();
            segments[segment].add(error);
        }
    }

    if feed.overflowed() > 0 {
        info!("{} step records were not tracked (metrics channel full)", feed.overflowed());
    }
    segments
}
