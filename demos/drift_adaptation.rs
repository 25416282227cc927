//! Drift Adaptation Example
//!
//! Compares adaptation strategies on a stream that switches concept twice
//! and then returns to the first one:
//! - prequential accuracy per segment
//! - drift events and the concepts the engine moved through
//!
//! Run with: cargo run --example drift_adaptation

use lifelong_learning::prelude::*;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::WARN)
        .init();

    println!("=== Drift Adaptation Example ===\n");

    let strategies = [
        AdaptationStrategy::Retain,
        AdaptationStrategy::PartialReset { factor: 0.5 },
        AdaptationStrategy::FullReset,
        AdaptationStrategy::Recall { max_concepts: 4 },
    ];

    for strategy in strategies {
        let stream = drifting_stream();
        let change_points = stream.change_points();

        let config = EngineConfig::new(400, 0.2, 0.35, 30, 64)
            .with_min_samples(30)
            .with_adaptation(strategy);
        let mut learner = LifelongLearner::new(config, stream.schema())?;

        let mut segments = vec![(0u64, 0u64); change_points.len() + 1];
        let mut drifts = Vec::new();

        for example in stream {
            let record = learner.process(&example)?;
            let segment = change_points.iter().filter(|&&cp| record.seq >= cp).count();
            if let Some(error) = record.error {
                segments[segment].1 += 1;
                if error == 0.0 {
                    segments[segment].0 += 1;
                }
            }
            if record.drift_event {
                drifts.push(record.seq);
            }
        }

        println!("Strategy: {}", strategy);
        for (i, (correct, total)) in segments.iter().enumerate() {
            println!(
                "  Segment {}: {:.1}% accuracy",
                i,
                *correct as f64 / (*total).max(1) as f64 * 100.0
            );
        }
        println!("  Drift events at: {:?}", drifts);

        let stats = learner.stats();
        println!(
            "  Adaptations: {}, rehearsed: {}, active concept: {}, archived: {:?}\n",
            stats.adaptations,
            stats.rehearsed,
            stats.concept,
            learner.archived_concepts()
        );
    }

    Ok(())
}

/// A, then B, then A again
fn drifting_stream() -> SyntheticStream {
    let a = vec![1.0, 1.0, 0.0];
    let b = vec![1.0, -1.0, 0.5];
    SyntheticStream::new(
        vec![
            Concept::new(a.clone(), 1500).with_noise(0.02),
            Concept::new(b, 1500).with_noise(0.02),
            Concept::new(a, 1500).with_noise(0.02),
        ],
        11,
    )
}
