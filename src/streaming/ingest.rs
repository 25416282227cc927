//! Ingestion queue and stop signal
//!
//! Producers push examples through an [`ExampleSender`]; the engine side
//! drains an [`ExampleReceiver`] one example at a time. With
//! [`OverflowPolicy::DropOldest`] the queue never blocks a producer: once it
//! is full the oldest queued examples are overwritten and counted.

use crate::config::{IngestConfig, OverflowPolicy};
use crate::error::{EngineError, Result};
use crate::features::Example;
use tokio::sync::{broadcast, mpsc, watch};
use tracing::warn;

/// Create a bounded ingestion queue
///
/// Under `DropOldest` the capacity is rounded up to a power of two.
pub fn ingest_channel(config: IngestConfig) -> Result<(ExampleSender, ExampleReceiver)> {
    config.validate()?;

    let (sender, receiver) = match config.overflow {
        OverflowPolicy::Block => {
            let (tx, rx) = mpsc::channel(config.capacity);
            (SenderInner::Queue(tx), ReceiverInner::Queue(rx))
        }
        OverflowPolicy::DropOldest => {
            let (tx, rx) = broadcast::channel(config.capacity);
            (SenderInner::Ring(tx), ReceiverInner::Ring(rx))
        }
    };

    Ok((
        ExampleSender { inner: sender },
        ExampleReceiver {
            inner: receiver,
            dropped: 0,
        },
    ))
}

enum SenderInner {
    Queue(mpsc::Sender<Example>),
    Ring(broadcast::Sender<Example>),
}

/// Producer side of the ingestion queue
pub struct ExampleSender {
    inner: SenderInner,
}

impl ExampleSender {
    /// Enqueue an example
    ///
    /// Waits for room under `Block`; never waits under `DropOldest`. Fails
    /// with `IngestClosed` once the receiver is gone.
    pub async fn send(&self, example: Example) -> Result<()> {
        match &self.inner {
            SenderInner::Queue(tx) => tx.send(example).await.map_err(|_| EngineError::IngestClosed),
            SenderInner::Ring(tx) => tx.send(example).map(|_| ()).map_err(|_| EngineError::IngestClosed),
        }
    }
}

enum ReceiverInner {
    Queue(mpsc::Receiver<Example>),
    Ring(broadcast::Receiver<Example>),
}

/// Consumer side of the ingestion queue
pub struct ExampleReceiver {
    inner: ReceiverInner,
    dropped: u64,
}

impl ExampleReceiver {
    /// Next example in arrival order; `None` once every sender is gone and
    /// the queue is drained
    pub async fn recv(&mut self) -> Option<Example> {
        match &mut self.inner {
            ReceiverInner::Queue(rx) => rx.recv().await,
            ReceiverInner::Ring(rx) => loop {
                match rx.recv().await {
                    Ok(example) => return Some(example),
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        self.dropped += n;
                        warn!(dropped = n, "ingestion queue full, oldest examples dropped");
                    }
                    Err(broadcast::error::RecvError::Closed) => return None,
                }
            },
        }
    }

    /// Examples overwritten before they could be received
    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}

/// Create a stop handle and the signal it controls
pub fn stop_channel() -> (StopHandle, StopSignal) {
    let (tx, rx) = watch::channel(false);
    (StopHandle { tx }, StopSignal { rx })
}

/// Requests a cooperative stop
#[derive(Debug)]
pub struct StopHandle {
    tx: watch::Sender<bool>,
}

impl StopHandle {
    pub fn stop(&self) {
        self.tx.send_replace(true);
    }
}

/// Observed between examples by the processing loops
#[derive(Debug, Clone)]
pub struct StopSignal {
    rx: watch::Receiver<bool>,
}

impl StopSignal {
    pub fn is_stopped(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once a stop is requested; never resolves if the handle was
    /// dropped without stopping
    pub async fn stopped(&mut self) {
        if self.rx.wait_for(|stopped| *stopped).await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn example(seq: u64) -> Example {
        Example::new(seq).with_numeric("x", seq as f64)
    }

    #[tokio::test]
    async fn test_block_preserves_order() {
        let (tx, mut rx) = ingest_channel(IngestConfig::new(4, OverflowPolicy::Block)).unwrap();
        for seq in 0..4 {
            tx.send(example(seq)).await.unwrap();
        }
        drop(tx);

        let mut seen = Vec::new();
        while let Some(example) = rx.recv().await {
            seen.push(example.seq());
        }
        assert_eq!(seen, vec![0, 1, 2, 3]);
        assert_eq!(rx.dropped(), 0);
    }

    #[tokio::test]
    async fn test_drop_oldest_counts_overwritten() {
        let (tx, mut rx) = ingest_channel(IngestConfig::new(4, OverflowPolicy::DropOldest)).unwrap();
        for seq in 0..10 {
            tx.send(example(seq)).await.unwrap();
        }
        drop(tx);

        let mut seen = Vec::new();
        while let Some(example) = rx.recv().await {
            seen.push(example.seq());
        }
        assert_eq!(seen, vec![6, 7, 8, 9]);
        assert_eq!(rx.dropped(), 6);
    }

    #[tokio::test]
    async fn test_send_after_receiver_dropped() {
        let (tx, rx) = ingest_channel(IngestConfig::new(2, OverflowPolicy::Block)).unwrap();
        drop(rx);
        assert!(matches!(tx.send(example(0)).await, Err(EngineError::IngestClosed)));
    }

    #[test]
    fn test_zero_capacity_is_rejected() {
        assert!(ingest_channel(IngestConfig::new(0, OverflowPolicy::DropOldest)).is_err());
    }

    #[tokio::test]
    async fn test_stop_signal() {
        let (handle, mut signal) = stop_channel();
        assert!(!signal.is_stopped());

        handle.stop();
        assert!(signal.is_stopped());
        signal.stopped().await;
    }
}
