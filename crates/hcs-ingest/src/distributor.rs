//! Work distributor
//!
//! A bounded queue of records between the reader and the worker pool. A full
//! queue blocks the reader, which keeps memory flat when parsing outpaces the
//! database. The queue closes when its only [`RecordSender`] is dropped or
//! closed, so there is exactly one close and it always follows the last push.

use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, Mutex};

use crate::models::InsuranceService;

/// Every receiver is gone; the record could not be queued
#[derive(Debug, Error)]
#[error("work queue has no consumers left")]
pub struct QueueClosed;

/// Create a queue holding at most `capacity` records (minimum 1)
pub fn work_queue(capacity: usize) -> (RecordSender, RecordReceiver) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (
        RecordSender { tx },
        RecordReceiver {
            rx: Arc::new(Mutex::new(rx)),
        },
    )
}

/// Producer half; deliberately not `Clone`
#[derive(Debug)]
pub struct RecordSender {
    tx: mpsc::Sender<InsuranceService>,
}

impl RecordSender {
    /// Queue a record, waiting while the queue is full
    #[cfg(test)]
    async fn push(&self, record: InsuranceService) -> Result<(), QueueClosed> {
        self.tx.send(record).await.map_err(|_| QueueClosed)
    }

    /// Blocking variant for the reader thread; must not be called from async code
    pub fn push_blocking(&self, record: InsuranceService) -> Result<(), QueueClosed> {
        self.tx.blocking_send(record).map_err(|_| QueueClosed)
    }

    /// Close the queue; workers drain what is left and then stop
    pub fn close(self) {
        drop(self);
    }
}

/// Consumer half, shared by all workers
#[derive(Debug, Clone)]
pub struct RecordReceiver {
    rx: Arc<Mutex<mpsc::Receiver<InsuranceService>>>,
}

impl RecordReceiver {
    /// Next record, or `None` once the queue is closed and empty
    pub async fn pull(&self) -> Option<InsuranceService> {
        self.rx.lock().await.recv().await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn service(name: &str) -> InsuranceService {
        InsuranceService {
            negotiation_arrangement: "ffs".to_string(),
            name: name.to_string(),
            billing_code_type: "CPT".to_string(),
            billing_code_type_version: "2024".to_string(),
            billing_code: "99213".to_string(),
            description: None,
            negotiated_rates: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_push_blocks_when_full() {
        let (tx, rx) = work_queue(2);
        tx.push(service("a")).await.unwrap();
        tx.push(service("b")).await.unwrap();

        let blocked = tokio::time::timeout(Duration::from_millis(50), tx.push(service("c"))).await;
        assert!(blocked.is_err(), "push should wait while the queue is full");

        assert_eq!(rx.pull().await.unwrap().name, "a");
        tx.push(service("c")).await.unwrap();
    }

    #[tokio::test]
    async fn test_close_drains_then_ends_every_consumer() {
        let (tx, rx) = work_queue(4);
        let other = rx.clone();

        tx.push(service("a")).await.unwrap();
        tx.push(service("b")).await.unwrap();
        tx.close();

        let mut names = vec![rx.pull().await.unwrap().name, other.pull().await.unwrap().name];
        names.sort();
        assert_eq!(names, vec!["a", "b"]);

        assert!(rx.pull().await.is_none());
        assert!(other.pull().await.is_none());
    }

    #[tokio::test]
    async fn test_push_fails_without_consumers() {
        let (tx, rx) = work_queue(1);
        drop(rx);
        assert!(tx.push(service("orphan")).await.is_err());
    }

    #[tokio::test]
    async fn test_blocking_push_from_reader_thread() {
        let (tx, rx) = work_queue(1);

        let producer = tokio::task::spawn_blocking(move || {
            for name in ["a", "b", "c"] {
                tx.push_blocking(service(name)).unwrap();
            }
        });

        let mut received = Vec::new();
        while let Some(record) = rx.pull().await {
            received.push(record.name);
        }
        producer.await.unwrap();

        assert_eq!(received, vec!["a", "b", "c"]);
    }
}
