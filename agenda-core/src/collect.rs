//! Aggregation collector: drains the shared channel under a deadline.
//!
//! The deadline starts once, when collection begins, and is not extended by
//! progress. Whatever arrived before it fires is the result; tasks still
//! running are cancelled and their later sends fail without blocking.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{Instant, sleep_until};

use crate::cancel::Canceller;
use crate::diagnostics::SourceReport;
use crate::dispatch::{Arrival, Delivery};

pub const DEFAULT_COLLECT_TIMEOUT: Duration = Duration::from_millis(1000);

#[derive(Debug, Default)]
pub struct Collection {
    /// Events in receipt order
    pub arrivals: Vec<Arrival>,
    pub reports: Vec<SourceReport>,
    /// True when every sender finished before the deadline
    pub complete: bool,
}

pub async fn collect(
    mut rx: mpsc::Receiver<Delivery>,
    timeout: Duration,
    canceller: Canceller,
) -> Collection {
    let deadline = Instant::now() + timeout;
    let mut collection = Collection::default();

    loop {
        tokio::select! {
            biased;
            _ = sleep_until(deadline) => {
                tracing::debug!(
                    received = collection.arrivals.len(),
                    "collection deadline reached"
                );
                break;
            }
            delivery = rx.recv() => match delivery {
                Some(Delivery::Event(arrival)) => collection.arrivals.push(arrival),
                Some(Delivery::Finished(report)) => collection.reports.push(report),
                None => {
                    collection.complete = true;
                    break;
                }
            },
        }
    }

    canceller.cancel();
    rx.close();
    collection
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancel::cancel_pair;
    use crate::diagnostics::Outcome;
    use crate::source::SourceId;

    #[tokio::test(start_paused = true)]
    async fn test_stops_at_deadline_and_cancels() {
        let (tx, rx) = mpsc::channel(8);
        let (canceller, token) = cancel_pair();

        let late = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(5)).await;
            tx.send(Delivery::Finished(SourceReport::pending(SourceId::new("slow"))))
                .await
                .is_ok()
        });

        let collection = collect(rx, Duration::from_secs(1), canceller).await;

        assert!(collection.reports.is_empty());
        assert!(!collection.complete);
        assert!(token.is_cancelled());
        // The late sender sees a closed channel instead of blocking
        assert!(!late.await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_returns_early_when_all_senders_are_done() {
        let (tx, rx) = mpsc::channel(8);
        let (canceller, _token) = cancel_pair();

        tx.send(Delivery::Finished(SourceReport {
            source: SourceId::new("fast"),
            outcome: Outcome::Completed,
            delivered: 0,
            dropped: 0,
        }))
        .await
        .unwrap();
        drop(tx);

        let started = Instant::now();
        let collection = collect(rx, Duration::from_secs(1), canceller).await;

        assert!(collection.complete);
        assert_eq!(collection.reports.len(), 1);
        assert!(started.elapsed() < Duration::from_secs(1));
    }
}
