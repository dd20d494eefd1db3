// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Bounded concurrent execution of independent work items

use futures_util::future::join_all;
use std::future::Future;
use tokio::sync::Semaphore;
use tracing::{debug, error};

use crate::Result;

/// A unit of work identified by a stable key (e.g. a filename)
pub trait WorkItem {
    fn id(&self) -> &str;
}

/// Terminal result of one work item
#[derive(Debug)]
pub struct Outcome<T> {
    /// Identifier of the originating item
    pub id: String,
    pub result: Result<T>,
}

impl<T> Outcome<T> {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// Run `worker` over every item with at most `limit` in flight.
///
/// Every item yields exactly one [`Outcome`]; a failing item never cancels
/// the others. Returns only once all items have finished. Outcomes are
/// matched back to items by `id`, not by position.
pub async fn run_all<I, T, F, Fut>(items: Vec<I>, limit: usize, worker: F) -> Vec<Outcome<T>>
where
    I: WorkItem,
    F: Fn(I) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let gate = Semaphore::new(limit.max(1));
    let total = items.len();

    let tasks = items.into_iter().map(|item| {
        let gate = &gate;
        let worker = &worker;
        async move {
            let id = item.id().to_string();
            // The semaphore is never closed, so acquire cannot fail
            let result = match gate.acquire().await {
                Ok(_permit) => {
                    debug!("Started {}", id);
                    worker(item).await
                }
                Err(e) => Err(crate::ImagecatError::Config(format!("Concurrency gate closed: {}", e))),
            };
            if let Err(ref e) = result {
                error!("Error processing {}: {}", id, e);
            }
            Outcome { id, result }
        }
    });

    let outcomes = join_all(tasks).await;
    debug!(
        "Batch finished: {}/{} succeeded",
        outcomes.iter().filter(|o| o.is_success()).count(),
        total
    );
    outcomes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ImagecatError;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct Item(String);

    impl WorkItem for Item {
        fn id(&self) -> &str {
            &self.0
        }
    }

    fn items(n: usize) -> Vec<Item> {
        (0..n).map(|i| Item(format!("item-{}", i))).collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_one_outcome_per_item() {
        let outcomes = run_all(items(7), 3, |item| async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            Ok(item.0.len())
        })
        .await;

        assert_eq!(outcomes.len(), 7);
        let ids: HashSet<_> = outcomes.iter().map(|o| o.id.clone()).collect();
        assert_eq!(ids.len(), 7);
        assert!(outcomes.iter().all(|o| o.is_success()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrency_is_capped() {
        let in_flight = AtomicUsize::new(0);
        let peak = AtomicUsize::new(0);

        let outcomes = run_all(items(10), 2, |_item| {
            let in_flight = &in_flight;
            let peak = &peak;
            async move {
                let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(50)).await;
                in_flight.fetch_sub(1, Ordering::SeqCst);
                Ok(())
            }
        })
        .await;

        assert_eq!(outcomes.len(), 10);
        assert_eq!(peak.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_does_not_cancel_others() {
        let outcomes = run_all(items(5), 2, |item| async move {
            if item.0 == "item-1" || item.0 == "item-3" {
                Err(ImagecatError::Provider { status: 400, message: "bad".into() })
            } else {
                tokio::time::sleep(Duration::from_millis(5)).await;
                Ok(())
            }
        })
        .await;

        let failed: HashSet<_> = outcomes
            .iter()
            .filter(|o| !o.is_success())
            .map(|o| o.id.as_str())
            .collect();
        assert_eq!(outcomes.len(), 5);
        assert_eq!(failed, HashSet::from(["item-1", "item-3"]));
    }

    #[tokio::test]
    async fn test_empty_batch() {
        let outcomes = run_all(Vec::<Item>::new(), 2, |_item| async { Ok(()) }).await;
        assert!(outcomes.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_limit_runs_serially() {
        let in_flight = AtomicUsize::new(0);
        let peak = AtomicUsize::new(0);
        let outcomes = run_all(items(3), 0, |_item| {
            let in_flight = &in_flight;
            let peak = &peak;
            async move {
                let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                in_flight.fetch_sub(1, Ordering::SeqCst);
                Ok(())
            }
        })
        .await;
        assert_eq!(outcomes.len(), 3);
        assert_eq!(peak.load(Ordering::SeqCst), 1);
    }
}
