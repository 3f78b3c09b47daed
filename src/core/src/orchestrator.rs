//! Bounded batch orchestrator.
//!
//! Runs one blocking task per work item on the blocking thread pool, with at
//! most `worker_limit` tasks in flight. A permit is taken before each spawn and
//! released when the task returns (or panics), so submission itself waits for
//! a free slot. The call returns once every item has finished.
//!
//! Items are independent: a failing or panicking task only produces a failed
//! outcome for its own item.

use std::sync::Arc;

use tokio::sync::Semaphore;

use crate::error::{Result, VaultError};

/// Result of one work item.
#[derive(Debug)]
pub struct ItemOutcome<I, T> {
    pub item: I,
    pub result: Result<T>,
}

impl<I, T> ItemOutcome<I, T> {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

/// Full item → outcome mapping for one batch.
///
/// Outcomes are listed in submission order; completion order is not recorded.
#[derive(Debug)]
pub struct BatchReport<I, T> {
    outcomes: Vec<ItemOutcome<I, T>>,
}

impl<I, T> BatchReport<I, T> {
    pub fn outcomes(&self) -> &[ItemOutcome<I, T>] {
        &self.outcomes
    }

    pub fn into_outcomes(self) -> Vec<ItemOutcome<I, T>> {
        self.outcomes
    }

    pub fn succeeded(&self) -> impl Iterator<Item = &ItemOutcome<I, T>> {
        self.outcomes.iter().filter(|o| o.is_ok())
    }

    pub fn failed(&self) -> impl Iterator<Item = &ItemOutcome<I, T>> {
        self.outcomes.iter().filter(|o| !o.is_ok())
    }

    pub fn has_failures(&self) -> bool {
        self.outcomes.iter().any(|o| !o.is_ok())
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }
}

/// Run `task` once per item with at most `worker_limit` concurrent invocations.
///
/// A `worker_limit` of 0 is treated as 1.
pub async fn run_bounded<I, T, F>(items: Vec<I>, worker_limit: usize, task: F) -> BatchReport<I, T>
where
    I: Clone + Send + 'static,
    T: Send + 'static,
    F: Fn(I) -> Result<T> + Send + Sync + 'static,
{
    let limit = worker_limit.max(1);
    let semaphore = Arc::new(Semaphore::new(limit));
    let task = Arc::new(task);

    let mut pending = Vec::with_capacity(items.len());
    for item in items {
        // The semaphore is never closed, so acquisition only waits.
        let permit = match Arc::clone(&semaphore).acquire_owned().await {
            Ok(permit) => permit,
            Err(e) => {
                pending.push((item, None, Some(e.to_string())));
                continue;
            }
        };

        let task = Arc::clone(&task);
        let worker_item = item.clone();
        let handle = tokio::task::spawn_blocking(move || {
            let _permit = permit;
            task(worker_item)
        });
        pending.push((item, Some(handle), None));
    }

    let outcomes = futures::future::join_all(pending.into_iter().map(
        |(item, handle, acquire_error)| async move {
            let result = match (handle, acquire_error) {
                (Some(handle), _) => match handle.await {
                    Ok(result) => result,
                    Err(e) => Err(VaultError::Other(format!("worker task failed: {e}"))),
                },
                (None, error) => Err(VaultError::Other(format!(
                    "worker slot unavailable: {}",
                    error.unwrap_or_default()
                ))),
            };
            ItemOutcome { item, result }
        },
    ))
    .await;

    BatchReport { outcomes }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    /// Tracks how many tasks are running right now and the peak seen.
    #[derive(Default)]
    struct Gauge {
        current: AtomicUsize,
        peak: AtomicUsize,
        calls: AtomicUsize,
    }

    impl Gauge {
        fn enter(&self) {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
        }

        fn exit(&self) {
            self.current.fetch_sub(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn test_runs_every_item_exactly_once() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_task = Arc::clone(&seen);
        let items: Vec<u32> = (0..25).collect();

        let report = run_bounded(items, 4, move |i| {
            seen_task.lock().unwrap().push(i);
            Ok(i * 2)
        })
        .await;

        assert_eq!(report.len(), 25);
        assert!(!report.has_failures());
        let mut seen = seen.lock().unwrap().clone();
        seen.sort();
        assert_eq!(seen, (0..25).collect::<Vec<_>>());
        for outcome in report.outcomes() {
            assert_eq!(*outcome.result.as_ref().unwrap(), outcome.item * 2);
        }
    }

    #[tokio::test]
    async fn test_concurrency_never_exceeds_limit() {
        for limit in [1usize, 2, 3, 5] {
            let gauge = Arc::new(Gauge::default());
            let g = Arc::clone(&gauge);

            let report = run_bounded((0..12).collect::<Vec<u32>>(), limit, move |_| {
                g.enter();
                std::thread::sleep(Duration::from_millis(15));
                g.exit();
                Ok(())
            })
            .await;

            assert_eq!(report.len(), 12);
            assert_eq!(gauge.calls.load(Ordering::SeqCst), 12);
            assert_eq!(gauge.current.load(Ordering::SeqCst), 0);
            let peak = gauge.peak.load(Ordering::SeqCst);
            assert!(peak <= limit, "peak {peak} exceeded limit {limit}");
            assert!(peak >= 1);
        }
    }

    #[tokio::test]
    async fn test_join_barrier_waits_for_all() {
        let done = Arc::new(AtomicUsize::new(0));
        let d = Arc::clone(&done);

        run_bounded((0..6).collect::<Vec<u64>>(), 3, move |i| {
            std::thread::sleep(Duration::from_millis(5 * (6 - i)));
            d.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
        .await;

        assert_eq!(done.load(Ordering::SeqCst), 6);
    }

    #[tokio::test]
    async fn test_failure_is_isolated() {
        let items = vec!["ok-1", "bad", "ok-2", "ok-3"];
        let report = run_bounded(items, 2, |item: &'static str| {
            if item == "bad" {
                Err(VaultError::Other("boom".to_string()))
            } else {
                Ok(item.len())
            }
        })
        .await;

        assert!(report.has_failures());
        let ok: HashSet<_> = report.succeeded().map(|o| o.item).collect();
        assert_eq!(ok, HashSet::from(["ok-1", "ok-2", "ok-3"]));
        let failed: Vec<_> = report.failed().map(|o| o.item).collect();
        assert_eq!(failed, vec!["bad"]);
    }

    #[tokio::test]
    async fn test_panic_is_isolated() {
        let report = run_bounded(vec![1, 2, 3], 1, |i: i32| {
            if i == 2 {
                panic!("worker blew up");
            }
            Ok(i)
        })
        .await;

        assert_eq!(report.len(), 3);
        assert_eq!(report.succeeded().count(), 2);
        let failed: Vec<_> = report.failed().collect();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].item, 2);
        assert!(matches!(failed[0].result, Err(VaultError::Other(_))));
    }

    #[tokio::test]
    async fn test_zero_limit_treated_as_one() {
        let gauge = Arc::new(Gauge::default());
        let g = Arc::clone(&gauge);
        let report = run_bounded(vec![(); 4], 0, move |_| {
            g.enter();
            std::thread::sleep(Duration::from_millis(5));
            g.exit();
            Ok(())
        })
        .await;
        assert_eq!(report.len(), 4);
        assert_eq!(gauge.peak.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_empty_batch() {
        let report = run_bounded(Vec::<String>::new(), 3, |_| Ok(())).await;
        assert!(report.is_empty());
        assert!(!report.has_failures());
    }

    #[tokio::test]
    async fn test_outcomes_follow_submission_order() {
        let report = run_bounded(vec![3u64, 1, 2], 3, |i| {
            std::thread::sleep(Duration::from_millis(i * 10));
            Ok(i)
        })
        .await;
        let items: Vec<_> = report.into_outcomes().into_iter().map(|o| o.item).collect();
        assert_eq!(items, vec![3, 1, 2]);
    }
}
