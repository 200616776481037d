//! Bounded concurrent execution with per-task fault capture.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::future::join_all;
use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::task::AbortHandle;

/// Pipeline stage a fault happened in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    ListingPage,
    ListingExtraction,
    Article,
    Redirect,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::ListingPage => "listing_page",
            Stage::ListingExtraction => "listing_extraction",
            Stage::Article => "article",
            Stage::Redirect => "redirect",
        };
        f.write_str(s)
    }
}

/// One failed unit of work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FaultRecord {
    pub stage: Stage,
    pub url: String,
    pub message: String,
}

impl FaultRecord {
    pub fn new(stage: Stage, url: impl Into<String>, message: impl fmt::Display) -> Self {
        Self {
            stage,
            url: url.into(),
            message: message.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TaskOutcome<T> {
    Done(T),
    Fault(FaultRecord),
}

impl<T> TaskOutcome<T> {
    pub fn ok(self) -> Option<T> {
        match self {
            TaskOutcome::Done(value) => Some(value),
            TaskOutcome::Fault(_) => None,
        }
    }
}

/// Aborts spawned tasks whose caller stopped waiting for them.
struct AbortOnDrop(Vec<AbortHandle>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        for handle in &self.0 {
            handle.abort();
        }
    }
}

/// Runs tasks concurrently, at most `limit` at a time.
///
/// Every task is spawned, so a panic in one is caught and reported as a fault
/// instead of tearing down its siblings. Outcomes come back in input order.
/// Dropping the returned future cancels the tasks still running.
#[derive(Clone)]
pub struct BoundedFanOut {
    gate: Arc<Semaphore>,
}

impl BoundedFanOut {
    pub fn new(limit: usize) -> Self {
        Self {
            gate: Arc::new(Semaphore::new(limit.max(1))),
        }
    }

    pub async fn run<I, T, L, F, Fut>(&self, items: Vec<I>, label: L, task: F) -> Vec<TaskOutcome<T>>
    where
        L: Fn(&I) -> (Stage, String),
        F: Fn(I) -> Fut,
        Fut: Future<Output = Result<T, FaultRecord>> + Send + 'static,
        T: Send + 'static,
    {
        let mut labels = Vec::with_capacity(items.len());
        let mut handles = Vec::with_capacity(items.len());
        for item in items {
            let (stage, url) = label(&item);
            let gate = self.gate.clone();
            let work = task(item);
            let permit_url = url.clone();
            handles.push(tokio::spawn(async move {
                let _permit = gate
                    .acquire_owned()
                    .await
                    .map_err(|e| FaultRecord::new(stage, permit_url, e))?;
                work.await
            }));
            labels.push((stage, url));
        }

        let _guard = AbortOnDrop(handles.iter().map(|h| h.abort_handle()).collect());
        join_all(handles)
            .await
            .into_iter()
            .zip(labels)
            .map(|(joined, (stage, url))| match joined {
                Ok(Ok(value)) => TaskOutcome::Done(value),
                Ok(Err(fault)) => TaskOutcome::Fault(fault),
                Err(join_error) => TaskOutcome::Fault(FaultRecord::new(stage, url, join_error)),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn label(n: &usize) -> (Stage, String) {
        (Stage::Article, format!("https://a.ua/{}", n))
    }

    #[tokio::test]
    async fn test_never_exceeds_limit() {
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let fan_out = BoundedFanOut::new(3);

        let outcomes = fan_out
            .run((0..20).collect(), label, |n: usize| {
                let in_flight = in_flight.clone();
                let peak = peak.clone();
                async move {
                    let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    in_flight.fetch_sub(1, Ordering::SeqCst);
                    Ok(n * 2)
                }
            })
            .await;

        assert!(peak.load(Ordering::SeqCst) <= 3);
        let values: Vec<_> = outcomes.into_iter().filter_map(TaskOutcome::ok).collect();
        assert_eq!(values, (0..20).map(|n| n * 2).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_faults_and_panics_do_not_cancel_siblings() {
        let fan_out = BoundedFanOut::new(2);
        let outcomes = fan_out
            .run(vec![1usize, 2, 3, 4], label, |n: usize| async move {
                match n {
                    2 => Err(FaultRecord::new(Stage::Article, format!("https://a.ua/{}", n), "boom")),
                    3 => panic!("extractor bug"),
                    _ => Ok(n),
                }
            })
            .await;

        assert_eq!(outcomes[0], TaskOutcome::Done(1));
        assert!(matches!(&outcomes[1], TaskOutcome::Fault(f) if f.message == "boom"));
        assert!(matches!(&outcomes[2], TaskOutcome::Fault(f) if f.url == "https://a.ua/3"));
        assert_eq!(outcomes[3], TaskOutcome::Done(4));
    }
}
