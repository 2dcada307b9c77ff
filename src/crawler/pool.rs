//! Bounded fan-out / fan-in for one pipeline stage
//!
//! Workers never touch shared counters: every task returns its result to the
//! coordinator, which collects them once the stage drains.

use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// Everything a stage produced
#[derive(Debug)]
pub struct FanIn<T, R> {
    /// Task results, in completion order
    pub results: Vec<R>,

    /// Tasks that panicked; their items produced no result
    pub failed_tasks: usize,

    /// Items never submitted because the run was cancelled
    pub unstarted: Vec<T>,
}

/// Runs `task` over `items` with at most `workers` tasks in flight
///
/// Submission stops as soon as `cancel` fires; tasks already running are
/// awaited. A panicking task is counted and does not disturb its siblings.
///
/// # Arguments
///
/// * `items` - The batch this stage owns
/// * `workers` - Maximum concurrent tasks (at least 1)
/// * `cancel` - Run-level cancellation signal
/// * `task` - Builds the future processing one item
pub async fn fan_out<T, R, F, Fut>(
    items: Vec<T>,
    workers: usize,
    cancel: &CancellationToken,
    task: F,
) -> FanIn<T, R>
where
    T: Send + 'static,
    R: Send + 'static,
    F: Fn(T) -> Fut,
    Fut: Future<Output = R> + Send + 'static,
{
    let semaphore = Arc::new(Semaphore::new(workers.max(1)));
    let mut set = JoinSet::new();
    let mut results = Vec::with_capacity(items.len());
    let mut unstarted = Vec::new();
    let mut pending = items.into_iter();

    while let Some(item) = pending.next() {
        let permit = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            permit = Arc::clone(&semaphore).acquire_owned() => permit.ok(),
        };

        let Some(permit) = permit else {
            unstarted.push(item);
            unstarted.extend(pending.by_ref());
            break;
        };

        let work = task(item);
        set.spawn(async move {
            let _permit = permit;
            work.await
        });
    }

    let mut failed_tasks = 0;
    while let Some(joined) = set.join_next().await {
        match joined {
            Ok(result) => results.push(result),
            Err(e) => {
                tracing::error!("Worker task failed: {}", e);
                failed_tasks += 1;
            }
        }
    }

    if !unstarted.is_empty() {
        tracing::warn!("Cancelled with {} items not started", unstarted.len());
    }

    FanIn {
        results,
        failed_tasks,
        unstarted,
    }
}
