//! Bounded-concurrency execution of independent async work items
//!
//! Every fan-out in the scanner goes through [`run_bounded`]. It starts a fixed
//! pool of slots, and each slot repeatedly takes the next item from a shared
//! queue and drives the worker for it to completion. The number of pending
//! worker invocations therefore never exceeds the number of slots.

use futures_util::FutureExt;
use std::any::Any;
use std::collections::VecDeque;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{trace, warn};

/// Run `worker` over every item with at most `limit` invocations in flight.
///
/// Returns one outcome per item, in completion order. An item whose worker
/// returns an error or panics yields `None` and a warning; the remaining items
/// still run. `limit` is clamped to `1..=items.len()`.
pub async fn run_bounded<T, R, F, Fut>(
    items: impl IntoIterator<Item = T>,
    limit: usize,
    worker: F,
) -> Vec<Option<R>>
where
    T: Send + 'static,
    R: Send + 'static,
    F: Fn(T) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<R>> + Send + 'static,
{
    let queue: VecDeque<T> = items.into_iter().collect();
    let total = queue.len();
    if total == 0 {
        return Vec::new();
    }

    let slots = limit.clamp(1, total);
    trace!(items = total, slots, "Starting bounded run");

    let queue = Arc::new(Mutex::new(queue));
    let worker = Arc::new(worker);
    let (outcome_tx, mut outcome_rx) = mpsc::unbounded_channel();

    let mut pool = JoinSet::new();
    for slot in 0..slots {
        let queue = Arc::clone(&queue);
        let worker = Arc::clone(&worker);
        let outcome_tx = outcome_tx.clone();

        pool.spawn(async move {
            while let Some(item) = take_next(&queue) {
                let invocation = AssertUnwindSafe(async { worker(item).await });
                let outcome = match invocation.catch_unwind().await {
                    Ok(Ok(value)) => Some(value),
                    Ok(Err(e)) => {
                        warn!(slot, error = %e, "Worker failed, recording empty outcome");
                        None
                    }
                    Err(panic) => {
                        warn!(slot, panic = %panic_message(&*panic), "Worker panicked, recording empty outcome");
                        None
                    }
                };
                if outcome_tx.send(outcome).is_err() {
                    break;
                }
            }
        });
    }
    drop(outcome_tx);

    while let Some(joined) = pool.join_next().await {
        if let Err(e) = joined {
            warn!(error = %e, "Executor slot terminated abnormally");
        }
    }

    let mut outcomes = Vec::with_capacity(total);
    while let Some(outcome) = outcome_rx.recv().await {
        outcomes.push(outcome);
    }

    if outcomes.len() < total {
        warn!(
            missing = total - outcomes.len(),
            "Some items produced no outcome, recording them as empty"
        );
        outcomes.resize_with(total, || None);
    }

    outcomes
}

fn take_next<T>(queue: &Mutex<VecDeque<T>>) -> Option<T> {
    queue
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .pop_front()
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
