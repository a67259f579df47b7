//! Scoped worker pool for per-file extraction jobs.

use std::collections::VecDeque;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::mpsc::channel;
use std::sync::{Arc, Mutex};

/// Resolve how many workers to start for `jobs` items.
///
/// `requested` of `None` (or zero) means one worker per available core.
pub(crate) fn worker_count(requested: Option<usize>, jobs: usize) -> usize {
    let wanted = requested.filter(|n| *n > 0).unwrap_or_else(|| {
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
    });
    wanted.min(jobs).max(1)
}

/// Apply `job` to every item on a scoped pool and return results in input order.
///
/// Workers pull from a shared queue; the call returns once every worker has
/// drained it and joined. A job that panics yields `Err` with the panic message
/// for its own slot only; the remaining items still run.
pub(crate) fn run_ordered<T, R, F>(items: &[T], workers: usize, job: F) -> Vec<Result<R, String>>
where
    T: Sync,
    R: Send,
    F: Fn(&T) -> R + Sync,
{
    if items.is_empty() {
        return Vec::new();
    }
    let queue = Arc::new(Mutex::new((0..items.len()).collect::<VecDeque<usize>>()));
    let (tx, rx) = channel();
    let job = &job;

    std::thread::scope(|scope| {
        for _ in 0..workers.clamp(1, items.len()) {
            let queue = Arc::clone(&queue);
            let tx = tx.clone();
            scope.spawn(move || {
                loop {
                    let next = queue
                        .lock()
                        .unwrap_or_else(|poisoned| poisoned.into_inner())
                        .pop_front();
                    let Some(index) = next else {
                        break;
                    };
                    let outcome = catch_unwind(AssertUnwindSafe(|| job(&items[index])))
                        .map_err(panic_to_string);
                    if tx.send((index, outcome)).is_err() {
                        return;
                    }
                }
            });
        }
    });
    drop(tx);

    let mut slots: Vec<Option<Result<R, String>>> =
        std::iter::repeat_with(|| None).take(items.len()).collect();
    for (index, result) in rx {
        slots[index] = Some(result);
    }
    slots
        .into_iter()
        .map(|slot| slot.unwrap_or_else(|| Err("Worker stopped before running this job".to_string())))
        .collect()
}

fn panic_to_string(payload: Box<dyn std::any::Any + Send>) -> String {
    let message = if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "Unknown panic payload".to_string()
    };
    format!("Extraction worker panicked: {message}")
}
