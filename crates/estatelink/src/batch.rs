//! Best-effort batch execution for sweep fan-out.
//!
//! Every scheduled sweep processes entities independently: one failing item
//! is logged and recorded, the rest of the batch still runs.

use std::fmt;

use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchFailure {
    pub key: String,
    pub reason: String,
}

/// Tally of one best-effort batch run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchOutcome {
    pub attempted: usize,
    pub completed: usize,
    pub failures: Vec<BatchFailure>,
}

impl BatchOutcome {
    pub fn merge(mut self, other: BatchOutcome) -> BatchOutcome {
        self.attempted += other.attempted;
        self.completed += other.completed;
        self.failures.extend(other.failures);
        self
    }
}

/// Runs `op` over every item, catching per-item failures instead of
/// propagating them. `key` labels the item in logs and in the outcome.
pub fn run_batch<T, K, F, E>(label: &str, items: Vec<T>, key: K, mut op: F) -> BatchOutcome
where
    K: Fn(&T) -> String,
    F: FnMut(T) -> Result<(), E>,
    E: fmt::Display,
{
    let mut outcome = BatchOutcome::default();

    for item in items {
        let item_key = key(&item);
        outcome.attempted += 1;
        match op(item) {
            Ok(()) => outcome.completed += 1,
            Err(err) => {
                tracing::warn!(batch = label, item = %item_key, error = %err, "batch item failed");
                outcome.failures.push(BatchFailure {
                    key: item_key,
                    reason: err.to_string(),
                });
            }
        }
    }

    outcome
}
