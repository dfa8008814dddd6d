//! One-shot poll-based tasks.
//!
//! A [`Task`] is the caller-facing handle to a background computation. The
//! caller polls it from its own cooperative loop; the background work settles
//! it exactly once. After that, every poll returns the memoized terminal
//! value — a `Completed` clone or the `Failed` message — so polling is
//! idempotent.
//!
//! # Lifecycle
//!
//! ```text
//! Engine validates descriptor (sync)
//!   → Task::spawn(work)           — returns immediately, Pending
//!     → work runs on the runtime  — the only place blocking I/O happens
//!       → first terminal write wins (guarded by the state mutex)
//! Caller polls repeatedly         — Pending / Completed / Failed
//! Caller drops the last handle    — work keeps running; result discarded
//! ```

use std::fmt::Display;
use std::future::Future;
use std::sync::{Arc, Mutex, Weak};

/// Observable task state returned by [`Task::poll`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskStatus<T> {
    /// Background work has not reached a terminal state yet.
    Pending,
    /// The work completed; the value is a clone of the memoized result.
    Completed(T),
    /// The work failed; the message is stable across polls.
    Failed(String),
}

impl<T> TaskStatus<T> {
    pub fn is_pending(&self) -> bool {
        matches!(self, TaskStatus::Pending)
    }
}

/// Internal state cell. The mutex is held only for the copy in/out, never
/// across an await point.
enum TaskState<T> {
    Pending,
    Completed(T),
    Failed(String),
}

pub(crate) struct TaskCell<T> {
    state: Mutex<TaskState<T>>,
}

impl<T> TaskCell<T> {
    pub(crate) fn new() -> Self {
        Self {
            state: Mutex::new(TaskState::Pending),
        }
    }

    /// Write the terminal state. First write wins; later attempts are
    /// ignored so a task can never transition twice.
    pub(crate) fn settle(&self, outcome: Result<T, String>) -> bool {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if !matches!(*state, TaskState::Pending) {
            return false;
        }
        *state = match outcome {
            Ok(value) => TaskState::Completed(value),
            Err(message) => TaskState::Failed(message),
        };
        true
    }
}

/// A reference-counted handle to a one-shot background computation.
///
/// Cloning shares the same underlying state. Dropping every handle while the
/// work is still running does not abort it; the work finishes normally and
/// its result is discarded.
pub struct Task<T> {
    cell: Arc<TaskCell<T>>,
}

impl<T> std::fmt::Debug for Task<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Task").finish_non_exhaustive()
    }
}

impl<T> Clone for Task<T> {
    fn clone(&self) -> Self {
        Self {
            cell: Arc::clone(&self.cell),
        }
    }
}

impl<T: Clone + Send + 'static> Task<T> {
    /// Schedule `work` on the runtime and return a Pending handle.
    ///
    /// Never blocks. The spawned future holds only a weak reference to the
    /// task state: if the caller abandons the task, the eventual outcome is
    /// dropped silently.
    pub fn spawn<F, E>(handle: &tokio::runtime::Handle, work: F) -> Self
    where
        F: Future<Output = Result<T, E>> + Send + 'static,
        E: Display,
    {
        let cell = Arc::new(TaskCell::new());
        let weak: Weak<TaskCell<T>> = Arc::downgrade(&cell);
        handle.spawn(async move {
            let outcome = work.await.map_err(|e| e.to_string());
            match weak.upgrade() {
                Some(cell) => {
                    cell.settle(outcome);
                }
                None => {
                    tracing::debug!("task abandoned before completion, result discarded");
                }
            }
        });
        Self { cell }
    }

    /// Non-blocking state inspection.
    pub fn poll(&self) -> TaskStatus<T> {
        let state = self.cell.state.lock().unwrap_or_else(|e| e.into_inner());
        match &*state {
            TaskState::Pending => TaskStatus::Pending,
            TaskState::Completed(value) => TaskStatus::Completed(value.clone()),
            TaskState::Failed(message) => TaskStatus::Failed(message.clone()),
        }
    }

    #[cfg(test)]
    pub(crate) fn pending_for_test() -> (Self, Arc<TaskCell<T>>) {
        let cell = Arc::new(TaskCell::new());
        (
            Self {
                cell: Arc::clone(&cell),
            },
            cell,
        )
    }
}
