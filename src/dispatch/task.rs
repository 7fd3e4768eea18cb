//! Deferred units of work posted to the owner thread.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};

use crate::log::panic_message;
use crate::{Error, Result};

type Job = Box<dyn FnOnce() -> Result<()> + Send + 'static>;

/// A zero-argument action, executed once on the owner thread.
///
/// Captures are moved in at construction; the task is consumed when it runs.
pub struct Task {
    job: Job,
    label: &'static str,
}

impl Task {
    /// Wrap an infallible closure.
    pub fn new<F>(f: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self {
            job: Box::new(move || {
                f();
                Ok(())
            }),
            label: "task",
        }
    }

    /// Wrap a closure whose `Err` counts as a task failure.
    pub fn fallible<F>(f: F) -> Self
    where
        F: FnOnce() -> Result<()> + Send + 'static,
    {
        Self {
            job: Box::new(f),
            label: "task",
        }
    }

    /// Name shown in log lines.
    pub fn labeled(mut self, label: &'static str) -> Self {
        self.label = label;
        self
    }

    pub fn label(&self) -> &'static str {
        self.label
    }

    /// Run to completion, converting both `Err` and panics into an error
    /// tagged with `seq`. Never unwinds into the caller.
    pub fn run_isolated(self, seq: u64) -> Result<()> {
        match panic::catch_unwind(AssertUnwindSafe(self.job)) {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(Error::TaskFailed {
                seq,
                reason: e.to_string(),
            }),
            Err(payload) => Err(Error::TaskPanicked {
                seq,
                message: panic_message(payload.as_ref()),
            }),
        }
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task").field("label", &self.label).finish()
    }
}
