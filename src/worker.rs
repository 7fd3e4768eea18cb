//! Background worker routines.
//!
//! Each worker is a dedicated OS thread driving a small current-thread tokio
//! runtime, so its sleep can be raced against a [`CancellationToken`]. A cycle
//! is: sleep per [`DelayPolicy`](crate::config::DelayPolicy), build a task,
//! then either post it to the owner thread or, in the racy `Direct` mode,
//! run it right here.

use std::thread::{self, JoinHandle};

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::config::{SubmitMode, WorkerConfig};
use crate::dispatch::{permit_off_thread, DispatchQueue, Task};
use crate::{hlog_debug, hlog_warn, Error, Result};

/// Counters returned when a worker thread exits.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WorkerReport {
    pub name: String,
    pub cycles: u64,
    pub submitted: u64,
    pub direct_runs: u64,
    pub failures: u64,
}

pub struct Worker {
    name: String,
    config: WorkerConfig,
    queue: DispatchQueue,
    work: Box<dyn FnMut() -> Task + Send>,
    rng: StdRng,
}

impl Worker {
    pub fn new<F>(
        name: impl Into<String>,
        config: WorkerConfig,
        queue: DispatchQueue,
        work: F,
    ) -> Self
    where
        F: FnMut() -> Task + Send + 'static,
    {
        Self {
            name: name.into(),
            config,
            queue,
            work: Box::new(work),
            rng: StdRng::from_entropy(),
        }
    }

    /// Make the delay sequence reproducible.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn spawn(self) -> Result<WorkerHandle> {
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let name = self.name.clone();

        hlog_debug!(
            "Worker::spawn name={} mode={:?} delay={:?}",
            name,
            self.config.mode,
            self.config.delay
        );

        let thread = thread::Builder::new()
            .name(name.clone())
            .spawn(move || self.run(token))?;

        Ok(WorkerHandle {
            name,
            cancel,
            thread: Some(thread),
        })
    }

    fn run(mut self, cancel: CancellationToken) -> Result<WorkerReport> {
        tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()?
            .block_on(self.run_async(cancel))
    }

    async fn run_async(&mut self, cancel: CancellationToken) -> Result<WorkerReport> {
        let mut report = WorkerReport {
            name: self.name.clone(),
            ..WorkerReport::default()
        };

        if self.config.mode == SubmitMode::Direct {
            hlog_warn!(
                "{}: DIRECT mode, mutations will race the owner thread",
                self.name
            );
        }

        loop {
            let delay = self.config.delay.next(&mut self.rng);
            tokio::select! {
                _ = cancel.cancelled() => {
                    hlog_debug!("{} cancelled", self.name);
                    break;
                }
                _ = tokio::time::sleep(delay) => {}
            }

            report.cycles += 1;
            let task = (self.work)();

            match self.config.mode {
                SubmitMode::ViaQueue => match self.queue.submit_task(task) {
                    Ok(()) => report.submitted += 1,
                    Err(e @ (Error::SubmitAfterStop | Error::QueueClosed)) => {
                        hlog_debug!("{}: {}, exiting", self.name, e);
                        break;
                    }
                    Err(e) => {
                        report.failures += 1;
                        hlog_warn!("{}: submit failed: {}", self.name, e);
                    }
                },
                SubmitMode::Direct => {
                    report.direct_runs += 1;
                    let seq = report.cycles;
                    if let Err(e) = permit_off_thread(|| task.run_isolated(seq)) {
                        report.failures += 1;
                        hlog_warn!("{}: direct run failed: {}", self.name, e);
                    }
                }
            }
        }

        hlog_debug!(
            "{} exited: cycles={} submitted={} direct_runs={} failures={}",
            report.name,
            report.cycles,
            report.submitted,
            report.direct_runs,
            report.failures
        );
        Ok(report)
    }
}

/// Handle to a running worker. Dropping it cancels the worker without
/// waiting; [`join`](Self::join) cancels and waits.
pub struct WorkerHandle {
    name: String,
    cancel: CancellationToken,
    thread: Option<JoinHandle<Result<WorkerReport>>>,
}

impl WorkerHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Signal the worker to stop at its next sleep/wake boundary.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn join(mut self) -> Result<WorkerReport> {
        self.shutdown();
        let Some(thread) = self.thread.take() else {
            return Err(Error::ThreadJoin(format!("{} already joined", self.name)));
        };
        thread
            .join()
            .map_err(|_| Error::ThreadJoin(format!("{} panicked", self.name)))?
    }
}

impl Drop for WorkerHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
