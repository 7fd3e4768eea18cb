//! The dispatch queue and its owner run loop.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock, PoisonError, RwLock};
use std::thread::{self, JoinHandle, ThreadId};

use crossbeam_channel::{never, select, Receiver, Sender};
use serde::Serialize;

use super::Task;
use crate::log::panic_message;
use crate::{hlog_debug, hlog_error, hlog_trace, Error, Result};

enum Envelope {
    Run { seq: u64, task: Task },
    Stop,
}

/// Point-in-time queue counters.
///
/// `executed` counts every task the owner loop ran, `failed` the subset that
/// panicked or returned `Err`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QueueStats {
    pub submitted: u64,
    pub executed: u64,
    pub failed: u64,
    pub rejected: u64,
}

impl QueueStats {
    /// Tasks accepted but not yet run.
    pub fn pending(&self) -> u64 {
        self.submitted.saturating_sub(self.executed)
    }
}

/// What one owner loop run did before it returned.
///
/// `callback_panics` counts panics caught in `on_event` or `after_turn`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LoopReport {
    pub executed: u64,
    pub failed: u64,
    pub events: u64,
    pub callback_panics: u64,
}

#[derive(Default)]
struct Counters {
    submitted: AtomicU64,
    executed: AtomicU64,
    failed: AtomicU64,
    rejected: AtomicU64,
}

struct Shared {
    tx: Sender<Envelope>,
    /// Submissions send under the read lock, `stop` flips it under the write
    /// lock, so every accepted task is enqueued ahead of the stop marker.
    stopped: RwLock<bool>,
    owner: OnceLock<ThreadId>,
    next_seq: AtomicU64,
    counters: Counters,
}

/// Write side of the queue. Cheap to clone; usable from any thread.
#[derive(Clone)]
pub struct DispatchQueue {
    shared: Arc<Shared>,
}

/// Read side of the queue. Whichever thread runs it becomes the owner.
pub struct OwnerLoop {
    rx: Receiver<Envelope>,
    queue: DispatchQueue,
}

impl DispatchQueue {
    #[allow(clippy::new_ret_no_self)]
    pub fn new() -> (DispatchQueue, OwnerLoop) {
        let (tx, rx) = crossbeam_channel::unbounded();
        let queue = DispatchQueue {
            shared: Arc::new(Shared {
                tx,
                stopped: RwLock::new(false),
                owner: OnceLock::new(),
                next_seq: AtomicU64::new(1),
                counters: Counters::default(),
            }),
        };
        let owner = OwnerLoop {
            rx,
            queue: queue.clone(),
        };
        (queue, owner)
    }

    /// Spawn a named owner thread running [`OwnerLoop::run_until_stopped`].
    ///
    /// The owner is bound before this returns, so affinity checks made right
    /// after the call already know which thread owns the queue.
    pub fn spawn_owner(name: &str) -> Result<(DispatchQueue, JoinHandle<Result<LoopReport>>)> {
        let (queue, owner) = Self::new();
        let handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || owner.run_until_stopped())?;
        queue.bind_owner(handle.thread().id())?;
        Ok((queue, handle))
    }

    /// Post a closure to run on the owner thread.
    pub fn submit<F>(&self, f: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        self.submit_task(Task::new(f))
    }

    /// Enqueue `task` at the tail. Never runs it inline, even on the owner
    /// thread.
    pub fn submit_task(&self, task: Task) -> Result<()> {
        let stopped = self
            .shared
            .stopped
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        if *stopped {
            self.shared.counters.rejected.fetch_add(1, Ordering::Relaxed);
            hlog_debug!("Rejected {} submitted after stop", task.label());
            return Err(Error::SubmitAfterStop);
        }

        let seq = self.shared.next_seq.fetch_add(1, Ordering::Relaxed);
        let label = task.label();
        if self.shared.tx.send(Envelope::Run { seq, task }).is_err() {
            self.shared.counters.rejected.fetch_add(1, Ordering::Relaxed);
            return Err(Error::QueueClosed);
        }
        self.shared.counters.submitted.fetch_add(1, Ordering::Relaxed);
        hlog_trace!("Queued task #{} ({})", seq, label);
        Ok(())
    }

    /// Request orderly termination. Tasks already accepted still run; later
    /// submissions fail with [`Error::SubmitAfterStop`]. Idempotent.
    pub fn stop(&self) {
        let mut stopped = self
            .shared
            .stopped
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if *stopped {
            return;
        }
        *stopped = true;
        // Receiver gone means nothing is left to stop.
        let _ = self.shared.tx.send(Envelope::Stop);
        hlog_debug!("Dispatch queue stop requested");
    }

    pub fn is_stopped(&self) -> bool {
        *self
            .shared
            .stopped
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub fn owner_thread(&self) -> Option<ThreadId> {
        self.shared.owner.get().copied()
    }

    pub fn is_owner_thread(&self) -> bool {
        self.owner_thread() == Some(thread::current().id())
    }

    pub fn stats(&self) -> QueueStats {
        let c = &self.shared.counters;
        QueueStats {
            submitted: c.submitted.load(Ordering::Relaxed),
            executed: c.executed.load(Ordering::Relaxed),
            failed: c.failed.load(Ordering::Relaxed),
            rejected: c.rejected.load(Ordering::Relaxed),
        }
    }

    fn bind_owner(&self, id: ThreadId) -> Result<()> {
        let owner = *self.shared.owner.get_or_init(|| id);
        if owner != id {
            return Err(Error::Validation(format!(
                "dispatch queue already owned by {:?}",
                owner
            )));
        }
        Ok(())
    }
}

impl OwnerLoop {
    /// The write side of this loop's queue.
    pub fn queue(&self) -> &DispatchQueue {
        &self.queue
    }

    /// Execute tasks until [`DispatchQueue::stop`] is observed. Blocks while
    /// the queue is empty.
    pub fn run_until_stopped(self) -> Result<LoopReport> {
        let no_events = never::<()>();
        self.run_with_events(&no_events, |()| {}, || {})
    }

    /// Process-lifetime variant. Only returns once `stop` is called, which
    /// normal operation never does.
    pub fn run_forever(self) -> Result<LoopReport> {
        self.run_until_stopped()
    }

    /// Run the loop while also servicing a native event source.
    ///
    /// Events are handed to `on_event` inline on the owner thread; they do not
    /// pass through the task queue. `after_turn` runs after every task or
    /// event. A panic in either callback is logged and counted; the loop
    /// keeps running. A disconnected event source is dropped from the wait
    /// set.
    pub fn run_with_events<E>(
        self,
        events: &Receiver<E>,
        mut on_event: impl FnMut(E),
        mut after_turn: impl FnMut(),
    ) -> Result<LoopReport> {
        self.queue.bind_owner(thread::current().id())?;
        hlog_debug!(
            "Owner loop started on thread {:?}",
            thread::current().name().unwrap_or("unnamed")
        );

        let no_events = never::<E>();
        let mut events_live = true;
        let mut report = LoopReport::default();

        loop {
            let source = if events_live { events } else { &no_events };
            select! {
                recv(self.rx) -> msg => match msg {
                    Ok(Envelope::Run { seq, task }) => self.execute(seq, task, &mut report),
                    // The loop holds a sender, so disconnection cannot happen
                    // while it runs; treat it like a stop anyway.
                    Ok(Envelope::Stop) | Err(_) => break,
                },
                recv(source) -> event => match event {
                    Ok(event) => {
                        report.events += 1;
                        isolate_callback("on_event", || on_event(event), &mut report);
                    }
                    Err(_) => {
                        hlog_debug!("Owner loop event source disconnected");
                        events_live = false;
                        continue;
                    }
                },
            }
            isolate_callback("after_turn", &mut after_turn, &mut report);
        }

        hlog_debug!(
            "Owner loop stopped: executed={} failed={} events={} callback_panics={}",
            report.executed,
            report.failed,
            report.events,
            report.callback_panics
        );
        Ok(report)
    }

    fn execute(&self, seq: u64, task: Task, report: &mut LoopReport) {
        let label = task.label();
        let counters = &self.queue.shared.counters;
        let outcome = task.run_isolated(seq);

        report.executed += 1;
        counters.executed.fetch_add(1, Ordering::Relaxed);
        match outcome {
            Ok(()) => hlog_trace!("Task #{} ({}) done", seq, label),
            Err(e) => {
                report.failed += 1;
                counters.failed.fetch_add(1, Ordering::Relaxed);
                hlog_error!("{} [{}]", e, label);
            }
        }
    }
}

fn isolate_callback(name: &str, f: impl FnOnce(), report: &mut LoopReport) {
    if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(f)) {
        report.callback_panics += 1;
        hlog_error!(
            "Owner loop {} panicked: {}",
            name,
            panic_message(payload.as_ref())
        );
    }
}
