//! Shared helpers for integration tests.

use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use handler_demo::config::{Config, DelayPolicy, SubmitMode, WorkerConfig};
use handler_demo::dispatch::{DispatchQueue, LoopReport};
use handler_demo::surface::SurfaceHandle;
use handler_demo::Result;

/// A started owner thread with a surface bound to it.
pub struct OwnedSurface {
    pub queue: DispatchQueue,
    pub surface: SurfaceHandle,
    pub owner: JoinHandle<Result<LoopReport>>,
}

impl OwnedSurface {
    pub fn start(name: &str) -> Self {
        let (queue, owner) = DispatchQueue::spawn_owner(name).expect("spawn owner");
        let surface = SurfaceHandle::new(queue.clone());
        Self {
            queue,
            surface,
            owner,
        }
    }

    /// Run `f` on the owner thread and wait for its result.
    pub fn on_owner<T: Send + 'static>(
        &self,
        f: impl FnOnce(&SurfaceHandle) -> T + Send + 'static,
    ) -> T {
        let (tx, rx) = crossbeam_channel::bounded(1);
        let surface = self.surface.clone();
        self.queue
            .submit(move || {
                let _ = tx.send(f(&surface));
            })
            .expect("submit");
        rx.recv_timeout(Duration::from_secs(5))
            .expect("owner did not answer")
    }

    /// Stop the queue, drain it and return the owner loop report.
    pub fn finish(self) -> LoopReport {
        self.queue.stop();
        self.owner
            .join()
            .expect("owner thread panicked")
            .expect("owner loop failed")
    }
}

/// Config with both workers cycling every few milliseconds.
pub fn fast_config(inserter: SubmitMode, colorer: SubmitMode) -> Config {
    Config {
        inserter: WorkerConfig {
            mode: inserter,
            delay: DelayPolicy::Random { max_ms: 3 },
        },
        colorer: WorkerConfig {
            mode: colorer,
            delay: DelayPolicy::Fixed { ms: 1 },
        },
    }
}

/// Poll `cond` until it holds, failing the test after five seconds.
pub fn wait_until(what: &str, mut cond: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !cond() {
        assert!(Instant::now() < deadline, "timed out waiting for {}", what);
        thread::sleep(Duration::from_millis(2));
    }
}
