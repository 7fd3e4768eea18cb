//! Wires the demo together: owner thread, surface, workers, render feed.

use std::thread::{self, JoinHandle};

use crossbeam_channel::Receiver;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;

use crate::config::Config;
use crate::dispatch::{DispatchQueue, LoopReport, OwnerLoop, QueueStats};
use crate::render::{RenderState, StatePublisher};
use crate::surface::{Argb, Direction, SurfaceHandle, WidgetId};
use crate::worker::{Worker, WorkerHandle, WorkerReport};
use crate::workload;
use crate::{hlog, hlog_debug, hlog_warn, Error, Result};

pub const OWNER_THREAD_NAME: &str = "ui-owner";
pub const INSERTER_NAME: &str = "letter-inserter";
pub const COLORER_NAME: &str = "button-colorer";

/// Native UI events. They arrive on the owner thread and are handled there
/// directly, not through the task queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiEvent {
    Click(WidgetId),
    MoveFocus(Direction),
    ActivateFocused,
}

/// Default click behaviour: the clicked button turns black.
pub fn select_on_click(surface: &SurfaceHandle, widget: WidgetId) -> Result<()> {
    surface.set_widget_color(widget, Argb::SELECTED)?;
    surface.mark_clicked(widget)
}

/// Handle one UI event on the owner thread.
pub fn handle_event(surface: &SurfaceHandle, event: UiEvent) -> Result<()> {
    match event {
        UiEvent::Click(widget) => surface.click(widget),
        UiEvent::MoveFocus(dir) => surface.move_focus(dir).map(|_| ()),
        UiEvent::ActivateFocused => surface.click(surface.focused()?),
    }
}

/// Final state and counters, produced by [`Demo::shutdown`].
#[derive(Debug, Clone, Serialize)]
pub struct DemoReport {
    pub text: String,
    pub clicked: usize,
    pub queue: QueueStats,
    pub owner: LoopReport,
    pub off_thread_writes: u64,
    pub workers: Vec<WorkerReport>,
}

/// Owner loop report, final text and clicked-button count.
type OwnerExit = (LoopReport, String, usize);

pub struct Demo {
    queue: DispatchQueue,
    surface: SurfaceHandle,
    owner: Option<JoinHandle<Result<OwnerExit>>>,
    workers: Vec<WorkerHandle>,
}

impl Demo {
    /// Start the owner thread and both workers.
    ///
    /// `events` feeds the owner thread; pass `crossbeam_channel::never()`
    /// when there is no UI. Snapshots go to `publisher` after every turn.
    pub fn start(
        config: &Config,
        events: Receiver<UiEvent>,
        publisher: Option<StatePublisher>,
    ) -> Result<Self> {
        config.validate()?;
        hlog_debug!(
            "Demo::start inserter={:?} colorer={:?}",
            config.inserter,
            config.colorer
        );

        let (queue, owner_loop) = DispatchQueue::new();
        let surface = SurfaceHandle::new(queue.clone());
        surface.on_click(select_on_click);

        let owner = spawn_owner(owner_loop, surface.clone(), events, publisher, config)?;

        let mut demo = Demo {
            queue: queue.clone(),
            surface: surface.clone(),
            owner: Some(owner),
            workers: Vec::new(),
        };

        let inserter = Worker::new(
            INSERTER_NAME,
            config.inserter,
            queue.clone(),
            workload::inserter(surface.clone(), StdRng::from_entropy()),
        );
        let colorer = Worker::new(
            COLORER_NAME,
            config.colorer,
            queue,
            workload::colorer(surface, StdRng::from_entropy()),
        );
        // On error `demo` is dropped, which stops whatever already started.
        demo.workers.push(inserter.spawn()?);
        demo.workers.push(colorer.spawn()?);

        hlog!("Demo started");
        Ok(demo)
    }

    pub fn queue(&self) -> &DispatchQueue {
        &self.queue
    }

    pub fn surface(&self) -> &SurfaceHandle {
        &self.surface
    }

    /// Stop workers first so nothing new is posted, then drain and stop the
    /// owner loop.
    pub fn shutdown(mut self) -> Result<DemoReport> {
        hlog_debug!("Demo::shutdown workers={}", self.workers.len());
        for worker in &self.workers {
            worker.shutdown();
        }
        let mut workers = Vec::with_capacity(self.workers.len());
        for worker in self.workers.drain(..) {
            hlog_debug!("Joining worker {}", worker.name());
            workers.push(worker.join()?);
        }

        self.queue.stop();
        let (owner, text, clicked) = self
            .owner
            .take()
            .ok_or_else(|| Error::ThreadJoin("owner thread already joined".to_string()))?
            .join()
            .map_err(|_| Error::ThreadJoin(format!("{} panicked", OWNER_THREAD_NAME)))??;

        let report = DemoReport {
            text,
            clicked,
            queue: self.queue.stats(),
            owner,
            off_thread_writes: self.surface.off_thread_writes(),
            workers,
        };
        hlog!(
            "Demo stopped: executed={} failed={} rejected={} off_thread_writes={}",
            report.queue.executed,
            report.queue.failed,
            report.queue.rejected,
            report.off_thread_writes
        );
        Ok(report)
    }
}

impl Drop for Demo {
    fn drop(&mut self) {
        // Only reached without `shutdown`, e.g. on an error path.
        for worker in &self.workers {
            worker.shutdown();
        }
        self.queue.stop();
    }
}

fn spawn_owner(
    owner_loop: OwnerLoop,
    surface: SurfaceHandle,
    events: Receiver<UiEvent>,
    mut publisher: Option<StatePublisher>,
    config: &Config,
) -> Result<JoinHandle<Result<OwnerExit>>> {
    let inserter_mode = config.inserter.mode;
    let colorer_mode = config.colorer.mode;

    let handle = thread::Builder::new()
        .name(OWNER_THREAD_NAME.to_string())
        .spawn(move || -> Result<OwnerExit> {
            let queue = owner_loop.queue().clone();
            let report = owner_loop.run_with_events(
                &events,
                |event| {
                    if let Err(e) = handle_event(&surface, event) {
                        hlog_warn!("UI event {:?} failed: {}", event, e);
                    }
                },
                || {
                    let Some(publisher) = publisher.as_mut() else {
                        return;
                    };
                    match surface.snapshot() {
                        Ok(snapshot) => {
                            publisher.publish(RenderState {
                                version: 0,
                                surface: snapshot,
                                stats: queue.stats(),
                                off_thread_writes: surface.off_thread_writes(),
                                inserter_mode,
                                colorer_mode,
                            });
                        }
                        Err(e) => hlog_warn!("Snapshot failed: {}", e),
                    }
                },
            )?;
            // Final read still happens on the owner thread.
            let snapshot = surface.snapshot()?;
            let clicked = snapshot.clicked.iter().filter(|c| **c).count();
            Ok((report, snapshot.text, clicked))
        })?;
    Ok(handle)
}
