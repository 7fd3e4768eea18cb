//! Immutable snapshots handed from the owner thread to the render thread.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender};

use crate::config::SubmitMode;
use crate::dispatch::QueueStats;
use crate::surface::UiSurface;

/// Render loop frame budget (60 fps).
pub const FRAME_DURATION: Duration = Duration::from_micros(16_666);

static VERSION_COUNTER: AtomicU64 = AtomicU64::new(1);

pub fn next_version() -> u64 {
    VERSION_COUNTER.fetch_add(1, Ordering::Relaxed)
}

#[derive(Debug, Clone, Default)]
pub struct RenderState {
    pub version: u64,
    pub surface: UiSurface,
    pub stats: QueueStats,
    pub off_thread_writes: u64,
    pub inserter_mode: SubmitMode,
    pub colorer_mode: SubmitMode,
}

impl RenderState {
    pub fn any_direct(&self) -> bool {
        self.inserter_mode == SubmitMode::Direct || self.colorer_mode == SubmitMode::Direct
    }
}

/// Sending half of a `bounded(1)` snapshot channel with latest-wins
/// semantics: a stale unread snapshot is discarded before the new one goes
/// in, so the owner never blocks on a slow renderer.
pub struct StatePublisher {
    tx: Sender<RenderState>,
    drain: Receiver<RenderState>,
    last_surface_version: Option<u64>,
    last_stats: QueueStats,
}

impl StatePublisher {
    pub fn channel() -> (StatePublisher, Receiver<RenderState>) {
        let (tx, rx) = crossbeam_channel::bounded(1);
        let publisher = StatePublisher {
            tx,
            drain: rx.clone(),
            last_surface_version: None,
            last_stats: QueueStats::default(),
        };
        (publisher, rx)
    }

    /// Publish `state` unless nothing visible changed since the last one.
    /// Returns whether a snapshot was sent.
    pub fn publish(&mut self, mut state: RenderState) -> bool {
        if self.last_surface_version == Some(state.surface.version)
            && self.last_stats == state.stats
        {
            return false;
        }
        self.last_surface_version = Some(state.surface.version);
        self.last_stats = state.stats;

        state.version = next_version();
        let _ = self.drain.try_recv();
        self.tx.try_send(state).is_ok()
    }
}
