//! Owner-affine UI state: one text field and a 5x5 grid of buttons.
//!
//! Every accessor on [`SurfaceHandle`] runs [`affinity::check`] first, so a
//! call from a worker thread fails with
//! [`Error::OwnerThreadViolation`] instead of silently racing the owner.
//! The only way around the check is an explicit
//! [`crate::dispatch::permit_off_thread`] scope; such accesses are counted.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;

use crate::dispatch::{affinity, Access, DispatchQueue};
use crate::{hlog_trace, Error, Result};

pub const GRID_SIZE: usize = 5;
pub const BUTTON_COUNT: usize = GRID_SIZE * GRID_SIZE;

/// A button on the grid, numbered row-major from the top-left.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct WidgetId(u8);

impl WidgetId {
    pub fn new(index: usize) -> Result<Self> {
        if index >= BUTTON_COUNT {
            return Err(Error::InvalidWidget(index));
        }
        Ok(Self(index as u8))
    }

    pub fn at(row: usize, col: usize) -> Result<Self> {
        if row >= GRID_SIZE || col >= GRID_SIZE {
            return Err(Error::InvalidWidget(
                row.saturating_mul(GRID_SIZE).saturating_add(col),
            ));
        }
        Self::new(row * GRID_SIZE + col)
    }

    /// Index taken modulo [`BUTTON_COUNT`].
    pub fn wrapping(index: usize) -> Self {
        Self((index % BUTTON_COUNT) as u8)
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }

    pub fn row(self) -> usize {
        self.index() / GRID_SIZE
    }

    pub fn col(self) -> usize {
        self.index() % GRID_SIZE
    }

    pub fn all() -> impl Iterator<Item = WidgetId> {
        (0..BUTTON_COUNT).map(|i| WidgetId(i as u8))
    }

    /// Neighbour in `dir`, clamped to the grid edge.
    pub fn step(self, dir: Direction) -> WidgetId {
        let (row, col) = (self.row(), self.col());
        let (row, col) = match dir {
            Direction::Up => (row.saturating_sub(1), col),
            Direction::Down => ((row + 1).min(GRID_SIZE - 1), col),
            Direction::Left => (row, col.saturating_sub(1)),
            Direction::Right => (row, (col + 1).min(GRID_SIZE - 1)),
        };
        WidgetId((row * GRID_SIZE + col) as u8)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

/// 32-bit ARGB colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Argb(pub u32);

impl Argb {
    /// Colour a button turns when clicked.
    pub const SELECTED: Argb = Argb(0xff00_0000);
    /// Initial button colour.
    pub const DEFAULT: Argb = Argb(0xffd6_d7d7);

    /// Opaque colour from the low 24 bits of `rgb`.
    pub fn opaque(rgb: u32) -> Self {
        Argb(0xff00_0000 | (rgb & 0x00ff_ffff))
    }

    pub fn rgb(self) -> (u8, u8, u8) {
        let [_, r, g, b] = self.0.to_be_bytes();
        (r, g, b)
    }

    /// Perceived brightness in `0..=255`, for picking a readable label colour.
    pub fn luma(self) -> u8 {
        let (r, g, b) = self.rgb();
        ((299 * r as u32 + 587 * g as u32 + 114 * b as u32) / 1000) as u8
    }
}

/// The mutable state behind the handle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UiSurface {
    pub text: String,
    /// Cursor position in characters.
    pub selection: usize,
    pub colors: [Argb; BUTTON_COUNT],
    pub clicked: [bool; BUTTON_COUNT],
    pub focus: WidgetId,
    /// Bumped on every mutation.
    pub version: u64,
}

impl Default for UiSurface {
    fn default() -> Self {
        Self {
            text: String::new(),
            selection: 0,
            colors: [Argb::DEFAULT; BUTTON_COUNT],
            clicked: [false; BUTTON_COUNT],
            focus: WidgetId(0),
            version: 0,
        }
    }
}

type ClickHandler = Box<dyn FnMut(&SurfaceHandle, WidgetId) -> Result<()> + Send>;

struct SurfaceCell {
    queue: DispatchQueue,
    state: Mutex<UiSurface>,
    on_click: Mutex<Option<ClickHandler>>,
    off_thread_writes: AtomicU64,
}

/// Shared handle to the UI state owned by `queue`'s owner thread.
#[derive(Clone)]
pub struct SurfaceHandle {
    cell: Arc<SurfaceCell>,
}

impl SurfaceHandle {
    pub fn new(queue: DispatchQueue) -> Self {
        Self::with_state(queue, UiSurface::default())
    }

    pub fn with_state(queue: DispatchQueue, state: UiSurface) -> Self {
        Self {
            cell: Arc::new(SurfaceCell {
                queue,
                state: Mutex::new(state),
                on_click: Mutex::new(None),
                off_thread_writes: AtomicU64::new(0),
            }),
        }
    }

    pub fn queue(&self) -> &DispatchQueue {
        &self.cell.queue
    }

    pub fn get_text(&self) -> Result<String> {
        Ok(self.read("get_text")?.text.clone())
    }

    pub fn set_text(&self, text: impl Into<String>) -> Result<()> {
        let text = text.into();
        let mut state = self.write("set_text")?;
        state.selection = state.selection.min(text.chars().count());
        state.text = text;
        state.version += 1;
        Ok(())
    }

    /// Move the cursor. `index` may equal the text length (cursor at end).
    pub fn set_selection(&self, index: usize) -> Result<()> {
        let mut state = self.write("set_selection")?;
        let len = state.text.chars().count();
        if index > len {
            return Err(Error::Validation(format!(
                "selection {} past end of text (len {})",
                index, len
            )));
        }
        state.selection = index;
        state.version += 1;
        Ok(())
    }

    pub fn set_widget_color(&self, widget: WidgetId, color: Argb) -> Result<()> {
        let mut state = self.write("set_widget_color")?;
        state.colors[widget.index()] = color;
        state.version += 1;
        Ok(())
    }

    pub fn widget_color(&self, widget: WidgetId) -> Result<Argb> {
        Ok(self.read("widget_color")?.colors[widget.index()])
    }

    pub fn mark_clicked(&self, widget: WidgetId) -> Result<()> {
        let mut state = self.write("mark_clicked")?;
        state.clicked[widget.index()] = true;
        state.version += 1;
        Ok(())
    }

    /// Register the callback [`click`](Self::click) invokes. Replaces any
    /// previous one.
    pub fn on_click<F>(&self, handler: F)
    where
        F: FnMut(&SurfaceHandle, WidgetId) -> Result<()> + Send + 'static,
    {
        *lock(&self.cell.on_click) = Some(Box::new(handler));
    }

    /// Deliver a click. Runs the registered callback synchronously; must be
    /// called on the owner thread.
    pub fn click(&self, widget: WidgetId) -> Result<()> {
        affinity::check(&self.cell.queue, "click")?;
        // Taken out while it runs so the callback can use this handle freely.
        let handler = lock(&self.cell.on_click).take();
        let Some(mut handler) = handler else {
            return Ok(());
        };
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| handler(self, widget)));
        {
            let mut slot = lock(&self.cell.on_click);
            if slot.is_none() {
                *slot = Some(handler);
            }
        }
        // Restored first, so a panicking callback stays registered.
        outcome.unwrap_or_else(|payload| panic::resume_unwind(payload))
    }

    pub fn move_focus(&self, dir: Direction) -> Result<WidgetId> {
        let mut state = self.write("move_focus")?;
        let next = state.focus.step(dir);
        if next != state.focus {
            state.focus = next;
            state.version += 1;
        }
        Ok(next)
    }

    pub fn focused(&self) -> Result<WidgetId> {
        Ok(self.read("focused")?.focus)
    }

    /// Copy of the whole state.
    pub fn snapshot(&self) -> Result<UiSurface> {
        Ok(self.read("snapshot")?.clone())
    }

    /// Number of accesses granted off the owner thread.
    pub fn off_thread_writes(&self) -> u64 {
        self.cell.off_thread_writes.load(Ordering::Relaxed)
    }

    fn read(&self, operation: &'static str) -> Result<MutexGuard<'_, UiSurface>> {
        affinity::check(&self.cell.queue, operation)?;
        Ok(lock(&self.cell.state))
    }

    fn write(&self, operation: &'static str) -> Result<MutexGuard<'_, UiSurface>> {
        if affinity::check(&self.cell.queue, operation)? == Access::OffThread {
            let n = self.cell.off_thread_writes.fetch_add(1, Ordering::Relaxed) + 1;
            hlog_trace!("Off-thread {} (#{})", operation, n);
        }
        Ok(lock(&self.cell.state))
    }
}

// A panicking task must not brick the surface for every task after it.
fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}
