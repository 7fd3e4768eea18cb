//! Single-owner task dispatch.
//!
//! Any thread may post a [`Task`] to a [`DispatchQueue`]; exactly one thread,
//! the one running the matching [`OwnerLoop`], executes them in FIFO order.
//! State that must only be touched by that thread checks in through
//! [`affinity::check`].
//!
//! ```text
//!  worker A ──submit──┐
//!  worker B ──submit──┼──> [ crossbeam channel ] ──> OwnerLoop (owner thread)
//!  owner    ──submit──┘                                 │
//!                              native events ───────────┘ (handled inline)
//! ```

pub mod affinity;
pub mod queue;
pub mod task;

pub use affinity::{permit_off_thread, Access};
pub use queue::{DispatchQueue, LoopReport, OwnerLoop, QueueStats};
pub use task::Task;
