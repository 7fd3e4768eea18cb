//! Owner-thread affinity checks.
//!
//! Owner-affine state calls [`check`] before every access. On the owner
//! thread the check passes; anywhere else it fails immediately with
//! [`Error::OwnerThreadViolation`], unless the caller is inside
//! [`permit_off_thread`], which is how the racy `direct` worker mode
//! reaches the state on purpose.

use std::cell::Cell;
use std::thread;

use super::DispatchQueue;
use crate::{Error, Result};

thread_local! {
    static OFF_THREAD_PERMIT: Cell<bool> = const { Cell::new(false) };
}

/// How a checked access was granted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// Running on the queue's owner thread.
    Owner,
    /// Running elsewhere under an explicit permit. Racy.
    OffThread,
}

/// Validate that the current thread may touch state owned by `queue`'s
/// owner thread.
pub fn check(queue: &DispatchQueue, operation: &'static str) -> Result<Access> {
    match queue.owner_thread() {
        Some(owner) if owner == thread::current().id() => Ok(Access::Owner),
        _ if off_thread_permitted() => Ok(Access::OffThread),
        Some(_) => Err(Error::OwnerThreadViolation { operation }),
        None => Err(Error::OwnerNotBound { operation }),
    }
}

/// Run `f` with off-thread access to owner-affine state allowed on this
/// thread. The permit is restored on exit, including on unwind.
pub fn permit_off_thread<R>(f: impl FnOnce() -> R) -> R {
    struct Restore(bool);

    impl Drop for Restore {
        fn drop(&mut self) {
            OFF_THREAD_PERMIT.with(|p| p.set(self.0));
        }
    }

    let previous = OFF_THREAD_PERMIT.with(|p| p.replace(true));
    let _restore = Restore(previous);
    f()
}

pub fn off_thread_permitted() -> bool {
    OFF_THREAD_PERMIT.with(|p| p.get())
}
