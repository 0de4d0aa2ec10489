mod cancel;
mod fifolock;
mod holds;
mod mode;
mod request;
#[cfg(feature = "concurrent_stat")]
mod stat;

pub use cancel::{CancelToken, Cancellable, Cancelled};
pub use fifolock::{Acquire, FifoLock, Guard, ModeHandle};
pub use holds::{HoldTable, ModeKind};
pub use mode::{Mutex, Read, Semaphore, Write};
#[cfg(feature = "concurrent_stat")]
pub use stat::LockStat;

/// A lock mode kind: which requests may share the lock with each other.
///
/// Every type implementing this trait is its own kind with its own hold
/// counter. Kinds may look at each other's counters, which is how a family of
/// modes (e.g. [`Read`] and [`Write`]) shares one lock and one queue order.
pub trait LockMode: 'static {
    /// Whether a request of this kind may be granted on top of `holds`.
    ///
    /// Must be pure. Only granted holds are visible here, never queued
    /// requests.
    fn is_compatible(holds: &HoldTable) -> bool;
}
