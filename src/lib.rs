//! A strictly FIFO asynchronous lock with pluggable sharing rules.
//!
//! Each request names a [`LockMode`]. A mode is a pure predicate over the
//! counts of currently granted holds, so an exclusive mutex, a reader/writer
//! pair or a counting semaphore are all just different modes of the same
//! [`FifoLock`]. Requests are granted strictly in arrival order: a request
//! that has to wait blocks everything queued behind it.
//!
//! ```
//! use fifolock::{FifoLock, Read, Write};
//!
//! let lock = FifoLock::new();
//!
//! futures::executor::block_on(async {
//!     let read = lock.acquire::<Read>().await;
//!     assert!(lock.try_acquire::<Write>().is_none());
//!
//!     read.release();
//!     let _write = lock.acquire::<Write>().await;
//! });
//! ```
pub mod lock;
pub mod util;

pub use lock::{
    Acquire, CancelToken, Cancellable, Cancelled, FifoLock, Guard, HoldTable, LockMode, ModeHandle,
    ModeKind, Mutex, Read, Semaphore, Write,
};
#[cfg(feature = "concurrent_stat")]
pub use lock::LockStat;
