/// Event counters of a [`FifoLock`](super::FifoLock) since it was created.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LockStat {
    /// requests granted, queued or not
    pub granted: u64,
    /// cancelled requests dropped from the head of the queue
    pub discarded: u64,
    /// requests cancelled while still waiting
    pub cancelled: u64,
    /// grants given back because the request was cancelled before it saw them
    pub rolled_back: u64,
    /// `try_acquire` calls that failed
    pub try_failed: u64,
}
