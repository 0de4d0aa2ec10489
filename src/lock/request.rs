use std::{
    fmt,
    sync::atomic::{AtomicU8, Ordering},
    task::Waker,
};

use futures_util::task::AtomicWaker;

use super::{HoldTable, LockMode, ModeKind};

const PENDING: u8 = 0;
const GRANTED: u8 = 1;
const CANCELLED: u8 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Status {
    Pending,
    Granted,
    Cancelled,
}

/// One entry of the wait queue.
///
/// The status only leaves `Pending` once, either to `Granted` (admission loop)
/// or to `Cancelled` (the owner gave up). Both transitions happen under the
/// lock state mutex, so they never race with each other. Reading the status
/// needs no lock.
pub(crate) struct Request {
    kind: ModeKind,
    is_compatible: fn(&HoldTable) -> bool,
    status: AtomicU8,
    waker: AtomicWaker,
}

impl Request {
    pub(crate) fn new<M: LockMode>() -> Self {
        Self {
            kind: ModeKind::of::<M>(),
            is_compatible: M::is_compatible,
            status: AtomicU8::new(PENDING),
            waker: AtomicWaker::new(),
        }
    }

    pub(crate) fn kind(&self) -> ModeKind {
        self.kind
    }

    pub(crate) fn is_compatible(&self, holds: &HoldTable) -> bool {
        (self.is_compatible)(holds)
    }

    pub(crate) fn status(&self) -> Status {
        match self.status.load(Ordering::Acquire) {
            PENDING => Status::Pending,
            GRANTED => Status::Granted,
            CANCELLED => Status::Cancelled,
            status => unreachable!("invalid request status {}", status),
        }
    }

    /// Pending -> Granted. Returns the waker of the owner, to be woken once
    /// the lock state is released.
    pub(crate) fn grant(&self) -> Option<Waker> {
        let prev = self.status.swap(GRANTED, Ordering::AcqRel);
        debug_assert_eq!(prev, PENDING, "granted a resolved request");

        self.waker.take()
    }

    /// Pending -> Cancelled. Fails if the request was granted in the meantime.
    pub(crate) fn cancel(&self) -> bool {
        self.status
            .compare_exchange(PENDING, CANCELLED, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Register the owner's waker. The status has to be checked again after
    /// this returns.
    pub(crate) fn register(&self, waker: &Waker) {
        self.waker.register(waker);
    }
}

impl fmt::Debug for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Request")
            .field("kind", &self.kind)
            .field("status", &self.status())
            .finish()
    }
}
