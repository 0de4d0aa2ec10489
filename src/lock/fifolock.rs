use std::{
    collections::VecDeque,
    fmt,
    future::Future,
    marker::PhantomData,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll, Waker},
};

use log::{debug, trace};

use crate::some_or;

use super::{
    request::{Request, Status},
    CancelToken, Cancellable, HoldTable, LockMode, ModeKind,
};

#[cfg(feature = "concurrent_stat")]
use super::LockStat;

macro_rules! record {
    ($state:expr, $event:ident) => {
        #[cfg(feature = "concurrent_stat")]
        {
            $state.stat.$event += 1;
        }
    };
}

/// A strictly FIFO lock whose sharing rules are given by [`LockMode`]s.
///
/// Requests are granted in call order. A request that is not compatible with
/// the current holds blocks every request behind it, even ones that would be
/// compatible on their own.
pub struct FifoLock {
    state: parking_lot::Mutex<LockState>,
}

struct LockState {
    waiters: VecDeque<Arc<Request>>,
    holds: HoldTable,
    #[cfg(feature = "concurrent_stat")]
    stat: LockStat,
}

impl LockState {
    fn new(capacity: usize) -> Self {
        Self {
            waiters: VecDeque::with_capacity(capacity),
            holds: HoldTable::new(),
            #[cfg(feature = "concurrent_stat")]
            stat: LockStat::default(),
        }
    }

    /// Admission loop. Discards cancelled heads and grants compatible ones
    /// until the queue is empty or its head has to wait. Returns the wakers of
    /// the granted requests.
    fn admit(&mut self) -> Vec<Waker> {
        let mut woken = Vec::new();

        loop {
            let head = some_or!(self.waiters.front(), break);

            let grant = match head.status() {
                Status::Cancelled => false,
                Status::Pending if head.is_compatible(&self.holds) => true,
                Status::Pending => break,
                Status::Granted => unreachable!("granted request left in the wait queue"),
            };

            let head = some_or!(self.waiters.pop_front(), break);
            let kind = head.kind();

            if grant {
                let held = self.holds.acquire(kind);
                trace!("grant `{}` (holds: {})", kind.name(), held);
                record!(self, granted);

                if let Some(waker) = head.grant() {
                    woken.push(waker);
                }
            } else {
                trace!("discard cancelled `{}`", kind.name());
                record!(self, discarded);
            }
        }

        woken
    }

    fn release(&mut self, kind: ModeKind) -> Vec<Waker> {
        let held = self.holds.release(kind);
        trace!("release `{}` (holds: {})", kind.name(), held);

        self.admit()
    }
}

fn wake_all(woken: Vec<Waker>) {
    for waker in woken {
        waker.wake();
    }
}

impl FifoLock {
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Create a lock whose wait queue holds `capacity` requests before it
    /// reallocates.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            state: parking_lot::Mutex::new(LockState::new(capacity)),
        }
    }

    /// Request the lock in mode `M`.
    ///
    /// The request joins the wait queue when this is called, not when the
    /// returned future is first polled. Dropping the future before it
    /// resolves cancels the request; if it had been granted already, the hold
    /// is given back.
    pub fn acquire<M: LockMode>(&self) -> Acquire<'_, M> {
        let request = Arc::new(Request::new::<M>());
        let kind = request.kind();

        let woken = {
            let mut state = self.state.lock();
            state.holds.register(kind);
            state.waiters.push_back(request.clone());
            trace!("enqueue `{}` (queued: {})", kind.name(), state.waiters.len());

            state.admit()
        };
        wake_all(woken);

        Acquire {
            lock: self,
            request: Some(request),
            _mode: PhantomData,
        }
    }

    /// Like [`acquire`](Self::acquire), but resolves to `Err(Cancelled)` once
    /// `token` fires, even if the request was granted a moment before.
    pub fn acquire_cancellable<M: LockMode>(&self, token: &CancelToken) -> Cancellable<'_, M> {
        Cancellable::new(self.acquire(), token.clone())
    }

    /// Non-blocking: take the lock in mode `M` only if no request is queued
    /// ahead and the mode is compatible right now.
    pub fn try_acquire<M: LockMode>(&self) -> Option<Guard<'_, M>> {
        let kind = ModeKind::of::<M>();
        let mut state = self.state.lock();

        if !state.waiters.is_empty() || !M::is_compatible(&state.holds) {
            record!(state, try_failed);
            return None;
        }

        let held = state.holds.acquire(kind);
        trace!("grant `{}` without queueing (holds: {})", kind.name(), held);
        record!(state, granted);

        Some(Guard::new(self))
    }

    /// Reusable handle for acquiring this lock in mode `M`.
    pub fn mode<M: LockMode>(&self) -> ModeHandle<'_, M> {
        ModeHandle {
            lock: self,
            _mode: PhantomData,
        }
    }

    /// Snapshot of the current holds.
    pub fn holds(&self) -> HoldTable {
        self.state.lock().holds.clone()
    }

    pub fn held<M: LockMode>(&self) -> usize {
        self.state.lock().holds.get::<M>()
    }

    /// Entries in the wait queue, including cancelled ones not yet discarded.
    pub fn queued(&self) -> usize {
        self.state.lock().waiters.len()
    }

    #[cfg(feature = "concurrent_stat")]
    pub fn stat(&self) -> LockStat {
        self.state.lock().stat
    }

    fn release(&self, kind: ModeKind) {
        let woken = self.state.lock().release(kind);
        wake_all(woken);
    }

    /// Give up a request that was never turned into a guard.
    fn abandon(&self, request: &Request) {
        let kind = request.kind();

        let woken = {
            let mut state = self.state.lock();

            if request.cancel() {
                debug!("cancel queued `{}`", kind.name());
                record!(state, cancelled);

                state.admit()
            } else {
                // granted, but the owner is gone before seeing it
                debug!("roll back `{}` granted to a cancelled request", kind.name());
                record!(state, rolled_back);

                state.release(kind)
            }
        };
        wake_all(woken);
    }
}

impl Default for FifoLock {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for FifoLock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut d = f.debug_struct("FifoLock");
        match self.state.try_lock() {
            Some(state) => d
                .field("holds", &state.holds)
                .field("queued", &state.waiters.len()),
            None => d.field("state", &format_args!("<locked>")),
        };
        d.finish()
    }
}

/// Future returned by [`FifoLock::acquire`].
#[must_use = "the request is cancelled when the future is dropped"]
pub struct Acquire<'a, M: LockMode> {
    lock: &'a FifoLock,
    request: Option<Arc<Request>>,
    _mode: PhantomData<fn() -> M>,
}

impl<'a, M: LockMode> Acquire<'a, M> {
    /// Whether the lock was granted to this request. The guard is handed out
    /// on the next poll.
    pub fn is_granted(&self) -> bool {
        match &self.request {
            Some(request) => request.status() == Status::Granted,
            None => false,
        }
    }
}

impl<'a, M: LockMode> Future for Acquire<'a, M> {
    type Output = Guard<'a, M>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        let request = this
            .request
            .as_ref()
            .expect("`Acquire` polled after completion");

        if request.status() == Status::Pending {
            request.register(cx.waker());
        }

        match request.status() {
            Status::Granted => {
                this.request = None;
                Poll::Ready(Guard::new(this.lock))
            }
            Status::Pending => Poll::Pending,
            Status::Cancelled => unreachable!("request cancelled while its future is alive"),
        }
    }
}

impl<M: LockMode> Drop for Acquire<'_, M> {
    fn drop(&mut self) {
        if let Some(request) = self.request.take() {
            self.lock.abandon(&request);
        }
    }
}

impl<M: LockMode> fmt::Debug for Acquire<'_, M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Acquire")
            .field("request", &self.request)
            .finish()
    }
}

/// A granted hold of mode `M`. Released on drop.
#[must_use = "the hold is released as soon as the guard is dropped"]
pub struct Guard<'a, M: LockMode> {
    lock: &'a FifoLock,
    _mode: PhantomData<fn() -> M>,
}

impl<'a, M: LockMode> Guard<'a, M> {
    fn new(lock: &'a FifoLock) -> Self {
        Self {
            lock,
            _mode: PhantomData,
        }
    }

    pub fn lock(&self) -> &'a FifoLock {
        self.lock
    }

    pub fn release(self) {
        drop(self);
    }
}

impl<M: LockMode> Drop for Guard<'_, M> {
    fn drop(&mut self) {
        self.lock.release(ModeKind::of::<M>());
    }
}

impl<M: LockMode> fmt::Debug for Guard<'_, M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Guard").field(&ModeKind::of::<M>()).finish()
    }
}

/// A lock paired with one mode. Every acquire through the handle is a new
/// queue entry, so a handle may be used from several tasks at once.
pub struct ModeHandle<'a, M: LockMode> {
    lock: &'a FifoLock,
    _mode: PhantomData<fn() -> M>,
}

impl<'a, M: LockMode> ModeHandle<'a, M> {
    pub fn acquire(&self) -> Acquire<'a, M> {
        self.lock.acquire()
    }

    pub fn acquire_cancellable(&self, token: &CancelToken) -> Cancellable<'a, M> {
        self.lock.acquire_cancellable(token)
    }

    pub fn try_acquire(&self) -> Option<Guard<'a, M>> {
        self.lock.try_acquire()
    }

    pub fn held(&self) -> usize {
        self.lock.held::<M>()
    }
}

impl<M: LockMode> Clone for ModeHandle<'_, M> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<M: LockMode> Copy for ModeHandle<'_, M> {}

impl<M: LockMode> fmt::Debug for ModeHandle<'_, M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ModeHandle").field(&ModeKind::of::<M>()).finish()
    }
}
