use std::{
    collections::HashMap,
    error::Error,
    fmt,
    future::Future,
    pin::Pin,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    task::{Context, Poll, Waker},
};

use parking_lot::Mutex;

use super::{Acquire, Guard, LockMode};

/// Error returned by [`Cancellable`] when its token fired first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cancelled;

impl fmt::Display for Cancelled {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "lock acquisition cancelled")
    }
}

impl Error for Cancelled {}

/// Cancellation signal shared by any number of waiting acquisitions.
///
/// Once cancelled, a token stays cancelled.
#[derive(Clone, Default)]
pub struct CancelToken {
    inner: Arc<TokenInner>,
}

#[derive(Default)]
struct TokenInner {
    cancelled: AtomicBool,
    waiters: Mutex<Waiters>,
}

#[derive(Default)]
struct Waiters {
    wakers: HashMap<u64, Waker>,
    next_key: u64,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        if self.inner.cancelled.swap(true, Ordering::AcqRel) {
            return;
        }

        let wakers = std::mem::take(&mut self.inner.waiters.lock().wakers);
        for (_, waker) in wakers {
            waker.wake();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::Acquire)
    }

    /// Store `waker` under `key`, allocating a key on first use.
    fn register(&self, key: &mut Option<u64>, waker: &Waker) {
        let mut waiters = self.inner.waiters.lock();

        let key = *key.get_or_insert_with(|| {
            let next = waiters.next_key;
            waiters.next_key = next.wrapping_add(1);
            next
        });

        let slot = waiters.wakers.entry(key).or_insert_with(|| waker.clone());
        if !slot.will_wake(waker) {
            *slot = waker.clone();
        }
    }

    fn deregister(&self, key: &mut Option<u64>) {
        if let Some(key) = key.take() {
            self.inner.waiters.lock().wakers.remove(&key);
        }
    }
}

impl fmt::Debug for CancelToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancelToken")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

/// Future returned by [`FifoLock::acquire_cancellable`](super::FifoLock::acquire_cancellable).
///
/// The token is checked before the request: a grant that lands in the same
/// instant as the cancellation is given back and `Cancelled` is reported.
#[must_use = "the request is cancelled when the future is dropped"]
pub struct Cancellable<'a, M: LockMode> {
    acquire: Option<Acquire<'a, M>>,
    token: CancelToken,
    key: Option<u64>,
}

impl<'a, M: LockMode> Cancellable<'a, M> {
    pub(crate) fn new(acquire: Acquire<'a, M>, token: CancelToken) -> Self {
        Self {
            acquire: Some(acquire),
            token,
            key: None,
        }
    }
}

impl<'a, M: LockMode> Future for Cancellable<'a, M> {
    type Output = Result<Guard<'a, M>, Cancelled>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        let acquire = this
            .acquire
            .as_mut()
            .expect("`Cancellable` polled after completion");

        if !this.token.is_cancelled() {
            if let Poll::Ready(guard) = Pin::new(acquire).poll(cx) {
                this.acquire = None;
                this.token.deregister(&mut this.key);
                return Poll::Ready(Ok(guard));
            }

            this.token.register(&mut this.key, cx.waker());
            if !this.token.is_cancelled() {
                return Poll::Pending;
            }
        }

        // dropping the request cancels it, or gives back a grant it never saw
        this.acquire = None;
        this.token.deregister(&mut this.key);
        Poll::Ready(Err(Cancelled))
    }
}

impl<M: LockMode> Drop for Cancellable<'_, M> {
    fn drop(&mut self) {
        self.token.deregister(&mut self.key);
    }
}

impl<M: LockMode> fmt::Debug for Cancellable<'_, M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cancellable")
            .field("acquire", &self.acquire)
            .field("token", &self.token)
            .finish()
    }
}
