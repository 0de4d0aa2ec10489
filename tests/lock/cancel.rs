use std::{sync::Arc, task::Waker};

use fifolock::{CancelToken, Cancelled, FifoLock, Mutex, Read, Write};

use crate::util::{poll_once, poll_with, tasks::Tasks, CountWaker};

#[test]
fn test_cancelled_before_it_acquires_allows_later_mutex() {
    let lock = FifoLock::new();
    let mut tasks = Tasks::new()
        .with(lock.acquire::<Mutex>())
        .with(lock.acquire::<Mutex>())
        .with(lock.acquire::<Mutex>());

    assert_eq!(tasks.step(), [true, false, false]);
    tasks.cancel(1);
    assert_eq!(tasks.step(), [true, false, false]);
    tasks.complete(0);
    assert_eq!(tasks.step(), [true, false, true]);

    assert_eq!(lock.held::<Mutex>(), 1);
    assert_eq!(lock.queued(), 0);
}

#[test]
fn test_cancelled_after_it_acquires_allows_later_mutex() {
    let lock = FifoLock::new();
    let mut tasks = Tasks::new()
        .with(lock.acquire::<Mutex>())
        .with(lock.acquire::<Mutex>())
        .with(lock.acquire::<Mutex>());

    assert_eq!(tasks.step(), [true, false, false]);
    tasks.complete(0);
    assert_eq!(tasks.step(), [true, true, false]);
    tasks.cancel(1);
    assert_eq!(tasks.step(), [true, true, true]);
}

#[test]
fn test_cancelled_entry_stays_until_it_reaches_the_head() {
    let lock = FifoLock::new();
    let first = lock.try_acquire::<Mutex>().unwrap();
    let second = lock.acquire::<Mutex>();
    let third = lock.acquire::<Mutex>();

    drop(third);
    assert_eq!(lock.queued(), 2);

    drop(second);
    assert_eq!(lock.queued(), 0);
    assert_eq!(lock.held::<Mutex>(), 1);

    drop(first);
    assert!(lock.holds().is_free());
}

#[test]
fn test_grant_then_cancel_rolls_back_hold() {
    let lock = FifoLock::new();
    let first = lock.try_acquire::<Mutex>().unwrap();
    let second = lock.acquire::<Mutex>();
    let mut third = lock.acquire::<Mutex>();

    drop(first);
    assert!(second.is_granted());
    assert_eq!(lock.held::<Mutex>(), 1);

    // cancelled before the owner ever saw the grant
    drop(second);
    assert!(third.is_granted());
    assert_eq!(lock.held::<Mutex>(), 1);

    assert!(poll_once(&mut third).is_ready());
    assert!(lock.holds().is_free());
}

#[test]
fn test_cancelling_blocked_head_admits_followers() {
    let lock = FifoLock::new();
    let mut tasks = Tasks::new()
        .with(lock.acquire::<Read>())
        .with(lock.acquire::<Write>())
        .with(lock.acquire::<Read>())
        .with(lock.acquire::<Read>());

    assert_eq!(tasks.step(), [true, false, false, false]);
    tasks.cancel(1);
    assert_eq!(tasks.step(), [true, false, true, true]);
    assert_eq!(lock.held::<Read>(), 3);
}

#[test]
fn test_grant_wakes_waiter() {
    let lock = FifoLock::new();
    let count = CountWaker::new();
    let waker = Waker::from(Arc::clone(&count));

    let first = lock.try_acquire::<Mutex>().unwrap();
    let mut second = lock.acquire::<Mutex>();

    assert!(poll_with(&mut second, &waker).is_pending());
    assert_eq!(count.count(), 0);

    drop(first);
    assert_eq!(count.count(), 1);
    assert!(poll_with(&mut second, &waker).is_ready());
}

#[test]
fn test_cancellable_acquires_without_cancel() {
    let lock = FifoLock::new();
    let token = CancelToken::new();

    let mut acquire = lock.acquire_cancellable::<Mutex>(&token);
    match poll_once(&mut acquire) {
        std::task::Poll::Ready(Ok(guard)) => {
            assert_eq!(guard.lock().held::<Mutex>(), 1);
        }
        _ => panic!("uncontended acquire did not complete"),
    }
    assert!(lock.holds().is_free());
}

#[test]
fn test_cancellable_while_waiting() {
    let lock = FifoLock::new();
    let token = CancelToken::new();
    let count = CountWaker::new();
    let waker = Waker::from(Arc::clone(&count));

    let first = lock.try_acquire::<Mutex>().unwrap();
    let mut second = lock.acquire_cancellable::<Mutex>(&token);
    let mut third = lock.acquire::<Mutex>();

    assert!(poll_with(&mut second, &waker).is_pending());
    token.cancel();
    assert_eq!(count.count(), 1);

    assert!(matches!(poll_with(&mut second, &waker), std::task::Poll::Ready(Err(Cancelled))));
    assert_eq!(lock.held::<Mutex>(), 1);

    drop(first);
    assert!(poll_once(&mut third).is_ready());
}

#[test]
fn test_cancellable_grant_cancel_race() {
    let lock = FifoLock::new();
    let token = CancelToken::new();

    let first = lock.try_acquire::<Mutex>().unwrap();
    let mut second = lock.acquire_cancellable::<Mutex>(&token);
    let third = lock.acquire::<Mutex>();

    assert!(poll_once(&mut second).is_pending());

    // granted, then cancelled before the waiter resumes
    drop(first);
    token.cancel();

    assert!(matches!(poll_once(&mut second), std::task::Poll::Ready(Err(Cancelled))));
    assert!(third.is_granted());
    assert_eq!(lock.held::<Mutex>(), 1);
}

#[test]
fn test_cancelled_token_fails_fresh_acquire() {
    let lock = FifoLock::new();
    let token = CancelToken::new();
    token.cancel();

    let mut acquire = lock.acquire_cancellable::<Write>(&token);
    assert!(matches!(poll_once(&mut acquire), std::task::Poll::Ready(Err(Cancelled))));

    // the grant it got on enqueue is rolled back
    assert!(lock.holds().is_free());
    assert!(lock.try_acquire::<Write>().is_some());
}

#[cfg(feature = "concurrent_stat")]
#[test]
fn test_cancel_stat() {
    let lock = FifoLock::new();
    let first = lock.try_acquire::<Mutex>().unwrap();
    let second = lock.acquire::<Mutex>();
    let third = lock.acquire::<Mutex>();
    let _fourth = lock.acquire::<Mutex>();

    drop(third);
    drop(first);
    drop(second);

    let stat = lock.stat();
    assert_eq!(stat.cancelled, 1);
    assert_eq!(stat.discarded, 1);
    assert_eq!(stat.rolled_back, 1);
    assert_eq!(stat.granted, 3);
}
