// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

//! Safe abstractions for synchronization primitives.
//!
//! The lock types are named after their kernel counterparts on purpose:
//! the API of a driver lock isn't quite that of a userland `Mutex`, and
//! using `KMutex` makes it obvious that this isn't the one from std.
//! Lock poisoning is treated as fatal, as a panic while holding a
//! driver lock would be.
//!
//! [`Rundown`] is the datapath's quiescence guard.
use core::ops::Deref;
use core::ops::DerefMut;
use core::sync::atomic::AtomicUsize;
use core::sync::atomic::Ordering::SeqCst;
use core::time::Duration;
use std::sync::Condvar;
use std::sync::Mutex;
use std::sync::RwLock;

pub struct KMutex<T> {
    inner: Mutex<T>,
}

pub struct KMutexGuard<'a, T: 'a> {
    guard: std::sync::MutexGuard<'a, T>,
}

impl<T> Deref for KMutexGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        self.guard.deref()
    }
}

impl<T> DerefMut for KMutexGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        self.guard.deref_mut()
    }
}

impl<T: Default> Default for KMutex<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T> KMutex<T> {
    pub fn new(val: T) -> Self {
        KMutex { inner: Mutex::new(val) }
    }

    /// Acquire the mutex guard to gain access to the underlying value.
    /// If the guard is currently held, then this call will block. The
    /// mutex is released when the guard is dropped.
    pub fn lock(&self) -> KMutexGuard<'_, T> {
        let guard = self.inner.lock().unwrap();
        KMutexGuard { guard }
    }
}

pub struct KRwLock<T> {
    inner: RwLock<T>,
}

pub struct KRwLockReadGuard<'a, T: 'a> {
    guard: std::sync::RwLockReadGuard<'a, T>,
}

pub struct KRwLockWriteGuard<'a, T: 'a> {
    guard: std::sync::RwLockWriteGuard<'a, T>,
}

impl<T> Deref for KRwLockReadGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        self.guard.deref()
    }
}

impl<T> Deref for KRwLockWriteGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        self.guard.deref()
    }
}

impl<T> DerefMut for KRwLockWriteGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        self.guard.deref_mut()
    }
}

impl<T: Default> Default for KRwLock<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T> KRwLock<T> {
    pub fn new(val: T) -> Self {
        KRwLock { inner: RwLock::new(val) }
    }

    pub fn read(&self) -> KRwLockReadGuard<'_, T> {
        let guard = self.inner.read().unwrap();
        KRwLockReadGuard { guard }
    }

    pub fn write(&self) -> KRwLockWriteGuard<'_, T> {
        let guard = self.inner.write().unwrap();
        KRwLockWriteGuard { guard }
    }
}

pub struct KCondvar {
    cv: Condvar,
}

impl Default for KCondvar {
    fn default() -> Self {
        Self::new()
    }
}

impl KCondvar {
    pub fn new() -> Self {
        Self { cv: Condvar::new() }
    }

    pub fn notify_all(&self) {
        self.cv.notify_all()
    }

    pub fn wait<'a, T: 'a>(
        &self,
        lock: KMutexGuard<'a, T>,
    ) -> KMutexGuard<'a, T> {
        KMutexGuard { guard: self.cv.wait(lock.guard).unwrap() }
    }

    /// Wait for a notification or for `dur` to elapse. The boolean is
    /// `true` if the wait timed out.
    pub fn wait_timeout<'a, T: 'a>(
        &self,
        lock: KMutexGuard<'a, T>,
        dur: Duration,
    ) -> (KMutexGuard<'a, T>, bool) {
        let (guard, res) = self.cv.wait_timeout(lock.guard, dur).unwrap();
        (KMutexGuard { guard }, res.timed_out())
    }
}

// Top bit of the rundown state. The remaining bits count references.
const DRAINING: usize = 1 << (usize::BITS - 1);
const COUNT_MASK: usize = !DRAINING;

/// A rundown barrier gating a set of operations.
///
/// While *active*, any number of contexts may [`Rundown::acquire`] a
/// reference, and must [`Rundown::release`] it exactly once. Once
/// [`Rundown::wait_for_release`] is called the barrier is *draining*:
/// every new acquire fails, and the caller blocks until all references
/// taken before the transition are released. The barrier stays closed
/// until [`Rundown::reinit`].
///
/// Acquire and release never take a lock unless a drain is waiting
/// on the last reference.
pub struct Rundown {
    state: AtomicUsize,
    waiters: AtomicUsize,
    lock: KMutex<()>,
    drained: KCondvar,
}

impl Default for Rundown {
    fn default() -> Self {
        Self::new()
    }
}

impl Rundown {
    /// Create a new barrier in the active state.
    pub fn new() -> Self {
        Self {
            state: AtomicUsize::new(0),
            waiters: AtomicUsize::new(0),
            lock: KMutex::new(()),
            drained: KCondvar::new(),
        }
    }

    /// Take a reference, returning `false` if the barrier is draining
    /// or closed.
    pub fn acquire(&self) -> bool {
        let mut cur = self.state.load(SeqCst);
        loop {
            if cur & DRAINING != 0 {
                return false;
            }

            match self.state.compare_exchange_weak(cur, cur + 1, SeqCst, SeqCst)
            {
                Ok(_) => return true,
                Err(actual) => cur = actual,
            }
        }
    }

    /// Drop a reference taken by a successful [`Self::acquire`].
    pub fn release(&self) {
        let prev = self.state.fetch_sub(1, SeqCst);
        debug_assert!(prev & COUNT_MASK != 0, "rundown release underflow");

        if prev & COUNT_MASK == 1 && self.waiters.load(SeqCst) != 0 {
            // The waiter checks the count under this lock, so taking it
            // here orders the wakeup after that check.
            let _guard = self.lock.lock();
            self.drained.notify_all();
        }
    }

    /// Take a reference that is released when dropped.
    pub fn enter(&self) -> Option<RundownRef<'_>> {
        if self.acquire() { Some(RundownRef { rundown: self }) } else { None }
    }

    /// Close the barrier and block until every outstanding reference
    /// is released.
    pub fn wait_for_release(&self) {
        self.state.fetch_or(DRAINING, SeqCst);

        let mut guard = self.lock.lock();
        self.waiters.fetch_add(1, SeqCst);
        while self.state.load(SeqCst) & COUNT_MASK != 0 {
            guard = self.drained.wait(guard);
        }
        self.waiters.fetch_sub(1, SeqCst);
    }

    /// Reopen the barrier. Calling this on an active barrier is a
    /// no-op.
    pub fn reinit(&self) {
        self.state.fetch_and(COUNT_MASK, SeqCst);
    }

    /// Return `true` if new references are currently refused.
    pub fn is_draining(&self) -> bool {
        self.state.load(SeqCst) & DRAINING != 0
    }

    /// Return the number of outstanding references.
    pub fn outstanding(&self) -> usize {
        self.state.load(SeqCst) & COUNT_MASK
    }
}

/// An acquired [`Rundown`] reference.
pub struct RundownRef<'a> {
    rundown: &'a Rundown,
}

impl Drop for RundownRef<'_> {
    fn drop(&mut self) {
        self.rundown.release();
    }
}
