//! Locking of level-0 components. A component is identified by its root, which is always a
//! vertex, so per-component locks are simply per-vertex locks.

use crossbeam::epoch;
use crossbeam::utils::CachePadded;
use parking_lot::{Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::euler_tour_tree::ConcurrentEulerTourTree;
use crate::lists::Idx;

pub trait ComponentLocks: Send + Sync {
    type Guard<'a>
    where
        Self: 'a;
    type ReadGuard<'a>
    where
        Self: 'a;

    fn new(n: usize) -> Self;
    /// Exclusively locks the components rooted at `first` and `second`, in this order. Locks once
    /// if they are equal.
    fn lock(&self, first: Idx, second: Idx) -> Self::Guard<'_>;
    /// Like `lock`, but may share the components with other readers.
    fn lock_read(&self, first: Idx, second: Idx) -> Self::ReadGuard<'_>;
}

/// One mutex per vertex.
pub struct RootMutexes(Box<[CachePadded<Mutex<()>>]>);

impl ComponentLocks for RootMutexes {
    type Guard<'a> = (MutexGuard<'a, ()>, Option<MutexGuard<'a, ()>>);
    type ReadGuard<'a> = Self::Guard<'a>;

    fn new(n: usize) -> Self {
        Self((0..n).map(|_| CachePadded::new(Mutex::new(()))).collect())
    }
    fn lock(&self, first: Idx, second: Idx) -> Self::Guard<'_> {
        let a = self.0[first].lock();
        let b = (first != second).then(|| self.0[second].lock());
        (a, b)
    }
    fn lock_read(&self, first: Idx, second: Idx) -> Self::ReadGuard<'_> {
        self.lock(first, second)
    }
}

/// One read/write lock per vertex.
pub struct RootRwLocks(Box<[CachePadded<RwLock<()>>]>);

impl ComponentLocks for RootRwLocks {
    type Guard<'a> = (RwLockWriteGuard<'a, ()>, Option<RwLockWriteGuard<'a, ()>>);
    type ReadGuard<'a> = (RwLockReadGuard<'a, ()>, Option<RwLockReadGuard<'a, ()>>);

    fn new(n: usize) -> Self {
        Self((0..n).map(|_| CachePadded::new(RwLock::new(()))).collect())
    }
    fn lock(&self, first: Idx, second: Idx) -> Self::Guard<'_> {
        let a = self.0[first].write();
        let b = (first != second).then(|| self.0[second].write());
        (a, b)
    }
    fn lock_read(&self, first: Idx, second: Idx) -> Self::ReadGuard<'_> {
        let a = self.0[first].read();
        let b = (first != second).then(|| self.0[second].read());
        (a, b)
    }
}

/// A single mutex for every component.
pub struct GlobalMutex(Mutex<()>);

impl ComponentLocks for GlobalMutex {
    type Guard<'a> = MutexGuard<'a, ()>;
    type ReadGuard<'a> = MutexGuard<'a, ()>;

    fn new(_: usize) -> Self {
        Self(Mutex::new(()))
    }
    fn lock(&self, _: Idx, _: Idx) -> Self::Guard<'_> {
        self.0.lock()
    }
    fn lock_read(&self, _: Idx, _: Idx) -> Self::ReadGuard<'_> {
        self.0.lock()
    }
}

/// Reads the roots of u and v, orders them by (priority, id) and locks them with `acquire`, then
/// runs `body` if they are still the roots of u and v. Otherwise retries.
fn with_roots<G, T>(
    ett: &ConcurrentEulerTourTree,
    u: usize,
    v: usize,
    acquire: impl Fn(Idx, Idx) -> G,
    body: impl FnOnce() -> T,
) -> T {
    loop {
        let pinned = epoch::pin();
        let (mut first, mut second) = (ett.root(u), ett.root(v));
        if (ett.priority(first), first) > (ett.priority(second), second) {
            std::mem::swap(&mut first, &mut second);
        }
        let held = acquire(first, second);
        let (ru, rv) = (ett.root(u), ett.root(v));
        drop(pinned);
        if (ru, rv) == (first, second) || (rv, ru) == (first, second) {
            let result = body();
            drop(held);
            return result;
        }
        log::trace!("roots of {u} and {v} moved while locking, retrying");
    }
}

/// Runs `body` holding the components of u and v exclusively.
pub fn lock_components<L: ComponentLocks, T>(
    locks: &L,
    ett: &ConcurrentEulerTourTree,
    u: usize,
    v: usize,
    body: impl FnOnce() -> T,
) -> T {
    with_roots(ett, u, v, |a, b| locks.lock(a, b), body)
}

/// Runs `body` holding the components of u and v shared.
pub fn lock_components_read<L: ComponentLocks, T>(
    locks: &L,
    ett: &ConcurrentEulerTourTree,
    u: usize,
    v: usize,
    body: impl FnOnce() -> T,
) -> T {
    with_roots(ett, u, v, |a, b| locks.lock_read(a, b), body)
}
