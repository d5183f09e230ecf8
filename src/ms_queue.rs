//! Michael-Scott lock-free FIFO queue, with memory reclaimed through `crossbeam::epoch`.

use std::mem::MaybeUninit;
use std::sync::atomic::Ordering::{Acquire, Relaxed, Release};

use crossbeam::epoch::{self, Atomic, Owned, Shared};
use crossbeam::utils::CachePadded;

struct Node<T> {
    /// Uninitialized for the sentinel. A value is moved out when its node becomes the sentinel.
    value: MaybeUninit<T>,
    next: Atomic<Node<T>>,
}

/// Unbounded multi-producer queue. `head` always points at a sentinel whose successor holds the
/// first element.
pub struct MsQueue<T> {
    head: CachePadded<Atomic<Node<T>>>,
    tail: CachePadded<Atomic<Node<T>>>,
}

unsafe impl<T: Send> Send for MsQueue<T> {}
unsafe impl<T: Send> Sync for MsQueue<T> {}

impl<T> Default for MsQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> MsQueue<T> {
    pub fn new() -> Self {
        let queue = Self {
            head: CachePadded::new(Atomic::null()),
            tail: CachePadded::new(Atomic::null()),
        };
        let sentinel = Owned::new(Node {
            value: MaybeUninit::uninit(),
            next: Atomic::null(),
        });
        // SAFETY: the queue is not shared yet.
        unsafe {
            let guard = epoch::unprotected();
            let sentinel = sentinel.into_shared(guard);
            queue.head.store(sentinel, Relaxed);
            queue.tail.store(sentinel, Relaxed);
        }
        queue
    }

    pub fn push(&self, value: T) {
        let guard = &epoch::pin();
        let new = Owned::new(Node {
            value: MaybeUninit::new(value),
            next: Atomic::null(),
        })
        .into_shared(guard);
        loop {
            let tail = self.tail.load(Acquire, guard);
            // SAFETY: tail is never null, and the guard keeps it alive.
            let t = unsafe { tail.deref() };
            let next = t.next.load(Acquire, guard);
            if !next.is_null() {
                // Tail is lagging, help it forward.
                let _ = self.tail.compare_exchange(tail, next, Release, Relaxed, guard);
                continue;
            }
            if t
                .next
                .compare_exchange(Shared::null(), new, Release, Relaxed, guard)
                .is_ok()
            {
                let _ = self.tail.compare_exchange(tail, new, Release, Relaxed, guard);
                return;
            }
        }
    }

    pub fn pop(&self) -> Option<T> {
        let guard = &epoch::pin();
        loop {
            let head = self.head.load(Acquire, guard);
            // SAFETY: head is never null, and the guard keeps it alive.
            let h = unsafe { head.deref() };
            let next = h.next.load(Acquire, guard);
            // SAFETY: a non-null next is alive while we are pinned.
            let n = unsafe { next.as_ref() }?;
            if self
                .head
                .compare_exchange(head, next, Release, Relaxed, guard)
                .is_ok()
            {
                let tail = self.tail.load(Relaxed, guard);
                if tail == head {
                    let _ = self.tail.compare_exchange(tail, next, Release, Relaxed, guard);
                }
                // SAFETY: only the thread that swung head past `head` reaches this point, so the
                // old sentinel is retired once and the value of `next` is moved out once.
                unsafe {
                    guard.defer_destroy(head);
                    return Some(n.value.assume_init_read());
                }
            }
        }
    }

    pub fn is_not_empty(&self) -> bool {
        let guard = &epoch::pin();
        let head = self.head.load(Acquire, guard);
        // SAFETY: head is never null, and the guard keeps it alive.
        !unsafe { head.deref() }.next.load(Acquire, guard).is_null()
    }
}

impl<T> Drop for MsQueue<T> {
    fn drop(&mut self) {
        while self.pop().is_some() {}
        // SAFETY: we have exclusive access and only the sentinel is left.
        unsafe {
            let guard = epoch::unprotected();
            let sentinel = self.head.load(Relaxed, guard);
            drop(sentinel.into_owned());
        }
    }
}
