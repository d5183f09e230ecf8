//! Packed edge keys shared by every level and variant.

use std::fmt::{Debug, Formatter};

/// An edge packed in 64 bits: the low half is `u`, the high half is `v`.
///
/// Undirected edges are normalized so that `u < v`. Directed edges keep the
/// given orientation and are only used to address the two Euler tour tokens of
/// a tree edge.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Edge(u64);

/// Sentinel meaning "no edge", for atomics that store raw edge keys.
pub const NO_EDGE: u64 = u64::MAX;

const HALF: u32 = 32;
const MASK: u64 = (1 << HALF) - 1;

/// Largest vertex count an instance may be built with.
pub const MAX_VERTICES: usize = (u32::MAX - 1) as usize;

impl Edge {
    /// Undirected edge between `u` and `v`.
    pub fn new(u: usize, v: usize) -> Self {
        Self::directed(u.min(v), u.max(v))
    }
    /// Directed edge `u -> v`.
    pub fn directed(u: usize, v: usize) -> Self {
        debug_assert!(u <= MAX_VERTICES && v <= MAX_VERTICES);
        Self(u as u64 | ((v as u64) << HALF))
    }
    pub fn u(self) -> usize {
        (self.0 & MASK) as usize
    }
    pub fn v(self) -> usize {
        (self.0 >> HALF) as usize
    }
    /// The same edge in the opposite direction.
    pub fn reversed(self) -> Self {
        Self::directed(self.v(), self.u())
    }
    pub fn key(self) -> u64 {
        self.0
    }
    /// Inverse of [`Edge::key`]. Returns `None` for [`NO_EDGE`].
    pub fn from_key(key: u64) -> Option<Self> {
        (key != NO_EDGE).then_some(Self(key))
    }
}

impl Debug for Edge {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.u(), self.v())
    }
}

/// Number of levels used for `n` vertices: one more than the ceiling of log2(n).
pub fn levels_for(n: usize) -> usize {
    let mut levels = 1;
    let mut max_size = 1;
    while max_size < n {
        levels += 1;
        max_size *= 2;
    }
    levels
}

/// Panics signalling a broken internal invariant. Never a recoverable condition.
#[track_caller]
pub(crate) fn illegal_state(what: &str) -> ! {
    panic!("Illegal state: {what}")
}

pub(crate) trait OrIllegalState<T> {
    fn or_illegal_state(self, what: &str) -> T;
}

impl<T> OrIllegalState<T> for Option<T> {
    #[track_caller]
    fn or_illegal_state(self, what: &str) -> T {
        match self {
            Some(t) => t,
            None => illegal_state(what),
        }
    }
}
