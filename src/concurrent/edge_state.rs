//! Per-edge state cells and published removal operations of the non-blocking variant.

use std::sync::atomic::{AtomicU64, Ordering::SeqCst};

use crate::edge::{Edge, OrIllegalState, NO_EDGE};
use crate::lists::Idx;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeStatus {
    /// Being added without locks, not yet decided.
    Initial,
    Tree,
    NonTree,
    /// Offered as the replacement of a pending removal.
    Proposed,
    /// The add attempt was abandoned and will be redone under locks.
    Failed,
    Removed,
}

const STATUS_BITS: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EdgeState {
    pub status: EdgeStatus,
    pub rank: usize,
}

impl EdgeState {
    pub const INITIAL: Self = Self::new(EdgeStatus::Initial, 0);

    pub const fn new(status: EdgeStatus, rank: usize) -> Self {
        Self { status, rank }
    }

    fn pack(self) -> u64 {
        let status = match self.status {
            EdgeStatus::Initial => 0,
            EdgeStatus::Tree => 1,
            EdgeStatus::NonTree => 2,
            EdgeStatus::Proposed => 3,
            EdgeStatus::Failed => 4,
            EdgeStatus::Removed => 5,
        };
        status | (self.rank as u64) << STATUS_BITS
    }

    fn unpack(bits: u64) -> Self {
        let status = match bits & ((1 << STATUS_BITS) - 1) {
            0 => EdgeStatus::Initial,
            1 => EdgeStatus::Tree,
            2 => EdgeStatus::NonTree,
            3 => EdgeStatus::Proposed,
            4 => EdgeStatus::Failed,
            _ => EdgeStatus::Removed,
        };
        Self::new(status, (bits >> STATUS_BITS) as usize)
    }
}

/// State of one add attempt of an edge. A new cell is made for every attempt, so a cell that left
/// a state never comes back to it through another attempt.
#[derive(Debug)]
pub struct EdgeCell {
    pub edge: Edge,
    state: AtomicU64,
}

impl EdgeCell {
    pub fn new(edge: Edge, state: EdgeState) -> Self {
        Self {
            edge,
            state: AtomicU64::new(state.pack()),
        }
    }

    pub fn load(&self) -> EdgeState {
        EdgeState::unpack(self.state.load(SeqCst))
    }

    pub fn store(&self, state: EdgeState) {
        self.state.store(state.pack(), SeqCst);
    }

    pub fn cas(&self, from: EdgeState, to: EdgeState) -> bool {
        self.state
            .compare_exchange(from.pack(), to.pack(), SeqCst, SeqCst)
            .is_ok()
    }
}

const CLOSED: u64 = NO_EDGE - 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Replacement {
    Open,
    Taken(Edge),
    /// No replacement exists, the components will be split.
    Closed,
}

/// A tree edge removal in progress at level 0, published on the root of its component.
#[derive(Debug)]
pub struct RemovalOperation {
    pub edge: Edge,
    /// Root of the half that still points at the component root.
    pub lower_root: Idx,
    replacement: AtomicU64,
}

impl RemovalOperation {
    pub fn new(edge: Edge, lower_root: Idx) -> Self {
        Self {
            edge,
            lower_root,
            replacement: AtomicU64::new(NO_EDGE),
        }
    }

    fn decode(bits: u64) -> Replacement {
        match bits {
            NO_EDGE => Replacement::Open,
            CLOSED => Replacement::Closed,
            key => Replacement::Taken(Edge::from_key(key).or_illegal_state("replacement key")),
        }
    }

    pub fn replacement(&self) -> Replacement {
        Self::decode(self.replacement.load(SeqCst))
    }

    pub fn is_open(&self) -> bool {
        self.replacement() == Replacement::Open
    }

    /// Offers e as the replacement. Fails with the current value if it is no longer open.
    pub fn propose(&self, e: Edge) -> Result<(), Replacement> {
        self.replacement
            .compare_exchange(NO_EDGE, e.key(), SeqCst, SeqCst)
            .map(|_| ())
            .map_err(Self::decode)
    }

    /// Stops further proposals. Fails with the taken replacement if there is one.
    pub fn close(&self) -> Result<(), Replacement> {
        self.replacement
            .compare_exchange(NO_EDGE, CLOSED, SeqCst, SeqCst)
            .map(|_| ())
            .map_err(Self::decode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_packing() {
        for status in [
            EdgeStatus::Initial,
            EdgeStatus::Tree,
            EdgeStatus::NonTree,
            EdgeStatus::Proposed,
            EdgeStatus::Failed,
            EdgeStatus::Removed,
        ] {
            for rank in [0, 1, 7, 40] {
                let s = EdgeState::new(status, rank);
                assert_eq!(EdgeState::unpack(s.pack()), s);
            }
        }
    }

    #[test]
    fn cell_transitions() {
        let cell = EdgeCell::new(Edge::new(1, 2), EdgeState::INITIAL);
        let non_tree = EdgeState::new(EdgeStatus::NonTree, 0);
        assert!(cell.cas(EdgeState::INITIAL, non_tree));
        assert!(!cell.cas(EdgeState::INITIAL, EdgeState::new(EdgeStatus::Failed, 0)));
        assert_eq!(cell.load(), non_tree);
    }

    #[test]
    fn one_replacement_wins() {
        let op = RemovalOperation::new(Edge::new(0, 1), 3);
        assert!(op.is_open());
        assert_eq!(op.propose(Edge::new(2, 5)), Ok(()));
        assert_eq!(
            op.propose(Edge::new(4, 5)),
            Err(Replacement::Taken(Edge::new(2, 5)))
        );
        assert_eq!(op.close(), Err(Replacement::Taken(Edge::new(2, 5))));

        let op = RemovalOperation::new(Edge::new(0, 1), 3);
        assert_eq!(op.close(), Ok(()));
        assert_eq!(op.propose(Edge::new(2, 5)), Err(Replacement::Closed));
        assert_eq!(op.replacement(), Replacement::Closed);
    }
}
