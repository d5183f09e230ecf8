//! HDT where most updates take no locks.
//!
//! An edge whose endpoints are already connected is added without locking: its state cell is
//! pushed to the level-0 queues of both endpoints and then decided by a CAS, possibly against a
//! tree edge removal running in the same component. Non-tree edges are removed by a single CAS.
//! Only adds that join two components and removals of tree edges lock, like
//! [`LockingDynamicConnectivity`](super::fine_grained::LockingDynamicConnectivity) does.
//!
//! A removal at level 0 publishes a [`RemovalOperation`] on the component root, so lock-free adders
//! can offer their edge as the replacement. The operation is closed before the halves are split,
//! after which adders fall back to locking.
//!
//! Queue entries are never removed eagerly. An entry is live while its cell is `NonTree` at the
//! queue's level, or still undecided at level 0. Aggregated flags are only written by lock
//! holders: lock-free adders mark their endpoints dirty and the next removal in the component
//! refreshes them.

use std::ops::ControlFlow;
use std::sync::atomic::{AtomicBool, Ordering::SeqCst};
use std::sync::Arc;

use arc_swap::ArcSwapOption;
use crossbeam::epoch;
use crossbeam::utils::CachePadded;
use dashmap::DashMap;
use parking_lot::Mutex;

use super::edge_state::{EdgeCell, EdgeState, EdgeStatus, RemovalOperation, Replacement};
use super::euler_tour_tree::ConcurrentEulerTourTree;
use super::locks::{lock_components, ComponentLocks, GlobalMutex, RootMutexes};
use crate::dynamic_connectivity::DynamicConnectivity;
use crate::edge::{illegal_state, levels_for, Edge, OrIllegalState};
use crate::lists::treap::EMPTY;
use crate::lists::Idx;
use crate::ms_queue::MsQueue;

const fn tree_at(rank: usize) -> EdgeState {
    EdgeState::new(EdgeStatus::Tree, rank)
}
const fn non_tree_at(rank: usize) -> EdgeState {
    EdgeState::new(EdgeStatus::NonTree, rank)
}
const PROPOSED: EdgeState = EdgeState::new(EdgeStatus::Proposed, 0);
const FAILED: EdgeState = EdgeState::new(EdgeStatus::Failed, 0);
const REMOVED: EdgeState = EdgeState::new(EdgeStatus::Removed, 0);

struct Level {
    tree: ConcurrentEulerTourTree,
    queues: Box<[MsQueue<Arc<EdgeCell>>]>,
}

pub struct Major<L> {
    levels: Box<[Level]>,
    states: DashMap<Edge, Arc<EdgeCell>>,
    /// Removal in progress, indexed by the root of its component.
    removals: Box<[CachePadded<ArcSwapOption<RemovalOperation>>]>,
    dirty: Box<[AtomicBool]>,
    dirty_list: Mutex<Vec<usize>>,
    locks: L,
}

pub type MajorDynamicConnectivity = Major<RootMutexes>;
pub type MajorCoarseGrainedDynamicConnectivity = Major<GlobalMutex>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Attempt {
    Done,
    /// Redo the add under locks.
    Blocking,
}

/// What to do with a level-0 queue entry after looking at it.
enum Scan {
    Drop,
    Keep,
    /// It became the replacement of the removal.
    Proposed,
}

impl<L: ComponentLocks> Major<L> {
    fn base(&self) -> &ConcurrentEulerTourTree {
        &self.levels[0].tree
    }

    /// Rank of the edge (u, v), if it is present and decided.
    pub fn rank(&self, u: usize, v: usize) -> Option<usize> {
        let state = self.states.get(&Edge::new(u, v))?.load();
        matches!(state.status, EdgeStatus::Tree | EdgeStatus::NonTree).then_some(state.rank)
    }

    fn cell(&self, e: Edge) -> Arc<EdgeCell> {
        self.states
            .get(&e)
            .map(|c| Arc::clone(&c))
            .or_illegal_state("tree edge without a state")
    }

    fn forget(&self, cell: &Arc<EdgeCell>) {
        self.states.remove_if(&cell.edge, |_, c| Arc::ptr_eq(c, cell));
    }

    fn next_rank(&self, r: usize) -> usize {
        if r + 1 >= self.levels.len() {
            illegal_state(&format!("promoting past the top level {r}"));
        }
        r + 1
    }

    /// A set dirty flag always means `x` is in `dirty_list`: both change under its lock.
    fn mark_dirty(&self, x: usize) {
        let mut list = self.dirty_list.lock();
        if !self.dirty[x].swap(true, SeqCst) {
            list.push(x);
        }
    }

    /// Files a decided non-tree edge at level r. Lock holders only.
    fn push_non_tree(&self, r: usize, cell: &Arc<EdgeCell>) {
        let level = &self.levels[r];
        for x in [cell.edge.u(), cell.edge.v()] {
            level.queues[x].push(Arc::clone(cell));
            level.tree.set_non_tree_here(x, true);
        }
    }

    /// Adds e without locks, expecting its endpoints to be connected.
    fn try_add(&self, e: Edge) -> Attempt {
        let (u, v) = (e.u(), e.v());
        let cell = Arc::new(EdgeCell::new(e, EdgeState::INITIAL));
        self.states.insert(e, Arc::clone(&cell));
        for x in [u, v] {
            self.levels[0].queues[x].push(Arc::clone(&cell));
            self.mark_dirty(x);
        }
        let tree = self.base();
        let _guard = epoch::pin();
        let decided = match self.removals[tree.root(u)].load_full() {
            None => tree.connected(u, v) && cell.cas(EdgeState::INITIAL, non_tree_at(0)),
            Some(op) => {
                if !tree.connected_simple(u, v, EMPTY) {
                    false
                } else {
                    match op.replacement() {
                        Replacement::Closed => false,
                        Replacement::Taken(_) => cell.cas(EdgeState::INITIAL, non_tree_at(0)),
                        Replacement::Open if tree.connected_simple(u, v, op.lower_root) => {
                            cell.cas(EdgeState::INITIAL, non_tree_at(0))
                        }
                        Replacement::Open => {
                            if cell.cas(EdgeState::INITIAL, PROPOSED) {
                                return match op.propose(e) {
                                    Ok(()) => {
                                        log::debug!("{e:?} proposed to replace {:?}", op.edge);
                                        Attempt::Done
                                    }
                                    Err(Replacement::Taken(_)) => {
                                        cell.store(non_tree_at(0));
                                        Attempt::Done
                                    }
                                    Err(_) => {
                                        cell.store(FAILED);
                                        Attempt::Blocking
                                    }
                                };
                            }
                            false
                        }
                    }
                }
            }
        };
        if decided {
            Attempt::Done
        } else {
            Self::settle(&cell)
        }
    }

    /// Outcome of an add attempt whose cell may have been decided by a remover.
    fn settle(cell: &EdgeCell) -> Attempt {
        loop {
            let state = cell.load();
            match state.status {
                EdgeStatus::Tree | EdgeStatus::NonTree | EdgeStatus::Proposed => {
                    return Attempt::Done
                }
                EdgeStatus::Failed => return Attempt::Blocking,
                EdgeStatus::Initial => {
                    if cell.cas(state, FAILED) {
                        return Attempt::Blocking;
                    }
                }
                EdgeStatus::Removed => illegal_state("edge removed while being added"),
            }
        }
    }

    fn add_blocking(&self, e: Edge) {
        let (u, v) = (e.u(), e.v());
        lock_components(&self.locks, self.base(), u, v, || {
            let tree = self.base();
            if tree.connected_simple(u, v, EMPTY) {
                let cell = Arc::new(EdgeCell::new(e, non_tree_at(0)));
                self.states.insert(e, Arc::clone(&cell));
                self.push_non_tree(0, &cell);
                log::debug!("{e:?} added as non-tree edge");
            } else {
                self.states.insert(e, Arc::new(EdgeCell::new(e, tree_at(0))));
                tree.link(u, v, true, EMPTY);
                log::debug!("{e:?} added as tree edge");
            }
        })
    }

    /// Returns false if the edge changed before its components were locked.
    fn remove_tree_edge(&self, cell: &Arc<EdgeCell>) -> bool {
        let e = cell.edge;
        lock_components(&self.locks, self.base(), e.u(), e.v(), || {
            let state = cell.load();
            if state.status != EdgeStatus::Tree {
                return false;
            }
            cell.store(REMOVED);
            self.forget(cell);
            self.replace_tree_edge(e, state.rank);
            true
        })
    }

    fn replace_tree_edge(&self, e: Edge, rank: usize) {
        let (u, v) = (e.u(), e.v());
        for r in (1..=rank).rev() {
            let tree = &self.levels[r].tree;
            let (root, lower_root) = tree.cut(u, v);
            let small = Self::smaller(tree, root, lower_root);
            self.promote_tree_edges(small, r);
            if let Some(f) = self.find_replacement(small, r, lower_root) {
                log::debug!("{e:?} removed, replaced by {f:?} at rank {r}");
                for i in (0..=r).rev() {
                    let lr = if i == r {
                        lower_root
                    } else {
                        self.levels[i].tree.cut(u, v).1
                    };
                    self.levels[i].tree.link(f.u(), f.v(), i == r, lr);
                }
                return;
            }
            tree.split_roots(root, lower_root);
        }
        self.remove_at_base(e);
    }

    fn smaller(tree: &ConcurrentEulerTourTree, root: Idx, lower_root: Idx) -> Idx {
        if tree.tree_size(root) <= tree.tree_size(lower_root) {
            root
        } else {
            lower_root
        }
    }

    fn remove_at_base(&self, e: Edge) {
        let tree = self.base();
        let (root, lower_root) = tree.cut(e.u(), e.v());
        let op = Arc::new(RemovalOperation::new(e, lower_root));
        self.removals[root].store(Some(Arc::clone(&op)));
        let _guard = epoch::pin();
        self.drain_dirty(root);
        let small = Self::smaller(tree, root, lower_root);
        self.promote_tree_edges(small, 0);
        self.search_base(small, &op);
        self.finish_base_removal(root, &op);
    }

    /// Closes the published removal on `root`, then links the replacement or splits.
    fn finish_base_removal(&self, root: Idx, op: &RemovalOperation) {
        let tree = self.base();
        match op.close() {
            Ok(()) => {
                tree.split_roots(root, op.lower_root);
                log::debug!("{:?} removed, components split", op.edge);
            }
            Err(Replacement::Taken(f)) => {
                self.cell(f).store(tree_at(0));
                tree.link(f.u(), f.v(), true, op.lower_root);
                log::debug!("{:?} removed, replaced by {f:?} at rank 0", op.edge);
            }
            Err(_) => illegal_state("removal closed twice"),
        }
        self.removals[root].store(None);
    }

    /// Refreshes the level-0 flags of the dirty vertices in the component of `root`.
    fn drain_dirty(&self, root: Idx) {
        let level = &self.levels[0];
        let mine: Vec<usize> = {
            let mut list = self.dirty_list.lock();
            let (mine, others): (Vec<usize>, Vec<usize>) =
                list.drain(..).partition(|&x| level.tree.root(x) == root);
            *list = others;
            for &x in &mine {
                self.dirty[x].store(false, SeqCst);
            }
            mine
        };
        // An adder marking x again from here on either sees this removal published or leaves x
        // listed for the next one.
        for x in mine {
            level.tree.set_non_tree_here(x, level.queues[x].is_not_empty());
        }
    }

    fn promote_tree_edges(&self, small: Idx, r: usize) {
        let edges = self.levels[r].tree.take_current_level_tree_edges(small);
        if edges.is_empty() {
            return;
        }
        let next = self.next_rank(r);
        for f in edges {
            log::trace!("promote tree edge {f:?} to {next}");
            self.levels[next].tree.link(f.u(), f.v(), true, EMPTY);
            self.cell(f).store(tree_at(next));
        }
    }

    /// Claims a non-tree edge of rank r crossing the cut, promoting the ones that do not.
    fn find_replacement(&self, small: Idx, r: usize, lower_root: Idx) -> Option<Edge> {
        let level = &self.levels[r];
        let flow = level.tree.search_non_tree_edges(small, &mut |x| {
            let mut found = None;
            while let Some(cell) = level.queues[x].pop() {
                let state = cell.load();
                if state != non_tree_at(r) {
                    continue;
                }
                let f = cell.edge;
                if !level.tree.connected_simple(f.u(), f.v(), lower_root) {
                    if cell.cas(state, tree_at(r)) {
                        found = Some(f);
                        break;
                    }
                } else {
                    let next = self.next_rank(r);
                    if cell.cas(state, non_tree_at(next)) {
                        log::trace!("promote non-tree edge {f:?} to {next}");
                        self.push_non_tree(next, &cell);
                    }
                }
            }
            level
                .tree
                .nodes()
                .set_non_tree_here(x, level.queues[x].is_not_empty());
            found.map_or(ControlFlow::Continue(()), ControlFlow::Break)
        });
        match flow {
            ControlFlow::Break(f) => Some(f),
            ControlFlow::Continue(()) => None,
        }
    }

    /// Looks for a replacement at level 0 while the removal is open.
    fn search_base(&self, small: Idx, op: &RemovalOperation) {
        let level = &self.levels[0];
        let _ = level.tree.search_non_tree_edges(small, &mut |x| {
            let mut kept = Vec::new();
            while op.is_open() {
                let Some(cell) = level.queues[x].pop() else {
                    break;
                };
                match self.scan_base_entry(&cell, op) {
                    Scan::Drop => {}
                    Scan::Keep => kept.push(cell),
                    Scan::Proposed => break,
                }
            }
            for cell in kept {
                level.queues[x].push(cell);
            }
            level
                .tree
                .nodes()
                .set_non_tree_here(x, level.queues[x].is_not_empty());
            if op.is_open() {
                ControlFlow::Continue(())
            } else {
                ControlFlow::Break(())
            }
        });
    }

    fn scan_base_entry(&self, cell: &Arc<EdgeCell>, op: &RemovalOperation) -> Scan {
        let tree = self.base();
        let (a, b) = (cell.edge.u(), cell.edge.v());
        loop {
            let state = cell.load();
            match (state.status, state.rank) {
                (EdgeStatus::Initial, _) => {
                    if !tree.connected_simple(a, b, EMPTY) {
                        // The adder saw a stale component.
                        if cell.cas(state, FAILED) {
                            return Scan::Drop;
                        }
                    } else if tree.connected_simple(a, b, op.lower_root) {
                        cell.cas(state, non_tree_at(0));
                    } else if cell.cas(state, PROPOSED) {
                        return Self::propose(cell, op);
                    }
                }
                (EdgeStatus::NonTree, 0) => {
                    if tree.connected_simple(a, b, op.lower_root) {
                        let next = self.next_rank(0);
                        if cell.cas(state, non_tree_at(next)) {
                            log::trace!("promote non-tree edge {:?} to {next}", cell.edge);
                            self.push_non_tree(next, cell);
                            return Scan::Drop;
                        }
                    } else if cell.cas(state, PROPOSED) {
                        return Self::propose(cell, op);
                    }
                }
                (EdgeStatus::Proposed, _) => return Scan::Keep,
                _ => return Scan::Drop,
            }
        }
    }

    fn propose(cell: &EdgeCell, op: &RemovalOperation) -> Scan {
        match op.propose(cell.edge) {
            Ok(()) => Scan::Proposed,
            Err(_) => {
                cell.store(non_tree_at(0));
                Scan::Keep
            }
        }
    }
}

impl<L: ComponentLocks> DynamicConnectivity for Major<L> {
    fn new(n: usize) -> Self {
        Self {
            levels: (0..levels_for(n))
                .map(|i| Level {
                    tree: ConcurrentEulerTourTree::new(n, i as u64),
                    queues: (0..n).map(|_| MsQueue::new()).collect(),
                })
                .collect(),
            states: DashMap::new(),
            removals: (0..n)
                .map(|_| CachePadded::new(ArcSwapOption::empty()))
                .collect(),
            dirty: (0..n).map(|_| AtomicBool::new(false)).collect(),
            dirty_list: Mutex::default(),
            locks: L::new(n),
        }
    }

    fn add_edge(&self, u: usize, v: usize) {
        assert_ne!(u, v, "self-loops are not edges");
        let e = Edge::new(u, v);
        if self.states.contains_key(&e) {
            return;
        }
        if self.base().connected(u, v) && self.try_add(e) == Attempt::Done {
            log::debug!("{e:?} added without locks");
            return;
        }
        self.add_blocking(e);
    }

    fn remove_edge(&self, u: usize, v: usize) {
        let e = Edge::new(u, v);
        loop {
            let Some(cell) = self.states.get(&e).map(|c| Arc::clone(&c)) else {
                return;
            };
            let state = cell.load();
            match state.status {
                EdgeStatus::NonTree => {
                    if cell.cas(state, REMOVED) {
                        self.forget(&cell);
                        log::debug!("{e:?} removed, non-tree at rank {}", state.rank);
                        return;
                    }
                }
                EdgeStatus::Tree => {
                    if self.remove_tree_edge(&cell) {
                        return;
                    }
                }
                EdgeStatus::Removed => return,
                // Some remover is deciding it.
                EdgeStatus::Initial | EdgeStatus::Proposed | EdgeStatus::Failed => {
                    std::thread::yield_now()
                }
            }
        }
    }

    fn connected(&self, u: usize, v: usize) -> bool {
        self.base().connected(u, v)
    }
}
