//! Treaps whose links are atomics, so lock-free readers can walk parent pointers while writers
//! that own a component restructure it.
//!
//! Memory is a list of geometrically growing segments: segment `k` holds `base << k` nodes and is
//! allocated the first time an index in it is handed out. Indices are never moved, and released
//! indices only return to the free list once every thread pinned at release time has unpinned.

use std::fmt::{Debug, Formatter};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering::*};
use std::sync::{Arc, OnceLock};

use crossbeam::epoch;
use crossbeam::queue::SegQueue;
use debug_tree::{add_branch_to, AsTree, TreeBuilder};
use rand::seq::SliceRandom;
use rand::{rngs, Rng, SeedableRng};

use super::treap::{TreapNodes, EMPTY};
use super::Idx;
use crate::edge::{OrIllegalState, NO_EDGE};

const SEGMENTS: usize = 40;

struct AtomicNode {
    parent: AtomicUsize,
    left: AtomicUsize,
    right: AtomicUsize,
    size: AtomicUsize,
    priority: AtomicU64,
    /// Bumped whenever this node stops or starts being a component root.
    version: AtomicU64,
    non_tree_here: AtomicBool,
    has_non_tree_edges: AtomicBool,
    has_current_level_tree_edges: AtomicBool,
    /// Key of the tree edge stored on this token if it has exactly this level.
    current_level_tree_edge: AtomicU64,
}

impl Default for AtomicNode {
    fn default() -> Self {
        Self {
            parent: AtomicUsize::new(EMPTY),
            left: AtomicUsize::new(EMPTY),
            right: AtomicUsize::new(EMPTY),
            size: AtomicUsize::new(1),
            priority: AtomicU64::new(0),
            version: AtomicU64::new(0),
            non_tree_here: AtomicBool::new(false),
            has_non_tree_edges: AtomicBool::new(false),
            has_current_level_tree_edges: AtomicBool::new(false),
            current_level_tree_edge: AtomicU64::new(NO_EDGE),
        }
    }
}

pub struct AtomicTreaps {
    base: usize,
    vertices: usize,
    segments: Box<[OnceLock<Box<[AtomicNode]>>]>,
    next: AtomicUsize,
    free: Arc<SegQueue<Idx>>,
}

impl AtomicTreaps {
    /// `n` single-node treaps, one per vertex, with indices `0..n`. Vertex priorities are a
    /// seeded permutation of `0..n`, so they are below every token priority.
    pub fn new(n: usize, seed: u64) -> Self {
        let treaps = Self {
            base: (3 * n).max(16),
            vertices: n,
            segments: (0..SEGMENTS).map(|_| OnceLock::new()).collect(),
            next: AtomicUsize::new(n),
            free: Arc::new(SegQueue::new()),
        };
        let mut priorities: Vec<u64> = (0..n as u64).collect();
        priorities.shuffle(&mut rngs::StdRng::seed_from_u64(seed));
        for (u, p) in priorities.into_iter().enumerate() {
            treaps.reset(u, p, EMPTY);
        }
        treaps
    }

    fn locate(&self, u: Idx) -> (usize, usize) {
        let t = u / self.base + 1;
        let k = (usize::BITS - 1 - t.leading_zeros()) as usize;
        (k, u - self.base * ((1 << k) - 1))
    }

    fn node(&self, u: Idx) -> &AtomicNode {
        let (k, offset) = self.locate(u);
        &self
            .segments
            .get(k)
            .and_then(OnceLock::get)
            .or_illegal_state("node outside allocated segments")[offset]
    }

    fn reset(&self, u: Idx, priority: u64, parent: Idx) {
        let (k, offset) = self.locate(u);
        let segment = self
            .segments
            .get(k)
            .or_illegal_state("out of treap segments")
            .get_or_init(|| (0..self.base << k).map(|_| AtomicNode::default()).collect());
        let n = &segment[offset];
        n.left.store(EMPTY, Relaxed);
        n.right.store(EMPTY, Relaxed);
        n.size.store(1, Relaxed);
        n.priority.store(priority, Relaxed);
        n.non_tree_here.store(false, Relaxed);
        n.has_non_tree_edges.store(false, Relaxed);
        n.has_current_level_tree_edges.store(false, Relaxed);
        n.current_level_tree_edge.store(NO_EDGE, Relaxed);
        n.parent.store(parent, SeqCst);
    }

    /// Allocates a token node with the given parent. The parent is where walks from the new node
    /// go until it is merged into place.
    pub fn allocate(&self, parent: Idx) -> Idx {
        let u = self
            .free
            .pop()
            .unwrap_or_else(|| self.next.fetch_add(1, Relaxed));
        let salt = rand::thread_rng().gen::<u32>() >> 1;
        let priority = self.vertices as u64 + ((salt as u64) << 32 | u as u64);
        self.reset(u, priority, parent);
        u
    }

    /// Returns `u` to the free list once no pinned reader can still reach it.
    pub fn retire(&self, u: Idx) {
        let free = Arc::clone(&self.free);
        epoch::pin().defer(move || free.push(u));
    }

    pub fn vertices(&self) -> usize {
        self.vertices
    }

    pub fn version(&self, u: Idx) -> u64 {
        self.node(u).version.load(SeqCst)
    }
    pub fn bump_version(&self, u: Idx) {
        self.node(u).version.fetch_add(1, SeqCst);
    }

    pub fn non_tree_here(&self, u: Idx) -> bool {
        self.node(u).non_tree_here.load(Acquire)
    }
    pub fn set_non_tree_here(&self, u: Idx, value: bool) {
        self.node(u).non_tree_here.store(value, Release);
    }
    pub fn has_non_tree_edges(&self, u: Idx) -> bool {
        u != EMPTY && self.node(u).has_non_tree_edges.load(Acquire)
    }
    pub fn has_current_level_tree_edges(&self, u: Idx) -> bool {
        u != EMPTY && self.node(u).has_current_level_tree_edges.load(Acquire)
    }
    pub fn current_level_tree_edge(&self, u: Idx) -> u64 {
        self.node(u).current_level_tree_edge.load(Acquire)
    }
    pub fn set_current_level_tree_edge(&self, u: Idx, key: u64) {
        self.node(u).current_level_tree_edge.store(key, Release);
    }

    /// Recomputes aggregates from u up to the first node whose parent is EMPTY or `stop`.
    pub fn refresh_up(&self, mut u: Idx, stop: Idx) {
        let mut nodes = self;
        while u != EMPTY {
            nodes.recalc(u);
            if u == stop {
                break;
            }
            u = nodes.parent(u);
        }
    }

    fn tree_inorder_dbg<T: AsTree>(&self, u: Idx, tree: &T) {
        let [l, r] = self.child(u);
        if l != EMPTY {
            self.tree_inorder_dbg(l, tree);
        }
        add_branch_to!(
            *tree,
            "[{u}] size {} non-tree {} current {}",
            self.size(u),
            self.non_tree_here(u),
            self.current_level_tree_edge(u) != NO_EDGE
        );
        if r != EMPTY {
            self.tree_inorder_dbg(r, tree);
        }
    }
}

impl Debug for AtomicTreaps {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        let builder = TreeBuilder::new();
        let _b = builder.add_branch("AtomicTreaps");
        for u in 0..self.vertices {
            if self.parent(u) == EMPTY {
                self.tree_inorder_dbg(u, &builder);
            }
        }
        writeln!(f, "{}", builder.string())
    }
}

// Implemented on the shared reference: writers only ever touch components they hold exclusively,
// and readers only follow parent pointers.
impl TreapNodes for &AtomicTreaps {
    fn priority(&self, u: Idx) -> u64 {
        self.node(u).priority.load(Relaxed)
    }
    fn parent(&self, u: Idx) -> Idx {
        if u == EMPTY {
            EMPTY
        } else {
            self.node(u).parent.load(SeqCst)
        }
    }
    fn child(&self, u: Idx) -> [Idx; 2] {
        if u == EMPTY {
            return [EMPTY; 2];
        }
        let n = self.node(u);
        [n.left.load(Acquire), n.right.load(Acquire)]
    }
    fn size(&self, u: Idx) -> usize {
        if u == EMPTY {
            0
        } else {
            self.node(u).size.load(Relaxed)
        }
    }
    fn set_parent(&mut self, u: Idx, p: Idx) {
        self.node(u).parent.store(p, SeqCst);
    }
    fn set_child(&mut self, u: Idx, side: usize, c: Idx) {
        let n = self.node(u);
        if side == 0 {
            n.left.store(c, Release);
        } else {
            n.right.store(c, Release);
        }
        if c != EMPTY {
            self.node(c).parent.store(u, SeqCst);
        }
    }
    fn recalc(&mut self, u: Idx) {
        if u == EMPTY {
            return;
        }
        let [l, r] = self.child(u);
        let n = self.node(u);
        n.size.store(1 + self.size(l) + self.size(r), Relaxed);
        let non_tree = n.non_tree_here.load(Acquire)
            || self.has_non_tree_edges(l)
            || self.has_non_tree_edges(r);
        n.has_non_tree_edges.store(non_tree, Release);
        let current = n.current_level_tree_edge.load(Acquire) != NO_EDGE
            || self.has_current_level_tree_edges(l)
            || self.has_current_level_tree_edges(r);
        n.has_current_level_tree_edges.store(current, Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn segments_cover_indices() {
        let t = AtomicTreaps::new(2, 1);
        assert_eq!(t.locate(0), (0, 0));
        assert_eq!(t.locate(15), (0, 15));
        assert_eq!(t.locate(16), (1, 0));
        assert_eq!(t.locate(47), (1, 31));
        assert_eq!(t.locate(48), (2, 0));
        let tokens: Vec<_> = (0..100).map(|_| t.allocate(0)).collect();
        for &u in &tokens {
            assert_eq!((&t).parent(u), 0);
            assert!((&t).priority(u) > (&t).priority(0).max((&t).priority(1)));
        }
    }

    #[test]
    fn merge_and_split_keep_sizes() {
        let t = AtomicTreaps::new(6, 7);
        let mut nodes = &t;
        let mut root = EMPTY;
        for u in 0..6 {
            root = nodes.merge(root, u);
        }
        assert_eq!(nodes.size(root), 6);
        for u in 0..6 {
            assert_eq!(nodes.position(u, EMPTY), u);
            assert_eq!(nodes.find_root(u, EMPTY), root);
        }
        let (a, b) = nodes.split_at(root, 2);
        assert_eq!((nodes.size(a), nodes.size(b)), (2, 4));
        assert_eq!(nodes.position(3, b), 1);
        let root = nodes.merge(b, a);
        assert_eq!(nodes.position(0, EMPTY), 4);
        assert_eq!(nodes.position(5, EMPTY), 3);
        assert_eq!(nodes.size(root), 6);
    }

    #[test]
    fn aggregates_follow_flags() {
        let t = AtomicTreaps::new(4, 3);
        let mut nodes = &t;
        let root = (0..4).fold(EMPTY, |r, u| nodes.merge(r, u));
        assert!(!t.has_non_tree_edges(root));
        t.set_non_tree_here(2, true);
        t.refresh_up(2, EMPTY);
        assert!(t.has_non_tree_edges(root));
        t.set_current_level_tree_edge(1, 5);
        t.refresh_up(1, EMPTY);
        assert!(t.has_current_level_tree_edges(root));
        t.set_non_tree_here(2, false);
        t.refresh_up(2, EMPTY);
        assert!(!t.has_non_tree_edges(root));
    }

    #[test]
    fn retired_slots_wait_for_readers() {
        let t = AtomicTreaps::new(2, 9);
        let u = t.allocate(0);
        let reader = epoch::pin();
        t.retire(u);
        assert!(t.free.is_empty());
        assert_ne!(t.allocate(0), u);
        drop(reader);
        for _ in 0..100_000 {
            if !t.free.is_empty() {
                break;
            }
            epoch::pin().flush();
        }
        assert_eq!(t.allocate(1), u);
        assert_eq!((&t).parent(u), 1);
    }
}
