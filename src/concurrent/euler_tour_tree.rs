//! Euler tour trees on [`AtomicTreaps`], with versioned roots for optimistic readers.
//!
//! Writers must hold the component they change exclusively. Readers only follow parent pointers,
//! and every chain of parent pointers ends at a vertex, because vertex priorities are below token
//! priorities and priorities strictly decrease towards the root.
//!
//! A cut can leave its two halves joined: the root of the half without the old root, the *lower
//! root*, keeps pointing at the old root. Readers still see one component until
//! [`ConcurrentEulerTourTree::split_roots`], while writers treat the lower root as a root by
//! passing it as `additional_root`.

use std::ops::ControlFlow;

use crossbeam::epoch;
use dashmap::DashMap;

use crate::edge::{illegal_state, Edge, OrIllegalState, NO_EDGE};
use crate::lists::atomic_treap::AtomicTreaps;
use crate::lists::treap::{TreapNodes, EMPTY};
use crate::lists::Idx;

#[derive(Debug)]
pub struct ConcurrentEulerTourTree {
    nodes: AtomicTreaps,
    /// Directed edge -> token.
    edge_to_node: DashMap<Edge, Idx>,
}

impl ConcurrentEulerTourTree {
    pub fn new(n: usize, seed: u64) -> Self {
        Self {
            nodes: AtomicTreaps::new(n, seed),
            edge_to_node: DashMap::new(),
        }
    }

    pub fn nodes(&self) -> &AtomicTreaps {
        &self.nodes
    }

    pub fn root(&self, u: usize) -> Idx {
        (&self.nodes).find_root(u, EMPTY)
    }

    /// Root of u, treating `additional_root` as a root too.
    pub fn root_with(&self, u: Idx, additional_root: Idx) -> Idx {
        (&self.nodes).find_root(u, additional_root)
    }

    pub fn priority(&self, u: Idx) -> u64 {
        (&self.nodes).priority(u)
    }

    pub fn is_root(&self, u: Idx) -> bool {
        (&self.nodes).parent(u) == EMPTY
    }

    /// Number of vertices in the tree rooted at `root`.
    pub fn tree_size(&self, root: Idx) -> usize {
        ((&self.nodes).size(root) + 2) / 3
    }

    pub fn has_tree_edge(&self, u: usize, v: usize) -> bool {
        self.edge_to_node.contains_key(&Edge::directed(u, v))
    }

    fn reread_root(&self, u: usize, was_root: Idx, was_version: u64) -> bool {
        let root = self.root(u);
        root == was_root && self.nodes.version(root) == was_version
    }

    fn check_root(&self, root: Idx, version: u64) -> bool {
        self.is_root(root) && self.nodes.version(root) == version
    }

    /// Lock-free connectivity query. Retries until it reads two roots that did not move.
    pub fn connected(&self, u: usize, v: usize) -> bool {
        let _guard = epoch::pin();
        loop {
            let u_root = self.root(u);
            let u_version = self.nodes.version(u_root);
            let v_root = self.root(v);
            let v_version = self.nodes.version(v_root);
            if !self.reread_root(u, u_root, u_version) {
                continue;
            }
            if u_root != v_root
                && (!self.reread_root(v, v_root, v_version) || !self.check_root(u_root, u_version))
            {
                continue;
            }
            return u_root == v_root;
        }
    }

    /// Connectivity for a thread that owns the component, possibly mid-removal.
    pub fn connected_simple(&self, u: usize, v: usize, additional_root: Idx) -> bool {
        self.root_with(u, additional_root) == self.root_with(v, additional_root)
    }

    /// `[prefix, u, suffix] -> [u, suffix, prefix]`
    fn make_first(&self, u: usize, additional_root: Idx) {
        let mut nodes = &self.nodes;
        let root = nodes.find_root(u, additional_root);
        let position = nodes.position(u, additional_root);
        if position > 0 {
            let (prefix, suffix) = nodes.split_at(root, position);
            nodes.merge(suffix, prefix);
        }
    }

    /// Joins the trees of u and v with the tree edge (u, v). `current` marks it as a tree edge of
    /// exactly this level. The caller owns both trees.
    pub fn link(&self, u: usize, v: usize, current: bool, additional_root: Idx) {
        let mut nodes = &self.nodes;
        self.make_first(u, additional_root);
        self.make_first(v, additional_root);
        let u_root = nodes.find_root(u, additional_root);
        let v_root = nodes.find_root(v, additional_root);
        if u_root == v_root {
            illegal_state(&format!("linking connected vertices {u} and {v}"));
        }
        let (lower, higher) = if nodes.priority(u_root) < nodes.priority(v_root) {
            (u_root, v_root)
        } else {
            (v_root, u_root)
        };
        // Linearization point.
        self.nodes.bump_version(lower);
        nodes.set_parent(higher, lower);

        let e = Edge::new(u, v);
        let uv = nodes.allocate(lower);
        let vu = nodes.allocate(lower);
        if current {
            let token = if u < v { uv } else { vu };
            self.nodes.set_current_level_tree_edge(token, e.key());
            nodes.recalc(token);
        }
        self.edge_to_node.insert(Edge::directed(u, v), uv);
        self.edge_to_node.insert(Edge::directed(v, u), vu);
        let left = nodes.merge(u_root, uv);
        let right = nodes.merge(v_root, vu);
        nodes.merge(left, right);
        log::trace!("link {e:?} current {current}");
    }

    /// Removes the tree edge (u, v) from the tour without separating the two halves for readers.
    /// Returns `(root, lower_root)`: the old root and the root of the other half, which still
    /// points at it.
    pub fn cut(&self, u: usize, v: usize) -> (Idx, Idx) {
        let mut nodes = &self.nodes;
        let (_, uv) = self
            .edge_to_node
            .remove(&Edge::directed(u, v))
            .or_illegal_state("cutting a missing tree edge");
        let (_, vu) = self
            .edge_to_node
            .remove(&Edge::directed(v, u))
            .or_illegal_state("tree edge with one token");
        let root = self.root(u);
        let (mut left, mut right) = (nodes.position(uv, EMPTY), nodes.position(vu, EMPTY));
        if left > right {
            std::mem::swap(&mut left, &mut right);
        }
        let (head, tail) = nodes.split_at(root, right + 1);
        let (head, _) = nodes.split_at(head, right);
        let (outside, inside) = nodes.split_at(head, left);
        let first = nodes.merge(outside, tail);
        let (_, second) = nodes.split_at(inside, 1);

        let (root, lower_root) = if nodes.parent(first) == EMPTY {
            (first, second)
        } else {
            (second, first)
        };
        if nodes.parent(root) != EMPTY || root == lower_root {
            illegal_state("cut without a surviving root");
        }
        // The half may still point at a dropped token.
        nodes.set_parent(lower_root, root);
        self.nodes.retire(uv);
        self.nodes.retire(vu);
        log::trace!("cut {:?}", Edge::new(u, v));
        (root, lower_root)
    }

    /// Finishes a cut for readers: both halves become separate components.
    pub fn split_roots(&self, root: Idx, lower_root: Idx) {
        let mut nodes = &self.nodes;
        // Linearization point.
        self.nodes.bump_version(root);
        self.nodes.bump_version(lower_root);
        nodes.set_parent(lower_root, EMPTY);
    }

    /// Unmarks every tree edge of exactly this level under `node` and returns them.
    pub fn take_current_level_tree_edges(&self, node: Idx) -> Vec<Edge> {
        let mut edges = Vec::new();
        self.collect_current(node, &mut edges);
        edges
    }

    fn collect_current(&self, node: Idx, edges: &mut Vec<Edge>) {
        if !self.nodes.has_current_level_tree_edges(node) {
            return;
        }
        let mut nodes = &self.nodes;
        let [l, r] = nodes.child(node);
        self.collect_current(l, edges);
        if let Some(e) = Edge::from_key(self.nodes.current_level_tree_edge(node)) {
            self.nodes.set_current_level_tree_edge(node, NO_EDGE);
            edges.push(e);
        }
        self.collect_current(r, edges);
        nodes.recalc(node);
    }

    /// Visits, in tour order, the vertices under `node` that hold non-tree edges, until `visit`
    /// breaks. `visit` must keep `non_tree_here` of the vertex it is given up to date; aggregates
    /// on the visited path are recomputed on the way back.
    pub fn search_non_tree_edges<B>(
        &self,
        node: Idx,
        visit: &mut impl FnMut(usize) -> ControlFlow<B>,
    ) -> ControlFlow<B> {
        if !self.nodes.has_non_tree_edges(node) {
            return ControlFlow::Continue(());
        }
        let mut nodes = &self.nodes;
        let [l, r] = nodes.child(node);
        let mut flow = self.search_non_tree_edges(l, visit);
        if flow.is_continue() && node < self.nodes.vertices() && self.nodes.non_tree_here(node) {
            flow = visit(node);
        }
        if flow.is_continue() {
            flow = self.search_non_tree_edges(r, visit);
        }
        nodes.recalc(node);
        flow
    }

    /// Sets whether vertex u holds non-tree edges and refreshes aggregates up to its root.
    pub fn set_non_tree_here(&self, u: usize, value: bool) {
        if self.nodes.non_tree_here(u) != value {
            self.nodes.set_non_tree_here(u, value);
            self.nodes.refresh_up(u, EMPTY);
        }
    }
}
