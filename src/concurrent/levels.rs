//! The multi-level engine behind every locking variant. All methods that change the structure
//! expect the caller to hold the level-0 components of the edge's endpoints.

use std::collections::HashSet;
use std::ops::ControlFlow;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::Mutex;

use super::euler_tour_tree::ConcurrentEulerTourTree;
use crate::edge::{illegal_state, levels_for, Edge};
use crate::lists::treap::EMPTY;
use crate::lists::Idx;

struct Level {
    tree: ConcurrentEulerTourTree,
    /// Non-tree edges of exactly this rank, per vertex.
    non_tree_edges: Box<[Mutex<HashSet<Edge>>]>,
}

pub struct Levels {
    levels: Box<[Level]>,
    ranks: DashMap<Edge, usize>,
}

impl Levels {
    pub fn new(n: usize) -> Self {
        Self {
            levels: (0..levels_for(n))
                .map(|i| Level {
                    tree: ConcurrentEulerTourTree::new(n, i as u64),
                    non_tree_edges: (0..n).map(|_| Mutex::default()).collect(),
                })
                .collect(),
            ranks: DashMap::new(),
        }
    }

    /// The level spanning the whole graph.
    pub fn base(&self) -> &ConcurrentEulerTourTree {
        &self.levels[0].tree
    }

    pub fn rank(&self, e: Edge) -> Option<usize> {
        self.ranks.get(&e).map(|r| *r)
    }

    pub fn add_edge(&self, u: usize, v: usize) {
        assert_ne!(u, v, "self-loops are not edges");
        let e = Edge::new(u, v);
        match self.ranks.entry(e) {
            Entry::Occupied(_) => return,
            Entry::Vacant(entry) => {
                entry.insert(0);
            }
        }
        if self.base().connected_simple(u, v, EMPTY) {
            log::debug!("{e:?} added as non-tree edge");
            self.add_non_tree_edge(0, e);
        } else {
            log::debug!("{e:?} added as tree edge");
            self.base().link(u, v, true, EMPTY);
        }
    }

    pub fn remove_edge(&self, u: usize, v: usize) {
        let e = Edge::new(u, v);
        let Some((_, rank)) = self.ranks.remove(&e) else {
            return;
        };
        let (u, v) = (e.u(), e.v());
        if !self.levels[rank].tree.has_tree_edge(u, v) {
            log::debug!("{e:?} removed, non-tree at rank {rank}");
            self.remove_non_tree_edge(rank, e);
            return;
        }
        for r in (0..=rank).rev() {
            let tree = &self.levels[r].tree;
            let (root, lower_root) = tree.cut(u, v);
            let small = if tree.tree_size(root) <= tree.tree_size(lower_root) {
                root
            } else {
                lower_root
            };
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
        log::debug!("{e:?} removed, components split");
    }

    pub(crate) fn next_rank(&self, r: usize) -> usize {
        if r + 1 >= self.levels.len() {
            illegal_state(&format!("promoting past the top level {r}"));
        }
        r + 1
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
            self.ranks.insert(f, next);
        }
    }

    fn find_replacement(&self, small: Idx, r: usize, lower_root: Idx) -> Option<Edge> {
        let level = &self.levels[r];
        let flow = level.tree.search_non_tree_edges(small, &mut |x| loop {
            let next = {
                let mut edges = level.non_tree_edges[x].lock();
                let f = edges.iter().next().copied();
                if let Some(f) = f {
                    edges.remove(&f);
                }
                (f, edges.is_empty())
            };
            let (f, now_empty) = match next {
                (Some(f), now_empty) => (f, now_empty),
                (None, _) => {
                    level.tree.nodes().set_non_tree_here(x, false);
                    return ControlFlow::Continue(());
                }
            };
            if now_empty {
                level.tree.nodes().set_non_tree_here(x, false);
            }
            let y = if f.u() == x { f.v() } else { f.u() };
            self.remove_endpoint(r, y, f);
            if !level.tree.connected_simple(f.u(), f.v(), lower_root) {
                return ControlFlow::Break(f);
            }
            let next = self.next_rank(r);
            log::trace!("promote non-tree edge {f:?} to {next}");
            self.add_non_tree_edge(next, f);
            self.ranks.insert(f, next);
        });
        match flow {
            ControlFlow::Break(f) => Some(f),
            ControlFlow::Continue(()) => None,
        }
    }

    fn add_non_tree_edge(&self, r: usize, e: Edge) {
        let level = &self.levels[r];
        for x in [e.u(), e.v()] {
            level.non_tree_edges[x].lock().insert(e);
            level.tree.set_non_tree_here(x, true);
        }
    }

    fn remove_endpoint(&self, r: usize, x: usize, e: Edge) {
        let level = &self.levels[r];
        let now_empty = {
            let mut edges = level.non_tree_edges[x].lock();
            edges.remove(&e);
            edges.is_empty()
        };
        if now_empty {
            level.tree.set_non_tree_here(x, false);
        }
    }

    fn remove_non_tree_edge(&self, r: usize, e: Edge) {
        self.remove_endpoint(r, e.u(), e);
        self.remove_endpoint(r, e.v(), e);
    }
}
