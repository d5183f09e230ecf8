//! Euler tour trees over any [`Lists`] implementation.
//!
//! Each vertex is one list node and each tree edge `(u, v)` contributes two directed tokens, `u->v`
//! and `v->u`. A tour of a tree with `k` vertices has `3k - 2` nodes.

use std::collections::{BTreeSet, HashMap};

use crate::edge::{illegal_state, Edge, OrIllegalState};
use crate::lists::{treap::Treaps, AggregatedData, Idx, Lists, SearchData, SearchDirection};

#[derive(Debug, Clone, Default)]
pub struct EttData {
    /// Non-tree edges of this level incident to this vertex. Always empty on tokens.
    pub non_tree_edges: BTreeSet<Edge>,
    /// Set on the `u->v` token (u < v) of a tree edge whose level is this one.
    pub current_level_tree_edge: Option<Edge>,
}

#[derive(Debug, Clone, Default)]
pub struct EttAgg {
    pub has_non_tree_edges: bool,
    pub has_current_level_tree_edges: bool,
}

impl AggregatedData for EttAgg {
    type Data = EttData;
    fn from(data: &Self::Data) -> Self {
        Self {
            has_non_tree_edges: !data.non_tree_edges.is_empty(),
            has_current_level_tree_edges: data.current_level_tree_edge.is_some(),
        }
    }
    fn merge(self, right: Self) -> Self {
        Self {
            has_non_tree_edges: self.has_non_tree_edges || right.has_non_tree_edges,
            has_current_level_tree_edges: self.has_current_level_tree_edges
                || right.has_current_level_tree_edges,
        }
    }
}

/// A spanning forest on `n` vertices, stored as Euler tours.
#[derive(Debug)]
pub struct EulerTourTree<L: Lists<EttAgg> = Treaps<EttAgg>> {
    lists: L,
    n: usize,
    /// Directed edge -> token.
    edge_to_node: HashMap<Edge, Idx>,
    /// Tokens of cut edges, reused by later links.
    free: Vec<Idx>,
}

impl<L: Lists<EttAgg>> EulerTourTree<L> {
    pub fn new(n: usize) -> Self {
        let mut lists = L::new(3 * n);
        for _ in 0..n {
            lists.create(EttData::default());
        }
        Self {
            lists,
            n,
            edge_to_node: HashMap::new(),
            free: Vec::new(),
        }
    }

    pub fn vertices(&self) -> usize {
        self.n
    }

    pub fn connected(&self, u: usize, v: usize) -> bool {
        self.lists.on_same_list(u, v)
    }

    /// Node identifying the component of u.
    pub fn root(&self, u: usize) -> Idx {
        self.lists.root(u)
    }

    /// Number of vertices in the component of u.
    pub fn size(&self, u: usize) -> usize {
        (self.lists.len(u) + 2) / 3
    }

    pub fn has_tree_edge(&self, u: usize, v: usize) -> bool {
        self.edge_to_node.contains_key(&Edge::directed(u, v))
    }

    fn make_first(&mut self, u: usize) {
        let k = self.lists.order(u);
        if k > 0 {
            let (_, head, tail) = self.lists.split(u, ..k);
            self.lists.concat(tail, head);
        }
    }

    fn token(&mut self, e: Edge, current: bool) -> Idx {
        let data = EttData {
            non_tree_edges: BTreeSet::new(),
            current_level_tree_edge: (current && e.u() < e.v()).then_some(e),
        };
        let idx = match self.free.pop() {
            Some(idx) => {
                self.lists.mutate_data(idx, |d| *d = data);
                idx
            }
            None => self.lists.create(data),
        };
        self.edge_to_node.insert(e, idx);
        idx
    }

    /// Joins the trees of u and v with the tree edge (u, v). `current` marks the edge as having
    /// exactly this level. Panics if they are already connected.
    pub fn link(&mut self, u: usize, v: usize, current: bool) {
        if self.connected(u, v) {
            illegal_state(&format!("linking connected vertices {u} and {v}"));
        }
        self.make_first(u);
        self.make_first(v);
        let uv = self.token(Edge::directed(u, v), current);
        let vu = self.token(Edge::directed(v, u), current);
        self.lists.concat_all([u, uv, v, vu]);
    }

    /// Removes the tree edge (u, v). Returns the roots of the two resulting trees, first the one
    /// that kept the outside of the removed range.
    pub fn cut(&mut self, u: usize, v: usize) -> (Idx, Idx) {
        let mut a = self
            .edge_to_node
            .remove(&Edge::directed(u, v))
            .or_illegal_state("cutting a missing tree edge");
        let mut b = self
            .edge_to_node
            .remove(&Edge::directed(v, u))
            .or_illegal_state("tree edge with one token");
        let (mut pa, mut pb) = (self.lists.order(a), self.lists.order(b));
        if pa > pb {
            std::mem::swap(&mut a, &mut b);
            std::mem::swap(&mut pa, &mut pb);
        }
        let (left, middle, right) = self.lists.split(a, pa..=pb);
        let inner_len = self.lists.len(middle) - 2;
        let (_, inner, _) = self.lists.split(middle, 1..=inner_len);
        let outer = self.lists.concat(left, right);
        for token in [a, b] {
            self.lists.mutate_data(token, |d| *d = EttData::default());
            self.free.push(token);
        }
        (self.lists.root(outer), self.lists.root(inner))
    }

    /// Clears or sets the "exactly this level" mark of tree edge e.
    pub fn set_current_level(&mut self, e: Edge, current: bool) {
        let token = *self
            .edge_to_node
            .get(&e)
            .or_illegal_state("marking a missing tree edge");
        self.lists.mutate_data(token, |d| {
            d.current_level_tree_edge = current.then_some(e)
        });
    }

    pub fn add_non_tree_edge(&mut self, u: usize, e: Edge) {
        self.lists.mutate_data(u, |d| {
            d.non_tree_edges.insert(e);
        });
    }

    pub fn remove_non_tree_edge(&mut self, u: usize, e: Edge) {
        self.lists.mutate_data(u, |d| {
            d.non_tree_edges.remove(&e);
        });
    }

    pub fn non_tree_edges(&self, u: usize) -> &BTreeSet<Edge> {
        &self.lists.data(u).non_tree_edges
    }

    fn find_flagged(&self, u: Idx, flag: impl Fn(&EttAgg) -> bool) -> Idx {
        self.lists.find_element(u, |s: SearchData<'_, EttAgg>| {
            if flag(s.left_agg) {
                SearchDirection::Left
            } else if flag(&<EttAgg as AggregatedData>::from(s.current_data)) {
                SearchDirection::Found
            } else if flag(s.right_agg) {
                SearchDirection::Right
            } else {
                SearchDirection::NotFound
            }
        })
    }

    /// First tree edge in the tour of u that has exactly this level.
    pub fn first_current_level_tree_edge(&self, u: usize) -> Option<Edge> {
        let found = self.find_flagged(u, |ag| ag.has_current_level_tree_edges);
        if found == L::EMPTY {
            return None;
        }
        self.lists.data(found).current_level_tree_edge
    }

    /// First vertex in the tour of u with non-tree edges on this level.
    pub fn first_with_non_tree_edges(&self, u: usize) -> Option<usize> {
        let found = self.find_flagged(u, |ag| ag.has_non_tree_edges);
        (found != L::EMPTY).then_some(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(n: usize) -> EulerTourTree {
        let mut ett = EulerTourTree::new(n);
        for u in 1..n {
            ett.link(u - 1, u, u % 2 == 0);
        }
        ett
    }

    #[test]
    fn link_and_cut_path() {
        let mut ett = path(6);
        assert!(ett.connected(0, 5));
        assert_eq!(ett.size(3), 6);
        let (a, b) = ett.cut(2, 3);
        assert_ne!(a, b);
        assert!(ett.connected(0, 2));
        assert!(ett.connected(3, 5));
        assert!(!ett.connected(2, 3));
        assert_eq!(ett.size(0), 3);
        assert_eq!(ett.size(5), 3);
        ett.link(5, 0, false);
        assert!(ett.connected(2, 3));
        assert_eq!(ett.size(4), 6);
    }

    #[test]
    fn finds_flagged_nodes() {
        let mut ett = path(4);
        assert_eq!(ett.first_with_non_tree_edges(0), None);
        ett.add_non_tree_edge(3, Edge::new(1, 3));
        assert_eq!(ett.first_with_non_tree_edges(0), Some(3));
        ett.remove_non_tree_edge(3, Edge::new(1, 3));
        assert_eq!(ett.first_with_non_tree_edges(2), None);
        assert_eq!(ett.first_current_level_tree_edge(0), Some(Edge::new(1, 2)));
        ett.set_current_level(Edge::new(1, 2), false);
        assert_eq!(ett.first_current_level_tree_edge(0), None);
    }
}
