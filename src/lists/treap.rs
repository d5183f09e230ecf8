use std::fmt::{Debug, Display, Formatter};

use debug_tree::{add_branch_to, AsTree, TreeBuilder};
use derivative::Derivative;
use rand::{rngs, Rng, SeedableRng};

use super::{AggregatedData, Idx, Lists, SearchData, SearchDirection};

pub(crate) fn node_fmt(u: &Idx, f: &mut Formatter) -> std::fmt::Result {
    if *u == EMPTY {
        write!(f, "∅")
    } else {
        write!(f, "{u}")
    }
}
pub(crate) fn node2_fmt([u, v]: &[Idx; 2], f: &mut Formatter) -> std::fmt::Result {
    write!(f, "[")?;
    node_fmt(u, f)?;
    write!(f, ", ")?;
    node_fmt(v, f)?;
    write!(f, "]")
}

/// Used to pretty print a Idx, outputting ∅ if it is EMPTY.
pub struct PrettyIdx(pub Idx);

impl Display for PrettyIdx {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        node_fmt(&self.0, f)
    }
}

impl Debug for PrettyIdx {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        <Self as Display>::fmt(self, f)
    }
}

use PrettyIdx as I;

/// Missing node.
pub const EMPTY: Idx = usize::MAX;

/// Raw node access for an implicit treap, plus the treap algorithms built on top of it.
///
/// Smaller priorities are closer to the root, so along any chain of parent pointers priorities
/// strictly decrease. `split_at` does not clear the parent pointer of the roots it returns: they
/// keep pointing at a former ancestor, which still has a smaller priority. Callers that need clean
/// roots must reset them, and walks over a tree that may hold such stale pointers pass the node
/// they want to treat as the root as `stop`.
pub trait TreapNodes {
    fn priority(&self, u: Idx) -> u64;
    fn parent(&self, u: Idx) -> Idx;
    /// Left and right child.
    fn child(&self, u: Idx) -> [Idx; 2];
    /// Subtree size, 0 for EMPTY.
    fn size(&self, u: Idx) -> usize;
    fn set_parent(&mut self, u: Idx, p: Idx);
    /// Sets `child(u)[side] = c` and, if c exists, points c back at u.
    fn set_child(&mut self, u: Idx, side: usize, c: Idx);
    /// Recomputes size and aggregates of u from its children.
    fn recalc(&mut self, u: Idx);

    /// Concatenates the treaps rooted at a and b. Returns the new root.
    fn merge(&mut self, a: Idx, b: Idx) -> Idx {
        if a == EMPTY {
            return b;
        } else if b == EMPTY {
            return a;
        }
        if self.priority(a) < self.priority(b) {
            let [_, r] = self.child(a);
            let m = self.merge(r, b);
            self.set_child(a, 1, m);
            self.recalc(a);
            a
        } else {
            let [l, _] = self.child(b);
            let m = self.merge(a, l);
            self.set_child(b, 0, m);
            self.recalc(b);
            b
        }
    }

    /// Splits the treap rooted at u into (first k, rest).
    fn split_at(&mut self, u: Idx, k: usize) -> (Idx, Idx) {
        if u == EMPTY {
            return (EMPTY, EMPTY);
        }
        let [l, r] = self.child(u);
        let szl = self.size(l);
        if k <= szl {
            let (ll, lr) = self.split_at(l, k);
            self.set_child(u, 0, lr);
            self.recalc(u);
            (ll, u)
        } else {
            let (rl, rr) = self.split_at(r, k - szl - 1);
            self.set_child(u, 1, rl);
            self.recalc(u);
            (u, rr)
        }
    }

    /// Position of u in its list, 0-indexed.
    fn position(&self, u: Idx, stop: Idx) -> usize {
        let [l, _] = self.child(u);
        let mut pos = self.size(l);
        let mut cur = u;
        while cur != stop {
            let p = self.parent(cur);
            if p == EMPTY {
                break;
            }
            let [pl, pr] = self.child(p);
            if pr == cur {
                pos += self.size(pl) + 1;
            } else if pl != cur {
                // Stale pointer out of a split piece, cur is the piece root.
                break;
            }
            cur = p;
        }
        pos
    }

    /// Root of the treap containing u, or `stop` if it is met first.
    fn find_root(&self, mut u: Idx, stop: Idx) -> Idx {
        while u != stop {
            let p = self.parent(u);
            if p == EMPTY {
                break;
            }
            u = p;
        }
        u
    }
}

#[derive(Derivative)]
#[derivative(Debug)]
struct Node<Ag: AggregatedData> {
    #[derivative(Debug(format_with = "node_fmt"))]
    parent: Idx,
    /// Left and right child
    #[derivative(Debug(format_with = "node2_fmt"))]
    child: [Idx; 2],
    /// Data for this node
    data: Ag::Data,
    /// Aggregated data for this node's subtree
    ag_data: Ag,
    size: usize,
    #[derivative(Debug = "ignore")]
    priority: u64,
}

impl<Ag: AggregatedData> Node<Ag> {
    fn new(data: Ag::Data, priority: u64) -> Self {
        Self {
            ag_data: Ag::from(&data),
            data,
            child: [Treaps::<Ag>::EMPTY; 2],
            parent: Treaps::<Ag>::EMPTY,
            size: 1,
            priority,
        }
    }
}

/// Sequential treaps stored in a single arena.
pub struct Treaps<Ag: AggregatedData = ()> {
    nodes: Vec<Node<Ag>>,
    rng: rngs::StdRng,
}

impl<Ag: AggregatedData> Debug for Treaps<Ag> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        let builder = TreeBuilder::new();
        let _b = builder.add_branch("Treaps");
        for u in 0..self.nodes.len() {
            if self.nodes[u].parent == Self::EMPTY {
                self.tree_inorder_dbg(u, &builder);
            }
        }
        writeln!(f, "{}", builder.string())
    }
}

impl<Ag: AggregatedData> Treaps<Ag> {
    fn tree_inorder_dbg<T: AsTree>(&self, u: Idx, tree: &T) {
        let nu = &self.nodes[u];
        if nu.child[0] != Self::EMPTY {
            add_branch_to!(*tree, "left child of {u}");
            self.tree_inorder_dbg(nu.child[0], tree);
        }
        add_branch_to!(*tree, "[{u}] {nu:?}");
        if nu.child[1] != Self::EMPTY {
            self.tree_inorder_dbg(nu.child[1], tree);
        }
    }
    fn n(&self, u: Idx) -> Option<&Node<Ag>> {
        if u == Self::EMPTY {
            None
        } else {
            Some(&self.nodes[u])
        }
    }
    fn ag_data(&self, u: Idx) -> Ag {
        self.n(u).map_or_else(Ag::default, |n| n.ag_data.clone())
    }
    fn detach(&mut self, u: Idx) -> Idx {
        if u != Self::EMPTY {
            self.nodes[u].parent = Self::EMPTY;
        }
        u
    }
}

impl<Ag: AggregatedData> TreapNodes for Treaps<Ag> {
    fn priority(&self, u: Idx) -> u64 {
        self.nodes[u].priority
    }
    fn parent(&self, u: Idx) -> Idx {
        self.n(u).map_or(Self::EMPTY, |n| n.parent)
    }
    fn child(&self, u: Idx) -> [Idx; 2] {
        self.n(u).map_or([Self::EMPTY; 2], |n| n.child)
    }
    fn size(&self, u: Idx) -> usize {
        self.n(u).map_or(0, |n| n.size)
    }
    fn set_parent(&mut self, u: Idx, p: Idx) {
        self.nodes[u].parent = p;
    }
    fn set_child(&mut self, u: Idx, side: usize, c: Idx) {
        self.nodes[u].child[side] = c;
        if c != Self::EMPTY {
            self.nodes[c].parent = u;
        }
    }
    fn recalc(&mut self, u: Idx) {
        if u == Self::EMPTY {
            return;
        }
        let [l, r] = self.nodes[u].child;
        self.nodes[u].size = self.size(l) + 1 + self.size(r);
        self.nodes[u].ag_data = self
            .ag_data(l)
            .merge(Ag::from(&self.nodes[u].data))
            .merge(self.ag_data(r));
    }
}

impl<Ag: AggregatedData> Lists<Ag> for Treaps<Ag> {
    const EMPTY: Idx = usize::MAX;

    fn new(capacity: usize) -> Self {
        Self {
            nodes: Vec::with_capacity(capacity),
            rng: rand::rngs::StdRng::seed_from_u64(2012),
        }
    }

    fn create(&mut self, data: Ag::Data) -> Idx {
        let idx = self.nodes.len();
        self.nodes.push(Node::new(data, self.rng.gen()));
        idx
    }

    fn root(&self, u: Idx) -> Idx {
        self.find_root(u, Self::EMPTY)
    }

    fn data(&self, u: Idx) -> &Ag::Data {
        &self.nodes[u].data
    }

    fn mutate_data(&mut self, mut u: Idx, f: impl FnOnce(&mut Ag::Data)) {
        f(&mut self.nodes[u].data);
        while u != Self::EMPTY {
            self.recalc(u);
            u = self.nodes[u].parent;
        }
    }

    fn order(&self, u: Idx) -> usize {
        if u == Self::EMPTY {
            return 0;
        }
        self.position(u, Self::EMPTY)
    }

    fn find_element(
        &self,
        u: Idx,
        mut search_strategy: impl FnMut(SearchData<'_, Ag>) -> SearchDirection,
    ) -> Idx {
        let mut u = Lists::root(self, u);
        use SearchDirection::*;
        while u != Self::EMPTY {
            let [l, r] = self.nodes[u].child;
            match search_strategy(SearchData {
                current_data: self.data(u),
                left_agg: &self.ag_data(l),
                right_agg: &self.ag_data(r),
            }) {
                Found => return u,
                NotFound => return Self::EMPTY,
                Left => u = l,
                Right => u = r,
            }
        }
        Self::EMPTY
    }

    fn len(&self, u: Idx) -> usize {
        if u == Self::EMPTY {
            0
        } else {
            self.nodes[Lists::root(self, u)].size
        }
    }

    fn concat(&mut self, u: Idx, v: Idx) -> Idx {
        let u = if u == Self::EMPTY { u } else { Lists::root(self, u) };
        let v = if v == Self::EMPTY { v } else { Lists::root(self, v) };
        if u == v {
            return u;
        }
        log::trace!("concat({}, {})", I(u), I(v));
        self.merge(u, v)
    }

    fn split_lr(&mut self, u: Idx, ql: usize, qr: usize) -> (Idx, Idx, Idx) {
        if u == Self::EMPTY {
            return (Self::EMPTY, Self::EMPTY, Self::EMPTY);
        }
        let u = Lists::root(self, u);
        let (l, mr) = self.split_at(u, ql);
        let (l, mr) = (self.detach(l), self.detach(mr));
        let (m, r) = self.split_at(mr, qr.saturating_sub(ql));
        let (m, r) = (self.detach(m), self.detach(r));
        log::trace!(
            "split({}, {ql}, {qr}) = ({}, {}, {})",
            I(u),
            I(l),
            I(m),
            I(r)
        );
        (l, m, r)
    }
}
