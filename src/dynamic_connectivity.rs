use std::collections::HashMap;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

use crate::concurrent::coarse::{
    CoarseGrainedDynamicConnectivity, CoarseGrainedReadWriteDynamicConnectivity,
};
use crate::concurrent::fine_grained::{
    FineGrainedDynamicConnectivity, FineGrainedReadWriteDynamicConnectivity,
    ImprovedDynamicConnectivity, NbReadsCoarseGrainedDynamicConnectivity,
};
use crate::concurrent::major::{MajorCoarseGrainedDynamicConnectivity, MajorDynamicConnectivity};
use crate::edge::{illegal_state, levels_for, Edge, OrIllegalState};
use crate::euler_tour_tree::{EttAgg, EulerTourTree};
use crate::lists::{treap::Treaps, Lists};

/// Connectivity of an undirected graph on vertices `0..n` under edge insertions and removals,
/// safe to share between threads.
pub trait DynamicConnectivity: Send + Sync {
    /// New instance for an empty graph on n nodes.
    fn new(n: usize) -> Self
    where
        Self: Sized;
    /// Adds the edge (u, v). Adding a present edge does nothing. Panics if u == v.
    fn add_edge(&self, u: usize, v: usize);
    /// Removes the edge (u, v). Removing a missing edge does nothing.
    fn remove_edge(&self, u: usize, v: usize);
    /// Are u and v in the same component?
    fn connected(&self, u: usize, v: usize) -> bool;
}

/// All concurrent implementations, for picking one at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Variant {
    CoarseGrained,
    CoarseGrainedReadWrite,
    NbReadsCoarseGrained,
    FineGrained,
    FineGrainedReadWrite,
    Improved,
    Major,
    MajorCoarseGrained,
}

impl Variant {
    pub const ALL: [Variant; 8] = [
        Variant::CoarseGrained,
        Variant::CoarseGrainedReadWrite,
        Variant::NbReadsCoarseGrained,
        Variant::FineGrained,
        Variant::FineGrainedReadWrite,
        Variant::Improved,
        Variant::Major,
        Variant::MajorCoarseGrained,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Variant::CoarseGrained => "coarse-grained",
            Variant::CoarseGrainedReadWrite => "coarse-grained-read-write",
            Variant::NbReadsCoarseGrained => "nb-reads-coarse-grained",
            Variant::FineGrained => "fine-grained",
            Variant::FineGrainedReadWrite => "fine-grained-read-write",
            Variant::Improved => "improved",
            Variant::Major => "major",
            Variant::MajorCoarseGrained => "major-coarse-grained",
        }
    }

    pub fn build(self, n: usize) -> Box<dyn DynamicConnectivity> {
        match self {
            Variant::CoarseGrained => Box::new(CoarseGrainedDynamicConnectivity::new(n)),
            Variant::CoarseGrainedReadWrite => {
                Box::new(CoarseGrainedReadWriteDynamicConnectivity::new(n))
            }
            Variant::NbReadsCoarseGrained => {
                Box::new(NbReadsCoarseGrainedDynamicConnectivity::new(n))
            }
            Variant::FineGrained => Box::new(FineGrainedDynamicConnectivity::new(n)),
            Variant::FineGrainedReadWrite => {
                Box::new(FineGrainedReadWriteDynamicConnectivity::new(n))
            }
            Variant::Improved => Box::new(ImprovedDynamicConnectivity::new(n)),
            Variant::Major => Box::new(MajorDynamicConnectivity::new(n)),
            Variant::MajorCoarseGrained => Box::new(MajorCoarseGrainedDynamicConnectivity::new(n)),
        }
    }
}

impl Display for Variant {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Returned when parsing a name that is not a [`Variant`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownVariant(pub String);

impl Display for UnknownVariant {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "unknown variant {:?}, expected one of:", self.0)?;
        for v in Variant::ALL {
            write!(f, " {v}")?;
        }
        Ok(())
    }
}

impl std::error::Error for UnknownVariant {}

impl FromStr for Variant {
    type Err = UnknownVariant;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Variant::ALL
            .into_iter()
            .find(|v| v.name() == s)
            .ok_or_else(|| UnknownVariant(s.to_owned()))
    }
}

/// Single-threaded Holm, de Lichtenberg and Thorup connectivity. Level `i` keeps a spanning
/// forest of the edges with rank at least `i`; level 0 spans the whole graph.
#[derive(Debug)]
pub struct SequentialDynamicConnectivity<L: Lists<EttAgg> = Treaps<EttAgg>> {
    levels: Vec<EulerTourTree<L>>,
    ranks: HashMap<Edge, usize>,
}

impl<L: Lists<EttAgg>> SequentialDynamicConnectivity<L> {
    pub fn new(n: usize) -> Self {
        Self {
            levels: (0..levels_for(n)).map(|_| EulerTourTree::new(n)).collect(),
            ranks: HashMap::new(),
        }
    }

    pub fn level_count(&self) -> usize {
        self.levels.len()
    }

    /// Rank of the edge (u, v), if present.
    pub fn rank(&self, u: usize, v: usize) -> Option<usize> {
        self.ranks.get(&Edge::new(u, v)).copied()
    }

    pub fn connected(&self, u: usize, v: usize) -> bool {
        self.levels[0].connected(u, v)
    }

    pub fn add_edge(&mut self, u: usize, v: usize) {
        assert_ne!(u, v, "self-loops are not edges");
        let e = Edge::new(u, v);
        if self.ranks.contains_key(&e) {
            return;
        }
        self.ranks.insert(e, 0);
        let level = &mut self.levels[0];
        if level.connected(u, v) {
            log::debug!("{e:?} added as non-tree edge");
            level.add_non_tree_edge(u, e);
            level.add_non_tree_edge(v, e);
        } else {
            log::debug!("{e:?} added as tree edge");
            level.link(u, v, true);
        }
    }

    pub fn remove_edge(&mut self, u: usize, v: usize) {
        let e = Edge::new(u, v);
        let Some(rank) = self.ranks.remove(&e) else {
            return;
        };
        let (u, v) = (e.u(), e.v());
        if !self.levels[rank].has_tree_edge(u, v) {
            log::debug!("{e:?} removed, non-tree at rank {rank}");
            self.levels[rank].remove_non_tree_edge(u, e);
            self.levels[rank].remove_non_tree_edge(v, e);
            return;
        }
        for level in &mut self.levels[..=rank] {
            level.cut(u, v);
        }
        for r in (0..=rank).rev() {
            let small = if self.levels[r].size(u) <= self.levels[r].size(v) {
                u
            } else {
                v
            };
            while let Some(f) = self.levels[r].first_current_level_tree_edge(small) {
                self.promote_tree_edge(f, r);
            }
            if let Some(f) = self.find_replacement(small, r) {
                log::debug!("{e:?} removed, replaced by {f:?} at rank {r}");
                for i in 0..=r {
                    self.levels[i].link(f.u(), f.v(), i == r);
                }
                return;
            }
        }
        log::debug!("{e:?} removed, components split");
    }

    fn next_rank(&self, r: usize) -> usize {
        if r + 1 >= self.levels.len() {
            illegal_state(&format!("promoting past the top level {r}"));
        }
        r + 1
    }

    fn promote_tree_edge(&mut self, f: Edge, r: usize) {
        let nr = self.next_rank(r);
        log::trace!("promote tree edge {f:?} to {nr}");
        self.levels[r].set_current_level(f, false);
        self.levels[nr].link(f.u(), f.v(), true);
        *self
            .ranks
            .get_mut(&f)
            .or_illegal_state("tree edge without rank") = nr;
    }

    /// Takes non-tree edges of rank r out of the tour of `small` until one leaves it. Edges that
    /// stay inside are promoted.
    fn find_replacement(&mut self, small: usize, r: usize) -> Option<Edge> {
        while let Some(x) = self.levels[r].first_with_non_tree_edges(small) {
            let f = *self.levels[r]
                .non_tree_edges(x)
                .first()
                .or_illegal_state("flagged vertex without non-tree edges");
            self.levels[r].remove_non_tree_edge(f.u(), f);
            self.levels[r].remove_non_tree_edge(f.v(), f);
            if !self.levels[r].connected(f.u(), f.v()) {
                return Some(f);
            }
            let nr = self.next_rank(r);
            log::trace!("promote non-tree edge {f:?} to {nr}");
            self.levels[nr].add_non_tree_edge(f.u(), f);
            self.levels[nr].add_non_tree_edge(f.v(), f);
            *self
                .ranks
                .get_mut(&f)
                .or_illegal_state("non-tree edge without rank") = nr;
        }
        None
    }
}
