use std::fmt::Debug;
use std::ops::RangeBounds;

pub mod atomic_treap;
pub mod treap;

pub type Idx = usize;

/// Ordered lists of nodes in one arena, each list keeping an aggregate of its data. Nodes are
/// numbered from 0 in creation order and never go away.
pub trait Lists<Ag = ()>
where
    Ag: AggregatedData,
    Self: Debug,
{
    /// Stands for "no node", both as an argument and as a result.
    const EMPTY: Idx;
    fn new(capacity: usize) -> Self;
    /// Adds a node in a list of its own.
    fn create(&mut self, data: Ag::Data) -> Idx;

    /// Node standing for the whole list of u. It changes whenever the list does.
    fn root(&self, u: Idx) -> Idx;
    fn data(&self, u: Idx) -> &Ag::Data;
    /// Changes the data of u and refreshes the aggregates above it.
    fn mutate_data(&mut self, u: Idx, f: impl FnOnce(&mut Ag::Data));
    /// 0-indexed position of u, 0 for EMPTY.
    fn order(&self, u: Idx) -> usize;
    fn on_same_list(&self, u: Idx, v: Idx) -> bool {
        self.root(u) == self.root(v)
    }
    /// Walks the tree of u from its root, letting the strategy pick a side at every node. Returns
    /// the node it stopped at, or EMPTY.
    fn find_element(
        &self,
        u: Idx,
        search_strategy: impl FnMut(SearchData<'_, Ag>) -> SearchDirection,
    ) -> Idx;
    /// Number of nodes in the list of u, 0 for EMPTY.
    fn len(&self, u: Idx) -> usize;

    /// Appends the list of v to the list of u. Either may be EMPTY. Returns the new root.
    fn concat(&mut self, u: Idx, v: Idx) -> Idx;
    fn concat_all(&mut self, all: impl IntoIterator<Item = Idx>) -> Idx {
        all.into_iter().fold(Self::EMPTY, |root, v| self.concat(root, v))
    }
    /// Cuts the list of u into the part before `range`, `range` itself and the part after it.
    /// Returns their roots, EMPTY for empty parts.
    fn split(&mut self, u: Idx, range: impl RangeBounds<usize>) -> (Idx, Idx, Idx) {
        let [l, r] = range_to_lr(range, || self.len(u));
        self.split_lr(u, l, r)
    }
    fn split_lr(&mut self, u: Idx, l: usize, r: usize) -> (Idx, Idx, Idx);
}

/// Summary of a run of consecutive nodes.
pub trait AggregatedData: Debug + Clone + Default {
    type Data: Debug + Clone;
    fn from(data: &Self::Data) -> Self;
    /// Combines with the summary of a run that directly follows this one.
    fn merge(self, right: Self) -> Self;
}

/// What a search strategy sees at one node.
#[derive(Debug)]
pub struct SearchData<'a, Ag: AggregatedData> {
    pub current_data: &'a Ag::Data,
    /// Everything before the node in its subtree.
    pub left_agg: &'a Ag,
    /// Everything after the node in its subtree.
    pub right_agg: &'a Ag,
}

#[derive(Debug)]
pub enum SearchDirection {
    Found,
    NotFound,
    Left,
    Right,
}

/// Half-open `[l, r)` bounds of a range over a list of length `len()`.
fn range_to_lr(range: impl RangeBounds<usize>, len: impl FnOnce() -> usize) -> [usize; 2] {
    use std::ops::Bound::*;
    let l = match range.start_bound() {
        Included(&l) => l,
        Excluded(&l) => l + 1,
        Unbounded => 0,
    };
    let r = match range.end_bound() {
        Included(&r) => r + 1,
        Excluded(&r) => r,
        Unbounded => len(),
    };
    [l, r]
}

impl AggregatedData for () {
    type Data = ();
    fn from(_: &Self::Data) -> Self {}
    fn merge(self, _: Self) -> Self {}
}
