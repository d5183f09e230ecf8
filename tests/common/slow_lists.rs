use std::fmt::Debug;

use dynamic_connectivity::lists::{AggregatedData, Idx, Lists, SearchData, SearchDirection};

/// Plain vectors, one per list. Every operation is linear in the list length.
///
/// The root of a list is its first node, and a search sees the list as a chain hanging off the
/// root to the right, so strategies never get to go left.
#[derive(Clone)]
pub struct SlowLists<Ag: AggregatedData = ()> {
    data: Vec<Ag::Data>,
    /// Index into `lists` of the list holding each node.
    list_of: Vec<usize>,
    lists: Vec<Vec<Idx>>,
}

impl<Ag: AggregatedData> Debug for SlowLists<Ag> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SlowLists:")?;
        for list in self.lists.iter().filter(|l| l.len() > 1) {
            write!(f, " [")?;
            for &u in list {
                write!(f, "{u}({:?}) ", self.data[u])?;
            }
            writeln!(f, "]")?;
        }
        Ok(())
    }
}

impl<Ag: AggregatedData> SlowLists<Ag> {
    fn list(&self, u: Idx) -> &[Idx] {
        &self.lists[self.list_of[u]]
    }

    /// Nodes of the list of u, in order.
    #[allow(dead_code)]
    pub fn nodes(&self, u: Idx) -> Vec<Idx> {
        self.list(u).to_vec()
    }

    fn agg(&self, nodes: &[Idx]) -> Ag {
        nodes
            .iter()
            .fold(Ag::default(), |agg, &u| agg.merge(Ag::from(&self.data[u])))
    }

    /// Moves `nodes` to a fresh list. Returns its first node.
    fn adopt(&mut self, nodes: Vec<Idx>) -> Idx {
        let Some(&first) = nodes.first() else {
            return Self::EMPTY;
        };
        let id = self.lists.len();
        for &u in &nodes {
            self.list_of[u] = id;
        }
        self.lists.push(nodes);
        first
    }
}

impl<Ag: AggregatedData> Lists<Ag> for SlowLists<Ag> {
    const EMPTY: Idx = usize::MAX;

    fn new(capacity: usize) -> Self {
        Self {
            data: Vec::with_capacity(capacity),
            list_of: Vec::with_capacity(capacity),
            lists: Vec::with_capacity(capacity),
        }
    }

    fn create(&mut self, data: Ag::Data) -> Idx {
        let u = self.data.len();
        self.data.push(data);
        self.list_of.push(self.lists.len());
        self.lists.push(vec![u]);
        u
    }

    fn root(&self, u: Idx) -> Idx {
        if u == Self::EMPTY {
            Self::EMPTY
        } else {
            self.list(u)[0]
        }
    }

    fn data(&self, u: Idx) -> &Ag::Data {
        &self.data[u]
    }

    fn mutate_data(&mut self, u: Idx, f: impl FnOnce(&mut Ag::Data)) {
        f(&mut self.data[u])
    }

    fn order(&self, u: Idx) -> usize {
        if u == Self::EMPTY {
            return 0;
        }
        self.list(u)
            .iter()
            .position(|&w| w == u)
            .expect("node missing from its own list")
    }

    fn find_element(
        &self,
        u: Idx,
        mut search_strategy: impl FnMut(SearchData<'_, Ag>) -> SearchDirection,
    ) -> Idx {
        let list = self.list(u);
        let nothing = Ag::default();
        for (i, &w) in list.iter().enumerate() {
            match search_strategy(SearchData {
                current_data: &self.data[w],
                left_agg: &nothing,
                right_agg: &self.agg(&list[i + 1..]),
            }) {
                SearchDirection::Found => return w,
                SearchDirection::NotFound => return Self::EMPTY,
                SearchDirection::Left => unreachable!("nothing is left of {w}"),
                SearchDirection::Right => {}
            }
        }
        Self::EMPTY
    }

    fn len(&self, u: Idx) -> usize {
        if u == Self::EMPTY {
            0
        } else {
            self.list(u).len()
        }
    }

    fn concat(&mut self, u: Idx, v: Idx) -> Idx {
        if v == Self::EMPTY || self.on_same_list(u, v) {
            return self.root(u);
        } else if u == Self::EMPTY {
            return self.root(v);
        }
        let tail = std::mem::take(&mut self.lists[self.list_of[v]]);
        let id = self.list_of[u];
        for &w in &tail {
            self.list_of[w] = id;
        }
        self.lists[id].extend(tail);
        self.lists[id][0]
    }

    fn split_lr(&mut self, u: Idx, l: usize, r: usize) -> (Idx, Idx, Idx) {
        if u == Self::EMPTY {
            return (Self::EMPTY, Self::EMPTY, Self::EMPTY);
        }
        let mut rest = std::mem::take(&mut self.lists[self.list_of[u]]);
        assert!(l <= r && r <= rest.len(), "bad range {l}..{r} of {rest:?}");
        let right = rest.split_off(r);
        let middle = rest.split_off(l);
        (self.adopt(rest), self.adopt(middle), self.adopt(right))
    }
}
