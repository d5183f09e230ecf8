use common::{init_logger, slow_lists::SlowLists, Connectivity, Dumb};
use dynamic_connectivity::euler_tour_tree::{EttAgg, EulerTourTree};
use dynamic_connectivity::lists::{treap::Treaps, Lists};
use dynamic_connectivity::Edge;
use rand::prelude::*;

mod common;

struct EttTests<L: Lists<EttAgg>>(std::marker::PhantomData<L>);

impl<L: Lists<EttAgg>> EttTests<L> {
    fn path(n: usize) -> EulerTourTree<L> {
        let mut ett = EulerTourTree::new(n);
        for u in 1..n {
            ett.link(u - 1, u, true);
        }
        ett
    }

    fn assert_forest(ett: &EulerTourTree<L>, forest: &Dumb) {
        let gs = forest.groups();
        for u in 0..gs.len() {
            let size = gs.iter().filter(|&&g| g == gs[u]).count();
            assert_eq!(ett.size(u), size, "u {u}\n{forest:?}");
            for v in 0..gs.len() {
                assert_eq!(ett.connected(u, v), gs[u] == gs[v], "u {u} v {v}\n{forest:?}");
                assert_eq!(
                    ett.root(u) == ett.root(v),
                    gs[u] == gs[v],
                    "roots of {u} and {v}"
                );
                assert_eq!(ett.has_tree_edge(u, v), forest.has_edge(u, v));
            }
        }
    }

    fn test_star() {
        let mut ett = EulerTourTree::<L>::new(5);
        for v in 1..5 {
            ett.link(0, v, false);
        }
        assert_eq!(ett.size(3), 5);
        assert_eq!(ett.first_current_level_tree_edge(2), None);
        ett.cut(2, 0);
        assert_eq!(ett.size(2), 1);
        assert_eq!(ett.size(4), 4);
        assert!(!ett.has_tree_edge(0, 2));
        assert!(ett.has_tree_edge(4, 0));
        ett.link(2, 4, true);
        assert!(ett.connected(2, 1));
        assert_eq!(ett.first_current_level_tree_edge(1), Some(Edge::new(2, 4)));
    }

    fn test_flags_follow_cuts() {
        let mut ett = Self::path(6);
        ett.add_non_tree_edge(4, Edge::new(4, 1));
        ett.add_non_tree_edge(1, Edge::new(4, 1));
        assert!(ett.first_with_non_tree_edges(5).is_some());
        ett.cut(1, 2);
        assert_eq!(ett.first_with_non_tree_edges(0), Some(1));
        assert_eq!(ett.first_with_non_tree_edges(3), Some(4));
        ett.remove_non_tree_edge(1, Edge::new(1, 4));
        assert_eq!(ett.first_with_non_tree_edges(0), None);
        assert!(ett.non_tree_edges(1).is_empty());
        assert_eq!(
            ett.non_tree_edges(4).iter().copied().collect::<Vec<_>>(),
            vec![Edge::new(1, 4)]
        );

        // Only (0, 1) is left on the small side.
        assert_eq!(ett.first_current_level_tree_edge(0), Some(Edge::new(0, 1)));
        ett.set_current_level(Edge::new(0, 1), false);
        assert_eq!(ett.first_current_level_tree_edge(1), None);
        assert!(ett.first_current_level_tree_edge(5).is_some());
    }

    fn random_compare(n: usize, ops: usize, seed: u64) {
        log::info!("random_compare n {n} ops {ops} seed {seed}");
        let mut rng = StdRng::seed_from_u64(seed);
        let mut ett = EulerTourTree::<L>::new(n);
        let mut forest = Dumb::new(n);
        let mut tree_edges = vec![];
        for op in 0..ops {
            if rng.gen_bool(0.6) || tree_edges.is_empty() {
                let (u, v) = (rng.gen_range(0..n), rng.gen_range(0..n));
                if forest.connected(u, v) {
                    continue;
                }
                log::trace!("link {u} {v}");
                ett.link(u, v, rng.gen());
                forest.add_edge(u, v);
                tree_edges.push((u, v));
            } else {
                let (u, v) = tree_edges.swap_remove(rng.gen_range(0..tree_edges.len()));
                log::trace!("cut {u} {v}");
                if rng.gen() {
                    ett.cut(u, v);
                } else {
                    ett.cut(v, u);
                }
                forest.remove_edge(u, v);
            }
            if op % 10 == 0 {
                Self::assert_forest(&ett, &forest);
            }
            let u = rng.gen_range(0..n);
            if let Some(f) = ett.first_current_level_tree_edge(u) {
                assert!(ett.connected(u, f.u()) && ett.connected(u, f.v()));
                assert!(forest.has_edge(f.u(), f.v()), "{f:?} is not a tree edge");
            }
        }
        Self::assert_forest(&ett, &forest);
    }

    fn test_all() {
        init_logger();
        Self::test_star();
        Self::test_flags_follow_cuts();
        for seed in 0..20 {
            Self::random_compare(12, 200, seed);
        }
    }
}

#[test]
fn test_ett_with_treaps() {
    EttTests::<Treaps<EttAgg>>::test_all();
}

#[test]
fn test_ett_with_slow_lists() {
    EttTests::<SlowLists<EttAgg>>::test_all();
}

#[test]
fn test_ett_links_larger_trees() {
    init_logger();
    let mut ett = EttTests::<Treaps<EttAgg>>::path(300);
    assert_eq!(ett.size(150), 300);
    ett.cut(99, 100);
    assert_eq!(ett.size(0), 100);
    assert_eq!(ett.size(299), 200);
    ett.link(299, 0, false);
    assert!(ett.connected(99, 100));
    assert_eq!(ett.vertices(), 300);
}
