use std::collections::BTreeSet;

use common::{assert_same_components, init_logger, Connectivity, Dumb};
use dynamic_connectivity::{DynamicConnectivity, Variant};
use rand::prelude::*;

mod common;

/// Every thread owns the edges `(u, v)` with `(u + v) % threads == t` and flips random ones on and
/// off. In-flight queries can only be checked against what the thread itself knows: every owned
/// present edge always connects its ends. Returns the edges left at the end.
fn run_threads(
    t: &dyn DynamicConnectivity,
    n: usize,
    threads: usize,
    ops: usize,
    seed: u64,
) -> BTreeSet<(usize, usize)> {
    std::thread::scope(|s| {
        let handles: Vec<_> = (0..threads)
            .map(|id| {
                s.spawn(move || {
                    let mut rng = StdRng::seed_from_u64(seed + id as u64);
                    let mut present = BTreeSet::new();
                    for _ in 0..ops {
                        let (u, v) = (rng.gen_range(0..n), rng.gen_range(0..n));
                        let (u, v) = (u.min(v), u.max(v));
                        if u == v || (u + v) % threads != id {
                            assert!(t.connected(u, u));
                            continue;
                        }
                        if present.remove(&(u, v)) {
                            t.remove_edge(v, u);
                        } else {
                            t.add_edge(u, v);
                            present.insert((u, v));
                            assert!(t.connected(v, u), "{u} {v} just added");
                        }
                        for &(a, b) in &present {
                            assert!(t.connected(a, b), "owned edge {a} {b}");
                        }
                    }
                    present
                })
            })
            .collect();
        handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect()
    })
}

fn check_final(t: &mut Box<dyn DynamicConnectivity>, n: usize, edges: &BTreeSet<(usize, usize)>) {
    let mut dumb = Dumb::new(n);
    for &(u, v) in edges {
        dumb.add_edge(u, v);
    }
    assert_same_components(t, &dumb, "after threads");
    // The structure must still work sequentially.
    for &(u, v) in edges {
        t.remove_edge(u, v);
        dumb.remove_edge(u, v);
    }
    assert_same_components(t, &dumb, "after clearing");
}

#[test]
fn test_threads_all_variants() {
    init_logger();
    for variant in Variant::ALL {
        log::info!("{variant}");
        for seed in 0..3 {
            let n = 40;
            let mut t = variant.build(n);
            let edges = run_threads(&*t, n, 4, 2000, 10 * seed);
            check_final(&mut t, n, &edges);
        }
    }
}

/// Few vertices and many threads, so removals keep racing adds inside one component.
fn small_graphs(seeds: std::ops::Range<u64>, ops: usize) {
    init_logger();
    for variant in Variant::ALL {
        log::info!("{variant}");
        for seed in seeds.clone() {
            let n = 6 + seed as usize % 4;
            let mut t = variant.build(n);
            let edges = run_threads(&*t, n, 6, ops, 7 * seed);
            check_final(&mut t, n, &edges);
        }
    }
}

#[test]
fn test_small_graphs_many_threads() {
    small_graphs(0..40, 1000);
}

#[test]
#[ignore]
fn test_small_graphs_stress() {
    small_graphs(0..1000, 5000);
}

#[test]
fn test_readers_see_stable_components() {
    init_logger();
    // Vertices 0..10 form a cycle that writers keep breaking in one place at a time, so it
    // stays connected. Vertices 10..20 never get an edge.
    let n = 20;
    for variant in Variant::ALL {
        let t = variant.build(n);
        let t = &*t;
        for u in 0..10 {
            t.add_edge(u, (u + 1) % 10);
        }
        std::thread::scope(|s| {
            s.spawn(move || {
                for i in 0..500 {
                    let u = i % 10;
                    t.remove_edge(u, (u + 1) % 10);
                    t.add_edge(u, (u + 1) % 10);
                }
            });
            for r in 0..3 {
                s.spawn(move || {
                    let mut rng = StdRng::seed_from_u64(r);
                    for _ in 0..2000 {
                        let (u, v) = (rng.gen_range(0..10), rng.gen_range(0..10));
                        assert!(t.connected(u, v), "{variant} {u} {v}");
                        let w = rng.gen_range(10..n);
                        assert!(!t.connected(u, w), "{variant} {u} {w}");
                    }
                });
            }
        });
    }
}

#[test]
fn test_disjoint_components_in_parallel() {
    init_logger();
    let (k, size) = (8, 30);
    for variant in Variant::ALL {
        let t = variant.build(k * size);
        let t = &*t;
        std::thread::scope(|s| {
            for c in 0..k {
                s.spawn(move || {
                    let base = c * size;
                    for i in 1..size {
                        t.add_edge(base + i - 1, base + i);
                    }
                    t.add_edge(base, base + size - 1);
                    for i in (1..size).step_by(3) {
                        t.remove_edge(base + i - 1, base + i);
                    }
                });
            }
        });
        for c in 0..k {
            let base = c * size;
            // The cycle falls apart into runs of three, the first one wrapping around.
            assert!(t.connected(base, base + size - 1), "{variant}");
            assert!(!t.connected(base, base + 1), "{variant}");
            assert!(t.connected(base + 1, base + 3), "{variant}");
            assert!(!t.connected(base + 3, base + 4), "{variant}");
            if c > 0 {
                assert!(!t.connected(base, base - 1), "{variant}");
            }
        }
    }
}

#[test]
#[ignore]
fn test_threads_stress() {
    init_logger();
    for variant in Variant::ALL {
        log::info!("{variant}");
        for seed in 0..20 {
            let n = 200;
            let mut t = variant.build(n);
            let edges = run_threads(&*t, n, 8, 20000, 1000 + seed);
            check_final(&mut t, n, &edges);
        }
    }
}
