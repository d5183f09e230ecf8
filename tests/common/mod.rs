use std::collections::BTreeSet;
use std::sync::{LazyLock, Mutex};

use dynamic_connectivity::euler_tour_tree::EttAgg;
use dynamic_connectivity::lists::Lists;
use dynamic_connectivity::{DynamicConnectivity, SequentialDynamicConnectivity};
use flexi_logger::{LogSpecification, Logger, LoggerHandle};

pub mod slow_lists;

#[allow(dead_code)]
pub static LOGGER: LazyLock<Mutex<LoggerHandle>> = LazyLock::new(|| {
    Mutex::new(
        Logger::try_with_env_or_str("info")
            .unwrap()
            .write_mode(flexi_logger::WriteMode::SupportCapture)
            .log_to_stdout()
            .set_palette("196;208;3;7;8".to_owned())
            .format(|w, now, record| {
                let style = flexi_logger::style(record.level());
                write!(
                    w,
                    "{} {pref}[{}] {}{suf}",
                    now.format("%H:%M:%S"),
                    &record.level().as_str()[0..1],
                    record.args(),
                    pref = style.prefix(),
                    suf = style.suffix(),
                )
            })
            .start()
            .unwrap(),
    )
});

#[allow(dead_code)]
pub fn init_logger() {
    let _ = &*LOGGER;
}

/// Turns on every log line, for chasing a failing seed.
#[allow(dead_code)]
pub fn log_traces() {
    LOGGER
        .lock()
        .unwrap()
        .set_new_spec(LogSpecification::parse("trace").unwrap());
}

/// Adjacency sets and a DFS per query.
#[allow(dead_code)]
pub struct Dumb {
    adj: Vec<BTreeSet<usize>>,
}

impl std::fmt::Debug for Dumb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let v_to_id = self.groups();
        let mut gs = vec![vec![]; v_to_id.iter().copied().max().unwrap_or(0)];
        for (v, &id) in v_to_id.iter().enumerate() {
            gs[id - 1].push(v);
        }
        f.debug_struct("Dumb").field("groups", &gs).finish()
    }
}

#[allow(dead_code)]
impl Dumb {
    pub fn new(n: usize) -> Self {
        Self {
            adj: vec![BTreeSet::new(); n],
        }
    }

    pub fn has_edge(&self, u: usize, v: usize) -> bool {
        self.adj[u].contains(&v)
    }

    /// Component id of every vertex, numbered from 1.
    pub fn groups(&self) -> Vec<usize> {
        let mut groups = vec![0; self.adj.len()];
        let mut group_id = 0;
        for u in 0..self.adj.len() {
            if groups[u] == 0 {
                group_id += 1;
                groups[u] = group_id;
                let mut stack = vec![u];
                while let Some(u) = stack.pop() {
                    stack.extend(self.adj[u].iter().copied().filter(|&v| {
                        if groups[v] == 0 {
                            groups[v] = group_id;
                            true
                        } else {
                            false
                        }
                    }));
                }
            }
        }
        groups
    }
}

/// Drives the sequential engine, the concurrent variants and [`Dumb`] the same way.
#[allow(dead_code)]
pub trait Connectivity {
    fn add_edge(&mut self, u: usize, v: usize);
    fn remove_edge(&mut self, u: usize, v: usize);
    fn connected(&mut self, u: usize, v: usize) -> bool;
}

impl Connectivity for Dumb {
    fn add_edge(&mut self, u: usize, v: usize) {
        self.adj[u].insert(v);
        self.adj[v].insert(u);
    }

    fn remove_edge(&mut self, u: usize, v: usize) {
        self.adj[u].remove(&v);
        self.adj[v].remove(&u);
    }

    fn connected(&mut self, u: usize, v: usize) -> bool {
        let mut seen = BTreeSet::new();
        let mut stack = vec![u];
        while let Some(u) = stack.pop() {
            if u == v {
                return true;
            }
            if seen.insert(u) {
                stack.extend(self.adj[u].iter().copied());
            }
        }
        false
    }
}

impl<L: Lists<EttAgg>> Connectivity for SequentialDynamicConnectivity<L> {
    fn add_edge(&mut self, u: usize, v: usize) {
        SequentialDynamicConnectivity::add_edge(self, u, v)
    }
    fn remove_edge(&mut self, u: usize, v: usize) {
        SequentialDynamicConnectivity::remove_edge(self, u, v)
    }
    fn connected(&mut self, u: usize, v: usize) -> bool {
        SequentialDynamicConnectivity::connected(self, u, v)
    }
}

impl Connectivity for Box<dyn DynamicConnectivity> {
    fn add_edge(&mut self, u: usize, v: usize) {
        DynamicConnectivity::add_edge(&**self, u, v)
    }
    fn remove_edge(&mut self, u: usize, v: usize) {
        DynamicConnectivity::remove_edge(&**self, u, v)
    }
    fn connected(&mut self, u: usize, v: usize) -> bool {
        DynamicConnectivity::connected(&**self, u, v)
    }
}

/// Every pair of vertices must agree with the components of `dumb`.
#[allow(dead_code)]
pub fn assert_same_components(t: &mut impl Connectivity, dumb: &Dumb, context: &str) {
    let gs = dumb.groups();
    for u in 0..gs.len() {
        for v in 0..gs.len() {
            assert_eq!(
                t.connected(u, v),
                gs[u] == gs[v],
                "{context} u {u} v {v}\n{dumb:?}"
            );
        }
    }
}
