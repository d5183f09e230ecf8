use std::marker::PhantomData;

use super::levels::Levels;
use super::locks::{
    lock_components, lock_components_read, ComponentLocks, GlobalMutex, RootMutexes, RootRwLocks,
};
use crate::dynamic_connectivity::DynamicConnectivity;
use crate::edge::Edge;

/// How `connected` reads level 0.
pub trait ReadPath: Send + Sync + 'static {
    fn connected<L: ComponentLocks>(locks: &L, levels: &Levels, u: usize, v: usize) -> bool;
}

/// Readers lock the components like writers do, in shared mode when the locks allow it.
pub struct LockedReads;

impl ReadPath for LockedReads {
    fn connected<L: ComponentLocks>(locks: &L, levels: &Levels, u: usize, v: usize) -> bool {
        let ett = levels.base();
        lock_components_read(locks, ett, u, v, || ett.root(u) == ett.root(v))
    }
}

/// Readers never lock, they validate root versions instead.
pub struct OptimisticReads;

impl ReadPath for OptimisticReads {
    fn connected<L: ComponentLocks>(_: &L, levels: &Levels, u: usize, v: usize) -> bool {
        levels.base().connected(u, v)
    }
}

/// HDT where every update locks the level-0 components of its endpoints.
pub struct LockingDynamicConnectivity<L, R> {
    levels: Levels,
    locks: L,
    _reads: PhantomData<R>,
}

pub type FineGrainedDynamicConnectivity = LockingDynamicConnectivity<RootMutexes, LockedReads>;
pub type FineGrainedReadWriteDynamicConnectivity =
    LockingDynamicConnectivity<RootRwLocks, LockedReads>;
pub type ImprovedDynamicConnectivity = LockingDynamicConnectivity<RootMutexes, OptimisticReads>;
pub type NbReadsCoarseGrainedDynamicConnectivity =
    LockingDynamicConnectivity<GlobalMutex, OptimisticReads>;

impl<L: ComponentLocks, R: ReadPath> LockingDynamicConnectivity<L, R> {
    /// Rank of the edge (u, v), if present.
    pub fn rank(&self, u: usize, v: usize) -> Option<usize> {
        self.levels.rank(Edge::new(u, v))
    }
}

impl<L: ComponentLocks, R: ReadPath> DynamicConnectivity for LockingDynamicConnectivity<L, R> {
    fn new(n: usize) -> Self {
        Self {
            levels: Levels::new(n),
            locks: L::new(n),
            _reads: PhantomData,
        }
    }

    fn add_edge(&self, u: usize, v: usize) {
        lock_components(&self.locks, self.levels.base(), u, v, || {
            self.levels.add_edge(u, v)
        })
    }

    fn remove_edge(&self, u: usize, v: usize) {
        lock_components(&self.locks, self.levels.base(), u, v, || {
            self.levels.remove_edge(u, v)
        })
    }

    fn connected(&self, u: usize, v: usize) -> bool {
        R::connected(&self.locks, &self.levels, u, v)
    }
}
