//! The sequential engine behind one lock.

use parking_lot::{Mutex, RwLock};

use crate::dynamic_connectivity::{DynamicConnectivity, SequentialDynamicConnectivity};

pub struct CoarseGrainedDynamicConnectivity(Mutex<SequentialDynamicConnectivity>);

impl DynamicConnectivity for CoarseGrainedDynamicConnectivity {
    fn new(n: usize) -> Self {
        Self(Mutex::new(SequentialDynamicConnectivity::new(n)))
    }
    fn add_edge(&self, u: usize, v: usize) {
        self.0.lock().add_edge(u, v)
    }
    fn remove_edge(&self, u: usize, v: usize) {
        self.0.lock().remove_edge(u, v)
    }
    fn connected(&self, u: usize, v: usize) -> bool {
        self.0.lock().connected(u, v)
    }
}

/// Readers share the lock.
pub struct CoarseGrainedReadWriteDynamicConnectivity(RwLock<SequentialDynamicConnectivity>);

impl DynamicConnectivity for CoarseGrainedReadWriteDynamicConnectivity {
    fn new(n: usize) -> Self {
        Self(RwLock::new(SequentialDynamicConnectivity::new(n)))
    }
    fn add_edge(&self, u: usize, v: usize) {
        self.0.write().add_edge(u, v)
    }
    fn remove_edge(&self, u: usize, v: usize) {
        self.0.write().remove_edge(u, v)
    }
    fn connected(&self, u: usize, v: usize) -> bool {
        self.0.read().connected(u, v)
    }
}
