//! Thread-safe implementations of [`DynamicConnectivity`](crate::DynamicConnectivity).

pub mod coarse;
pub mod edge_state;
pub mod euler_tour_tree;
pub mod fine_grained;
pub mod levels;
pub mod locks;
pub mod major;
