pub mod concurrent;
pub mod dynamic_connectivity;
pub mod edge;
pub mod euler_tour_tree;
pub mod lists;
pub mod ms_queue;
pub mod scenario;
pub use dynamic_connectivity::{
    DynamicConnectivity, SequentialDynamicConnectivity, UnknownVariant, Variant,
};
pub use edge::Edge;
