//! Per-cluster GraphQL handlers and the registry mapping cluster names to
//! them (spec.md §4.5, §4.6).

pub mod handler;
pub mod registry;

pub use handler::ClusterHandler;
pub use registry::ClusterRegistry;
