//! Cluster document model
//!
//! Split by concern: the aggregate root, network topology, and server pools.

mod cluster;
mod network;
mod pool;

// Re-exports
pub use cluster::*;
pub use network::*;
pub use pool::*;
