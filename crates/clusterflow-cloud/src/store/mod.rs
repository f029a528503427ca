//! Persistence boundary for cluster documents
//!
//! The reconcilers never touch a store; callers load a cluster, reconcile it
//! and commit the returned snapshot only when the phase succeeded.

mod file;
mod memory;

pub use file::{FileStore, StoreLock};
pub use memory::MemoryStore;

use crate::error::StoreError;
use async_trait::async_trait;
use clusterflow_core::Cluster;

pub type Result<T> = std::result::Result<T, StoreError>;

/// Loads and saves the document of one named cluster
#[async_trait]
pub trait ClusterStorer: Send + Sync {
    /// Whether a document has been committed for this cluster
    async fn exists(&self) -> bool;

    /// Persist `cluster`, replacing the previous document
    async fn commit(&self, cluster: &Cluster) -> Result<()>;

    /// Remove the stored document
    async fn destroy(&self) -> Result<()>;

    /// Load the stored document
    async fn get_cluster(&self) -> Result<Cluster>;

    /// Names of every cluster in the same backing store
    async fn list(&self) -> Result<Vec<String>>;
}
