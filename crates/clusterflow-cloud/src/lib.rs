//! Clusterflow reconciliation engine
//!
//! Drives a cluster's cloud resources from their observed state to their
//! desired state without leaving half-built infrastructure behind.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │                 clusterflow CLI                  │
//! └─────────────────┬───────────────────────────────┘
//!                   │
//! ┌─────────────────▼───────────────────────────────┐
//! │               clusterflow-cloud                  │
//! │  ┌──────────────────┐  ┌───────────────────┐    │
//! │  │ AtomicReconciler │  │ ConcurrentApplier │    │
//! │  └────────┬─────────┘  └─────────┬─────────┘    │
//! │  ┌────────▼─────────┐  ┌─────────▼─────────┐    │
//! │  │ trait Resource   │  │ trait CloudProvider│   │
//! │  └──────────────────┘  └───────────────────┘    │
//! │  ┌──────────────┐ ┌────────────┐ ┌──────────┐   │
//! │  │ Registries   │ │ Interrupts │ │  Store   │   │
//! │  └──────────────┘ └────────────┘ └──────────┘   │
//! └─────────────────────────────────────────────────┘
//! ```
//!
//! Cloud-specific resource implementations plug in through
//! [`ResourceRegistry`] and [`ProviderRegistry`].

pub mod concurrent;
pub mod error;
pub mod model;
pub mod reconciler;
pub mod registry;
pub mod resource;
pub mod retry;
pub mod signal;
pub mod store;

// Re-exports
pub use concurrent::{CloudProvider, CloudResource, ConcurrentApplier, ReconcilePair};
pub use error::{
    CleanupError, CloudError, ErrorKind, Phase, ReconcileError, Result, StoreError,
};
pub use model::{Model, ResourceGraph};
pub use reconciler::{AtomicReconciler, CreatedResources};
pub use registry::{ProviderFactory, ProviderRegistry, ResourceFactory, ResourceRegistry};
pub use resource::{Resource, ResourceKind, ResourceState, ResourceStatus, Scope};
pub use retry::{Backoff, BackoffPolicy, Retrier, RetryError};
pub use signal::{Escalation, InterruptMonitor, PhaseGuard, SignalPolicy, SignalState};
pub use store::{ClusterStorer, FileStore, MemoryStore, StoreLock};
