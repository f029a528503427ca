//! Cluster document model for clusterflow
//!
//! A [`Cluster`] is the aggregate root every reconciliation phase reads and
//! returns. Resources fold the identifiers assigned by the cloud back into it,
//! so a snapshot taken after `reconcile` is what gets committed to the state
//! store.

pub mod error;
pub mod model;

pub use error::{CoreError, Result};
pub use model::*;
