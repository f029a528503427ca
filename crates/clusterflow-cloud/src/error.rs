//! Cloud provider and reconciliation error types

use crate::signal::SignalState;
use std::time::Duration;
use thiserror::Error;

/// Classification attached to a cloud error when it is first observed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The resource does not exist on the cloud side
    NotFound,
    /// Eventual-consistency failure worth retrying after a backoff
    Retryable,
    /// Anything else
    Fatal,
}

/// Provider messages known to clear up on their own
///
/// Dependencies still attached, resources not yet visible, IAM roles still
/// referenced by an instance profile, API throttling.
const RETRYABLE_API_PATTERNS: &[&str] = &[
    "DependencyViolation",
    "does not exist in default VPC",
    "DeleteConflict",
    "must remove roles from instance profile first",
    "resourceInUseByAnotherResource",
    "RequestLimitExceeded",
];

const NOT_FOUND_API_PATTERNS: &[&str] = &["NotFound", "NoSuchEntity", "notFound"];

/// Cloud provider errors
#[derive(Error, Debug)]
pub enum CloudError {
    #[error("Provider not found: {0}")]
    ProviderNotFound(String),

    #[error("Resource not found: {0}")]
    ResourceNotFound(String),

    #[error("Resource already exists: {0}")]
    ResourceAlreadyExists(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Transient API error: {0}")]
    Transient(String),

    #[error("API error: {0}")]
    ApiError(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Cluster error: {0}")]
    Cluster(#[from] clusterflow_core::CoreError),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl CloudError {
    /// Wrap a raw provider message, classifying it once at the boundary
    pub fn from_api_message(message: impl Into<String>) -> Self {
        let message = message.into();
        if RETRYABLE_API_PATTERNS.iter().any(|p| message.contains(p)) {
            CloudError::Transient(message)
        } else if NOT_FOUND_API_PATTERNS.iter().any(|p| message.contains(p)) {
            CloudError::ResourceNotFound(message)
        } else {
            CloudError::ApiError(message)
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            CloudError::ResourceNotFound(_) => ErrorKind::NotFound,
            CloudError::Transient(_) | CloudError::Timeout(_) => ErrorKind::Retryable,
            _ => ErrorKind::Fatal,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::Retryable
    }

    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }
}

pub type Result<T> = std::result::Result<T, CloudError>;

/// Step of a reconciliation pass an error came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Actual,
    Expected,
    Apply,
    Delete,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Phase::Actual => write!(f, "actual"),
            Phase::Expected => write!(f, "expected"),
            Phase::Apply => write!(f, "apply"),
            Phase::Delete => write!(f, "delete"),
        }
    }
}

/// A resource created earlier in the pass could not be removed again
#[derive(Error, Debug)]
#[error("failed to remove {resource} (index {index}) after {attempts} attempt(s): {source}")]
pub struct CleanupError {
    pub index: usize,
    pub resource: String,
    pub attempts: u32,
    #[source]
    pub source: CloudError,
}

/// Errors surfaced by the reconcilers
#[derive(Error, Debug)]
pub enum ReconcileError {
    #[error("{phase} failed for {resource} (index {index}): {source}")]
    Resolve {
        phase: Phase,
        index: usize,
        resource: String,
        #[source]
        source: CloudError,
    },

    #[error(
        "{phase} failed for {resource} (index {index}); atomic cleanup successful, no orphaned resources: {source}"
    )]
    RolledBack {
        phase: Phase,
        index: usize,
        resource: String,
        #[source]
        source: CloudError,
    },

    #[error(
        "{phase} failed for {resource} (index {index}): {failure}; cleanup failed, resources abandoned, manual intervention required: {source}"
    )]
    CleanupFailed {
        phase: Phase,
        index: usize,
        resource: String,
        failure: CloudError,
        #[source]
        source: CleanupError,
    },

    #[error("reconcile interrupted ({signal}) before index {index}; created resources were removed")]
    Interrupted { signal: SignalState, index: usize },

    #[error(
        "reconcile interrupted ({signal}) before index {index}; cleanup failed, resources abandoned, manual intervention required: {source}"
    )]
    InterruptedCleanupFailed {
        signal: SignalState,
        index: usize,
        #[source]
        source: CleanupError,
    },

    #[error("delete failed for {resource} (index {index}): {source}")]
    Delete {
        index: usize,
        resource: String,
        #[source]
        source: CloudError,
    },

    #[error("delete of {resource} (index {index}) still failing after {attempts} retries: {source}")]
    RetriesExhausted {
        index: usize,
        resource: String,
        attempts: u32,
        #[source]
        source: CloudError,
    },

    #[error("provider for cloud '{cloud}' unavailable: {source}")]
    Provider {
        cloud: String,
        #[source]
        source: CloudError,
    },

    #[error("concurrent apply failed for {resource}: {source}")]
    ConcurrentApply {
        resource: String,
        #[source]
        source: CloudError,
    },

    #[error("concurrent apply timed out after {timeout:?} with {remaining} resource(s) pending")]
    Timeout { timeout: Duration, remaining: usize },

    #[error("concurrent apply lost {remaining} task(s) before completion")]
    Incomplete { remaining: usize },

    #[error("Cluster error: {0}")]
    Cluster(#[from] clusterflow_core::CoreError),
}

impl ReconcileError {
    /// Cloud resources may be left behind and need an operator
    pub fn is_abandoned(&self) -> bool {
        matches!(
            self,
            ReconcileError::CleanupFailed { .. } | ReconcileError::InterruptedCleanupFailed { .. }
        )
    }

    pub fn is_interrupted(&self) -> bool {
        matches!(
            self,
            ReconcileError::Interrupted { .. } | ReconcileError::InterruptedCleanupFailed { .. }
        )
    }
}

/// State store errors
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Cluster not found in state store: {0}")]
    NotFound(String),

    #[error("State store for '{store}' cannot hold cluster '{cluster}'")]
    NameMismatch { store: String, cluster: String },

    #[error("Lock acquisition failed: {0}")]
    Lock(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Cluster error: {0}")]
    Cluster(#[from] clusterflow_core::CoreError),
}
