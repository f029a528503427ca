use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Invalid cluster: {0}")]
    InvalidCluster(String),

    #[error("Server pool not found: {0}")]
    ServerPoolNotFound(String),

    #[error("Cluster document version {found} is newer than supported version {supported}")]
    UnsupportedVersion { found: u32, supported: u32 },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, CoreError>;
