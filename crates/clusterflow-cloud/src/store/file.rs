//! Filesystem state store
//!
//! Layout under the state root:
//!
//! ```text
//! <root>/<cluster>/cluster.json         current document
//! <root>/<cluster>/cluster.json.backup  previous document
//! <root>/<cluster>/lock.json            held while committing
//! ```

use super::{ClusterStorer, Result};
use crate::error::StoreError;
use crate::retry::Retrier;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use clusterflow_core::Cluster;
use serde::{Deserialize, Serialize};
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tokio::io::AsyncWriteExt;

const CLUSTER_FILE: &str = "cluster.json";
const CLUSTER_BACKUP: &str = "cluster.json.backup";
const LOCK_FILE: &str = "lock.json";

/// Locks older than this are considered abandoned
const STALE_LOCK_HOURS: i64 = 1;

/// JSON document store rooted at a directory
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
    name: String,
    lock_retry: Retrier,
}

impl FileStore {
    /// Store for `name` under `root`; a held lock fails immediately
    pub fn new(root: impl AsRef<Path>, name: impl Into<String>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            name: name.into(),
            lock_retry: Retrier::new(1, Duration::ZERO),
        }
    }

    /// Retry lock acquisition when another process holds the lock
    pub fn with_lock_retry(mut self, retrier: Retrier) -> Self {
        self.lock_retry = retrier;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Directory holding this cluster's files
    pub fn cluster_dir(&self) -> PathBuf {
        self.root.join(&self.name)
    }

    fn cluster_path(&self) -> PathBuf {
        self.cluster_dir().join(CLUSTER_FILE)
    }

    fn backup_path(&self) -> PathBuf {
        self.cluster_dir().join(CLUSTER_BACKUP)
    }

    fn lock_path(&self) -> PathBuf {
        self.cluster_dir().join(LOCK_FILE)
    }

    async fn ensure_cluster_dir(&self) -> Result<()> {
        let dir = self.cluster_dir();
        if !dir.exists() {
            fs::create_dir_all(&dir).await?;
            tracing::debug!("Created state directory: {}", dir.display());
        }
        Ok(())
    }

    /// Load the previous document kept by the last commit
    pub async fn get_backup(&self) -> Result<Cluster> {
        read_cluster(&self.backup_path(), &self.name).await
    }

    /// Acquire the exclusive commit lock
    pub async fn acquire_lock(&self) -> Result<StoreLock> {
        self.ensure_cluster_dir().await?;

        let lock_path = self.lock_path();
        let lock_info = LockInfo {
            holder: std::env::var("HOSTNAME")
                .or_else(|_| std::env::var("HOST"))
                .unwrap_or_else(|_| "unknown".to_string()),
            acquired_at: Utc::now(),
        };
        let content = serde_json::to_string_pretty(&lock_info)?;

        match create_lock_file(&lock_path, &content).await {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                let (holder, since) = self.lock_holder(&lock_path).await?;
                let age = Utc::now().signed_duration_since(since);
                if age.num_hours() < STALE_LOCK_HOURS {
                    return Err(self.held_by(&holder, since));
                }

                tracing::warn!("Removing stale lock from {}", holder);
                match fs::remove_file(&lock_path).await {
                    Ok(()) => {}
                    Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                    Err(e) => return Err(e.into()),
                }
                // Another process may have taken over the stale lock first
                match create_lock_file(&lock_path, &content).await {
                    Ok(()) => {}
                    Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                        return Err(StoreError::Lock(format!(
                            "State of {} was taken over by another process",
                            self.name
                        )));
                    }
                    Err(e) => return Err(e.into()),
                }
            }
            Err(e) => return Err(e.into()),
        }

        tracing::debug!("Acquired state lock for {}", self.name);
        Ok(StoreLock {
            lock_path,
            released: false,
        })
    }

    /// Holder and age of an existing lock file
    ///
    /// A lock that is still being written, or is unreadable, is dated by its
    /// modification time.
    async fn lock_holder(&self, lock_path: &Path) -> Result<(String, DateTime<Utc>)> {
        let content = match fs::read_to_string(lock_path).await {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(StoreError::Lock(format!(
                    "State of {} changed hands while locking",
                    self.name
                )));
            }
            Err(e) => return Err(e.into()),
        };

        match serde_json::from_str::<LockInfo>(&content) {
            Ok(info) => Ok((info.holder, info.acquired_at)),
            Err(_) => {
                let modified = fs::metadata(lock_path).await?.modified()?;
                Ok(("an unknown holder".to_string(), DateTime::<Utc>::from(modified)))
            }
        }
    }

    fn held_by(&self, holder: &str, since: DateTime<Utc>) -> StoreError {
        StoreError::Lock(format!(
            "State of {} is locked by {} since {}",
            self.name, holder, since
        ))
    }

    async fn lock(&self) -> Result<StoreLock> {
        self.lock_retry
            .run("acquire state lock", || self.acquire_lock())
            .await
            .map_err(|e| e.last_error)
    }
}

/// Create the lock file, failing with `AlreadyExists` when it is held
async fn create_lock_file(path: &Path, content: &str) -> io::Result<()> {
    let mut file = fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .await?;
    file.write_all(content.as_bytes()).await?;
    file.flush().await
}

async fn read_cluster(path: &Path, name: &str) -> Result<Cluster> {
    if !path.exists() {
        return Err(StoreError::NotFound(name.to_string()));
    }

    let content = fs::read_to_string(path).await?;
    let cluster: Cluster = serde_json::from_str(&content)?;
    cluster.check_version()?;
    Ok(cluster)
}

#[async_trait]
impl ClusterStorer for FileStore {
    async fn exists(&self) -> bool {
        fs::try_exists(self.cluster_path()).await.unwrap_or(false)
    }

    async fn commit(&self, cluster: &Cluster) -> Result<()> {
        if cluster.name != self.name {
            return Err(StoreError::NameMismatch {
                store: self.name.clone(),
                cluster: cluster.name.clone(),
            });
        }

        let lock = self.lock().await?;

        let path = self.cluster_path();
        let backup = self.backup_path();

        if path.exists() {
            if backup.exists() {
                fs::remove_file(&backup).await?;
            }
            fs::rename(&path, &backup).await?;
            tracing::debug!("Created state backup for {}", self.name);
        }

        let content = serde_json::to_string_pretty(cluster)?;
        fs::write(&path, content).await?;

        lock.release().await?;
        tracing::debug!("Committed cluster {}", self.name);
        Ok(())
    }

    async fn destroy(&self) -> Result<()> {
        let dir = self.cluster_dir();
        if !fs::try_exists(&dir).await? {
            return Ok(());
        }

        let lock = self.lock().await?;
        fs::remove_dir_all(&dir).await?;
        lock.release().await?;
        tracing::debug!("Removed state directory: {}", dir.display());
        Ok(())
    }

    async fn get_cluster(&self) -> Result<Cluster> {
        let cluster = read_cluster(&self.cluster_path(), &self.name).await?;
        tracing::debug!("Loaded cluster {}", cluster.name);
        Ok(cluster)
    }

    async fn list(&self) -> Result<Vec<String>> {
        if !fs::try_exists(&self.root).await? {
            return Ok(Vec::new());
        }

        let mut names = Vec::new();
        let mut entries = fs::read_dir(&self.root).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.join(CLUSTER_FILE).is_file() {
                if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }
}

/// Lock information
#[derive(Debug, Serialize, Deserialize)]
struct LockInfo {
    holder: String,
    acquired_at: DateTime<Utc>,
}

/// RAII guard for the commit lock
#[derive(Debug)]
pub struct StoreLock {
    lock_path: PathBuf,
    released: bool,
}

impl StoreLock {
    /// Release the lock
    pub async fn release(mut self) -> Result<()> {
        if !self.released {
            if self.lock_path.exists() {
                fs::remove_file(&self.lock_path).await?;
                tracing::debug!("Released state lock");
            }
            self.released = true;
        }
        Ok(())
    }
}

impl Drop for StoreLock {
    fn drop(&mut self) {
        if !self.released && self.lock_path.exists() {
            let _ = std::fs::remove_file(&self.lock_path);
        }
    }
}
