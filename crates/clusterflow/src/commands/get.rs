use clusterflow_cloud::{ClusterStorer, FileStore};
use std::path::Path;

pub async fn handle(state_dir: &Path, name: &str) -> anyhow::Result<()> {
    let cluster = FileStore::new(state_dir, name).get_cluster().await?;
    println!("{}", serde_json::to_string_pretty(&cluster)?);
    Ok(())
}
