use clusterflow_cloud::{ClusterStorer, FileStore};
use colored::Colorize;
use std::path::Path;

pub async fn handle(state_dir: &Path) -> anyhow::Result<()> {
    // list does not depend on the store's cluster name
    let names = FileStore::new(state_dir, "").list().await?;

    if names.is_empty() {
        println!(
            "{}",
            format!("No clusters in {}", state_dir.display()).dimmed()
        );
        return Ok(());
    }

    for name in names {
        println!("{}", name.cyan());
    }
    Ok(())
}
