use clusterflow_cloud::{ClusterStorer, FileStore, Retrier};
use clusterflow_config::Settings;
use colored::Colorize;
use std::path::Path;

pub async fn handle(
    state_dir: &Path,
    name: &str,
    yes: bool,
    settings: &Settings,
) -> anyhow::Result<()> {
    let store =
        FileStore::new(state_dir, name).with_lock_retry(Retrier::from_settings(&settings.retry));

    if !store.exists().await {
        anyhow::bail!("cluster '{}' not found in {}", name, state_dir.display());
    }
    if !yes {
        anyhow::bail!(
            "refusing to delete the document of '{}' without --yes (cloud resources are not touched)",
            name
        );
    }

    store.destroy().await?;
    tracing::info!("Removed state of {}", name);
    println!(
        "{}",
        format!("✓ Removed cluster document '{}'", name).green().bold()
    );
    Ok(())
}
