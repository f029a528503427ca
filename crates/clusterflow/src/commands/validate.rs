use anyhow::Context;
use clusterflow_cloud::{ClusterStorer, FileStore};
use colored::Colorize;
use std::path::Path;

pub async fn handle(state_dir: &Path, name: &str) -> anyhow::Result<()> {
    println!("{}", format!("Validating cluster '{}'...", name).blue());

    let cluster = FileStore::new(state_dir, name).get_cluster().await?;
    cluster
        .validate()
        .with_context(|| format!("cluster '{}' is invalid", name))?;

    println!("{}", "✓ Cluster document is valid".green().bold());
    println!();
    println!("Summary:");
    println!("  Cloud: {} ({})", cluster.cloud.cyan(), cluster.location);
    println!("  Server pools: {}", cluster.server_pools.len());
    for pool in &cluster.server_pools {
        println!(
            "    - {} ({}, {}..{} x {})",
            pool.name.cyan(),
            pool.role,
            pool.min_count,
            pool.max_count,
            if pool.size.is_empty() {
                "(unset)"
            } else {
                pool.size.as_str()
            }
        );
    }
    if !cluster.tags.is_empty() {
        println!("  Tags: {}", cluster.tags.len());
    }
    Ok(())
}
