//! Status command - lifecycle state and configuration summary

use crate::config::{Config, ConfigManager};
use crate::error::ShellcacheResult;
use crate::lifecycle::{LifecycleRecord, LifecycleState};
use crate::store::{CacheStore, CachePartitions, FsStore};
use console::{style, Emoji};

static CHECK: Emoji<'_, '_> = Emoji("✓ ", "[OK] ");
static WARN: Emoji<'_, '_> = Emoji("⚠ ", "[WARN] ");

/// Execute the status command
pub async fn execute(config: &Config) -> ShellcacheResult<()> {
    let partitions = CachePartitions::new(config.cache.version.clone());
    let record_path = ConfigManager::lifecycle_path(config);
    let point = LifecycleRecord::resume(&record_path, &config.cache.version).await?;
    let state = point.state;

    println!("{}", style("shellcache status").bold().cyan());
    println!();

    println!("{}", style("Layer:").bold());
    println!("  Origin:   {}", config.origin.url);
    println!("  Version:  {}", config.cache.version);
    let marker = if state == LifecycleState::Active {
        &CHECK
    } else {
        &WARN
    };
    println!("  {}State: {}", marker, state);
    match (&point.predecessor, state) {
        (_, LifecycleState::Active) => println!("  Serving:  {}", config.cache.version),
        (Some(previous), _) => println!("  Serving:  {} (until activation)", previous),
        (None, _) => println!("  Serving:  nothing, requests pass through"),
    }

    println!();
    println!("{}", style("Partitions:").bold());
    println!("  Static:   {}", partitions.static_name());
    println!("  Dynamic:  {}", partitions.dynamic_name());

    let store = FsStore::new(ConfigManager::partitions_dir(config));
    let stale: Vec<String> = store
        .list_partitions()
        .await?
        .into_iter()
        .filter(|name| !partitions.is_current(name))
        .collect();
    if stale.is_empty() {
        println!("  {}No stale partitions", CHECK);
    } else {
        println!(
            "  {}{} stale: {}",
            WARN,
            stale.len(),
            style(stale.join(", ")).yellow()
        );
    }

    println!();
    println!("{}", style("Paths:").bold());
    println!("  State:    {}", ConfigManager::state_dir(config).display());
    println!("  Manifest: {} asset(s)", config.cache.manifest.len());

    match state {
        LifecycleState::Installing => {
            println!();
            println!("{}", style("Not installed. Run: shellcache install").yellow());
        }
        LifecycleState::Installed | LifecycleState::Activating => {
            println!();
            println!("{}", style("Waiting. Run: shellcache activate").yellow());
        }
        LifecycleState::Active => {}
    }

    Ok(())
}
