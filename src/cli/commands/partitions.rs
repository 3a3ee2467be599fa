//! Partitions command - list cache partitions

use crate::cli::args::{OutputFormat, PartitionsArgs};
use crate::config::{Config, ConfigManager};
use crate::error::ShellcacheResult;
use crate::store::{CacheStore, CachePartitions, FsStore};
use console::style;

struct PartitionRow {
    name: String,
    entries: usize,
    current: bool,
}

/// Execute the partitions command
pub async fn execute(args: PartitionsArgs, config: &Config) -> ShellcacheResult<()> {
    let store = FsStore::new(ConfigManager::partitions_dir(config));
    let partitions = CachePartitions::new(config.cache.version.clone());

    let mut rows = Vec::new();
    for name in store.list_partitions().await? {
        let entries = store.open_partition(&name).await?.entries;
        rows.push(PartitionRow {
            current: partitions.is_current(&name),
            name,
            entries,
        });
    }

    match args.format {
        OutputFormat::Table => print_table(&rows),
        OutputFormat::Json => print_json(&rows)?,
        OutputFormat::Plain => print_plain(&rows),
    }

    Ok(())
}

fn print_table(rows: &[PartitionRow]) {
    if rows.is_empty() {
        println!("No cache partitions found.");
        return;
    }

    println!("{:<32} {:<10} {:<10}", "PARTITION", "ENTRIES", "STATE");
    println!("{}", "-".repeat(54));

    for row in rows {
        let state = if row.current {
            style("current").green().to_string()
        } else {
            style("stale").yellow().to_string()
        };
        println!("{:<32} {:<10} {:<10}", row.name, row.entries, state);
    }

    let stale = rows.iter().filter(|r| !r.current).count();
    println!();
    println!("Total: {} partition(s), {} stale", rows.len(), stale);
}

fn print_json(rows: &[PartitionRow]) -> ShellcacheResult<()> {
    #[derive(serde::Serialize)]
    struct PartitionJson<'a> {
        name: &'a str,
        entries: usize,
        current: bool,
    }

    let json: Vec<PartitionJson> = rows
        .iter()
        .map(|r| PartitionJson {
            name: &r.name,
            entries: r.entries,
            current: r.current,
        })
        .collect();

    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}

fn print_plain(rows: &[PartitionRow]) {
    for row in rows {
        println!("{}", row.name);
    }
}
