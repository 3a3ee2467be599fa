//! Activate command - skip waiting and evict stale partitions

use crate::cli::host::Host;
use crate::config::Config;
use crate::control::ControlMessage;
use crate::error::{ShellcacheError, ShellcacheResult};
use crate::lifecycle::{EvictionReport, LifecycleState};
use console::style;

/// Execute the activate command
pub async fn execute(config: &Config) -> ShellcacheResult<()> {
    let host = Host::open(config).await?;

    let report = match host.state() {
        LifecycleState::Installing => {
            return Err(ShellcacheError::User(format!(
                "Version {} is not installed yet. Run: shellcache install",
                config.cache.version
            )));
        }
        LifecycleState::Installed => {
            let message = serde_json::to_string(&ControlMessage::skip_waiting())?;
            host.layer.on_message(&message).await?.unwrap_or_default()
        }
        LifecycleState::Activating | LifecycleState::Active => host.layer.on_activate().await?,
    };

    host.persist().await?;
    print_report(&report, &host.layer.partitions().static_name());

    Ok(())
}

pub(crate) fn print_report(report: &EvictionReport, current: &str) {
    for name in &report.deleted {
        println!("{} Deleted {}", style("✓").green(), name);
    }
    for (name, reason) in &report.failed {
        println!("{} Could not delete {}: {}", style("✗").red(), name, reason);
    }

    println!(
        "{} Active with {} ({} evicted)",
        style("•").cyan(),
        style(current).bold(),
        report.deleted.len()
    );
}
