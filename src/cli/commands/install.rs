//! Install command - populate the static partition for the configured version

use crate::cli::host::Host;
use crate::config::Config;
use crate::error::ShellcacheResult;
use console::style;

/// Execute the install command
pub async fn execute(config: &Config) -> ShellcacheResult<()> {
    let host = Host::open(config).await?;

    let report = host.layer.on_install().await?;
    host.persist().await?;

    if report.already_installed {
        println!(
            "{} {} already installed ({})",
            style("•").cyan(),
            config.cache.version,
            host.state()
        );
        return Ok(());
    }

    println!(
        "{} Cached {} manifest asset(s) in {}",
        style("✓").green(),
        report.assets,
        style(&report.partition).bold()
    );
    println!(
        "  {}",
        style("Waiting for activation. Run: shellcache activate").dim()
    );

    Ok(())
}
