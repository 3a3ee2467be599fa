//! Message command - deliver a raw control message

use crate::cli::args::MessageArgs;
use crate::cli::host::Host;
use crate::config::Config;
use crate::error::ShellcacheResult;
use console::style;

/// Execute the message command
pub async fn execute(args: MessageArgs, config: &Config) -> ShellcacheResult<()> {
    let host = Host::open(config).await?;

    match host.layer.on_message(&args.payload).await? {
        Some(report) => {
            host.persist().await?;
            super::activate::print_report(&report, &host.layer.partitions().static_name());
        }
        None => {
            println!(
                "{} Message ignored (lifecycle is {})",
                style("•").dim(),
                host.state()
            );
        }
    }

    Ok(())
}
