//! Fetch command - serve one request through the cache layer

use crate::cli::args::FetchArgs;
use crate::cli::host::Host;
use crate::config::Config;
use crate::error::{ShellcacheError, ShellcacheResult};
use crate::http::{RequestDescriptor, Response};
use crate::layer::Interception;
use crate::network::Network;
use console::style;
use std::io::Write;
use tracing::debug;

/// Execute the fetch command
pub async fn execute(args: FetchArgs, config: &Config) -> ShellcacheResult<()> {
    let host = Host::open(config).await?;

    let url = RequestDescriptor::resolve(&config.origin.url, &args.target)?;
    let mut request = RequestDescriptor::new(args.method, url).with_destination(args.destination);
    if args.navigate {
        request = request.navigation();
    }

    let outcome = host.layer.on_intercept(&request).await;

    // Detached writes must land before the process exits, even on failure
    host.shutdown().await?;

    let (response, source) = match outcome? {
        Interception::Served(served) => (served.response, served.source.to_string()),
        Interception::Passthrough(reason) => {
            debug!("Forwarding {} directly: {}", request.url, reason);
            let response = host.network.fetch(&request).await?;
            (response, format!("passthrough, {}", reason))
        }
    };

    eprintln!(
        "{} {} {} ({})",
        status_style(&response),
        request.method,
        request.url,
        style(source).dim()
    );

    if args.include {
        for (name, value) in &response.headers {
            eprintln!("{}: {}", style(name).dim(), value);
        }
        eprintln!();
    }

    match args.output {
        Some(path) => {
            tokio::fs::write(&path, &response.body).await.map_err(|e| {
                ShellcacheError::io(format!("writing {}", path.display()), e)
            })?;
            eprintln!("Wrote {} bytes to {}", response.body.len(), path.display());
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout
                .write_all(&response.body)
                .and_then(|_| stdout.flush())
                .map_err(|e| ShellcacheError::io("writing response body", e))?;
        }
    }

    Ok(())
}

fn status_style(response: &Response) -> console::StyledObject<u16> {
    match response.status {
        200..=299 => style(response.status).green(),
        300..=399 => style(response.status).cyan(),
        _ => style(response.status).yellow(),
    }
}
