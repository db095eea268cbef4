use anyhow::anyhow;
use tracing_subscriber::EnvFilter;

/// Initialize structured logging on stderr, keeping stdout for the probe output
///
/// `RUST_LOG` wins when set; otherwise only warnings are shown unless
/// `verbose` is requested.
pub fn init_logging(verbose: bool) -> anyhow::Result<()> {
    let default_filter = if verbose { "info,ftp_probe=debug" } else { "warn" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
        .map_err(|e| anyhow!("failed to initialize logging: {e}"))?;

    tracing::debug!("logging initialized");
    Ok(())
}
