//! Policy reload from the configuration file.

use std::path::Path;

use crate::config::{read_config, ConfigError};
use crate::lifecycle::registry::{ListenerRegistry, ReloadReport};

/// Re-read `path` and refresh the policies of running listeners.
///
/// Only router policies are applied; every other setting in the file is
/// ignored until restart.
pub fn reload_from_disk(path: &Path, registry: &ListenerRegistry) -> Result<ReloadReport, ConfigError> {
    let config = read_config(path).inspect_err(|e| {
        tracing::error!(path = ?path, error = %e, "Unable to reload config file");
    })?;

    let report = registry.apply(&config.routers);
    tracing::info!(
        updated = report.updated.len(),
        failed = report.failed.len(),
        ignored = report.ignored.len(),
        "Router configurations reloaded"
    );
    Ok(report)
}
