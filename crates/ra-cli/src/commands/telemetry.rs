use std::path::Path;
use std::time::Instant;

use ra_cli::manifest::record_manifest;

/// Record the invocation next to `out`; a failed write only warns.
pub fn record_run_timed(
    out: &Path,
    command: &str,
    params: &[(&str, &str)],
    start: Instant,
    result: &anyhow::Result<()>,
) {
    let duration_ms = start.elapsed().as_millis();
    let status = if result.is_ok() { "success" } else { "failure" };
    match record_manifest(out, command, params, status, Some(duration_ms)) {
        Ok(path) => tracing::debug!(manifest = %path.display(), "recorded invocation"),
        Err(err) => tracing::warn!("failed to record run manifest: {err:#}"),
    }
}
