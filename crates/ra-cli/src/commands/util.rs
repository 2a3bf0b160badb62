use anyhow::Result;
use ra_scenarios::{load_settings_from_path, RunSettings};
use std::path::Path;

pub fn parse_list(spec: Option<&str>) -> Vec<String> {
    spec.unwrap_or("")
        .split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

/// Load settings and apply a `--steps` override.
pub fn load_with_steps(path: &Path, steps: Option<&str>) -> Result<RunSettings> {
    let mut settings = load_settings_from_path(path)?;
    let overrides = parse_list(steps);
    if !overrides.is_empty() {
        settings.run.steps = overrides;
    }
    Ok(settings)
}
