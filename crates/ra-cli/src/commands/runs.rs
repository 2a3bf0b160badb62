use std::io;
use std::path::Path;

use anyhow::Result;
use ra_batch::{load_run_manifest, MANIFEST_FILE};
use ra_cli::cli::RunFormat;

use crate::commands::run::print_group_table;

pub fn handle_describe(target: &Path, format: RunFormat) -> Result<()> {
    let path = if target.is_dir() {
        target.join(MANIFEST_FILE)
    } else {
        target.to_path_buf()
    };
    let manifest = load_run_manifest(&path)?;
    match format {
        RunFormat::Json => {
            serde_json::to_writer_pretty(io::stdout(), &manifest)?;
            println!();
        }
        RunFormat::Plain => {
            println!(
                "Run at {} into {} (steps {}; reused {})",
                manifest.created_at.to_rfc3339(),
                manifest.output_dir,
                manifest.steps.join(","),
                if manifest.reused_steps.is_empty() {
                    "none".to_string()
                } else {
                    manifest.reused_steps.join(",")
                }
            );
            print_group_table(&manifest.groups)?;
            println!("{} succeeded, {} failed", manifest.success, manifest.failure);
        }
    }
    Ok(())
}
