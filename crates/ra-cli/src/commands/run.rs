use std::io::{self, Write};
use std::path::Path;
use std::time::Instant;

use anyhow::Result;
use ra_batch::{run_pipeline, GroupRecord, RunSummary};
use tabwriter::TabWriter;

use crate::commands::telemetry::record_run_timed;
use crate::commands::util::load_with_steps;

pub fn print_group_table(groups: &[GroupRecord]) -> Result<()> {
    let mut writer = TabWriter::new(io::stdout());
    writeln!(writer, "GROUP\tSTATUS\tSTEPS\tFILES\tERROR")?;
    for group in groups {
        writeln!(
            writer,
            "{}\t{}\t{}\t{}\t{}",
            group.group,
            group.status,
            group.steps_completed.join(","),
            group.files.len(),
            group.error_kind.as_deref().unwrap_or("-"),
        )?;
    }
    writer.flush()?;
    Ok(())
}

pub fn handle(
    settings_path: &Path,
    steps: Option<&str>,
    threads: Option<usize>,
    verify: bool,
) -> Result<()> {
    let start = Instant::now();
    let mut settings = load_with_steps(settings_path, steps)?;
    if let Some(threads) = threads {
        settings.run.threads = threads;
    }
    settings.run.verify_reproducibility |= verify;
    let selected = settings.selected_steps()?;
    tracing::info!(
        settings = %settings_path.display(),
        groups = settings.draws.len(),
        "starting run"
    );

    let summary = run_pipeline(&settings, &selected);
    let result = match &summary {
        Ok(summary) => summary.ensure_success(),
        Err(err) => Err(anyhow::anyhow!("{err:#}")),
    };
    let steps_param = settings.run.steps.join(",");
    let threads_param = settings.run.threads.to_string();
    let settings_param = settings_path.display().to_string();
    record_run_timed(
        &settings.run.output_dir.join(ra_batch::MANIFEST_FILE),
        "run",
        &[
            ("settings", settings_param.as_str()),
            ("steps", steps_param.as_str()),
            ("threads", threads_param.as_str()),
        ],
        start,
        &result,
    );
    let summary: RunSummary = summary?;
    print_group_table(&summary.groups)?;
    println!(
        "{} succeeded, {} failed; manifest {}",
        summary.success,
        summary.failure,
        summary.manifest_path.display()
    );
    summary.ensure_success()
}
