//! All-or-nothing output staging.
//!
//! A generator step writes every table into `<out>/.staging-<step>/` first.
//! Only when all of them serialized successfully does [`StagedOutput::commit`]
//! move them into `<out>/`. Dropping an uncommitted stage removes the staging
//! directory, so a failed step never leaves a half-populated derived table.

use std::fs::{self, File};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;

use crate::tables::write_table;

pub struct StagedOutput {
    final_dir: PathBuf,
    staging_dir: PathBuf,
    files: Vec<String>,
    committed: bool,
}

impl StagedOutput {
    pub fn begin(final_dir: &Path, stage: &str) -> Result<Self> {
        let staging_dir = final_dir.join(format!(".staging-{stage}"));
        if staging_dir.exists() {
            fs::remove_dir_all(&staging_dir)
                .with_context(|| format!("clearing stale {}", staging_dir.display()))?;
        }
        fs::create_dir_all(&staging_dir)
            .with_context(|| format!("creating {}", staging_dir.display()))?;
        Ok(Self {
            final_dir: final_dir.to_path_buf(),
            staging_dir,
            files: Vec::new(),
            committed: false,
        })
    }

    pub fn write_csv<T: Serialize>(&mut self, file_name: &str, rows: &[T]) -> Result<()> {
        let path = self.staging_dir.join(file_name);
        write_table(&path, rows)?;
        self.files.push(file_name.to_string());
        Ok(())
    }

    pub fn write_json<T: Serialize>(&mut self, file_name: &str, value: &T) -> Result<()> {
        let path = self.staging_dir.join(file_name);
        let file = File::create(&path).with_context(|| format!("creating {}", path.display()))?;
        serde_json::to_writer_pretty(file, value)
            .with_context(|| format!("writing {}", path.display()))?;
        self.files.push(file_name.to_string());
        Ok(())
    }

    /// Promote every staged file into the output directory.
    ///
    /// Files the stage replaces are parked in the staging directory first.
    /// If any move fails, files already promoted are withdrawn and the
    /// parked originals restored, so the output directory is left as it was.
    pub fn commit(mut self) -> Result<Vec<PathBuf>> {
        let mut moves: Vec<Promotion> = Vec::with_capacity(self.files.len());
        for name in &self.files {
            match self.promote(name) {
                Ok(done) => moves.push(done),
                Err(err) => {
                    for done in moves.iter().rev() {
                        done.undo();
                    }
                    return Err(err);
                }
            }
        }
        fs::remove_dir_all(&self.staging_dir)
            .with_context(|| format!("removing {}", self.staging_dir.display()))?;
        self.committed = true;
        let promoted: Vec<PathBuf> = moves.into_iter().map(|m| m.target).collect();
        tracing::debug!(dir = %self.final_dir.display(), files = promoted.len(), "committed stage");
        Ok(promoted)
    }

    fn promote(&self, name: &str) -> Result<Promotion> {
        let from = self.staging_dir.join(name);
        let target = self.final_dir.join(name);
        let parked = if target.exists() {
            let park = self.staging_dir.join(format!(".previous-{name}"));
            fs::rename(&target, &park)
                .with_context(|| format!("parking {}", target.display()))?;
            Some(park)
        } else {
            None
        };
        if let Err(err) = fs::rename(&from, &target) {
            if let Some(park) = &parked {
                let _ = fs::rename(park, &target);
            }
            return Err(err)
                .with_context(|| format!("moving {} to {}", from.display(), target.display()));
        }
        Ok(Promotion { target, parked })
    }
}

/// One promoted file and, when it replaced something, where the original waits.
struct Promotion {
    target: PathBuf,
    parked: Option<PathBuf>,
}

impl Promotion {
    fn undo(&self) {
        let _ = fs::remove_file(&self.target);
        if let Some(park) = &self.parked {
            if let Err(err) = fs::rename(park, &self.target) {
                tracing::warn!(file = %self.target.display(), "restoring replaced file failed: {err}");
            }
        }
    }
}

impl Drop for StagedOutput {
    fn drop(&mut self) {
        if !self.committed {
            let _ = fs::remove_dir_all(&self.staging_dir);
        }
    }
}
