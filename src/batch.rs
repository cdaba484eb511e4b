//! Per-file outcome accounting for directory runs

use crate::error::{Error, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

/// Result of processing one file in a batch
#[derive(Debug)]
pub enum Outcome {
    Done,
    /// Deliberately left alone, with the reason
    Skipped(String),
    Failed(Error),
}

/// Counts of per-file outcomes; a failure never stops the run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub done: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl BatchSummary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, path: &Path, outcome: Outcome) {
        match outcome {
            Outcome::Done => self.done += 1,
            Outcome::Skipped(reason) => {
                info!("Skipped {}: {}", path.display(), reason);
                self.skipped += 1;
            }
            Outcome::Failed(e) => {
                error!("Failed {}: {}", path.display(), e);
                self.failed += 1;
            }
        }
    }

    pub fn total(&self) -> usize {
        self.done + self.skipped + self.failed
    }

    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }

    /// Log the totals; `verb` names what happened to successful files
    pub fn report(&self, verb: &str) {
        let line = format!(
            "{} file(s): {} {}, {} skipped, {} failed",
            self.total(),
            self.done,
            verb,
            self.skipped,
            self.failed
        );
        if self.has_failures() {
            warn!("{}", line);
        } else {
            info!("{}", line);
        }
    }
}

/// Case-insensitive extension check; `extensions` are given without the
/// leading dot and may be compound, such as `fil.b64`
pub fn has_extension(path: &Path, extensions: &[&str]) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    let name = name.as_bytes();
    extensions.iter().any(|ext| {
        let ext = ext.as_bytes();
        name.len() > ext.len() + 1 && {
            let tail = &name[name.len() - ext.len() - 1..];
            tail[0] == b'.' && tail[1..].eq_ignore_ascii_case(ext)
        }
    })
}

/// Files in `dir` with one of `extensions`, sorted by path
pub fn collect_files(dir: &Path, extensions: &[&str], recursive: bool) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    visit(dir, extensions, recursive, &mut files)?;
    files.sort();
    Ok(files)
}

fn visit(dir: &Path, extensions: &[&str], recursive: bool, out: &mut Vec<PathBuf>) -> Result<()> {
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            if recursive {
                visit(&path, extensions, recursive, out)?;
            }
        } else if has_extension(&path, extensions) {
            out.push(path);
        }
    }
    Ok(())
}
