//! Batch processing of a book library directory.
//!
//! Walks the source tree, mirrors its directory structure under the target,
//! converts `.fb2` files, copies `.epub` files through, and ignores
//! everything else. Failures are contained per file: a book that cannot be
//! converted is logged and skipped, never aborting the rest of the batch.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{error, info};
use walkdir::WalkDir;

use crate::convert;
use crate::error::{Error, Result};
use crate::util;

/// How many characters of a failing source file to include in the error log.
const SOURCE_DUMP_LIMIT: usize = 500;

/// A configured batch run over one source directory.
#[derive(Debug)]
pub struct Batch {
    source_dir: PathBuf,
    target_dir: PathBuf,
}

/// Per-outcome file counts for one batch run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub converted: usize,
    pub copied: usize,
    pub failed: usize,
}

impl Batch {
    /// Set up a batch from `source_dir` into `target_root` (defaulting to
    /// `~/Documents/Converted_Books`). The source directory's own name is
    /// appended to the target root, and the resulting directory is created
    /// eagerly; failure here is fatal, unlike per-file failures later.
    pub fn new<P: AsRef<Path>>(source_dir: P, target_root: Option<PathBuf>) -> Result<Self> {
        let source_dir = source_dir.as_ref().to_path_buf();
        let root = target_root.unwrap_or_else(default_target_root);
        let target_dir = match source_dir.file_name() {
            Some(base) => root.join(base),
            None => root,
        };

        fs::create_dir_all(&target_dir)?;
        info!(
            source = %source_dir.display(),
            target = %target_dir.display(),
            "converter initialized"
        );

        Ok(Self {
            source_dir,
            target_dir,
        })
    }

    pub fn target_dir(&self) -> &Path {
        &self.target_dir
    }

    /// Process the whole source tree.
    ///
    /// Only traversal and directory-creation errors abort the run; any
    /// failure on an individual file is logged and counted.
    pub fn run(&self) -> Result<BatchSummary> {
        info!("processing source tree");
        let mut summary = BatchSummary::default();

        for entry in WalkDir::new(&self.source_dir) {
            let entry = entry.map_err(io::Error::from)?;
            let path = entry.path();
            let relative = path.strip_prefix(&self.source_dir).unwrap_or(path);
            let mirrored = self.target_dir.join(relative);

            if entry.file_type().is_dir() {
                fs::create_dir_all(&mirrored)?;
                continue;
            }

            match path.extension().and_then(|ext| ext.to_str()) {
                Some("fb2") => {
                    let destination = mirrored.with_extension("epub");
                    match convert::convert_file(path, &destination) {
                        Ok(()) => {
                            info!(
                                from = %path.display(),
                                to = %destination.display(),
                                "converted"
                            );
                            summary.converted += 1;
                        }
                        Err(err) => {
                            self.log_failure(path, &err);
                            summary.failed += 1;
                        }
                    }
                }
                Some("epub") => match fs::copy(path, &mirrored) {
                    Ok(_) => {
                        info!(from = %path.display(), to = %mirrored.display(), "copied");
                        summary.copied += 1;
                    }
                    Err(err) => {
                        self.log_failure(path, &err.into());
                        summary.failed += 1;
                    }
                },
                _ => {}
            }
        }

        info!(
            converted = summary.converted,
            copied = summary.copied,
            failed = summary.failed,
            "finished processing"
        );
        Ok(summary)
    }

    fn log_failure(&self, path: &Path, err: &Error) {
        error!(file = %path.display(), error = %err, "failed to process file");

        // For source-text failures, dump the beginning of the file so the
        // offending input can be identified straight from the log.
        if err.is_source_error()
            && let Ok(bytes) = fs::read(path)
        {
            let text = util::decode_text(&bytes, None);
            let snippet: String = text.chars().take(SOURCE_DUMP_LIMIT).collect();
            error!(file = %path.display(), "source begins with:\n{snippet}");
        }
    }
}

fn default_target_root() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("Documents")
        .join("Converted_Books")
}
