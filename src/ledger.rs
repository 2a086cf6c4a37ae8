//! Append-only ledger of permanently failed downloads.
//!
//! Every terminal failure of the bulk-provider orchestrator lands here as one
//! tab-separated line, so a run's unrecoverable items can be reviewed after
//! the fact without scanning console output. The file is never rewritten or
//! truncated by this tool.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::warn;

/// Placeholder written for fields whose value is not known at record time.
pub const UNKNOWN_FIELD: &str = "unknown";

/// Error appending to the failure ledger.
///
/// There is no fallback for the fallback mechanism: if the ledger itself
/// cannot be written, the environment is broken and the error propagates.
#[derive(Debug, Error)]
#[error("cannot append to failure ledger {path}: {source}")]
pub struct LedgerError {
    /// The ledger file path.
    pub path: PathBuf,
    /// The underlying IO error.
    #[source]
    pub source: std::io::Error,
}

/// Durable record of unrecoverable download failures.
///
/// The path is injected at construction so tests can point each run at a
/// temporary location. Record format: `SOURCE_URL\tLOCAL_PATH\tREASON\n`,
/// UTF-8, one record per line, no header row.
#[derive(Debug, Clone)]
pub struct FailureLedger {
    path: PathBuf,
}

impl FailureLedger {
    /// Creates a ledger that appends to `path`.
    ///
    /// The file and its parent directories are created lazily on the first
    /// [`record`](Self::record) call.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Returns the ledger file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends one failure record.
    ///
    /// `source_url` and `intended_path` default to the literal `unknown`
    /// placeholder when absent. Tabs and newlines embedded in any field are
    /// flattened to spaces so one record always occupies exactly one line.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError`] if the parent directory or the file cannot be
    /// created, or the append fails.
    pub fn record(
        &self,
        source_url: Option<&str>,
        intended_path: Option<&Path>,
        reason: &str,
    ) -> Result<(), LedgerError> {
        let url_field = flatten(source_url.unwrap_or(UNKNOWN_FIELD));
        let path_field = intended_path.map_or_else(
            || UNKNOWN_FIELD.to_string(),
            |p| flatten(&p.display().to_string()),
        );
        let reason_field = flatten(reason);

        warn!(url = %url_field, path = %path_field, reason = %reason_field, "recording failure");

        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| LedgerError {
                path: self.path.clone(),
                source: e,
            })?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| LedgerError {
                path: self.path.clone(),
                source: e,
            })?;

        let line = format!("{url_field}\t{path_field}\t{reason_field}\n");
        file.write_all(line.as_bytes()).map_err(|e| LedgerError {
            path: self.path.clone(),
            source: e,
        })
    }
}

/// Replaces tabs and line breaks with single spaces.
fn flatten(field: &str) -> String {
    field
        .chars()
        .map(|c| match c {
            '\t' | '\n' | '\r' => ' ',
            other => other,
        })
        .collect()
}
