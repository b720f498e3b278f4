//! Gc command for Tether.
//!
//! Runs one garbage-collection sweep over a file provider directory, for
//! deployments that schedule GC from cron instead of in-process.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::storage::file::{sweep_dir, SweepReport};

/// Options for the gc command.
#[derive(Debug, Clone)]
pub struct GcOptions {
    /// Session directory.
    pub dir: PathBuf,
    /// Idle lifetime in seconds.
    pub lifetime: i64,
}

/// Output format for the gc command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GcOutput {
    /// Whether the command was successful.
    pub success: bool,
    /// Session directory swept.
    pub dir: String,
    /// Files removed.
    pub removed: usize,
    /// Files left.
    pub remaining: usize,
    /// Error message if command failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl GcOutput {
    /// Create a successful output.
    pub fn success(dir: impl Into<String>, report: SweepReport) -> Self {
        Self {
            success: true,
            dir: dir.into(),
            removed: report.removed,
            remaining: report.remaining,
            error: None,
        }
    }

    /// Create a failed output.
    pub fn failure(dir: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            success: false,
            dir: dir.into(),
            removed: 0,
            remaining: 0,
            error: Some(error.into()),
        }
    }

    /// Format as human-readable text.
    pub fn format_text(&self) -> String {
        if !self.success {
            return format!(
                "Gc failed: {}",
                self.error.as_deref().unwrap_or("unknown error")
            );
        }
        format!(
            "Swept {}: removed {} expired sessions, {} remaining.",
            self.dir, self.removed, self.remaining
        )
    }
}

/// The gc command implementation.
#[derive(Debug, Default)]
pub struct GcCommand;

impl GcCommand {
    /// Create a new gc command.
    pub fn new() -> Self {
        Self
    }

    /// Run the gc command.
    pub fn run(&self, options: &GcOptions) -> GcOutput {
        let dir = options.dir.display().to_string();
        if options.lifetime < 0 {
            return GcOutput::failure(dir, "lifetime must be >= 0");
        }
        match sweep_dir(&options.dir, options.lifetime) {
            Ok(report) => GcOutput::success(dir, report),
            Err(e) => GcOutput::failure(dir, e.to_string()),
        }
    }
}
