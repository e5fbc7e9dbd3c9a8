//! Core logging types: fragment entries, status, and the [`Log`] trait.

/// Per-plugin result for summary reporting.
#[derive(Debug, Clone)]
pub struct FragmentEntry {
    /// Plugin name.
    pub name: String,
    /// Final status of the plugin's fragment.
    pub status: FragmentStatus,
    /// Optional detail message (e.g., target path or error description).
    pub message: Option<String>,
}

/// Outcome of materializing one fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FragmentStatus {
    /// The fragment was written or removed.
    Changed,
    /// The fragment was already in its target state.
    Unchanged,
    /// The fragment was left alone (e.g., a directory sits at its path).
    Skipped,
    /// Dry run; the fragment would have been changed.
    DryRun,
    /// Validation, I/O or a collaborator failed for this plugin.
    Failed,
}

impl FragmentStatus {
    /// Lowercase label written to the log file.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Changed => "changed",
            Self::Unchanged => "unchanged",
            Self::Skipped => "skipped",
            Self::DryRun => "dry-run",
            Self::Failed => "failed",
        }
    }
}

/// Abstraction over logging backends.
///
/// Command code logs through this trait so tests can substitute their own
/// backend for [`Logger`](super::logger::Logger).
pub trait Log: Send + Sync {
    /// Log a stage header (major section).
    fn stage(&self, msg: &str);
    /// Log an informational message.
    fn info(&self, msg: &str);
    /// Log a debug message (may be suppressed on console).
    fn debug(&self, msg: &str);
    /// Log a warning message.
    fn warn(&self, msg: &str);
    /// Log an error message.
    fn error(&self, msg: &str);
    /// Log a dry-run action message.
    fn dry_run(&self, msg: &str);
    /// Record a plugin result for the summary.
    fn record_fragment(&self, name: &str, status: FragmentStatus, message: Option<&str>);
}
