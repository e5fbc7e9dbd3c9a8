//! Structured logger with dry-run awareness and summary collection.
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use super::subscriber::{DRY_RUN_TARGET, STAGE_TARGET, SUMMARY_TARGET, log_file_path};
use super::types::{FragmentEntry, FragmentStatus, Log};

/// Collects per-plugin results and forwards messages to [`tracing`].
///
/// Where the messages end up is decided by
/// [`init_subscriber`](super::subscriber::init_subscriber). The logger only
/// remembers the log file path so the summary can point at it.
#[derive(Debug)]
pub struct Logger {
    fragments: Mutex<Vec<FragmentEntry>>,
    log_file: Option<PathBuf>,
}

impl Logger {
    /// Create a logger for `command`.
    #[must_use]
    pub fn new(command: &str) -> Self {
        Self::with_log_file(log_file_path(command))
    }

    pub(super) const fn with_log_file(log_file: Option<PathBuf>) -> Self {
        Self {
            fragments: Mutex::new(Vec::new()),
            log_file,
        }
    }

    /// The log file named in the summary, if any.
    #[must_use]
    pub fn log_path(&self) -> Option<&Path> {
        self.log_file.as_deref()
    }

    /// Return a clone of all recorded entries.
    #[must_use]
    pub fn fragment_entries(&self) -> Vec<FragmentEntry> {
        self.fragments.lock().map_or_else(|_| vec![], |g| g.clone())
    }

    /// Count the number of failed plugins.
    #[must_use]
    pub fn failure_count(&self) -> usize {
        self.fragments.lock().map_or(0, |guard| {
            guard
                .iter()
                .filter(|t| t.status == FragmentStatus::Failed)
                .count()
        })
    }

    /// Log one line per recorded plugin, then the totals.
    pub fn print_summary(&self) {
        let fragments = self.fragment_entries();
        if fragments.is_empty() {
            return;
        }

        self.stage("Summary");
        for entry in &fragments {
            let suffix = entry
                .message
                .as_ref()
                .map_or_else(String::new, |msg| format!(" ({msg})"));
            tracing::info!(
                target: SUMMARY_TARGET,
                status = entry.status.label(),
                "{}{suffix}",
                entry.name
            );
        }

        let count = |status| fragments.iter().filter(|e| e.status == status).count();
        self.info(&format!(
            "{} fragments: {} changed, {} unchanged, {} skipped, {} dry-run, {} failed",
            fragments.len(),
            count(FragmentStatus::Changed),
            count(FragmentStatus::Unchanged),
            count(FragmentStatus::Skipped),
            count(FragmentStatus::DryRun),
            count(FragmentStatus::Failed),
        ));
        if let Some(path) = &self.log_file {
            self.debug(&format!("log: {}", path.display()));
        }
    }
}

impl Log for Logger {
    fn stage(&self, msg: &str) {
        tracing::info!(target: STAGE_TARGET, "{msg}");
    }

    fn info(&self, msg: &str) {
        tracing::info!("{msg}");
    }

    fn debug(&self, msg: &str) {
        tracing::debug!("{msg}");
    }

    fn warn(&self, msg: &str) {
        tracing::warn!("{msg}");
    }

    fn error(&self, msg: &str) {
        tracing::error!("{msg}");
    }

    fn dry_run(&self, msg: &str) {
        tracing::info!(target: DRY_RUN_TARGET, "{msg}");
    }

    fn record_fragment(&self, name: &str, status: FragmentStatus, message: Option<&str>) {
        if let Ok(mut guard) = self.fragments.lock() {
            guard.push(FragmentEntry {
                name: name.to_string(),
                status,
                message: message.map(String::from),
            });
        }
    }
}
