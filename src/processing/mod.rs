//! Materialization: apply reconciliations to disk, then notify the service.
//!
//! Fragments are processed sequentially in input order. Per batch, the
//! installer is asked at most once (before the first fragment that requires
//! it) and the service is notified at most once (after all fragments, and
//! only if some notifying fragment changed).

mod apply;

use std::fmt;
use std::sync::Arc;

use crate::agent::{Installer, Service};
use crate::error::{ReconcileError, ValidationError};
use crate::logging::{FragmentStatus, Log};
use crate::reconcile::{CollaboratorHandle, Reconciliation};

/// Shared context for materialization.
pub struct Context {
    /// Logger for output and per-plugin recording.
    pub log: Arc<dyn Log>,
    /// Whether to preview changes without applying them.
    pub dry_run: bool,
    /// Install collaborator required before present fragments are written.
    pub installer: Arc<dyn Installer>,
    /// Service collaborator notified when fragments change.
    pub service: Arc<dyn Service>,
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("log", &"<dyn Log>")
            .field("dry_run", &self.dry_run)
            .field("installer", &"<dyn Installer>")
            .field("service", &"<dyn Service>")
            .finish()
    }
}

/// Counters for one materialization run.
///
/// # Examples
///
/// ```
/// use telegraf_conf::processing::FragmentStats;
///
/// let stats = FragmentStats { changed: 2, already_ok: 3, ..FragmentStats::default() };
/// assert_eq!(stats.summary(false), "2 changed, 3 already ok");
/// assert_eq!(stats.summary(true), "2 would change, 3 already ok");
///
/// let stats = FragmentStats { changed: 1, already_ok: 0, skipped: 1, failed: 2 };
/// assert_eq!(stats.summary(false), "1 changed, 0 already ok, 1 skipped, 2 failed");
/// ```
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FragmentStats {
    /// Fragments written or removed (or that would be, in a dry run).
    pub changed: u32,
    /// Fragments already in their target state.
    pub already_ok: u32,
    /// Fragments left alone because their target cannot be managed.
    pub skipped: u32,
    /// Plugins that failed validation, I/O, or a collaborator step.
    pub failed: u32,
}

impl FragmentStats {
    /// Format the summary string (e.g. "3 changed, 10 already ok, 1 failed").
    #[must_use]
    pub fn summary(&self, dry_run: bool) -> String {
        let verb = if dry_run { "would change" } else { "changed" };
        let mut out = format!("{} {verb}, {} already ok", self.changed, self.already_ok);
        if self.skipped > 0 {
            out.push_str(&format!(", {} skipped", self.skipped));
        }
        if self.failed > 0 {
            out.push_str(&format!(", {} failed", self.failed));
        }
        out
    }

    fn count(&mut self, status: FragmentStatus) {
        match status {
            FragmentStatus::Changed | FragmentStatus::DryRun => self.changed += 1,
            FragmentStatus::Unchanged => self.already_ok += 1,
            FragmentStatus::Skipped => self.skipped += 1,
            FragmentStatus::Failed => self.failed += 1,
        }
    }
}

/// Result of [`process_all`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplyReport {
    /// Per-fragment counters.
    pub stats: FragmentStats,
    /// Service handle that was notified (or would be, in a dry run).
    pub notified: Option<CollaboratorHandle>,
}

/// Materialize a batch of reconciliation results.
///
/// Every plugin is recorded on the logger. A failed plugin never stops the
/// others. A failing service notification is recorded as a failure under
/// the service handle's name.
pub fn process_all<I>(ctx: &Context, results: I) -> ApplyReport
where
    I: IntoIterator<Item = (String, Result<Reconciliation, ValidationError>)>,
{
    let mut stats = FragmentStats::default();
    let mut install = None;
    let mut notify: Option<CollaboratorHandle> = None;

    for (name, result) in results {
        let outcome = result
            .map_err(ReconcileError::from)
            .and_then(|rec| apply::materialize(ctx, &rec, &mut install).map(|o| (rec, o)));
        match outcome {
            Ok((rec, outcome)) => {
                if outcome.changed()
                    && notify.is_none()
                    && let Some(handle) = rec.notifies().next()
                {
                    notify = Some(handle.clone());
                }
                stats.count(outcome.status);
                ctx.log
                    .record_fragment(&name, outcome.status, outcome.message.as_deref());
            }
            Err(e) => {
                ctx.log.error(&format!("{name}: {e}"));
                stats.count(FragmentStatus::Failed);
                ctx.log
                    .record_fragment(&name, FragmentStatus::Failed, Some(&e.to_string()));
            }
        }
    }

    if let Some(handle) = &notify {
        notify_service(ctx, handle, &mut stats);
    }

    ApplyReport {
        stats,
        notified: notify,
    }
}

fn notify_service(ctx: &Context, handle: &CollaboratorHandle, stats: &mut FragmentStats) {
    if ctx.dry_run {
        ctx.log.dry_run(&format!("would notify {handle}"));
        return;
    }
    ctx.log.info(&format!("notify {handle}"));
    if let Err(e) = ctx.service.notify() {
        ctx.log.error(&format!("{handle}: {e}"));
        stats.count(FragmentStatus::Failed);
        ctx.log
            .record_fragment(handle.as_str(), FragmentStatus::Failed, Some(&e.to_string()));
    }
}
