//! Single-fragment processing: check state, then write or remove one fragment.

use super::Context;
use crate::error::{CollaboratorError, ReconcileError};
use crate::logging::FragmentStatus;
use crate::reconcile::Reconciliation;
use crate::resources::fragment::FragmentFile;
use crate::resources::{Resource, ResourceChange, ResourceState};

/// Outcome of materializing one fragment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) struct Outcome {
    pub status: FragmentStatus,
    pub message: Option<String>,
}

impl Outcome {
    const fn new(status: FragmentStatus) -> Self {
        Self {
            status,
            message: None,
        }
    }

    fn with_message(status: FragmentStatus, message: impl Into<String>) -> Self {
        Self {
            status,
            message: Some(message.into()),
        }
    }

    /// Whether the on-disk fragment changed (or would change in a dry run).
    pub const fn changed(&self) -> bool {
        matches!(self.status, FragmentStatus::Changed | FragmentStatus::DryRun)
    }
}

/// Bring one fragment to its target state.
///
/// `install` caches the installer result so the collaborator is asked at
/// most once per run, and only once a fragment actually requires it.
pub(super) fn materialize(
    ctx: &Context,
    rec: &Reconciliation,
    install: &mut Option<Result<(), CollaboratorError>>,
) -> Result<Outcome, ReconcileError> {
    if let Some(handle) = rec.requires().next() {
        ctx.log.debug(&format!("{}: requires {handle}", rec.name));
        install
            .get_or_insert_with(|| ctx.installer.ensure_installed())
            .clone()?;
    }

    let resource = FragmentFile::from(&rec.fragment);
    let outcome = converge(ctx, &resource).map_err(|e| ReconcileError::Io {
        path: rec.fragment.path.clone(),
        message: format!("{e:#}"),
    })?;
    if outcome.status == FragmentStatus::Changed
        && let Some(digest) = rec.fragment.digest()
    {
        ctx.log
            .debug(&format!("{} sha256={digest}", resource.description()));
    }
    Ok(outcome)
}

/// Check `resource`, then report (dry run) or apply the pending change.
fn converge(ctx: &Context, resource: &impl Resource) -> anyhow::Result<Outcome> {
    let desc = resource.description();
    let state = resource.current_state()?;
    ctx.log.debug(&format!("{desc} state={state:?}"));

    if let ResourceState::Blocked { reason } = state {
        ctx.log.warn(&format!("skipping {desc}: {reason}"));
        return Ok(Outcome::with_message(FragmentStatus::Skipped, reason));
    }
    let Some(verb) = state.pending_verb() else {
        ctx.log.debug(&format!("ok: {desc}"));
        return Ok(Outcome::new(FragmentStatus::Unchanged));
    };
    if ctx.dry_run {
        ctx.log.dry_run(&format!("would {verb}: {desc}"));
        return Ok(Outcome::new(FragmentStatus::DryRun));
    }

    match resource.apply()? {
        ResourceChange::Written => {
            ctx.log.info(&format!("write: {desc}"));
            Ok(Outcome::new(FragmentStatus::Changed))
        }
        ResourceChange::Removed => {
            ctx.log.info(&format!("remove: {desc}"));
            Ok(Outcome::new(FragmentStatus::Changed))
        }
        ResourceChange::Unchanged => Ok(Outcome::new(FragmentStatus::Unchanged)),
        ResourceChange::Skipped { reason } => {
            ctx.log.warn(&format!("failed to {verb} {desc}: {reason}"));
            Ok(Outcome::with_message(FragmentStatus::Skipped, reason))
        }
    }
}
