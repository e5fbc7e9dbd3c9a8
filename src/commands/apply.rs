//! Command: write and remove fragments, then restart the agent if needed.
use std::sync::Arc;

use anyhow::Result;

use super::CommandSetup;
use crate::agent::{AgentInstall, AgentService, NoRestart, Service};
use crate::cli::{ApplyOpts, GlobalOpts};
use crate::config::RawPlugin;
use crate::exec::{Executor, SystemExecutor};
use crate::logging::{Log, Logger};
use crate::processing::{self, ApplyReport, Context};

/// Restrict `plugins` to the names in `only` (all plugins when empty).
///
/// # Errors
///
/// Returns an error naming every requested plugin that is not declared.
pub fn select<'a>(plugins: &'a [RawPlugin], only: &[String]) -> Result<Vec<&'a RawPlugin>> {
    if only.is_empty() {
        return Ok(plugins.iter().collect());
    }
    let unknown: Vec<&str> = only
        .iter()
        .filter(|name| !plugins.iter().any(|p| &p.name == *name))
        .map(String::as_str)
        .collect();
    if !unknown.is_empty() {
        anyhow::bail!("unknown plugin(s): {}", unknown.join(", "));
    }
    Ok(plugins
        .iter()
        .filter(|p| only.contains(&p.name))
        .collect())
}

/// Reconcile the selected plugins and materialize them through `ctx`.
///
/// # Errors
///
/// Returns an error if `--only` names an undeclared plugin.
pub fn apply_manifest(setup: &CommandSetup, opts: &ApplyOpts, ctx: &Context) -> Result<ApplyReport> {
    let selected: Vec<RawPlugin> = select(&setup.manifest.plugins, &opts.only)?
        .into_iter()
        .cloned()
        .collect();

    ctx.log.stage("Reconciling plugins");
    let results = setup.reconciler().reconcile_plugins(&selected);
    ctx.log.debug(&format!("{} reconciliation(s)", results.len()));

    ctx.log.stage("Applying fragments");
    let report = processing::process_all(ctx, results);
    ctx.log.info(&report.stats.summary(ctx.dry_run));
    Ok(report)
}

/// Run the apply command.
///
/// # Errors
///
/// Returns an error if the manifest cannot be loaded or any plugin failed.
pub fn run(global: &GlobalOpts, opts: &ApplyOpts, log: &Arc<Logger>) -> Result<()> {
    let setup = CommandSetup::init(global, log.as_ref())?;

    let executor: Arc<dyn Executor> = Arc::new(SystemExecutor);
    let service: Arc<dyn Service> = if opts.no_restart {
        Arc::new(NoRestart::default())
    } else {
        Arc::new(AgentService::new(setup.family, Arc::clone(&executor)))
    };
    let ctx = Context {
        log: Arc::clone(log) as Arc<dyn Log>,
        dry_run: opts.dry_run,
        installer: Arc::new(AgentInstall::new(executor)),
        service,
    };

    apply_manifest(&setup, opts, &ctx)?;
    log.print_summary();

    let count = log.failure_count();
    if count > 0 {
        anyhow::bail!("{count} plugin(s) failed");
    }
    Ok(())
}
