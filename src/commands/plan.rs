//! Command: report what each plugin reconciles to, without touching disk.
use std::fmt::Write as _;

use anyhow::Result;
use serde::Serialize;

use super::CommandSetup;
use crate::cli::{GlobalOpts, PlanOpts};
use crate::error::ValidationError;
use crate::logging::Log;
use crate::reconcile::Reconciliation;
use crate::resources::Resource;
use crate::resources::fragment::FragmentFile;

/// One plugin's line in the plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanEntry {
    /// Plugin name.
    pub name: String,
    /// Reconciliation, when the plugin is valid.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reconciliation: Option<Reconciliation>,
    /// Whether applying would write or remove the fragment.
    pub would_change: bool,
    /// Why the plugin cannot be reconciled or inspected.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PlanEntry {
    fn from_result(name: String, result: Result<Reconciliation, ValidationError>) -> Self {
        match result {
            Ok(rec) => match FragmentFile::from(&rec.fragment).current_state() {
                Ok(state) => Self {
                    name,
                    reconciliation: Some(rec),
                    would_change: state.needs_change(),
                    error: None,
                },
                Err(e) => Self {
                    name,
                    reconciliation: Some(rec),
                    would_change: false,
                    error: Some(format!("{e:#}")),
                },
            },
            Err(e) => Self {
                name,
                reconciliation: None,
                would_change: false,
                error: Some(e.to_string()),
            },
        }
    }
}

/// Reconcile every manifest plugin and compare against disk.
#[must_use]
pub fn build(setup: &CommandSetup) -> Vec<PlanEntry> {
    setup
        .reconciler()
        .reconcile_plugins(&setup.manifest.plugins)
        .into_iter()
        .map(|(name, result)| PlanEntry::from_result(name, result))
        .collect()
}

/// Human-readable plan.
///
/// One line per plugin: `+` write, `-` remove, `=` unchanged, `!` error.
/// Present fragments list their edges underneath.
#[must_use]
pub fn format_text(entries: &[PlanEntry]) -> String {
    let mut out = String::new();
    for entry in entries {
        let Some(rec) = &entry.reconciliation else {
            let error = entry.error.as_deref().unwrap_or_default();
            writeln!(out, "! {}: {error}", entry.name).unwrap_or(());
            continue;
        };
        let marker = match (&entry.error, entry.would_change, rec.fragment.is_present()) {
            (Some(_), _, _) => '!',
            (None, false, _) => '=',
            (None, true, true) => '+',
            (None, true, false) => '-',
        };
        writeln!(
            out,
            "{marker} {} ({}) {}",
            entry.name,
            rec.kind,
            rec.fragment.path.display()
        )
        .unwrap_or(());
        if let Some(error) = &entry.error {
            writeln!(out, "    {error}").unwrap_or(());
        }
        for handle in rec.requires() {
            writeln!(out, "    requires {handle}").unwrap_or(());
        }
        for handle in rec.notifies() {
            writeln!(out, "    notifies {handle}").unwrap_or(());
        }
    }
    out
}

/// Run the plan command.
///
/// # Errors
///
/// Returns an error if the manifest cannot be loaded, JSON encoding fails,
/// or any plugin cannot be reconciled.
pub fn run(global: &GlobalOpts, opts: &PlanOpts, log: &dyn Log) -> Result<()> {
    let setup = CommandSetup::init(global, log)?;

    log.stage("Reconciling plugins");
    let entries = build(&setup);
    let changes = entries.iter().filter(|e| e.would_change).count();
    let errors = entries.iter().filter(|e| e.error.is_some()).count();
    log.info(&format!(
        "{} plugin(s), {changes} would change",
        entries.len()
    ));

    if opts.json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
    } else {
        print!("{}", format_text(&entries));
    }

    if errors > 0 {
        anyhow::bail!("{errors} plugin(s) failed");
    }
    Ok(())
}
