#![allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::wildcard_imports,
    clippy::indexing_slicing
)]
//! Integration tests for the `apply` command.
//!
//! These tests drive [`apply_manifest`] against a real manifest and a
//! temporary fragment directory, checking what lands on disk and how the
//! install and service collaborators are used.

mod common;

use common::TestContextBuilder;
use telegraf_conf::cli::ApplyOpts;
use telegraf_conf::commands::apply::apply_manifest;
use telegraf_conf::logging::FragmentStatus;

const MANIFEST: &str = r#"
[processors.my_regex]
plugin_type = "regex"

[[processors.my_regex.options]]
[[processors.my_regex.options.tags]]
key = "foo"
pattern = '^a*b+\d$'
replacement = "c${1}d"

[inputs.cpu]
plugin_type = "cpu"

[[inputs.cpu.options]]
percpu = true
totalcpu = false
"#;

fn opts() -> ApplyOpts {
    ApplyOpts {
        dry_run: false,
        no_restart: true,
        only: Vec::new(),
    }
}

// ---------------------------------------------------------------------------
// Writing fragments
// ---------------------------------------------------------------------------

#[test]
fn apply_writes_every_fragment() {
    let env = TestContextBuilder::new().with_manifest(MANIFEST).build();
    let (ctx, log) = env.context(false);

    let report = apply_manifest(&env.setup(), &opts(), &ctx).unwrap();

    assert_eq!(report.stats.changed, 2);
    assert_eq!(log.failure_count(), 0);
    assert_eq!(
        env.read_fragment("cpu").unwrap(),
        "[[inputs.cpu]]\npercpu = true\ntotalcpu = false\n"
    );
    let regex = env.read_fragment("my_regex").unwrap();
    assert!(regex.contains("[[processors.regex.tags]]"));
    assert!(regex.contains(r#"pattern = "^a*b+\\d$""#));
    assert!(regex.contains(r#"replacement = "c${1}d""#));
}

#[test]
fn apply_checks_install_once_and_notifies_once() {
    let env = TestContextBuilder::new().with_manifest(MANIFEST).build();
    let (ctx, _log) = env.context(false);

    apply_manifest(&env.setup(), &opts(), &ctx).unwrap();

    assert_eq!(env.installer.calls(), 1);
    assert_eq!(env.service.requests(), 1);
}

#[test]
fn apply_is_idempotent() {
    let env = TestContextBuilder::new().with_manifest(MANIFEST).build();
    let (ctx, _log) = env.context(false);
    apply_manifest(&env.setup(), &opts(), &ctx).unwrap();
    let first = env.read_fragment("my_regex").unwrap();

    let (ctx, log) = env.context(false);
    let report = apply_manifest(&env.setup(), &opts(), &ctx).unwrap();

    assert_eq!(report.stats.changed, 0);
    assert_eq!(report.stats.already_ok, 2);
    assert!(report.notified.is_none());
    assert_eq!(env.service.requests(), 1, "no second notification");
    assert_eq!(env.read_fragment("my_regex").unwrap(), first);
    assert!(
        log.fragment_entries()
            .iter()
            .all(|e| e.status == FragmentStatus::Unchanged)
    );
}

#[test]
fn apply_rewrites_drifted_fragment() {
    let env = TestContextBuilder::new()
        .with_manifest(MANIFEST)
        .with_fragment("cpu", "[[inputs.cpu]]\npercpu = false\n")
        .build();
    let (ctx, _log) = env.context(false);

    apply_manifest(&env.setup(), &opts(), &ctx).unwrap();

    assert_eq!(
        env.read_fragment("cpu").unwrap(),
        "[[inputs.cpu]]\npercpu = true\ntotalcpu = false\n"
    );
}

// ---------------------------------------------------------------------------
// Removal
// ---------------------------------------------------------------------------

#[test]
fn ambient_absent_removes_all_fragments() {
    let env = TestContextBuilder::new()
        .with_manifest(&format!("[agent]\nensure = \"absent\"\n{MANIFEST}"))
        .with_fragment("cpu", "[[inputs.cpu]]\n")
        .build();
    let (ctx, _log) = env.context(false);

    let report = apply_manifest(&env.setup(), &opts(), &ctx).unwrap();

    assert!(!env.fragment("cpu").exists());
    assert!(!env.fragment("my_regex").exists());
    assert_eq!(report.stats.changed, 1);
    assert_eq!(report.stats.already_ok, 1);
    assert_eq!(env.installer.calls(), 0, "removal needs no install");
    assert_eq!(env.service.requests(), 0, "removal sends no notification");
}

#[test]
fn plugin_absent_removes_only_that_fragment() {
    let env = TestContextBuilder::new()
        .with_manifest(
            "[inputs.cpu]\nplugin_type = \"cpu\"\nensure = \"absent\"\n\n[inputs.mem]\nplugin_type = \"mem\"\n",
        )
        .with_fragment("cpu", "[[inputs.cpu]]\n")
        .build();
    let (ctx, _log) = env.context(false);

    apply_manifest(&env.setup(), &opts(), &ctx).unwrap();

    assert!(!env.fragment("cpu").exists());
    assert_eq!(env.read_fragment("mem").unwrap(), "[[inputs.mem]]\n");
}

// ---------------------------------------------------------------------------
// Dry run and filtering
// ---------------------------------------------------------------------------

#[test]
fn dry_run_touches_nothing() {
    let env = TestContextBuilder::new().with_manifest(MANIFEST).build();
    let (ctx, log) = env.context(true);
    let mut opts = opts();
    opts.dry_run = true;

    let report = apply_manifest(&env.setup(), &opts, &ctx).unwrap();

    assert_eq!(report.stats.changed, 2);
    assert!(!env.config_dir().exists());
    assert_eq!(env.service.requests(), 0);
    assert!(
        log.fragment_entries()
            .iter()
            .all(|e| e.status == FragmentStatus::DryRun)
    );
}

#[test]
fn only_limits_the_run() {
    let env = TestContextBuilder::new().with_manifest(MANIFEST).build();
    let (ctx, _log) = env.context(false);
    let mut opts = opts();
    opts.only = vec!["cpu".to_string()];

    apply_manifest(&env.setup(), &opts, &ctx).unwrap();

    assert!(env.fragment("cpu").exists());
    assert!(!env.fragment("my_regex").exists());
}

#[test]
fn only_with_unknown_plugin_fails_before_writing() {
    let env = TestContextBuilder::new().with_manifest(MANIFEST).build();
    let (ctx, _log) = env.context(false);
    let mut opts = opts();
    opts.only = vec!["disk".to_string()];

    assert!(apply_manifest(&env.setup(), &opts, &ctx).is_err());
    assert!(!env.config_dir().exists());
}

// ---------------------------------------------------------------------------
// Failures
// ---------------------------------------------------------------------------

#[test]
fn invalid_plugin_does_not_block_others() {
    let env = TestContextBuilder::new()
        .with_manifest(&format!(
            "{MANIFEST}\n[processors.broken]\noptions = {{ matrix = [[1, 2], [3]] }}\n"
        ))
        .build();
    let (ctx, log) = env.context(false);

    let report = apply_manifest(&env.setup(), &opts(), &ctx).unwrap();

    assert_eq!(report.stats.failed, 1);
    assert_eq!(report.stats.changed, 2);
    let failed: Vec<_> = log
        .fragment_entries()
        .into_iter()
        .filter(|e| e.status == FragmentStatus::Failed)
        .collect();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].name, "broken");
    assert!(!env.fragment("broken").exists());
}

#[test]
fn misspelled_ensure_fails_only_that_plugin() {
    let env = TestContextBuilder::new()
        .with_manifest(&format!(
            "{MANIFEST}\n[processors.typo]\nplugin_type = \"dedup\"\nensure = \"abesnt\"\n"
        ))
        .build();
    let (ctx, log) = env.context(false);

    let report = apply_manifest(&env.setup(), &opts(), &ctx).unwrap();

    assert_eq!(report.stats.failed, 1);
    assert_eq!(report.stats.changed, 2);
    assert!(env.fragment("cpu").exists());
    assert!(env.fragment("my_regex").exists());
    assert!(!env.fragment("typo").exists());
    let failed: Vec<_> = log
        .fragment_entries()
        .into_iter()
        .filter(|e| e.status == FragmentStatus::Failed)
        .collect();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].name, "typo");
    assert!(
        failed[0]
            .message
            .as_deref()
            .is_some_and(|m| m.contains("typo.ensure")),
        "{:?}",
        failed[0].message
    );
}

#[test]
fn failed_install_writes_nothing() {
    let env = TestContextBuilder::new()
        .with_manifest(MANIFEST)
        .with_failing_installer()
        .build();
    let (ctx, log) = env.context(false);

    let report = apply_manifest(&env.setup(), &opts(), &ctx).unwrap();

    assert_eq!(report.stats.failed, 2);
    assert_eq!(env.installer.calls(), 1, "install result is cached");
    assert_eq!(log.failure_count(), 2);
    assert!(!env.config_dir().exists());
    assert_eq!(env.service.requests(), 0);
}
