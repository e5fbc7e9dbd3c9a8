// Shared helpers for integration tests.
//
// Provides a temporary-directory-backed manifest and fragment directory plus
// a fluent builder so each integration test can set up an isolated
// environment without repeating filesystem boilerplate.
//
// Used by all integration test binaries that declare `mod common;`.
#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use telegraf_conf::agent::{Installer, NoRestart, Service};
use telegraf_conf::cli::GlobalOpts;
use telegraf_conf::commands::CommandSetup;
use telegraf_conf::error::CollaboratorError;
use telegraf_conf::logging::{Log, Logger};
use telegraf_conf::processing::Context;

/// Installer that counts calls and optionally fails.
#[derive(Debug, Default)]
pub struct CountingInstaller {
    calls: AtomicUsize,
    fail: bool,
}

impl CountingInstaller {
    /// An installer whose check always fails.
    pub fn failing() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            fail: true,
        }
    }

    /// Number of `ensure_installed` calls so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Installer for CountingInstaller {
    fn ensure_installed(&self) -> Result<(), CollaboratorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            Err(CollaboratorError::Install {
                reason: "telegraf not found on PATH".to_string(),
            })
        } else {
            Ok(())
        }
    }
}

/// An isolated manifest plus fragment directory backed by a
/// [`tempfile::TempDir`].
pub struct IntegrationTestContext {
    /// Temporary directory holding the manifest and `telegraf.d/`.
    pub root: tempfile::TempDir,
    /// Install collaborator shared with every [`Context`] built here.
    pub installer: Arc<CountingInstaller>,
    /// Service collaborator shared with every [`Context`] built here.
    pub service: Arc<NoRestart>,
}

impl IntegrationTestContext {
    /// Path to the manifest file.
    pub fn manifest_path(&self) -> PathBuf {
        self.root.path().join("telegraf-conf.toml")
    }

    /// Fragment directory.
    pub fn config_dir(&self) -> PathBuf {
        self.root.path().join("telegraf.d")
    }

    /// Path of the fragment for plugin `name`.
    pub fn fragment(&self, name: &str) -> PathBuf {
        self.config_dir().join(format!("{name}.conf"))
    }

    /// Read the fragment for plugin `name`, if it exists.
    pub fn read_fragment(&self, name: &str) -> Option<String> {
        std::fs::read_to_string(self.fragment(name)).ok()
    }

    /// Replace the manifest content.
    pub fn write_manifest(&self, content: &str) {
        std::fs::write(self.manifest_path(), content).expect("write manifest");
    }

    /// Global options pointing at this context, for the Linux family.
    pub fn global_opts(&self) -> GlobalOpts {
        GlobalOpts {
            manifest: self.manifest_path(),
            os_family: Some("linux".to_string()),
            config_dir: Some(self.config_dir()),
        }
    }

    /// Load the manifest and resolve the environment.
    pub fn setup(&self) -> CommandSetup {
        CommandSetup::init(&self.global_opts(), &Logger::new("test")).expect("command setup")
    }

    /// Materialization context using this context's collaborators.
    pub fn context(&self, dry_run: bool) -> (Context, Arc<Logger>) {
        let log = Arc::new(Logger::new("test"));
        let ctx = Context {
            log: Arc::clone(&log) as Arc<dyn Log>,
            dry_run,
            installer: Arc::clone(&self.installer) as Arc<dyn Installer>,
            service: Arc::clone(&self.service) as Arc<dyn Service>,
        };
        (ctx, log)
    }
}

/// Fluent builder for [`IntegrationTestContext`].
pub struct TestContextBuilder {
    ctx: IntegrationTestContext,
}

impl TestContextBuilder {
    /// Begin building a context with an empty manifest.
    pub fn new() -> Self {
        let root = tempfile::tempdir().expect("create temp dir");
        let ctx = IntegrationTestContext {
            root,
            installer: Arc::new(CountingInstaller::default()),
            service: Arc::new(NoRestart::default()),
        };
        ctx.write_manifest("");
        Self { ctx }
    }

    /// Use `content` as the manifest.
    pub fn with_manifest(self, content: &str) -> Self {
        self.ctx.write_manifest(content);
        self
    }

    /// Pre-create a fragment file with `content`.
    pub fn with_fragment(self, name: &str, content: &str) -> Self {
        let path = self.ctx.fragment(name);
        create_parent(&path);
        std::fs::write(&path, content).expect("write fragment");
        self
    }

    /// Make the install check fail.
    pub fn with_failing_installer(mut self) -> Self {
        self.ctx.installer = Arc::new(CountingInstaller::failing());
        self
    }

    /// Finish building and return the configured context.
    pub fn build(self) -> IntegrationTestContext {
        self.ctx
    }
}

fn create_parent(path: &Path) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("create parent dir");
    }
}
