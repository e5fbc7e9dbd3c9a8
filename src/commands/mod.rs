//! Top-level subcommand orchestration.
pub mod apply;
pub mod plan;
pub mod render;
pub mod version;

use anyhow::{Context as _, Result};

use crate::cli::GlobalOpts;
use crate::config::{Ensure, Manifest};
use crate::logging::Log;
use crate::platform::{FixedDir, OsFamily, PathResolver, StandardPaths};
use crate::reconcile::Reconciler;

/// Shared state produced by the common command setup sequence.
///
/// Loads the manifest and resolves the OS family and fragment directory.
/// CLI flags win over `[agent]` settings, which win over detection.
pub struct CommandSetup {
    /// Loaded manifest.
    pub manifest: Manifest,
    /// Resolved OS family.
    pub family: OsFamily,
    resolver: Box<dyn PathResolver>,
}

impl std::fmt::Debug for CommandSetup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandSetup")
            .field("manifest", &self.manifest.path)
            .field("family", &self.family)
            .field("config_dir", &self.resolver.config_dir(self.family))
            .finish()
    }
}

impl CommandSetup {
    /// Load the manifest and resolve family and fragment directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the manifest cannot be loaded or an OS family
    /// value is not recognised.
    pub fn init(global: &GlobalOpts, log: &dyn Log) -> Result<Self> {
        log.stage("Loading manifest");
        let manifest = Manifest::load(&global.manifest)?;
        log.info(&format!(
            "{}: {} plugin(s), agent {}",
            manifest.path.display(),
            manifest.plugins.len(),
            manifest.agent.ensure
        ));

        let family = match &global.os_family {
            Some(raw) => raw
                .parse()
                .with_context(|| format!("invalid --os-family '{raw}'"))?,
            None => manifest.os_family()?.unwrap_or_else(OsFamily::detect),
        };

        let resolver: Box<dyn PathResolver> = match global
            .config_dir
            .as_ref()
            .or(manifest.agent.config_dir.as_ref())
        {
            Some(dir) => Box::new(FixedDir(dir.clone())),
            None => Box::new(StandardPaths),
        };

        log.debug(&format!(
            "os family {family}, config dir {}",
            resolver.config_dir(family).display()
        ));

        Ok(Self {
            manifest,
            family,
            resolver,
        })
    }

    /// Ambient state of the agent.
    #[must_use]
    pub const fn ambient(&self) -> Ensure {
        self.manifest.agent.ensure
    }

    /// Build a reconciler for the resolved environment.
    #[must_use]
    pub fn reconciler(&self) -> Reconciler<'_> {
        Reconciler::new(self.resolver.as_ref(), self.family, self.ambient())
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::logging::Logger;
    use std::path::{Path, PathBuf};

    fn opts(manifest: &Path) -> GlobalOpts {
        GlobalOpts {
            manifest: manifest.to_path_buf(),
            os_family: None,
            config_dir: None,
        }
    }

    fn write_manifest(dir: &Path, content: &str) -> PathBuf {
        let path = dir.join("telegraf-conf.toml");
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn missing_manifest_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let log = Logger::new("test");
        let err = CommandSetup::init(&opts(&dir.path().join("nope.toml")), &log).unwrap_err();
        assert!(err.to_string().contains("nope.toml"), "{err}");
    }

    #[test]
    fn manifest_agent_settings_apply() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_manifest(
            dir.path(),
            "[agent]\nos_family = \"freebsd\"\nconfig_dir = \"/srv/telegraf.d\"\n",
        );
        let setup = CommandSetup::init(&opts(&path), &Logger::new("test")).unwrap();
        assert_eq!(setup.family, OsFamily::FreeBSD);
        assert_eq!(
            setup.reconciler().config_dir(),
            PathBuf::from("/srv/telegraf.d")
        );
    }

    #[test]
    fn cli_flags_override_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_manifest(
            dir.path(),
            "[agent]\nos_family = \"freebsd\"\nconfig_dir = \"/srv/telegraf.d\"\n",
        );
        let mut global = opts(&path);
        global.os_family = Some("windows".to_string());
        global.config_dir = Some(dir.path().to_path_buf());
        let setup = CommandSetup::init(&global, &Logger::new("test")).unwrap();
        assert_eq!(setup.family, OsFamily::Windows);
        assert_eq!(setup.reconciler().config_dir(), dir.path());
    }

    #[test]
    fn standard_paths_when_no_override() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_manifest(dir.path(), "[agent]\nos_family = \"darwin\"\n");
        let setup = CommandSetup::init(&opts(&path), &Logger::new("test")).unwrap();
        assert_eq!(
            setup.reconciler().config_dir(),
            PathBuf::from("/usr/local/etc/telegraf/telegraf.d")
        );
        assert_eq!(setup.ambient(), Ensure::Present);
    }

    #[test]
    fn invalid_os_family_flag_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_manifest(dir.path(), "");
        let mut global = opts(&path);
        global.os_family = Some("plan9".to_string());
        let err = CommandSetup::init(&global, &Logger::new("test")).unwrap_err();
        assert!(format!("{err:#}").contains("plan9"));
    }
}
