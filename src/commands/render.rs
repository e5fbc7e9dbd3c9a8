//! Command: print one plugin's rendered fragment.
use anyhow::{Context as _, Result};

use super::CommandSetup;
use crate::cli::{GlobalOpts, RenderOpts};
use crate::logging::Log;

/// Render the named plugin's fragment content.
///
/// # Errors
///
/// Returns an error if the plugin is not declared, is invalid, or resolves
/// to an absent fragment.
pub fn render_plugin(setup: &CommandSetup, name: &str) -> Result<String> {
    let raw = setup
        .manifest
        .find(name)
        .with_context(|| format!("plugin '{name}' is not declared in {}", setup.manifest.path.display()))?;
    let decl = raw.declaration()?;
    let rec = setup.reconciler().reconcile(&decl)?;
    rec.fragment
        .content()
        .map(String::from)
        .with_context(|| format!("plugin '{name}' is absent; nothing to render"))
}

/// Run the render command.
///
/// # Errors
///
/// Returns an error if the manifest cannot be loaded or the plugin cannot
/// be rendered.
pub fn run(global: &GlobalOpts, opts: &RenderOpts, log: &dyn Log) -> Result<()> {
    let setup = CommandSetup::init(global, log)?;
    let content = render_plugin(&setup, &opts.name)?;
    print!("{content}");
    Ok(())
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::logging::Logger;
    use std::path::Path;

    fn setup(dir: &Path, manifest: &str) -> CommandSetup {
        let path = dir.join("telegraf-conf.toml");
        std::fs::write(&path, manifest).unwrap();
        let global = GlobalOpts {
            manifest: path,
            os_family: None,
            config_dir: Some(dir.to_path_buf()),
        };
        CommandSetup::init(&global, &Logger::new("test")).unwrap()
    }

    #[test]
    fn renders_declared_plugin() {
        let dir = tempfile::tempdir().unwrap();
        let setup = setup(
            dir.path(),
            "[outputs.file]\nplugin_type = \"file\"\n\n[[outputs.file.options]]\nfiles = [\"stdout\"]\n",
        );
        insta::assert_snapshot!(render_plugin(&setup, "file").unwrap(), @r#"
        [[outputs.file]]
        files = ["stdout"]
        "#);
    }

    #[test]
    fn unknown_plugin_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let setup = setup(dir.path(), "");
        let err = render_plugin(&setup, "ghost").unwrap_err();
        assert!(err.to_string().contains("'ghost' is not declared"));
    }

    #[test]
    fn absent_plugin_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let setup = setup(dir.path(), "[inputs.cpu]\nensure = \"absent\"\n");
        let err = render_plugin(&setup, "cpu").unwrap_err();
        assert!(err.to_string().contains("absent"));
    }

    #[test]
    fn ambient_absent_renders_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let setup = setup(
            dir.path(),
            "[agent]\nensure = \"absent\"\n\n[inputs.cpu]\nplugin_type = \"cpu\"\n",
        );
        assert!(render_plugin(&setup, "cpu").is_err());
    }

    #[test]
    fn invalid_plugin_reports_validation_error() {
        let dir = tempfile::tempdir().unwrap();
        let setup = setup(dir.path(), "[inputs.cpu]\noptions = { a = 1 }\n");
        let err = render_plugin(&setup, "cpu").unwrap_err();
        assert!(err.to_string().contains("no plugin_type"));
    }
}
