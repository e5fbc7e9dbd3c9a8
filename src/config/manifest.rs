//! Plugin manifest: the TOML file that declares every fragment.
//!
//! ```toml
//! [agent]
//! ensure = "present"
//! os_family = "freebsd"
//!
//! [processors.my_regex]
//! plugin_type = "regex"
//!
//! [[processors.my_regex.options]]
//! [[processors.my_regex.options.tags]]
//! key = "foo"
//! pattern = '^a*b+\d$'
//! ```
//!
//! Plugins are kept raw after loading and converted one at a time with
//! [`RawPlugin::declaration`], so a shape error in one plugin does not stop
//! the others from being reconciled.
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use serde::Deserialize;

use super::declaration::{Ensure, PluginDeclaration, PluginKind};
use super::toml_loader;
use crate::error::{ConfigError, ValidationError};
use crate::platform::OsFamily;
use crate::value::Value;

/// The `[agent]` table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AgentSection {
    /// Ambient presence of the agent. Absent removes every fragment.
    #[serde(default)]
    pub ensure: Ensure,
    /// OS family override, parsed with [`OsFamily::from_str`](std::str::FromStr).
    pub os_family: Option<String>,
    /// Fragment directory override.
    pub config_dir: Option<PathBuf>,
}

/// Keys accepted inside a plugin entry.
const PLUGIN_FIELDS: [&str; 3] = ["plugin_type", "ensure", "options"];

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ManifestFile {
    #[serde(default)]
    agent: AgentSection,
    #[serde(default)]
    inputs: BTreeMap<String, toml::Value>,
    #[serde(default)]
    outputs: BTreeMap<String, toml::Value>,
    #[serde(default)]
    processors: BTreeMap<String, toml::Value>,
    #[serde(default)]
    aggregators: BTreeMap<String, toml::Value>,
}

impl ManifestFile {
    fn take(&mut self, kind: PluginKind) -> BTreeMap<String, toml::Value> {
        std::mem::take(match kind {
            PluginKind::Input => &mut self.inputs,
            PluginKind::Output => &mut self.outputs,
            PluginKind::Processor => &mut self.processors,
            PluginKind::Aggregator => &mut self.aggregators,
        })
    }
}

/// A plugin entry that has not been validated yet.
///
/// The entry is kept as written. Field names and field types are only
/// checked by [`RawPlugin::declaration`].
#[derive(Debug, Clone, PartialEq)]
pub struct RawPlugin {
    /// Plugin name (the manifest key).
    pub name: String,
    /// Category the entry was declared under.
    pub kind: PluginKind,
    /// The entry as written.
    pub entry: toml::Value,
}

impl RawPlugin {
    /// Convert into a validated [`PluginDeclaration`].
    ///
    /// `options` may be a single table (one instance) or an array of tables
    /// (one instance each).
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidField`] for an unknown key or a
    /// mistyped `plugin_type` or `ensure`, and another [`ValidationError`] if
    /// an option value has an unsupported shape or the resulting declaration
    /// is invalid.
    pub fn declaration(&self) -> Result<PluginDeclaration, ValidationError> {
        let Some(entry) = self.entry.as_table() else {
            return Err(ValidationError::InvalidField {
                path: self.name.clone(),
                reason: format!("expected a table, found {}", self.entry.type_str()),
            });
        };
        if let Some(key) = entry.keys().find(|k| !PLUGIN_FIELDS.contains(&k.as_str())) {
            return Err(self.invalid_field(key, "unknown field".to_string()));
        }

        let plugin_type = match entry.get("plugin_type") {
            None => String::new(),
            Some(toml::Value::String(s)) => s.clone(),
            Some(other) => {
                return Err(self.invalid_field(
                    "plugin_type",
                    format!("expected a string, found {}", other.type_str()),
                ));
            }
        };

        let ensure = match entry.get("ensure") {
            None => Ensure::default(),
            Some(raw) => match raw.as_str() {
                Some("present") => Ensure::Present,
                Some("absent") => Ensure::Absent,
                _ => {
                    return Err(self.invalid_field(
                        "ensure",
                        format!(r#"expected "present" or "absent", found {raw}"#),
                    ));
                }
            },
        };

        let options = match entry.get("options") {
            None => Vec::new(),
            Some(raw) => {
                let path = format!("{}.options", self.name);
                match Value::from_toml(raw, &path)? {
                    Value::Tables(groups) => groups,
                    Value::Mapping(group) => vec![group],
                    Value::Scalar(_) | Value::ScalarList(_) => {
                        return Err(ValidationError::UnsupportedValueKind {
                            path,
                            kind: "options must be a table or an array of tables",
                        });
                    }
                }
            }
        };

        let decl = PluginDeclaration::new(self.name.as_str(), self.kind)
            .with_type(plugin_type)
            .with_ensure(ensure)
            .with_options(options);
        decl.validate()?;
        Ok(decl)
    }

    fn invalid_field(&self, field: &str, reason: String) -> ValidationError {
        ValidationError::InvalidField {
            path: format!("{}.{field}", self.name),
            reason,
        }
    }
}

/// A loaded manifest.
#[derive(Debug, Clone)]
pub struct Manifest {
    /// File the manifest was read from.
    pub path: PathBuf,
    /// Agent-level settings.
    pub agent: AgentSection,
    /// Every declared plugin, grouped by kind and sorted by name within a kind.
    pub plugins: Vec<RawPlugin>,
}

impl Manifest {
    /// Read and parse a manifest file.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the file cannot be read or parsed, or if a
    /// plugin name is declared twice.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        Self::from_file(toml_loader::load_config(path)?, path)
    }

    /// Parse manifest text. `origin` is recorded as the manifest path.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] on malformed TOML, an unknown top-level
    /// table or `[agent]` key, or a plugin name declared under more than one
    /// kind. Errors inside a plugin entry surface later, from
    /// [`RawPlugin::declaration`].
    pub fn parse(content: &str, origin: &Path) -> Result<Self, ConfigError> {
        Self::from_file(toml_loader::parse_config(content, origin)?, origin)
    }

    fn from_file(mut file: ManifestFile, origin: &Path) -> Result<Self, ConfigError> {
        let mut seen = HashSet::new();
        let mut plugins = Vec::new();
        for kind in PluginKind::ALL {
            for (name, entry) in file.take(kind) {
                if !seen.insert(name.clone()) {
                    return Err(ConfigError::DuplicateName { name });
                }
                plugins.push(RawPlugin { name, kind, entry });
            }
        }

        Ok(Self {
            path: origin.to_path_buf(),
            agent: file.agent,
            plugins,
        })
    }

    /// OS family override from `[agent]`, if any.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] if the value is not a known family.
    pub fn os_family(&self) -> Result<Option<OsFamily>, ConfigError> {
        self.agent
            .os_family
            .as_deref()
            .map(|raw| {
                raw.parse().map_err(|_| ConfigError::InvalidValue {
                    field: "agent.os_family",
                    value: raw.to_string(),
                })
            })
            .transpose()
    }

    /// Look up a plugin by name.
    #[must_use]
    pub fn find(&self, name: &str) -> Option<&RawPlugin> {
        self.plugins.iter().find(|p| p.name == name)
    }
}

#[cfg(test)]
#[allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::indexing_slicing,
    clippy::panic
)]
mod tests {
    use super::*;
    use crate::value::Table;

    fn parse(content: &str) -> Manifest {
        Manifest::parse(content, Path::new("test.toml")).unwrap()
    }

    #[test]
    fn empty_manifest_has_defaults() {
        let manifest = parse("");
        assert_eq!(manifest.agent, AgentSection::default());
        assert!(manifest.plugins.is_empty());
        assert_eq!(manifest.os_family().unwrap(), None);
    }

    #[test]
    fn agent_section_is_parsed() {
        let manifest = parse(
            r#"
[agent]
ensure = "absent"
os_family = "FreeBSD"
config_dir = "/srv/telegraf.d"
"#,
        );
        assert_eq!(manifest.agent.ensure, Ensure::Absent);
        assert_eq!(manifest.os_family().unwrap(), Some(OsFamily::FreeBSD));
        assert_eq!(
            manifest.agent.config_dir,
            Some(PathBuf::from("/srv/telegraf.d"))
        );
    }

    #[test]
    fn unknown_os_family_is_invalid_value() {
        let manifest = parse("[agent]\nos_family = \"plan9\"\n");
        let err = manifest.os_family().unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue {
                field: "agent.os_family",
                ..
            }
        ));
    }

    #[test]
    fn plugins_are_grouped_by_kind() {
        let manifest = parse(
            r#"
[processors.b_proc]
[inputs.cpu]
[aggregators.minmax]
[processors.a_proc]
"#,
        );
        let names: Vec<(&str, PluginKind)> = manifest
            .plugins
            .iter()
            .map(|p| (p.name.as_str(), p.kind))
            .collect();
        assert_eq!(
            names,
            [
                ("cpu", PluginKind::Input),
                ("a_proc", PluginKind::Processor),
                ("b_proc", PluginKind::Processor),
                ("minmax", PluginKind::Aggregator),
            ]
        );
    }

    #[test]
    fn array_of_option_groups_keeps_key_order() {
        let manifest = parse(
            r#"
[processors.my_regex]
plugin_type = "regex"

[[processors.my_regex.options]]
order = 2
namepass = ["nginx_requests"]

[[processors.my_regex.options.tags]]
key = "foo"
pattern = '^a*b+\d$'
replacement = "c${1}d"
"#,
        );
        let decl = manifest.find("my_regex").unwrap().declaration().unwrap();
        assert_eq!(decl.plugin_type.as_deref(), Some("regex"));
        assert_eq!(decl.options.len(), 1);
        let keys: Vec<&str> = decl.options[0].keys().collect();
        assert_eq!(keys, ["order", "namepass", "tags"]);
        let Some(Value::Tables(tags)) = decl.options[0].get("tags") else {
            panic!("tags should be a repeated table");
        };
        let tag_keys: Vec<&str> = tags[0].keys().collect();
        assert_eq!(tag_keys, ["key", "pattern", "replacement"]);
    }

    #[test]
    fn single_options_table_is_one_group() {
        let manifest = parse(
            r#"
[inputs.cpu]
plugin_type = "cpu"
options = { percpu = true }
"#,
        );
        let decl = manifest.find("cpu").unwrap().declaration().unwrap();
        assert_eq!(decl.options, vec![Table::new().with("percpu", true)]);
    }

    #[test]
    fn scalar_options_are_rejected() {
        let manifest = parse("[inputs.cpu]\nplugin_type = \"cpu\"\noptions = 3\n");
        let err = manifest.find("cpu").unwrap().declaration().unwrap_err();
        assert!(matches!(
            err,
            ValidationError::UnsupportedValueKind { ref path, .. } if path == "cpu.options"
        ));
    }

    #[test]
    fn bad_plugin_does_not_affect_others() {
        let manifest = parse(
            r#"
[processors.bad]
plugin_type = "regex"
options = [{ matrix = [[1, 2], [3, 4]] }]

[processors.good]
plugin_type = "dedup"
"#,
        );
        let bad = manifest.find("bad").unwrap().declaration().unwrap_err();
        assert_eq!(
            bad,
            ValidationError::UnsupportedValueKind {
                path: "bad.options.0.matrix.0".to_string(),
                kind: "array of arrays",
            }
        );
        assert!(manifest.find("good").unwrap().declaration().is_ok());
    }

    #[test]
    fn options_without_type_fail_validation() {
        let manifest = parse("[processors.x]\noptions = { a = 1 }\n");
        let err = manifest.find("x").unwrap().declaration().unwrap_err();
        assert!(matches!(err, ValidationError::MissingPluginType { .. }));
    }

    #[test]
    fn unknown_top_level_table_is_rejected() {
        let err = Manifest::parse("[metrics.x]\n", Path::new("m.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));

        let err = Manifest::parse("[agent]\nensure_all = true\n", Path::new("m.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    // -----------------------------------------------------------------------
    // Entry fields
    // -----------------------------------------------------------------------

    fn field_error(content: &str, name: &str) -> (String, String) {
        let manifest = parse(content);
        match manifest.find(name).unwrap().declaration().unwrap_err() {
            ValidationError::InvalidField { path, reason } => (path, reason),
            other => panic!("expected InvalidField, got {other:?}"),
        }
    }

    #[test]
    fn unknown_plugin_field_fails_only_that_plugin() {
        let content = "[inputs.cpu]\nplugin_type = \"cpu\"\n\n[processors.x]\nplugin_typo = \"regex\"\n";
        let (path, reason) = field_error(content, "x");
        assert_eq!(path, "x.plugin_typo");
        assert_eq!(reason, "unknown field");
        assert!(parse(content).find("cpu").unwrap().declaration().is_ok());
    }

    #[test]
    fn misspelled_ensure_fails_only_that_plugin() {
        let content = r#"
[inputs.cpu]
plugin_type = "cpu"

[processors.typo]
plugin_type = "regex"
ensure = "abesnt"
"#;
        let (path, reason) = field_error(content, "typo");
        assert_eq!(path, "typo.ensure");
        assert!(reason.contains("abesnt"), "{reason}");
        let cpu = parse(content).find("cpu").unwrap().declaration().unwrap();
        assert_eq!(cpu.ensure, Ensure::Present);
    }

    #[test]
    fn non_string_plugin_type_fails_only_that_plugin() {
        let content = "[inputs.cpu]\n\n[processors.typo]\nplugin_type = 5\n";
        let (path, reason) = field_error(content, "typo");
        assert_eq!(path, "typo.plugin_type");
        assert_eq!(reason, "expected a string, found integer");
        assert!(parse(content).find("cpu").unwrap().declaration().is_ok());
    }

    #[test]
    fn non_table_entry_fails_only_that_plugin() {
        let content = "inputs = { cpu = {}, mem = 3 }\n";
        let (path, reason) = field_error(content, "mem");
        assert_eq!(path, "mem");
        assert_eq!(reason, "expected a table, found integer");
        assert!(parse(content).find("cpu").unwrap().declaration().is_ok());
    }

    #[test]
    fn ensure_absent_is_read_from_entry() {
        let manifest = parse("[inputs.cpu]\nensure = \"absent\"\n");
        let decl = manifest.find("cpu").unwrap().declaration().unwrap();
        assert_eq!(decl.ensure, Ensure::Absent);
    }

    #[test]
    fn duplicate_name_across_kinds_is_rejected() {
        let err =
            Manifest::parse("[inputs.dup]\n[outputs.dup]\n", Path::new("m.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateName { ref name } if name == "dup"));
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = Manifest::load(&dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn load_records_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plugins.toml");
        std::fs::write(&path, "[processors.dedup]\nplugin_type = \"dedup\"\n").unwrap();
        let manifest = Manifest::load(&path).unwrap();
        assert_eq!(manifest.path, path);
        assert_eq!(manifest.plugins.len(), 1);
    }
}
