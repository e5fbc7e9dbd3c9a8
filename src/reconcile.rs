//! Pure reconciliation of plugin declarations into fragment decisions.
//!
//! The reconciler decides, for each declaration, where its fragment lives,
//! whether it should exist, what it contains, and which collaborators it is
//! ordered against. It performs no I/O; applying the result is the job of
//! [`crate::processing`].
use std::fmt::{self, Write as _};
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::config::declaration::{Ensure, PluginDeclaration, PluginKind};
use crate::config::manifest::RawPlugin;
use crate::error::ValidationError;
use crate::platform::{OsFamily, PathResolver};
use crate::render::render;
use crate::value::{Table, Value};

/// Whether a fragment should exist given the agent's and the plugin's ensure.
///
/// An absent agent overrides every plugin.
///
/// ```
/// use telegraf_conf::config::Ensure;
/// use telegraf_conf::reconcile::effective_presence;
///
/// assert_eq!(effective_presence(Ensure::Present, Ensure::Present), Ensure::Present);
/// assert_eq!(effective_presence(Ensure::Absent, Ensure::Present), Ensure::Absent);
/// assert_eq!(effective_presence(Ensure::Present, Ensure::Absent), Ensure::Absent);
/// ```
#[must_use]
pub const fn effective_presence(ambient: Ensure, declared: Ensure) -> Ensure {
    match (ambient, declared) {
        (Ensure::Present, Ensure::Present) => Ensure::Present,
        _ => Ensure::Absent,
    }
}

/// Opaque reference to an external collaborator, e.g. `Class[telegraf::install]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct CollaboratorHandle(String);

impl CollaboratorHandle {
    /// Wrap a handle string.
    #[must_use]
    pub fn new(handle: impl Into<String>) -> Self {
        Self(handle.into())
    }

    /// The agent install step.
    #[must_use]
    pub fn install() -> Self {
        Self::new("Class[telegraf::install]")
    }

    /// The agent service.
    #[must_use]
    pub fn service() -> Self {
        Self::new("Class[telegraf::service]")
    }

    /// The handle text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CollaboratorHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Ordering constraint between a fragment and a collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "edge", content = "target", rename_all = "lowercase")]
pub enum DependencyEdge {
    /// The collaborator must succeed before the fragment is written.
    Requires(CollaboratorHandle),
    /// The collaborator is notified when the fragment's content changes.
    Notifies(CollaboratorHandle),
}

/// Target state of a fragment file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum FragmentState {
    /// The file should exist with exactly this content.
    Present {
        /// Full rendered file content.
        content: String,
    },
    /// The file should not exist.
    Absent,
}

/// A fragment file and its target state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfigFragment {
    /// Location on disk.
    pub path: PathBuf,
    /// Target state.
    #[serde(flatten)]
    pub state: FragmentState,
}

impl ConfigFragment {
    /// Rendered content, if the fragment is present.
    #[must_use]
    pub fn content(&self) -> Option<&str> {
        match &self.state {
            FragmentState::Present { content } => Some(content),
            FragmentState::Absent => None,
        }
    }

    /// Whether the fragment should exist.
    #[must_use]
    pub const fn is_present(&self) -> bool {
        matches!(self.state, FragmentState::Present { .. })
    }

    /// SHA-256 of the content as lowercase hex, if present.
    #[must_use]
    pub fn digest(&self) -> Option<String> {
        let content = self.content()?;
        let mut hasher = Sha256::new();
        hasher.update(content.as_bytes());
        let mut hex = String::with_capacity(64);
        for b in &hasher.finalize() {
            write!(hex, "{b:02x}").unwrap_or(());
        }
        Some(hex)
    }
}

/// The complete decision for one declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reconciliation {
    /// Plugin name.
    pub name: String,
    /// Plugin category.
    pub kind: PluginKind,
    /// Target fragment.
    pub fragment: ConfigFragment,
    /// Ordering constraints; empty for absent fragments.
    pub edges: Vec<DependencyEdge>,
}

impl Reconciliation {
    /// Collaborators that must succeed before the fragment is written.
    pub fn requires(&self) -> impl Iterator<Item = &CollaboratorHandle> {
        self.edges.iter().filter_map(|edge| match edge {
            DependencyEdge::Requires(handle) => Some(handle),
            DependencyEdge::Notifies(_) => None,
        })
    }

    /// Collaborators to notify when the fragment changes.
    pub fn notifies(&self) -> impl Iterator<Item = &CollaboratorHandle> {
        self.edges.iter().filter_map(|edge| match edge {
            DependencyEdge::Notifies(handle) => Some(handle),
            DependencyEdge::Requires(_) => None,
        })
    }
}

/// Turns declarations into [`Reconciliation`]s.
///
/// # Examples
///
/// ```
/// use telegraf_conf::config::{Ensure, PluginDeclaration, PluginKind};
/// use telegraf_conf::platform::{OsFamily, StandardPaths};
/// use telegraf_conf::reconcile::Reconciler;
///
/// let reconciler = Reconciler::new(&StandardPaths, OsFamily::FreeBSD, Ensure::Present);
/// let decl = PluginDeclaration::new("my_dedup", PluginKind::Processor).with_type("dedup");
/// let rec = reconciler.reconcile(&decl).unwrap();
/// assert_eq!(
///     rec.fragment.path.to_str(),
///     Some("/usr/local/etc/telegraf.d/my_dedup.conf")
/// );
/// assert_eq!(rec.fragment.content(), Some("[[processors.dedup]]\n"));
/// ```
pub struct Reconciler<'a> {
    resolver: &'a dyn PathResolver,
    family: OsFamily,
    ambient: Ensure,
    install: CollaboratorHandle,
    service: CollaboratorHandle,
}

impl fmt::Debug for Reconciler<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reconciler")
            .field("config_dir", &self.config_dir())
            .field("family", &self.family)
            .field("ambient", &self.ambient)
            .field("install", &self.install)
            .field("service", &self.service)
            .finish()
    }
}

impl<'a> Reconciler<'a> {
    /// Create a reconciler with the default collaborator handles.
    #[must_use]
    pub fn new(resolver: &'a dyn PathResolver, family: OsFamily, ambient: Ensure) -> Self {
        Self {
            resolver,
            family,
            ambient,
            install: CollaboratorHandle::install(),
            service: CollaboratorHandle::service(),
        }
    }

    /// Override the collaborator handles used for edges.
    #[must_use]
    pub fn with_handles(mut self, install: CollaboratorHandle, service: CollaboratorHandle) -> Self {
        self.install = install;
        self.service = service;
        self
    }

    /// Directory fragments are placed in.
    #[must_use]
    pub fn config_dir(&self) -> PathBuf {
        self.resolver.config_dir(self.family)
    }

    /// Fragment path for a plugin name.
    #[must_use]
    pub fn fragment_path(&self, name: &str) -> PathBuf {
        fragment_path(&self.config_dir(), name)
    }

    /// Reconcile one declaration.
    ///
    /// Each option group renders as one plugin instance. A declaration with
    /// no options renders a single bare instance so the plugin runs with its
    /// defaults.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] if the declaration is invalid.
    pub fn reconcile(&self, decl: &PluginDeclaration) -> Result<Reconciliation, ValidationError> {
        decl.validate()?;
        let path = self.fragment_path(&decl.name);

        if effective_presence(self.ambient, decl.ensure) == Ensure::Absent {
            return Ok(Reconciliation {
                name: decl.name.clone(),
                kind: decl.kind,
                fragment: ConfigFragment {
                    path,
                    state: FragmentState::Absent,
                },
                edges: Vec::new(),
            });
        }

        let instances = if decl.options.is_empty() {
            vec![Table::new()]
        } else {
            decl.options.clone()
        };
        let content = render(&decl.section_path(), &Value::Tables(instances))?;

        Ok(Reconciliation {
            name: decl.name.clone(),
            kind: decl.kind,
            fragment: ConfigFragment {
                path,
                state: FragmentState::Present { content },
            },
            edges: vec![
                DependencyEdge::Requires(self.install.clone()),
                DependencyEdge::Notifies(self.service.clone()),
            ],
        })
    }

    /// Reconcile a batch in parallel. Output order matches input order.
    #[must_use]
    pub fn reconcile_all(
        &self,
        decls: &[PluginDeclaration],
    ) -> Vec<Result<Reconciliation, ValidationError>> {
        decls.par_iter().map(|decl| self.reconcile(decl)).collect()
    }

    /// Convert and reconcile raw manifest entries in parallel.
    ///
    /// Conversion errors are reported per plugin, alongside its name.
    #[must_use]
    pub fn reconcile_plugins(
        &self,
        plugins: &[RawPlugin],
    ) -> Vec<(String, Result<Reconciliation, ValidationError>)> {
        plugins
            .par_iter()
            .map(|raw| {
                let result = raw.declaration().and_then(|decl| self.reconcile(&decl));
                (raw.name.clone(), result)
            })
            .collect()
    }
}

/// `<dir>/<name>.conf`.
#[must_use]
pub fn fragment_path(dir: &Path, name: &str) -> PathBuf {
    dir.join(format!("{name}.conf"))
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
    use crate::platform::{FixedDir, StandardPaths};
    use crate::value::Scalar;

    fn regex_decl() -> PluginDeclaration {
        let tags = vec![
            Table::new()
                .with("key", "foo")
                .with("pattern", r"^a*b+\d$")
                .with("replacement", "c${1}d"),
        ];
        PluginDeclaration::new("my_regex", PluginKind::Processor)
            .with_type("regex")
            .with_options(vec![Table::new().with("tags", tags)])
    }

    fn enum_decl() -> PluginDeclaration {
        let value_mappings: Table = [("green", 1), ("amber", 2), ("red", 3)]
            .into_iter()
            .collect();
        let mapping = Table::new()
            .with("field", "status")
            .with("dest", "status_code")
            .with("value_mappings", value_mappings);
        PluginDeclaration::new("my_enum", PluginKind::Processor)
            .with_type("enum")
            .with_options(vec![Table::new().with("mapping", vec![mapping])])
    }

    // -----------------------------------------------------------------------
    // Presence
    // -----------------------------------------------------------------------

    #[test]
    fn presence_truth_table() {
        use Ensure::{Absent, Present};
        assert_eq!(effective_presence(Present, Present), Present);
        assert_eq!(effective_presence(Present, Absent), Absent);
        assert_eq!(effective_presence(Absent, Present), Absent);
        assert_eq!(effective_presence(Absent, Absent), Absent);
    }

    #[test]
    fn absent_agent_overrides_every_declaration() {
        let reconciler = Reconciler::new(&StandardPaths, OsFamily::Linux, Ensure::Absent);
        for decl in [regex_decl(), enum_decl()] {
            let rec = reconciler.reconcile(&decl).unwrap();
            assert_eq!(rec.fragment.state, FragmentState::Absent);
            assert!(rec.edges.is_empty());
        }
    }

    #[test]
    fn absent_declaration_has_no_edges() {
        let reconciler = Reconciler::new(&StandardPaths, OsFamily::Linux, Ensure::Present);
        let decl = regex_decl().with_ensure(Ensure::Absent);
        let rec = reconciler.reconcile(&decl).unwrap();
        assert_eq!(
            rec.fragment,
            ConfigFragment {
                path: PathBuf::from("/etc/telegraf/telegraf.d/my_regex.conf"),
                state: FragmentState::Absent,
            }
        );
        assert!(rec.edges.is_empty());
        assert_eq!(rec.fragment.digest(), None);
    }

    // -----------------------------------------------------------------------
    // Paths
    // -----------------------------------------------------------------------

    #[test]
    fn path_follows_os_family() {
        let decl = PluginDeclaration::new("my_basicstats", PluginKind::Processor);
        let expected = [
            (
                OsFamily::Windows,
                "C:/Program Files/telegraf/telegraf.d/my_basicstats.conf",
            ),
            (
                OsFamily::Darwin,
                "/usr/local/etc/telegraf/telegraf.d/my_basicstats.conf",
            ),
            (
                OsFamily::FreeBSD,
                "/usr/local/etc/telegraf.d/my_basicstats.conf",
            ),
            (OsFamily::Linux, "/etc/telegraf/telegraf.d/my_basicstats.conf"),
        ];
        for (family, path) in expected {
            let reconciler = Reconciler::new(&StandardPaths, family, Ensure::Present);
            let rec = reconciler.reconcile(&decl).unwrap();
            assert_eq!(rec.fragment.path, PathBuf::from(path), "{family}");
        }
    }

    #[test]
    fn fixed_dir_resolver_is_honoured() {
        let resolver = FixedDir(PathBuf::from("/tmp/frag"));
        let reconciler = Reconciler::new(&resolver, OsFamily::Windows, Ensure::Present);
        assert_eq!(
            reconciler.fragment_path("x"),
            PathBuf::from("/tmp/frag/x.conf")
        );
    }

    // -----------------------------------------------------------------------
    // Content
    // -----------------------------------------------------------------------

    #[test]
    fn regex_fragment_content_and_edges() {
        let reconciler = Reconciler::new(&StandardPaths, OsFamily::Linux, Ensure::Present);
        let rec = reconciler.reconcile(&regex_decl()).unwrap();
        assert_eq!(
            rec.fragment.content().unwrap(),
            "[[processors.regex]]\n\n\
             [[processors.regex.tags]]\n\
             key = \"foo\"\n\
             pattern = \"^a*b+\\\\d$\"\n\
             replacement = \"c${1}d\"\n"
        );
        assert_eq!(
            rec.edges,
            vec![
                DependencyEdge::Requires(CollaboratorHandle::install()),
                DependencyEdge::Notifies(CollaboratorHandle::service()),
            ]
        );
        assert_eq!(
            rec.requires().map(CollaboratorHandle::as_str).collect::<Vec<_>>(),
            ["Class[telegraf::install]"]
        );
        assert_eq!(
            rec.notifies().map(CollaboratorHandle::as_str).collect::<Vec<_>>(),
            ["Class[telegraf::service]"]
        );
    }

    #[test]
    fn enum_fragment_nests_value_mappings() {
        let reconciler = Reconciler::new(&StandardPaths, OsFamily::Linux, Ensure::Present);
        let content = reconciler
            .reconcile(&enum_decl())
            .unwrap()
            .fragment
            .content()
            .unwrap()
            .to_string();
        assert!(content.contains("[[processors.enum]]"));
        assert!(content.contains("[[processors.enum.mapping]]"));
        assert!(content.contains("[processors.enum.mapping.value_mappings]"));
        let field = content.find("field = \"status\"").unwrap();
        let dest = content.find("dest = \"status_code\"").unwrap();
        let nested = content.find("[processors.enum.mapping.value_mappings]").unwrap();
        assert!(field < dest && dest < nested);
        assert!(content.ends_with("green = 1\namber = 2\nred = 3\n"));
    }

    #[test]
    fn empty_options_render_bare_instance() {
        let reconciler = Reconciler::new(&StandardPaths, OsFamily::Darwin, Ensure::Present);
        let decl = PluginDeclaration::new("my_basicstats", PluginKind::Aggregator);
        let rec = reconciler.reconcile(&decl).unwrap();
        assert_eq!(rec.fragment.content(), Some("[[aggregators.my_basicstats]]\n"));
    }

    #[test]
    fn each_option_group_is_its_own_instance() {
        let reconciler = Reconciler::new(&StandardPaths, OsFamily::Linux, Ensure::Present);
        let decl = PluginDeclaration::new("two", PluginKind::Input)
            .with_type("cpu")
            .with_options(vec![
                Table::new().with("percpu", true),
                Table::new().with("percpu", false),
            ]);
        let content = reconciler.reconcile(&decl).unwrap().fragment.content().unwrap().to_string();
        assert_eq!(
            content,
            "[[inputs.cpu]]\npercpu = true\n\n[[inputs.cpu]]\npercpu = false\n"
        );
    }

    #[test]
    fn reconcile_is_idempotent() {
        let reconciler = Reconciler::new(&StandardPaths, OsFamily::Linux, Ensure::Present);
        let first = reconciler.reconcile(&enum_decl()).unwrap();
        for _ in 0..5 {
            let again = reconciler.reconcile(&enum_decl()).unwrap();
            assert_eq!(again, first);
            assert_eq!(again.fragment.digest(), first.fragment.digest());
        }
    }

    #[test]
    fn digest_is_hex_sha256() {
        let fragment = ConfigFragment {
            path: PathBuf::from("x.conf"),
            state: FragmentState::Present {
                content: String::new(),
            },
        };
        assert_eq!(
            fragment.digest().unwrap(),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn custom_handles_are_used_for_edges() {
        let reconciler = Reconciler::new(&StandardPaths, OsFamily::Linux, Ensure::Present)
            .with_handles(CollaboratorHandle::new("pkg"), CollaboratorHandle::new("svc"));
        let rec = reconciler.reconcile(&regex_decl()).unwrap();
        assert_eq!(
            rec.edges,
            vec![
                DependencyEdge::Requires(CollaboratorHandle::new("pkg")),
                DependencyEdge::Notifies(CollaboratorHandle::new("svc")),
            ]
        );
    }

    // -----------------------------------------------------------------------
    // Validation and batches
    // -----------------------------------------------------------------------

    #[test]
    fn invalid_declaration_is_rejected() {
        let reconciler = Reconciler::new(&StandardPaths, OsFamily::Linux, Ensure::Present);
        let decl = PluginDeclaration::new("../escape", PluginKind::Processor);
        assert!(matches!(
            reconciler.reconcile(&decl),
            Err(ValidationError::InvalidName { .. })
        ));
    }

    #[test]
    fn batch_failure_is_isolated_and_order_kept() {
        let reconciler = Reconciler::new(&StandardPaths, OsFamily::Linux, Ensure::Present);
        let bad = PluginDeclaration::new("bad", PluginKind::Processor)
            .with_options(vec![Table::new().with("a", Scalar::Integer(1))]);
        let results = reconciler.reconcile_all(&[regex_decl(), bad, enum_decl()]);
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].as_ref().unwrap().name, "my_regex");
        assert!(matches!(
            results[1],
            Err(ValidationError::MissingPluginType { .. })
        ));
        assert_eq!(results[2].as_ref().unwrap().name, "my_enum");
    }

    #[test]
    fn reconcile_serializes_to_json() {
        let resolver = FixedDir(PathBuf::from("/d"));
        let reconciler = Reconciler::new(&resolver, OsFamily::Linux, Ensure::Present);
        let decl = PluginDeclaration::new("dedup", PluginKind::Processor).with_type("dedup");
        let json = serde_json::to_value(reconciler.reconcile(&decl).unwrap()).unwrap();
        assert_eq!(json["name"], "dedup");
        assert_eq!(json["kind"], "processor");
        assert_eq!(json["fragment"]["path"], "/d/dedup.conf");
        assert_eq!(json["fragment"]["state"], "present");
        assert_eq!(json["fragment"]["content"], "[[processors.dedup]]\n");
        assert_eq!(json["edges"][0]["edge"], "requires");
        assert_eq!(json["edges"][0]["target"], "Class[telegraf::install]");
        assert_eq!(json["edges"][1]["edge"], "notifies");
    }
}
