//! Typed plugin declarations.
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::render::SectionPath;
use crate::value::Table;

/// Desired presence of the agent or of a single fragment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Ensure {
    /// The thing should exist.
    #[default]
    Present,
    /// The thing should not exist.
    Absent,
}

impl fmt::Display for Ensure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Present => write!(f, "present"),
            Self::Absent => write!(f, "absent"),
        }
    }
}

/// Plugin category; selects the top-level section of the fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PluginKind {
    /// Metric sources (`[[inputs.*]]`).
    Input,
    /// Metric sinks (`[[outputs.*]]`).
    Output,
    /// Per-metric transforms (`[[processors.*]]`).
    Processor,
    /// Windowed aggregations (`[[aggregators.*]]`).
    Aggregator,
}

impl PluginKind {
    /// All kinds, in manifest order.
    pub const ALL: [Self; 4] = [Self::Input, Self::Output, Self::Processor, Self::Aggregator];

    /// Top-level section name in the rendered fragment.
    #[must_use]
    pub const fn section_root(self) -> &'static str {
        match self {
            Self::Input => "inputs",
            Self::Output => "outputs",
            Self::Processor => "processors",
            Self::Aggregator => "aggregators",
        }
    }
}

impl fmt::Display for PluginKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Input => write!(f, "input"),
            Self::Output => write!(f, "output"),
            Self::Processor => write!(f, "processor"),
            Self::Aggregator => write!(f, "aggregator"),
        }
    }
}

/// A validated plugin instance.
///
/// # Examples
///
/// ```
/// use telegraf_conf::config::declaration::{PluginDeclaration, PluginKind};
/// use telegraf_conf::value::Table;
///
/// let decl = PluginDeclaration::new("my_enum", PluginKind::Processor)
///     .with_type("enum")
///     .with_options(vec![Table::new().with("order", 1)]);
/// assert!(decl.validate().is_ok());
/// assert_eq!(decl.section_path().to_string(), "processors.enum");
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct PluginDeclaration {
    /// Instance name; also the fragment file stem.
    pub name: String,
    /// Plugin category.
    pub kind: PluginKind,
    /// Plugin type tag. `None` for typeless plugins, whose section uses the
    /// instance name.
    pub plugin_type: Option<String>,
    /// Desired presence of this fragment.
    pub ensure: Ensure,
    /// Option groups; each renders as one plugin instance.
    pub options: Vec<Table>,
}

impl PluginDeclaration {
    /// A present, typeless declaration with no options.
    #[must_use]
    pub fn new(name: impl Into<String>, kind: PluginKind) -> Self {
        Self {
            name: name.into(),
            kind,
            plugin_type: None,
            ensure: Ensure::Present,
            options: Vec::new(),
        }
    }

    /// Set the plugin type. An empty string clears it.
    #[must_use]
    pub fn with_type(mut self, plugin_type: impl Into<String>) -> Self {
        let plugin_type = plugin_type.into();
        self.plugin_type = (!plugin_type.is_empty()).then_some(plugin_type);
        self
    }

    /// Set the desired presence.
    #[must_use]
    pub const fn with_ensure(mut self, ensure: Ensure) -> Self {
        self.ensure = ensure;
        self
    }

    /// Replace the option groups.
    #[must_use]
    pub fn with_options(mut self, options: Vec<Table>) -> Self {
        self.options = options;
        self
    }

    /// Check the declaration against the data model.
    ///
    /// # Errors
    ///
    /// - [`ValidationError::InvalidName`] if the name cannot be a file stem.
    /// - [`ValidationError::MissingPluginType`] if options are given without a
    ///   plugin type.
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_name(&self.name)?;
        if self.plugin_type.is_none() && !self.options.is_empty() {
            return Err(ValidationError::MissingPluginType {
                name: self.name.clone(),
            });
        }
        Ok(())
    }

    /// Section path of each rendered instance, e.g. `processors.regex`.
    #[must_use]
    pub fn section_path(&self) -> SectionPath {
        let leaf = self.plugin_type.as_deref().unwrap_or(&self.name);
        SectionPath::parse(self.kind.section_root()).child(leaf)
    }
}

/// Reject names that would escape the fragment directory or are not usable
/// as file names.
fn validate_name(name: &str) -> Result<(), ValidationError> {
    let reason = if name.is_empty() {
        "name is empty"
    } else if name == "." || name == ".." {
        "name is a relative directory reference"
    } else if name.contains(['/', '\\']) {
        "contains a path separator"
    } else if name.contains('\0') {
        "contains a NUL byte"
    } else {
        return Ok(());
    };
    Err(ValidationError::InvalidName {
        name: name.to_string(),
        reason,
    })
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn typed_section_path() {
        let decl = PluginDeclaration::new("my_regex", PluginKind::Processor).with_type("regex");
        assert_eq!(decl.section_path().to_string(), "processors.regex");
    }

    #[test]
    fn typeless_section_path_uses_name() {
        let decl = PluginDeclaration::new("basicstats", PluginKind::Aggregator);
        assert_eq!(decl.section_path().to_string(), "aggregators.basicstats");
    }

    #[test]
    fn section_roots() {
        let roots: Vec<&str> = PluginKind::ALL.iter().map(|k| k.section_root()).collect();
        assert_eq!(roots, ["inputs", "outputs", "processors", "aggregators"]);
    }

    #[test]
    fn empty_type_is_typeless() {
        let decl = PluginDeclaration::new("x", PluginKind::Processor).with_type("");
        assert_eq!(decl.plugin_type, None);
    }

    #[test]
    fn options_without_type_are_rejected() {
        let decl = PluginDeclaration::new("x", PluginKind::Processor)
            .with_options(vec![Table::new().with("a", 1)]);
        assert_eq!(
            decl.validate().unwrap_err(),
            ValidationError::MissingPluginType {
                name: "x".to_string()
            }
        );
    }

    #[test]
    fn typeless_without_options_is_valid() {
        let decl = PluginDeclaration::new("my_basicstats", PluginKind::Processor);
        assert!(decl.validate().is_ok());
    }

    #[test]
    fn invalid_names_are_rejected() {
        for name in ["", ".", "..", "a/b", "a\\b", "nul\0byte"] {
            let decl = PluginDeclaration::new(name, PluginKind::Processor);
            assert!(
                matches!(decl.validate(), Err(ValidationError::InvalidName { .. })),
                "expected '{name}' to be rejected"
            );
        }
    }

    #[test]
    fn ensure_default_and_display() {
        assert_eq!(Ensure::default(), Ensure::Present);
        assert_eq!(Ensure::Absent.to_string(), "absent");
    }
}
