//! Domain-specific error types for the fragment engine.
//!
//! This module provides a structured error hierarchy using [`thiserror`].
//! Internal modules return typed errors (e.g., [`ValidationError`],
//! [`CollaboratorError`]) while command handlers at the CLI boundary convert
//! them to [`anyhow::Error`] via the standard `?` operator.
//!
//! # Error hierarchy
//!
//! ```text
//! ReconcileError
//! ├── Validation(ValidationError)     - declaration shape violates the data model
//! ├── Collaborator(CollaboratorError) - install or service step failed
//! └── Io { path, message }            - writing or removing the fragment failed
//!
//! ConfigError                         - manifest loading and parsing
//! ```

use std::path::PathBuf;

use thiserror::Error;

/// A plugin declaration does not fit the data model.
///
/// Aborts reconciliation of that one declaration only.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// A value is neither scalar, scalar list, mapping, nor list of mappings.
    #[error("unsupported value kind at '{path}': {kind}")]
    UnsupportedValueKind {
        /// Dotted path of the offending value inside the declaration.
        path: String,
        /// Short description of the rejected shape (e.g. `"array of arrays"`).
        kind: &'static str,
    },

    /// Options were given but no plugin type says where they belong.
    #[error("plugin '{name}' has options but no plugin_type")]
    MissingPluginType {
        /// Name of the declaration.
        name: String,
    },

    /// The plugin name cannot be used as a fragment file name.
    #[error("invalid plugin name '{name}': {reason}")]
    InvalidName {
        /// The rejected name.
        name: String,
        /// Why the name was rejected.
        reason: &'static str,
    },

    /// A plugin entry field is unknown or has the wrong type.
    #[error("invalid field '{path}': {reason}")]
    InvalidField {
        /// Dotted path of the field, e.g. `"my_regex.ensure"`.
        path: String,
        /// What was expected and what was found.
        reason: String,
    },
}

/// An external collaborator reported failure.
///
/// Propagated verbatim; the engine never retries.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CollaboratorError {
    /// The agent is not installed, or installing it failed.
    #[error("install step failed: {reason}")]
    Install {
        /// Collaborator-provided failure description.
        reason: String,
    },

    /// The service manager could not restart the agent.
    #[error("service notification failed: {reason}")]
    Service {
        /// Collaborator-provided failure description.
        reason: String,
    },
}

/// Errors that arise from loading the plugin manifest.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The manifest could not be read.
    #[error("IO error reading manifest {path}: {source}")]
    Io {
        /// Path to the file that could not be read.
        path: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The manifest is not valid TOML or does not match the manifest schema.
    #[error("invalid manifest {path}: {message}")]
    Parse {
        /// Path to the offending file.
        path: String,
        /// Parser message.
        message: String,
    },

    /// A value in the manifest is not one of the accepted spellings.
    #[error("invalid value for {field}: '{value}'")]
    InvalidValue {
        /// Field name (e.g. `"agent.os_family"`).
        field: &'static str,
        /// The rejected value.
        value: String,
    },

    /// The same plugin name is declared under more than one kind.
    #[error("plugin name '{name}' is declared more than once")]
    DuplicateName {
        /// The repeated name.
        name: String,
    },
}

/// Failure reconciling or materializing a single plugin declaration.
#[derive(Error, Debug)]
pub enum ReconcileError {
    /// Declaration shape error.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Install or service collaborator failure.
    #[error(transparent)]
    Collaborator(#[from] CollaboratorError),

    /// The fragment file could not be written or removed.
    #[error("fragment {}: {message}", .path.display())]
    Io {
        /// Target fragment path.
        path: PathBuf,
        /// Underlying error chain, formatted.
        message: String,
    },
}
