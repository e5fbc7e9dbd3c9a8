//! On-disk targets that are checked, then converged.
//!
//! A [`Resource`] reports how the disk compares with its target as a
//! [`ResourceState`], and [`Resource::apply`] closes the gap. Callers check
//! first so a dry run can report what would happen without touching disk.
pub mod fragment;
pub mod helpers;

use anyhow::Result;

/// How a resource on disk compares with its target.
///
/// # Examples
///
/// ```
/// use telegraf_conf::resources::ResourceState;
///
/// assert!(ResourceState::Missing.needs_change());
/// assert!(ResourceState::Unwanted.needs_change());
/// assert!(!ResourceState::Matches.needs_change());
/// assert!(!ResourceState::Blocked { reason: "target is a directory".into() }.needs_change());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceState {
    /// Disk already holds the target.
    Matches,
    /// The file should exist but does not.
    Missing,
    /// The file exists with other content.
    Differs {
        /// Content found on disk.
        current: String,
    },
    /// The file exists but should not.
    Unwanted,
    /// Something other than a regular file sits at the path.
    Blocked {
        /// What is in the way.
        reason: String,
    },
}

impl ResourceState {
    /// Whether [`Resource::apply`] would write or remove anything.
    #[must_use]
    pub const fn needs_change(&self) -> bool {
        matches!(self, Self::Missing | Self::Differs { .. } | Self::Unwanted)
    }

    /// The verb describing the pending change, if any.
    #[must_use]
    pub const fn pending_verb(&self) -> Option<&'static str> {
        match self {
            Self::Missing | Self::Differs { .. } => Some("write"),
            Self::Unwanted => Some("remove"),
            Self::Matches | Self::Blocked { .. } => None,
        }
    }
}

/// What [`Resource::apply`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceChange {
    /// The target content was written.
    Written,
    /// The file was deleted.
    Removed,
    /// Disk already matched; nothing was touched.
    Unchanged,
    /// The path was left alone.
    Skipped {
        /// Why the path was left alone.
        reason: String,
    },
}

/// A file with a target state.
pub trait Resource {
    /// Human-readable name for log lines, usually the path.
    fn description(&self) -> String;

    /// Compare disk with the target.
    ///
    /// # Errors
    ///
    /// Returns an error if the path exists but cannot be read.
    fn current_state(&self) -> Result<ResourceState>;

    /// Write or remove the file so disk matches the target.
    ///
    /// Re-checks state first, so calling it on a resource that already
    /// matches returns [`ResourceChange::Unchanged`].
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or removed.
    fn apply(&self) -> Result<ResourceChange>;
}
