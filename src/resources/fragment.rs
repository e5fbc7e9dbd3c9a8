//! Configuration fragment file resource.
use anyhow::{Context as _, Result};
use std::path::{Path, PathBuf};

use super::helpers::fs::{ensure_parent_dir, remove_existing, write_atomic};
use super::{Resource, ResourceChange, ResourceState};
use crate::reconcile::{ConfigFragment, FragmentState};

const DIRECTORY_AT_PATH: &str = "target is a directory";

/// A fragment file that should hold exactly `content`, or not exist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FragmentFile {
    /// Location on disk.
    pub path: PathBuf,
    /// Desired content; `None` means the file should not exist.
    pub content: Option<String>,
}

impl FragmentFile {
    /// A fragment that should exist with `content`.
    #[must_use]
    pub fn present(path: impl Into<PathBuf>, content: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            content: Some(content.into()),
        }
    }

    /// A fragment that should not exist.
    #[must_use]
    pub fn absent(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            content: None,
        }
    }

    /// Path of the fragment file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl From<&ConfigFragment> for FragmentFile {
    fn from(fragment: &ConfigFragment) -> Self {
        match &fragment.state {
            FragmentState::Present { content } => Self::present(&fragment.path, content.as_str()),
            FragmentState::Absent => Self::absent(&fragment.path),
        }
    }
}

impl FragmentFile {
    fn remove(&self) -> Result<ResourceChange> {
        if self.path.is_dir() {
            return Ok(ResourceChange::Skipped {
                reason: DIRECTORY_AT_PATH.to_string(),
            });
        }
        if remove_existing(&self.path)? {
            Ok(ResourceChange::Removed)
        } else {
            Ok(ResourceChange::Unchanged)
        }
    }
}

impl Resource for FragmentFile {
    fn description(&self) -> String {
        self.path.display().to_string()
    }

    fn current_state(&self) -> Result<ResourceState> {
        if self.path.is_dir() {
            return Ok(ResourceState::Blocked {
                reason: DIRECTORY_AT_PATH.to_string(),
            });
        }
        let exists = self.path.symlink_metadata().is_ok();
        let Some(desired) = &self.content else {
            return Ok(if exists {
                ResourceState::Unwanted
            } else {
                ResourceState::Matches
            });
        };
        if !exists {
            return Ok(ResourceState::Missing);
        }
        let current = std::fs::read(&self.path)
            .with_context(|| format!("read fragment: {}", self.path.display()))?;
        if current == desired.as_bytes() {
            Ok(ResourceState::Matches)
        } else {
            Ok(ResourceState::Differs {
                current: String::from_utf8_lossy(&current).into_owned(),
            })
        }
    }

    fn apply(&self) -> Result<ResourceChange> {
        let Some(content) = &self.content else {
            return self.remove();
        };
        match self.current_state()? {
            ResourceState::Matches => Ok(ResourceChange::Unchanged),
            ResourceState::Blocked { reason } => Ok(ResourceChange::Skipped { reason }),
            ResourceState::Missing | ResourceState::Differs { .. } | ResourceState::Unwanted => {
                ensure_parent_dir(&self.path)?;
                write_atomic(&self.path, content.as_bytes())?;
                Ok(ResourceChange::Written)
            }
        }
    }
}
