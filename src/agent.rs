//! Install and service collaborators for the agent.
//!
//! Fragments are ordered against these through [`DependencyEdge`]s: the
//! installer must succeed before a fragment is written, and the service is
//! notified when a fragment's content changes.
//!
//! [`DependencyEdge`]: crate::reconcile::DependencyEdge
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::error::CollaboratorError;
use crate::exec::Executor;
use crate::platform::OsFamily;

/// Name of the agent binary and service.
pub const AGENT: &str = "telegraf";

/// Ensures the agent is installed before configuration is written.
#[cfg_attr(test, mockall::automock)]
pub trait Installer: Send + Sync {
    /// Succeed if the agent is installed.
    ///
    /// # Errors
    ///
    /// Returns [`CollaboratorError::Install`] if it is not.
    fn ensure_installed(&self) -> Result<(), CollaboratorError>;
}

/// Receives change notifications for the agent's configuration.
#[cfg_attr(test, mockall::automock)]
pub trait Service: Send + Sync {
    /// React to a configuration change, normally by restarting the agent.
    ///
    /// # Errors
    ///
    /// Returns [`CollaboratorError::Service`] if the service manager fails.
    fn notify(&self) -> Result<(), CollaboratorError>;
}

/// Checks that the agent binary is on `PATH`.
#[derive(Debug)]
pub struct AgentInstall {
    executor: Arc<dyn Executor>,
}

impl AgentInstall {
    /// Create an install check backed by `executor`.
    #[must_use]
    pub fn new(executor: Arc<dyn Executor>) -> Self {
        Self { executor }
    }
}

impl Installer for AgentInstall {
    fn ensure_installed(&self) -> Result<(), CollaboratorError> {
        if self.executor.which(AGENT) {
            Ok(())
        } else {
            Err(CollaboratorError::Install {
                reason: format!("{AGENT} not found on PATH"),
            })
        }
    }
}

/// Restarts the agent with the OS family's service manager.
#[derive(Debug)]
pub struct AgentService {
    family: OsFamily,
    executor: Arc<dyn Executor>,
}

impl AgentService {
    /// Create a service collaborator for `family`.
    #[must_use]
    pub fn new(family: OsFamily, executor: Arc<dyn Executor>) -> Self {
        Self { family, executor }
    }

    /// Service manager program for this family.
    #[must_use]
    pub const fn service_manager(&self) -> &'static str {
        match self.family {
            OsFamily::Linux => "systemctl",
            OsFamily::Darwin => "brew",
            OsFamily::FreeBSD => "service",
            OsFamily::Windows => "powershell",
        }
    }

    /// Arguments that make [`service_manager`](Self::service_manager) restart
    /// the agent.
    #[must_use]
    pub const fn restart_args(&self) -> &'static [&'static str] {
        match self.family {
            OsFamily::Linux => &["restart", AGENT],
            OsFamily::Darwin => &["services", "restart", AGENT],
            OsFamily::FreeBSD => &[AGENT, "restart"],
            OsFamily::Windows => &["-NoProfile", "-Command", "Restart-Service", AGENT],
        }
    }
}

impl Service for AgentService {
    fn notify(&self) -> Result<(), CollaboratorError> {
        self.executor
            .run(self.service_manager(), self.restart_args())
            .map(|_| ())
            .map_err(|e| CollaboratorError::Service {
                reason: format!("{e:#}"),
            })
    }
}

/// Counts notifications without restarting anything (`--no-restart`).
#[derive(Debug, Default)]
pub struct NoRestart {
    requests: AtomicUsize,
}

impl NoRestart {
    /// Number of notifications received.
    #[must_use]
    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

impl Service for NoRestart {
    fn notify(&self) -> Result<(), CollaboratorError> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
