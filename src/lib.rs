//! Telegraf plugin configuration fragments.
//!
//! Turns declarative plugin declarations into TOML fragment files under the
//! agent's `telegraf.d` directory, one `<name>.conf` per plugin, and keeps
//! those files in step with the declarations.
//!
//! The public API is organised into layers:
//!
//! - **[`value`]** and **[`render`]**: the closed value model and its TOML serializer
//! - **[`config`]**: plugin declarations and the manifest they are loaded from
//! - **[`reconcile`]**: pure declaration → fragment + dependency edges
//! - **[`resources`]** and **[`processing`]**: idempotent materialization on disk
//! - **[`agent`]**: install and service collaborators
//! - **[`commands`]**: top-level subcommand orchestration (`plan`, `apply`, `render`)
#![deny(clippy::or_fun_call)]
#![deny(clippy::bool_to_int_with_if)]

pub mod agent;
pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod exec;
pub mod logging;
pub mod platform;
pub mod processing;
pub mod reconcile;
pub mod render;
pub mod resources;
pub mod value;
