//! Plugin declarations and the manifest they are loaded from.
pub mod declaration;
pub mod manifest;
pub mod toml_loader;

pub use declaration::{Ensure, PluginDeclaration, PluginKind};
pub use manifest::{AgentSection, Manifest, RawPlugin};
