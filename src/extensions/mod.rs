//! Optional hooks that observe the connector without mutating it.

pub mod plugins;

pub use plugins::{ConnectorEvent, ConnectorPlugin, PluginRegistry};
