use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::api::{DiagnosticsSink, GroupId};
use crate::core::InstanceId;
use crate::error::{ChartError, ChartResult};

/// Event stream exposed to plugins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ConnectorEvent {
    InstanceRegistered {
        instance: InstanceId,
    },
    Connected {
        group: GroupId,
        members: Vec<InstanceId>,
    },
    Disconnected {
        instance: InstanceId,
    },
    GroupRemoved {
        group: GroupId,
    },
    Disposed {
        instance: InstanceId,
    },
    ActionDispatched {
        origin: InstanceId,
        generation: u64,
        kind: String,
        peers_applied: usize,
    },
    PeerDispatchFailed {
        origin: InstanceId,
        peer: InstanceId,
        generation: u64,
        message: String,
    },
    Exported {
        instance: InstanceId,
        connected: bool,
        mime_type: String,
        width: u32,
        height: u32,
    },
}

/// Extension hook interface for bounded custom logic.
///
/// Plugins observe connector events; they never receive mutable access to
/// the registry or to instances.
pub trait ConnectorPlugin {
    fn id(&self) -> &str;
    fn on_event(&mut self, event: &ConnectorEvent);
}

/// Plugins keyed by unique id, notified in registration order.
#[derive(Default)]
pub struct PluginRegistry {
    plugins: Vec<Box<dyn ConnectorPlugin>>,
}

impl PluginRegistry {
    pub fn register(&mut self, plugin: Box<dyn ConnectorPlugin>) -> ChartResult<()> {
        let plugin_id = plugin.id().to_owned();
        if plugin_id.is_empty() {
            return Err(ChartError::InvalidData(
                "plugin id must not be empty".to_owned(),
            ));
        }
        if self.has(&plugin_id) {
            return Err(ChartError::InvalidData(format!(
                "plugin with id `{plugin_id}` is already registered"
            )));
        }
        debug!(plugin = %plugin_id, "registered connector plugin");
        self.plugins.push(plugin);
        Ok(())
    }

    /// Unregisters a plugin by id. Returns `true` when removed.
    pub fn unregister(&mut self, plugin_id: &str) -> bool {
        if let Some(position) = self
            .plugins
            .iter()
            .position(|entry| entry.id() == plugin_id)
        {
            self.plugins.remove(position);
            return true;
        }
        false
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    #[must_use]
    pub fn has(&self, plugin_id: &str) -> bool {
        self.plugins.iter().any(|plugin| plugin.id() == plugin_id)
    }

    pub fn emit(&mut self, event: &ConnectorEvent) {
        for plugin in &mut self.plugins {
            plugin.on_event(event);
        }
    }
}

impl DiagnosticsSink for PluginRegistry {
    fn report_peer_failure(&mut self, origin: InstanceId, error: &ChartError) {
        let ChartError::PeerDispatch {
            peer,
            generation,
            source,
        } = error
        else {
            return;
        };
        self.emit(&ConnectorEvent::PeerDispatchFailed {
            origin,
            peer: *peer,
            generation: *generation,
            message: source.to_string(),
        });
    }
}
