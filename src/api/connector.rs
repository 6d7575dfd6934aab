use std::cell::RefCell;
use std::rc::Rc;

use tracing::debug;

use crate::core::{ActionRecord, ChartInstance, InstanceHandle, InstanceId};
use crate::error::{ChartError, ChartResult};
use crate::extensions::{ConnectorEvent, ConnectorPlugin, PluginRegistry};
use crate::render::Color;

use super::{
    ActionBroadcaster, CompositeExporter, ConnectorConfig, DispatchReport, ExportOptions,
    ExportResult, GroupId, GroupRegistry, SingleSurfaceResult, SurfaceExporter,
};

/// Coordinates chart instances: grouping, action mirroring and export.
///
/// The connector holds only non-owning handles. Hosts keep their instances
/// in `Rc<RefCell<_>>` and call `dispose` when tearing one down; an instance
/// that is simply dropped is pruned on the next registry traversal.
pub struct ChartConnector {
    config: ConnectorConfig,
    registry: GroupRegistry,
    broadcaster: ActionBroadcaster,
    surfaces: SurfaceExporter,
    composites: CompositeExporter,
    plugins: PluginRegistry,
    next_instance_id: u64,
}

impl Default for ChartConnector {
    fn default() -> Self {
        Self::new()
    }
}

impl ChartConnector {
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: ConnectorConfig::default(),
            registry: GroupRegistry::new(),
            broadcaster: ActionBroadcaster::new(),
            surfaces: SurfaceExporter::new(),
            composites: CompositeExporter::new(),
            plugins: PluginRegistry::default(),
            next_instance_id: 0,
        }
    }

    pub fn with_config(config: ConnectorConfig) -> ChartResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            ..Self::new()
        })
    }

    #[must_use]
    pub fn config(&self) -> &ConnectorConfig {
        &self.config
    }

    #[must_use]
    pub fn registry(&self) -> &GroupRegistry {
        &self.registry
    }

    /// Export options carrying the configured default image type.
    #[must_use]
    pub fn default_options(&self) -> ExportOptions {
        ExportOptions::new(self.config.default_image_type)
    }

    /// Assigns an id to `instance` and returns its handle.
    pub fn register<C>(&mut self, instance: &Rc<RefCell<C>>) -> InstanceHandle
    where
        C: ChartInstance + 'static,
    {
        self.next_instance_id += 1;
        let handle = InstanceHandle::new(InstanceId::new(self.next_instance_id), instance);
        debug!(instance = %handle.id(), "registered chart instance");
        self.plugins.emit(&ConnectorEvent::InstanceRegistered {
            instance: handle.id(),
        });
        handle
    }

    pub fn connect(&mut self, handles: &[InstanceHandle]) -> ChartResult<GroupId> {
        let group = self.registry.connect(handles)?;
        self.emit_connected(&group);
        Ok(group)
    }

    pub fn connect_named(&mut self, name: &str, handles: &[InstanceHandle]) -> ChartResult<GroupId> {
        let group = self.registry.connect_named(name, handles)?;
        self.emit_connected(&group);
        Ok(group)
    }

    /// Removes `handle` from every group. No-op when ungrouped.
    pub fn disconnect(&mut self, handle: &InstanceHandle) -> bool {
        let removed = self.registry.disconnect(handle.id());
        if removed {
            self.plugins.emit(&ConnectorEvent::Disconnected {
                instance: handle.id(),
            });
        }
        removed
    }

    /// Dissolves `group`, returning its former members.
    pub fn disconnect_group(&mut self, group: &GroupId) -> Option<Vec<InstanceId>> {
        let members = self.registry.remove_group(group)?;
        self.plugins.emit(&ConnectorEvent::GroupRemoved {
            group: group.clone(),
        });
        Some(members)
    }

    /// Disposal notification from the instance lifecycle.
    pub fn dispose(&mut self, handle: &InstanceHandle) {
        self.registry.dispose(handle);
        debug!(instance = %handle.id(), "disposed chart instance");
        self.plugins.emit(&ConnectorEvent::Disposed {
            instance: handle.id(),
        });
    }

    /// Applies `action` on `origin` and mirrors it onto every connected peer.
    pub fn dispatch(
        &mut self,
        origin: &InstanceHandle,
        action: ActionRecord,
    ) -> ChartResult<DispatchReport> {
        let kind = action.kind.to_string();
        let report =
            self.broadcaster
                .dispatch(&mut self.registry, origin, action, &mut self.plugins)?;
        self.plugins.emit(&ConnectorEvent::ActionDispatched {
            origin: origin.id(),
            generation: report.generation,
            kind,
            peers_applied: report.applied.len(),
        });
        Ok(report)
    }

    /// Other live members sharing any group with `handle`.
    #[must_use]
    pub fn members_of(&self, handle: &InstanceHandle) -> Vec<InstanceHandle> {
        self.registry.members_of(handle.id())
    }

    #[must_use]
    pub fn groups_of(&self, handle: &InstanceHandle) -> Vec<GroupId> {
        self.registry.groups_of(handle.id())
    }

    /// Single-instance surface export, offsets relative to the instance.
    pub fn export_surface(
        &self,
        handle: &InstanceHandle,
        options: &ExportOptions,
    ) -> ChartResult<SingleSurfaceResult> {
        options.validate()?;
        self.surfaces.export(
            handle,
            options.encoding(),
            options.background_color,
            self.pixel_ratio(options),
        )
    }

    /// Single-instance export as a data URL.
    pub fn get_data_url(
        &mut self,
        handle: &InstanceHandle,
        options: &ExportOptions,
    ) -> ChartResult<String> {
        let surface = self.export_surface(handle, options)?;
        let matte = options
            .background_color
            .or_else(|| {
                handle
                    .with_instance(|instance| instance.background_color())
                    .ok()
                    .flatten()
            })
            .unwrap_or(Color::WHITE);
        let data_url = surface
            .payload
            .to_data_url(options.image_type, &self.config, matte)?;
        self.plugins.emit(&ConnectorEvent::Exported {
            instance: handle.id(),
            connected: false,
            mime_type: options.image_type.mime_type().to_owned(),
            width: surface.width,
            height: surface.height,
        });
        Ok(data_url)
    }

    /// Composite export of every instance connected to `handle`.
    pub fn get_connected_data_url(
        &mut self,
        handle: &InstanceHandle,
        options: &ExportOptions,
    ) -> ChartResult<String> {
        self.export_connected(handle, options)
            .map(|result| result.data_url)
    }

    pub fn export_connected(
        &mut self,
        handle: &InstanceHandle,
        options: &ExportOptions,
    ) -> ChartResult<ExportResult> {
        if !handle.is_alive() {
            return Err(ChartError::DisposedInstance(handle.id()));
        }
        let members = self
            .registry
            .connected_set(handle.id())
            .ok_or(ChartError::EmptyGroup(handle.id()))?;
        let result = self
            .composites
            .export(handle.id(), &members, options, &self.config)?;
        self.emit_exported(handle.id(), &result);
        Ok(result)
    }

    /// Composite export of one group, addressed by id.
    pub fn export_group(
        &mut self,
        group: &GroupId,
        options: &ExportOptions,
    ) -> ChartResult<ExportResult> {
        let members = self
            .registry
            .members(group)
            .ok_or_else(|| ChartError::InvalidGroup(format!("unknown group `{group}`")))?;
        let requester = members
            .first()
            .map(InstanceHandle::id)
            .ok_or_else(|| ChartError::InvalidGroup(format!("group `{group}` has no live members")))?;
        let result = self
            .composites
            .export(requester, &members, options, &self.config)?;
        self.emit_exported(requester, &result);
        Ok(result)
    }

    pub fn register_plugin(&mut self, plugin: Box<dyn ConnectorPlugin>) -> ChartResult<()> {
        self.plugins.register(plugin)
    }

    pub fn unregister_plugin(&mut self, plugin_id: &str) -> bool {
        self.plugins.unregister(plugin_id)
    }

    #[must_use]
    pub fn plugin_count(&self) -> usize {
        self.plugins.len()
    }

    #[must_use]
    pub fn has_plugin(&self, plugin_id: &str) -> bool {
        self.plugins.has(plugin_id)
    }

    fn pixel_ratio(&self, options: &ExportOptions) -> f64 {
        options.pixel_ratio.unwrap_or(self.config.default_pixel_ratio)
    }

    fn emit_connected(&mut self, group: &GroupId) {
        let members = self
            .registry
            .members(group)
            .unwrap_or_default()
            .iter()
            .map(InstanceHandle::id)
            .collect();
        self.plugins.emit(&ConnectorEvent::Connected {
            group: group.clone(),
            members,
        });
    }

    fn emit_exported(&mut self, instance: InstanceId, result: &ExportResult) {
        self.plugins.emit(&ConnectorEvent::Exported {
            instance,
            connected: true,
            mime_type: result.mime_type.clone(),
            width: result.width,
            height: result.height,
        });
    }
}
