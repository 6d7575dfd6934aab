//! Public connector surface: group membership, action mirroring and
//! single/connected image export.

mod broadcaster;
mod composite_exporter;
mod connector;
mod connector_config;
pub mod data_url;
mod export_options;
mod registry;
mod scene_chart;
mod surface_exporter;

pub use broadcaster::{
    ActionBroadcaster, DiagnosticsSink, DispatchReport, DispatchSummary, TracingDiagnostics,
};
pub use composite_exporter::{CompositeExporter, ExportResult};
pub use connector::ChartConnector;
pub use connector_config::ConnectorConfig;
pub use data_url::{DataUrl, SvgDataUrlEncoding};
pub use export_options::{ExportOptions, ImageType};
pub use registry::{GroupId, GroupRegistry};
pub use scene_chart::{AppliedAction, SceneChart, SceneChartConfig};
pub use surface_exporter::{SingleSurfaceResult, SurfaceExporter, SurfacePayload};
