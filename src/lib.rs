//! chart-connect: coordination layer for independently rendered chart
//! instances.
//!
//! Instances joined into a group mirror each other's actions, and a group
//! can be exported as one composite PNG, JPEG or SVG data URL laid out the
//! way the members sit in the host layout.

pub mod api;
pub mod core;
pub mod error;
pub mod extensions;
pub mod interaction;
pub mod render;
pub mod telemetry;

pub use api::{ChartConnector, ConnectorConfig, ExportOptions, ExportResult, GroupId, ImageType};
pub use error::{ChartError, ChartResult};
