pub mod action;
pub mod instance;
pub mod types;

pub use action::{ActionKind, ActionParams, ActionRecord, Propagation};
pub use instance::{ChartInstance, InstanceHandle, InstanceId, RendererKind};
pub use types::{BoundingBox, ContainerRect, MAX_CANVAS_PIXELS, Viewport};
