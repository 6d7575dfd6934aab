mod layer_stack;
mod primitives;
mod raster;
pub mod svg;

pub use layer_stack::{RenderFrame, SceneLayer, SceneLayerStack};
pub use primitives::{Color, LinePrimitive, RectPrimitive, TextHAlign, TextPrimitive};
pub use raster::{RasterImage, RasterRenderStats, SoftwareRasterizer};
pub use svg::SvgRenderer;

use crate::error::ChartResult;

/// Contract implemented by any rendering backend.
///
/// Backends receive a fully materialized, deterministic `RenderFrame` so
/// drawing code remains isolated from instance state and action handling.
pub trait Renderer {
    type Output;

    fn render(&mut self, frame: &RenderFrame, pixel_ratio: f64) -> ChartResult<Self::Output>;
}

#[cfg(feature = "cairo-backend")]
mod cairo_backend;
#[cfg(feature = "cairo-backend")]
pub use cairo_backend::{CairoRasterizer, CairoRenderStats};
