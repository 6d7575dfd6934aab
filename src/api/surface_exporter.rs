use tracing::debug;

use crate::core::types::{scale_len, validate_pixel_ratio};
use crate::core::{InstanceHandle, InstanceId, RendererKind};
use crate::error::{ChartError, ChartResult};
use crate::render::svg::{background_rect, insert_first_child};
use crate::render::{Color, RasterImage};

use super::data_url::{encode_base64, encode_svg};
use super::{ConnectorConfig, ImageType};

/// Exported surface content of one instance.
#[derive(Debug, Clone, PartialEq)]
pub enum SurfacePayload {
    Raster(RasterImage),
    Vector(String),
}

impl SurfacePayload {
    #[must_use]
    pub fn encoding(&self) -> RendererKind {
        match self {
            Self::Raster(_) => RendererKind::Raster,
            Self::Vector(_) => RendererKind::Vector,
        }
    }

    /// Encodes the payload as a data URL of `image_type`.
    ///
    /// JPEG flattens alpha over `matte`. Vector payloads follow the
    /// configured svg string form.
    pub fn to_data_url(
        &self,
        image_type: ImageType,
        config: &ConnectorConfig,
        matte: Color,
    ) -> ChartResult<String> {
        match (self, image_type) {
            (Self::Raster(image), ImageType::Png) => {
                Ok(encode_base64(image_type.mime_type(), &image.encode_png()?))
            }
            (Self::Raster(image), ImageType::Jpeg) => Ok(encode_base64(
                image_type.mime_type(),
                &image.encode_jpeg(config.jpeg_quality, matte)?,
            )),
            (Self::Vector(markup), ImageType::Svg) => {
                Ok(encode_svg(markup, config.svg_data_url_encoding))
            }
            (payload, image_type) => Err(ChartError::Encode(format!(
                "cannot encode {:?} surface as {image_type}",
                payload.encoding()
            ))),
        }
    }
}

/// Single-instance export.
#[derive(Debug, Clone, PartialEq)]
pub struct SingleSurfaceResult {
    pub instance: InstanceId,
    pub payload: SurfacePayload,
    /// Device pixels for raster payloads, logical pixels for vector ones.
    pub width: u32,
    pub height: u32,
    /// Container position relative to the export origin, logical pixels.
    pub offset_x: f64,
    pub offset_y: f64,
}

/// Reads one instance's surface into an exportable payload.
#[derive(Debug, Default, Clone, Copy)]
pub struct SurfaceExporter;

impl SurfaceExporter {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Exports `handle` with offsets relative to its own position.
    ///
    /// `background` replaces the instance's own background; `None` keeps it.
    pub fn export(
        &self,
        handle: &InstanceHandle,
        encoding: RendererKind,
        background: Option<Color>,
        pixel_ratio: f64,
    ) -> ChartResult<SingleSurfaceResult> {
        let rect = handle.container_rect()?;
        self.export_at(handle, encoding, background, pixel_ratio, (rect.x, rect.y))
    }

    /// Exports `handle` with offsets relative to `origin`, the top-left
    /// corner of the group it is composed into.
    pub fn export_at(
        &self,
        handle: &InstanceHandle,
        encoding: RendererKind,
        background: Option<Color>,
        pixel_ratio: f64,
        origin: (f64, f64),
    ) -> ChartResult<SingleSurfaceResult> {
        if !handle.is_alive() {
            return Err(ChartError::DisposedInstance(handle.id()));
        }
        validate_pixel_ratio(pixel_ratio)?;

        let (rect, payload) = handle.with_instance(|instance| -> ChartResult<_> {
            if !instance.supports_encoding(encoding) {
                return Err(ChartError::UnsupportedEncoding {
                    requested: encoding,
                    instance: handle.id(),
                });
            }
            let rect = instance.container_rect();
            rect.validate()?;
            let background = background
                .or_else(|| instance.background_color())
                .filter(|color| !color.is_transparent());

            let payload = match encoding {
                RendererKind::Raster => {
                    let width = scale_len(rect.width, pixel_ratio);
                    let height = scale_len(rect.height, pixel_ratio);
                    let mut canvas = RasterImage::canvas(width, height, background)?;
                    canvas.draw_image(&instance.read_raster(pixel_ratio)?, 0, 0);
                    SurfacePayload::Raster(canvas)
                }
                RendererKind::Vector => {
                    let markup = instance.read_vector_markup()?;
                    let markup = match background {
                        Some(color) => insert_first_child(
                            &markup,
                            &background_rect(rect.width, rect.height, color),
                        )?,
                        None => markup,
                    };
                    SurfacePayload::Vector(markup)
                }
            };
            Ok((rect, payload))
        })??;

        let (width, height) = match &payload {
            SurfacePayload::Raster(image) => (image.width(), image.height()),
            SurfacePayload::Vector(_) => (scale_len(rect.width, 1.0), scale_len(rect.height, 1.0)),
        };
        debug!(
            instance = %handle.id(),
            encoding = ?encoding,
            width,
            height,
            "exported surface"
        );
        Ok(SingleSurfaceResult {
            instance: handle.id(),
            payload,
            width,
            height,
            offset_x: rect.x - origin.0,
            offset_y: rect.y - origin.1,
        })
    }
}
