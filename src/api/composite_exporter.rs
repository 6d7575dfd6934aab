use std::fmt::Write as _;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::types::{scale_len, validate_pixel_ratio};
use crate::core::{BoundingBox, ContainerRect, InstanceHandle, InstanceId, RendererKind};
use crate::error::{ChartError, ChartResult};
use crate::render::svg::{background_rect, fmt_num, root_element, svg_document};
use crate::render::{Color, RasterImage};

use super::data_url::encode_base64;
use super::{
    ConnectorConfig, ExportOptions, ImageType, SingleSurfaceResult, SurfaceExporter,
    SurfacePayload,
};

/// Encoded composite of a whole group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportResult {
    pub data_url: String,
    pub mime_type: String,
    pub width: u32,
    pub height: u32,
}

/// One member after kind resolution, before any surface is read.
struct PlannedMember<'a> {
    handle: &'a InstanceHandle,
    rect: ContainerRect,
    encoding: RendererKind,
}

/// Merges the surfaces of a group into one image.
#[derive(Debug, Default, Clone, Copy)]
pub struct CompositeExporter {
    surfaces: SurfaceExporter,
}

impl CompositeExporter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Composes `members` (group iteration order) into one data URL.
    ///
    /// `requester` names the instance the export was requested from and is
    /// only used for the `EmptyGroup` error. Every kind check runs before
    /// the first surface is read.
    pub fn export(
        &self,
        requester: InstanceId,
        members: &[InstanceHandle],
        options: &ExportOptions,
        config: &ConnectorConfig,
    ) -> ChartResult<ExportResult> {
        options.validate()?;
        if members.is_empty() {
            return Err(ChartError::EmptyGroup(requester));
        }

        let encoding = options.encoding();
        let pixel_ratio = options.pixel_ratio.unwrap_or(config.default_pixel_ratio);
        validate_pixel_ratio(pixel_ratio)?;

        let plan = plan_members(members, encoding, options)?;
        let bbox = BoundingBox::enclosing(plan.iter().map(|member| member.rect))
            .ok_or(ChartError::EmptyGroup(requester))?;
        let origin = (bbox.left, bbox.top);

        let background = options
            .background_color
            .filter(|color| !color.is_transparent());

        let (payload, width, height) = match encoding {
            RendererKind::Raster => {
                let (width, height) = bbox.scaled_size(pixel_ratio);
                let mut canvas = RasterImage::canvas(width, height, background)?;
                for member in &plan {
                    let surface = self.surfaces.export_at(
                        member.handle,
                        RendererKind::Raster,
                        None,
                        pixel_ratio,
                        origin,
                    )?;
                    let SurfacePayload::Raster(image) = &surface.payload else {
                        return Err(ChartError::Encode(format!(
                            "instance {} returned a non-raster surface",
                            surface.instance
                        )));
                    };
                    canvas.draw_image(
                        image,
                        device_offset(surface.offset_x, pixel_ratio),
                        device_offset(surface.offset_y, pixel_ratio),
                    );
                }
                (SurfacePayload::Raster(canvas), width, height)
            }
            RendererKind::Vector => {
                let mut body = String::new();
                if let Some(color) = background {
                    body.push_str(&background_rect(bbox.width(), bbox.height(), color));
                }
                for member in &plan {
                    let surface = self.surfaces.export_at(
                        member.handle,
                        member.encoding,
                        None,
                        pixel_ratio,
                        origin,
                    )?;
                    embed_vector_member(&mut body, &surface, member.rect)?;
                }
                let markup = svg_document(bbox.width(), bbox.height(), &body);
                (
                    SurfacePayload::Vector(markup),
                    scale_len(bbox.width(), 1.0),
                    scale_len(bbox.height(), 1.0),
                )
            }
        };

        let matte = options.background_color.unwrap_or(Color::WHITE);
        let data_url = payload.to_data_url(options.image_type, config, matte)?;
        debug!(
            requester = %requester,
            members = plan.len(),
            image_type = %options.image_type,
            width,
            height,
            "exported connected group"
        );
        Ok(ExportResult {
            data_url,
            mime_type: options.image_type.mime_type().to_owned(),
            width,
            height,
        })
    }
}

fn plan_members<'a>(
    members: &'a [InstanceHandle],
    encoding: RendererKind,
    options: &ExportOptions,
) -> ChartResult<Vec<PlannedMember<'a>>> {
    let mut plan = Vec::with_capacity(members.len());
    for handle in members {
        let (kind, rect) =
            handle.with_instance(|instance| (instance.renderer_kind(), instance.container_rect()))?;
        rect.validate()?;

        let member_encoding = match options.member_encodings.get(&handle.id()) {
            Some(&explicit) => explicit,
            None if kind == encoding => kind,
            None => {
                return Err(ChartError::MixedRenderer {
                    requested: encoding,
                    instance: handle.id(),
                    found: kind,
                });
            }
        };
        // A raster canvas cannot host vector markup; a vector document can
        // host raster members as embedded images.
        if encoding == RendererKind::Raster && member_encoding == RendererKind::Vector {
            return Err(ChartError::UnsupportedEncoding {
                requested: RendererKind::Raster,
                instance: handle.id(),
            });
        }
        let supported = handle.with_instance(|instance| instance.supports_encoding(member_encoding))?;
        if !supported {
            return Err(ChartError::UnsupportedEncoding {
                requested: member_encoding,
                instance: handle.id(),
            });
        }
        plan.push(PlannedMember {
            handle,
            rect,
            encoding: member_encoding,
        });
    }
    Ok(plan)
}

fn embed_vector_member(
    body: &mut String,
    surface: &SingleSurfaceResult,
    rect: ContainerRect,
) -> ChartResult<()> {
    let _ = write!(
        body,
        r#"<g transform="translate({},{})">"#,
        fmt_num(surface.offset_x),
        fmt_num(surface.offset_y)
    );
    match &surface.payload {
        SurfacePayload::Vector(markup) => body.push_str(root_element(markup)?),
        SurfacePayload::Raster(image) => {
            let href = encode_base64(ImageType::Png.mime_type(), &image.encode_png()?);
            let _ = write!(
                body,
                r#"<image x="0" y="0" width="{}" height="{}" href="{href}"/>"#,
                fmt_num(rect.width),
                fmt_num(rect.height)
            );
        }
    }
    body.push_str("</g>");
    Ok(())
}

fn device_offset(logical: f64, pixel_ratio: f64) -> i64 {
    (logical * pixel_ratio).round() as i64
}
