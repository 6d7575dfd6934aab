use cairo::{Context, Format, ImageSurface};
use pango::FontDescription;

use crate::core::types::{validate_canvas_size, validate_pixel_ratio};
use crate::error::{ChartError, ChartResult};
use crate::render::{Color, RasterImage, RectPrimitive, RenderFrame, Renderer, TextHAlign};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CairoRenderStats {
    pub lines_drawn: usize,
    pub rects_drawn: usize,
    pub texts_drawn: usize,
}

/// Cairo + Pango + PangoCairo raster backend.
///
/// Unlike `SoftwareRasterizer` it anti-aliases geometry and draws text.
/// Each render pass paints into a fresh offscreen image surface, which is
/// then converted to a straight-alpha `RasterImage`.
#[derive(Debug, Default)]
pub struct CairoRasterizer {
    font_family: Option<String>,
    last_stats: CairoRenderStats,
}

impl CairoRasterizer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_font_family(mut self, family: impl Into<String>) -> Self {
        self.font_family = Some(family.into());
        self
    }

    #[must_use]
    pub fn backend_name(&self) -> &'static str {
        "cairo+pango+pangocairo"
    }

    #[must_use]
    pub fn last_stats(&self) -> CairoRenderStats {
        self.last_stats
    }

    fn draw(&self, context: &Context, frame: &RenderFrame) -> ChartResult<CairoRenderStats> {
        let mut stats = CairoRenderStats::default();

        for rect in &frame.rects {
            append_rect_path(context, *rect);
            apply_color(context, rect.fill_color);
            if rect.border_width > 0.0 {
                context
                    .fill_preserve()
                    .map_err(|err| map_backend_error("failed to fill rectangle", err))?;
                apply_color(context, rect.border_color);
                context.set_line_width(rect.border_width);
                context
                    .stroke()
                    .map_err(|err| map_backend_error("failed to stroke rectangle border", err))?;
            } else {
                context
                    .fill()
                    .map_err(|err| map_backend_error("failed to fill rectangle", err))?;
            }
            stats.rects_drawn += 1;
        }

        for line in &frame.lines {
            apply_color(context, line.color);
            context.set_line_width(line.stroke_width);
            context.move_to(line.x1, line.y1);
            context.line_to(line.x2, line.y2);
            context
                .stroke()
                .map_err(|err| map_backend_error("failed to stroke line", err))?;
            stats.lines_drawn += 1;
        }

        let family = self.font_family.as_deref().unwrap_or("Sans");
        for text in &frame.texts {
            let layout = pangocairo::functions::create_layout(context);
            let font_description =
                FontDescription::from_string(&format!("{family} {}", text.font_size_px));
            layout.set_font_description(Some(&font_description));
            layout.set_text(&text.text);

            let (text_width, _text_height) = layout.pixel_size();
            let x = match text.h_align {
                TextHAlign::Left => text.x,
                TextHAlign::Center => text.x - f64::from(text_width) / 2.0,
                TextHAlign::Right => text.x - f64::from(text_width),
            };

            apply_color(context, text.color);
            context.move_to(x, text.y);
            pangocairo::functions::show_layout(context, &layout);
            stats.texts_drawn += 1;
        }

        Ok(stats)
    }
}

impl Renderer for CairoRasterizer {
    type Output = RasterImage;

    fn render(&mut self, frame: &RenderFrame, pixel_ratio: f64) -> ChartResult<RasterImage> {
        frame.validate()?;
        validate_pixel_ratio(pixel_ratio)?;

        let (width, height) = frame.viewport.scaled(pixel_ratio);
        validate_canvas_size(width, height)?;
        let surface_width = i32::try_from(width)
            .map_err(|_| ChartError::InvalidData("cairo surface too wide".to_owned()))?;
        let surface_height = i32::try_from(height)
            .map_err(|_| ChartError::InvalidData("cairo surface too tall".to_owned()))?;
        if surface_width <= 0 || surface_height <= 0 {
            return Err(ChartError::InvalidData(
                "cairo surface size must be > 0".to_owned(),
            ));
        }

        let mut surface = ImageSurface::create(Format::ARgb32, surface_width, surface_height)
            .map_err(|err| map_backend_error("failed to create cairo surface", err))?;
        {
            let context = Context::new(&surface)
                .map_err(|err| map_backend_error("failed to create cairo context", err))?;
            context.scale(pixel_ratio, pixel_ratio);
            self.last_stats = self.draw(&context, frame)?;
        }
        surface.flush();

        let stride = usize::try_from(surface.stride())
            .map_err(|_| ChartError::InvalidData("negative cairo stride".to_owned()))?;
        let data = surface
            .data()
            .map_err(|err| ChartError::Encode(format!("failed to read cairo surface: {err}")))?;
        let row_len = width as usize;
        let mut pixels = Vec::with_capacity(row_len * height as usize * 4);
        for row in data.chunks(stride).take(height as usize) {
            for texel in row[..row_len * 4].chunks_exact(4) {
                let argb = u32::from_ne_bytes([texel[0], texel[1], texel[2], texel[3]]);
                pixels.extend_from_slice(&unpremultiply(argb));
            }
        }
        RasterImage::from_rgba8(width, height, pixels)
    }
}

fn unpremultiply(argb: u32) -> [u8; 4] {
    let alpha = (argb >> 24) & 0xff;
    if alpha == 0 {
        return [0; 4];
    }
    let channel = |shift: u32| -> u8 {
        let premultiplied = (argb >> shift) & 0xff;
        ((premultiplied * 255 + alpha / 2) / alpha).min(255) as u8
    };
    [channel(16), channel(8), channel(0), alpha as u8]
}

fn apply_color(context: &Context, color: Color) {
    context.set_source_rgba(color.red, color.green, color.blue, color.alpha);
}

fn append_rect_path(context: &Context, rect: RectPrimitive) {
    context.rectangle(rect.x, rect.y, rect.width, rect.height);
}

fn map_backend_error(prefix: &str, err: cairo::Error) -> ChartError {
    ChartError::Encode(format!("{prefix}: {err}"))
}
