use std::io::Cursor;

use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::{DynamicImage, ImageEncoder, Pixel, Rgba, RgbaImage, imageops};

use crate::core::types::{validate_canvas_size, validate_pixel_ratio};
use crate::error::{ChartError, ChartResult};
use crate::render::{Color, RenderFrame, Renderer};

/// Straight-alpha RGBA8 pixel buffer.
#[derive(Debug, Clone)]
pub struct RasterImage {
    pixels: RgbaImage,
}

impl RasterImage {
    /// Fully transparent image.
    ///
    /// # Panics
    ///
    /// Panics when the buffer size overflows `usize`. Sizes derived from
    /// layout go through [`RasterImage::canvas`] instead.
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            pixels: RgbaImage::new(width, height),
        }
    }

    #[must_use]
    pub fn filled(width: u32, height: u32, color: Color) -> Self {
        Self {
            pixels: RgbaImage::from_pixel(width, height, Rgba(color.to_rgba8())),
        }
    }

    /// Export canvas, filled with `background` or left transparent.
    ///
    /// Fails with `InvalidViewport` above [`crate::core::MAX_CANVAS_PIXELS`].
    pub fn canvas(width: u32, height: u32, background: Option<Color>) -> ChartResult<Self> {
        validate_canvas_size(width, height)?;
        Ok(match background {
            Some(color) => Self::filled(width, height, color),
            None => Self::new(width, height),
        })
    }

    pub fn from_rgba8(width: u32, height: u32, pixels: Vec<u8>) -> ChartResult<Self> {
        let expected = (width as usize)
            .checked_mul(height as usize)
            .and_then(|count| count.checked_mul(4));
        if expected != Some(pixels.len()) {
            return Err(ChartError::InvalidData(format!(
                "rgba buffer of {} bytes does not match {width}x{height}",
                pixels.len()
            )));
        }
        let pixels = RgbaImage::from_raw(width, height, pixels).ok_or_else(|| {
            ChartError::InvalidData(format!("rgba buffer does not fit {width}x{height}"))
        })?;
        Ok(Self { pixels })
    }

    /// Decodes any PNG or JPEG payload.
    pub fn decode(bytes: &[u8]) -> ChartResult<Self> {
        let pixels = image::load_from_memory(bytes)
            .map_err(|err| map_image_error("failed to decode image", err))?
            .to_rgba8();
        Ok(Self { pixels })
    }

    #[must_use]
    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    #[must_use]
    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    #[must_use]
    pub fn as_rgba8(&self) -> &[u8] {
        self.pixels.as_raw()
    }

    #[must_use]
    pub fn into_rgba8(self) -> Vec<u8> {
        self.pixels.into_raw()
    }

    #[must_use]
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        self.pixels.get_pixel_checked(x, y).map(|pixel| pixel.0)
    }

    /// Source-over blends `rgba` onto the pixel at (`x`, `y`).
    pub fn blend_pixel(&mut self, x: u32, y: u32, rgba: [u8; 4]) {
        if let Some(pixel) = self.pixels.get_pixel_mut_checked(x, y) {
            pixel.blend(&Rgba(rgba));
        }
    }

    /// Fills pixels whose centers fall in `[x0, x1) x [y0, y1)`.
    pub fn fill_rect(&mut self, x0: f64, y0: f64, x1: f64, y1: f64, color: Color) {
        if color.is_transparent() {
            return;
        }
        let rgba = color.to_rgba8();
        let (col_start, col_end) = pixel_span(x0.min(x1), x0.max(x1), self.width());
        let (row_start, row_end) = pixel_span(y0.min(y1), y0.max(y1), self.height());
        for y in row_start..row_end {
            for x in col_start..col_end {
                self.blend_pixel(x, y, rgba);
            }
        }
    }

    /// Strokes a segment with square caps; each covered pixel is blended once.
    pub fn stroke_line(&mut self, from: (f64, f64), to: (f64, f64), width: f64, color: Color) {
        if color.is_transparent() || width <= 0.0 {
            return;
        }
        let rgba = color.to_rgba8();
        let half = width / 2.0;
        let (col_start, col_end) =
            pixel_span(from.0.min(to.0) - half, from.0.max(to.0) + half, self.width());
        let (row_start, row_end) =
            pixel_span(from.1.min(to.1) - half, from.1.max(to.1) + half, self.height());

        let dx = to.0 - from.0;
        let dy = to.1 - from.1;
        let length = dx.hypot(dy);
        for y in row_start..row_end {
            for x in col_start..col_end {
                let px = f64::from(x) + 0.5;
                let py = f64::from(y) + 0.5;
                if covers_segment(px, py, from, dx, dy, length, half) {
                    self.blend_pixel(x, y, rgba);
                }
            }
        }
    }

    /// Source-over composites `src` with its top-left corner at (`dx`, `dy`),
    /// clipping whatever falls outside this image.
    pub fn draw_image(&mut self, src: &RasterImage, dx: i64, dy: i64) {
        imageops::overlay(&mut self.pixels, &src.pixels, dx, dy);
    }

    /// Returns a copy with `self` composited over an opaque-or-not background.
    #[must_use]
    pub fn over_background(&self, background: Color) -> Self {
        let mut out = Self::filled(self.width(), self.height(), background);
        out.draw_image(self, 0, 0);
        out
    }

    pub fn encode_png(&self) -> ChartResult<Vec<u8>> {
        let mut buffer = Vec::new();
        PngEncoder::new(&mut buffer)
            .write_image(
                self.pixels.as_raw(),
                self.width(),
                self.height(),
                image::ExtendedColorType::Rgba8,
            )
            .map_err(|err| map_image_error("failed to encode png", err))?;
        Ok(buffer)
    }

    /// JPEG has no alpha channel; pixels are flattened over `matte` first.
    pub fn encode_jpeg(&self, quality: u8, matte: Color) -> ChartResult<Vec<u8>> {
        let opaque = Color {
            alpha: 1.0,
            ..matte
        };
        let rgb = DynamicImage::ImageRgba8(self.over_background(opaque).pixels).into_rgb8();

        let mut cursor = Cursor::new(Vec::new());
        JpegEncoder::new_with_quality(&mut cursor, quality)
            .write_image(
                rgb.as_raw(),
                self.width(),
                self.height(),
                image::ExtendedColorType::Rgb8,
            )
            .map_err(|err| map_image_error("failed to encode jpeg", err))?;
        Ok(cursor.into_inner())
    }
}

/// Pixel index range whose centers lie in `[start, end)`, clamped to `limit`.
fn pixel_span(start: f64, end: f64, limit: u32) -> (u32, u32) {
    let clamp = |value: f64| -> u32 {
        if !value.is_finite() || value <= 0.0 {
            0
        } else if value >= f64::from(limit) {
            limit
        } else {
            value as u32
        }
    };
    let first = clamp((start - 0.5).ceil());
    let last = clamp((end - 0.5).ceil());
    (first, last.max(first))
}

fn covers_segment(
    px: f64,
    py: f64,
    from: (f64, f64),
    dx: f64,
    dy: f64,
    length: f64,
    half: f64,
) -> bool {
    if length <= f64::EPSILON {
        return (px - from.0).abs() <= half && (py - from.1).abs() <= half;
    }
    let ux = dx / length;
    let uy = dy / length;
    let rel_x = px - from.0;
    let rel_y = py - from.1;
    let along = rel_x * ux + rel_y * uy;
    let across = rel_x * -uy + rel_y * ux;
    along >= -half && along <= length + half && across.abs() <= half
}

impl PartialEq for RasterImage {
    fn eq(&self, other: &Self) -> bool {
        self.pixels.dimensions() == other.pixels.dimensions()
            && self.pixels.as_raw() == other.pixels.as_raw()
    }
}

impl Eq for RasterImage {}

fn map_image_error(prefix: &str, err: image::ImageError) -> ChartError {
    ChartError::Encode(format!("{prefix}: {err}"))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RasterRenderStats {
    pub lines_drawn: usize,
    pub rects_drawn: usize,
    pub texts_skipped: usize,
}

/// CPU rasterizer for `RenderFrame` geometry.
///
/// Rects and lines are rasterized without anti-aliasing. Text needs a font
/// stack and is skipped here; the cairo backend draws it.
#[derive(Debug, Default)]
pub struct SoftwareRasterizer {
    last_stats: RasterRenderStats,
}

impl SoftwareRasterizer {
    #[must_use]
    pub fn last_stats(&self) -> RasterRenderStats {
        self.last_stats
    }
}

impl Renderer for SoftwareRasterizer {
    type Output = RasterImage;

    fn render(&mut self, frame: &RenderFrame, pixel_ratio: f64) -> ChartResult<RasterImage> {
        frame.validate()?;
        validate_pixel_ratio(pixel_ratio)?;

        let (width, height) = frame.viewport.scaled(pixel_ratio);
        let mut image = RasterImage::canvas(width, height, None)?;
        let mut stats = RasterRenderStats::default();
        let s = |value: f64| value * pixel_ratio;

        for rect in &frame.rects {
            let (x0, y0) = (s(rect.x), s(rect.y));
            let (x1, y1) = (s(rect.x + rect.width), s(rect.y + rect.height));
            image.fill_rect(x0, y0, x1, y1, rect.fill_color);
            if rect.border_width > 0.0 {
                let border = s(rect.border_width);
                for (from, to) in [
                    ((x0, y0), (x1, y0)),
                    ((x1, y0), (x1, y1)),
                    ((x1, y1), (x0, y1)),
                    ((x0, y1), (x0, y0)),
                ] {
                    image.stroke_line(from, to, border, rect.border_color);
                }
            }
            stats.rects_drawn += 1;
        }

        for line in &frame.lines {
            image.stroke_line(
                (s(line.x1), s(line.y1)),
                (s(line.x2), s(line.y2)),
                s(line.stroke_width),
                line.color,
            );
            stats.lines_drawn += 1;
        }

        stats.texts_skipped = frame.texts.len();
        self.last_stats = stats;
        Ok(image)
    }
}

#[cfg(test)]
mod tests {
    use super::{RasterImage, SoftwareRasterizer};
    use crate::core::Viewport;
    use crate::error::ChartError;
    use crate::render::{Color, LinePrimitive, RectPrimitive, RenderFrame, Renderer};

    #[test]
    fn fill_rect_covers_pixel_centers_only() {
        let mut image = RasterImage::new(4, 4);
        image.fill_rect(1.0, 1.0, 3.0, 2.0, Color::rgb(1.0, 0.0, 0.0));
        assert_eq!(image.pixel(0, 1), Some([0, 0, 0, 0]));
        assert_eq!(image.pixel(1, 1), Some([255, 0, 0, 255]));
        assert_eq!(image.pixel(2, 1), Some([255, 0, 0, 255]));
        assert_eq!(image.pixel(3, 1), Some([0, 0, 0, 0]));
        assert_eq!(image.pixel(1, 2), Some([0, 0, 0, 0]));
    }

    #[test]
    fn translucent_source_over_transparent_keeps_color() {
        let mut image = RasterImage::new(1, 1);
        image.blend_pixel(0, 0, [0, 0, 255, 128]);
        assert_eq!(image.pixel(0, 0), Some([0, 0, 255, 128]));
    }

    #[test]
    fn translucent_source_over_opaque_mixes() {
        let mut image = RasterImage::filled(1, 1, Color::rgb(1.0, 1.0, 1.0));
        image.blend_pixel(0, 0, [0, 0, 0, 128]);
        let [red, green, blue, alpha] = image.pixel(0, 0).expect("pixel");
        assert_eq!(alpha, 255);
        assert_eq!(red, green);
        assert_eq!(green, blue);
        assert!((126..=128).contains(&red));
    }

    #[test]
    fn draw_image_clips_negative_offsets() {
        let src = RasterImage::filled(3, 3, Color::rgb(0.0, 1.0, 0.0));
        let mut dst = RasterImage::new(4, 4);
        dst.draw_image(&src, -2, 2);
        assert_eq!(dst.pixel(0, 2), Some([0, 255, 0, 255]));
        assert_eq!(dst.pixel(1, 2), Some([0, 0, 0, 0]));
        assert_eq!(dst.pixel(0, 1), Some([0, 0, 0, 0]));
    }

    #[test]
    fn canvas_rejects_oversized_buffers() {
        let err = RasterImage::canvas(100_000, 100_000, None).expect_err("too large");
        assert!(matches!(
            err,
            ChartError::InvalidViewport {
                width: 100_000,
                height: 100_000
            }
        ));
        let canvas = RasterImage::canvas(2, 2, Some(Color::WHITE)).expect("canvas");
        assert_eq!(canvas.pixel(1, 1), Some([255, 255, 255, 255]));
        assert_eq!(canvas.pixel(2, 0), None);
    }

    #[test]
    fn rasterizer_rejects_oversized_pixel_ratio() {
        let frame = RenderFrame::new(Viewport::new(10, 10));
        let err = SoftwareRasterizer::default()
            .render(&frame, 1.0e7)
            .expect_err("oversized");
        assert!(matches!(err, ChartError::InvalidViewport { .. }));
    }

    #[test]
    fn from_rgba8_checks_buffer_length() {
        assert!(RasterImage::from_rgba8(2, 2, vec![0; 15]).is_err());
        let image = RasterImage::from_rgba8(1, 1, vec![1, 2, 3, 4]).expect("rgba");
        assert_eq!(image.pixel(0, 0), Some([1, 2, 3, 4]));
    }

    #[test]
    fn rasterizer_scales_by_pixel_ratio() {
        let frame = RenderFrame::new(Viewport::new(10, 5))
            .with_rect(RectPrimitive::new(0.0, 0.0, 5.0, 5.0, Color::rgb(0.0, 0.0, 1.0)))
            .with_line(LinePrimitive::new(
                0.0,
                4.5,
                10.0,
                4.5,
                1.0,
                Color::rgb(1.0, 0.0, 0.0),
            ));
        let mut rasterizer = SoftwareRasterizer::default();
        let image = rasterizer.render(&frame, 2.0).expect("render");

        assert_eq!((image.width(), image.height()), (20, 10));
        assert_eq!(image.pixel(9, 0), Some([0, 0, 255, 255]));
        assert_eq!(image.pixel(10, 0), Some([0, 0, 0, 0]));
        assert_eq!(image.pixel(15, 9), Some([255, 0, 0, 255]));
        assert_eq!(rasterizer.last_stats().lines_drawn, 1);
        assert_eq!(rasterizer.last_stats().rects_drawn, 1);
    }

    #[test]
    fn png_round_trip_preserves_pixels() {
        let mut image = RasterImage::new(3, 2);
        image.fill_rect(0.0, 0.0, 1.0, 2.0, Color::rgba(1.0, 0.0, 0.0, 0.5));
        let decoded = RasterImage::decode(&image.encode_png().expect("encode")).expect("decode");
        assert_eq!(decoded, image);
    }
}
