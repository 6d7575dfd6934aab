use serde::{Deserialize, Serialize};

use crate::error::{ChartError, ChartResult};

/// Logical drawing size of one chart surface, in CSS pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    #[must_use]
    pub fn is_valid(self) -> bool {
        self.width > 0 && self.height > 0
    }

    /// Device-pixel size for `pixel_ratio`, rounded to the nearest pixel.
    #[must_use]
    pub fn scaled(self, pixel_ratio: f64) -> (u32, u32) {
        (
            scale_len(f64::from(self.width), pixel_ratio),
            scale_len(f64::from(self.height), pixel_ratio),
        )
    }
}

/// Position and size of an instance's container, as reported by the host
/// layout (the DOM bounding client rect in a browser host).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ContainerRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl ContainerRect {
    #[must_use]
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    #[must_use]
    pub fn right(self) -> f64 {
        self.x + self.width
    }

    #[must_use]
    pub fn bottom(self) -> f64 {
        self.y + self.height
    }

    pub fn validate(self) -> ChartResult<()> {
        if !self.x.is_finite()
            || !self.y.is_finite()
            || !self.width.is_finite()
            || !self.height.is_finite()
        {
            return Err(ChartError::InvalidData(
                "container rect must be finite".to_owned(),
            ));
        }
        if self.width < 0.0 || self.height < 0.0 {
            return Err(ChartError::InvalidData(
                "container rect size must be >= 0".to_owned(),
            ));
        }
        Ok(())
    }
}

/// Minimal axis-aligned box enclosing a set of container rects.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub left: f64,
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
}

impl BoundingBox {
    /// Returns `None` for an empty iterator.
    pub fn enclosing<I>(rects: I) -> Option<Self>
    where
        I: IntoIterator<Item = ContainerRect>,
    {
        rects.into_iter().fold(None, |acc, rect| {
            Some(match acc {
                None => Self {
                    left: rect.x,
                    top: rect.y,
                    right: rect.right(),
                    bottom: rect.bottom(),
                },
                Some(bbox) => Self {
                    left: bbox.left.min(rect.x),
                    top: bbox.top.min(rect.y),
                    right: bbox.right.max(rect.right()),
                    bottom: bbox.bottom.max(rect.bottom()),
                },
            })
        })
    }

    #[must_use]
    pub fn width(self) -> f64 {
        self.right - self.left
    }

    #[must_use]
    pub fn height(self) -> f64 {
        self.bottom - self.top
    }

    /// Offset of `rect` from the box's top-left corner, in logical pixels.
    #[must_use]
    pub fn offset_of(self, rect: ContainerRect) -> (f64, f64) {
        (rect.x - self.left, rect.y - self.top)
    }

    /// Canvas size in device pixels.
    #[must_use]
    pub fn scaled_size(self, pixel_ratio: f64) -> (u32, u32) {
        (
            scale_len(self.width(), pixel_ratio),
            scale_len(self.height(), pixel_ratio),
        )
    }
}

pub(crate) fn scale_len(len: f64, pixel_ratio: f64) -> u32 {
    let scaled = (len * pixel_ratio).round();
    if scaled <= 0.0 {
        0
    } else if scaled >= f64::from(u32::MAX) {
        u32::MAX
    } else {
        scaled as u32
    }
}

/// Largest raster canvas any export allocates: 16384 x 16384 device pixels.
pub const MAX_CANVAS_PIXELS: u64 = 16_384 * 16_384;

pub(crate) fn validate_canvas_size(width: u32, height: u32) -> ChartResult<()> {
    match u64::from(width).checked_mul(u64::from(height)) {
        Some(pixels) if pixels <= MAX_CANVAS_PIXELS => Ok(()),
        _ => Err(ChartError::InvalidViewport { width, height }),
    }
}

pub(crate) fn validate_pixel_ratio(pixel_ratio: f64) -> ChartResult<()> {
    if !pixel_ratio.is_finite() || pixel_ratio <= 0.0 {
        return Err(ChartError::InvalidData(format!(
            "pixel ratio must be finite and > 0, got {pixel_ratio}"
        )));
    }
    Ok(())
}
