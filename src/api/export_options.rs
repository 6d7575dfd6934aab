use std::fmt;
use std::str::FromStr;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::core::{InstanceId, RendererKind};
use crate::error::{ChartError, ChartResult};
use crate::render::Color;

/// Requested output image type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageType {
    #[default]
    Png,
    Jpeg,
    Svg,
}

impl ImageType {
    #[must_use]
    pub fn encoding(self) -> RendererKind {
        match self {
            Self::Png | Self::Jpeg => RendererKind::Raster,
            Self::Svg => RendererKind::Vector,
        }
    }

    #[must_use]
    pub fn mime_type(self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
            Self::Svg => "image/svg+xml",
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpeg",
            Self::Svg => "svg",
        }
    }
}

impl FromStr for ImageType {
    type Err = ChartError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "png" => Ok(Self::Png),
            "jpeg" | "jpg" => Ok(Self::Jpeg),
            "svg" => Ok(Self::Svg),
            other => Err(ChartError::InvalidData(format!(
                "unsupported image type `{other}`"
            ))),
        }
    }
}

impl fmt::Display for ImageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Options of `get_data_url` / `get_connected_data_url`.
///
/// For a single export `background_color` replaces the instance's own
/// background. For a connected export it paints the composite canvas only,
/// so it shows where no member covers it.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ExportOptions {
    #[serde(rename = "type", default)]
    pub image_type: ImageType,
    #[serde(default)]
    pub background_color: Option<Color>,
    #[serde(default)]
    pub pixel_ratio: Option<f64>,
    /// Explicit per-member encodings that acknowledge a renderer-kind
    /// mismatch for a connected export.
    #[serde(default)]
    pub member_encodings: IndexMap<InstanceId, RendererKind>,
}

impl ExportOptions {
    #[must_use]
    pub fn new(image_type: ImageType) -> Self {
        Self {
            image_type,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn png() -> Self {
        Self::new(ImageType::Png)
    }

    #[must_use]
    pub fn svg() -> Self {
        Self::new(ImageType::Svg)
    }

    #[must_use]
    pub fn with_background(mut self, color: Color) -> Self {
        self.background_color = Some(color);
        self
    }

    /// Parses `color` as CSS.
    pub fn with_background_css(self, color: &str) -> ChartResult<Self> {
        Ok(self.with_background(Color::parse_css(color)?))
    }

    #[must_use]
    pub fn with_pixel_ratio(mut self, pixel_ratio: f64) -> Self {
        self.pixel_ratio = Some(pixel_ratio);
        self
    }

    #[must_use]
    pub fn with_member_encoding(mut self, instance: InstanceId, encoding: RendererKind) -> Self {
        self.member_encodings.insert(instance, encoding);
        self
    }

    #[must_use]
    pub fn encoding(&self) -> RendererKind {
        self.image_type.encoding()
    }

    pub fn validate(&self) -> ChartResult<()> {
        if let Some(color) = self.background_color {
            color.validate()?;
        }
        if let Some(pixel_ratio) = self.pixel_ratio {
            crate::core::types::validate_pixel_ratio(pixel_ratio)?;
        }
        Ok(())
    }
}
