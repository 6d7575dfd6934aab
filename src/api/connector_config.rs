use serde::{Deserialize, Serialize};

use crate::core::types::validate_pixel_ratio;
use crate::error::{ChartError, ChartResult};

use super::{ImageType, SvgDataUrlEncoding};

/// Connector-wide export defaults.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConnectorConfig {
    /// Used when an export request carries no pixel ratio.
    #[serde(default = "default_pixel_ratio")]
    pub default_pixel_ratio: f64,
    #[serde(default)]
    pub svg_data_url_encoding: SvgDataUrlEncoding,
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,
    #[serde(default)]
    pub default_image_type: ImageType,
}

impl Default for ConnectorConfig {
    fn default() -> Self {
        Self {
            default_pixel_ratio: default_pixel_ratio(),
            svg_data_url_encoding: SvgDataUrlEncoding::default(),
            jpeg_quality: default_jpeg_quality(),
            default_image_type: ImageType::default(),
        }
    }
}

impl ConnectorConfig {
    #[must_use]
    pub fn with_default_pixel_ratio(mut self, pixel_ratio: f64) -> Self {
        self.default_pixel_ratio = pixel_ratio;
        self
    }

    #[must_use]
    pub fn with_svg_data_url_encoding(mut self, encoding: SvgDataUrlEncoding) -> Self {
        self.svg_data_url_encoding = encoding;
        self
    }

    #[must_use]
    pub fn with_jpeg_quality(mut self, quality: u8) -> Self {
        self.jpeg_quality = quality;
        self
    }

    #[must_use]
    pub fn with_default_image_type(mut self, image_type: ImageType) -> Self {
        self.default_image_type = image_type;
        self
    }

    pub fn validate(&self) -> ChartResult<()> {
        validate_pixel_ratio(self.default_pixel_ratio)?;
        if !(1..=100).contains(&self.jpeg_quality) {
            return Err(ChartError::InvalidData(format!(
                "jpeg quality must be in 1..=100, got {}",
                self.jpeg_quality
            )));
        }
        Ok(())
    }

    /// Serializes config to pretty JSON for debug/config files.
    pub fn to_json_pretty(self) -> ChartResult<String> {
        serde_json::to_string_pretty(&self)
            .map_err(|e| ChartError::InvalidData(format!("failed to serialize config: {e}")))
    }

    /// Deserializes and validates config from JSON.
    pub fn from_json_str(input: &str) -> ChartResult<Self> {
        let config: Self = serde_json::from_str(input)
            .map_err(|e| ChartError::InvalidData(format!("failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }
}

fn default_pixel_ratio() -> f64 {
    1.0
}

fn default_jpeg_quality() -> u8 {
    92
}
