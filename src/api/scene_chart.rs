use serde::{Deserialize, Serialize};

use crate::core::{
    ActionRecord, ChartInstance, ContainerRect, Propagation, RendererKind, Viewport,
};
use crate::error::{ChartError, ChartResult};
use crate::interaction::InteractionState;
use crate::render::svg::fmt_num;
use crate::render::{
    Color, RasterImage, RectPrimitive, RenderFrame, SceneLayer, SceneLayerStack, SvgRenderer,
    TextHAlign, TextPrimitive,
};

const ZOOM_SHADE: Color = Color::rgba(0.5, 0.5, 0.5, 0.35);
const EMPHASIS_STROKE: Color = Color::rgb(0.98, 0.78, 0.1);
const TOOLTIP_FILL: Color = Color::rgba(1.0, 1.0, 1.0, 0.9);
const TOOLTIP_BORDER: Color = Color::rgb(0.2, 0.2, 0.2);
const TOOLTIP_SIZE: (f64, f64) = (96.0, 24.0);
const TOOLTIP_GAP: f64 = 8.0;

/// Describes one reference chart instance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SceneChartConfig {
    pub viewport: Viewport,
    /// Container origin in host layout coordinates.
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    #[serde(default = "default_renderer")]
    pub renderer: RendererKind,
    #[serde(default)]
    pub background_color: Option<Color>,
}

impl SceneChartConfig {
    #[must_use]
    pub fn new(viewport: Viewport) -> Self {
        Self {
            viewport,
            x: 0.0,
            y: 0.0,
            renderer: default_renderer(),
            background_color: None,
        }
    }

    #[must_use]
    pub fn at(mut self, x: f64, y: f64) -> Self {
        self.x = x;
        self.y = y;
        self
    }

    #[must_use]
    pub fn with_renderer(mut self, renderer: RendererKind) -> Self {
        self.renderer = renderer;
        self
    }

    #[must_use]
    pub fn with_background(mut self, color: Color) -> Self {
        self.background_color = Some(color);
        self
    }

    pub fn validate(&self) -> ChartResult<()> {
        if !self.viewport.is_valid() {
            return Err(ChartError::InvalidViewport {
                width: self.viewport.width,
                height: self.viewport.height,
            });
        }
        self.container_rect().validate()?;
        if let Some(color) = self.background_color {
            color.validate()?;
        }
        Ok(())
    }

    #[must_use]
    pub fn container_rect(&self) -> ContainerRect {
        ContainerRect::new(
            self.x,
            self.y,
            f64::from(self.viewport.width),
            f64::from(self.viewport.height),
        )
    }

    pub fn from_json_str(input: &str) -> ChartResult<Self> {
        let config: Self = serde_json::from_str(input)
            .map_err(|e| ChartError::InvalidData(format!("failed to parse chart config: {e}")))?;
        config.validate()?;
        Ok(config)
    }
}

fn default_renderer() -> RendererKind {
    RendererKind::Raster
}

/// One action as the instance received it.
#[derive(Debug, Clone, PartialEq)]
pub struct AppliedAction {
    pub record: ActionRecord,
    pub propagation: Propagation,
}

/// Reference `ChartInstance` drawing a fixed content frame plus the overlays
/// its interaction state implies.
#[derive(Debug)]
pub struct SceneChart {
    config: SceneChartConfig,
    content: RenderFrame,
    interaction: InteractionState,
    applied: Vec<AppliedAction>,
}

impl SceneChart {
    pub fn new(config: SceneChartConfig) -> ChartResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            content: RenderFrame::new(config.viewport),
            interaction: InteractionState::default(),
            applied: Vec::new(),
        })
    }

    #[must_use]
    pub fn config(&self) -> &SceneChartConfig {
        &self.config
    }

    /// Replaces the content frame. Its viewport must match the chart's.
    pub fn set_content(&mut self, frame: RenderFrame) -> ChartResult<()> {
        if frame.viewport != self.config.viewport {
            return Err(ChartError::InvalidData(format!(
                "content viewport {}x{} does not match chart viewport {}x{}",
                frame.viewport.width,
                frame.viewport.height,
                self.config.viewport.width,
                self.config.viewport.height
            )));
        }
        frame.validate()?;
        self.content = frame;
        Ok(())
    }

    #[must_use]
    pub fn content(&self) -> &RenderFrame {
        &self.content
    }

    /// Moves the container; the size stays the viewport's.
    pub fn set_position(&mut self, x: f64, y: f64) -> ChartResult<()> {
        ContainerRect::new(x, y, 0.0, 0.0).validate()?;
        self.config.x = x;
        self.config.y = y;
        Ok(())
    }

    pub fn set_background_color(&mut self, color: Option<Color>) -> ChartResult<()> {
        if let Some(color) = color {
            color.validate()?;
        }
        self.config.background_color = color;
        Ok(())
    }

    #[must_use]
    pub fn interaction(&self) -> &InteractionState {
        &self.interaction
    }

    /// Every action applied so far, in order.
    #[must_use]
    pub fn applied_actions(&self) -> &[AppliedAction] {
        &self.applied
    }

    #[must_use]
    pub fn apply_count(&self) -> usize {
        self.applied.len()
    }

    /// Content plus interaction overlays, one frame per layer.
    #[must_use]
    pub fn build_layers(&self) -> SceneLayerStack {
        let viewport = self.config.viewport;
        let (width, height) = (f64::from(viewport.width), f64::from(viewport.height));
        let mut stack = SceneLayerStack::canonical(viewport);
        stack.layer_mut(SceneLayer::Content).extend(self.content.clone());

        let zoom = self.interaction.zoom();
        if !zoom.is_full() {
            let left = width * zoom.start / 100.0;
            let right = width * zoom.end / 100.0;
            let shade = stack.layer_mut(SceneLayer::DataZoom);
            if left > 0.0 {
                shade.rects.push(RectPrimitive::new(0.0, 0.0, left, height, ZOOM_SHADE));
            }
            if right < width {
                shade
                    .rects
                    .push(RectPrimitive::new(right, 0.0, width - right, height, ZOOM_SHADE));
            }
        }

        if !self.interaction.highlights().is_empty() {
            stack.layer_mut(SceneLayer::Emphasis).rects.push(
                RectPrimitive::new(1.0, 1.0, width - 2.0, height - 2.0, Color::TRANSPARENT)
                    .with_border(2.0, EMPHASIS_STROKE),
            );
        }

        let tooltip = self.interaction.tooltip();
        if tooltip.visible {
            let (box_width, box_height) = TOOLTIP_SIZE;
            let x = (tooltip.x + TOOLTIP_GAP).min(width - box_width).max(0.0);
            let y = (tooltip.y + TOOLTIP_GAP).min(height - box_height).max(0.0);
            let layer = stack.layer_mut(SceneLayer::Tooltip);
            layer.rects.push(
                RectPrimitive::new(x, y, box_width, box_height, TOOLTIP_FILL)
                    .with_border(1.0, TOOLTIP_BORDER),
            );
            layer.texts.push(TextPrimitive::new(
                format!("{}, {}", fmt_num(tooltip.x), fmt_num(tooltip.y)),
                x + box_width / 2.0,
                y + box_height / 2.0,
                12.0,
                TOOLTIP_BORDER,
                TextHAlign::Center,
            ));
        }
        stack
    }
}

impl ChartInstance for SceneChart {
    fn renderer_kind(&self) -> RendererKind {
        self.config.renderer
    }

    fn container_rect(&self) -> ContainerRect {
        self.config.container_rect()
    }

    fn background_color(&self) -> Option<Color> {
        self.config.background_color
    }

    fn apply_action(&mut self, action: &ActionRecord, propagation: Propagation) -> ChartResult<()> {
        self.interaction.apply(action)?;
        self.applied.push(AppliedAction {
            record: action.clone(),
            propagation,
        });
        Ok(())
    }

    fn read_raster(&self, pixel_ratio: f64) -> ChartResult<RasterImage> {
        #[cfg(feature = "cairo-backend")]
        let mut rasterizer = crate::render::CairoRasterizer::new();
        #[cfg(not(feature = "cairo-backend"))]
        let mut rasterizer = crate::render::SoftwareRasterizer::default();
        self.build_layers().rasterize(&mut rasterizer, pixel_ratio)
    }

    fn read_vector_markup(&self) -> ChartResult<String> {
        self.build_layers().to_svg(&mut SvgRenderer::default())
    }

    fn supports_encoding(&self, _encoding: RendererKind) -> bool {
        true
    }
}
