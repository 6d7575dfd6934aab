use serde::{Deserialize, Serialize};

use crate::core::Viewport;
use crate::error::{ChartError, ChartResult};

use super::svg::{SvgRenderer, svg_document};
use super::{LinePrimitive, RasterImage, RectPrimitive, Renderer, TextPrimitive};

/// Primitives of one scene layer in logical pixels.
///
/// Backends paint rects first, then lines, then texts; each list keeps
/// insertion order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderFrame {
    pub viewport: Viewport,
    pub rects: Vec<RectPrimitive>,
    pub lines: Vec<LinePrimitive>,
    pub texts: Vec<TextPrimitive>,
}

impl RenderFrame {
    #[must_use]
    pub fn new(viewport: Viewport) -> Self {
        Self {
            viewport,
            rects: Vec::new(),
            lines: Vec::new(),
            texts: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_rect(mut self, rect: RectPrimitive) -> Self {
        self.rects.push(rect);
        self
    }

    #[must_use]
    pub fn with_line(mut self, line: LinePrimitive) -> Self {
        self.lines.push(line);
        self
    }

    #[must_use]
    pub fn with_text(mut self, text: TextPrimitive) -> Self {
        self.texts.push(text);
        self
    }

    /// Paints `other` on top of this frame within the same layer.
    pub fn extend(&mut self, other: RenderFrame) {
        self.rects.extend(other.rects);
        self.lines.extend(other.lines);
        self.texts.extend(other.texts);
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rects.is_empty() && self.lines.is_empty() && self.texts.is_empty()
    }

    pub fn validate(&self) -> ChartResult<()> {
        let Viewport { width, height } = self.viewport;
        if !self.viewport.is_valid() {
            return Err(ChartError::InvalidViewport { width, height });
        }
        self.rects.iter().try_for_each(|rect| rect.validate())?;
        self.lines.iter().try_for_each(|line| line.validate())?;
        self.texts.iter().try_for_each(|text| text.validate())
    }
}

/// Paint layers of one chart surface, bottom to top.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SceneLayer {
    Content,
    DataZoom,
    Emphasis,
    Tooltip,
}

impl SceneLayer {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Content => "content",
            Self::DataZoom => "data-zoom",
            Self::Emphasis => "emphasis",
            Self::Tooltip => "tooltip",
        }
    }
}

/// Ordered per-layer frames. Layers paint strictly in stack order, so an
/// overlay rect always covers content lines below it.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneLayerStack {
    viewport: Viewport,
    layers: Vec<(SceneLayer, RenderFrame)>,
}

impl SceneLayerStack {
    #[must_use]
    pub fn canonical(viewport: Viewport) -> Self {
        Self {
            viewport,
            layers: [
                SceneLayer::Content,
                SceneLayer::DataZoom,
                SceneLayer::Emphasis,
                SceneLayer::Tooltip,
            ]
            .into_iter()
            .map(|kind| (kind, RenderFrame::new(viewport)))
            .collect(),
        }
    }

    #[must_use]
    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    #[must_use]
    pub fn kinds(&self) -> Vec<SceneLayer> {
        self.layers.iter().map(|(kind, _)| *kind).collect()
    }

    #[must_use]
    pub fn layer(&self, kind: SceneLayer) -> Option<&RenderFrame> {
        self.layers
            .iter()
            .find(|(entry, _)| *entry == kind)
            .map(|(_, frame)| frame)
    }

    pub fn layer_mut(&mut self, kind: SceneLayer) -> &mut RenderFrame {
        let viewport = self.viewport;
        let position = match self.layers.iter().position(|(entry, _)| *entry == kind) {
            Some(position) => position,
            None => {
                self.layers.push((kind, RenderFrame::new(viewport)));
                self.layers.len() - 1
            }
        };
        &mut self.layers[position].1
    }

    /// Rasterizes every non-empty layer and composites them in order.
    pub fn rasterize<R>(&self, renderer: &mut R, pixel_ratio: f64) -> ChartResult<RasterImage>
    where
        R: Renderer<Output = RasterImage>,
    {
        let (width, height) = self.viewport.scaled(pixel_ratio);
        let mut target = RasterImage::canvas(width, height, None)?;
        for (_, frame) in &self.layers {
            if frame.is_empty() {
                continue;
            }
            let layer = renderer.render(frame, pixel_ratio)?;
            target.draw_image(&layer, 0, 0);
        }
        Ok(target)
    }

    /// Serializes the stack as one `<svg>` document with a `<g>` per layer.
    pub fn to_svg(&self, renderer: &mut SvgRenderer) -> ChartResult<String> {
        let mut body = String::new();
        for (kind, frame) in &self.layers {
            if frame.is_empty() {
                continue;
            }
            body.push_str(r#"<g class=""#);
            body.push_str(kind.as_str());
            body.push_str(r#"">"#);
            body.push_str(&renderer.render_body(frame)?);
            body.push_str("</g>");
        }
        Ok(svg_document(
            f64::from(self.viewport.width),
            f64::from(self.viewport.height),
            &body,
        ))
    }
}
