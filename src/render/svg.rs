use std::fmt::Write as _;

use crate::error::{ChartError, ChartResult};
use crate::render::{Color, RenderFrame, Renderer, TextHAlign};

pub const SVG_NAMESPACE: &str = "http://www.w3.org/2000/svg";

/// Serializes a `RenderFrame` into a standalone `<svg>` document.
#[derive(Debug, Default)]
pub struct SvgRenderer {
    last_element_count: usize,
}

impl SvgRenderer {
    #[must_use]
    pub fn last_element_count(&self) -> usize {
        self.last_element_count
    }
}

impl SvgRenderer {
    /// Serializes the frame's primitives without the `<svg>` root.
    pub fn render_body(&mut self, frame: &RenderFrame) -> ChartResult<String> {
        frame.validate()?;

        let mut body = String::new();
        for rect in &frame.rects {
            let _ = write!(
                body,
                r#"<rect x="{}" y="{}" width="{}" height="{}"{}"#,
                fmt_num(rect.x),
                fmt_num(rect.y),
                fmt_num(rect.width),
                fmt_num(rect.height),
                paint_attrs("fill", rect.fill_color),
            );
            if rect.border_width > 0.0 {
                let _ = write!(
                    body,
                    r#" stroke-width="{}"{}"#,
                    fmt_num(rect.border_width),
                    paint_attrs("stroke", rect.border_color)
                );
            }
            body.push_str("/>");
        }
        for line in &frame.lines {
            let _ = write!(
                body,
                r#"<line x1="{}" y1="{}" x2="{}" y2="{}" stroke-width="{}"{}/>"#,
                fmt_num(line.x1),
                fmt_num(line.y1),
                fmt_num(line.x2),
                fmt_num(line.y2),
                fmt_num(line.stroke_width),
                paint_attrs("stroke", line.color),
            );
        }
        for text in &frame.texts {
            let anchor = match text.h_align {
                TextHAlign::Left => "start",
                TextHAlign::Center => "middle",
                TextHAlign::Right => "end",
            };
            let _ = write!(
                body,
                r#"<text x="{}" y="{}" font-size="{}" text-anchor="{anchor}" dominant-baseline="hanging"{}>{}</text>"#,
                fmt_num(text.x),
                fmt_num(text.y),
                fmt_num(text.font_size_px),
                paint_attrs("fill", text.color),
                escape_xml(&text.text),
            );
        }

        self.last_element_count = frame.rects.len() + frame.lines.len() + frame.texts.len();
        Ok(body)
    }
}

impl Renderer for SvgRenderer {
    type Output = String;

    /// Vector output is always in logical units; `pixel_ratio` is ignored.
    fn render(&mut self, frame: &RenderFrame, _pixel_ratio: f64) -> ChartResult<String> {
        let body = self.render_body(frame)?;
        Ok(svg_document(
            f64::from(frame.viewport.width),
            f64::from(frame.viewport.height),
            &body,
        ))
    }
}

/// Wraps `body` in an `<svg>` root sized `width` x `height`.
#[must_use]
pub fn svg_document(width: f64, height: f64, body: &str) -> String {
    let (width, height) = (fmt_num(width), fmt_num(height));
    format!(
        r#"<svg xmlns="{SVG_NAMESPACE}" version="1.1" width="{width}" height="{height}" viewBox="0 0 {width} {height}">{body}</svg>"#
    )
}

/// Full-size background rectangle element.
#[must_use]
pub fn background_rect(width: f64, height: f64, color: Color) -> String {
    format!(
        r#"<rect x="0" y="0" width="{}" height="{}"{}/>"#,
        fmt_num(width),
        fmt_num(height),
        paint_attrs("fill", color)
    )
}

/// Inserts `element` as the first child of the document's root `<svg>`.
pub fn insert_first_child(markup: &str, element: &str) -> ChartResult<String> {
    let root_start = find_root_start(markup)?;
    let open_end = markup[root_start..]
        .find('>')
        .map(|index| root_start + index)
        .ok_or_else(|| ChartError::InvalidData("unterminated <svg> root tag".to_owned()))?;

    if markup[..open_end].ends_with('/') {
        // Self-closing root: expand it so it can hold children.
        let mut out = String::with_capacity(markup.len() + element.len() + 8);
        out.push_str(&markup[..open_end - 1]);
        out.push('>');
        out.push_str(element);
        out.push_str("</svg>");
        out.push_str(&markup[open_end + 1..]);
        return Ok(out);
    }

    let mut out = String::with_capacity(markup.len() + element.len());
    out.push_str(&markup[..=open_end]);
    out.push_str(element);
    out.push_str(&markup[open_end + 1..]);
    Ok(out)
}

/// Strips any XML prolog or doctype so the document can be nested.
pub fn root_element(markup: &str) -> ChartResult<&str> {
    let root_start = find_root_start(markup)?;
    Ok(markup[root_start..].trim_end())
}

fn find_root_start(markup: &str) -> ChartResult<usize> {
    markup
        .find("<svg")
        .ok_or_else(|| ChartError::InvalidData("markup has no <svg> root element".to_owned()))
}

fn paint_attrs(attr: &str, color: Color) -> String {
    if color.is_transparent() {
        return format!(r#" {attr}="none""#);
    }
    let mut out = format!(r#" {attr}="{}""#, color.to_hex_rgb());
    if color.alpha < 1.0 {
        let _ = write!(out, r#" {attr}-opacity="{}""#, fmt_num(color.alpha));
    }
    out
}

/// Shortest decimal form with at most four fractional digits.
#[must_use]
pub fn fmt_num(value: f64) -> String {
    let rounded = (value * 10_000.0).round() / 10_000.0;
    if rounded == rounded.trunc() {
        return format!("{}", rounded as i64);
    }
    let text = format!("{rounded:.4}");
    text.trim_end_matches('0').to_owned()
}

#[must_use]
pub fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::{SvgRenderer, escape_xml, fmt_num, insert_first_child, root_element};
    use crate::core::Viewport;
    use crate::render::{
        Color, LinePrimitive, RectPrimitive, RenderFrame, Renderer, TextHAlign, TextPrimitive,
    };

    #[test]
    fn renders_primitives_in_draw_order() {
        let frame = RenderFrame::new(Viewport::new(200, 100))
            .with_text(TextPrimitive::new(
                "a < b",
                5.0,
                5.0,
                12.0,
                Color::rgb(0.0, 0.0, 0.0),
                TextHAlign::Left,
            ))
            .with_line(LinePrimitive::new(0.0, 0.0, 10.0, 10.0, 1.5, Color::rgb(1.0, 0.0, 0.0)))
            .with_rect(RectPrimitive::new(1.0, 2.0, 3.0, 4.0, Color::rgba(0.0, 0.0, 1.0, 0.5)));

        let mut renderer = SvgRenderer::default();
        let markup = renderer.render(&frame, 3.0).expect("render");

        assert!(markup.starts_with(r#"<svg xmlns="http://www.w3.org/2000/svg""#));
        assert!(markup.contains(r#"width="200" height="100""#));
        let rect_at = markup.find("<rect").expect("rect");
        let line_at = markup.find("<line").expect("line");
        let text_at = markup.find("<text").expect("text");
        assert!(rect_at < line_at && line_at < text_at);
        assert!(markup.contains(r##"fill="#0000ff" fill-opacity="0.5""##));
        assert!(markup.contains("a &lt; b"));
        assert_eq!(renderer.last_element_count(), 3);
    }

    #[test]
    fn insert_first_child_handles_regular_and_self_closing_roots() {
        let regular = insert_first_child(r#"<svg width="1"><g/></svg>"#, "<rect/>").expect("ok");
        assert_eq!(regular, r#"<svg width="1"><rect/><g/></svg>"#);

        let closed = insert_first_child(r#"<svg width="1"/>"#, "<rect/>").expect("ok");
        assert_eq!(closed, r#"<svg width="1"><rect/></svg>"#);

        assert!(insert_first_child("<div/>", "<rect/>").is_err());
    }

    #[test]
    fn root_element_drops_prolog() {
        let markup = "<?xml version=\"1.0\"?>\n<svg></svg>\n";
        assert_eq!(root_element(markup).expect("root"), "<svg></svg>");
    }

    #[test]
    fn numbers_are_compact() {
        assert_eq!(fmt_num(400.0), "400");
        assert_eq!(fmt_num(0.5), "0.5");
        assert_eq!(fmt_num(-12.25), "-12.25");
        assert_eq!(escape_xml("\"&'"), "&quot;&amp;&#39;");
    }
}
