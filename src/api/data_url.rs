use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};

use crate::error::{ChartError, ChartResult};

use super::ImageType;

/// How vector exports are turned into a string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SvgDataUrlEncoding {
    /// `data:image/svg+xml;charset=UTF-8,<url-escaped markup>`
    #[default]
    UrlEscaped,
    /// `data:image/svg+xml;base64,<payload>`
    Base64,
    /// The markup itself, without a data URL wrapper.
    Raw,
}

/// `data:<mime>;base64,<payload>`
#[must_use]
pub fn encode_base64(mime_type: &str, bytes: &[u8]) -> String {
    format!("data:{mime_type};base64,{}", STANDARD.encode(bytes))
}

#[must_use]
pub fn encode_svg(markup: &str, encoding: SvgDataUrlEncoding) -> String {
    let mime_type = ImageType::Svg.mime_type();
    match encoding {
        SvgDataUrlEncoding::UrlEscaped => format!(
            "data:{mime_type};charset=UTF-8,{}",
            urlencoding::encode(markup)
        ),
        SvgDataUrlEncoding::Base64 => encode_base64(mime_type, markup.as_bytes()),
        SvgDataUrlEncoding::Raw => markup.to_owned(),
    }
}

/// Parsed export string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataUrl {
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl DataUrl {
    /// Parses a `data:` URL or raw `<svg>` markup.
    pub fn parse(input: &str) -> ChartResult<Self> {
        let trimmed = input.trim_start();
        if trimmed.starts_with('<') {
            return Ok(Self {
                mime_type: ImageType::Svg.mime_type().to_owned(),
                bytes: input.as_bytes().to_vec(),
            });
        }

        let rest = trimmed
            .strip_prefix("data:")
            .ok_or_else(|| ChartError::InvalidData("not a data url".to_owned()))?;
        let (header, payload) = rest
            .split_once(',')
            .ok_or_else(|| ChartError::InvalidData("data url has no payload".to_owned()))?;

        let mut parts = header.split(';');
        let mime_type = parts.next().unwrap_or_default().to_owned();
        let is_base64 = parts.any(|part| part.eq_ignore_ascii_case("base64"));

        let bytes = if is_base64 {
            STANDARD
                .decode(payload)
                .map_err(|err| ChartError::InvalidData(format!("invalid base64 payload: {err}")))?
        } else {
            urlencoding::decode_binary(payload.as_bytes()).into_owned()
        };
        Ok(Self { mime_type, bytes })
    }

    /// Payload as UTF-8 text (vector exports).
    pub fn text(&self) -> ChartResult<&str> {
        std::str::from_utf8(&self.bytes)
            .map_err(|err| ChartError::InvalidData(format!("payload is not utf-8: {err}")))
    }
}

#[cfg(test)]
mod tests {
    use super::{DataUrl, SvgDataUrlEncoding, encode_base64, encode_svg};

    #[test]
    fn base64_urls_round_trip() {
        let url = encode_base64("image/png", &[137, 80, 78, 71]);
        assert_eq!(url, "data:image/png;base64,iVBORw==");
        let parsed = DataUrl::parse(&url).expect("parse");
        assert_eq!(parsed.mime_type, "image/png");
        assert_eq!(parsed.bytes, vec![137, 80, 78, 71]);
    }

    #[test]
    fn svg_urls_are_percent_escaped() {
        let markup = r#"<svg width="1"><text>a b&c</text></svg>"#;
        let url = encode_svg(markup, SvgDataUrlEncoding::UrlEscaped);
        assert_eq!(
            url,
            "data:image/svg+xml;charset=UTF-8,%3Csvg%20width%3D%221%22%3E%3Ctext%3Ea%20b%26c%3C%2Ftext%3E%3C%2Fsvg%3E"
        );
        let parsed = DataUrl::parse(&url).expect("parse");
        assert_eq!(parsed.text().expect("utf8"), markup);
    }

    #[test]
    fn raw_svg_parses_as_markup() {
        let parsed = DataUrl::parse(&encode_svg("<svg/>", SvgDataUrlEncoding::Raw)).expect("raw");
        assert_eq!(parsed.mime_type, "image/svg+xml");
        assert_eq!(parsed.text().expect("utf8"), "<svg/>");

        let base64 = encode_svg("<svg/>", SvgDataUrlEncoding::Base64);
        assert!(base64.starts_with("data:image/svg+xml;base64,"));
        assert_eq!(DataUrl::parse(&base64).expect("b64").text().expect("utf8"), "<svg/>");
    }

    #[test]
    fn rejects_non_data_urls() {
        assert!(DataUrl::parse("https://example.com/a.png").is_err());
        assert!(DataUrl::parse("data:image/png;base64").is_err());
    }
}
