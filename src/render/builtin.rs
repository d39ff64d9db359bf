/// Renderers shipped with the crate
///
/// Binary results arrive as tagged objects produced by `Tangle.image(...)`
/// and `Tangle.audio(...)`, carrying a base64 payload and a format name.
use anyhow::{Context, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde_json::Value;

use super::embed::{escape_html, result_kind};
use super::Renderer;

/// `format` of a tagged result, falling back to `default`
fn format_of<'a>(value: &'a Value, default: &'a str) -> &'a str {
    value
        .get("format")
        .and_then(Value::as_str)
        .filter(|f| !f.is_empty())
        .unwrap_or(default)
}

fn decode_payload(value: &Value) -> Result<Vec<u8>> {
    let data = value
        .get("data")
        .and_then(Value::as_str)
        .context("Result has no base64 `data` field")?;
    STANDARD
        .decode(data.trim())
        .context("Result `data` is not valid base64")
}

/// Raster images: `{"$kind": "image", "format": "png", "data": "<base64>"}`
#[derive(Debug, Clone, Default)]
pub struct ImageRenderer;

impl Renderer for ImageRenderer {
    fn name(&self) -> &str {
        "image"
    }

    fn matches(&self, value: &Value) -> bool {
        result_kind(value) == Some("image")
    }

    fn content_type(&self, value: &Value) -> String {
        format!("image/{}", format_of(value, "png"))
    }

    fn render(&self, value: &Value) -> Result<Vec<u8>> {
        decode_payload(value)
    }

    fn embed(&self, url: &str) -> String {
        format!("<img src=\"{}\" />", escape_html(url))
    }
}

/// Audio clips: `{"$kind": "audio", "format": "ogg", "data": "<base64>"}`
#[derive(Debug, Clone, Default)]
pub struct AudioRenderer;

impl Renderer for AudioRenderer {
    fn name(&self) -> &str {
        "audio"
    }

    fn matches(&self, value: &Value) -> bool {
        result_kind(value) == Some("audio")
    }

    fn content_type(&self, value: &Value) -> String {
        format!("audio/{}", format_of(value, "ogg"))
    }

    fn render(&self, value: &Value) -> Result<Vec<u8>> {
        decode_payload(value)
    }

    fn embed(&self, url: &str) -> String {
        format!("<audio controls src=\"{}\"></audio>", escape_html(url))
    }
}

/// Plain string results holding an SVG document
#[derive(Debug, Clone, Default)]
pub struct SvgRenderer;

impl Renderer for SvgRenderer {
    fn name(&self) -> &str {
        "svg"
    }

    fn matches(&self, value: &Value) -> bool {
        value
            .as_str()
            .is_some_and(|s| s.trim_start().starts_with("<svg"))
    }

    fn content_type(&self, _value: &Value) -> String {
        "image/svg+xml".to_string()
    }

    fn render(&self, value: &Value) -> Result<Vec<u8>> {
        let svg = value.as_str().context("SVG result must be a string")?;
        Ok(svg.as_bytes().to_vec())
    }

    fn embed(&self, url: &str) -> String {
        format!("<img src=\"{}\" />", escape_html(url))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_image_renderer() {
        let value = json!({"$kind": "image", "format": "jpeg", "data": "aGVsbG8="});
        let renderer = ImageRenderer;

        assert!(renderer.matches(&value));
        assert!(!renderer.matches(&json!({"$kind": "audio"})));
        assert!(!renderer.matches(&json!(1)));
        assert_eq!(renderer.content_type(&value), "image/jpeg");
        assert_eq!(renderer.render(&value).unwrap(), b"hello");
        assert_eq!(
            renderer.embed("https://x/a&b"),
            "<img src=\"https://x/a&amp;b\" />"
        );
    }

    #[test]
    fn test_image_defaults_to_png() {
        let value = json!({"$kind": "image", "data": ""});
        assert_eq!(ImageRenderer.content_type(&value), "image/png");
    }

    #[test]
    fn test_bad_payload_is_an_error() {
        let value = json!({"$kind": "image", "data": "***"});
        assert!(ImageRenderer.render(&value).is_err());

        let missing = json!({"$kind": "audio"});
        assert!(AudioRenderer.render(&missing).is_err());
    }

    #[test]
    fn test_audio_renderer() {
        let value = json!({"$kind": "audio", "data": "T2dnUw=="});
        assert!(AudioRenderer.matches(&value));
        assert_eq!(AudioRenderer.content_type(&value), "audio/ogg");
        assert_eq!(AudioRenderer.render(&value).unwrap(), b"OggS");
        assert_eq!(
            AudioRenderer.embed("u"),
            "<audio controls src=\"u\"></audio>"
        );
    }

    #[test]
    fn test_svg_renderer() {
        let value = json!("  <svg xmlns=\"http://www.w3.org/2000/svg\"></svg>");
        assert!(SvgRenderer.matches(&value));
        assert!(!SvgRenderer.matches(&json!("plain text")));
        assert_eq!(SvgRenderer.content_type(&value), "image/svg+xml");
        assert!(SvgRenderer.render(&value).unwrap().starts_with(b"  <svg"));
    }
}
