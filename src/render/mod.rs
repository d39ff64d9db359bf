//! Turning fragment results into embeddable output
//!
//! A result value is offered, in order, to:
//! 1. its own markup, when it carries one (`{"$kind": "html", ...}`)
//! 2. the first [`Renderer`] in the [`RendererRegistry`] that matches it
//! 3. a plain inline-code rendering of the value
//!
//! Absent values produce nothing.

pub mod builtin;
pub mod embed;
pub mod registry;

pub use builtin::{AudioRenderer, ImageRenderer, SvgRenderer};
pub use embed::{escape_html, result_kind, self_embed, text_fallback, KIND_FIELD};
pub use registry::RendererRegistry;

use anyhow::Result;
use serde_json::Value;

/// Converts a matching result value into stored bytes plus embed markup
pub trait Renderer: Send + Sync {
    /// Short name used in logs and errors
    fn name(&self) -> &str;

    /// Whether this renderer accepts `value`
    fn matches(&self, value: &Value) -> bool;

    /// MIME type of the bytes produced for `value`
    fn content_type(&self, value: &Value) -> String;

    /// Produce the artifact bytes
    fn render(&self, value: &Value) -> Result<Vec<u8>>;

    /// Markup referencing the stored artifact
    fn embed(&self, url: &str) -> String;
}
