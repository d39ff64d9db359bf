use serde_json::Value;
use std::fmt;
use std::sync::Arc;

use super::builtin::{AudioRenderer, ImageRenderer, SvgRenderer};
use super::Renderer;

/// Ordered list of renderers with first-match-wins lookup.
///
/// Registration order is observable: when several renderers accept a value,
/// the one registered first is used.
#[derive(Clone, Default)]
pub struct RendererRegistry {
    renderers: Vec<Arc<dyn Renderer>>,
}

impl RendererRegistry {
    /// Create an empty registry
    pub fn empty() -> Self {
        Self::default()
    }

    /// Registry with the built-in renderers: image, audio, svg
    pub fn with_defaults() -> Self {
        Self::empty()
            .with(Arc::new(ImageRenderer))
            .with(Arc::new(AudioRenderer))
            .with(Arc::new(SvgRenderer))
    }

    /// Append a renderer after all existing ones
    pub fn register(&mut self, renderer: Arc<dyn Renderer>) {
        self.renderers.push(renderer);
    }

    pub fn with(mut self, renderer: Arc<dyn Renderer>) -> Self {
        self.register(renderer);
        self
    }

    /// First renderer, in registration order, that accepts `value`
    pub fn find(&self, value: &Value) -> Option<&dyn Renderer> {
        self.renderers
            .iter()
            .find(|renderer| renderer.matches(value))
            .map(|renderer| renderer.as_ref())
    }

    /// Renderer names in registration order
    pub fn names(&self) -> Vec<&str> {
        self.renderers.iter().map(|r| r.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.renderers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.renderers.is_empty()
    }
}

impl fmt::Debug for RendererRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RendererRegistry")
            .field("renderers", &self.names())
            .finish()
    }
}
