//! BoxTextGenerator -- object-safe dynamic dispatch wrapper for TextGenerator.
//!
//! 1. Define an object-safe `TextGeneratorDyn` trait with boxed futures
//! 2. Blanket-impl `TextGeneratorDyn` for all `T: TextGenerator`
//! 3. `BoxTextGenerator` wraps `Box<dyn TextGeneratorDyn>` and delegates

use std::future::Future;
use std::pin::Pin;

use rapport_types::llm::{GenerationError, OutputJsonSchema};

use super::generator::TextGenerator;

/// Object-safe version of [`TextGenerator`] with boxed futures.
pub trait TextGeneratorDyn: Send + Sync {
    fn name(&self) -> &str;

    fn generate_boxed<'a>(
        &'a self,
        prompt: &'a str,
        hint: Option<&'a OutputJsonSchema>,
    ) -> Pin<Box<dyn Future<Output = Result<Option<String>, GenerationError>> + Send + 'a>>;
}

impl<T: TextGenerator> TextGeneratorDyn for T {
    fn name(&self) -> &str {
        TextGenerator::name(self)
    }

    fn generate_boxed<'a>(
        &'a self,
        prompt: &'a str,
        hint: Option<&'a OutputJsonSchema>,
    ) -> Pin<Box<dyn Future<Output = Result<Option<String>, GenerationError>> + Send + 'a>> {
        Box::pin(self.generate(prompt, hint))
    }
}

/// Type-erased text generator for runtime backend selection.
///
/// Since `TextGenerator` uses RPITIT it cannot be used as a trait object
/// directly. `BoxTextGenerator` itself implements `TextGenerator`, so it can
/// be handed to anything generic over the trait.
pub struct BoxTextGenerator {
    inner: Box<dyn TextGeneratorDyn + Send + Sync>,
}

impl BoxTextGenerator {
    pub fn new<T: TextGenerator + 'static>(generator: T) -> Self {
        Self {
            inner: Box::new(generator),
        }
    }
}

impl TextGenerator for BoxTextGenerator {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn generate(
        &self,
        prompt: &str,
        hint: Option<&OutputJsonSchema>,
    ) -> impl Future<Output = Result<Option<String>, GenerationError>> + Send {
        async move { self.inner.generate_boxed(prompt, hint).await }
    }
}

impl std::fmt::Debug for BoxTextGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoxTextGenerator")
            .field("name", &self.inner.name())
            .finish()
    }
}
