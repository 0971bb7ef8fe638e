//! Text generator implementations.
//!
//! Provides the OpenAI-compatible HTTP generator and a factory
//! ([`create_generator`]) that builds it from a [`GeneratorConfig`],
//! resolving the API key from the configured environment variable.

pub mod openai_compat;

use secrecy::SecretString;

use rapport_core::llm::BoxTextGenerator;
use rapport_types::config::GeneratorConfig;
use rapport_types::llm::GenerationError;

use self::openai_compat::OpenAiCompatGenerator;

/// Read an API key from the environment. Unset or blank yields `None`.
pub fn resolve_api_key(env_var: &str) -> Option<SecretString> {
    std::env::var(env_var)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .map(SecretString::from)
}

/// Create a [`BoxTextGenerator`] from a [`GeneratorConfig`].
///
/// A missing key is not an error here: local endpoints run without one, and
/// a hosted endpoint will answer with an authentication failure.
pub fn create_generator(config: &GeneratorConfig) -> Result<BoxTextGenerator, GenerationError> {
    let api_key = resolve_api_key(&config.api_key_env);
    if api_key.is_none() {
        tracing::debug!(
            env = %config.api_key_env,
            "No API key in environment; requests will be unauthenticated"
        );
    }
    let generator = OpenAiCompatGenerator::new(config, api_key)?;
    Ok(BoxTextGenerator::new(generator))
}
