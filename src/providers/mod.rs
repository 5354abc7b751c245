mod openai;

pub use openai::OpenAiProvider;

use crate::core::config::AppConfig;
use crate::core::error::ProviderError;
use crate::core::provider::CompletionProvider;
use std::sync::Arc;

/// Create the completion provider described by the config.
/// Every backend speaks the OpenAI-compatible chat completions API.
pub fn create_provider(config: &AppConfig) -> Result<Arc<dyn CompletionProvider>, ProviderError> {
    let provider = OpenAiProvider::new(
        config.base_url.clone(),
        config.model.clone(),
        config.temperature,
        config.max_tokens,
        config.request_timeout(),
    )?;
    Ok(Arc::new(provider))
}
