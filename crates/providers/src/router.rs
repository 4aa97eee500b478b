//! Generator selection — builds the configured backend.

use std::sync::Arc;

use craftbot_config::GeneratorConfig;
use craftbot_core::TextGenerator;

use crate::gemini::GeminiProvider;
use crate::openai_compat::OpenAiCompatProvider;

/// Build the configured text generator.
///
/// Returns `None` when no credential is available; the chat relay then
/// answers `!chat` with a failure notice instead of calling out.
/// Ollama is the exception since it runs locally without a key.
pub fn build_from_config(config: &GeneratorConfig) -> Option<Arc<dyn TextGenerator>> {
    let provider = config.provider.as_str();

    if provider == "ollama" {
        return Some(Arc::new(OpenAiCompatProvider::ollama(
            config.api_url.as_deref(),
            &config.model,
        )));
    }

    let Some(api_key) = config.api_key.clone().filter(|k| !k.is_empty()) else {
        tracing::info!(provider, "No generator API key configured, !chat disabled");
        return None;
    };

    let generator: Arc<dyn TextGenerator> = match provider {
        "gemini" => {
            let mut p = GeminiProvider::new(api_key, &config.model);
            if let Some(url) = &config.api_url {
                p = p.with_base_url(url);
            }
            Arc::new(p)
        }
        name => {
            let base_url = config
                .api_url
                .clone()
                .unwrap_or_else(|| default_base_url(name));
            Arc::new(OpenAiCompatProvider::new(name, base_url, api_key, &config.model))
        }
    };

    Some(generator)
}

/// Get the default base URL for well-known OpenAI-compatible providers.
fn default_base_url(provider_name: &str) -> String {
    match provider_name {
        "openrouter" => "https://openrouter.ai/api/v1".into(),
        "openai" => "https://api.openai.com/v1".into(),
        "groq" => "https://api.groq.com/openai/v1".into(),
        "vllm" => "http://localhost:8000/v1".into(),
        _ => format!("https://{provider_name}.api.example.com/v1"),
    }
}
