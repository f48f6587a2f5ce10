pub mod ollama;
pub mod openai;

use std::time::Duration;

use glassbox_core::config::LlmConfig;
use tracing::info;

use crate::provider::{LlmError, LlmProvider};

/// Create the appropriate LLM provider based on config.
pub fn create_provider(llm_config: &LlmConfig) -> Result<Box<dyn LlmProvider>, LlmError> {
    let timeout = Duration::from_secs(llm_config.request_timeout_secs);
    info!(
        provider = %llm_config.provider,
        model = %llm_config.model,
        base_url = %llm_config.base_url,
        "creating LLM provider"
    );
    match llm_config.provider.as_str() {
        "openai" => {
            let api_key = llm_config
                .api_key
                .as_ref()
                .ok_or_else(|| LlmError::NotConfigured("LLM_API_KEY not set".into()))?;
            Ok(Box::new(openai::OpenAiProvider::new(
                api_key.clone(),
                llm_config.model.clone(),
                &llm_config.base_url,
                timeout,
            )?))
        }
        "ollama" => Ok(Box::new(ollama::OllamaProvider::new(
            &llm_config.base_url,
            llm_config.model.clone(),
            timeout,
        )?)),
        other => Err(LlmError::NotConfigured(format!(
            "unknown LLM provider: '{}'",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_known_providers() {
        let openai = create_provider(&LlmConfig::default()).unwrap();
        assert_eq!(openai.name(), "openai");

        let ollama = create_provider(&LlmConfig {
            provider: "ollama".into(),
            ..LlmConfig::default()
        })
        .unwrap();
        assert_eq!(ollama.name(), "ollama");
    }

    #[test]
    fn openai_requires_key() {
        let result = create_provider(&LlmConfig {
            api_key: None,
            ..LlmConfig::default()
        });
        assert!(matches!(result, Err(LlmError::NotConfigured(_))));
    }

    #[test]
    fn rejects_unknown_provider() {
        let result = create_provider(&LlmConfig {
            provider: "gemini".into(),
            ..LlmConfig::default()
        });
        assert!(matches!(result, Err(LlmError::NotConfigured(_))));
    }
}
