//! Nudge composer with optional generator and local fallback

use super::generator::{ChatCompletionsGenerator, NudgePrompt, TextGenerator};
use super::templates::compose_local;
use crate::config::TextGenerationConfig;
use crate::error::GenerationError;
use crate::types::{CommunicationStyle, StyleTaxonomy};
use std::sync::Arc;
use std::time::Duration;

/// Maps (habit, probability, style) to a nudge
#[derive(Clone)]
pub struct NudgeComposer {
    taxonomy: StyleTaxonomy,
    generator: Option<Arc<dyn TextGenerator>>,
    timeout: Duration,
}

impl NudgeComposer {
    /// Local-only composer
    pub fn new(taxonomy: StyleTaxonomy) -> Self {
        Self {
            taxonomy,
            generator: None,
            timeout: TextGenerationConfig::default().timeout(),
        }
    }

    /// Composer with the built-in chat generator when the config is usable
    pub fn from_config(taxonomy: StyleTaxonomy, config: &TextGenerationConfig) -> Self {
        let mut composer = Self::new(taxonomy);
        composer.timeout = config.timeout();

        match ChatCompletionsGenerator::from_config(config) {
            Ok(generator) => composer.generator = Some(Arc::new(generator)),
            Err(GenerationError::Disabled) => {}
            Err(e) => log::warn!("text generator unavailable, using local nudges: {e}"),
        }
        composer
    }

    pub fn with_generator(mut self, generator: Arc<dyn TextGenerator>) -> Self {
        self.generator = Some(generator);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn has_generator(&self) -> bool {
        self.generator.is_some()
    }

    /// Style a raw tag resolves to under this composer's taxonomy
    pub fn resolve_style(&self, tag: &str) -> CommunicationStyle {
        self.taxonomy.resolve(tag)
    }

    /// Deterministic text, never consulting the generator
    pub fn compose_local(&self, habit_name: &str, probability: f64, style: &str) -> String {
        compose_local(habit_name, probability, self.resolve_style(style))
    }

    /// Compose a nudge. Generator failures and timeouts fall back to local text.
    pub async fn compose(&self, habit_name: &str, probability: f64, style: &str) -> String {
        let style = self.resolve_style(style);

        if let Some(generator) = &self.generator {
            let prompt = NudgePrompt::new(habit_name, probability, style);
            let outcome = match tokio::time::timeout(self.timeout, generator.generate(&prompt)).await
            {
                Ok(result) => result,
                Err(_) => Err(GenerationError::Timeout(self.timeout)),
            };

            match outcome {
                Ok(text) if !text.trim().is_empty() => return text.trim().to_string(),
                Ok(_) => log::warn!("text generator returned an empty nudge, falling back to local"),
                Err(e) => log::warn!("text generation failed, falling back to local: {e}"),
            }
        }

        compose_local(habit_name, probability, style)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nudge::templates::Tier;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;

    struct Fixed(&'static str);

    #[async_trait]
    impl TextGenerator for Fixed {
        async fn generate(&self, _prompt: &NudgePrompt) -> Result<String, GenerationError> {
            Ok(self.0.to_string())
        }
    }

    struct Failing;

    #[async_trait]
    impl TextGenerator for Failing {
        async fn generate(&self, _prompt: &NudgePrompt) -> Result<String, GenerationError> {
            Err(GenerationError::Status(500, "upstream exploded".to_string()))
        }
    }

    struct Slow;

    #[async_trait]
    impl TextGenerator for Slow {
        async fn generate(&self, _prompt: &NudgePrompt) -> Result<String, GenerationError> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok("too late".to_string())
        }
    }

    #[tokio::test]
    async fn test_local_without_generator() {
        let composer = NudgeComposer::new(StyleTaxonomy::Coach);
        let text = composer.compose("Running", 0.9, "challenger").await;
        assert_eq!(text, composer.compose_local("Running", 0.9, "challenger"));
        assert!(text.contains(Tier::High.tone()));
        assert!(text.contains("10-minute timer"));
    }

    #[tokio::test]
    async fn test_unknown_style_uses_default_clause() {
        let composer = NudgeComposer::new(StyleTaxonomy::Coach);
        let unknown = composer.compose("Running", 0.9, "unknown_style").await;
        let default = composer.compose("Running", 0.9, "encourager").await;
        assert_eq!(unknown, default);
        assert!(unknown.contains(Tier::High.tone()));
    }

    #[tokio::test]
    async fn test_generator_text_is_trimmed() {
        let composer = NudgeComposer::new(StyleTaxonomy::Coach)
            .with_generator(Arc::new(Fixed("  Go for a run at lunch.\n")));
        assert_eq!(
            composer.compose("Running", 0.4, "mentor").await,
            "Go for a run at lunch."
        );
    }

    #[tokio::test]
    async fn test_generator_failure_falls_back() {
        let composer =
            NudgeComposer::new(StyleTaxonomy::Coach).with_generator(Arc::new(Failing));
        assert_eq!(
            composer.compose("Reading", 0.6, "mentor").await,
            composer.compose_local("Reading", 0.6, "mentor")
        );
    }

    #[tokio::test]
    async fn test_empty_generation_falls_back() {
        let composer =
            NudgeComposer::new(StyleTaxonomy::Persona).with_generator(Arc::new(Fixed("   ")));
        let text = composer.compose("Piano", 0.2, "musician").await;
        assert!(text.starts_with(Tier::Low.tone()));
        assert!(text.contains("60-second riff"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_falls_back() {
        let composer = NudgeComposer::new(StyleTaxonomy::Coach)
            .with_generator(Arc::new(Slow))
            .with_timeout(Duration::from_millis(50));
        assert_eq!(
            composer.compose("Running", 0.5, "challenger").await,
            composer.compose_local("Running", 0.5, "challenger")
        );
    }

    #[test]
    fn test_from_config_without_key_is_local() {
        let config = TextGenerationConfig {
            enabled: true,
            ..Default::default()
        };
        let composer = NudgeComposer::from_config(StyleTaxonomy::Coach, &config);
        assert!(!composer.has_generator());
    }
}
