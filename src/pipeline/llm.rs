//! Vision-model recognizer: transcribe a page bitmap with a multimodal LLM.
//!
//! An alternative to tesseract for badly photographed receipts. The page is
//! PNG/base64-encoded and sent with a transcription prompt from
//! [`crate::prompts`]. There is exactly one API call per page. A failure
//! surfaces as a [`RecognitionError`] and the worker substitutes empty text
//! for that page.

use crate::error::RecognitionError;
use crate::output::PageImage;
use crate::pipeline::encode::encode_page;
use crate::pipeline::recognize::{Recognizer, RecognizerFactory};
use crate::prompts::TRANSCRIBE_SYSTEM_PROMPT;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider, ProviderFactory};
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

const DEFAULT_MODEL: &str = "gpt-4.1-nano";

/// Opens [`VisionRecognizer`]s over one shared provider client.
///
/// The provider is an HTTP client and safe to share; what each worker owns
/// is its own conversation state and options.
#[derive(Clone)]
pub struct VisionFactory {
    provider: Arc<dyn LLMProvider>,
    system_prompt: String,
    temperature: f32,
    max_tokens: usize,
}

impl std::fmt::Debug for VisionFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VisionFactory")
            .field("provider", &"<dyn LLMProvider>")
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}

impl VisionFactory {
    /// Wrap a pre-built provider.
    pub fn new(provider: Arc<dyn LLMProvider>) -> Self {
        Self {
            provider,
            system_prompt: TRANSCRIBE_SYSTEM_PROMPT.to_string(),
            temperature: 0.0,
            max_tokens: 4096,
        }
    }

    /// Resolve a provider, from most-specific to least-specific:
    ///
    /// 1. **Named provider**: `provider_name` with `model` (or the default model)
    /// 2. **Environment pair**: `CATALOG_OCR_PROVIDER` + `CATALOG_OCR_MODEL`;
    ///    an explicit `model` overrides the variable
    /// 3. **Model only**: `model` on OpenAI when `OPENAI_API_KEY` is set
    /// 4. **Auto-detection**: [`ProviderFactory::from_env`] scans API-key variables
    ///
    /// A `model` that no step can honour is an error rather than being dropped.
    pub fn resolve(
        provider_name: Option<&str>,
        model: Option<&str>,
    ) -> Result<Self, RecognitionError> {
        match route(provider_name, model, |key| std::env::var(key).ok())? {
            ProviderRoute::Named { provider, model } => {
                create_vision_provider(&provider, &model).map(Self::new)
            }
            ProviderRoute::AutoDetect => {
                let (llm_provider, _embedding) = ProviderFactory::from_env().map_err(|e| {
                    RecognitionError::Unavailable(format!(
                        "No vision provider could be auto-detected from environment.\n\
                        Set OPENAI_API_KEY, ANTHROPIC_API_KEY, or pass --provider.\n\
                        Error: {}",
                        e
                    ))
                })?;
                Ok(Self::new(llm_provider))
            }
        }
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.max_tokens = n;
        self
    }
}

impl RecognizerFactory for VisionFactory {
    type Recognizer = VisionRecognizer;

    fn acquire(&self) -> Result<VisionRecognizer, RecognitionError> {
        Ok(VisionRecognizer {
            provider: Arc::clone(&self.provider),
            system_prompt: self.system_prompt.clone(),
            options: CompletionOptions {
                temperature: Some(self.temperature),
                max_tokens: Some(self.max_tokens),
                ..Default::default()
            },
        })
    }
}

/// One worker's vision-model session.
pub struct VisionRecognizer {
    provider: Arc<dyn LLMProvider>,
    system_prompt: String,
    options: CompletionOptions,
}

impl Recognizer for VisionRecognizer {
    async fn recognize(&mut self, page: &PageImage) -> Result<String, RecognitionError> {
        let start = Instant::now();
        let image_data = encode_page(&page.image)?;

        // The image carries all the content; the user text stays empty
        let messages = vec![
            ChatMessage::system(self.system_prompt.as_str()),
            ChatMessage::user_with_images("", vec![image_data]),
        ];

        let response = self
            .provider
            .chat(&messages, Some(&self.options))
            .await
            .map_err(|e| RecognitionError::Engine(format!("{}", e)))?;

        debug!(
            "Page {}: {} input tokens, {} output tokens, {:?}",
            page.page_index + 1,
            response.prompt_tokens,
            response.completion_tokens,
            start.elapsed()
        );

        Ok(response.content)
    }
}

#[derive(Debug, PartialEq, Eq)]
enum ProviderRoute {
    Named { provider: String, model: String },
    AutoDetect,
}

/// Decide how [`VisionFactory::resolve`] obtains its provider. `env` looks up
/// environment variables; empty values count as unset.
fn route(
    provider_name: Option<&str>,
    model: Option<&str>,
    env: impl Fn(&str) -> Option<String>,
) -> Result<ProviderRoute, RecognitionError> {
    let var = |key: &str| env(key).filter(|v| !v.is_empty());

    if let Some(name) = provider_name {
        return Ok(ProviderRoute::Named {
            provider: name.to_string(),
            model: model.unwrap_or(DEFAULT_MODEL).to_string(),
        });
    }

    if let Some(provider) = var("CATALOG_OCR_PROVIDER") {
        if let Some(model) = model.map(str::to_string).or_else(|| var("CATALOG_OCR_MODEL")) {
            return Ok(ProviderRoute::Named { provider, model });
        }
    }

    match model {
        Some(model) if var("OPENAI_API_KEY").is_some() => Ok(ProviderRoute::Named {
            provider: "openai".to_string(),
            model: model.to_string(),
        }),
        Some(model) => Err(RecognitionError::Unavailable(format!(
            "model '{}' needs a provider: pass --provider or set CATALOG_OCR_PROVIDER",
            model
        ))),
        None => Ok(ProviderRoute::AutoDetect),
    }
}

/// Instantiate a named provider with the given model.
fn create_vision_provider(
    provider_name: &str,
    model: &str,
) -> Result<Arc<dyn LLMProvider>, RecognitionError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        RecognitionError::Unavailable(format!("provider '{}': {}", provider_name, e))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    fn named(provider: &str, model: &str) -> ProviderRoute {
        ProviderRoute::Named {
            provider: provider.into(),
            model: model.into(),
        }
    }

    #[test]
    fn explicit_provider_wins() {
        let r = route(Some("anthropic"), None, env(&[("CATALOG_OCR_PROVIDER", "gemini")])).unwrap();
        assert_eq!(r, named("anthropic", DEFAULT_MODEL));
    }

    #[test]
    fn env_pair_and_model_override() {
        let pair = env(&[
            ("CATALOG_OCR_PROVIDER", "gemini"),
            ("CATALOG_OCR_MODEL", "gemini-2.0-flash"),
        ]);
        assert_eq!(route(None, None, &pair).unwrap(), named("gemini", "gemini-2.0-flash"));
        assert_eq!(
            route(None, Some("gemini-2.5-pro"), &pair).unwrap(),
            named("gemini", "gemini-2.5-pro")
        );
    }

    #[test]
    fn model_without_provider_uses_openai_key() {
        let r = route(None, Some("gpt-4o"), env(&[("OPENAI_API_KEY", "sk-test")])).unwrap();
        assert_eq!(r, named("openai", "gpt-4o"));
    }

    #[test]
    fn model_without_any_provider_is_not_dropped() {
        let err = route(None, Some("gpt-4o"), env(&[("ANTHROPIC_API_KEY", "k")])).unwrap_err();
        assert!(matches!(err, RecognitionError::Unavailable(ref m) if m.contains("gpt-4o")));
    }

    #[test]
    fn nothing_given_auto_detects() {
        assert_eq!(route(None, None, env(&[("OPENAI_API_KEY", "")])).unwrap(), ProviderRoute::AutoDetect);
    }
}
