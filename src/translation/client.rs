use super::breaker::{BreakerSettings, BreakerState, CircuitBreaker, CircuitState, Transition};
use super::endpoint::{GenerateOptions, GenerateRequest, InferenceEndpoint};
use crate::models::{Language, LanguageSet, ModelProfile, ModelRegistry};
use crate::utils::{BreakerConfig, Result, TranslatorError};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// Monitoring events. Informational only; control flow never depends on delivery.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ClientEvent {
    CircuitOpened,
    CircuitHalfOpened,
    CircuitClosed,
    Rejected { model: String },
    Timeout { model: String, timeout_ms: u64 },
    RetryShortened { model: String, original_chars: usize, shortened_chars: usize },
    Fallback { model: String, reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Translated,
    /// Only the head of the text was translated, after a timeout.
    Shortened,
    /// The original text was returned untranslated.
    Fallback,
}

impl Outcome {
    /// Whether the text is a full translation of the input.
    pub fn is_complete(&self) -> bool {
        *self == Outcome::Translated
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentTranslation {
    pub text: String,
    pub outcome: Outcome,
}

/// Retry and timeout policy applied around each call.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub overall_timeout: Duration,
    pub retry_timeout_ratio: f32,
    pub shorten_ratio: f32,
}

impl From<&BreakerConfig> for RetryPolicy {
    fn from(config: &BreakerConfig) -> Self {
        Self {
            overall_timeout: config.overall_timeout(),
            retry_timeout_ratio: config.retry_timeout_ratio,
            shorten_ratio: config.shorten_ratio,
        }
    }
}

impl RetryPolicy {
    /// Upper bound on one call including its shortened retry.
    pub fn longest_call(&self) -> Duration {
        self.overall_timeout
            .mul_f32(1.0 + self.retry_timeout_ratio.max(0.0))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&BreakerConfig::default())
    }
}

/// Wraps the inference endpoint with a circuit breaker, tiered timeouts, one
/// shortened retry on timeout, and a fallback to the original text.
pub struct ResilientClient {
    endpoint: Arc<dyn InferenceEndpoint>,
    breaker: CircuitBreaker,
    breaker_settings: BreakerSettings,
    registry: Arc<ModelRegistry>,
    languages: Arc<LanguageSet>,
    options: GenerateOptions,
    policy: RetryPolicy,
    events: broadcast::Sender<ClientEvent>,
}

impl ResilientClient {
    pub fn new(
        endpoint: Arc<dyn InferenceEndpoint>,
        registry: Arc<ModelRegistry>,
        languages: Arc<LanguageSet>,
    ) -> Self {
        let (events, _) = broadcast::channel(64);
        let policy = RetryPolicy::default();
        let breaker_settings = BreakerSettings::default();
        Self {
            endpoint,
            breaker: CircuitBreaker::new(breaker_settings.spanning(policy.longest_call())),
            breaker_settings,
            registry,
            languages,
            options: GenerateOptions::default(),
            policy,
            events,
        }
    }

    pub fn with_breaker(mut self, settings: BreakerSettings) -> Self {
        self.breaker_settings = settings;
        self.rebuild_breaker();
        self
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self.rebuild_breaker();
        self
    }

    // The window must hold `volume_threshold` worst-case calls.
    fn rebuild_breaker(&mut self) {
        let settings = self.breaker_settings.spanning(self.policy.longest_call());
        debug!(
            rolling_window_ms = settings.rolling_window.as_millis() as u64,
            "Circuit breaker configured"
        );
        self.breaker = CircuitBreaker::new(settings);
    }

    pub fn with_options(mut self, options: GenerateOptions) -> Self {
        self.options = options;
        self
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ClientEvent> {
        self.events.subscribe()
    }

    pub fn circuit_state(&self) -> BreakerState {
        self.breaker.current_state()
    }

    pub fn circuit_snapshot(&self) -> CircuitState {
        self.breaker.snapshot()
    }

    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    pub fn profile(&self, model_id: &str) -> Result<&ModelProfile> {
        self.registry.get(model_id)
    }

    pub fn language(&self, requested: &str) -> Result<&Language> {
        self.languages.resolve(requested)
    }

    /// Checks the endpoint's model listing. An unreachable endpoint is tolerated.
    pub async fn ensure_model_available(&self, model_id: &str) -> Result<()> {
        self.registry.get(model_id)?;

        match self.endpoint.list_models().await {
            Ok(models) => {
                if models.iter().any(|m| m.name == model_id) {
                    Ok(())
                } else {
                    Err(TranslatorError::ModelUnavailable(model_id.to_string()))
                }
            }
            Err(e) => {
                warn!(model = %model_id, error = %e, "Could not list endpoint models, continuing");
                Ok(())
            }
        }
    }

    pub async fn translate_segment(
        &self,
        text: &str,
        model_id: &str,
        target_language: &str,
    ) -> Result<String> {
        Ok(self.translate(text, None, model_id, target_language).await?.text)
    }

    pub async fn translate_segment_in_context(
        &self,
        text: &str,
        context: Option<&str>,
        model_id: &str,
        target_language: &str,
    ) -> Result<String> {
        Ok(self.translate(text, context, model_id, target_language).await?.text)
    }

    /// Errors only on configuration problems; every transport failure ends in
    /// `Outcome::Fallback` carrying the original text.
    pub async fn translate(
        &self,
        text: &str,
        context: Option<&str>,
        model_id: &str,
        target_language: &str,
    ) -> Result<SegmentTranslation> {
        let profile = self.registry.get(model_id)?;
        let language = self.languages.resolve(target_language)?;

        if text.trim().is_empty() {
            return Ok(SegmentTranslation {
                text: text.to_string(),
                outcome: Outcome::Translated,
            });
        }

        let admission = self.breaker.allow_request();
        self.emit_transition(admission.transition);
        if !admission.allowed {
            self.emit(ClientEvent::Rejected {
                model: model_id.to_string(),
            });
            return Ok(self.fallback(text, model_id, "circuit open"));
        }

        match self.call_with_retry(text, context, profile, language).await {
            Ok((translated, outcome)) => {
                let transition = self.breaker.record_success();
                self.emit_transition(transition);
                Ok(SegmentTranslation {
                    text: translated,
                    outcome,
                })
            }
            Err(e) => {
                let transition = self.breaker.record_failure();
                self.emit_transition(transition);
                Ok(self.fallback(text, model_id, &e.to_string()))
            }
        }
    }

    async fn call_with_retry(
        &self,
        text: &str,
        context: Option<&str>,
        profile: &ModelProfile,
        language: &Language,
    ) -> Result<(String, Outcome)> {
        let timeout = profile.timeout().min(self.policy.overall_timeout);
        let prompt = build_translation_prompt(text, context, language);

        match self.attempt(&profile.id, prompt, timeout).await {
            Err(e) if e.is_timeout() => {
                self.emit(ClientEvent::Timeout {
                    model: profile.id.clone(),
                    timeout_ms: timeout.as_millis() as u64,
                });

                let shortened = shorten_text(text, self.policy.shorten_ratio);
                let retry_timeout = timeout.mul_f32(self.policy.retry_timeout_ratio);
                info!(
                    model = %profile.id,
                    original_chars = text.chars().count(),
                    shortened_chars = shortened.chars().count(),
                    retry_timeout_ms = retry_timeout.as_millis() as u64,
                    "Timed out, retrying with shortened text"
                );
                self.emit(ClientEvent::RetryShortened {
                    model: profile.id.clone(),
                    original_chars: text.chars().count(),
                    shortened_chars: shortened.chars().count(),
                });

                let prompt = build_translation_prompt(&shortened, context, language);
                let translated = self.attempt(&profile.id, prompt, retry_timeout).await?;
                Ok((translated, Outcome::Shortened))
            }
            other => other.map(|translated| (translated, Outcome::Translated)),
        }
    }

    async fn attempt(&self, model_id: &str, prompt: String, timeout: Duration) -> Result<String> {
        let request = GenerateRequest {
            model: model_id.to_string(),
            prompt,
            stream: false,
            options: self.options,
        };

        let response = tokio::time::timeout(timeout, self.endpoint.generate(&request, timeout))
            .await
            .map_err(|_| TranslatorError::Timeout(timeout))??;

        let translated = clean_response(&response);
        if translated.is_empty() {
            return Err(TranslatorError::Inference("empty response".to_string()));
        }
        debug!(model = %model_id, chars = translated.chars().count(), "Segment translated");
        Ok(translated)
    }

    fn fallback(&self, text: &str, model_id: &str, reason: &str) -> SegmentTranslation {
        warn!(model = %model_id, reason = %reason, "Translation fallback, keeping original text");
        self.emit(ClientEvent::Fallback {
            model: model_id.to_string(),
            reason: reason.to_string(),
        });
        SegmentTranslation {
            text: text.to_string(),
            outcome: Outcome::Fallback,
        }
    }

    fn emit_transition(&self, transition: Option<Transition>) {
        let event = match transition {
            Some(Transition::Opened) => ClientEvent::CircuitOpened,
            Some(Transition::HalfOpened) => ClientEvent::CircuitHalfOpened,
            Some(Transition::Closed) => ClientEvent::CircuitClosed,
            None => return,
        };
        info!(?event, "Circuit state changed");
        self.emit(event);
    }

    fn emit(&self, event: ClientEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }
}

pub fn build_translation_prompt(text: &str, context: Option<&str>, language: &Language) -> String {
    let mut prompt = format!(
        "Translate the following text to {}. Preserve the formatting and maintain a professional tone.\n",
        language.name
    );

    if let Some(context) = context.filter(|c| !c.trim().is_empty()) {
        prompt.push_str("Do not translate the previous context, it is only there for continuity.\n");
        prompt.push_str(&format!("[Previous context: {}]\n", context));
    }

    prompt.push('\n');
    prompt.push_str(text);
    prompt.push_str("\n\nTranslation:");
    prompt
}

/// Head truncation: keeps the first `ratio` of the characters, cut back to a word boundary.
pub fn shorten_text(text: &str, ratio: f32) -> String {
    let chars: Vec<char> = text.chars().collect();
    let keep = ((chars.len() as f32 * ratio.clamp(0.0, 1.0)).ceil() as usize).max(1);
    if keep >= chars.len() {
        return text.to_string();
    }

    let head = &chars[..keep];
    let cut = if chars[keep].is_whitespace() {
        keep
    } else {
        // A boundary at 0 (leading whitespace only) would leave nothing to send.
        head.iter()
            .rposition(|c| c.is_whitespace())
            .filter(|&i| head[..i].iter().any(|c| !c.is_whitespace()))
            .unwrap_or(keep)
    };

    let shortened: String = chars[..cut].iter().collect();
    shortened.trim_end().to_string()
}

fn clean_response(response: &str) -> String {
    let trimmed = response.trim();
    trimmed
        .strip_prefix("Translation:")
        .map(str::trim_start)
        .unwrap_or(trimmed)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_names_language_and_context() {
        let language = Language::new("fr", "French");
        let prompt = build_translation_prompt("Hello.", Some("Earlier text"), &language);
        assert!(prompt.starts_with("Translate the following text to French."));
        assert!(prompt.contains("[Previous context: Earlier text]"));
        assert!(prompt.ends_with("Hello.\n\nTranslation:"));

        let prompt = build_translation_prompt("Hello.", None, &language);
        assert!(!prompt.contains("Previous context"));
    }

    #[test]
    fn shortening_keeps_head_on_word_boundary() {
        let shortened = shorten_text("alpha beta gamma delta", 0.5);
        assert_eq!(shortened, "alpha beta");
        assert!("alpha beta gamma delta".starts_with(&shortened));
    }

    #[test]
    fn shortening_single_word_cuts_characters() {
        assert_eq!(shorten_text("abcdefgh", 0.5), "abcd");
        assert_eq!(shorten_text("abc", 1.0), "abc");
    }

    #[test]
    fn shortening_never_cuts_to_leading_whitespace() {
        let shortened = shorten_text("\nabcdefghijklmnop", 0.5);
        assert_eq!(shortened, "\nabcdefgh");
        assert!(!shortened.trim().is_empty());
    }

    #[test]
    fn longest_call_covers_the_retry() {
        let policy = RetryPolicy {
            overall_timeout: Duration::from_secs(100),
            retry_timeout_ratio: 0.5,
            shorten_ratio: 0.5,
        };
        assert_eq!(policy.longest_call(), Duration::from_secs(150));
    }

    #[test]
    fn response_is_trimmed_of_trailer_echo() {
        assert_eq!(clean_response("  Translation: Bonjour. \n"), "Bonjour.");
        assert_eq!(clean_response("Bonjour."), "Bonjour.");
    }
}
