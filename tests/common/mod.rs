#![allow(dead_code)]

use async_trait::async_trait;
use doc_translator::models::{default_languages, LanguageSet};
use doc_translator::translation::{
    BreakerSettings, GenerateRequest, InferenceEndpoint, RemoteModel, ResilientClient, RetryPolicy,
};
use doc_translator::{ModelRegistry, Result, TranslatorError};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const MODEL: &str = "llama2:latest";

pub enum Reply {
    Text(String),
    Fail,
    Hang,
}

type Script = Box<dyn Fn(usize, &str) -> Reply + Send + Sync>;

/// Scripted inference endpoint. The script sees the call number and the
/// segment text extracted from the prompt.
pub struct FakeEndpoint {
    script: Script,
    models: Vec<String>,
    calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

impl FakeEndpoint {
    pub fn new(script: impl Fn(usize, &str) -> Reply + Send + Sync + 'static) -> Arc<Self> {
        Arc::new(Self {
            script: Box::new(script),
            models: vec![MODEL.to_string()],
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        })
    }

    /// Prefixes every segment with `[fr]`.
    pub fn translating() -> Arc<Self> {
        Self::new(|_, text| Reply::Text(format!("[fr] {}", text)))
    }

    pub fn failing() -> Arc<Self> {
        Self::new(|_, _| Reply::Fail)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

pub fn segment_text(prompt: &str) -> &str {
    let body = prompt.split_once("\n\n").map(|(_, b)| b).unwrap_or(prompt);
    body.strip_suffix("\n\nTranslation:").unwrap_or(body)
}

#[async_trait]
impl InferenceEndpoint for FakeEndpoint {
    async fn generate(&self, request: &GenerateRequest, _timeout: Duration) -> Result<String> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(request.prompt.clone());

        match (self.script)(call, segment_text(&request.prompt)) {
            Reply::Text(text) => Ok(text),
            Reply::Fail => Err(TranslatorError::Inference("503 Service Unavailable".to_string())),
            Reply::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(String::new())
            }
        }
    }

    async fn list_models(&self) -> Result<Vec<RemoteModel>> {
        Ok(self
            .models
            .iter()
            .map(|name| RemoteModel {
                name: name.clone(),
                size: 0,
                details: Default::default(),
            })
            .collect())
    }
}

pub fn test_policy() -> RetryPolicy {
    RetryPolicy {
        overall_timeout: Duration::from_millis(200),
        retry_timeout_ratio: 0.6,
        shorten_ratio: 0.5,
    }
}

pub fn client_for(endpoint: Arc<FakeEndpoint>) -> ResilientClient {
    ResilientClient::new(
        endpoint,
        Arc::new(ModelRegistry::builtin()),
        Arc::new(LanguageSet::new(default_languages())),
    )
    .with_breaker(BreakerSettings {
        volume_threshold: 3,
        error_threshold_percentage: 40.0,
        cooldown: Duration::from_secs(45),
        rolling_window: Duration::from_secs(60),
    })
    .with_policy(test_policy())
}
