use crate::utils::{InferenceConfig, Result, TranslatorError};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize)]
pub struct GenerateRequest {
    pub model: String,
    pub prompt: String,
    pub stream: bool,
    pub options: GenerateOptions,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct GenerateOptions {
    pub temperature: f32,
    pub top_p: f32,
    pub num_predict: i32,
    pub num_ctx: u32,
}

impl From<&InferenceConfig> for GenerateOptions {
    fn from(config: &InferenceConfig) -> Self {
        Self {
            temperature: config.temperature,
            top_p: config.top_p,
            num_predict: config.num_predict,
            num_ctx: config.num_ctx,
        }
    }
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self::from(&InferenceConfig::default())
    }
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<RemoteModel>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RemoteModel {
    pub name: String,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub details: RemoteModelDetails,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RemoteModelDetails {
    #[serde(default)]
    pub parameter_size: Option<String>,
    #[serde(default)]
    pub family: Option<String>,
    #[serde(default)]
    pub quantization_level: Option<String>,
}

/// The external "generate text" service.
#[async_trait]
pub trait InferenceEndpoint: Send + Sync {
    async fn generate(&self, request: &GenerateRequest, timeout: Duration) -> Result<String>;

    async fn list_models(&self) -> Result<Vec<RemoteModel>>;
}

/// Ollama-style HTTP API (`POST /generate`, `GET /tags`).
pub struct OllamaEndpoint {
    client: Client,
    base_url: String,
}

impl OllamaEndpoint {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl InferenceEndpoint for OllamaEndpoint {
    async fn generate(&self, request: &GenerateRequest, timeout: Duration) -> Result<String> {
        let response = self
            .client
            .post(format!("{}/generate", self.base_url))
            .header("Content-Type", "application/json")
            .timeout(timeout)
            .json(request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    TranslatorError::Timeout(timeout)
                } else {
                    TranslatorError::HttpError(e)
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(TranslatorError::Inference(format!(
                "endpoint returned {}: {}",
                status, body
            )));
        }

        let body: GenerateResponse = response.json().await?;
        Ok(body.response)
    }

    async fn list_models(&self) -> Result<Vec<RemoteModel>> {
        let response = self
            .client
            .get(format!("{}/tags", self.base_url))
            .timeout(Duration::from_secs(20))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(TranslatorError::Inference(format!(
                "model listing returned {}",
                response.status()
            )));
        }

        let tags: TagsResponse = response.json().await?;
        Ok(tags.models)
    }
}
