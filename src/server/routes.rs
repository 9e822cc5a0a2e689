use super::AppState;
use crate::models::{ModelProfile, SizeClass};
use crate::segmentation::SegmentationConfig;
use crate::utils::TranslatorError;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslateRequest {
    pub text: String,
    pub target_language: String,
    pub model: String,
    #[serde(default)]
    pub segmentation_config: Option<SegmentationConfig>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslateResponse {
    pub session_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelSummary {
    pub id: String,
    pub size_class: SizeClass,
    pub max_tokens: usize,
    pub optimal_chunk_size: usize,
    pub timeout_secs: u64,
}

impl From<&ModelProfile> for ModelSummary {
    fn from(profile: &ModelProfile) -> Self {
        Self {
            id: profile.id.clone(),
            size_class: profile.size_class,
            max_tokens: profile.max_tokens,
            optimal_chunk_size: profile.optimal_chunk_size,
            timeout_secs: profile.timeout().as_secs(),
        }
    }
}

fn error_response(status: StatusCode, error: &TranslatorError) -> (StatusCode, Json<serde_json::Value>) {
    (status, Json(json!({ "error": error.to_string() })))
}

pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "circuit": state.translator.client().circuit_state(),
        "sessions": state.store.len(),
    }))
}

pub async fn models(State(state): State<AppState>) -> impl IntoResponse {
    let models: Vec<ModelSummary> = state
        .translator
        .client()
        .registry()
        .list()
        .into_iter()
        .map(ModelSummary::from)
        .collect();
    Json(json!({ "models": models }))
}

pub async fn start_translation(
    State(state): State<AppState>,
    Json(request): Json<TranslateRequest>,
) -> impl IntoResponse {
    let TranslateRequest {
        text,
        target_language,
        model,
        segmentation_config,
    } = request;

    if let Err(e) = state.translator.check_request(&model, &target_language) {
        return error_response(StatusCode::BAD_REQUEST, &e).into_response();
    }

    let config = match segmentation_config {
        Some(config) => config,
        None => match state.translator.client().profile(&model) {
            Ok(profile) => profile.segmentation_config(),
            Err(e) => return error_response(StatusCode::BAD_REQUEST, &e).into_response(),
        },
    };
    if let Err(e) = config.validate() {
        return error_response(StatusCode::BAD_REQUEST, &e).into_response();
    }

    let cancel = CancellationToken::new();
    let session_id = state.store.create_with_token(cancel.clone());
    let sink = state.store.sink(session_id.clone());
    let translator = state.translator.clone();

    tracing::info!(
        session_id = %session_id,
        model = %model,
        language = %target_language,
        chars = text.len(),
        "Translation job accepted"
    );

    let job_id = session_id.clone();
    tokio::spawn(async move {
        let result = translator
            .translate_document(&text, &target_language, &model, &config, &sink, &cancel)
            .await;
        if let Err(e) = result {
            tracing::warn!(session_id = %job_id, error = %e, "Translation job ended without output");
        }
    });

    (
        StatusCode::ACCEPTED,
        Json(json!(TranslateResponse { session_id })),
    )
        .into_response()
}

pub async fn progress(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> impl IntoResponse {
    match state.store.get(&session_id) {
        Ok(progress) => (StatusCode::OK, Json(json!(progress))).into_response(),
        Err(e) => error_response(StatusCode::NOT_FOUND, &e).into_response(),
    }
}

pub async fn delete_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> impl IntoResponse {
    match state.store.delete(&session_id) {
        Ok(()) => (StatusCode::OK, Json(json!({ "deleted": session_id }))).into_response(),
        Err(e) => error_response(StatusCode::NOT_FOUND, &e).into_response(),
    }
}
