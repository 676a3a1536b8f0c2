//! HTTP request handlers

use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{rejection::JsonRejection, State},
    response::Html,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;

use crate::export::ModelMetadata;
use crate::inference::{ClassProbability, Prediction};
use crate::schema::FeatureSpec;

use super::error::{Result, ServerError};
use super::page::INDEX_HTML;
use super::state::AppState;

// ============================================================================
// Status
// ============================================================================

pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<Value> {
    let predictor = state.predictor.current();
    let uptime = chrono::Utc::now().signed_duration_since(state.started_at);
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "model": predictor.metadata().model_name,
        "uptime_secs": uptime.num_seconds(),
    }))
}

pub async fn model_info(State(state): State<Arc<AppState>>) -> Json<ModelMetadata> {
    Json(state.predictor.current().metadata().clone())
}

#[derive(Debug, Serialize)]
pub struct SchemaResponse {
    pub target: &'static str,
    pub classes: Vec<String>,
    pub features: &'static [FeatureSpec],
}

pub async fn get_schema(State(state): State<Arc<AppState>>) -> Json<SchemaResponse> {
    let predictor = state.predictor.current();
    let schema = predictor.schema();
    Json(SchemaResponse {
        target: schema.target_column(),
        classes: predictor.bundle().target_encoder.classes().to_vec(),
        features: schema.features(),
    })
}

// ============================================================================
// Inference
// ============================================================================

#[derive(Debug, Serialize)]
pub struct PredictionBody {
    pub label: String,
    pub confidence: f64,
    pub probabilities: Vec<ClassProbability>,
    pub recommendations: &'static [&'static str],
}

impl From<Prediction> for PredictionBody {
    fn from(prediction: Prediction) -> Self {
        let recommendations = prediction.recommendations();
        Self {
            label: prediction.label,
            confidence: prediction.confidence,
            probabilities: prediction.probabilities,
            recommendations,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PredictResponse {
    pub success: bool,
    pub prediction: PredictionBody,
}

pub async fn predict(
    State(state): State<Arc<AppState>>,
    payload: std::result::Result<Json<Value>, JsonRejection>,
) -> Result<Json<PredictResponse>> {
    let Json(body) = payload?;
    let object = match body {
        Value::Object(object) => object,
        other => {
            return Err(ServerError::BadRequest(format!(
                "expected a JSON object of feature values, got {}",
                json_type(&other)
            )))
        }
    };

    let predictor = state.predictor.current();
    let prediction = tokio::task::spawn_blocking(move || predictor.predict_json(&object))
        .await
        .map_err(|e| ServerError::Internal(format!("prediction task failed: {e}")))??;

    Ok(Json(PredictResponse {
        success: true,
        prediction: prediction.into(),
    }))
}

// ============================================================================
// Model management
// ============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct ReloadRequest {
    pub path: Option<PathBuf>,
}

pub async fn reload_model(State(state): State<Arc<AppState>>, body: Bytes) -> Result<Json<Value>> {
    let request: ReloadRequest = if body.iter().all(u8::is_ascii_whitespace) {
        ReloadRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| ServerError::BadRequest(format!("invalid reload request: {e}")))?
    };
    let dir = state.resolve_reload_dir(request.path.as_deref())?;
    info!(path = %dir.display(), "Reload requested");

    let task_state = Arc::clone(&state);
    let task_dir = dir.clone();
    let predictor = tokio::task::spawn_blocking(move || task_state.predictor.reload(&task_dir))
        .await
        .map_err(|e| ServerError::Internal(format!("reload task failed: {e}")))??;

    let metadata = predictor.metadata();
    Ok(Json(json!({
        "success": true,
        "path": dir,
        "model_name": metadata.model_name,
        "accuracy": metadata.accuracy,
        "f1_score": metadata.f1_score,
    })))
}

// ============================================================================
// UI Handler
// ============================================================================

pub async fn serve_index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
