//! HTTP 接口
//!
//! - POST /generate        {prompt} → {response}：完整流水线（含反思）
//! - POST /generate-test   {code, testing_framework?} → {response}：检索 + 测试生成
//! - GET  /health          存活探针 + token 统计

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::PipelineError;
use crate::pipeline::{Pipeline, DEFAULT_TESTING_FRAMEWORK};

#[derive(Debug, Deserialize)]
pub struct GenerateRequest {
    pub prompt: String,
}

#[derive(Debug, Deserialize)]
pub struct GenerateTestRequest {
    pub code: String,
    #[serde(default)]
    pub testing_framework: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GenerateResponse {
    pub response: String,
}

pub fn router(pipeline: Arc<Pipeline>) -> Router {
    Router::new()
        .route("/generate", post(api_generate))
        .route("/generate-test", post(api_generate_test))
        .route("/health", get(api_health))
        .with_state(pipeline)
}

/// 错误 → HTTP 状态：凭据缺失 503，超时 504，其余外部依赖失败 502
fn error_response(e: PipelineError) -> (StatusCode, String) {
    let status = if e.is_unavailable() {
        StatusCode::SERVICE_UNAVAILABLE
    } else if e.is_timeout() {
        StatusCode::GATEWAY_TIMEOUT
    } else {
        StatusCode::BAD_GATEWAY
    };
    tracing::error!("request failed ({}): {}", e.kind(), e);
    (status, format!("{}: {}", e.kind(), e))
}

async fn api_generate(
    State(pipeline): State<Arc<Pipeline>>,
    Json(req): Json<GenerateRequest>,
) -> Result<Json<GenerateResponse>, (StatusCode, String)> {
    let prompt = req.prompt.trim();
    if prompt.is_empty() {
        return Err((StatusCode::BAD_REQUEST, "prompt is required".to_string()));
    }

    let outcome = pipeline.run(prompt).await.map_err(error_response)?;
    Ok(Json(GenerateResponse {
        response: outcome.answer,
    }))
}

async fn api_generate_test(
    State(pipeline): State<Arc<Pipeline>>,
    Json(req): Json<GenerateTestRequest>,
) -> Result<Json<GenerateResponse>, (StatusCode, String)> {
    let code = req.code.trim();
    if code.is_empty() {
        return Err((StatusCode::BAD_REQUEST, "code is required".to_string()));
    }
    let framework = req
        .testing_framework
        .as_deref()
        .map(str::trim)
        .filter(|f| !f.is_empty())
        .unwrap_or(DEFAULT_TESTING_FRAMEWORK);

    let response = pipeline
        .generate_test(code, framework)
        .await
        .map_err(error_response)?;
    Ok(Json(GenerateResponse { response }))
}

async fn api_health(State(pipeline): State<Arc<Pipeline>>) -> Json<Value> {
    let (prompt, completion, total) = pipeline.token_usage();
    Json(json!({
        "status": "ok",
        "tokens": { "prompt": prompt, "completion": completion, "total": total },
    }))
}
