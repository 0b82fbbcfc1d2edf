//! 嵌入 API：将文本编码为定长向量，调用 OpenAI 兼容的 /embeddings 端点
//!
//! 同一进程内向量维度必须一致：首次成功调用记录维度，之后维度不符视为 Malformed。

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_openai::config::OpenAIConfig;
use async_openai::types::embeddings::{CreateEmbeddingRequestArgs, EmbeddingInput};
use async_openai::Client;
use async_trait::async_trait;
use thiserror::Error;

use crate::config::AppConfig;

/// 嵌入错误
#[derive(Error, Debug)]
pub enum EmbedError {
    #[error("embedding service unavailable: {0}")]
    Unavailable(String),

    #[error("embedding request failed: {0}")]
    Request(String),

    /// 返回空向量或维度不一致
    #[error("malformed embedding: {0}")]
    Malformed(String),

    #[error("embedding timed out after {0}s")]
    Timeout(u64),
}

/// 嵌入提供方
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError>;
}

/// 使用 async-openai 调用 OpenAI 兼容的 embeddings API
#[derive(Clone)]
pub struct OpenAiEmbedder {
    client: Client<OpenAIConfig>,
    model: String,
    timeout_secs: u64,
    /// 已观测到的维度，0 表示尚未调用
    dimension: Arc<AtomicUsize>,
}

impl OpenAiEmbedder {
    pub fn new(base_url: Option<&str>, model: &str, api_key: Option<&str>) -> Self {
        let mut config = OpenAIConfig::new();
        if let Some(url) = base_url {
            config = config.with_api_base(url);
        }
        if let Some(key) = api_key {
            config = config.with_api_key(key);
        }

        Self {
            client: Client::with_config(config),
            model: model.to_string(),
            timeout_secs: 30,
            dimension: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        let request = CreateEmbeddingRequestArgs::default()
            .model(&self.model)
            .input(EmbeddingInput::String(text.to_string()))
            .build()
            .map_err(|e| EmbedError::Request(e.to_string()))?;

        let response = tokio::time::timeout(
            Duration::from_secs(self.timeout_secs),
            self.client.embeddings().create(request),
        )
        .await
        .map_err(|_| EmbedError::Timeout(self.timeout_secs))?
        .map_err(|e| EmbedError::Request(e.to_string()))?;

        let vector = response
            .data
            .into_iter()
            .next()
            .map(|e| e.embedding)
            .unwrap_or_default();
        check_dimension(&self.dimension, vector)
    }
}

/// 校验向量非空且与已观测维度一致
pub(crate) fn check_dimension(
    seen: &AtomicUsize,
    vector: Vec<f32>,
) -> Result<Vec<f32>, EmbedError> {
    if vector.is_empty() {
        return Err(EmbedError::Malformed("empty vector".to_string()));
    }
    match seen.compare_exchange(0, vector.len(), Ordering::AcqRel, Ordering::Acquire) {
        Ok(_) => Ok(vector),
        Err(expected) if expected == vector.len() => Ok(vector),
        Err(expected) => Err(EmbedError::Malformed(format!(
            "expected {} dimensions, got {}",
            expected,
            vector.len()
        ))),
    }
}

/// 未配置凭据且未指定自建端点时的占位实现
#[derive(Debug, Clone)]
pub struct UnavailableEmbedder {
    reason: String,
}

impl UnavailableEmbedder {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl Embedder for UnavailableEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>, EmbedError> {
        Err(EmbedError::Unavailable(self.reason.clone()))
    }
}

/// 从应用配置创建嵌入提供方；无 Key 且无自建 base_url 时返回不可用占位
pub fn create_embedder_from_config(cfg: &AppConfig) -> Arc<dyn Embedder> {
    let key = cfg.embedding_api_key();
    let base_url = cfg.embedding.base_url.as_deref();
    if key.is_none() && base_url.is_none() {
        tracing::warn!("embedding disabled: no OPENAI_API_KEY and no embedding.base_url");
        return Arc::new(UnavailableEmbedder::new(
            "OPENAI_API_KEY is not set and no embedding.base_url configured",
        ));
    }
    tracing::info!("Using embedding model {}", cfg.embedding.model);
    Arc::new(
        OpenAiEmbedder::new(base_url, &cfg.embedding.model, key)
            .with_timeout(cfg.embedding.timeout_secs),
    )
}
