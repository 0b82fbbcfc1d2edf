//! LLM 客户端抽象
//!
//! 所有后端（OpenAI 兼容 / Mock / 不可用占位）实现 LlmClient::complete。
//! 响应契约只认 Chat 形态：取 choices[0].message.content，缺失或为空视为 EmptyResponse。

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::llm::Message;

/// LLM 调用错误
#[derive(Error, Debug)]
pub enum LlmError {
    /// 未配置凭据等，服务不可用（HTTP 503）
    #[error("language model unavailable: {0}")]
    Unavailable(String),

    #[error("language model request failed: {0}")]
    Request(String),

    #[error("language model returned no text")]
    EmptyResponse,

    #[error("language model timed out after {0}s")]
    Timeout(u64),
}

impl LlmError {
    /// 仅网络/服务端错误与超时可重试
    pub fn is_retryable(&self) -> bool {
        matches!(self, LlmError::Request(_) | LlmError::Timeout(_))
    }
}

/// LLM 客户端 trait：非流式补全
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, messages: &[Message]) -> Result<String, LlmError>;

    /// 获取累计 token 使用统计：(prompt_tokens, completion_tokens, total_tokens)
    /// 默认返回 (0, 0, 0)，具体实现可覆盖
    fn token_usage(&self) -> (u64, u64, u64) {
        (0, 0, 0)
    }
}

/// 未配置凭据时的占位客户端：进程照常启动，每次调用返回 Unavailable
#[derive(Debug, Clone)]
pub struct UnavailableLlmClient {
    reason: String,
}

impl UnavailableLlmClient {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl LlmClient for UnavailableLlmClient {
    async fn complete(&self, _messages: &[Message]) -> Result<String, LlmError> {
        Err(LlmError::Unavailable(self.reason.clone()))
    }
}

/// 重试策略：max_retries 为 0 时不重试，每次失败后固定等待 backoff
#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub backoff: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 0,
            backoff: Duration::from_millis(500),
        }
    }
}

/// 带重试的 LLM 包装
pub struct RetryingLlmClient {
    inner: Arc<dyn LlmClient>,
    config: RetryConfig,
}

impl RetryingLlmClient {
    pub fn new(inner: Arc<dyn LlmClient>, config: RetryConfig) -> Self {
        Self { inner, config }
    }
}

#[async_trait]
impl LlmClient for RetryingLlmClient {
    async fn complete(&self, messages: &[Message]) -> Result<String, LlmError> {
        let mut attempt = 0;
        loop {
            match self.inner.complete(messages).await {
                Err(e) if e.is_retryable() && attempt < self.config.max_retries => {
                    attempt += 1;
                    tracing::warn!(attempt, error = %e, "llm call failed, retrying");
                    tokio::time::sleep(self.config.backoff).await;
                }
                other => return other,
            }
        }
    }

    fn token_usage(&self) -> (u64, u64, u64) {
        self.inner.token_usage()
    }
}
