//! 流水线错误类型
//!
//! PipelineError 为硬失败：任一阶段出现即中止请求并返回调用方；
//! ReflectionFailure 仅记录日志，永不阻断已生成的回答。

use thiserror::Error;

use crate::llm::{EmbedError, LlmError};
use crate::store::StoreError;

/// 请求级硬失败，错误信息指明是哪个外部依赖失败
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("embedding error: {0}")]
    Embedding(#[source] EmbedError),

    #[error("retrieval error: {0}")]
    Retrieval(#[source] StoreError),

    #[error("generation error: {0}")]
    Generation(#[source] LlmError),

    /// Playbook 写入失败：没有落库的 Playbook 不允许继续生成回答
    #[error("persistence error: {0}")]
    Persistence(#[source] StoreError),
}

impl PipelineError {
    /// 稳定的错误标识（用于 HTTP 响应与日志）
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::Embedding(_) => "embedding_error",
            PipelineError::Retrieval(_) => "retrieval_error",
            PipelineError::Generation(_) => "generation_error",
            PipelineError::Persistence(_) => "persistence_error",
        }
    }

    /// 凭据缺失导致的服务不可用
    pub fn is_unavailable(&self) -> bool {
        matches!(
            self,
            PipelineError::Generation(LlmError::Unavailable(_))
                | PipelineError::Embedding(EmbedError::Unavailable(_))
        )
    }

    pub fn is_timeout(&self) -> bool {
        match self {
            PipelineError::Embedding(e) => matches!(e, EmbedError::Timeout(_)),
            PipelineError::Retrieval(e) | PipelineError::Persistence(e) => {
                matches!(e, StoreError::Timeout(_))
            }
            PipelineError::Generation(e) => matches!(e, LlmError::Timeout(_)),
        }
    }
}

/// 反思失败：打分或回写失败，只记录不上抛
#[derive(Error, Debug)]
pub enum ReflectionFailure {
    #[error("scoring call failed: {0}")]
    Scoring(#[source] LlmError),

    #[error("confidence write-back failed: {0}")]
    WriteBack(#[source] StoreError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_and_display() {
        let err = PipelineError::Generation(LlmError::Request("HTTP 500".to_string()));
        assert_eq!(err.kind(), "generation_error");
        assert!(err.to_string().contains("generation error"));
        assert!(err.to_string().contains("HTTP 500"));
        assert!(!err.is_unavailable());
    }

    #[test]
    fn test_unavailable_and_timeout() {
        let missing = PipelineError::Generation(LlmError::Unavailable("no key".to_string()));
        assert!(missing.is_unavailable());

        let slow = PipelineError::Retrieval(StoreError::Timeout(30));
        assert!(slow.is_timeout());
        assert_eq!(slow.kind(), "retrieval_error");
    }
}
