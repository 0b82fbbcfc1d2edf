//! Strategy Synthesizer：让 LLM 生成 Playbook，并以 0.5 中性先验落库
//!
//! 落库失败即中止请求：没有 id 的 Playbook 无法被 Reflector 回写。

use std::sync::Arc;

use crate::error::PipelineError;
use crate::llm::{Embedder, LlmClient, LlmError};
use crate::pipeline::prompts;
use crate::pipeline::retriever::RetrievalContext;
use crate::store::{Collection, Strategy, VectorStore};

/// 新 Playbook 的初始置信度，也是打分解析失败时的默认分
pub const NEUTRAL_PRIOR: f32 = 0.5;

pub struct StrategySynthesizer {
    llm: Arc<dyn LlmClient>,
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
}

impl StrategySynthesizer {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn VectorStore>,
    ) -> Self {
        Self {
            llm,
            embedder,
            store,
        }
    }

    /// 生成并持久化一个新 Playbook，返回其 id 与文本
    pub async fn synthesize(
        &self,
        request: &str,
        context: &RetrievalContext,
    ) -> Result<Strategy, PipelineError> {
        let messages = prompts::strategy_messages(request, &context.render());
        let playbook = self
            .llm
            .complete(&messages)
            .await
            .map_err(PipelineError::Generation)?
            .trim()
            .to_string();
        // 只校验非空，步骤格式不做结构校验
        if playbook.is_empty() {
            return Err(PipelineError::Generation(LlmError::EmptyResponse));
        }

        let vector = self
            .embedder
            .embed(&playbook)
            .await
            .map_err(PipelineError::Embedding)?;
        let id = self
            .store
            .insert(
                Collection::Strategy,
                Strategy::properties(&playbook, NEUTRAL_PRIOR),
                vector,
            )
            .await
            .map_err(PipelineError::Persistence)?;

        tracing::info!("playbook {} persisted with confidence {}", id, NEUTRAL_PRIOR);
        Ok(Strategy {
            id,
            playbook,
            confidence: NEUTRAL_PRIOR,
        })
    }
}
