//! Reflector：对回答打分并回写 Playbook 置信度
//!
//! 分数一律截断到 [0, 1]；无法解析时取 0.5。打分或回写失败只返回 ReflectionFailure，由编排器记录日志。

use std::sync::Arc;

use crate::error::ReflectionFailure;
use crate::llm::LlmClient;
use crate::pipeline::prompts;
use crate::pipeline::retriever::RetrievalContext;
use crate::pipeline::strategy::NEUTRAL_PRIOR;
use crate::store::{Collection, Strategy, VectorStore};

/// 解析模型输出的分数：NaN 或非数字取默认 0.5，其余截断到 [0, 1]
pub fn parse_score(raw: &str) -> f32 {
    match raw.trim().parse::<f32>() {
        Ok(score) if !score.is_nan() => score.clamp(0.0, 1.0),
        _ => {
            tracing::debug!("unparsable reflection score {:?}, using {}", raw, NEUTRAL_PRIOR);
            NEUTRAL_PRIOR
        }
    }
}

pub struct Reflector {
    llm: Arc<dyn LlmClient>,
    store: Arc<dyn VectorStore>,
}

impl Reflector {
    pub fn new(llm: Arc<dyn LlmClient>, store: Arc<dyn VectorStore>) -> Self {
        Self { llm, store }
    }

    /// 打分并覆盖写入置信度，返回写入的分数
    pub async fn reflect(
        &self,
        request: &str,
        context: &RetrievalContext,
        strategy: &Strategy,
        answer: &str,
    ) -> Result<f32, ReflectionFailure> {
        let messages =
            prompts::reflection_messages(request, &context.render(), &strategy.playbook, answer);
        let raw = self
            .llm
            .complete(&messages)
            .await
            .map_err(ReflectionFailure::Scoring)?;
        let score = parse_score(&raw);

        self.store
            .update(
                Collection::Strategy,
                &strategy.id,
                Strategy::confidence_update(score),
            )
            .await
            .map_err(ReflectionFailure::WriteBack)?;

        tracing::info!("playbook {} confidence updated to {:.2}", strategy.id, score);
        Ok(score)
    }
}
