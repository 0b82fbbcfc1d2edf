//! Answer Synthesizer：按 Playbook 步骤结合上下文生成最终回答；也负责单次测试代码生成

use std::sync::Arc;

use crate::error::PipelineError;
use crate::llm::{LlmClient, LlmError, Message};
use crate::pipeline::prompts;
use crate::pipeline::retriever::RetrievalContext;
use crate::store::Strategy;

pub const DEFAULT_TESTING_FRAMEWORK: &str = "pytest";

pub struct AnswerSynthesizer {
    llm: Arc<dyn LlmClient>,
}

impl AnswerSynthesizer {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }

    /// 按 Playbook 的步骤（去掉空行与缩进）生成回答
    pub async fn answer(
        &self,
        request: &str,
        context: &RetrievalContext,
        strategy: &Strategy,
    ) -> Result<String, PipelineError> {
        let playbook = strategy.steps().join("\n");
        let messages = prompts::answer_messages(request, &context.render(), &playbook);
        self.complete_trimmed(&messages).await
    }

    /// 为给定代码生成单元测试，不涉及 Playbook
    pub async fn generate_test(
        &self,
        code: &str,
        framework: &str,
        context: &RetrievalContext,
    ) -> Result<String, PipelineError> {
        let messages = prompts::test_messages(code, framework, &context.render());
        self.complete_trimmed(&messages).await
    }

    async fn complete_trimmed(&self, messages: &[Message]) -> Result<String, PipelineError> {
        let text = self
            .llm
            .complete(messages)
            .await
            .map_err(PipelineError::Generation)?;
        let text = text.trim();
        if text.is_empty() {
            return Err(PipelineError::Generation(LlmError::EmptyResponse));
        }
        Ok(text.to_string())
    }
}
