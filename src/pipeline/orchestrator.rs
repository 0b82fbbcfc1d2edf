//! Pipeline 编排器：检索 → Playbook 生成 → 回答 → 反思
//!
//! 各阶段严格串行；前三个阶段的首个硬失败直接返回，反思失败只记录日志，不影响已生成的回答。
//! 不跨 await 持有任何锁，多个请求可并发共享同一个 Pipeline。

use crate::error::{PipelineError, ReflectionFailure};
use crate::pipeline::answer::AnswerSynthesizer;
use crate::pipeline::reflector::Reflector;
use crate::pipeline::retriever::ContextRetriever;
use crate::pipeline::strategy::StrategySynthesizer;
use crate::pipeline::Services;

/// 学习更新的结果（与回答交付分离）
#[derive(Debug)]
pub enum LearningUpdate {
    /// 置信度已写入
    Recorded(f32),
    /// 反思已关闭，置信度保持先验
    Skipped,
    /// 打分或回写失败（已记录日志）
    Failed(ReflectionFailure),
}

/// 一次完整请求的结果：answer 必定存在，learning 可能失败
#[derive(Debug)]
pub struct PipelineOutcome {
    pub answer: String,
    pub strategy_id: String,
    pub learning: LearningUpdate,
}

pub struct Pipeline {
    services: Services,
    retriever: ContextRetriever,
    strategist: StrategySynthesizer,
    answerer: AnswerSynthesizer,
    reflector: Reflector,
    reflection_enabled: bool,
}

impl Pipeline {
    pub fn new(services: Services) -> Self {
        Self {
            retriever: ContextRetriever::new(services.embedder.clone(), services.store.clone()),
            strategist: StrategySynthesizer::new(
                services.llm.clone(),
                services.embedder.clone(),
                services.store.clone(),
            ),
            answerer: AnswerSynthesizer::new(services.llm.clone()),
            reflector: Reflector::new(services.llm.clone(), services.store.clone()),
            reflection_enabled: true,
            services,
        }
    }

    pub fn with_reflection(mut self, enabled: bool) -> Self {
        self.reflection_enabled = enabled;
        self
    }

    /// 完整流程（POST /generate）
    pub async fn run(&self, request: &str) -> Result<PipelineOutcome, PipelineError> {
        tracing::debug!("pipeline start: {}", request);
        let context = self.retriever.retrieve(request).await?;
        let strategy = self.strategist.synthesize(request, &context).await?;
        let answer = self
            .answerer
            .answer(request, &context, &strategy)
            .await?;

        let learning = if self.reflection_enabled {
            match self
                .reflector
                .reflect(request, &context, &strategy, &answer)
                .await
            {
                Ok(score) => LearningUpdate::Recorded(score),
                Err(e) => {
                    tracing::warn!("reflection on playbook {} failed: {}", strategy.id, e);
                    LearningUpdate::Failed(e)
                }
            }
        } else {
            LearningUpdate::Skipped
        };

        Ok(PipelineOutcome {
            answer,
            strategy_id: strategy.id,
            learning,
        })
    }

    /// 检索 + 单次测试生成（POST /generate-test），不创建也不更新 Playbook
    pub async fn generate_test(&self, code: &str, framework: &str) -> Result<String, PipelineError> {
        let context = self.retriever.retrieve(code).await?;
        self.answerer.generate_test(code, framework, &context).await
    }

    /// 启动时确保两个集合存在；失败只记录 warn，查询缺失集合时按空结果处理
    pub async fn ensure_schema(&self) {
        match self.services.store.ensure_schema().await {
            Ok(()) => tracing::debug!("vector store schema ready"),
            Err(e) => tracing::warn!("vector store schema setup failed: {}", e),
        }
    }

    /// LLM 累计 token 使用：(prompt, completion, total)
    pub fn token_usage(&self) -> (u64, u64, u64) {
        self.services.llm.token_usage()
    }
}
