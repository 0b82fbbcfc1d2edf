//! 检索增强 + 反思学习流水线
//!
//! - **retriever**: 代码片段与高置信度 Playbook 检索
//! - **strategy**: Playbook 生成与落库（置信度 0.5）
//! - **answer**: 按 Playbook 生成回答 / 测试代码
//! - **reflector**: 打分、截断、回写置信度
//! - **orchestrator**: 串联以上阶段

pub mod answer;
pub mod orchestrator;
pub mod prompts;
pub mod reflector;
pub mod retriever;
pub mod strategy;

use std::sync::Arc;

use crate::config::AppConfig;
use crate::llm::{create_embedder_from_config, create_llm_from_config, Embedder, LlmClient};
use crate::store::{create_store_from_config, StoreError, VectorStore};

pub use answer::{AnswerSynthesizer, DEFAULT_TESTING_FRAMEWORK};
pub use orchestrator::{LearningUpdate, Pipeline, PipelineOutcome};
pub use reflector::{parse_score, Reflector};
pub use retriever::{ContextRetriever, RetrievalContext};
pub use strategy::{StrategySynthesizer, NEUTRAL_PRIOR};

/// 进程级外部服务句柄：启动时创建一次，显式注入各组件
#[derive(Clone)]
pub struct Services {
    pub embedder: Arc<dyn Embedder>,
    pub store: Arc<dyn VectorStore>,
    pub llm: Arc<dyn LlmClient>,
}

impl Services {
    pub fn from_config(cfg: &AppConfig) -> Result<Self, StoreError> {
        Ok(Self {
            embedder: create_embedder_from_config(cfg),
            store: create_store_from_config(&cfg.store)?,
            llm: create_llm_from_config(&cfg.llm),
        })
    }
}

impl Pipeline {
    /// 按配置创建完整流水线
    pub fn from_config(cfg: &AppConfig) -> Result<Self, StoreError> {
        Ok(Pipeline::new(Services::from_config(cfg)?).with_reflection(cfg.reflection.enabled))
    }
}
