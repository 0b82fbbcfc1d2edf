//! Context Retriever：按请求向量检索代码片段与高置信度 Playbook（只读）
//!
//! 每次最多 3 个片段 + 1 个置信度严格大于 0.7 的 Playbook；没有合格 Playbook 时只用代码上下文。

use std::sync::Arc;

use crate::error::PipelineError;
use crate::llm::Embedder;
use crate::store::records::CONFIDENCE_FIELD;
use crate::store::{CodeFragment, Collection, Filter, NearQuery, Strategy, VectorStore};

pub const FRAGMENT_LIMIT: usize = 3;
pub const STRATEGY_LIMIT: usize = 1;
/// 与向量库过滤使用同一精度（f64）比较
pub const CONFIDENCE_THRESHOLD: f64 = 0.7;

/// 单次请求的检索结果（不持久化），顺序即向量库排名
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RetrievalContext {
    pub fragments: Vec<CodeFragment>,
    pub strategy: Option<Strategy>,
}

impl RetrievalContext {
    /// 渲染为 prompt 文本：先代码片段，再推荐 Playbook（如有）
    pub fn render(&self) -> String {
        let mut out = String::new();
        for fragment in &self.fragments {
            out.push_str(&format!(
                "--- From {} ---\n{}\n\n",
                fragment.file_name, fragment.code
            ));
        }
        if let Some(strategy) = &self.strategy {
            out.push_str(&format!(
                "--- Recommended Playbook (confidence {:.2}) ---\n{}\n\n",
                strategy.confidence, strategy.playbook
            ));
        }
        out
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty() && self.strategy.is_none()
    }
}

pub struct ContextRetriever {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
}

impl ContextRetriever {
    pub fn new(embedder: Arc<dyn Embedder>, store: Arc<dyn VectorStore>) -> Self {
        Self { embedder, store }
    }

    pub async fn retrieve(&self, request: &str) -> Result<RetrievalContext, PipelineError> {
        let vector = self
            .embedder
            .embed(request)
            .await
            .map_err(PipelineError::Embedding)?;

        let mut fragments: Vec<CodeFragment> = self
            .store
            .query(Collection::CodeFragment, &vector, &NearQuery::new(FRAGMENT_LIMIT))
            .await
            .map_err(PipelineError::Retrieval)?
            .into_iter()
            .filter_map(|hit| {
                CodeFragment::try_from(hit)
                    .map_err(|e| tracing::warn!("skipping code fragment: {}", e))
                    .ok()
            })
            .collect();
        fragments.truncate(FRAGMENT_LIMIT);

        let filter = Filter::greater_than(CONFIDENCE_FIELD, CONFIDENCE_THRESHOLD);
        let strategy_query = NearQuery::new(STRATEGY_LIMIT).with_filter(filter.clone());
        let strategy = self
            .store
            .query(Collection::Strategy, &vector, &strategy_query)
            .await
            .map_err(PipelineError::Retrieval)?
            .into_iter()
            .filter(|hit| filter.matches(&hit.properties))
            .find_map(|hit| {
                Strategy::try_from(hit)
                    .map_err(|e| tracing::warn!("skipping playbook: {}", e))
                    .ok()
            });

        tracing::debug!(
            "retrieved {} fragments, playbook: {}",
            fragments.len(),
            strategy.as_ref().map_or("none", |s| s.id.as_str())
        );
        Ok(RetrievalContext {
            fragments,
            strategy,
        })
    }
}
