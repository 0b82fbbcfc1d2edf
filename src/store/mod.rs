//! 向量库抽象：集合 + 外部提供向量
//!
//! 只提供三类操作：带向量插入、近邻查询（可选标量过滤 + 条数上限）、按 id 局部更新非向量字段。
//! 查询结果按距离升序，距离相同按 id 升序，保证同一状态下结果确定。

pub mod memory;
pub mod records;
pub mod weaviate;

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::config::{StoreBackend, StoreSection};

pub use memory::InMemoryVectorStore;
pub use records::{CodeFragment, Strategy};
pub use weaviate::WeaviateStore;

/// 记录的非向量字段
pub type Properties = Map<String, Value>;

/// 向量库错误
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("vector store request failed: {0}")]
    Request(String),

    #[error("vector store returned malformed data: {0}")]
    Malformed(String),

    #[error("object not found: {0}")]
    NotFound(String),

    #[error("vector store timed out after {0}s")]
    Timeout(u64),
}

/// 两个集合：代码片段（由索引任务写入，只读）与 Playbook
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    CodeFragment,
    Strategy,
}

impl Collection {
    pub const ALL: [Collection; 2] = [Collection::CodeFragment, Collection::Strategy];

    /// 向量库中的类名
    pub fn class_name(&self) -> &'static str {
        match self {
            Collection::CodeFragment => "CodeFragment",
            Collection::Strategy => "Strategy",
        }
    }

    /// (字段名, 数据类型)
    pub fn fields(&self) -> &'static [(&'static str, &'static str)] {
        match self {
            Collection::CodeFragment => &[
                (records::CODE_FIELD, "text"),
                (records::FILE_NAME_FIELD, "string"),
            ],
            Collection::Strategy => &[
                (records::PLAYBOOK_FIELD, "text"),
                (records::CONFIDENCE_FIELD, "number"),
            ],
        }
    }
}

/// 标量过滤条件
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// 字段值严格大于 value
    GreaterThan { field: String, value: f64 },
}

impl Filter {
    pub fn greater_than(field: impl Into<String>, value: f64) -> Self {
        Filter::GreaterThan {
            field: field.into(),
            value,
        }
    }

    pub fn matches(&self, properties: &Properties) -> bool {
        match self {
            Filter::GreaterThan { field, value } => properties
                .get(field)
                .and_then(Value::as_f64)
                .is_some_and(|v| v > *value),
        }
    }
}

/// 近邻查询参数
#[derive(Debug, Clone)]
pub struct NearQuery {
    pub limit: usize,
    pub filter: Option<Filter>,
}

impl NearQuery {
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            filter: None,
        }
    }

    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filter = Some(filter);
        self
    }
}

/// 近邻查询命中
#[derive(Debug, Clone, PartialEq)]
pub struct Hit {
    pub id: String,
    pub properties: Properties,
    /// 越小越相似
    pub distance: f32,
}

/// 按 id 读取的完整记录
#[derive(Debug, Clone, PartialEq)]
pub struct StoredObject {
    pub id: String,
    pub properties: Properties,
    pub vector: Vec<f32>,
}

/// 向量库客户端：实现必须可被多个并发请求共享
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// 插入一条记录，返回生成的 id
    async fn insert(
        &self,
        collection: Collection,
        properties: Properties,
        vector: Vec<f32>,
    ) -> Result<String, StoreError>;

    /// 近邻查询；空结果不是错误
    async fn query(
        &self,
        collection: Collection,
        vector: &[f32],
        query: &NearQuery,
    ) -> Result<Vec<Hit>, StoreError>;

    /// 覆盖写入给定字段，其余字段与向量保持不变
    async fn update(
        &self,
        collection: Collection,
        id: &str,
        properties: Properties,
    ) -> Result<(), StoreError>;

    async fn get(&self, collection: Collection, id: &str)
        -> Result<Option<StoredObject>, StoreError>;

    /// 确保集合存在（已存在不是错误）
    async fn ensure_schema(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

/// 命中排序：距离升序，距离相同按 id 升序
pub(crate) fn rank_hits(hits: &mut [Hit]) {
    hits.sort_by(|a, b| {
        a.distance
            .partial_cmp(&b.distance)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.id.cmp(&b.id))
    });
}

/// 根据配置创建向量库客户端
pub fn create_store_from_config(cfg: &StoreSection) -> Result<Arc<dyn VectorStore>, StoreError> {
    match cfg.backend {
        StoreBackend::Weaviate => {
            tracing::info!("Using Weaviate vector store at {}", cfg.url);
            Ok(Arc::new(WeaviateStore::new(&cfg.url, cfg.timeout_secs)?))
        }
        StoreBackend::Memory => {
            tracing::warn!("Using in-process vector store, knowledge is lost on restart");
            Ok(Arc::new(InMemoryVectorStore::new()))
        }
    }
}
