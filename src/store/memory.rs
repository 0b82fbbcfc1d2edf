//! 进程内向量库：余弦距离近邻查询（开发与测试用）
//!
//! 锁只在同步区段内持有，不跨 await；并记录插入/更新次数，便于测试校验副作用。

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::RwLock;

use async_trait::async_trait;

use crate::store::{
    rank_hits, Collection, Hit, NearQuery, Properties, StoreError, StoredObject, VectorStore,
};

/// 内存向量库：每个集合一个按 id 排序的 BTreeMap
#[derive(Debug, Default)]
pub struct InMemoryVectorStore {
    collections: RwLock<HashMap<Collection, BTreeMap<String, StoredObject>>>,
    inserts: AtomicUsize,
    updates: AtomicUsize,
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 成功插入次数（所有集合）
    pub fn insert_count(&self) -> usize {
        self.inserts.load(Ordering::SeqCst)
    }

    /// 成功更新次数（所有集合）
    pub fn update_count(&self) -> usize {
        self.updates.load(Ordering::SeqCst)
    }

    /// 集合内记录数
    pub fn len(&self, collection: Collection) -> usize {
        self.collections
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&collection)
            .map_or(0, BTreeMap::len)
    }

    pub fn is_empty(&self, collection: Collection) -> bool {
        self.len(collection) == 0
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn insert(
        &self,
        collection: Collection,
        properties: Properties,
        vector: Vec<f32>,
    ) -> Result<String, StoreError> {
        if vector.is_empty() {
            return Err(StoreError::Request("vector must not be empty".to_string()));
        }
        let id = uuid::Uuid::new_v4().to_string();
        self.collections
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .entry(collection)
            .or_default()
            .insert(
                id.clone(),
                StoredObject {
                    id: id.clone(),
                    properties,
                    vector,
                },
            );
        self.inserts.fetch_add(1, Ordering::SeqCst);
        Ok(id)
    }

    async fn query(
        &self,
        collection: Collection,
        vector: &[f32],
        query: &NearQuery,
    ) -> Result<Vec<Hit>, StoreError> {
        let collections = self.collections.read().unwrap_or_else(|e| e.into_inner());
        let Some(objects) = collections.get(&collection) else {
            return Ok(Vec::new());
        };

        let mut hits: Vec<Hit> = objects
            .values()
            .filter(|o| query.filter.as_ref().map_or(true, |f| f.matches(&o.properties)))
            .map(|o| Hit {
                id: o.id.clone(),
                properties: o.properties.clone(),
                distance: 1.0 - cosine_similarity(vector, &o.vector),
            })
            .collect();
        rank_hits(&mut hits);
        hits.truncate(query.limit);
        Ok(hits)
    }

    async fn update(
        &self,
        collection: Collection,
        id: &str,
        properties: Properties,
    ) -> Result<(), StoreError> {
        let mut collections = self.collections.write().unwrap_or_else(|e| e.into_inner());
        let object = collections
            .get_mut(&collection)
            .and_then(|objects| objects.get_mut(id))
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        object.properties.extend(properties);
        self.updates.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn get(
        &self,
        collection: Collection,
        id: &str,
    ) -> Result<Option<StoredObject>, StoreError> {
        Ok(self
            .collections
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&collection)
            .and_then(|objects| objects.get(id))
            .cloned())
    }
}

/// 余弦相似度；维度不同或零向量时为 0
fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}
