//! Weaviate 客户端：REST 写入/更新 + GraphQL nearVector 查询
//!
//! 集合不做服务端向量化（vectorizer = none），向量由调用方提供；
//! 对象 id 在客户端生成（UUID v4）。查询结果在客户端按 (distance, id) 重新排序。

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};

use crate::store::{
    rank_hits, Collection, Filter, Hit, NearQuery, Properties, StoreError, StoredObject,
    VectorStore,
};

pub struct WeaviateStore {
    client: Client,
    base_url: String,
    timeout_secs: u64,
}

impl WeaviateStore {
    pub fn new(base_url: &str, timeout_secs: u64) -> Result<Self, StoreError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| StoreError::Request(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout_secs,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn map_err(&self, e: reqwest::Error) -> StoreError {
        if e.is_timeout() {
            StoreError::Timeout(self.timeout_secs)
        } else {
            StoreError::Request(e.to_string())
        }
    }

    async fn fail(resp: reqwest::Response) -> StoreError {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        StoreError::Request(format!("HTTP {}: {}", status, body.trim()))
    }
}

#[async_trait]
impl VectorStore for WeaviateStore {
    async fn insert(
        &self,
        collection: Collection,
        properties: Properties,
        vector: Vec<f32>,
    ) -> Result<String, StoreError> {
        let id = uuid::Uuid::new_v4().to_string();
        let body = json!({
            "class": collection.class_name(),
            "id": id,
            "properties": properties,
            "vector": vector,
        });
        let resp = self
            .client
            .post(self.url("/v1/objects"))
            .json(&body)
            .send()
            .await
            .map_err(|e| self.map_err(e))?;
        if !resp.status().is_success() {
            return Err(Self::fail(resp).await);
        }
        Ok(id)
    }

    async fn query(
        &self,
        collection: Collection,
        vector: &[f32],
        query: &NearQuery,
    ) -> Result<Vec<Hit>, StoreError> {
        let graphql = build_near_query(collection, vector, query);
        let resp = self
            .client
            .post(self.url("/v1/graphql"))
            .json(&json!({ "query": graphql }))
            .send()
            .await
            .map_err(|e| self.map_err(e))?;
        if !resp.status().is_success() {
            return Err(Self::fail(resp).await);
        }
        let body: Value = resp.json().await.map_err(|e| self.map_err(e))?;
        let mut hits = parse_near_response(collection, &body)?;
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
        let path = format!("/v1/objects/{}/{}", collection.class_name(), id);
        let resp = self
            .client
            .patch(self.url(&path))
            .json(&json!({ "class": collection.class_name(), "properties": properties }))
            .send()
            .await
            .map_err(|e| self.map_err(e))?;
        match resp.status() {
            s if s.is_success() => Ok(()),
            StatusCode::NOT_FOUND => Err(StoreError::NotFound(id.to_string())),
            _ => Err(Self::fail(resp).await),
        }
    }

    async fn get(
        &self,
        collection: Collection,
        id: &str,
    ) -> Result<Option<StoredObject>, StoreError> {
        let path = format!("/v1/objects/{}/{}?include=vector", collection.class_name(), id);
        let resp = self
            .client
            .get(self.url(&path))
            .send()
            .await
            .map_err(|e| self.map_err(e))?;
        match resp.status() {
            StatusCode::NOT_FOUND => Ok(None),
            s if s.is_success() => {
                let body: Value = resp.json().await.map_err(|e| self.map_err(e))?;
                parse_object(&body).map(Some)
            }
            _ => Err(Self::fail(resp).await),
        }
    }

    async fn ensure_schema(&self) -> Result<(), StoreError> {
        for collection in Collection::ALL {
            let resp = self
                .client
                .post(self.url("/v1/schema"))
                .json(&class_definition(collection))
                .send()
                .await
                .map_err(|e| self.map_err(e))?;
            match resp.status() {
                s if s.is_success() => {
                    tracing::info!("created class {}", collection.class_name());
                }
                // 已存在
                StatusCode::UNPROCESSABLE_ENTITY => {
                    tracing::debug!("class {} already exists", collection.class_name());
                }
                _ => return Err(Self::fail(resp).await),
            }
        }
        Ok(())
    }
}

fn class_definition(collection: Collection) -> Value {
    let properties: Vec<Value> = collection
        .fields()
        .iter()
        .map(|(name, data_type)| json!({ "name": name, "dataType": [data_type] }))
        .collect();
    json!({
        "class": collection.class_name(),
        "vectorizer": "none",
        "properties": properties,
    })
}

/// 构造 GraphQL Get 查询
pub(crate) fn build_near_query(collection: Collection, vector: &[f32], query: &NearQuery) -> String {
    let vector = vector
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(", ");
    let where_clause = match &query.filter {
        Some(Filter::GreaterThan { field, value }) => format!(
            ", where: {{path: [\"{}\"], operator: GreaterThan, valueNumber: {}}}",
            field, value
        ),
        None => String::new(),
    };
    let fields = collection
        .fields()
        .iter()
        .map(|(name, _)| *name)
        .collect::<Vec<_>>()
        .join(" ");
    format!(
        "{{ Get {{ {}(nearVector: {{vector: [{}]}}{}, limit: {}) {{ {} _additional {{ id distance }} }} }} }}",
        collection.class_name(),
        vector,
        where_clause,
        query.limit,
        fields
    )
}

/// 解析 GraphQL 响应；无结果时返回空
///
/// 集合尚未创建时 Weaviate 不返回空数组，而是返回 `Cannot query field "<Class>"` 错误，
/// 这种情况同样视为空结果；其余 GraphQL 错误为 Request。
pub(crate) fn parse_near_response(collection: Collection, body: &Value) -> Result<Vec<Hit>, StoreError> {
    if let Some(errors) = body.get("errors").and_then(Value::as_array) {
        let messages: Vec<&str> = errors
            .iter()
            .filter_map(|e| e.get("message").and_then(Value::as_str))
            .collect();
        let missing_class = format!("Cannot query field \"{}\"", collection.class_name());
        if !messages.is_empty() && messages.iter().all(|m| m.starts_with(&missing_class)) {
            tracing::debug!("class {} does not exist yet", collection.class_name());
            return Ok(Vec::new());
        }
        if !errors.is_empty() {
            return Err(StoreError::Request(messages.join("; ")));
        }
    }

    let items = match body
        .pointer(&format!("/data/Get/{}", collection.class_name()))
        .and_then(Value::as_array)
    {
        Some(items) => items,
        None => return Ok(Vec::new()),
    };

    items
        .iter()
        .map(|item| {
            let mut properties = item
                .as_object()
                .cloned()
                .ok_or_else(|| StoreError::Malformed("hit is not an object".to_string()))?;
            let additional = properties.remove("_additional").unwrap_or(Value::Null);
            let id = additional
                .get("id")
                .and_then(Value::as_str)
                .ok_or_else(|| StoreError::Malformed("hit without _additional.id".to_string()))?
                .to_string();
            let distance = additional
                .get("distance")
                .and_then(Value::as_f64)
                .unwrap_or(f64::MAX) as f32;
            Ok(Hit {
                id,
                properties,
                distance,
            })
        })
        .collect()
}

fn parse_object(body: &Value) -> Result<StoredObject, StoreError> {
    let id = body
        .get("id")
        .and_then(Value::as_str)
        .ok_or_else(|| StoreError::Malformed("object without id".to_string()))?
        .to_string();
    let properties = body
        .get("properties")
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default();
    let vector = body
        .get("vector")
        .and_then(Value::as_array)
        .map(|values| {
            values
                .iter()
                .filter_map(Value::as_f64)
                .map(|v| v as f32)
                .collect()
        })
        .unwrap_or_default();
    Ok(StoredObject {
        id,
        properties,
        vector,
    })
}
