//! 集合记录的强类型视图：CodeFragment 与 Strategy（Playbook）

use serde_json::{json, Value};

use crate::store::{Hit, Properties, StoreError, StoredObject};

pub const CODE_FIELD: &str = "code";
pub const FILE_NAME_FIELD: &str = "file_name";
pub const PLAYBOOK_FIELD: &str = "playbook";
pub const CONFIDENCE_FIELD: &str = "confidence";

/// 代码片段（索引任务写入，对流水线只读）
#[derive(Debug, Clone, PartialEq)]
pub struct CodeFragment {
    pub id: String,
    pub code: String,
    pub file_name: String,
}

impl CodeFragment {
    pub fn properties(code: &str, file_name: &str) -> Properties {
        let mut props = Properties::new();
        props.insert(CODE_FIELD.to_string(), Value::String(code.to_string()));
        props.insert(FILE_NAME_FIELD.to_string(), Value::String(file_name.to_string()));
        props
    }
}

impl TryFrom<Hit> for CodeFragment {
    type Error = StoreError;

    fn try_from(hit: Hit) -> Result<Self, Self::Error> {
        Ok(Self {
            code: text_field(&hit.properties, CODE_FIELD, &hit.id)?,
            file_name: text_field(&hit.properties, FILE_NAME_FIELD, &hit.id)?,
            id: hit.id,
        })
    }
}

/// Playbook：有序步骤文本 + [0, 1] 置信度
#[derive(Debug, Clone, PartialEq)]
pub struct Strategy {
    pub id: String,
    pub playbook: String,
    pub confidence: f32,
}

impl Strategy {
    pub fn properties(playbook: &str, confidence: f32) -> Properties {
        let mut props = Properties::new();
        props.insert(PLAYBOOK_FIELD.to_string(), Value::String(playbook.to_string()));
        props.insert(CONFIDENCE_FIELD.to_string(), json!(confidence));
        props
    }

    /// 仅置信度字段（Reflector 回写用）
    pub fn confidence_update(confidence: f32) -> Properties {
        let mut props = Properties::new();
        props.insert(CONFIDENCE_FIELD.to_string(), json!(confidence));
        props
    }

    /// 非空步骤行，保持原顺序
    pub fn steps(&self) -> Vec<&str> {
        self.playbook
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .collect()
    }

    fn decode(id: String, props: &Properties) -> Result<Self, StoreError> {
        let playbook = text_field(props, PLAYBOOK_FIELD, &id)?;
        let confidence = props
            .get(CONFIDENCE_FIELD)
            .and_then(Value::as_f64)
            .ok_or_else(|| missing(CONFIDENCE_FIELD, &id))? as f32;
        Ok(Self {
            id,
            playbook,
            confidence,
        })
    }
}

impl TryFrom<Hit> for Strategy {
    type Error = StoreError;

    fn try_from(hit: Hit) -> Result<Self, Self::Error> {
        Strategy::decode(hit.id, &hit.properties)
    }
}

impl TryFrom<StoredObject> for Strategy {
    type Error = StoreError;

    fn try_from(object: StoredObject) -> Result<Self, Self::Error> {
        Strategy::decode(object.id, &object.properties)
    }
}

fn text_field(props: &Properties, field: &str, id: &str) -> Result<String, StoreError> {
    props
        .get(field)
        .and_then(Value::as_str)
        .map(String::from)
        .ok_or_else(|| missing(field, id))
}

fn missing(field: &str, id: &str) -> StoreError {
    StoreError::Malformed(format!("object {} has no usable `{}` field", id, field))
}
