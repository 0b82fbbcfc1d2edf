//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `PLAYBOOK__*` 覆盖（双下划线表示嵌套，如 `PLAYBOOK__LLM__MODEL=gpt-4o-mini`），
//! 最后识别常用的裸环境变量：`OPENAI_API_KEY`、`EMBEDDING_MODEL`、`WEAVIATE_URL`。

use std::path::PathBuf;

use serde::Deserialize;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerSection,
    pub llm: LlmSection,
    pub embedding: EmbeddingSection,
    pub store: StoreSection,
    pub reflection: ReflectionSection,
}

/// [server] 段：监听地址
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    pub bind: String,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8000".to_string(),
        }
    }
}

/// [llm] 段：模型、端点、采样参数、超时与重试
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmSection {
    pub model: String,
    /// OpenAI 兼容端点，未设置时用官方地址
    pub base_url: Option<String>,
    /// 未设置时读取 OPENAI_API_KEY；仍缺失则 LLM 视为不可用（每个请求返回 503）
    pub api_key: Option<String>,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeouts: LlmTimeoutsSection,
    pub retry: LlmRetrySection,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            model: "gpt-3.5-turbo".to_string(),
            base_url: None,
            api_key: None,
            temperature: 0.5,
            max_tokens: 1500,
            timeouts: LlmTimeoutsSection::default(),
            retry: LlmRetrySection::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmTimeoutsSection {
    /// 单次补全请求超时（秒）
    pub request: u64,
}

impl Default for LlmTimeoutsSection {
    fn default() -> Self {
        Self { request: 60 }
    }
}

/// [llm.retry] 段：默认不重试
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmRetrySection {
    pub max_retries: u32,
    pub backoff_ms: u64,
}

impl Default for LlmRetrySection {
    fn default() -> Self {
        Self {
            max_retries: 0,
            backoff_ms: 500,
        }
    }
}

/// [embedding] 段：嵌入模型与端点
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EmbeddingSection {
    pub model: String,
    /// 自建 OpenAI 兼容嵌入服务（如本地 TEI），设置后无需 API Key
    pub base_url: Option<String>,
    /// 未设置时沿用 llm.api_key
    pub api_key: Option<String>,
    pub timeout_secs: u64,
}

impl Default for EmbeddingSection {
    fn default() -> Self {
        Self {
            model: "text-embedding-3-small".to_string(),
            base_url: None,
            api_key: None,
            timeout_secs: 30,
        }
    }
}

/// 向量库后端
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Weaviate,
    /// 进程内存储，仅用于开发与测试
    Memory,
}

/// [store] 段：向量库后端、地址与超时
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreSection {
    pub backend: StoreBackend,
    pub url: String,
    pub timeout_secs: u64,
}

impl Default for StoreSection {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Weaviate,
            url: "http://localhost:8080".to_string(),
            timeout_secs: 30,
        }
    }
}

/// [reflection] 段：关闭后 Playbook 保持 0.5 先验
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ReflectionSection {
    pub enabled: bool,
}

impl Default for ReflectionSection {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl AppConfig {
    /// 嵌入服务使用的 Key：embedding.api_key 优先，否则沿用 llm.api_key
    pub fn embedding_api_key(&self) -> Option<&str> {
        self.embedding
            .api_key
            .as_deref()
            .or(self.llm.api_key.as_deref())
            .filter(|k| !k.trim().is_empty())
    }
}

/// 从 config 目录加载配置，环境变量 PLAYBOOK__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 叠加环境变量 PLAYBOOK__*（双下划线表示嵌套键）
/// 4. 最后应用 OPENAI_API_KEY / EMBEDDING_MODEL / WEAVIATE_URL
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("PLAYBOOK")
            .separator("__")
            .try_parsing(true),
    );

    let mut cfg: AppConfig = builder.build()?.try_deserialize()?;
    apply_env_overrides(&mut cfg, |key| std::env::var(key).ok());
    Ok(cfg)
}

/// 加载配置；失败时记录 warn 并退回默认值，但仍应用裸环境变量（凭据不丢失）
pub fn load_config_or_default(config_path: Option<PathBuf>) -> AppConfig {
    load_config(config_path).unwrap_or_else(|e| {
        tracing::warn!("Config load failed ({}), using defaults", e);
        default_with_env(|key| std::env::var(key).ok())
    })
}

/// 默认配置 + 裸环境变量
pub fn default_with_env(lookup: impl Fn(&str) -> Option<String>) -> AppConfig {
    let mut cfg = AppConfig::default();
    apply_env_overrides(&mut cfg, lookup);
    cfg
}

/// 识别裸环境变量；lookup 便于测试注入
pub fn apply_env_overrides(cfg: &mut AppConfig, lookup: impl Fn(&str) -> Option<String>) {
    let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    if cfg.llm.api_key.is_none() {
        cfg.llm.api_key = non_empty("OPENAI_API_KEY");
    }
    if let Some(model) = non_empty("EMBEDDING_MODEL") {
        cfg.embedding.model = model;
    }
    if let Some(url) = non_empty("WEAVIATE_URL") {
        cfg.store.url = url;
        cfg.store.backend = StoreBackend::Weaviate;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.server.bind, "127.0.0.1:8000");
        assert_eq!(cfg.llm.model, "gpt-3.5-turbo");
        assert_eq!(cfg.llm.timeouts.request, 60);
        assert_eq!(cfg.llm.retry.max_retries, 0);
        assert_eq!(cfg.store.backend, StoreBackend::Weaviate);
        assert!(cfg.reflection.enabled);
        assert!(cfg.llm.api_key.is_none());
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("OPENAI_API_KEY", "sk-test"),
            ("EMBEDDING_MODEL", "all-MiniLM-L6-v2"),
            ("WEAVIATE_URL", "http://weaviate:8080"),
        ]
        .into_iter()
        .collect();

        let mut cfg = AppConfig::default();
        cfg.store.backend = StoreBackend::Memory;
        apply_env_overrides(&mut cfg, |k| env.get(k).map(|v| v.to_string()));

        assert_eq!(cfg.llm.api_key.as_deref(), Some("sk-test"));
        assert_eq!(cfg.embedding.model, "all-MiniLM-L6-v2");
        assert_eq!(cfg.store.url, "http://weaviate:8080");
        assert_eq!(cfg.store.backend, StoreBackend::Weaviate);
        assert_eq!(cfg.embedding_api_key(), Some("sk-test"));
    }

    #[test]
    fn test_configured_key_wins_over_env() {
        let mut cfg = AppConfig::default();
        cfg.llm.api_key = Some("sk-file".to_string());
        apply_env_overrides(&mut cfg, |k| (k == "OPENAI_API_KEY").then(|| "sk-env".to_string()));
        assert_eq!(cfg.llm.api_key.as_deref(), Some("sk-file"));
    }

    #[test]
    fn test_blank_key_is_ignored() {
        let mut cfg = AppConfig::default();
        apply_env_overrides(&mut cfg, |k| (k == "OPENAI_API_KEY").then(|| "  ".to_string()));
        assert!(cfg.llm.api_key.is_none());
        assert!(cfg.embedding_api_key().is_none());
    }

    #[test]
    fn test_malformed_file_falls_back_with_env() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.toml");
        std::fs::write(&path, "[llm\nmodel = ").unwrap();
        assert!(load_config(Some(path.clone())).is_err());

        let cfg = load_config_or_default(Some(path));
        assert_eq!(cfg.llm.model, "gpt-3.5-turbo");

        let cfg = default_with_env(|k| (k == "OPENAI_API_KEY").then(|| "sk-env".to_string()));
        assert_eq!(cfg.llm.api_key.as_deref(), Some("sk-env"));
        assert_eq!(cfg.embedding_api_key(), Some("sk-env"));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.toml");
        std::fs::write(
            &path,
            "[store]\nbackend = \"memory\"\n\n[llm]\nmodel = \"gpt-4o-mini\"\n\n[llm.retry]\nmax_retries = 2\n",
        )
        .unwrap();

        let cfg = load_config(Some(path)).unwrap();
        assert_eq!(cfg.llm.model, "gpt-4o-mini");
        assert_eq!(cfg.llm.retry.max_retries, 2);
        assert_eq!(cfg.llm.temperature, 0.5);
        assert_eq!(cfg.llm.timeouts.request, 60);
    }
}
