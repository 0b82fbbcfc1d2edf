//! Playbook - 检索增强的编码助手
//!
//! 模块划分：
//! - **cli**: 命令行参数（clap）
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **error**: 流水线错误分类（Embedding / Retrieval / Generation / Persistence）与反思失败
//! - **ingest**: 代码目录索引（写入 CodeFragment 集合）
//! - **llm**: LLM 与嵌入客户端抽象与实现（OpenAI 兼容 / Mock）
//! - **observability**: 日志初始化
//! - **pipeline**: 检索 → Playbook 生成 → 回答 → 反思 主流程
//! - **server**: axum HTTP 接口（/generate、/generate-test）
//! - **store**: 向量库抽象（内存 / Weaviate）

pub mod cli;
pub mod config;
pub mod error;
pub mod ingest;
pub mod llm;
pub mod observability;
pub mod pipeline;
pub mod server;
pub mod store;

pub use error::{PipelineError, ReflectionFailure};
pub use pipeline::{Pipeline, PipelineOutcome};
