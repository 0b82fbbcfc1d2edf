//! LLM 层：补全与嵌入客户端抽象与实现（OpenAI 兼容 / Mock）

pub mod embedding;
pub mod message;
pub mod mock;
pub mod openai;
pub mod traits;

pub use embedding::{
    create_embedder_from_config, EmbedError, Embedder, OpenAiEmbedder, UnavailableEmbedder,
};
pub use message::{Message, Role};
pub use mock::{MockEmbedder, MockLlmClient};
pub use openai::{create_llm_from_config, OpenAiClient, TokenUsage};
pub use traits::{LlmClient, LlmError, RetryConfig, RetryingLlmClient, UnavailableLlmClient};
