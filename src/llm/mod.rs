//! LLM 层：客户端抽象与实现（OpenAI 兼容 / Mock / Scripted）与结构化调用

pub mod message;
pub mod mock;
pub mod openai;
pub mod structured;
pub mod traits;

use std::sync::Arc;

use crate::config::AppConfig;

pub use message::{Message, Role};
pub use mock::{MockLlmClient, ScriptedLlmClient};
pub use openai::{OpenAiClient, TokenUsage};
pub use structured::{InputField, StructuredPredictor, DEFAULT_MAX_BACKTRACKS};
pub use traits::LlmClient;

/// 按配置创建 LLM 客户端；provider 为 mock 或未设置 OPENAI_API_KEY 时退回 Mock
pub fn create_llm_from_config(cfg: &AppConfig) -> Arc<dyn LlmClient> {
    let provider = cfg.llm.provider.to_lowercase();
    let has_key = std::env::var("OPENAI_API_KEY").is_ok();

    if provider == "openai" && has_key {
        tracing::info!("Using OpenAI LLM ({})", cfg.llm.model);
        Arc::new(OpenAiClient::from_section(&cfg.llm))
    } else {
        if provider != "mock" {
            tracing::warn!(provider = %provider, "No API key set or provider unknown, using Mock LLM");
        }
        Arc::new(MockLlmClient)
    }
}
