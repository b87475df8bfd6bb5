//! Troupe - 多 Agent 编排层
//!
//! 每个 Agent 的一次循环：选择工具与协作 Agent → 并发执行 → 综合回答；
//! 协作 Agent 也运行同样的循环，因此编排是递归的。
//!
//! 模块划分：
//! - **agent**: 编排循环（Action）、State / Trajectory 账本、SearchAgent、PresentationAgent
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 错误类型
//! - **llm**: LLM 客户端抽象与实现（OpenAI 兼容 / Mock / Scripted）与结构化调用
//! - **observability**: 日志初始化
//! - **tools**: 工具 trait、参数描述、注册表、执行器与具体工具（echo、联网搜索、网页抓取）

pub mod agent;
pub mod config;
pub mod core;
pub mod llm;
pub mod observability;
pub mod tools;

pub use agent::{Action, PresentationAgent, SearchAgent, State, SubAgent, Trajectory};
pub use config::{load_config, AppConfig};
pub use core::AgentError;
