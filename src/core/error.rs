//! Agent 错误类型
//!
//! 编排层不吞错误：未知资源、结构化输出缺字段、下游调用失败都原样向上传播到顶层 forward。

use thiserror::Error;

/// 一次编排过程中可能出现的错误
#[derive(Error, Debug)]
pub enum AgentError {
    /// 模型选择了注册表中不存在的工具（致命，不重试）
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    /// 模型选择了注册表中不存在的协作 Agent（致命，不重试）
    #[error("Unknown agent: {0}")]
    UnknownAgent(String),

    #[error("Malformed structured output for `{field}`: {detail}")]
    MalformedOutput { field: String, detail: String },

    /// 模型给出的参数无法反序列化为资源所需的参数
    #[error("Invalid arguments for {resource}: {detail}")]
    InvalidArguments { resource: String, detail: String },

    #[error("Tool execution failed ({tool}): {message}")]
    ToolExecutionFailed { tool: String, message: String },

    #[error("Tool timeout: {0}")]
    ToolTimeout(String),

    #[error("Agent execution failed ({agent}): {message}")]
    AgentExecutionFailed { agent: String, message: String },

    #[error("LLM error: {0}")]
    LlmError(String),

    #[error("Invalid state transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Config error: {0}")]
    ConfigError(String),
}

impl AgentError {
    /// 未知资源错误在任何批次策略下都不隔离
    pub fn is_unknown_resource(&self) -> bool {
        matches!(self, AgentError::UnknownTool(_) | AgentError::UnknownAgent(_))
    }
}
