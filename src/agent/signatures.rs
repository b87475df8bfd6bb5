//! 结构化调用的输入/输出类型
//!
//! 选择步骤与综合步骤之间流转的数据：任务与上下文、资源描述、选择结果、工具/Agent 响应，
//! 以及两个特化 Agent 使用的幻灯片与搜索答案结构。输出类型上的文档注释会经 schemars 进入 prompt。

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::tools::ArgumentSchema;

/// 参数名 → 具体参数值
pub type ArgumentValues = serde_json::Map<String, Value>;

/// 一次编排的输入：任务（自由格式，可为结构化数据）与上下文
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskContext {
    #[serde(default)]
    pub task: Value,
    #[serde(default)]
    pub context: String,
}

impl TaskContext {
    pub fn new(task: impl Into<Value>, context: impl Into<String>) -> Self {
        Self {
            task: task.into(),
            context: context.into(),
        }
    }
}

/// 可用工具：名称、说明、参数类型
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub tool_name: String,
    pub description: String,
    pub argument_types: ArgumentSchema,
}

/// 可用协作 Agent：名称、角色、参数类型
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentDescriptor {
    pub agent_name: String,
    pub role: String,
    pub argument_types: ArgumentSchema,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AvailableResources {
    pub available_tools: Vec<ToolDescriptor>,
    pub available_agents: Vec<AgentDescriptor>,
}

/// A tool to run, with the argument values to run it with.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ToolInvocation {
    /// Name of the tool, exactly as listed in available_tools.
    #[serde(default)]
    pub tool_name: String,
    /// Argument name -> argument value used to run the tool.
    #[serde(default)]
    pub argument_values: ArgumentValues,
}

/// A team agent to execute, with the argument values to execute it with.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AgentInvocation {
    /// Name of the agent, exactly as listed in available_agents.
    #[serde(default)]
    pub agent_name: String,
    /// Argument name -> argument value used to execute the agent.
    #[serde(default)]
    pub argument_values: ArgumentValues,
}

/// The tools and team agents selected for executing the task. Either list may be empty
/// when no suitable tool or agent is available.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SelectionDecision {
    /// Tools to run, each with its argument values.
    #[serde(default)]
    pub tools_to_run: Vec<ToolInvocation>,
    /// Team agents to execute, each with its argument values.
    #[serde(default)]
    pub agents_to_execute: Vec<AgentInvocation>,
    /// A brief reason behind selecting these tools or agents.
    #[serde(default)]
    pub reasoning: String,
}

impl SelectionDecision {
    pub fn is_empty(&self) -> bool {
        self.tools_to_run.is_empty() && self.agents_to_execute.is_empty()
    }
}

/// 工具调用及其原始响应；error 仅在逐项隔离策略下记录失败
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResponse {
    pub tool: ToolInvocation,
    pub response: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ToolResponse {
    pub fn ok(tool: ToolInvocation, response: Value) -> Self {
        Self {
            tool,
            response,
            error: None,
        }
    }

    pub fn failed(tool: ToolInvocation, error: impl Into<String>) -> Self {
        Self {
            tool,
            response: Value::Null,
            error: Some(error.into()),
        }
    }
}

/// 协作 Agent 调用及其原始响应
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentResponse {
    pub agent: AgentInvocation,
    pub response: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AgentResponse {
    pub fn ok(agent: AgentInvocation, response: Value) -> Self {
        Self {
            agent,
            response,
            error: None,
        }
    }

    pub fn failed(agent: AgentInvocation, error: impl Into<String>) -> Self {
        Self {
            agent,
            response: Value::Null,
            error: Some(error.into()),
        }
    }
}

/// Outline of one slide.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SlideOutline {
    /// Title of the slide.
    #[serde(default)]
    pub title: String,
    /// Outline for creating the content of the slide.
    #[serde(default)]
    pub content_outline: String,
}

/// Outline for building the presentation. The total number of slides must not exceed 15.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PresentationOutline {
    /// Slides, each with a title and a content outline.
    #[serde(default)]
    pub outline: Vec<SlideOutline>,
}

/// A finished slide.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SlideContent {
    /// Title of the slide.
    #[serde(default)]
    pub title: String,
    /// Content on the slide.
    #[serde(default)]
    pub content: String,
}

/// Final presentation: the list of slides with title and content.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Presentation {
    /// Slides containing title and content.
    #[serde(default)]
    pub presentation: Vec<SlideContent>,
}

/// 搜索 Agent 浏览到的网页内容
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BrowsedAnswers {
    pub task: TaskContext,
    pub browsed_answers: String,
}

/// The final search answer after analyzing the task and the browsed answers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SearchAnswer {
    /// Final answer of the task.
    #[serde(default)]
    pub answer: String,
}
