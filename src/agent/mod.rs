//! Agent 层：选择 → 并发执行 → 综合 的编排循环，状态账本，以及两个特化 Agent
//!
//! 协作 Agent 与工具在注册表中是对等的资源：都声明参数描述、都以 JSON 参数被调用；
//! 区别只在于协作 Agent 的 run 会递归地跑一遍完整的编排循环。

pub mod action;
pub mod base;
pub mod presentation;
pub mod prompt;
pub mod search;
pub mod signatures;
pub mod trajectory;

use async_trait::async_trait;
use serde_json::Value;

use crate::core::AgentError;
use crate::tools::ArgumentSchema;

pub use action::{Action, ActionConfig, Cycle, CycleError, ToolRunner};
pub use base::{AgentProfile, ForwardArgs, Preprocessed};
pub use presentation::PresentationAgent;
pub use search::SearchAgent;
pub use signatures::{
    AgentDescriptor, AgentInvocation, AgentResponse, ArgumentValues, AvailableResources,
    Presentation, PresentationOutline, SelectionDecision, SlideContent, SlideOutline,
    TaskContext, ToolDescriptor, ToolInvocation, ToolResponse,
};
pub use trajectory::{Phase, State, Trajectory, UNSET_REWARD};

/// 协作 Agent trait：名称、角色（供 LLM 理解）、参数描述、异步执行
#[async_trait]
pub trait SubAgent: Send + Sync {
    fn name(&self) -> &str;

    fn role(&self) -> &str;

    /// 默认接受 `{task, context?}`
    fn argument_schema(&self) -> ArgumentSchema {
        ArgumentSchema::derive::<ForwardArgs>()
    }

    async fn run(&self, args: Value) -> Result<Value, AgentError>;
}
