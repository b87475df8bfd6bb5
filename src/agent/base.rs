//! Agent 构造时的预处理：背景故事、注册表、资源描述
//!
//! 每个 Agent 用自己的工具与协作 Agent 列表建一次 Registry，之后只读；
//! 协作 Agent 以已构造好的 Arc 注册，因此 Agent 之间的引用关系天然无环。

use std::sync::Arc;

use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::Value;

use crate::agent::prompt::background_story;
use crate::agent::signatures::AvailableResources;
use crate::agent::SubAgent;
use crate::core::AgentError;
use crate::tools::{Registry, Tool};

/// Agent 的名称与角色
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentProfile {
    pub name: String,
    pub role: String,
}

impl AgentProfile {
    pub fn new(name: impl Into<String>, role: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            role: role.into(),
        }
    }
}

/// 所有 Agent 作为协作者被调用时接受的参数
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ForwardArgs {
    pub task: String,
    pub context: Option<String>,
}

impl ForwardArgs {
    pub fn parse(agent_name: &str, args: Value) -> Result<Self, AgentError> {
        serde_json::from_value(args).map_err(|e| AgentError::InvalidArguments {
            resource: agent_name.to_string(),
            detail: e.to_string(),
        })
    }
}

/// 预处理结果
pub struct Preprocessed {
    pub background_story: String,
    pub registry: Arc<Registry>,
    pub resources: AvailableResources,
}

impl Preprocessed {
    pub fn new(
        profile: &AgentProfile,
        tools: Vec<Arc<dyn Tool>>,
        team_agents: Vec<Arc<dyn SubAgent>>,
    ) -> Self {
        let registry = Arc::new(Registry::new(tools, team_agents));
        let resources = registry.descriptors();
        tracing::debug!(
            agent = %profile.name,
            tools = ?registry.tool_names(),
            agents = ?registry.agent_names(),
            "agent preprocessed"
        );
        Self {
            background_story: background_story(&profile.name, &profile.role),
            registry,
            resources,
        }
    }
}
