//! 工具与协作 Agent 注册表
//!
//! 所有工具实现 Tool trait（name / description / argument_schema / run），协作 Agent 实现 SubAgent；
//! Registry 在 Agent 构造时由两份静态列表一次性建立，之后只读，可通过 Arc 在并发调用间共享。
//! 按名查找未知资源立即返回 UnknownTool / UnknownAgent，不返回空值。

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::agent::signatures::{AgentDescriptor, AvailableResources, ToolDescriptor};
use crate::agent::SubAgent;
use crate::core::AgentError;
use crate::tools::ArgumentSchema;

/// 工具 trait：名称、描述（供 LLM 理解）、参数描述、异步执行（args 为 JSON 对象）
#[async_trait]
pub trait Tool: Send + Sync {
    /// 工具名称（选择结果中的 tool_name）
    fn name(&self) -> &str;

    /// 工具描述（供 LLM 理解功能）
    fn description(&self) -> &str;

    /// 参数描述，默认无参数
    fn argument_schema(&self) -> ArgumentSchema {
        ArgumentSchema::new()
    }

    /// 执行工具；返回值对编排层不透明，原样进入综合步骤
    async fn run(&self, args: Value) -> Result<Value, String>;
}

/// 注册表：工具与协作 Agent 各一份 name → Arc 映射，并保留注册顺序用于生成描述
#[derive(Default)]
pub struct Registry {
    tools: HashMap<String, Arc<dyn Tool>>,
    tool_order: Vec<String>,
    agents: HashMap<String, Arc<dyn SubAgent>>,
    agent_order: Vec<String>,
}

impl Registry {
    pub fn new(tools: Vec<Arc<dyn Tool>>, agents: Vec<Arc<dyn SubAgent>>) -> Self {
        let mut registry = Self::default();
        for tool in tools {
            let name = tool.name().to_string();
            if registry.tools.insert(name.clone(), tool).is_some() {
                tracing::warn!(tool = %name, "duplicate tool name, keeping the last one");
            } else {
                registry.tool_order.push(name);
            }
        }
        for agent in agents {
            let name = agent.name().to_string();
            if registry.agents.insert(name.clone(), agent).is_some() {
                tracing::warn!(agent = %name, "duplicate agent name, keeping the last one");
            } else {
                registry.agent_order.push(name);
            }
        }
        registry
    }

    pub fn tool(&self, name: &str) -> Result<Arc<dyn Tool>, AgentError> {
        self.tools
            .get(name)
            .cloned()
            .ok_or_else(|| AgentError::UnknownTool(name.to_string()))
    }

    pub fn agent(&self, name: &str) -> Result<Arc<dyn SubAgent>, AgentError> {
        self.agents
            .get(name)
            .cloned()
            .ok_or_else(|| AgentError::UnknownAgent(name.to_string()))
    }

    pub fn tool_names(&self) -> &[String] {
        &self.tool_order
    }

    pub fn agent_names(&self) -> &[String] {
        &self.agent_order
    }

    /// 所有资源的描述（名称、说明、参数类型），用于选择步骤的 prompt
    pub fn descriptors(&self) -> AvailableResources {
        let available_tools = self
            .tool_order
            .iter()
            .filter_map(|name| self.tools.get(name))
            .map(|tool| ToolDescriptor {
                tool_name: tool.name().to_string(),
                description: tool.description().to_string(),
                argument_types: tool.argument_schema(),
            })
            .collect();
        let available_agents = self
            .agent_order
            .iter()
            .filter_map(|name| self.agents.get(name))
            .map(|agent| AgentDescriptor {
                agent_name: agent.name().to_string(),
                role: agent.role().to_string(),
                argument_types: agent.argument_schema(),
            })
            .collect();
        AvailableResources {
            available_tools,
            available_agents,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::EchoTool;

    #[test]
    fn test_lookup_unknown_fails() {
        let registry = Registry::new(vec![Arc::new(EchoTool)], vec![]);
        assert!(registry.tool("echo").is_ok());
        assert!(matches!(
            registry.tool("nonexistent"),
            Err(AgentError::UnknownTool(name)) if name == "nonexistent"
        ));
        assert!(matches!(
            registry.agent("echo"),
            Err(AgentError::UnknownAgent(_))
        ));
    }

    #[test]
    fn test_descriptors() {
        let registry = Registry::new(vec![Arc::new(EchoTool), Arc::new(EchoTool)], vec![]);
        let resources = registry.descriptors();
        assert_eq!(resources.available_tools.len(), 1);
        assert!(resources.available_agents.is_empty());
        let echo = &resources.available_tools[0];
        assert_eq!(echo.tool_name, "echo");
        assert!(echo.argument_types.get("text").is_some());
    }
}
