//! Action：选择 → 并发执行 → 综合
//!
//! 1. 选择：一次结构化调用，给出要运行的工具与要协作的 Agent（含具体参数）及理由
//! 2. 执行：工具一批、Agent 一批，两批相互独立并发进行；批内各项并发，结果顺序与输入顺序一致
//! 3. 综合：把两批响应格式化为文本，一次结构化调用得到最终回答
//!
//! 每次 forward 新建一个 State 并随返回值交给调用方，Action 本身不保存可变状态，
//! 同一个 Action 可被多个并发循环共享。
//!
//! 批内失败策略见 FanOutPolicy：FailFast 下首个错误使整批失败，未完成的兄弟调用被丢弃；
//! Isolate 下失败项带错误说明进入综合步骤。未知资源在两种策略下都是致命错误。

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::future::{join_all, try_join_all};
use serde_json::Value;
use thiserror::Error;

use crate::agent::prompt::{format_agent_responses, format_tool_responses};
use crate::agent::signatures::{
    AgentInvocation, AgentResponse, ArgumentValues, SelectionDecision, TaskContext,
    ToolInvocation, ToolResponse,
};
use crate::agent::trajectory::State;
use crate::config::{AppConfig, FanOutPolicy};
use crate::core::AgentError;
use crate::llm::{InputField, LlmClient, StructuredPredictor, DEFAULT_MAX_BACKTRACKS};
use crate::tools::{Registry, ToolExecutor};

const SELECT_INSTRUCTIONS: &str = "You are given a task along with some context. For executing the task, \
you are also supported with some available tools and also have team agents.\n\
Based on the task and context provided, your job is to select the right tools and agents, \
with their argument values, for executing the task. Return empty lists when no suitable tool \
or agent is available.";

const SYNTHESIZE_INSTRUCTIONS: &str = "You have to analyze the responses below and generate the right \
response for the given task. The 'task' was given to the agent, for which the agent used the \
following tools and collaborated with its team agents.\n\
'task': the original task given to the agent.\n\
'tools_operation_response': the response from each tool after running.\n\
'agents_execution_response': the response from each team agent after execution.\n\
Write the final response after analyzing both. If possible also highlight the relevant \
links/sources used for generating the response.";

/// Action 的运行参数
#[derive(Debug, Clone, Copy)]
pub struct ActionConfig {
    pub max_backtracks: usize,
    pub tool_timeout: Duration,
    pub fan_out: FanOutPolicy,
}

impl Default for ActionConfig {
    fn default() -> Self {
        Self {
            max_backtracks: DEFAULT_MAX_BACKTRACKS,
            tool_timeout: Duration::from_secs(30),
            fan_out: FanOutPolicy::FailFast,
        }
    }
}

impl ActionConfig {
    pub fn from_config(cfg: &AppConfig) -> Self {
        Self {
            max_backtracks: cfg.llm.max_backtracks,
            tool_timeout: Duration::from_secs(cfg.tools.tool_timeout_secs),
            fan_out: cfg.tools.fan_out,
        }
    }
}

/// 单个工具调用的执行方式；特化 Agent 可替换某些工具的执行（如搜索结果的二次处理）
#[async_trait]
pub trait ToolRunner: Send + Sync {
    async fn run_tool(&self, invocation: &ToolInvocation) -> Result<ToolResponse, AgentError>;
}

/// 一次完整循环的结果
#[derive(Debug, Clone)]
pub struct Cycle {
    pub response: String,
    pub state: State,
}

/// 失败的循环：错误本身与停在 Failed 的 State，调用方可将 State 记入轨迹
#[derive(Debug, Error)]
#[error("{error}")]
pub struct CycleError {
    pub error: AgentError,
    pub state: State,
}

impl From<CycleError> for AgentError {
    fn from(e: CycleError) -> Self {
        e.error
    }
}

pub struct Action {
    registry: Arc<Registry>,
    executor: ToolExecutor,
    fan_out: FanOutPolicy,
    select_step: StructuredPredictor<SelectionDecision>,
    synthesize_step: StructuredPredictor<String>,
}

impl Action {
    pub fn new(registry: Arc<Registry>, llm: Arc<dyn LlmClient>, config: ActionConfig) -> Self {
        Self {
            registry,
            executor: ToolExecutor::with_timeout(config.tool_timeout),
            fan_out: config.fan_out,
            select_step: StructuredPredictor::new(
                llm.clone(),
                SELECT_INSTRUCTIONS,
                "selected_tools_and_agents",
                "Selected tools and agents for executing the task.",
            )
            .with_max_backtracks(config.max_backtracks),
            synthesize_step: StructuredPredictor::new(
                llm,
                SYNTHESIZE_INSTRUCTIONS,
                "final_response",
                "Final response",
            )
            .with_max_backtracks(config.max_backtracks),
        }
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// 选择步骤
    pub async fn select(&self, task: &TaskContext) -> Result<SelectionDecision, AgentError> {
        let resources = self.registry.descriptors();
        let decision = self
            .select_step
            .predict(&[
                InputField::new("task_context", "Task and context provided.", task),
                InputField::new(
                    "available_tools_and_agents",
                    "Available tools and your team agents.",
                    &resources,
                ),
            ])
            .await?;
        tracing::info!(
            tools = decision.tools_to_run.len(),
            agents = decision.agents_to_execute.len(),
            reasoning = %decision.reasoning,
            "tools and agents selected"
        );
        Ok(decision)
    }

    /// 按名查找并执行工具，返回原始结果
    pub async fn call_tool(&self, name: &str, args: &ArgumentValues) -> Result<Value, AgentError> {
        let tool = self.registry.tool(name)?;
        self.executor.execute(&tool, Value::Object(args.clone())).await
    }

    pub async fn run_tool(&self, invocation: &ToolInvocation) -> Result<ToolResponse, AgentError> {
        let response = self
            .call_tool(&invocation.tool_name, &invocation.argument_values)
            .await?;
        Ok(ToolResponse::ok(invocation.clone(), response))
    }

    pub async fn execute_agent(
        &self,
        invocation: &AgentInvocation,
    ) -> Result<AgentResponse, AgentError> {
        let agent = self.registry.agent(&invocation.agent_name)?;
        tracing::info!(agent = %invocation.agent_name, "executing team agent");
        let response = agent
            .run(Value::Object(invocation.argument_values.clone()))
            .await
            .map_err(|e| AgentError::AgentExecutionFailed {
                agent: invocation.agent_name.clone(),
                message: e.to_string(),
            })?;
        Ok(AgentResponse::ok(invocation.clone(), response))
    }

    /// 并发执行一批工具（默认执行方式）
    pub async fn run_tools(
        &self,
        invocations: &[ToolInvocation],
    ) -> Result<Vec<ToolResponse>, AgentError> {
        self.run_tools_with(invocations, self).await
    }

    /// 并发执行一批工具，单项执行方式由 runner 决定
    pub async fn run_tools_with(
        &self,
        invocations: &[ToolInvocation],
        runner: &dyn ToolRunner,
    ) -> Result<Vec<ToolResponse>, AgentError> {
        match self.fan_out {
            FanOutPolicy::FailFast => {
                try_join_all(invocations.iter().map(|inv| runner.run_tool(inv))).await
            }
            FanOutPolicy::Isolate => {
                let results = join_all(invocations.iter().map(|inv| runner.run_tool(inv))).await;
                invocations
                    .iter()
                    .zip(results)
                    .map(|(inv, result)| match result {
                        Ok(resp) => Ok(resp),
                        Err(e) if e.is_unknown_resource() => Err(e),
                        Err(e) => {
                            tracing::warn!(tool = %inv.tool_name, error = %e, "tool failed, isolated");
                            Ok(ToolResponse::failed(inv.clone(), e.to_string()))
                        }
                    })
                    .collect()
            }
        }
    }

    /// 并发执行一批协作 Agent
    pub async fn execute_agents(
        &self,
        invocations: &[AgentInvocation],
    ) -> Result<Vec<AgentResponse>, AgentError> {
        match self.fan_out {
            FanOutPolicy::FailFast => {
                try_join_all(invocations.iter().map(|inv| self.execute_agent(inv))).await
            }
            FanOutPolicy::Isolate => {
                let results =
                    join_all(invocations.iter().map(|inv| self.execute_agent(inv))).await;
                invocations
                    .iter()
                    .zip(results)
                    .map(|(inv, result)| match result {
                        Ok(resp) => Ok(resp),
                        Err(e) if e.is_unknown_resource() => Err(e),
                        Err(e) => {
                            tracing::warn!(agent = %inv.agent_name, error = %e, "agent failed, isolated");
                            Ok(AgentResponse::failed(inv.clone(), e.to_string()))
                        }
                    })
                    .collect()
            }
        }
    }

    /// 执行前确认所有名称都已注册，未知资源在任何调用开始前即失败
    fn check_selection(&self, selection: &SelectionDecision) -> Result<(), AgentError> {
        for inv in &selection.tools_to_run {
            self.registry.tool(&inv.tool_name)?;
        }
        for inv in &selection.agents_to_execute {
            self.registry.agent(&inv.agent_name)?;
        }
        Ok(())
    }

    /// 执行步骤：工具批与 Agent 批并发，两批都完成后返回
    pub async fn execute(
        &self,
        selection: &SelectionDecision,
        runner: &dyn ToolRunner,
    ) -> Result<(Vec<ToolResponse>, Vec<AgentResponse>), AgentError> {
        self.check_selection(selection)?;
        tokio::try_join!(
            self.run_tools_with(&selection.tools_to_run, runner),
            self.execute_agents(&selection.agents_to_execute),
        )
    }

    /// 综合步骤
    pub async fn synthesize(
        &self,
        task: &TaskContext,
        tools_operation_response: &[ToolResponse],
        agents_execution_response: &[AgentResponse],
    ) -> Result<String, AgentError> {
        let tools_text = format_tool_responses(tools_operation_response);
        let agents_text = format_agent_responses(agents_execution_response);
        let response = self
            .synthesize_step
            .predict(&[
                InputField::new("task", "Task and context provided.", task),
                InputField::new(
                    "tools_operation_response",
                    "Responses after running tools.",
                    &tools_text,
                ),
                InputField::new(
                    "agents_execution_response",
                    "Responses after executing agents.",
                    &agents_text,
                ),
            ])
            .await?;
        tracing::info!(chars = response.len(), "task response synthesized");
        Ok(response)
    }

    pub async fn forward(&self, task: &TaskContext) -> Result<Cycle, CycleError> {
        self.forward_with(task, self).await
    }

    /// 完整循环；成功或失败都把 State 交给调用方，失败时 State 停在 Failed
    pub async fn forward_with(
        &self,
        task: &TaskContext,
        runner: &dyn ToolRunner,
    ) -> Result<Cycle, CycleError> {
        let mut state = State::new(task.clone());
        match self.drive(task, runner, &mut state).await {
            Ok(response) => Ok(Cycle { response, state }),
            Err(error) => {
                state.fail(&error);
                tracing::warn!(state = %state.id(), error = %error, "orchestration cycle failed");
                Err(CycleError { error, state })
            }
        }
    }

    async fn drive(
        &self,
        task: &TaskContext,
        runner: &dyn ToolRunner,
        state: &mut State,
    ) -> Result<String, AgentError> {
        state.begin_selection()?;
        let selection = self.select(task).await?;
        state.record_selection(selection.clone())?;

        let (tools_used, agents_interaction) = self.execute(&selection, runner).await?;
        state.record_execution(tools_used, agents_interaction)?;

        let response = self
            .synthesize(task, state.tools_used(), state.agents_interaction())
            .await?;
        state.record_response(Value::String(response.clone()))?;
        Ok(response)
    }
}

#[async_trait]
impl ToolRunner for Action {
    async fn run_tool(&self, invocation: &ToolInvocation) -> Result<ToolResponse, AgentError> {
        Action::run_tool(self, invocation).await
    }
}
