//! 编排状态与轨迹账本
//!
//! State：一次「选择 → 执行 → 综合」循环的快照，按阶段顺序逐字段写入，每个字段只写一次：
//! `Created → Selecting → Executing → Synthesizing → Done`，任一阶段出错进入 `Failed`，终态不可离开。
//! Trajectory：一次顶层调用的只追加账本（State 列表 + 可见资源），仅在内存中保存。

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use crate::agent::signatures::{
    AgentResponse, AvailableResources, SelectionDecision, TaskContext, ToolResponse,
};
use crate::core::AgentError;

/// 奖励占位值：本系统不计算奖励
pub const UNSET_REWARD: i64 = -1;

/// 单次循环的阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Created,
    Selecting,
    Executing,
    Synthesizing,
    Done,
    Failed,
}

impl Phase {
    /// 线性后继；终态无后继
    pub fn next(self) -> Option<Phase> {
        match self {
            Phase::Created => Some(Phase::Selecting),
            Phase::Selecting => Some(Phase::Executing),
            Phase::Executing => Some(Phase::Synthesizing),
            Phase::Synthesizing => Some(Phase::Done),
            Phase::Done | Phase::Failed => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Phase::Done | Phase::Failed)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Phase::Created => "created",
            Phase::Selecting => "selecting",
            Phase::Executing => "executing",
            Phase::Synthesizing => "synthesizing",
            Phase::Done => "done",
            Phase::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// 一次循环的状态快照
#[derive(Debug, Clone, Serialize)]
pub struct State {
    id: Uuid,
    created_at: DateTime<Utc>,
    phase: Phase,
    task: TaskContext,
    selection: Option<SelectionDecision>,
    tools_used: Vec<ToolResponse>,
    agents_interaction: Vec<AgentResponse>,
    response: Value,
    reward: i64,
    error: Option<String>,
}

impl State {
    pub fn new(task: TaskContext) -> Self {
        Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            phase: Phase::Created,
            task,
            selection: None,
            tools_used: Vec::new(),
            agents_interaction: Vec::new(),
            response: Value::String(String::new()),
            reward: UNSET_REWARD,
            error: None,
        }
    }

    /// 单次模型调用的步骤（如大纲、审阅）：直接以 Done 创建
    pub fn single_step(task: TaskContext, response: Value) -> Self {
        let mut state = Self::new(task);
        state.phase = Phase::Done;
        state.response = response;
        state
    }

    /// 按线性顺序推进到下一阶段；跳过或重复阶段返回 InvalidTransition
    pub fn advance(&mut self, to: Phase) -> Result<(), AgentError> {
        if self.phase.next() == Some(to) {
            tracing::debug!(state = %self.id, from = %self.phase, to = %to, "state transition");
            self.phase = to;
            Ok(())
        } else {
            Err(AgentError::InvalidTransition {
                from: self.phase.to_string(),
                to: to.to_string(),
            })
        }
    }

    pub fn begin_selection(&mut self) -> Result<(), AgentError> {
        self.advance(Phase::Selecting)
    }

    pub fn record_selection(&mut self, selection: SelectionDecision) -> Result<(), AgentError> {
        self.advance(Phase::Executing)?;
        self.selection = Some(selection);
        Ok(())
    }

    pub fn record_execution(
        &mut self,
        tools_used: Vec<ToolResponse>,
        agents_interaction: Vec<AgentResponse>,
    ) -> Result<(), AgentError> {
        self.advance(Phase::Synthesizing)?;
        self.tools_used = tools_used;
        self.agents_interaction = agents_interaction;
        Ok(())
    }

    pub fn record_response(&mut self, response: Value) -> Result<(), AgentError> {
        self.advance(Phase::Done)?;
        self.response = response;
        Ok(())
    }

    /// 标记失败；已处于终态时不变
    pub fn fail(&mut self, err: &AgentError) {
        if !self.phase.is_terminal() {
            self.phase = Phase::Failed;
            self.error = Some(err.to_string());
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn task(&self) -> &TaskContext {
        &self.task
    }

    pub fn selection(&self) -> Option<&SelectionDecision> {
        self.selection.as_ref()
    }

    pub fn tools_used(&self) -> &[ToolResponse] {
        &self.tools_used
    }

    pub fn agents_interaction(&self) -> &[AgentResponse] {
        &self.agents_interaction
    }

    pub fn response(&self) -> &Value {
        &self.response
    }

    pub fn reward(&self) -> i64 {
        self.reward
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }
}

/// 一次顶层调用的轨迹：只追加，不提供删除或重排
#[derive(Debug, Clone, Serialize)]
pub struct Trajectory {
    id: Uuid,
    task: TaskContext,
    resources: AvailableResources,
    states: Vec<State>,
    response: Option<Value>,
    reward: i64,
}

impl Trajectory {
    pub fn new(task: TaskContext, resources: AvailableResources) -> Self {
        Self {
            id: Uuid::new_v4(),
            task,
            resources,
            states: Vec::new(),
            response: None,
            reward: UNSET_REWARD,
        }
    }

    pub fn add_state(&mut self, state: State) {
        tracing::debug!(
            trajectory = %self.id,
            state = %state.id(),
            phase = %state.phase(),
            index = self.states.len(),
            "state appended"
        );
        self.states.push(state);
    }

    pub fn last_state(&self) -> Option<&State> {
        self.states.last()
    }

    pub fn states(&self) -> &[State] {
        &self.states
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    pub fn set_response(&mut self, response: Value) {
        self.response = Some(response);
    }

    pub fn response(&self) -> Option<&Value> {
        self.response.as_ref()
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn task(&self) -> &TaskContext {
        &self.task
    }

    pub fn resources(&self) -> &AvailableResources {
        &self.resources
    }

    pub fn reward(&self) -> i64 {
        self.reward
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn task(n: usize) -> TaskContext {
        TaskContext::new(format!("task {n}"), "")
    }

    #[test]
    fn test_linear_lifecycle() {
        let mut state = State::new(task(0));
        assert_eq!(state.phase(), Phase::Created);
        state.begin_selection().unwrap();
        state.record_selection(SelectionDecision::default()).unwrap();
        state.record_execution(vec![], vec![]).unwrap();
        state.record_response(json!("answer")).unwrap();
        assert_eq!(state.phase(), Phase::Done);
        assert_eq!(state.response(), &json!("answer"));
        assert_eq!(state.reward(), UNSET_REWARD);
    }

    #[test]
    fn test_stage_cannot_be_skipped_or_rerun() {
        let mut state = State::new(task(0));
        let err = state.record_selection(SelectionDecision::default()).unwrap_err();
        assert!(matches!(err, AgentError::InvalidTransition { ref from, ref to } if from == "created" && to == "executing"));

        state.begin_selection().unwrap();
        assert!(state.begin_selection().is_err());
        state.record_selection(SelectionDecision::default()).unwrap();
        assert!(state.record_selection(SelectionDecision::default()).is_err());
    }

    #[test]
    fn test_failed_is_terminal() {
        let mut state = State::new(task(0));
        state.begin_selection().unwrap();
        state.fail(&AgentError::UnknownTool("x".into()));
        assert_eq!(state.phase(), Phase::Failed);
        assert_eq!(state.error(), Some("Unknown tool: x"));
        assert!(state.record_selection(SelectionDecision::default()).is_err());

        let mut done = State::single_step(task(1), json!("r"));
        done.fail(&AgentError::UnknownTool("x".into()));
        assert_eq!(done.phase(), Phase::Done);
    }

    #[test]
    fn test_trajectory_append_only() {
        let mut trajectory = Trajectory::new(task(0), AvailableResources::default());
        assert!(trajectory.last_state().is_none());
        assert!(trajectory.is_empty());

        for n in 1..=4 {
            trajectory.add_state(State::single_step(task(n), json!(n)));
        }
        assert_eq!(trajectory.len(), 4);
        assert_eq!(trajectory.last_state().unwrap().task(), &task(4));
        let order: Vec<_> = trajectory.states().iter().map(|s| s.response().clone()).collect();
        assert_eq!(order, vec![json!(1), json!(2), json!(3), json!(4)]);
        assert_eq!(trajectory.reward(), UNSET_REWARD);
    }
}
