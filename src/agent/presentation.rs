//! 演示文稿 Agent：大纲 → 逐页并发生成 → 审阅
//!
//! 每页幻灯片是一次完整的编排循环（可调用搜索 Agent 查资料），各页并发执行，
//! 结果与 State 均按大纲顺序收集；审阅步骤去重、精简并汇总引用链接。

use std::sync::Arc;

use async_trait::async_trait;
use futures_util::future::try_join_all;
use serde_json::Value;

use crate::agent::action::{Action, ActionConfig};
use crate::agent::base::{AgentProfile, ForwardArgs, Preprocessed};
use crate::agent::prompt::{merge_context, slide_task};
use crate::agent::search::SearchAgent;
use crate::agent::signatures::{
    Presentation, PresentationOutline, SlideContent, SlideOutline, TaskContext,
};
use crate::agent::trajectory::{State, Trajectory};
use crate::agent::SubAgent;
use crate::config::AppConfig;
use crate::core::AgentError;
use crate::llm::{InputField, LlmClient, StructuredPredictor};
use crate::tools::Tool;

pub const DEFAULT_NAME: &str = "Presentation AI Agent";
pub const DEFAULT_ROLE: &str = "You are an expert in building presentation slides. Based on the task \
given, you research thoroughly using tools and also coordinate with your team_agents whenever \
required. Build the title of each slide and its content as well. Based on the plans, build each \
slide with relevant content.";

const OUTLINE_INSTRUCTIONS: &str = "You are a smart AI agent for building great presentations. \
For a given task and context, build the outline of the presentation.";

const REVIEW_INSTRUCTIONS: &str = "You are a smart presentation builder. You are given a presentation \
containing multiple slides, each with a title and content.\n\
Review the current presentation and return the cleaned presentation:\n\
1) Remove repetitive content across slides. Every slide should carry mostly unique information.\n\
2) Keep every slide crisp, with only relevant information.\n\
3) Move reference links found on multiple slides into a single slide of reference links.\n\
4) The title and content of each slide must match.\n\
5) Use bullet points and sub-points where they read better.";

pub struct PresentationAgent {
    profile: AgentProfile,
    pre: Preprocessed,
    action: Action,
    outline_step: StructuredPredictor<PresentationOutline>,
    review_step: StructuredPredictor<Presentation>,
    max_slides: usize,
}

impl PresentationAgent {
    /// 默认配置：无工具，协作 Agent 为 SearchAgent
    pub fn new(llm: Arc<dyn LlmClient>, cfg: &AppConfig) -> Self {
        let search: Arc<dyn SubAgent> = Arc::new(SearchAgent::new(llm.clone(), cfg));
        Self::with_parts(
            AgentProfile::new(DEFAULT_NAME, DEFAULT_ROLE),
            Vec::new(),
            vec![search],
            llm,
            cfg,
        )
    }

    pub fn with_parts(
        profile: AgentProfile,
        tools: Vec<Arc<dyn Tool>>,
        team_agents: Vec<Arc<dyn SubAgent>>,
        llm: Arc<dyn LlmClient>,
        cfg: &AppConfig,
    ) -> Self {
        let pre = Preprocessed::new(&profile, tools, team_agents);
        let action = Action::new(pre.registry.clone(), llm.clone(), ActionConfig::from_config(cfg));
        let backtracks = cfg.llm.max_backtracks;
        Self {
            profile,
            pre,
            action,
            outline_step: StructuredPredictor::new(
                llm.clone(),
                OUTLINE_INSTRUCTIONS,
                "presentation_outline_output",
                "Outline of the presentation.",
            )
            .with_max_backtracks(backtracks),
            review_step: StructuredPredictor::new(
                llm,
                REVIEW_INSTRUCTIONS,
                "cleaned_presentation",
                "A cleaned presentation after thoroughly reviewing it.",
            )
            .with_max_backtracks(backtracks),
            max_slides: cfg.presentation.max_slides.max(1),
        }
    }

    pub fn profile(&self) -> &AgentProfile {
        &self.profile
    }

    pub async fn forward(
        &self,
        task: &str,
        context: Option<&str>,
    ) -> Result<Vec<SlideContent>, AgentError> {
        self.forward_with_trajectory(task, context)
            .await
            .map(|(slides, _)| slides)
    }

    pub async fn forward_with_trajectory(
        &self,
        task: &str,
        context: Option<&str>,
    ) -> Result<(Vec<SlideContent>, Trajectory), AgentError> {
        let task_context =
            TaskContext::new(task, merge_context(&self.pre.background_story, context));
        let mut trajectory = Trajectory::new(task_context.clone(), self.pre.resources.clone());

        let outline = self.build_outline(&task_context).await?;
        trajectory.add_state(State::single_step(task_context, to_json(&outline)));

        let generated = try_join_all(outline.outline.iter().map(|s| self.generate_slide(s))).await?;
        let mut slides = Vec::with_capacity(generated.len());
        for (slide, state) in generated {
            trajectory.add_state(state);
            slides.push(slide);
        }
        tracing::info!(slides = slides.len(), "slides generated");

        let current = Presentation {
            presentation: slides,
        };
        let cleaned = self.review(&current).await?;
        trajectory.add_state(State::single_step(
            TaskContext::new(to_json(&current), ""),
            to_json(&cleaned),
        ));
        trajectory.set_response(to_json(&cleaned.presentation));
        Ok((cleaned.presentation, trajectory))
    }

    async fn build_outline(&self, task: &TaskContext) -> Result<PresentationOutline, AgentError> {
        let mut outline = self
            .outline_step
            .predict(&[InputField::new(
                "presentation_input",
                "Task and context for building the outline.",
                task,
            )])
            .await?;
        if outline.outline.len() > self.max_slides {
            tracing::warn!(
                proposed = outline.outline.len(),
                max = self.max_slides,
                "outline truncated"
            );
            outline.outline.truncate(self.max_slides);
        }
        Ok(outline)
    }

    /// 单页幻灯片：一次完整编排循环
    async fn generate_slide(
        &self,
        outline: &SlideOutline,
    ) -> Result<(SlideContent, State), AgentError> {
        let task = TaskContext::new(
            slide_task(&outline.title, &outline.content_outline),
            self.pre.background_story.clone(),
        );
        let cycle = self.action.forward(&task).await?;
        tracing::debug!(title = %outline.title, "slide generated");
        Ok((
            SlideContent {
                title: outline.title.clone(),
                content: cycle.response,
            },
            cycle.state,
        ))
    }

    /// 审阅：输入非空时要求输出至少一页，否则回溯重试
    async fn review(&self, current: &Presentation) -> Result<Presentation, AgentError> {
        let has_slides = !current.presentation.is_empty();
        self.review_step
            .predict_checked(
                &[InputField::new(
                    "current_presentation",
                    "The current presentation with multiple slides containing title and content.",
                    current,
                )],
                |cleaned: &Presentation| {
                    if has_slides && cleaned.presentation.is_empty() {
                        Err("the cleaned presentation must contain at least one slide".to_string())
                    } else {
                        Ok(())
                    }
                },
            )
            .await
    }
}

fn to_json(value: &impl serde::Serialize) -> Value {
    serde_json::to_value(value).unwrap_or(Value::Null)
}

#[async_trait]
impl SubAgent for PresentationAgent {
    fn name(&self) -> &str {
        &self.profile.name
    }

    fn role(&self) -> &str {
        &self.profile.role
    }

    async fn run(&self, args: Value) -> Result<Value, AgentError> {
        let args = ForwardArgs::parse(&self.profile.name, args)?;
        let slides = self.forward(&args.task, args.context.as_deref()).await?;
        Ok(to_json(&slides))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::trajectory::Phase;
    use crate::llm::ScriptedLlmClient;
    use serde_json::json;

    const EMPTY_SELECTION: &str = r#"{"reasoning": "", "selected_tools_and_agents": {"tools_to_run": [], "agents_to_execute": [], "reasoning": "none"}}"#;
    const OUTLINE: &str = r#"{"reasoning": "", "presentation_outline_output": {"outline": [
        {"title": "Intro", "content_outline": "what agents are"},
        {"title": "Risks", "content_outline": "what can go wrong"},
        {"title": "Outro", "content_outline": "summary"}
    ]}}"#;
    const CLEANED: &str = r#"{"reasoning": "", "cleaned_presentation": {"presentation": [
        {"title": "Intro", "content": "intro body"},
        {"title": "Risks", "content": "risks body"}
    ]}}"#;

    fn scripted(review_replies: Vec<String>) -> Arc<ScriptedLlmClient> {
        Arc::new(
            ScriptedLlmClient::new(review_replies)
                .with_rule("Output field: selected_tools_and_agents", EMPTY_SELECTION)
                .with_rule("Output field: presentation_outline_output", OUTLINE)
                .with_rule(
                    "title: Intro",
                    r#"{"reasoning": "", "final_response": "intro body"}"#,
                )
                .with_rule(
                    "title: Risks",
                    r#"{"reasoning": "", "final_response": "risks body"}"#,
                )
                .with_rule(
                    "title: Outro",
                    r#"{"reasoning": "", "final_response": "outro body"}"#,
                ),
        )
    }

    fn agent(llm: Arc<ScriptedLlmClient>, max_slides: usize) -> PresentationAgent {
        let mut cfg = AppConfig::default();
        cfg.presentation.max_slides = max_slides;
        PresentationAgent::with_parts(
            AgentProfile::new(DEFAULT_NAME, DEFAULT_ROLE),
            vec![],
            vec![],
            llm,
            &cfg,
        )
    }

    #[tokio::test]
    async fn test_outline_slides_review() {
        let llm = scripted(vec![CLEANED.to_string()]);
        let agent = agent(llm.clone(), 15);

        let (slides, trajectory) = agent
            .forward_with_trajectory("Agentic workflows", Some("3 slides"))
            .await
            .unwrap();
        assert_eq!(slides.len(), 2);
        assert_eq!(slides[1].content, "risks body");

        // 大纲 + 3 页 + 审阅
        assert_eq!(trajectory.len(), 5);
        let bodies: Vec<_> = trajectory.states()[1..4]
            .iter()
            .map(|s| s.response().clone())
            .collect();
        assert_eq!(
            bodies,
            vec![json!("intro body"), json!("risks body"), json!("outro body")]
        );
        assert!(trajectory.states().iter().all(|s| s.phase() == Phase::Done));
        assert_eq!(trajectory.response().unwrap()[0]["title"], "Intro");

        let review_call = llm
            .calls()
            .into_iter()
            .find(|c| c[0].content.contains("Output field: cleaned_presentation"))
            .unwrap();
        let prompt = &review_call[1].content;
        let intro = prompt.find("intro body").unwrap();
        let outro = prompt.find("outro body").unwrap();
        assert!(intro < outro);
    }

    #[tokio::test]
    async fn test_outline_truncated_to_max_slides() {
        let llm = scripted(vec![CLEANED.to_string()]);
        let agent = agent(llm.clone(), 2);

        let (_, trajectory) = agent.forward_with_trajectory("t", None).await.unwrap();
        assert_eq!(trajectory.len(), 4);
        assert!(!llm
            .calls()
            .iter()
            .any(|c| c.iter().any(|m| m.content.contains("title: Outro"))));
    }

    #[tokio::test]
    async fn test_empty_review_backtracks() {
        let empty = r#"{"reasoning": "", "cleaned_presentation": {"presentation": []}}"#.to_string();
        let llm = scripted(vec![empty, CLEANED.to_string()]);
        let agent = agent(llm.clone(), 15);

        let slides = agent.forward("t", None).await.unwrap();
        assert_eq!(slides.len(), 2);
        let review_calls = llm
            .calls()
            .iter()
            .filter(|c| c[0].content.contains("Output field: cleaned_presentation"))
            .count();
        assert_eq!(review_calls, 2);
    }

    #[tokio::test]
    async fn test_slide_failure_aborts_presentation() {
        let llm = Arc::new(
            ScriptedLlmClient::new(vec![])
                .with_rule("Output field: presentation_outline_output", OUTLINE)
                .with_rule(
                    "Output field: selected_tools_and_agents",
                    r#"{"reasoning": "", "selected_tools_and_agents": {"tools_to_run": [{"tool_name": "nonexistent", "argument_values": {}}]}}"#,
                ),
        );
        let agent = agent(llm.clone(), 15);

        let err = agent.forward("t", None).await.unwrap_err();
        assert!(matches!(err, AgentError::UnknownTool(name) if name == "nonexistent"));
        assert!(!llm
            .calls()
            .iter()
            .any(|c| c[0].content.contains("Output field: cleaned_presentation")));
    }
}
