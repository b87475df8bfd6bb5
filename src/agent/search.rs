//! 搜索 Agent
//!
//! 在通用编排循环之上对 internet_search 做二次处理：对每条搜索结果并发抓取网页，
//! 拼接抓取内容后由一次结构化调用归纳出答案，工具响应为 `{"search_answer", "metadata"}`。
//! 其它工具照常经 Action 执行。
//!
//! 抓取失败遵循 FanOutPolicy：FailFast 下首个失败使整个 internet_search 调用失败，
//! Isolate 下记录日志并跳过该结果。URL 为空或内容为空白的结果总是跳过。

use std::sync::Arc;

use async_trait::async_trait;
use futures_util::future::try_join_all;
use serde_json::{json, Value};

use crate::agent::action::{Action, ActionConfig, ToolRunner};
use crate::agent::base::{AgentProfile, ForwardArgs, Preprocessed};
use crate::agent::prompt::merge_context;
use crate::agent::signatures::{
    ArgumentValues, BrowsedAnswers, SearchAnswer, TaskContext, ToolInvocation, ToolResponse,
};
use crate::agent::trajectory::Trajectory;
use crate::agent::SubAgent;
use crate::config::{AppConfig, FanOutPolicy};
use crate::core::AgentError;
use crate::llm::{InputField, LlmClient, StructuredPredictor};
use crate::tools::{
    Document, DocumentMetadata, InternetAnswerTool, InternetSearchTool, SearchHit, TavilyClient,
    Tool, WebsiteScrapperTool, INTERNET_SEARCH, WEBSITE_SCRAPPER,
};

pub const DEFAULT_NAME: &str = "Internet Search Agent";
pub const DEFAULT_ROLE: &str = "As a internet search agent for a given task, your role is to select \
tool and generate right search query to search on the web (by using tools provided) and generate \
the correct response.";

/// internet_search 结果为空时的工具响应
pub const NO_SEARCH_RESPONSE: &str = "No response from Internet Search Tool !!";

/// 每条搜索结果保留的抓取字符数
const SCRAPED_CHARS: usize = 5000;

const FORMULATE_INSTRUCTIONS: &str = "An agent was given a task for which the agent used the search \
tool for browsing the internet to find out the answer. The agent browsed the internet, went through \
different websites and collected the responses.\n\
Your job is to frame the right answer based on the given task and by analyzing the browsed answers.\n\
'task': the original task given to the agent.\n\
'browsed_answers': the responses collected from different websites.";

/// 抓取后的一条搜索结果
struct ScrapedHit {
    content: String,
    metadata: DocumentMetadata,
}

pub struct SearchAgent {
    profile: AgentProfile,
    pre: Preprocessed,
    action: Action,
    formulate_step: StructuredPredictor<SearchAnswer>,
    fan_out: FanOutPolicy,
}

impl SearchAgent {
    /// 默认配置：internet_search、internet_answer、website_scrapper，无协作 Agent
    pub fn new(llm: Arc<dyn LlmClient>, cfg: &AppConfig) -> Self {
        let tavily = Arc::new(TavilyClient::new(&cfg.tools.search));
        let tools: Vec<Arc<dyn Tool>> = vec![
            Arc::new(InternetSearchTool::new(tavily.clone())),
            Arc::new(InternetAnswerTool::new(tavily)),
            Arc::new(WebsiteScrapperTool::new(&cfg.tools.scraper)),
        ];
        Self::with_parts(
            AgentProfile::new(DEFAULT_NAME, DEFAULT_ROLE),
            tools,
            Vec::new(),
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
        let formulate_step = StructuredPredictor::new(
            llm,
            FORMULATE_INSTRUCTIONS,
            "search_answer",
            "Final answer.",
        )
        .with_max_backtracks(cfg.llm.max_backtracks);
        Self {
            profile,
            pre,
            action,
            formulate_step,
            fan_out: cfg.tools.fan_out,
        }
    }

    pub fn profile(&self) -> &AgentProfile {
        &self.profile
    }

    pub async fn forward(&self, task: &str, context: Option<&str>) -> Result<String, AgentError> {
        self.forward_with_trajectory(task, context)
            .await
            .map(|(response, _)| response)
    }

    pub async fn forward_with_trajectory(
        &self,
        task: &str,
        context: Option<&str>,
    ) -> Result<(String, Trajectory), AgentError> {
        let task_context =
            TaskContext::new(task, merge_context(&self.pre.background_story, context));
        let mut trajectory = Trajectory::new(task_context.clone(), self.pre.resources.clone());

        let runner = SearchToolRunner {
            agent: self,
            task: &task_context,
        };
        let cycle = self.action.forward_with(&task_context, &runner).await?;
        trajectory.add_state(cycle.state);
        trajectory.set_response(Value::String(cycle.response.clone()));
        Ok((cycle.response, trajectory))
    }

    /// internet_search → 并发抓取 → 归纳答案
    async fn run_internet_search(
        &self,
        invocation: &ToolInvocation,
        task: &TaskContext,
    ) -> Result<ToolResponse, AgentError> {
        let raw = self
            .action
            .call_tool(&invocation.tool_name, &invocation.argument_values)
            .await?;
        let hits: Vec<SearchHit> =
            serde_json::from_value(raw).map_err(|e| AgentError::ToolExecutionFailed {
                tool: invocation.tool_name.clone(),
                message: format!("unexpected search result shape: {e}"),
            })?;

        if hits.is_empty() {
            tracing::info!("internet search returned no results");
            return Ok(ToolResponse::ok(
                invocation.clone(),
                Value::String(NO_SEARCH_RESPONSE.to_string()),
            ));
        }

        let scraped = try_join_all(hits.iter().map(|hit| self.scrape_hit(hit))).await?;
        let browsed_answers = scraped
            .iter()
            .enumerate()
            .filter_map(|(idx, hit)| {
                hit.as_ref()
                    .map(|h| format!("Search Response_{idx}:{}", h.content))
            })
            .collect::<Vec<_>>()
            .join("\n\n");
        let metadata: Vec<&DocumentMetadata> =
            scraped.iter().flatten().map(|h| &h.metadata).collect();
        tracing::info!(
            results = hits.len(),
            scraped = metadata.len(),
            "search results browsed"
        );

        let answer = self.formulate(task, browsed_answers).await?;
        Ok(ToolResponse::ok(
            invocation.clone(),
            json!({ "search_answer": answer, "metadata": metadata }),
        ))
    }

    /// 抓取单条结果；URL 为空或内容为空白时返回 None。
    /// 抓取失败在 Isolate 下返回 None，FailFast 下返回错误；抓取工具未注册时总是致命
    async fn scrape_hit(&self, hit: &SearchHit) -> Result<Option<ScrapedHit>, AgentError> {
        let url = hit.url.trim();
        if url.is_empty() {
            return Ok(None);
        }
        let mut args = ArgumentValues::new();
        args.insert("url".to_string(), Value::String(url.to_string()));

        let scraped = self
            .action
            .call_tool(WEBSITE_SCRAPPER, &args)
            .await
            .and_then(|raw| {
                serde_json::from_value::<Vec<Document>>(raw).map_err(|e| {
                    AgentError::ToolExecutionFailed {
                        tool: WEBSITE_SCRAPPER.to_string(),
                        message: format!("unexpected scrape result: {e}"),
                    }
                })
            });
        let docs = match scraped {
            Ok(docs) => docs,
            Err(e) if e.is_unknown_resource() || self.fan_out == FanOutPolicy::FailFast => {
                tracing::warn!(url = %url, error = %e, "scrape failed");
                return Err(e);
            }
            Err(e) => {
                tracing::warn!(url = %url, error = %e, "scrape failed, result skipped");
                return Ok(None);
            }
        };

        Ok(docs.into_iter().next().and_then(|doc| {
            let content: String = doc.page_content.chars().take(SCRAPED_CHARS).collect();
            (!content.trim().is_empty()).then_some(ScrapedHit {
                content,
                metadata: doc.metadata,
            })
        }))
    }

    async fn formulate(
        &self,
        task: &TaskContext,
        browsed_answers: String,
    ) -> Result<String, AgentError> {
        let input = BrowsedAnswers {
            task: task.clone(),
            browsed_answers,
        };
        let answer = self
            .formulate_step
            .predict(&[InputField::new(
                "browsed_answers",
                "Browsed answers after searching on the internet.",
                &input,
            )])
            .await?;
        Ok(answer.answer)
    }
}

/// internet_search 走二次处理，其余工具交给 Action
struct SearchToolRunner<'a> {
    agent: &'a SearchAgent,
    task: &'a TaskContext,
}

#[async_trait]
impl ToolRunner for SearchToolRunner<'_> {
    async fn run_tool(&self, invocation: &ToolInvocation) -> Result<ToolResponse, AgentError> {
        if invocation.tool_name == INTERNET_SEARCH {
            self.agent.run_internet_search(invocation, self.task).await
        } else {
            self.agent.action.run_tool(invocation).await
        }
    }
}

#[async_trait]
impl SubAgent for SearchAgent {
    fn name(&self) -> &str {
        &self.profile.name
    }

    fn role(&self) -> &str {
        &self.profile.role
    }

    async fn run(&self, args: Value) -> Result<Value, AgentError> {
        let args = ForwardArgs::parse(&self.profile.name, args)?;
        let response = self.forward(&args.task, args.context.as_deref()).await?;
        Ok(Value::String(response))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::trajectory::Phase;
    use crate::llm::ScriptedLlmClient;

    struct FakeSearch(Value);

    #[async_trait]
    impl Tool for FakeSearch {
        fn name(&self) -> &str {
            INTERNET_SEARCH
        }

        fn description(&self) -> &str {
            "fake search"
        }

        async fn run(&self, _args: Value) -> Result<Value, String> {
            Ok(self.0.clone())
        }
    }

    struct FakeScrapper;

    #[async_trait]
    impl Tool for FakeScrapper {
        fn name(&self) -> &str {
            WEBSITE_SCRAPPER
        }

        fn description(&self) -> &str {
            "fake scrapper"
        }

        async fn run(&self, args: Value) -> Result<Value, String> {
            let url = args["url"].as_str().unwrap_or_default().to_string();
            let content = match url.as_str() {
                "https://a.example" => "alpha page",
                "https://b.example" => "   ",
                "https://c.example" => return Err("HTTP 500".to_string()),
                _ => "other page",
            };
            Ok(json!([{"page_content": content, "metadata": {"source": url, "title": "T"}}]))
        }
    }

    const SELECT_SEARCH: &str = r#"{"reasoning": "needs web", "selected_tools_and_agents": {"tools_to_run": [{"tool_name": "internet_search", "argument_values": {"query": "q"}}], "agents_to_execute": [], "reasoning": "web"}}"#;

    fn scripted() -> Arc<ScriptedLlmClient> {
        Arc::new(
            ScriptedLlmClient::new(vec![])
                .with_rule("Output field: selected_tools_and_agents", SELECT_SEARCH)
                .with_rule(
                    "Output field: search_answer",
                    r#"{"reasoning": "r", "search_answer": {"answer": "alpha it is"}}"#,
                )
                .with_rule(
                    "Output field: final_response",
                    r#"{"reasoning": "r", "final_response": "final: alpha"}"#,
                ),
        )
    }

    fn agent(llm: Arc<ScriptedLlmClient>, hits: Value, scrapper: bool) -> SearchAgent {
        agent_with(llm, hits, scrapper, FanOutPolicy::Isolate)
    }

    fn agent_with(
        llm: Arc<ScriptedLlmClient>,
        hits: Value,
        scrapper: bool,
        fan_out: FanOutPolicy,
    ) -> SearchAgent {
        let mut cfg = AppConfig::default();
        cfg.tools.fan_out = fan_out;
        let mut tools: Vec<Arc<dyn Tool>> = vec![Arc::new(FakeSearch(hits))];
        if scrapper {
            tools.push(Arc::new(FakeScrapper));
        }
        SearchAgent::with_parts(
            AgentProfile::new(DEFAULT_NAME, DEFAULT_ROLE),
            tools,
            vec![],
            llm,
            &cfg,
        )
    }

    #[tokio::test]
    async fn test_search_results_are_scraped_and_formulated() {
        let llm = scripted();
        let hits = json!([
            {"url": "https://a.example", "title": "A", "content": "a"},
            {"url": "https://b.example", "title": "B", "content": "b"},
            {"url": "https://c.example", "title": "C", "content": "c"},
            {"url": "https://d.example", "title": "D", "content": "d"}
        ]);
        let agent = agent(llm.clone(), hits, true);

        let (response, trajectory) = agent
            .forward_with_trajectory("who won?", Some("ctx"))
            .await
            .unwrap();
        assert_eq!(response, "final: alpha");

        let state = trajectory.last_state().unwrap();
        assert_eq!(state.phase(), Phase::Done);
        let tool_response = &state.tools_used()[0].response;
        assert_eq!(tool_response["search_answer"], "alpha it is");
        assert_eq!(tool_response["metadata"].as_array().unwrap().len(), 2);
        assert_eq!(tool_response["metadata"][0]["source"], "https://a.example");

        let formulate_call = llm
            .calls()
            .into_iter()
            .find(|c| c[0].content.contains("Output field: search_answer"))
            .unwrap();
        let prompt = &formulate_call[1].content;
        assert!(prompt.contains("Search Response_0:alpha page"));
        assert!(prompt.contains("Search Response_3:other page"));
        assert!(!prompt.contains("Search Response_1"));
        assert!(!prompt.contains("Search Response_2"));
    }

    #[tokio::test]
    async fn test_scrape_failure_fails_search_under_fail_fast() {
        let llm = scripted();
        let hits = json!([
            {"url": "https://a.example", "title": "A", "content": "a"},
            {"url": "https://c.example", "title": "C", "content": "c"}
        ]);
        let agent = agent_with(llm.clone(), hits, true, FanOutPolicy::FailFast);

        let err = agent.forward("who won?", None).await.unwrap_err();
        assert!(matches!(
            &err,
            AgentError::ToolExecutionFailed { tool, message }
                if tool == WEBSITE_SCRAPPER && message.contains("HTTP 500")
        ));
        let calls = llm.calls();
        assert!(!calls
            .iter()
            .any(|c| c[0].content.contains("Output field: search_answer")));
        assert!(!calls
            .iter()
            .any(|c| c[0].content.contains("Output field: final_response")));
    }

    #[tokio::test]
    async fn test_blank_pages_skipped_under_fail_fast() {
        let llm = scripted();
        let hits = json!([
            {"url": "https://a.example", "title": "A", "content": "a"},
            {"url": "https://b.example", "title": "B", "content": "b"},
            {"url": " ", "title": "E", "content": "e"}
        ]);
        let agent = agent_with(llm.clone(), hits, true, FanOutPolicy::FailFast);

        let (response, trajectory) = agent.forward_with_trajectory("who won?", None).await.unwrap();
        assert_eq!(response, "final: alpha");
        let tool_response = &trajectory.last_state().unwrap().tools_used()[0].response;
        assert_eq!(tool_response["metadata"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_empty_search_results() {
        let llm = scripted();
        let agent = agent(llm.clone(), json!([]), true);

        let (_, trajectory) = agent.forward_with_trajectory("q", None).await.unwrap();
        let state = trajectory.last_state().unwrap();
        assert_eq!(state.tools_used()[0].response, json!(NO_SEARCH_RESPONSE));
        assert!(!llm
            .calls()
            .iter()
            .any(|c| c[0].content.contains("Output field: search_answer")));
    }

    #[tokio::test]
    async fn test_missing_scrapper_is_fatal() {
        let llm = scripted();
        let hits = json!([{"url": "https://a.example", "title": "A", "content": "a"}]);
        let agent = agent(llm.clone(), hits, false);

        let err = agent.forward("q", None).await.unwrap_err();
        assert!(matches!(err, AgentError::UnknownTool(name) if name == WEBSITE_SCRAPPER));
        assert!(!llm
            .calls()
            .iter()
            .any(|c| c[0].content.contains("Output field: final_response")));
    }

    #[tokio::test]
    async fn test_run_as_sub_agent() {
        let agent = agent(scripted(), json!([]), true);
        assert_eq!(SubAgent::name(&agent), DEFAULT_NAME);
        let out = agent.run(json!({"task": "q"})).await.unwrap();
        assert_eq!(out, json!("final: alpha"));

        let err = agent.run(json!({"query": "q"})).await.unwrap_err();
        assert!(matches!(err, AgentError::InvalidArguments { .. }));
    }
}
