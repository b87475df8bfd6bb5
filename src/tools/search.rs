//! 联网搜索工具（Tavily）：internet_search 与 internet_answer
//!
//! 两个工具共用一个 TavilyClient（reqwest，带超时）；API Key 读取 TAVILY_API_KEY。
//! internet_search 返回结果列表 `[{url, title, content}]`，internet_answer 直接返回答案文本。

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::config::SearchSection;
use crate::tools::{ArgumentSchema, Tool};

pub const INTERNET_SEARCH: &str = "internet_search";
pub const INTERNET_ANSWER: &str = "internet_answer";

/// 搜索结果条目
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchHit {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Deserialize)]
struct TavilyResponse {
    #[serde(default)]
    answer: Option<String>,
    #[serde(default)]
    results: Vec<SearchHit>,
}

#[derive(Deserialize, JsonSchema)]
struct QueryArgs {
    query: String,
}

fn parse_query(args: Value) -> Result<String, String> {
    let args: QueryArgs =
        serde_json::from_value(args).map_err(|e| format!("invalid arguments: {e}"))?;
    let query = args.query.trim().to_string();
    if query.is_empty() {
        return Err("Missing query".to_string());
    }
    Ok(query)
}

/// Tavily 搜索 API 客户端
pub struct TavilyClient {
    client: Client,
    api_base: String,
    api_key: Option<String>,
    max_results: usize,
}

impl TavilyClient {
    pub fn new(section: &SearchSection) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(section.timeout_secs))
            .build()
            .unwrap_or_default();
        Self {
            client,
            api_base: section.api_base.trim_end_matches('/').to_string(),
            api_key: std::env::var("TAVILY_API_KEY").ok(),
            max_results: section.max_results,
        }
    }

    async fn search(&self, query: &str, include_answer: bool) -> Result<TavilyResponse, String> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| "TAVILY_API_KEY is not set".to_string())?;
        let body = json!({
            "api_key": api_key,
            "query": query,
            "max_results": self.max_results,
            "include_answer": include_answer,
            "search_depth": if include_answer { "advanced" } else { "basic" },
        });
        let resp = self
            .client
            .post(format!("{}/search", self.api_base))
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| format!("Request failed: {}", e))?;
        if !resp.status().is_success() {
            return Err(format!("HTTP {}", resp.status()));
        }
        resp.json::<TavilyResponse>()
            .await
            .map_err(|e| format!("Read body: {}", e))
    }
}

/// internet_search：深度检索，返回结果列表（由 SearchAgent 继续抓取与汇总）
pub struct InternetSearchTool {
    tavily: Arc<TavilyClient>,
}

impl InternetSearchTool {
    pub fn new(tavily: Arc<TavilyClient>) -> Self {
        Self { tavily }
    }
}

#[async_trait]
impl Tool for InternetSearchTool {
    fn name(&self) -> &str {
        INTERNET_SEARCH
    }

    fn description(&self) -> &str {
        "A search engine optimized for comprehensive, accurate, and trusted results. \
         The tool will search and browse internet. Use this tool only when the query requires \
         analysis in depth and understanding, else use internet_answer for a direct answer. \
         To run this tool, generate the right query with less than 100 characters."
    }

    fn argument_schema(&self) -> ArgumentSchema {
        ArgumentSchema::derive::<QueryArgs>()
    }

    async fn run(&self, args: Value) -> Result<Value, String> {
        let query = parse_query(args)?;
        tracing::info!(query = %query, "internet search");
        let resp = self.tavily.search(&query, false).await?;
        serde_json::to_value(resp.results).map_err(|e| e.to_string())
    }
}

/// internet_answer：直接答案，不浏览网页
pub struct InternetAnswerTool {
    tavily: Arc<TavilyClient>,
}

impl InternetAnswerTool {
    pub fn new(tavily: Arc<TavilyClient>) -> Self {
        Self { tavily }
    }
}

#[async_trait]
impl Tool for InternetAnswerTool {
    fn name(&self) -> &str {
        INTERNET_ANSWER
    }

    fn description(&self) -> &str {
        "A search engine optimized for comprehensive, accurate, and trusted results. \
         It won't browse the web. Use this tool only when the query requires a straightforward \
         answer without any analysis, else use internet_search for depth and understanding."
    }

    fn argument_schema(&self) -> ArgumentSchema {
        ArgumentSchema::derive::<QueryArgs>()
    }

    async fn run(&self, args: Value) -> Result<Value, String> {
        let query = parse_query(args)?;
        tracing::info!(query = %query, "internet answer");
        let resp = self.tavily.search(&query, true).await?;
        Ok(Value::String(resp.answer.unwrap_or_default()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_query() {
        assert_eq!(parse_query(json!({"query": "  rust  "})).unwrap(), "rust");
        assert!(parse_query(json!({"query": " "})).is_err());
        assert!(parse_query(json!({"q": "x"})).is_err());
    }

    #[test]
    fn test_tavily_response_shape() {
        let resp: TavilyResponse = serde_json::from_value(json!({
            "answer": null,
            "results": [{"url": "https://a.b", "title": "T", "content": "C", "score": 0.9}]
        }))
        .unwrap();
        assert!(resp.answer.is_none());
        assert_eq!(resp.results[0].url, "https://a.b");
    }

    #[test]
    fn test_query_schema() {
        let tool = InternetSearchTool::new(Arc::new(TavilyClient::new(&SearchSection::default())));
        let schema = tool.argument_schema();
        assert!(!schema.get("query").unwrap().optional);
    }
}
