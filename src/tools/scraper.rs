//! 网页抓取工具 website_scrapper
//!
//! GET 请求带超时与 User-Agent；HTML 用 html2text 提取可读文本（失败时回退到简易去标签）。
//! 从起始页开始按层递归抓取同域子链接，直到 max_depth 层或 max_pages 页；每页正文截断到 max_chars。
//! 返回文档列表 `[{page_content, metadata: {source, title}}]`，起始页总在第一个。

use std::collections::HashSet;
use std::sync::OnceLock;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::future::join_all;
use html2text::from_read;
use regex::Regex;
use reqwest::{Client, Url};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::ScraperSection;
use crate::tools::{ArgumentSchema, Tool};

pub const WEBSITE_SCRAPPER: &str = "website_scrapper";

/// 抓取到的单页文档
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub page_content: String,
    pub metadata: DocumentMetadata,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub source: String,
    #[serde(default)]
    pub title: String,
}

#[derive(Deserialize, JsonSchema)]
struct ScrapeArgs {
    url: String,
    max_depth: Option<usize>,
}

fn href_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r#"(?i)href\s*=\s*["']([^"'#]+)[^"']*["']"#).expect("static regex")
    })
}

fn title_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?is)<title[^>]*>(.*?)</title>").expect("static regex"))
}

/// 简易去除 HTML 标签（html2text 失败时的回退）
fn strip_html_tags(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut in_tag = false;
    for c in html.chars() {
        match c {
            '<' => in_tag = true,
            '>' => {
                in_tag = false;
                out.push(' ');
            }
            _ if !in_tag => out.push(c),
            _ => {}
        }
    }
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// 将 HTML 转为可读文本
fn html_to_text(html: &str) -> String {
    match from_read(html.as_bytes(), 120) {
        Ok(text) if !text.trim().is_empty() => text,
        _ => strip_html_tags(html),
    }
}

fn extract_title(html: &str) -> String {
    title_pattern()
        .captures(html)
        .map(|c| c[1].split_whitespace().collect::<Vec<_>>().join(" "))
        .unwrap_or_default()
}

/// 提取同域 http(s) 子链接（去重、去 fragment）
fn extract_links(html: &str, base: &Url) -> Vec<Url> {
    let mut seen = HashSet::new();
    href_pattern()
        .captures_iter(html)
        .filter_map(|c| base.join(c[1].trim()).ok())
        .filter(|u| matches!(u.scheme(), "http" | "https") && u.host_str() == base.host_str())
        .filter(|u| seen.insert(u.as_str().to_string()))
        .collect()
}

fn truncate_chars(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}

/// 网页抓取工具
pub struct WebsiteScrapperTool {
    client: Client,
    max_depth: usize,
    max_pages: usize,
    max_chars: usize,
}

impl WebsiteScrapperTool {
    pub fn new(section: &ScraperSection) -> Self {
        const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";
        let client = Client::builder()
            .timeout(Duration::from_secs(section.timeout_secs))
            .user_agent(USER_AGENT)
            .build()
            .unwrap_or_default();
        Self {
            client,
            max_depth: section.max_depth.max(1),
            max_pages: section.max_pages.max(1),
            max_chars: section.max_chars,
        }
    }

    async fn fetch(&self, url: &Url) -> Result<(Document, Vec<Url>), String> {
        let resp = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| format!("Request failed: {}", e))?;
        if !resp.status().is_success() {
            return Err(format!("HTTP {}", resp.status()));
        }
        let body = resp
            .text()
            .await
            .map_err(|e| format!("Read body: {}", e))?;
        let body = body.trim_start_matches('\u{FEFF}');

        let doc = Document {
            page_content: truncate_chars(&html_to_text(body), self.max_chars),
            metadata: DocumentMetadata {
                source: url.to_string(),
                title: extract_title(body),
            },
        };
        Ok((doc, extract_links(body, url)))
    }

    /// 按层抓取：第 0 层为起始页（失败即整体失败），之后各层并发抓取，子页失败仅记录日志
    async fn crawl(&self, root: Url, max_depth: usize) -> Result<Vec<Document>, String> {
        let mut visited: HashSet<String> = HashSet::new();
        visited.insert(root.to_string());

        let (root_doc, mut frontier) = self.fetch(&root).await?;
        let mut docs = vec![root_doc];

        for depth in 1..max_depth {
            let budget = self.max_pages.saturating_sub(docs.len());
            let level: Vec<Url> = frontier
                .drain(..)
                .filter(|u| visited.insert(u.to_string()))
                .take(budget)
                .collect();
            if level.is_empty() {
                break;
            }
            tracing::debug!(depth, pages = level.len(), "scraping child links");

            let results = join_all(level.iter().map(|u| self.fetch(u))).await;
            for (url, result) in level.iter().zip(results) {
                match result {
                    Ok((doc, links)) => {
                        docs.push(doc);
                        frontier.extend(links);
                    }
                    Err(e) => tracing::warn!(url = %url, error = %e, "child page skipped"),
                }
            }
        }
        Ok(docs)
    }
}

#[async_trait]
impl Tool for WebsiteScrapperTool {
    fn name(&self) -> &str {
        WEBSITE_SCRAPPER
    }

    fn description(&self) -> &str {
        "Scrape website of given url to extract content. The tool also goes recursively into \
         child links and extracts content from there as well."
    }

    fn argument_schema(&self) -> ArgumentSchema {
        ArgumentSchema::derive::<ScrapeArgs>()
    }

    async fn run(&self, args: Value) -> Result<Value, String> {
        let args: ScrapeArgs =
            serde_json::from_value(args).map_err(|e| format!("invalid arguments: {e}"))?;
        let url = Url::parse(args.url.trim()).map_err(|e| format!("Invalid url: {e}"))?;
        let max_depth = args.max_depth.unwrap_or(self.max_depth).clamp(1, self.max_depth);
        tracing::info!(url = %url, max_depth, "website scrape");

        let docs = self.crawl(url, max_depth).await?;
        serde_json::to_value(docs).map_err(|e| e.to_string())
    }
}
