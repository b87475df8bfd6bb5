//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `TROUPE__*` 覆盖（双下划线表示嵌套，如 `TROUPE__LLM__PROVIDER=mock`）。
//! 配置对象由入口构造后显式传给各组件，不存在进程级全局模型配置。

use std::path::PathBuf;

use serde::Deserialize;

use crate::core::AgentError;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    #[serde(default)]
    pub app: AppSection,
    #[serde(default)]
    pub llm: LlmSection,
    #[serde(default)]
    pub tools: ToolsSection,
    #[serde(default)]
    pub presentation: PresentationSection,
}

/// [app] 段
#[derive(Debug, Clone, Deserialize)]
pub struct AppSection {
    #[serde(default = "default_app_name")]
    pub name: String,
}

fn default_app_name() -> String {
    "troupe".to_string()
}

impl Default for AppSection {
    fn default() -> Self {
        Self {
            name: default_app_name(),
        }
    }
}

/// [llm] 段：后端、模型、采样参数与结构化调用的回溯次数
#[derive(Debug, Clone, Deserialize)]
pub struct LlmSection {
    /// 后端：openai / mock
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model")]
    pub model: String,
    pub base_url: Option<String>,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default)]
    pub temperature: f32,
    /// 结构化输出缺字段/类型不符时最多重试几次
    #[serde(default = "default_max_backtracks")]
    pub max_backtracks: usize,
    #[serde(default)]
    pub timeouts: LlmTimeoutsSection,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            base_url: None,
            max_tokens: default_max_tokens(),
            temperature: 0.0,
            max_backtracks: default_max_backtracks(),
            timeouts: LlmTimeoutsSection::default(),
        }
    }
}

fn default_provider() -> String {
    "openai".to_string()
}

fn default_model() -> String {
    "gpt-4o-2024-05-13".to_string()
}

fn default_max_tokens() -> u32 {
    4000
}

fn default_max_backtracks() -> usize {
    5
}

#[derive(Debug, Clone, Deserialize)]
pub struct LlmTimeoutsSection {
    #[serde(default = "default_request_timeout")]
    pub request: u64,
}

impl Default for LlmTimeoutsSection {
    fn default() -> Self {
        Self {
            request: default_request_timeout(),
        }
    }
}

fn default_request_timeout() -> u64 {
    60
}

/// 并发执行批次的失败策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FanOutPolicy {
    /// 任一调用失败即终止整批，未完成的兄弟调用被丢弃
    #[default]
    FailFast,
    /// 逐项隔离：失败项带错误说明进入综合步骤
    Isolate,
}

/// [tools] 段：单次工具超时、批次失败策略、搜索与抓取
#[derive(Debug, Clone, Deserialize)]
pub struct ToolsSection {
    /// 单次工具调用超时（秒）
    #[serde(default = "default_tool_timeout_secs")]
    pub tool_timeout_secs: u64,
    #[serde(default)]
    pub fan_out: FanOutPolicy,
    #[serde(default)]
    pub search: SearchSection,
    #[serde(default)]
    pub scraper: ScraperSection,
}

impl Default for ToolsSection {
    fn default() -> Self {
        Self {
            tool_timeout_secs: default_tool_timeout_secs(),
            fan_out: FanOutPolicy::default(),
            search: SearchSection::default(),
            scraper: ScraperSection::default(),
        }
    }
}

fn default_tool_timeout_secs() -> u64 {
    30
}

/// [tools.search] 段：Tavily 端点、返回条数、超时；API Key 读 TAVILY_API_KEY
#[derive(Debug, Clone, Deserialize)]
pub struct SearchSection {
    #[serde(default = "default_search_api_base")]
    pub api_base: String,
    #[serde(default = "default_max_results")]
    pub max_results: usize,
    #[serde(default = "default_search_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for SearchSection {
    fn default() -> Self {
        Self {
            api_base: default_search_api_base(),
            max_results: default_max_results(),
            timeout_secs: default_search_timeout_secs(),
        }
    }
}

fn default_search_api_base() -> String {
    "https://api.tavily.com".to_string()
}

fn default_max_results() -> usize {
    5
}

fn default_search_timeout_secs() -> u64 {
    15
}

/// [tools.scraper] 段：递归深度、最多页面数、每页最大字符数
#[derive(Debug, Clone, Deserialize)]
pub struct ScraperSection {
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
    #[serde(default = "default_max_pages")]
    pub max_pages: usize,
    #[serde(default = "default_max_chars")]
    pub max_chars: usize,
    #[serde(default = "default_search_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ScraperSection {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
            max_pages: default_max_pages(),
            max_chars: default_max_chars(),
            timeout_secs: default_search_timeout_secs(),
        }
    }
}

fn default_max_depth() -> usize {
    2
}

fn default_max_pages() -> usize {
    10
}

fn default_max_chars() -> usize {
    5000
}

/// [presentation] 段
#[derive(Debug, Clone, Deserialize)]
pub struct PresentationSection {
    #[serde(default = "default_max_slides")]
    pub max_slides: usize,
}

impl Default for PresentationSection {
    fn default() -> Self {
        Self {
            max_slides: default_max_slides(),
        }
    }
}

fn default_max_slides() -> usize {
    15
}

/// 从 config 目录加载配置，环境变量 TROUPE__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 TROUPE__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, AgentError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("TROUPE")
            .separator("__")
            .try_parsing(true),
    );

    builder
        .build()
        .and_then(|c| c.try_deserialize())
        .map_err(|e| AgentError::ConfigError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.app.name, "troupe");
        assert_eq!(cfg.llm.max_backtracks, 5);
        assert_eq!(cfg.llm.max_tokens, 4000);
        assert_eq!(cfg.tools.fan_out, FanOutPolicy::FailFast);
        assert_eq!(cfg.tools.scraper.max_chars, 5000);
        assert_eq!(cfg.presentation.max_slides, 15);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "[llm]\nprovider = \"mock\"\nmax_backtracks = 2\n\n[tools]\nfan_out = \"isolate\"\n\n[tools.scraper]\nmax_depth = 1"
        )
        .unwrap();

        let cfg = load_config(Some(file.path().to_path_buf())).unwrap();
        assert_eq!(cfg.llm.provider, "mock");
        assert_eq!(cfg.llm.max_backtracks, 2);
        assert_eq!(cfg.tools.fan_out, FanOutPolicy::Isolate);
        assert_eq!(cfg.tools.scraper.max_depth, 1);
        assert_eq!(cfg.tools.scraper.max_pages, 10);
    }

    #[test]
    fn test_invalid_value_is_config_error() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[app]\nname = \"demo\"\n\n[llm]\nmax_backtracks = \"many\"").unwrap();

        let err = load_config(Some(file.path().to_path_buf())).unwrap_err();
        assert!(matches!(err, AgentError::ConfigError(_)));
        assert!(err.to_string().starts_with("Config error:"));
    }
}
