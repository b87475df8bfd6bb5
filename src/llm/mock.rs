//! Mock / Scripted LLM 客户端（用于离线演示与测试，无需 API）
//!
//! - MockLlmClient：识别结构化调用声明的输出字段与类型，返回空但合法的值（字符串则回显用户输入）
//! - ScriptedLlmClient：按规则或队列顺序返回预设回复，并记录每次调用的完整消息

use std::collections::VecDeque;
use std::sync::{Mutex, OnceLock};

use async_trait::async_trait;
use regex::Regex;
use serde_json::{json, Value};

use crate::llm::{LlmClient, Message, Role};

fn output_field_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"Output field: (\w+) \((\w+)\)").expect("static regex")
    })
}

/// Mock 客户端：对结构化调用返回空列表/空对象，对字符串输出回显最后一条 User 消息
#[derive(Debug, Default)]
pub struct MockLlmClient;

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(&self, messages: &[Message]) -> Result<String, String> {
        let last_user = messages
            .iter()
            .rev()
            .find(|m| matches!(m.role, Role::User))
            .map(|m| m.content.chars().take(200).collect::<String>())
            .unwrap_or_else(|| "(no input)".to_string());

        let declared = messages
            .iter()
            .filter(|m| matches!(m.role, Role::System))
            .find_map(|m| output_field_pattern().captures(&m.content));

        let Some(caps) = declared else {
            return Ok(format!("Echo from Mock: {}", last_user));
        };
        let value = match &caps[2] {
            "object" => json!({}),
            "array" => json!([]),
            "string" => Value::String(format!("Echo from Mock: {}", last_user)),
            _ => Value::Null,
        };
        let mut reply = serde_json::Map::new();
        reply.insert("reasoning".to_string(), Value::String("mock".to_string()));
        reply.insert(caps[1].to_string(), value);
        Ok(Value::Object(reply).to_string())
    }
}

/// 预设回复客户端：规则（消息内容包含某片段即返回对应回复，可重复命中）优先，其次按队列顺序消费
#[derive(Debug, Default)]
pub struct ScriptedLlmClient {
    rules: Vec<(String, String)>,
    replies: Mutex<VecDeque<String>>,
    calls: Mutex<Vec<Vec<Message>>>,
}

impl ScriptedLlmClient {
    pub fn new(replies: Vec<String>) -> Self {
        Self {
            rules: Vec::new(),
            replies: Mutex::new(replies.into()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// 任一消息包含 `needle` 时返回 `reply`（按添加顺序匹配）
    pub fn with_rule(mut self, needle: impl Into<String>, reply: impl Into<String>) -> Self {
        self.rules.push((needle.into(), reply.into()));
        self
    }

    /// 已发生的调用（每次调用的完整消息列表）
    pub fn calls(&self) -> Vec<Vec<Message>> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl LlmClient for ScriptedLlmClient {
    async fn complete(&self, messages: &[Message]) -> Result<String, String> {
        self.calls
            .lock()
            .map_err(|e| e.to_string())?
            .push(messages.to_vec());

        let matched = self.rules.iter().find(|(needle, _)| {
            messages.iter().any(|m| m.content.contains(needle.as_str()))
        });
        if let Some((_, reply)) = matched {
            return Ok(reply.clone());
        }

        self.replies
            .lock()
            .map_err(|e| e.to_string())?
            .pop_front()
            .ok_or_else(|| "scripted replies exhausted".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_answers_declared_field() {
        let messages = vec![
            Message::system("Do it.\nOutput field: selected_tools_and_agents (object)\n"),
            Message::user("task"),
        ];
        let reply = MockLlmClient.complete(&messages).await.unwrap();
        let v: Value = serde_json::from_str(&reply).unwrap();
        assert_eq!(v["selected_tools_and_agents"], json!({}));
    }

    #[tokio::test]
    async fn test_mock_echoes_string_field() {
        let messages = vec![
            Message::system("Output field: final_response (string)"),
            Message::user("hello"),
        ];
        let reply = MockLlmClient.complete(&messages).await.unwrap();
        let v: Value = serde_json::from_str(&reply).unwrap();
        assert_eq!(v["final_response"], "Echo from Mock: hello");
    }

    #[tokio::test]
    async fn test_scripted_rules_before_queue() {
        let llm = ScriptedLlmClient::new(vec!["first".into(), "second".into()])
            .with_rule("special", "ruled");
        assert_eq!(llm.complete(&[Message::user("a")]).await.unwrap(), "first");
        assert_eq!(llm.complete(&[Message::user("special")]).await.unwrap(), "ruled");
        assert_eq!(llm.complete(&[Message::user("special")]).await.unwrap(), "ruled");
        assert_eq!(llm.complete(&[Message::user("b")]).await.unwrap(), "second");
        assert!(llm.complete(&[Message::user("c")]).await.is_err());
        assert_eq!(llm.calls().len(), 5);
    }
}
