//! 结构化推理调用（typed chain-of-thought）
//!
//! 给定指令、命名输入字段与输出类型 `O`（schemars 生成 JSON Schema），要求模型只返回
//! `{"reasoning": "...", "<output_field>": ...}`；解析失败（无 JSON、缺字段、类型不符、校验不通过）
//! 时把错误作为纠正提示追加到对话中重试，最多 `max_backtracks` 次，之后返回 MalformedOutput。
//! LLM 传输错误不在此重试。

use std::marker::PhantomData;
use std::sync::Arc;

use schemars::{schema_for, JsonSchema};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::core::AgentError;
use crate::llm::{LlmClient, Message};

/// 默认回溯次数
pub const DEFAULT_MAX_BACKTRACKS: usize = 5;

/// 一个命名输入字段：名称、描述、值（序列化为 JSON 放入 user prompt）
#[derive(Debug, Clone)]
pub struct InputField {
    pub name: &'static str,
    pub desc: &'static str,
    pub value: Value,
}

impl InputField {
    pub fn new(name: &'static str, desc: &'static str, value: &impl Serialize) -> Self {
        Self {
            name,
            desc,
            value: serde_json::to_value(value).unwrap_or(Value::Null),
        }
    }
}

/// 结构化预测器：一个输出字段，类型为 O
pub struct StructuredPredictor<O> {
    llm: Arc<dyn LlmClient>,
    instructions: String,
    output_field: &'static str,
    output_desc: &'static str,
    max_backtracks: usize,
    _output: PhantomData<fn() -> O>,
}

impl<O> StructuredPredictor<O>
where
    O: DeserializeOwned + JsonSchema,
{
    pub fn new(
        llm: Arc<dyn LlmClient>,
        instructions: impl Into<String>,
        output_field: &'static str,
        output_desc: &'static str,
    ) -> Self {
        Self {
            llm,
            instructions: instructions.into(),
            output_field,
            output_desc,
            max_backtracks: DEFAULT_MAX_BACKTRACKS,
            _output: PhantomData,
        }
    }

    pub fn with_max_backtracks(mut self, max_backtracks: usize) -> Self {
        self.max_backtracks = max_backtracks;
        self
    }

    pub fn output_field(&self) -> &'static str {
        self.output_field
    }

    fn system_prompt(&self) -> String {
        let schema = serde_json::to_value(schema_for!(O)).unwrap_or(Value::Null);
        let output_type = schema
            .get("type")
            .and_then(|t| t.as_str())
            .unwrap_or("object")
            .to_string();
        let schema_text = serde_json::to_string_pretty(&schema).unwrap_or_default();
        format!(
            "{instructions}\n\n\
             Think step by step, then reply with ONLY one JSON object of the form:\n\
             {{\"reasoning\": \"<your step-by-step reasoning>\", \"{field}\": <value>}}\n\n\
             Output field: {field} ({output_type})\n\
             Description: {desc}\n\
             The value of \"{field}\" must match this JSON schema:\n{schema_text}",
            instructions = self.instructions.trim(),
            field = self.output_field,
            desc = self.output_desc,
        )
    }

    /// 执行结构化调用
    pub async fn predict(&self, inputs: &[InputField]) -> Result<O, AgentError> {
        self.predict_checked(inputs, |_| Ok(())).await
    }

    /// 执行结构化调用，并对解析结果做额外断言；断言失败同样触发回溯
    pub async fn predict_checked<F>(&self, inputs: &[InputField], check: F) -> Result<O, AgentError>
    where
        F: Fn(&O) -> Result<(), String> + Send + Sync,
    {
        let mut messages = vec![
            Message::system(self.system_prompt()),
            Message::user(render_inputs(inputs)),
        ];
        let mut last_detail = String::new();

        for attempt in 0..=self.max_backtracks {
            let reply = self
                .llm
                .complete(&messages)
                .await
                .map_err(AgentError::LlmError)?;

            match parse_field::<O>(&reply, self.output_field)
                .and_then(|output| check(&output).map(|_| output))
            {
                Ok(output) => return Ok(output),
                Err(detail) => {
                    tracing::warn!(
                        field = self.output_field,
                        attempt,
                        detail = %detail,
                        "structured output rejected, backtracking"
                    );
                    messages.push(Message::assistant(reply));
                    messages.push(Message::user(format!(
                        "Your previous reply was rejected: {detail}. \
                         Reply again with ONLY one JSON object containing \"reasoning\" and \"{}\".",
                        self.output_field
                    )));
                    last_detail = detail;
                }
            }
        }

        Err(AgentError::MalformedOutput {
            field: self.output_field.to_string(),
            detail: last_detail,
        })
    }
}

fn render_inputs(inputs: &[InputField]) -> String {
    inputs
        .iter()
        .map(|f| {
            let value = match &f.value {
                Value::String(s) => s.clone(),
                other => serde_json::to_string_pretty(other).unwrap_or_default(),
            };
            format!("{} ({}):\n{}", f.name, f.desc, value)
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// 从文本中提取 JSON 对象（```json ... ``` 或首个 `{` 到末个 `}`）
pub fn extract_json(output: &str) -> Option<&str> {
    let trimmed = output.trim();
    if let Some(start) = trimmed.find("```json") {
        let rest = &trimmed[start + 7..];
        return Some(rest.find("```").map(|end| rest[..end].trim()).unwrap_or(rest.trim()));
    }
    let start = trimmed.find('{')?;
    let end = trimmed.rfind('}')?;
    (end >= start).then(|| &trimmed[start..=end])
}

/// 解析回复中指定字段为 O；错误以文本描述返回，供回溯提示使用
pub fn parse_field<O: DeserializeOwned>(reply: &str, field: &str) -> Result<O, String> {
    let json_str = extract_json(reply).ok_or_else(|| "no JSON object found".to_string())?;
    let mut parsed: Value =
        serde_json::from_str(json_str).map_err(|e| format!("invalid JSON: {e}"))?;
    let value = parsed
        .get_mut(field)
        .map(Value::take)
        .ok_or_else(|| format!("missing field `{field}`"))?;
    serde_json::from_value(value).map_err(|e| format!("field `{field}` has wrong shape: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ScriptedLlmClient;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, JsonSchema, PartialEq)]
    struct Answer {
        answer: String,
    }

    #[test]
    fn test_extract_json_fenced() {
        let text = "sure\n```json\n{\"a\": 1}\n```\nbye";
        assert_eq!(extract_json(text), Some("{\"a\": 1}"));
    }

    #[test]
    fn test_extract_json_bare() {
        assert_eq!(extract_json("x {\"a\": {\"b\": 2}} y"), Some("{\"a\": {\"b\": 2}}"));
        assert_eq!(extract_json("no json here"), None);
    }

    #[test]
    fn test_parse_field_missing() {
        let err = parse_field::<String>(r#"{"reasoning": "r"}"#, "final_response").unwrap_err();
        assert!(err.contains("missing field `final_response`"));
    }

    #[tokio::test]
    async fn test_predict_backtracks_then_succeeds() {
        let llm = Arc::new(ScriptedLlmClient::new(vec![
            r#"{"reasoning": "oops"}"#.to_string(),
            r#"{"reasoning": "ok", "search_answer": {"answer": "42"}}"#.to_string(),
        ]));
        let predictor: StructuredPredictor<Answer> =
            StructuredPredictor::new(llm.clone(), "Answer it.", "search_answer", "Final answer.");

        let out = predictor
            .predict(&[InputField::new("question", "The question.", &"what?")])
            .await
            .unwrap();
        assert_eq!(out.answer, "42");

        let calls = llm.calls();
        assert_eq!(calls.len(), 2);
        // 第二次调用带上了被拒绝的回复与纠正提示
        assert_eq!(calls[1].len(), 4);
        assert!(calls[1][3].content.contains("missing field `search_answer`"));
    }

    #[tokio::test]
    async fn test_predict_exhausts_backtracks() {
        let llm = Arc::new(ScriptedLlmClient::new(vec!["not json".to_string(); 3]));
        let predictor: StructuredPredictor<String> =
            StructuredPredictor::new(llm.clone(), "Say it.", "final_response", "Final response.")
                .with_max_backtracks(2);

        let err = predictor.predict(&[]).await.unwrap_err();
        assert!(matches!(err, AgentError::MalformedOutput { ref field, .. } if field == "final_response"));
        assert_eq!(llm.calls().len(), 3);
    }

    #[tokio::test]
    async fn test_predict_checked_rejects() {
        let llm = Arc::new(ScriptedLlmClient::new(vec![
            r#"{"reasoning": "", "final_response": ""}"#.to_string(),
            r#"{"reasoning": "", "final_response": "done"}"#.to_string(),
        ]));
        let predictor: StructuredPredictor<String> =
            StructuredPredictor::new(llm, "Say it.", "final_response", "Final response.");

        let out = predictor
            .predict_checked(&[], |s: &String| {
                if s.is_empty() {
                    Err("response must not be empty".to_string())
                } else {
                    Ok(())
                }
            })
            .await
            .unwrap();
        assert_eq!(out, "done");
    }

    #[tokio::test]
    async fn test_llm_error_not_retried() {
        let llm = Arc::new(ScriptedLlmClient::new(vec![]));
        let predictor: StructuredPredictor<String> =
            StructuredPredictor::new(llm.clone(), "Say it.", "final_response", "Final response.");
        let err = predictor.predict(&[]).await.unwrap_err();
        assert!(matches!(err, AgentError::LlmError(_)));
        assert_eq!(llm.calls().len(), 1);
    }

    #[test]
    fn test_system_prompt_declares_output_field() {
        let predictor: StructuredPredictor<Answer> = StructuredPredictor::new(
            Arc::new(ScriptedLlmClient::new(vec![])),
            "Answer it.",
            "search_answer",
            "Final answer.",
        );
        let prompt = predictor.system_prompt();
        assert!(prompt.contains("Output field: search_answer (object)"));
        assert!(prompt.contains("\"answer\""));
    }
}
