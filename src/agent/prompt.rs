//! 确定性的文本格式化：背景故事、幻灯片任务、工具/Agent 响应汇总
//!
//! 空响应列表格式化为固定的哨兵句子，明确告诉模型「没有使用」，而不是给一段空白。

use serde_json::Value;

use crate::agent::signatures::{AgentResponse, ToolResponse};

pub const NO_TOOLS_USED: &str = "No tools were used to generate response !";
pub const NO_AGENTS_USED: &str = "No agents were collaborated to generate response !";

/// 字符串原样输出（不带 JSON 引号），其它值用紧凑 JSON
pub fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

pub fn format_tool_responses(responses: &[ToolResponse]) -> String {
    if responses.is_empty() {
        return NO_TOOLS_USED.to_string();
    }

    let mut content =
        String::from("The tools below have generated the corresponding responses after running:\n");
    for (idx, item) in responses.iter().enumerate() {
        let n = idx + 1;
        content.push_str(&format!("\nTool[{n}]_NAME: {}\n", item.tool.tool_name));
        match &item.error {
            Some(err) => content.push_str(&format!("Tool[{n}]_ERROR: {err}\n")),
            None => content.push_str(&format!(
                "Tool[{n}]_RESPONSE: {}\n",
                render_value(&item.response)
            )),
        }
    }
    content
}

pub fn format_agent_responses(responses: &[AgentResponse]) -> String {
    if responses.is_empty() {
        return NO_AGENTS_USED.to_string();
    }

    let mut content = String::from(
        "The team agents below have generated the corresponding responses after execution:\n",
    );
    for (idx, item) in responses.iter().enumerate() {
        let n = idx + 1;
        content.push_str(&format!("\nAGENT[{n}]_NAME: {}\n", item.agent.agent_name));
        match &item.error {
            Some(err) => content.push_str(&format!("AGENT[{n}]_ERROR: {err}\n")),
            None => content.push_str(&format!(
                "AGENT[{n}]_RESPONSE: {}\n",
                render_value(&item.response)
            )),
        }
    }
    content
}

pub fn background_story(name: &str, role: &str) -> String {
    format!(
        "You are a smart and expert agent with below properties:\n\nNAME: {name}\nROLE: {role}\n\n"
    )
}

/// 背景故事在前，调用方上下文在后；上下文为空时仅背景故事
pub fn merge_context(background: &str, context: Option<&str>) -> String {
    match context {
        Some(ctx) if !ctx.is_empty() => format!("{background}{ctx}"),
        _ => background.to_string(),
    }
}

pub fn slide_task(title: &str, outline: &str) -> String {
    format!(
        "Generate content of the slide (basically one-pager slide) of the overall presentation \
         based on title and outline provided. If possible please also include the sources \
         (including links) of the content.\n\ntitle: {title}\noutline: {outline}\n"
    )
}
