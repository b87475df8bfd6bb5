//! 工具执行器
//!
//! 执行前按工具的参数描述校验参数（不符合即 InvalidArguments，不调用工具）；
//! 对单次工具调用施加超时，超时或失败时转为 AgentError（ToolTimeout / ToolExecutionFailed）；
//! 每次调用输出结构化审计日志（JSON）。

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::Value;
use tokio::time::timeout;

use crate::core::AgentError;
use crate::tools::Tool;

/// 工具执行器：对每次调用施加超时，并将结果映射为 AgentError
#[derive(Debug, Clone, Copy)]
pub struct ToolExecutor {
    timeout: Duration,
}

impl ToolExecutor {
    pub fn new(timeout_secs: u64) -> Self {
        Self::with_timeout(Duration::from_secs(timeout_secs))
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// 执行指定工具；参数不符返回 InvalidArguments，超时返回 ToolTimeout，工具返回 Err 则转为 ToolExecutionFailed
    pub async fn execute(&self, tool: &Arc<dyn Tool>, args: Value) -> Result<Value, AgentError> {
        let start = Instant::now();
        let tool_name = tool.name().to_string();
        let args_preview = args_preview(&args);

        if let Err(detail) = tool.argument_schema().validate(&args) {
            tracing::warn!(tool = %tool_name, args = %args_preview, detail = %detail, "tool arguments rejected");
            return Err(AgentError::InvalidArguments {
                resource: tool_name,
                detail,
            });
        }
        let result = timeout(self.timeout, tool.run(args)).await;

        let (ok, outcome): (bool, &str) = match &result {
            Ok(Ok(_)) => (true, "ok"),
            Ok(Err(_)) => (false, "error"),
            Err(_) => (false, "timeout"),
        };
        let duration_ms = start.elapsed().as_millis() as u64;
        let audit = serde_json::json!({
            "event": "tool_audit",
            "tool": tool_name,
            "ok": ok,
            "outcome": outcome,
            "duration_ms": duration_ms,
            "args_preview": args_preview,
        });
        tracing::info!(audit = %audit.to_string(), "tool");

        match result {
            Ok(Ok(content)) => Ok(content),
            Ok(Err(message)) => Err(AgentError::ToolExecutionFailed {
                tool: tool_name,
                message,
            }),
            Err(_) => Err(AgentError::ToolTimeout(tool_name)),
        }
    }
}

impl Default for ToolExecutor {
    fn default() -> Self {
        Self::new(30)
    }
}

fn args_preview(args: &Value) -> String {
    let s = args.to_string();
    if s.len() > 200 {
        format!("{}...", s.chars().take(200).collect::<String>())
    } else {
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;

    struct SlowTool;

    #[async_trait]
    impl Tool for SlowTool {
        fn name(&self) -> &str {
            "slow"
        }

        fn description(&self) -> &str {
            "sleeps"
        }

        async fn run(&self, _args: Value) -> Result<Value, String> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(Value::Null)
        }
    }

    struct FailingTool;

    #[async_trait]
    impl Tool for FailingTool {
        fn name(&self) -> &str {
            "failing"
        }

        fn description(&self) -> &str {
            "always fails"
        }

        async fn run(&self, _args: Value) -> Result<Value, String> {
            Err("boom".to_string())
        }
    }

    #[tokio::test]
    async fn test_timeout() {
        let executor = ToolExecutor::with_timeout(Duration::from_millis(50));
        let tool: Arc<dyn Tool> = Arc::new(SlowTool);
        let err = executor.execute(&tool, json!({})).await.unwrap_err();
        assert!(matches!(err, AgentError::ToolTimeout(name) if name == "slow"));
    }

    #[tokio::test]
    async fn test_failure_mapped() {
        let executor = ToolExecutor::default();
        let tool: Arc<dyn Tool> = Arc::new(FailingTool);
        let err = executor.execute(&tool, json!({})).await.unwrap_err();
        assert!(matches!(
            err,
            AgentError::ToolExecutionFailed { ref tool, ref message } if tool == "failing" && message == "boom"
        ));
    }

    #[tokio::test]
    async fn test_invalid_arguments_rejected_before_run() {
        let executor = ToolExecutor::default();
        let tool: Arc<dyn Tool> = Arc::new(crate::tools::EchoTool);
        let err = executor.execute(&tool, json!({})).await.unwrap_err();
        assert!(matches!(
            err,
            AgentError::InvalidArguments { ref resource, ref detail }
                if resource == "echo" && detail.contains("`text`")
        ));

        let out = executor.execute(&tool, json!({"text": "ok"})).await.unwrap();
        assert_eq!(out, json!("ok"));
    }

    #[test]
    fn test_args_preview_truncates() {
        let long = json!({"text": "x".repeat(500)});
        assert!(args_preview(&long).ends_with("..."));
        assert!(args_preview(&json!({"a": 1})).len() < 20);
    }
}
