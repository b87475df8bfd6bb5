//! Echo 工具（测试用）

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::Value;

use crate::tools::{ArgumentSchema, Tool};

#[derive(Deserialize, JsonSchema)]
struct EchoArgs {
    text: String,
}

/// Echo 工具：回显文本
pub struct EchoTool;

#[async_trait]
impl Tool for EchoTool {
    fn name(&self) -> &str {
        "echo"
    }

    fn description(&self) -> &str {
        "Echo text (for testing)."
    }

    fn argument_schema(&self) -> ArgumentSchema {
        ArgumentSchema::derive::<EchoArgs>()
    }

    async fn run(&self, args: Value) -> Result<Value, String> {
        let args: EchoArgs =
            serde_json::from_value(args).map_err(|e| format!("invalid arguments: {e}"))?;
        Ok(Value::String(args.text))
    }
}
