//! 参数类型描述符
//!
//! 每个工具/协作 Agent 在注册时附带一份声明式的参数描述（参数名 → {title, type, optional?, items?}），
//! 序列化后放进选择步骤的 prompt，告诉模型该资源接受哪些参数。执行工具前用 `validate` 做一次粗校验：
//! 必填参数必须出现，非 string 参数的值类型必须匹配。
//!
//! 两种来源：手写（builder）或由参数结构体经 schemars 派生。无法识别的类型一律退化为 string，
//! 因此 string 参数不做类型校验。

use std::collections::{BTreeMap, HashSet};

use schemars::{schema_for, JsonSchema};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// 固定的基础类型词表
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JsonType {
    String,
    Integer,
    Number,
    Boolean,
    Array,
    Object,
}

impl JsonType {
    /// JSON Schema 类型名 → 词表；未知类型默认 string
    pub fn from_name(name: &str) -> Self {
        match name {
            "integer" => JsonType::Integer,
            "number" => JsonType::Number,
            "boolean" => JsonType::Boolean,
            "array" => JsonType::Array,
            "object" => JsonType::Object,
            _ => JsonType::String,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            JsonType::String => "string",
            JsonType::Integer => "integer",
            JsonType::Number => "number",
            JsonType::Boolean => "boolean",
            JsonType::Array => "array",
            JsonType::Object => "object",
        }
    }

    /// string 可能是未知类型的退化结果，接受任意值
    fn accepts(self, value: &Value) -> bool {
        match self {
            JsonType::String => true,
            JsonType::Integer => value.is_i64() || value.is_u64(),
            JsonType::Number => value.is_number(),
            JsonType::Boolean => value.is_boolean(),
            JsonType::Array => value.is_array(),
            JsonType::Object => value.is_object(),
        }
    }
}

/// 数组元素类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemSpec {
    #[serde(rename = "type")]
    pub kind: JsonType,
}

/// 单个参数的描述
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArgSpec {
    pub title: String,
    #[serde(rename = "type")]
    pub kind: JsonType,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub optional: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<ItemSpec>,
}

impl ArgSpec {
    pub fn new(name: &str, kind: JsonType) -> Self {
        Self {
            title: title_case(name),
            kind,
            optional: false,
            items: None,
        }
    }
}

/// 参数名 → 描述
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArgumentSchema(BTreeMap<String, ArgSpec>);

impl ArgumentSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn required(self, name: &str, kind: JsonType) -> Self {
        self.with(name, ArgSpec::new(name, kind))
    }

    pub fn optional(self, name: &str, kind: JsonType) -> Self {
        let mut spec = ArgSpec::new(name, kind);
        spec.optional = true;
        self.with(name, spec)
    }

    pub fn array(self, name: &str, item: JsonType) -> Self {
        let mut spec = ArgSpec::new(name, JsonType::Array);
        spec.items = Some(ItemSpec { kind: item });
        self.with(name, spec)
    }

    pub fn with(mut self, name: &str, spec: ArgSpec) -> Self {
        self.0.insert(name.to_string(), spec);
        self
    }

    /// 由参数结构体派生：Option<T> → optional；Vec<T> → array + items；其余未知类型 → string
    pub fn derive<T: JsonSchema>() -> Self {
        let root = serde_json::to_value(schema_for!(T)).unwrap_or(Value::Null);
        Self::from_json_schema(&root)
    }

    /// 从 JSON Schema（object + properties）转换
    pub fn from_json_schema(schema: &Value) -> Self {
        let required: HashSet<&str> = schema
            .get("required")
            .and_then(Value::as_array)
            .map(|names| names.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default();

        let mut out = Self::new();
        let Some(properties) = schema.get("properties").and_then(Value::as_object) else {
            return out;
        };

        for (name, prop) in properties {
            let (kind, nullable) = declared_type(prop);
            let items = (kind == JsonType::Array).then(|| ItemSpec {
                kind: prop
                    .get("items")
                    .map(|i| declared_type(i).0)
                    .unwrap_or(JsonType::String),
            });
            out.0.insert(
                name.clone(),
                ArgSpec {
                    title: title_case(name),
                    kind,
                    optional: nullable || !required.contains(name.as_str()),
                    items,
                },
            );
        }
        out
    }

    /// 校验模型给出的参数值；错误文本直接用于 InvalidArguments
    pub fn validate(&self, args: &Value) -> Result<(), String> {
        let Some(values) = args.as_object() else {
            return Err(format!("expected a JSON object, got {args}"));
        };
        for (name, spec) in &self.0 {
            match values.get(name) {
                None | Some(Value::Null) if spec.optional => {}
                None => return Err(format!("missing required argument `{name}`")),
                Some(value) if !spec.kind.accepts(value) => {
                    return Err(format!(
                        "argument `{name}` expects {}, got {value}",
                        spec.kind.name()
                    ));
                }
                Some(_) => {}
            }
        }
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&ArgSpec> {
        self.0.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ArgSpec)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// 返回 (类型, 是否可空)；$ref / anyOf 等无直接 type 的情形按 string 处理
fn declared_type(prop: &Value) -> (JsonType, bool) {
    match prop.get("type") {
        Some(Value::String(t)) => (JsonType::from_name(t), false),
        Some(Value::Array(types)) => {
            let nullable = types.iter().any(|t| t == "null");
            let kind = types
                .iter()
                .filter_map(Value::as_str)
                .find(|t| *t != "null")
                .map(JsonType::from_name)
                .unwrap_or(JsonType::String);
            (kind, nullable)
        }
        _ => (JsonType::String, false),
    }
}

/// 首字母大写、其余小写
fn title_case(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}
