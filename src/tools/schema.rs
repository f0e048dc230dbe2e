//! 工具参数的 JSON Schema 生成
//!
//! 每个工具用 ParamSpec 列表声明参数，ToolSchema 汇总为模型可见的
//! `{name, description, parameters: {type: "object", properties, required}}`。

use serde::Serialize;
use serde_json::{json, Map, Value};

/// 参数类型
#[derive(Debug, Clone, PartialEq)]
pub enum ParamType {
    Integer,
    Number,
    String,
    Boolean,
    /// 只能为 null
    Null,
    /// 不限类型，生成空 schema `{}`
    Any,
    /// 不限键值的对象
    Object,
    /// 列表，携带元素类型
    Array(Box<ParamType>),
    /// 字符串键映射，携带值类型
    Map(Box<ParamType>),
    /// 多选一；含 Null 成员时生成 nullable
    Union(Vec<ParamType>),
    /// 枚举值集合
    Literal(Vec<Value>),
}

impl ParamType {
    pub fn array(item: ParamType) -> Self {
        Self::Array(Box::new(item))
    }

    pub fn map(value: ParamType) -> Self {
        Self::Map(Box::new(value))
    }

    /// `T | None`
    pub fn optional(inner: ParamType) -> Self {
        Self::Union(vec![inner, ParamType::Null])
    }

    pub fn to_schema(&self) -> Value {
        match self {
            ParamType::Integer => json!({"type": "integer"}),
            ParamType::Number => json!({"type": "number"}),
            ParamType::String => json!({"type": "string"}),
            ParamType::Boolean => json!({"type": "boolean"}),
            ParamType::Null => json!({"type": "null"}),
            ParamType::Any => json!({}),
            ParamType::Object => json!({"type": "object"}),
            ParamType::Array(item) => json!({"type": "array", "items": item.to_schema()}),
            ParamType::Map(value) => {
                json!({"type": "object", "additionalProperties": value.to_schema()})
            }
            ParamType::Union(members) => union_schema(members),
            ParamType::Literal(values) => {
                let mut kinds: Vec<ParamType> = Vec::new();
                for v in values {
                    let kind = literal_kind(v);
                    if !kinds.contains(&kind) {
                        kinds.push(kind);
                    }
                }
                let mut schema = union_schema(&kinds);
                let allowed: Vec<Value> = values.iter().filter(|v| !v.is_null()).cloned().collect();
                if let Value::Object(obj) = &mut schema {
                    obj.insert("enum".to_string(), Value::Array(allowed));
                }
                schema
            }
        }
    }

    /// 参数值是否符合该类型
    pub fn accepts(&self, value: &Value) -> bool {
        match self {
            ParamType::Integer => value.is_i64() || value.is_u64(),
            ParamType::Number => value.is_number(),
            ParamType::String => value.is_string(),
            ParamType::Boolean => value.is_boolean(),
            ParamType::Null => value.is_null(),
            ParamType::Any => true,
            ParamType::Object => value.is_object(),
            ParamType::Array(item) => value
                .as_array()
                .is_some_and(|items| items.iter().all(|v| item.accepts(v))),
            ParamType::Map(inner) => value
                .as_object()
                .is_some_and(|obj| obj.values().all(|v| inner.accepts(v))),
            ParamType::Union(members) => members.iter().any(|m| m.accepts(value)),
            ParamType::Literal(values) => values.contains(value),
        }
    }
}

fn literal_kind(value: &Value) -> ParamType {
    match value {
        Value::Null => ParamType::Null,
        Value::Bool(_) => ParamType::Boolean,
        Value::Number(n) if n.is_f64() => ParamType::Number,
        Value::Number(_) => ParamType::Integer,
        Value::String(_) => ParamType::String,
        Value::Array(_) => ParamType::array(ParamType::Any),
        Value::Object(_) => ParamType::Object,
    }
}

/// 去掉 Null 成员：剩一个则直接用它，否则 anyOf；有 Null 时加 nullable
fn union_schema(members: &[ParamType]) -> Value {
    let nullable = members.iter().any(|m| *m == ParamType::Null);
    let mut subtypes: Vec<Value> = members
        .iter()
        .filter(|m| **m != ParamType::Null)
        .map(ParamType::to_schema)
        .collect();
    let mut schema = if subtypes.len() == 1 {
        subtypes.remove(0)
    } else {
        json!({"anyOf": subtypes})
    };
    if nullable {
        if let Value::Object(obj) = &mut schema {
            obj.insert("nullable".to_string(), Value::Bool(true));
        }
    }
    schema
}

/// 单个参数声明
#[derive(Debug, Clone, PartialEq)]
pub struct ParamSpec {
    pub name: String,
    pub ty: ParamType,
    pub description: String,
    pub required: bool,
}

impl ParamSpec {
    pub fn required(name: impl Into<String>, ty: ParamType, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ty,
            description: description.into(),
            required: true,
        }
    }

    pub fn optional(name: impl Into<String>, ty: ParamType, description: impl Into<String>) -> Self {
        Self {
            required: false,
            ..Self::required(name, ty, description)
        }
    }

    fn to_property(&self) -> Value {
        let mut schema = self.ty.to_schema();
        if !self.description.is_empty() {
            if let Value::Object(obj) = &mut schema {
                obj.insert("description".to_string(), Value::String(self.description.clone()));
            }
        }
        schema
    }
}

/// 暴露给模型的工具描述
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolSchema {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

impl ToolSchema {
    pub fn new(name: impl Into<String>, description: impl Into<String>, params: &[ParamSpec]) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters: parameters_schema(params),
        }
    }
}

/// `{type: "object", properties: {...}, required: [...]}`，properties 按声明顺序
pub fn parameters_schema(params: &[ParamSpec]) -> Value {
    let mut properties = Map::new();
    for p in params {
        properties.insert(p.name.clone(), p.to_property());
    }
    let required: Vec<Value> = params
        .iter()
        .filter(|p| p.required)
        .map(|p| Value::String(p.name.clone()))
        .collect();
    json!({
        "type": "object",
        "properties": properties,
        "required": required,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primitives_map_one_to_one() {
        assert_eq!(ParamType::Integer.to_schema(), json!({"type": "integer"}));
        assert_eq!(ParamType::Number.to_schema(), json!({"type": "number"}));
        assert_eq!(ParamType::String.to_schema(), json!({"type": "string"}));
        assert_eq!(ParamType::Boolean.to_schema(), json!({"type": "boolean"}));
        assert_eq!(ParamType::Any.to_schema(), json!({}));
    }

    #[test]
    fn test_optional_collapses_with_nullable() {
        assert_eq!(
            ParamType::optional(ParamType::Integer).to_schema(),
            json!({"type": "integer", "nullable": true})
        );
    }

    #[test]
    fn test_union_uses_any_of() {
        let ty = ParamType::Union(vec![ParamType::Integer, ParamType::String, ParamType::Null]);
        assert_eq!(
            ty.to_schema(),
            json!({"anyOf": [{"type": "integer"}, {"type": "string"}], "nullable": true})
        );
    }

    #[test]
    fn test_array_and_map_carry_inner_schema() {
        assert_eq!(
            ParamType::array(ParamType::Number).to_schema(),
            json!({"type": "array", "items": {"type": "number"}})
        );
        assert_eq!(
            ParamType::map(ParamType::array(ParamType::String)).to_schema(),
            json!({"type": "object", "additionalProperties": {"type": "array", "items": {"type": "string"}}})
        );
    }

    #[test]
    fn test_literal_enum_excludes_null() {
        let ty = ParamType::Literal(vec![json!("sunny"), json!("cloudy"), Value::Null]);
        assert_eq!(
            ty.to_schema(),
            json!({"type": "string", "nullable": true, "enum": ["sunny", "cloudy"]})
        );
        let mixed = ParamType::Literal(vec![json!(1), json!("one")]);
        assert_eq!(
            mixed.to_schema(),
            json!({"anyOf": [{"type": "integer"}, {"type": "string"}], "enum": [1, "one"]})
        );
    }

    #[test]
    fn test_parameters_schema_shape() {
        let schema = ToolSchema::new(
            "add",
            "Add two numbers",
            &[
                ParamSpec::required("a", ParamType::Number, "left operand"),
                ParamSpec::optional("note", ParamType::String, ""),
            ],
        );
        assert_eq!(
            schema.parameters,
            json!({
                "type": "object",
                "properties": {
                    "a": {"type": "number", "description": "left operand"},
                    "note": {"type": "string"}
                },
                "required": ["a"]
            })
        );
    }

    #[test]
    fn test_accepts() {
        assert!(ParamType::Number.accepts(&json!(3)));
        assert!(!ParamType::Integer.accepts(&json!(3.5)));
        assert!(ParamType::optional(ParamType::String).accepts(&Value::Null));
        assert!(ParamType::array(ParamType::Integer).accepts(&json!([1, 2])));
        assert!(!ParamType::array(ParamType::Integer).accepts(&json!([1, "x"])));
        assert!(ParamType::Literal(vec![json!("a")]).accepts(&json!("a")));
        assert!(!ParamType::Literal(vec![json!("a")]).accepts(&json!("b")));
    }
}
