//! 四则运算工具：add / sub / mul / div
//!
//! 模型自己做大数或多步运算不可靠，规划阶段会把这类问题拆成调用这些工具的子计划。

use serde_json::{Number, Value};

use crate::tools::registry::FunctionTool;
use crate::tools::schema::{ParamSpec, ParamType};

fn operand() -> ParamType {
    ParamType::Union(vec![ParamType::Integer, ParamType::Number])
}

fn operands(a: &str, b: &str) -> Vec<ParamSpec> {
    vec![
        ParamSpec::required("a", operand(), a),
        ParamSpec::required("b", operand(), b),
    ]
}

fn number_arg(args: &Value, name: &str) -> Result<f64, String> {
    args.get(name)
        .and_then(Value::as_f64)
        .ok_or_else(|| format!("argument `{name}` must be a number"))
}

fn float_result(x: f64) -> Result<Value, String> {
    Number::from_f64(x)
        .map(Value::Number)
        .ok_or_else(|| format!("result is not a finite number: {x}"))
}

pub fn add_tool() -> FunctionTool {
    FunctionTool::new(
        "add",
        "Add a and b, returns a + b.",
        operands("number to be added", "number to add"),
        |args| {
            // 两个整数相加保持整数结果
            if let (Some(a), Some(b)) = (
                args.get("a").and_then(Value::as_i64),
                args.get("b").and_then(Value::as_i64),
            ) {
                if let Some(sum) = a.checked_add(b) {
                    return Ok(Value::from(sum));
                }
            }
            float_result(number_arg(args, "a")? + number_arg(args, "b")?)
        },
    )
}

pub fn sub_tool() -> FunctionTool {
    FunctionTool::new(
        "sub",
        "Subtract b from a, returns a - b.",
        operands("number to subtract from", "number to subtract"),
        |args| float_result(number_arg(args, "a")? - number_arg(args, "b")?),
    )
}

pub fn mul_tool() -> FunctionTool {
    FunctionTool::new(
        "mul",
        "Multiply a and b, returns a * b.",
        operands("number to be multiplied", "number to multiply by"),
        |args| float_result(number_arg(args, "a")? * number_arg(args, "b")?),
    )
}

pub fn div_tool() -> FunctionTool {
    FunctionTool::new(
        "div",
        "Divide a by b, returns a / b. b must not be 0.",
        operands("dividend", "divisor, must not be 0"),
        |args| {
            let a = number_arg(args, "a")?;
            let b = number_arg(args, "b")?;
            if b == 0.0 {
                return Err("division by zero: b must not be 0".to_string());
            }
            float_result(a / b)
        },
    )
}

/// 全部四则运算工具（注册顺序 add, sub, mul, div）
pub fn math_tools() -> Vec<FunctionTool> {
    vec![add_tool(), sub_tool(), mul_tool(), div_tool()]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::Tool;
    use serde_json::json;

    #[tokio::test]
    async fn test_add_keeps_integers() {
        assert_eq!(add_tool().execute(json!({"a": 2, "b": 3})).await.unwrap(), "5");
        assert_eq!(add_tool().execute(json!({"a": 1.5, "b": 2})).await.unwrap(), "3.5");
    }

    #[tokio::test]
    async fn test_sub_mul_div() {
        assert_eq!(sub_tool().execute(json!({"a": 10, "b": 4})).await.unwrap(), "6.0");
        assert_eq!(mul_tool().execute(json!({"a": 3, "b": 4})).await.unwrap(), "12.0");
        assert_eq!(div_tool().execute(json!({"a": 1, "b": 4})).await.unwrap(), "0.25");
    }

    #[tokio::test]
    async fn test_div_by_zero_is_error() {
        let err = div_tool().execute(json!({"a": 1, "b": 0})).await.unwrap_err();
        assert!(err.contains("division by zero"));
    }

    #[test]
    fn test_operand_schema_is_any_of() {
        let schema = add_tool().schema();
        assert_eq!(
            schema.parameters["properties"]["a"]["anyOf"],
            json!([{"type": "integer"}, {"type": "number"}])
        );
    }
}
