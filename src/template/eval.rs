use super::error::{RenderError, Result};
use super::parser::{BinaryOp, Expr};
use crate::types::VarsMap;
use serde_json::Value;
use std::cmp::Ordering;

/// Evaluate an expression against a flat variable context.
///
/// Undefined top-level names are an error; missing attributes are null.
pub fn evaluate(expr: &Expr, ctx: &VarsMap) -> Result<Value> {
    match expr {
        Expr::Literal(value) => Ok(value.clone()),
        Expr::Var(name) => ctx
            .get(name)
            .cloned()
            .ok_or_else(|| RenderError::Undefined { name: name.clone() }),
        Expr::Attr(target, name) => attribute(&evaluate(target, ctx)?, name),
        Expr::Index(target, index) => item(&evaluate(target, ctx)?, &evaluate(index, ctx)?),
        Expr::List(items) => items
            .iter()
            .map(|e| evaluate(e, ctx))
            .collect::<Result<Vec<_>>>()
            .map(Value::Array),
        Expr::Not(inner) => Ok(Value::Bool(!is_truthy(&evaluate(inner, ctx)?))),
        Expr::Neg(inner) => negate(&evaluate(inner, ctx)?),
        Expr::And(left, right) => {
            let left = evaluate(left, ctx)?;
            if is_truthy(&left) {
                evaluate(right, ctx)
            } else {
                Ok(left)
            }
        }
        Expr::Or(left, right) => {
            let left = evaluate(left, ctx)?;
            if is_truthy(&left) {
                Ok(left)
            } else {
                evaluate(right, ctx)
            }
        }
        Expr::Binary(op, left, right) => {
            binary(op, &evaluate(left, ctx)?, &evaluate(right, ctx)?)
        }
        Expr::Filter { input, name, args } => {
            let input = match evaluate(input, ctx) {
                Err(RenderError::Undefined { .. }) if name == "default" => Value::Null,
                other => other?,
            };
            let args = args
                .iter()
                .map(|a| evaluate(a, ctx))
                .collect::<Result<Vec<_>>>()?;
            apply_filter(name, input, &args)
        }
    }
}

/// Python-style truthiness.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

/// Text form used when a value is interpolated into a string.
pub fn to_display(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(true) => "True".to_string(),
        Value::Bool(false) => "False".to_string(),
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}

pub fn type_name(value: &Value) -> &'static str {
    match value {
        Value::String(_) => "string",
        Value::Number(_) => "number",
        Value::Bool(_) => "boolean",
        Value::Array(_) => "sequence",
        Value::Object(_) => "mapping",
        Value::Null => "null",
    }
}

fn type_error(reason: String) -> RenderError {
    RenderError::Type { reason }
}

fn attribute(target: &Value, name: &str) -> Result<Value> {
    match target {
        Value::Object(map) => Ok(map.get(name).cloned().unwrap_or(Value::Null)),
        Value::Null => Ok(Value::Null),
        other => Err(type_error(format!(
            "cannot read attribute '{name}' of {}",
            type_name(other)
        ))),
    }
}

fn item(target: &Value, index: &Value) -> Result<Value> {
    match (target, index) {
        (Value::Array(items), Value::Number(n)) => {
            let Some(i) = n.as_i64() else {
                return Err(type_error(format!("sequence index {n} is not an integer")));
            };
            let len = items.len() as i64;
            let i = if i < 0 { len + i } else { i };
            Ok(usize::try_from(i)
                .ok()
                .and_then(|i| items.get(i))
                .cloned()
                .unwrap_or(Value::Null))
        }
        (Value::Object(map), Value::String(key)) => {
            Ok(map.get(key).cloned().unwrap_or(Value::Null))
        }
        (Value::Null, _) => Ok(Value::Null),
        (target, index) => Err(type_error(format!(
            "cannot index {} with {}",
            type_name(target),
            type_name(index)
        ))),
    }
}

fn negate(value: &Value) -> Result<Value> {
    match value {
        Value::Number(n) if n.is_i64() => n
            .as_i64()
            .and_then(i64::checked_neg)
            .map(Value::from)
            .ok_or_else(|| type_error(format!("cannot negate {n} without overflow"))),
        Value::Number(n) => Ok(Value::from(-n.as_f64().unwrap_or_default())),
        other => Err(type_error(format!("cannot negate {}", type_name(other)))),
    }
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_i64(), y.as_i64()) {
            (Some(x), Some(y)) => x == y,
            _ => x.as_f64() == y.as_f64(),
        },
        _ => a == b,
    }
}

fn compare(a: &Value, b: &Value) -> Result<Ordering> {
    let ordering = match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_f64(), y.as_f64()) {
            (Some(x), Some(y)) => x.partial_cmp(&y),
            _ => None,
        },
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        _ => None,
    };
    ordering.ok_or_else(|| {
        type_error(format!(
            "cannot compare {} with {}",
            type_name(a),
            type_name(b)
        ))
    })
}

fn contains(haystack: &Value, needle: &Value) -> Result<bool> {
    match (haystack, needle) {
        (Value::String(h), Value::String(n)) => Ok(h.contains(n.as_str())),
        (Value::Array(items), needle) => Ok(items.iter().any(|i| values_equal(i, needle))),
        (Value::Object(map), Value::String(key)) => Ok(map.contains_key(key)),
        (h, n) => Err(type_error(format!(
            "cannot test {} in {}",
            type_name(n),
            type_name(h)
        ))),
    }
}

fn binary(op: &BinaryOp, left: &Value, right: &Value) -> Result<Value> {
    let value = match op {
        BinaryOp::Eq => Value::Bool(values_equal(left, right)),
        BinaryOp::Ne => Value::Bool(!values_equal(left, right)),
        BinaryOp::Lt => Value::Bool(compare(left, right)? == Ordering::Less),
        BinaryOp::Le => Value::Bool(compare(left, right)? != Ordering::Greater),
        BinaryOp::Gt => Value::Bool(compare(left, right)? == Ordering::Greater),
        BinaryOp::Ge => Value::Bool(compare(left, right)? != Ordering::Less),
        BinaryOp::In => Value::Bool(contains(right, left)?),
        BinaryOp::NotIn => Value::Bool(!contains(right, left)?),
        BinaryOp::Add => add(left, right)?,
        BinaryOp::Sub => subtract(left, right)?,
    };
    Ok(value)
}

fn add(left: &Value, right: &Value) -> Result<Value> {
    match (left, right) {
        (Value::Number(x), Value::Number(y)) => {
            if let Some(sum) = x.as_i64().zip(y.as_i64()).and_then(|(x, y)| x.checked_add(y)) {
                return Ok(Value::from(sum));
            }
            Ok(Value::from(
                x.as_f64().unwrap_or_default() + y.as_f64().unwrap_or_default(),
            ))
        }
        (Value::String(x), Value::String(y)) => Ok(Value::String(format!("{x}{y}"))),
        (Value::Array(x), Value::Array(y)) => {
            Ok(Value::Array(x.iter().chain(y.iter()).cloned().collect()))
        }
        (x, y) => Err(type_error(format!(
            "cannot add {} and {}",
            type_name(x),
            type_name(y)
        ))),
    }
}

fn subtract(left: &Value, right: &Value) -> Result<Value> {
    match (left, right) {
        (Value::Number(x), Value::Number(y)) => {
            if let Some(diff) = x.as_i64().zip(y.as_i64()).and_then(|(x, y)| x.checked_sub(y)) {
                return Ok(Value::from(diff));
            }
            Ok(Value::from(
                x.as_f64().unwrap_or_default() - y.as_f64().unwrap_or_default(),
            ))
        }
        (x, y) => Err(type_error(format!(
            "cannot subtract {} from {}",
            type_name(y),
            type_name(x)
        ))),
    }
}

fn apply_filter(name: &str, input: Value, args: &[Value]) -> Result<Value> {
    let value = match name {
        "default" => {
            if input.is_null() {
                args.first().cloned().unwrap_or(Value::Null)
            } else {
                input
            }
        }
        "length" | "count" => {
            let len = match &input {
                Value::String(s) => s.chars().count(),
                Value::Array(a) => a.len(),
                Value::Object(o) => o.len(),
                other => {
                    return Err(type_error(format!("{} has no length", type_name(other))))
                }
            };
            Value::from(len)
        }
        "lower" => Value::String(to_display(&input).to_lowercase()),
        "upper" => Value::String(to_display(&input).to_uppercase()),
        "trim" => Value::String(to_display(&input).trim().to_string()),
        "string" => Value::String(to_display(&input)),
        "int" => {
            let parsed = match &input {
                Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
                Value::String(s) => s.trim().parse::<i64>().ok(),
                Value::Bool(b) => Some(i64::from(*b)),
                _ => None,
            };
            Value::from(parsed.ok_or_else(|| {
                type_error(format!("cannot convert {} to int", type_name(&input)))
            })?)
        }
        "join" => {
            let separator = args.first().map(to_display).unwrap_or_default();
            match &input {
                Value::Array(items) => Value::String(
                    items
                        .iter()
                        .map(to_display)
                        .collect::<Vec<_>>()
                        .join(&separator),
                ),
                other => return Err(type_error(format!("cannot join {}", type_name(other)))),
            }
        }
        "first" | "last" => match &input {
            Value::Array(items) => {
                let picked = if name == "first" {
                    items.first()
                } else {
                    items.last()
                };
                picked.cloned().unwrap_or(Value::Null)
            }
            other => {
                return Err(type_error(format!("{name} needs a sequence, got {}", type_name(other))))
            }
        },
        _ => {
            return Err(RenderError::UnknownFilter {
                name: name.to_string(),
            })
        }
    };
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::parser::parse;
    use serde_json::json;

    fn eval(source: &str, ctx: &VarsMap) -> Result<Value> {
        evaluate(&parse(source).unwrap(), ctx)
    }

    fn context() -> VarsMap {
        let mut ctx = VarsMap::new();
        ctx.insert("r".into(), json!({"status": "changed", "output": {"rc": 0}}));
        ctx.insert("xs".into(), json!(["a", "b", "c"]));
        ctx.insert("n".into(), json!(3));
        ctx.insert("name".into(), json!("  Web  "));
        ctx
    }

    #[test]
    fn test_arithmetic_and_comparison() {
        let ctx = context();
        assert_eq!(eval("1 == 2", &ctx).unwrap(), json!(false));
        assert_eq!(eval("n >= 3 and n < 4", &ctx).unwrap(), json!(true));
        assert_eq!(eval("n + 1", &ctx).unwrap(), json!(4));
        assert_eq!(eval("1 == 1.0", &ctx).unwrap(), json!(true));
        assert_eq!(eval("-n", &ctx).unwrap(), json!(-3));
        assert!(matches!(
            eval("-(0 - 9223372036854775807 - 1)", &ctx),
            Err(RenderError::Type { .. })
        ));
    }

    #[test]
    fn test_access() {
        let ctx = context();
        assert_eq!(eval("r.status", &ctx).unwrap(), json!("changed"));
        assert_eq!(eval("r['output'].rc", &ctx).unwrap(), json!(0));
        assert_eq!(eval("r.missing", &ctx).unwrap(), Value::Null);
        assert_eq!(eval("r.missing.deeper", &ctx).unwrap(), Value::Null);
        assert_eq!(eval("xs[-1]", &ctx).unwrap(), json!("c"));
        assert_eq!(eval("xs.0", &ctx).unwrap(), json!("a"));
        assert!(matches!(
            eval("undefined_thing", &ctx),
            Err(RenderError::Undefined { .. })
        ));
        assert!(matches!(eval("n.field", &ctx), Err(RenderError::Type { .. })));
    }

    #[test]
    fn test_membership_and_boolean_logic() {
        let ctx = context();
        assert_eq!(eval("'b' in xs", &ctx).unwrap(), json!(true));
        assert_eq!(eval("'z' not in xs", &ctx).unwrap(), json!(true));
        assert_eq!(eval("'status' in r", &ctx).unwrap(), json!(true));
        assert_eq!(eval("not (r.status == 'ok')", &ctx).unwrap(), json!(true));
        assert_eq!(eval("r.nope or 'fallback'", &ctx).unwrap(), json!("fallback"));
    }

    #[test]
    fn test_filters() {
        let ctx = context();
        assert_eq!(eval("xs | length", &ctx).unwrap(), json!(3));
        assert_eq!(eval("xs | join(',')", &ctx).unwrap(), json!("a,b,c"));
        assert_eq!(eval("name | trim | lower", &ctx).unwrap(), json!("web"));
        assert_eq!(eval("missing | default('x')", &ctx).unwrap(), json!("x"));
        assert_eq!(eval("'42' | int", &ctx).unwrap(), json!(42));
        assert!(matches!(
            eval("xs | explode", &ctx),
            Err(RenderError::UnknownFilter { .. })
        ));
    }

    #[test]
    fn test_display() {
        assert_eq!(to_display(&json!(true)), "True");
        assert_eq!(to_display(&json!(false)), "False");
        assert_eq!(to_display(&Value::Null), "");
        assert_eq!(to_display(&json!(7)), "7");
        assert_eq!(to_display(&json!(["a"])), "[\"a\"]");
    }
}
