//! Conversion between expression trees and the API's nested JSON form.
//!
//! A comparison is a `TAG_FILTER` node; a group is an `EXPRESSION` node with
//! a `logicalOperator` and `elements`.

use serde_json::{json, Map, Value};

use super::parser::{parse, MAX_NESTING};
use super::{Comparison, EntityOrigin, Expression, Operator, TagValue};
use crate::error::ProviderError;

const TYPE_TAG_FILTER: &str = "TAG_FILTER";
const TYPE_EXPRESSION: &str = "EXPRESSION";

/// Convert an expression tree into its wire form.
pub fn to_wire(expression: &Expression) -> Value {
    match expression {
        Expression::Comparison(comparison) => comparison_to_wire(comparison),
        Expression::And(operands) => group_to_wire("AND", operands),
        Expression::Or(operands) => group_to_wire("OR", operands),
    }
}

fn group_to_wire(operator: &str, operands: &[Expression]) -> Value {
    json!({
        "type": TYPE_EXPRESSION,
        "logicalOperator": operator,
        "elements": operands.iter().map(to_wire).collect::<Vec<_>>(),
    })
}

fn comparison_to_wire(comparison: &Comparison) -> Value {
    let mut node = Map::new();
    node.insert("type".into(), json!(TYPE_TAG_FILTER));
    node.insert("name".into(), json!(comparison.name));
    node.insert("entity".into(), json!(comparison.entity.wire_name()));
    node.insert("operator".into(), json!(comparison.operator.as_str()));

    match (&comparison.key, &comparison.value) {
        (Some(key), Some(TagValue::String(value))) => {
            node.insert("key".into(), json!(key));
            node.insert("value".into(), json!(value));
            node.insert("stringValue".into(), json!(format!("{}={}", key, value)));
        },
        (key, value) => {
            if let Some(key) = key {
                node.insert("key".into(), json!(key));
            }
            match value {
                Some(TagValue::String(text)) => {
                    node.insert("stringValue".into(), json!(text));
                    node.insert("value".into(), json!(text));
                },
                Some(TagValue::Number(number)) => {
                    node.insert("numberValue".into(), json!(number));
                },
                Some(TagValue::Bool(flag)) => {
                    node.insert("booleanValue".into(), json!(flag));
                },
                None => {},
            }
        },
    }
    Value::Object(node)
}

/// Convert a wire filter into an expression tree.
///
/// `null` and groups without elements map to `None`. Unknown node types,
/// missing fields and nesting deeper than the parser accepts fail with
/// [`ProviderError::Decode`].
pub fn from_wire(wire: &Value) -> Result<Option<Expression>, ProviderError> {
    node_from_wire(wire, 0)
}

fn node_from_wire(node: &Value, depth: usize) -> Result<Option<Expression>, ProviderError> {
    if node.is_null() {
        return Ok(None);
    }
    if depth > MAX_NESTING {
        return Err(ProviderError::Decode(format!(
            "tag filter nesting exceeds {} levels",
            MAX_NESTING
        )));
    }
    let object = node
        .as_object()
        .ok_or_else(|| decode_error("tag filter node must be an object", node))?;

    match object.get("type").and_then(Value::as_str) {
        Some(TYPE_TAG_FILTER) => comparison_from_wire(object, node).map(|c| Some(Expression::Comparison(c))),
        Some(TYPE_EXPRESSION) => {
            let conjunction = match object.get("logicalOperator").and_then(Value::as_str) {
                Some("AND") => true,
                Some("OR") => false,
                _ => return Err(decode_error("unknown logical operator", node)),
            };
            let elements = match object.get("elements") {
                Some(Value::Array(elements)) => elements.as_slice(),
                None | Some(Value::Null) => &[],
                Some(_) => return Err(decode_error("elements must be a list", node)),
            };
            let mut operands = Vec::with_capacity(elements.len());
            for element in elements {
                if let Some(operand) = node_from_wire(element, depth + 1)? {
                    operands.push(operand);
                }
            }
            if operands.is_empty() {
                return Ok(None);
            }
            Ok(Some(if conjunction {
                Expression::and(operands)
            } else {
                Expression::or(operands)
            }))
        },
        _ => Err(decode_error("unknown tag filter node type", node)),
    }
}

fn comparison_from_wire(object: &Map<String, Value>, node: &Value) -> Result<Comparison, ProviderError> {
    let text = |field: &str| object.get(field).and_then(Value::as_str);

    let name = text("name").ok_or_else(|| decode_error("tag filter without a name", node))?;
    let operator = text("operator")
        .and_then(Operator::parse)
        .ok_or_else(|| decode_error("tag filter without a known operator", node))?;
    let entity = match text("entity") {
        Some(entity) => EntityOrigin::from_wire_name(entity)
            .ok_or_else(|| decode_error("unknown tag filter entity", node))?,
        None => EntityOrigin::NotApplicable,
    };
    let key = text("key").filter(|k| !k.is_empty()).map(str::to_string);

    let value = if operator.is_unary() {
        None
    } else if let Some(key) = &key {
        let value = text("value")
            .map(str::to_string)
            .or_else(|| {
                text("stringValue").map(|s| {
                    s.strip_prefix(&format!("{}=", key))
                        .unwrap_or(s)
                        .to_string()
                })
            })
            .ok_or_else(|| decode_error("tag filter without a value", node))?;
        Some(TagValue::String(value))
    } else if let Some(s) = text("stringValue").or_else(|| text("value")) {
        Some(TagValue::String(s.to_string()))
    } else if let Some(n) = object.get("numberValue").and_then(Value::as_i64) {
        Some(TagValue::Number(n))
    } else if let Some(b) = object.get("booleanValue").and_then(Value::as_bool) {
        Some(TagValue::Bool(b))
    } else {
        return Err(decode_error("tag filter without a value", node));
    };

    let comparison = Comparison {
        name: name.to_string(),
        key,
        entity,
        operator,
        value,
    };
    // State stores text, so the comparison must read back unchanged.
    let expected = Expression::Comparison(comparison.clone());
    if parse(&comparison.to_string()).ok().as_ref() != Some(&expected) {
        return Err(decode_error("tag name or key cannot be written as filter text", node));
    }
    Ok(comparison)
}

fn decode_error(message: &str, node: &Value) -> ProviderError {
    let mut fragment = node.to_string();
    if fragment.len() > 120 {
        let mut end = 120;
        while !fragment.is_char_boundary(end) {
            end -= 1;
        }
        fragment.truncate(end);
        fragment.push_str("...");
    }
    ProviderError::Decode(format!("{}: {}", message, fragment))
}
