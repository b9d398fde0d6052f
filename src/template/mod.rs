//! A small `{{ expr }}` templating dialect over JSON values.
//!
//! Expressions support literals, dotted and indexed access, comparison,
//! `in`/`not in`, `and`/`or`/`not`, `+`/`-` and a handful of filters
//! (`default`, `length`, `lower`, `upper`, `trim`, `join`, `string`, `int`,
//! `first`, `last`). There is no statement syntax and nothing executes code.

pub mod error;
pub mod eval;
pub mod lexer;
pub mod parser;

pub use error::*;
pub use eval::{is_truthy, to_display, type_name};

use crate::modules::Params;
use crate::types::VarsMap;
use serde_json::Value;

const OPEN: &str = "{{";
const CLOSE: &str = "}}";

#[derive(Debug, Clone, PartialEq)]
enum Segment<'a> {
    Text(&'a str),
    Expr(&'a str),
}

/// Whether a string carries any template delimiters.
pub fn is_templated(text: &str) -> bool {
    text.contains(OPEN) || text.contains(CLOSE)
}

/// Render to a string. Values are interpolated with [`to_display`].
pub fn render_str(template: &str, ctx: &VarsMap) -> Result<String> {
    let mut out = String::with_capacity(template.len());
    for segment in split(template)? {
        match segment {
            Segment::Text(text) => out.push_str(text),
            Segment::Expr(source) => out.push_str(&to_display(&evaluate_source(source, ctx)?)),
        }
    }
    Ok(out)
}

/// Render keeping types when the template is exactly one `{{ expr }}`.
pub fn render_value(template: &str, ctx: &VarsMap) -> Result<Value> {
    let segments = split(template)?;
    if let [Segment::Expr(source)] = segments.as_slice() {
        return evaluate_source(source, ctx);
    }

    let mut out = String::with_capacity(template.len());
    for segment in segments {
        match segment {
            Segment::Text(text) => out.push_str(text),
            Segment::Expr(source) => out.push_str(&to_display(&evaluate_source(source, ctx)?)),
        }
    }
    Ok(Value::String(out))
}

/// Render every string inside a JSON value, recursing into sequences and mappings.
pub fn render_json(value: &Value, ctx: &VarsMap) -> Result<Value> {
    match value {
        Value::String(s) if is_templated(s) => render_value(s, ctx),
        Value::Array(items) => items
            .iter()
            .map(|v| render_json(v, ctx))
            .collect::<Result<Vec<_>>>()
            .map(Value::Array),
        Value::Object(map) => {
            let mut rendered = serde_json::Map::with_capacity(map.len());
            for (key, v) in map {
                rendered.insert(key.clone(), render_json(v, ctx)?);
            }
            Ok(Value::Object(rendered))
        }
        other => Ok(other.clone()),
    }
}

pub fn render_params(params: &Params, ctx: &VarsMap) -> Result<Params> {
    params
        .iter()
        .map(|(k, v)| Ok((k.clone(), render_json(v, ctx)?)))
        .collect()
}

/// Interpret a rendered `when`: only the literals `True` and `False` are allowed.
pub fn parse_when(rendered: &str) -> Result<bool> {
    match rendered.trim() {
        "True" => Ok(true),
        "False" => Ok(false),
        other => Err(RenderError::InvalidWhen {
            value: other.to_string(),
        }),
    }
}

/// The inner expression when `template` is exactly one `{{ expr }}` block.
pub fn single_expression(template: &str) -> Option<&str> {
    match split(template.trim()).ok()?.as_slice() {
        [Segment::Expr(source)] => Some(source.trim()),
        _ => None,
    }
}

fn evaluate_source(source: &str, ctx: &VarsMap) -> Result<Value> {
    let expr = parser::parse(source.trim())?;
    eval::evaluate(&expr, ctx)
}

/// Split a template into literal text and expression sources.
fn split(template: &str) -> Result<Vec<Segment<'_>>> {
    let unbalanced = || RenderError::Unbalanced {
        template: template.to_string(),
    };

    let mut segments = Vec::new();
    let mut rest = template;

    loop {
        let open = rest.find(OPEN);
        let close = rest.find(CLOSE);
        let start = match (open, close) {
            (None, None) => {
                if !rest.is_empty() {
                    segments.push(Segment::Text(rest));
                }
                return Ok(segments);
            }
            (None, Some(_)) => return Err(unbalanced()),
            (Some(o), Some(c)) if c < o => return Err(unbalanced()),
            (Some(o), _) => o,
        };

        if start > 0 {
            segments.push(Segment::Text(&rest[..start]));
        }
        let body = &rest[start + OPEN.len()..];
        let end = find_close(body).map_err(|nested| {
            if nested {
                RenderError::Nested {
                    template: template.to_string(),
                }
            } else {
                unbalanced()
            }
        })?;
        segments.push(Segment::Expr(&body[..end]));
        rest = &body[end + CLOSE.len()..];
    }
}

/// Byte offset of the `}}` closing `body`, skipping quoted text.
/// `Err(true)` means another `{{` opened first, `Err(false)` that none closed.
fn find_close(body: &str) -> std::result::Result<usize, bool> {
    let bytes = body.as_bytes();
    let mut quote: Option<u8> = None;
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];
        match quote {
            Some(q) if b == q => quote = None,
            Some(_) => {}
            None if b == b'\'' || b == b'"' => quote = Some(b),
            None if bytes[i..].starts_with(OPEN.as_bytes()) => return Err(true),
            None if bytes[i..].starts_with(CLOSE.as_bytes()) => return Ok(i),
            None => {}
        }
        i += 1;
    }

    Err(false)
}
