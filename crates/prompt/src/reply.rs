//! Strict parsing of the model's JSON reply.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ReplyError {
    #[error("Reply is not a JSON object: {0}")]
    NotJson(String),
    #[error("Missing field: {0}")]
    MissingField(&'static str),
    #[error("Invalid field {field}: {reason}")]
    InvalidField { field: &'static str, reason: String },
}

/// The reply shape the prompt asks for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelReply {
    pub generated_name: String,
    pub generated_confidence: u8,
    pub generated_reasoning: String,
    pub fallback_confidence: u8,
    pub fallback_reasoning: String,
    pub flags: Vec<String>,
}

/// Parse and validate a raw completion.
///
/// Markdown code fences and prose around the object are tolerated; anything
/// else that deviates from the requested shape is an error.
pub fn parse_reply(raw: &str) -> Result<ModelReply, ReplyError> {
    let body = extract_object(raw);
    let value: Value = serde_json::from_str(body).map_err(|e| ReplyError::NotJson(e.to_string()))?;
    let Value::Object(obj) = value else {
        return Err(ReplyError::NotJson("top-level value is not an object".to_string()));
    };

    Ok(ModelReply {
        generated_name: text_field(&obj, "generated_name")?,
        generated_confidence: confidence_field(&obj, "generated_confidence")?,
        generated_reasoning: text_field(&obj, "generated_reasoning")?,
        fallback_confidence: confidence_field(&obj, "fallback_confidence")?,
        fallback_reasoning: text_field(&obj, "fallback_reasoning")?,
        flags: flags_field(&obj)?,
    })
}

fn extract_object(raw: &str) -> &str {
    let trimmed = raw.trim();
    match (trimmed.find('{'), trimmed.rfind('}')) {
        (Some(start), Some(end)) if start < end => &trimmed[start..=end],
        _ => trimmed,
    }
}

fn text_field(obj: &Map<String, Value>, field: &'static str) -> Result<String, ReplyError> {
    match obj.get(field) {
        None | Some(Value::Null) => Err(ReplyError::MissingField(field)),
        Some(Value::String(s)) if !s.trim().is_empty() => Ok(s.trim().to_string()),
        Some(Value::String(_)) => Err(ReplyError::InvalidField {
            field,
            reason: "empty string".to_string(),
        }),
        Some(other) => Err(ReplyError::InvalidField {
            field,
            reason: format!("expected string, got {other}"),
        }),
    }
}

fn confidence_field(obj: &Map<String, Value>, field: &'static str) -> Result<u8, ReplyError> {
    let value = obj.get(field).ok_or(ReplyError::MissingField(field))?;
    let number = value.as_f64().ok_or_else(|| ReplyError::InvalidField {
        field,
        reason: format!("expected number, got {value}"),
    })?;
    if !(0.0..=100.0).contains(&number) {
        return Err(ReplyError::InvalidField {
            field,
            reason: format!("{number} outside 0-100"),
        });
    }
    Ok(number.round() as u8)
}

fn flags_field(obj: &Map<String, Value>) -> Result<Vec<String>, ReplyError> {
    let field = "flags";
    let items = match obj.get(field) {
        None => return Err(ReplyError::MissingField(field)),
        Some(Value::Array(items)) => items,
        Some(other) => {
            return Err(ReplyError::InvalidField {
                field,
                reason: format!("expected array, got {other}"),
            })
        }
    };
    items
        .iter()
        .map(|item| match item {
            Value::String(s) => Ok(s.clone()),
            other => Err(ReplyError::InvalidField {
                field,
                reason: format!("expected string item, got {other}"),
            }),
        })
        .collect()
}
