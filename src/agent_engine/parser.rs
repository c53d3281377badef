//! Splits a reasoning-model reply into narrative text and an optional function call.
//!
//! Reply layout:
//!
//! ```text
//! free-form reasoning ... <int_summary>short summary</int_summary>
//! ===FUNCTION===
//! {"function": "computer_click", "parameters": {"elementDescription": "..."}}
//! ```
use std::sync::OnceLock;

use regex::Regex;

use crate::agent_engine::state::FunctionCall;

pub const FUNCTION_MARKER: &str = "===FUNCTION===";

#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// No marker in the reply.
    Absent,
    Call(FunctionCall),
    /// Marker present but the JSON after it did not decode.
    Malformed { error: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedReply {
    /// Summary between `<int_summary>` tags, if the model wrote one.
    pub summary: Option<String>,
    /// Summary if present, otherwise the trimmed text before the marker.
    pub narrative: String,
    pub payload: Payload,
}

impl ParsedReply {
    pub fn call(&self) -> Option<&FunctionCall> {
        match &self.payload {
            Payload::Call(call) => Some(call),
            _ => None,
        }
    }
}

fn summary_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)<int_summary>(.*?)</int_summary>").expect("static regex"))
}

pub fn extract_summary(content: &str) -> Option<String> {
    summary_regex()
        .captures(content)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
}

/// Removes a surrounding markdown code fence such as ```` ```json ... ``` ````.
fn strip_code_fence(payload: &str) -> &str {
    let trimmed = payload.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let body = match rest.find('\n') {
        Some(idx) => &rest[idx + 1..],
        None => rest,
    };
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

pub fn parse_reply(content: &str) -> ParsedReply {
    let mut sections = content.split(FUNCTION_MARKER);
    let before = sections.next().unwrap_or_default();
    let payload_region = sections.next();

    let summary = extract_summary(content);
    let narrative = summary.clone().unwrap_or_else(|| before.trim().to_string());

    let payload = match payload_region {
        None => Payload::Absent,
        Some(region) => match serde_json::from_str::<FunctionCall>(strip_code_fence(region)) {
            Ok(call) => Payload::Call(call),
            Err(e) => {
                tracing::warn!(error = %e, "could not parse function call JSON");
                Payload::Malformed {
                    error: e.to_string(),
                }
            }
        },
    };

    ParsedReply {
        summary,
        narrative,
        payload,
    }
}
