use async_trait::async_trait;
use futures_util::StreamExt;

use crate::errors::{DeskPilotError, DeskPilotResult};
use crate::llm::provider::LlmProvider;
use crate::llm::sse_parser::{self, SseLineBuffer};
use crate::llm::types::{CallConfig, ChatMessage, LlmResponse, StreamChunkKind};

pub struct OpenAiCompatibleProvider {
    id: String,
    endpoint: String,
    api_key: String,
    client: reqwest::Client,
}

impl OpenAiCompatibleProvider {
    pub fn new(id: String, api_base: &str, api_key: String) -> Self {
        Self {
            id,
            endpoint: chat_completions_url(api_base),
            api_key,
            client: reqwest::Client::new(),
        }
    }
}

fn chat_completions_url(api_base: &str) -> String {
    let base = api_base.trim_end_matches('/');
    if base.ends_with("/chat/completions") {
        base.to_string()
    } else {
        format!("{base}/chat/completions")
    }
}

#[async_trait]
impl LlmProvider for OpenAiCompatibleProvider {
    fn name(&self) -> &str {
        &self.id
    }

    async fn chat(&self, messages: Vec<ChatMessage>, cfg: &CallConfig) -> DeskPilotResult<LlmResponse> {
        let mut body = serde_json::json!({
            "model": cfg.model,
            "messages": &messages,
            "stream": cfg.stream,
            "temperature": cfg.temperature,
        });
        if let Some(max_tokens) = cfg.max_tokens {
            body["max_tokens"] = serde_json::json!(max_tokens);
        }

        tracing::debug!(
            provider = %self.id,
            model = %cfg.model,
            stream = cfg.stream,
            "sending LLM request"
        );
        tracing::debug!(
            body = %sanitized_for_log(&body),
            "request body (sanitized, base64 omitted)"
        );

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let err_body = response.text().await.unwrap_or_default();
            return Err(DeskPilotError::LlmProvider(format!("{}: {}", status, err_body)));
        }

        if cfg.stream {
            self.handle_stream(response).await
        } else {
            self.handle_json(response).await
        }
    }
}

impl OpenAiCompatibleProvider {
    /// Accumulates an SSE streaming response into the full reply.
    async fn handle_stream(&self, response: reqwest::Response) -> DeskPilotResult<LlmResponse> {
        let mut byte_stream = response.bytes_stream();
        let mut lines = SseLineBuffer::default();
        let mut resp = LlmResponse::default();
        let mut done = false;

        while let Some(result) = byte_stream.next().await {
            let bytes = result?;
            if lines.push(&bytes).iter().any(|line| apply_sse_line(&mut resp, line)) {
                done = true;
                break;
            }
        }
        if !done {
            if let Some(line) = lines.finish() {
                apply_sse_line(&mut resp, &line);
            }
        }

        tracing::info!(
            provider = %self.id,
            content_len = resp.content.len(),
            "LLM stream complete"
        );
        Ok(resp)
    }

    async fn handle_json(&self, response: reqwest::Response) -> DeskPilotResult<LlmResponse> {
        let json: serde_json::Value = response.json().await?;
        let resp = response_from_json(&json)?;
        tracing::info!(
            provider = %self.id,
            content_len = resp.content.len(),
            "LLM JSON response received"
        );
        Ok(resp)
    }
}

/// Pulls `choices[0].message` out of a non-streaming completion.
fn response_from_json(json: &serde_json::Value) -> DeskPilotResult<LlmResponse> {
    let Some(first) = json["choices"].as_array().and_then(|c| c.first()) else {
        return Err(DeskPilotError::LlmProvider(format!(
            "response contained no choices: {}",
            truncate(&json.to_string(), 500)
        )));
    };
    let message = &first["message"];
    Ok(LlmResponse {
        content: message["content"].as_str().unwrap_or("").to_string(),
    })
}

/// Folds one SSE line into `resp`. Returns true once the stream reports completion.
fn apply_sse_line(resp: &mut LlmResponse, line: &str) -> bool {
    match sse_parser::parse_sse_line(line) {
        Ok(Some(chunk)) => match chunk.kind {
            StreamChunkKind::Content => {
                resp.content.push_str(&chunk.content);
                false
            }
            StreamChunkKind::Done => true,
        },
        Ok(None) => false,
        Err(e) => {
            tracing::debug!("SSE parse skipped: {e}");
            false
        }
    }
}

/// Clone of the request body with image payloads replaced, for debug logging.
fn sanitized_for_log(body: &serde_json::Value) -> String {
    let mut log_body = body.clone();
    if let Some(msgs) = log_body.get_mut("messages").and_then(|m| m.as_array_mut()) {
        for msg in msgs {
            let Some(parts) = msg.get_mut("content").and_then(|c| c.as_array_mut()) else {
                continue;
            };
            for part in parts {
                if part.get("type").and_then(|t| t.as_str()) != Some("image_url") {
                    continue;
                }
                if let Some(url) = part.get_mut("image_url").and_then(|i| i.get_mut("url")) {
                    *url = serde_json::Value::String("<omitted_base64_image>".to_string());
                }
            }
        }
    }
    serde_json::to_string(&log_body).unwrap_or_default()
}

fn truncate(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}…", &s[..idx]),
        None => s.to_string(),
    }
}
