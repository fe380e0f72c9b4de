use crate::constants::limits::ERROR_BODY_PREVIEW_BYTES;
use crate::errors::ToolError;
use crate::services::config::LlmSettings;
use crate::services::graph_client::{build_http_client, parse_error_message};
use crate::services::logger::Logger;
use crate::services::session::ChatMessage;
use futures::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CompletionOptions {
    pub temperature: Option<f64>,
    pub max_tokens: Option<u32>,
}

impl CompletionOptions {
    pub fn temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<Value>,
}

#[derive(Deserialize)]
struct ChatCompletion {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
    refusal: Option<String>,
}

#[derive(Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
}

#[derive(Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: Delta,
}

#[derive(Deserialize, Default)]
struct Delta {
    content: Option<String>,
}

/// OpenAI-compatible chat-completions client.
#[derive(Clone)]
pub struct LlmClient {
    logger: Logger,
    http: Client,
    settings: LlmSettings,
}

impl LlmClient {
    pub fn new(logger: Logger, settings: LlmSettings) -> Result<Self, ToolError> {
        let http = build_http_client(Some(settings.timeout_ms))?;
        Ok(Self {
            logger: logger.child("llm"),
            http,
            settings,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.settings.base_url)
    }

    async fn send(&self, request: &ChatRequest<'_>) -> Result<reqwest::Response, ToolError> {
        let mut builder = self.http.post(self.endpoint()).json(request);
        if !self.settings.api_key.is_empty() {
            builder = builder.bearer_auth(&self.settings.api_key);
        }
        let response = builder.send().await.map_err(map_llm_error)?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let text = response.text().await.unwrap_or_default();
        let message = format!(
            "LLM request failed ({}): {}",
            status.as_u16(),
            parse_error_message(&text, ERROR_BODY_PREVIEW_BYTES)
        );
        self.logger.warn(&message, None);
        Err(match status.as_u16() {
            401 | 403 => ToolError::denied(message).with_hint("Check LLM_API_KEY."),
            404 => ToolError::not_found(message).with_hint("Check LLM_MODEL and LLM_BASE_URL."),
            429 | 500..=599 => ToolError::retryable(message),
            _ => ToolError::upstream(message),
        })
    }

    /// Single non-streaming completion; returns the assistant text.
    pub async fn complete(
        &self,
        messages: &[ChatMessage],
        options: CompletionOptions,
    ) -> Result<String, ToolError> {
        self.complete_with_format(messages, options, None).await
    }

    /// Completion constrained by a strict JSON schema; returns the parsed object.
    pub async fn complete_json_schema(
        &self,
        messages: &[ChatMessage],
        options: CompletionOptions,
        name: &str,
        description: &str,
        schema: &Value,
    ) -> Result<Value, ToolError> {
        let response_format = serde_json::json!({
            "type": "json_schema",
            "json_schema": {
                "name": name,
                "description": description,
                "strict": true,
                "schema": schema,
            }
        });
        let text = self
            .complete_with_format(messages, options, Some(response_format))
            .await?;
        serde_json::from_str(&text).map_err(|err| {
            ToolError::upstream(format!("LLM returned invalid JSON: {}", err))
                .with_details(serde_json::json!({ "content": text }))
        })
    }

    async fn complete_with_format(
        &self,
        messages: &[ChatMessage],
        options: CompletionOptions,
        response_format: Option<Value>,
    ) -> Result<String, ToolError> {
        let request = ChatRequest {
            model: &self.settings.model,
            messages,
            temperature: options.temperature,
            max_tokens: options.max_tokens,
            stream: false,
            response_format,
        };
        self.logger.debug(
            "Chat completion",
            Some(&serde_json::json!({"model": self.settings.model, "messages": messages.len()})),
        );
        let response = self.send(&request).await?;
        let completion: ChatCompletion = response
            .json()
            .await
            .map_err(|err| ToolError::upstream(format!("LLM response invalid: {}", err)))?;
        let message = completion
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message)
            .ok_or_else(|| ToolError::upstream("LLM response has no choices"))?;
        if let Some(refusal) = message.refusal.filter(|r| !r.trim().is_empty()) {
            return Err(ToolError::upstream(format!("LLM refused: {}", refusal)));
        }
        message
            .content
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| ToolError::upstream("LLM response has no content"))
    }

    /// Streams a completion, handing each text delta to `sink`. Returns the full text.
    pub async fn stream_chat<F>(
        &self,
        messages: &[ChatMessage],
        options: CompletionOptions,
        mut sink: F,
    ) -> Result<String, ToolError>
    where
        F: FnMut(&str) + Send,
    {
        let request = ChatRequest {
            model: &self.settings.model,
            messages,
            temperature: options.temperature,
            max_tokens: options.max_tokens,
            stream: true,
            response_format: None,
        };
        let response = self.send(&request).await?;
        let mut stream = response.bytes_stream();
        // Raw bytes: a multi-byte character may straddle two network chunks.
        let mut buffer: Vec<u8> = Vec::new();
        let mut content = String::new();

        'outer: while let Some(chunk) = stream.next().await {
            let bytes = chunk.map_err(map_llm_error)?;
            buffer.extend_from_slice(&bytes);
            while let Some(pos) = buffer.iter().position(|b| *b == b'\n') {
                let line: Vec<u8> = buffer.drain(..=pos).collect();
                match parse_sse_line(decode_line(&line)?)? {
                    SseLine::Done => break 'outer,
                    SseLine::Delta(text) => {
                        sink(&text);
                        content.push_str(&text);
                    }
                    SseLine::Skip => {}
                }
            }
        }
        if let SseLine::Delta(text) = parse_sse_line(decode_line(&buffer)?)? {
            sink(&text);
            content.push_str(&text);
        }
        self.logger.debug(
            "Streamed completion finished",
            Some(&serde_json::json!({"chars": content.chars().count()})),
        );
        Ok(content)
    }
}

#[derive(Debug, PartialEq)]
enum SseLine {
    Delta(String),
    Done,
    Skip,
}

fn decode_line(line: &[u8]) -> Result<&str, ToolError> {
    std::str::from_utf8(line)
        .map_err(|err| ToolError::upstream(format!("Stream chunk is not valid UTF-8: {}", err)))
}

fn parse_sse_line(line: &str) -> Result<SseLine, ToolError> {
    let line = line.trim();
    let Some(payload) = line.strip_prefix("data:") else {
        return Ok(SseLine::Skip);
    };
    let payload = payload.trim();
    if payload.is_empty() {
        return Ok(SseLine::Skip);
    }
    if payload == "[DONE]" {
        return Ok(SseLine::Done);
    }
    let chunk: StreamChunk = serde_json::from_str(payload)
        .map_err(|err| ToolError::upstream(format!("Failed to parse stream chunk: {}", err)))?;
    let text: String = chunk
        .choices
        .into_iter()
        .filter_map(|choice| choice.delta.content)
        .collect();
    if text.is_empty() {
        Ok(SseLine::Skip)
    } else {
        Ok(SseLine::Delta(text))
    }
}

fn map_llm_error(err: reqwest::Error) -> ToolError {
    if err.is_timeout() {
        return ToolError::timeout("LLM request timed out")
            .with_hint("Increase LLM_TIMEOUT_MS or retry.");
    }
    ToolError::retryable(format!("LLM request failed: {}", err))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sse_lines_yield_deltas_and_done() {
        assert_eq!(
            parse_sse_line("data: {\"choices\":[{\"delta\":{\"content\":\"Hel\"}}]}\n").unwrap(),
            SseLine::Delta("Hel".to_string())
        );
        assert_eq!(parse_sse_line("data: [DONE]").unwrap(), SseLine::Done);
        assert_eq!(parse_sse_line(": keep-alive").unwrap(), SseLine::Skip);
        assert_eq!(
            parse_sse_line("data: {\"choices\":[{\"delta\":{\"role\":\"assistant\"}}]}").unwrap(),
            SseLine::Skip
        );
        assert!(parse_sse_line("data: {oops").is_err());
    }

    #[test]
    fn invalid_utf8_lines_are_rejected() {
        assert_eq!(decode_line("data: café\n".as_bytes()).unwrap(), "data: café\n");
        assert!(decode_line(&[b'd', b':', 0xC3]).is_err());
    }

    #[test]
    fn chat_request_omits_unset_fields() {
        let messages = vec![ChatMessage::user("hi")];
        let request = ChatRequest {
            model: "m",
            messages: &messages,
            temperature: None,
            max_tokens: Some(10),
            stream: false,
            response_format: None,
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "model": "m",
                "messages": [{"role": "user", "content": "hi"}],
                "max_tokens": 10
            })
        );
    }
}
