use anyhow::{anyhow, Result};
use serde_json::{json, Value};

use super::base::Capabilities;
use crate::models::citation::Citation;
use crate::models::message::Message;
use crate::models::reply::Usage;

/// Convert internal messages to Gemini's `contents` specification
pub fn messages_to_gemini_contents(messages: &[Message]) -> Vec<Value> {
    messages
        .iter()
        .filter(|message| !message.text.is_empty())
        .map(|message| {
            json!({
                "role": message.role.as_str(),
                "parts": [{ "text": message.text }]
            })
        })
        .collect()
}

/// Convert the session capabilities to Gemini's `tools` specification
pub fn capabilities_to_gemini_tools(capabilities: &Capabilities) -> Vec<Value> {
    let mut tools = Vec::new();
    if capabilities.search_grounding {
        tools.push(json!({ "googleSearch": {} }));
    }
    tools
}

/// Raise the error object or block reason carried by a response body, if any
pub fn check_gemini_error(response: &Value) -> Result<()> {
    if let Some(error) = response.get("error") {
        let message = error
            .get("message")
            .and_then(|m| m.as_str())
            .map(String::from)
            .unwrap_or_else(|| error.to_string());
        return Err(anyhow!("Gemini API error: {}", message));
    }

    if let Some(reason) = response
        .get("promptFeedback")
        .and_then(|f| f.get("blockReason"))
        .and_then(|r| r.as_str())
    {
        return Err(anyhow!("Prompt blocked: {}", reason));
    }

    Ok(())
}

fn first_candidate(response: &Value) -> Option<&Value> {
    response
        .get("candidates")
        .and_then(|c| c.as_array())
        .and_then(|c| c.first())
}

/// Concatenate the text parts of the first candidate, skipping thought parts
pub fn candidate_text(response: &Value) -> Option<String> {
    let parts = first_candidate(response)?
        .get("content")?
        .get("parts")?
        .as_array()?;

    let texts: Vec<&str> = parts
        .iter()
        .filter(|part| !part.get("thought").and_then(|t| t.as_bool()).unwrap_or(false))
        .filter_map(|part| part.get("text").and_then(|t| t.as_str()))
        .collect();

    if texts.is_empty() {
        None
    } else {
        Some(texts.concat())
    }
}

/// Why the first candidate stopped, when the response says
pub fn candidate_finish_reason(response: &Value) -> Option<&str> {
    first_candidate(response)?
        .get("finishReason")
        .and_then(|r| r.as_str())
}

pub fn no_text_error(finish_reason: Option<&str>) -> anyhow::Error {
    anyhow!(
        "Model returned no text (finish reason: {})",
        finish_reason.unwrap_or("UNKNOWN")
    )
}

/// Convert a whole `generateContent` response to a model message
pub fn gemini_response_to_message(response: &Value) -> Result<Message> {
    check_gemini_error(response)?;

    if first_candidate(response).is_none() {
        return Err(anyhow!("No candidates in response"));
    }

    match candidate_text(response) {
        Some(text) => Ok(Message::model().with_text(text)),
        None => Err(no_text_error(candidate_finish_reason(response))),
    }
}

/// Web sources from the grounding metadata of the first candidate.
/// Chunks without a usable link are dropped; order is preserved.
pub fn grounding_citations(response: &Value) -> Vec<Citation> {
    let chunks = match first_candidate(response)
        .and_then(|c| c.get("groundingMetadata"))
        .and_then(|m| m.get("groundingChunks"))
        .and_then(|c| c.as_array())
    {
        Some(chunks) => chunks,
        None => return Vec::new(),
    };

    chunks
        .iter()
        .filter_map(|chunk| chunk.get("web"))
        .filter_map(|web| {
            let uri = web.get("uri").and_then(|u| u.as_str())?.trim();
            if uri.is_empty() {
                return None;
            }
            let title = web
                .get("title")
                .and_then(|t| t.as_str())
                .map(String::from);
            Some(Citation::new(uri, title))
        })
        .collect()
}

pub fn get_usage(response: &Value) -> Usage {
    let usage = match response.get("usageMetadata") {
        Some(usage) => usage,
        None => return Usage::default(),
    };

    let input_tokens = usage
        .get("promptTokenCount")
        .and_then(|v| v.as_i64())
        .map(|v| v as i32);

    let output_tokens = usage
        .get("candidatesTokenCount")
        .and_then(|v| v.as_i64())
        .map(|v| v as i32);

    let total_tokens = usage
        .get("totalTokenCount")
        .and_then(|v| v.as_i64())
        .map(|v| v as i32)
        .or_else(|| match (input_tokens, output_tokens) {
            (Some(input), Some(output)) => Some(input + output),
            _ => None,
        });

    Usage::new(input_tokens, output_tokens, total_tokens)
}

/// Incremental parser for server-sent event bodies.
/// Yields the `data:` payload of each complete frame.
///
/// Bytes are buffered until a frame is complete, so a character split across
/// network chunks is decoded whole.
#[derive(Debug, Default)]
pub struct SseFrameParser {
    buffer: Vec<u8>,
}

impl SseFrameParser {
    /// Feed arbitrary bytes and drain the payloads of complete frames
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<String> {
        // CR only appears in line endings; JSON payloads escape it
        self.buffer
            .extend(bytes.iter().copied().filter(|byte| *byte != b'\r'));

        let mut payloads = Vec::new();
        while let Some(split) = self.buffer.windows(2).position(|w| w == b"\n\n") {
            let frame: Vec<u8> = self.buffer.drain(..split + 2).collect();
            if let Some(payload) = extract_data_payload(&String::from_utf8_lossy(&frame)) {
                payloads.push(payload);
            }
        }
        payloads
    }

    /// Flush a trailing frame the body ended without terminating
    pub fn finish(&mut self) -> Option<String> {
        let frame = std::mem::take(&mut self.buffer);
        extract_data_payload(&String::from_utf8_lossy(&frame))
    }
}

fn extract_data_payload(frame: &str) -> Option<String> {
    let data_lines: Vec<&str> = frame
        .lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .map(|value| value.trim())
        .filter(|value| !value.is_empty())
        .collect();

    if data_lines.is_empty() {
        None
    } else {
        Some(data_lines.join("\n"))
    }
}
