use anyhow::{anyhow, Result};
use async_trait::async_trait;
use futures::stream::{BoxStream, StreamExt};
use reqwest::{Client, Response, StatusCode};
use serde_json::{json, Value};
use std::time::Duration;

use super::base::{Capabilities, Provider, ProviderReply};
use super::configs::GeminiProviderConfig;
use super::utils::{
    candidate_finish_reason, candidate_text, capabilities_to_gemini_tools, check_gemini_error,
    gemini_response_to_message, get_usage, grounding_citations, messages_to_gemini_contents,
    no_text_error, SseFrameParser,
};
use crate::models::message::Message;

pub struct GeminiProvider {
    client: Client,
    config: GeminiProviderConfig,
}

impl GeminiProvider {
    pub fn new(config: GeminiProviderConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(600)) // 10 minutes timeout
            .build()?;

        Ok(Self { client, config })
    }

    fn build_payload(
        &self,
        system: &str,
        messages: &[Message],
        capabilities: &Capabilities,
    ) -> Value {
        let mut payload = json!({
            "contents": messages_to_gemini_contents(messages),
        });

        if !system.is_empty() {
            payload["systemInstruction"] = json!({ "parts": [{ "text": system }] });
        }

        let tools = capabilities_to_gemini_tools(capabilities);
        if !tools.is_empty() {
            payload["tools"] = json!(tools);
        }

        let mut generation_config = serde_json::Map::new();
        if let Some(temp) = self.config.temperature {
            generation_config.insert("temperature".to_string(), json!(temp));
        }
        if let Some(tokens) = self.config.max_tokens {
            generation_config.insert("maxOutputTokens".to_string(), json!(tokens));
        }
        if !generation_config.is_empty() {
            payload["generationConfig"] = Value::Object(generation_config);
        }

        payload
    }

    async fn post(&self, action: &str, query: &[(&str, &str)], payload: Value) -> Result<Response> {
        let url = format!(
            "{}/v1beta/models/{}:{}",
            self.config.host.trim_end_matches('/'),
            self.config.model,
            action
        );

        tracing::debug!(model = %self.config.model, action, "sending request to Gemini");

        let response = self
            .client
            .post(&url)
            .query(query)
            .header("x-goog-api-key", &self.config.api_key)
            .json(&payload)
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => Ok(response),
            status if status == StatusCode::TOO_MANY_REQUESTS || status.as_u16() >= 500 => {
                Err(anyhow!("Server error: {}", status))
            }
            status => {
                let error_text = response.text().await.unwrap_or_default();
                Err(anyhow!("Request failed: {} - {}", status, error_text))
            }
        }
    }
}

#[async_trait]
impl Provider for GeminiProvider {
    async fn complete(
        &self,
        system: &str,
        messages: &[Message],
        capabilities: &Capabilities,
    ) -> Result<ProviderReply> {
        let payload = self.build_payload(system, messages, capabilities);
        let response: Value = self.post("generateContent", &[], payload).await?.json().await?;

        let message = gemini_response_to_message(&response)?;
        let citations = grounding_citations(&response);
        let usage = get_usage(&response);
        tracing::debug!(citations = citations.len(), "received complete reply");

        Ok(ProviderReply {
            message,
            citations,
            usage,
        })
    }

    async fn stream(
        &self,
        system: &str,
        messages: &[Message],
        capabilities: &Capabilities,
    ) -> Result<BoxStream<'static, Result<String>>> {
        let payload = self.build_payload(system, messages, capabilities);
        let response = self
            .post("streamGenerateContent", &[("alt", "sse")], payload)
            .await?;
        let mut body = response.bytes_stream();

        Ok(Box::pin(async_stream::try_stream! {
            let mut parser = SseFrameParser::default();
            let mut state = StreamState::default();

            while let Some(chunk) = body.next().await {
                let chunk = chunk.map_err(anyhow::Error::from)?;
                for payload in parser.feed(&chunk) {
                    if let Some(fragment) = state.accept(&payload)? {
                        yield fragment;
                    }
                }
            }

            if let Some(payload) = parser.finish() {
                if let Some(fragment) = state.accept(&payload)? {
                    yield fragment;
                }
            }

            // A reply that never produced text failed, same as in complete mode
            if !state.received_text {
                Err::<(), _>(no_text_error(state.finish_reason.as_deref()))?;
            }
        }))
    }
}

#[derive(Default)]
struct StreamState {
    received_text: bool,
    finish_reason: Option<String>,
}

impl StreamState {
    /// Text carried by one streamed chunk. Chunks with no text, such as the
    /// closing chunk that only reports usage, yield nothing.
    fn accept(&mut self, payload: &str) -> Result<Option<String>> {
        let value: Value = serde_json::from_str(payload)?;
        check_gemini_error(&value)?;

        if let Some(reason) = candidate_finish_reason(&value) {
            self.finish_reason = Some(reason.to_string());
        }
        let text = candidate_text(&value).filter(|text| !text.is_empty());
        if text.is_some() {
            self.received_text = true;
        }
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::citation::Citation;
    use wiremock::matchers::{body_partial_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const GENERATE_PATH: &str = "/v1beta/models/gemini-2.5-flash:generateContent";
    const STREAM_PATH: &str = "/v1beta/models/gemini-2.5-flash:streamGenerateContent";

    fn provider_for(server: &MockServer) -> GeminiProvider {
        let config = GeminiProviderConfig {
            host: server.uri(),
            api_key: "test_api_key".to_string(),
            model: "gemini-2.5-flash".to_string(),
            temperature: None,
            max_tokens: Some(512),
        };
        GeminiProvider::new(config).unwrap()
    }

    #[tokio::test]
    async fn test_complete_basic() -> Result<()> {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(GENERATE_PATH))
            .and(header("x-goog-api-key", "test_api_key"))
            .and(body_partial_json(json!({
                "systemInstruction": { "parts": [{ "text": "You are Yia Mas Bot." }] },
                "contents": [{ "role": "user", "parts": [{ "text": "Hello?" }] }],
                "tools": [{ "googleSearch": {} }],
                "generationConfig": { "maxOutputTokens": 512 }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{
                    "content": { "role": "model", "parts": [{ "text": "Opa! Let's get you some food!" }] },
                    "finishReason": "STOP",
                    "groundingMetadata": {
                        "groundingChunks": [
                            { "web": { "uri": "https://example.com", "title": "Menu" } },
                            { "web": { "title": "No link" } }
                        ]
                    }
                }],
                "usageMetadata": {
                    "promptTokenCount": 12,
                    "candidatesTokenCount": 15,
                    "totalTokenCount": 27
                }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let provider = provider_for(&server);
        let messages = vec![Message::user().with_text("Hello?")];
        let reply = provider
            .complete(
                "You are Yia Mas Bot.",
                &messages,
                &Capabilities::with_search_grounding(true),
            )
            .await?;

        assert_eq!(reply.message.text, "Opa! Let's get you some food!");
        assert_eq!(
            reply.citations,
            vec![Citation::new("https://example.com", Some("Menu".to_string()))]
        );
        assert_eq!(reply.usage.total_tokens, Some(27));

        Ok(())
    }

    #[tokio::test]
    async fn test_complete_server_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(GENERATE_PATH))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let provider = provider_for(&server);
        let err = provider
            .complete("", &[Message::user().with_text("Hi")], &Capabilities::default())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("503"));
    }

    #[tokio::test]
    async fn test_complete_client_error_includes_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(GENERATE_PATH))
            .respond_with(ResponseTemplate::new(400).set_body_string("API key not valid"))
            .mount(&server)
            .await;

        let provider = provider_for(&server);
        let err = provider
            .complete("", &[Message::user().with_text("Hi")], &Capabilities::default())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("API key not valid"));
    }

    #[tokio::test]
    async fn test_stream_fragments_in_order() -> Result<()> {
        let server = MockServer::start().await;
        let body = concat!(
            "data: {\"candidates\":[{\"content\":{\"role\":\"model\",\"parts\":[{\"text\":\"Opa! \"}]}}]}\r\n\r\n",
            "data: {\"candidates\":[{\"content\":{\"role\":\"model\",\"parts\":[{\"text\":\"Get the \"}]}}]}\r\n\r\n",
            "data: {\"candidates\":[{\"content\":{\"role\":\"model\",\"parts\":[{\"text\":\"saganaki.\"}]},\"finishReason\":\"STOP\"}]}\r\n\r\n",
            "data: {\"usageMetadata\":{\"totalTokenCount\":9}}\r\n\r\n",
        );
        Mock::given(method("POST"))
            .and(path(STREAM_PATH))
            .and(query_param("alt", "sse"))
            .and(header("x-goog-api-key", "test_api_key"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/event-stream")
                    .set_body_string(body),
            )
            .mount(&server)
            .await;

        let provider = provider_for(&server);
        let stream = provider
            .stream("", &[Message::user().with_text("Hi")], &Capabilities::default())
            .await?;
        let fragments: Vec<String> = stream.map(|f| f.unwrap()).collect().await;

        assert_eq!(fragments, vec!["Opa! ", "Get the ", "saganaki."]);
        Ok(())
    }

    #[tokio::test]
    async fn test_stream_error_chunk() -> Result<()> {
        let server = MockServer::start().await;
        let body = concat!(
            "data: {\"candidates\":[{\"content\":{\"parts\":[{\"text\":\"Opa\"}]}}]}\n\n",
            "data: {\"error\":{\"message\":\"Backend overloaded\"}}\n\n",
        );
        Mock::given(method("POST"))
            .and(path(STREAM_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(&server)
            .await;

        let provider = provider_for(&server);
        let mut stream = provider
            .stream("", &[Message::user().with_text("Hi")], &Capabilities::default())
            .await?;

        assert_eq!(stream.next().await.unwrap()?, "Opa");
        let err = stream.next().await.unwrap().unwrap_err();
        assert!(err.to_string().contains("Backend overloaded"));
        assert!(stream.next().await.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_stream_without_text_is_an_error() -> Result<()> {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(STREAM_PATH))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("data: {\"candidates\":[{\"finishReason\":\"SAFETY\"}]}\n\n"),
            )
            .mount(&server)
            .await;

        let provider = provider_for(&server);
        let mut stream = provider
            .stream("", &[Message::user().with_text("Hi")], &Capabilities::default())
            .await?;

        let err = stream.next().await.unwrap().unwrap_err();
        assert!(err.to_string().contains("SAFETY"));
        assert!(stream.next().await.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_stream_empty_body_is_an_error() -> Result<()> {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(STREAM_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_string(""))
            .mount(&server)
            .await;

        let provider = provider_for(&server);
        let mut stream = provider
            .stream("", &[Message::user().with_text("Hi")], &Capabilities::default())
            .await?;

        let err = stream.next().await.unwrap().unwrap_err();
        assert!(err.to_string().contains("UNKNOWN"));
        Ok(())
    }
}
