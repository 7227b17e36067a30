use anyhow::{anyhow, Result};
use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

use crate::models::citation::Citation;
use crate::models::message::Message;
use crate::models::reply::Usage;
use crate::providers::base::{Capabilities, Provider, ProviderReply};

/// Scripted outcome of one provider call
#[derive(Debug, Clone)]
pub enum MockResponse {
    Reply {
        body: String,
        citations: Vec<Citation>,
    },
    Fragments(Vec<String>),
    FragmentsThenFailure(Vec<String>, String),
    Failure(String),
}

impl MockResponse {
    pub fn text<S: Into<String>>(body: S) -> Self {
        MockResponse::Reply {
            body: body.into(),
            citations: Vec::new(),
        }
    }

    pub fn fragments(fragments: &[&str]) -> Self {
        MockResponse::Fragments(fragments.iter().map(|f| f.to_string()).collect())
    }
}

/// A mock provider that returns pre-configured responses for testing.
/// Clones share the same script and call log.
#[derive(Clone, Default)]
pub struct MockProvider {
    responses: Arc<Mutex<Vec<MockResponse>>>,
    calls: Arc<AtomicUsize>,
    requests: Arc<Mutex<Vec<Vec<Message>>>>,
    gate: Option<Arc<Notify>>,
}

impl MockProvider {
    /// Create a new mock provider with a sequence of responses
    pub fn new(responses: Vec<MockResponse>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses)),
            ..Default::default()
        }
    }

    /// Hold every call pending until the gate is notified
    pub fn with_gate(mut self, gate: Arc<Notify>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// The conversation each call was made with
    pub fn requests(&self) -> Vec<Vec<Message>> {
        self.requests.lock().unwrap().clone()
    }

    async fn next_response(&self, messages: &[Message]) -> MockResponse {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(messages.to_vec());

        if let Some(gate) = &self.gate {
            gate.notified().await;
        }

        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            MockResponse::text("")
        } else {
            responses.remove(0)
        }
    }
}

#[async_trait]
impl Provider for MockProvider {
    async fn complete(
        &self,
        _system: &str,
        messages: &[Message],
        _capabilities: &Capabilities,
    ) -> Result<ProviderReply> {
        let (body, citations) = match self.next_response(messages).await {
            MockResponse::Reply { body, citations } => (body, citations),
            MockResponse::Fragments(fragments) => (fragments.concat(), Vec::new()),
            MockResponse::FragmentsThenFailure(_, error) | MockResponse::Failure(error) => {
                return Err(anyhow!(error))
            }
        };

        Ok(ProviderReply {
            message: Message::model().with_text(body),
            citations,
            usage: Usage::default(),
        })
    }

    async fn stream(
        &self,
        _system: &str,
        messages: &[Message],
        _capabilities: &Capabilities,
    ) -> Result<BoxStream<'static, Result<String>>> {
        let items: Vec<Result<String>> = match self.next_response(messages).await {
            MockResponse::Reply { body, .. } => vec![Ok(body)],
            MockResponse::Fragments(fragments) => fragments.into_iter().map(Ok).collect(),
            MockResponse::FragmentsThenFailure(fragments, error) => fragments
                .into_iter()
                .map(Ok)
                .chain(std::iter::once(Err(anyhow!(error))))
                .collect(),
            MockResponse::Failure(error) => return Err(anyhow!(error)),
        };

        Ok(stream::iter(items).boxed())
    }
}
