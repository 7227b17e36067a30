use anyhow::Result;
use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};

use crate::models::citation::Citation;
use crate::models::message::Message;
use crate::models::reply::Usage;

/// Fixed capability set a session is created with
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    /// Let the model ground replies with web search and report the sources
    pub search_grounding: bool,
}

impl Capabilities {
    pub fn with_search_grounding(search_grounding: bool) -> Self {
        Self { search_grounding }
    }
}

/// A whole response as returned by the model
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderReply {
    pub message: Message,
    pub citations: Vec<Citation>,
    pub usage: Usage,
}

/// Base trait for hosted chat models
#[async_trait]
pub trait Provider: Send + Sync {
    /// Generate the next model turn in one payload
    async fn complete(
        &self,
        system: &str,
        messages: &[Message],
        capabilities: &Capabilities,
    ) -> Result<ProviderReply>;

    /// Generate the next model turn as ordered text fragments
    async fn stream(
        &self,
        system: &str,
        messages: &[Message],
        capabilities: &Capabilities,
    ) -> Result<BoxStream<'static, Result<String>>>;
}
