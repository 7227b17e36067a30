use anyhow::Result;
use futures::stream::{BoxStream, StreamExt};
use std::sync::Mutex;

use crate::models::message::Message;
use crate::models::reply::CompleteReply;
use crate::providers::base::{Capabilities, Provider};

/// One live conversation with a hosted model.
///
/// The system instruction and capabilities are fixed at creation. The history
/// grows by one user turn and one model turn per successful exchange and is
/// never truncated; a failed exchange leaves it untouched.
pub struct Session {
    provider: Box<dyn Provider>,
    system_instruction: String,
    capabilities: Capabilities,
    history: Mutex<Vec<Message>>,
}

impl Session {
    pub fn new<S: Into<String>>(
        provider: Box<dyn Provider>,
        system_instruction: S,
        capabilities: Capabilities,
    ) -> Self {
        Self {
            provider,
            system_instruction: system_instruction.into(),
            capabilities,
            history: Mutex::new(Vec::new()),
        }
    }

    pub fn system_instruction(&self) -> &str {
        &self.system_instruction
    }

    pub fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    /// Snapshot of the turns exchanged so far
    pub fn history(&self) -> Vec<Message> {
        self.lock_history().clone()
    }

    fn lock_history(&self) -> std::sync::MutexGuard<'_, Vec<Message>> {
        self.history.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn conversation_with(&self, user: &Message) -> Vec<Message> {
        let mut messages = self.history();
        messages.push(user.clone());
        messages
    }

    fn record_turn(&self, user: Message, model: Message) {
        let mut history = self.lock_history();
        history.push(user);
        history.push(model);
    }

    /// Send one message and wait for the whole reply
    pub async fn send_message(&self, text: &str) -> Result<CompleteReply> {
        let user = Message::user().with_text(text);
        let messages = self.conversation_with(&user);

        let reply = self
            .provider
            .complete(&self.system_instruction, &messages, &self.capabilities)
            .await?;

        let body = reply.message.text.clone();
        self.record_turn(user, reply.message);

        Ok(CompleteReply {
            body,
            citations: reply.citations,
            usage: reply.usage,
        })
    }

    /// Send one message and receive the reply as fragments in receipt order.
    /// The exchange is recorded once the stream has been fully consumed.
    pub async fn send_message_stream(
        &self,
        text: &str,
    ) -> Result<BoxStream<'_, Result<String>>> {
        let user = Message::user().with_text(text);
        let messages = self.conversation_with(&user);

        let mut fragments = self
            .provider
            .stream(&self.system_instruction, &messages, &self.capabilities)
            .await?;

        Ok(Box::pin(async_stream::try_stream! {
            let mut body = String::new();
            while let Some(fragment) = fragments.next().await {
                let fragment = fragment?;
                body.push_str(&fragment);
                yield fragment;
            }
            self.record_turn(user, Message::model().with_text(body));
        }))
    }
}
