use futures::stream::StreamExt;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};

use crate::configuration::Settings;
use crate::errors::{ChatError, ChatResult, ConfigError};
use crate::models::reply::{CompleteReply, Reply};
use crate::prompt_template::{persona_instruction, PersonaContext};
use crate::providers::base::Capabilities;
use crate::providers::gemini::GeminiProvider;
use crate::session::Session;
use crate::transcript::BodyFormat;

/// How replies are handed back to the caller
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryMode {
    /// One payload per reply, with citations
    #[default]
    Complete,
    /// Text fragments as they arrive, without citations
    Streaming,
}

impl DeliveryMode {
    pub fn body_format(&self) -> BodyFormat {
        match self {
            DeliveryMode::Complete => BodyFormat::Markup,
            DeliveryMode::Streaming => BodyFormat::PlainText,
        }
    }
}

/// Clears the busy flag when dropped
struct BusyGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> BusyGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> ChatResult<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| ChatError::Busy)?;
        Ok(Self { flag })
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// Turns user text into model replies over one long-lived session.
///
/// At most one request is in flight at a time. A streamed request stays in
/// flight until its fragment stream is exhausted or dropped.
pub struct ConversationAdapter {
    session: Session,
    mode: DeliveryMode,
    busy: AtomicBool,
}

impl ConversationAdapter {
    pub fn new(session: Session, mode: DeliveryMode) -> Self {
        Self {
            session,
            mode,
            busy: AtomicBool::new(false),
        }
    }

    /// Build the session from settings. Makes no network call.
    pub fn initialize(settings: &Settings) -> ChatResult<Self> {
        settings.validate()?;

        let mode = settings.delivery;
        let context = PersonaContext {
            markup: mode.body_format() == BodyFormat::Markup,
            search_grounding: settings.search_grounding,
        };
        let system_instruction = persona_instruction(settings.persona_file.as_deref(), &context)
            .map_err(ConfigError::Persona)?;

        let provider =
            GeminiProvider::new(settings.provider_config()).map_err(ChatError::RemoteSession)?;
        let session = Session::new(
            Box::new(provider),
            system_instruction,
            Capabilities::with_search_grounding(settings.search_grounding),
        );

        tracing::info!(
            model = %settings.model,
            mode = ?mode,
            search_grounding = settings.search_grounding,
            "conversation session created"
        );
        Ok(Self::new(session, mode))
    }

    pub fn mode(&self) -> DeliveryMode {
        self.mode
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Send one user message and get the reply in the configured delivery mode
    pub async fn send(&self, text: &str) -> ChatResult<Reply<'_>> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ChatError::EmptyInput);
        }

        let guard = BusyGuard::acquire(&self.busy)?;
        tracing::debug!(mode = ?self.mode, "sending message");

        match self.mode {
            DeliveryMode::Complete => {
                let reply = self.session.send_message(text).await.map_err(|e| {
                    tracing::warn!(error = %e, "message failed");
                    ChatError::RemoteSession(e)
                })?;
                drop(guard);

                let citations = reply
                    .citations
                    .into_iter()
                    .filter(|citation| !citation.uri.trim().is_empty())
                    .collect();
                Ok(Reply::Complete(CompleteReply {
                    body: reply.body,
                    citations,
                    usage: reply.usage,
                }))
            }
            DeliveryMode::Streaming => {
                let mut fragments = self.session.send_message_stream(text).await.map_err(|e| {
                    tracing::warn!(error = %e, "stream failed to start");
                    ChatError::RemoteSession(e)
                })?;

                Ok(Reply::Stream(Box::pin(async_stream::stream! {
                    let _guard = guard;
                    while let Some(fragment) = fragments.next().await {
                        if let Err(e) = &fragment {
                            tracing::warn!(error = %e, "stream interrupted");
                        }
                        yield fragment.map_err(ChatError::RemoteSession);
                    }
                })))
            }
        }
    }
}
