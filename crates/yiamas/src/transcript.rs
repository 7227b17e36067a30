use chrono::Utc;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::markup::{escape_html, plain_text_to_html, sanitize};
use crate::models::citation::Citation;
use crate::models::reply::CompleteReply;

pub const WELCOME_MESSAGE: &str = "<p>Yia mas! Welcome, welcome! Come, sit! Tell me what you're craving or what Chicago neighborhood you're in, and I'll find the perfect Greek or Mediterranean spot for you. Don't be shy!</p>";

pub const FALLBACK_MESSAGE: &str =
    "<p>I'm sorry, I'm having a little trouble right now. Please try again in a moment.</p>";

const SOURCES_HEADING: &str = "Here you go, book a table:";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Bot,
}

/// How a reply body is turned into display markup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BodyFormat {
    /// The body may use the allowed formatting tags
    Markup,
    /// The body is shown as text
    PlainText,
}

impl BodyFormat {
    pub fn render(&self, body: &str) -> String {
        match self {
            BodyFormat::Markup => sanitize(body),
            BodyFormat::PlainText => plain_text_to_html(body),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptEntry {
    pub sender: Sender,
    /// Rendered, display-safe markup
    pub content: String,
    pub created: i64,
}

impl TranscriptEntry {
    fn new(sender: Sender, content: String) -> Self {
        Self {
            sender,
            content,
            created: Utc::now().timestamp(),
        }
    }
}

#[derive(Debug)]
struct PendingStream {
    index: usize,
    body: String,
}

/// Append-only list of rendered chat entries.
///
/// The only entry ever edited is the bot entry of an active stream, whose
/// content tracks the fragments received so far.
#[derive(Debug)]
pub struct Transcript {
    entries: Vec<TranscriptEntry>,
    format: BodyFormat,
    pending: Option<PendingStream>,
}

impl Transcript {
    pub fn new(format: BodyFormat) -> Self {
        Self {
            entries: Vec::new(),
            format,
            pending: None,
        }
    }

    /// A transcript that opens with the welcome entry
    pub fn with_welcome(format: BodyFormat) -> Self {
        let mut transcript = Self::new(format);
        transcript.push(Sender::Bot, WELCOME_MESSAGE.to_string());
        transcript
    }

    pub fn entries(&self) -> &[TranscriptEntry] {
        &self.entries
    }

    pub fn last(&self) -> Option<&TranscriptEntry> {
        self.entries.last()
    }

    pub fn format(&self) -> BodyFormat {
        self.format
    }

    fn push(&mut self, sender: Sender, content: String) -> &TranscriptEntry {
        self.entries.push(TranscriptEntry::new(sender, content));
        &self.entries[self.entries.len() - 1]
    }

    pub fn push_user(&mut self, text: &str) -> &TranscriptEntry {
        let content = format!("<p>{}</p>", escape_html(text));
        self.push(Sender::User, content)
    }

    /// Append a whole bot reply, followed by its sources when there are any
    pub fn push_reply(&mut self, reply: &CompleteReply) -> &TranscriptEntry {
        let mut content = self.format.render(&reply.body);
        content.push_str(&render_sources(&reply.citations));
        self.push(Sender::Bot, content)
    }

    pub fn push_fallback(&mut self) -> &TranscriptEntry {
        self.push(Sender::Bot, FALLBACK_MESSAGE.to_string())
    }

    /// Open an empty bot entry to receive streamed fragments
    pub fn begin_stream(&mut self) -> &TranscriptEntry {
        let index = self.entries.len();
        self.pending = Some(PendingStream {
            index,
            body: String::new(),
        });
        self.push(Sender::Bot, String::new())
    }

    /// Append a fragment to the active stream entry.
    /// Returns `None` when no stream is active.
    pub fn push_fragment(&mut self, fragment: &str) -> Option<&TranscriptEntry> {
        let pending = self.pending.as_mut()?;
        pending.body.push_str(fragment);
        let entry = &mut self.entries[pending.index];
        entry.content = plain_text_to_html(&pending.body);
        Some(entry)
    }

    /// Close the active stream and return the full text it received.
    /// A stream that received nothing leaves no entry behind.
    pub fn end_stream(&mut self) -> Option<String> {
        let pending = self.pending.take()?;
        if pending.body.is_empty() && pending.index + 1 == self.entries.len() {
            self.entries.pop();
        }
        Some(pending.body)
    }

    pub fn is_streaming(&self) -> bool {
        self.pending.is_some()
    }
}

/// Only web links are rendered as anchors; anything else is shown as text
fn is_web_link(uri: &str) -> bool {
    Url::parse(uri)
        .map(|url| matches!(url.scheme(), "http" | "https"))
        .unwrap_or(false)
}

pub fn render_sources(citations: &[Citation]) -> String {
    if citations.is_empty() {
        return String::new();
    }

    let mut html = format!(
        "<div class=\"message-sources\"><h4>{}</h4><ul>",
        SOURCES_HEADING
    );
    for citation in citations {
        let label = escape_html(citation.label());
        if is_web_link(&citation.uri) {
            html.push_str(&format!(
                "<li><a href=\"{}\" target=\"_blank\" rel=\"noopener noreferrer\">{}</a></li>",
                escape_html(&citation.uri),
                label
            ));
        } else {
            html.push_str(&format!("<li>{}</li>", label));
        }
    }
    html.push_str("</ul></div>");
    html
}
