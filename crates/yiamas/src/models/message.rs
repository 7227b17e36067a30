use chrono::Utc;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Model,
}

impl Role {
    /// Name of the role on the wire
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Model => "model",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// One turn of the conversation held by the session
pub struct Message {
    pub role: Role,
    pub created: i64,
    pub text: String,
}

impl Message {
    /// Create a new user message with the current timestamp
    pub fn user() -> Self {
        Message {
            role: Role::User,
            created: Utc::now().timestamp(),
            text: String::new(),
        }
    }

    /// Create a new model message with the current timestamp
    pub fn model() -> Self {
        Message {
            role: Role::Model,
            created: Utc::now().timestamp(),
            text: String::new(),
        }
    }

    /// Append text to the message
    pub fn with_text<S: AsRef<str>>(mut self, text: S) -> Self {
        self.text.push_str(text.as_ref());
        self
    }
}
