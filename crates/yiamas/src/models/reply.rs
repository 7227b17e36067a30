use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};

use super::citation::Citation;
use crate::errors::ChatResult;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: Option<i32>,
    pub output_tokens: Option<i32>,
    pub total_tokens: Option<i32>,
}

impl Usage {
    pub fn new(
        input_tokens: Option<i32>,
        output_tokens: Option<i32>,
        total_tokens: Option<i32>,
    ) -> Self {
        Self {
            input_tokens,
            output_tokens,
            total_tokens,
        }
    }
}

/// A whole reply delivered in one payload
#[derive(Debug, Clone, PartialEq)]
pub struct CompleteReply {
    pub body: String,
    pub citations: Vec<Citation>,
    pub usage: Usage,
}

/// Reply fragments in receipt order. Finite and not restartable.
pub type FragmentStream<'a> = BoxStream<'a, ChatResult<String>>;

/// What a single `send` hands back, depending on the configured delivery mode
pub enum Reply<'a> {
    Complete(CompleteReply),
    Stream(FragmentStream<'a>),
}

impl std::fmt::Debug for Reply<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Reply::Complete(reply) => f.debug_tuple("Complete").field(reply).finish(),
            Reply::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}
