//! These models represent the objects passed between the adapter, the session and the model
//!
//! The remote chat API has its own wire format for turns, grounding metadata and
//! streamed chunks. We convert those into these structs as soon as they arrive so
//! the rest of the crate never touches raw JSON.
pub mod citation;
pub mod message;
pub mod reply;
