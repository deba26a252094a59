//! API Module
//!
//! Chat completion API types and streaming support.

pub mod completion;
pub mod streaming;

pub use completion::{
    ChatMessage, ChatRequest, ChatResponse, Choice, Citation, DataSource, FieldsMapping,
    MessageContext, ResponseMessage, SearchAuthentication, SearchParameters, Usage,
};
pub use streaming::{parse_sse_line, sse_lines, SseFrame, StreamChoice, StreamChunk, StreamDelta};
