use crate::think::visible_body;
use serde::{Deserialize, Serialize};

/// Payload value that terminates a stream
pub const DONE_SENTINEL: &str = "[DONE]";

/// One blank-line delimited unit of the event stream
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Frame {
    /// `data:` lines of the block with their prefix and surrounding whitespace removed
    pub data_lines: Vec<String>,
    /// Joined and trimmed payload of the frame
    pub payload: String,
    /// Whether the payload is the termination marker
    pub is_sentinel: bool,
}

impl Frame {
    /// Build a frame from a raw block (the text between two delimiters).
    ///
    /// Returns `None` for blocks that carry nothing after trimming, and for
    /// blocks whose `data:` lines are all empty.
    pub fn from_block(block: &str) -> Option<Self> {
        let trimmed = block.trim();
        if trimmed.is_empty() {
            return None;
        }

        let data_lines: Vec<String> = trimmed
            .lines()
            .filter_map(|line| line.strip_prefix("data:"))
            .map(|value| value.trim().to_string())
            .collect();

        let payload = if data_lines.is_empty() {
            // Payload-only framing without the `data:` prefix
            trimmed.to_string()
        } else {
            data_lines.join("\n").trim().to_string()
        };

        if payload.is_empty() {
            return None;
        }

        Some(Self {
            is_sentinel: payload == DONE_SENTINEL,
            data_lines,
            payload,
        })
    }
}

/// Token usage reported by the backend in the final chunk of a stream
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Default)]
pub struct Usage {
    #[serde(default)]
    pub prompt_tokens: u32,
    #[serde(default)]
    pub completion_tokens: u32,
    #[serde(default)]
    pub total_tokens: u32,
}

/// Incremental events emitted while a stream is being aggregated
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// A non-empty content delta, verbatim
    Text(String),
    /// A newly collected image URL
    Image(String),
    /// The stream reached its sentinel or its natural end
    Done,
}

/// Final outcome of an aggregated stream, ready for display
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StreamResult {
    /// Accumulated text with every image reference removed, trimmed
    pub message: String,
    /// Collected image URLs in arrival order, truncated to the requested quantity
    pub images: Vec<String>,
    /// Accumulated text exactly as received
    pub raw_text: String,
    pub usage: Option<Usage>,
    pub finish_reason: Option<String>,
}

impl StreamResult {
    /// Message text without a leading thinking span
    pub fn answer(&self) -> &str {
        visible_body(&self.message)
    }

    /// The backend hit its token limit before producing any answer, e.g. a
    /// reasoning model that spent the whole budget thinking
    pub fn exhausted_token_limit(&self) -> bool {
        self.finish_reason.as_deref() == Some("length")
            && self.answer().is_empty()
            && self.images.is_empty()
    }
}

/// How a pipeline run ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamOutcome {
    Completed(StreamResult),
    /// The stream was cancelled; nothing is surfaced to the UI
    Cancelled,
}

impl StreamOutcome {
    pub fn into_result(self) -> Option<StreamResult> {
        match self {
            StreamOutcome::Completed(result) => Some(result),
            StreamOutcome::Cancelled => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, StreamOutcome::Cancelled)
    }
}

/// Transport errors surfaced to the caller as terminal stream failures
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Rate limit exceeded: {0}")]
    RateLimit(String),

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Service error: {0}")]
    ServiceError(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Unknown error: {0}")]
    Unknown(String),
}

/// Errors a streaming callback may return to stop the pipeline
#[derive(Debug, thiserror::Error)]
pub enum StreamingError {
    #[error("Streaming cancelled by user")]
    UserCancelled,

    #[error("Streaming renderer error: {0}")]
    RendererError(String),
}
