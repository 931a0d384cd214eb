//! Aggregation of decoded frames into the running state of one stream

use crate::image_refs::{image_urls, strip_image_refs};
use crate::types::{Frame, StreamEvent, StreamResult, Usage};
use crate::StreamingCallback;
use anyhow::Result;
use serde::Deserialize;
use tracing::{debug, trace, warn};

/// Collection cap used when the caller does not supply one
pub const DEFAULT_MAX_IMAGES: usize = 16;

#[derive(Debug, Deserialize)]
struct ChatStreamChunk {
    #[serde(default)]
    choices: Vec<ChatStreamChoice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct ChatStreamChoice {
    #[serde(default)]
    delta: Option<ChatStreamDelta>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatStreamDelta {
    #[serde(default)]
    content: Option<String>,
}

/// Mutable state of one stream, owned by its [`DeltaAggregator`]
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AggregationState {
    /// Every delta's content in arrival order; only ever appended to
    pub accumulated_text: String,
    /// Unique image URLs in insertion order, never more than the cap
    pub image_urls: Vec<String>,
    pub terminated: bool,
    pub usage: Option<Usage>,
    pub finish_reason: Option<String>,
    pub frames_seen: usize,
    pub frames_dropped: usize,
}

/// Result of feeding one frame to the aggregator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameDisposition {
    /// Frame content (possibly none) was applied
    Applied,
    /// Payload could not be decoded and was discarded
    Dropped,
    /// Sentinel seen, or the stream already ended; stop feeding frames
    Terminated,
}

/// Consumes frames in order and maintains the [`AggregationState`] of a stream
pub struct DeltaAggregator<'a> {
    state: AggregationState,
    max_images: usize,
    callback: Option<&'a StreamingCallback>,
}

impl<'a> DeltaAggregator<'a> {
    /// Create an aggregator collecting at most `max_images` distinct image URLs
    pub fn new(max_images: usize) -> Self {
        Self {
            state: AggregationState::default(),
            max_images,
            callback: None,
        }
    }

    /// Notify `callback` about every text delta, new image and completion
    pub fn with_callback(mut self, callback: &'a StreamingCallback) -> Self {
        self.callback = Some(callback);
        self
    }

    pub fn state(&self) -> &AggregationState {
        &self.state
    }

    pub fn is_terminated(&self) -> bool {
        self.state.terminated
    }

    /// Apply a single frame.
    ///
    /// Decode failures never surface as errors; only a callback error does.
    pub fn process_frame(&mut self, frame: &Frame) -> Result<FrameDisposition> {
        if self.state.terminated {
            return Ok(FrameDisposition::Terminated);
        }
        self.state.frames_seen += 1;

        if frame.is_sentinel {
            self.terminate()?;
            return Ok(FrameDisposition::Terminated);
        }

        let chunk = match serde_json::from_str::<ChatStreamChunk>(&frame.payload) {
            Ok(chunk) => chunk,
            Err(e) => {
                warn!("Failed to parse stream event: '{}' ({})", frame.payload, e);
                self.state.frames_dropped += 1;
                return Ok(FrameDisposition::Dropped);
            }
        };
        trace!("Received stream event: '{}'", frame.payload);

        if let Some(usage) = chunk.usage {
            self.state.usage = Some(usage);
        }

        if let Some(choice) = chunk.choices.into_iter().next() {
            if let Some(reason) = choice.finish_reason {
                self.state.finish_reason = Some(reason);
            }
            if let Some(content) = choice.delta.and_then(|delta| delta.content) {
                self.apply_delta(&content)?;
            }
        }

        Ok(FrameDisposition::Applied)
    }

    /// Mark the stream as ended without a sentinel (natural end-of-stream)
    pub fn end_of_stream(&mut self) -> Result<()> {
        if !self.state.terminated {
            debug!("Stream ended without sentinel");
            self.terminate()?;
        }
        Ok(())
    }

    /// Produce the displayable result, keeping at most `quantity` images
    pub fn finalize(self, quantity: usize) -> StreamResult {
        let AggregationState {
            accumulated_text,
            mut image_urls,
            usage,
            finish_reason,
            ..
        } = self.state;
        image_urls.truncate(quantity);

        let result = StreamResult {
            message: strip_image_refs(&accumulated_text),
            images: image_urls,
            raw_text: accumulated_text,
            usage,
            finish_reason,
        };
        if result.exhausted_token_limit() {
            warn!("Token limit reached before any answer was produced");
        }
        result
    }

    fn apply_delta(&mut self, content: &str) -> Result<()> {
        if content.is_empty() {
            return Ok(());
        }
        self.state.accumulated_text.push_str(content);
        self.emit(StreamEvent::Text(content.to_string()))?;

        // Only the fragment is scanned; references split across deltas are missed here
        for url in image_urls(content) {
            if self.state.image_urls.len() >= self.max_images {
                trace!("Image cap of {} reached, skipping {}", self.max_images, url);
                break;
            }
            if self.state.image_urls.iter().any(|existing| existing == url) {
                continue;
            }
            debug!("Collected image URL: {}", url);
            self.state.image_urls.push(url.to_string());
            self.emit(StreamEvent::Image(url.to_string()))?;
        }
        Ok(())
    }

    fn terminate(&mut self) -> Result<()> {
        self.state.terminated = true;
        self.emit(StreamEvent::Done)
    }

    fn emit(&self, event: StreamEvent) -> Result<()> {
        match self.callback {
            Some(callback) => callback(&event),
            None => Ok(()),
        }
    }
}
