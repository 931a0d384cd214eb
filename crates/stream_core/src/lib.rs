//! Incremental stream-parsing core for streamed assistant responses
//!
//! This crate implements:
//! - Frame decoding of an arbitrarily chunked event stream (`decoder`)
//! - Aggregation of content deltas and inline image references (`aggregator`)
//! - Splitting of a leading `<think>` span from the answer body (`think`)
//! - A cancellable reader loop tying transport, decoder and aggregator together
//! - An HTTP transport and recorded playback sharing the same chunk source trait


mod utils;

pub mod aggregator;
pub mod client;
pub mod decoder;
pub mod directive;
pub mod image_refs;
pub mod pipeline;
pub mod recording;
pub mod request;
pub mod session;
pub mod streaming;
pub mod think;
pub mod types;

pub use aggregator::{AggregationState, DeltaAggregator, FrameDisposition, DEFAULT_MAX_IMAGES};
pub use client::GenerationClient;
pub use decoder::FrameDecoder;
pub use pipeline::{run_pipeline, PipelineOptions};
pub use request::{ChatCompletionRequest, ChatMessage, ChatRole, DrawingRequest};
pub use session::{StreamSlot, StreamTicket};
pub use streaming::{ChunkStream, HttpChunkStream, PlaybackChunkStream, PlaybackTiming};
pub use think::{split_think_segment, ThinkSegment};
pub use types::*;

use anyhow::Result;

/// Receives [`StreamEvent`]s while a stream is aggregated.
/// Returning an error (e.g. [`StreamingError::UserCancelled`]) stops the stream.
pub type StreamingCallback = Box<dyn Fn(&StreamEvent) -> Result<()> + Send + Sync>;
