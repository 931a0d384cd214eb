//! Reader loop driving chunks through the frame decoder into the aggregator

use crate::aggregator::{DeltaAggregator, FrameDisposition};
use crate::decoder::FrameDecoder;
use crate::recording::APIRecorder;
use crate::streaming::ChunkStream;
use crate::types::{StreamOutcome, StreamingError};
use anyhow::Result;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

/// Options for one pipeline run
#[derive(Clone, Default)]
pub struct PipelineOptions<'a> {
    /// Number of image URLs kept in the final result
    pub quantity: usize,
    /// Recorder receiving every raw chunk
    pub recorder: Option<&'a APIRecorder>,
}

/// Pull chunks from `source` until the sentinel, end-of-stream or
/// cancellation.
///
/// Cancellation (through `token` or a callback returning
/// [`StreamingError::UserCancelled`]) yields [`StreamOutcome::Cancelled`]
/// and discards the aggregated state. Transport errors from `source`
/// propagate unchanged.
pub async fn run_pipeline(
    source: &mut dyn ChunkStream,
    mut aggregator: DeltaAggregator<'_>,
    token: &CancellationToken,
    options: PipelineOptions<'_>,
) -> Result<StreamOutcome> {
    let mut decoder = FrameDecoder::new();

    loop {
        let chunk = tokio::select! {
            biased;
            _ = token.cancelled() => {
                debug!("Stream cancelled while waiting for data");
                return Ok(StreamOutcome::Cancelled);
            }
            chunk = source.next_chunk() => chunk?,
        };

        let Some(chunk) = chunk else {
            trace!("Transport signalled end of stream");
            decoder.finish();
            break;
        };
        if let Some(recorder) = options.recorder {
            recorder.record_chunk(&chunk);
        }

        decoder.feed(&chunk);
        match drain_frames(&mut decoder, &mut aggregator) {
            Ok(true) => break,
            Ok(false) => {}
            Err(e) => return cancelled_or(e),
        }
    }

    if let Err(e) = drain_frames(&mut decoder, &mut aggregator) {
        return cancelled_or(e);
    }
    if token.is_cancelled() {
        return Ok(StreamOutcome::Cancelled);
    }
    if let Err(e) = aggregator.end_of_stream() {
        return cancelled_or(e);
    }

    let state = aggregator.state();
    debug!(
        "Stream finished: {} frames ({} dropped), {} chars, {} images",
        state.frames_seen,
        state.frames_dropped,
        state.accumulated_text.len(),
        state.image_urls.len()
    );
    Ok(StreamOutcome::Completed(aggregator.finalize(options.quantity)))
}

/// Feed every complete frame to the aggregator; returns whether the stream terminated
fn drain_frames(decoder: &mut FrameDecoder, aggregator: &mut DeltaAggregator<'_>) -> Result<bool> {
    for frame in decoder.by_ref() {
        if aggregator.process_frame(&frame)? == FrameDisposition::Terminated {
            return Ok(true);
        }
    }
    Ok(false)
}

fn cancelled_or(error: anyhow::Error) -> Result<StreamOutcome> {
    if matches!(
        error.downcast_ref::<StreamingError>(),
        Some(StreamingError::UserCancelled)
    ) {
        debug!("Streaming callback cancelled the stream");
        Ok(StreamOutcome::Cancelled)
    } else {
        Err(error)
    }
}
