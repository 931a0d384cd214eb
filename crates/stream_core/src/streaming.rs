//! Chunk sources feeding the decode pipeline
//!
//! Live HTTP responses and recorded playback implement the same trait so the
//! pipeline processes both identically.

use crate::recording::RecordedChunk;
use crate::types::ApiError;
use anyhow::Result;
use async_trait::async_trait;
use reqwest::Response;
use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Source of raw transport chunks; `Ok(None)` signals end-of-stream
#[async_trait]
pub trait ChunkStream: Send {
    async fn next_chunk(&mut self) -> Result<Option<Vec<u8>>>;
}

/// Real HTTP response chunk stream
pub struct HttpChunkStream {
    pub response: Response,
}

impl HttpChunkStream {
    pub fn new(response: Response) -> Self {
        Self { response }
    }
}

#[async_trait]
impl ChunkStream for HttpChunkStream {
    async fn next_chunk(&mut self) -> Result<Option<Vec<u8>>> {
        match self.response.chunk().await {
            Ok(Some(chunk)) => Ok(Some(chunk.to_vec())),
            Ok(None) => Ok(None),
            Err(e) => Err(ApiError::NetworkError(format!("HTTP chunk error: {e}")).into()),
        }
    }
}

/// Pacing of recorded playback
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackTiming {
    /// Reproduce the recorded arrival times
    Recorded,
    /// Fixed delay between chunks
    Fixed(Duration),
    /// No delay at all
    Immediate,
}

/// Recorded chunk stream for playback
pub struct PlaybackChunkStream {
    chunks: VecDeque<RecordedChunk>,
    start_time: Instant,
    timing: PlaybackTiming,
}

impl PlaybackChunkStream {
    pub fn new(chunks: Vec<RecordedChunk>, timing: PlaybackTiming) -> Self {
        Self {
            chunks: chunks.into(),
            start_time: Instant::now(),
            timing,
        }
    }

    /// Playback of in-memory byte chunks without delays
    pub fn from_bytes<I, B>(chunks: I) -> Self
    where
        I: IntoIterator<Item = B>,
        B: Into<Vec<u8>>,
    {
        let chunks = chunks
            .into_iter()
            .map(|bytes| RecordedChunk {
                data: bytes.into(),
                timestamp_ms: 0,
            })
            .collect();
        Self::new(chunks, PlaybackTiming::Immediate)
    }

    /// Re-split the recorded byte stream into chunks of `size` bytes
    pub fn rechunked(self, size: usize) -> Self {
        let size = size.max(1);
        let bytes: Vec<u8> = self.chunks.into_iter().flat_map(|c| c.data).collect();
        let chunks = bytes
            .chunks(size)
            .map(|slice| RecordedChunk {
                data: slice.to_vec(),
                timestamp_ms: 0,
            })
            .collect();
        let timing = match self.timing {
            PlaybackTiming::Recorded => PlaybackTiming::Immediate,
            other => other,
        };
        Self::new(chunks, timing)
    }
}

#[async_trait]
impl ChunkStream for PlaybackChunkStream {
    async fn next_chunk(&mut self) -> Result<Option<Vec<u8>>> {
        let Some(chunk) = self.chunks.pop_front() else {
            return Ok(None);
        };

        match self.timing {
            PlaybackTiming::Recorded => {
                let elapsed = self.start_time.elapsed();
                let expected_time = Duration::from_millis(chunk.timestamp_ms);
                if elapsed < expected_time {
                    tokio::time::sleep(expected_time - elapsed).await;
                }
            }
            PlaybackTiming::Fixed(delay) => tokio::time::sleep(delay).await,
            PlaybackTiming::Immediate => {}
        }

        Ok(Some(chunk.data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_playback_yields_chunks_in_order() {
        let mut stream = PlaybackChunkStream::from_bytes(vec!["ab", "cd"]);
        assert_eq!(stream.next_chunk().await.unwrap(), Some(b"ab".to_vec()));
        assert_eq!(stream.next_chunk().await.unwrap(), Some(b"cd".to_vec()));
        assert_eq!(stream.next_chunk().await.unwrap(), None);
        assert_eq!(stream.next_chunk().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_rechunked_preserves_bytes() {
        let mut stream = PlaybackChunkStream::from_bytes(vec!["abc", "defg"]).rechunked(3);
        let mut seen = Vec::new();
        while let Some(chunk) = stream.next_chunk().await.unwrap() {
            assert!(chunk.len() <= 3);
            seen.push(chunk);
        }
        assert_eq!(seen.concat(), b"abcdefg".to_vec());
        assert_eq!(seen.len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_recorded_timing_waits() {
        let chunks = vec![RecordedChunk {
            data: b"x".to_vec(),
            timestamp_ms: 250,
        }];
        let mut stream = PlaybackChunkStream::new(chunks, PlaybackTiming::Recorded);
        let started = tokio::time::Instant::now();
        stream.next_chunk().await.unwrap();
        assert!(started.elapsed() >= Duration::from_millis(200));
    }
}
