//! Incremental decoder turning raw transport chunks into event-stream frames
//!
//! Chunks may split UTF-8 sequences, lines, the blank-line delimiter or JSON
//! payloads anywhere. The decoder only ever waits for more input; it never
//! reports an error for a partial frame.

use crate::types::Frame;
use encoding_rs::{CoderResult, Decoder, UTF_8};
use tracing::{debug, trace};

const FRAME_DELIMITER: &str = "\n\n";

/// Splits a byte stream into [`Frame`]s.
///
/// Feed chunks with [`FrameDecoder::feed`], pull complete frames by iterating,
/// and call [`FrameDecoder::finish`] once the transport signals end-of-stream
/// so the unterminated tail is flushed as a final frame. One decoder per
/// stream; it is not restartable.
pub struct FrameDecoder {
    utf8: Decoder,
    buffer: String,
    finished: bool,
    terminated: bool,
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self {
            utf8: UTF_8.new_decoder_without_bom_handling(),
            buffer: String::new(),
            finished: false,
            terminated: false,
        }
    }

    /// Append a transport chunk to the buffer.
    ///
    /// Bytes arriving after the sentinel or after [`finish`](Self::finish)
    /// are ignored.
    pub fn feed(&mut self, chunk: &[u8]) {
        if self.terminated || self.finished {
            trace!("Ignoring {} bytes after end of stream", chunk.len());
            return;
        }
        self.decode_into_buffer(chunk, false);
    }

    /// Signal end-of-stream. Dangling partial UTF-8 bytes are decoded
    /// lossily and the remaining buffer becomes eligible as a final frame.
    pub fn finish(&mut self) {
        if self.finished {
            return;
        }
        if !self.terminated {
            self.decode_into_buffer(&[], true);
        }
        self.finished = true;
    }

    /// Whether a sentinel frame has been produced
    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    /// Text buffered but not yet part of a complete frame
    pub fn pending(&self) -> &str {
        &self.buffer
    }

    fn decode_into_buffer(&mut self, chunk: &[u8], last: bool) {
        let mut decoded = String::new();
        let mut remaining = chunk;
        loop {
            let needed = self
                .utf8
                .max_utf8_buffer_length(remaining.len())
                .unwrap_or(remaining.len() * 3 + 4);
            decoded.reserve(needed);
            let (result, read, had_replacements) =
                self.utf8.decode_to_string(remaining, &mut decoded, last);
            if had_replacements {
                debug!("Replaced malformed UTF-8 in stream chunk");
            }
            remaining = &remaining[read..];
            match result {
                CoderResult::InputEmpty => break,
                CoderResult::OutputFull => continue,
            }
        }
        // Carriage returns are dropped so CRLF framing matches LF framing
        self.buffer.extend(decoded.chars().filter(|c| *c != '\r'));
    }

    fn next_delimited_frame(&mut self) -> Option<Frame> {
        while let Some(boundary) = self.buffer.find(FRAME_DELIMITER) {
            let block: String = self.buffer.drain(..boundary + FRAME_DELIMITER.len()).collect();
            if let Some(frame) = Frame::from_block(&block[..boundary]) {
                return Some(frame);
            }
        }
        None
    }

    fn flush_tail(&mut self) -> Option<Frame> {
        if self.buffer.trim().is_empty() {
            self.buffer.clear();
            return None;
        }
        let block = std::mem::take(&mut self.buffer);
        debug!("Flushing unterminated frame of {} bytes", block.len());
        Frame::from_block(&block)
    }
}

impl Iterator for FrameDecoder {
    type Item = Frame;

    fn next(&mut self) -> Option<Frame> {
        if self.terminated {
            return None;
        }

        let frame = match self.next_delimited_frame() {
            Some(frame) => Some(frame),
            None if self.finished => self.flush_tail(),
            None => None,
        }?;

        if frame.is_sentinel {
            debug!("Sentinel frame received, ending frame sequence");
            self.terminated = true;
            self.buffer.clear();
        }
        Some(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_all(chunks: &[&[u8]]) -> Vec<Frame> {
        let mut decoder = FrameDecoder::new();
        let mut frames = Vec::new();
        for chunk in chunks {
            decoder.feed(chunk);
            frames.extend(&mut decoder);
        }
        decoder.finish();
        frames.extend(&mut decoder);
        frames
    }

    fn payloads(frames: &[Frame]) -> Vec<&str> {
        frames.iter().map(|f| f.payload.as_str()).collect()
    }

    #[test]
    fn test_frames_split_on_blank_line() {
        let frames = decode_all(&[b"data: one\n\ndata: two\n\n"]);
        assert_eq!(payloads(&frames), vec!["one", "two"]);
    }

    #[test]
    fn test_waits_for_delimiter() {
        let mut decoder = FrameDecoder::new();
        decoder.feed(b"data: {\"choi");
        assert!(decoder.next().is_none());
        decoder.feed(b"ces\":[]}\n");
        assert!(decoder.next().is_none());
        decoder.feed(b"\n");
        assert_eq!(decoder.next().unwrap().payload, "{\"choices\":[]}");
        assert!(decoder.next().is_none());
    }

    #[test]
    fn test_crlf_framing() {
        let frames = decode_all(&[b"data: one\r\n\r\ndata: two\r", b"\n\r\n"]);
        assert_eq!(payloads(&frames), vec!["one", "two"]);
    }

    #[test]
    fn test_multibyte_character_split_across_chunks() {
        let text = "data: caf\u{e9} \u{65e5}\u{672c}\n\n";
        let bytes = text.as_bytes();
        // Split inside the two-byte and the three-byte sequences
        let e_acute = text.find('\u{e9}').unwrap();
        let kanji = text.find('\u{65e5}').unwrap();
        let frames = decode_all(&[
            &bytes[..e_acute + 1],
            &bytes[e_acute + 1..kanji + 2],
            &bytes[kanji + 2..],
        ]);
        assert_eq!(payloads(&frames), vec!["caf\u{e9} \u{65e5}\u{672c}"]);
        assert!(!frames[0].payload.contains('\u{fffd}'));
    }

    #[test]
    fn test_sentinel_stops_sequence() {
        let frames = decode_all(&[b"data: a\n\ndata: [DONE]\n\ndata: b\n\n", b"data: c\n\n"]);
        assert_eq!(payloads(&frames), vec!["a", "[DONE]"]);
        assert!(frames[1].is_sentinel);
    }

    #[test]
    fn test_sentinel_in_tail_without_delimiter() {
        let frames = decode_all(&[b"data: a\n\ndata: [DONE]"]);
        assert_eq!(payloads(&frames), vec!["a", "[DONE]"]);
    }

    #[test]
    fn test_flush_unterminated_tail() {
        let frames = decode_all(&[b"data: a\n\ndata: tail"]);
        assert_eq!(payloads(&frames), vec!["a", "tail"]);
    }

    #[test]
    fn test_no_tail_flush_after_sentinel() {
        let mut decoder = FrameDecoder::new();
        decoder.feed(b"data: [DONE]\n\ndata: tail");
        assert!(decoder.next().unwrap().is_sentinel);
        decoder.finish();
        assert!(decoder.next().is_none());
        assert!(decoder.is_terminated());
    }

    #[test]
    fn test_whitespace_tail_is_dropped() {
        let frames = decode_all(&[b"data: a\n\n  \n"]);
        assert_eq!(payloads(&frames), vec!["a"]);
    }

    #[test]
    fn test_dangling_partial_character_flushed_lossily() {
        let frames = decode_all(&[b"data: x\xe6\x97"]);
        assert_eq!(payloads(&frames), vec!["x\u{fffd}"]);
    }

    #[test]
    fn test_empty_blocks_are_skipped() {
        let frames = decode_all(&[b"\n\n\n\ndata: a\n\n\n\n"]);
        assert_eq!(payloads(&frames), vec!["a"]);
    }

    #[test]
    fn test_single_byte_chunks() {
        let input = b"data: {\"x\":1}\n\ndata: [DONE]\n\n";
        let chunks: Vec<&[u8]> = input.chunks(1).collect();
        let frames = decode_all(&chunks);
        assert_eq!(payloads(&frames), vec!["{\"x\":1}", "[DONE]"]);
    }
}
