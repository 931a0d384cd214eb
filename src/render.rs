//! Terminal output for streamed answers.
//!
//! Reasoning inside a leading `<think>` span goes to stderr, the answer body
//! to stdout. The split is recomputed from the full text on every delta, so
//! only the newly visible suffix of each part is written.

use anyhow::Result;
use std::io::{self, Write};
use std::sync::{Arc, Mutex};
use stream_core::think::{
    split_think_segment, visible_body, THINK_CLOSE_TAG, THINK_OPEN_TAG,
};
use stream_core::{StreamEvent, StreamResult, StreamingCallback, StreamingError};

/// Newly visible text after a delta
#[derive(Debug, Default, PartialEq, Eq)]
pub struct RenderUpdate {
    pub think: String,
    pub body: String,
    /// The reasoning span just closed
    pub think_finished: bool,
}

#[derive(Debug, Default)]
pub struct RenderState {
    text: String,
    think_written: usize,
    body_written: usize,
    think_complete: bool,
}

impl RenderState {
    pub fn push(&mut self, delta: &str) -> RenderUpdate {
        self.text.push_str(delta);

        let (think, body, complete) = match split_think_segment(&self.text) {
            Some(segment) if segment.is_complete => (
                segment.think_content,
                visible_body(&self.text).to_string(),
                true,
            ),
            Some(segment) => {
                let think = without_partial_tag(&segment.think_content, THINK_CLOSE_TAG);
                (think.trim_end().to_string(), String::new(), false)
            }
            // Hold back until it is clear whether the message opens a think span
            None if THINK_OPEN_TAG.starts_with(self.text.trim_start()) => {
                (String::new(), String::new(), false)
            }
            None => (String::new(), self.text.trim_start().to_string(), false),
        };

        let update = RenderUpdate {
            think: unwritten(&think, &mut self.think_written),
            body: unwritten(&body, &mut self.body_written),
            think_finished: complete && !self.think_complete,
        };
        self.think_complete = complete;
        update
    }
}

/// `text` without a trailing prefix of `tag`
fn without_partial_tag<'a>(text: &'a str, tag: &str) -> &'a str {
    (1..tag.len())
        .rev()
        .find_map(|len| text.strip_suffix(&tag[..len]))
        .unwrap_or(text)
}

/// Suffix of `text` past `written`, advancing the marker
fn unwritten(text: &str, written: &mut usize) -> String {
    match text.get(*written..) {
        Some(rest) => {
            *written = text.len();
            rest.to_string()
        }
        None => String::new(),
    }
}

/// Writes stream events to the terminal
#[derive(Default)]
pub struct TerminalRenderer {
    state: Mutex<RenderState>,
}

impl TerminalRenderer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn callback(self: &Arc<Self>) -> StreamingCallback {
        let renderer = self.clone();
        Box::new(move |event: &StreamEvent| renderer.handle(event))
    }

    fn handle(&self, event: &StreamEvent) -> Result<()> {
        match event {
            StreamEvent::Text(delta) => {
                let update = match self.state.lock() {
                    Ok(mut state) => state.push(delta),
                    Err(poisoned) => poisoned.into_inner().push(delta),
                };
                if !update.think.is_empty() {
                    write_flush(&mut io::stderr(), &update.think)?;
                }
                if update.think_finished {
                    write_flush(&mut io::stderr(), "\n")?;
                }
                if !update.body.is_empty() {
                    write_flush(&mut io::stdout(), &update.body)?;
                }
            }
            StreamEvent::Image(url) => tracing::debug!("Image available: {}", url),
            StreamEvent::Done => write_flush(&mut io::stdout(), "\n")?,
        }
        Ok(())
    }
}

fn write_flush(out: &mut impl Write, text: &str) -> Result<()> {
    out.write_all(text.as_bytes())
        .and_then(|_| out.flush())
        .map_err(|e| StreamingError::RendererError(e.to_string()).into())
}

/// Print the final images and the sanitized message
pub fn print_result(result: &StreamResult) {
    println!();
    if result.images.is_empty() {
        println!("No images.");
    }
    for (index, url) in result.images.iter().enumerate() {
        println!("Image {}: {}", index + 1, url);
    }
    if result.exhausted_token_limit() {
        println!("Note: the token limit was reached before any answer was produced.");
    } else if !result.answer().is_empty() {
        println!("Message: {}", result.answer());
    }
    if let Some(usage) = &result.usage {
        println!(
            "Tokens: {} prompt, {} completion",
            usage.prompt_tokens, usage.completion_tokens
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render_all(deltas: &[&str]) -> (String, String) {
        let mut state = RenderState::default();
        let mut think = String::new();
        let mut body = String::new();
        for delta in deltas {
            let update = state.push(delta);
            think.push_str(&update.think);
            body.push_str(&update.body);
        }
        (think, body)
    }

    #[test]
    fn test_plain_answer_goes_to_body() {
        let (think, body) = render_all(&["Hello", " world"]);
        assert_eq!(think, "");
        assert_eq!(body, "Hello world");
    }

    #[test]
    fn test_thinking_then_body() {
        let (think, body) = render_all(&[
            "<thi",
            "nk>plan ",
            "the pic",
            "ture</th",
            "ink>\nHere ",
            "it is",
        ]);
        assert_eq!(think, "plan the picture");
        assert_eq!(body, "Here it is");
    }

    #[test]
    fn test_think_finished_reported_once() {
        let mut state = RenderState::default();
        assert!(!state.push("<think>a").think_finished);
        assert!(state.push("</think>b").think_finished);
        assert!(!state.push("c").think_finished);
    }

    #[test]
    fn test_late_think_tag_is_body_text() {
        let (think, body) = render_all(&["Answer ", "<think>x</think>"]);
        assert_eq!(think, "");
        assert_eq!(body, "Answer <think>x</think>");
    }

    #[test]
    fn test_partial_close_tag_is_held_back() {
        let mut state = RenderState::default();
        assert_eq!(state.push("<think>idea</th").think, "idea");
        let update = state.push("ink>done");
        assert_eq!(update.think, "");
        assert!(update.think_finished);
        assert_eq!(update.body, "done");
    }

    #[test]
    fn test_multibyte_deltas() {
        let (_, body) = render_all(&["\u{65e5}", "\u{672c} ", "\u{1f3a8}"]);
        assert_eq!(body, "\u{65e5}\u{672c} \u{1f3a8}");
    }
}
