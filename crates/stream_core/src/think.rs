//! Separation of a leading `<think>` span from the answer body.
//!
//! The split is recomputed from the full message text on every call, so a
//! renderer can invoke it on each streaming update without keeping state.

pub const THINK_OPEN_TAG: &str = "<think>";
pub const THINK_CLOSE_TAG: &str = "</think>";

/// Reasoning and answer parts of an assistant message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThinkSegment {
    pub think_content: String,
    pub rest_content: String,
    /// Whether the closing tag has arrived
    pub is_complete: bool,
}

/// Split `content` into its thinking span and body.
///
/// Returns `None` unless `<think>` is the first non-whitespace text of the
/// message; a tag appearing later is ordinary body text. Without a closing
/// tag everything after the opening tag is (still streaming) reasoning.
pub fn split_think_segment(content: &str) -> Option<ThinkSegment> {
    let after_open = content.trim_start().strip_prefix(THINK_OPEN_TAG)?;

    match after_open.find(THINK_CLOSE_TAG) {
        Some(close) => Some(ThinkSegment {
            think_content: after_open[..close].trim().to_string(),
            rest_content: after_open[close + THINK_CLOSE_TAG.len()..]
                .trim()
                .to_string(),
            is_complete: true,
        }),
        None => Some(ThinkSegment {
            think_content: after_open.trim().to_string(),
            rest_content: String::new(),
            is_complete: false,
        }),
    }
}

/// Body text to show for `content`: the part after the thinking span, or the
/// whole message when there is none
pub fn visible_body(content: &str) -> &str {
    let Some(after_open) = content.trim_start().strip_prefix(THINK_OPEN_TAG) else {
        return content;
    };
    match after_open.find(THINK_CLOSE_TAG) {
        Some(close) => after_open[close + THINK_CLOSE_TAG.len()..].trim(),
        None => "",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_complete_segment() {
        let result = split_think_segment("  <think>reasoning</think>answer").unwrap();
        assert_eq!(
            result,
            ThinkSegment {
                think_content: "reasoning".to_string(),
                rest_content: "answer".to_string(),
                is_complete: true,
            }
        );
    }

    #[test]
    fn test_partial_segment() {
        let result = split_think_segment("<think>partial reasoning so far").unwrap();
        assert_eq!(result.think_content, "partial reasoning so far");
        assert_eq!(result.rest_content, "");
        assert!(!result.is_complete);
    }

    #[test]
    fn test_tag_not_at_start() {
        assert!(split_think_segment("plain answer with <think> inside").is_none());
        assert!(split_think_segment("").is_none());
        assert!(split_think_segment("   ").is_none());
    }

    #[test]
    fn test_partial_opening_tag_is_not_a_segment() {
        // While `<think>` itself is still arriving the message is plain text
        assert!(split_think_segment("<thi").is_none());
        assert!(split_think_segment("<think").is_none());
    }

    #[test]
    fn test_whitespace_trimmed_inside_segments() {
        let result = split_think_segment("\n<think>\n  step one\n</think>\n\n  The answer.  ").unwrap();
        assert_eq!(result.think_content, "step one");
        assert_eq!(result.rest_content, "The answer.");
        assert!(result.is_complete);
    }

    #[test]
    fn test_only_first_closing_tag_splits() {
        let result = split_think_segment("<think>a</think>b</think>c").unwrap();
        assert_eq!(result.think_content, "a");
        assert_eq!(result.rest_content, "b</think>c");
    }

    #[test]
    fn test_empty_think_segment() {
        let result = split_think_segment("<think></think>").unwrap();
        assert_eq!(result.think_content, "");
        assert_eq!(result.rest_content, "");
        assert!(result.is_complete);
    }

    #[test]
    fn test_idempotent() {
        for input in [
            "  <think>reasoning</think>answer",
            "<think>partial",
            "no tags here",
        ] {
            assert_eq!(split_think_segment(input), split_think_segment(input));
        }
    }

    #[test]
    fn test_growing_content() {
        let full = "<think>look at the prompt</think>Here you go";
        let mut completed_at = None;
        for end in (0..=full.len()).filter(|i| full.is_char_boundary(*i)) {
            let prefix = &full[..end];
            if let Some(segment) = split_think_segment(prefix) {
                if segment.is_complete && completed_at.is_none() {
                    completed_at = Some(end);
                }
                if !segment.is_complete {
                    assert!(segment.rest_content.is_empty());
                }
            }
        }
        let close_end = full.find(THINK_CLOSE_TAG).unwrap() + THINK_CLOSE_TAG.len();
        assert_eq!(completed_at, Some(close_end));
    }

    #[test]
    fn test_visible_body() {
        assert_eq!(visible_body("<think>x</think> answer"), "answer");
        assert_eq!(visible_body("<think>still thinking"), "");
        assert_eq!(visible_body("plain"), "plain");
    }
}
