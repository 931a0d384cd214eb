//! `/think` and `/no_think` directives embedded in chat messages

use crate::request::{ChatMessage, ChatRole};
use regex::Regex;
use std::sync::OnceLock;

fn directive_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)/(?:no[_-]?think|think)\b").expect("directive pattern is valid")
    })
}

/// Strip thinking directives from `content`.
///
/// Returns the trimmed remaining text and the last directive found:
/// `Some(true)` for `/think`, `Some(false)` for any `/no_think` spelling.
pub fn extract_thinking_directive(content: &str) -> (String, Option<bool>) {
    if content.is_empty() {
        return (String::new(), None);
    }

    let mut directive = None;
    let sanitized = directive_pattern().replace_all(content, |caps: &regex::Captures| {
        directive = Some(!caps[0].to_lowercase().contains("no"));
        ""
    });

    (sanitized.trim().to_string(), directive)
}

/// Strip directives from every message; the last directive wins.
/// Messages without a directive are left untouched.
pub fn extract_thinking_directive_from_messages(messages: &mut [ChatMessage]) -> Option<bool> {
    let mut directive = None;
    for message in messages.iter_mut() {
        let (content, found) = extract_thinking_directive(&message.content);
        if found.is_some() {
            directive = found;
            message.content = content;
        }
    }
    directive
}

/// Append the directive to the last user or system message
pub fn apply_thinking_directive(messages: &mut [ChatMessage], directive: Option<bool>) {
    let Some(enabled) = directive else {
        return;
    };
    let Some(target) = messages
        .iter_mut()
        .rev()
        .find(|m| matches!(m.role, ChatRole::User | ChatRole::System))
    else {
        return;
    };

    let token = if enabled { "/think" } else { "/no_think" };
    let content = target.content.trim();
    target.content = if content.is_empty() {
        token.to_string()
    } else {
        format!("{content}\n{token}")
    };
}
