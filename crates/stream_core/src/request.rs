use crate::directive::{
    apply_thinking_directive, extract_thinking_directive, extract_thinking_directive_from_messages,
};
use crate::types::ApiError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: ChatRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

#[derive(Debug, Serialize, Clone)]
struct StreamOptions {
    include_usage: bool,
}

/// OpenAI-compatible chat completion request body
#[derive(Debug, Serialize, Clone)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream_options: Option<StreamOptions>,
}

impl ChatCompletionRequest {
    pub fn new(model: impl Into<String>, messages: Vec<ChatMessage>) -> Self {
        Self {
            model: model.into(),
            messages,
            temperature: 1.0,
            stream: None,
            stream_options: None,
        }
    }

    /// Request a streamed response with usage reported in the final chunk
    pub fn into_streaming(mut self) -> Self {
        self.stream = Some(true);
        self.stream_options = Some(StreamOptions {
            include_usage: true,
        });
        self
    }

    /// Move thinking directives found anywhere in the conversation to the
    /// last user or system message, normalized
    pub fn normalize_thinking_directive(mut self) -> Self {
        let directive = extract_thinking_directive_from_messages(&mut self.messages);
        apply_thinking_directive(&mut self.messages, directive);
        self
    }

}

/// Parameters of an image generation ("drawing") request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrawingRequest {
    pub model: String,
    pub prompt: String,
    /// Number of images wanted; also the number of URLs kept at finalization
    pub quantity: usize,
    /// Aspect ratio hint such as `1:1` or `16:9`
    pub ratio: String,
}

impl DrawingRequest {
    /// Build the chat request. A thinking directive in the prompt is moved
    /// behind the quantity and ratio hints, normalized.
    pub fn to_chat_request(&self) -> Result<ChatCompletionRequest, ApiError> {
        let (prompt, directive) = extract_thinking_directive(&self.prompt);
        if prompt.is_empty() {
            return Err(ApiError::InvalidRequest("prompt must not be empty".to_string()));
        }
        if self.model.trim().is_empty() {
            return Err(ApiError::InvalidRequest("model must not be empty".to_string()));
        }

        let mut messages = vec![
            ChatMessage::new(ChatRole::System, " "),
            ChatMessage::new(
                ChatRole::User,
                format!("{prompt};{} image, ratio {}", self.quantity, self.ratio),
            ),
        ];

        apply_thinking_directive(&mut messages, directive);

        Ok(ChatCompletionRequest::new(self.model.clone(), messages).into_streaming())
    }
}
