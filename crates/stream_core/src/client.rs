//! HTTP transport for OpenAI-compatible streaming chat completions

use crate::aggregator::{DeltaAggregator, DEFAULT_MAX_IMAGES};
use crate::pipeline::{run_pipeline, PipelineOptions};
use crate::recording::APIRecorder;
use crate::request::{ChatCompletionRequest, DrawingRequest};
use crate::session::StreamSlot;
use crate::streaming::HttpChunkStream;
use crate::types::{ApiError, StreamOutcome};
use crate::utils::check_response_error;
use crate::StreamingCallback;
use anyhow::Result;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Default scheme of the `Authorization` header
pub const DEFAULT_AUTH_SCHEME: &str = "Bearer";

/// Client streaming generation requests through the decode pipeline
pub struct GenerationClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    auth_scheme: Option<String>,
    max_images: usize,
    recorder: Option<APIRecorder>,
}

impl GenerationClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            api_key: None,
            auth_scheme: Some(DEFAULT_AUTH_SCHEME.to_string()),
            max_images: DEFAULT_MAX_IMAGES,
            recorder: None,
        }
    }

    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key.filter(|key| !key.trim().is_empty());
        self
    }

    /// Scheme put before the API key in the `Authorization` header.
    /// `None` (or a blank scheme) sends the bare key.
    pub fn with_auth_scheme(mut self, auth_scheme: Option<String>) -> Self {
        self.auth_scheme = auth_scheme.filter(|scheme| !scheme.trim().is_empty());
        self
    }

    /// Cap on distinct image URLs collected while streaming
    pub fn with_max_images(mut self, max_images: usize) -> Self {
        self.max_images = max_images;
        self
    }

    pub fn with_recorder(mut self, recorder: APIRecorder) -> Self {
        self.recorder = Some(recorder);
        self
    }

    fn authorization(&self) -> Option<String> {
        let api_key = self.api_key.as_ref()?;
        Some(match &self.auth_scheme {
            Some(scheme) => format!("{} {api_key}", scheme.trim()),
            None => api_key.clone(),
        })
    }

    fn get_url(&self) -> String {
        format!("{}/v1/chat/completions", self.base_url.trim_end_matches('/'))
    }

    /// Stream a chat completion, keeping at most `quantity` image URLs.
    ///
    /// Returns [`StreamOutcome::Cancelled`] once `token` fires, also when the
    /// transport fails after the cancellation.
    pub async fn stream_chat(
        &self,
        request: &ChatCompletionRequest,
        quantity: usize,
        token: &CancellationToken,
        streaming_callback: Option<&StreamingCallback>,
    ) -> Result<StreamOutcome> {
        let result = self
            .try_stream_chat(request, quantity, token, streaming_callback)
            .await;
        match result {
            Err(e) if token.is_cancelled() => {
                debug!("Ignoring error of cancelled stream: {}", e);
                Ok(StreamOutcome::Cancelled)
            }
            other => other,
        }
    }

    async fn try_stream_chat(
        &self,
        request: &ChatCompletionRequest,
        quantity: usize,
        token: &CancellationToken,
        streaming_callback: Option<&StreamingCallback>,
    ) -> Result<StreamOutcome> {
        let request = request
            .clone()
            .normalize_thinking_directive()
            .into_streaming();
        let request_json = serde_json::to_value(&request)?;
        debug!("Sending streaming request: {}", request_json);

        let mut request_builder = self
            .client
            .post(self.get_url())
            .header("Accept", "text/event-stream");
        if let Some(authorization) = self.authorization() {
            request_builder = request_builder.header("Authorization", authorization);
        }

        let response = tokio::select! {
            biased;
            _ = token.cancelled() => return Ok(StreamOutcome::Cancelled),
            response = request_builder.json(&request_json).send() => {
                response.map_err(|e| ApiError::NetworkError(e.to_string()))?
            }
        };
        let response = check_response_error(response).await?;

        if let Some(recorder) = &self.recorder {
            recorder.start_recording(request_json);
        }

        // Collection never keeps fewer URLs than the caller asked for
        let mut aggregator = DeltaAggregator::new(self.max_images.max(quantity));
        if let Some(callback) = streaming_callback {
            aggregator = aggregator.with_callback(callback);
        }
        let options = PipelineOptions {
            quantity,
            recorder: self.recorder.as_ref(),
        };

        let mut source = HttpChunkStream::new(response);
        let outcome = run_pipeline(&mut source, aggregator, token, options).await;

        if let Some(recorder) = &self.recorder {
            if let Err(e) = recorder.end_recording() {
                warn!("Failed to save recording: {}", e);
            }
        }
        outcome
    }

    /// Run a drawing request as the only active stream of `slot`.
    ///
    /// Any stream previously started through the same slot is cancelled first.
    pub async fn draw(
        &self,
        request: &DrawingRequest,
        slot: &StreamSlot,
        streaming_callback: Option<&StreamingCallback>,
    ) -> Result<StreamOutcome> {
        let chat_request = request.to_chat_request()?;
        let ticket = slot.begin();
        info!(
            "Starting drawing stream {} with model {}",
            ticket.id(),
            request.model
        );

        let outcome = self
            .stream_chat(
                &chat_request,
                request.quantity,
                ticket.token(),
                streaming_callback,
            )
            .await;

        if !slot.is_current(&ticket) {
            debug!("Drawing stream {} no longer owns the slot", ticket.id());
        }
        slot.release(&ticket);
        outcome
    }
}
