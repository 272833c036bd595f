//! OpenAI-compatible chat-completions client, shared by both backends.

use std::collections::VecDeque;
use std::pin::Pin;

use futures::{Stream, StreamExt, stream};
use privlens_core::ChatMessage;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::sse::{SseDecoder, SseEvent};
use crate::{BackendError, TokenStream};

/// Streaming chat-completion request body.
#[derive(Debug, Serialize)]
pub(crate) struct ChatRequest<'a, X: Serialize> {
    pub model: &'a str,
    pub messages: &'a [ChatMessage],
    pub stream: bool,
    /// Runtime-specific fields merged into the top-level object.
    #[serde(flatten, skip_serializing_if = "Option::is_none")]
    pub extra: Option<&'a X>,
}

#[derive(Debug, Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
    error: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: StreamDelta,
}

#[derive(Debug, Default, Deserialize)]
struct StreamDelta {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ModelList {
    #[serde(default)]
    data: Vec<ModelEntry>,
}

#[derive(Debug, Deserialize)]
struct ModelEntry {
    id: String,
}

/// HTTP client for an OpenAI-compatible `/chat/completions` API.
pub struct ChatClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl ChatClient {
    /// Create a client for the API rooted at `base_url` (e.g. `https://api.openai.com/v1`).
    pub fn new(base_url: &str, api_key: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Model ids served by the API.
    pub async fn list_models(&self) -> Result<Vec<String>, BackendError> {
        let url = format!("{}/models", self.base_url);
        debug!(url = %url, "listing models");
        let mut req = self.client.get(&url);
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }
        let resp = check_status(req.send().await?).await?;
        let list: ModelList = resp.json().await?;
        Ok(list.data.into_iter().map(|m| m.id).collect())
    }

    /// Start a streaming completion and return its content fragments.
    pub(crate) async fn stream_chat<X: Serialize>(
        &self,
        request: &ChatRequest<'_, X>,
    ) -> Result<TokenStream, BackendError> {
        let url = format!("{}/chat/completions", self.base_url);
        info!(
            url = %url,
            model = request.model,
            messages = request.messages.len(),
            "starting chat stream"
        );
        let mut req = self.client.post(&url).json(request);
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }
        let resp = check_status(req.send().await?).await?;
        Ok(token_stream(resp.bytes_stream()))
    }
}

async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response, BackendError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(BackendError::Api {
        status: status.as_u16(),
        body,
    })
}

// ── SSE body → content fragments ──

struct StreamState<S> {
    body: Pin<Box<S>>,
    decoder: SseDecoder,
    pending: VecDeque<String>,
    /// Error that ended the body, yielded once `pending` is drained.
    failed: Option<BackendError>,
    finished: bool,
}

/// Decode an SSE response body into content fragments.
///
/// Ends at `data: [DONE]` or end of body; a chunk carrying `error` ends the
/// stream with [`BackendError::Stream`].
pub(crate) fn token_stream<S, B, E>(body: S) -> TokenStream
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Into<BackendError> + Send + 'static,
{
    let state = StreamState {
        body: Box::pin(body),
        decoder: SseDecoder::default(),
        pending: VecDeque::new(),
        failed: None,
        finished: false,
    };
    stream::try_unfold(state, next_fragment::<S, B, E>).boxed()
}

async fn next_fragment<S, B, E>(
    mut state: StreamState<S>,
) -> Result<Option<(String, StreamState<S>)>, BackendError>
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: Into<BackendError>,
{
    loop {
        if let Some(fragment) = state.pending.pop_front() {
            return Ok(Some((fragment, state)));
        }
        if let Some(e) = state.failed.take() {
            return Err(e);
        }
        if state.finished {
            return Ok(None);
        }

        let events = match state.body.next().await {
            Some(chunk) => {
                let chunk = match chunk {
                    Ok(chunk) => chunk,
                    Err(e) => return Err(e.into()),
                };
                state.decoder.push(chunk.as_ref())
            }
            None => {
                state.finished = true;
                state.decoder.finish()
            }
        };

        for event in events {
            match event {
                SseEvent::Done => {
                    state.finished = true;
                    break;
                }
                SseEvent::Data(data) => match parse_chunk(&data) {
                    Ok(Some(fragment)) => state.pending.push_back(fragment),
                    Ok(None) => {}
                    Err(e) => {
                        state.failed = Some(e);
                        state.finished = true;
                        break;
                    }
                },
            }
        }
    }
}

/// Content fragment carried by one SSE `data:` payload, if any.
fn parse_chunk(data: &str) -> Result<Option<String>, BackendError> {
    let chunk: StreamChunk = serde_json::from_str(data)?;
    if let Some(error) = chunk.error {
        let message = error
            .get("message")
            .and_then(|m| m.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| error.to_string());
        return Err(BackendError::Stream(message));
    }
    Ok(chunk
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.delta.content)
        .filter(|content| !content.is_empty()))
}
