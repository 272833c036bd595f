//! Remote chat-completion backend.

use async_trait::async_trait;
use privlens_core::ChatMessage;
use tracing::debug;

use crate::backend::{Backend, HistoryMode, TokenStream};
use crate::openai::{ChatClient, ChatRequest};
use crate::BackendError;

pub const DEFAULT_REMOTE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_REMOTE_MODEL: &str = "gpt-3.5-turbo";

/// Stateless backend: every call sends exactly one user message.
///
/// Without an API key there is no client and the backend reports not ready.
pub struct RemoteBackend {
    client: Option<ChatClient>,
    model: String,
}

impl RemoteBackend {
    pub fn new(api_key: &str) -> Self {
        Self::with_url(api_key, DEFAULT_REMOTE_URL, DEFAULT_REMOTE_MODEL)
    }

    /// Backend for any OpenAI-compatible endpoint.
    pub fn with_url(api_key: &str, base_url: &str, model: &str) -> Self {
        let key = api_key.trim();
        let client = (!key.is_empty()).then(|| ChatClient::new(base_url, Some(key.to_string())));
        Self {
            client,
            model: model.to_string(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl Backend for RemoteBackend {
    fn name(&self) -> &'static str {
        "remote"
    }

    fn is_ready(&self) -> bool {
        self.client.is_some()
    }

    async fn stream(
        &mut self,
        prompt: &str,
        mode: HistoryMode,
    ) -> Result<TokenStream, BackendError> {
        let Some(client) = &self.client else {
            return Err(BackendError::NotReady { backend: "remote" });
        };
        if mode == HistoryMode::Append {
            debug!("remote backend keeps no history; sending single message");
        }
        let messages = [ChatMessage::user(prompt)];
        let request: ChatRequest<'_, ()> = ChatRequest {
            model: &self.model,
            messages: &messages,
            stream: true,
            extra: None,
        };
        client.stream_chat(&request).await
    }
}
