//! Local model backend.
//!
//! The model runs in a separate runtime process; this side loads it once per
//! session and owns the conversation history sent with every request.

use async_trait::async_trait;
use privlens_core::{ChatMessage, Role};
use serde::Serialize;
use tracing::{debug, error, info};

use crate::backend::{Backend, HistoryMode, InitProgress, TokenStream};
use crate::openai::{ChatClient, ChatRequest};
use crate::BackendError;

pub const DEFAULT_MODEL: &str = "Llama-3.2-1B-Instruct-q4f32_1-MLC";
pub const DEFAULT_LOCAL_URL: &str = "http://127.0.0.1:8080/v1";

/// Model selection and window sizing handed to the runtime at load time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EngineConfig {
    #[serde(skip)]
    pub model_id: String,
    /// `-1` lets the runtime use the model's full context.
    pub context_window_size: i64,
    pub sliding_window_size: i64,
    pub attention_sink_size: i64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            model_id: DEFAULT_MODEL.to_string(),
            context_window_size: -1,
            sliding_window_size: 1024,
            attention_sink_size: 4,
        }
    }
}

/// A loaded model that streams chat completions.
#[async_trait]
pub trait ChatEngine: Send + Sync {
    async fn chat_stream(&self, messages: &[ChatMessage]) -> Result<TokenStream, BackendError>;
}

/// Something that can load a [`ChatEngine`].
#[async_trait]
pub trait LocalRuntime: Send + Sync {
    type Engine: ChatEngine;

    async fn load(
        &self,
        config: &EngineConfig,
        progress: &mut (dyn FnMut(InitProgress) + Send),
    ) -> Result<Self::Engine, BackendError>;
}

// ── HTTP runtime ──

/// OpenAI-compatible model server on the local machine (llama.cpp server,
/// Ollama, and the like).
pub struct HttpRuntime {
    base_url: String,
}

impl HttpRuntime {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }
}

impl Default for HttpRuntime {
    fn default() -> Self {
        Self::new(DEFAULT_LOCAL_URL)
    }
}

/// Engine served by an [`HttpRuntime`].
pub struct HttpEngine {
    client: ChatClient,
    config: EngineConfig,
}

#[async_trait]
impl LocalRuntime for HttpRuntime {
    type Engine = HttpEngine;

    async fn load(
        &self,
        config: &EngineConfig,
        progress: &mut (dyn FnMut(InitProgress) + Send),
    ) -> Result<HttpEngine, BackendError> {
        progress(InitProgress::new(
            format!("Connecting to {}", self.base_url),
            0.0,
        ));
        let client = ChatClient::new(&self.base_url, None);
        let models = client
            .list_models()
            .await
            .map_err(|e| BackendError::Load(e.to_string()))?;

        // An empty list means the server does not enumerate; trust the config.
        if !models.is_empty() && !models.iter().any(|m| m == &config.model_id) {
            return Err(BackendError::Load(format!(
                "model {} is not served by {} (available: {})",
                config.model_id,
                self.base_url,
                models.join(", ")
            )));
        }

        progress(InitProgress::new(format!("Loaded {}", config.model_id), 100.0));
        Ok(HttpEngine {
            client,
            config: config.clone(),
        })
    }
}

#[async_trait]
impl ChatEngine for HttpEngine {
    async fn chat_stream(&self, messages: &[ChatMessage]) -> Result<TokenStream, BackendError> {
        let request = ChatRequest {
            model: &self.config.model_id,
            messages,
            stream: true,
            extra: Some(&self.config),
        };
        self.client.stream_chat(&request).await
    }
}

// ── Backend ──

/// Local backend with session conversation history.
pub struct LocalBackend<R: LocalRuntime> {
    runtime: R,
    config: EngineConfig,
    engine: Option<R::Engine>,
    history: Vec<ChatMessage>,
}

impl<R: LocalRuntime> LocalBackend<R> {
    pub fn new(runtime: R, config: EngineConfig) -> Self {
        Self {
            runtime,
            config,
            engine: None,
            history: Vec::new(),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Messages sent with the most recent request, plus any recorded reply.
    pub fn history(&self) -> &[ChatMessage] {
        &self.history
    }
}

#[async_trait]
impl<R: LocalRuntime> Backend for LocalBackend<R> {
    fn name(&self) -> &'static str {
        "local"
    }

    fn is_ready(&self) -> bool {
        self.engine.is_some()
    }

    async fn prepare(
        &mut self,
        progress: &mut (dyn FnMut(InitProgress) + Send),
    ) -> Result<(), BackendError> {
        if self.engine.is_some() {
            return Ok(());
        }
        match self.runtime.load(&self.config, progress).await {
            Ok(engine) => {
                info!(model = %self.config.model_id, "engine loaded");
                self.engine = Some(engine);
                Ok(())
            }
            Err(e) => {
                error!(error = %e, "error loading engine");
                Err(e)
            }
        }
    }

    async fn stream(
        &mut self,
        prompt: &str,
        mode: HistoryMode,
    ) -> Result<TokenStream, BackendError> {
        let Some(engine) = &self.engine else {
            return Err(BackendError::NotReady { backend: "local" });
        };

        match mode {
            HistoryMode::Replace => self.history = vec![ChatMessage::user(prompt)],
            HistoryMode::Append => self.history.push(ChatMessage::user(prompt)),
        }
        debug!(turns = self.history.len(), ?mode, "sending history");
        engine.chat_stream(&self.history).await
    }

    fn record_reply(&mut self, reply: &str) {
        self.history.push(ChatMessage::assistant(reply));
    }

    fn discard_turn(&mut self) {
        if self.history.last().is_some_and(|m| m.role == Role::User) {
            self.history.pop();
        }
    }

    fn clear_history(&mut self) {
        self.history.clear();
    }
}
