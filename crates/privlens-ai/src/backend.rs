//! The one capability every text-generation backend provides.

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::BackendError;

/// Lazy, finite, non-restartable sequence of generated text fragments.
pub type TokenStream = BoxStream<'static, Result<String, BackendError>>;

/// How a new message relates to earlier turns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HistoryMode {
    /// Single-shot: history becomes just the new message.
    #[default]
    Replace,
    /// Multi-turn: the new message is pushed onto history.
    Append,
}

/// Engine loading progress, `progress` in percent.
#[derive(Debug, Clone, PartialEq)]
pub struct InitProgress {
    pub text: String,
    pub progress: f32,
}

impl InitProgress {
    pub fn new(text: impl Into<String>, progress: f32) -> Self {
        Self {
            text: text.into(),
            progress,
        }
    }
}

impl std::fmt::Display for InitProgress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({}%)", self.text, self.progress)
    }
}

/// Streaming completion backend.
///
/// Implementations are driven through `&mut self`, so at most one stream per
/// backend is being set up at a time.
#[async_trait]
pub trait Backend: Send {
    /// Short identifier used in logs.
    fn name(&self) -> &'static str;

    /// Whether [`stream`](Self::stream) can be called.
    fn is_ready(&self) -> bool;

    /// Make the backend ready, reporting progress along the way.
    async fn prepare(
        &mut self,
        _progress: &mut (dyn FnMut(InitProgress) + Send),
    ) -> Result<(), BackendError> {
        Ok(())
    }

    /// Send `prompt` and stream the reply.
    async fn stream(&mut self, prompt: &str, mode: HistoryMode)
    -> Result<TokenStream, BackendError>;

    /// Remember the full reply to the last prompt, for backends with history.
    fn record_reply(&mut self, _reply: &str) {}

    /// Drop the prompt of a turn that got no complete reply.
    fn discard_turn(&mut self) {}

    /// Forget all earlier turns.
    fn clear_history(&mut self) {}
}
