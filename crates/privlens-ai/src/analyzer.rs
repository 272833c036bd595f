//! Analysis orchestration: prompt in, incrementally rendered critique out.

use std::time::Duration;

use futures::StreamExt;
use privlens_core::build_prompt;
use thiserror::Error;
use tracing::{error, info};

use crate::backend::{Backend, HistoryMode, InitProgress, TokenStream};
use crate::BackendError;

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error("backend produced nothing for {0:?}")]
    Stalled(Duration),
}

/// Drives one backend for the lifetime of a session.
///
/// Holds the output buffer that fragments accumulate into. Every method takes
/// `&mut self`, so only one analysis writes to the buffer at a time.
pub struct Analyzer {
    backend: Box<dyn Backend>,
    output: String,
    stall_timeout: Option<Duration>,
}

impl Analyzer {
    pub fn new(backend: Box<dyn Backend>) -> Self {
        Self {
            backend,
            output: String::new(),
            stall_timeout: None,
        }
    }

    /// Fail a run when no fragment arrives within `timeout`.
    pub fn with_stall_timeout(mut self, timeout: Duration) -> Self {
        self.stall_timeout = Some(timeout);
        self
    }

    pub fn backend(&self) -> &dyn Backend {
        self.backend.as_ref()
    }

    /// Text accumulated by the most recent run, complete or not.
    pub fn output(&self) -> &str {
        &self.output
    }

    pub async fn prepare(
        &mut self,
        progress: &mut (dyn FnMut(InitProgress) + Send),
    ) -> Result<(), BackendError> {
        self.backend.prepare(progress).await
    }

    pub fn clear_history(&mut self) {
        self.backend.clear_history();
    }

    /// Critique `policy`, calling `on_token` with each fragment as it arrives.
    ///
    /// Runs single-shot. On failure the fragments received so far stay in
    /// [`output`](Self::output).
    pub async fn analyze<F>(&mut self, policy: &str, on_token: F) -> Result<(), AnalysisError>
    where
        F: FnMut(&str),
    {
        self.ask(&build_prompt(policy), HistoryMode::Replace, on_token)
            .await
    }

    /// Send `message` and stream the reply into the output buffer.
    ///
    /// A turn that fails once streaming has started is dropped from the
    /// backend's history, so the next `Append` does not resend it.
    pub async fn ask<F>(
        &mut self,
        message: &str,
        mode: HistoryMode,
        mut on_token: F,
    ) -> Result<(), AnalysisError>
    where
        F: FnMut(&str),
    {
        self.output.clear();
        info!(backend = self.backend.name(), ?mode, "starting analysis");

        let mut stream = self.backend.stream(message, mode).await?;
        if let Err(e) = self.drain(&mut stream, &mut on_token).await {
            self.backend.discard_turn();
            return Err(e);
        }

        info!(chars = self.output.len(), "analysis complete");
        self.backend.record_reply(&self.output);
        Ok(())
    }

    async fn drain<F>(
        &mut self,
        stream: &mut TokenStream,
        on_token: &mut F,
    ) -> Result<(), AnalysisError>
    where
        F: FnMut(&str),
    {
        loop {
            let next = match self.stall_timeout {
                Some(limit) => tokio::time::timeout(limit, stream.next())
                    .await
                    .map_err(|_| AnalysisError::Stalled(limit))?,
                None => stream.next().await,
            };
            let Some(fragment) = next else {
                return Ok(());
            };
            let fragment = fragment.inspect_err(|e| error!(error = %e, "error streaming chat"))?;
            self.output.push_str(&fragment);
            on_token(&fragment);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::local::{ChatEngine, EngineConfig, LocalBackend, LocalRuntime};
    use async_trait::async_trait;
    use futures::stream;
    use privlens_core::ChatMessage;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct Log {
        prompts: Vec<(String, HistoryMode)>,
        replies: Vec<String>,
    }

    /// Backend that replays a fixed script of fragments and errors.
    struct ScriptedBackend {
        script: Vec<Result<&'static str, &'static str>>,
        log: Arc<Mutex<Log>>,
        hang: bool,
    }

    impl ScriptedBackend {
        fn new(script: Vec<Result<&'static str, &'static str>>) -> (Self, Arc<Mutex<Log>>) {
            let log = Arc::new(Mutex::new(Log::default()));
            let backend = Self {
                script,
                log: log.clone(),
                hang: false,
            };
            (backend, log)
        }
    }

    #[async_trait]
    impl Backend for ScriptedBackend {
        fn name(&self) -> &'static str {
            "scripted"
        }

        fn is_ready(&self) -> bool {
            true
        }

        async fn stream(
            &mut self,
            prompt: &str,
            mode: HistoryMode,
        ) -> Result<TokenStream, BackendError> {
            self.log.lock().unwrap().prompts.push((prompt.to_string(), mode));
            if self.hang {
                return Ok(stream::pending().boxed());
            }
            let items: Vec<Result<String, BackendError>> = self
                .script
                .iter()
                .map(|step| match step {
                    Ok(s) => Ok(s.to_string()),
                    Err(e) => Err(BackendError::Stream(e.to_string())),
                })
                .collect();
            Ok(stream::iter(items).boxed())
        }

        fn record_reply(&mut self, reply: &str) {
            self.log.lock().unwrap().replies.push(reply.to_string());
        }
    }

    #[tokio::test]
    async fn fragments_accumulate_and_render_in_order() {
        let (backend, log) = ScriptedBackend::new(vec![Ok("<p>Sum"), Ok("mary</p>"), Ok("<ul></ul>")]);
        let mut analyzer = Analyzer::new(Box::new(backend));

        let mut rendered = Vec::new();
        analyzer
            .analyze("We keep data forever.", |t| rendered.push(t.to_string()))
            .await
            .unwrap();

        assert_eq!(rendered, vec!["<p>Sum", "mary</p>", "<ul></ul>"]);
        assert_eq!(analyzer.output(), "<p>Summary</p><ul></ul>");

        let log = log.lock().unwrap();
        let (prompt, mode) = &log.prompts[0];
        assert_eq!(*mode, HistoryMode::Replace);
        assert_eq!(prompt, &build_prompt("We keep data forever."));
        assert_eq!(log.replies, vec!["<p>Summary</p><ul></ul>"]);
    }

    #[tokio::test]
    async fn mid_stream_failure_rejects_once_and_keeps_partial_output() {
        let (backend, log) = ScriptedBackend::new(vec![Ok("<p>part"), Err("boom"), Ok("never")]);
        let mut analyzer = Analyzer::new(Box::new(backend));

        let mut rendered = Vec::new();
        let (mut succeeded, mut failed) = (0, 0);
        match analyzer.analyze("policy", |t| rendered.push(t.to_string())).await {
            Ok(()) => succeeded += 1,
            Err(_) => failed += 1,
        }

        assert_eq!((succeeded, failed), (0, 1));
        assert_eq!(rendered, vec!["<p>part"]);
        assert_eq!(analyzer.output(), "<p>part");
        assert!(log.lock().unwrap().replies.is_empty());
    }

    #[tokio::test]
    async fn new_run_clears_previous_output() {
        let (backend, _) = ScriptedBackend::new(vec![Ok("x")]);
        let mut analyzer = Analyzer::new(Box::new(backend));
        analyzer.analyze("a", |_| {}).await.unwrap();
        analyzer.analyze("b", |_| {}).await.unwrap();
        assert_eq!(analyzer.output(), "x");
    }

    #[tokio::test]
    async fn ask_passes_history_mode_through() {
        let (backend, log) = ScriptedBackend::new(vec![Ok("y")]);
        let mut analyzer = Analyzer::new(Box::new(backend));
        analyzer
            .ask("follow-up?", HistoryMode::Append, |_| {})
            .await
            .unwrap();
        assert_eq!(
            log.lock().unwrap().prompts[0],
            ("follow-up?".to_string(), HistoryMode::Append)
        );
    }

    #[tokio::test]
    async fn stalled_backend_times_out() {
        let (mut backend, _) = ScriptedBackend::new(vec![]);
        backend.hang = true;
        let mut analyzer =
            Analyzer::new(Box::new(backend)).with_stall_timeout(Duration::from_millis(20));
        let err = analyzer.analyze("p", |_| {}).await.unwrap_err();
        assert!(matches!(err, AnalysisError::Stalled(_)));
    }

    // A local backend that was never prepared.
    struct NeverLoads;
    struct NoEngine;

    #[async_trait]
    impl ChatEngine for NoEngine {
        async fn chat_stream(&self, _: &[ChatMessage]) -> Result<TokenStream, BackendError> {
            unreachable!()
        }
    }

    #[async_trait]
    impl LocalRuntime for NeverLoads {
        type Engine = NoEngine;

        async fn load(
            &self,
            _: &EngineConfig,
            _: &mut (dyn FnMut(InitProgress) + Send),
        ) -> Result<NoEngine, BackendError> {
            Err(BackendError::Load("unavailable".into()))
        }
    }

    #[tokio::test]
    async fn unprepared_backend_is_not_ready_error() {
        let backend = LocalBackend::new(NeverLoads, EngineConfig::default());
        let mut analyzer = Analyzer::new(Box::new(backend));
        assert!(analyzer.prepare(&mut |_| {}).await.is_err());
        let err = analyzer.analyze("p", |_| {}).await.unwrap_err();
        assert!(matches!(
            err,
            AnalysisError::Backend(BackendError::NotReady { .. })
        ));
        assert_eq!(analyzer.output(), "");
    }

    // A local backend whose engine records each history it is sent.
    type Sent = Arc<Mutex<Vec<Vec<ChatMessage>>>>;

    struct EchoRuntime {
        sent: Sent,
        fail_next: Arc<Mutex<bool>>,
    }

    struct EchoEngine {
        sent: Sent,
        fail_next: Arc<Mutex<bool>>,
    }

    #[async_trait]
    impl ChatEngine for EchoEngine {
        async fn chat_stream(&self, messages: &[ChatMessage]) -> Result<TokenStream, BackendError> {
            self.sent.lock().unwrap().push(messages.to_vec());
            let mut items = vec![Ok("reply".to_string())];
            if std::mem::take(&mut *self.fail_next.lock().unwrap()) {
                items.push(Err(BackendError::Stream("dropped".into())));
            }
            Ok(stream::iter(items).boxed())
        }
    }

    #[async_trait]
    impl LocalRuntime for EchoRuntime {
        type Engine = EchoEngine;

        async fn load(
            &self,
            _: &EngineConfig,
            _: &mut (dyn FnMut(InitProgress) + Send),
        ) -> Result<EchoEngine, BackendError> {
            Ok(EchoEngine {
                sent: self.sent.clone(),
                fail_next: self.fail_next.clone(),
            })
        }
    }

    async fn echo_analyzer() -> (Analyzer, Sent, Arc<Mutex<bool>>) {
        let sent = Sent::default();
        let fail_next = Arc::new(Mutex::new(false));
        let runtime = EchoRuntime {
            sent: sent.clone(),
            fail_next: fail_next.clone(),
        };
        let backend = LocalBackend::new(runtime, EngineConfig::default());
        let mut analyzer = Analyzer::new(Box::new(backend));
        analyzer.prepare(&mut |_| {}).await.unwrap();
        (analyzer, sent, fail_next)
    }

    #[tokio::test]
    async fn clear_history_starts_a_fresh_conversation() {
        let (mut analyzer, sent, _) = echo_analyzer().await;
        analyzer.ask("q1", HistoryMode::Append, |_| {}).await.unwrap();
        analyzer.clear_history();
        analyzer.ask("q2", HistoryMode::Append, |_| {}).await.unwrap();

        let sent = sent.lock().unwrap();
        assert_eq!(sent[0], vec![ChatMessage::user("q1")]);
        assert_eq!(sent[1], vec![ChatMessage::user("q2")]);
    }

    #[tokio::test]
    async fn replies_carry_into_next_append() {
        let (mut analyzer, sent, _) = echo_analyzer().await;
        analyzer.analyze("policy", |_| {}).await.unwrap();
        analyzer.ask("q", HistoryMode::Append, |_| {}).await.unwrap();

        let sent = sent.lock().unwrap();
        assert_eq!(sent[1].len(), 3);
        assert_eq!(sent[1][1], ChatMessage::assistant("reply"));
        assert_eq!(sent[1][2], ChatMessage::user("q"));
    }

    #[tokio::test]
    async fn failed_follow_up_is_not_resent() {
        let (mut analyzer, sent, fail_next) = echo_analyzer().await;
        analyzer.ask("q1", HistoryMode::Append, |_| {}).await.unwrap();
        *fail_next.lock().unwrap() = true;
        assert!(analyzer.ask("lost", HistoryMode::Append, |_| {}).await.is_err());
        assert_eq!(analyzer.output(), "reply");
        analyzer.ask("q2", HistoryMode::Append, |_| {}).await.unwrap();

        let sent = sent.lock().unwrap();
        assert_eq!(
            sent[2],
            vec![
                ChatMessage::user("q1"),
                ChatMessage::assistant("reply"),
                ChatMessage::user("q2"),
            ]
        );
    }
}
