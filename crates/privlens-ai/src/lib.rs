//! AI layer: local and remote streaming backends behind one capability,
//! plus the orchestrator that turns a policy into a rendered critique.

mod analyzer;
mod backend;
mod error;
mod local;
mod openai;
mod remote;
mod sse;

pub use analyzer::{AnalysisError, Analyzer};
pub use backend::{Backend, HistoryMode, InitProgress, TokenStream};
pub use error::BackendError;
pub use local::{
    ChatEngine, DEFAULT_LOCAL_URL, DEFAULT_MODEL, EngineConfig, HttpEngine, HttpRuntime,
    LocalBackend, LocalRuntime,
};
pub use openai::ChatClient;
pub use remote::{DEFAULT_REMOTE_MODEL, DEFAULT_REMOTE_URL, RemoteBackend};
