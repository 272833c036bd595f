use thiserror::Error;

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("{backend} backend is not ready")]
    NotReady { backend: &'static str },

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("malformed stream chunk: {0}")]
    Json(#[from] serde_json::Error),

    #[error("stream error: {0}")]
    Stream(String),

    #[error("failed to load the engine: {0}")]
    Load(String),
}
