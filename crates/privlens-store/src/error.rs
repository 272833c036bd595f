use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("cache file {path}: {source}")]
    Io {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cache file is not a JSON object of strings: {0}")]
    Json(#[from] serde_json::Error),

    #[error("replacing cache file failed: {0}")]
    Persist(#[from] tempfile::PersistError),

    #[error("{0}")]
    Other(String),
}
