//! Cache-key derivation from a page URL.

use thiserror::Error;
use url::Url;

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("invalid URL {url}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error("URL has no host: {0}")]
    NoHost(String),
}

/// Authority (`host[:port]`) of `url`.
///
/// The port is kept only when it is explicit and not the scheme default,
/// so `https://a.com:443/x` and `https://a.com/y` share one key.
pub fn tab_domain(url: &str) -> Result<String, DomainError> {
    let parsed = Url::parse(url).map_err(|source| DomainError::InvalidUrl {
        url: url.to_string(),
        source,
    })?;
    let host = parsed
        .host_str()
        .ok_or_else(|| DomainError::NoHost(url.to_string()))?;
    Ok(match parsed.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    })
}
