//! HTTP client for scanning pages and downloading privacy policies.

use std::time::Duration;

use privlens_core::{PageRequest, PrivacyUrlResponse};
use thiserror::Error;
use tracing::{debug, info};
use url::Url;

use crate::extract::{anchor_urls, policy_text, truncate_words};

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server returned {status} for {url}")]
    Status { status: u16, url: String },
    #[error("invalid URL {url}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error("Failed to parse privacy policy at {url}")]
    EmptyPolicy { url: String },
}

/// Client settings.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub timeout: Duration,
    pub max_redirects: usize,
    pub user_agent: String,
    /// Truncate extracted policy text to this many characters.
    pub max_chars: Option<usize>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            max_redirects: 10,
            user_agent: format!("privlens/{}", env!("CARGO_PKG_VERSION")),
            max_chars: None,
        }
    }
}

/// Fetches pages on behalf of the analysis pipeline.
///
/// A page's anchors stand in for the live document a browser would expose:
/// they are resolved against the final URL after redirects and handed to the
/// privacy-link matcher.
pub struct PolicyClient {
    client: reqwest::Client,
    config: FetchConfig,
}

impl PolicyClient {
    pub fn new(config: FetchConfig) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .build()?;
        Ok(Self { client, config })
    }

    /// Every resolved anchor URL on the page at `page_url`.
    pub async fn scan_page(&self, page_url: &str) -> Result<Vec<String>, FetchError> {
        let (final_url, html) = self.get_html(page_url).await?;
        let anchors = anchor_urls(&html, &final_url);
        info!(url = %final_url, anchors = anchors.len(), "scanned page");
        Ok(anchors)
    }

    /// Send a page-context request to the page at `page_url`.
    pub async fn request(
        &self,
        page_url: &str,
        request: PageRequest,
    ) -> Result<PrivacyUrlResponse, FetchError> {
        let anchors = self.scan_page(page_url).await?;
        Ok(request.answer(&anchors))
    }

    /// Best privacy-policy link on the page, if any.
    pub async fn privacy_policy_url(&self, page_url: &str) -> Result<Option<String>, FetchError> {
        let response = self.request(page_url, PageRequest::GetPrivacyUrl).await?;
        Ok(response.into_url())
    }

    /// Download `url` and extract the policy's readable text.
    ///
    /// An empty extraction is [`FetchError::EmptyPolicy`], distinct from any
    /// transport failure.
    pub async fn fetch_policy(&self, url: &str) -> Result<String, FetchError> {
        let (final_url, html) = self.get_html(url).await?;
        let text = policy_text(&html);
        if text.is_empty() {
            return Err(FetchError::EmptyPolicy {
                url: final_url.to_string(),
            });
        }
        let text = match self.config.max_chars {
            Some(max) => truncate_words(&text, max),
            None => text,
        };
        info!(url = %final_url, chars = text.chars().count(), "fetched privacy policy");
        Ok(text)
    }

    async fn get_html(&self, url: &str) -> Result<(Url, String), FetchError> {
        let parsed = Url::parse(url).map_err(|source| FetchError::InvalidUrl {
            url: url.to_string(),
            source,
        })?;

        debug!(url = %parsed, "GET");
        let resp = self.client.get(parsed).send().await?;
        let status = resp.status();
        let final_url = resp.url().clone();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                url: final_url.to_string(),
            });
        }
        let html = resp.text().await?;
        Ok((final_url, html))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use privlens_core::ResponseStatus;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client() -> PolicyClient {
        PolicyClient::new(FetchConfig::default()).unwrap()
    }

    async fn serve(server: &MockServer, at: &str, status: u16, body: &str) {
        Mock::given(method("GET"))
            .and(path(at))
            .respond_with(
                ResponseTemplate::new(status)
                    .set_body_raw(body.to_string(), "text/html; charset=utf-8"),
            )
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn finds_best_link_on_page() {
        let server = MockServer::start().await;
        serve(
            &server,
            "/",
            200,
            r#"<html><body>
                <a href="/about">About</a>
                <a href="/terms">Terms</a>
                <a href="/legal/privacy-policy">Privacy</a>
            </body></html>"#,
        )
        .await;

        let url = client()
            .privacy_policy_url(&format!("{}/", server.uri()))
            .await
            .unwrap();
        assert_eq!(url, Some(format!("{}/legal/privacy-policy", server.uri())));
    }

    #[tokio::test]
    async fn page_without_policy_link_answers_error() {
        let server = MockServer::start().await;
        serve(&server, "/", 200, r#"<a href="/blog">Blog</a>"#).await;

        let resp = client()
            .request(&format!("{}/", server.uri()), PageRequest::GetPrivacyUrl)
            .await
            .unwrap();
        assert_eq!(resp.status, ResponseStatus::Error);
        assert_eq!(resp.privacy_policy_url, None);
    }

    #[tokio::test]
    async fn anchors_resolve_against_redirect_target() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/old"))
            .respond_with(ResponseTemplate::new(302).insert_header("location", "/new/home"))
            .mount(&server)
            .await;
        serve(&server, "/new/home", 200, r#"<a href="privacy">p</a>"#).await;

        let anchors = client()
            .scan_page(&format!("{}/old", server.uri()))
            .await
            .unwrap();
        assert_eq!(anchors, vec![format!("{}/new/privacy", server.uri())]);
    }

    #[tokio::test]
    async fn fetch_policy_extracts_main() {
        let server = MockServer::start().await;
        serve(
            &server,
            "/privacy",
            200,
            "<html><body><nav>menu</nav><main><h1>Privacy</h1><p>We share data.</p></main></body></html>",
        )
        .await;

        let text = client()
            .fetch_policy(&format!("{}/privacy", server.uri()))
            .await
            .unwrap();
        assert_eq!(text, "Privacy\nWe share data.");
    }

    #[tokio::test]
    async fn fetch_policy_respects_max_chars() {
        let server = MockServer::start().await;
        serve(&server, "/p", 200, "<p>one two three four five six</p>").await;

        let client = PolicyClient::new(FetchConfig {
            max_chars: Some(12),
            ..FetchConfig::default()
        })
        .unwrap();
        let text = client.fetch_policy(&format!("{}/p", server.uri())).await.unwrap();
        assert_eq!(text, "one two...");
    }

    #[tokio::test]
    async fn empty_policy_is_extraction_failure() {
        let server = MockServer::start().await;
        serve(&server, "/privacy", 200, "<html><body><script>x()</script></body></html>").await;

        let err = client()
            .fetch_policy(&format!("{}/privacy", server.uri()))
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::EmptyPolicy { .. }));
        assert!(err.to_string().starts_with("Failed to parse privacy policy"));
    }

    #[tokio::test]
    async fn error_status_is_reported() {
        let server = MockServer::start().await;
        serve(&server, "/privacy", 404, "not here").await;

        let err = client()
            .fetch_policy(&format!("{}/privacy", server.uri()))
            .await
            .unwrap_err();
        match err {
            FetchError::Status { status, .. } => assert_eq!(status, 404),
            other => panic!("expected Status, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn invalid_url_rejected_before_request() {
        let err = client().fetch_policy("not a url").await.unwrap_err();
        assert!(matches!(err, FetchError::InvalidUrl { .. }));
    }

    #[tokio::test]
    async fn connection_failure_is_http_error() {
        // Port 9 (discard) on localhost is closed in test environments.
        let err = client().scan_page("http://127.0.0.1:9/").await.unwrap_err();
        assert!(matches!(err, FetchError::Http(_)));
    }
}
