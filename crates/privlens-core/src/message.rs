//! Request/response pair exchanged with the page context.
//!
//! The analyzing side asks `{"action": "getPrivacyUrl"}`; the page side
//! answers with the best privacy link among its anchors.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::matcher::find_privacy_policy_url;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action")]
pub enum PageRequest {
    #[serde(rename = "getPrivacyUrl")]
    GetPrivacyUrl,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseStatus {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrivacyUrlResponse {
    pub status: ResponseStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub privacy_policy_url: Option<String>,
}

impl PrivacyUrlResponse {
    pub fn from_url(url: Option<String>) -> Self {
        let status = if url.is_some() {
            ResponseStatus::Success
        } else {
            ResponseStatus::Error
        };
        Self {
            status,
            privacy_policy_url: url,
        }
    }

    /// The URL, only when the page reported success.
    pub fn into_url(self) -> Option<String> {
        match self.status {
            ResponseStatus::Success => self.privacy_policy_url,
            ResponseStatus::Error => None,
        }
    }
}

impl PageRequest {
    /// Answer this request against the resolved anchor URLs of a page.
    pub fn answer<I, S>(&self, anchors: I) -> PrivacyUrlResponse
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        match self {
            Self::GetPrivacyUrl => {
                let url = find_privacy_policy_url(anchors);
                debug!(found = url.is_some(), "answered getPrivacyUrl");
                PrivacyUrlResponse::from_url(url)
            }
        }
    }
}
