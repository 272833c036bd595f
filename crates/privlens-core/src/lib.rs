pub mod chat;
pub mod domain;
pub mod matcher;
pub mod message;
pub mod prompt;

pub use chat::{ChatMessage, Role};
pub use domain::{DomainError, tab_domain};
pub use matcher::{LinkMatcher, ScoredCandidate, find_privacy_policy_url};
pub use message::{PageRequest, PrivacyUrlResponse, ResponseStatus};
pub use prompt::build_prompt;
