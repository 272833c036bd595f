//! Privacy-policy link selection.
//!
//! Candidate URLs are classified against an ordered pattern list where the
//! position of a pattern is its priority: index 0 wins over everything else.
//! Inserting a pattern at the right position is all it takes to re-rank;
//! there are no numeric scores to keep in sync.

use std::sync::LazyLock;

use regex::{Regex, RegexBuilder};

/// Default privacy-link patterns, highest priority first.
pub const PRIVACY_PATTERNS: &[&str] = &[
    r"privacy-policy\b",
    r"\bprivacy/policy\b",
    r"privacy-policy-[a-z]+",
    r"\bpolicy/privacy\b",
    r"\bprivacy\b",
    r"\bdata-protection\b",
    r"\bsecurity-policy\b",
    r"\blegal-notice\b",
    r"\bcookie-policy\b",
    r"\bterms-of-service\b",
    r"\bterms-and-conditions\b",
    r"\bterms\b",
    r"\bcompliance\b",
    r"\bdisclaimer\b",
    r"\blegal\b",
];

static DEFAULT_MATCHER: LazyLock<LinkMatcher> = LazyLock::new(|| {
    LinkMatcher::with_patterns(PRIVACY_PATTERNS).expect("built-in privacy patterns compile")
});

/// A candidate URL together with the index of the first pattern it matched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoredCandidate {
    pub url: String,
    pub priority: usize,
}

/// Ordered, case-insensitive pattern list used to rank candidate links.
#[derive(Debug, Clone)]
pub struct LinkMatcher {
    patterns: Vec<Regex>,
}

impl Default for LinkMatcher {
    fn default() -> Self {
        DEFAULT_MATCHER.clone()
    }
}

impl LinkMatcher {
    /// Build a matcher from patterns given in priority order.
    pub fn with_patterns(patterns: &[&str]) -> Result<Self, regex::Error> {
        let patterns = patterns
            .iter()
            .map(|p| RegexBuilder::new(p).case_insensitive(true).build())
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { patterns })
    }

    /// Number of patterns in the list.
    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Index of the first pattern matching `url`, if any.
    pub fn priority(&self, url: &str) -> Option<usize> {
        self.patterns.iter().position(|re| re.is_match(url))
    }

    /// Score every absolute HTTP(S) URL that matches a pattern.
    ///
    /// Output keeps document order; unmatched and relative URLs are dropped.
    pub fn score<I, S>(&self, urls: I) -> Vec<ScoredCandidate>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        urls.into_iter()
            .filter(|url| is_http_url(url.as_ref()))
            .filter_map(|url| {
                let url = url.as_ref();
                self.priority(url).map(|priority| ScoredCandidate {
                    url: url.to_string(),
                    priority,
                })
            })
            .collect()
    }

    /// Pick the candidate with the lowest priority index.
    ///
    /// Ties go to the URL seen first. Returns `None` when nothing matches.
    pub fn best_match<I, S>(&self, urls: I) -> Option<String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        // min_by_key keeps the first of equal minima.
        self.score(urls)
            .into_iter()
            .min_by_key(|c| c.priority)
            .map(|c| c.url)
    }
}

/// Best privacy-policy link among `urls` using the default pattern list.
pub fn find_privacy_policy_url<I, S>(urls: I) -> Option<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    DEFAULT_MATCHER.best_match(urls)
}

fn is_http_url(url: &str) -> bool {
    let head = url.get(..8).unwrap_or(url).to_ascii_lowercase();
    head.starts_with("http://") || head.starts_with("https://")
}
