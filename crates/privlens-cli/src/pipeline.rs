//! Session pipeline: cache lookup, policy discovery, analysis, cache write-back.

use std::io::Write;
use std::time::Instant;

use anyhow::Context;
use privlens_ai::{Analyzer, HistoryMode, InitProgress};
use privlens_core::tab_domain;
use privlens_fetch::PolicyClient;
use privlens_store::DomainStore;
use tracing::{error, info, warn};

use crate::console::Console;

#[derive(Debug, Default, Clone)]
pub struct AnalyzeOptions {
    /// Analyze even when a cached result exists.
    pub refresh: bool,
    /// Follow-up questions asked after a successful analysis.
    pub questions: Vec<String>,
}

/// How a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// A cached result was shown; nothing was fetched.
    Cached,
    /// The page has no privacy-policy link.
    Unavailable,
    /// The policy could not be downloaded or extracted.
    LoadFailed,
    Complete,
    /// Analysis started and failed; partial output was cached.
    Failed,
}

impl Outcome {
    pub fn is_success(self) -> bool {
        matches!(self, Self::Cached | Self::Complete)
    }
}

/// Run one session for `page_url`: show the cached result or analyze the
/// linked privacy policy and cache what was produced.
pub async fn run_analysis<O, E>(
    page_url: &str,
    options: &AnalyzeOptions,
    client: &PolicyClient,
    store: &DomainStore,
    analyzer: &mut Analyzer,
    console: &mut Console<O, E>,
) -> anyhow::Result<Outcome>
where
    O: Write + Send,
    E: Write + Send,
{
    let start = Instant::now();
    let domain = tab_domain(page_url)?;

    // 1. Cached result for this domain.
    if !options.refresh {
        if let Some(cached) = store.get(&domain).context("reading domain cache")? {
            info!(domain = %domain, "showing cached analysis");
            console.result(&cached);
            console.check().context("writing result")?;
            return Ok(Outcome::Cached);
        }
    }

    // 2. Privacy-policy link on the page.
    console.status("Loading privacy policy...");
    let policy_url = match client.privacy_policy_url(page_url).await {
        Ok(url) => url,
        Err(e) => {
            warn!(url = page_url, error = %e, "page scan failed");
            None
        }
    };
    let Some(policy_url) = policy_url else {
        console.status("Error loading privacy policy. Privacy URL is unavailable.");
        console.check().context("writing status")?;
        return Ok(Outcome::Unavailable);
    };
    console.link(&policy_url);

    // 3. Policy text.
    let policy = match client.fetch_policy(&policy_url).await {
        Ok(text) => text,
        Err(e) => {
            error!(url = %policy_url, error = %e, "error loading privacy policy");
            console.status(&format!("Error loading privacy policy. {e}"));
            console.check().context("writing status")?;
            return Ok(Outcome::LoadFailed);
        }
    };
    console.status("Privacy policy loaded.");

    // 4. Backend. A failed load surfaces as a not-ready analysis below.
    let prepared = analyzer
        .prepare(&mut |report: InitProgress| console.status(&report.to_string()))
        .await;
    match prepared {
        Ok(()) => console.status("Ready"),
        Err(e) => warn!(backend = analyzer.backend().name(), error = %e, "backend not prepared"),
    }

    // 5. Analysis, streamed to stdout.
    console.status("Analyzing privacy policy...");
    let analysis = analyzer.analyze(&policy, |t| console.token(t)).await;
    if !analyzer.output().is_empty() {
        console.end_result();
    }
    let outcome = match analysis {
        Ok(()) => {
            console.status("Analysis complete.");
            Outcome::Complete
        }
        Err(e) => {
            error!(error = %e, "error analyzing privacy policy");
            console.status("Error analyzing privacy policy.");
            Outcome::Failed
        }
    };

    // 6. Cache whatever was produced, partial or empty included.
    store
        .put(&domain, analyzer.output())
        .context("writing domain cache")?;
    console.check().context("writing result")?;

    info!(
        domain = %domain,
        ?outcome,
        chars = analyzer.output().len(),
        elapsed_secs = start.elapsed().as_secs_f64(),
        "session finished"
    );

    // 7. Follow-ups continue the same conversation.
    if outcome == Outcome::Complete {
        for question in &options.questions {
            console.status(&format!("Asking: {question}"));
            let answer = analyzer
                .ask(question, HistoryMode::Append, |t| console.token(t))
                .await;
            console.end_result();
            if let Err(e) = answer {
                error!(error = %e, "error answering follow-up");
                console.status("Error analyzing privacy policy.");
                console.check().context("writing result")?;
                return Ok(Outcome::Failed);
            }
        }
        console.check().context("writing result")?;
    }

    Ok(outcome)
}
