//! CLI definitions for privlens.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use privlens_ai::{
    DEFAULT_LOCAL_URL, DEFAULT_MODEL, DEFAULT_REMOTE_MODEL, DEFAULT_REMOTE_URL, EngineConfig,
};

/// Find, fetch and summarize a site's privacy policy.
#[derive(Parser, Debug)]
#[command(name = "privlens")]
#[command(version)]
pub(crate) struct Cli {
    /// Domain cache file
    #[arg(
        long,
        env = "PRIVLENS_CACHE",
        default_value = ".privlens/cache.json",
        global = true
    )]
    pub cache_file: PathBuf,

    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub(crate) enum Commands {
    /// Analyze the privacy policy linked from a page
    Analyze(AnalyzeArgs),

    /// Print the page's privacy-policy link as a page-context response
    Find {
        /// Page URL
        url: String,
    },

    /// Print the readable text of a privacy policy
    Extract {
        /// Policy URL
        url: String,

        /// Truncate the text to this many characters
        #[arg(long)]
        max_chars: Option<usize>,
    },

    /// Domain cache administration
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Subcommand, Debug)]
pub(crate) enum CacheAction {
    /// Print the cached analysis for a domain
    Get { domain: String },
    /// Drop the cached analysis for a domain
    Remove { domain: String },
    /// List cached domains
    List,
    /// Remove every cached analysis
    Clear,
}

#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) enum BackendKind {
    #[default]
    Local,
    Remote,
}

#[derive(Args, Debug)]
pub(crate) struct AnalyzeArgs {
    /// Page URL
    pub url: String,

    /// Text-generation backend
    #[arg(long, value_enum, default_value_t = BackendKind::Local)]
    pub backend: BackendKind,

    /// API key for the remote backend
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Remote chat-completions API base URL
    #[arg(long, default_value = DEFAULT_REMOTE_URL)]
    pub remote_url: String,

    /// Remote model
    #[arg(long, default_value = DEFAULT_REMOTE_MODEL)]
    pub remote_model: String,

    /// Local model server base URL
    #[arg(long, env = "PRIVLENS_LOCAL_URL", default_value = DEFAULT_LOCAL_URL)]
    pub local_url: String,

    /// Local model id
    #[arg(long, default_value = DEFAULT_MODEL)]
    pub model: String,

    /// Context window for the local model (-1 for the model's full context)
    #[arg(long, default_value_t = -1, allow_negative_numbers = true)]
    pub context_window_size: i64,

    #[arg(long, default_value_t = 1024)]
    pub sliding_window_size: i64,

    #[arg(long, default_value_t = 4)]
    pub attention_sink_size: i64,

    /// Ignore a cached result and analyze again
    #[arg(long)]
    pub refresh: bool,

    /// Follow-up question after the analysis (repeatable)
    #[arg(long = "ask", value_name = "QUESTION")]
    pub questions: Vec<String>,

    /// Fail when the backend sends nothing for this many seconds
    #[arg(long, value_name = "SECS")]
    pub stall_timeout: Option<u64>,
}

impl AnalyzeArgs {
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            model_id: self.model.clone(),
            context_window_size: self.context_window_size,
            sliding_window_size: self.sliding_window_size,
            attention_sink_size: self.attention_sink_size,
        }
    }
}
