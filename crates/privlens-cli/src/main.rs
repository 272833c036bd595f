mod cli;
mod console;
mod pipeline;

use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, bail};
use clap::Parser;
use privlens_ai::{Analyzer, Backend, HttpRuntime, LocalBackend, RemoteBackend};
use privlens_core::PageRequest;
use privlens_fetch::{FetchConfig, PolicyClient};
use privlens_store::DomainStore;
use tracing::Level;

use crate::cli::{AnalyzeArgs, BackendKind, CacheAction, Cli, Commands};
use crate::console::Console;
use crate::pipeline::{AnalyzeOptions, run_analysis};

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(if cli.verbose { Level::DEBUG } else { Level::WARN })
        .init();
    tracing::info!("privlens v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Commands::Analyze(args) => {
            let store = DomainStore::open_persistent(&cli.cache_file)
                .with_context(|| format!("opening cache {}", cli.cache_file.display()))?;
            let client = PolicyClient::new(FetchConfig::default())?;
            let mut analyzer = Analyzer::new(build_backend(&args)?);
            if let Some(secs) = args.stall_timeout {
                analyzer = analyzer.with_stall_timeout(Duration::from_secs(secs));
            }
            let options = AnalyzeOptions {
                refresh: args.refresh,
                questions: args.questions.clone(),
            };
            let mut console = Console::stdio();
            let outcome = run_analysis(
                &args.url,
                &options,
                &client,
                &store,
                &mut analyzer,
                &mut console,
            )
            .await?;
            Ok(exit_code(outcome.is_success()))
        }
        Commands::Find { url } => {
            let client = PolicyClient::new(FetchConfig::default())?;
            let response = client.request(&url, PageRequest::GetPrivacyUrl).await?;
            println!("{}", serde_json::to_string_pretty(&response)?);
            Ok(exit_code(response.into_url().is_some()))
        }
        Commands::Extract { url, max_chars } => {
            let client = PolicyClient::new(FetchConfig {
                max_chars,
                ..FetchConfig::default()
            })?;
            let text = client.fetch_policy(&url).await?;
            println!("{text}");
            Ok(ExitCode::SUCCESS)
        }
        Commands::Cache { action } => {
            let store = DomainStore::open_persistent(&cli.cache_file)
                .with_context(|| format!("opening cache {}", cli.cache_file.display()))?;
            run_cache(&store, action)
        }
    }
}

fn build_backend(args: &AnalyzeArgs) -> anyhow::Result<Box<dyn Backend>> {
    match args.backend {
        BackendKind::Local => Ok(Box::new(LocalBackend::new(
            HttpRuntime::new(args.local_url.clone()),
            args.engine_config(),
        ))),
        BackendKind::Remote => {
            let key = args.api_key.as_deref().unwrap_or_default();
            let backend = RemoteBackend::with_url(key, &args.remote_url, &args.remote_model);
            if !backend.is_ready() {
                bail!("the remote backend needs an API key (--api-key or OPENAI_API_KEY)");
            }
            tracing::info!(url = %args.remote_url, model = backend.model(), "using remote backend");
            Ok(Box::new(backend))
        }
    }
}

fn run_cache(store: &DomainStore, action: CacheAction) -> anyhow::Result<ExitCode> {
    match action {
        CacheAction::Get { domain } => match store.get(&domain)? {
            Some(text) => {
                println!("{text}");
                Ok(ExitCode::SUCCESS)
            }
            None => {
                eprintln!("No cached analysis for {domain}");
                Ok(ExitCode::FAILURE)
            }
        },
        CacheAction::Remove { domain } => {
            if store.remove(&domain)? {
                eprintln!("Removed {domain}");
                Ok(ExitCode::SUCCESS)
            } else {
                eprintln!("No cached analysis for {domain}");
                Ok(ExitCode::FAILURE)
            }
        }
        CacheAction::List => {
            for domain in store.domains()? {
                println!("{domain}");
            }
            Ok(ExitCode::SUCCESS)
        }
        CacheAction::Clear => {
            let count = store.len()?;
            store.clear()?;
            eprintln!("Cleared {count} cached analyses");
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn exit_code(success: bool) -> ExitCode {
    if success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
