use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;

use newsservice::config::Config;
use newsservice::feed::HttpFetcher;
use newsservice::ingest::{ExponentialBackoff, Ingestor};
use newsservice::query::NewsQueryService;
use newsservice::storage::{Database, DatabaseOptions, NewsFilter};

#[derive(Parser, Debug)]
#[command(
    name = "newsservice",
    version,
    about = "Polls RSS feeds and stores their items for paginated queries"
)]
struct Args {
    /// Path to the TOML configuration file
    #[arg(long, value_name = "FILE", default_value = "config.toml")]
    config: PathBuf,

    /// Run one ingestion cycle for every source, then exit
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = Config::load(&args.config)
        .with_context(|| format!("Failed to load config from '{}'", args.config.display()))?;

    // RUST_LOG wins over the configured level
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    if config.sources.is_empty() {
        tracing::warn!(path = %args.config.display(), "No sources configured, nothing to ingest");
    }

    let db_options = DatabaseOptions {
        max_connections: config.database.max_connections,
        ..DatabaseOptions::default()
    };
    let db = Database::open_with(&config.database.path, &db_options)
        .await
        .with_context(|| format!("Failed to open database '{}'", config.database.path))?;

    let fetcher = HttpFetcher::with_user_agent(
        &config.fetch.user_agent,
        config.fetch_timeout(),
        config.fetch.max_bytes,
    )
    .context("Failed to build HTTP client")?;

    let mut ingestor = Ingestor::new(Arc::new(fetcher), Arc::new(db.clone()), config.poll_interval());
    if let Some(max_backoff) = config.max_backoff() {
        ingestor = ingestor.with_policy(ExponentialBackoff::new(config.poll_interval(), max_backoff));
    }

    if args.once {
        let results = ingestor.run_once(&config.sources).await;

        let queries = NewsQueryService::from_config(Arc::new(db.clone()), &config);
        match queries.list_news(&NewsFilter::default(), 1).await {
            Ok(page) => tracing::info!(
                stored = page.total_results,
                pages = page.total_pages,
                per_page = page.per_page,
                "Store summary"
            ),
            Err(e) => tracing::warn!(error = %e, "Could not summarize stored news"),
        }
        db.close().await;

        let failed = results.iter().filter(|r| r.is_err()).count();
        let saved: usize = results.iter().filter_map(|r| r.as_ref().ok()).sum();
        println!(
            "Ingested {} sources: {} items saved, {} sources failed",
            results.len(),
            saved,
            failed
        );
        if !results.is_empty() && failed == results.len() {
            anyhow::bail!("Every source failed to ingest");
        }
        return Ok(());
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handles = ingestor.spawn(config.sources.clone(), shutdown_rx);
    tracing::info!(sources = handles.len(), "Ingestion started");

    shutdown_signal().await;
    tracing::info!("Shutdown requested, stopping ingestion loops");
    let _ = shutdown_tx.send(true);

    for handle in handles {
        if let Err(e) = handle.await {
            tracing::error!(error = %e, "Ingestion task panicked");
        }
    }

    db.close().await;
    tracing::info!("Shutdown complete");
    Ok(())
}

/// Resolves on Ctrl+C or, on Unix, SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
