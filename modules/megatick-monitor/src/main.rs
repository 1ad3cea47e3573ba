use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::{AsyncRead, BufReader};
use tracing::info;
use tracing_subscriber::EnvFilter;

use megatick_archive::{AncestorClient, HttpFeedReader, HttpPageFetcher, UrlFilter};
use megatick_common::{read_lines, Blacklists, Config};
use megatick_monitor::{
    build_sink, ndjson_events, run_stream, FeedSource, Monitor, MonitorDeps, RuleFilter,
};

/// Ingest a stream of social media events into the graph.
#[derive(Parser)]
#[command(name = "megatick", version)]
struct Cli {
    /// Newline-delimited JSON events. Reads stdin when omitted.
    #[arg(long, short)]
    input: Option<PathBuf>,

    /// Seconds between stats summaries (0 disables).
    #[arg(long, default_value_t = 60)]
    stats_interval: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("megatick=info".parse()?))
        .init();

    let cli = Cli::parse();
    info!("Megatick starting...");

    let config = Config::from_env()?;
    config.log_redacted();

    let blacklists = Blacklists::load(&config)?;
    let filter = RuleFilter::new(config.languages.as_deref(), &blacklists)
        .context("Invalid keyword blacklist")?;

    let sink = build_sink(&config.backend).await?;
    let fetcher = HttpPageFetcher::new(&config.platform_hosts)?;
    let lookup = AncestorClient::from_token(config.twitter_bearer_token.as_deref())?;
    if config.twitter_bearer_token.is_none() {
        info!("TWITTER_BEARER_TOKEN unset, tweet ancestors will not be resolved");
    }

    let feeds = match &config.feeds_path {
        Some(path) => Some(FeedSource {
            reader: Arc::new(HttpFeedReader::new()?),
            urls: read_lines(path)?,
        }),
        None => None,
    };

    let monitor = Monitor::start(
        MonitorDeps {
            sink,
            filter: Arc::new(filter),
            url_filter: UrlFilter::new(blacklists.domains.clone()),
            fetcher: Arc::new(fetcher),
            lookup: Arc::new(lookup),
            feeds,
        },
        &config,
    );

    let reporter = (cli.stats_interval > 0).then(|| {
        let every = Duration::from_secs(cli.stats_interval);
        let stats = monitor.stats_handle();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                info!("{}", stats.snapshot());
            }
        })
    });

    let input: Box<dyn AsyncRead + Unpin + Send> = match &cli.input {
        Some(path) => Box::new(
            tokio::fs::File::open(path)
                .await
                .with_context(|| format!("Failed to open {}", path.display()))?,
        ),
        None => Box::new(tokio::io::stdin()),
    };

    let listener = monitor.listener();
    let end = run_stream(&listener, ndjson_events(BufReader::new(input))).await;
    info!(?end, "Stream ended");

    if let Some(reporter) = reporter {
        reporter.abort();
    }
    let stats = monitor.shutdown().await;
    info!("{}", stats);

    Ok(())
}
