// SPDX-FileCopyrightText: 2025 Alexandre Gomes Gaigalas <alganet@gmail.com>
//
// SPDX-License-Identifier: ISC

use clap::Parser;
use console::{style, Term};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing_subscriber::EnvFilter;

use network_watcher::capture::LogWriter;
use network_watcher::config::Config;
use network_watcher::correlator::Correlator;
use network_watcher::events;
use network_watcher::filter::ProtocolFilter;
use network_watcher::pipeline::Pipeline;
use network_watcher::proxy::ProxyEngine;
use network_watcher::state::CaptureStore;
use tracing::{info, warn};

#[derive(Parser, Debug, Default)]
#[command(name = "network-watcher")]
struct Args {
    /// Listen address, e.g. 127.0.0.1:8888
    #[arg(long)]
    listen: Option<String>,

    /// Only show and log URLs containing this text
    #[arg(long)]
    domain: Option<String>,

    /// Only show and log this protocol: all, http or https
    #[arg(long)]
    protocol: Option<ProtocolFilter>,

    /// Pretty-print JSON bodies
    #[arg(short = 'p', long, conflicts_with = "no_prettify")]
    prettify: bool,

    /// Show JSON bodies exactly as received
    #[arg(long)]
    no_prettify: bool,

    /// Disable coloured console output
    #[arg(long)]
    no_color: bool,

    /// Directory for traffic log files
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// Do not write a traffic log file
    #[arg(long)]
    no_log: bool,

    /// Optional TOML config path
    #[arg(long)]
    config: Option<PathBuf>,
}

/// Command line flags take precedence over the config file.
fn apply_args(cfg: &mut Config, args: &Args) -> anyhow::Result<()> {
    if let Some(listen) = &args.listen {
        cfg.general.listen = listen.clone();
    }
    if let Some(domain) = &args.domain {
        cfg.filter.domain = domain.clone();
    }
    if let Some(protocol) = args.protocol {
        cfg.filter.protocol = protocol;
    }
    if args.prettify {
        cfg.general.prettify = true;
    }
    if args.no_prettify {
        cfg.general.prettify = false;
    }
    if args.no_color {
        cfg.general.color = false;
    }
    if let Some(dir) = &args.log_dir {
        cfg.log.directory = dir.clone();
    }
    if args.no_log {
        cfg.log.enabled = false;
    }
    cfg.validate()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();
    let args = Args::parse();

    let mut cfg = match &args.config {
        Some(p) => Config::load_from_path(p).await?,
        None => Config::default(),
    };
    apply_args(&mut cfg, &args)?;

    let store = Arc::new(CaptureStore::new());
    let (tx, rx) = events::channel();
    let mut engine = ProxyEngine::from_config(&cfg, tx)?;

    let term = Term::stdout();
    let colored = cfg.general.color && term.features().colors_supported();
    let mut pipeline = Pipeline::new(
        Correlator::new(store.clone(), cfg.general.prettify),
        cfg.stream_filter(),
    )
    .with_console(term, colored);
    if cfg.log.enabled {
        let log = LogWriter::in_dir(&cfg.log.directory).await?;
        info!(path = %log.path().display(), "logging traffic");
        pipeline = pipeline.with_log(log);
    }

    let addr = engine.start().await?;
    let filter = cfg.stream_filter();
    eprintln!(
        "{} listening on {}",
        style("network-watcher").cyan().bold(),
        style(addr).green()
    );
    if !filter.domain().is_empty() {
        eprintln!("  domain filter: {}", style(filter.domain()).yellow());
    }
    eprintln!("  press Ctrl+C to stop");

    let pipeline_task = tokio::spawn(pipeline.run(rx));

    signal::ctrl_c().await?;
    info!("shutting down");
    engine.stop().await;
    drop(engine);

    // Connections still in flight hold senders; give them a moment to drain.
    if tokio::time::timeout(Duration::from_secs(2), pipeline_task)
        .await
        .is_err()
    {
        warn!("pipeline did not drain before shutdown");
    }
    info!(
        records = store.len(),
        pending = store.pending_count(),
        orphaned = store.orphaned_responses(),
        "stopped"
    );

    Ok(())
}
