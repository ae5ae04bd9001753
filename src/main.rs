//! Binary entrypoint for the slideshow.
//!
//! Delegates all logic to the library crate; no local modules here.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use media_slideshow::Slideshow;
use media_slideshow::tasks::reload;
use media_slideshow::tasks::transition::LoggingSurface;
use tokio_util::sync::CancellationToken;
use tracing::{Level, info, warn};
use tracing_subscriber::{EnvFilter, fmt};

/// Simple CLI
#[derive(Debug, Parser)]
#[command(name = "media-slideshow", about = "Cycles images, webpages and videos")]
struct Cli {
    /// Path to YAML config file
    #[arg(short, long, value_name = "FILE", default_value = "slideshow.yaml")]
    config: PathBuf,

    /// Reload entries whenever the config file changes
    #[arg(long)]
    watch: bool,

    /// Increase log verbosity (repeatable)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    verbose: u8,
}

fn init_tracing(verbosity: u8) -> Result<()> {
    // map -v to log level
    let level = match verbosity {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    let filter = EnvFilter::from_default_env()
        .add_directive(format!("media_slideshow={level}").parse()?)
        .add_directive("notify=warn".parse()?);
    fmt().with_env_filter(filter).with_target(true).init();
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose)?;

    let cfg = media_slideshow::config::from_yaml_file(&cli.config)
        .with_context(|| format!("loading config from {}", cli.config.display()))?;
    cfg.validate().context("validating configuration")?;
    info!(entries = cfg.entries.len(), fade = ?cfg.fade_duration, "configuration loaded");

    let slideshow = Slideshow::builder(LoggingSurface::new())
        .entries(cfg.entries)
        .fade_duration(cfg.fade_duration)
        .on_feedback(|msg| info!(target: "media_slideshow::feedback", "{msg}"))
        .build();

    let cancel = CancellationToken::new();
    let watcher = cli.watch.then(|| {
        tokio::spawn(reload::run(
            cli.config.clone(),
            slideshow.clone(),
            cancel.clone(),
        ))
    });

    slideshow.start();

    tokio::signal::ctrl_c()
        .await
        .context("waiting for shutdown signal")?;
    info!("shutdown requested");
    cancel.cancel();

    if let Some(handle) = watcher {
        match handle.await {
            Ok(Err(err)) => warn!(error = %format!("{err:#}"), "config watcher failed"),
            Err(err) => warn!(error = %err, "config watcher panicked"),
            Ok(Ok(())) => {}
        }
    }
    if let Err(err) = slideshow.stop().await {
        warn!(error = %err, "slideshow was not running");
    }
    Ok(())
}
