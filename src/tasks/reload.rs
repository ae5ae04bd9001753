use std::path::{Path, PathBuf};

use anyhow::Result;
use notify::{Event, EventKind, RecursiveMode, Watcher, recommended_watcher};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use super::scheduler::Slideshow;
use crate::config;
use crate::error::Error;
use crate::slide::SlideDescriptor;

/// Watches the configuration file and feeds changed entries to the show.
///
/// The parent directory is watched so editors that replace the file by
/// rename are still picked up. Broken files are logged and skipped.
#[instrument(skip(slideshow, cancel), fields(config = %config_path.display()))]
pub async fn run(
    config_path: PathBuf,
    slideshow: Slideshow,
    cancel: CancellationToken,
) -> Result<()> {
    let watch_dir = config_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    let file_name = config_path.file_name().map(|n| n.to_os_string());

    let (watch_tx, mut watch_rx) = mpsc::channel::<notify::Result<Event>>(32);
    let mut watcher = recommended_watcher(move |res| {
        let _ = watch_tx.blocking_send(res);
    })?;
    watcher.watch(&watch_dir, RecursiveMode::NonRecursive)?;
    info!(watching = %watch_dir.display(), "config watcher initialized");

    let mut current = load_entries(&config_path).ok();

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                info!("cancel received; exiting config watcher");
                break;
            }

            Some(res) = watch_rx.recv() => match res {
                Ok(event) => {
                    let touches_config = event
                        .paths
                        .iter()
                        .any(|p| p.file_name().map(|n| n.to_os_string()) == file_name);
                    if !touches_config || !is_change(&event.kind) {
                        debug!(kind = ?event.kind, "fs: ignored");
                        continue;
                    }
                    let entries = match load_entries(&config_path) {
                        Ok(entries) => entries,
                        Err(err) => {
                            warn!(error = %err, "ignoring unreadable configuration");
                            continue;
                        }
                    };
                    if current.as_ref() == Some(&entries) {
                        debug!("entries unchanged");
                        continue;
                    }
                    info!(count = entries.len(), "configuration changed; applying new entries");
                    match slideshow.set_entries(entries.clone()).await {
                        Ok(()) => current = Some(entries),
                        Err(err) => warn!(error = %err, "could not apply new entries"),
                    }
                }
                Err(err) => error!("watch error: {err}"),
            }
        }
    }
    Ok(())
}

fn is_change(kind: &EventKind) -> bool {
    matches!(
        kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Any
    )
}

pub fn load_entries(path: &Path) -> Result<Vec<SlideDescriptor>, Error> {
    let cfg = config::from_yaml_file(path)?;
    cfg.validate()?;
    Ok(cfg.entries)
}
