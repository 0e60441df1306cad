//! Rule file watching for live reload.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

/// Events from the rule file watcher
#[derive(Debug)]
pub enum RulesEvent {
    RulesFileChanged(PathBuf),
    WatcherError(notify::Error),
}

/// Keeps the underlying watcher alive; dropping it stops notifications
pub struct RulesWatcher {
    _watcher: RecommendedWatcher,
    path: PathBuf,
}

impl RulesWatcher {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Watch a single rules file
///
/// The parent directory is watched so editors that save by rename are still
/// picked up; events for other files are filtered out.
pub fn watch_rules_file(
    path: &Path,
) -> Result<(RulesWatcher, mpsc::UnboundedReceiver<RulesEvent>)> {
    let (tx, rx) = mpsc::unbounded_channel();

    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."))
        .to_path_buf();
    let file_name = path.file_name().map(|n| n.to_os_string());

    let mut watcher = RecommendedWatcher::new(
        move |res: Result<Event, notify::Error>| match res {
            Ok(event) => {
                if let EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_) =
                    event.kind
                {
                    for changed in event.paths {
                        if changed.file_name().map(|n| n.to_os_string()) == file_name {
                            let _ = tx.send(RulesEvent::RulesFileChanged(changed));
                        }
                    }
                }
            }
            Err(e) => {
                let _ = tx.send(RulesEvent::WatcherError(e));
            }
        },
        Config::default().with_poll_interval(Duration::from_secs(1)),
    )?;

    watcher
        .watch(&dir, RecursiveMode::NonRecursive)
        .with_context(|| format!("Failed to watch rules directory: {}", dir.display()))?;

    log::debug!("watching rules file {}", path.display());

    Ok((
        RulesWatcher {
            _watcher: watcher,
            path: path.to_path_buf(),
        },
        rx,
    ))
}
