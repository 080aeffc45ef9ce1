//! Notifications when the collection files change on disk.

use std::{
    collections::HashSet,
    ffi::OsString,
    path::PathBuf,
};

use anyhow::{anyhow, Context, Result};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::config::AppConfig;

/// Events emitted by the data watcher.
#[derive(Debug)]
pub enum DataEvent {
    /// One of the collection files was written, replaced or removed.
    Changed(PathBuf),
    /// The watcher reported an error.
    Error(anyhow::Error),
}

/// Watches the data directory for changes to the collection files.
///
/// The directory is watched rather than the files so replacements made
/// through a rename are still seen. Dropping the watcher stops it.
pub struct DataWatcher {
    _watcher: RecommendedWatcher,
}

impl DataWatcher {
    /// Start watching the collections configured in `config`.
    pub fn spawn(config: &AppConfig, sender: mpsc::Sender<DataEvent>) -> Result<Self> {
        let names: HashSet<OsString> = config
            .data_paths()
            .iter()
            .filter_map(|path| path.file_name().map(|name| name.to_os_string()))
            .collect();
        let dir = config.data_dir.clone();

        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            let outcome = match res {
                Ok(event) => match relevant_path(&event, &names) {
                    Some(path) => sender.try_send(DataEvent::Changed(path)),
                    None => Ok(()),
                },
                Err(err) => sender.try_send(DataEvent::Error(anyhow!(err))),
            };
            if let Err(err) = outcome {
                debug!("Dropped data event: {err}");
            }
        })
        .context("failed to create file watcher")?;
        watcher
            .watch(&dir, RecursiveMode::NonRecursive)
            .with_context(|| format!("failed to watch {}", dir.display()))?;
        info!(dir = %dir.display(), "Watching data files");

        Ok(Self { _watcher: watcher })
    }
}

fn relevant_path(event: &Event, names: &HashSet<OsString>) -> Option<PathBuf> {
    if !matches!(
        event.kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
    ) {
        return None;
    }
    event
        .paths
        .iter()
        .find(|path| {
            path.file_name()
                .map(|name| names.contains(name))
                .unwrap_or(false)
        })
        .cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{AccessKind, CreateKind, ModifyKind};

    fn names() -> HashSet<OsString> {
        AppConfig::default()
            .data_paths()
            .iter()
            .filter_map(|path| path.file_name().map(|name| name.to_os_string()))
            .collect()
    }

    #[test]
    fn picks_collection_files_only() {
        let changed = Event::new(EventKind::Modify(ModifyKind::Any))
            .add_path(PathBuf::from("/data/.tmpA1b2"))
            .add_path(PathBuf::from("/data/hoteles.json"));
        assert_eq!(
            relevant_path(&changed, &names()),
            Some(PathBuf::from("/data/hoteles.json"))
        );

        let manifest = Event::new(EventKind::Create(CreateKind::File))
            .add_path(PathBuf::from("/data/hoteles.manifest.json"));
        assert_eq!(relevant_path(&manifest, &names()), None);
    }

    #[test]
    fn ignores_reads() {
        let read = Event::new(EventKind::Access(AccessKind::Any))
            .add_path(PathBuf::from("/data/clientes.json"));
        assert_eq!(relevant_path(&read, &names()), None);
    }
}
