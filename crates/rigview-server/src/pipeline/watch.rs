use std::{
    env,
    error::Error,
    ffi::OsString,
    fmt::{self, Display, Formatter},
    io,
    path::{Path, PathBuf},
    time::Duration,
};

use log::{debug, info, warn};
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use notify_debouncer_mini::{new_debouncer, DebounceEventResult, Debouncer};
use tokio::sync::mpsc;

use super::SourceChange;

#[derive(Debug)]
pub enum WatchError {
    NoFileName(PathBuf),
    CurrentDir(io::Error),
    Notify(notify::Error),
}

impl Display for WatchError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoFileName(path) => write!(f, "Not a file path: {}", path.display()),
            Self::CurrentDir(err) => write!(f, "Failed to resolve working directory: {}", err),
            Self::Notify(err) => write!(f, "Failed to watch: {}", err),
        }
    }
}

impl Error for WatchError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::NoFileName(_) => None,
            Self::CurrentDir(err) => Some(err),
            Self::Notify(err) => Some(err),
        }
    }
}

impl From<notify::Error> for WatchError {
    fn from(value: notify::Error) -> Self {
        Self::Notify(value)
    }
}

/// Watches one source file and forwards each debounced change.
///
/// The parent directory is watched instead of the file itself, so editors
/// that save by replacing the file are still seen.
pub struct SourceWatcher {
    source: PathBuf,
    _debouncer: Debouncer<RecommendedWatcher>,
}

impl SourceWatcher {
    pub fn new(
        source: &Path,
        debounce: Duration,
        changes: mpsc::UnboundedSender<SourceChange>,
    ) -> Result<Self, WatchError> {
        let source = if source.is_absolute() {
            source.to_path_buf()
        } else {
            env::current_dir()
                .map_err(WatchError::CurrentDir)?
                .join(source)
        };
        let file_name: OsString = source
            .file_name()
            .ok_or_else(|| WatchError::NoFileName(source.clone()))?
            .to_owned();
        let directory = source
            .parent()
            .ok_or_else(|| WatchError::NoFileName(source.clone()))?
            .to_path_buf();

        let changed = source.clone();
        let mut debouncer = new_debouncer(debounce, move |result: DebounceEventResult| {
            match result {
                Ok(events) => {
                    if !events
                        .iter()
                        .any(|event| event.path.file_name() == Some(file_name.as_os_str()))
                    {
                        return;
                    }
                    if changes.send(SourceChange::Modified(changed.clone())).is_err() {
                        debug!("Pipeline stopped, dropping change of {}", changed.display());
                    }
                }
                Err(err) => warn!("Watch error: {}", err),
            }
        })?;
        debouncer
            .watcher()
            .watch(&directory, RecursiveMode::NonRecursive)?;
        info!("Watching {}", source.display());

        Ok(Self {
            source,
            _debouncer: debouncer,
        })
    }

    pub fn source(&self) -> &Path {
        &self.source
    }
}
