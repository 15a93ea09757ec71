//! Hot reload of the configuration file.
//!
//! The parent directory is watched rather than the file itself. Editors that
//! save through a temp file and rename would otherwise leave the watch on a
//! deleted inode.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::config::loader::load_config;
use crate::config::schema::BalancerConfig;

/// Sends a freshly validated [`BalancerConfig`] every time the file changes.
pub struct ConfigWatcher {
    path: PathBuf,
    updates: mpsc::UnboundedSender<BalancerConfig>,
}

impl ConfigWatcher {
    pub fn new(path: &Path) -> (Self, mpsc::UnboundedReceiver<BalancerConfig>) {
        let (updates, rx) = mpsc::unbounded_channel();
        let watcher = Self {
            path: path.to_path_buf(),
            updates,
        };
        (watcher, rx)
    }

    /// Start watching. Dropping the returned handle stops the watch.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let dir = watch_dir(&self.path);
        let file_name = self.path.file_name().map(OsString::from);
        let mut reload = Reloader {
            path: self.path.clone(),
            file_name,
            updates: self.updates,
            closed: false,
        };

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| reload.on_event(res),
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;
        watcher.watch(&dir, RecursiveMode::NonRecursive)?;

        tracing::info!(path = ?self.path, dir = ?dir, "Config watcher started");
        Ok(watcher)
    }
}

struct Reloader {
    path: PathBuf,
    file_name: Option<OsString>,
    updates: mpsc::UnboundedSender<BalancerConfig>,
    /// Set once the receiving side is gone.
    closed: bool,
}

impl Reloader {
    fn on_event(&mut self, res: notify::Result<Event>) {
        let event = match res {
            Ok(event) => event,
            Err(e) => {
                tracing::error!(error = ?e, "Config watch error");
                return;
            }
        };

        if self.closed || !(event.kind.is_modify() || event.kind.is_create()) {
            return;
        }
        if !event.paths.iter().any(|p| self.is_config_file(p)) {
            return;
        }

        tracing::info!(path = ?self.path, "Config file change detected, reloading");
        let config = match load_config(&self.path) {
            Ok(config) => config,
            Err(e) => {
                tracing::error!(error = %e, "Failed to reload config, keeping current configuration");
                return;
            }
        };

        if self.updates.send(config).is_err() {
            tracing::warn!(path = ?self.path, "Config update receiver dropped, ignoring further changes");
            self.closed = true;
        }
    }

    fn is_config_file(&self, candidate: &Path) -> bool {
        match &self.file_name {
            Some(name) => candidate.file_name() == Some(name.as_os_str()),
            None => candidate == self.path,
        }
    }
}

fn watch_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("balancer-watch-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    async fn next_algorithm(rx: &mut mpsc::UnboundedReceiver<BalancerConfig>, want: &str) -> bool {
        let wait = async {
            while let Some(config) = rx.recv().await {
                if config.algorithm == want {
                    return true;
                }
            }
            false
        };
        tokio::time::timeout(Duration::from_secs(5), wait)
            .await
            .unwrap_or(false)
    }

    #[tokio::test]
    async fn rewrite_delivers_new_config() {
        let dir = scratch_dir();
        let path = dir.join("balancer.toml");
        std::fs::write(&path, "algorithm = \"ROUND_ROBIN\"\n").unwrap();

        let (watcher, mut rx) = ConfigWatcher::new(&path);
        let _handle = watcher.run().unwrap();

        std::fs::write(&path, "algorithm = \"RANDOM\"\n").unwrap();
        assert!(next_algorithm(&mut rx, "RANDOM").await);

        // temp file renamed over the original
        let staged = dir.join("balancer.toml.tmp");
        std::fs::write(&staged, "algorithm = \"WEIGHTED\"\n").unwrap();
        std::fs::rename(&staged, &path).unwrap();
        assert!(next_algorithm(&mut rx, "WEIGHTED").await);

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[tokio::test]
    async fn sibling_files_are_ignored() {
        let dir = scratch_dir();
        let path = dir.join("balancer.toml");
        std::fs::write(&path, "algorithm = \"ROUND_ROBIN\"\n").unwrap();

        let (watcher, mut rx) = ConfigWatcher::new(&path);
        let _handle = watcher.run().unwrap();

        std::fs::write(dir.join("other.toml"), "algorithm = \"RANDOM\"\n").unwrap();
        let got = tokio::time::timeout(Duration::from_millis(500), rx.recv()).await;
        assert!(got.is_err());

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn dropped_receiver_stops_delivery() {
        let dir = scratch_dir();
        let path = dir.join("balancer.toml");
        std::fs::write(&path, "algorithm = \"RANDOM\"\n").unwrap();

        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        let mut reload = Reloader {
            path: path.clone(),
            file_name: path.file_name().map(OsString::from),
            updates: tx,
            closed: false,
        };
        let event = Event::new(notify::EventKind::Modify(notify::event::ModifyKind::Any)).add_path(path);
        reload.on_event(Ok(event));
        assert!(reload.closed);

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn bare_file_name_watches_current_dir() {
        assert_eq!(watch_dir(Path::new("balancer.toml")), PathBuf::from("."));
        assert_eq!(watch_dir(Path::new("/etc/lb/balancer.toml")), PathBuf::from("/etc/lb"));
    }
}
