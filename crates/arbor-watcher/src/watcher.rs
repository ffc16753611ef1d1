//! Filesystem watcher with time-window debouncing
//!
//! Subscribes recursively under the indexed root, coalesces change bursts
//! in a pending map, and hands quiet paths to the indexer's per-file atomic
//! update path. Remove and rename-away events are encoded with a `|DELETE`
//! suffix and routed to the deletion path.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use anyhow::Context;
use arbor_core::{ExcludeMatcher, IndexState, Lang};
use arbor_indexer::Indexer;
use notify::event::{ModifyKind, RenameMode};
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::{Mutex, mpsc};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Marker appended to pending keys for deletion events.
pub const DELETE_SUFFIX: &str = "|DELETE";

const MIN_DEBOUNCE_MS: u64 = 10;
const MAX_DEBOUNCE_MS: u64 = 60_000;
pub const DEFAULT_DEBOUNCE_MS: u64 = 100;

/// How long one deletion may take before it is abandoned.
const DELETE_TIMEOUT: Duration = Duration::from_secs(60);

pub struct WatchService {
    indexer: Arc<Indexer>,
    root: PathBuf,
    exclude: ExcludeMatcher,
    debounce_ms: AtomicU64,
    /// path (possibly `|DELETE`-suffixed) -> time of last event
    pending: Mutex<HashMap<String, Instant>>,
}

impl WatchService {
    pub fn new(indexer: Arc<Indexer>) -> Self {
        let root = indexer.config().root.clone();
        let exclude = ExcludeMatcher::new(&indexer.config().exclude);
        WatchService {
            indexer,
            root,
            exclude,
            debounce_ms: AtomicU64::new(DEFAULT_DEBOUNCE_MS),
            pending: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_debounce_ms(self, ms: u64) -> Self {
        self.set_debounce_ms(ms);
        self
    }

    /// Clamped to [10, 60000] ms; takes effect on the next tick.
    pub fn set_debounce_ms(&self, ms: u64) {
        self.debounce_ms
            .store(ms.clamp(MIN_DEBOUNCE_MS, MAX_DEBOUNCE_MS), Ordering::Relaxed);
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms.load(Ordering::Relaxed))
    }

    /// Watch until the token is cancelled. Cancellation closes both the
    /// subscription and the ticker.
    pub async fn run(&self, cancel: &CancellationToken) -> anyhow::Result<()> {
        let (tx, mut rx) = mpsc::unbounded_channel::<notify::Event>();
        let mut watcher: RecommendedWatcher =
            notify::recommended_watcher(move |res: Result<notify::Event, notify::Error>| {
                match res {
                    Ok(event) => {
                        let _ = tx.send(event);
                    }
                    Err(e) => tracing::error!("watch error: {e}"),
                }
            })
            .context("create filesystem watcher")?;
        watcher
            .watch(&self.root, RecursiveMode::Recursive)
            .with_context(|| format!("watch {}", self.root.display()))?;
        self.indexer.set_state(IndexState::Watching).await;
        tracing::info!("watching {}", self.root.display());

        let mut ticker = tokio::time::interval(self.debounce());
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                maybe_event = rx.recv() => {
                    match maybe_event {
                        Some(event) => self.note_event(event).await,
                        None => break,
                    }
                }
                _ = ticker.tick() => {
                    self.flush_due(cancel).await;
                    let period = self.debounce();
                    if period != ticker.period() {
                        ticker = tokio::time::interval(period);
                        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
                    }
                }
            }
        }
        self.indexer.set_state(IndexState::Idle).await;
        tracing::info!("watcher stopped");
        Ok(())
    }

    /// Record a filesystem event in the pending map.
    pub(crate) async fn note_event(&self, event: notify::Event) {
        let delete = match event.kind {
            EventKind::Create(_) => false,
            EventKind::Modify(ModifyKind::Name(RenameMode::From)) => true,
            EventKind::Modify(_) => false,
            EventKind::Remove(_) => true,
            _ => return,
        };
        for path in event.paths {
            if !self.is_watchable(&path) {
                continue;
            }
            let mut key = path.to_string_lossy().into_owned();
            if delete {
                key.push_str(DELETE_SUFFIX);
            }
            self.pending.lock().await.insert(key, Instant::now());
        }
    }

    /// Non-source and excluded paths are ignored outright.
    fn is_watchable(&self, path: &Path) -> bool {
        if Lang::from_path(path).is_none() {
            return false;
        }
        let rel = path.strip_prefix(&self.root).unwrap_or(path);
        !self.exclude.is_excluded(rel)
    }

    /// Dispatch every path whose last event is at least one debounce window
    /// old.
    pub(crate) async fn flush_due(&self, cancel: &CancellationToken) {
        let window = self.debounce();
        let now = Instant::now();
        let due: Vec<String> = {
            let mut pending = self.pending.lock().await;
            let keys: Vec<String> = pending
                .iter()
                .filter(|(_, last)| now.duration_since(**last) >= window)
                .map(|(key, _)| key.clone())
                .collect();
            for key in &keys {
                pending.remove(key);
            }
            keys
        };
        for key in due {
            if cancel.is_cancelled() {
                return;
            }
            if let Some(path) = key.strip_suffix(DELETE_SUFFIX) {
                let path = PathBuf::from(path);
                let result = tokio::time::timeout(
                    DELETE_TIMEOUT,
                    self.indexer.remove_file(cancel, &path),
                )
                .await;
                match result {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => tracing::warn!("delete failed for {}: {e}", path.display()),
                    Err(_) => tracing::warn!("delete timed out for {}", path.display()),
                }
            } else {
                let path = PathBuf::from(&key);
                if let Err(e) = self.indexer.update_file(cancel, &path).await {
                    tracing::warn!("update failed for {}: {e}", path.display());
                }
            }
        }
    }

    #[cfg(test)]
    pub(crate) async fn pending_len(&self) -> usize {
        self.pending.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arbor_embed::providers::local::LocalEmbedder;
    use arbor_embed::Embedder;
    use arbor_indexer::IndexerConfig;
    use arbor_store::GraphStore;
    use notify::event::CreateKind;

    async fn service_for(root: &Path) -> WatchService {
        let store = Arc::new(GraphStore::open_in_memory().unwrap());
        store.run_migrations().await.unwrap();
        let embedder: Arc<dyn Embedder> = Arc::new(LocalEmbedder::new());
        let indexer = Arc::new(Indexer::new(store, embedder, IndexerConfig::new(root)));
        WatchService::new(indexer).with_debounce_ms(50)
    }

    fn create_event(path: PathBuf) -> notify::Event {
        notify::Event::new(EventKind::Create(CreateKind::File)).add_path(path)
    }

    fn remove_event(path: PathBuf) -> notify::Event {
        notify::Event::new(EventKind::Remove(notify::event::RemoveKind::File)).add_path(path)
    }

    #[test]
    fn debounce_is_clamped() {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async {
            let dir = tempfile::tempdir().unwrap();
            let service = service_for(dir.path()).await;
            service.set_debounce_ms(1);
            assert_eq!(service.debounce(), Duration::from_millis(10));
            service.set_debounce_ms(120_000);
            assert_eq!(service.debounce(), Duration::from_millis(60_000));
            service.set_debounce_ms(250);
            assert_eq!(service.debounce(), Duration::from_millis(250));
        });
    }

    #[tokio::test]
    async fn events_coalesce_per_path() {
        let dir = tempfile::tempdir().unwrap();
        let service = service_for(dir.path()).await;
        let file = dir.path().join("a.py");
        for _ in 0..5 {
            service.note_event(create_event(file.clone())).await;
        }
        assert_eq!(service.pending_len().await, 1);
        // A delete for the same path is a distinct pending entry.
        service.note_event(remove_event(file.clone())).await;
        assert_eq!(service.pending_len().await, 2);
    }

    #[tokio::test]
    async fn non_source_paths_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let service = service_for(dir.path()).await;
        service
            .note_event(create_event(dir.path().join("notes.txt")))
            .await;
        service
            .note_event(create_event(dir.path().join("image.png")))
            .await;
        assert_eq!(service.pending_len().await, 0);
    }

    #[tokio::test]
    async fn flush_waits_for_quiet_window() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.py"), "def f():\n    return 1\n").unwrap();
        let service = service_for(dir.path()).await;
        let cancel = CancellationToken::new();

        service
            .note_event(create_event(dir.path().join("a.py")))
            .await;
        // Too fresh: stays pending.
        service.flush_due(&cancel).await;
        assert_eq!(service.pending_len().await, 1);

        tokio::time::sleep(Duration::from_millis(80)).await;
        service.flush_due(&cancel).await;
        assert_eq!(service.pending_len().await, 0);
        let nodes = service
            .indexer
            .store()
            .get_nodes_by_file("a.py")
            .await
            .unwrap();
        assert_eq!(nodes.len(), 1);
    }

    #[tokio::test]
    async fn delete_events_purge_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("gone.py");
        std::fs::write(&file, "def f():\n    return 1\n").unwrap();
        let service = service_for(dir.path()).await;
        let cancel = CancellationToken::new();

        service.indexer.update_file(&cancel, &file).await.unwrap();
        assert!(!service
            .indexer
            .store()
            .get_nodes_by_file("gone.py")
            .await
            .unwrap()
            .is_empty());

        std::fs::remove_file(&file).unwrap();
        service.note_event(remove_event(file.clone())).await;
        tokio::time::sleep(Duration::from_millis(80)).await;
        service.flush_due(&cancel).await;
        assert!(service
            .indexer
            .store()
            .get_nodes_by_file("gone.py")
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn end_to_end_watch_picks_up_new_files() {
        let dir = tempfile::tempdir().unwrap();
        let service = Arc::new(service_for(dir.path()).await);
        let cancel = CancellationToken::new();

        let run_service = Arc::clone(&service);
        let run_cancel = cancel.clone();
        let handle = tokio::spawn(async move { run_service.run(&run_cancel).await });

        // Give the subscription a moment to establish, then create a file.
        tokio::time::sleep(Duration::from_millis(200)).await;
        std::fs::write(dir.path().join("fresh.py"), "def fresh():\n    return 1\n").unwrap();

        let mut found = false;
        for _ in 0..50 {
            tokio::time::sleep(Duration::from_millis(100)).await;
            if !service
                .indexer
                .store()
                .get_nodes_by_file("fresh.py")
                .await
                .unwrap()
                .is_empty()
            {
                found = true;
                break;
            }
        }
        cancel.cancel();
        handle.await.unwrap().unwrap();
        assert!(found, "watcher never indexed the new file");
    }
}
