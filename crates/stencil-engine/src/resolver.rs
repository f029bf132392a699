//! Source resolvers: where template text comes from and how the engine
//! learns that it changed.

use notify::event::ModifyKind;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

/// What happened to a watched source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    /// Renamed or removed; the cached entry is dropped.
    Rename,
    /// Content changed; the cached entry is refreshed.
    Modify,
}

/// Returned by a watch callback to keep or end its watch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchControl {
    Continue,
    Stop,
}

/// Invoked once per change notification, possibly from another thread.
pub type WatchCallback = Box<dyn FnMut(ChangeKind) -> WatchControl + Send>;

/// Supplies template content and change notifications.
pub trait SourceResolver: Send + Sync {
    /// Read the whole source at `path`.
    fn read_all(&self, path: &str) -> io::Result<String>;

    /// Call `on_change` whenever `path` changes, until it returns
    /// [`WatchControl::Stop`]. Watching a path again replaces the previous
    /// watch.
    fn watch(&self, path: &str, on_change: WatchCallback) -> io::Result<()>;
}

// ═══════════════════════════════════════════════════════════════════════════
// Filesystem
// ═══════════════════════════════════════════════════════════════════════════

struct WatchSlot {
    _watcher: RecommendedWatcher,
    stopped: Arc<AtomicBool>,
}

/// Reads from the local filesystem and watches files with `notify`.
#[derive(Default)]
pub struct FsResolver {
    watchers: Mutex<HashMap<String, WatchSlot>>,
}

impl FsResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of watches that have not stopped.
    pub fn active_watches(&self) -> usize {
        let watchers = self.watchers.lock().unwrap_or_else(PoisonError::into_inner);
        watchers
            .values()
            .filter(|slot| !slot.stopped.load(Ordering::Acquire))
            .count()
    }
}

impl SourceResolver for FsResolver {
    fn read_all(&self, path: &str) -> io::Result<String> {
        fs::read_to_string(path)
    }

    fn watch(&self, path: &str, mut on_change: WatchCallback) -> io::Result<()> {
        let stopped = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&stopped);
        let watched = path.to_string();

        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            if flag.load(Ordering::Acquire) {
                return;
            }
            let event = match res {
                Ok(event) => event,
                Err(e) => {
                    log::warn!("watch on \"{watched}\" reported an error: {e}");
                    return;
                }
            };
            let Some(change) = classify(&event.kind) else {
                return;
            };
            if on_change(change) == WatchControl::Stop {
                flag.store(true, Ordering::Release);
            }
        })
        .map_err(io::Error::other)?;
        watcher
            .watch(Path::new(path), RecursiveMode::NonRecursive)
            .map_err(io::Error::other)?;

        let mut watchers = self.watchers.lock().unwrap_or_else(PoisonError::into_inner);
        watchers.retain(|_, slot| !slot.stopped.load(Ordering::Acquire));
        watchers.insert(
            path.to_string(),
            WatchSlot {
                _watcher: watcher,
                stopped,
            },
        );
        Ok(())
    }
}

fn classify(kind: &EventKind) -> Option<ChangeKind> {
    match kind {
        EventKind::Remove(_) | EventKind::Modify(ModifyKind::Name(_)) => Some(ChangeKind::Rename),
        EventKind::Modify(_) | EventKind::Create(_) => Some(ChangeKind::Modify),
        _ => None,
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// In-memory
// ═══════════════════════════════════════════════════════════════════════════

/// Holds sources in a map; changes are announced with [`notify_change`].
///
/// [`notify_change`]: MemoryResolver::notify_change
#[derive(Default)]
pub struct MemoryResolver {
    files: RwLock<HashMap<String, String>>,
    watchers: Mutex<HashMap<String, WatchCallback>>,
}

impl MemoryResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a source. Does not notify watchers.
    pub fn insert(&self, path: impl Into<String>, content: impl Into<String>) {
        let mut files = self.files.write().unwrap_or_else(PoisonError::into_inner);
        files.insert(path.into(), content.into());
    }

    pub fn remove(&self, path: &str) -> Option<String> {
        let mut files = self.files.write().unwrap_or_else(PoisonError::into_inner);
        files.remove(path)
    }

    pub fn is_watched(&self, path: &str) -> bool {
        let watchers = self.watchers.lock().unwrap_or_else(PoisonError::into_inner);
        watchers.contains_key(path)
    }

    /// Deliver `change` to the watch on `path`. Returns whether a watch
    /// was registered.
    pub fn notify_change(&self, path: &str, change: ChangeKind) -> bool {
        let callback = {
            let mut watchers = self.watchers.lock().unwrap_or_else(PoisonError::into_inner);
            watchers.remove(path)
        };
        let Some(mut callback) = callback else {
            return false;
        };
        if callback(change) == WatchControl::Continue {
            let mut watchers = self.watchers.lock().unwrap_or_else(PoisonError::into_inner);
            // A watch registered by the callback itself wins.
            watchers.entry(path.to_string()).or_insert(callback);
        }
        true
    }
}

impl SourceResolver for MemoryResolver {
    fn read_all(&self, path: &str) -> io::Result<String> {
        let files = self.files.read().unwrap_or_else(PoisonError::into_inner);
        files.get(path).cloned().ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, format!("no such template: {path}"))
        })
    }

    fn watch(&self, path: &str, on_change: WatchCallback) -> io::Result<()> {
        let mut watchers = self.watchers.lock().unwrap_or_else(PoisonError::into_inner);
        watchers.insert(path.to_string(), on_change);
        Ok(())
    }
}
