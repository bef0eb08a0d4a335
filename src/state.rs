//! Persisted UI state: expanded directories per root and recently opened items.
//!
//! Stored as one JSON document. A missing file means empty state; a corrupt
//! file is logged and replaced on the next save. Write failures never abort
//! the operation that triggered them.
//!
//! Inside a tokio runtime each change is written on the blocking pool. Every
//! snapshot carries a generation number and an older snapshot never
//! overwrites a newer one.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;

use crate::error::{AppError, Result};
use crate::fs::tree::{ExpansionSet, NodeType};

/// Default cap on the recent-items list.
pub const DEFAULT_RECENT_LIMIT: usize = 20;

/// A recently opened file or directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecentItem {
    pub path: PathBuf,
    pub name: String,
    pub kind: NodeType,
    pub timestamp: DateTime<Utc>,
}

impl RecentItem {
    /// Build an item for `path` stamped with the current time.
    pub fn now(path: &Path, kind: NodeType) -> Self {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.to_string_lossy().to_string());
        Self {
            path: path.to_path_buf(),
            name,
            kind,
            timestamp: Utc::now(),
        }
    }
}

/// On-disk document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistedState {
    /// Expanded directory paths keyed by root path.
    pub expanded: BTreeMap<PathBuf, Vec<PathBuf>>,
    pub recent: Vec<RecentItem>,
}

/// Process-scoped store shared by the tree cache and the app.
#[derive(Debug)]
pub struct StateStore {
    /// `None` keeps everything in memory.
    path: Option<PathBuf>,
    state: RwLock<PersistedState>,
    recent_limit: usize,
    /// Generation of the latest snapshot taken; guarded with `state`.
    generation: Mutex<u64>,
    /// Generation last written to disk.
    written: Arc<Mutex<u64>>,
    /// Newest spawned write and its generation.
    pending: Mutex<Option<(u64, JoinHandle<()>)>>,
}

impl StateStore {
    /// Open the store backed by `path`, loading whatever is there.
    pub fn open(path: PathBuf, recent_limit: usize) -> Self {
        let state = Self::load_from_file(&path);
        Self {
            path: Some(path),
            state: RwLock::new(state),
            recent_limit: recent_limit.max(1),
            generation: Mutex::new(0),
            written: Arc::new(Mutex::new(0)),
            pending: Mutex::new(None),
        }
    }

    /// A store that never touches disk.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            state: RwLock::new(PersistedState::default()),
            recent_limit: DEFAULT_RECENT_LIMIT,
            generation: Mutex::new(0),
            written: Arc::new(Mutex::new(0)),
            pending: Mutex::new(None),
        }
    }

    /// Default location: `<data_dir>/note-explorer/state.json`.
    pub fn default_path() -> Option<PathBuf> {
        dirs::data_dir().map(|d| d.join("note-explorer").join("state.json"))
    }

    fn load_from_file(path: &Path) -> PersistedState {
        let content = match fs::read_to_string(path) {
            Ok(c) => c,
            Err(_) => return PersistedState::default(),
        };
        match serde_json::from_str(&content) {
            Ok(state) => state,
            Err(e) => {
                log::warn!("ignoring corrupt state file {}: {}", path.display(), e);
                PersistedState::default()
            }
        }
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, PersistedState> {
        self.state.read().unwrap_or_else(|p| p.into_inner())
    }

    fn update<F: FnOnce(&mut PersistedState)>(&self, f: F) {
        let snapshot = {
            let mut state = self.state.write().unwrap_or_else(|p| p.into_inner());
            f(&mut state);
            let Some(path) = self.path.clone() else {
                return;
            };
            let mut generation = self.generation.lock().unwrap_or_else(|p| p.into_inner());
            *generation += 1;
            match serde_json::to_string_pretty(&*state) {
                Ok(content) => Snapshot {
                    path,
                    content,
                    generation: *generation,
                },
                Err(e) => {
                    log::warn!("failed to serialize state: {}", e);
                    return;
                }
            }
        };

        let written = self.written.clone();
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let generation = snapshot.generation;
                let task = handle.spawn_blocking(move || snapshot.write(&written));
                let mut pending = self.pending.lock().unwrap_or_else(|p| p.into_inner());
                if pending.as_ref().map_or(true, |(g, _)| *g < generation) {
                    *pending = Some((generation, task));
                }
            }
            Err(_) => snapshot.write(&written),
        }
    }

    /// Wait until the latest change is on disk.
    pub async fn flush(&self) {
        let task = self.pending.lock().unwrap_or_else(|p| p.into_inner()).take();
        if let Some((_, task)) = task {
            if let Err(e) = task.await {
                log::warn!("state writer failed: {}", e);
            }
        }
    }

    // ── Expansion ─────────────────────────────────────────────────────

    /// Saved expanded paths for `root`, unvalidated.
    pub fn load_expansion(&self, root: &Path) -> Vec<PathBuf> {
        self.read().expanded.get(root).cloned().unwrap_or_default()
    }

    pub fn save_expansion(&self, root: &Path, expansion: &ExpansionSet) {
        let paths: Vec<PathBuf> = expansion.iter().cloned().collect();
        self.update(|state| {
            state.expanded.insert(root.to_path_buf(), paths);
        });
    }

    // ── Recent items ──────────────────────────────────────────────────

    /// Record an opened item. An existing entry for the same path is
    /// refreshed; otherwise the oldest entry is evicted once the cap is hit.
    pub fn add_recent(&self, item: RecentItem) {
        let limit = self.recent_limit;
        self.update(|state| {
            if let Some(existing) = state.recent.iter_mut().find(|i| i.path == item.path) {
                *existing = item;
                return;
            }
            while state.recent.len() >= limit {
                let oldest = state
                    .recent
                    .iter()
                    .enumerate()
                    .min_by_key(|(_, i)| i.timestamp)
                    .map(|(idx, _)| idx);
                match oldest {
                    Some(idx) => {
                        state.recent.remove(idx);
                    }
                    None => break,
                }
            }
            state.recent.push(item);
        });
    }

    pub fn remove_recent(&self, path: &Path) {
        self.update(|state| state.recent.retain(|i| i.path != path));
    }

    /// Recent items, newest first.
    pub fn recent(&self) -> Vec<RecentItem> {
        let mut items = self.read().recent.clone();
        items.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        items
    }

    /// Recent items whose name or path contains `query`, case-insensitively.
    pub fn search_recent(&self, query: &str) -> Vec<RecentItem> {
        let query = query.trim().to_lowercase();
        let items = self.recent();
        if query.is_empty() {
            return items;
        }
        items
            .into_iter()
            .filter(|i| {
                i.name.to_lowercase().contains(&query)
                    || i.path.to_string_lossy().to_lowercase().contains(&query)
            })
            .collect()
    }
}

/// One serialized document waiting to be written.
struct Snapshot {
    path: PathBuf,
    content: String,
    generation: u64,
}

impl Snapshot {
    fn write(self, written: &Mutex<u64>) {
        let mut last = written.lock().unwrap_or_else(|p| p.into_inner());
        if *last >= self.generation {
            return;
        }
        match self.write_file() {
            Ok(()) => *last = self.generation,
            Err(e) => log::warn!("failed to persist state: {}", e),
        }
    }

    fn write_file(&self) -> Result<()> {
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir).map_err(|e| AppError::io(dir, e))?;
        }
        fs::write(&self.path, &self.content).map_err(|e| AppError::io(&self.path, e))
    }
}
