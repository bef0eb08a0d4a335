use std::path::{Path, PathBuf};

/// Identifier of an open tab, unique for the session.
pub type TabId = u64;

/// Where the cursor goes when a file is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorHint {
    /// Wherever it was last time, or the start.
    Restore,
    /// A specific 1-based line and 0-based column, e.g. a search hit.
    At { line: usize, column: usize },
    /// Freshly created file: no history, cursor at the start, focus the buffer.
    NewFile,
}

/// Editor state of a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileState {
    Unopened,
    Clean,
    Modified,
}

/// One open buffer.
#[derive(Debug, Clone)]
pub struct FileTab {
    pub id: TabId,
    /// File name, or the untitled name.
    pub title: String,
    /// `None` for a buffer never saved.
    pub path: Option<PathBuf>,
    pub content: String,
    /// Set on every content change; cleared only by a save.
    pub modified: bool,
    pub cursor: CursorHint,
}

impl FileTab {
    pub fn state(&self) -> FileState {
        if self.modified {
            FileState::Modified
        } else {
            FileState::Clean
        }
    }
}

fn title_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.to_string_lossy().to_string())
}

/// The set of open tabs and which one is active.
#[derive(Debug, Default)]
pub struct EditorTabs {
    tabs: Vec<FileTab>,
    active: Option<TabId>,
    next_id: TabId,
}

impl EditorTabs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.tabs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tabs.is_empty()
    }

    pub fn active(&self) -> Option<&FileTab> {
        self.active.and_then(|id| self.get(id))
    }

    pub fn get(&self, id: TabId) -> Option<&FileTab> {
        self.tabs.iter().find(|t| t.id == id)
    }

    fn get_mut(&mut self, id: TabId) -> Option<&mut FileTab> {
        self.tabs.iter_mut().find(|t| t.id == id)
    }

    pub fn find_by_path(&self, path: &Path) -> Option<&FileTab> {
        self.tabs.iter().find(|t| t.path.as_deref() == Some(path))
    }

    fn allocate_id(&mut self) -> TabId {
        self.next_id += 1;
        self.next_id
    }

    /// Open `path` with freshly read `content`.
    ///
    /// An existing tab for the same path is focused and reloaded; otherwise a
    /// clean tab is appended and activated.
    pub fn open(&mut self, path: &Path, content: String, cursor: CursorHint) -> TabId {
        if let Some(tab) = self.tabs.iter_mut().find(|t| t.path.as_deref() == Some(path)) {
            tab.content = content;
            tab.modified = false;
            tab.cursor = cursor;
            let id = tab.id;
            self.active = Some(id);
            return id;
        }

        let id = self.allocate_id();
        self.tabs.push(FileTab {
            id,
            title: title_of(path),
            path: Some(path.to_path_buf()),
            content,
            modified: false,
            cursor,
        });
        self.active = Some(id);
        log::debug!("opened tab {} for {}", id, path.display());
        id
    }

    /// A new empty buffer with no backing file.
    pub fn new_untitled(&mut self, name: &str) -> TabId {
        let id = self.allocate_id();
        self.tabs.push(FileTab {
            id,
            title: name.to_string(),
            path: None,
            content: String::new(),
            modified: false,
            cursor: CursorHint::NewFile,
        });
        self.active = Some(id);
        id
    }

    /// Replace a tab's text. Marks it modified.
    pub fn set_content(&mut self, id: TabId, content: String) -> bool {
        match self.get_mut(id) {
            Some(tab) => {
                tab.content = content;
                tab.modified = true;
                true
            }
            None => false,
        }
    }

    /// Record a successful save of tab `id` to `path`.
    pub fn mark_saved(&mut self, id: TabId, path: &Path) -> bool {
        match self.get_mut(id) {
            Some(tab) => {
                tab.path = Some(path.to_path_buf());
                tab.title = title_of(path);
                tab.modified = false;
                true
            }
            None => false,
        }
    }

    /// Close a tab. When it was active, the next tab takes over, or the
    /// previous one if it was last.
    pub fn close(&mut self, id: TabId) -> Option<FileTab> {
        let index = self.tabs.iter().position(|t| t.id == id)?;
        let removed = self.tabs.remove(index);

        if self.active == Some(id) {
            self.active = if self.is_empty() {
                None
            } else {
                let next = index.min(self.len() - 1);
                Some(self.tabs[next].id)
            };
        }
        Some(removed)
    }

    /// Close every tab whose file lies at or under `path`.
    pub fn close_under(&mut self, path: &Path) -> usize {
        let ids: Vec<TabId> = self
            .tabs
            .iter()
            .filter(|t| t.path.as_deref().is_some_and(|p| p.starts_with(path)))
            .map(|t| t.id)
            .collect();
        for id in &ids {
            self.close(*id);
        }
        ids.len()
    }

    pub fn state_of(&self, path: &Path) -> FileState {
        self.find_by_path(path)
            .map(FileTab::state)
            .unwrap_or(FileState::Unopened)
    }
}
