use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::AppConfig;
use crate::coordinator::{MutationCoordinator, UNTITLED_NAME};
use crate::dialog::{Dialogs, FileFilter};
use crate::editor::{CursorHint, EditorTabs, TabId};
use crate::error::{AppError, Result};
use crate::event::{Event, EventHandler};
use crate::fs::access::{FileAccess, LocalFs};
use crate::fs::search::{SearchFileResult, SearchMatch};
use crate::fs::tree::{NodeType, TreeCache};
use crate::state::{RecentItem, StateStore};

/// Main application state.
pub struct App {
    access: Arc<dyn FileAccess>,
    dialogs: Arc<dyn Dialogs>,
    store: Arc<StateStore>,
    coordinator: MutationCoordinator,
    events: EventHandler,
    pub tree: TreeCache,
    pub tabs: EditorTabs,
}

impl App {
    /// Build the app on the local filesystem with persisted state from `config`.
    pub fn new(config: &AppConfig, dialogs: Arc<dyn Dialogs>) -> Self {
        let access: Arc<dyn FileAccess> = Arc::new(LocalFs::new(config.search_options()));
        let store = match config.state_file() {
            Some(path) => StateStore::open(path, config.recent_limit()),
            None => {
                log::warn!("no data directory; state will not persist");
                StateStore::in_memory()
            }
        };
        Self::with_parts(config, access, dialogs, Arc::new(store))
    }

    pub fn with_parts(
        config: &AppConfig,
        access: Arc<dyn FileAccess>,
        dialogs: Arc<dyn Dialogs>,
        store: Arc<StateStore>,
    ) -> Self {
        let events = EventHandler::new();
        let coordinator = MutationCoordinator::new(access.clone(), dialogs.clone(), events.sender());
        let tree = TreeCache::new(access.clone(), store.clone())
            .with_max_depth(config.max_refresh_depth());
        Self {
            access,
            dialogs,
            store,
            coordinator,
            events,
            tree,
            tabs: EditorTabs::new(),
        }
    }

    fn require_root(&self) -> Result<PathBuf> {
        self.tree
            .root_path()
            .map(Path::to_path_buf)
            .ok_or(AppError::NoRootOpen)
    }

    // ── Project ──────────────────────────────────────────────────────────

    /// Open `path` as the project root and remember it as recent.
    pub async fn open_directory(&mut self, path: &Path) -> Result<()> {
        self.tree.open(path).await?;
        self.store
            .add_recent(RecentItem::now(path, NodeType::Directory));
        Ok(())
    }

    /// Ask for a directory and open it. `false` when cancelled.
    #[allow(dead_code)]
    pub async fn prompt_open_directory(&mut self) -> Result<bool> {
        match self.dialogs.prompt_open_directory().await? {
            Some(path) => {
                self.open_directory(&path).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Close the tree and every tab.
    #[allow(dead_code)]
    pub fn close_project(&mut self) {
        self.tree.close();
        self.tabs = EditorTabs::new();
    }

    /// Expand `path` and every collapsed ancestor between it and the root.
    pub async fn expand_to(&mut self, path: &Path) -> Result<()> {
        let root = self.require_root()?;
        if !path.starts_with(&root) {
            return Err(AppError::InvalidPath(format!(
                "{} is outside {}",
                path.display(),
                root.display()
            )));
        }
        let mut chain: Vec<PathBuf> = path
            .ancestors()
            .take_while(|p| *p != root.as_path())
            .map(Path::to_path_buf)
            .collect();
        chain.reverse();
        for dir in chain {
            self.tree.expand(&dir).await?;
        }
        Ok(())
    }

    pub fn collapse(&mut self, path: &Path) -> bool {
        self.tree.collapse(path)
    }

    // ── Mutations ────────────────────────────────────────────────────────

    pub async fn create_item(&mut self, parent: &Path, name: &str, kind: NodeType) -> Result<PathBuf> {
        let path = self
            .coordinator
            .create_item(&mut self.tree, parent, name, kind)
            .await?;
        self.process_events().await;
        Ok(path)
    }

    pub async fn delete_item(&mut self, path: &Path, kind: NodeType) -> Result<()> {
        self.coordinator
            .delete_item(&mut self.tree, path, kind)
            .await?;
        self.store.remove_recent(path);
        self.process_events().await;
        Ok(())
    }

    /// Save arbitrary content, as from a buffer not held in a tab.
    pub async fn save_content(
        &mut self,
        target: Option<&Path>,
        content: &str,
        overwrite: bool,
    ) -> Result<Option<PathBuf>> {
        let saved = self
            .coordinator
            .save_file(&mut self.tree, target, content, overwrite)
            .await?;
        if let Some(path) = &saved {
            self.store.add_recent(RecentItem::now(path, NodeType::File));
        }
        self.process_events().await;
        Ok(saved)
    }

    /// Save the active tab. Untitled tabs always go through the prompt.
    #[allow(dead_code)]
    pub async fn save_active(&mut self) -> Result<Option<PathBuf>> {
        let tab = self
            .tabs
            .active()
            .ok_or_else(|| AppError::InvalidPath("no open tab".into()))?;
        let id = tab.id;
        let target = tab.path.clone();
        let content = tab.content.clone();

        let saved = self
            .save_content(target.as_deref(), &content, target.is_some())
            .await?;
        if let Some(path) = &saved {
            self.tabs.mark_saved(id, path);
        }
        Ok(saved)
    }

    /// A new untitled buffer.
    #[allow(dead_code)]
    pub fn new_untitled(&mut self) -> TabId {
        self.tabs.new_untitled(UNTITLED_NAME)
    }

    // ── Files ────────────────────────────────────────────────────────────

    /// Read `path` into a tab and record it as recent.
    ///
    /// A path that no longer exists is dropped from the recent list.
    pub async fn open_file(&mut self, path: &Path, cursor: CursorHint) -> Result<TabId> {
        let content = match self.access.read_file(path).await {
            Ok(c) => c,
            Err(e) => {
                if e.is_not_found() {
                    self.store.remove_recent(path);
                }
                log::error!("open {} failed: {}", path.display(), e);
                return Err(e);
            }
        };
        let id = self.tabs.open(path, content, cursor);
        self.store.add_recent(RecentItem::now(path, NodeType::File));
        Ok(id)
    }

    /// Ask for a file and open it. `None` when cancelled.
    ///
    /// An answer outside every filter is rejected without touching disk.
    pub async fn prompt_open_file(&mut self, filters: &[FileFilter]) -> Result<Option<TabId>> {
        let Some(path) = self.dialogs.prompt_open_file(filters).await? else {
            return Ok(None);
        };
        if !FileFilter::any_match(filters, &path) {
            return Err(AppError::InvalidPath(format!(
                "{} does not match {}",
                path.display(),
                filters
                    .iter()
                    .map(|f| f.name.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            )));
        }
        Ok(Some(self.open_file(&path, CursorHint::Restore).await?))
    }

    pub async fn search(&self, term: &str) -> Result<Vec<SearchFileResult>> {
        let root = self.require_root()?;
        self.access.search_text(term, &root).await
    }

    /// Open a search hit with the cursor on the match.
    #[allow(dead_code)]
    pub async fn open_search_hit(
        &mut self,
        result: &SearchFileResult,
        hit: &SearchMatch,
    ) -> Result<TabId> {
        let cursor = CursorHint::At {
            line: hit.line_number,
            column: hit.column_start,
        };
        self.open_file(&result.file_path, cursor).await
    }

    pub fn recent(&self, query: Option<&str>) -> Vec<RecentItem> {
        match query {
            Some(q) => self.store.search_recent(q),
            None => self.store.recent(),
        }
    }

    /// Wait for pending state writes.
    pub async fn shutdown(&self) {
        self.store.flush().await;
    }

    // ── Events ───────────────────────────────────────────────────────────

    /// Apply queued core events to the editor.
    pub async fn process_events(&mut self) {
        for event in self.events.drain() {
            match event {
                Event::OpenFile(request) => {
                    if let Err(e) = self.open_file(&request.path, request.cursor).await {
                        log::warn!("could not open {}: {}", request.path.display(), e);
                    }
                }
                Event::Removed(path) => {
                    let closed = self.tabs.close_under(&path);
                    if closed > 0 {
                        log::info!("closed {} tab(s) under {}", closed, path.display());
                    }
                }
                Event::TreeChanged(path) => log::debug!("tree changed at {}", path.display()),
                Event::Saved(path) => log::debug!("saved {}", path.display()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialog::{PresetDialogs, TerminalDialogs};
    use crate::editor::FileState;
    use std::io::Cursor;
    use std::fs;
    use tempfile::TempDir;

    fn app_with(dialogs: PresetDialogs) -> App {
        app_with_dialogs(Arc::new(dialogs))
    }

    fn app_with_dialogs(dialogs: Arc<dyn Dialogs>) -> App {
        App::with_parts(
            &AppConfig::default(),
            Arc::new(LocalFs::default()),
            dialogs,
            Arc::new(StateStore::in_memory()),
        )
    }

    /// Terminal prompts answered by `answers`, relative to `base`.
    fn typed(base: &Path, answers: &str) -> Arc<dyn Dialogs> {
        Arc::new(TerminalDialogs::with_input(
            base.to_path_buf(),
            Cursor::new(answers.as_bytes().to_vec()),
        ))
    }

    fn setup() -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("notes")).unwrap();
        fs::write(dir.path().join("notes").join("plan.md"), "step one\nstep two").unwrap();
        fs::write(dir.path().join("draft.md"), "draft").unwrap();
        dir
    }

    #[tokio::test]
    async fn created_file_opens_in_new_tab() {
        let dir = setup();
        let mut app = app_with(PresetDialogs::cancelling());
        app.open_directory(dir.path()).await.unwrap();

        let path = app
            .create_item(dir.path(), "fresh.md", NodeType::File)
            .await
            .unwrap();
        let tab = app.tabs.active().unwrap();
        assert_eq!(tab.path.as_deref(), Some(path.as_path()));
        assert_eq!(tab.cursor, CursorHint::NewFile);
        assert_eq!(app.tabs.state_of(&path), FileState::Clean);
    }

    #[tokio::test]
    async fn deleting_a_directory_closes_its_tabs() {
        let dir = setup();
        let mut app = app_with(PresetDialogs::cancelling());
        app.open_directory(dir.path()).await.unwrap();
        let plan = dir.path().join("notes").join("plan.md");
        app.open_file(&plan, CursorHint::Restore).await.unwrap();

        app.delete_item(&dir.path().join("notes"), NodeType::Directory)
            .await
            .unwrap();
        assert!(app.tabs.is_empty());
        assert_eq!(app.tabs.state_of(&plan), FileState::Unopened);
    }

    #[tokio::test]
    async fn save_active_untitled_prompts_and_retitles() {
        let dir = setup();
        let target = dir.path().join("named.md");
        let mut app = app_with(PresetDialogs::cancelling().with_save_file(target.clone()));
        app.open_directory(dir.path()).await.unwrap();

        let id = app.new_untitled();
        app.tabs.set_content(id, "# Named".into());
        let saved = app.save_active().await.unwrap();
        assert_eq!(saved, Some(target.clone()));
        assert_eq!(app.tabs.get(id).unwrap().title, "named.md");
        assert_eq!(app.tabs.state_of(&target), FileState::Clean);
        assert!(app.tree.find_node(&target).is_some());
    }

    #[tokio::test]
    async fn save_active_cancelled_stays_modified() {
        let dir = setup();
        let mut app = app_with(PresetDialogs::cancelling());
        app.open_directory(dir.path()).await.unwrap();
        let id = app.new_untitled();
        app.tabs.set_content(id, "unsaved".into());
        assert_eq!(app.save_active().await.unwrap(), None);
        assert!(app.tabs.get(id).unwrap().modified);
    }

    #[tokio::test]
    async fn save_active_existing_file_writes_in_place() {
        let dir = setup();
        let mut app = app_with(PresetDialogs::cancelling());
        app.open_directory(dir.path()).await.unwrap();
        let draft = dir.path().join("draft.md");
        let id = app.open_file(&draft, CursorHint::Restore).await.unwrap();
        app.tabs.set_content(id, "revised".into());

        assert_eq!(app.save_active().await.unwrap(), Some(draft.clone()));
        assert_eq!(fs::read_to_string(&draft).unwrap(), "revised");
        assert_eq!(app.tabs.state_of(&draft), FileState::Clean);
    }

    #[tokio::test]
    async fn opening_records_recent_items() {
        let dir = setup();
        let mut app = app_with(PresetDialogs::cancelling());
        app.open_directory(dir.path()).await.unwrap();
        app.open_file(&dir.path().join("draft.md"), CursorHint::Restore)
            .await
            .unwrap();

        let recent = app.recent(None);
        assert_eq!(recent.len(), 2);
        assert!(recent.iter().any(|r| r.kind == NodeType::Directory));
        assert_eq!(app.recent(Some("draft")).len(), 1);
    }

    #[tokio::test]
    async fn opening_missing_file_drops_it_from_recent() {
        let dir = setup();
        let mut app = app_with(PresetDialogs::cancelling());
        let draft = dir.path().join("draft.md");
        app.open_file(&draft, CursorHint::Restore).await.unwrap();
        fs::remove_file(&draft).unwrap();

        let err = app.open_file(&draft, CursorHint::Restore).await.unwrap_err();
        assert!(err.is_not_found());
        assert!(app.recent(None).is_empty());
    }

    #[tokio::test]
    async fn search_hit_opens_at_match() {
        let dir = setup();
        let mut app = app_with(PresetDialogs::cancelling());
        app.open_directory(dir.path()).await.unwrap();

        let results = app.search("TWO").await.unwrap();
        assert_eq!(results.len(), 1);
        let hit = &results[0].matches[0];
        assert_eq!(hit.line_number, 2);

        app.open_search_hit(&results[0], hit).await.unwrap();
        assert_eq!(
            app.tabs.active().unwrap().cursor,
            CursorHint::At { line: 2, column: 5 }
        );
    }

    #[tokio::test]
    async fn search_without_root_fails() {
        let app = app_with(PresetDialogs::cancelling());
        assert!(matches!(
            app.search("x").await.unwrap_err(),
            AppError::NoRootOpen
        ));
    }

    #[tokio::test]
    async fn prompt_open_directory_respects_cancel() {
        let dir = setup();
        let root = dir.path().canonicalize().unwrap();
        let mut app = app_with_dialogs(typed(&root, "."));
        assert!(app.prompt_open_directory().await.unwrap());
        assert_eq!(app.tree.root_path(), Some(root.as_path()));
        assert!(!app.prompt_open_directory().await.unwrap());
    }

    #[tokio::test]
    async fn prompt_open_file_opens_typed_path() {
        let dir = setup();
        let root = dir.path().canonicalize().unwrap();
        let mut app = app_with_dialogs(typed(&root, "notes/plan.md\n"));

        let id = app
            .prompt_open_file(&FileFilter::notes())
            .await
            .unwrap()
            .unwrap();
        let tab = app.tabs.get(id).unwrap();
        assert_eq!(tab.path.as_deref(), Some(root.join("notes").join("plan.md").as_path()));
        assert_eq!(tab.content, "step one\nstep two");
        assert_eq!(app.prompt_open_file(&FileFilter::notes()).await.unwrap(), None);
    }

    #[tokio::test]
    async fn prompt_open_file_rejects_filtered_out_answer() {
        let dir = setup();
        let root = dir.path().canonicalize().unwrap();
        fs::write(root.join("notes.txt"), "plain").unwrap();
        let mut app = app_with_dialogs(typed(&root, "notes.txt\n"));

        let markdown = [FileFilter::new("Markdown", &["md"])];
        let err = app.prompt_open_file(&markdown).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidPath(_)));
        assert!(app.tabs.is_empty());
        assert!(app.recent(None).is_empty());
    }

    #[tokio::test]
    async fn typed_relative_save_lands_in_tree() {
        let dir = setup();
        let root = dir.path().canonicalize().unwrap();
        let mut app = app_with_dialogs(typed(&root, "fresh.md\n"));
        app.open_directory(&root).await.unwrap();

        let saved = app.save_content(None, "typed", false).await.unwrap();
        let fresh = root.join("fresh.md");
        assert_eq!(saved, Some(fresh.clone()));
        assert_eq!(fs::read_to_string(&fresh).unwrap(), "typed");
        assert!(app.tree.find_node(&fresh).is_some());
    }

    #[tokio::test]
    async fn blank_save_answer_uses_target() {
        let dir = setup();
        let root = dir.path().canonicalize().unwrap();
        let mut app = app_with_dialogs(typed(&root, "\n"));
        app.open_directory(&root).await.unwrap();

        let draft = root.join("draft.md");
        let saved = app.save_content(Some(&draft), "again", false).await.unwrap();
        assert_eq!(saved, Some(draft.clone()));
        assert_eq!(fs::read_to_string(&draft).unwrap(), "again");
        // End of input cancels
        assert_eq!(app.save_content(None, "lost", false).await.unwrap(), None);
    }

    #[tokio::test]
    async fn expand_to_opens_intermediate_directories() {
        let dir = setup();
        fs::create_dir_all(dir.path().join("notes").join("a").join("b")).unwrap();
        let mut app = app_with(PresetDialogs::cancelling());
        app.open_directory(dir.path()).await.unwrap();

        let deep = dir.path().join("notes").join("a").join("b");
        app.expand_to(&deep).await.unwrap();
        assert!(app.tree.is_expanded(&dir.path().join("notes")));
        assert!(app.tree.is_expanded(&dir.path().join("notes").join("a")));
        assert!(app.tree.is_expanded(&deep));

        let err = app.expand_to(Path::new("/elsewhere")).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidPath(_)));
    }

    #[tokio::test]
    async fn close_project_drops_tree_and_tabs() {
        let dir = setup();
        let mut app = app_with(PresetDialogs::cancelling());
        app.open_directory(dir.path()).await.unwrap();
        app.open_file(&dir.path().join("draft.md"), CursorHint::Restore)
            .await
            .unwrap();
        app.close_project();
        assert!(app.tree.root().is_none());
        assert!(app.tabs.is_empty());
    }
}
