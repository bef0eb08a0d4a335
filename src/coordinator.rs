//! Filesystem mutations followed by a targeted resync of the tree cache.
//!
//! The filesystem call decides success. Once it has succeeded the mutation
//! stands: a failing resync is logged and leaves the cache stale until the
//! next refresh.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::dialog::{Dialogs, FileFilter};
use crate::editor::CursorHint;
use crate::error::{AppError, Result};
use crate::event::{Event, OpenRequest};
use crate::fs::access::FileAccess;
use crate::fs::tree::{NodeType, TreeCache};

/// Fallback file name offered by the save prompt.
pub const UNTITLED_NAME: &str = "untitled.md";

pub struct MutationCoordinator {
    access: Arc<dyn FileAccess>,
    dialogs: Arc<dyn Dialogs>,
    events: mpsc::UnboundedSender<Event>,
}

impl MutationCoordinator {
    pub fn new(
        access: Arc<dyn FileAccess>,
        dialogs: Arc<dyn Dialogs>,
        events: mpsc::UnboundedSender<Event>,
    ) -> Self {
        Self {
            access,
            dialogs,
            events,
        }
    }

    fn emit(&self, event: Event) {
        if self.events.send(event).is_err() {
            log::debug!("event dropped: no receiver");
        }
    }

    async fn resync(&self, tree: &mut TreeCache, anchor: &Path) {
        if let Err(e) = tree.refresh_subtree(anchor).await {
            log::warn!("tree resync at {} failed: {}", anchor.display(), e);
            return;
        }
        self.emit(Event::TreeChanged(anchor.to_path_buf()));
    }

    /// Create an empty file or directory named `name` under `parent`.
    ///
    /// The nearest directory of `parent` already in the cache is refreshed
    /// and `parent` is expanded. New files are handed to the editor.
    pub async fn create_item(
        &self,
        tree: &mut TreeCache,
        parent: &Path,
        name: &str,
        kind: NodeType,
    ) -> Result<PathBuf> {
        let path = self
            .access
            .create_entry(parent, name, kind)
            .await
            .map_err(|e| {
                log::error!("create {} in {} failed: {}", name, parent.display(), e);
                e
            })?;
        log::info!("created {:?} {}", kind, path.display());

        if let Some(anchor) = tree.nearest_tracked_ancestor(parent) {
            if parent.starts_with(&anchor) {
                tree.reveal(parent);
            }
            self.resync(tree, &anchor).await;
        }

        if kind == NodeType::File {
            self.emit(Event::OpenFile(OpenRequest {
                path: path.clone(),
                cursor: CursorHint::NewFile,
            }));
        }
        Ok(path)
    }

    /// Delete a file, or a directory with everything under it.
    ///
    /// The whole tree is refreshed from the root afterwards.
    pub async fn delete_item(
        &self,
        tree: &mut TreeCache,
        path: &Path,
        kind: NodeType,
    ) -> Result<()> {
        if tree.root_path() == Some(path) {
            log::error!("refusing to delete the open root {}", path.display());
            return Err(AppError::InvalidPath(format!(
                "{} is the open root",
                path.display()
            )));
        }
        if !self.access.exists(path).await {
            log::error!("delete {} failed: not found", path.display());
            return Err(AppError::NotFound(path.to_path_buf()));
        }

        self.access.delete_entry(path, kind).await.map_err(|e| {
            log::error!("delete {} failed: {}", path.display(), e);
            e
        })?;
        log::info!("deleted {:?} {}", kind, path.display());
        self.emit(Event::Removed(path.to_path_buf()));

        tree.forget_subtree(path);
        if let Some(root) = tree.root_path().map(Path::to_path_buf) {
            self.resync(tree, &root).await;
        }
        Ok(())
    }

    /// Save `content` and return where it went.
    ///
    /// With `overwrite` and an existing `target` the file is written in
    /// place. Otherwise the save prompt picks the destination; cancelling it
    /// returns `None` and touches nothing.
    pub async fn save_file(
        &self,
        tree: &mut TreeCache,
        target: Option<&Path>,
        content: &str,
        overwrite: bool,
    ) -> Result<Option<PathBuf>> {
        let in_place = match target {
            Some(t) if overwrite => self.access.exists(t).await.then(|| t.to_path_buf()),
            _ => None,
        };

        let destination = match in_place {
            Some(path) => path,
            None => {
                let default = match (target, tree.root_path()) {
                    (Some(t), _) => t.to_path_buf(),
                    (None, Some(root)) => root.join(UNTITLED_NAME),
                    (None, None) => PathBuf::from(UNTITLED_NAME),
                };
                match self
                    .dialogs
                    .prompt_save_file(&default, &FileFilter::notes())
                    .await?
                {
                    Some(path) => path,
                    None => {
                        log::info!("save cancelled");
                        return Ok(None);
                    }
                }
            }
        };

        self.access
            .write_file(&destination, content)
            .await
            .map_err(|e| {
                log::error!("save {} failed: {}", destination.display(), e);
                e
            })?;
        log::info!("saved {}", destination.display());
        self.emit(Event::Saved(destination.clone()));

        if let Some(root) = tree.root_path().map(Path::to_path_buf) {
            if destination.starts_with(&root) {
                self.resync(tree, &root).await;
            }
        }
        Ok(Some(destination))
    }
}
