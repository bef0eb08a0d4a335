use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::fs::access::{DirEntry, FileAccess};
use crate::state::StateStore;

/// Default bound on how deep a resync descends below its starting node.
pub const DEFAULT_MAX_REFRESH_DEPTH: usize = 64;

/// Type of filesystem node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeType {
    File,
    Directory,
}

/// A node in the cached tree.
///
/// `children` is always a concrete list. For files it stays empty; for
/// directories it is empty until the first fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryNode {
    pub name: String,
    pub path: PathBuf,
    pub node_type: NodeType,
    pub children: Vec<DirectoryNode>,
}

impl DirectoryNode {
    /// An unpopulated directory node for `path`.
    pub fn directory(path: &Path) -> Self {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.to_string_lossy().to_string());
        Self {
            name,
            path: path.to_path_buf(),
            node_type: NodeType::Directory,
            children: Vec::new(),
        }
    }

    fn from_entry(entry: DirEntry) -> Self {
        Self {
            name: entry.name,
            path: entry.path,
            node_type: entry.kind,
            children: Vec::new(),
        }
    }

    pub fn is_dir(&self) -> bool {
        self.node_type == NodeType::Directory
    }

    /// Find a node by path in this subtree.
    pub fn find(&self, target: &Path) -> Option<&DirectoryNode> {
        if self.path == target {
            return Some(self);
        }
        if !target.starts_with(&self.path) {
            return None;
        }
        self.children.iter().find_map(|c| c.find(target))
    }

    /// Find a mutable reference to a node by path.
    fn find_mut(&mut self, target: &Path) -> Option<&mut DirectoryNode> {
        if self.path == target {
            return Some(self);
        }
        if !target.starts_with(&self.path) {
            return None;
        }
        self.children.iter_mut().find_map(|c| c.find_mut(target))
    }

    /// Install freshly fetched children.
    ///
    /// Directories that survive the refresh keep their previously loaded
    /// children, so collapsed subtrees are not thrown away.
    fn replace_children(&mut self, fresh: Vec<DirectoryNode>) {
        let mut previous: HashMap<PathBuf, Vec<DirectoryNode>> = std::mem::take(&mut self.children)
            .into_iter()
            .filter(|c| c.is_dir())
            .map(|c| (c.path, c.children))
            .collect();

        self.children = fresh
            .into_iter()
            .map(|mut child| {
                if child.is_dir() {
                    if let Some(kept) = previous.remove(&child.path) {
                        child.children = kept;
                    }
                }
                child
            })
            .collect();
    }
}

/// Compare two entry names the way a locale-aware collation would.
///
/// Case-folded text decides first; for names equal up to case, lowercase
/// sorts before uppercase at the first differing character. Raw bytes break
/// any remaining tie so the order is total.
pub fn compare_names(a: &str, b: &str) -> Ordering {
    let folded = a
        .chars()
        .flat_map(char::to_lowercase)
        .cmp(b.chars().flat_map(char::to_lowercase));
    folded
        .then_with(|| case_tiebreak(a, b))
        .then_with(|| a.cmp(b))
}

fn case_tiebreak(a: &str, b: &str) -> Ordering {
    for (ca, cb) in a.chars().zip(b.chars()) {
        if ca == cb {
            continue;
        }
        match (ca.is_lowercase(), cb.is_lowercase()) {
            (true, false) => return Ordering::Less,
            (false, true) => return Ordering::Greater,
            _ => {}
        }
    }
    Ordering::Equal
}

/// Directories first, then by name.
pub fn sort_children(children: &mut [DirectoryNode]) {
    children.sort_by(|a, b| {
        b.is_dir()
            .cmp(&a.is_dir())
            .then_with(|| compare_names(&a.name, &b.name))
    });
}

pub fn is_hidden(name: &str) -> bool {
    name.starts_with('.')
}

/// Paths of directories currently expanded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExpansionSet(BTreeSet<PathBuf>);

impl ExpansionSet {
    pub fn insert(&mut self, path: PathBuf) -> bool {
        self.0.insert(path)
    }

    pub fn remove(&mut self, path: &Path) -> bool {
        self.0.remove(path)
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.0.contains(path)
    }

    /// Remove `path` and everything below it.
    pub fn remove_subtree(&mut self, path: &Path) {
        self.0.retain(|p| !p.starts_with(path));
    }

    pub fn iter(&self) -> impl Iterator<Item = &PathBuf> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }
}

impl FromIterator<PathBuf> for ExpansionSet {
    fn from_iter<I: IntoIterator<Item = PathBuf>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// A flattened representation of a tree node for rendering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlatItem {
    pub name: String,
    pub path: PathBuf,
    pub node_type: NodeType,
    pub depth: usize,
    pub is_expanded: bool,
    pub is_last_sibling: bool,
}

/// Lazily populated mirror of one directory subtree.
pub struct TreeCache {
    access: Arc<dyn FileAccess>,
    store: Arc<StateStore>,
    root: Option<DirectoryNode>,
    expansion: ExpansionSet,
    max_depth: usize,
}

impl TreeCache {
    pub fn new(access: Arc<dyn FileAccess>, store: Arc<StateStore>) -> Self {
        Self {
            access,
            store,
            root: None,
            expansion: ExpansionSet::default(),
            max_depth: DEFAULT_MAX_REFRESH_DEPTH,
        }
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn root(&self) -> Option<&DirectoryNode> {
        self.root.as_ref()
    }

    pub fn root_path(&self) -> Option<&Path> {
        self.root.as_ref().map(|r| r.path.as_path())
    }

    pub fn is_expanded(&self, path: &Path) -> bool {
        self.expansion.contains(path)
    }

    pub fn find_node(&self, path: &Path) -> Option<&DirectoryNode> {
        self.root.as_ref().and_then(|r| r.find(path))
    }

    fn require_root(&self) -> Result<PathBuf> {
        self.root_path()
            .map(Path::to_path_buf)
            .ok_or(AppError::NoRootOpen)
    }

    /// One listing of `path`: hidden entries dropped, sorted.
    async fn fetch_children(&self, path: &Path) -> Result<Vec<DirectoryNode>> {
        let entries = self.access.list_directory(path).await?;
        let mut children: Vec<DirectoryNode> = entries
            .into_iter()
            .filter(|e| !is_hidden(&e.name))
            .map(DirectoryNode::from_entry)
            .collect();
        sort_children(&mut children);
        log::debug!("fetched {} ({} entries)", path.display(), children.len());
        Ok(children)
    }

    /// Open `root_path` as the tree root.
    ///
    /// Any previously open root is closed first. The saved expansion set for
    /// this root is restored, keeping only paths that still list as
    /// directories under the root.
    pub async fn open(&mut self, root_path: &Path) -> Result<&DirectoryNode> {
        if self.root.is_some() {
            self.close();
        }

        let children = match self.fetch_children(root_path).await {
            Ok(c) => c,
            Err(e) => {
                log::error!("cannot open {}: {}", root_path.display(), e);
                let is_other_io = matches!(e, AppError::Io { .. });
                if is_other_io && self.access.exists(root_path).await {
                    return Err(AppError::InvalidPath(format!(
                        "{} is not a directory",
                        root_path.display()
                    )));
                }
                return Err(e);
            }
        };
        let mut root = DirectoryNode::directory(root_path);
        root.children = children;

        let mut expansion = ExpansionSet::default();
        expansion.insert(root_path.to_path_buf());
        for saved in self.store.load_expansion(root_path) {
            if saved == root_path || !saved.starts_with(root_path) {
                continue;
            }
            match self.access.list_directory(&saved).await {
                Ok(_) => {
                    expansion.insert(saved);
                }
                Err(e) => log::info!("dropping expanded path {}: {}", saved.display(), e),
            }
        }

        self.root = Some(root);
        self.expansion = expansion;
        self.resync_expanded_children(root_path).await;
        self.persist();

        log::info!(
            "opened {} ({} expanded)",
            root_path.display(),
            self.expansion.len()
        );
        self.root.as_ref().ok_or(AppError::NoRootOpen)
    }

    /// Persist the expansion set and drop the tree.
    pub fn close(&mut self) {
        if self.root.is_some() {
            self.persist();
            log::info!("closed {}", self.root_path().unwrap_or(Path::new("")).display());
        }
        self.root = None;
        self.expansion.clear();
    }

    /// Expand a directory: fetch its children and mark it expanded.
    ///
    /// Files are ignored. Expanding an expanded directory refreshes it.
    pub async fn expand(&mut self, path: &Path) -> Result<()> {
        let node = self
            .find_node(path)
            .ok_or_else(|| AppError::NotFound(path.to_path_buf()))?;
        if !node.is_dir() {
            return Ok(());
        }

        let newly_added = self.expansion.insert(path.to_path_buf());
        if let Err(e) = self.refresh_subtree(path).await {
            if newly_added {
                self.expansion.remove(path);
            }
            log::error!("expand {} failed: {}", path.display(), e);
            return Err(e);
        }
        self.persist();
        Ok(())
    }

    /// Mark a directory collapsed. Loaded children are kept.
    ///
    /// Returns whether anything changed; the root never collapses.
    pub fn collapse(&mut self, path: &Path) -> bool {
        if self.root_path() == Some(path) {
            return false;
        }
        let changed = self.expansion.remove(path);
        if changed {
            self.persist();
        }
        changed
    }

    /// Re-fetch `path` and every expanded directory below it.
    ///
    /// A failure to list `path` itself is returned; failures further down are
    /// logged and leave that subtree stale.
    pub async fn refresh_subtree(&mut self, path: &Path) -> Result<()> {
        self.require_root()?;
        match self.find_node(path) {
            Some(node) if node.is_dir() => {}
            Some(_) => return Ok(()),
            None => return Err(AppError::NotFound(path.to_path_buf())),
        }

        let fresh = self.fetch_children(path).await?;
        if let Some(node) = self.root.as_mut().and_then(|r| r.find_mut(path)) {
            node.replace_children(fresh);
        }
        self.resync_expanded_children(path).await;
        Ok(())
    }

    /// Breadth-first resync of expanded directories strictly below `start`.
    async fn resync_expanded_children(&mut self, start: &Path) -> usize {
        let mut queue: VecDeque<(PathBuf, usize)> = VecDeque::new();
        self.enqueue_expanded_children(start, 0, &mut queue);

        let mut refreshed = 0;
        while let Some((dir, depth)) = queue.pop_front() {
            let fresh = match self.fetch_children(&dir).await {
                Ok(c) => c,
                Err(e) => {
                    log::warn!("resync of {} skipped: {}", dir.display(), e);
                    continue;
                }
            };
            match self.root.as_mut().and_then(|r| r.find_mut(&dir)) {
                Some(node) => node.replace_children(fresh),
                None => continue,
            }
            refreshed += 1;
            self.enqueue_expanded_children(&dir, depth, &mut queue);
        }
        log::debug!("resynced {} directories below {}", refreshed, start.display());
        refreshed
    }

    fn enqueue_expanded_children(
        &self,
        dir: &Path,
        depth: usize,
        queue: &mut VecDeque<(PathBuf, usize)>,
    ) {
        if depth >= self.max_depth {
            log::debug!("resync depth limit reached at {}", dir.display());
            return;
        }
        if let Some(node) = self.find_node(dir) {
            for child in &node.children {
                if child.is_dir() && self.expansion.contains(&child.path) {
                    queue.push_back((child.path.clone(), depth + 1));
                }
            }
        }
    }

    /// Closest directory node tracked in the tree that contains `path`.
    pub fn nearest_tracked_ancestor(&self, path: &Path) -> Option<PathBuf> {
        let root = self.root_path()?;
        path.ancestors()
            .filter(|p| p.starts_with(root))
            .find(|p| self.find_node(p).is_some_and(DirectoryNode::is_dir))
            .map(Path::to_path_buf)
            .or_else(|| Some(root.to_path_buf()))
    }

    /// Mark `dir` and its ancestors up to the root expanded, without fetching.
    pub(crate) fn reveal(&mut self, dir: &Path) {
        let Some(root) = self.root_path().map(Path::to_path_buf) else {
            return;
        };
        let mut changed = false;
        for ancestor in dir.ancestors().take_while(|p| p.starts_with(&root)) {
            changed |= self.expansion.insert(ancestor.to_path_buf());
        }
        if changed {
            self.persist();
        }
    }

    /// Drop `path` and its descendants from the expansion set.
    pub(crate) fn forget_subtree(&mut self, path: &Path) {
        let before = self.expansion.len();
        self.expansion.remove_subtree(path);
        if self.expansion.len() != before {
            self.persist();
        }
    }

    fn persist(&self) {
        if let Some(root) = self.root_path() {
            self.store.save_expansion(root, &self.expansion);
        }
    }

    /// Visible rows: the root, then children of expanded directories.
    pub fn flatten(&self) -> Vec<FlatItem> {
        let mut items = Vec::new();
        if let Some(root) = &self.root {
            self.flatten_node(root, 0, true, &mut items);
        }
        items
    }

    fn flatten_node(
        &self,
        node: &DirectoryNode,
        depth: usize,
        is_last: bool,
        items: &mut Vec<FlatItem>,
    ) {
        let is_expanded = node.is_dir() && self.expansion.contains(&node.path);
        items.push(FlatItem {
            name: node.name.clone(),
            path: node.path.clone(),
            node_type: node.node_type,
            depth,
            is_expanded,
            is_last_sibling: is_last,
        });

        if is_expanded {
            let count = node.children.len();
            for (i, child) in node.children.iter().enumerate() {
                self.flatten_node(child, depth + 1, i + 1 == count, items);
            }
        }
    }
}
