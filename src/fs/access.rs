use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::error::{IoContext, Result};
use crate::fs::operations;
use crate::fs::search::{self, SearchFileResult, SearchOptions};
use crate::fs::tree::NodeType;

/// One entry returned by a directory listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub path: PathBuf,
    pub kind: NodeType,
}

/// Filesystem operations the workspace core depends on.
///
/// Every call is a suspend point; implementations must not block the
/// caller's thread.
#[async_trait]
pub trait FileAccess: Send + Sync {
    /// Immediate entries of `path`, hidden ones included, in no particular order.
    async fn list_directory(&self, path: &Path) -> Result<Vec<DirEntry>>;

    async fn read_file(&self, path: &Path) -> Result<String>;

    /// Create or truncate-and-overwrite.
    async fn write_file(&self, path: &Path, content: &str) -> Result<()>;

    /// Fails with `AlreadyExists` if `parent/name` is already present.
    async fn create_entry(&self, parent: &Path, name: &str, kind: NodeType) -> Result<PathBuf>;

    /// Recursive for directories.
    async fn delete_entry(&self, path: &Path, kind: NodeType) -> Result<()>;

    async fn exists(&self, path: &Path) -> bool;

    async fn search_text(&self, term: &str, root: &Path) -> Result<Vec<SearchFileResult>>;
}

/// `FileAccess` backed by the local filesystem through `tokio::fs`.
#[derive(Debug, Clone, Default)]
pub struct LocalFs {
    search: SearchOptions,
}

impl LocalFs {
    pub fn new(search: SearchOptions) -> Self {
        Self { search }
    }
}

#[async_trait]
impl FileAccess for LocalFs {
    async fn list_directory(&self, path: &Path) -> Result<Vec<DirEntry>> {
        let mut reader = tokio::fs::read_dir(path).await.at(path)?;
        let mut entries = Vec::new();

        // Broken symlinks are skipped; a failing iterator ends the listing.
        loop {
            let entry = match reader.next_entry().await {
                Ok(Some(e)) => e,
                Ok(None) => break,
                Err(e) => {
                    log::warn!("list {}: stopped early: {}", path.display(), e);
                    break;
                }
            };
            let entry_path = entry.path();
            let kind = match tokio::fs::metadata(&entry_path).await {
                Ok(meta) if meta.is_dir() => NodeType::Directory,
                Ok(_) => NodeType::File,
                Err(_) => continue,
            };
            entries.push(DirEntry {
                name: entry.file_name().to_string_lossy().to_string(),
                path: entry_path,
                kind,
            });
        }
        Ok(entries)
    }

    async fn read_file(&self, path: &Path) -> Result<String> {
        operations::read_file(path).await
    }

    async fn write_file(&self, path: &Path, content: &str) -> Result<()> {
        operations::write_file(path, content).await
    }

    async fn create_entry(&self, parent: &Path, name: &str, kind: NodeType) -> Result<PathBuf> {
        operations::create_entry(parent, name, kind).await
    }

    async fn delete_entry(&self, path: &Path, kind: NodeType) -> Result<()> {
        operations::delete(path, kind).await
    }

    async fn exists(&self, path: &Path) -> bool {
        tokio::fs::symlink_metadata(path).await.is_ok()
    }

    async fn search_text(&self, term: &str, root: &Path) -> Result<Vec<SearchFileResult>> {
        search::search_in_files(term, root, &self.search).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[tokio::test]
    async fn list_directory_reports_kinds() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir(tmp.path().join("notes")).unwrap();
        fs::write(tmp.path().join("draft.md"), "").unwrap();
        fs::write(tmp.path().join(".hidden"), "").unwrap();

        let mut entries = LocalFs::default()
            .list_directory(tmp.path())
            .await
            .unwrap();
        entries.sort_by(|a, b| a.name.cmp(&b.name));

        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].name, ".hidden");
        assert_eq!(entries[1].name, "draft.md");
        assert_eq!(entries[1].kind, NodeType::File);
        assert_eq!(entries[2].name, "notes");
        assert_eq!(entries[2].kind, NodeType::Directory);
        assert_eq!(entries[2].path, tmp.path().join("notes"));
    }

    #[tokio::test]
    async fn list_missing_directory_fails() {
        let tmp = TempDir::new().unwrap();
        let err = LocalFs::default()
            .list_directory(&tmp.path().join("missing"))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn exists_tracks_filesystem() {
        let tmp = TempDir::new().unwrap();
        let access = LocalFs::default();
        let path = tmp.path().join("a.md");
        assert!(!access.exists(&path).await);
        access.write_file(&path, "hi").await.unwrap();
        assert!(access.exists(&path).await);
        assert_eq!(access.read_file(&path).await.unwrap(), "hi");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn broken_symlink_is_skipped() {
        let tmp = TempDir::new().unwrap();
        std::os::unix::fs::symlink(tmp.path().join("nowhere"), tmp.path().join("dangling"))
            .unwrap();
        fs::write(tmp.path().join("real.md"), "").unwrap();
        let entries = LocalFs::default()
            .list_directory(tmp.path())
            .await
            .unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "real.md");
    }
}
