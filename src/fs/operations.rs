use std::path::{Component, Path, PathBuf};

use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::error::{AppError, IoContext, Result};
use crate::fs::tree::NodeType;

/// Check that `name` is a relative path that stays under its parent.
///
/// Nested names like `drafts/today.md` are allowed. Empty names, names with
/// surrounding whitespace, absolute paths and `..` components are not.
pub fn validate_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(AppError::InvalidPath("name is empty".into()));
    }
    if name.trim() != name {
        return Err(AppError::InvalidPath(format!(
            "{:?} has leading or trailing whitespace",
            name
        )));
    }
    let path = Path::new(name);
    for component in path.components() {
        match component {
            Component::Normal(_) => {}
            Component::CurDir => {}
            _ => return Err(AppError::InvalidPath(name.to_string())),
        }
    }
    Ok(())
}

/// Create an empty file. Fails with `AlreadyExists` if anything is there.
///
/// Uses create-new semantics so the existence check and the creation are a
/// single filesystem call.
pub async fn create_file(path: &Path) -> Result<()> {
    let mut file = fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .await
        .at(path)?;
    file.flush().await.at(path)?;
    Ok(())
}

/// Create an empty directory, creating missing intermediate directories.
///
/// The leaf itself must not exist yet.
pub async fn create_dir(path: &Path) -> Result<()> {
    match fs::create_dir(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            // Intermediate components are missing.
            fs::create_dir_all(path).await.at(path)
        }
        Err(e) => Err(AppError::io(path, e)),
    }
}

/// Create `name` under `parent` and return the new path.
pub async fn create_entry(parent: &Path, name: &str, kind: NodeType) -> Result<PathBuf> {
    validate_name(name)?;
    match fs::metadata(parent).await {
        Ok(meta) if meta.is_dir() => {}
        Ok(_) => {
            return Err(AppError::InvalidPath(format!(
                "{} is not a directory",
                parent.display()
            )))
        }
        Err(e) => return Err(AppError::io(parent, e)),
    }

    let target = parent.join(name);
    match kind {
        NodeType::Directory => create_dir(&target).await?,
        NodeType::File => {
            if let Some(dir) = target.parent() {
                if dir != parent {
                    fs::create_dir_all(dir).await.at(dir)?;
                }
            }
            create_file(&target).await?;
        }
    }
    Ok(target)
}

/// Delete a file or directory. Directories are removed recursively.
pub async fn delete(path: &Path, kind: NodeType) -> Result<()> {
    match kind {
        NodeType::Directory => fs::remove_dir_all(path).await.at(path),
        NodeType::File => fs::remove_file(path).await.at(path),
    }
}

/// Write `content` to `path`, creating or truncating it.
pub async fn write_file(path: &Path, content: &str) -> Result<()> {
    fs::write(path, content.as_bytes()).await.at(path)
}

/// Read a UTF-8 text file.
pub async fn read_file(path: &Path) -> Result<String> {
    fs::read_to_string(path).await.at(path)
}

/// Resolve `path` against `base` and follow symlinks where possible.
///
/// A path that does not exist yet keeps its file name under the resolved
/// parent, so a destination about to be created still compares equal to
/// paths inside a canonical root.
pub async fn resolve_path(base: &Path, path: &Path) -> PathBuf {
    let joined = base.join(path);
    if let Ok(real) = fs::canonicalize(&joined).await {
        return real;
    }
    match (joined.parent(), joined.file_name()) {
        (Some(parent), Some(name)) => match fs::canonicalize(parent).await {
            Ok(real) => real.join(name),
            Err(_) => joined,
        },
        _ => joined,
    }
}
