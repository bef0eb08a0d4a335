//! Open and save prompts.
//!
//! The core never draws a dialog itself; it asks a [`Dialogs`] implementation
//! and treats `None` as the user cancelling.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWriteExt, BufReader};

use crate::error::{AppError, Result};
use crate::fs::operations;

/// A named group of file extensions offered by a prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileFilter {
    pub name: String,
    /// Extensions without the dot; `*` accepts anything.
    pub extensions: Vec<String>,
}

impl FileFilter {
    pub fn new(name: &str, extensions: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            extensions: extensions.iter().map(|e| e.to_string()).collect(),
        }
    }

    /// Markdown, Text, All files.
    pub fn notes() -> Vec<FileFilter> {
        vec![
            FileFilter::new("Markdown", &["md"]),
            FileFilter::new("Text", &["txt"]),
            FileFilter::new("All Files", &["*"]),
        ]
    }

    /// Whether any of `filters` takes `path`. No filters takes everything.
    pub fn any_match(filters: &[FileFilter], path: &Path) -> bool {
        filters.is_empty() || filters.iter().any(|f| f.matches(path))
    }

    pub fn matches(&self, path: &Path) -> bool {
        if self.extensions.iter().any(|e| e == "*") {
            return true;
        }
        path.extension()
            .map(|ext| {
                let ext = ext.to_string_lossy();
                self.extensions.iter().any(|e| e.eq_ignore_ascii_case(&ext))
            })
            .unwrap_or(false)
    }
}

/// Prompts provided by the host.
#[async_trait]
pub trait Dialogs: Send + Sync {
    async fn prompt_open_directory(&self) -> Result<Option<PathBuf>>;

    async fn prompt_open_file(&self, filters: &[FileFilter]) -> Result<Option<PathBuf>>;

    /// `default_path` pre-fills the prompt.
    async fn prompt_save_file(
        &self,
        default_path: &Path,
        filters: &[FileFilter],
    ) -> Result<Option<PathBuf>>;
}

type Input = Box<dyn AsyncBufRead + Send + Unpin>;

/// Prompts on stderr and reads the answer from the controlling terminal,
/// falling back to stdin when there is none.
///
/// A blank line takes the offered default, or cancels when there is none.
/// End of input cancels. Relative answers are resolved against `base`.
pub struct TerminalDialogs {
    base: PathBuf,
    input: tokio::sync::Mutex<Option<Input>>,
}

impl TerminalDialogs {
    pub fn new(base: PathBuf) -> Self {
        Self {
            base,
            input: tokio::sync::Mutex::new(None),
        }
    }

    /// Read answers from `input` instead of the terminal.
    #[cfg(test)]
    pub fn with_input(base: PathBuf, input: impl AsyncBufRead + Send + Unpin + 'static) -> Self {
        Self {
            base,
            input: tokio::sync::Mutex::new(Some(Box::new(input))),
        }
    }

    async fn open_terminal() -> Input {
        match tokio::fs::File::open("/dev/tty").await {
            Ok(tty) => Box::new(BufReader::new(tty)),
            Err(e) => {
                log::debug!("no controlling terminal ({}), reading answers from stdin", e);
                Box::new(BufReader::new(tokio::io::stdin()))
            }
        }
    }

    /// One line, or `None` at end of input.
    async fn read_line(&self) -> Result<Option<String>> {
        let mut input = self.input.lock().await;
        if input.is_none() {
            *input = Some(Self::open_terminal().await);
        }
        let Some(reader) = input.as_mut() else {
            return Ok(None);
        };
        let mut line = String::new();
        let read = reader
            .read_line(&mut line)
            .await
            .map_err(|e| AppError::Terminal(e.to_string()))?;
        Ok((read > 0).then_some(line))
    }

    async fn ask(&self, prompt: &str, default: Option<&Path>) -> Result<Option<PathBuf>> {
        let mut stderr = tokio::io::stderr();
        let text = match default {
            Some(d) => format!("{} [{}]: ", prompt, d.display()),
            None => format!("{}: ", prompt),
        };
        stderr
            .write_all(text.as_bytes())
            .await
            .map_err(|e| AppError::Terminal(e.to_string()))?;
        stderr
            .flush()
            .await
            .map_err(|e| AppError::Terminal(e.to_string()))?;

        let line = self.read_line().await?;
        match parse_answer(line.as_deref(), default) {
            Some(answer) => Ok(Some(operations::resolve_path(&self.base, &answer).await)),
            None => Ok(None),
        }
    }
}

/// `None` is end of input. A blank line falls back to `default`.
fn parse_answer(line: Option<&str>, default: Option<&Path>) -> Option<PathBuf> {
    let answer = line?.trim();
    if answer.is_empty() {
        default.map(Path::to_path_buf)
    } else {
        Some(PathBuf::from(answer))
    }
}

fn describe(filters: &[FileFilter]) -> String {
    filters
        .iter()
        .map(|f| format!("{} (*.{})", f.name, f.extensions.join(", *.")))
        .collect::<Vec<_>>()
        .join(", ")
}

#[async_trait]
impl Dialogs for TerminalDialogs {
    async fn prompt_open_directory(&self) -> Result<Option<PathBuf>> {
        self.ask("Open directory", None).await
    }

    async fn prompt_open_file(&self, filters: &[FileFilter]) -> Result<Option<PathBuf>> {
        self.ask(&format!("Open file {}", describe(filters)), None)
            .await
    }

    async fn prompt_save_file(
        &self,
        default_path: &Path,
        filters: &[FileFilter],
    ) -> Result<Option<PathBuf>> {
        let prompt = format!("Save as {}", describe(filters));
        self.ask(&prompt, Some(default_path)).await
    }
}

/// A save destination fixed in advance, e.g. by a command-line flag.
///
/// The answer is handed out once; the open prompts always cancel.
#[derive(Debug, Default)]
pub struct PresetDialogs {
    save_file: Mutex<Option<PathBuf>>,
}

impl PresetDialogs {
    /// Every prompt is cancelled.
    pub fn cancelling() -> Self {
        Self::default()
    }

    pub fn with_save_file(self, path: PathBuf) -> Self {
        Self {
            save_file: Mutex::new(Some(path)),
        }
    }
}

#[async_trait]
impl Dialogs for PresetDialogs {
    async fn prompt_open_directory(&self) -> Result<Option<PathBuf>> {
        Ok(None)
    }

    async fn prompt_open_file(&self, _filters: &[FileFilter]) -> Result<Option<PathBuf>> {
        Ok(None)
    }

    async fn prompt_save_file(
        &self,
        _default_path: &Path,
        _filters: &[FileFilter],
    ) -> Result<Option<PathBuf>> {
        Ok(self
            .save_file
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .take())
    }
}
