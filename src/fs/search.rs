//! Case-insensitive substring search across the text files of a root.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{AppError, IoContext, Result};

/// Extensions scanned by default.
pub const DEFAULT_EXTENSIONS: &[&str] = &["txt", "md", "js", "ts", "tsx", "jsx", "html", "css"];

/// Directory names never descended into.
pub const DEFAULT_IGNORE_PATTERNS: &[&str] = &[
    ".git",
    "node_modules",
    "__pycache__",
    "venv",
    ".venv",
    "target",
];

/// A single matching line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchMatch {
    /// 1-based line number.
    pub line_number: usize,
    pub line: String,
    /// Character offset of the first occurrence in the line.
    pub column_start: usize,
    pub column_end: usize,
}

/// All matches inside one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchFileResult {
    pub file_path: PathBuf,
    pub file_name: String,
    pub matches: Vec<SearchMatch>,
}

/// Which files a search visits.
#[derive(Debug, Clone)]
pub struct SearchOptions {
    pub extensions: Vec<String>,
    pub ignore: Vec<String>,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            extensions: DEFAULT_EXTENSIONS.iter().map(|s| s.to_string()).collect(),
            ignore: DEFAULT_IGNORE_PATTERNS
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl SearchOptions {
    fn accepts_file(&self, path: &Path) -> bool {
        path.extension()
            .map(|ext| {
                let ext = ext.to_string_lossy().to_lowercase();
                self.extensions.iter().any(|e| e.eq_ignore_ascii_case(&ext))
            })
            .unwrap_or(false)
    }

    fn skips_entry(&self, name: &str) -> bool {
        name.starts_with('.') || self.ignore.iter().any(|p| p == name)
    }
}

/// Search every eligible file under `root` for `term`.
///
/// The walk runs on the blocking pool; results are ordered by file path.
pub async fn search_in_files(
    term: &str,
    root: &Path,
    options: &SearchOptions,
) -> Result<Vec<SearchFileResult>> {
    let term = term.to_string();
    let root = root.to_path_buf();
    let options = options.clone();
    let root_for_err = root.clone();
    tokio::task::spawn_blocking(move || search_blocking(&term, &root, &options))
        .await
        .map_err(|e| AppError::Io {
            path: root_for_err,
            source: std::io::Error::other(e.to_string()),
        })?
}

fn search_blocking(term: &str, root: &Path, options: &SearchOptions) -> Result<Vec<SearchFileResult>> {
    // Surface a missing root instead of returning an empty list.
    fs::metadata(root).at(root)?;
    if term.is_empty() {
        return Ok(Vec::new());
    }

    let mut files = collect_files(root, options);
    files.sort();

    let mut results = Vec::new();
    for file in files {
        let content = match fs::read_to_string(&file) {
            Ok(c) => c,
            Err(e) => {
                log::warn!("search: skipping unreadable {}: {}", file.display(), e);
                continue;
            }
        };
        let matches = find_matches(&content, term);
        if matches.is_empty() {
            continue;
        }
        let file_name = file
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        results.push(SearchFileResult {
            file_path: file,
            file_name,
            matches,
        });
    }
    log::debug!(
        "search {:?} under {}: {} files matched",
        term,
        root.display(),
        results.len()
    );
    Ok(results)
}

/// Walk `root` iteratively, collecting files the options accept.
fn collect_files(root: &Path, options: &SearchOptions) -> Vec<PathBuf> {
    let mut files = Vec::new();
    let mut stack = vec![root.to_path_buf()];

    while let Some(dir) = stack.pop() {
        let entries = match fs::read_dir(&dir) {
            Ok(e) => e,
            Err(e) => {
                log::warn!("search: cannot read {}: {}", dir.display(), e);
                continue;
            }
        };
        for entry in entries.flatten() {
            let name = entry.file_name().to_string_lossy().to_string();
            if options.skips_entry(&name) {
                continue;
            }
            let path = entry.path();
            match entry.file_type() {
                Ok(ft) if ft.is_dir() => stack.push(path),
                Ok(ft) if ft.is_file() => {
                    if options.accepts_file(&path) {
                        files.push(path);
                    }
                }
                _ => {}
            }
        }
    }
    files
}

/// Lowercase `text` one character at a time.
///
/// The second value holds, for each character of `text`, the byte offset
/// where its lowercase form starts in the folded string.
fn fold_case(text: &str) -> (String, Vec<usize>) {
    let mut folded = String::with_capacity(text.len());
    let mut starts = Vec::with_capacity(text.len());
    for ch in text.chars() {
        starts.push(folded.len());
        folded.extend(ch.to_lowercase());
    }
    (folded, starts)
}

/// First case-insensitive occurrence of `term` on each line of `content`.
///
/// Columns are character indices into the original line.
pub fn find_matches(content: &str, term: &str) -> Vec<SearchMatch> {
    let (needle, _) = fold_case(term);
    if needle.is_empty() {
        return Vec::new();
    }

    content
        .split('\n')
        .enumerate()
        .filter_map(|(i, raw)| {
            let line = raw.strip_suffix('\r').unwrap_or(raw);
            let (folded, starts) = fold_case(line);
            let byte_idx = folded.find(&needle)?;
            let end_idx = byte_idx + needle.len();
            let column_start = starts.partition_point(|&s| s <= byte_idx).saturating_sub(1);
            let column_end = starts.partition_point(|&s| s < end_idx);
            Some(SearchMatch {
                line_number: i + 1,
                line: line.to_string(),
                column_start,
                column_end,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn find_matches_reports_one_based_lines() {
        let matches = find_matches("alpha\nBeta gamma\nnope\nbeta", "beta");
        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].line_number, 2);
        assert_eq!(matches[0].line, "Beta gamma");
        assert_eq!(matches[0].column_start, 0);
        assert_eq!(matches[0].column_end, 4);
        assert_eq!(matches[1].line_number, 4);
    }

    #[test]
    fn find_matches_only_first_occurrence_per_line() {
        let matches = find_matches("todo: TODO again", "todo");
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].column_start, 0);
    }

    #[test]
    fn find_matches_columns_count_characters() {
        let matches = find_matches("日本語 note", "NOTE");
        assert_eq!(matches[0].column_start, 4);
        assert_eq!(matches[0].column_end, 8);
    }

    #[test]
    fn find_matches_columns_follow_original_line() {
        // 'İ' folds to two characters
        let matches = find_matches("İx", "x");
        assert_eq!(matches[0].column_start, 1);
        assert_eq!(matches[0].column_end, 2);

        let matches = find_matches("aİb", "İB");
        assert_eq!(matches[0].column_start, 1);
        assert_eq!(matches[0].column_end, 3);
    }

    #[test]
    fn find_matches_strips_carriage_return() {
        let matches = find_matches("hello\r\nworld\r\n", "world");
        assert_eq!(matches[0].line, "world");
        assert_eq!(matches[0].line_number, 2);
    }

    #[test]
    fn find_matches_empty_term() {
        assert!(find_matches("anything", "").is_empty());
    }

    #[tokio::test]
    async fn search_respects_extensions_and_hidden() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("a.md"), "Needle here").unwrap();
        fs::write(tmp.path().join("b.rs"), "needle in rust").unwrap();
        fs::create_dir(tmp.path().join(".hidden")).unwrap();
        fs::write(tmp.path().join(".hidden").join("c.md"), "needle").unwrap();
        fs::create_dir_all(tmp.path().join("node_modules").join("pkg")).unwrap();
        fs::write(
            tmp.path().join("node_modules").join("pkg").join("d.js"),
            "needle",
        )
        .unwrap();
        fs::create_dir(tmp.path().join("sub")).unwrap();
        fs::write(tmp.path().join("sub").join("e.txt"), "x\nNEEDLE").unwrap();

        let results = search_in_files("needle", tmp.path(), &SearchOptions::default())
            .await
            .unwrap();
        let names: Vec<&str> = results.iter().map(|r| r.file_name.as_str()).collect();
        assert_eq!(names, vec!["a.md", "e.txt"]);
        assert_eq!(results[1].matches[0].line_number, 2);
    }

    #[tokio::test]
    async fn search_missing_root_fails() {
        let tmp = TempDir::new().unwrap();
        let err = search_in_files("x", &tmp.path().join("gone"), &SearchOptions::default())
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn search_omits_files_without_matches() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("a.md"), "nothing to see").unwrap();
        let results = search_in_files("needle", tmp.path(), &SearchOptions::default())
            .await
            .unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn search_result_serializes_camel_case() {
        let m = SearchMatch {
            line_number: 3,
            line: "x".into(),
            column_start: 0,
            column_end: 1,
        };
        let json = serde_json::to_string(&m).unwrap();
        assert!(json.contains("\"lineNumber\":3"));
        assert!(json.contains("\"columnStart\":0"));
    }
}
