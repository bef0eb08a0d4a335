//! Application configuration: TOML file loading, CLI overrides, and defaults.
//!
//! Resolution order (first found wins, values merge/override):
//! 1. CLI flags (`--config`, `--root`)
//! 2. `$NOTE_EXPLORER_CONFIG` environment variable (path to config file)
//! 3. Project-local `.note-explorer.toml` in the current working directory
//! 4. Global `~/.config/note-explorer/config.toml`
//! 5. Built-in defaults

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::fs::search::{SearchOptions, DEFAULT_EXTENSIONS, DEFAULT_IGNORE_PATTERNS};
use crate::fs::tree::DEFAULT_MAX_REFRESH_DEPTH;
use crate::state::{StateStore, DEFAULT_RECENT_LIMIT};

// ── Section configs ──────────────────────────────────────────────────────────

/// General application settings.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct GeneralConfig {
    /// Directory opened when `--root` is not given.
    pub default_path: Option<String>,
}

/// Tree cache settings.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct TreeConfig {
    /// How many levels below its start a refresh descends.
    pub max_refresh_depth: Option<usize>,
}

/// Text search settings.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct SearchConfig {
    /// File extensions scanned, without the dot.
    pub extensions: Option<Vec<String>>,
    /// Directory names skipped.
    pub ignore: Option<Vec<String>>,
}

/// Persisted state settings.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct StateConfig {
    /// Path of the JSON state document.
    pub file: Option<String>,
    /// Cap on the recent-items list.
    pub recent_limit: Option<usize>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default `env_logger` filter; `RUST_LOG` still wins.
    pub level: Option<String>,
}

// ── Top-level config ─────────────────────────────────────────────────────────

/// Top-level application configuration.
///
/// All fields are optional so that partial configs from different sources
/// can be merged together (CLI overrides file, file overrides defaults).
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub general: GeneralConfig,
    pub tree: TreeConfig,
    pub search: SearchConfig,
    pub state: StateConfig,
    pub logging: LoggingConfig,
}

pub const DEFAULT_LOG_LEVEL: &str = "info";

// ── Config file locator ──────────────────────────────────────────────────────

/// Candidate config file paths in priority order, excluding `--config`.
fn candidate_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    if let Ok(env_path) = std::env::var("NOTE_EXPLORER_CONFIG") {
        paths.push(PathBuf::from(env_path));
    }

    if let Ok(cwd) = std::env::current_dir() {
        paths.push(cwd.join(".note-explorer.toml"));
    }

    if let Some(config_dir) = dirs::config_dir() {
        paths.push(config_dir.join("note-explorer").join("config.toml"));
    }

    paths
}

/// Read and parse a TOML config file. `None` if missing or unparsable.
fn load_file(path: &Path) -> Option<AppConfig> {
    let content = std::fs::read_to_string(path).ok()?;
    match toml::from_str::<AppConfig>(&content) {
        Ok(cfg) => {
            log::debug!("loaded config {}", path.display());
            Some(cfg)
        }
        Err(e) => {
            log::warn!("failed to parse config file {}: {}", path.display(), e);
            None
        }
    }
}

// ── Merge logic ──────────────────────────────────────────────────────────────

impl AppConfig {
    /// Merge `other` on top of `self`; `other`'s `Some` values win.
    pub fn merge(self, other: &AppConfig) -> AppConfig {
        AppConfig {
            general: GeneralConfig {
                default_path: other
                    .general
                    .default_path
                    .clone()
                    .or(self.general.default_path),
            },
            tree: TreeConfig {
                max_refresh_depth: other
                    .tree
                    .max_refresh_depth
                    .or(self.tree.max_refresh_depth),
            },
            search: SearchConfig {
                extensions: other.search.extensions.clone().or(self.search.extensions),
                ignore: other.search.ignore.clone().or(self.search.ignore),
            },
            state: StateConfig {
                file: other.state.file.clone().or(self.state.file),
                recent_limit: other.state.recent_limit.or(self.state.recent_limit),
            },
            logging: LoggingConfig {
                level: other.logging.level.clone().or(self.logging.level),
            },
        }
    }

    /// Load the final merged configuration.
    ///
    /// `cli_config_path` is an explicit config file path from `--config`.
    /// `cli_overrides` are partial overrides derived from CLI flags.
    pub fn load(cli_config_path: Option<&Path>, cli_overrides: Option<&AppConfig>) -> AppConfig {
        let mut config = AppConfig::default();

        // Lowest priority first so higher ones overwrite.
        for path in candidate_paths().iter().rev() {
            if let Some(file_cfg) = load_file(path) {
                config = config.merge(&file_cfg);
            }
        }

        if let Some(cli_path) = cli_config_path {
            match load_file(cli_path) {
                Some(file_cfg) => config = config.merge(&file_cfg),
                None => log::warn!("config file {} not loaded", cli_path.display()),
            }
        }

        if let Some(overrides) = cli_overrides {
            config = config.merge(overrides);
        }

        config
    }

    // ── Convenience getters with built-in defaults ──────────────────────────

    pub fn default_path(&self) -> Option<PathBuf> {
        self.general.default_path.as_deref().map(expand_home)
    }

    pub fn max_refresh_depth(&self) -> usize {
        self.tree
            .max_refresh_depth
            .unwrap_or(DEFAULT_MAX_REFRESH_DEPTH)
    }

    pub fn search_options(&self) -> SearchOptions {
        SearchOptions {
            extensions: self.search.extensions.clone().unwrap_or_else(|| {
                DEFAULT_EXTENSIONS.iter().map(|s| s.to_string()).collect()
            }),
            ignore: self.search.ignore.clone().unwrap_or_else(|| {
                DEFAULT_IGNORE_PATTERNS
                    .iter()
                    .map(|s| s.to_string())
                    .collect()
            }),
        }
    }

    /// State document location; `None` when no data directory is known.
    pub fn state_file(&self) -> Option<PathBuf> {
        match self.state.file.as_deref() {
            Some(path) => Some(expand_home(path)),
            None => StateStore::default_path(),
        }
    }

    pub fn recent_limit(&self) -> usize {
        self.state.recent_limit.unwrap_or(DEFAULT_RECENT_LIMIT)
    }

    pub fn log_level(&self) -> &str {
        self.logging.level.as_deref().unwrap_or(DEFAULT_LOG_LEVEL)
    }
}

/// Expand a leading `~/` to the home directory.
fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

// ── Tests ────────────────────────────────────────────────────────────────────
