mod app;
mod config;
mod coordinator;
mod dialog;
mod editor;
mod error;
mod event;
mod fs;
mod state;
mod ui;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use env_logger::Env;
use tokio::io::AsyncReadExt;

use crate::app::App;
use crate::config::{AppConfig, GeneralConfig};
use crate::dialog::{Dialogs, FileFilter, PresetDialogs, TerminalDialogs};
use crate::editor::CursorHint;
use crate::error::{AppError, Result};
use crate::fs::operations;
use crate::fs::tree::NodeType;

/// A note workspace explorer: browse, create, delete, save and search notes.
#[derive(Parser, Debug)]
#[command(name = "nx", version, about)]
struct Cli {
    /// Root directory to open (defaults to config, then current directory)
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    /// Explicit config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the visible tree
    Tree,
    /// Expand a directory (and its ancestors) and print the tree
    Expand { dir: PathBuf },
    /// Collapse a directory and print the tree
    Collapse { dir: PathBuf },
    /// Create an empty file, or a directory with --dir
    New {
        parent: PathBuf,
        name: String,
        #[arg(long)]
        dir: bool,
    },
    /// Delete a file, or a directory recursively with --dir
    Rm {
        path: PathBuf,
        #[arg(long)]
        dir: bool,
    },
    /// Save stdin (or --from FILE) to a file
    Save {
        target: Option<PathBuf>,
        /// Read the content from this file instead of stdin
        #[arg(long)]
        from: Option<PathBuf>,
        /// Write over TARGET if it exists instead of prompting
        #[arg(long)]
        overwrite: bool,
        /// Destination to use instead of prompting
        #[arg(long)]
        to: Option<PathBuf>,
    },
    /// Search text files under the root
    Search { term: String },
    /// List recently opened items, optionally filtered
    Recent { query: Option<String> },
    /// Open a file and print it; prompts when FILE is omitted
    Open { file: Option<PathBuf> },
}

fn current_dir() -> Result<PathBuf> {
    std::env::current_dir().map_err(|e| AppError::io(Path::new("."), e))
}

/// Make `path` absolute against the working directory.
async fn absolutize(path: &Path) -> Result<PathBuf> {
    Ok(operations::resolve_path(&current_dir()?, path).await)
}

async fn read_content(from: Option<&Path>) -> Result<String> {
    if let Some(path) = from {
        return operations::read_file(&absolutize(path).await?).await;
    }
    let mut content = String::new();
    tokio::io::stdin()
        .read_to_string(&mut content)
        .await
        .map_err(|e| AppError::Terminal(e.to_string()))?;
    Ok(content)
}

fn print_tree(app: &App) {
    print!("{}", ui::render_tree(&app.tree.flatten()));
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let overrides = AppConfig {
        general: GeneralConfig {
            default_path: cli
                .root
                .as_ref()
                .map(|p| p.to_string_lossy().to_string()),
        },
        ..Default::default()
    };
    let config = AppConfig::load(cli.config.as_deref(), Some(&overrides));

    env_logger::Builder::from_env(Env::default().default_filter_or(config.log_level())).init();

    let dialogs: Arc<dyn Dialogs> = match &cli.command {
        Command::Save { to: Some(to), .. } => {
            Arc::new(PresetDialogs::cancelling().with_save_file(absolutize(to).await?))
        }
        _ => Arc::new(TerminalDialogs::new(current_dir()?)),
    };
    let mut app = App::new(&config, dialogs);

    if let Command::Recent { query } = &cli.command {
        print!("{}", ui::render_recent(&app.recent(query.as_deref())));
        app.shutdown().await;
        return Ok(());
    }

    let requested = match config.default_path() {
        Some(p) => p,
        None => PathBuf::from("."),
    };
    let root = requested.canonicalize().map_err(|_| {
        AppError::InvalidPath(format!("{} does not exist", requested.display()))
    })?;
    app.open_directory(&root).await?;

    let outcome = run(&mut app, cli.command).await;
    app.shutdown().await;
    outcome
}

async fn run(app: &mut App, command: Command) -> Result<()> {
    match command {
        Command::Tree => print_tree(app),
        Command::Expand { dir } => {
            app.expand_to(&absolutize(&dir).await?).await?;
            print_tree(app);
        }
        Command::Collapse { dir } => {
            app.collapse(&absolutize(&dir).await?);
            print_tree(app);
        }
        Command::New { parent, name, dir } => {
            let kind = if dir {
                NodeType::Directory
            } else {
                NodeType::File
            };
            let path = app.create_item(&absolutize(&parent).await?, &name, kind).await?;
            println!("created {}", path.display());
            print_tree(app);
        }
        Command::Rm { path, dir } => {
            let kind = if dir {
                NodeType::Directory
            } else {
                NodeType::File
            };
            let path = absolutize(&path).await?;
            app.delete_item(&path, kind).await?;
            println!("deleted {}", path.display());
            print_tree(app);
        }
        Command::Save {
            target,
            from,
            overwrite,
            ..
        } => {
            let content = read_content(from.as_deref()).await?;
            let target = match target {
                Some(t) => Some(absolutize(&t).await?),
                None => None,
            };
            match app.save_content(target.as_deref(), &content, overwrite).await? {
                Some(path) => println!("saved {}", path.display()),
                None => println!("save cancelled"),
            }
        }
        Command::Search { term } => {
            let results = app.search(&term).await?;
            print!("{}", ui::render_search(&results));
        }
        Command::Open { file } => {
            let opened = match file {
                Some(file) => {
                    let path = absolutize(&file).await?;
                    Some(app.open_file(&path, CursorHint::Restore).await?)
                }
                None => app.prompt_open_file(&FileFilter::notes()).await?,
            };
            match opened.and_then(|id| app.tabs.get(id)) {
                Some(tab) => print!("{}", tab.content),
                None => println!("open cancelled"),
            }
        }
        Command::Recent { .. } => {}
    }
    Ok(())
}
