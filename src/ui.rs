//! Plain-text rendering of the tree, search results and recent items.

use crate::fs::search::SearchFileResult;
use crate::fs::tree::{FlatItem, NodeType};
use crate::state::RecentItem;

/// Build the indentation prefix for a row using box-drawing characters.
///
/// Continuation lines depend on whether each ancestor was a last sibling, so
/// the preceding rows are consulted.
fn build_prefix(item: &FlatItem, items: &[FlatItem], item_index: usize) -> String {
    if item.depth == 0 {
        return String::new();
    }

    let mut parts: Vec<&str> = Vec::new();

    // Levels 1..depth-1 carry a continuation line unless that ancestor was last.
    // Depth 1 rows hang off the root, which draws nothing.
    for d in 1..item.depth {
        let ancestor_is_last = items[..item_index]
            .iter()
            .rev()
            .take_while(|row| row.depth >= d)
            .find(|row| row.depth == d)
            .map(|row| row.is_last_sibling)
            .unwrap_or(false);
        parts.push(if ancestor_is_last { "   " } else { "│  " });
    }

    parts.push(if item.is_last_sibling { "└── " } else { "├── " });
    parts.concat()
}

fn indicator(item: &FlatItem) -> &'static str {
    match (item.node_type, item.is_expanded) {
        (NodeType::Directory, true) => "▼ ",
        (NodeType::Directory, false) => "▶ ",
        (NodeType::File, _) => "",
    }
}

/// One line per visible row.
pub fn render_tree(items: &[FlatItem]) -> String {
    let mut out = String::new();
    for (i, item) in items.iter().enumerate() {
        out.push_str(&build_prefix(item, items, i));
        out.push_str(indicator(item));
        out.push_str(&item.name);
        if item.node_type == NodeType::Directory {
            out.push('/');
        }
        out.push('\n');
    }
    out
}

/// `path:line:column: text` per match, grep style.
pub fn render_search(results: &[SearchFileResult]) -> String {
    let mut out = String::new();
    for result in results {
        for m in &result.matches {
            out.push_str(&format!(
                "{}:{}:{}: {}\n",
                result.file_path.display(),
                m.line_number,
                m.column_start + 1,
                m.line.trim_end()
            ));
        }
    }
    out
}

pub fn render_recent(items: &[RecentItem]) -> String {
    items
        .iter()
        .map(|item| {
            let marker = match item.kind {
                NodeType::Directory => "d",
                NodeType::File => "f",
            };
            format!(
                "{} {}  {}\n",
                item.timestamp.format("%Y-%m-%d %H:%M"),
                marker,
                item.path.display()
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::search::SearchMatch;
    use std::path::PathBuf;

    fn row(name: &str, node_type: NodeType, depth: usize, expanded: bool, last: bool) -> FlatItem {
        FlatItem {
            name: name.into(),
            path: PathBuf::from("/proj").join(name),
            node_type,
            depth,
            is_expanded: expanded,
            is_last_sibling: last,
        }
    }

    #[test]
    fn renders_connectors() {
        let items = vec![
            row("proj", NodeType::Directory, 0, true, true),
            row("notes", NodeType::Directory, 1, true, false),
            row("todo.md", NodeType::File, 2, false, true),
            row("archive", NodeType::Directory, 1, false, false),
            row("draft.md", NodeType::File, 1, false, true),
        ];
        let text = render_tree(&items);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "▼ proj/");
        assert_eq!(lines[1], "├── ▼ notes/");
        assert_eq!(lines[2], "│  └── todo.md");
        assert_eq!(lines[3], "├── ▶ archive/");
        assert_eq!(lines[4], "└── draft.md");
    }

    #[test]
    fn last_ancestor_drops_continuation() {
        let items = vec![
            row("proj", NodeType::Directory, 0, true, true),
            row("notes", NodeType::Directory, 1, true, true),
            row("todo.md", NodeType::File, 2, false, true),
        ];
        let text = render_tree(&items);
        assert_eq!(text.lines().nth(2), Some("   └── todo.md"));
    }

    #[test]
    fn search_lines_are_one_based_columns() {
        let results = vec![SearchFileResult {
            file_path: PathBuf::from("/proj/a.md"),
            file_name: "a.md".into(),
            matches: vec![SearchMatch {
                line_number: 3,
                line: "find me".into(),
                column_start: 5,
                column_end: 7,
            }],
        }];
        assert_eq!(render_search(&results), "/proj/a.md:3:6: find me\n");
    }
}
