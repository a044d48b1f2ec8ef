//! Batch work lists.
//!
//! Plain text, one set of per-worker parameters per line. Comment lines
//! (`#`-prefixed) and blank lines are ignored.

use std::path::Path;

use crate::error::{NetError, Result};

/// One work-list line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem {
    /// The raw parameter line.
    pub line: String,
}

impl WorkItem {
    /// Create an item from a parameter line.
    #[must_use]
    pub fn new(line: impl Into<String>) -> Self {
        Self { line: line.into() }
    }

    /// The line split into whitespace-separated arguments.
    #[must_use]
    pub fn args(&self) -> Vec<String> {
        self.line.split_whitespace().map(ToString::to_string).collect()
    }
}

/// Parse work-list text.
#[must_use]
pub fn parse(text: &str) -> Vec<WorkItem> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(WorkItem::new)
        .collect()
}

/// Load a work list from a file.
///
/// # Errors
///
/// Returns a batch error if the file cannot be read.
pub fn load(path: impl AsRef<Path>) -> Result<Vec<WorkItem>> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)
        .map_err(|e| NetError::batch(format!("read work list {}: {e}", path.display())))?;
    Ok(parse(&text))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn comments_and_blanks_are_ignored() {
        let items = parse("# routers\nr1.example.net\n\n  \nr2.example.net 2022\n# done\n");
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].line, "r1.example.net");
        assert_eq!(items[1].args(), vec!["r2.example.net", "2022"]);
    }

    #[test]
    fn empty_list() {
        assert!(parse("# nothing here\n\n").is_empty());
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("routers.list");
        std::fs::write(&path, "r1\nr2\n").unwrap();

        let items = load(&path).unwrap();
        assert_eq!(items.len(), 2);
    }
}
