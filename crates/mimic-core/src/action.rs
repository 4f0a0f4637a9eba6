//! Action descriptors and the plain-text action queue.
//!
//! The queue file carries one action per line. The capture process only
//! watches the head line for changes; the replay process consumes lines from
//! the head as it plays them.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::error::{Error, Result};

/// Parsed form of one queue line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionDescriptor {
    pub action_type: String,
    pub box_id: Option<i64>,
}

impl ActionDescriptor {
    /// Parse one queue line.
    ///
    /// Grammar: optional `"<timestamp> - "` prefix (recognized by at least
    /// two colons before the separator), then the action type, optionally
    /// followed by `[<integer box id>]`. Parsing never fails: a line that
    /// does not fit the grammar is taken verbatim as the action type.
    pub fn parse(line: &str) -> Self {
        let original = line.trim();
        let mut rest = original;

        if let Some(idx) = original.find(" - ") {
            if original[..idx].matches(':').count() >= 2 {
                rest = original[idx + 3..].trim();
            }
        }

        if rest.ends_with(']') {
            if let Some(open) = rest.rfind('[') {
                let inner = &rest[open + 1..rest.len() - 1];
                match inner.trim().parse::<i64>() {
                    Ok(id) => {
                        return Self {
                            action_type: rest[..open].trim().to_string(),
                            box_id: Some(id),
                        };
                    }
                    Err(_) => {
                        return Self {
                            action_type: original.to_string(),
                            box_id: None,
                        };
                    }
                }
            }
        }

        Self {
            action_type: rest.to_string(),
            box_id: None,
        }
    }
}

/// Handle on the shared action queue file.
#[derive(Debug, Clone)]
pub struct ActionQueue {
    path: PathBuf,
}

impl ActionQueue {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current head line, trimmed. `None` when the file is missing, empty,
    /// or leads with a blank line.
    pub fn head(&self) -> Option<String> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) => {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!("cannot read queue {}: {}", self.path.display(), e);
                }
                return None;
            }
        };
        let head = text.lines().next()?.trim();
        if head.is_empty() {
            None
        } else {
            Some(head.to_string())
        }
    }

    /// Remove the head line, keeping the rest of the file intact. Returns
    /// the removed line, or `None` when the file was missing or empty.
    pub fn consume_head(&self) -> Result<Option<String>> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(Error::Queue {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        let mut lines = text.lines();
        let Some(head) = lines.next() else {
            return Ok(None);
        };
        let head = head.trim().to_string();

        let rest: Vec<&str> = lines.collect();
        let mut remainder = rest.join("\n");
        if !remainder.is_empty() {
            remainder.push('\n');
        }
        fs::write(&self.path, remainder).map_err(|source| Error::Queue {
            path: self.path.clone(),
            source,
        })?;

        Ok(Some(head))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_simple() {
        let d = ActionDescriptor::parse("idle");
        assert_eq!(d.action_type, "idle");
        assert_eq!(d.box_id, None);
    }

    #[test]
    fn parse_timestamp_and_box() {
        let d = ActionDescriptor::parse("2024-01-01 10:00:00 - pick_item[3]");
        assert_eq!(d.action_type, "pick_item");
        assert_eq!(d.box_id, Some(3));
    }

    #[test]
    fn parse_box_only() {
        let d = ActionDescriptor::parse("drop_item[12]");
        assert_eq!(d.action_type, "drop_item");
        assert_eq!(d.box_id, Some(12));
    }

    #[test]
    fn dash_without_timestamp_is_kept() {
        // " - " alone is not a timestamp separator; it needs two colons first
        let d = ActionDescriptor::parse("walk - north");
        assert_eq!(d.action_type, "walk - north");
        assert_eq!(d.box_id, None);
    }

    #[test]
    fn bad_box_id_falls_back_to_whole_line() {
        let d = ActionDescriptor::parse("pick_item[three]");
        assert_eq!(d.action_type, "pick_item[three]");
        assert_eq!(d.box_id, None);
    }

    #[test]
    fn queue_head_and_consume() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("queue.txt");
        fs::write(&path, "first[1]\nsecond\nthird\n").unwrap();

        let queue = ActionQueue::new(&path);
        assert_eq!(queue.head().as_deref(), Some("first[1]"));

        assert_eq!(
            queue.consume_head().unwrap().as_deref(),
            Some("first[1]")
        );
        assert_eq!(queue.head().as_deref(), Some("second"));
        assert_eq!(fs::read_to_string(&path).unwrap(), "second\nthird\n");
    }

    #[test]
    fn missing_queue_is_quiet() {
        let dir = tempfile::tempdir().unwrap();
        let queue = ActionQueue::new(dir.path().join("absent.txt"));
        assert_eq!(queue.head(), None);
        assert_eq!(queue.consume_head().unwrap(), None);
    }

    #[test]
    fn blank_head_line_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("queue.txt");
        fs::write(&path, "\nreal_action\n").unwrap();
        let queue = ActionQueue::new(&path);
        assert_eq!(queue.head(), None);
    }
}
