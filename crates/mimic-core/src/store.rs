//! Pattern artifact storage.
//!
//! One pretty-printed JSON document per finalized action, named
//! `<sanitized_type>[_box<id>]_<YYYYMMDD_HHMMSS_microseconds>.json`. The
//! microsecond suffix keeps rapid consecutive saves of the same action type
//! from colliding.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use tracing::{debug, info, warn};

use crate::action::ActionDescriptor;
use crate::error::{Error, Result};
use crate::events::{ActionRecording, Event};

pub struct PatternStore {
    dir: PathBuf,
}

impl PatternStore {
    /// Open a store rooted at `dir`, creating the directory if absent.
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).map_err(|source| Error::ArtifactIo {
            path: dir.clone(),
            source,
        })?;
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        &self.dir
    }

    /// Persist one finalized action. Returns the artifact path, or `None`
    /// when the buffer is empty or the write fails; a failed write is logged
    /// and never aborts the calling session.
    pub fn save(&self, action_line: &str, events: &[Event]) -> Option<PathBuf> {
        if events.is_empty() {
            debug!("nothing to save for '{}'", action_line);
            return None;
        }
        match self.try_save(action_line, events) {
            Ok(path) => {
                info!(
                    "saved {} events for '{}' to {}",
                    events.len(),
                    action_line,
                    path.display()
                );
                Some(path)
            }
            Err(e) => {
                warn!("dropping recording for '{}': {}", action_line, e);
                None
            }
        }
    }

    fn try_save(&self, action_line: &str, events: &[Event]) -> Result<PathBuf> {
        let descriptor = ActionDescriptor::parse(action_line);
        let now = chrono::Local::now();

        let filename = format!(
            "{}{}.json",
            file_prefix(&descriptor.action_type, descriptor.box_id),
            now.format("%Y%m%d_%H%M%S_%6f")
        );
        let path = self.dir.join(filename);

        let recording = ActionRecording {
            action_name_line: action_line.to_string(),
            parsed_action_type: descriptor.action_type,
            parsed_box_id: descriptor.box_id,
            save_timestamp: now,
            total_events: events.len(),
            events: events.to_vec(),
        };

        fs::create_dir_all(&self.dir).map_err(|source| Error::ArtifactIo {
            path: self.dir.clone(),
            source,
        })?;
        let file = File::create(&path).map_err(|source| Error::ArtifactIo {
            path: path.clone(),
            source,
        })?;
        let mut w = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut w, &recording).map_err(|source| Error::ArtifactJson {
            path: path.clone(),
            source,
        })?;
        w.flush().map_err(|source| Error::ArtifactIo {
            path: path.clone(),
            source,
        })?;

        Ok(path)
    }

    /// Newest stored artifact for an action type, by filesystem creation
    /// time (modification time where creation time is unavailable, filename
    /// as the final tiebreak). A box id narrows the match to that box.
    pub fn find_latest(&self, action_type: &str, box_id: Option<i64>) -> Option<PathBuf> {
        let prefix = file_prefix(action_type, box_id);

        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) => {
                warn!("cannot list {}: {}", self.dir.display(), e);
                return None;
            }
        };

        let mut newest: Option<(SystemTime, String, PathBuf)> = None;
        for entry in entries.flatten() {
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if !name.starts_with(&prefix) || !name.ends_with(".json") {
                continue;
            }
            let stamp = entry
                .metadata()
                .ok()
                .and_then(|m| m.created().or_else(|_| m.modified()).ok())
                .unwrap_or(SystemTime::UNIX_EPOCH);
            let better = match &newest {
                None => true,
                Some((best_stamp, best_name, _)) => {
                    (stamp, name) > (*best_stamp, best_name.as_str())
                }
            };
            if better {
                newest = Some((stamp, name.to_string(), entry.path()));
            }
        }
        newest.map(|(_, _, path)| path)
    }

    /// Read one artifact back.
    pub fn load(&self, path: impl AsRef<Path>) -> Result<ActionRecording> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| Error::ArtifactIo {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| Error::ArtifactJson {
            path: path.to_path_buf(),
            source,
        })
    }

    /// All artifact filenames, sorted.
    pub fn list(&self) -> Result<Vec<String>> {
        let entries = fs::read_dir(&self.dir).map_err(|source| Error::ArtifactIo {
            path: self.dir.clone(),
            source,
        })?;
        let mut files = Vec::new();
        for entry in entries.flatten() {
            let name = entry.file_name();
            if let Some(s) = name.to_str() {
                if s.ends_with(".json") {
                    files.push(s.to_string());
                }
            }
        }
        files.sort();
        Ok(files)
    }

    pub fn delete(&self, filename: &str) -> Result<()> {
        let path = self.dir.join(filename);
        fs::remove_file(&path).map_err(|source| Error::ArtifactIo { path, source })
    }
}

/// Filename prefix shared by every artifact of an action type (and box),
/// trailing separator included. `list` output can be filtered with it.
pub fn file_prefix(action_type: &str, box_id: Option<i64>) -> String {
    let mut base = sanitize(action_type);
    if let Some(id) = box_id {
        base.push_str(&format!("_box{}", id));
    }
    base.push('_');
    base
}

fn sanitize(s: &str) -> String {
    s.chars()
        .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{MouseButton, MoveMetrics};

    fn events() -> Vec<Event> {
        vec![
            Event::MouseMove {
                x: 1,
                y: 2,
                time_offset_ms: 0,
                metrics: MoveMetrics::default(),
            },
            Event::MouseButton {
                pressed: true,
                x: 1,
                y: 2,
                button: MouseButton::Left,
                time_offset_ms: 40,
                hold_duration_ms: None,
            },
        ]
    }

    #[test]
    fn save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = PatternStore::new(dir.path()).unwrap();

        let path = store.save("pick_item[3]", &events()).unwrap();
        let name = path.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("pick_item_box3_"));
        assert!(name.ends_with(".json"));

        let recording = store.load(&path).unwrap();
        assert_eq!(recording.action_name_line, "pick_item[3]");
        assert_eq!(recording.parsed_action_type, "pick_item");
        assert_eq!(recording.parsed_box_id, Some(3));
        assert_eq!(recording.total_events, 2);
        assert_eq!(recording.events, events());
    }

    #[test]
    fn empty_buffer_saves_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let store = PatternStore::new(dir.path()).unwrap();
        assert_eq!(store.save("idle", &[]), None);
        assert!(store.list().unwrap().is_empty());
    }

    #[test]
    fn sanitized_names() {
        let dir = tempfile::tempdir().unwrap();
        let store = PatternStore::new(dir.path()).unwrap();

        let path = store.save("pick up (item)![7]", &events()).unwrap();
        let name = path.file_name().unwrap().to_str().unwrap();
        let stem = name.trim_end_matches(".json");
        assert!(stem
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-'));
        assert!(name.contains("_box7_"));
    }

    #[test]
    fn find_latest_prefers_newest() {
        let dir = tempfile::tempdir().unwrap();
        let store = PatternStore::new(dir.path()).unwrap();

        let first = store.save("chop_tree", &events()).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(10));
        let second = store.save("chop_tree", &events()).unwrap();
        assert_ne!(first, second);

        assert_eq!(store.find_latest("chop_tree", None), Some(second));
        assert_eq!(store.find_latest("unknown_action", None), None);
    }

    #[test]
    fn file_prefix_forms() {
        assert_eq!(file_prefix("chop_tree", None), "chop_tree_");
        assert_eq!(file_prefix("bank", Some(4)), "bank_box4_");
        assert_eq!(file_prefix("pick up!", None), "pick_up__");
    }

    #[test]
    fn find_latest_narrows_by_box() {
        let dir = tempfile::tempdir().unwrap();
        let store = PatternStore::new(dir.path()).unwrap();

        store.save("bank[1]", &events()).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(5));
        let boxed = store.save("bank[2]", &events()).unwrap();

        assert_eq!(store.find_latest("bank", Some(2)), Some(boxed.clone()));
        // Without a box id the newest of any box wins
        assert_eq!(store.find_latest("bank", None), Some(boxed));
    }
}
