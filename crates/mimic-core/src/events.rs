//! Event types for recorded input patterns.
//!
//! Events serialize as a tagged union keyed on `type`, so an artifact is
//! readable as plain JSON and malformed documents are rejected at load time
//! instead of blowing up mid-replay.

use serde::{Deserialize, Serialize};

/// Mouse button identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MouseButton {
    Left,
    Right,
    Middle,
}

impl std::fmt::Display for MouseButton {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MouseButton::Left => write!(f, "left"),
            MouseButton::Right => write!(f, "right"),
            MouseButton::Middle => write!(f, "middle"),
        }
    }
}

/// Derived motion metrics attached to every mouse move.
///
/// `dt` is seconds since the previous move event (not any event), `distance`
/// is pixels travelled, `speed` is pixels per second, `angle` is the heading
/// in degrees from `atan2(dy, dx)`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct MoveMetrics {
    pub dt: f64,
    pub distance: f64,
    pub speed: f64,
    pub angle: f64,
    pub dx: f64,
    pub dy: f64,
}

/// One captured input event.
///
/// `time_offset_ms` is measured from session start on a monotonic clock and
/// is non-decreasing within a recording. `hold_duration_ms` only appears on
/// release events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    MouseMove {
        x: i32,
        y: i32,
        time_offset_ms: u64,
        metrics: MoveMetrics,
    },
    MouseButton {
        pressed: bool,
        x: i32,
        y: i32,
        button: MouseButton,
        time_offset_ms: u64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        hold_duration_ms: Option<u64>,
    },
    Key {
        pressed: bool,
        key: String,
        time_offset_ms: u64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        hold_duration_ms: Option<u64>,
    },
    Pause {
        time_offset_ms: u64,
        duration_ms: u64,
        x: i32,
        y: i32,
    },
}

impl Event {
    pub fn time_offset_ms(&self) -> u64 {
        match self {
            Event::MouseMove { time_offset_ms, .. }
            | Event::MouseButton { time_offset_ms, .. }
            | Event::Key { time_offset_ms, .. }
            | Event::Pause { time_offset_ms, .. } => *time_offset_ms,
        }
    }
}

/// One finalized action's events, as persisted to a pattern artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionRecording {
    /// Raw queue line the action came from.
    pub action_name_line: String,
    pub parsed_action_type: String,
    pub parsed_box_id: Option<i64>,
    /// Wall-clock save time, ISO-8601.
    pub save_timestamp: chrono::DateTime<chrono::Local>,
    pub total_events: usize,
    pub events: Vec<Event>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_events() -> Vec<Event> {
        vec![
            Event::MouseMove {
                x: 10,
                y: 20,
                time_offset_ms: 0,
                metrics: MoveMetrics::default(),
            },
            Event::Pause {
                time_offset_ms: 0,
                duration_ms: 120,
                x: 10,
                y: 20,
            },
            Event::MouseButton {
                pressed: true,
                x: 10,
                y: 20,
                button: MouseButton::Left,
                time_offset_ms: 120,
                hold_duration_ms: None,
            },
            Event::MouseButton {
                pressed: false,
                x: 10,
                y: 20,
                button: MouseButton::Left,
                time_offset_ms: 200,
                hold_duration_ms: Some(80),
            },
            Event::Key {
                pressed: false,
                key: "Enter".to_string(),
                time_offset_ms: 260,
                hold_duration_ms: Some(60),
            },
        ]
    }

    #[test]
    fn round_trip() {
        let events = sample_events();
        let json = serde_json::to_string(&events).unwrap();
        let back: Vec<Event> = serde_json::from_str(&json).unwrap();
        assert_eq!(events, back);
    }

    #[test]
    fn tag_names() {
        let json = serde_json::to_value(&sample_events()).unwrap();
        let tags: Vec<&str> = json
            .as_array()
            .unwrap()
            .iter()
            .map(|e| e["type"].as_str().unwrap())
            .collect();
        assert_eq!(
            tags,
            vec!["mouse_move", "pause", "mouse_button", "mouse_button", "key"]
        );
    }

    #[test]
    fn press_has_no_hold_field() {
        let press = Event::Key {
            pressed: true,
            key: "a".to_string(),
            time_offset_ms: 5,
            hold_duration_ms: None,
        };
        let json = serde_json::to_value(&press).unwrap();
        assert!(json.get("hold_duration_ms").is_none());
    }

    #[test]
    fn recording_round_trip() {
        let recording = ActionRecording {
            action_name_line: "pick_item[3]".to_string(),
            parsed_action_type: "pick_item".to_string(),
            parsed_box_id: Some(3),
            save_timestamp: chrono::Local::now(),
            total_events: sample_events().len(),
            events: sample_events(),
        };
        let json = serde_json::to_string_pretty(&recording).unwrap();
        let back: ActionRecording = serde_json::from_str(&json).unwrap();
        assert_eq!(recording.events, back.events);
        assert_eq!(back.parsed_box_id, Some(3));
    }

    #[test]
    fn missing_events_field_rejected() {
        let json = r#"{
            "action_name_line": "idle",
            "parsed_action_type": "idle",
            "parsed_box_id": null,
            "save_timestamp": "2024-01-01T10:00:00+00:00",
            "total_events": 0
        }"#;
        assert!(serde_json::from_str::<ActionRecording>(json).is_err());
    }
}
