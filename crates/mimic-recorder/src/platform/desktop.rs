//! rdev hook, enigo injection and xcap focus probe.
//!
//! The hook thread is detached: rdev offers no portable unhook, so the
//! `active` flag gates forwarding instead and the thread dies with the
//! process. Button events carry the pointer position tracked from the
//! move stream, since the OS reports buttons without coordinates.

use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use crossbeam_channel::Sender;
use tracing::{debug, error, info, warn};

use mimic_core::error::{Error, Result};
use mimic_core::events::MouseButton;

use crate::driver::InputDriver;
use crate::focus::FocusProbe;
use crate::recorder::RawInput;

/// Hook thread wiring.
#[derive(Clone)]
pub struct HookConfig {
    /// Raw input is forwarded only while this is set. The start hotkey
    /// sets it.
    pub active: Arc<AtomicBool>,
    /// Set when the stop hotkey fires.
    pub stop: Arc<AtomicBool>,
    pub start_key: String,
    pub stop_key: String,
}

/// Spawn the global input hook. A full channel drops events rather than
/// blocking the OS callback.
pub fn spawn_hook(tx: Sender<RawInput>, config: HookConfig) {
    thread::spawn(move || run_hook(tx, config));
}

fn run_hook(tx: Sender<RawInput>, config: HookConfig) {
    let mouse_x = AtomicI32::new(0);
    let mouse_y = AtomicI32::new(0);

    let callback = move |event: rdev::Event| {
        let at = Instant::now();
        match event.event_type {
            rdev::EventType::MouseMove { x, y } => {
                let x = x.round() as i32;
                let y = y.round() as i32;
                mouse_x.store(x, Ordering::Relaxed);
                mouse_y.store(y, Ordering::Relaxed);
                if config.active.load(Ordering::Relaxed) {
                    let _ = tx.try_send(RawInput::MouseMove { x, y, at });
                }
            }
            rdev::EventType::ButtonPress(button) => {
                if let Some(button) = map_button(button) {
                    if config.active.load(Ordering::Relaxed) {
                        let _ = tx.try_send(RawInput::MouseButton {
                            button,
                            pressed: true,
                            x: mouse_x.load(Ordering::Relaxed),
                            y: mouse_y.load(Ordering::Relaxed),
                            at,
                        });
                    }
                }
            }
            rdev::EventType::ButtonRelease(button) => {
                if let Some(button) = map_button(button) {
                    if config.active.load(Ordering::Relaxed) {
                        let _ = tx.try_send(RawInput::MouseButton {
                            button,
                            pressed: false,
                            x: mouse_x.load(Ordering::Relaxed),
                            y: mouse_y.load(Ordering::Relaxed),
                            at,
                        });
                    }
                }
            }
            rdev::EventType::KeyPress(key) => {
                let name = key_name(&key);
                if name.eq_ignore_ascii_case(&config.start_key) {
                    if !config.active.swap(true, Ordering::SeqCst) {
                        info!("start hotkey pressed, capture active");
                    }
                    return;
                }
                if name.eq_ignore_ascii_case(&config.stop_key) {
                    info!("stop hotkey pressed");
                    config.stop.store(true, Ordering::SeqCst);
                    return;
                }
                if config.active.load(Ordering::Relaxed) {
                    let _ = tx.try_send(RawInput::Key {
                        key: name,
                        pressed: true,
                        at,
                    });
                }
            }
            rdev::EventType::KeyRelease(key) => {
                let name = key_name(&key);
                // Hotkey edges stay out of the recording entirely.
                if name.eq_ignore_ascii_case(&config.start_key)
                    || name.eq_ignore_ascii_case(&config.stop_key)
                {
                    return;
                }
                if config.active.load(Ordering::Relaxed) {
                    let _ = tx.try_send(RawInput::Key {
                        key: name,
                        pressed: false,
                        at,
                    });
                }
            }
            rdev::EventType::Wheel { .. } => {}
        }
    };

    info!("input hook listening");
    if let Err(e) = rdev::listen(callback) {
        error!("input hook failed: {:?}", e);
    }
}

fn map_button(button: rdev::Button) -> Option<MouseButton> {
    match button {
        rdev::Button::Left => Some(MouseButton::Left),
        rdev::Button::Right => Some(MouseButton::Right),
        rdev::Button::Middle => Some(MouseButton::Middle),
        rdev::Button::Unknown(_) => None,
    }
}

/// Stable name for a key, shared between recordings and hotkey matching.
fn key_name(key: &rdev::Key) -> String {
    use rdev::Key;
    match key {
        Key::KeyA => "a".to_string(),
        Key::KeyB => "b".to_string(),
        Key::KeyC => "c".to_string(),
        Key::KeyD => "d".to_string(),
        Key::KeyE => "e".to_string(),
        Key::KeyF => "f".to_string(),
        Key::KeyG => "g".to_string(),
        Key::KeyH => "h".to_string(),
        Key::KeyI => "i".to_string(),
        Key::KeyJ => "j".to_string(),
        Key::KeyK => "k".to_string(),
        Key::KeyL => "l".to_string(),
        Key::KeyM => "m".to_string(),
        Key::KeyN => "n".to_string(),
        Key::KeyO => "o".to_string(),
        Key::KeyP => "p".to_string(),
        Key::KeyQ => "q".to_string(),
        Key::KeyR => "r".to_string(),
        Key::KeyS => "s".to_string(),
        Key::KeyT => "t".to_string(),
        Key::KeyU => "u".to_string(),
        Key::KeyV => "v".to_string(),
        Key::KeyW => "w".to_string(),
        Key::KeyX => "x".to_string(),
        Key::KeyY => "y".to_string(),
        Key::KeyZ => "z".to_string(),
        Key::Num0 => "0".to_string(),
        Key::Num1 => "1".to_string(),
        Key::Num2 => "2".to_string(),
        Key::Num3 => "3".to_string(),
        Key::Num4 => "4".to_string(),
        Key::Num5 => "5".to_string(),
        Key::Num6 => "6".to_string(),
        Key::Num7 => "7".to_string(),
        Key::Num8 => "8".to_string(),
        Key::Num9 => "9".to_string(),
        Key::F1 => "F1".to_string(),
        Key::F2 => "F2".to_string(),
        Key::F3 => "F3".to_string(),
        Key::F4 => "F4".to_string(),
        Key::F5 => "F5".to_string(),
        Key::F6 => "F6".to_string(),
        Key::F7 => "F7".to_string(),
        Key::F8 => "F8".to_string(),
        Key::F9 => "F9".to_string(),
        Key::F10 => "F10".to_string(),
        Key::F11 => "F11".to_string(),
        Key::F12 => "F12".to_string(),
        Key::Alt => "Alt".to_string(),
        Key::Backspace => "Backspace".to_string(),
        Key::CapsLock => "CapsLock".to_string(),
        Key::ControlLeft | Key::ControlRight => "Ctrl".to_string(),
        Key::Delete => "Delete".to_string(),
        Key::DownArrow => "Down".to_string(),
        Key::End => "End".to_string(),
        Key::Escape => "Escape".to_string(),
        Key::Home => "Home".to_string(),
        Key::LeftArrow => "Left".to_string(),
        Key::MetaLeft | Key::MetaRight => "Meta".to_string(),
        Key::PageDown => "PageDown".to_string(),
        Key::PageUp => "PageUp".to_string(),
        Key::Return | Key::KpReturn => "Enter".to_string(),
        Key::RightArrow => "Right".to_string(),
        Key::ShiftLeft | Key::ShiftRight => "Shift".to_string(),
        Key::Space => "Space".to_string(),
        Key::Tab => "Tab".to_string(),
        Key::UpArrow => "Up".to_string(),
        Key::Comma => ",".to_string(),
        Key::Dot => ".".to_string(),
        Key::SemiColon => ";".to_string(),
        Key::Quote => "'".to_string(),
        Key::BackQuote => "`".to_string(),
        Key::Slash | Key::KpDivide => "/".to_string(),
        Key::BackSlash => "\\".to_string(),
        Key::LeftBracket => "[".to_string(),
        Key::RightBracket => "]".to_string(),
        Key::Minus | Key::KpMinus => "-".to_string(),
        Key::Equal => "=".to_string(),
        Key::KpPlus => "+".to_string(),
        Key::KpMultiply => "*".to_string(),
        Key::Kp0 => "0".to_string(),
        Key::Kp1 => "1".to_string(),
        Key::Kp2 => "2".to_string(),
        Key::Kp3 => "3".to_string(),
        Key::Kp4 => "4".to_string(),
        Key::Kp5 => "5".to_string(),
        Key::Kp6 => "6".to_string(),
        Key::Kp7 => "7".to_string(),
        Key::Kp8 => "8".to_string(),
        Key::Kp9 => "9".to_string(),
        Key::KpDelete => "Delete".to_string(),
        other => format!("{:?}", other),
    }
}

// ============================================================================
// Injection
// ============================================================================

/// enigo-backed synthetic input.
pub struct EnigoDriver {
    enigo: enigo::Enigo,
}

impl EnigoDriver {
    pub fn new() -> Result<Self> {
        let enigo = enigo::Enigo::new(&enigo::Settings::default())
            .map_err(|e| Error::Driver(format!("enigo init: {}", e)))?;
        Ok(Self { enigo })
    }
}

impl InputDriver for EnigoDriver {
    fn move_to(&mut self, x: i32, y: i32) -> Result<()> {
        use enigo::Mouse;
        self.enigo
            .move_mouse(x, y, enigo::Coordinate::Abs)
            .map_err(|e| Error::Driver(format!("move: {}", e)))
    }

    fn button(&mut self, button: MouseButton, pressed: bool) -> Result<()> {
        use enigo::Mouse;
        let button = match button {
            MouseButton::Left => enigo::Button::Left,
            MouseButton::Right => enigo::Button::Right,
            MouseButton::Middle => enigo::Button::Middle,
        };
        self.enigo
            .button(button, direction(pressed))
            .map_err(|e| Error::Driver(format!("button: {}", e)))
    }

    fn key(&mut self, key: &str, pressed: bool) -> Result<()> {
        use enigo::Keyboard;
        let Some(key) = parse_key(key) else {
            // Recorded on a layout we cannot map back; dropping one key
            // beats failing the whole replay.
            debug!("no injection mapping for key '{}', skipping", key);
            return Ok(());
        };
        self.enigo
            .key(key, direction(pressed))
            .map_err(|e| Error::Driver(format!("key: {}", e)))
    }
}

fn direction(pressed: bool) -> enigo::Direction {
    if pressed {
        enigo::Direction::Press
    } else {
        enigo::Direction::Release
    }
}

/// Inverse of [`key_name`] for the names enigo can express.
fn parse_key(name: &str) -> Option<enigo::Key> {
    use enigo::Key;
    let key = match name {
        "Enter" => Key::Return,
        "Tab" => Key::Tab,
        "Space" => Key::Space,
        "Backspace" => Key::Backspace,
        "Delete" => Key::Delete,
        "Escape" => Key::Escape,
        "Up" => Key::UpArrow,
        "Down" => Key::DownArrow,
        "Left" => Key::LeftArrow,
        "Right" => Key::RightArrow,
        "Home" => Key::Home,
        "End" => Key::End,
        "PageUp" => Key::PageUp,
        "PageDown" => Key::PageDown,
        "CapsLock" => Key::CapsLock,
        "Shift" => Key::Shift,
        "Ctrl" => Key::Control,
        "Alt" => Key::Alt,
        "Meta" => Key::Meta,
        "F1" => Key::F1,
        "F2" => Key::F2,
        "F3" => Key::F3,
        "F4" => Key::F4,
        "F5" => Key::F5,
        "F6" => Key::F6,
        "F7" => Key::F7,
        "F8" => Key::F8,
        "F9" => Key::F9,
        "F10" => Key::F10,
        "F11" => Key::F11,
        "F12" => Key::F12,
        _ => {
            let mut chars = name.chars();
            let c = chars.next()?;
            if chars.next().is_some() {
                return None;
            }
            Key::Unicode(c)
        }
    };
    Some(key)
}

// ============================================================================
// Focus
// ============================================================================

/// Title-substring focus probe over the OS window list. An empty title
/// matches whichever window is focused.
pub struct WindowFocus {
    title: String,
}

impl WindowFocus {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into().to_lowercase(),
        }
    }
}

impl FocusProbe for WindowFocus {
    fn is_focused(&mut self) -> bool {
        let windows = match xcap::Window::all() {
            Ok(windows) => windows,
            Err(e) => {
                warn!("focus query failed: {}", e);
                return false;
            }
        };
        let Some(focused) = windows.iter().find(|w| w.is_focused().unwrap_or(false)) else {
            return false;
        };
        if self.title.is_empty() {
            return true;
        }
        focused
            .title()
            .map(|t| t.to_lowercase().contains(&self.title))
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hotkey_names_round_trip_through_key_name() {
        assert_eq!(key_name(&rdev::Key::F2), "F2");
        assert_eq!(key_name(&rdev::Key::F3), "F3");
        assert_eq!(key_name(&rdev::Key::KeyA), "a");
        assert_eq!(key_name(&rdev::Key::Return), "Enter");
    }

    #[test]
    fn recorded_names_map_back_to_injectable_keys() {
        for name in ["a", "z", "0", "Enter", "Space", "Shift", "F12", ",", "["] {
            assert!(parse_key(name).is_some(), "no mapping for {}", name);
        }
        assert!(parse_key("Unknown(255)").is_none());
    }

    #[test]
    fn unknown_buttons_are_dropped() {
        assert_eq!(map_button(rdev::Button::Unknown(9)), None);
        assert_eq!(map_button(rdev::Button::Left), Some(MouseButton::Left));
    }
}
