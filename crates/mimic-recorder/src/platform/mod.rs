//! Platform backends.
//!
//! Windows and macOS share one backend: the rdev global hook for capture,
//! enigo for injection, xcap for the focus probe. Linux has no hook
//! backend yet; the portable logic still builds there and replay falls
//! back to the no-op driver.

#[cfg(any(target_os = "windows", target_os = "macos"))]
pub mod desktop;

#[cfg(any(target_os = "windows", target_os = "macos"))]
pub use desktop::{spawn_hook, EnigoDriver, HookConfig, WindowFocus};
