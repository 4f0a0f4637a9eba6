//! mimic-recorder - input capture, segmentation and replay
//!
//! Records mouse and keyboard activity as a timed event stream, splits it
//! into named actions driven by an external queue file, and plays stored
//! patterns back with the recorded cadence.
//!
//! ## Platform Support
//!
//! - **Windows / macOS**: full support (rdev hook, enigo injection)
//! - **Linux**: portable logic only; no hook backend yet

pub mod dispatch;
pub mod driver;
pub mod focus;
pub mod platform;
pub mod recorder;
pub mod replay;
pub mod segment;
pub mod session;

pub use dispatch::ActionDispatcher;
pub use driver::{InputDriver, NoopDriver};
pub use focus::{FocusProbe, RateLimited, StaticFocus};
pub use recorder::{RawInput, Recorder, RecorderConfig, RecordingHandle, RecordingSummary};
pub use replay::{ReplayEngine, ReplayOptions, ReplayOutcome, StopHandle};
pub use segment::{ActionSegmenter, SegmentState};
pub use session::CaptureSession;

pub mod prelude {
    pub use crate::dispatch::ActionDispatcher;
    pub use crate::driver::{InputDriver, NoopDriver};
    pub use crate::focus::{FocusProbe, RateLimited, StaticFocus};
    pub use crate::recorder::{
        RawInput, Recorder, RecorderConfig, RecordingHandle, RecordingSummary,
    };
    pub use crate::replay::{ReplayEngine, ReplayOptions, ReplayOutcome, StopHandle};
    pub use crate::segment::{ActionSegmenter, SegmentState};
    pub use crate::session::CaptureSession;

    #[cfg(any(target_os = "windows", target_os = "macos"))]
    pub use crate::platform::{spawn_hook, EnigoDriver, HookConfig, WindowFocus};
}
