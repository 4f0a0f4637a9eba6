//! mimic-core - data model, artifact storage and configuration
//!
//! The portable half of mimic: recorded event types, action queue parsing,
//! the pattern store, and configuration. Everything in this crate builds
//! and tests on any platform; OS input hooks live in `mimic-recorder`.

pub mod action;
pub mod config;
pub mod error;
pub mod events;
pub mod store;

pub use action::{ActionDescriptor, ActionQueue};
pub use config::Config;
pub use error::{Error, Result};
pub use events::{ActionRecording, Event, MouseButton, MoveMetrics};
pub use store::PatternStore;

pub mod prelude {
    pub use crate::action::{ActionDescriptor, ActionQueue};
    pub use crate::config::Config;
    pub use crate::error::{Error, Result};
    pub use crate::events::{ActionRecording, Event, MouseButton, MoveMetrics};
    pub use crate::store::PatternStore;
}
